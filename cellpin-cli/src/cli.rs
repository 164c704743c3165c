// ABOUTME: CLI argument definitions for the cellpin binary
// ABOUTME: Defines the single upload-or-reuse invocation using clap derive macros

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cellpin")]
#[command(about = "Upload an image to the terminal once and print it as a placeholder grid")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// Image to display
    pub image: PathBuf,

    /// Width of the grid in terminal cells
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub columns: Option<u32>,

    /// Height of the grid in terminal cells
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub rows: Option<u32>,

    /// Write the grid to this file instead of standard output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Append to the output file instead of truncating it
    #[arg(short, long, requires = "output")]
    pub append: bool,

    /// Do not prefix grid rows with their color index
    #[arg(long)]
    pub no_row_colors: bool,

    /// Milliseconds to wait for each terminal response
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Upload even if the terminal already holds this image
    #[arg(long)]
    pub force_upload: bool,

    /// Print the dedup key for the image and exit without touching the terminal
    #[arg(long)]
    pub print_key: bool,

    /// Hide the upload progress display
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored error output
    #[arg(long)]
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["cellpin", "cat.png"]).unwrap();
        assert_eq!(cli.image, PathBuf::from("cat.png"));
        assert_eq!(cli.columns, None);
        assert_eq!(cli.rows, None);
        assert!(cli.output.is_none());
        assert!(!cli.append);
        assert!(!cli.force_upload);
    }

    #[test]
    fn test_parse_geometry_and_output() {
        let cli = Cli::try_parse_from([
            "cellpin", "-c", "20", "-r", "8", "-o", "grid.txt", "--append", "cat.png",
        ])
        .unwrap();
        assert_eq!(cli.columns, Some(20));
        assert_eq!(cli.rows, Some(8));
        assert_eq!(cli.output, Some(PathBuf::from("grid.txt")));
        assert!(cli.append);
    }

    #[test]
    fn test_zero_geometry_is_rejected() {
        assert!(Cli::try_parse_from(["cellpin", "-c", "0", "cat.png"]).is_err());
        assert!(Cli::try_parse_from(["cellpin", "--rows", "0", "cat.png"]).is_err());
    }

    #[test]
    fn test_append_requires_output() {
        assert!(Cli::try_parse_from(["cellpin", "--append", "cat.png"]).is_err());
    }

    #[test]
    fn test_image_is_required() {
        assert!(Cli::try_parse_from(["cellpin"]).is_err());
    }
}
