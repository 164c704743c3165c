// ABOUTME: Rendering sink receiving the finished placeholder grid
// ABOUTME: Standard output, or a file that is truncated or appended to

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Stdout,
    File { path: PathBuf, append: bool },
}

impl Sink {
    pub fn new(output: Option<&Path>, append: bool) -> Self {
        match output {
            Some(path) => Sink::File {
                path: path.to_path_buf(),
                append,
            },
            None => Sink::Stdout,
        }
    }

    pub fn write(&self, grid: &str) -> Result<()> {
        match self {
            Sink::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(grid.as_bytes())
                    .and_then(|_| stdout.flush())
                    .context("Failed to write grid to standard output")
            }
            Sink::File { path, append } => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(*append)
                    .truncate(!*append)
                    .open(path)
                    .with_context(|| format!("Failed to open output file: {}", path.display()))?;
                file.write_all(grid.as_bytes())
                    .with_context(|| format!("Failed to write output file: {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sink_selection() {
        assert_eq!(Sink::new(None, false), Sink::Stdout);
        assert_eq!(
            Sink::new(Some(Path::new("out.txt")), true),
            Sink::File {
                path: PathBuf::from("out.txt"),
                append: true
            }
        );
    }

    #[test]
    fn test_truncate_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grid.txt");
        std::fs::write(&path, "old contents that are longer").unwrap();

        Sink::new(Some(&path), false).write("new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_append_keeps_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grid.txt");
        std::fs::write(&path, "first\n").unwrap();

        let sink = Sink::new(Some(&path), true);
        sink.write("second\n").unwrap();
        sink.write("third\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "first\nsecond\nthird\n"
        );
    }

    #[test]
    fn test_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.txt");
        Sink::new(Some(&path), true).write("grid").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "grid");
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("grid.txt");
        assert!(Sink::new(Some(&path), false).write("grid").is_err());
    }
}
