// ABOUTME: Main entry point for the cellpin command-line tool
// ABOUTME: Reuses or uploads one image in the terminal's store and prints its placeholder grid

use anyhow::Result;
use cellpin_cli::cli::Cli;
use cellpin_cli::cli_output::CliOutput;
use cellpin_cli::config::Config;
use cellpin_cli::converter::{converter_for, prepare_payload};
use cellpin_cli::progress::UploadProgress;
use cellpin_cli::sink::Sink;
use cellpin_sdk::{
    render_grid, DedupKey, Error, ImageStore, Placement, TerminalSession, TtyChannel,
};
use clap::Parser;
use log::info;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = CliOutput::new(cli.no_color);
    if let Err(err) = run(&cli) {
        output.report(&err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load()?;
    let settings = config.resolve(cli)?;

    // Read the source before touching the terminal, so a bad path never
    // leaves any protocol traffic behind
    let source = std::fs::read(&cli.image).map_err(|source| Error::Input {
        path: cli.image.clone(),
        source,
    })?;
    let key = DedupKey::derive(&source, settings.geometry);

    if cli.print_key {
        println!("{}", key);
        return Ok(());
    }

    let sink = Sink::new(cli.output.as_deref(), cli.append);
    let label = cli
        .image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.image.display().to_string());

    let channel = TtyChannel::open().map_err(Error::TerminalAcquisition)?;
    let mut session = TerminalSession::acquire_on(channel, settings.drain_timeout)?;

    let converter = converter_for(settings.converter.as_deref());
    let mut progress = UploadProgress::new(label, !cli.quiet);
    let mut store = ImageStore::new(session.channel(), settings.store.clone());
    let placement = store.place(
        &key,
        settings.geometry,
        || prepare_payload(&source, &cli.image, converter.as_ref()),
        &mut progress,
    )?;

    // The grid must not be printed while responses can still arrive
    session.release();

    match placement {
        Placement::Reused(handle) => info!("reusing handle {} for {}", handle, key),
        Placement::Uploaded(handle) => info!("uploaded {} as handle {}", key, handle),
    }

    let grid = render_grid(placement.handle(), settings.geometry, settings.row_colors)?;
    sink.write(&grid)
}
