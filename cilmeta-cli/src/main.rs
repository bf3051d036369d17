mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command, GlobalOptions};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })?;

    let cli = Cli::parse();
    init_logging(&cli.global);

    match &cli.command {
        Command::Info { path } => commands::info::run(path, &cli.global),
        Command::Tables { path, table } => {
            commands::tables::run(path, table.as_deref(), &cli.global)
        }
        Command::Heaps { path, heap } => commands::heaps::run(path, heap.as_deref(), &cli.global),
        Command::Roundtrip {
            path,
            output,
            rewrite,
        } => commands::roundtrip::run(path, output.as_deref(), *rewrite, &cli.global),
    }
}

/// Log cilmeta warnings to stderr, or debug records with `--verbose`. Silent under `--json`.
fn init_logging(opts: &GlobalOptions) {
    if opts.json {
        return;
    }
    let level = if opts.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_module("cilmeta", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_target(false)
        .init();
}
