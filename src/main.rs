//! Command-line entry point: logging setup, config loading, dispatch.

mod cli;

use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use rev_powersystems::config::ExportConfig;

use crate::cli::Cli;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> ExportConfig {
    let config = match &cli.config {
        Some(path) => match ExportConfig::from_toml_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("{e}");
                process::exit(1);
            }
        },
        None => ExportConfig::default(),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        process::exit(1);
    }
    config
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let config = load_config(&cli);

    if let Err(e) = cli::run(cli.command, config) {
        error!("{e}");
        process::exit(1);
    }
}
