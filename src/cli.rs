use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;

use rev_powersystems::config::ExportConfig;
use rev_powersystems::io::paths::parent_dir;
use rev_powersystems::io::read_manifest;
use rev_powersystems::matching::{FanOutPolicy, match_tables};
use rev_powersystems::pipeline::{export_lookaheads, export_profiles};
use rev_powersystems::source::{CsvSource, read_meta};
use rev_powersystems::{Error, Result};

/// Export generation profiles as exchange-format time series.
#[derive(Debug, Parser)]
#[command(name = "rev-powersystems", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. `debug`, `rev_powersystems=trace`)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write all entity profiles into one CSV plus a manifest
    Export {
        /// Metadata CSV, one row per entity
        #[arg(long)]
        meta: PathBuf,
        /// Profile CSV with a DateTime column then one column per entity
        #[arg(long)]
        profiles: PathBuf,
        #[arg(long)]
        csv_out: PathBuf,
        #[arg(long)]
        manifest: PathBuf,
        /// Series resolution in seconds; derived from the data when omitted
        #[arg(long)]
        resolution: Option<f64>,
    },
    /// Write one CSV per entity with a column per forecast horizon
    Lookahead {
        #[arg(long)]
        meta: PathBuf,
        /// Profile CSV for one horizon; repeat in horizon order
        #[arg(long = "horizon", required = true)]
        horizons: Vec<PathBuf>,
        /// Output path with one `{}` slot for the entity identifier
        #[arg(long)]
        csv_template: String,
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        resolution: Option<f64>,
    },
    /// Match source points to their nearest target points
    Match {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        target: PathBuf,
        #[arg(long)]
        max_fan_out: Option<usize>,
        /// Log fan-out violations instead of failing
        #[arg(long)]
        warn_only: bool,
        /// Output CSV; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Summarize a manifest and check its data files exist
    Inspect {
        #[arg(long)]
        manifest: PathBuf,
    },
}

/// Runs `command` with `config`, after applying command-line overrides.
pub fn run(command: Command, mut config: ExportConfig) -> Result<()> {
    match command {
        Command::Export {
            meta,
            profiles,
            csv_out,
            manifest,
            resolution,
        } => {
            override_resolution(&mut config, resolution)?;
            let source = CsvSource::from_files(&meta, &profiles)?;
            export_profiles(&source, &csv_out, &manifest, &config)?;
            Ok(())
        }
        Command::Lookahead {
            meta,
            horizons,
            csv_template,
            manifest,
            resolution,
        } => {
            override_resolution(&mut config, resolution)?;
            let sources = horizons
                .iter()
                .map(|h| CsvSource::from_files(&meta, h))
                .collect::<Result<Vec<_>>>()?;
            export_lookaheads(&sources, &csv_template, &manifest, &config)?;
            Ok(())
        }
        Command::Match {
            source,
            target,
            max_fan_out,
            warn_only,
            out,
        } => {
            if let Some(bound) = max_fan_out {
                config.matching.max_fan_out = bound;
            }
            if warn_only {
                config.matching.on_violation = FanOutPolicy::Warn;
            }
            if let Some(e) = config.validate().into_iter().next() {
                return Err(e.into());
            }
            let options = config.matching.options();
            let source = read_meta(File::open(&source)?)?;
            let target = read_meta(File::open(&target)?)?;
            let matching = match_tables(&source, &target, &options)?;
            info!(
                sources = matching.assignments().len(),
                max_fiber = matching.max_fiber(),
                "matching complete"
            );
            match out {
                Some(path) => write_assignments(matching.assignments(), File::create(path)?),
                None => write_assignments(matching.assignments(), io::stdout().lock()),
            }
        }
        Command::Inspect { manifest } => inspect(&manifest),
    }
}

fn override_resolution(config: &mut ExportConfig, resolution: Option<f64>) -> Result<()> {
    if resolution.is_none() {
        return Ok(());
    }
    config.metadata.resolution_seconds = resolution;
    match config.validate().into_iter().next() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn write_assignments(assignments: &[usize], writer: impl Write) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["source_index", "target_index"])?;
    for (source, target) in assignments.iter().enumerate() {
        wtr.write_record([source.to_string(), target.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

fn inspect(manifest: &Path) -> Result<()> {
    let entries = read_manifest(manifest)?;
    let dir = parent_dir(manifest);
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{} entries", entries.len())?;
    let mut missing = None;
    for entry in &entries {
        let path = dir.join(&entry.data_file);
        let exists = path.exists();
        writeln!(
            stdout,
            "{}\t{}\t{}",
            entry.component_name,
            entry.data_file.display(),
            if exists { "ok" } else { "MISSING" }
        )?;
        if !exists && missing.is_none() {
            missing = Some(path);
        }
    }
    match missing {
        Some(path) => Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("referenced data file {} does not exist", path.display()),
        ))),
        None => Ok(()),
    }
}
