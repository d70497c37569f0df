use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use libmzxml::{read_mzxml, write_mzxml, Config};

/// Read and rewrite mzXML scan files
#[derive(Parser)]
#[command(name = "libmzxml")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize an mzXML file
    Info {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Read an mzXML file and write it back out
    Rewrite {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Directory to write <input stem>.mzXML into
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Info { input } => {
            let Some(run) = read_mzxml(&input, &config)
                .with_context(|| format!("Failed to read {}", input.display()))?
            else {
                bail!("No scans in the input: {}", input.display());
            };

            let header = &run.header;
            println!("File: {}", header.file_name);
            println!(
                "Instrument: {} {}",
                header.instrument_manufacturer, header.instrument_model
            );
            println!("Scans: {}", header.scan_count);
            println!("Time range: {:.2}-{:.2} min", header.start_time, header.end_time);
            for level in 1..=2u8 {
                let count = run.scans.iter().filter(|s| s.ms_order == level).count();
                println!("  MS{}: {}", level, count);
            }
        }
        Commands::Rewrite { input, output_dir } => {
            let Some(run) = read_mzxml(&input, &config)
                .with_context(|| format!("Failed to read {}", input.display()))?
            else {
                bail!("No scans in the input: {}", input.display());
            };

            let stem = input
                .file_stem()
                .context("Input path has no file name")?;
            let output = output_dir.join(format!("{}.mzXML", stem.to_string_lossy()));
            if write_mzxml(&output, &run, &config)? {
                info!("Wrote {} scans to {}", run.scans.len(), output.display());
            } else {
                bail!("Could not write {}", output.display());
            }
        }
    }

    Ok(())
}
