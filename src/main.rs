//! `mzread` prints what a mass spectrometry data file holds.
//!
//! ```bash
//! # Summarize a run
//! mzread summary run.mzML
//!
//! # One line per MS2 header
//! mzread headers run.mzXML --ms-level 2
//! ```
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use mzread::io::{open_file, ScanAccessError, ScanFilter, ScanSource};
use mzread::spectrum::{ScanHeader, ScanPolarity};

#[derive(Parser)]
#[command(name = "mzread")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the run summary of a file
    Summary {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Print one line per scan header
    Headers {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Only list scans of this MS level
        #[arg(short = 'l', long)]
        ms_level: Option<u8>,

        /// Minimum retention time in seconds
        #[arg(long)]
        min_rt: Option<f64>,

        /// Maximum retention time in seconds
        #[arg(long)]
        max_rt: Option<f64>,

        /// Only list scans of this polarity, `+` or `-`
        #[arg(short, long)]
        polarity: Option<ScanPolarity>,
    },
}

fn format_header(header: &ScanHeader) -> String {
    let opt = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into());
    format!(
        "{}\tMS{}\t{}\t{}\t{}\t{}",
        header
            .scan_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into()),
        header
            .ms_level
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".into()),
        header.polarity,
        opt(header.retention_time),
        opt(header.precursor_mz),
        header
            .parent_scan_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into()),
    )
}

fn run(cli: Cli) -> Result<(), ScanAccessError> {
    match cli.command {
        Commands::Summary { path } => {
            let mut reader = open_file(&path)?;
            info!("Reading {} as {:?}", path.display(), reader.as_format());
            println!("{}", reader.summary()?);
        }
        Commands::Headers {
            path,
            ms_level,
            min_rt,
            max_rt,
            polarity,
        } => {
            let mut reader = open_file(&path)?;
            info!("Reading {} as {:?}", path.display(), reader.as_format());
            let filter = ScanFilter {
                min_rt,
                max_rt,
                ms_level,
                polarity,
            };
            println!("scan\tlevel\tpolarity\trt\tprecursor_mz\tparent");
            for header in reader.headers(filter)? {
                match header {
                    Ok(header) => println!("{}", format_header(&header)),
                    Err(e) if e.is_recoverable() => error!("Skipping scan: {e}"),
                    Err(e) => return Err(e),
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
