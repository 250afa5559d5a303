//! pagecrypt inspector
//!
//! Reads encrypted tablespace files and redo logs without any key material
//! and reports what their plaintext headers say.
//!
//! Usage:
//!   pagecrypt-inspect info ibdata1 --offset 10390
//!   pagecrypt-inspect pages t1.ibd --page-size 16384 --summary
//!   pagecrypt-inspect log ib_logfile0 --json

use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use pagecrypt_inspect::{PageSummary, inspect_info, inspect_log, inspect_pages, read_input};
use pagecrypt_types::layout::DEFAULT_PAGE_SIZE;
use serde::Serialize;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pagecrypt-inspect")]
#[command(about = "Inspect encrypted tablespaces and redo logs without keys")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse an encryption info blob header
    Info {
        file: PathBuf,

        /// Byte offset of the blob in the file
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },
    /// Classify every page of a tablespace file
    Pages {
        file: PathBuf,

        /// Physical page size
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,

        /// Print per-type counts only
        #[arg(short, long)]
        summary: bool,
    },
    /// Read the block headers of a redo log file
    Log { file: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match args.command {
        Command::Info { file, offset } => {
            let bytes = read_input(&file)?;
            let report = inspect_info(&bytes, offset)?;
            if args.json {
                print_json(&report)?;
            } else {
                println!("{report}");
            }
        }
        Command::Pages {
            file,
            page_size,
            summary,
        } => {
            let bytes = read_input(&file)?;
            let reports = inspect_pages(&bytes, page_size)?;
            info!("Inspected {} pages of {:?}", reports.len(), file);
            if summary {
                let summary = PageSummary::from_reports(&reports);
                if args.json {
                    print_json(&summary)?;
                } else {
                    print!("{summary}");
                }
            } else if args.json {
                print_json(&reports)?;
            } else {
                for report in &reports {
                    println!("{report}");
                }
            }
        }
        Command::Log { file } => {
            let bytes = read_input(&file)?;
            let reports = inspect_log(&bytes)?;
            info!("Inspected {} log blocks of {:?}", reports.len(), file);
            if args.json {
                print_json(&reports)?;
            } else {
                for report in &reports {
                    println!("{report}");
                }
            }
        }
    }
    Ok(())
}
