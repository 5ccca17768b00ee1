use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None
)]
pub struct Args {
    /// Chart directory or single template file to analyze
    pub target: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the template evaluator executable
    #[arg(long, global = true)]
    pub evaluator: Option<PathBuf>,

    /// Per-file evaluation timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Maximum concurrent evaluator processes (max 64)
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only analyze files that live inside a chart
    #[arg(long)]
    pub charts_only: bool,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    pub debug: bool,

    #[arg(long)]
    pub generate_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a template with its line-origin markers, as sent to the evaluator
    Markers {
        file: PathBuf,
    },
    /// Map a line of the evaluated output back to the template source
    Locate {
        file: PathBuf,

        /// 1-based line in the cleaned evaluated output
        line: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ScanArgs {
    pub target: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub evaluator: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub output: Option<PathBuf>,
    pub charts_only: bool,
    pub verbosity: u8,
    pub generate_config: bool,
}

impl From<&Args> for ScanArgs {
    fn from(args: &Args) -> Self {
        ScanArgs {
            target: args.target.clone(),
            config: args.config.clone(),
            evaluator: args.evaluator.clone(),
            timeout_secs: args.timeout_secs,
            max_concurrent: args.max_concurrent,
            output: args.output.clone(),
            charts_only: args.charts_only,
            verbosity: args.verbosity,
            generate_config: args.generate_config,
        }
    }
}

pub fn validate_scan_args(args: &ScanArgs) -> Result<()> {
    if let Some(output) = &args.output {
        if output.is_dir() {
            return Err(anyhow::anyhow!(
                "Output path {} is a directory, expected a file",
                output.display()
            ));
        }
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(anyhow::anyhow!(
                    "Output directory does not exist: {}",
                    parent.display()
                ));
            }
        }
    }

    Ok(())
}
