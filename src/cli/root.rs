use anyhow::Result;
use clap::Parser;

use crate::cli::args::{validate_scan_args, Args, Commands, ScanArgs};
use crate::cli::commands::{run_locate_command, run_markers_command, run_scan_command};
use crate::config::TplsentryConfig;

pub struct RootCommand;

impl RootCommand {
    pub async fn execute() -> Result<()> {
        let args = Args::parse();
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(log_filter(args.debug, args.verbosity)),
        )
        .init();

        match &args.command {
            Some(Commands::Markers { file }) => run_markers_command(file),
            Some(Commands::Locate { file, line }) => {
                let scan_args = ScanArgs {
                    target: None,
                    ..ScanArgs::from(&args)
                };
                run_locate_command(file, *line, scan_args).await
            }
            None => {
                let scan_args = ScanArgs::from(&args);

                // Handle config generation mode
                if scan_args.generate_config {
                    println!("{}", TplsentryConfig::generate_default_config());
                    return Ok(());
                }

                println!(
                    r#"
        {{{{ . }}}}
   T P L S E N T R Y
         v{}
"#,
                    env!("CARGO_PKG_VERSION")
                );

                validate_scan_args(&scan_args)?;
                run_scan_command(scan_args).await
            }
        }
    }
}

/// Default log filter when `RUST_LOG` is unset.
fn log_filter(debug: bool, verbosity: u8) -> &'static str {
    if debug {
        return "debug";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(false, 0), "warn");
        assert_eq!(log_filter(false, 1), "info");
        assert_eq!(log_filter(false, 3), "debug");
        assert_eq!(log_filter(true, 0), "debug");
    }
}
