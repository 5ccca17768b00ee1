use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use tplsentry_evaluator::{EvaluatorConfig, ProcessEvaluator};
use tplsentry_utils::{ChartLayout, FileDiscovery};

use crate::cli::args::ScanArgs;
use crate::config::TplsentryConfig;
use crate::orchestrator::Orchestrator;
use crate::report::{Diagnostic, DiagnosticKind, FileOutcome, FileReport, ScanReport};
use crate::stats::AnalysisStats;

pub async fn run_scan_command(args: ScanArgs) -> Result<()> {
    // Load configuration with precedence: CLI args > env vars > config file
    let env_vars: HashMap<String, String> = std::env::vars().collect();
    let config = TplsentryConfig::load_with_precedence(args.config.clone(), &args, &env_vars)?;

    let target = match &config.scan.target {
        Some(target) => std::fs::canonicalize(target)?,
        None => {
            return Err(anyhow::anyhow!(
                "Target must be specified, or configured in a config file"
            ));
        }
    };

    let (base_dir, files) = collect_files(&target, &config)?;
    println!("📁 Detected template and manifest files ({} files)", files.len());

    let evaluator = Arc::new(ProcessEvaluator::new(evaluator_config(&config, &base_dir)));
    info!("Using evaluator {}", evaluator.path().display());
    let orchestrator = Arc::new(Orchestrator::new(evaluator, base_dir));
    let stats = Arc::new(AnalysisStats::new());
    let verbosity = config.output.verbosity;

    let progress_bar = ProgressBar::new(files.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    progress_bar.set_message("Evaluating templates...");

    let reports = stream::iter(files)
        .map(|file_path| {
            let orchestrator = Arc::clone(&orchestrator);
            let stats = Arc::clone(&stats);
            let progress_bar = progress_bar.clone();

            async move {
                progress_bar.set_message(format!("Analyzing: {}", file_path.display()));
                let outcome = match tokio::fs::read_to_string(&file_path).await {
                    Ok(source) => {
                        orchestrator
                            .process_file(&file_path, &source, &stats)
                            .await
                            .outcome
                    }
                    Err(e) => {
                        stats.record_failed();
                        FileOutcome::Failed(Diagnostic::new(
                            &file_path,
                            DiagnosticKind::Input,
                            format!("Failed to read {}: {}", file_path.display(), e),
                        ))
                    }
                };

                if verbosity > 0 {
                    progress_bar.println(format!("📄 {}: {}", file_path.display(), describe(&outcome)));
                }
                progress_bar.inc(1);
                FileReport {
                    path: file_path,
                    outcome,
                }
            }
        })
        .buffer_unordered(config.evaluator.max_concurrent)
        .collect::<Vec<_>>()
        .await;

    progress_bar.finish_with_message("Analysis completed!");

    let report = ScanReport::new(&target, reports, stats.snapshot());
    for diagnostic in report.diagnostics() {
        print_diagnostic(diagnostic);
    }

    let s = report.stats;
    println!(
        "📊 {} plain ({} parsed), {} templated ({} parsed), {} skipped, {} failed",
        s.plain_files, s.plain_parsed, s.templated_files, s.templated_parsed, s.skipped, s.failed
    );

    if let Some(ref output) = config.output.path {
        match report.save_to_file(output) {
            Ok(()) => println!("📋 Output JSON report: {}", output.display()),
            Err(e) => println!("❌ Failed to output JSON report: {}: {}", output.display(), e),
        }
    }

    stats.log_statistics();
    Ok(())
}

/// The evaluator runs inside the scanned tree.
fn evaluator_config(config: &TplsentryConfig, base_dir: &Path) -> EvaluatorConfig {
    let evaluator = config.to_evaluator_config();
    if base_dir.is_dir() {
        evaluator.with_working_dir(base_dir.to_path_buf())
    } else {
        evaluator
    }
}

/// Files to analyze and the directory that bounds chart-root lookup.
fn collect_files(target: &Path, config: &TplsentryConfig) -> Result<(PathBuf, Vec<PathBuf>)> {
    if target.is_file() {
        // a lone template still needs the chart above it
        let base_dir = target
            .ancestors()
            .last()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        return Ok((base_dir, vec![target.to_path_buf()]));
    }

    let mut files = FileDiscovery::new(target.to_path_buf())
        .with_excludes(config.scan.exclude.clone())
        .get_files()?;
    if config.scan.follow_charts_only {
        files.retain(|file| ChartLayout::find_chart_root(file, target).is_some());
    }
    Ok((target.to_path_buf(), files))
}

fn describe(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Parsed {
            documents,
            templated,
        } => {
            let kind = if *templated { "templated" } else { "plain" };
            format!("parsed {} document(s), {}", documents, kind)
        }
        FileOutcome::Skipped { reason, .. } => format!("skipped ({})", reason),
        FileOutcome::Failed(diagnostic) => format!("failed ({})", diagnostic.message),
    }
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic.range {
        Some(range) => println!(
            "⚠️  {}:{}: {:?}: {}",
            diagnostic.path.display(),
            range,
            diagnostic.kind,
            diagnostic.message
        ),
        None => println!(
            "⚠️  {}: {:?}: {}",
            diagnostic.path.display(),
            diagnostic.kind,
            diagnostic.message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_charts_only() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("web/templates")).unwrap();
        fs::create_dir_all(root.join("manifests")).unwrap();
        fs::write(root.join("web/Chart.yaml"), "name: web\n").unwrap();
        fs::write(root.join("web/templates/pod.yaml"), "kind: Pod\n").unwrap();
        fs::write(root.join("manifests/cm.yaml"), "kind: ConfigMap\n").unwrap();

        let mut config = TplsentryConfig::default();
        let (_, all) = collect_files(root, &config).unwrap();
        assert_eq!(all.len(), 3);

        config.scan.follow_charts_only = true;
        let (base_dir, charted) = collect_files(root, &config).unwrap();
        assert_eq!(base_dir, root.to_path_buf());
        assert_eq!(
            charted,
            vec![root.join("web/Chart.yaml"), root.join("web/templates/pod.yaml")]
        );
    }

    #[test]
    fn test_collect_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("pod.yaml");
        fs::write(&file, "kind: Pod\n").unwrap();

        let (base_dir, files) = collect_files(&file, &TplsentryConfig::default()).unwrap();
        assert_eq!(files, vec![file.clone()]);
        assert!(file.starts_with(&base_dir));
    }

    #[test]
    fn test_evaluator_runs_in_scanned_tree() {
        let dir = TempDir::new().unwrap();
        let config = TplsentryConfig::default();

        let evaluator = evaluator_config(&config, dir.path());
        assert_eq!(evaluator.working_dir, Some(dir.path().to_path_buf()));

        let evaluator = evaluator_config(&config, &dir.path().join("missing"));
        assert_eq!(evaluator.working_dir, None);
    }

    #[test]
    fn test_describe_outcome() {
        let parsed = FileOutcome::Parsed {
            documents: 2,
            templated: true,
        };
        assert_eq!(describe(&parsed), "parsed 2 document(s), templated");

        let skipped = FileOutcome::Skipped {
            reason: "values file".to_string(),
            diagnostic: None,
        };
        assert_eq!(describe(&skipped), "skipped (values file)");
    }
}
