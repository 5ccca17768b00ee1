use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tplsentry_core::{compute_shifted_location, split_lines, TextRange};
use tplsentry_evaluator::ProcessEvaluator;

use crate::cli::args::ScanArgs;
use crate::config::TplsentryConfig;
use crate::orchestrator::Orchestrator;
use crate::report::FileOutcome;
use crate::stats::AnalysisStats;

/// Evaluate one template and report which of its lines produced `line` of the
/// cleaned output.
pub async fn run_locate_command(file: &Path, line: usize, args: ScanArgs) -> Result<()> {
    let env_vars: HashMap<String, String> = std::env::vars().collect();
    let config = TplsentryConfig::load_with_precedence(args.config.clone(), &args, &env_vars)?;

    let file = std::fs::canonicalize(file)
        .with_context(|| format!("Failed to resolve {}", file.display()))?;
    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let evaluator = Arc::new(ProcessEvaluator::new(config.to_evaluator_config()));
    let base_dir = file.ancestors().last().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
    let orchestrator = Orchestrator::new(evaluator, base_dir);
    let stats = AnalysisStats::new();

    let analysis = orchestrator.process_file(&file, &source, &stats).await;
    if let Some(diagnostic) = analysis.outcome.diagnostic() {
        eprintln!("⚠️  {:?}: {}", diagnostic.kind, diagnostic.message);
    }
    if !matches!(analysis.outcome, FileOutcome::Parsed { .. }) {
        return Err(anyhow::anyhow!(
            "{} could not be evaluated, no line mapping available",
            file.display()
        ));
    }

    let range = compute_shifted_location(&analysis.context, TextRange::of(line, 0, line, 0))?;
    if analysis.context.is_templated() {
        println!("expanded line {} -> template {}", line, range);
    } else {
        println!("{} is not templated, line {} maps to itself", file.display(), line);
    }

    print!("{}", render_lines(&source, range));
    Ok(())
}

/// Original lines covered by `range`, prefixed with their numbers.
fn render_lines(source: &str, range: TextRange) -> String {
    split_lines(source)
        .iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.content))
        .filter(|(number, _)| *number >= range.start.line && *number <= range.end.line)
        .map(|(number, content)| format!("{:>5} | {}\n", number, content))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lines() {
        let source = "kind: Pod\n{{- if .Values.x }}\nspec: {}\n{{- end }}\n";
        assert_eq!(
            render_lines(source, TextRange::of(2, 0, 3, 8)),
            "    2 | {{- if .Values.x }}\n    3 | spec: {}\n"
        );
    }
}
