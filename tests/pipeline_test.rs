use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_yaml::Value;
use tempfile::TempDir;

use tplsentry::orchestrator::Orchestrator;
use tplsentry::report::{DiagnosticKind, FileOutcome};
use tplsentry::stats::AnalysisStats;
use tplsentry::{compute_shifted_location, TextRange};
use tplsentry_evaluator::{
    EvaluationRequest, EvaluatorConfig, EvaluatorError, ProcessEvaluator, TemplateEvaluator,
};

const TEMPLATE: &[&str] = &[
    "apiVersion: v1",
    "kind: ConfigMap",
    "metadata:",
    "  name: {{ .Release.Name }}",
    "  labels:",
    "    app: web",
    "data:",
    "  mode: {{ .Values.mode }}",
    "  flags: {{ include \"flags\"",
    "    (dict",
    "      \"a\" 1",
    "      \"b\" 2)",
    "    }}",
    "{{- if .Values.extra }}",
    "{{- end }}",
];

/// Stands in for the real evaluator: checks what it was sent and answers with a
/// fixed expansion of [`TEMPLATE`].
struct ConfigMapEvaluator;

#[async_trait]
impl TemplateEvaluator for ConfigMapEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
        assert_eq!(request.template_name(), "templates/cm.yaml");
        assert!(request.values.contains_key("values.yaml"));
        assert!(request.source.contains("    }} #9:13"));

        Ok([
            "apiVersion: v1 #1",
            "kind: ConfigMap #2",
            "metadata: #3",
            "  name: demo #4",
            "  labels: #5",
            "    app: web #6",
            "data: #7",
            "  mode: fast #8",
            "  flags: --a=1 --b=2 #9:13",
            " #14",
            " #15",
        ]
        .join("\n"))
    }
}

fn chart() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("templates")).unwrap();
    fs::write(dir.path().join("Chart.yaml"), "apiVersion: v2\nname: demo\n").unwrap();
    fs::write(dir.path().join("values.yaml"), "mode: fast\nextra: false\n").unwrap();
    fs::write(dir.path().join("templates/cm.yaml"), TEMPLATE.join("\n")).unwrap();
    fs::write(dir.path().join("templates/plain.yaml"), "kind: Namespace\nmetadata:\n  name: demo\n").unwrap();
    dir
}

async fn analyze(
    evaluator: Arc<dyn TemplateEvaluator>,
    root: &Path,
    file: &str,
    stats: &AnalysisStats,
) -> tplsentry::orchestrator::FileAnalysis {
    let path = root.join(file);
    let source = fs::read_to_string(&path).unwrap();
    Orchestrator::new(evaluator, root)
        .process_file(&path, &source, stats)
        .await
}

#[tokio::test]
async fn test_findings_map_back_to_template_lines() {
    let dir = chart();
    let stats = AnalysisStats::new();

    let analysis = analyze(Arc::new(ConfigMapEvaluator), dir.path(), "templates/cm.yaml", &stats).await;

    assert_eq!(
        analysis.outcome,
        FileOutcome::Parsed {
            documents: 1,
            templated: true
        }
    );
    assert!(analysis.context.is_templated());
    assert_eq!(
        analysis.documents[0]["data"]["flags"],
        Value::String("--a=1 --b=2".to_string())
    );

    // the collapsed multi-line action covers all of its original lines
    let flags = compute_shifted_location(&analysis.context, TextRange::of(9, 2, 9, 7)).unwrap();
    assert_eq!(flags, TextRange::of(9, 0, 13, TEMPLATE[12].len()));

    let labels = compute_shifted_location(&analysis.context, TextRange::of(4, 2, 8, 6)).unwrap();
    assert_eq!(labels, TextRange::of(4, 0, 8, TEMPLATE[7].len()));

    // lines 14 and 15 only left residue behind
    let table = analysis.context.shift_table().unwrap();
    assert_eq!(table.expanded_line_count(), 9);
    assert!(compute_shifted_location(&analysis.context, TextRange::of(10, 0, 10, 0)).is_err());

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.templated_files, 1);
    assert_eq!(snapshot.templated_parsed, 1);
}

#[tokio::test]
async fn test_plain_manifest_positions_are_unchanged() {
    let dir = chart();
    let stats = AnalysisStats::new();

    let analysis = analyze(Arc::new(ConfigMapEvaluator), dir.path(), "templates/plain.yaml", &stats).await;

    assert!(!analysis.context.is_templated());
    assert_eq!(analysis.documents.len(), 1);
    let range = TextRange::of(3, 2, 3, 12);
    assert_eq!(compute_shifted_location(&analysis.context, range).unwrap(), range);
    assert_eq!(stats.snapshot().plain_parsed, 1);
}

#[tokio::test]
async fn test_missing_evaluator_degrades_to_skipped() {
    let dir = chart();
    let stats = AnalysisStats::new();
    let evaluator = Arc::new(ProcessEvaluator::new(EvaluatorConfig::new(
        dir.path().join("no-such-evaluator"),
    )));

    let analysis = analyze(evaluator, dir.path(), "templates/cm.yaml", &stats).await;

    match &analysis.outcome {
        FileOutcome::Skipped {
            diagnostic: Some(diagnostic),
            ..
        } => assert_eq!(diagnostic.kind, DiagnosticKind::EvaluatorUnavailable),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(analysis.documents.is_empty());
    assert!(!analysis.context.is_templated());
    assert_eq!(stats.snapshot().skipped, 1);
}
