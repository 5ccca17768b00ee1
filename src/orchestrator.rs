//! Per-file pipeline: probe, mark, evaluate, clean, parse.
//!
//! The orchestrator owns nothing per file; each call builds a fresh
//! [`FileContext`], attaches the Shift Table once cleaning is done, and returns it
//! with the parsed documents so that later consumers can map findings back to the
//! original template through [`tplsentry_core::compute_shifted_location`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};
use serde_yaml::Value;
use tplsentry_core::{shift_point, shift_range, FileContext, ShiftTable, TextPointer, TextRange};
use tplsentry_evaluator::{EvaluationRequest, EvaluatorError, TemplateEvaluator};
use tplsentry_template::{add_line_markers, clean_evaluated, contains_template_directives};
use tplsentry_utils::{relative_name, ChartFileKind, ChartLayout};

use crate::parser::{StructuralParser, SyntaxError, YamlParser};
use crate::report::{Diagnostic, DiagnosticKind, FileOutcome};
use crate::stats::AnalysisStats;

/// Result of analyzing one file.
#[derive(Debug)]
pub struct FileAnalysis {
    pub context: FileContext,
    pub documents: Vec<Value>,
    pub outcome: FileOutcome,
}

impl FileAnalysis {
    fn new(context: FileContext, outcome: FileOutcome) -> Self {
        Self {
            context,
            documents: Vec::new(),
            outcome,
        }
    }
}

pub struct Orchestrator {
    evaluator: Arc<dyn TemplateEvaluator>,
    parser: Arc<dyn StructuralParser>,
    base_dir: PathBuf,
    unavailable_logged: AtomicBool,
}

impl Orchestrator {
    /// `base_dir` bounds the search for chart roots.
    pub fn new(evaluator: Arc<dyn TemplateEvaluator>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            evaluator,
            parser: Arc::new(YamlParser),
            base_dir: base_dir.into(),
            unavailable_logged: AtomicBool::new(false),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn StructuralParser>) -> Self {
        self.parser = parser;
        self
    }

    pub async fn process_file(&self, path: &Path, source: &str, stats: &AnalysisStats) -> FileAnalysis {
        let context = FileContext::new(path);
        let chart_root = ChartLayout::find_chart_root(path, &self.base_dir);

        let kind = ChartLayout::classify(path, chart_root.as_deref());
        if kind.is_evaluation_input() {
            debug!("{:?} file detected, skipping parsing {}", kind, path.display());
            stats.record_skipped();
            return FileAnalysis::new(
                context,
                FileOutcome::Skipped {
                    reason: skip_reason(kind).to_string(),
                    diagnostic: None,
                },
            );
        }

        if !contains_template_directives(source) {
            stats.record_plain();
            let analysis = self.parse(context, source, false);
            if !analysis.outcome.is_failed() {
                stats.record_plain_parsed();
            }
            return analysis;
        }

        debug!("Template content detected in file '{}'", path.display());
        stats.record_templated();
        let analysis = self.process_templated(context, source, chart_root.as_deref()).await;
        match analysis.outcome {
            FileOutcome::Parsed { .. } => stats.record_templated_parsed(),
            FileOutcome::Skipped { .. } => stats.record_skipped(),
            FileOutcome::Failed(_) => stats.record_failed(),
        }
        analysis
    }

    async fn process_templated(
        &self,
        mut context: FileContext,
        source: &str,
        chart_root: Option<&Path>,
    ) -> FileAnalysis {
        let marked = add_line_markers(source);
        let partial = ShiftTable::from_marked_text(&marked.text, marked.original.clone());

        let values = match ChartLayout::auxiliary_files(context.path(), chart_root) {
            Ok(values) => values,
            Err(e) => {
                let diagnostic = Diagnostic::new(
                    context.path(),
                    DiagnosticKind::Input,
                    evaluation_message(context.path(), &e.to_string()),
                );
                return FileAnalysis::new(context, FileOutcome::Failed(diagnostic));
            }
        };

        let name = match chart_root {
            Some(root) => relative_name(root, context.path()),
            None => context.file_name(),
        };
        let request = EvaluationRequest {
            path: PathBuf::from(name),
            source: marked.text,
            values,
        };

        let evaluated = match self.evaluator.evaluate(&request).await {
            Ok(evaluated) => evaluated,
            Err(e) => {
                let outcome = self.evaluation_failure(context.path(), &partial, e);
                return FileAnalysis::new(context, outcome);
            }
        };

        let cleaned = clean_evaluated(&evaluated, &marked.original);
        let blank = cleaned.is_blank();
        let text = cleaned.text;
        context.set_shift_table(cleaned.table);

        if blank {
            debug!(
                "Blank evaluated file, skipping processing of template {}",
                context.path().display()
            );
            return FileAnalysis::new(
                context,
                FileOutcome::Parsed {
                    documents: 0,
                    templated: true,
                },
            );
        }

        self.parse(context, &text, true)
    }

    fn parse(&self, context: FileContext, text: &str, templated: bool) -> FileAnalysis {
        match self.parser.parse(text) {
            Ok(documents) => FileAnalysis {
                outcome: FileOutcome::Parsed {
                    documents: documents.len(),
                    templated,
                },
                documents,
                context,
            },
            Err(e) => {
                let diagnostic = syntax_diagnostic(&context, e);
                FileAnalysis::new(context, FileOutcome::Failed(diagnostic))
            }
        }
    }

    fn evaluation_failure(&self, path: &Path, partial: &ShiftTable, error: EvaluatorError) -> FileOutcome {
        let range = error
            .position()
            .and_then(|position| shift_evaluator_position(partial, position));

        match error {
            EvaluatorError::Unavailable { .. } => {
                if !self.unavailable_logged.swap(true, Ordering::Relaxed) {
                    warn!("{}; templated files will not be analyzed", error);
                }
                debug!("Template evaluator is not available, skipping processing of {}", path.display());
                FileOutcome::Skipped {
                    reason: "template evaluator unavailable".to_string(),
                    diagnostic: Some(Diagnostic::new(
                        path,
                        DiagnosticKind::EvaluatorUnavailable,
                        error.to_string(),
                    )),
                }
            }
            EvaluatorError::UnsupportedConstruct { ref message, .. } => {
                debug!(
                    "Template {} requires a named template that is missing; skipping processing: {}",
                    path.display(),
                    message
                );
                FileOutcome::Skipped {
                    reason: "unsupported template construct".to_string(),
                    diagnostic: Some(
                        Diagnostic::new(path, DiagnosticKind::UnsupportedConstruct, message.clone())
                            .with_range(range),
                    ),
                }
            }
            EvaluatorError::Runtime { .. } | EvaluatorError::Timeout { .. } | EvaluatorError::Protocol(_) => {
                let message = evaluation_message(path, &format!("Template evaluation failed: {}", error));
                debug!("{}", message);
                FileOutcome::Failed(
                    Diagnostic::new(path, DiagnosticKind::TemplateRuntime, message).with_range(range),
                )
            }
        }
    }
}

fn skip_reason(kind: ChartFileKind) -> &'static str {
    match kind {
        ChartFileKind::Values => "chart values file",
        ChartFileKind::Metadata => "chart metadata file",
        ChartFileKind::Helper => "template helper file",
        ChartFileKind::Template => "template",
    }
}

fn evaluation_message(path: &Path, cause: &str) -> String {
    format!("Failed to evaluate template file {}: {}", path.display(), cause)
}

/// Evaluator positions refer to the marked source; they are placed through the
/// markers read from it. Positions past the end are pulled back in bounds.
fn shift_evaluator_position(partial: &ShiftTable, position: TextPointer) -> Option<TextRange> {
    let line = position.line.clamp(1, partial.expanded_line_count().max(1));
    match shift_range(partial, TextRange::point(TextPointer::new(line, position.line_offset))) {
        Ok(range) => Some(range),
        Err(e) => {
            warn!("Could not place evaluator error: {}", e);
            None
        }
    }
}

fn syntax_diagnostic(context: &FileContext, error: SyntaxError) -> Diagnostic {
    let range = match error.position {
        Some(position) => match shift_point(context, position) {
            Ok(shifted) => {
                if context.is_templated() {
                    debug!(
                        "Shifting syntax error of {} from {} to {}",
                        context.path().display(),
                        position,
                        shifted
                    );
                }
                Some(TextRange::point(shifted))
            }
            Err(e) => {
                error!(
                    "Syntax error position of {} is outside of the evaluated document: {}",
                    context.path().display(),
                    e
                );
                None
            }
        },
        None => None,
    };

    Diagnostic::new(context.path(), DiagnosticKind::Syntax, error.message).with_range(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tplsentry_core::LineMarker;

    /// Evaluator returning a fixed answer and remembering what it was asked.
    struct CannedEvaluator {
        answer: Result<String, EvaluatorError>,
        requests: Mutex<Vec<EvaluationRequest>>,
    }

    impl CannedEvaluator {
        fn new(answer: Result<String, EvaluatorError>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TemplateEvaluator for CannedEvaluator {
        async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
            self.requests.lock().unwrap().push(request.clone());
            self.answer.clone()
        }
    }

    fn chart(dir: &Path) -> PathBuf {
        let root = dir.join("app");
        fs::create_dir_all(root.join("templates")).unwrap();
        fs::write(root.join("Chart.yaml"), "name: app\nversion: 0.1.0\n").unwrap();
        fs::write(root.join("values.yaml"), "replicas: 2\n").unwrap();
        root
    }

    fn run(orchestrator: &Orchestrator, path: &Path, source: &str, stats: &AnalysisStats) -> FileAnalysis {
        tokio_test::block_on(orchestrator.process_file(path, source, stats))
    }

    #[test]
    fn test_plain_file_is_parsed_without_shift_table() {
        let evaluator = CannedEvaluator::new(Ok(String::new()));
        let orchestrator = Orchestrator::new(evaluator.clone(), "/");
        let stats = AnalysisStats::new();

        let analysis = run(&orchestrator, Path::new("/plain/pod.yaml"), "kind: Pod\n", &stats);

        assert_eq!(
            analysis.outcome,
            FileOutcome::Parsed {
                documents: 1,
                templated: false
            }
        );
        assert!(!analysis.context.is_templated());
        assert!(evaluator.requests.lock().unwrap().is_empty());
        assert_eq!(stats.snapshot().plain_parsed, 1);
    }

    #[test]
    fn test_chart_inputs_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        let orchestrator = Orchestrator::new(CannedEvaluator::new(Ok(String::new())), temp_dir.path());
        let stats = AnalysisStats::new();

        for file in ["values.yaml", "Chart.yaml", "templates/_helpers.tpl"] {
            let analysis = run(&orchestrator, &root.join(file), "a: {{ .Values.a }}", &stats);
            assert!(matches!(analysis.outcome, FileOutcome::Skipped { .. }), "{}", file);
        }
        assert_eq!(stats.snapshot().skipped, 3);
    }

    #[test]
    fn test_templated_file_gets_shift_table() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        fs::write(root.join("templates/_helpers.tpl"), "{{- define \"x\" }}x{{ end }}").unwrap();
        let evaluator = CannedEvaluator::new(Ok("kind: Pod #1\n #2\nreplicas: 2 #3\n".to_string()));
        let orchestrator = Orchestrator::new(evaluator.clone(), temp_dir.path());
        let stats = AnalysisStats::new();
        let source = "kind: Pod\n{{- if true }}\nreplicas: {{ .Values.replicas }}\n";

        let analysis = run(&orchestrator, &root.join("templates/pod.yaml"), source, &stats);

        assert_eq!(
            analysis.outcome,
            FileOutcome::Parsed {
                documents: 1,
                templated: true
            }
        );
        let table = analysis.context.shift_table().unwrap();
        assert_eq!(table.marker(2), Some(LineMarker::Single(3)));

        let requests = evaluator.requests.lock().unwrap();
        assert_eq!(requests[0].path, PathBuf::from("templates/pod.yaml"));
        assert!(requests[0].source.starts_with("kind: Pod #1\n"));
        let names: Vec<&str> = requests[0].values.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Chart.yaml", "templates/_helpers.tpl", "values.yaml"]);
        assert_eq!(stats.snapshot().templated_parsed, 1);
    }

    #[test]
    fn test_missing_values_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        fs::remove_file(root.join("values.yaml")).unwrap();
        let orchestrator = Orchestrator::new(CannedEvaluator::new(Ok(String::new())), temp_dir.path());
        let stats = AnalysisStats::new();

        let analysis = run(&orchestrator, &root.join("templates/pod.yaml"), "a: {{ 1 }}", &stats);

        let diagnostic = analysis.outcome.diagnostic().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::Input);
        assert!(diagnostic.message.ends_with("Failed to find values file"));
        assert_eq!(stats.snapshot().failed, 1);
    }

    #[test]
    fn test_blank_evaluation_is_an_empty_result() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        let evaluator = CannedEvaluator::new(Ok(" #1\n #2\n".to_string()));
        let orchestrator = Orchestrator::new(evaluator, temp_dir.path());

        let analysis = run(
            &orchestrator,
            &root.join("templates/cm.yaml"),
            "{{- if false }}\nkind: ConfigMap\n{{- end }}",
            &AnalysisStats::new(),
        );

        assert_eq!(
            analysis.outcome,
            FileOutcome::Parsed {
                documents: 0,
                templated: true
            }
        );
        assert!(analysis.documents.is_empty());
    }

    #[test]
    fn test_runtime_error_is_shifted_through_markers() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        // line 3 of the marked source closes the action opened on line 2
        let evaluator = CannedEvaluator::new(Err(EvaluatorError::from_message(
            "template: templates/pod.yaml:3:2: executing \"templates/pod.yaml\" at <fail>: boom",
            None,
            None,
            "templates/pod.yaml",
        )));
        let orchestrator = Orchestrator::new(evaluator, temp_dir.path());
        let source = "kind: Pod\nname: {{ fail\n\"boom\" }}\nspec: {}";

        let analysis = run(&orchestrator, &root.join("templates/pod.yaml"), source, &AnalysisStats::new());

        let diagnostic = analysis.outcome.diagnostic().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::TemplateRuntime);
        assert_eq!(diagnostic.range, Some(TextRange::of(2, 0, 3, 9)));
        assert!(!analysis.context.is_templated());
    }

    #[test]
    fn test_error_inside_helper_is_not_placed_in_template() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        fs::write(root.join("templates/_helpers.tpl"), "{{- define \"app.name\" -}}\n{{ .Values.name.x }}\n{{- end }}\n").unwrap();
        let evaluator = CannedEvaluator::new(Err(EvaluatorError::from_message(
            "template: app/templates/_helpers.tpl:2:3: executing \"app.name\" at <.Values.name.x>: nil pointer",
            None,
            None,
            "templates/pod.yaml",
        )));
        let orchestrator = Orchestrator::new(evaluator, temp_dir.path());
        let source = "kind: Pod\nname: ok\nlabel: {{ include \"app.name\" . }}\n";

        let analysis = run(&orchestrator, &root.join("templates/pod.yaml"), source, &AnalysisStats::new());

        let diagnostic = analysis.outcome.diagnostic().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::TemplateRuntime);
        assert_eq!(diagnostic.range, None);
    }

    #[test]
    fn test_syntax_error_in_templated_file_is_shifted() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        let evaluator = CannedEvaluator::new(Ok(
            "kind: Pod #1\n #2\nmetadata: #3\n  labels: [a, b #4\n #5\n #6".to_string(),
        ));
        let orchestrator = Orchestrator::new(evaluator, temp_dir.path());
        let source = "kind: Pod\n{{- if .Values.meta }}\nmetadata:\n  labels: [a, b\n{{- end }}\n";

        let analysis = run(&orchestrator, &root.join("templates/pod.yaml"), source, &AnalysisStats::new());

        let diagnostic = analysis.outcome.diagnostic().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::Syntax);
        assert!(analysis.context.is_templated());
        assert!(diagnostic.range.is_some());
        assert!(!diagnostic.message.contains(" at line "));
        assert!(!diagnostic.message.contains("column"));
    }

    #[test]
    fn test_unavailable_evaluator_degrades_every_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        let evaluator = CannedEvaluator::new(Err(EvaluatorError::Unavailable {
            path: PathBuf::from("missing-evaluator"),
            reason: "No such file or directory".to_string(),
        }));
        let orchestrator = Orchestrator::new(evaluator, temp_dir.path());
        let stats = AnalysisStats::new();

        for name in ["a.yaml", "b.yaml"] {
            let analysis = run(&orchestrator, &root.join("templates").join(name), "a: {{ 1 }}", &stats);
            let diagnostic = analysis.outcome.diagnostic().unwrap();
            assert_eq!(diagnostic.kind, DiagnosticKind::EvaluatorUnavailable);
            assert!(analysis.documents.is_empty());
        }
        assert!(orchestrator.unavailable_logged.load(Ordering::Relaxed));
        assert_eq!(stats.snapshot().skipped, 2);
        assert_eq!(stats.snapshot().failed, 0);
    }

    #[test]
    fn test_unsupported_construct_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = chart(temp_dir.path());
        let evaluator = CannedEvaluator::new(Err(EvaluatorError::from_message(
            "template: no template \"app.labels\" associated with template \"aggregatingTemplate\"",
            None,
            None,
            "templates/pod.yaml",
        )));
        let orchestrator = Orchestrator::new(evaluator, temp_dir.path());

        let analysis = run(
            &orchestrator,
            &root.join("templates/pod.yaml"),
            "labels: {{ include \"app.labels\" . }}",
            &AnalysisStats::new(),
        );

        assert!(matches!(analysis.outcome, FileOutcome::Skipped { .. }));
        assert_eq!(
            analysis.outcome.diagnostic().map(|d| d.kind),
            Some(DiagnosticKind::UnsupportedConstruct)
        );
    }

    #[test]
    fn test_syntax_error_in_plain_file_is_not_shifted() {
        let orchestrator = Orchestrator::new(CannedEvaluator::new(Ok(String::new())), "/");

        let analysis = run(
            &orchestrator,
            Path::new("/plain/bad.yaml"),
            "a:\n  b: 1\n c: 2\n",
            &AnalysisStats::new(),
        );

        let diagnostic = analysis.outcome.diagnostic().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::Syntax);
        assert_eq!(diagnostic.range.map(|r| r.start.line), Some(3));
    }
}
