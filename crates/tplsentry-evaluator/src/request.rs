use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::EvaluatorError;

/// A template to expand, along with the chart files it may reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRequest {
    /// Path of the template, relative to the chart root when there is one.
    pub path: PathBuf,
    /// Marked template source.
    pub source: String,
    /// Auxiliary inputs keyed by chart-relative name (`values.yaml`, `Chart.yaml`,
    /// `templates/_helpers.tpl`, ...).
    pub values: BTreeMap<String, String>,
}

impl EvaluationRequest {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.values.insert(name.into(), content.into());
        self
    }

    /// Name under which the template is sent to the evaluator.
    pub fn template_name(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

/// Expands template directives.
///
/// Implementations return the expanded text, or an error describing why the
/// template could not be expanded. Markers in the source must pass through
/// untouched.
#[async_trait]
pub trait TemplateEvaluator: Send + Sync {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError>;
}
