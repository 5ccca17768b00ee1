//! Per-file outcomes and the JSON scan report.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tplsentry_core::TextRange;

use crate::stats::StatsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    EvaluatorUnavailable,
    UnsupportedConstruct,
    TemplateRuntime,
    Syntax,
    Input,
}

/// A problem found while analyzing one file. `range` is in original coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TextRange>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<PathBuf>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            range: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_range(mut self, range: Option<TextRange>) -> Self {
        self.range = range;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Structural result available; `documents` may be zero.
    Parsed { documents: usize, templated: bool },
    /// Not analyzed, or degraded to an empty result.
    Skipped {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diagnostic: Option<Diagnostic>,
    },
    /// File-level failure.
    Failed(Diagnostic),
}

impl FileOutcome {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            FileOutcome::Parsed { .. } => None,
            FileOutcome::Skipped { diagnostic, .. } => diagnostic.as_ref(),
            FileOutcome::Failed(diagnostic) => Some(diagnostic),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub version: String,
    pub target: PathBuf,
    pub files: Vec<FileReport>,
    pub stats: StatsSnapshot,
}

impl ScanReport {
    pub fn new(target: impl Into<PathBuf>, mut files: Vec<FileReport>, stats: StatsSnapshot) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            target: target.into(),
            files,
            stats,
        }
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.files.iter().filter_map(|file| file.outcome.diagnostic())
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|file| file.outcome.is_failed()).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
