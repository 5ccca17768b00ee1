use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tplsentry_core::TextPointer;

/// Position prefix of Go template errors: `template: <name>:<line>[:<col>]:`.
static TEMPLATE_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"template: ([^:\s]+):(\d+)(?::(\d+))?:").expect("position pattern is valid")
});

/// Marks an error raised for a named template the evaluator does not know.
const UNDEFINED_TEMPLATE: &str = "associated with template \"";

/// Errors reported by a template evaluator.
///
/// Positions refer to lines of the marked template that was sent for evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    #[error("Template evaluator not available at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("Template evaluation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Unsupported template construct: {message}")]
    UnsupportedConstruct {
        message: String,
        position: Option<TextPointer>,
    },

    #[error("{message}")]
    Runtime {
        message: String,
        position: Option<TextPointer>,
    },

    #[error("Malformed evaluator output: {0}")]
    Protocol(String),
}

impl EvaluatorError {
    /// Classify an error message returned by the evaluator for `template_name`.
    ///
    /// An explicit `line` wins over a position found in the message text. A position
    /// in the message only counts when it names `template_name`; errors raised inside
    /// an included helper carry no position in the evaluated template.
    pub fn from_message(
        message: impl Into<String>,
        line: Option<usize>,
        column: Option<usize>,
        template_name: &str,
    ) -> Self {
        let message = message.into();
        let position = match line {
            Some(line) if line > 0 => Some(TextPointer::new(line, column.unwrap_or(0))),
            _ => position_in_message(&message, template_name),
        };

        if message.contains(UNDEFINED_TEMPLATE) {
            EvaluatorError::UnsupportedConstruct { message, position }
        } else {
            EvaluatorError::Runtime { message, position }
        }
    }

    /// Where in the evaluated template the error was raised, if known.
    pub fn position(&self) -> Option<TextPointer> {
        match self {
            EvaluatorError::UnsupportedConstruct { position, .. }
            | EvaluatorError::Runtime { position, .. } => *position,
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, EvaluatorError::Unavailable { .. })
    }
}

fn position_in_message(message: &str, template_name: &str) -> Option<TextPointer> {
    let captures = TEMPLATE_POSITION.captures(message)?;
    if &captures[1] != template_name {
        return None;
    }
    let line = captures[2].parse::<usize>().ok().filter(|line| *line > 0)?;
    let column = captures
        .get(3)
        .and_then(|column| column.as_str().parse::<usize>().ok())
        .unwrap_or(0);
    Some(TextPointer::new(line, column))
}
