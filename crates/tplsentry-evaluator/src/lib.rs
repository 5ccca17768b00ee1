//! External template evaluator integration for tplsentry.
//!
//! This crate defines the contract between the analysis pipeline and the program
//! that expands template directives, and provides a client that runs that program
//! as a child process with a timeout and a concurrency limit.

mod error;
mod process;
mod request;
pub mod wire;

pub use error::EvaluatorError;
pub use process::ProcessEvaluator;
pub use request::{EvaluationRequest, TemplateEvaluator};
pub use wire::EvaluationResponse;

use std::path::PathBuf;

/// Default executable name, looked up on `PATH`.
pub const DEFAULT_EVALUATOR: &str = "tplsentry-helm-evaluator";

/// Configuration for the process-backed evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Path to the evaluator executable.
    pub path: PathBuf,
    /// Extra arguments passed before any input is written.
    pub args: Vec<String>,
    /// Maximum number of concurrent evaluator processes.
    pub max_concurrent: usize,
    /// Timeout in seconds for each evaluation.
    pub timeout_secs: u64,
    /// Working directory of the evaluator process (inherited when unset).
    pub working_dir: Option<PathBuf>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_EVALUATOR),
            args: Vec::new(),
            max_concurrent: 4,
            timeout_secs: 5,
            working_dir: None,
        }
    }
}

impl EvaluatorConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Set the maximum number of concurrent processes.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.clamp(1, 64);
        self
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}
