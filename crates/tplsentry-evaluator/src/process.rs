//! Evaluator backed by an external executable.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::EvaluatorError;
use crate::request::{EvaluationRequest, TemplateEvaluator};
use crate::wire::{decode_response, encode_request};
use crate::EvaluatorConfig;

/// Runs one evaluator process per template, with a cap on how many run at once.
///
/// Each call is bounded by the configured timeout; a process still running when
/// the timeout fires is killed. Failed calls are not retried.
pub struct ProcessEvaluator {
    path: PathBuf,
    args: Vec<String>,
    timeout_secs: u64,
    semaphore: Arc<Semaphore>,
    working_dir: Option<PathBuf>,
}

impl ProcessEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            path: config.path,
            args: config.args,
            timeout_secs: config.timeout_secs,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            working_dir: config.working_dir,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Number of evaluator processes that may still be started right now.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn run_process(&self, input: Vec<u8>, template_name: &str) -> Result<String, EvaluatorError> {
        let mut cmd = Command::new(&self.path);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        debug!("Spawning template evaluator: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| EvaluatorError::Unavailable {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // an evaluator may answer before reading everything, its output still counts
            if let Err(e) = stdin.write_all(&input).await {
                warn!("Failed to write template to evaluator stdin: {}", e);
            } else if let Err(e) = stdin.flush().await {
                warn!("Failed to flush evaluator stdin: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EvaluatorError::Protocol(format!("failed to read evaluator output: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("Template evaluator stderr: {}", stderr.trim_end());
        }

        if !output.status.success() && output.stdout.is_empty() {
            return Err(EvaluatorError::Protocol(format!(
                "evaluator exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim_end()
            )));
        }

        decode_response(&output.stdout)?.into_result(template_name)
    }
}

#[async_trait]
impl TemplateEvaluator for ProcessEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
        let input = encode_request(request)?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EvaluatorError::Unavailable {
                path: self.path.clone(),
                reason: "evaluator pool is closed".to_string(),
            })?;

        let template_name = request.template_name();
        debug!(
            "Evaluating {} with {} auxiliary files",
            template_name,
            request.values.len()
        );

        timeout(
            Duration::from_secs(self.timeout_secs),
            self.run_process(input, &template_name),
        )
            .await
            .map_err(|_| EvaluatorError::Timeout {
                timeout_secs: self.timeout_secs,
            })?
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;
    use tplsentry_core::TextPointer;

    /// Evaluator that runs `script` through `/bin/sh`.
    fn shell_evaluator(dir: &Path, script: &str, timeout_secs: u64) -> ProcessEvaluator {
        let script_path = dir.join("evaluator.sh");
        std::fs::write(&script_path, script).unwrap();
        ProcessEvaluator::new(
            EvaluatorConfig::new(PathBuf::from("/bin/sh"))
                .with_args(vec![script_path.to_string_lossy().to_string()])
                .with_timeout(timeout_secs),
        )
    }

    fn response_file(dir: &Path, json: &str) -> String {
        let path = dir.join("response.json");
        std::fs::write(&path, json).unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn test_returns_expanded_template() {
        let dir = TempDir::new().unwrap();
        let response = response_file(dir.path(), r#"{"template":"name: web #1\n"}"#);
        let evaluator = shell_evaluator(
            dir.path(),
            &format!("cat > /dev/null\ncat '{}'\n", response),
            10,
        );

        let result = evaluator
            .evaluate(&EvaluationRequest::new("pod.yaml", "name: {{ .Values.name }} #1\n"))
            .await;

        assert_eq!(result, Ok("name: web #1\n".to_string()));
    }

    #[tokio::test]
    async fn test_reports_runtime_error_with_position() {
        let dir = TempDir::new().unwrap();
        let response = response_file(
            dir.path(),
            r#"{"template":"","error":"template: pod.yaml:3:9: executing \"pod.yaml\" at <fail \"boom\">: error calling fail: boom"}"#,
        );
        let evaluator = shell_evaluator(
            dir.path(),
            &format!("cat > /dev/null\ncat '{}'\n", response),
            10,
        );

        let error = evaluator
            .evaluate(&EvaluationRequest::new("pod.yaml", "a: 1 #1\n"))
            .await
            .unwrap_err();

        assert!(matches!(error, EvaluatorError::Runtime { .. }));
        assert_eq!(error.position(), Some(TextPointer::new(3, 9)));
    }

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let evaluator = ProcessEvaluator::new(EvaluatorConfig::new(PathBuf::from(
            "/nonexistent/tplsentry-helm-evaluator",
        )));

        let error = evaluator
            .evaluate(&EvaluationRequest::new("pod.yaml", "a: 1"))
            .await
            .unwrap_err();

        assert!(error.is_unavailable());
    }

    #[tokio::test]
    async fn test_slow_evaluator_times_out() {
        let dir = TempDir::new().unwrap();
        let evaluator = shell_evaluator(dir.path(), "exec sleep 30\n", 1);
        let permits = evaluator.available_permits();

        let error = evaluator
            .evaluate(&EvaluationRequest::new("pod.yaml", "a: 1"))
            .await
            .unwrap_err();

        assert_eq!(error, EvaluatorError::Timeout { timeout_secs: 1 });
        assert_eq!(permits, 4);
        assert_eq!(evaluator.available_permits(), permits);
    }

    #[tokio::test]
    async fn test_failing_process_without_output_is_protocol_error() {
        let dir = TempDir::new().unwrap();
        let evaluator = shell_evaluator(dir.path(), "echo crashed >&2\nexit 3\n", 10);

        let error = evaluator
            .evaluate(&EvaluationRequest::new("pod.yaml", "a: 1"))
            .await
            .unwrap_err();

        match error {
            EvaluatorError::Protocol(message) => {
                assert!(message.contains("code 3"));
                assert!(message.contains("crashed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
