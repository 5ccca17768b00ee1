//! Byte format exchanged with the evaluator process.
//!
//! Request, written to stdin, as length-prefixed blocks (4-byte big-endian length,
//! then the bytes):
//!
//! ```text
//! <name len><template name><content len><template content>
//! <file count>
//! (<name len><file name><content len><file content>) * file count
//! ```
//!
//! Response, read from stdout, as JSON:
//! `{"template": "...", "error": "...", "line": 3, "column": 7}` where every field
//! but `template` is optional.

use serde::{Deserialize, Serialize};

use crate::error::EvaluatorError;
use crate::request::EvaluationRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    #[serde(default)]
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl EvaluationResponse {
    /// The expanded text, or the error the evaluator reported for `template_name`.
    pub fn into_result(self, template_name: &str) -> Result<String, EvaluatorError> {
        match self.error {
            Some(error) if !error.trim().is_empty() => Err(EvaluatorError::from_message(
                error,
                self.line,
                self.column,
                template_name,
            )),
            _ => Ok(self.template),
        }
    }
}

pub fn encode_request(request: &EvaluationRequest) -> Result<Vec<u8>, EvaluatorError> {
    let size = request.source.len()
        + request
            .values
            .iter()
            .map(|(name, content)| name.len() + content.len() + 8)
            .sum::<usize>()
        + 64;
    let mut buffer = Vec::with_capacity(size);

    write_block(&mut buffer, request.template_name().as_bytes())?;
    write_block(&mut buffer, request.source.as_bytes())?;
    write_length(&mut buffer, request.values.len())?;
    for (name, content) in &request.values {
        write_block(&mut buffer, name.as_bytes())?;
        write_block(&mut buffer, content.as_bytes())?;
    }

    Ok(buffer)
}

pub fn decode_response(stdout: &[u8]) -> Result<EvaluationResponse, EvaluatorError> {
    serde_json::from_slice(stdout)
        .map_err(|e| EvaluatorError::Protocol(format!("JSON parse error: {}", e)))
}

fn write_block(buffer: &mut Vec<u8>, bytes: &[u8]) -> Result<(), EvaluatorError> {
    write_length(buffer, bytes.len())?;
    buffer.extend_from_slice(bytes);
    Ok(())
}

fn write_length(buffer: &mut Vec<u8>, length: usize) -> Result<(), EvaluatorError> {
    let length = u32::try_from(length)
        .map_err(|_| EvaluatorError::Protocol(format!("block of {} bytes is too large", length)))?;
    buffer.extend_from_slice(&length.to_be_bytes());
    Ok(())
}
