//! Structural parsing of (cleaned) YAML text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;
use tplsentry_core::TextPointer;

/// Locations serde_yaml embeds in its messages, possibly more than once.
static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" at line \d+ column \d+").expect("location pattern is valid"));

/// A parse failure, positioned in the coordinates of the parsed text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub position: Option<TextPointer>,
}

impl From<serde_yaml::Error> for SyntaxError {
    fn from(error: serde_yaml::Error) -> Self {
        let position = error
            .location()
            .map(|location| TextPointer::new(location.line(), location.column().saturating_sub(1)));
        let message = LOCATION.replace_all(&error.to_string(), "").into_owned();
        Self { message, position }
    }
}

/// Turns text into YAML documents.
pub trait StructuralParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Vec<Value>, SyntaxError>;
}

/// Multi-document YAML parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlParser;

impl StructuralParser for YamlParser {
    fn parse(&self, text: &str) -> Result<Vec<Value>, SyntaxError> {
        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(text) {
            documents.push(Value::deserialize(document)?);
        }
        Ok(documents)
    }
}
