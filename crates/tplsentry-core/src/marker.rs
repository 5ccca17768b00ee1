//! Line-origin markers.
//!
//! A marker is a trailing YAML comment appended to each line before template
//! expansion, recording which original line(s) the line came from:
//!
//! - `#12` for a line that originates from original line 12;
//! - `#9:13` for a line that stands for the collapsed block of original lines 9 to 13.
//!
//! The directive language never interprets `#`, so markers pass through expansion
//! untouched. This module is the only place that knows the textual grammar.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A marker followed by any run of further markers up to the end of the line.
/// Loops can stack markers (`bar #16 #17`) or glue them together (`#6#7`); the
/// first one names the line.
static TRAILING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#(\d+)(?::(\d+))?(?: ?#\d+(?::\d+)?)*$").expect("marker pattern is valid")
});

/// Which original line(s) produced an expanded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineMarker {
    Single(usize),
    Range { start: usize, end: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    #[error("missing '#' prefix in marker: {0}")]
    MissingPrefix(String),

    #[error("invalid line number in marker: {0}")]
    InvalidNumber(String),

    #[error("marker range {start}:{end} is empty or reversed")]
    InvalidRange { start: usize, end: usize },
}

impl LineMarker {
    /// Build a marker for a block; a one-line block is a plain single marker.
    #[must_use]
    pub fn spanning(start: usize, end: usize) -> Self {
        if start == end {
            LineMarker::Single(start)
        } else {
            LineMarker::Range { start, end }
        }
    }

    /// First original line covered by this marker.
    #[must_use]
    pub fn first_line(&self) -> usize {
        match *self {
            LineMarker::Single(line) => line,
            LineMarker::Range { start, .. } => start,
        }
    }

    /// Last original line covered by this marker.
    #[must_use]
    pub fn last_line(&self) -> usize {
        match *self {
            LineMarker::Single(line) => line,
            LineMarker::Range { end, .. } => end,
        }
    }

    /// Append this marker as a trailing comment to `line`.
    pub fn append_to(&self, line: &mut String) {
        line.push(' ');
        line.push_str(&self.to_string());
    }
}

impl fmt::Display for LineMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineMarker::Single(line) => write!(f, "#{}", line),
            LineMarker::Range { start, end } => write!(f, "#{}:{}", start, end),
        }
    }
}

impl FromStr for LineMarker {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix('#')
            .ok_or_else(|| MarkerError::MissingPrefix(s.to_string()))?;
        let parse_line = |raw: &str| -> Result<usize, MarkerError> {
            match raw.parse::<usize>() {
                Ok(0) | Err(_) => Err(MarkerError::InvalidNumber(s.to_string())),
                Ok(line) => Ok(line),
            }
        };

        match body.split_once(':') {
            None => Ok(LineMarker::Single(parse_line(body)?)),
            Some((start, end)) => {
                let start = parse_line(start)?;
                let end = parse_line(end)?;
                if end < start {
                    return Err(MarkerError::InvalidRange { start, end });
                }
                Ok(LineMarker::spanning(start, end))
            }
        }
    }
}

/// Split a line of expanded output into its content and its trailing marker.
///
/// One space separating the content from the marker is removed as well. A line
/// whose trailing text looks like a marker but does not decode (zero, overflow,
/// reversed range) is returned unchanged with no marker.
#[must_use]
pub fn split_trailing_marker(line: &str) -> (&str, Option<LineMarker>) {
    let Some(captures) = TRAILING_MARKER.captures(line) else {
        return (line, None);
    };
    let whole = captures.get(0).expect("group 0 is always present");
    let encoded = match captures.get(2) {
        Some(end) => format!("#{}:{}", &captures[1], end.as_str()),
        None => format!("#{}", &captures[1]),
    };

    match encoded.parse::<LineMarker>() {
        Ok(marker) => {
            let content = &line[..whole.start()];
            let content = content.strip_suffix(' ').unwrap_or(content);
            (content, Some(marker))
        }
        Err(_) => (line, None),
    }
}
