//! Text positions shared by every stage of the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A position in a document: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextPointer {
    pub line: usize,
    pub line_offset: usize,
}

impl TextPointer {
    #[must_use]
    pub fn new(line: usize, line_offset: usize) -> Self {
        Self { line, line_offset }
    }
}

impl fmt::Display for TextPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.line_offset)
    }
}

/// A span between two pointers, inclusive of both lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: TextPointer,
    pub end: TextPointer,
}

impl TextRange {
    #[must_use]
    pub fn new(start: TextPointer, end: TextPointer) -> Self {
        Self { start, end }
    }

    /// Build a range from raw coordinates.
    #[must_use]
    pub fn of(start_line: usize, start_offset: usize, end_line: usize, end_offset: usize) -> Self {
        Self::new(
            TextPointer::new(start_line, start_offset),
            TextPointer::new(end_line, end_offset),
        )
    }

    /// A zero-width range at the given pointer.
    #[must_use]
    pub fn point(pointer: TextPointer) -> Self {
        Self::new(pointer, pointer)
    }

    #[must_use]
    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}
