//! Mapping of expanded-document positions back to the original source.
//!
//! Expansion does not preserve offsets inside a line, so shifted ranges always
//! cover whole original lines: the start column is 0 and the end column is the
//! length of the last original line.

use thiserror::Error;

use crate::context::FileContext;
use crate::location::{TextPointer, TextRange};
use crate::marker::LineMarker;
use crate::shift_table::ShiftTable;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShiftError {
    /// The pipeline stages disagree about the expanded document.
    #[error("line {line} is outside of the expanded document (1..={line_count})")]
    OutOfBounds { line: usize, line_count: usize },
}

/// Translate a range of the expanded document into original coordinates.
///
/// Identity when the file was not templated. Unmarked lines resolve to the next
/// marked line, or to the last original line when none follows.
pub fn compute_shifted_location(
    context: &FileContext,
    range: TextRange,
) -> Result<TextRange, ShiftError> {
    match context.shift_table() {
        Some(table) => shift_range(table, range),
        None => Ok(range),
    }
}

/// Translate a single expanded position, such as a parse error, into original
/// coordinates. Uses the same resolution as the start of a range.
pub fn shift_point(context: &FileContext, pointer: TextPointer) -> Result<TextPointer, ShiftError> {
    match context.shift_table() {
        Some(table) => {
            check_bounds(table, pointer.line)?;
            Ok(TextPointer::new(resolve(table, pointer.line).first_line(), 0))
        }
        None => Ok(pointer),
    }
}

/// Range shifting against an explicit table.
pub fn shift_range(table: &ShiftTable, range: TextRange) -> Result<TextRange, ShiftError> {
    check_bounds(table, range.start.line)?;
    check_bounds(table, range.end.line)?;

    let start = resolve(table, range.start.line);
    let end = resolve(table, range.end.line);

    // union of both resolutions, a loop can make them non-monotonic
    let first = start.first_line().min(end.first_line());
    let last = end.last_line().max(start.last_line());

    Ok(TextRange::of(
        first,
        0,
        last,
        table.original().line_length(last),
    ))
}

fn resolve(table: &ShiftTable, expanded_line: usize) -> LineMarker {
    table
        .marker_at_or_after(expanded_line)
        .unwrap_or_else(|| table.fallback_marker())
}

fn check_bounds(table: &ShiftTable, line: usize) -> Result<(), ShiftError> {
    let line_count = table.expanded_line_count();
    if line == 0 || line > line_count {
        return Err(ShiftError::OutOfBounds { line, line_count });
    }
    Ok(())
}
