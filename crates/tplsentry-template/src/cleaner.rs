//! Cleanup of evaluator output.
//!
//! Control flow leaves residue behind: blank lines where a directive used to be,
//! and document separators whose whole document was conditionally dropped. The
//! cleaner removes that residue together with the markers, and rebuilds the
//! Shift Table so it is keyed by the line numbers of the cleaned text.

use std::collections::BTreeSet;

use log::debug;
use tplsentry_core::{line_count, split_lines, split_trailing_marker, LineMarker, OriginalLines, ShiftTable};

/// Cleaned expanded text and the Shift Table that describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedSource {
    pub text: String,
    pub table: ShiftTable,
}

impl CleanedSource {
    /// Nothing but whitespace survived cleaning.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

struct ExpandedLine<'a> {
    content: &'a str,
    terminator: &'a str,
    marker: Option<LineMarker>,
}

impl ExpandedLine<'_> {
    fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    fn is_separator(&self) -> bool {
        matches!(self.content.trim_end(), "---" | "...")
            || self.content.starts_with("--- #")
            || self.content.starts_with("... #")
    }

    /// A blank line the author wrote, as opposed to one left by a directive.
    fn is_authored_blank(&self, original: &OriginalLines) -> bool {
        matches!(self.marker, Some(LineMarker::Single(line)) if original.is_blank(line))
    }
}

/// Strip markers from evaluated output and drop control-flow residue.
pub fn clean_evaluated(raw: &str, original: &OriginalLines) -> CleanedSource {
    let lines: Vec<ExpandedLine<'_>> = split_lines(raw)
        .into_iter()
        .map(|line| {
            let (content, marker) = split_trailing_marker(line.content);
            ExpandedLine {
                content,
                terminator: line.terminator,
                marker,
            }
        })
        .collect();

    let mut raw_table = ShiftTable::new(original.clone(), lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if let Some(marker) = line.marker {
            raw_table.insert(idx + 1, marker);
        }
    }

    let deleted = residue_lines(&lines, original);
    let survivors: Vec<&ExpandedLine<'_>> = lines
        .iter()
        .enumerate()
        .filter(|(idx, _)| !deleted.contains(&(idx + 1)))
        .map(|(_, line)| line)
        .collect();

    let fallback_terminator = lines
        .iter()
        .map(|line| line.terminator)
        .find(|terminator| !terminator.is_empty())
        .unwrap_or("\n");

    let mut text = String::with_capacity(raw.len());
    for (idx, line) in survivors.iter().enumerate() {
        text.push_str(line.content);
        if idx + 1 < survivors.len() {
            text.push_str(line.terminator);
        } else if original.ends_with_newline() {
            if line.terminator.is_empty() {
                text.push_str(fallback_terminator);
            } else {
                text.push_str(line.terminator);
            }
        }
    }

    let expanded_line_count = line_count(&text);
    debug!(
        "Cleaned evaluated output: {} of {} lines removed",
        deleted.len(),
        lines.len()
    );

    CleanedSource {
        table: raw_table.without_lines(&deleted, expanded_line_count),
        text,
    }
}

/// 1-based numbers of the lines to delete.
///
/// Walks backwards so that, at every line, it is known whether surviving content
/// follows before the next separator and before the end of the file.
fn residue_lines(lines: &[ExpandedLine<'_>], original: &OriginalLines) -> BTreeSet<usize> {
    let mut deleted = BTreeSet::new();
    let mut content_in_document = false;
    let mut content_until_eof = false;

    for (idx, line) in lines.iter().enumerate().rev() {
        let number = idx + 1;
        if line.is_blank() {
            if !content_until_eof || !line.is_authored_blank(original) {
                deleted.insert(number);
            }
        } else if line.is_separator() {
            if content_in_document {
                content_until_eof = true;
            } else {
                deleted.insert(number);
            }
            content_in_document = false;
        } else {
            content_in_document = true;
            content_until_eof = true;
        }
    }

    deleted
}
