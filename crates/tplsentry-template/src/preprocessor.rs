//! Marker preprocessing of original template sources.

use tplsentry_core::{split_lines, LineMarker, OriginalLines};

/// Original source with a line-origin marker appended to its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedSource {
    pub text: String,
    pub original: OriginalLines,
}

/// Append ` #<n>` to every line of `source`.
///
/// A template action that spans several lines (`{{` on one line, the matching
/// `}}` on a later one) cannot take a comment in the middle, so it is marked once
/// on its closing line with the range of lines it covers, e.g. `}} #3:6`.
/// Line terminators are kept as they are.
#[must_use]
pub fn add_line_markers(source: &str) -> MarkedSource {
    let lines = split_lines(source);
    let mut text = String::with_capacity(source.len() + lines.len() * 5);
    let mut open_actions: isize = 0;
    let mut block_start: Option<usize> = None;

    for (idx, line) in lines.iter().enumerate() {
        let number = idx + 1;
        open_actions = (open_actions + unmatched_opening_braces(line.content)).max(0);

        text.push_str(line.content);
        if open_actions > 0 {
            block_start.get_or_insert(number);
        } else {
            let first = block_start.take().unwrap_or(number);
            LineMarker::spanning(first, number).append_to(&mut text);
        }
        text.push_str(line.terminator);
    }

    MarkedSource {
        text,
        original: OriginalLines::from_source(source),
    }
}

/// Count of `{{` minus count of `}}` on a line.
#[must_use]
pub fn unmatched_opening_braces(line: &str) -> isize {
    line.matches("{{").count() as isize - line.matches("}}").count() as isize
}
