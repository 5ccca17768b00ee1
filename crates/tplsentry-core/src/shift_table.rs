//! Expanded-line to original-line mapping.

use std::collections::{BTreeMap, BTreeSet};

use crate::lines::{split_lines, OriginalLines};
use crate::marker::{split_trailing_marker, LineMarker};

/// Markers keyed by expanded line number, plus what is known about the original
/// source. Built once per file and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftTable {
    markers: BTreeMap<usize, LineMarker>,
    original: OriginalLines,
    expanded_line_count: usize,
}

impl ShiftTable {
    #[must_use]
    pub fn new(original: OriginalLines, expanded_line_count: usize) -> Self {
        Self {
            markers: BTreeMap::new(),
            original,
            expanded_line_count,
        }
    }

    /// Table read straight from marked text, before any line is removed.
    ///
    /// Used to place evaluator errors, which refer to the lines of the marked
    /// template itself.
    #[must_use]
    pub fn from_marked_text(text: &str, original: OriginalLines) -> Self {
        let lines = split_lines(text);
        let mut table = Self::new(original, lines.len());
        for (idx, line) in lines.iter().enumerate() {
            if let (_, Some(marker)) = split_trailing_marker(line.content) {
                table.insert(idx + 1, marker);
            }
        }
        table
    }

    /// Record the marker of an expanded line, replacing any previous one.
    pub fn insert(&mut self, expanded_line: usize, marker: LineMarker) {
        self.markers.insert(expanded_line, marker);
    }

    #[must_use]
    pub fn marker(&self, expanded_line: usize) -> Option<LineMarker> {
        self.markers.get(&expanded_line).copied()
    }

    /// The marker of `expanded_line`, or of the nearest following line that has one.
    #[must_use]
    pub fn marker_at_or_after(&self, expanded_line: usize) -> Option<LineMarker> {
        self.markers
            .range(expanded_line..)
            .next()
            .map(|(_, marker)| *marker)
    }

    /// Target used when nothing at or after a line carries a marker: the last
    /// original line.
    #[must_use]
    pub fn fallback_marker(&self) -> LineMarker {
        let last_line = match self.original.line_count() {
            0 => self
                .markers
                .values()
                .map(LineMarker::last_line)
                .max()
                .unwrap_or(1),
            count => count,
        };
        LineMarker::Single(last_line)
    }

    #[must_use]
    pub fn original(&self) -> &OriginalLines {
        &self.original
    }

    #[must_use]
    pub fn expanded_line_count(&self) -> usize {
        self.expanded_line_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, LineMarker)> + '_ {
        self.markers.iter().map(|(line, marker)| (*line, *marker))
    }

    /// A new table for the document obtained by deleting `deleted` lines.
    ///
    /// Surviving lines are renumbered: a line moves up by the number of deleted
    /// lines before it. Markers of deleted lines are dropped.
    #[must_use]
    pub fn without_lines(&self, deleted: &BTreeSet<usize>, expanded_line_count: usize) -> Self {
        let markers = self
            .markers
            .iter()
            .filter(|(line, _)| !deleted.contains(*line))
            .map(|(line, marker)| (line - deleted.range(..*line).count(), *marker))
            .collect();

        Self {
            markers,
            original: self.original.clone(),
            expanded_line_count,
        }
    }
}
