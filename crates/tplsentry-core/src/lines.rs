//! Line splitting that keeps line terminators intact.

/// One physical line and the terminator that ended it (empty for the last line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    pub content: &'a str,
    pub terminator: &'a str,
}

/// Split `text` on `\r\n`, `\n`, `\r`, U+2028 and U+2029.
///
/// The final segment is always returned, even when empty, so `"a\n"` has two lines
/// and `""` has one. This matches how editors number lines.
#[must_use]
pub fn split_lines(text: &str) -> Vec<SourceLine<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let terminator_end = match ch {
            '\r' => match chars.peek() {
                Some(&(next, '\n')) => {
                    chars.next();
                    next + 1
                }
                _ => idx + 1,
            },
            '\n' => idx + 1,
            '\u{2028}' | '\u{2029}' => idx + ch.len_utf8(),
            _ => continue,
        };
        lines.push(SourceLine {
            content: &text[start..idx],
            terminator: &text[idx..terminator_end],
        });
        start = terminator_end;
    }

    lines.push(SourceLine {
        content: &text[start..],
        terminator: "",
    });
    lines
}

/// Number of lines in `text`, counted the same way as [`split_lines`].
#[must_use]
pub fn line_count(text: &str) -> usize {
    split_lines(text).len()
}

/// Metadata about the original, unexpanded source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginalLines {
    lengths: Vec<usize>,
    blank: Vec<bool>,
    ends_with_newline: bool,
}

impl OriginalLines {
    #[must_use]
    pub fn from_source(source: &str) -> Self {
        let lines = split_lines(source);
        let ends_with_newline = lines.len() > 1 && lines.last().is_some_and(|l| l.content.is_empty());
        Self {
            lengths: lines.iter().map(|l| l.content.chars().count()).collect(),
            blank: lines.iter().map(|l| l.content.trim().is_empty()).collect(),
            ends_with_newline,
        }
    }

    /// Total number of original lines; the last one is the shifting fallback.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lengths.len()
    }

    /// Length in characters of a 1-based original line, 0 when unknown.
    #[must_use]
    pub fn line_length(&self, line: usize) -> usize {
        line.checked_sub(1)
            .and_then(|idx| self.lengths.get(idx))
            .copied()
            .unwrap_or(0)
    }

    /// Whether the 1-based original line is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self, line: usize) -> bool {
        line.checked_sub(1)
            .and_then(|idx| self.blank.get(idx))
            .copied()
            .unwrap_or(false)
    }

    #[must_use]
    pub fn ends_with_newline(&self) -> bool {
        self.ends_with_newline
    }
}
