use serde::{Deserialize, Serialize};
use std::ops::{Add, Range};

/// Half-open `[start, end)` range over byte or line offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span; an `end` before `start` collapses to an empty span at `start`.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        if end < start {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    #[must_use]
    pub const fn empty_at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end == self.start
    }

    /// True when `offset` lies inside the span and is not one of its edges.
    #[must_use]
    pub const fn strictly_contains(self, offset: usize) -> bool {
        self.start < offset && offset < self.end
    }

    #[must_use]
    pub const fn range(self) -> Range<usize> {
        self.start..self.end
    }

    /// Slice `text` by this span; out-of-bounds or non-char-boundary spans yield `""`.
    #[must_use]
    pub fn extract(self, text: &str) -> &str {
        text.get(self.range()).unwrap_or("")
    }
}

/// Concatenation: `a + b == {a.start, b.end}`, with the empty span as identity.
impl Add for Span {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        if self.is_empty() {
            other
        } else if other.is_empty() {
            self
        } else {
            Self::new(self.start, other.end)
        }
    }
}

/// Make ordered spans contiguous over `extent`: the first span starts at
/// `extent.start`, each span ends where the next one starts and the last one
/// ends at `extent.end`.
pub fn close_gaps(spans: &mut [Span], extent: Span) {
    let Some(first) = spans.first_mut() else {
        return;
    };
    first.start = extent.start.min(first.start);

    for idx in 1..spans.len() {
        let next_start = spans[idx].start;
        spans[idx - 1].end = next_start;
    }

    if let Some(last) = spans.last_mut() {
        last.end = extent.end.max(last.start);
    }
}

/// Byte offset ↔ line number lookups for one source text.
///
/// Lines are the pieces of `text.split('\n')`, so joining any contiguous run
/// of lines with `'\n'` reproduces the original bytes exactly.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = Vec::with_capacity(text.len() / 32 + 1);
        line_starts.push(0);
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self {
            line_starts,
            len: text.len(),
        }
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 0-based line containing `offset` (offsets past the end map to the last line).
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.len);
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insert_at) => insert_at.saturating_sub(1),
        }
    }

    /// Line number used as a chunk edge for a byte boundary. The end of the
    /// text maps to `line_count()` so the final line is never cut off.
    #[must_use]
    pub fn line_boundary(&self, offset: usize) -> usize {
        if offset >= self.len {
            self.line_count()
        } else {
            self.line_of(offset)
        }
    }

    /// Byte offset at which `line` starts; `line_count()` maps past the end.
    #[must_use]
    pub fn line_start(&self, line: usize) -> usize {
        self.line_starts
            .get(line)
            .copied()
            .unwrap_or(self.len.saturating_add(1))
    }

    /// Convert a byte span into the line span whose edges are its line boundaries.
    #[must_use]
    pub fn lines_for(&self, bytes: Span) -> Span {
        Span::new(self.line_boundary(bytes.start), self.line_boundary(bytes.end))
    }

    /// Byte range of the text formed by joining `lines` with `'\n'`.
    #[must_use]
    pub fn byte_span_of_lines(&self, lines: Span) -> Span {
        if lines.is_empty() || lines.start >= self.line_count() {
            return Span::empty_at(self.line_start(lines.start).min(self.len));
        }
        let start = self.line_starts[lines.start];
        let end = if lines.end < self.line_count() {
            self.line_starts[lines.end] - 1
        } else {
            self.len
        };
        Span::new(start, end)
    }

    /// Length of the text extracted for `lines`.
    #[must_use]
    pub fn text_len(&self, lines: Span) -> usize {
        self.byte_span_of_lines(lines).len()
    }

    /// The text of `lines`, joined by `'\n'`.
    #[must_use]
    pub fn extract<'a>(&self, text: &'a str, lines: Span) -> &'a str {
        self.byte_span_of_lines(lines).extract(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_uses_empty_span_as_identity() {
        let a = Span::new(3, 7);
        let b = Span::new(9, 12);
        assert_eq!(a + b, Span::new(3, 12));
        assert_eq!(Span::empty_at(100) + a, a);
        assert_eq!(a + Span::empty_at(0), a);
    }

    #[test]
    fn new_never_produces_negative_length() {
        let span = Span::new(10, 4);
        assert!(span.is_empty());
        assert_eq!(span.start, 10);
    }

    #[test]
    fn strictly_contains_excludes_edges() {
        let span = Span::new(2, 5);
        assert!(!span.strictly_contains(2));
        assert!(span.strictly_contains(3));
        assert!(!span.strictly_contains(5));
    }

    #[test]
    fn close_gaps_makes_spans_contiguous() {
        let mut spans = vec![Span::new(2, 4), Span::new(6, 9), Span::new(12, 15)];
        close_gaps(&mut spans, Span::new(0, 20));
        assert_eq!(
            spans,
            vec![Span::new(0, 6), Span::new(6, 12), Span::new(12, 20)]
        );
    }

    #[test]
    fn line_index_maps_offsets() {
        let text = "ab\ncd\n\nef";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.line_of(0), 0);
        assert_eq!(index.line_of(2), 0);
        assert_eq!(index.line_of(3), 1);
        assert_eq!(index.line_of(6), 2);
        assert_eq!(index.line_of(7), 3);
        assert_eq!(index.line_boundary(text.len()), 4);
    }

    #[test]
    fn extract_matches_joined_lines() {
        let text = "ab\ncd\n\nef";
        let index = LineIndex::new(text);
        let lines: Vec<&str> = text.split('\n').collect();

        assert_eq!(index.extract(text, Span::new(0, 2)), lines[0..2].join("\n"));
        assert_eq!(index.extract(text, Span::new(1, 4)), lines[1..4].join("\n"));
        assert_eq!(index.extract(text, Span::new(2, 3)), "");
        assert_eq!(index.text_len(Span::new(0, 4)), text.len());
        assert_eq!(index.text_len(Span::new(3, 3)), 0);
    }

    #[test]
    fn trailing_newline_keeps_final_empty_line() {
        let text = "a\nb\n";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.extract(text, Span::new(0, 3)), text);
        assert_eq!(index.lines_for(Span::new(0, text.len())), Span::new(0, 3));
    }
}
