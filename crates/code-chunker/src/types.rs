use crate::source::NodeKind;
use crate::span::Span;
use serde::{Deserialize, Serialize};

/// A contiguous line range of one file, the unit of re-indexing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChunk {
    /// Source file path
    pub file_path: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// The chunk's lines joined by `'\n'`
    pub content: String,

    /// Kind of declaration the chunk was cut from
    #[serde(default)]
    pub source_kind: NodeKind,
}

impl CodeChunk {
    /// Create a new code chunk
    #[must_use]
    pub const fn new(
        file_path: String,
        start_line: usize,
        end_line: usize,
        content: String,
        source_kind: NodeKind,
    ) -> Self {
        Self {
            file_path,
            start_line,
            end_line,
            content,
            source_kind,
        }
    }

    /// Build a chunk from a 0-based half-open line span
    #[must_use]
    pub fn from_line_span(
        file_path: &str,
        lines: Span,
        content: String,
        source_kind: NodeKind,
    ) -> Self {
        Self::new(
            file_path.to_string(),
            lines.start + 1,
            lines.end,
            content,
            source_kind,
        )
    }

    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Check if chunk contains a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// The 0-based half-open line span
    #[must_use]
    pub const fn line_span(&self) -> Span {
        Span::new(self.start_line.saturating_sub(1), self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(start: usize, end: usize) -> CodeChunk {
        CodeChunk::new(
            "test.rs".to_string(),
            start,
            end,
            "code".to_string(),
            NodeKind::Other,
        )
    }

    #[test]
    fn test_chunk_line_count() {
        assert_eq!(chunk(10, 15).line_count(), 6);
    }

    #[test]
    fn test_chunk_contains_line() {
        let chunk = chunk(10, 15);
        assert!(chunk.contains_line(10));
        assert!(chunk.contains_line(12));
        assert!(chunk.contains_line(15));
        assert!(!chunk.contains_line(9));
        assert!(!chunk.contains_line(16));
    }

    #[test]
    fn test_line_span_conversion() {
        let chunk = CodeChunk::from_line_span(
            "a.py",
            Span::new(4, 9),
            String::new(),
            NodeKind::FunctionLike,
        );
        assert_eq!(chunk.start_line, 5);
        assert_eq!(chunk.end_line, 9);
        assert_eq!(chunk.line_span(), Span::new(4, 9));
    }
}
