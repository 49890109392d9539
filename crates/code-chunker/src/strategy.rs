use crate::span::{LineIndex, Span};

/// Line-window chunking for files without a grammar.
///
/// Whole lines are packed greedily while the joined text stays within the
/// budget; a single line longer than the budget becomes its own window.
pub struct LineWindowStrategy {
    max_size: usize,
}

impl LineWindowStrategy {
    pub const fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Contiguous line spans covering every line of the text.
    pub fn windows(&self, lines: &LineIndex) -> Vec<Span> {
        let total = lines.line_count();
        let mut windows: Vec<Span> = Vec::new();
        let mut start = 0;

        while start < total {
            let mut end = start + 1;
            while end < total && lines.text_len(Span::new(start, end + 1)) <= self.max_size {
                end += 1;
            }
            windows.push(Span::new(start, end));
            start = end;
        }

        // An empty final line (text ending in '\n') is not worth a window of its own.
        if windows.len() > 1 {
            if let Some(last) = windows.last().copied() {
                if lines.text_len(last) == 0 {
                    windows.pop();
                    if let Some(prev) = windows.last_mut() {
                        prev.end = last.end;
                    }
                }
            }
        }

        windows
    }
}
