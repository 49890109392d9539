use crate::source::{NodeKind, SourceNode};
use crate::span::{close_gaps, LineIndex, Span};

/// Byte range of a chunk plus the kind of syntax it was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteChunk {
    pub span: Span,
    pub kind: NodeKind,
}

/// Splits a syntax tree into contiguous byte ranges bounded by a size budget.
///
/// Children are packed greedily into a running chunk; a child that alone is
/// larger than the budget is chunked recursively, and an oversized child
/// without children becomes its own chunk.
///
/// Sizes are measured on the text a range turns into once its edges are
/// rounded to line starts, so indentation and blank lines count.
#[derive(Debug, Clone, Copy)]
pub struct TreeChunker<'a> {
    max_size: usize,
    lines: &'a LineIndex,
}

impl<'a> TreeChunker<'a> {
    #[must_use]
    pub const fn new(max_size: usize, lines: &'a LineIndex) -> Self {
        Self { max_size, lines }
    }

    /// Chunk `root`. The result is ordered, gap-free and covers
    /// `root.full_span()` exactly.
    pub fn chunk<N: SourceNode>(&self, root: &N) -> Vec<ByteChunk> {
        let extent = root.full_span();
        let mut out = Vec::new();
        self.chunk_children(extent, root.children(), non_other(root.kind()), &mut out);

        if out.is_empty() {
            if !extent.is_empty() {
                out.push(ByteChunk {
                    span: extent,
                    kind: root.kind(),
                });
            }
            return out;
        }

        let mut spans: Vec<Span> = out.iter().map(|chunk| chunk.span).collect();
        close_gaps(&mut spans, extent);
        for (chunk, span) in out.iter_mut().zip(spans) {
            chunk.span = span;
        }
        out
    }

    /// Length of the text emitted for `span` once it is a chunk.
    fn measure(&self, span: Span) -> usize {
        self.lines.text_len(self.lines.lines_for(span))
    }

    fn chunk_children<N: SourceNode>(
        &self,
        extent: Span,
        children: Vec<N>,
        enclosing: Option<NodeKind>,
        out: &mut Vec<ByteChunk>,
    ) {
        let spans = partition(extent, &children);
        let mut current = Span::empty_at(extent.start);
        let mut current_kind: Option<NodeKind> = None;

        for (child, span) in children.into_iter().zip(spans) {
            let kind = non_other(child.kind());

            if self.measure(span) > self.max_size {
                flush(out, current, current_kind.or(enclosing));
                let inner_kind = kind.or(enclosing);
                let grandchildren = child.children();
                if grandchildren.is_empty() {
                    log::debug!(
                        "Leaf node of {} bytes exceeds chunk budget {}",
                        self.measure(span),
                        self.max_size
                    );
                    flush(out, span, inner_kind);
                } else {
                    self.chunk_children(span, grandchildren, inner_kind, out);
                }
                current = Span::empty_at(span.end);
                current_kind = None;
            } else if self.measure(current + span) > self.max_size {
                flush(out, current, current_kind.or(enclosing));
                current = span;
                current_kind = kind;
            } else {
                current = current + span;
                current_kind = current_kind.or(kind);
            }
        }

        flush(out, current, current_kind.or(enclosing));
    }
}

/// Split `extent` into one contiguous range per child: each child owns the
/// trivia up to the next child's start, the first one also the leading trivia.
fn partition<N: SourceNode>(extent: Span, children: &[N]) -> Vec<Span> {
    let mut spans = Vec::with_capacity(children.len());
    let mut start = extent.start;
    for idx in 0..children.len() {
        let end = children.get(idx + 1).map_or(extent.end, |next| {
            next.full_span().start.clamp(start, extent.end)
        });
        spans.push(Span::new(start, end));
        start = end;
    }
    spans
}

fn non_other(kind: NodeKind) -> Option<NodeKind> {
    (kind != NodeKind::Other).then_some(kind)
}

fn flush(out: &mut Vec<ByteChunk>, span: Span, kind: Option<NodeKind>) {
    if span.is_empty() {
        return;
    }
    out.push(ByteChunk {
        span,
        kind: kind.unwrap_or_default(),
    });
}
