use crate::source::{NodeKind, SourceNode};
use crate::span::{LineIndex, Span};
use crate::tree_chunker::ByteChunk;

/// A chunk during merging: its byte range and the line range derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub bytes: Span,
    pub lines: Span,
    pub kind: NodeKind,
}

impl Piece {
    #[must_use]
    pub fn from_bytes(chunk: ByteChunk, lines: &LineIndex) -> Self {
        Self {
            bytes: chunk.span,
            lines: lines.lines_for(chunk.span),
            kind: chunk.kind,
        }
    }
}

/// Inclusive first/last line of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineExtent {
    first: usize,
    last: usize,
}

impl LineExtent {
    fn of(span: Span, lines: &LineIndex) -> Option<Self> {
        if span.is_empty() {
            return None;
        }
        Some(Self {
            first: lines.line_of(span.start),
            last: lines.line_of(span.end - 1),
        })
    }

    /// A chunk edge at `line` separates `line - 1` from `line`.
    const fn split_by(self, line: usize) -> bool {
        Span::new(self.first, self.last + 1).strictly_contains(line)
    }

    fn cover(self, other: Self) -> Self {
        Self {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ClassExtent {
    extent: LineExtent,
    members: Option<LineExtent>,
}

/// Line extents of every class-like and function-like declaration in a tree.
#[derive(Debug, Clone, Default)]
pub struct DeclarationIndex {
    functions: Vec<LineExtent>,
    classes: Vec<ClassExtent>,
}

#[derive(Clone, Copy)]
enum Enclosing {
    None,
    Class(usize),
    Function,
}

impl DeclarationIndex {
    pub fn build<N: SourceNode>(root: &N, lines: &LineIndex) -> Self {
        let mut index = Self::default();
        let mut stack = vec![(root.children(), Enclosing::None)];

        while let Some((nodes, enclosing)) = stack.pop() {
            for node in nodes {
                let kind = node.kind();
                let extent = LineExtent::of(node.full_span(), lines);
                let next = match extent {
                    Some(extent) if kind.is_declaration() => {
                        index.add_member(enclosing, extent);
                        if kind == NodeKind::ClassLike {
                            index.classes.push(ClassExtent {
                                extent,
                                members: None,
                            });
                            Enclosing::Class(index.classes.len() - 1)
                        } else {
                            index.functions.push(extent);
                            Enclosing::Function
                        }
                    }
                    _ => enclosing,
                };
                let children = node.children();
                if !children.is_empty() {
                    stack.push((children, next));
                }
            }
        }

        index
    }

    fn add_member(&mut self, enclosing: Enclosing, member: LineExtent) {
        if let Enclosing::Class(idx) = enclosing {
            let class = &mut self.classes[idx];
            class.members = Some(class.members.map_or(member, |m| m.cover(member)));
        }
    }

    /// Whether a chunk edge at `line` would cut a declaration apart.
    ///
    /// Any function-like declaration spanning the edge is cut. A class-like
    /// declaration is only cut when the edge falls outside the lines of its
    /// members (inside its header), or when it has no members at all.
    #[must_use]
    pub fn splits(&self, line: usize) -> bool {
        if self.functions.iter().any(|f| f.split_by(line)) {
            return true;
        }
        self.classes.iter().any(|class| {
            class.extent.split_by(line)
                && class
                    .members
                    .map_or(true, |m| line < m.first || line > m.last + 1)
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.classes.is_empty()
    }
}

/// Second pass over the tree chunker's output that re-joins declarations
/// that were cut apart and coalesces undersized neighbours.
///
/// Every forced join happens first, over the whole sequence, so size-driven
/// merges only ever see whole declarations. Then a chunk under budget is
/// merged into its previous neighbour if the result stays under budget, and
/// only otherwise into its next neighbour.
pub struct ChunkMerger<'a> {
    max_size: usize,
    lines: &'a LineIndex,
    declarations: &'a DeclarationIndex,
}

impl<'a> ChunkMerger<'a> {
    #[must_use]
    pub const fn new(
        max_size: usize,
        lines: &'a LineIndex,
        declarations: &'a DeclarationIndex,
    ) -> Self {
        Self {
            max_size,
            lines,
            declarations,
        }
    }

    /// Merge until no rule applies; pieces with no lines left are dropped.
    pub fn merge(&self, pieces: Vec<Piece>) -> Vec<Piece> {
        let mut pieces = self.join_declarations(pieces);

        let mut idx = 0;
        while idx < pieces.len() {
            if self.text_len(&pieces[idx]) >= self.max_size {
                idx += 1;
                continue;
            }

            if idx > 0 && self.combined_len(&pieces[idx - 1], &pieces[idx]) < self.max_size {
                self.merge_with_next(&mut pieces, idx - 1);
                idx -= 1;
                continue;
            }

            if idx + 1 < pieces.len()
                && self.combined_len(&pieces[idx], &pieces[idx + 1]) < self.max_size
            {
                self.merge_with_next(&mut pieces, idx);
                continue;
            }

            idx += 1;
        }

        pieces.retain(|piece| !piece.lines.is_empty());
        pieces
    }

    /// Glue every piece whose leading edge cuts a declaration onto its
    /// predecessor. Merging never moves an edge, so no later merge can
    /// reintroduce a cut.
    fn join_declarations(&self, pieces: Vec<Piece>) -> Vec<Piece> {
        let mut joined: Vec<Piece> = Vec::with_capacity(pieces.len());
        for piece in pieces {
            if self.must_merge(&piece) {
                if let Some(last) = joined.last_mut() {
                    self.absorb(last, piece);
                    continue;
                }
            }
            joined.push(piece);
        }
        joined
    }

    /// Joining is forced when the edge in front of `next` cuts a declaration.
    fn must_merge(&self, next: &Piece) -> bool {
        !self.declarations.is_empty() && self.declarations.splits(next.lines.start)
    }

    fn text_len(&self, piece: &Piece) -> usize {
        self.lines.text_len(piece.lines)
    }

    fn combined_len(&self, first: &Piece, second: &Piece) -> usize {
        self.lines
            .text_len(Span::new(first.lines.start, second.lines.end))
    }

    fn merge_with_next(&self, pieces: &mut Vec<Piece>, idx: usize) {
        let next = pieces.remove(idx + 1);
        self.absorb(&mut pieces[idx], next);
    }

    fn absorb(&self, current: &mut Piece, next: Piece) {
        current.bytes = Span::new(current.bytes.start, next.bytes.end);
        current.lines = self.lines.lines_for(current.bytes);
        if current.kind == NodeKind::Other {
            current.kind = next.kind;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::OwnedNode;
    use pretty_assertions::assert_eq;

    /// One piece per line of `text`, each covering the line and its newline.
    fn line_pieces(text: &str, lines: &LineIndex) -> Vec<Piece> {
        (0..lines.line_count())
            .map(|line| {
                let start = lines.line_start(line);
                let end = lines.line_start(line + 1).min(text.len());
                Piece {
                    bytes: Span::new(start, end),
                    lines: Span::new(line, line + 1),
                    kind: NodeKind::Other,
                }
            })
            .filter(|p| !p.bytes.is_empty())
            .collect()
    }

    fn line_ranges(pieces: &[Piece]) -> Vec<(usize, usize)> {
        pieces.iter().map(|p| (p.lines.start, p.lines.end)).collect()
    }

    #[test]
    fn prefers_backward_merge() {
        // 4 lines of 9 chars ("xxxxxxxxx"), budget 20: two lines fit (19 chars).
        let text = "aaaaaaaaa\nbbbbbbbbb\nccccccccc\nddddddddd";
        let lines = LineIndex::new(text);
        let decls = DeclarationIndex::default();
        let merged = ChunkMerger::new(20, &lines, &decls).merge(line_pieces(text, &lines));
        assert_eq!(line_ranges(&merged), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn skips_pieces_already_at_budget() {
        let text = "aaaaaaaaaaaaaaaaaaaaaaaaa\nb\nc";
        let lines = LineIndex::new(text);
        let decls = DeclarationIndex::default();
        let merged = ChunkMerger::new(10, &lines, &decls).merge(line_pieces(text, &lines));
        assert_eq!(line_ranges(&merged), vec![(0, 1), (1, 3)]);
    }

    #[test]
    fn forces_merge_inside_function() {
        let text = "fn a() {\n    one();\n    two();\n}\n";
        let lines = LineIndex::new(text);
        let function = OwnedNode::leaf(0, text.len() - 1).with_kind(NodeKind::FunctionLike);
        let root = OwnedNode::branch(NodeKind::Other, vec![function])
            .with_span(Span::new(0, text.len()));
        let decls = DeclarationIndex::build(&root, &lines);

        // Budget 1: nothing merges by size, but every edge inside `a` is forced.
        let merged = ChunkMerger::new(1, &lines, &decls).merge(line_pieces(text, &lines));
        // The merged piece reaches the end of the text, so it takes the
        // empty line after the final newline too.
        assert_eq!(line_ranges(&merged), vec![(0, 5)]);
    }

    #[test]
    fn declaration_is_joined_before_neighbours_merge_by_size() {
        let text = "x = 1\nfn f() {\n    aaaaaaaaaa\n    bbbbbbbbbb\n}\n";
        let lines = LineIndex::new(text);
        let f_start = text.find("fn f").unwrap();
        let function = OwnedNode::leaf(f_start, text.len() - 1).with_kind(NodeKind::FunctionLike);
        let root = OwnedNode::branch(NodeKind::Other, vec![function])
            .with_span(Span::new(0, text.len()));
        let decls = DeclarationIndex::build(&root, &lines);

        let body_start = lines.line_start(2);
        let pieces: Vec<Piece> = [(0, f_start), (f_start, body_start), (body_start, text.len())]
            .into_iter()
            .map(|(start, end)| {
                Piece::from_bytes(
                    ByteChunk {
                        span: Span::new(start, end),
                        kind: NodeKind::Other,
                    },
                    &lines,
                )
            })
            .collect();

        // "x = 1" plus the signature line fits in 20, the whole function does not.
        let merged = ChunkMerger::new(20, &lines, &decls).merge(pieces);
        assert_eq!(line_ranges(&merged), vec![(0, 1), (1, 6)]);
    }

    #[test]
    fn class_may_split_between_members_but_not_in_header() {
        let text = "class A:\n    x = 1\n    def f(self):\n        pass\n    def g(self):\n        pass\n";
        let lines = LineIndex::new(text);
        let f_start = text.find("def f").unwrap();
        let g_start = text.find("def g").unwrap();
        let f = OwnedNode::leaf(f_start, g_start - 5).with_kind(NodeKind::FunctionLike);
        let g = OwnedNode::leaf(g_start, text.len() - 1).with_kind(NodeKind::FunctionLike);
        let class = OwnedNode::branch(NodeKind::ClassLike, vec![OwnedNode::leaf(0, 8), f, g])
            .with_span(Span::new(0, text.len() - 1));
        let root = OwnedNode::branch(NodeKind::Other, vec![class])
            .with_span(Span::new(0, text.len()));
        let decls = DeclarationIndex::build(&root, &lines);

        assert!(decls.splits(1), "header line 0 and field line 1 precede the members");
        assert!(!decls.splits(2), "edge at first member is allowed");
        assert!(decls.splits(3), "edge inside f");
        assert!(!decls.splits(4), "edge between f and g");
        assert!(decls.splits(5), "edge inside g");

        let merged = ChunkMerger::new(1, &lines, &decls).merge(line_pieces(text, &lines));
        assert_eq!(line_ranges(&merged), vec![(0, 2), (2, 4), (4, 7)]);
    }

    #[test]
    fn merge_recomputes_bytes_and_lines() {
        let text = "ab\ncd\nef";
        let lines = LineIndex::new(text);
        let decls = DeclarationIndex::default();
        let merged = ChunkMerger::new(100, &lines, &decls).merge(line_pieces(text, &lines));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bytes, Span::new(0, text.len()));
        assert_eq!(merged[0].lines, Span::new(0, 3));
    }

    #[test]
    fn drops_pieces_without_lines() {
        let text = "fn a() {} fn b() {}";
        let lines = LineIndex::new(text);
        let decls = DeclarationIndex::default();
        let pieces = vec![
            Piece::from_bytes(
                ByteChunk {
                    span: Span::new(0, 10),
                    kind: NodeKind::FunctionLike,
                },
                &lines,
            ),
            Piece::from_bytes(
                ByteChunk {
                    span: Span::new(10, text.len()),
                    kind: NodeKind::FunctionLike,
                },
                &lines,
            ),
        ];
        assert!(pieces[0].lines.is_empty());

        let merged = ChunkMerger::new(5, &lines, &decls).merge(pieces);
        assert_eq!(line_ranges(&merged), vec![(0, 1)]);
    }
}
