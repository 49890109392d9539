use crate::language::Language;
use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Syntactic category of a node, as far as chunking cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Body that groups declarations (impl/mod/namespace/class bodies)
    DeclarationBlock,
    /// Class, struct, enum, trait, interface
    ClassLike,
    /// Function, method, constructor
    FunctionLike,
    #[default]
    Other,
}

impl NodeKind {
    /// Declarations that the merger must never split across chunks.
    #[must_use]
    pub const fn is_declaration(self) -> bool {
        matches!(self, Self::ClassLike | Self::FunctionLike)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeclarationBlock => "declaration_block",
            Self::ClassLike => "class",
            Self::FunctionLike => "function",
            Self::Other => "other",
        }
    }
}

/// Read-only view of a parsed syntax tree node.
///
/// `full_span` is the byte extent including surrounding trivia. Children are
/// returned in source order and never overlap.
pub trait SourceNode: Sized {
    fn full_span(&self) -> Span;
    fn kind(&self) -> NodeKind;
    fn children(&self) -> Vec<Self>;
}

/// Owned syntax tree, for parsers that are not tree-sitter based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedNode {
    pub span: Span,
    pub kind: NodeKind,
    pub children: Vec<OwnedNode>,
}

impl OwnedNode {
    #[must_use]
    pub const fn leaf(start: usize, end: usize) -> Self {
        Self {
            span: Span::new(start, end),
            kind: NodeKind::Other,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn branch(kind: NodeKind, children: Vec<OwnedNode>) -> Self {
        let start = children.first().map_or(0, |c| c.span.start);
        let end = children.last().map_or(start, |c| c.span.end);
        Self {
            span: Span::new(start, end),
            kind,
            children,
        }
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl SourceNode for OwnedNode {
    fn full_span(&self) -> Span {
        self.span
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn children(&self) -> Vec<Self> {
        self.children.clone()
    }
}

/// Tree-sitter node adapter.
#[derive(Clone, Copy)]
pub struct SyntaxNode<'tree> {
    node: tree_sitter::Node<'tree>,
    language: Language,
    span_override: Option<Span>,
}

impl<'tree> SyntaxNode<'tree> {
    /// Wrap the root of a parsed tree. The root always spans the whole text so
    /// leading and trailing trivia belong to some chunk.
    #[must_use]
    pub fn root(tree: &'tree tree_sitter::Tree, language: Language, text_len: usize) -> Self {
        Self {
            node: tree.root_node(),
            language,
            span_override: Some(Span::new(0, text_len)),
        }
    }
}

impl SourceNode for SyntaxNode<'_> {
    fn full_span(&self) -> Span {
        self.span_override
            .unwrap_or_else(|| Span::new(self.node.start_byte(), self.node.end_byte()))
    }

    fn kind(&self) -> NodeKind {
        let raw = self.node.kind();
        if raw == "decorated_definition" {
            // Decorators belong to the definition they wrap.
            if let Some(definition) = self.node.child_by_field_name("definition") {
                return self.language.classify(definition.kind());
            }
        }
        self.language.classify(raw)
    }

    fn children(&self) -> Vec<Self> {
        let mut cursor = self.node.walk();
        self.node
            .children(&mut cursor)
            .map(|node| Self {
                node,
                language: self.language,
                span_override: None,
            })
            .collect()
    }
}
