//! # Reindex Code Chunker
//!
//! Budget-aware, syntax-tree-driven chunking of source files into contiguous
//! line ranges.
//!
//! ## Guarantees
//!
//! - Chunks are ordered and cover every line of the file exactly once
//! - Each chunk fits the byte budget unless one node or declaration alone exceeds it
//! - No chunk boundary falls inside a function body, nor inside a class
//!   outside the lines of its members
//! - Same input and budget give identical boundaries
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     │
//!     ├──> Language Detection (from extension)
//!     │
//!     ├──> Tree-sitter Parsing → SourceNode tree
//!     │    (or an external parser's OwnedNode tree)
//!     │
//!     ├──> TreeChunker
//!     │    ├─> Greedy packing of children, sized by whole lines
//!     │    ├─> Recursion into children larger than the budget
//!     │    └─> Gap filling over the root extent
//!     │
//!     ├──> Byte spans → line spans (LineIndex)
//!     │
//!     └──> ChunkMerger
//!          ├─> Forced merges across split declarations
//!          ├─> Backward, then forward merge of undersized chunks
//!          └─> Emit CodeChunk[] (1-indexed inclusive lines)
//! ```
//!
//! Files without a bundled grammar fall back to packing whole lines.
//!
//! ## Example
//!
//! ```rust
//! use reindex_code_chunker::{Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig::with_max_chars(80)).unwrap();
//!
//! let code = r#"
//! fn process_data(input: &str) -> String {
//!     let cleaned = input.trim();
//!     cleaned.to_uppercase()
//! }
//! "#;
//!
//! let chunks = chunker.chunk_str(code, Some("example.rs")).unwrap();
//! for chunk in chunks {
//!     println!("Chunk at lines {}-{}", chunk.start_line, chunk.end_line);
//! }
//! ```

mod chunker;
mod config;
mod error;
mod language;
mod merger;
mod source;
mod span;
mod strategy;
mod tree_chunker;
mod types;

pub use chunker::{Chunker, ChunkingStats};
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use merger::{ChunkMerger, DeclarationIndex, Piece};
pub use source::{NodeKind, OwnedNode, SourceNode, SyntaxNode};
pub use span::{close_gaps, LineIndex, Span};
pub use strategy::LineWindowStrategy;
pub use tree_chunker::{ByteChunk, TreeChunker};
pub use types::CodeChunk;
