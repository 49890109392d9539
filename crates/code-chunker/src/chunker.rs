use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::merger::{ChunkMerger, DeclarationIndex, Piece};
use crate::source::{NodeKind, SourceNode, SyntaxNode};
use crate::span::LineIndex;
use crate::strategy::LineWindowStrategy;
use crate::tree_chunker::TreeChunker;
use crate::types::CodeChunk;
use std::path::Path;

/// Main chunker interface for processing code
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk code from a string
    pub fn chunk_str(&self, content: &str, file_path: Option<&str>) -> Result<Vec<CodeChunk>> {
        if content.is_empty() {
            return Err(ChunkerError::EmptyContent);
        }

        let file_path = file_path.unwrap_or("unknown");
        let language = Language::from_path(file_path);

        self.chunk_with_language(content, file_path, language)
    }

    /// Chunk code from a file
    pub fn chunk_file(&self, path: impl AsRef<Path>) -> Result<Vec<CodeChunk>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file_path = path.to_str().unwrap_or("unknown");
        let language = Language::from_path(path);

        self.chunk_with_language(&content, file_path, language)
    }

    /// Chunk code with explicit language
    pub fn chunk_with_language(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<CodeChunk>> {
        if content.is_empty() {
            return Err(ChunkerError::EmptyContent);
        }

        if !self.config.accepts_language(language.as_str()) {
            return Err(ChunkerError::unsupported_language(language.as_str()));
        }

        if language.supports_ast() {
            match self.chunk_with_ast(content, file_path, language) {
                Ok(chunks) => return Ok(chunks),
                Err(e) if self.config.fallback_to_lines => {
                    log::warn!("AST chunking failed for {file_path}, falling back to lines: {e}");
                }
                Err(e) => return Err(e),
            }
        } else if !self.config.fallback_to_lines {
            return Err(ChunkerError::unsupported_language(language.as_str()));
        }

        Ok(self.chunk_by_lines(content, file_path))
    }

    /// Chunk a tree produced by an external parser.
    ///
    /// `root.full_span()` should cover the whole of `content`; bytes outside it
    /// are not part of any chunk.
    pub fn chunk_tree<N: SourceNode>(
        &self,
        root: &N,
        content: &str,
        file_path: &str,
    ) -> Vec<CodeChunk> {
        let lines = LineIndex::new(content);
        Self::chunk_pieces(root, &lines, self.config.max_chunk_chars)
            .into_iter()
            .map(|piece| {
                CodeChunk::from_line_span(
                    file_path,
                    piece.lines,
                    lines.extract(content, piece.lines).to_string(),
                    piece.kind,
                )
            })
            .collect()
    }

    /// Tree chunking followed by merging, before text extraction
    pub fn chunk_pieces<N: SourceNode>(root: &N, lines: &LineIndex, max_size: usize) -> Vec<Piece> {
        let pieces: Vec<Piece> = TreeChunker::new(max_size, lines)
            .chunk(root)
            .into_iter()
            .map(|chunk| Piece::from_bytes(chunk, lines))
            .collect();

        let declarations = DeclarationIndex::build(root, lines);
        ChunkMerger::new(max_size, lines, &declarations).merge(pieces)
    }

    fn chunk_with_ast(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<CodeChunk>> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language.tree_sitter_language()?)
            .map_err(|e| ChunkerError::tree_sitter(e.to_string()))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::parse(format!("no syntax tree for {file_path}")))?;
        if tree.root_node().has_error() {
            log::debug!("{file_path} parsed with syntax errors; chunking the partial tree");
        }

        let root = SyntaxNode::root(&tree, language, content.len());
        Ok(self.chunk_tree(&root, content, file_path))
    }

    fn chunk_by_lines(&self, content: &str, file_path: &str) -> Vec<CodeChunk> {
        let lines = LineIndex::new(content);
        LineWindowStrategy::new(self.config.max_chunk_chars)
            .windows(&lines)
            .into_iter()
            .map(|window| {
                CodeChunk::from_line_span(
                    file_path,
                    window,
                    lines.extract(content, window).to_string(),
                    NodeKind::Other,
                )
            })
            .collect()
    }

    /// Get chunking statistics
    #[must_use]
    pub fn get_stats(&self, chunks: &[CodeChunk]) -> ChunkingStats {
        let sizes = || chunks.iter().map(|chunk| chunk.content.len());
        let total_bytes: usize = sizes().sum();
        ChunkingStats {
            total_chunks: chunks.len(),
            total_lines: chunks.iter().map(CodeChunk::line_count).sum(),
            total_bytes,
            avg_bytes_per_chunk: if chunks.is_empty() {
                0
            } else {
                total_bytes / chunks.len()
            },
            min_bytes: sizes().min().unwrap_or(0),
            max_bytes: sizes().max().unwrap_or(0),
            oversized_chunks: sizes()
                .filter(|len| *len > self.config.max_chunk_chars)
                .count(),
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_lines: usize,
    pub total_bytes: usize,
    pub avg_bytes_per_chunk: usize,
    pub min_bytes: usize,
    pub max_bytes: usize,
    /// Chunks larger than the budget (a single oversized node)
    pub oversized_chunks: usize,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Lines: {} | Bytes: {} | Avg: {} | Range: {}-{} | Oversized: {}",
            self.total_chunks,
            self.total_lines,
            self.total_bytes,
            self.avg_bytes_per_chunk,
            self.min_bytes,
            self.max_bytes,
            self.oversized_chunks
        )
    }
}
