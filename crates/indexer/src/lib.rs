//! # Reindex Indexer
//!
//! Incremental project indexing: batched chunking plus a content-addressed
//! tree that tells which chunks need re-embedding.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware)
//!     │      └─> Relative source paths
//!     │
//!     ├──> FileIndexer (batches, concurrent within a batch)
//!     │      └─> Code chunks per file
//!     │
//!     └──> Content tree (one write lock per batch)
//!            └─> Changed files + chunks to re-embed
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use reindex_indexer::{IndexContext, IndexerConfig};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IndexerConfig::from_file("reindex.toml")?.with_env_overrides();
//!     let ctx = IndexContext::open(config).await?;
//!
//!     let report = ctx
//!         .scan_and_reindex(Path::new("/path/to/project"), &CancellationToken::new())
//!         .await?;
//!     println!(
//!         "{} files changed, {} chunks to embed",
//!         report.changes.len(),
//!         report.modified_chunk_count()
//!     );
//!     Ok(())
//! }
//! ```

mod config;
mod context;
mod error;
mod file_indexer;
mod scanner;
mod stats;

pub use config::{IndexerConfig, BATCH_SIZE_ENV, DEFAULT_BATCH_SIZE, MAX_CHUNK_CHARS_ENV};
pub use context::{FileChange, IndexContext, ReindexReport};
pub use error::{IndexerError, Result};
pub use file_indexer::{BatchOutcome, BatchSink, FileFailure, FileIndexer, IndexOutput, IndexedFile};
pub use scanner::FileScanner;
pub use stats::IndexStats;
