use crate::config::IndexerConfig;
use crate::error::Result;
use crate::file_indexer::{BatchOutcome, BatchSink, FileFailure, FileIndexer};
use crate::scanner::FileScanner;
use crate::stats::IndexStats;
use reindex_code_chunker::{Chunker, CodeChunk};
use reindex_content_tree::{
    normalize_path, ChangeDetector, ChunkHash, ContentTree, Digest, FileDelta,
};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_util::sync::CancellationToken;

/// A file whose chunk sequence differs from the stored one.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub delta: FileDelta,
    /// Chunks from the first modified one onward, aligned with `delta.modified`
    pub chunks: Vec<CodeChunk>,
}

/// Outcome of one [`IndexContext::reindex`] call
#[derive(Debug, Clone)]
pub struct ReindexReport {
    pub changes: Vec<FileChange>,
    /// Paths dropped from the tree because they were not in the file list
    pub removed: Vec<String>,
    pub failures: Vec<FileFailure>,
    pub stats: IndexStats,
    pub root_hash: Digest,
    /// Set when the run stopped early; the tree holds every batch committed so far
    pub cancelled: bool,
}

impl ReindexReport {
    /// Number of chunks that need re-embedding downstream.
    #[must_use]
    pub fn modified_chunk_count(&self) -> usize {
        self.changes.iter().map(|c| c.delta.modified.len()).sum()
    }
}

/// Owns everything one project's incremental indexing needs.
///
/// The content tree sits behind a single-writer lock: a batch is committed
/// under one write acquisition, queries take the read side.
pub struct IndexContext {
    config: IndexerConfig,
    indexer: FileIndexer,
    tree: RwLock<ContentTree>,
}

impl IndexContext {
    /// Context with an empty tree.
    pub fn new(config: IndexerConfig) -> Result<Self> {
        let tree = ContentTree::with_pruning(config.prune_empty_dirs);
        Self::with_tree(config, tree)
    }

    /// Context restored from `state_file` when one is configured and readable.
    ///
    /// An unreadable, tampered or outdated snapshot is logged and replaced by
    /// an empty tree; the next run then reports every file as new. A loaded
    /// tree takes `prune_empty_dirs` from `config`, not from the snapshot.
    pub async fn open(config: IndexerConfig) -> Result<Self> {
        let tree = match &config.state_file {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
                match ContentTree::load(path).await {
                    Ok(mut tree) => {
                        log::info!(
                            "Loaded content tree from {} ({} files)",
                            path.display(),
                            tree.file_count()
                        );
                        if tree.prunes_empty_dirs() != config.prune_empty_dirs {
                            let dropped = tree.set_prune_empty_dirs(config.prune_empty_dirs);
                            log::info!(
                                "Empty directory pruning set to {} ({dropped} directories dropped)",
                                config.prune_empty_dirs
                            );
                        }
                        tree
                    }
                    Err(e) => {
                        log::warn!(
                            "Discarding content tree snapshot {}: {e}",
                            path.display()
                        );
                        ContentTree::with_pruning(config.prune_empty_dirs)
                    }
                }
            }
            _ => ContentTree::with_pruning(config.prune_empty_dirs),
        };
        Self::with_tree(config, tree)
    }

    fn with_tree(config: IndexerConfig, tree: ContentTree) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunker.clone())?;
        let indexer = FileIndexer::new(Arc::new(chunker), config.effective_batch_size());
        Ok(Self {
            config,
            indexer,
            tree: RwLock::new(tree),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &IndexerConfig {
        &self.config
    }

    #[must_use]
    pub const fn file_indexer(&self) -> &FileIndexer {
        &self.indexer
    }

    pub async fn root_hash(&self) -> Digest {
        self.tree.read().await.root_hash()
    }

    pub async fn has_changed(&self, path: &str, new: &[ChunkHash]) -> bool {
        ChangeDetector::new(&*self.tree.read().await).has_changed(path, new)
    }

    pub async fn modified_chunks(&self, path: &str, new: &[ChunkHash]) -> Vec<ChunkHash> {
        ChangeDetector::new(&*self.tree.read().await).modified_chunks(path, new)
    }

    /// Read access to the tree; writers wait until the guard is dropped.
    pub async fn tree(&self) -> RwLockReadGuard<'_, ContentTree> {
        self.tree.read().await
    }

    /// Persist the tree to `state_file`. Returns `false` when none is configured.
    pub async fn save(&self) -> Result<bool> {
        let Some(path) = &self.config.state_file else {
            return Ok(false);
        };
        self.tree.read().await.save(path).await?;
        log::debug!("Saved content tree to {}", path.display());
        Ok(true)
    }

    /// Scan `root` with [`FileScanner`] and reindex what it finds.
    pub async fn scan_and_reindex(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<ReindexReport> {
        let files = FileScanner::from_config(root, &self.config).scan();
        self.reindex(root, &files, cancel).await
    }

    /// Bring the tree in line with `files` (paths relative to `root`).
    ///
    /// Files missing from `files` are removed from the tree unless the run is
    /// cancelled. Files that fail to read or chunk keep their stored state.
    pub async fn reindex(
        &self,
        root: &Path,
        files: &[String],
        cancel: &CancellationToken,
    ) -> Result<ReindexReport> {
        let start = Instant::now();
        log::info!("Reindexing {} files under {}", files.len(), root.display());

        let mut failures = Vec::new();
        let mut stats = IndexStats::new();
        let mut wanted = BTreeSet::new();
        for path in files {
            match normalize_path(path) {
                Ok(normalized) => {
                    wanted.insert(normalized);
                }
                Err(e) => {
                    log::warn!("Skipping {path}: {e}");
                    stats.add_error(format!("{path}: {e}"));
                    failures.push(FileFailure {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        let wanted: Vec<String> = wanted.into_iter().collect();

        let mut commit = TreeCommit {
            tree: &self.tree,
            changes: Vec::new(),
            failures,
            stats,
            batches: 0,
        };
        let cancelled = self
            .indexer
            .index_into(root, &wanted, cancel, &mut commit)
            .await;
        let TreeCommit {
            changes,
            failures,
            mut stats,
            ..
        } = commit;

        let mut removed = Vec::new();
        if cancelled {
            log::info!("Reindex cancelled; keeping files not visited in this run");
        } else {
            let keep: HashSet<&str> = wanted.iter().map(String::as_str).collect();
            let mut tree = self.tree.write().await;
            for path in tree.files() {
                if !keep.contains(path.as_str()) && tree.remove_file(&path) {
                    removed.push(path);
                }
            }
            if !removed.is_empty() {
                log::info!("Purged {} missing files from content tree", removed.len());
            }
        }
        stats.removed_files = removed.len();

        let root_hash = self.tree.read().await.root_hash();
        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!("Reindex completed: {stats}");

        self.save().await?;

        Ok(ReindexReport {
            changes,
            removed,
            failures,
            stats,
            root_hash,
            cancelled,
        })
    }
}

/// Commits each finished batch to the tree under one write-lock acquisition.
struct TreeCommit<'a> {
    tree: &'a RwLock<ContentTree>,
    changes: Vec<FileChange>,
    failures: Vec<FileFailure>,
    stats: IndexStats,
    batches: usize,
}

impl BatchSink for TreeCommit<'_> {
    async fn commit(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        let files = outcome.indexed.len() + outcome.failures.len();
        let mut batch_stats = IndexStats::new();
        {
            let mut tree = self.tree.write().await;
            for file in outcome.indexed {
                batch_stats.add_file(&file.language, file.lines);
                batch_stats.add_chunks(file.chunks.len());

                let hashes: Vec<ChunkHash> =
                    file.chunks.iter().map(|c| Digest::of(&c.content)).collect();
                let delta = ChangeDetector::new(&tree).file_delta(&file.path, &hashes);
                if !delta.has_changed() {
                    continue;
                }

                if let Err(e) = tree.add_or_update_file(&file.path, hashes) {
                    log::warn!("Failed to record {}: {e}", file.path);
                    batch_stats.add_error(format!("{}: {e}", file.path));
                    self.failures.push(FileFailure {
                        path: file.path,
                        reason: e.to_string(),
                    });
                    continue;
                }

                batch_stats.add_change(delta.modified.len());
                let chunks = file
                    .chunks
                    .into_iter()
                    .skip(delta.unchanged_prefix)
                    .collect();
                self.changes.push(FileChange { delta, chunks });
            }
        }

        for failure in outcome.failures {
            batch_stats.add_error(failure.to_string());
            self.failures.push(failure);
        }
        log::debug!(
            "Committed batch {} ({} files, {} changed)",
            self.batches,
            files,
            batch_stats.changed_files
        );
        self.stats.merge(batch_stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reindex_content_tree::FileStatus;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn list(files: &[&str]) -> Vec<String> {
        files.iter().map(|f| (*f).to_string()).collect()
    }

    #[tokio::test]
    async fn normalizes_and_dedups_input_paths() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/lib.rs", "pub fn lib() {}\n");
        let ctx = IndexContext::new(IndexerConfig::default()).unwrap();

        let report = ctx
            .reindex(
                temp.path(),
                &list(&["src/lib.rs", "./src//lib.rs", "../escape.rs"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].delta.path, "src/lib.rs");
        assert_eq!(report.changes[0].delta.status, FileStatus::New);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "../escape.rs");
        assert_eq!(report.stats.files, 1);
    }

    #[tokio::test]
    async fn failed_file_keeps_previous_state() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.rs", "fn a() {}\n");
        let ctx = IndexContext::new(IndexerConfig::default()).unwrap();
        let files = list(&["a.rs"]);
        ctx.reindex(temp.path(), &files, &CancellationToken::new())
            .await
            .unwrap();
        let before = ctx.root_hash().await;

        std::fs::write(temp.path().join("a.rs"), [0xff, 0xfe]).unwrap();
        let report = ctx
            .reindex(temp.path(), &files, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.removed.is_empty());
        assert_eq!(report.root_hash, before);
        assert!(ctx.tree().await.contains_file("a.rs"));
    }

    #[tokio::test]
    async fn cancelled_run_commits_nothing_and_removes_nothing() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.rs", "fn a() {}\n");
        write(temp.path(), "b.rs", "fn b() {}\n");
        let ctx = IndexContext::new(IndexerConfig::default()).unwrap();
        ctx.reindex(temp.path(), &list(&["a.rs", "b.rs"]), &CancellationToken::new())
            .await
            .unwrap();
        let before = ctx.root_hash().await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = ctx
            .reindex(temp.path(), &list(&["a.rs"]), &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(report.removed.is_empty());
        assert_eq!(report.root_hash, before);
    }

    #[tokio::test]
    async fn queries_use_content_hashes() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", "def a():\n    return 1\n");
        let ctx = IndexContext::new(IndexerConfig::default()).unwrap();
        let report = ctx
            .reindex(temp.path(), &list(&["a.py"]), &CancellationToken::new())
            .await
            .unwrap();

        let stored: Vec<ChunkHash> = report.changes[0]
            .chunks
            .iter()
            .map(|c| Digest::of(&c.content))
            .collect();
        assert!(!ctx.has_changed("a.py", &stored).await);
        assert!(ctx.has_changed("b.py", &stored).await);
        assert_eq!(ctx.modified_chunks("a.py", &stored).await, Vec::new());
        assert_eq!(report.modified_chunk_count(), stored.len());
    }

    #[tokio::test]
    async fn open_applies_configured_pruning() {
        let state = TempDir::new().unwrap();
        let state_file = state.path().join("tree.json");
        let mut kept_empty = ContentTree::with_pruning(false);
        kept_empty
            .add_or_update_file("a/b/c.rs", vec![Digest::of("c")])
            .unwrap();
        assert!(kept_empty.remove_file("a/b/c.rs"));
        kept_empty.save(&state_file).await.unwrap();

        let config = IndexerConfig {
            state_file: Some(state_file),
            ..IndexerConfig::default()
        };
        let ctx = IndexContext::open(config).await.unwrap();

        let tree = ctx.tree().await;
        assert!(tree.prunes_empty_dirs());
        assert!(tree.get("a").is_none());
        assert_eq!(tree.root_hash(), ContentTree::new().root_hash());
    }

    #[tokio::test]
    async fn save_without_state_file_is_a_no_op() {
        let ctx = IndexContext::new(IndexerConfig::default()).unwrap();
        assert!(!ctx.save().await.unwrap());
    }
}
