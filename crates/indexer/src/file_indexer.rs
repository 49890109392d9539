use crate::config::DEFAULT_BATCH_SIZE;
use reindex_code_chunker::{Chunker, ChunkerError, CodeChunk, Language};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One successfully chunked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    /// Relative, `/`-separated path
    pub path: String,
    pub chunks: Vec<CodeChunk>,
    pub language: String,
    pub lines: usize,
}

/// A file that could not be read or chunked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

impl std::fmt::Display for FileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Results of one batch, in input order
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub indexed: Vec<IndexedFile>,
    pub failures: Vec<FileFailure>,
    /// Set when at least one file was skipped because of cancellation
    pub cancelled: bool,
}

/// Results of a whole [`FileIndexer::index`] run
#[derive(Debug, Default)]
pub struct IndexOutput {
    pub files: BTreeMap<String, Vec<CodeChunk>>,
    pub failures: Vec<FileFailure>,
    pub cancelled: bool,
}

/// Receives the results of each batch as soon as it completes.
pub trait BatchSink {
    fn commit(&mut self, outcome: BatchOutcome) -> impl Future<Output = ()>;
}

impl BatchSink for IndexOutput {
    async fn commit(&mut self, outcome: BatchOutcome) {
        for file in outcome.indexed {
            self.files.insert(file.path, file.chunks);
        }
        self.failures.extend(outcome.failures);
    }
}

enum FileResult {
    Indexed(IndexedFile),
    Failed(FileFailure),
    Skipped,
}

/// Reads and chunks files in fixed-size batches.
///
/// Files of one batch run concurrently; the next batch starts only after the
/// previous one has finished. A failing file is logged and left out of the
/// result without affecting the others.
#[derive(Clone)]
pub struct FileIndexer {
    chunker: Arc<Chunker>,
    batch_size: usize,
}

impl FileIndexer {
    pub fn new(chunker: Arc<Chunker>, batch_size: usize) -> Self {
        Self {
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Chunk every file under `root`, batch by batch.
    pub async fn index(
        &self,
        root: &Path,
        files: &[String],
        cancel: &CancellationToken,
    ) -> IndexOutput {
        let mut output = IndexOutput::default();
        let cancelled = self.index_into(root, files, cancel, &mut output).await;
        output.cancelled = cancelled;
        output
    }

    /// Chunk `files` batch by batch, handing each finished batch to `sink`
    /// before the next one starts. Returns `true` when cancellation stopped
    /// the run early.
    pub async fn index_into<S: BatchSink>(
        &self,
        root: &Path,
        files: &[String],
        cancel: &CancellationToken,
        sink: &mut S,
    ) -> bool {
        for (batch_no, batch) in files.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return true;
            }

            log::debug!("Indexing batch {} ({} files)", batch_no + 1, batch.len());
            let outcome = self.index_batch(root, batch, cancel).await;
            let cancelled = outcome.cancelled;
            sink.commit(outcome).await;
            if cancelled {
                return true;
            }
        }
        false
    }

    /// Chunk one batch concurrently and wait for all of it.
    pub async fn index_batch(
        &self,
        root: &Path,
        batch: &[String],
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut tasks = Vec::with_capacity(batch.len());
        for relative in batch {
            let full_path = root.join(relative);
            let chunker = Arc::clone(&self.chunker);
            let cancel = cancel.clone();
            let owned = relative.clone();
            let task = tokio::spawn(async move {
                Self::process_file(chunker, full_path, owned, cancel).await
            });
            tasks.push((relative.clone(), task));
        }

        let mut outcome = BatchOutcome::default();
        for (path, task) in tasks {
            match task.await {
                Ok(FileResult::Indexed(file)) => outcome.indexed.push(file),
                Ok(FileResult::Failed(failure)) => {
                    log::warn!("Failed to process file: {failure}");
                    outcome.failures.push(failure);
                }
                Ok(FileResult::Skipped) => outcome.cancelled = true,
                Err(e) => {
                    let failure = FileFailure {
                        path,
                        reason: format!("Task panicked: {e}"),
                    };
                    log::warn!("Failed to process file: {failure}");
                    outcome.failures.push(failure);
                }
            }
        }

        outcome
    }

    async fn process_file(
        chunker: Arc<Chunker>,
        full_path: PathBuf,
        relative: String,
        cancel: CancellationToken,
    ) -> FileResult {
        if cancel.is_cancelled() {
            return FileResult::Skipped;
        }

        let failed = |reason: String| {
            FileResult::Failed(FileFailure {
                path: relative.clone(),
                reason,
            })
        };

        let bytes = match tokio::fs::read(&full_path).await {
            Ok(bytes) => bytes,
            Err(e) => return failed(e.to_string()),
        };
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => return failed("not valid UTF-8".to_string()),
        };
        let lines = content.lines().count();

        // Chunking is CPU-bound; keep it off the async workers.
        let path = relative.clone();
        let chunked =
            tokio::task::spawn_blocking(move || chunker.chunk_str(&content, Some(&path))).await;

        let chunks = match chunked {
            Ok(Ok(chunks)) => chunks,
            Ok(Err(ChunkerError::EmptyContent)) => Vec::new(),
            Ok(Err(e)) => return failed(e.to_string()),
            Err(e) => return failed(format!("chunking task failed: {e}")),
        };

        FileResult::Indexed(IndexedFile {
            language: Language::from_path(&relative).as_str().to_string(),
            path: relative,
            chunks,
            lines,
        })
    }
}

impl Default for FileIndexer {
    fn default() -> Self {
        Self::new(Arc::new(Chunker::default()), DEFAULT_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn project(files: &[(&str, &[u8])]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = temp.path().join(path);
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent).await.unwrap();
            }
            tokio::fs::write(full, content).await.unwrap();
        }
        temp
    }

    fn paths(files: &[&str]) -> Vec<String> {
        files.iter().map(|f| (*f).to_string()).collect()
    }

    #[tokio::test]
    async fn indexes_every_batch() {
        let temp = project(&[
            ("a.rs", b"fn a() {}\n"),
            ("b.py", b"def b():\n    pass\n"),
            ("c.txt", b"notes\n"),
            ("d/e.ts", b"function e() {}\n"),
            ("d/f.js", b"const f = () => 1;\n"),
        ])
        .await;
        let files = paths(&["a.rs", "b.py", "c.txt", "d/e.ts", "d/f.js"]);

        let indexer = FileIndexer::new(Arc::new(Chunker::default()), 2);
        let output = indexer
            .index(temp.path(), &files, &CancellationToken::new())
            .await;

        assert!(!output.cancelled);
        assert!(output.failures.is_empty());
        assert_eq!(output.files.keys().cloned().collect::<Vec<_>>(), files);
        assert_eq!(output.files["a.rs"][0].content, "fn a() {}\n");
        assert_eq!(output.files["a.rs"][0].file_path, "a.rs");
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_batch() {
        let temp = project(&[
            ("good.rs", b"fn good() {}\n"),
            ("binary.rs", &[0xff, 0xfe, 0x00, 0x41]),
        ])
        .await;
        let files = paths(&["good.rs", "binary.rs", "missing.rs"]);

        let outcome = FileIndexer::default()
            .index_batch(temp.path(), &files, &CancellationToken::new())
            .await;

        assert_eq!(outcome.indexed.len(), 1);
        assert_eq!(outcome.indexed[0].path, "good.rs");
        assert_eq!(outcome.indexed[0].language, "rust");
        let failed: Vec<&str> = outcome.failures.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(failed, vec!["binary.rs", "missing.rs"]);
    }

    #[tokio::test]
    async fn empty_file_has_no_chunks() {
        let temp = project(&[("empty.rs", b"")]).await;
        let outcome = FileIndexer::default()
            .index_batch(temp.path(), &paths(&["empty.rs"]), &CancellationToken::new())
            .await;

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.indexed[0].chunks, Vec::new());
    }

    #[derive(Default)]
    struct BatchLog {
        sizes: Vec<usize>,
    }

    impl BatchSink for BatchLog {
        async fn commit(&mut self, outcome: BatchOutcome) {
            self.sizes.push(outcome.indexed.len() + outcome.failures.len());
        }
    }

    #[tokio::test]
    async fn sink_sees_each_batch_in_order() {
        let temp = project(&[
            ("a.rs", b"fn a() {}\n"),
            ("b.rs", b"fn b() {}\n"),
            ("c.rs", b"fn c() {}\n"),
        ])
        .await;
        let files = paths(&["a.rs", "b.rs", "c.rs", "gone.rs", "e.rs"]);

        let indexer = FileIndexer::new(Arc::new(Chunker::default()), 2);
        let mut log = BatchLog::default();
        let cancelled = indexer
            .index_into(temp.path(), &files, &CancellationToken::new(), &mut log)
            .await;

        assert!(!cancelled);
        assert_eq!(log.sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn cancelled_run_stops_before_reading() {
        let temp = project(&[("a.rs", b"fn a() {}\n")]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let output = FileIndexer::default()
            .index(temp.path(), &paths(&["a.rs"]), &cancel)
            .await;
        assert!(output.cancelled);
        assert!(output.files.is_empty());
    }

    #[tokio::test]
    async fn chunks_follow_source_order() {
        let body: String = (0..30)
            .map(|i| format!("fn f{i}() -> u32 {{\n    {i}\n}}\n\n"))
            .collect();
        let temp = project(&[("many.rs", body.as_bytes())]).await;

        let chunker = Chunker::new(reindex_code_chunker::ChunkerConfig::with_max_chars(120)).unwrap();
        let indexer = FileIndexer::new(Arc::new(chunker), 8);
        let output = indexer
            .index(temp.path(), &paths(&["many.rs"]), &CancellationToken::new())
            .await;

        let chunks = &output.files["many.rs"];
        assert!(chunks.len() > 1);
        assert!(chunks.windows(2).all(|w| w[0].end_line < w[1].start_line));
    }
}
