use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of files chunked successfully
    pub files: usize,

    /// Number of chunks created
    pub chunks: usize,

    /// Total lines of code
    pub total_lines: usize,

    /// Files whose chunk hashes differ from the stored ones (new included)
    pub changed_files: usize,

    /// Chunks that have to be re-embedded downstream
    pub modified_chunks: usize,

    /// Files dropped from the tree because they no longer exist
    pub removed_files: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Languages found
    pub languages: BTreeMap<String, usize>,

    /// Errors encountered
    pub errors: Vec<String>,
}

impl IndexStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, language: &str, lines: usize) {
        self.files += 1;
        self.total_lines += lines;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_chunks(&mut self, count: usize) {
        self.chunks += count;
    }

    pub fn add_change(&mut self, modified_chunks: usize) {
        self.changed_files += 1;
        self.modified_chunks += modified_chunks;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Fold the counters of a batch into this run
    pub fn merge(&mut self, other: Self) {
        self.files += other.files;
        self.chunks += other.chunks;
        self.total_lines += other.total_lines;
        self.changed_files += other.changed_files;
        self.modified_chunks += other.modified_chunks;
        self.removed_files += other.removed_files;
        for (language, count) in other.languages {
            *self.languages.entry(language).or_insert(0) += count;
        }
        self.errors.extend(other.errors);
    }
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Files: {} | Chunks: {} | Changed: {} ({} chunks) | Removed: {} | Errors: {} | {} ms",
            self.files,
            self.chunks,
            self.changed_files,
            self.modified_chunks,
            self.removed_files,
            self.errors.len(),
            self.time_ms
        )
    }
}
