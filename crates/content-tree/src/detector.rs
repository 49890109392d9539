use crate::hash::ChunkHash;
use crate::tree::ContentTree;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Path not present in the tree
    New,
    Unchanged,
    Modified,
}

/// How a freshly chunked file compares with its stored chunk hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDelta {
    pub path: String,
    pub status: FileStatus,
    /// Leading chunks shared by the stored and new sequences
    pub unchanged_prefix: usize,
    /// New chunks from the first difference onward
    pub modified: Vec<ChunkHash>,
    /// Stored chunks from the first difference onward, no longer current
    pub stale: Vec<ChunkHash>,
}

impl FileDelta {
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.status != FileStatus::Unchanged
    }
}

/// Read-only change queries against a [`ContentTree`].
///
/// Comparison is positional: everything after the longest common prefix of
/// the stored and new chunk sequences counts as modified, so an insertion near
/// the top of a file reports every later chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector<'a> {
    tree: &'a ContentTree,
}

impl<'a> ChangeDetector<'a> {
    #[must_use]
    pub const fn new(tree: &'a ContentTree) -> Self {
        Self { tree }
    }

    /// True when `path` is unknown or its stored sequence differs from `new`.
    #[must_use]
    pub fn has_changed(&self, path: &str, new: &[ChunkHash]) -> bool {
        self.tree
            .file_hashes(path)
            .map_or(true, |stored| stored != new)
    }

    /// The suffix of `new` after its longest common prefix with the stored
    /// sequence; all of `new` for unknown paths.
    #[must_use]
    pub fn modified_chunks(&self, path: &str, new: &[ChunkHash]) -> Vec<ChunkHash> {
        let stored = self.tree.file_hashes(path).unwrap_or_default();
        new[common_prefix_len(stored, new)..].to_vec()
    }

    #[must_use]
    pub fn file_delta(&self, path: &str, new: &[ChunkHash]) -> FileDelta {
        let Some(stored) = self.tree.file_hashes(path) else {
            return FileDelta {
                path: path.to_string(),
                status: FileStatus::New,
                unchanged_prefix: 0,
                modified: new.to_vec(),
                stale: Vec::new(),
            };
        };

        let prefix = common_prefix_len(stored, new);
        let status = if stored == new {
            FileStatus::Unchanged
        } else {
            FileStatus::Modified
        };
        FileDelta {
            path: path.to_string(),
            status,
            unchanged_prefix: prefix,
            modified: new[prefix..].to_vec(),
            stale: stored[prefix..].to_vec(),
        }
    }
}

#[must_use]
pub fn common_prefix_len(a: &[ChunkHash], b: &[ChunkHash]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
