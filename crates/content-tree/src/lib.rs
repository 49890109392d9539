//! Content-addressed tree of chunk hashes and change detection over it.
//!
//! ```text
//! (path, [chunk hash]) ──> ContentTree::add_or_update_file
//!                               │
//!                               ├─> file leaf hash
//!                               └─> ancestor hashes, up to the root
//!
//! ChangeDetector(tree) ──> has_changed / modified_chunks / file_delta
//! ContentTree::diff    ──> added / removed / modified files
//! ContentTreeSnapshot  <──> JSON on disk
//! ```
//!
//! Children are hashed in key order, so the root hash depends only on the
//! final contents, not on the order in which files were added.

mod detector;
mod error;
mod hash;
mod snapshot;
mod tree;

pub use detector::{common_prefix_len, ChangeDetector, FileDelta, FileStatus};
pub use error::{ContentTreeError, Result};
pub use hash::{ChunkHash, Digest};
pub use snapshot::{ContentTreeSnapshot, SnapshotNode, CONTENT_TREE_SCHEMA_VERSION};
pub use tree::{normalize_path, ContentTree, EntryKind, TreeDiff, TreeNode};
