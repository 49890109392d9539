use crate::error::{ContentTreeError, Result};
use crate::hash::{ChunkHash, Digest};
use crate::tree::{ContentTree, EntryKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONTENT_TREE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub path: String,
    pub kind: EntryKind,
    pub hash: Digest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunk_hashes: Vec<ChunkHash>,
}

/// Durable form of a [`ContentTree`]: every node with its stored hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTreeSnapshot {
    pub schema_version: u32,
    pub root_hash: Digest,
    pub prune_empty_dirs: bool,
    pub nodes: Vec<SnapshotNode>,
}

impl ContentTree {
    #[must_use]
    pub fn to_snapshot(&self) -> ContentTreeSnapshot {
        ContentTreeSnapshot {
            schema_version: CONTENT_TREE_SCHEMA_VERSION,
            root_hash: self.root_hash(),
            prune_empty_dirs: self.prunes_empty_dirs(),
            nodes: self
                .entries()
                .into_iter()
                .map(|node| SnapshotNode {
                    path: node.path().to_string(),
                    kind: node.kind(),
                    hash: node.hash(),
                    chunk_hashes: node.chunk_hashes().to_vec(),
                })
                .collect(),
        }
    }

    /// Rebuild a tree and check every stored hash against the recomputed one.
    pub fn from_snapshot(snapshot: &ContentTreeSnapshot) -> Result<Self> {
        if snapshot.schema_version != CONTENT_TREE_SCHEMA_VERSION {
            return Err(ContentTreeError::Schema {
                found: snapshot.schema_version,
                expected: CONTENT_TREE_SCHEMA_VERSION,
            });
        }

        let mut tree = Self::with_pruning(snapshot.prune_empty_dirs);
        for node in &snapshot.nodes {
            match node.kind {
                EntryKind::File => tree.add_or_update_file(&node.path, node.chunk_hashes.clone())?,
                EntryKind::Directory => tree.add_directory(&node.path)?,
                EntryKind::Root => {
                    return Err(ContentTreeError::Corrupt(
                        "root listed among snapshot nodes".to_string(),
                    ));
                }
            }
        }

        if tree.node_count() != snapshot.nodes.len() + 1 {
            return Err(ContentTreeError::Corrupt(format!(
                "snapshot lists {} nodes but rebuilds {}",
                snapshot.nodes.len(),
                tree.node_count() - 1
            )));
        }
        for node in &snapshot.nodes {
            check_hash(&node.path, node.hash, tree.node_hash(&node.path))?;
        }
        check_hash("", snapshot.root_hash, Some(tree.root_hash()))?;

        Ok(tree)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let snapshot: ContentTreeSnapshot = serde_json::from_slice(&bytes)?;
        let tree = Self::from_snapshot(&snapshot)?;
        log::debug!(
            "Loaded content tree with {} files from {}",
            tree.file_count(),
            path.as_ref().display()
        );
        Ok(tree)
    }

    /// Write the snapshot atomically (temp file, then rename).
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&self.to_snapshot())?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn check_hash(path: &str, stored: Digest, recomputed: Option<Digest>) -> Result<()> {
    match recomputed {
        Some(recomputed) if recomputed == stored => Ok(()),
        Some(recomputed) => Err(ContentTreeError::Consistency {
            path: path.to_string(),
            stored: stored.to_hex(),
            recomputed: recomputed.to_hex(),
        }),
        None => Err(ContentTreeError::Corrupt(format!(
            "snapshot node {path:?} missing after rebuild"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_tree() -> ContentTree {
        let mut tree = ContentTree::new();
        tree.add_or_update_file("src/lib.rs", vec![Digest::of("a"), Digest::of("b")])
            .unwrap();
        tree.add_or_update_file("src/bin/main.rs", vec![Digest::of("m")])
            .unwrap();
        tree.add_or_update_file("README.md", vec![]).unwrap();
        tree
    }

    #[tokio::test]
    async fn snapshot_roundtrip_preserves_hashes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("tree.json");

        let tree = sample_tree();
        tree.save(&path).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = ContentTree::load(&path).await.unwrap();
        assert_eq!(loaded.root_hash(), tree.root_hash());
        assert_eq!(loaded.files(), tree.files());
        assert_eq!(loaded.to_snapshot(), tree.to_snapshot());
        loaded.verify().unwrap();
    }

    #[test]
    fn empty_directories_survive_without_pruning() {
        let mut tree = ContentTree::with_pruning(false);
        tree.add_or_update_file("a/b/c.txt", vec![Digest::of("c")])
            .unwrap();
        tree.remove_file("a/b/c.txt");

        let restored = ContentTree::from_snapshot(&tree.to_snapshot()).unwrap();
        assert_eq!(restored.root_hash(), tree.root_hash());
        assert!(restored.get("a/b").is_some());
    }

    #[test]
    fn tampered_hash_is_rejected() {
        let mut snapshot = sample_tree().to_snapshot();
        let file = snapshot
            .nodes
            .iter_mut()
            .find(|node| node.path == "src/lib.rs")
            .unwrap();
        file.chunk_hashes.push(Digest::of("injected"));

        assert!(matches!(
            ContentTree::from_snapshot(&snapshot),
            Err(ContentTreeError::Consistency { .. })
        ));
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let mut snapshot = sample_tree().to_snapshot();
        snapshot.schema_version = 99;
        assert!(matches!(
            ContentTree::from_snapshot(&snapshot),
            Err(ContentTreeError::Schema { found: 99, .. })
        ));
    }

    #[tokio::test]
    async fn garbage_file_fails_to_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tree.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        assert!(matches!(
            ContentTree::load(&path).await,
            Err(ContentTreeError::Json(_))
        ));
    }
}
