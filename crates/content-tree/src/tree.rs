use crate::error::{ContentTreeError, Result};
use crate::hash::{ChunkHash, Digest, FieldHasher};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Handle of a node inside one [`ContentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Root,
    Directory,
    File,
}

impl EntryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Directory => "directory",
            Self::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    hash: Digest,
    kind: EntryKind,
    path: String,
    chunk_hashes: Vec<ChunkHash>,
    children: BTreeMap<String, NodeId>,
    parent: Option<NodeId>,
}

impl TreeNode {
    fn new(kind: EntryKind, path: String, parent: Option<NodeId>) -> Self {
        let mut node = Self {
            hash: Digest::from_bytes([0; 32]),
            kind,
            path,
            chunk_hashes: Vec::new(),
            children: BTreeMap::new(),
            parent,
        };
        node.hash = node.compute_hash(std::iter::empty());
        node
    }

    #[must_use]
    pub const fn hash(&self) -> Digest {
        self.hash
    }

    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn chunk_hashes(&self) -> &[ChunkHash] {
        &self.chunk_hashes
    }

    /// Names of the direct children, in key order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.children.keys().map(String::as_str)
    }

    /// Digest of kind, path, chunk hashes, then child hashes in key order.
    fn compute_hash(&self, child_hashes: impl Iterator<Item = Digest>) -> Digest {
        let mut hasher = FieldHasher::new();
        hasher
            .field(self.kind.as_str().as_bytes())
            .field(self.path.as_bytes())
            .field(&(self.chunk_hashes.len() as u64).to_be_bytes());
        for chunk in &self.chunk_hashes {
            hasher.field(chunk.as_bytes());
        }
        for child in child_hashes {
            hasher.field(child.as_bytes());
        }
        hasher.finish()
    }
}

/// Files, directories and subtrees that differ between two trees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl TreeDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Merkle tree mirroring a directory hierarchy.
///
/// File leaves carry the ordered chunk hashes of one file. Every mutation
/// recomputes the hashes of all ancestors before it returns, so the root hash
/// always fingerprints the whole tree.
#[derive(Debug, Clone)]
pub struct ContentTree {
    nodes: HashMap<NodeId, TreeNode>,
    index: HashMap<String, NodeId>,
    next_id: usize,
    root: NodeId,
    prune_empty_dirs: bool,
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTree {
    #[must_use]
    pub fn new() -> Self {
        Self::with_pruning(true)
    }

    /// `prune_empty_dirs` removes directories left without children by
    /// [`remove_file`](Self::remove_file).
    #[must_use]
    pub fn with_pruning(prune_empty_dirs: bool) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, TreeNode::new(EntryKind::Root, String::new(), None));
        let mut index = HashMap::new();
        index.insert(String::new(), root);
        Self {
            nodes,
            index,
            next_id: 1,
            root,
            prune_empty_dirs,
        }
    }

    #[must_use]
    pub const fn prunes_empty_dirs(&self) -> bool {
        self.prune_empty_dirs
    }

    /// Switch pruning on or off. Switching it on also drops directories that
    /// are already empty; returns how many were removed.
    pub fn set_prune_empty_dirs(&mut self, prune_empty_dirs: bool) -> usize {
        self.prune_empty_dirs = prune_empty_dirs;
        if !prune_empty_dirs {
            return 0;
        }

        let mut removed = 0;
        loop {
            let mut empty: Vec<NodeId> = self
                .nodes
                .iter()
                .filter(|(_, node)| node.kind == EntryKind::Directory && node.children.is_empty())
                .map(|(id, _)| *id)
                .collect();
            if empty.is_empty() {
                return removed;
            }
            empty.sort();
            for id in empty {
                let parent = self.detach(id);
                self.rehash_to_root(parent);
                removed += 1;
            }
        }
    }

    #[must_use]
    pub fn root_hash(&self) -> Digest {
        self.node(self.root).hash
    }

    /// Hash of the file or directory at `path`; an empty path is the root.
    #[must_use]
    pub fn node_hash(&self, path: &str) -> Option<Digest> {
        self.get(path).map(TreeNode::hash)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        let components = path_components(path);
        if components.contains(&"..") {
            return None;
        }
        self.index
            .get(&components.join("/"))
            .map(|id| self.node(*id))
    }

    /// Stored chunk hashes of a file, or `None` for unknown paths and directories.
    #[must_use]
    pub fn file_hashes(&self, path: &str) -> Option<&[ChunkHash]> {
        self.get(path)
            .filter(|node| node.kind == EntryKind::File)
            .map(TreeNode::chunk_hashes)
    }

    #[must_use]
    pub fn contains_file(&self, path: &str) -> bool {
        self.file_hashes(path).is_some()
    }

    /// All file paths, sorted.
    #[must_use]
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .nodes
            .values()
            .filter(|node| node.kind == EntryKind::File)
            .map(|node| node.path.clone())
            .collect();
        files.sort();
        files
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|node| node.kind == EntryKind::File)
            .count()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node except the root, sorted by path.
    pub fn entries(&self) -> Vec<&TreeNode> {
        let mut entries: Vec<&TreeNode> = self
            .nodes
            .values()
            .filter(|node| node.kind != EntryKind::Root)
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Insert or replace the chunk hashes of the file at `path`, creating
    /// missing directories. Fails without changing the tree when the path is
    /// empty or collides with an existing node of the other kind.
    pub fn add_or_update_file(&mut self, path: &str, chunk_hashes: Vec<ChunkHash>) -> Result<()> {
        let components = valid_components(path)?;
        self.check_file_slot(&components)?;

        let mut parent = self.root;
        let mut prefix = String::new();
        for name in &components[..components.len() - 1] {
            push_component(&mut prefix, name);
            parent = match self.index.get(&prefix).copied() {
                Some(id) => id,
                None => self.insert_child(parent, name, EntryKind::Directory, prefix.clone()),
            };
        }

        push_component(&mut prefix, components[components.len() - 1]);
        let leaf = match self.index.get(&prefix).copied() {
            Some(id) => id,
            None => self.insert_child(
                parent,
                components[components.len() - 1],
                EntryKind::File,
                prefix,
            ),
        };

        self.node_mut(leaf).chunk_hashes = chunk_hashes;
        self.rehash_to_root(leaf);
        Ok(())
    }

    /// Ensure a directory exists at `path`.
    pub fn add_directory(&mut self, path: &str) -> Result<()> {
        let components = valid_components(path)?;
        let mut prefix = String::new();
        for name in &components {
            push_component(&mut prefix, name);
            if let Some(id) = self.index.get(&prefix) {
                if self.node(*id).kind == EntryKind::File {
                    return Err(ContentTreeError::conflict(
                        prefix,
                        "a file exists where a directory is needed",
                    ));
                }
            }
        }

        let mut parent = self.root;
        let mut prefix = String::new();
        let mut created = false;
        for name in &components {
            push_component(&mut prefix, name);
            parent = match self.index.get(&prefix).copied() {
                Some(id) => id,
                None => {
                    created = true;
                    self.insert_child(parent, name, EntryKind::Directory, prefix.clone())
                }
            };
        }
        if created {
            self.rehash_to_root(parent);
        }
        Ok(())
    }

    /// Remove the file at `path`. Unknown paths and directories are a no-op
    /// returning `false`.
    pub fn remove_file(&mut self, path: &str) -> bool {
        let Ok(key) = normalize_path(path) else {
            return false;
        };
        let Some(&id) = self.index.get(&key) else {
            return false;
        };
        if self.node(id).kind != EntryKind::File {
            return false;
        }

        let mut parent = self.detach(id);
        while self.prune_empty_dirs {
            let node = self.node(parent);
            if node.kind != EntryKind::Directory || !node.children.is_empty() {
                break;
            }
            parent = self.detach(parent);
        }
        self.rehash_to_root(parent);
        true
    }

    /// Compare against a newer tree, skipping subtrees whose hashes match.
    #[must_use]
    pub fn diff(&self, newer: &ContentTree) -> TreeDiff {
        let mut diff = TreeDiff::default();
        self.diff_nodes(self.root, newer, newer.root, &mut diff);
        diff.added.sort();
        diff.removed.sort();
        diff.modified.sort();
        diff
    }

    fn diff_nodes(&self, old_id: NodeId, newer: &ContentTree, new_id: NodeId, diff: &mut TreeDiff) {
        let old = self.node(old_id);
        let new = newer.node(new_id);
        if old.hash == new.hash {
            return;
        }

        if old.kind == EntryKind::File && new.kind == EntryKind::File {
            diff.modified.push(new.path.clone());
            return;
        }
        if old.kind == EntryKind::File || new.kind == EntryKind::File {
            self.collect_files(old_id, &mut diff.removed);
            newer.collect_files(new_id, &mut diff.added);
            return;
        }

        let names: BTreeSet<&String> = old.children.keys().chain(new.children.keys()).collect();
        for name in names {
            match (old.children.get(name), new.children.get(name)) {
                (Some(o), Some(n)) => self.diff_nodes(*o, newer, *n, diff),
                (Some(o), None) => self.collect_files(*o, &mut diff.removed),
                (None, Some(n)) => newer.collect_files(*n, &mut diff.added),
                (None, None) => {}
            }
        }
    }

    fn collect_files(&self, id: NodeId, out: &mut Vec<String>) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.kind == EntryKind::File {
                out.push(node.path.clone());
            }
            stack.extend(node.children.values().copied());
        }
    }

    /// Recompute every hash and check parent links and the path index.
    ///
    /// Deeper nodes are checked first, so a stale hash is reported where it
    /// originates rather than at an ancestor that merely includes it.
    pub fn verify(&self) -> Result<()> {
        let mut ordered: Vec<(&NodeId, &TreeNode)> = self.nodes.iter().collect();
        ordered.sort_by(|(_, a), (_, b)| {
            depth(&b.path)
                .cmp(&depth(&a.path))
                .then_with(|| a.path.cmp(&b.path))
        });

        for (id, node) in ordered {
            if self.index.get(&node.path) != Some(id) {
                return Err(ContentTreeError::Corrupt(format!(
                    "path index out of sync at {:?}",
                    node.path
                )));
            }
            for child in node.children.values() {
                let linked = self.nodes.get(child).and_then(|c| c.parent);
                if linked != Some(*id) {
                    return Err(ContentTreeError::Corrupt(format!(
                        "child of {:?} does not point back to it",
                        node.path
                    )));
                }
            }
            let recomputed = self.recompute(*id);
            if recomputed != node.hash {
                return Err(ContentTreeError::Consistency {
                    path: node.path.clone(),
                    stored: node.hash.to_hex(),
                    recomputed: recomputed.to_hex(),
                });
            }
        }
        if self.index.len() != self.nodes.len() {
            return Err(ContentTreeError::Corrupt(
                "path index has entries without nodes".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate the whole path before anything is created.
    fn check_file_slot(&self, components: &[&str]) -> Result<()> {
        let mut prefix = String::new();
        for (idx, name) in components.iter().enumerate() {
            push_component(&mut prefix, name);
            let Some(id) = self.index.get(&prefix) else {
                return Ok(());
            };
            let is_leaf = idx + 1 == components.len();
            match (self.node(*id).kind, is_leaf) {
                (EntryKind::File, false) => {
                    return Err(ContentTreeError::conflict(
                        prefix,
                        "a file exists where a directory is needed",
                    ));
                }
                (EntryKind::Directory, true) => {
                    return Err(ContentTreeError::conflict(
                        prefix,
                        "a directory exists at this path",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn insert_child(&mut self, parent: NodeId, name: &str, kind: EntryKind, path: String) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.index.insert(path.clone(), id);
        self.nodes.insert(id, TreeNode::new(kind, path, Some(parent)));
        self.node_mut(parent).children.insert(name.to_string(), id);
        id
    }

    /// Unlink a childless node from its parent and drop it; returns the parent.
    fn detach(&mut self, id: NodeId) -> NodeId {
        let parent = self.node(id).parent.unwrap_or(self.root);
        if let Some(node) = self.nodes.remove(&id) {
            self.index.remove(&node.path);
            self.node_mut(parent).children.retain(|_, child| *child != id);
        }
        parent
    }

    fn recompute(&self, id: NodeId) -> Digest {
        let node = self.node(id);
        node.compute_hash(node.children.values().map(|child| self.node(*child).hash))
    }

    fn rehash_to_root(&mut self, from: NodeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            let hash = self.recompute(id);
            let node = self.node_mut(id);
            node.hash = hash;
            current = node.parent;
        }
    }

    // Handles are only created by this tree and removed together with every
    // reference to them, so lookups cannot miss.
    fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[&id]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        self.nodes
            .get_mut(&id)
            .unwrap_or_else(|| unreachable!("dangling node handle {id:?}"))
    }
}

fn path_components(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}

fn valid_components(path: &str) -> Result<Vec<&str>> {
    let components = path_components(path);
    if components.is_empty() || components.contains(&"..") {
        return Err(ContentTreeError::InvalidPath(path.to_string()));
    }
    Ok(components)
}

/// Canonical `/`-separated form of a relative path.
pub fn normalize_path(path: &str) -> Result<String> {
    Ok(valid_components(path)?.join("/"))
}

fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.matches('/').count() + 1
    }
}

fn push_component(prefix: &mut String, name: &str) {
    if !prefix.is_empty() {
        prefix.push('/');
    }
    prefix.push_str(name);
}
