//! Tree-to-tree difference
//!
//! Computes the set of paths added, deleted, or modified between two
//! snapshots, recursing through subtrees. Works on hashes: identical
//! subtree hashes are skipped without inflating them.

use crate::areas::database::Database;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use crate::errors::{GritError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChangeType {
    Added(TreeEntry),
    Deleted(TreeEntry),
    Modified { old: TreeEntry, new: TreeEntry },
}

impl TreeChangeType {
    pub fn from_entries(old: Option<TreeEntry>, new: Option<TreeEntry>) -> Option<Self> {
        match (old, new) {
            (None, Some(new)) => Some(TreeChangeType::Added(new)),
            (Some(old), None) => Some(TreeChangeType::Deleted(old)),
            (Some(old), Some(new)) if old != new => Some(TreeChangeType::Modified { old, new }),
            _ => None,
        }
    }

    pub fn old_entry(&self) -> Option<&TreeEntry> {
        match self {
            TreeChangeType::Deleted(entry) => Some(entry),
            TreeChangeType::Modified { old, .. } => Some(old),
            TreeChangeType::Added(_) => None,
        }
    }

    pub fn new_entry(&self) -> Option<&TreeEntry> {
        match self {
            TreeChangeType::Added(entry) => Some(entry),
            TreeChangeType::Modified { new, .. } => Some(new),
            TreeChangeType::Deleted(_) => None,
        }
    }
}

pub type ChangeSet = BTreeMap<PathBuf, TreeChangeType>;
type TreeEntryMap = BTreeMap<String, TreeEntry>;

#[derive(Debug)]
pub struct TreeDiff<'d> {
    database: &'d Database,
    change_set: ChangeSet,
}

impl<'d> TreeDiff<'d> {
    pub fn new(database: &'d Database) -> Self {
        TreeDiff {
            database,
            change_set: BTreeMap::new(),
        }
    }

    /// Compare two snapshots, accumulating changes under `prefix`.
    /// Either side may be absent (everything added / everything
    /// deleted). Accepts commit or tree hashes.
    pub fn compare_oids(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
        prefix: &Path,
    ) -> Result<()> {
        if old == new {
            return Ok(());
        }

        let old_entries = self.inflate_to_entries(old)?;
        let new_entries = self.inflate_to_entries(new)?;

        self.detect_deletions(&old_entries, &new_entries, prefix)?;
        self.detect_additions(&old_entries, &new_entries, prefix)?;

        Ok(())
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.change_set
    }

    pub fn into_changes(self) -> ChangeSet {
        self.change_set
    }

    fn inflate_to_entries(&self, oid: Option<&ObjectId>) -> Result<TreeEntryMap> {
        match oid {
            None => Ok(BTreeMap::new()),
            Some(oid) => Ok(self.inflate_to_tree(oid)?.into_entries().collect()),
        }
    }

    fn inflate_to_tree(&self, oid: &ObjectId) -> Result<Tree> {
        match self.database.load(oid)? {
            ObjectBox::Tree(tree) => Ok(tree),
            ObjectBox::Commit(commit) => self.database.load_tree(commit.tree_oid()),
            ObjectBox::Blob(_) => Err(GritError::CorruptGraph {
                oid: oid.clone(),
                reason: "expected tree or commit, found blob".to_string(),
            }),
        }
    }

    /// Entries present in `old`: deletions, modifications, and subtree
    /// recursion.
    fn detect_deletions(
        &mut self,
        old: &TreeEntryMap,
        new: &TreeEntryMap,
        prefix: &Path,
    ) -> Result<()> {
        for (name, entry) in old {
            let path = prefix.join(name);
            let other = new.get(name);

            if other == Some(entry) {
                continue;
            }

            let old_subtree = entry.is_tree().then_some(&entry.oid);
            let new_subtree = other.filter(|e| e.is_tree()).map(|e| &e.oid);
            self.compare_oids(old_subtree, new_subtree, &path)?;

            let old_blob = (!entry.is_tree()).then(|| entry.clone());
            let new_blob = other.filter(|e| !e.is_tree()).cloned();

            if let Some(change) = TreeChangeType::from_entries(old_blob, new_blob) {
                self.change_set.insert(path, change);
            }
        }

        Ok(())
    }

    /// Entries only present in `new`: additions, recursing into added
    /// subtrees.
    fn detect_additions(
        &mut self,
        old: &TreeEntryMap,
        new: &TreeEntryMap,
        prefix: &Path,
    ) -> Result<()> {
        for (name, entry) in new {
            let path = prefix.join(name);

            if old.contains_key(name) {
                continue;
            }

            if entry.is_tree() {
                self.compare_oids(None, Some(&entry.oid), &path)?;
            } else {
                self.change_set
                    .insert(path, TreeChangeType::Added(entry.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::entry_mode::EntryMode;
    use crate::artifacts::objects::hasher::DigestKind;
    use pretty_assertions::assert_eq;

    fn database() -> Database {
        Database::in_memory(DigestKind::Sha1)
    }

    fn store_blob(database: &Database, content: &str) -> ObjectId {
        database.store(&Blob::from_slice(content.as_bytes())).unwrap()
    }

    fn diff(database: &Database, old: &ObjectId, new: &ObjectId) -> ChangeSet {
        let mut tree_diff = TreeDiff::new(database);
        tree_diff
            .compare_oids(Some(old), Some(new), Path::new(""))
            .unwrap();
        tree_diff.into_changes()
    }

    #[test]
    fn reports_adds_deletes_and_modifications() {
        let database = database();

        let old = Tree::from_entries([
            (
                "kept".to_string(),
                TreeEntry::new(EntryMode::Regular, store_blob(&database, "same")),
            ),
            (
                "changed".to_string(),
                TreeEntry::new(EntryMode::Regular, store_blob(&database, "v1")),
            ),
            (
                "removed".to_string(),
                TreeEntry::new(EntryMode::Regular, store_blob(&database, "bye")),
            ),
        ])
        .unwrap();
        let new = Tree::from_entries([
            (
                "kept".to_string(),
                TreeEntry::new(EntryMode::Regular, store_blob(&database, "same")),
            ),
            (
                "changed".to_string(),
                TreeEntry::new(EntryMode::Regular, store_blob(&database, "v2")),
            ),
            (
                "added".to_string(),
                TreeEntry::new(EntryMode::Regular, store_blob(&database, "hi")),
            ),
        ])
        .unwrap();

        let old_oid = database.store(&old).unwrap();
        let new_oid = database.store(&new).unwrap();

        let changes = diff(&database, &old_oid, &new_oid);
        let paths: Vec<&PathBuf> = changes.keys().collect();
        assert_eq!(
            paths,
            vec![
                &PathBuf::from("added"),
                &PathBuf::from("changed"),
                &PathBuf::from("removed")
            ]
        );
        assert!(matches!(changes[&PathBuf::from("added")], TreeChangeType::Added(_)));
        assert!(matches!(
            changes[&PathBuf::from("changed")],
            TreeChangeType::Modified { .. }
        ));
        assert!(matches!(
            changes[&PathBuf::from("removed")],
            TreeChangeType::Deleted(_)
        ));
    }

    #[test]
    fn recurses_into_subtrees() {
        let database = database();

        let old_sub = Tree::from_entries([(
            "inner".to_string(),
            TreeEntry::new(EntryMode::Regular, store_blob(&database, "1")),
        )])
        .unwrap();
        let new_sub = Tree::from_entries([(
            "inner".to_string(),
            TreeEntry::new(EntryMode::Regular, store_blob(&database, "2")),
        )])
        .unwrap();

        let old_root = Tree::from_entries([(
            "dir".to_string(),
            TreeEntry::new(EntryMode::Directory, database.store(&old_sub).unwrap()),
        )])
        .unwrap();
        let new_root = Tree::from_entries([(
            "dir".to_string(),
            TreeEntry::new(EntryMode::Directory, database.store(&new_sub).unwrap()),
        )])
        .unwrap();

        let old_oid = database.store(&old_root).unwrap();
        let new_oid = database.store(&new_root).unwrap();

        let changes = diff(&database, &old_oid, &new_oid);
        assert_eq!(changes.len(), 1);
        assert!(changes.contains_key(&PathBuf::from("dir").join("inner")));
    }

    #[test]
    fn identical_trees_produce_no_changes() {
        let database = database();
        let tree = Tree::from_entries([(
            "f".to_string(),
            TreeEntry::new(EntryMode::Regular, store_blob(&database, "x")),
        )])
        .unwrap();
        let oid = database.store(&tree).unwrap();

        assert!(diff(&database, &oid, &oid).is_empty());
    }
}
