//! Repository facade
//!
//! Ties one object database and one reference table together and
//! exposes the operations the surrounding systems (CLI, transport,
//! working-tree management) are built on. All state is explicit: a
//! process can hold any number of repositories, each with its own
//! backends.

use crate::areas::database::Database;
use crate::areas::refs::{RefTarget, Refs};
use crate::artifacts::audit::{self, VerificationReport};
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeDiff};
use crate::artifacts::log::rev_walk::{self, AncestorIter};
use crate::artifacts::merge::bca_finder::BcaFinder;
use crate::artifacts::merge::diff3::{Diff3, LineDiff3};
use crate::artifacts::merge::tree_merge::{MergeResolution, TreeMerge};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::hasher::DigestKind;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use crate::errors::Result;
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub struct Repository {
    database: Database,
    refs: Refs,
}

impl Repository {
    pub fn new(database: Database, refs: Refs) -> Self {
        Repository { database, refs }
    }

    /// Fully in-memory repository, primarily for tests and embedders.
    pub fn in_memory(digest: DigestKind) -> Self {
        Self::new(Database::in_memory(digest), Refs::in_memory())
    }

    /// Repository rooted at a directory: objects under `<root>/objects`,
    /// reference files under `<root>/refs` (one file per ref name, so
    /// `HEAD` lives at `refs/HEAD`).
    pub fn open(root: impl AsRef<Path>, digest: DigestKind) -> Result<Self> {
        let root = root.as_ref();
        Ok(Self::new(
            Database::on_disk(root.join("objects"), digest)?,
            Refs::on_disk(root.join("refs"))?,
        ))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    // --- write path ---

    pub fn store_blob(&self, content: &[u8]) -> Result<ObjectId> {
        self.database.store(&Blob::from_slice(content))
    }

    pub fn store_tree(
        &self,
        entries: impl IntoIterator<Item = (String, TreeEntry)>,
    ) -> Result<ObjectId> {
        self.database.store(&Tree::from_entries(entries)?)
    }

    /// Store a commit snapshot. The timestamp travels inside `author`;
    /// the engine never reads a clock, so hashing stays deterministic.
    pub fn store_commit(
        &self,
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: Author,
        message: impl Into<String>,
    ) -> Result<ObjectId> {
        self.database
            .store(&Commit::new(parents, tree, author, message.into()))
    }

    // --- read path ---

    pub fn load_object(&self, oid: &ObjectId) -> Result<ObjectBox> {
        self.database.load(oid)
    }

    pub fn resolve_ref(&self, name: &str) -> Result<ObjectId> {
        self.refs.resolve(name)
    }

    pub fn list_refs(&self) -> Result<Vec<String>> {
        self.refs.list()
    }

    pub fn reverse_refs(&self) -> Result<HashMap<ObjectId, Vec<String>>> {
        self.refs.reverse_refs()
    }

    pub fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        self.database.find_by_prefix(prefix)
    }

    // --- reference mutation ---

    /// Point a reference at a commit. The target must decode as a
    /// commit; dangling or wrong-kind branch pointers are rejected here
    /// rather than discovered later mid-traversal.
    pub fn set_ref(&self, name: &str, target: &ObjectId) -> Result<()> {
        self.database.load_commit(target)?;
        self.refs.set(name, RefTarget::Direct(target.clone()))
    }

    pub fn set_symbolic_ref(&self, name: &str, target_name: &str) -> Result<()> {
        self.refs
            .set(name, RefTarget::Symbolic(target_name.to_string()))
    }

    /// Optimistic-concurrency branch advance; see [`Refs::compare_and_set`].
    pub fn compare_and_set_ref(
        &self,
        name: &str,
        expected: Option<&ObjectId>,
        new: &ObjectId,
    ) -> Result<()> {
        self.database.load_commit(new)?;
        self.refs.compare_and_set(name, expected, new)
    }

    pub fn delete_ref(&self, name: &str) -> Result<()> {
        self.refs.delete(name)
    }

    // --- queries ---

    pub fn ancestors_of(&self, start: &ObjectId) -> Result<AncestorIter<'_>> {
        rev_walk::ancestors_of(&self.database, start)
    }

    pub fn is_ancestor(&self, candidate: &ObjectId, of: &ObjectId) -> Result<bool> {
        rev_walk::is_ancestor(&self.database, candidate, of)
    }

    /// History reachable from `root`, newest first, every commit before
    /// its parents.
    pub fn log(&self, root: &ObjectId) -> Result<Vec<ObjectId>> {
        rev_walk::topological_order(&self.database, std::slice::from_ref(root))
    }

    /// All best common ancestors of two commits. More than one result
    /// means a criss-cross history; which base to merge against is the
    /// caller's strategy choice. Empty means no shared history.
    pub fn merge_base(&self, a: &ObjectId, b: &ObjectId) -> Result<Vec<ObjectId>> {
        let finder = BcaFinder::new(|oid: &ObjectId| self.database.slim_commit(oid));
        finder.find_best_common_ancestors(a, b)
    }

    /// Change set between two snapshots (commit or tree hashes).
    pub fn tree_diff(&self, old: Option<&ObjectId>, new: Option<&ObjectId>) -> Result<ChangeSet> {
        let mut diff = TreeDiff::new(&self.database);
        diff.compare_oids(old, new, Path::new(""))?;
        Ok(diff.into_changes())
    }

    // --- merge ---

    /// Three-way merge with the built-in line-level content merger.
    pub fn three_way_merge(
        &self,
        base: Option<&ObjectId>,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> Result<MergeResolution> {
        self.three_way_merge_with(LineDiff3, base, ours, theirs)
    }

    /// Three-way merge with a caller-supplied content merger.
    pub fn three_way_merge_with<D: Diff3>(
        &self,
        diff3: D,
        base: Option<&ObjectId>,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> Result<MergeResolution> {
        TreeMerge::new(&self.database, diff3).merge(base, ours, theirs)
    }

    // --- audit ---

    pub fn verify(&self, roots: &[ObjectId]) -> Result<VerificationReport> {
        audit::verify(&self.database, roots)
    }

    /// Verify everything reachable from the current references.
    pub fn verify_from_refs(&self) -> Result<VerificationReport> {
        self.verify(&self.ref_roots()?)
    }

    /// Objects no reference can reach, id-sorted. Candidates for an
    /// external garbage collector; nothing is deleted here.
    pub fn unreachable_objects(&self) -> Result<Vec<ObjectId>> {
        let mut reachable = HashSet::new();
        let mut pending = self.ref_roots()?;

        while let Some(oid) = pending.pop() {
            if !reachable.insert(oid.clone()) {
                continue;
            }
            // Broken links are verify's business, not reachability's
            if let Ok(object) = self.database.load(&oid) {
                pending.extend(audit::references_of(&object));
            }
        }

        let mut unreachable = Vec::new();
        for oid in self.database.enumerate()? {
            let oid = oid?;
            if !reachable.contains(&oid) {
                unreachable.push(oid);
            }
        }
        unreachable.sort();
        Ok(unreachable)
    }

    fn ref_roots(&self) -> Result<Vec<ObjectId>> {
        let mut roots = Vec::new();
        for name in self.refs.list()? {
            if let Ok(oid) = self.refs.resolve(&name) {
                roots.push(oid);
            }
        }
        roots.sort();
        roots.dedup();
        Ok(roots)
    }
}
