//! Commit graph traversal
//!
//! All traversals run on [`SlimCommit`]s (id, parents, timestamp) so a
//! walk never inflates trees or messages. Any hash that does not
//! resolve to a commit surfaces as `CorruptGraph`: a dangling or
//! wrong-kind parent means the history cannot be trusted.

use crate::areas::database::Database;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{GritError, Result};
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Load the slim view of a commit for traversal purposes. A missing
/// object is a broken parent link here, not a recoverable absence.
fn slim(database: &Database, oid: &ObjectId) -> Result<SlimCommit> {
    database.slim_commit(oid).map_err(|err| match err {
        GritError::NotFound(oid) => GritError::CorruptGraph {
            oid,
            reason: "commit referenced but not present".to_string(),
        },
        other => other,
    })
}

/// Lazy iteration over every commit reachable from a start commit by
/// following parent links. The start itself is not yielded; each
/// ancestor is yielded exactly once.
///
/// The iterator is driven by an explicit work-list, so arbitrarily deep
/// histories walk in constant stack space and the caller can stop early
/// at any object boundary.
pub struct AncestorIter<'d> {
    database: &'d Database,
    pending: Vec<ObjectId>,
    visited: HashSet<ObjectId>,
    poisoned: bool,
}

impl<'d> AncestorIter<'d> {
    pub fn new(database: &'d Database, start: &ObjectId) -> Result<Self> {
        let start_commit = slim(database, start)?;

        let mut visited = HashSet::from([start.clone()]);
        let mut pending = Vec::new();
        for parent in start_commit.parents {
            if visited.insert(parent.clone()) {
                pending.push(parent);
            }
        }

        Ok(AncestorIter {
            database,
            pending,
            visited,
            poisoned: false,
        })
    }
}

impl Iterator for AncestorIter<'_> {
    type Item = Result<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned {
            return None;
        }

        let oid = self.pending.pop()?;
        let commit = match slim(self.database, &oid) {
            Ok(commit) => commit,
            Err(err) => {
                self.poisoned = true;
                return Some(Err(err));
            }
        };

        for parent in commit.parents {
            if self.visited.insert(parent.clone()) {
                self.pending.push(parent);
            }
        }

        Some(Ok(oid))
    }
}

/// All commits reachable from `start` via parent links, excluding
/// `start` itself.
pub fn ancestors_of<'d>(database: &'d Database, start: &ObjectId) -> Result<AncestorIter<'d>> {
    AncestorIter::new(database, start)
}

/// Whether `candidate` is `of` itself or an ancestor of it.
///
/// Short-circuits: traversal stops as soon as the candidate is found
/// rather than materializing the full ancestor set.
pub fn is_ancestor(database: &Database, candidate: &ObjectId, of: &ObjectId) -> Result<bool> {
    if candidate == of {
        return Ok(true);
    }

    for ancestor in ancestors_of(database, of)? {
        if &ancestor? == candidate {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Linearize the DAG reachable from `roots` so that every commit
/// appears before any of its parents — newest history first, the order
/// a log is read in.
///
/// Where several commits are ready at once, the tie breaks by commit
/// timestamp descending; equal timestamps fall back to id order so the
/// result never depends on hash-table iteration.
pub fn topological_order(database: &Database, roots: &[ObjectId]) -> Result<Vec<ObjectId>> {
    // Collect the reachable sub-graph and how many children inside it
    // still block each commit.
    let mut commits: HashMap<ObjectId, SlimCommit> = HashMap::new();
    let mut blocking_children: HashMap<ObjectId, usize> = HashMap::new();

    let mut pending: Vec<ObjectId> = Vec::new();
    for root in roots {
        if !commits.contains_key(root) && !pending.contains(root) {
            pending.push(root.clone());
        }
    }

    while let Some(oid) = pending.pop() {
        if commits.contains_key(&oid) {
            continue;
        }
        let commit = slim(database, &oid)?;
        for parent in &commit.parents {
            *blocking_children.entry(parent.clone()).or_insert(0) += 1;
            if !commits.contains_key(parent) {
                pending.push(parent.clone());
            }
        }
        commits.insert(oid, commit);
    }

    // Kahn's algorithm over the child -> parent dependency direction,
    // with a max-heap keyed by (timestamp, id) as the ready set.
    let mut ready: BinaryHeap<(DateTime<FixedOffset>, ObjectId)> = commits
        .values()
        .filter(|commit| !blocking_children.contains_key(&commit.oid))
        .map(|commit| (commit.timestamp, commit.oid.clone()))
        .collect();

    let mut order = Vec::with_capacity(commits.len());
    while let Some((_, oid)) = ready.pop() {
        let commit = &commits[&oid];
        for parent in &commit.parents {
            let blocked = blocking_children
                .get_mut(parent)
                .expect("parent registered during collection");
            *blocked -= 1;
            if *blocked == 0 {
                let parent_commit = &commits[parent];
                ready.push((parent_commit.timestamp, parent_commit.oid.clone()));
            }
        }
        order.push(oid);
    }

    Ok(order)
}
