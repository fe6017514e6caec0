//! Best common ancestor finder
//!
//! Computes the merge base(s) of two commits: the common ancestors that
//! are not themselves ancestors of any other common ancestor. Criss-cross
//! histories legitimately have more than one; all of them are returned
//! and the resolution policy is left to the caller.
//!
//! ## Algorithm
//!
//! Two phases:
//!
//! 1. Find all common ancestors with a bidirectional traversal. Commits
//!    from both sides are processed newest-first off a priority queue;
//!    each commit inherits the visit side(s) of its children. A commit
//!    seen from both sides is a common ancestor; its own ancestors are
//!    marked stale to prune the search.
//! 2. Filter to the maximal elements. Any common ancestor reachable
//!    from another common ancestor is redundant — it is not "lowest".
//!
//! Both phases are O(V+E) traversals over slim commits.

use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Result;
use bitflags::bitflags;
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use tracing::debug;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b00;
        const VISITED_FROM_SOURCE = 0b01;
        const VISITED_FROM_TARGET = 0b10;
        const VISITED_FROM_BOTH = Self::VISITED_FROM_SOURCE.bits() | Self::VISITED_FROM_TARGET.bits();
        // Commit is an ancestor of an already-found common ancestor
        const STALE = 0b100;
        // Commit is a common ancestor
        const RESULT = 0b1000;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::VISITED_FROM_SOURCE) {
            flags.push("SOURCE");
        }
        if self.contains(VisitState::VISITED_FROM_TARGET) {
            flags.push("TARGET");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if self.contains(VisitState::RESULT) {
            flags.push("RESULT");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

/// Merge-base resolver over any commit source.
///
/// Generic over the loader so it runs against a database, a cache, or a
/// plain map in tests — anything that can produce a [`SlimCommit`] for
/// an id.
pub struct BcaFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> Result<SlimCommit>,
{
    commit_loader: CommitLoaderFn,
}

impl<CommitLoaderFn> BcaFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> Result<SlimCommit>,
{
    pub fn new(commit_loader: CommitLoaderFn) -> Self {
        Self { commit_loader }
    }

    /// Phase 1: every common ancestor of `source` and `targets`,
    /// mapped to its final visit state. Stale entries are filtered out.
    fn find_common_ancestors(
        &self,
        source: &ObjectId,
        targets: &HashSet<&ObjectId>,
    ) -> Result<HashMap<ObjectId, VisitState>> {
        if targets.contains(source) {
            // The source is itself a target, hence the common ancestor
            return Ok(HashMap::from([(source.clone(), VisitState::RESULT)]));
        }

        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut queue = BinaryHeap::<(DateTime<FixedOffset>, ObjectId)>::new();

        let source_commit = (self.commit_loader)(source)?;
        states.insert(source.clone(), VisitState::VISITED_FROM_SOURCE);
        queue.push((source_commit.timestamp, source.clone()));

        for &target in targets {
            let target_commit = (self.commit_loader)(target)?;
            states.insert(target.clone(), VisitState::VISITED_FROM_TARGET);
            queue.push((target_commit.timestamp, target.clone()));
        }

        // Newest-first: a commit is only processed once both sides have
        // had the chance to reach it through younger history.
        while let Some((_, oid)) = queue.pop() {
            let current_state = states.get(&oid).copied().unwrap_or(VisitState::NONE);

            if current_state.contains(VisitState::STALE) {
                continue;
            }

            let is_common_ancestor = if current_state.contains(VisitState::VISITED_FROM_BOTH) {
                states
                    .entry(oid.clone())
                    .and_modify(|state| *state |= VisitState::RESULT);
                true
            } else {
                false
            };

            let commit = (self.commit_loader)(&oid)?;
            for parent in &commit.parents {
                let parent_state = states.get(parent).copied().unwrap_or(VisitState::NONE);

                // Parents inherit the sides their child was seen from;
                // ancestors of a common ancestor are pruned as stale
                let mut new_state = parent_state | current_state;
                if is_common_ancestor {
                    new_state |= VisitState::STALE;
                }

                if !parent_state.contains(current_state) {
                    let parent_commit = (self.commit_loader)(parent)?;
                    states.insert(parent.clone(), new_state);
                    queue.push((parent_commit.timestamp, parent.clone()));
                }
            }
        }

        Ok(states
            .into_iter()
            .filter(|(_, state)| {
                !state.contains(VisitState::STALE) && state.contains(VisitState::RESULT)
            })
            .collect())
    }

    /// All best common ancestors of two commits, id-sorted.
    ///
    /// Empty result means disjoint histories — a valid answer, reported
    /// upward as data rather than an error. More than one result means a
    /// criss-cross history; no candidate is an ancestor of another.
    pub fn find_best_common_ancestors(
        &self,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<Vec<ObjectId>> {
        let targets = HashSet::from([target]);
        let mut candidates: Vec<ObjectId> = self
            .find_common_ancestors(source, &targets)?
            .into_keys()
            .collect();
        candidates.sort();

        if candidates.is_empty() {
            debug!(%source, %target, "no common history");
            return Ok(Vec::new());
        }
        debug!(
            %source,
            %target,
            candidates = candidates.len(),
            "found common ancestors"
        );

        // Phase 2: drop every candidate reachable from another one
        let mut redundant = HashSet::<ObjectId>::new();
        for candidate in &candidates {
            if redundant.contains(candidate) {
                continue;
            }

            let others: HashSet<&ObjectId> = candidates
                .iter()
                .filter(|other| *other != candidate && !redundant.contains(*other))
                .collect();
            if others.is_empty() {
                continue;
            }

            let states = self.find_common_ancestors(candidate, &others)?;

            // Seen from the target side: the candidate sits below one
            // of the others
            if states
                .get(candidate)
                .unwrap_or(&VisitState::NONE)
                .contains(VisitState::VISITED_FROM_TARGET)
            {
                redundant.insert(candidate.clone());
            }

            for other in others {
                if states
                    .get(other)
                    .unwrap_or(&VisitState::NONE)
                    .contains(VisitState::VISITED_FROM_SOURCE)
                {
                    redundant.insert(other.clone());
                }
            }
        }

        let best: Vec<ObjectId> = candidates
            .into_iter()
            .filter(|candidate| !redundant.contains(candidate))
            .collect();
        debug!(best = best.len(), "best common ancestors");

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GritError;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// In-memory commit graph for driving the finder directly.
    #[derive(Default)]
    struct GraphFixture {
        commits: HashMap<ObjectId, SlimCommit>,
    }

    impl GraphFixture {
        fn add(&mut self, id: &str, parents: &[&str]) -> ObjectId {
            // Timestamps increase in insertion order, one hour apart
            let timestamp = FixedOffset::east_opt(0)
                .unwrap()
                .timestamp_opt(1_640_995_200 + self.commits.len() as i64 * 3600, 0)
                .unwrap();
            let oid = test_oid(id);
            let slim = SlimCommit {
                oid: oid.clone(),
                parents: parents.iter().map(|p| test_oid(p)).collect(),
                timestamp,
            };
            self.commits.insert(oid.clone(), slim);
            oid
        }

        fn finder(&self) -> BcaFinder<impl Fn(&ObjectId) -> Result<SlimCommit> + '_> {
            BcaFinder::new(|oid: &ObjectId| {
                self.commits
                    .get(oid)
                    .cloned()
                    .ok_or_else(|| GritError::CorruptGraph {
                        oid: oid.clone(),
                        reason: "commit missing from fixture".to_string(),
                    })
            })
        }
    }

    fn test_oid(id: &str) -> ObjectId {
        let mut hex = hex::encode(id.as_bytes());
        while hex.len() < 40 {
            hex.push('0');
        }
        hex.truncate(40);
        ObjectId::try_parse(hex).unwrap()
    }

    #[test]
    fn linear_history_base_is_the_older_commit() {
        // A <- B <- C <- D
        let mut graph = GraphFixture::default();
        let _a = graph.add("a", &[]);
        let b = graph.add("b", &["a"]);
        let _c = graph.add("c", &["b"]);
        let d = graph.add("d", &["c"]);

        let bases = graph.finder().find_best_common_ancestors(&b, &d).unwrap();
        assert_eq!(bases, vec![b]);
    }

    #[test]
    fn same_commit_is_its_own_base() {
        let mut graph = GraphFixture::default();
        let a = graph.add("a", &[]);

        let bases = graph.finder().find_best_common_ancestors(&a, &a).unwrap();
        assert_eq!(bases, vec![a]);
    }

    #[test]
    fn fork_base_is_the_fork_point() {
        //     A
        //    / \
        //   B   C
        let mut graph = GraphFixture::default();
        let a = graph.add("a", &[]);
        let b = graph.add("b", &["a"]);
        let c = graph.add("c", &["a"]);

        let bases = graph.finder().find_best_common_ancestors(&b, &c).unwrap();
        assert_eq!(bases, vec![a]);
    }

    #[test]
    fn diamond_base_is_the_junction_not_the_root() {
        //   A
        //   |
        //   B
        //  / \
        // C   D
        //  \ /
        //   E (merge)   vs   F (on top of C)
        let mut graph = GraphFixture::default();
        let _a = graph.add("a", &[]);
        let _b = graph.add("b", &["a"]);
        let c = graph.add("c", &["b"]);
        let _d = graph.add("d", &["b"]);
        let e = graph.add("e", &["c", "d"]);
        let f = graph.add("f", &["c"]);

        let bases = graph.finder().find_best_common_ancestors(&e, &f).unwrap();
        assert_eq!(bases, vec![c]);
    }

    #[test]
    fn criss_cross_yields_both_bases() {
        //       A
        //      / \
        //     B   C
        //     |\ /|
        //     | X |
        //     |/ \|
        //     D   E
        //     |   |
        //     F   G
        let mut graph = GraphFixture::default();
        let _a = graph.add("a", &[]);
        let b = graph.add("b", &["a"]);
        let c = graph.add("c", &["a"]);
        let _d = graph.add("d", &["b", "c"]);
        let _e = graph.add("e", &["c", "b"]);
        let f = graph.add("f", &["d"]);
        let g = graph.add("g", &["e"]);

        // The histories merged into each other once on each side, so
        // both fork commits are maximal common ancestors.
        let mut expected = vec![b, c];
        expected.sort();

        let bases = graph.finder().find_best_common_ancestors(&f, &g).unwrap();
        assert_eq!(bases, expected);
    }

    #[test]
    fn disjoint_roots_have_no_base() {
        let mut graph = GraphFixture::default();
        let a = graph.add("a", &[]);
        let b = graph.add("b", &[]);
        let a2 = graph.add("a2", &["a"]);
        let b2 = graph.add("b2", &["b"]);

        let bases = graph.finder().find_best_common_ancestors(&a2, &b2).unwrap();
        assert_eq!(bases, Vec::<ObjectId>::new());
    }

    #[test]
    fn ancestor_of_the_other_side_is_the_base() {
        // A <- B <- C, base(B, C) = B
        let mut graph = GraphFixture::default();
        let _a = graph.add("a", &[]);
        let b = graph.add("b", &["a"]);
        let c = graph.add("c", &["b"]);

        let bases = graph.finder().find_best_common_ancestors(&c, &b).unwrap();
        assert_eq!(bases, vec![b]);
    }

    #[test]
    fn missing_commit_surfaces_loader_error() {
        let graph = GraphFixture::default();
        let ghost = test_oid("ghost");
        let other = test_oid("other");

        assert!(
            graph
                .finder()
                .find_best_common_ancestors(&ghost, &other)
                .is_err()
        );
    }
}
