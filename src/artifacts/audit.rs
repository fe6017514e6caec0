//! Store integrity auditing
//!
//! Walks every object reachable from a set of roots, re-hashing raw
//! bytes and checking structure. Findings accumulate into a report
//! instead of aborting the scan, so one corrupt object never hides
//! another. Only storage-medium failures abort.

use crate::areas::database::Database;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{GritError, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One problem discovered during verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Stored bytes no longer hash to their key, or do not decode.
    Corruption { oid: ObjectId, reason: String },
    /// A reachable object is absent from the store.
    Missing {
        oid: ObjectId,
        referenced_by: Option<ObjectId>,
    },
    /// A reference chain loops back into the traversal stack. Cannot
    /// arise from honest construction; checked defensively.
    Cycle { oid: ObjectId },
}

impl Finding {
    pub fn oid(&self) -> &ObjectId {
        match self {
            Finding::Corruption { oid, .. } | Finding::Missing { oid, .. } | Finding::Cycle { oid } => {
                oid
            }
        }
    }
}

/// Result of a verification scan. Empty findings means every reachable
/// object is present, intact, and acyclic.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub findings: Vec<Finding>,
    /// Distinct objects visited
    pub scanned: usize,
}

impl VerificationReport {
    pub fn is_intact(&self) -> bool {
        self.findings.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    /// On the current traversal stack
    Gray,
    /// Fully explored
    Black,
}

enum Visit {
    Enter(ObjectId, Option<ObjectId>),
    Exit(ObjectId),
}

/// Verify every object reachable from `roots`.
///
/// For each object the raw bytes are re-fetched, the digest recomputed
/// and compared against the key, and the decoded references followed.
/// A hash mismatch is recorded once; if the bytes still decode, the
/// walk continues through them to surface further findings.
pub fn verify(database: &Database, roots: &[ObjectId]) -> Result<VerificationReport> {
    let mut findings = Vec::new();
    let mut colors: HashMap<ObjectId, Color> = HashMap::new();
    let mut stack: Vec<Visit> = roots
        .iter()
        .map(|root| Visit::Enter(root.clone(), None))
        .collect();

    while let Some(visit) = stack.pop() {
        let (oid, referenced_by) = match visit {
            Visit::Exit(oid) => {
                colors.insert(oid, Color::Black);
                continue;
            }
            Visit::Enter(oid, referenced_by) => (oid, referenced_by),
        };

        match colors.get(&oid) {
            Some(Color::Gray) => {
                // Back-edge: the object is its own ancestor
                warn!(oid = %oid, "cycle detected in object graph");
                findings.push(Finding::Cycle { oid });
                continue;
            }
            // Revisit through a different path: already checked
            Some(Color::Black) => continue,
            None => {}
        }

        colors.insert(oid.clone(), Color::Gray);
        stack.push(Visit::Exit(oid.clone()));

        let (object_type, content) = match database.get(&oid) {
            Ok(found) => found,
            Err(GritError::NotFound(oid)) => {
                findings.push(Finding::Missing { oid, referenced_by });
                continue;
            }
            Err(GritError::CorruptGraph { oid, reason }) => {
                findings.push(Finding::Corruption { oid, reason });
                continue;
            }
            Err(err) => return Err(err),
        };

        let recomputed = database.digest().hash(object_type, &content);
        let hash_matches = recomputed == oid;
        if !hash_matches {
            warn!(expected = %oid, actual = %recomputed, "object bytes do not match their key");
            findings.push(Finding::Corruption {
                oid: oid.clone(),
                reason: format!("content hashes to {recomputed}"),
            });
        }

        let decoded = match database.load(&oid) {
            Ok(decoded) => decoded,
            Err(GritError::CorruptGraph { oid, reason }) => {
                // Undecodable on top of a hash mismatch adds no signal
                if hash_matches {
                    findings.push(Finding::Corruption { oid, reason });
                }
                continue;
            }
            Err(err) => return Err(err),
        };

        for child in references_of(&decoded) {
            stack.push(Visit::Enter(child, Some(oid.clone())));
        }
    }

    let report = VerificationReport {
        findings,
        scanned: colors.len(),
    };
    debug!(
        scanned = report.scanned,
        findings = report.findings.len(),
        "verification finished"
    );
    Ok(report)
}

/// The outgoing hash references of a decoded object.
pub(crate) fn references_of(object: &ObjectBox) -> Vec<ObjectId> {
    match object {
        ObjectBox::Blob(_) => Vec::new(),
        ObjectBox::Tree(tree) => tree.entries().map(|(_, entry)| entry.oid.clone()).collect(),
        ObjectBox::Commit(commit) => {
            let mut refs = vec![commit.tree_oid().clone()];
            refs.extend(commit.parents().iter().cloned());
            refs
        }
    }
}
