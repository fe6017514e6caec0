//! Error taxonomy for the object store.
//!
//! Structural and I/O failures are hard errors that abort the current
//! operation. Merge conflicts and audit findings are *not* represented
//! here: they are returned as data so the caller decides how to resolve
//! or present them.

use crate::artifacts::objects::object_id::ObjectId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GritError>;

#[derive(Debug, Error)]
pub enum GritError {
    /// An object hash that is not present in the store. Recoverable;
    /// the caller decides whether absence is an error.
    #[error("object {0} not found")]
    NotFound(ObjectId),

    /// A reference name (or something in its indirection chain) that
    /// does not exist.
    #[error("reference {0} not found")]
    RefNotFound(String),

    /// The underlying storage medium failed. The operation is aborted;
    /// per-object writes are atomic, so no partial object is left behind.
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    /// A traversal hit an object that decodes to the wrong kind or does
    /// not decode at all. Fatal for that traversal.
    #[error("corrupt graph at {oid}: {reason}")]
    CorruptGraph { oid: ObjectId, reason: String },

    /// An object failed validation before it entered the graph
    /// (malformed encoding, bad entry name, bad hash literal).
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// A symbolic reference chain loops back on itself. Rejected at
    /// set time, and re-checked defensively during resolution.
    #[error("cyclic symbolic reference through {0}")]
    CyclicReference(String),

    /// Optimistic-concurrency failure on a reference update. The caller
    /// may re-read the reference and retry.
    #[error("reference {name} changed concurrently")]
    ReferenceChanged {
        name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    /// A reference name that violates the naming rules.
    #[error("invalid reference name: {0}")]
    InvalidRefName(String),
}
