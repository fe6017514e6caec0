//! Content-addressable Merkle DAG object store.
//!
//! The crate is the data engine a version-control system is built on:
//!
//! - `areas`: infrastructure — object database, storage backends,
//!   reference table, and the [`Repository`] facade tying them together
//! - `artifacts`: domain objects and algorithms — blobs, trees, commits,
//!   history traversal, merge-base resolution, three-way merge, and
//!   integrity auditing
//!
//! All state is explicit: a [`Repository`] owns its [`Database`] and
//! [`Refs`], so multiple independent stores can coexist in one process
//! and tests can run fully in memory.

pub mod areas;
pub mod artifacts;
pub mod errors;

pub use areas::database::Database;
pub use areas::refs::{RefTarget, Refs};
pub use areas::repository::Repository;
pub use areas::storage::{FsStorage, MemoryStorage, StorageBackend};
pub use artifacts::audit::{Finding, VerificationReport};
pub use artifacts::merge::diff3::{Diff3, LineDiff3};
pub use artifacts::merge::tree_merge::{Conflict, ConflictKind, MergeResolution};
pub use artifacts::objects::blob::Blob;
pub use artifacts::objects::commit::{Author, Commit, SlimCommit};
pub use artifacts::objects::entry_mode::EntryMode;
pub use artifacts::objects::hasher::DigestKind;
pub use artifacts::objects::object::{Object, ObjectBox, Packable, Unpackable};
pub use artifacts::objects::object_id::ObjectId;
pub use artifacts::objects::object_type::ObjectType;
pub use artifacts::objects::tree::{Tree, TreeEntry};
pub use errors::{GritError, Result};
