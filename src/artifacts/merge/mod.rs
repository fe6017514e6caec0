//! Merge machinery
//!
//! - `bca_finder`: best common ancestor (merge base) resolution
//! - `tree_merge`: three-way merge of directory snapshots
//! - `diff3`: byte-level content merging behind a collaborator trait

pub mod bca_finder;
pub mod diff3;
pub mod tree_merge;
