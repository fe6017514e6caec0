//! Domain objects and algorithms
//!
//! - `audit`: reachability walk with re-hashing and cycle detection
//! - `diff`: change sets between two tree snapshots
//! - `log`: commit history traversal and ordering
//! - `merge`: merge-base resolution and three-way tree merging
//! - `objects`: object kinds, canonical encodings, content hashing

pub mod audit;
pub mod diff;
pub mod log;
pub mod merge;
pub mod objects;
