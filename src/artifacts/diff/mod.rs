//! Snapshot comparison
//!
//! - `tree_diff`: recursive change set between two tree snapshots

pub mod tree_diff;
