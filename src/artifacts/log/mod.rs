//! Commit history traversal
//!
//! - `rev_walk`: lazy ancestor iteration, reachability queries, and
//!   deterministic topological ordering over the commit DAG

pub mod rev_walk;
