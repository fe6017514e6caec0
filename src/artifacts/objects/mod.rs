//! Object model: the three object kinds, their canonical encodings, and
//! the content hashing that turns encodings into identities.

pub mod blob;
pub mod commit;
pub mod entry_mode;
pub mod hasher;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;
