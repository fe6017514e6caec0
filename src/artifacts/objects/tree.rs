//! Tree object
//!
//! Trees are directory snapshots: named entries pointing at blobs
//! (files) and other trees (subdirectories). Entries are unique by name
//! and kept in byte-wise ascending name order, which makes the encoding
//! deterministic and therefore the content address stable regardless of
//! insertion order.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<octal-mode> <name>\0<raw-digest-bytes>`

use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::hasher::DigestKind;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{GritError, Result};
use bytes::Bytes;
use derive_new::new;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// One named slot in a tree: mode plus target hash.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub oid: ObjectId,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }
}

/// A directory snapshot: an ordered set of entries.
///
/// The `BTreeMap` representation enforces both invariants at once:
/// uniqueness by name and canonical byte-wise ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tree from any entry sequence; order does not matter.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, TreeEntry)>) -> Result<Self> {
        let mut tree = Self::empty();
        for (name, entry) in entries {
            tree.insert(name, entry)?;
        }
        Ok(tree)
    }

    /// Insert or replace an entry. Entry names are path components, not
    /// paths: separators and NUL are rejected.
    pub fn insert(&mut self, name: String, entry: TreeEntry) -> Result<()> {
        validate_entry_name(&name)?;
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Entries in canonical (byte-wise ascending name) order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, TreeEntry)> {
        self.entries.into_iter()
    }

    /// Names of all entries, canonical order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(GritError::InvalidObject(format!(
            "invalid tree entry name: {name:?}"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(GritError::InvalidObject(format!(
            "tree entry name contains separator or NUL: {name:?}"
        )));
    }
    Ok(())
}

impl Packable for Tree {
    fn serialize(&self) -> Result<Bytes> {
        let mut content = Vec::new();

        for (name, entry) in &self.entries {
            write!(content, "{} {}\0", entry.mode.as_str(), name)?;
            entry.oid.write_raw_to(&mut content)?;
        }

        Ok(Bytes::from(content))
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead, digest: DigestKind) -> Result<Self> {
        let mut entries = BTreeMap::new();

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(GritError::InvalidObject(
                    "unexpected EOF in tree entry mode".to_string(),
                ));
            }

            let mode_str = std::str::from_utf8(&mode_bytes)
                .map_err(|_| GritError::InvalidObject("non-utf8 tree entry mode".to_string()))?;
            let mode = EntryMode::try_from(mode_str)?;

            name_bytes.clear();
            let n = reader.read_until(b'\0', &mut name_bytes)?;
            if n == 0 || name_bytes.pop() != Some(b'\0') {
                return Err(GritError::InvalidObject(
                    "unexpected EOF in tree entry name".to_string(),
                ));
            }
            let name = std::str::from_utf8(&name_bytes)
                .map_err(|_| GritError::InvalidObject("non-utf8 tree entry name".to_string()))?
                .to_owned();

            let oid = ObjectId::read_raw_from(&mut reader, digest.raw_len())?;

            entries.insert(name, TreeEntry::new(mode, oid));
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}
