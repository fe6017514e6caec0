//! Object database
//!
//! The content-addressed store: computes identities, writes envelope
//! bytes through a [`StorageBackend`], and decodes stored objects back
//! into the typed model. Identical content always lands on the same key,
//! so the store deduplicates automatically and nothing is ever
//! overwritten.

use crate::areas::storage::{FsStorage, MemoryStorage, StorageBackend};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::hasher::{self, DigestKind};
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{GritError, Result};
use bytes::Bytes;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

pub struct Database {
    backend: Box<dyn StorageBackend>,
    digest: DigestKind,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

impl Database {
    pub fn new(backend: Box<dyn StorageBackend>, digest: DigestKind) -> Self {
        Database { backend, digest }
    }

    /// A database held entirely in memory.
    pub fn in_memory(digest: DigestKind) -> Self {
        Self::new(Box::new(MemoryStorage::new()), digest)
    }

    /// A database backed by an object directory on disk.
    pub fn on_disk(root: impl AsRef<Path>, digest: DigestKind) -> Result<Self> {
        Ok(Self::new(Box::new(FsStorage::new(root.as_ref())?), digest))
    }

    pub fn digest(&self) -> DigestKind {
        self.digest
    }

    /// Store an object, returning its identity.
    ///
    /// Idempotent: storing the same content twice writes once and
    /// returns the same id both times.
    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        let content = object.serialize()?;
        self.store_raw(object.object_type(), &content)
    }

    /// Store already-canonical content bytes under their computed id.
    pub fn store_raw(&self, object_type: ObjectType, content: &[u8]) -> Result<ObjectId> {
        let oid = self.digest.hash(object_type, content);

        if !self.backend.contains(&oid)? {
            let envelope = hasher::envelope(object_type, content);
            self.backend.write(&oid, &envelope)?;
            debug!(oid = %oid, kind = %object_type, "stored object");
        }

        Ok(oid)
    }

    /// Fetch an object's kind and canonical content.
    ///
    /// Validates the envelope header; a declared length that disagrees
    /// with the stored bytes means the entry cannot be trusted.
    pub fn get(&self, oid: &ObjectId) -> Result<(ObjectType, Bytes)> {
        let envelope = self
            .backend
            .read(oid)?
            .ok_or_else(|| GritError::NotFound(oid.clone()))?;

        let mut reader = Cursor::new(&envelope[..]);
        let (object_type, declared_len) =
            ObjectType::parse_header(&mut reader).map_err(|err| GritError::CorruptGraph {
                oid: oid.clone(),
                reason: err.to_string(),
            })?;

        let content = envelope.slice(reader.position() as usize..);
        if content.len() != declared_len {
            return Err(GritError::CorruptGraph {
                oid: oid.clone(),
                reason: format!(
                    "declared length {declared_len} but found {} content bytes",
                    content.len()
                ),
            });
        }

        Ok((object_type, content))
    }

    pub fn contains(&self, oid: &ObjectId) -> Result<bool> {
        self.backend.contains(oid)
    }

    /// Every id in the store, in no particular order. Fresh iteration
    /// per call.
    pub fn enumerate(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectId>> + '_>> {
        self.backend.enumerate()
    }

    /// Decode an object of any kind.
    pub fn load(&self, oid: &ObjectId) -> Result<ObjectBox> {
        let (object_type, content) = self.get(oid)?;
        let reader = Cursor::new(&content[..]);

        let decoded = match object_type {
            ObjectType::Blob => Blob::deserialize(reader, self.digest).map(ObjectBox::Blob),
            ObjectType::Tree => Tree::deserialize(reader, self.digest).map(ObjectBox::Tree),
            ObjectType::Commit => Commit::deserialize(reader, self.digest).map(ObjectBox::Commit),
        };

        decoded.map_err(|err| GritError::CorruptGraph {
            oid: oid.clone(),
            reason: err.to_string(),
        })
    }

    pub fn load_blob(&self, oid: &ObjectId) -> Result<Blob> {
        match self.load(oid)? {
            ObjectBox::Blob(blob) => Ok(blob),
            other => Err(self.kind_mismatch(oid, ObjectType::Blob, other.object_type())),
        }
    }

    pub fn load_tree(&self, oid: &ObjectId) -> Result<Tree> {
        match self.load(oid)? {
            ObjectBox::Tree(tree) => Ok(tree),
            other => Err(self.kind_mismatch(oid, ObjectType::Tree, other.object_type())),
        }
    }

    pub fn load_commit(&self, oid: &ObjectId) -> Result<Commit> {
        match self.load(oid)? {
            ObjectBox::Commit(commit) => Ok(commit),
            other => Err(self.kind_mismatch(oid, ObjectType::Commit, other.object_type())),
        }
    }

    /// The slim view the graph walkers run on.
    pub fn slim_commit(&self, oid: &ObjectId) -> Result<SlimCommit> {
        Ok(self.load_commit(oid)?.to_slim(oid.clone()))
    }

    /// Resolve an abbreviated hex prefix to full ids.
    ///
    /// Several matches mean the prefix is ambiguous; the caller decides
    /// how to report that. Scans the whole key space.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        let mut matches = Vec::new();
        for oid in self.enumerate()? {
            let oid = oid?;
            if oid.as_ref().starts_with(prefix) {
                matches.push(oid);
            }
        }
        matches.sort();
        Ok(matches)
    }

    fn kind_mismatch(&self, oid: &ObjectId, expected: ObjectType, found: ObjectType) -> GritError {
        GritError::CorruptGraph {
            oid: oid.clone(),
            reason: format!("expected {expected}, found {found}"),
        }
    }
}
