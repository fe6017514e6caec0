//! Raw storage backends
//!
//! A backend is a durable key-value byte store keyed by object id. It
//! never interprets the bytes it holds; hashing and codec concerns live
//! in the [`Database`](crate::areas::database::Database) above it.
//!
//! Invariants every backend upholds:
//! - writes are atomic per key: after a crash an object is either fully
//!   present or absent, never half-written
//! - writes are idempotent: writing the same key twice is a no-op
//! - stored bytes are never mutated; keys are only added

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{GritError, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::trace;
use walkdir::WalkDir;

pub trait StorageBackend: Send + Sync {
    /// Read the raw bytes for an id, or `None` if absent.
    fn read(&self, oid: &ObjectId) -> Result<Option<Bytes>>;

    /// Write bytes under an id. Atomic; a no-op if the id already exists.
    fn write(&self, oid: &ObjectId, bytes: &[u8]) -> Result<()>;

    fn contains(&self, oid: &ObjectId) -> Result<bool>;

    /// A fresh, finite iteration over every stored id. No order is
    /// guaranteed; each call starts a new snapshot.
    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectId>> + '_>>;
}

/// Filesystem backend: one zlib-compressed file per object, fanned out
/// as `<root>/xx/rest-of-hex`.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(FsStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.root.join(oid.to_path())
    }

    fn compress(data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(data: &[u8]) -> Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(Bytes::from(decompressed))
    }
}

impl StorageBackend for FsStorage {
    fn read(&self, oid: &ObjectId) -> Result<Option<Bytes>> {
        let path = self.object_path(oid);
        let compressed = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(Self::decompress(&compressed)?))
    }

    fn write(&self, oid: &ObjectId, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(oid);
        if path.exists() {
            return Ok(());
        }

        let parent = path
            .parent()
            .ok_or_else(|| GritError::InvalidObject(format!("invalid object path for {oid}")))?;
        std::fs::create_dir_all(parent)?;

        // Write to a temp file in the same directory, then rename into
        // place: the object is either fully durable or not present.
        let compressed = Self::compress(bytes)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(&compressed)?;

        match temp.persist_noclobber(&path) {
            Ok(_) => {
                trace!(oid = %oid, "stored object file");
                Ok(())
            }
            // A concurrent writer finished first; identical content
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(err.error.into()),
        }
    }

    fn contains(&self, oid: &ObjectId) -> Result<bool> {
        Ok(self.object_path(oid).exists())
    }

    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectId>> + '_>> {
        let walker = WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.path().is_file() => {
                    let dir = entry
                        .path()
                        .parent()
                        .and_then(|p| p.file_name())
                        .map(|n| n.to_string_lossy().into_owned())?;
                    let file = entry.file_name().to_string_lossy().into_owned();
                    Some(ObjectId::try_parse(format!("{dir}{file}")))
                }
                Ok(_) => None,
                Err(err) => Some(Err(GritError::Storage(std::io::Error::other(err)))),
            });

        Ok(Box::new(walker))
    }
}

/// In-memory backend for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<ObjectId, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, oid: &ObjectId) -> Result<Option<Bytes>> {
        let objects = self.objects.read().expect("storage lock poisoned");
        Ok(objects.get(oid).cloned())
    }

    fn write(&self, oid: &ObjectId, bytes: &[u8]) -> Result<()> {
        let mut objects = self.objects.write().expect("storage lock poisoned");
        objects
            .entry(oid.clone())
            .or_insert_with(|| Bytes::copy_from_slice(bytes));
        Ok(())
    }

    fn contains(&self, oid: &ObjectId) -> Result<bool> {
        let objects = self.objects.read().expect("storage lock poisoned");
        Ok(objects.contains_key(oid))
    }

    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectId>> + '_>> {
        let objects = self.objects.read().expect("storage lock poisoned");
        let snapshot: Vec<ObjectId> = objects.keys().cloned().collect();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}
