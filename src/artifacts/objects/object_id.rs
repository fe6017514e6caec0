//! Object identifier (content hash)
//!
//! Object IDs are hex-encoded digests uniquely identifying every object
//! in the store (blobs, trees, commits). The store is parametric over
//! the digest algorithm, so two widths are valid:
//!
//! - 40 hex characters (SHA-1 class, 20 raw bytes)
//! - 64 hex characters (SHA-256 class, 32 raw bytes)
//!
//! ## Storage
//!
//! Objects are stored under `objects/<first-2-chars>/<remaining-chars>`

use crate::errors::{GritError, Result};
use std::io;
use std::path::PathBuf;

/// Hex length of a SHA-1 class identifier.
pub const OBJECT_ID_HEX_LEN_SHA1: usize = 40;
/// Hex length of a SHA-256 class identifier.
pub const OBJECT_ID_HEX_LEN_SHA256: usize = 64;

/// Content hash identifying one object.
///
/// A validated lowercase hex string of either digest width. Computed once
/// at object-creation time; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse and validate an object ID from a hex string.
    ///
    /// Accepts either digest width (40 or 64 hex characters); rejects
    /// anything else.
    pub fn try_parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.len() != OBJECT_ID_HEX_LEN_SHA1 && id.len() != OBJECT_ID_HEX_LEN_SHA256 {
            return Err(GritError::InvalidObject(format!(
                "invalid object id length: {}",
                id.len()
            )));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GritError::InvalidObject(format!(
                "invalid object id characters: {id}"
            )));
        }
        Ok(Self(id.to_ascii_lowercase()))
    }

    pub fn from_raw_bytes(raw: &[u8]) -> Result<Self> {
        Self::try_parse(hex::encode(raw))
    }

    /// Write the identifier in raw binary form.
    ///
    /// Used when serializing tree entries, which embed target hashes as
    /// raw digest bytes rather than hex text.
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let raw = hex::decode(&self.0)
            .map_err(|_| GritError::InvalidObject(format!("invalid hex in object id {}", self.0)))?;
        writer.write_all(&raw)?;
        Ok(())
    }

    /// Read an identifier of the given raw width from binary form.
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R, raw_len: usize) -> Result<Self> {
        let mut raw = vec![0u8; raw_len];
        reader.read_exact(&mut raw)?;
        Self::from_raw_bytes(&raw)
    }

    /// Number of raw digest bytes behind this identifier.
    pub fn raw_len(&self) -> usize {
        self.0.len() / 2
    }

    /// Convert to the fanout path used by filesystem storage.
    ///
    /// Splits the hash as `xx/yyyy...` where `xx` is the first 2 chars.
    pub fn to_path(&self) -> PathBuf {
        let (dir, file) = self.0.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// Abbreviated form (first 7 characters) for display.
    pub fn to_short_oid(&self) -> String {
        self.0.split_at(7).0.to_string()
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
