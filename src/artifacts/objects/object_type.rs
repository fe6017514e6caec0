use crate::errors::{GritError, Result};
use std::io::BufRead;

/// The closed set of object kinds.
///
/// Exactly three kinds exist by design; exhaustive matching everywhere
/// keeps encode/decode/verify honest if a kind is ever added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
        }
    }

    /// Parse the envelope header `"<kind> <length>\0"` off the front of
    /// a raw object, returning the kind and the declared content length.
    pub fn parse_header(data_reader: &mut impl BufRead) -> Result<(ObjectType, usize)> {
        let mut kind = Vec::new();
        data_reader.read_until(b' ', &mut kind)?;
        if kind.pop() != Some(b' ') {
            return Err(GritError::InvalidObject(
                "truncated object header".to_string(),
            ));
        }

        let kind = std::str::from_utf8(&kind)
            .map_err(|_| GritError::InvalidObject("non-utf8 object kind".to_string()))?;
        let object_type = ObjectType::try_from(kind)?;

        let mut size = Vec::new();
        data_reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            return Err(GritError::InvalidObject(
                "truncated object header".to_string(),
            ));
        }
        let size = std::str::from_utf8(&size)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| GritError::InvalidObject("invalid object length".to_string()))?;

        Ok((object_type, size))
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = GritError;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            other => Err(GritError::InvalidObject(format!(
                "invalid object type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
