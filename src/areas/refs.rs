//! References (branches, tags, HEAD)
//!
//! References are human-readable names pointing at commits. They are
//! the only mutable state in the store. A reference is either:
//! - Direct: holding an object hash
//! - Symbolic: pointing at another reference name (e.g. HEAD -> refs/heads/main)
//!
//! ## File Format
//!
//! One file per reference under the refs root, containing either:
//! - A hex object hash (direct reference)
//! - `ref: <name>` for symbolic references
//!
//! Mutation of one reference is atomic: the filesystem backend takes an
//! exclusive lock per file, the in-memory backend a mutex. Symbolic
//! chains are kept acyclic at set time and re-checked on resolution.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{GritError, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use walkdir::WalkDir;

/// Pattern for the symbolic reference file form.
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Conventional name of the current-position reference.
pub const HEAD_REF_NAME: &str = "HEAD";

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// Direct object hash
    Direct(ObjectId),
    /// Redirect to another reference name
    Symbolic(String),
}

impl RefTarget {
    fn parse(content: &str) -> Result<Self> {
        let symref = Regex::new(SYMREF_REGEX).expect("symref pattern is valid");
        if let Some(captures) = symref.captures(content) {
            Ok(RefTarget::Symbolic(captures[1].to_string()))
        } else {
            Ok(RefTarget::Direct(ObjectId::try_parse(content)?))
        }
    }

    fn file_form(&self) -> String {
        match self {
            RefTarget::Direct(oid) => oid.as_ref().to_string(),
            RefTarget::Symbolic(name) => format!("ref: {name}"),
        }
    }
}

/// Raw per-name storage for references.
///
/// `update` is the atomic primitive: the backend holds an exclusive
/// per-name lock while the closure inspects the current value and
/// produces the new one. Everything above (symbolic chains, cycles,
/// compare-and-set) is backend-independent.
pub trait RefBackend: Send + Sync {
    fn read(&self, name: &str) -> Result<Option<String>>;

    /// Atomic read-modify-write. The closure may fail (e.g. a
    /// compare-and-set mismatch), in which case nothing is written.
    fn update(
        &self,
        name: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String>,
    ) -> Result<()>;

    /// Remove a name. Returns whether it existed.
    fn delete(&self, name: &str) -> Result<bool>;

    fn list(&self) -> Result<Vec<String>>;
}

/// Filesystem backend: one file per reference, exclusive file locks on
/// mutation.
#[derive(Debug)]
pub struct FsRefBackend {
    root: PathBuf,
}

impl FsRefBackend {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(FsRefBackend { root })
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && parent != self.root.as_path()
            && parent.read_dir().map(|mut d| d.next().is_none()).unwrap_or(false)
        {
            std::fs::remove_dir(parent)?;
            self.prune_empty_parent_dirs(parent)?;
        }

        Ok(())
    }
}

impl RefBackend for FsRefBackend {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let content = match std::fs::read_to_string(self.ref_path(name)) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let content = content.trim();
        if content.is_empty() {
            Ok(None)
        } else {
            Ok(Some(content.to_string()))
        }
    }

    fn update(
        &self,
        name: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String>,
    ) -> Result<()> {
        let path = self.ref_path(name);
        let existed = path.exists();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut ref_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let mut lock = file_guard::lock(&mut ref_file, file_guard::Lock::Exclusive, 0, 1)?;

        let mut current = String::new();
        lock.deref_mut().read_to_string(&mut current)?;
        let current = current.trim();
        let current = if current.is_empty() { None } else { Some(current) };

        let next = match apply(current) {
            Ok(next) => next,
            Err(err) => {
                // Don't leave an empty file behind for a name that
                // never existed
                drop(lock);
                if !existed {
                    let _ = std::fs::remove_file(&path);
                }
                return Err(err);
            }
        };

        let file = lock.deref_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(next.as_bytes())?;

        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let path = self.ref_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_parent_dirs(&path)?;
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                Some(relative.to_string_lossy().replace('\\', "/"))
            })
            .collect())
    }
}

/// In-memory backend for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryRefBackend {
    refs: Mutex<HashMap<String, String>>,
}

impl MemoryRefBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefBackend for MemoryRefBackend {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let refs = self.refs.lock().expect("ref lock poisoned");
        Ok(refs.get(name).cloned())
    }

    fn update(
        &self,
        name: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String>,
    ) -> Result<()> {
        let mut refs = self.refs.lock().expect("ref lock poisoned");
        let next = apply(refs.get(name).map(String::as_str))?;
        refs.insert(name.to_string(), next);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let mut refs = self.refs.lock().expect("ref lock poisoned");
        Ok(refs.remove(name).is_some())
    }

    fn list(&self) -> Result<Vec<String>> {
        let refs = self.refs.lock().expect("ref lock poisoned");
        Ok(refs.keys().cloned().collect())
    }
}

/// The reference table: named, mutable pointers into the object store.
pub struct Refs {
    backend: Box<dyn RefBackend>,
}

impl Refs {
    pub fn new(backend: Box<dyn RefBackend>) -> Self {
        Refs { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryRefBackend::new()))
    }

    pub fn on_disk(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(Box::new(FsRefBackend::new(root)?)))
    }

    /// Point a name at a hash or at another name.
    ///
    /// Setting a symbolic target that would close a loop back to `name`
    /// is rejected with `CyclicReference`.
    pub fn set(&self, name: &str, target: RefTarget) -> Result<()> {
        validate_ref_name(name)?;
        if let RefTarget::Symbolic(target_name) = &target {
            validate_ref_name(target_name)?;
            self.check_no_cycle(name, target_name)?;
        }

        debug!(name, target = %target.file_form(), "set reference");
        self.backend
            .update(name, &mut |_current| Ok(target.file_form()))
    }

    /// Optimistic-concurrency update of a direct reference.
    ///
    /// `expected` is the hash the caller last observed (`None` for "the
    /// name must not exist yet"). A mismatch fails with
    /// `ReferenceChanged` and leaves the reference untouched; the caller
    /// re-reads and retries. Symbolic indirection is followed first, so
    /// updating through HEAD advances the branch it points at.
    pub fn compare_and_set(
        &self,
        name: &str,
        expected: Option<&ObjectId>,
        new: &ObjectId,
    ) -> Result<()> {
        validate_ref_name(name)?;
        let final_name = self.follow_to_final_name(name)?;

        self.backend.update(&final_name, &mut |current| {
            let actual = match current {
                None => None,
                Some(content) => match RefTarget::parse(content)? {
                    RefTarget::Direct(oid) => Some(oid),
                    // The chain moved under us
                    RefTarget::Symbolic(_) => {
                        return Err(GritError::ReferenceChanged {
                            name: final_name.clone(),
                            expected: expected.cloned(),
                            actual: None,
                        });
                    }
                },
            };

            if actual.as_ref() != expected {
                return Err(GritError::ReferenceChanged {
                    name: final_name.clone(),
                    expected: expected.cloned(),
                    actual,
                });
            }

            Ok(new.as_ref().to_string())
        })
    }

    /// Follow indirection to a final hash.
    ///
    /// `RefNotFound` if the name or anything in its chain is undefined;
    /// `CyclicReference` if the chain loops (defensive — `set` already
    /// rejects cycles, but files can be edited out-of-band).
    pub fn resolve(&self, name: &str) -> Result<ObjectId> {
        let mut visited = HashSet::new();
        let mut current = name.to_string();

        loop {
            if !visited.insert(current.clone()) {
                return Err(GritError::CyclicReference(current));
            }

            let content = self
                .backend
                .read(&current)?
                .ok_or_else(|| GritError::RefNotFound(current.clone()))?;

            match RefTarget::parse(&content)? {
                RefTarget::Direct(oid) => return Ok(oid),
                RefTarget::Symbolic(next) => current = next,
            }
        }
    }

    /// Read one level without following indirection.
    pub fn read(&self, name: &str) -> Result<Option<RefTarget>> {
        match self.backend.read(name)? {
            None => Ok(None),
            Some(content) => Ok(Some(RefTarget::parse(&content)?)),
        }
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        if self.backend.delete(name)? {
            debug!(name, "deleted reference");
            Ok(())
        } else {
            Err(GritError::RefNotFound(name.to_string()))
        }
    }

    /// All known reference names. These are the reachability roots.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = self.backend.list()?;
        names.sort();
        Ok(names)
    }

    /// Map resolved targets back to the names pointing at them.
    /// Dangling references are skipped.
    pub fn reverse_refs(&self) -> Result<HashMap<ObjectId, Vec<String>>> {
        let mut reverse: HashMap<ObjectId, Vec<String>> = HashMap::new();
        for name in self.list()? {
            if let Ok(oid) = self.resolve(&name) {
                reverse.entry(oid).or_default().push(name);
            }
        }
        Ok(reverse)
    }

    /// Walk a proposed symbolic chain and reject it if it reaches back
    /// to `name`.
    fn check_no_cycle(&self, name: &str, target_name: &str) -> Result<()> {
        let mut visited = HashSet::new();
        let mut current = target_name.to_string();

        loop {
            if current == name || !visited.insert(current.clone()) {
                return Err(GritError::CyclicReference(name.to_string()));
            }

            match self.backend.read(&current)? {
                Some(content) => match RefTarget::parse(&content)? {
                    RefTarget::Symbolic(next) => current = next,
                    RefTarget::Direct(_) => return Ok(()),
                },
                // Dangling symref: allowed, chain ends here
                None => return Ok(()),
            }
        }
    }

    /// Follow symbolic hops to the terminal name (the one holding, or
    /// about to hold, a direct hash).
    fn follow_to_final_name(&self, name: &str) -> Result<String> {
        let mut visited = HashSet::new();
        let mut current = name.to_string();

        loop {
            if !visited.insert(current.clone()) {
                return Err(GritError::CyclicReference(current));
            }

            match self.backend.read(&current)? {
                Some(content) => match RefTarget::parse(&content)? {
                    RefTarget::Symbolic(next) => current = next,
                    RefTarget::Direct(_) => return Ok(current),
                },
                None => return Ok(current),
            }
        }
    }
}

/// Validate a reference name.
///
/// Names are slash-separated components. Rejected: empty names, leading
/// or trailing slashes, components starting with a dot, `..`, a `.lock`
/// suffix, `@{`, control characters, and the special characters
/// `space * : ? [ \ ^ ~`.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let invalid = || GritError::InvalidRefName(name.to_string());

    if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
        return Err(invalid());
    }
    if name.starts_with('.') || name.contains("/.") || name.contains("..") {
        return Err(invalid());
    }
    if name.ends_with(".lock") || name.contains("@{") || name.contains("//") {
        return Err(invalid());
    }
    if name
        .chars()
        .any(|c| c.is_control() || " *:?[\\^~".contains(c))
    {
        return Err(invalid());
    }

    Ok(())
}
