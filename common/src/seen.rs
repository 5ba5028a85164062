//! The record of offers that have already been notified.
//!
//! [`SeenSet`] is the in-memory set; a [`SeenStore`] loads it at the start
//! of a run and persists it at the end. Two file formats are provided: a
//! JSON array and a newline-delimited list.

use crate::error::StoreError;
use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Identifiers of offers already notified. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    ids: BTreeSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns true if the identifier was not present before.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Persistence for the seen set.
pub trait SeenStore {
    /// Loads the set, or an empty one if nothing was persisted yet.
    fn load(&self) -> Result<SeenSet, StoreError>;

    /// Replaces the persisted set with `seen`.
    fn persist(&self, seen: &SeenSet) -> Result<(), StoreError>;
}

/// Stores the set as a pretty-printed JSON array of identifiers.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeenStore for JsonFileStore {
    fn load(&self) -> Result<SeenSet, StoreError> {
        let Some(content) = read_if_exists(&self.path)? else {
            debug!(path = %self.path.display(), "No seen-offer file yet, starting empty");
            return Ok(SeenSet::new());
        };

        let ids: Vec<String> =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let seen: SeenSet = ids.into_iter().collect();
        debug!(path = %self.path.display(), count = seen.len(), "Loaded seen offers");
        Ok(seen)
    }

    fn persist(&self, seen: &SeenSet) -> Result<(), StoreError> {
        let ids: Vec<&str> = seen.iter().collect();
        let json = serde_json::to_string_pretty(&ids).map_err(|e| StoreError::Write {
            path: self.path.clone(),
            source: std::io::Error::new(ErrorKind::InvalidData, e),
        })?;

        write_atomic(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), count = seen.len(), "Saved seen offers");
        Ok(())
    }
}

/// Stores the set as one identifier per line.
#[derive(Debug, Clone)]
pub struct LinesFileStore {
    path: PathBuf,
}

impl LinesFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeenStore for LinesFileStore {
    fn load(&self) -> Result<SeenSet, StoreError> {
        let Some(content) = read_if_exists(&self.path)? else {
            debug!(path = %self.path.display(), "No seen-offer file yet, starting empty");
            return Ok(SeenSet::new());
        };

        let seen: SeenSet = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        debug!(path = %self.path.display(), count = seen.len(), "Loaded seen offers");
        Ok(seen)
    }

    fn persist(&self, seen: &SeenSet) -> Result<(), StoreError> {
        let mut content = String::new();
        for id in seen.iter() {
            content.push_str(id);
            content.push('\n');
        }

        write_atomic(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), count = seen.len(), "Saved seen offers");
        Ok(())
    }
}

fn read_if_exists(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes through a temporary file in the target directory, then renames it
/// over the target so readers never observe a partial file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let write_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_err)?;

    let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(content).map_err(write_err)?;
    temp.flush().map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}
