//! Flat-file lists of saved endpoints and usernames.
//!
//! Each list is one entry per line, read in full at startup and rewritten in
//! full on every append. A missing file is an empty list. Failures here never
//! end a session; callers log them and carry on.

use std::{fs, io, path::PathBuf};

use thiserror::Error;

use crate::Endpoint;

/// Errors reading or writing a saved list.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading the file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Writing the file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// An entry that can live on one line of a saved list.
pub trait ListEntry: Sized + PartialEq {
    /// Parse one non-blank line. `None` skips the line.
    fn from_line(line: &str) -> Option<Self>;

    /// Render as one line.
    fn to_line(&self) -> String;
}

impl ListEntry for Endpoint {
    fn from_line(line: &str) -> Option<Self> {
        match Endpoint::parse_record(line) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                tracing::warn!("Skipping saved server entry: {}", e);
                None
            },
        }
    }

    fn to_line(&self) -> String {
        self.to_record()
    }
}

impl ListEntry for String {
    fn from_line(line: &str) -> Option<Self> {
        Some(line.to_string())
    }

    fn to_line(&self) -> String {
        self.clone()
    }
}

/// Ordered list of saved entries backed by a file.
#[derive(Debug, Clone)]
pub struct SavedList<T> {
    path: PathBuf,
    entries: Vec<T>,
}

impl<T: ListEntry> SavedList<T> {
    /// Empty list that will be written to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), entries: Vec::new() }
    }

    /// Load the list from `path`. A missing file yields an empty list.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty(path)),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let entries = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .filter_map(T::from_line)
            .collect();

        Ok(Self { path, entries })
    }

    /// Rewrite the whole file.
    pub fn save(&self) -> Result<(), StoreError> {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.to_line());
            text.push('\n');
        }
        fs::write(&self.path, text)
            .map_err(|source| StoreError::Write { path: self.path.clone(), source })
    }

    /// Append `entry` unless it is already present, then save.
    ///
    /// Returns `Ok(false)` if the entry was already saved.
    pub fn remember(&mut self, entry: T) -> Result<bool, StoreError> {
        if self.contains(&entry) {
            return Ok(false);
        }
        self.entries.push(entry);
        self.save()?;
        Ok(true)
    }

    /// Whether `entry` is in the list.
    pub fn contains(&self, entry: &T) -> bool {
        self.entries.contains(entry)
    }

    /// Entries in file order.
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let list: SavedList<String> = SavedList::load(dir.path().join("nope.txt")).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn legacy_servers_are_upgraded_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.txt");
        fs::write(&path, "10.0.0.1:12345\nchat.local:443:true\n").unwrap();

        let list: SavedList<Endpoint> = SavedList::load(&path).unwrap();
        assert_eq!(list.len(), 2);
        list.save().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "10.0.0.1:12345:false\nchat.local:443:true\n");
    }

    #[test]
    fn malformed_and_blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.txt");
        fs::write(&path, "\nnot-an-endpoint\nhost:1:false\n\n").unwrap();

        let list: SavedList<Endpoint> = SavedList::load(&path).unwrap();
        assert_eq!(list.entries(), &[Endpoint::new("host", 1, false)]);
    }

    #[test]
    fn remember_appends_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.txt");

        let mut list: SavedList<String> = SavedList::load(&path).unwrap();
        assert!(list.remember("alice".to_string()).unwrap());
        assert!(!list.remember("alice".to_string()).unwrap());
        assert!(list.remember("bob".to_string()).unwrap());

        let reloaded: SavedList<String> = SavedList::load(&path).unwrap();
        assert_eq!(reloaded.entries(), &["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn same_host_different_security_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let mut list: SavedList<Endpoint> = SavedList::empty(dir.path().join("servers.txt"));

        assert!(list.remember(Endpoint::new("h", 1, false)).unwrap());
        assert!(list.remember(Endpoint::new("h", 1, true)).unwrap());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut list: SavedList<String> =
            SavedList::empty(dir.path().join("missing-dir").join("users.txt"));

        let err = list.remember("alice".to_string()).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
    }
}
