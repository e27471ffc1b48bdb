//! Content-addressable object store.
//!
//! Objects live under a 2-character prefix directory scheme (like git).
//! Each object is identified by the SHA-256 of its stored bytes. A
//! repository keeps two stores, one for blobs and one for commits.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StrataError, StrataResult};
use crate::fsutil::atomic_write;
use crate::hash::{content_address, is_hex_id};

/// The object store manages content-addressable storage on disk.
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Create a new ObjectStore rooted at the given path.
    pub fn new(objects_dir: &Path) -> Self {
        Self {
            root: objects_dir.to_path_buf(),
        }
    }

    /// Store bytes and return their content address.
    ///
    /// If an object with the same id already exists this is a no-op beyond
    /// computing the id.
    pub fn put(&self, data: &[u8]) -> StrataResult<String> {
        let id = content_address(data);
        if self.exists(&id) {
            return Ok(id);
        }

        atomic_write(&self.object_path(&id), data)?;
        debug!(%id, bytes = data.len(), store = %self.root.display(), "object written");
        Ok(id)
    }

    /// Retrieve an object by its id.
    pub fn get(&self, id: &str) -> StrataResult<Vec<u8>> {
        if !self.is_valid_id(id) {
            return Err(StrataError::ObjectNotFound(id.to_string()));
        }
        let path = self.object_path(id);
        if !path.exists() {
            return Err(StrataError::ObjectNotFound(id.to_string()));
        }
        Ok(fs::read(&path)?)
    }

    /// Check if an object exists.
    pub fn exists(&self, id: &str) -> bool {
        self.is_valid_id(id) && self.object_path(id).exists()
    }

    /// Ids are hex, and long enough to fill the fan-out directory.
    fn is_valid_id(&self, id: &str) -> bool {
        id.len() > 2 && is_hex_id(id)
    }

    /// Serialize `value` to canonical JSON and store it.
    pub fn put_json<T: Serialize>(&self, value: &T) -> StrataResult<String> {
        let bytes = serde_json::to_vec(value)?;
        self.put(&bytes)
    }

    /// Load and deserialize a JSON object.
    pub fn get_json<T: DeserializeOwned>(&self, id: &str) -> StrataResult<T> {
        let bytes = self.get(id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Every stored id, sorted.
    pub fn ids(&self) -> StrataResult<Vec<String>> {
        let mut ids = Vec::new();
        if !self.root.exists() {
            return Ok(ids);
        }
        for prefix_entry in fs::read_dir(&self.root)? {
            let prefix_entry = prefix_entry?;
            if !prefix_entry.file_type()?.is_dir() {
                continue;
            }
            let prefix = prefix_entry.file_name().to_string_lossy().to_string();
            for entry in fs::read_dir(prefix_entry.path())? {
                let entry = entry?;
                let rest = entry.file_name().to_string_lossy().to_string();
                if rest.ends_with(".tmp") {
                    continue;
                }
                ids.push(format!("{prefix}{rest}"));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Get the filesystem path for an object id.
    ///
    /// Uses 2-char prefix directories: id `abcdef...` -> `ab/cdef...`
    fn object_path(&self, id: &str) -> PathBuf {
        let (prefix, rest) = id.split_at(2);
        self.root.join(prefix).join(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn count_files(dir: &Path) -> usize {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count()
    }

    #[test]
    fn test_put_and_get() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let id = store.put(b"hello world").unwrap();
        assert_eq!(store.get(&id).unwrap(), b"hello world");
    }

    #[test]
    fn test_put_twice_keeps_one_copy() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let h1 = store.put(b"same content").unwrap();
        let h2 = store.put(b"same content").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(count_files(dir.path()), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        assert!(matches!(
            store.get("deadbeef00"),
            Err(StrataError::ObjectNotFound(_))
        ));
        assert!(store.get("a").is_err());
    }

    #[test]
    fn test_get_rejects_non_hex_ids() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        store.put(b"x").unwrap();

        let multibyte = format!("a\u{e9}{}", "0".repeat(62));
        assert!(matches!(
            store.get(&multibyte),
            Err(StrataError::ObjectNotFound(_))
        ));
        assert!(!store.exists(&multibyte));
        assert!(store.get("ab/../../refs.json").is_err());
    }

    #[test]
    fn test_exists() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let id = store.put(b"test").unwrap();
        assert!(store.exists(&id));
        assert!(!store.exists("nonexistent"));
    }

    #[test]
    fn test_ids_lists_everything_sorted() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let mut expected = vec![
            store.put(b"a").unwrap(),
            store.put(b"b").unwrap(),
            store.put(b"c").unwrap(),
        ];
        expected.sort();
        assert_eq!(store.ids().unwrap(), expected);
    }

    #[test]
    fn test_json_roundtrip_is_content_addressed() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let value = vec!["x".to_string(), "y".to_string()];
        let id = store.put_json(&value).unwrap();
        assert_eq!(id, content_address(&serde_json::to_vec(&value).unwrap()));
        let back: Vec<String> = store.get_json(&id).unwrap();
        assert_eq!(back, value);
    }
}
