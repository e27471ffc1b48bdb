//! Working-directory primitives.
//!
//! Paths are relative, `/`-separated and validated against traversal.
//! The metadata directory is never listed.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{StrataError, StrataResult};
use crate::fsutil::remove_empty_dirs;
use crate::hash::content_address;

/// Directories never treated as part of the working tree.
const ALWAYS_IGNORED_DIRS: &[&str] = &[crate::repo::STRATA_DIR];

/// The user's files, rooted at the repository root.
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file below the root, as sorted relative paths.
    pub fn list_files(&self) -> StrataResult<BTreeSet<String>> {
        let mut files = BTreeSet::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(e.depth() == 1 && ALWAYS_IGNORED_DIRS.iter().any(|d| *d == name))
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                StrataError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                files.insert(to_slash(rel));
            }
        }
        Ok(files)
    }

    pub fn exists(&self, rel_path: &str) -> StrataResult<bool> {
        Ok(self.resolve(rel_path)?.is_file())
    }

    pub fn read(&self, rel_path: &str) -> StrataResult<Vec<u8>> {
        let full = self.resolve(rel_path)?;
        if !full.is_file() {
            return Err(StrataError::FileNotFound(rel_path.to_string()));
        }
        Ok(fs::read(full)?)
    }

    /// Content address of the file on disk, or None if it is absent.
    pub fn address(&self, rel_path: &str) -> StrataResult<Option<String>> {
        if !self.exists(rel_path)? {
            return Ok(None);
        }
        Ok(Some(content_address(&self.read(rel_path)?)))
    }

    /// Write a file, creating parent directories as needed.
    pub fn write(&self, rel_path: &str, data: &[u8]) -> StrataResult<()> {
        let full = self.resolve(rel_path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, data)?;
        Ok(())
    }

    /// Delete a file if present, pruning directories it leaves empty.
    ///
    /// Returns whether a file was removed.
    pub fn delete(&self, rel_path: &str) -> StrataResult<bool> {
        let full = self.resolve(rel_path)?;
        if !full.is_file() {
            return Ok(false);
        }
        fs::remove_file(&full)?;
        if let Some(parent) = full.parent() {
            remove_empty_dirs(parent, &self.root)?;
        }
        Ok(true)
    }

    /// Absolute path for `rel_path`, rejecting anything that leaves the root.
    fn resolve(&self, rel_path: &str) -> StrataResult<PathBuf> {
        Ok(self.root.join(normalize_rel_path(rel_path)?))
    }
}

/// Normalize a user-supplied relative path to the `/`-separated form used
/// as a snapshot key.
///
/// Rejects empty, absolute, `..`-bearing and metadata-directory paths.
pub fn normalize_rel_path(rel_path: &str) -> StrataResult<String> {
    let traversal = || StrataError::PathTraversal(rel_path.to_string());
    if rel_path.starts_with('/') || rel_path.starts_with('\\') {
        return Err(traversal());
    }
    let mut parts = Vec::new();
    for component in Path::new(rel_path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => return Err(traversal()),
        }
    }
    match parts.first() {
        None => Err(traversal()),
        Some(first) if ALWAYS_IGNORED_DIRS.contains(&first.as_str()) => Err(traversal()),
        Some(_) => Ok(parts.join("/")),
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
