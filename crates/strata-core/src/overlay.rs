//! Staging/removal overlay: pending changes between commits.
//!
//! `staging/<path>` holds the raw content staged for addition.
//! `removal/<path>` holds the blob id rescued from the last tracked
//! version, so an `add` can undo the removal.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::StrataResult;
use crate::fsutil::remove_empty_dirs;
use crate::workdir::normalize_rel_path;

/// Disk-backed staged and removed maps.
pub struct Overlay {
    staging: PathBuf,
    removal: PathBuf,
}

impl Overlay {
    pub fn new(strata_dir: &Path) -> Self {
        Self {
            staging: strata_dir.join("staging"),
            removal: strata_dir.join("removal"),
        }
    }

    /// Create the backing directories.
    pub fn create(&self) -> StrataResult<()> {
        fs::create_dir_all(&self.staging)?;
        fs::create_dir_all(&self.removal)?;
        Ok(())
    }

    /// Staged path -> raw content.
    pub fn staged(&self) -> StrataResult<BTreeMap<String, Vec<u8>>> {
        let mut out = BTreeMap::new();
        for path in list_entries(&self.staging)? {
            let data = fs::read(self.staging.join(&path))?;
            out.insert(path, data);
        }
        Ok(out)
    }

    /// Removed path -> rescued blob id.
    pub fn removed(&self) -> StrataResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for path in list_entries(&self.removal)? {
            let id = fs::read_to_string(self.removal.join(&path))?;
            out.insert(path, id.trim().to_string());
        }
        Ok(out)
    }

    pub fn staged_content(&self, path: &str) -> StrataResult<Option<Vec<u8>>> {
        let full = self.staging.join(normalize_rel_path(path)?);
        if !full.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read(full)?))
    }

    pub fn removed_blob(&self, path: &str) -> StrataResult<Option<String>> {
        let full = self.removal.join(normalize_rel_path(path)?);
        if !full.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(full)?.trim().to_string()))
    }

    /// Stage `data` for `path`, overwriting any earlier staged content.
    pub fn stage(&self, path: &str, data: &[u8]) -> StrataResult<()> {
        write_entry(&self.staging, path, data)
    }

    /// Returns whether an entry was cleared.
    pub fn unstage(&self, path: &str) -> StrataResult<bool> {
        clear_entry(&self.staging, path)
    }

    pub fn mark_removed(&self, path: &str, blob_id: &str) -> StrataResult<()> {
        write_entry(&self.removal, path, blob_id.as_bytes())
    }

    /// Returns whether an entry was cleared.
    pub fn unmark_removed(&self, path: &str) -> StrataResult<bool> {
        clear_entry(&self.removal, path)
    }

    pub fn is_empty(&self) -> StrataResult<bool> {
        Ok(list_entries(&self.staging)?.is_empty() && list_entries(&self.removal)?.is_empty())
    }

    /// Drop every staged and removed entry.
    pub fn clear(&self) -> StrataResult<()> {
        for dir in [&self.staging, &self.removal] {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn write_entry(area: &Path, path: &str, data: &[u8]) -> StrataResult<()> {
    let full = area.join(normalize_rel_path(path)?);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(full, data)?;
    Ok(())
}

fn clear_entry(area: &Path, path: &str) -> StrataResult<bool> {
    let full = area.join(normalize_rel_path(path)?);
    if !full.is_file() {
        return Ok(false);
    }
    fs::remove_file(&full)?;
    if let Some(parent) = full.parent() {
        remove_empty_dirs(parent, area)?;
    }
    Ok(true)
}

fn list_entries(area: &Path) -> StrataResult<Vec<String>> {
    let mut out = Vec::new();
    if !area.exists() {
        return Ok(out);
    }
    for entry in WalkDir::new(area).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "overlay walk failed")
            })
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(area) {
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(key);
        }
    }
    Ok(out)
}
