//! Filesystem utilities for crash-safe writes.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use crate::error::StrataResult;

/// Write data to a file atomically using temp-file-then-rename.
///
/// On POSIX, `rename()` within the same filesystem is atomic: either the
/// old file or the new file is visible, never a partial write. The temp
/// file is fsynced before the rename.
pub fn atomic_write(path: &Path, data: &[u8]) -> StrataResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Remove `dir` and its ancestors while they are empty, stopping at `stop_at`.
pub fn remove_empty_dirs(dir: &Path, stop_at: &Path) -> io::Result<()> {
    let mut current = dir.to_path_buf();
    while current.starts_with(stop_at) && current != stop_at {
        if fs::read_dir(&current)?.next().is_none() {
            fs::remove_dir(&current)?;
        } else {
            break;
        }
        match current.parent() {
            Some(p) => current = p.to_path_buf(),
            None => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/file.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_remove_empty_dirs_stops_at_root() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("x/y/z");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("x/keep.txt"), "k").unwrap();

        remove_empty_dirs(&nested, dir.path()).unwrap();
        assert!(!dir.path().join("x/y").exists());
        assert!(dir.path().join("x").exists());
    }
}
