//! Reference table: branch pointers plus the current-branch indicator.
//!
//! The table is persisted as a single unit (`.strata/refs.json`) and every
//! mutation is a complete read-modify-write under the repository lock.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{StrataError, StrataResult};
use crate::fsutil::atomic_write;
use crate::lock::{RepoLock, REFS_LOCK};

/// Branch name -> commit id, plus HEAD naming one of the branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefTable {
    /// Name of the checked-out branch.
    head: String,
    branches: BTreeMap<String, String>,
}

impl RefTable {
    /// A fresh table with a single branch checked out at `commit_id`.
    pub fn new(branch: &str, commit_id: &str) -> Self {
        let mut branches = BTreeMap::new();
        branches.insert(branch.to_string(), commit_id.to_string());
        Self {
            head: branch.to_string(),
            branches,
        }
    }

    /// All branches (the HEAD indicator itself is not an entry).
    pub fn branches(&self) -> &BTreeMap<String, String> {
        &self.branches
    }

    pub fn current_branch(&self) -> &str {
        &self.head
    }

    /// Commit id of the current branch tip.
    pub fn head_commit(&self) -> StrataResult<&str> {
        self.branches
            .get(&self.head)
            .map(String::as_str)
            .ok_or_else(|| StrataError::Corrupt(format!("HEAD names missing branch '{}'", self.head)))
    }

    pub fn branch(&self, name: &str) -> Option<&str> {
        self.branches.get(name).map(String::as_str)
    }

    /// Create `name` at `commit_id`; fails if it already exists.
    pub fn create_branch(&mut self, name: &str, commit_id: &str) -> StrataResult<()> {
        validate_branch_name(name)?;
        if self.branches.contains_key(name) {
            return Err(StrataError::BranchExists(name.to_string()));
        }
        self.branches.insert(name.to_string(), commit_id.to_string());
        Ok(())
    }

    /// Point `name` at `commit_id`, creating it if needed.
    pub fn move_branch(&mut self, name: &str, commit_id: &str) {
        self.branches.insert(name.to_string(), commit_id.to_string());
    }

    pub fn delete_branch(&mut self, name: &str) -> StrataResult<()> {
        if name == self.head {
            return Err(StrataError::CannotRemoveCurrentBranch(name.to_string()));
        }
        if self.branches.remove(name).is_none() {
            return Err(StrataError::NoSuchBranch(name.to_string()));
        }
        Ok(())
    }

    pub fn set_current_branch(&mut self, name: &str) -> StrataResult<()> {
        if !self.branches.contains_key(name) {
            return Err(StrataError::NoSuchBranch(name.to_string()));
        }
        self.head = name.to_string();
        Ok(())
    }
}

/// Reject names that cannot be stored or displayed unambiguously.
pub fn validate_branch_name(name: &str) -> StrataResult<()> {
    let invalid = name.is_empty()
        || name.len() > 256
        || name.starts_with('-')
        || name.contains('/')
        || name.chars().any(|c| c.is_whitespace() || c.is_control());
    if invalid {
        return Err(StrataError::InvalidBranchName(name.to_string()));
    }
    Ok(())
}

/// Storage for the reference table.
///
/// `modify` must apply `f` to the latest table and persist the result as
/// one unit; if `f` fails nothing is written.
pub trait RefStore {
    fn read(&self) -> StrataResult<RefTable>;

    fn modify(
        &self,
        f: &mut dyn FnMut(&mut RefTable) -> StrataResult<()>,
    ) -> StrataResult<RefTable>;
}

/// `refs.json` on disk with exclusive locking and atomic replacement.
pub struct FileRefStore {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileRefStore {
    pub const FILE: &'static str = "refs.json";

    pub fn new(strata_dir: &Path, lock_timeout: Duration) -> Self {
        Self {
            dir: strata_dir.to_path_buf(),
            lock_timeout,
        }
    }

    /// Write the initial table. Used once by `init`.
    pub fn create(&self, table: &RefTable) -> StrataResult<()> {
        let _lock = RepoLock::acquire(&self.dir, REFS_LOCK, self.lock_timeout)?;
        self.save(table)
    }

    fn path(&self) -> PathBuf {
        self.dir.join(Self::FILE)
    }

    fn load(&self) -> StrataResult<RefTable> {
        let data = fs::read_to_string(self.path())?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, table: &RefTable) -> StrataResult<()> {
        let json = serde_json::to_string_pretty(table)?;
        atomic_write(&self.path(), json.as_bytes())
    }
}

impl RefStore for FileRefStore {
    fn read(&self) -> StrataResult<RefTable> {
        self.load()
    }

    fn modify(
        &self,
        f: &mut dyn FnMut(&mut RefTable) -> StrataResult<()>,
    ) -> StrataResult<RefTable> {
        let _lock = RepoLock::acquire(&self.dir, REFS_LOCK, self.lock_timeout)?;
        let mut table = self.load()?;
        f(&mut table)?;
        self.save(&table)?;
        info!(head = %table.head, "reference table updated");
        Ok(table)
    }
}

/// In-memory reference table, for tests and embedding.
pub struct MemoryRefStore {
    table: RefCell<RefTable>,
}

impl MemoryRefStore {
    pub fn new(table: RefTable) -> Self {
        Self {
            table: RefCell::new(table),
        }
    }
}

impl RefStore for MemoryRefStore {
    fn read(&self) -> StrataResult<RefTable> {
        Ok(self.table.borrow().clone())
    }

    fn modify(
        &self,
        f: &mut dyn FnMut(&mut RefTable) -> StrataResult<()>,
    ) -> StrataResult<RefTable> {
        let mut working = self.table.borrow().clone();
        f(&mut working)?;
        *self.table.borrow_mut() = working.clone();
        Ok(working)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_table() {
        let t = RefTable::new("master", "c0");
        assert_eq!(t.current_branch(), "master");
        assert_eq!(t.head_commit().unwrap(), "c0");
        assert_eq!(t.branches().len(), 1);
    }

    #[test]
    fn test_create_branch_twice_fails() {
        let mut t = RefTable::new("master", "c0");
        t.create_branch("dev", "c0").unwrap();
        assert!(matches!(
            t.create_branch("dev", "c1"),
            Err(StrataError::BranchExists(_))
        ));
        assert_eq!(t.branch("dev"), Some("c0"));
    }

    #[test]
    fn test_delete_branch_rules() {
        let mut t = RefTable::new("master", "c0");
        t.create_branch("dev", "c0").unwrap();
        assert!(matches!(
            t.delete_branch("master"),
            Err(StrataError::CannotRemoveCurrentBranch(_))
        ));
        assert!(matches!(
            t.delete_branch("nope"),
            Err(StrataError::NoSuchBranch(_))
        ));
        t.delete_branch("dev").unwrap();
        assert!(t.branch("dev").is_none());
    }

    #[test]
    fn test_set_current_branch_requires_existing() {
        let mut t = RefTable::new("master", "c0");
        assert!(t.set_current_branch("ghost").is_err());
        t.move_branch("dev", "c1");
        t.set_current_branch("dev").unwrap();
        assert_eq!(t.head_commit().unwrap(), "c1");
    }

    #[test]
    fn test_branch_name_validation() {
        assert!(validate_branch_name("feature-1").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("a b").is_err());
        assert!(validate_branch_name("a/b").is_err());
        assert!(validate_branch_name("-x").is_err());
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        let store = FileRefStore::new(dir.path(), Duration::from_secs(1));
        store.create(&RefTable::new("master", "c0")).unwrap();

        store
            .modify(&mut |t| t.create_branch("dev", "c0"))
            .unwrap();

        let reopened = FileRefStore::new(dir.path(), Duration::from_secs(1));
        assert_eq!(reopened.read().unwrap().branch("dev"), Some("c0"));
    }

    #[test]
    fn test_failed_modify_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = FileRefStore::new(dir.path(), Duration::from_secs(1));
        store.create(&RefTable::new("master", "c0")).unwrap();
        let before = fs::read(dir.path().join(FileRefStore::FILE)).unwrap();

        let result = store.modify(&mut |t| {
            t.move_branch("master", "c9");
            t.delete_branch("master")
        });
        assert!(result.is_err());
        assert_eq!(fs::read(dir.path().join(FileRefStore::FILE)).unwrap(), before);
    }

    #[test]
    fn test_memory_store_rolls_back_on_error() {
        let store = MemoryRefStore::new(RefTable::new("master", "c0"));
        let result = store.modify(&mut |t| {
            t.move_branch("master", "c1");
            t.set_current_branch("ghost")
        });
        assert!(result.is_err());
        assert_eq!(store.read().unwrap().head_commit().unwrap(), "c0");
    }
}
