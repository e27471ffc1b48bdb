//! Working directory status.
//!
//! Compares files on disk against the HEAD snapshot and the overlay to
//! find changes that are not staged and files strata does not know about.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::commit::Snapshot;
use crate::error::StrataResult;
use crate::hash::content_address;
use crate::workdir::WorkDir;

/// Why a file shows up as not staged for commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnstagedKind {
    Modified,
    Deleted,
}

impl UnstagedKind {
    pub fn label(self) -> &'static str {
        match self {
            UnstagedKind::Modified => "modified",
            UnstagedKind::Deleted => "deleted",
        }
    }
}

/// Full `status` report. Every list is sorted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub current_branch: String,
    pub branches: Vec<String>,
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub unstaged: Vec<(String, UnstagedKind)>,
    pub untracked: Vec<String>,
}

/// The file-level part of status: unstaged modifications and untracked files.
pub fn compute_changes(
    workdir: &WorkDir,
    head: &Snapshot,
    staged: &BTreeMap<String, Vec<u8>>,
    removed: &BTreeMap<String, String>,
) -> StrataResult<(Vec<(String, UnstagedKind)>, Vec<String>)> {
    let on_disk = workdir.list_files()?;
    let mut unstaged = BTreeMap::new();
    let mut untracked = Vec::new();

    for path in &on_disk {
        let current = content_address(&workdir.read(path)?);
        match (staged.get(path), head.get(path)) {
            (Some(staged_data), _) => {
                if content_address(staged_data) != current {
                    unstaged.insert(path.clone(), UnstagedKind::Modified);
                }
            }
            (None, Some(_)) if removed.contains_key(path) => untracked.push(path.clone()),
            (None, Some(tracked)) => {
                if *tracked != current {
                    unstaged.insert(path.clone(), UnstagedKind::Modified);
                }
            }
            (None, None) => untracked.push(path.clone()),
        }
    }

    for path in staged.keys() {
        if !on_disk.contains(path) {
            unstaged.insert(path.clone(), UnstagedKind::Deleted);
        }
    }
    for path in head.keys() {
        if !on_disk.contains(path) && !removed.contains_key(path) && !staged.contains_key(path) {
            unstaged.insert(path.clone(), UnstagedKind::Deleted);
        }
    }

    Ok((unstaged.into_iter().collect(), untracked))
}
