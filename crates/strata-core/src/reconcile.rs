//! Working-directory reconciler.
//!
//! Moves the working tree from the snapshot it reflects to a target
//! snapshot. [`check_untracked`] runs first and performs no writes; the
//! mutation pass only runs once it passes.

use tracing::debug;

use crate::commit::Snapshot;
use crate::error::{StrataError, StrataResult};
use crate::hash::content_address;
use crate::object::ObjectStore;
use crate::overlay::Overlay;
use crate::workdir::WorkDir;

/// What a reconciliation changed on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub written: Vec<String>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
}

/// Fail if moving from `old` to `target` would clobber an untracked file.
///
/// A file is in the way when it is absent from `old`, present in
/// `target` with different content, and not already staged with its
/// current content.
pub fn check_untracked(
    workdir: &WorkDir,
    overlay: &Overlay,
    old: &Snapshot,
    target: &Snapshot,
) -> StrataResult<()> {
    for path in workdir.list_files()? {
        if old.contains_key(&path) {
            continue;
        }
        let Some(target_blob) = target.get(&path) else {
            continue;
        };
        let current = workdir.read(&path)?;
        let current_id = content_address(&current);
        if current_id == *target_blob {
            continue;
        }
        let staged_matches = overlay
            .staged_content(&path)?
            .is_some_and(|staged| content_address(&staged) == current_id);
        if !staged_matches {
            debug!(%path, "untracked file would be overwritten");
            return Err(StrataError::UntrackedFileWouldBeOverwritten(path));
        }
    }
    Ok(())
}

/// Apply `target` over `old` on disk, then clear the overlay.
pub fn reconcile(
    workdir: &WorkDir,
    blobs: &ObjectStore,
    overlay: &Overlay,
    old: &Snapshot,
    target: &Snapshot,
) -> StrataResult<ReconcileReport> {
    check_untracked(workdir, overlay, old, target)?;

    // Load every target blob before the first write so a missing object
    // aborts with the tree untouched.
    let mut pending = Vec::new();
    for (path, blob) in target {
        if old.get(path) != Some(blob) {
            pending.push((path, blobs.get(blob)?));
        }
    }

    // Deletions go first: removing `a/b` prunes `a/`, which a target file
    // named `a` may need, and vice versa.
    let mut report = ReconcileReport::default();
    for path in old.keys() {
        if !target.contains_key(path) {
            workdir.delete(path)?;
            report.deleted.push(path.clone());
        }
    }
    for (path, data) in pending {
        workdir.write(path, &data)?;
        if old.contains_key(path) {
            report.written.push(path.clone());
        } else {
            report.created.push(path.clone());
        }
    }

    overlay.clear()?;
    debug!(
        written = report.written.len(),
        created = report.created.len(),
        deleted = report.deleted.len(),
        "working directory reconciled"
    );
    Ok(report)
}
