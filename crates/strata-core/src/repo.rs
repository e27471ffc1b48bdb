//! Repository — the main entry point for strata operations.
//!
//! A Repository ties together the object stores, the commit graph, the
//! reference table, the overlay and the working directory. Every
//! operation validates its preconditions before its first write.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::commit::{Commit, Snapshot};
use crate::config::RepoConfig;
use crate::error::{StrataError, StrataResult};
use crate::graph::CommitGraph;
use crate::hash::content_address;
use crate::merge::{conflict_content, MergePlan, Resolution};
use crate::object::ObjectStore;
use crate::overlay::Overlay;
use crate::reconcile::{self, ReconcileReport};
use crate::refs::{validate_branch_name, FileRefStore, RefStore, RefTable};
use crate::state::{self, StatusReport};
use crate::workdir::{normalize_rel_path, WorkDir};

/// The `.strata` directory name.
pub const STRATA_DIR: &str = ".strata";

/// A strata repository.
pub struct Repository {
    /// Root of the working directory (where `.strata/` lives).
    root: PathBuf,
    config: RepoConfig,
    blobs: ObjectStore,
    commits: CommitGraph,
    refs: Box<dyn RefStore>,
    overlay: Overlay,
    workdir: WorkDir,
}

/// What `add` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Undid a pending removal and restored the file.
    Restored,
    /// File matches HEAD; any staged copy was dropped.
    Unchanged,
    /// Content staged for the next commit.
    Staged,
}

/// What `merge` did.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// The other branch is already contained in HEAD; nothing changed.
    AlreadyAncestor,
    /// HEAD was an ancestor of the other branch and moved to its tip.
    FastForwarded(ReconcileReport),
    /// A two-parent merge commit was created.
    Merged {
        commit: Commit,
        /// Paths written with conflict markers.
        conflicts: Vec<String>,
    },
}

impl Repository {
    /// Initialize a new repository with default settings.
    pub fn init(root: &Path) -> StrataResult<Self> {
        Self::init_with(root, RepoConfig::default())
    }

    /// Initialize a new repository in `root`.
    ///
    /// Creates the `.strata/` layout, writes the root commit and checks out
    /// `config.default_branch` pointing at it.
    pub fn init_with(root: &Path, config: RepoConfig) -> StrataResult<Self> {
        let strata_dir = root.join(STRATA_DIR);
        if strata_dir.exists() {
            return Err(StrataError::AlreadyExists);
        }
        validate_branch_name(&config.default_branch)?;

        fs::create_dir_all(strata_dir.join("objects").join("blobs"))?;
        fs::create_dir_all(strata_dir.join("objects").join("commits"))?;
        Overlay::new(&strata_dir).create()?;
        config.save(&strata_dir.join(RepoConfig::FILE))?;

        let commits = CommitGraph::new(ObjectStore::new(&strata_dir.join("objects").join("commits")));
        let root_commit = commits.write(Commit::root())?;

        let refs = FileRefStore::new(&strata_dir, config.lock_timeout());
        refs.create(&RefTable::new(&config.default_branch, &root_commit.id))?;

        info!(root = %root.display(), branch = %config.default_branch, "repository initialized");
        Self::open(root)
    }

    /// Open an existing repository rooted at `root`.
    pub fn open(root: &Path) -> StrataResult<Self> {
        let strata_dir = root.join(STRATA_DIR);
        if !strata_dir.is_dir() {
            return Err(StrataError::NotARepo);
        }

        let config = RepoConfig::load(&strata_dir.join(RepoConfig::FILE))?;
        let objects = strata_dir.join("objects");
        let refs = FileRefStore::new(&strata_dir, config.lock_timeout());

        Ok(Self {
            root: root.to_path_buf(),
            blobs: ObjectStore::new(&objects.join("blobs")),
            commits: CommitGraph::new(ObjectStore::new(&objects.join("commits"))),
            refs: Box::new(refs),
            overlay: Overlay::new(&strata_dir),
            workdir: WorkDir::new(root),
            config,
        })
    }

    /// Replace the reference-table backend.
    pub fn with_ref_store(mut self, refs: Box<dyn RefStore>) -> Self {
        self.refs = refs;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn refs(&self) -> StrataResult<RefTable> {
        self.refs.read()
    }

    pub fn current_branch(&self) -> StrataResult<String> {
        Ok(self.refs.read()?.current_branch().to_string())
    }

    /// The commit HEAD resolves to.
    pub fn head(&self) -> StrataResult<Commit> {
        let table = self.refs.read()?;
        self.commits.load(table.head_commit()?)
    }

    /// Raw content of a blob.
    pub fn blob(&self, id: &str) -> StrataResult<Vec<u8>> {
        self.blobs.get(id)
    }

    /// Resolve a full commit id or unique prefix.
    pub fn resolve_commit(&self, id_or_prefix: &str) -> StrataResult<Commit> {
        self.commits.resolve(id_or_prefix)
    }

    // --- Overlay ---

    /// Stage a file, or undo a pending removal of it.
    pub fn add(&self, path: &str) -> StrataResult<AddOutcome> {
        let path = normalize_rel_path(path)?;

        if let Some(rescued) = self.overlay.removed_blob(&path)? {
            let data = self.blobs.get(&rescued)?;
            self.workdir.write(&path, &data)?;
            self.overlay.unmark_removed(&path)?;
            debug!(%path, "removal undone");
            return Ok(AddOutcome::Restored);
        }

        if !self.workdir.exists(&path)? {
            return Err(StrataError::FileNotFound(path));
        }

        let head = self.head()?;
        let data = self.workdir.read(&path)?;
        if head.blob(&path) == Some(content_address(&data).as_str()) {
            self.overlay.unstage(&path)?;
            return Ok(AddOutcome::Unchanged);
        }

        self.overlay.stage(&path, &data)?;
        debug!(%path, bytes = data.len(), "staged");
        Ok(AddOutcome::Staged)
    }

    /// Unstage a file and, if HEAD tracks it, mark it removed and delete it.
    pub fn remove(&self, path: &str) -> StrataResult<()> {
        let path = normalize_rel_path(path)?;
        let head = self.head()?;

        let mut acted = self.overlay.unstage(&path)?;
        if let Some(blob) = head.blob(&path) {
            self.overlay.mark_removed(&path, blob)?;
            self.workdir.delete(&path)?;
            acted = true;
        }

        if !acted {
            return Err(StrataError::NothingToRemove(path));
        }
        debug!(%path, "marked for removal");
        Ok(())
    }

    // --- Commits ---

    /// Fold the overlay into HEAD's snapshot and advance the current branch.
    pub fn commit(&self, message: &str) -> StrataResult<Commit> {
        self.commit_with(message, None)
    }

    fn commit_with(&self, message: &str, second_parent: Option<String>) -> StrataResult<Commit> {
        if message.trim().is_empty() {
            return Err(StrataError::MissingMessage);
        }
        let staged = self.overlay.staged()?;
        let removed = self.overlay.removed()?;
        // A merge commit records the second parent even when no path changed.
        if staged.is_empty() && removed.is_empty() && second_parent.is_none() {
            return Err(StrataError::NothingToCommit);
        }

        let head = self.head()?;
        let mut snapshot: Snapshot = head.snapshot.clone();
        for path in removed.keys() {
            snapshot.remove(path);
        }
        for (path, data) in &staged {
            let blob = self.blobs.put(data)?;
            snapshot.insert(path.clone(), blob);
        }

        let commit = self.commits.create(
            message.to_string(),
            Some(head.id.clone()),
            second_parent,
            snapshot,
        )?;

        self.refs.modify(&mut |table| {
            let branch = table.current_branch().to_string();
            table.move_branch(&branch, &commit.id);
            Ok(())
        })?;
        self.overlay.clear()?;

        info!(
            id = %commit.id,
            staged = staged.len(),
            removed = removed.len(),
            "commit created"
        );
        Ok(commit)
    }

    /// First-parent history from HEAD, newest first.
    pub fn log(&self) -> StrataResult<Vec<Commit>> {
        let head = self.refs.read()?.head_commit()?.to_string();
        self.commits.history(&head).collect()
    }

    /// Every commit ever made.
    pub fn global_log(&self) -> StrataResult<Vec<Commit>> {
        self.commits.all()
    }

    /// Ids of every commit whose message is exactly `message`.
    pub fn find(&self, message: &str) -> StrataResult<Vec<String>> {
        let ids: Vec<String> = self
            .commits
            .all()?
            .into_iter()
            .filter(|c| c.message == message)
            .map(|c| c.id)
            .collect();
        if ids.is_empty() {
            return Err(StrataError::NoCommitWithMessage(message.to_string()));
        }
        Ok(ids)
    }

    /// Branches, overlay contents and working-tree changes.
    pub fn status(&self) -> StrataResult<StatusReport> {
        let table = self.refs.read()?;
        let head = self.commits.load(table.head_commit()?)?;
        let staged = self.overlay.staged()?;
        let removed = self.overlay.removed()?;
        let (unstaged, untracked) =
            state::compute_changes(&self.workdir, &head.snapshot, &staged, &removed)?;

        Ok(StatusReport {
            current_branch: table.current_branch().to_string(),
            branches: table.branches().keys().cloned().collect(),
            staged: staged.into_keys().collect(),
            removed: removed.into_keys().collect(),
            unstaged,
            untracked,
        })
    }

    // --- Checkout / branches ---

    /// Restore one file from HEAD. The overlay is untouched.
    pub fn checkout_file(&self, path: &str) -> StrataResult<()> {
        let head = self.head()?;
        self.restore_file(&head, path)
    }

    /// Restore one file from the commit `id_or_prefix`.
    pub fn checkout_file_from(&self, id_or_prefix: &str, path: &str) -> StrataResult<()> {
        let commit = self.commits.resolve(id_or_prefix)?;
        self.restore_file(&commit, path)
    }

    fn restore_file(&self, commit: &Commit, path: &str) -> StrataResult<()> {
        let path = normalize_rel_path(path)?;
        let blob = commit
            .blob(&path)
            .ok_or_else(|| StrataError::FileNotInCommit(path.clone()))?;
        let data = self.blobs.get(blob)?;
        self.workdir.write(&path, &data)?;
        debug!(%path, commit = %commit.short_id(), "file checked out");
        Ok(())
    }

    /// Switch to `name`, rewriting the working tree to its tip.
    pub fn checkout_branch(&self, name: &str) -> StrataResult<ReconcileReport> {
        let table = self.refs.read()?;
        let tip = table
            .branch(name)
            .ok_or_else(|| StrataError::NoSuchBranch(name.to_string()))?;
        if table.current_branch() == name {
            return Err(StrataError::AlreadyOnBranch(name.to_string()));
        }

        let head = self.commits.load(table.head_commit()?)?;
        let target = self.commits.load(tip)?;
        let report = reconcile::reconcile(
            &self.workdir,
            &self.blobs,
            &self.overlay,
            &head.snapshot,
            &target.snapshot,
        )?;

        self.refs.modify(&mut |t| t.set_current_branch(name))?;
        info!(branch = %name, "switched branch");
        Ok(report)
    }

    /// Create a branch at HEAD. Does not switch to it.
    pub fn branch(&self, name: &str) -> StrataResult<()> {
        self.refs.modify(&mut |t| {
            let head = t.head_commit()?.to_string();
            t.create_branch(name, &head)
        })?;
        info!(branch = %name, "branch created");
        Ok(())
    }

    /// Delete a branch pointer. Commits are kept.
    pub fn remove_branch(&self, name: &str) -> StrataResult<()> {
        self.refs.modify(&mut |t| t.delete_branch(name))?;
        info!(branch = %name, "branch removed");
        Ok(())
    }

    /// Move the current branch to `id_or_prefix` and check it out.
    pub fn reset(&self, id_or_prefix: &str) -> StrataResult<Commit> {
        let target = self.commits.resolve(id_or_prefix)?;
        let head = self.head()?;

        reconcile::reconcile(
            &self.workdir,
            &self.blobs,
            &self.overlay,
            &head.snapshot,
            &target.snapshot,
        )?;

        self.refs.modify(&mut |t| {
            let branch = t.current_branch().to_string();
            t.move_branch(&branch, &target.id);
            Ok(())
        })?;
        info!(id = %target.id, "branch reset");
        Ok(target)
    }

    // --- Merge ---

    /// Merge branch `other` into the current branch.
    pub fn merge(&self, other: &str) -> StrataResult<MergeOutcome> {
        if !self.overlay.is_empty()? {
            return Err(StrataError::UncommittedChanges);
        }
        let table = self.refs.read()?;
        let other_tip = table
            .branch(other)
            .ok_or_else(|| StrataError::NoSuchBranch(other.to_string()))?
            .to_string();
        let current_branch = table.current_branch().to_string();
        if current_branch == other {
            return Err(StrataError::CannotMergeSelf);
        }

        let head = self.commits.load(table.head_commit()?)?;
        let theirs = self.commits.load(&other_tip)?;
        reconcile::check_untracked(&self.workdir, &self.overlay, &head.snapshot, &theirs.snapshot)?;

        let split_id = self.commits.split_point(&head.id, &theirs.id)?;
        debug!(split = %split_id, head = %head.id, other = %theirs.id, "split point found");

        if split_id == theirs.id {
            return Ok(MergeOutcome::AlreadyAncestor);
        }
        if split_id == head.id {
            let report = reconcile::reconcile(
                &self.workdir,
                &self.blobs,
                &self.overlay,
                &head.snapshot,
                &theirs.snapshot,
            )?;
            self.refs.modify(&mut |t| {
                t.move_branch(&current_branch, &theirs.id);
                Ok(())
            })?;
            info!(branch = %current_branch, to = %theirs.id, "fast-forwarded");
            return Ok(MergeOutcome::FastForwarded(report));
        }

        let split = self.commits.load(&split_id)?;
        let plan = MergePlan::build(&split.snapshot, &head.snapshot, &theirs.snapshot);

        // Resolve every blob the plan needs before touching the tree.
        let mut writes: Vec<(&str, Vec<u8>)> = Vec::new();
        let mut removals: Vec<(&str, &str)> = Vec::new();
        for (path, resolution) in &plan.entries {
            match resolution {
                Resolution::KeepCurrent => {}
                Resolution::TakeOther { blob } => {
                    writes.push((path.as_str(), self.blobs.get(blob)?))
                }
                Resolution::Remove => {
                    if let Some(blob) = head.blob(path) {
                        removals.push((path.as_str(), blob));
                    }
                }
                Resolution::Conflict { current, other } => {
                    let ours = self.side_content(current.as_deref())?;
                    let others = self.side_content(other.as_deref())?;
                    writes.push((path.as_str(), conflict_content(&ours, &others)));
                }
            }
        }

        for (path, blob) in &removals {
            self.overlay.mark_removed(path, blob)?;
            self.workdir.delete(path)?;
        }
        for (path, data) in &writes {
            self.workdir.write(path, data)?;
            self.overlay.stage(path, data)?;
        }

        let conflicts: Vec<String> = plan.conflicts().map(String::from).collect();
        for path in &conflicts {
            warn!(%path, "merge conflict");
        }

        let message = format!("Merged {other} into {current_branch}.");
        let commit = self.commit_with(&message, Some(theirs.id.clone()))?;
        info!(id = %commit.id, conflicts = conflicts.len(), "merge committed");

        Ok(MergeOutcome::Merged { commit, conflicts })
    }

    fn side_content(&self, blob: Option<&str>) -> StrataResult<Vec<u8>> {
        match blob {
            Some(id) => self.blobs.get(id),
            None => Ok(Vec::new()),
        }
    }
}
