//! Error types for strata operations.

use std::io;

use thiserror::Error;

/// All possible strata errors.
///
/// User-facing variants carry the exact message printed by the CLI.
#[derive(Debug, Error)]
pub enum StrataError {
    // --- Usage ---
    /// A commit was attempted with an empty message.
    #[error("Please enter a commit message.")]
    MissingMessage,
    /// Wrong argument count or shape.
    #[error("Incorrect operands.")]
    IncorrectOperands,

    // --- Preconditions ---
    /// The current directory is not a strata repository.
    #[error("Not in an initialized strata directory.")]
    NotARepo,
    /// A strata repository already exists here.
    #[error("A strata version-control system already exists in the current directory.")]
    AlreadyExists,
    /// The file to add is not in the working directory.
    #[error("File does not exist.")]
    FileNotFound(String),
    /// `rm` on a path that is neither staged nor tracked.
    #[error("No reason to remove the file.")]
    NothingToRemove(String),
    /// Both overlay maps are empty.
    #[error("No changes added to the commit.")]
    NothingToCommit,
    #[error("A branch with that name does not exist.")]
    NoSuchBranch(String),
    #[error("A branch with that name already exists.")]
    BranchExists(String),
    #[error("Cannot remove the current branch.")]
    CannotRemoveCurrentBranch(String),
    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch(String),
    /// Unknown or ambiguous commit id / prefix.
    #[error("No commit with that id exists.")]
    CommitNotFound(String),
    #[error("File does not exist in that commit.")]
    FileNotInCommit(String),
    #[error("Found no commit with that message.")]
    NoCommitWithMessage(String),
    #[error("Invalid branch name: '{0}'.")]
    InvalidBranchName(String),
    /// A working-directory file unknown to the current commit would be clobbered.
    #[error("There is an untracked file in the way; delete it, or add and commit it first.")]
    UntrackedFileWouldBeOverwritten(String),
    #[error("You have uncommitted changes.")]
    UncommittedChanges,
    #[error("Cannot merge a branch with itself.")]
    CannotMergeSelf,
    /// Path escapes the working directory.
    #[error("path escapes the repository: {0}")]
    PathTraversal(String),

    // --- Lookup misses ---
    /// An object with the given hash was not found.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    // --- Internal faults ---
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    /// Could not acquire the repository lock within the timeout.
    #[error("could not acquire repository lock within timeout")]
    LockTimeout,
    /// On-disk state violates an invariant (e.g. HEAD names a missing branch).
    #[error("repository is corrupt: {0}")]
    Corrupt(String),
}

impl StrataError {
    /// True for usage and precondition errors: the operation was refused
    /// before any mutation and the message is meant for the user.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            StrataError::Io(_)
                | StrataError::Json(_)
                | StrataError::Toml(_)
                | StrataError::TomlSer(_)
                | StrataError::LockTimeout
                | StrataError::Corrupt(_)
                | StrataError::ObjectNotFound(_)
        )
    }
}

/// Convenience alias for Results in strata.
pub type StrataResult<T> = Result<T, StrataError>;
