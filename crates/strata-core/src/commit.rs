//! Commits — immutable snapshot records.
//!
//! A commit records a message, a timestamp, up to two parents and the
//! complete mapping of tracked paths to blob ids at that point in history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::short_id;

/// Message of the root commit created by `init`.
pub const ROOT_MESSAGE: &str = "initial commit";

/// Full mapping of tracked path -> blob id.
pub type Snapshot = BTreeMap<String, String>;

/// A commit.
///
/// `id` is not part of the serialized form: it is the content address of
/// that form and is attached when the commit is written or loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    #[serde(skip)]
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// First parent (None only for the root commit).
    pub parent: Option<String>,
    /// Merged-in branch tip; present only on merge commits.
    pub second_parent: Option<String>,
    pub snapshot: Snapshot,
}

impl Commit {
    /// Build a new, not yet stored commit stamped with the current time.
    pub fn new(
        message: String,
        parent: Option<String>,
        second_parent: Option<String>,
        snapshot: Snapshot,
    ) -> Self {
        Commit {
            id: String::new(),
            message,
            timestamp: Utc::now(),
            parent,
            second_parent,
            snapshot,
        }
    }

    /// The root commit: fixed message, epoch timestamp, empty snapshot.
    pub fn root() -> Self {
        Commit {
            id: String::new(),
            message: ROOT_MESSAGE.to_string(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            parent: None,
            second_parent: None,
            snapshot: Snapshot::new(),
        }
    }

    pub fn is_merge(&self) -> bool {
        self.second_parent.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Blob id tracked for `path`, if any.
    pub fn blob(&self, path: &str) -> Option<&str> {
        self.snapshot.get(path).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_commit_is_fixed() {
        let a = serde_json::to_vec(&Commit::root()).unwrap();
        let b = serde_json::to_vec(&Commit::root()).unwrap();
        assert_eq!(a, b);
        assert_eq!(Commit::root().timestamp.timestamp(), 0);
        assert!(Commit::root().is_root());
    }

    #[test]
    fn test_id_not_serialized() {
        let mut c = Commit::root();
        c.id = "abc".to_string();
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("\"id\""));
        let back: Commit = serde_json::from_str(&json).unwrap();
        assert!(back.id.is_empty());
    }

    #[test]
    fn test_merge_flag() {
        let c = Commit::new(
            "m".to_string(),
            Some("p1".to_string()),
            Some("p2".to_string()),
            Snapshot::new(),
        );
        assert!(c.is_merge());
        assert!(!c.is_root());
    }
}
