//! Three-way merge classification.
//!
//! Files are compared by blob id only: split point (S), current HEAD (H)
//! and the branch being merged (B). A file the two sides changed in
//! different ways is a conflict and gets both versions written between
//! markers.

use std::collections::BTreeSet;

use crate::commit::Snapshot;

pub const CONFLICT_START: &str = "<<<<<<< HEAD\n";
pub const CONFLICT_SEPARATOR: &str = "=======\n";
pub const CONFLICT_END: &str = ">>>>>>>\n";

/// How one path is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Leave the current version (or its absence) alone.
    KeepCurrent,
    /// Check out the other branch's blob and stage it.
    TakeOther { blob: String },
    /// Delete the file and stage the removal.
    Remove,
    /// Both sides diverged; write conflict markers and stage the result.
    Conflict {
        current: Option<String>,
        other: Option<String>,
    },
}

/// Classify one path from its blob id at the split point, HEAD and the
/// other branch. `None` means absent.
pub fn classify(split: Option<&str>, current: Option<&str>, other: Option<&str>) -> Resolution {
    let current_unchanged = current == split;
    let other_unchanged = other == split;

    match (current_unchanged, other_unchanged) {
        (true, true) => Resolution::KeepCurrent,
        (true, false) => match other {
            Some(blob) => Resolution::TakeOther {
                blob: blob.to_string(),
            },
            None => Resolution::Remove,
        },
        (false, true) => Resolution::KeepCurrent,
        (false, false) if current == other => Resolution::KeepCurrent,
        (false, false) => Resolution::Conflict {
            current: current.map(String::from),
            other: other.map(String::from),
        },
    }
}

/// A per-path merge plan, in path order.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    pub entries: Vec<(String, Resolution)>,
}

impl MergePlan {
    /// Classify every path present in any of the three snapshots.
    pub fn build(split: &Snapshot, current: &Snapshot, other: &Snapshot) -> Self {
        let paths: BTreeSet<&String> = split
            .keys()
            .chain(current.keys())
            .chain(other.keys())
            .collect();

        let entries = paths
            .into_iter()
            .map(|path| {
                let resolution = classify(
                    split.get(path).map(String::as_str),
                    current.get(path).map(String::as_str),
                    other.get(path).map(String::as_str),
                );
                (path.clone(), resolution)
            })
            .collect();

        MergePlan { entries }
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicts().next().is_some()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, r)| matches!(r, Resolution::Conflict { .. }))
            .map(|(p, _)| p.as_str())
    }
}

/// Wrap both sides' raw content in conflict markers.
pub fn conflict_content(current: &[u8], other: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        CONFLICT_START.len() + current.len() + CONFLICT_SEPARATOR.len() + other.len() + CONFLICT_END.len(),
    );
    out.extend_from_slice(CONFLICT_START.as_bytes());
    out.extend_from_slice(current);
    out.extend_from_slice(CONFLICT_SEPARATOR.as_bytes());
    out.extend_from_slice(other);
    out.extend_from_slice(CONFLICT_END.as_bytes());
    out
}
