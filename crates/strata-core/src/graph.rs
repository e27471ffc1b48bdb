//! Commit graph: storage, lookup and traversal of commits.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::commit::{Commit, Snapshot};
use crate::error::{StrataError, StrataResult};
use crate::hash::{is_hex_id, ID_LEN};
use crate::object::ObjectStore;

/// Commits addressed by the content hash of their serialized form.
pub struct CommitGraph {
    store: ObjectStore,
}

impl CommitGraph {
    pub fn new(store: ObjectStore) -> Self {
        Self { store }
    }

    /// Create and persist a commit stamped with the current time.
    pub fn create(
        &self,
        message: String,
        parent: Option<String>,
        second_parent: Option<String>,
        snapshot: Snapshot,
    ) -> StrataResult<Commit> {
        self.write(Commit::new(message, parent, second_parent, snapshot))
    }

    /// Persist an already built commit and attach its id.
    pub fn write(&self, mut commit: Commit) -> StrataResult<Commit> {
        commit.id = self.store.put_json(&commit)?;
        debug!(id = %commit.id, parent = ?commit.parent, "commit stored");
        Ok(commit)
    }

    /// Load a commit by its full id.
    pub fn load(&self, id: &str) -> StrataResult<Commit> {
        let mut commit: Commit = match self.store.get_json(id) {
            Ok(c) => c,
            Err(StrataError::ObjectNotFound(_)) => {
                return Err(StrataError::CommitNotFound(id.to_string()))
            }
            Err(e) => return Err(e),
        };
        commit.id = id.to_string();
        Ok(commit)
    }

    /// Resolve a full id or a unique prefix.
    ///
    /// An ambiguous prefix is reported as not found.
    pub fn resolve(&self, id_or_prefix: &str) -> StrataResult<Commit> {
        if !is_hex_id(id_or_prefix) {
            return Err(StrataError::CommitNotFound(id_or_prefix.to_string()));
        }
        if id_or_prefix.len() >= ID_LEN {
            return self.load(id_or_prefix);
        }

        let mut matches = self
            .store
            .ids()?
            .into_iter()
            .filter(|id| id.starts_with(id_or_prefix));

        match (matches.next(), matches.next()) {
            (Some(id), None) => self.load(&id),
            _ => Err(StrataError::CommitNotFound(id_or_prefix.to_string())),
        }
    }

    /// First-parent chain from `start` back to the root, lazily loaded.
    pub fn history(&self, start: &str) -> History<'_> {
        History {
            graph: self,
            next: Some(start.to_string()),
        }
    }

    /// Every stored commit, ordered by id.
    pub fn all(&self) -> StrataResult<Vec<Commit>> {
        self.store
            .ids()?
            .iter()
            .map(|id| self.load(id))
            .collect()
    }

    /// Breadth-first traversal over both parent links, in discovery order.
    ///
    /// Each id appears once; `start` is first.
    pub fn ancestors_bfs(&self, start: &str) -> StrataResult<Vec<String>> {
        let mut order = vec![start.to_string()];
        let mut seen: HashSet<String> = HashSet::from([start.to_string()]);
        let mut queue = VecDeque::from([start.to_string()]);

        while let Some(id) = queue.pop_front() {
            let commit = self.load(&id)?;
            for parent in [commit.parent, commit.second_parent].into_iter().flatten() {
                if seen.insert(parent.clone()) {
                    order.push(parent.clone());
                    queue.push_back(parent);
                }
            }
        }

        Ok(order)
    }

    /// First id in `ours`' discovery order that `theirs` also reaches.
    ///
    /// This is the first meeting point of the two traversals, not
    /// necessarily a lowest common ancestor.
    pub fn split_point(&self, ours: &str, theirs: &str) -> StrataResult<String> {
        let their_ancestors: HashSet<String> = self.ancestors_bfs(theirs)?.into_iter().collect();
        self.ancestors_bfs(ours)?
            .into_iter()
            .find(|id| their_ancestors.contains(id))
            .ok_or_else(|| StrataError::Corrupt(format!("no common ancestor of {ours} and {theirs}")))
    }
}

/// Iterator over the first-parent chain. See [`CommitGraph::history`].
pub struct History<'a> {
    graph: &'a CommitGraph,
    next: Option<String>,
}

impl Iterator for History<'_> {
    type Item = StrataResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.graph.load(&id) {
            Ok(commit) => {
                self.next = commit.parent.clone();
                Some(Ok(commit))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn graph() -> (TempDir, CommitGraph) {
        let dir = tempdir().unwrap();
        let graph = CommitGraph::new(ObjectStore::new(dir.path()));
        (dir, graph)
    }

    fn commit(graph: &CommitGraph, msg: &str, parent: &str, second: Option<&str>) -> String {
        graph
            .create(
                msg.to_string(),
                Some(parent.to_string()),
                second.map(String::from),
                Snapshot::new(),
            )
            .unwrap()
            .id
    }

    #[test]
    fn test_root_is_deterministic() {
        let (_d1, g1) = graph();
        let (_d2, g2) = graph();
        let a = g1.write(Commit::root()).unwrap();
        let b = g2.write(Commit::root()).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_load_roundtrip() {
        let (_dir, g) = graph();
        let root = g.write(Commit::root()).unwrap();
        let mut snapshot = Snapshot::new();
        snapshot.insert("f.txt".to_string(), "blob1".to_string());
        let c = g
            .create("c1".to_string(), Some(root.id.clone()), None, snapshot.clone())
            .unwrap();

        let loaded = g.load(&c.id).unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.snapshot, snapshot);
    }

    #[test]
    fn test_resolve_prefix() {
        let (_dir, g) = graph();
        let root = g.write(Commit::root()).unwrap();

        assert_eq!(g.resolve(&root.id[..6]).unwrap().id, root.id);
        assert_eq!(g.resolve(&root.id).unwrap().id, root.id);
        assert!(matches!(
            g.resolve("zzzz"),
            Err(StrataError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_non_hex_is_not_found() {
        let (_dir, g) = graph();
        g.write(Commit::root()).unwrap();

        for input in [
            format!("a\u{e9}{}", "0".repeat(62)),
            "\u{e9}\u{e9}".to_string(),
            format!("ab/../../refs.json{}", "/".repeat(50)),
            String::new(),
        ] {
            assert!(matches!(
                g.resolve(&input),
                Err(StrataError::CommitNotFound(_))
            ));
        }
    }

    #[test]
    fn test_resolve_ambiguous_is_not_found() {
        let (_dir, g) = graph();
        let root = g.write(Commit::root()).unwrap();
        let mut ids = vec![root.id.clone()];
        for i in 0..40 {
            ids.push(commit(&g, &format!("c{i}"), &root.id, None));
        }
        // With 41 ids over 16 first characters, some leading char is shared.
        let shared = ids
            .iter()
            .map(|id| &id[..1])
            .find(|p| ids.iter().filter(|id| id.starts_with(*p)).count() > 1)
            .unwrap()
            .to_string();
        assert!(matches!(
            g.resolve(&shared),
            Err(StrataError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_history_follows_first_parent() {
        let (_dir, g) = graph();
        let root = g.write(Commit::root()).unwrap();
        let a = commit(&g, "a", &root.id, None);
        let side = commit(&g, "side", &root.id, None);
        let m = commit(&g, "merge", &a, Some(&side));

        let messages: Vec<String> = g
            .history(&m)
            .map(|c| c.unwrap().message)
            .collect();
        assert_eq!(messages, vec!["merge", "a", "initial commit"]);
    }

    #[test]
    fn test_all_lists_every_commit() {
        let (_dir, g) = graph();
        let root = g.write(Commit::root()).unwrap();
        commit(&g, "a", &root.id, None);
        commit(&g, "b", &root.id, None);
        assert_eq!(g.all().unwrap().len(), 3);
    }

    #[test]
    fn test_ancestors_bfs_order_and_dedup() {
        let (_dir, g) = graph();
        let root = g.write(Commit::root()).unwrap().id;
        let a = commit(&g, "a", &root, None);
        let b = commit(&g, "b", &root, None);
        let m = commit(&g, "m", &a, Some(&b));

        let order = g.ancestors_bfs(&m).unwrap();
        assert_eq!(order, vec![m, a, b, root]);
    }

    #[test]
    fn test_split_point_linear_and_divergent() {
        let (_dir, g) = graph();
        let root = g.write(Commit::root()).unwrap().id;
        let base = commit(&g, "base", &root, None);
        let ours = commit(&g, "ours", &base, None);
        let theirs = commit(&g, "theirs", &base, None);

        assert_eq!(g.split_point(&ours, &theirs).unwrap(), base);
        assert_eq!(g.split_point(&ours, &base).unwrap(), base);
        assert_eq!(g.split_point(&base, &ours).unwrap(), base);
    }

    #[test]
    fn test_split_point_after_criss_merge() {
        let (_dir, g) = graph();
        let root = g.write(Commit::root()).unwrap().id;
        let base = commit(&g, "base", &root, None);
        let side = commit(&g, "side", &base, None);
        let main = commit(&g, "main", &base, None);
        let merged = commit(&g, "Merged side into main.", &main, Some(&side));
        let side2 = commit(&g, "side2", &side, None);

        // Side was merged into main, so side's tip is the meeting point.
        assert_eq!(g.split_point(&merged, &side2).unwrap(), side);
    }
}
