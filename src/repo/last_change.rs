//! repo::last_change
//!
//! The last-change index: for every path ever seen in any revision, the
//! ordered list of revisions in which it changed, with deletions marked.
//!
//! Answers "newest revision `<= R` in which path `P` changed" for the
//! up-to-date checks of the commit builder and the lock manager. Appends
//! happen only while the revision store extends itself; each per-path
//! append is performed under the index lock, so readers observe either
//! the pre- or post-append list, never a torn one.

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
struct ChangeMark {
    revision: i64,
    deleted: bool,
}

/// Append-only per-path change history.
#[derive(Debug, Default)]
pub struct LastChangeIndex {
    paths: RwLock<HashMap<String, Vec<ChangeMark>>>,
}

impl LastChangeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path` changed in `revision`; `deleted` marks removal.
    ///
    /// Revisions must be recorded in ascending order per path.
    pub fn record(&self, path: &str, revision: i64, deleted: bool) {
        let mut paths = self.paths.write();
        paths
            .entry(path.to_string())
            .or_default()
            .push(ChangeMark { revision, deleted });
    }

    /// The newest revision `<= before` in which `path` changed, or `None`
    /// when the path is absent at `before` (never seen, or deleted by its
    /// newest qualifying change).
    pub fn last_change(&self, path: &str, before: i64) -> Option<i64> {
        let paths = self.paths.read();
        let marks = paths.get(path)?;
        let mark = marks.iter().rev().find(|m| m.revision <= before)?;
        if mark.deleted {
            None
        } else {
            Some(mark.revision)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_path_is_absent() {
        let index = LastChangeIndex::new();
        assert_eq!(index.last_change("/a.txt", 10), None);
    }

    #[test]
    fn returns_newest_change_not_after_bound() {
        let index = LastChangeIndex::new();
        index.record("/a.txt", 1, false);
        index.record("/a.txt", 4, false);
        assert_eq!(index.last_change("/a.txt", 1), Some(1));
        assert_eq!(index.last_change("/a.txt", 3), Some(1));
        assert_eq!(index.last_change("/a.txt", 4), Some(4));
        assert_eq!(index.last_change("/a.txt", 100), Some(4));
    }

    #[test]
    fn absent_before_first_change() {
        let index = LastChangeIndex::new();
        index.record("/a.txt", 5, false);
        assert_eq!(index.last_change("/a.txt", 4), None);
    }

    #[test]
    fn deletion_makes_path_absent() {
        let index = LastChangeIndex::new();
        index.record("/a.txt", 1, false);
        index.record("/a.txt", 3, true);
        assert_eq!(index.last_change("/a.txt", 2), Some(1));
        assert_eq!(index.last_change("/a.txt", 3), None);
        assert_eq!(index.last_change("/a.txt", 9), None);
    }

    #[test]
    fn recreation_after_deletion() {
        let index = LastChangeIndex::new();
        index.record("/a.txt", 1, false);
        index.record("/a.txt", 3, true);
        index.record("/a.txt", 5, false);
        assert_eq!(index.last_change("/a.txt", 4), None);
        assert_eq!(index.last_change("/a.txt", 5), Some(5));
    }
}
