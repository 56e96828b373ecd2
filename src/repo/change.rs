//! repo::change
//!
//! The change collector: a recursive diff of two tree views.
//!
//! Produces an ordered map `path -> (old?, new?)`. Two entries are equal
//! only when object id, mode *and* effective property fragments all
//! match, so editing a config file such as `.gitignore` surfaces change
//! records for every node whose derived properties moved, even though
//! their blobs did not. Directory pairs are emitted only for their own
//! changes (mode or properties), not merely because children changed;
//! with `full_removed` set, deleting a directory expands to deletes of
//! all descendants.

use std::collections::BTreeMap;

use super::error::SvnError;
use super::file::GitFile;

/// The old and new side of one changed path.
#[derive(Debug, Clone)]
pub struct ChangePair<'a> {
    /// Node before the change; `None` for additions.
    pub old: Option<GitFile<'a>>,
    /// Node after the change; `None` for deletions.
    pub new: Option<GitFile<'a>>,
}

/// Classification of a change pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Delete,
    Modify,
}

impl ChangePair<'_> {
    /// Classify this pair.
    pub fn kind(&self) -> ChangeKind {
        match (&self.old, &self.new) {
            (None, _) => ChangeKind::Add,
            (_, None) => ChangeKind::Delete,
            _ => ChangeKind::Modify,
        }
    }
}

/// Collect the changes between two revision roots.
pub fn collect_changes<'a>(
    old_root: &GitFile<'a>,
    new_root: &GitFile<'a>,
    full_removed: bool,
) -> Result<BTreeMap<String, ChangePair<'a>>, SvnError> {
    let mut out = BTreeMap::new();
    walk(old_root, new_root, full_removed, &mut out)?;
    Ok(out)
}

fn nodes_equal(a: &GitFile<'_>, b: &GitFile<'_>) -> bool {
    a.tree_entry() == b.tree_entry() && a.prop_fragments() == b.prop_fragments()
}

fn walk<'a>(
    old: &GitFile<'a>,
    new: &GitFile<'a>,
    full_removed: bool,
    out: &mut BTreeMap<String, ChangePair<'a>>,
) -> Result<(), SvnError> {
    let old_entries = old.entries()?;
    let new_entries = new.entries()?;

    for (name, old_child) in &old_entries {
        let new_child = match new_entries.get(name) {
            Some(n) => n,
            None => {
                remove_node(old_child, full_removed, out)?;
                continue;
            }
        };
        if nodes_equal(old_child, new_child) {
            continue;
        }
        let old_dir = old_child.is_directory();
        let new_dir = new_child.is_directory();
        if old_dir && new_dir {
            if old_child.mode() != new_child.mode()
                || old_child.prop_fragments() != new_child.prop_fragments()
            {
                out.insert(
                    new_child.full_path().to_string(),
                    ChangePair {
                        old: Some(old_child.clone()),
                        new: Some(new_child.clone()),
                    },
                );
            }
            walk(old_child, new_child, full_removed, out)?;
        } else {
            out.insert(
                new_child.full_path().to_string(),
                ChangePair {
                    old: Some(old_child.clone()),
                    new: Some(new_child.clone()),
                },
            );
            if full_removed && old_dir {
                for child in old_child.entries()?.values() {
                    remove_node(child, full_removed, out)?;
                }
            }
            if new_dir {
                for child in new_child.entries()?.values() {
                    add_node(child, out)?;
                }
            }
        }
    }

    for (name, new_child) in &new_entries {
        if !old_entries.contains_key(name) {
            add_node(new_child, out)?;
        }
    }
    Ok(())
}

fn add_node<'a>(
    node: &GitFile<'a>,
    out: &mut BTreeMap<String, ChangePair<'a>>,
) -> Result<(), SvnError> {
    out.insert(
        node.full_path().to_string(),
        ChangePair {
            old: None,
            new: Some(node.clone()),
        },
    );
    if node.is_directory() {
        for child in node.entries()?.values() {
            add_node(child, out)?;
        }
    }
    Ok(())
}

fn remove_node<'a>(
    node: &GitFile<'a>,
    full_removed: bool,
    out: &mut BTreeMap<String, ChangePair<'a>>,
) -> Result<(), SvnError> {
    out.insert(
        node.full_path().to_string(),
        ChangePair {
            old: Some(node.clone()),
            new: None,
        },
    );
    if full_removed && node.is_directory() {
        for child in node.entries()?.values() {
            remove_node(child, full_removed, out)?;
        }
    }
    Ok(())
}
