//! repo::rename
//!
//! Similarity-based rename detection between two trees.
//!
//! Produces `new path -> old path` for pairs whose similarity meets the
//! threshold. The result feeds the per-revision rename map and answers
//! SVN `copyfrom` queries.

use std::collections::BTreeMap;

use crate::core::paths;

use super::error::SvnError;

/// Similarity threshold in percent.
const RENAME_THRESHOLD: u16 = 60;

/// Detect renames between two trees of the primary repository.
///
/// Disabled detection or a missing old tree yields an empty map.
pub(crate) fn collect_renames(
    repo: &git2::Repository,
    old_tree: Option<git2::Oid>,
    new_tree: git2::Oid,
    enabled: bool,
) -> Result<BTreeMap<String, String>, SvnError> {
    let mut result = BTreeMap::new();
    if !enabled {
        return Ok(result);
    }
    let old_tree = match old_tree {
        Some(oid) => repo.find_tree(oid)?,
        None => return Ok(result),
    };
    let new_tree = repo.find_tree(new_tree)?;

    let mut opts = git2::DiffOptions::new();
    let mut diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;
    let mut find = git2::DiffFindOptions::new();
    find.renames(true).rename_threshold(RENAME_THRESHOLD);
    diff.find_similar(Some(&mut find))?;

    for delta in diff.deltas() {
        if delta.status() != git2::Delta::Renamed {
            continue;
        }
        let old_path = delta.old_file().path().and_then(|p| p.to_str());
        let new_path = delta.new_file().path().and_then(|p| p.to_str());
        if let (Some(old_path), Some(new_path)) = (old_path, new_path) {
            result.insert(paths::normalize(new_path), paths::normalize(old_path));
        }
    }
    Ok(result)
}
