//! repo::lock
//!
//! The path lock manager.
//!
//! Locks follow SVN semantics: a lock on a file path is held by one
//! principal under an opaque token. Locking verifies the path exists at
//! the latest revision, is a file, and is not newer than the client's
//! revision. A `force` lock steals an existing lock under a fresh token;
//! a `break` unlock removes a lock without presenting its token.
//!
//! # Invariants
//!
//! - At most one lock per path; the table is guarded by a single mutex
//! - Tokens are unique and never reused
//! - A commit touching a locked path must present the matching token;
//!   consumed locks are released after the commit unless kept
//!
//! # State machine
//!
//! `unlocked -> locked(token, owner) -> unlocked`, with `force` performing
//! `locked -> locked` atomically under a new token.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::core::paths;
use crate::core::types::User;

use super::error::SvnError;
use super::repository::GitRepository;

/// A held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockDesc {
    /// Normalized locked path.
    pub path: String,
    /// Opaque lock token.
    pub token: String,
    /// Owning principal's login.
    pub owner: String,
    /// Client-supplied comment.
    pub comment: Option<String>,
    /// Creation time, milliseconds since the epoch.
    pub created_ms: i64,
    /// Latest revision at lock time.
    pub revision: i64,
}

/// One path to lock, with the client's revision of it.
#[derive(Debug, Clone)]
pub struct LockTarget {
    /// Path to lock.
    pub path: String,
    /// The revision the client believes is current for the path.
    pub revision: i64,
}

/// One path to unlock, with the token being presented.
#[derive(Debug, Clone)]
pub struct UnlockTarget {
    /// Path to unlock.
    pub path: String,
    /// Token presented by the client; ignored when breaking.
    pub token: String,
}

/// Token-based path lock table.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: Mutex<HashMap<String, LockDesc>>,
}

impl LockManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Acquire locks on a set of paths; one result per target, in order.
    ///
    /// Per-path errors:
    /// - `OutOfDate` - path absent at latest, or changed after the
    ///   client's revision
    /// - `NotFile` - path resolves to a directory
    /// - `PathAlreadyLocked` - held by someone and `force` not set
    ///
    /// With `force`, an existing lock is stolen: the old token becomes
    /// invalid and a fresh one is issued.
    pub fn lock(
        &self,
        repo: &GitRepository,
        targets: &[LockTarget],
        comment: Option<&str>,
        force: bool,
        user: &User,
    ) -> Vec<Result<LockDesc, SvnError>> {
        let latest = repo.latest();
        let mut table = self.locks.lock();
        targets
            .iter()
            .map(|target| {
                let path = paths::normalize(&target.path);
                lock_one(
                    &mut table,
                    repo,
                    &latest,
                    &path,
                    target.revision,
                    comment,
                    force,
                    user,
                )
            })
            .collect()
    }

    /// Release locks; one result per target, in order.
    ///
    /// Without `break_lock`, a missing lock or a token mismatch fails
    /// with `NoSuchLock`. With `break_lock`, the lock is removed
    /// regardless of token.
    pub fn unlock(
        &self,
        targets: &[UnlockTarget],
        break_lock: bool,
    ) -> Vec<Result<(), SvnError>> {
        let mut table = self.locks.lock();
        targets
            .iter()
            .map(|target| {
                let path = paths::normalize(&target.path);
                if break_lock {
                    table.remove(&path);
                    return Ok(());
                }
                match table.get(&path) {
                    Some(lock) if lock.token == target.token => {
                        table.remove(&path);
                        Ok(())
                    }
                    _ => Err(SvnError::NoSuchLock(path)),
                }
            })
            .collect()
    }

    /// The current lock on a path, if any.
    pub fn get_lock(&self, path: &str) -> Option<LockDesc> {
        let path = paths::normalize(path);
        self.locks.lock().get(&path).cloned()
    }

    /// All locks at or below a path, ordered by path.
    pub fn get_locks(&self, prefix: &str) -> Vec<LockDesc> {
        let prefix = paths::normalize(prefix);
        let table = self.locks.lock();
        let mut locks: Vec<LockDesc> = table
            .values()
            .filter(|lock| lock.path == prefix || paths::is_ancestor(&prefix, &lock.path))
            .cloned()
            .collect();
        locks.sort_by(|a, b| a.path.cmp(&b.path));
        locks
    }

    /// Verify a commit's lock preconditions.
    ///
    /// Every locked path that is modified, deleted, or a descendant of a
    /// deleted directory must have its token in `tokens`, else the commit
    /// fails with `BadLockToken`. Returns the paths whose locks the
    /// commit consumes.
    pub(crate) fn validate_commit(
        &self,
        modified: &[String],
        deleted: &[String],
        tokens: &HashMap<String, String>,
    ) -> Result<Vec<String>, SvnError> {
        let table = self.locks.lock();
        let mut consumed = Vec::new();
        for lock in table.values() {
            let involved = modified.iter().any(|p| p == &lock.path)
                || deleted
                    .iter()
                    .any(|d| d == &lock.path || paths::is_ancestor(d, &lock.path));
            if !involved {
                continue;
            }
            match tokens.get(&lock.path) {
                Some(token) if *token == lock.token => consumed.push(lock.path.clone()),
                _ => return Err(SvnError::BadLockToken(lock.path.clone())),
            }
        }
        Ok(consumed)
    }

    /// Release consumed locks after a successful commit, unless kept.
    pub(crate) fn complete_commit(&self, consumed: &[String], keep_locks: bool) {
        if keep_locks {
            return;
        }
        let mut table = self.locks.lock();
        for path in consumed {
            table.remove(path);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn lock_one(
    table: &mut HashMap<String, LockDesc>,
    repo: &GitRepository,
    latest: &super::revision::GitRevision,
    path: &str,
    revision: i64,
    comment: Option<&str>,
    force: bool,
    user: &User,
) -> Result<LockDesc, SvnError> {
    let file = latest
        .file(repo, path)?
        .ok_or_else(|| SvnError::OutOfDate(path.to_string()))?;
    if file.is_directory() {
        return Err(SvnError::NotFile(path.to_string()));
    }
    let last_change = repo
        .last_change(path, latest.id())
        .ok_or_else(|| SvnError::OutOfDate(path.to_string()))?;
    if revision < last_change {
        return Err(SvnError::OutOfDate(path.to_string()));
    }
    if table.contains_key(path) && !force {
        return Err(SvnError::PathAlreadyLocked(path.to_string()));
    }
    let lock = LockDesc {
        path: path.to_string(),
        token: format!("opaquelocktoken:{}", uuid::Uuid::new_v4()),
        owner: user.username.clone(),
        comment: comment.map(str::to_string),
        created_ms: chrono::Utc::now().timestamp_millis(),
        revision,
    };
    table.insert(path.to_string(), lock.clone());
    Ok(lock)
}
