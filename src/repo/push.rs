//! repo::push
//!
//! Branch ref update strategies for committed revisions.
//!
//! Both modes report acceptance as a boolean: `false` means the ref
//! advanced under us (non-fast-forward) and the caller must restart from
//! the new latest revision. Callers serialize pushes on the repository's
//! push mutex, so a rejected update here is an external race, not a
//! concurrent editor.

use std::process::Command;

use super::error::SvnError;

/// How a newly built commit is published onto the branch ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitPushMode {
    /// Atomic compare-and-swap on the ref inside the object database.
    Simple,
    /// Shell out to `git push`, honoring server-side receive hooks.
    Native,
}

impl GitPushMode {
    /// Publish `commit_id` onto `branch`.
    ///
    /// Returns `false` when the update is not a fast-forward of the
    /// current ref value.
    pub fn push(
        &self,
        repo: &git2::Repository,
        commit_id: git2::Oid,
        branch: &str,
    ) -> Result<bool, SvnError> {
        match self {
            GitPushMode::Simple => push_simple(repo, commit_id, branch),
            GitPushMode::Native => push_native(repo, commit_id, branch),
        }
    }
}

fn push_simple(
    repo: &git2::Repository,
    commit_id: git2::Oid,
    branch: &str,
) -> Result<bool, SvnError> {
    let commit = repo.find_commit(commit_id)?;
    let expected = if commit.parent_count() > 0 {
        Some(commit.parent_id(0)?)
    } else {
        None
    };
    let current = match repo.find_reference(branch) {
        Ok(reference) => reference.target(),
        Err(e) if e.code() == git2::ErrorCode::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    if current != expected {
        return Ok(false);
    }
    let result = match current {
        Some(current) => {
            repo.reference_matching(branch, commit_id, true, current, "svn commit")
        }
        None => repo.reference(branch, commit_id, false, "svn commit"),
    };
    match result {
        Ok(_) => Ok(true),
        Err(e)
            if matches!(
                e.code(),
                git2::ErrorCode::Modified | git2::ErrorCode::Exists | git2::ErrorCode::Locked
            ) =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn push_native(
    repo: &git2::Repository,
    commit_id: git2::Oid,
    branch: &str,
) -> Result<bool, SvnError> {
    let refspec = format!("{}:{}", commit_id, branch);
    let output = Command::new("git")
        .args(["push", ".", &refspec])
        .current_dir(repo.path())
        .output()?;
    if output.status.success() {
        return Ok(true);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("non-fast-forward") || stderr.contains("[rejected]") {
        return Ok(false);
    }
    Err(SvnError::IllegalState(format!(
        "git push failed: {}",
        stderr.trim()
    )))
}
