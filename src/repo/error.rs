//! repo::error
//!
//! The crate-wide error taxonomy.
//!
//! Every failure a client can observe maps to one SVN error code, so the
//! protocol layer can surface errors verbatim. Four families exist:
//! caller-fixable validation errors (out-of-date, missing entries, lock
//! token problems), the property-validation policy error, and fatal
//! wrapped Git / IO / serialization failures. Transient push rejection is
//! *not* an error: `GitCommitBuilder::commit` returns `Ok(None)` and the
//! caller restarts from the new latest revision.

use thiserror::Error;

/// Errors surfaced by the repository core.
#[derive(Debug, Error)]
pub enum SvnError {
    /// Revision id outside `[0, latest]`, or an unmapped Git commit.
    #[error("No such revision {0}")]
    NoSuchRevision(String),

    /// Path does not exist in the revision being edited or read.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Name collision when adding a directory entry.
    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    /// The client's base revision is older than the path's last change.
    #[error("Working copy is not up-to-date: {0}")]
    NotUpToDate(String),

    /// Lock target does not exist at latest or was changed after the
    /// client's revision.
    #[error("Path is out of date: {0}")]
    OutOfDate(String),

    /// Lock target resolves to a directory.
    #[error("Path is not a file: {0}")]
    NotFile(String),

    /// Path is already locked and the request did not force.
    #[error("Path is already locked: {0}")]
    PathAlreadyLocked(String),

    /// A commit touches a locked path without presenting its token.
    #[error("Lock token mismatch: {0}")]
    BadLockToken(String),

    /// Unlock with a missing or mismatched token.
    #[error("No such lock: {0}")]
    NoSuchLock(String),

    /// An added file was closed without any content.
    #[error("Added file without content: {0}")]
    IncompleteData(String),

    /// Client-supplied properties disagree with the properties derived
    /// from Git state. The message enumerates both sides and names the
    /// authoritative config files.
    #[error("{0}")]
    PropertyMismatch(String),

    /// The editor drive requested something Git cannot represent
    /// (currently: committing an empty directory).
    #[error("{0}")]
    Cancelled(String),

    /// Internal invariant breach; the repository state is suspect.
    #[error("invariant violation: {0}")]
    IllegalState(String),

    /// Underlying Git object database failure.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Underlying IO failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache revision record could not be serialized or parsed.
    #[error("cache record error: {0}")]
    CacheRecord(#[from] serde_json::Error),
}

impl SvnError {
    /// The SVN error code for this error.
    pub fn code(&self) -> SvnErrorCode {
        match self {
            SvnError::NoSuchRevision(_) => SvnErrorCode::FsNoSuchRevision,
            SvnError::EntryNotFound(_) => SvnErrorCode::EntryNotFound,
            SvnError::AlreadyExists(_) => SvnErrorCode::FsAlreadyExists,
            SvnError::NotUpToDate(_) => SvnErrorCode::WcNotUpToDate,
            SvnError::OutOfDate(_) => SvnErrorCode::FsOutOfDate,
            SvnError::NotFile(_) => SvnErrorCode::FsNotFile,
            SvnError::PathAlreadyLocked(_) => SvnErrorCode::FsPathAlreadyLocked,
            SvnError::BadLockToken(_) => SvnErrorCode::FsBadLockToken,
            SvnError::NoSuchLock(_) => SvnErrorCode::FsNoSuchLock,
            SvnError::IncompleteData(_) => SvnErrorCode::IncompleteData,
            SvnError::PropertyMismatch(_) => SvnErrorCode::ReposHookFailure,
            SvnError::Cancelled(_) => SvnErrorCode::Cancelled,
            SvnError::IllegalState(_)
            | SvnError::Git(_)
            | SvnError::Io(_)
            | SvnError::CacheRecord(_) => SvnErrorCode::Internal,
        }
    }
}

/// Symbolic SVN error codes, one per wire-visible failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SvnErrorCode {
    FsOutOfDate,
    FsNotFile,
    FsPathAlreadyLocked,
    FsBadLockToken,
    FsNoSuchLock,
    FsNoSuchRevision,
    EntryNotFound,
    FsAlreadyExists,
    WcNotUpToDate,
    IncompleteData,
    ReposHookFailure,
    Cancelled,
    /// Not part of the SVN surface; internal and wrapped failures.
    Internal,
}

impl std::fmt::Display for SvnErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SvnErrorCode::FsOutOfDate => "FS_OUT_OF_DATE",
            SvnErrorCode::FsNotFile => "FS_NOT_FILE",
            SvnErrorCode::FsPathAlreadyLocked => "FS_PATH_ALREADY_LOCKED",
            SvnErrorCode::FsBadLockToken => "FS_BAD_LOCK_TOKEN",
            SvnErrorCode::FsNoSuchLock => "FS_NO_SUCH_LOCK",
            SvnErrorCode::FsNoSuchRevision => "FS_NO_SUCH_REVISION",
            SvnErrorCode::EntryNotFound => "ENTRY_NOT_FOUND",
            SvnErrorCode::FsAlreadyExists => "FS_ALREADY_EXISTS",
            SvnErrorCode::WcNotUpToDate => "WC_NOT_UP_TO_DATE",
            SvnErrorCode::IncompleteData => "INCOMPLETE_DATA",
            SvnErrorCode::ReposHookFailure => "REPOS_HOOK_FAILURE",
            SvnErrorCode::Cancelled => "CANCELLED",
            SvnErrorCode::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}
