//! The repository core: revision mapping, tree views, commits and locks.

pub mod cache;
pub mod change;
pub mod commit;
pub mod error;
pub mod file;
pub mod last_change;
pub mod layout;
pub mod lock;
pub mod push;
pub mod rename;
pub mod repository;
pub mod revision;

pub use cache::{CacheChange, CacheRevision};
pub use change::{ChangeKind, ChangePair};
pub use commit::{GitCommitBuilder, GitDeltaConsumer};
pub use error::{SvnError, SvnErrorCode};
pub use file::{GitFile, RepoSource, TreeEntry};
pub use last_change::LastChangeIndex;
pub use lock::{LockDesc, LockManager, LockTarget, UnlockTarget};
pub use push::GitPushMode;
pub use repository::{GitRepository, RepositoryOptions};
pub use revision::{CopyFrom, GitRevision, LogEntry};
