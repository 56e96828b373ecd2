//! core::types
//!
//! Shared domain vocabulary: node kinds, Git file modes, the committing
//! user, SVN property names and the SVN timestamp format.

use std::collections::BTreeMap;

/// An SVN property map: property name to value, ordered by name.
pub type PropMap = BTreeMap<String, String>;

/// Git tree entry modes as stored in tree objects.
pub mod mode {
    /// Directory (tree) entry.
    pub const DIR: i32 = 0o040000;
    /// Regular file.
    pub const FILE: i32 = 0o100644;
    /// Executable file.
    pub const EXECUTABLE: i32 = 0o100755;
    /// Symbolic link.
    pub const SYMLINK: i32 = 0o120000;
    /// Submodule (commit) entry.
    pub const GITLINK: i32 = 0o160000;
}

/// The SVN node kind of a tree entry.
///
/// Submodule entries surface as directories; their content comes from a
/// linked repository when one holds the referenced commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular or executable file.
    File,
    /// Directory or submodule.
    Dir,
    /// Symbolic link, exposed with `svn:special` set.
    Symlink,
}

impl NodeKind {
    /// Derive the node kind from a Git tree entry mode.
    ///
    /// Unknown blob-like modes (e.g. legacy group-writable files) are
    /// treated as plain files.
    pub fn from_mode(mode: i32) -> NodeKind {
        match mode {
            mode::DIR | mode::GITLINK => NodeKind::Dir,
            mode::SYMLINK => NodeKind::Symlink,
            _ => NodeKind::File,
        }
    }
}

/// A committing principal, as resolved by the (external) authentication
/// layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Login name; owns issued lock tokens.
    pub username: String,
    /// Display name recorded as the Git author/committer.
    pub real_name: String,
    /// Email, if known. Commits record an empty email when absent.
    pub email: Option<String>,
}

impl User {
    /// Create a user record.
    pub fn new(
        username: impl Into<String>,
        real_name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            real_name: real_name.into(),
            email,
        }
    }

    /// Build the Git signature used for commits authored by this user.
    pub fn signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.real_name, self.email.as_deref().unwrap_or(""))
    }
}

/// `svn:executable`, set to `*` on executable files.
pub const PROP_EXECUTABLE: &str = "svn:executable";
/// `svn:special`, set to `*` on symlinks.
pub const PROP_SPECIAL: &str = "svn:special";
/// `svn:ignore`, derived from `.gitignore` contents.
pub const PROP_IGNORE: &str = "svn:ignore";
/// `svn:eol-style`, derived from `.gitattributes` rules.
pub const PROP_EOL_STYLE: &str = "svn:eol-style";
/// `svn:mime-type`, derived from `.gitattributes` binary rules.
pub const PROP_MIME_TYPE: &str = "svn:mime-type";

/// `svn:entry:uuid` internal entry property.
pub const PROP_ENTRY_UUID: &str = "svn:entry:uuid";
/// `svn:entry:committed-rev` internal entry property.
pub const PROP_ENTRY_REV: &str = "svn:entry:committed-rev";
/// `svn:entry:committed-date` internal entry property.
pub const PROP_ENTRY_DATE: &str = "svn:entry:committed-date";
/// `svn:entry:last-author` internal entry property.
pub const PROP_ENTRY_AUTHOR: &str = "svn:entry:last-author";

/// `svn:author` revision property.
pub const PROP_AUTHOR: &str = "svn:author";
/// `svn:log` revision property.
pub const PROP_LOG: &str = "svn:log";
/// `svn:date` revision property.
pub const PROP_DATE: &str = "svn:date";
/// Revision property carrying the underlying Git commit hash.
pub const PROP_GIT_COMMIT: &str = "git:commit";

/// Prefix of the wire form of symlink content (`link <target>`).
pub const LINK_PREFIX: &str = "link ";

/// Format a millisecond timestamp in the SVN entry date format
/// (`2024-01-31T12:00:00.000000Z`).
pub fn svn_date(date_ms: i64) -> String {
    let date = chrono::DateTime::from_timestamp_millis(date_ms)
        .unwrap_or(chrono::DateTime::UNIX_EPOCH);
    date.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}
