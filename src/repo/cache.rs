//! repo::cache
//!
//! The persisted cache-revision schema.
//!
//! One record is stored per SVN revision as a JSON blob inside the cache
//! commit's tree. Serialization is canonical: struct fields are declared
//! in lexicographic order, inner maps are `BTreeMap`s, and absent change
//! sides are omitted, so the same logical record always produces the same
//! bytes and Git deduplicates unchanged blobs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::SvnError;

/// The persisted form of one SVN revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRevision {
    /// Reserved for multi-branch layouts; always empty here.
    #[serde(default)]
    pub branches: BTreeMap<String, String>,

    /// Changed paths with their old/new blob and mode.
    #[serde(default, rename = "fileChange")]
    pub file_change: BTreeMap<String, CacheChange>,

    /// Hex id of the originating Git commit; `None` for revision 0.
    #[serde(rename = "gitCommit")]
    pub git_commit: Option<String>,

    /// Detected renames, new path to previous path.
    #[serde(default)]
    pub renames: BTreeMap<String, String>,

    /// The SVN revision id; equals the cache chain depth.
    pub revision: i64,
}

/// One changed path inside a [`CacheRevision`].
///
/// A missing `new` side marks a deletion; a missing `old` side an
/// addition. Directory entries carry their tree id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheChange {
    #[serde(rename = "newBlob", skip_serializing_if = "Option::is_none", default)]
    pub new_blob: Option<String>,

    #[serde(rename = "newMode", skip_serializing_if = "Option::is_none", default)]
    pub new_mode: Option<i32>,

    #[serde(rename = "oldBlob", skip_serializing_if = "Option::is_none", default)]
    pub old_blob: Option<String>,

    #[serde(rename = "oldMode", skip_serializing_if = "Option::is_none", default)]
    pub old_mode: Option<i32>,
}

impl CacheRevision {
    /// Serialize to the canonical JSON byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SvnError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a record from its stored byte form.
    pub fn from_bytes(bytes: &[u8]) -> Result<CacheRevision, SvnError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
