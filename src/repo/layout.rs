//! repo::layout
//!
//! On-disk layout of the revision cache side branch.
//!
//! The cache lives on a dedicated ref whose commit chain parallels the
//! exported branch: the SVN revision number of a cache commit equals its
//! depth in the chain. Each cache commit's tree holds
//!
//! - `commit.ref` - hex id of the originating Git commit (empty at
//!   revision 0)
//! - `change.json` - the canonical [`CacheRevision`] record
//! - `uuid` - the stable repository id, written only at revision 0
//!
//! This layout is stable; existing caches from older processes must keep
//! parsing.

use super::cache::CacheRevision;
use super::error::SvnError;
use crate::core::types::mode;

/// Ref namespace of the revision cache, versioned by schema.
pub const CACHE_REF_PREFIX: &str = "refs/git-as-svn/v1/";

const CHANGE_ENTRY: &str = "change.json";
const POINTER_ENTRY: &str = "commit.ref";
const UUID_ENTRY: &str = "uuid";

const CACHE_IDENT_NAME: &str = "svnbridge";
const CACHE_IDENT_EMAIL: &str = "svnbridge@localhost";

/// The cache ref name for an exported branch.
pub fn cache_ref(branch: &str) -> String {
    format!("{}{}", CACHE_REF_PREFIX, branch)
}

/// Ensure the cache ref exists, creating the synthetic revision 0 when
/// missing, and return `(cache ref name, repository id)`.
///
/// Revision 0 maps to no Git commit and represents an empty tree; its
/// cache commit carries the freshly generated repository id.
pub(crate) fn init(
    repo: &git2::Repository,
    branch: &str,
) -> Result<(String, String), SvnError> {
    let refname = cache_ref(branch);
    if repo.find_reference(&refname).is_ok() {
        let id = load_repository_id(repo, &refname)?;
        return Ok((refname, id));
    }

    let repository_id = uuid::Uuid::new_v4().to_string();
    let record = CacheRevision::default();
    let change_blob = repo.blob(&record.to_bytes()?)?;
    let pointer_blob = repo.blob(b"")?;
    let uuid_blob = repo.blob(repository_id.as_bytes())?;

    let mut builder = repo.treebuilder(None)?;
    builder.insert(CHANGE_ENTRY, change_blob, mode::FILE)?;
    builder.insert(POINTER_ENTRY, pointer_blob, mode::FILE)?;
    builder.insert(UUID_ENTRY, uuid_blob, mode::FILE)?;
    let tree = repo.find_tree(builder.write()?)?;

    let sig = cache_signature(0)?;
    let commit_id = repo.commit(None, &sig, &sig, "r0", &tree, &[])?;
    repo.reference(&refname, commit_id, false, "initialize revision cache")?;
    tracing::info!(%refname, "created revision cache");
    Ok((refname, repository_id))
}

/// Append one cache commit for `git_commit` after `parent`.
///
/// The cache commit reuses the user commit's committer time so the date
/// order of the cache chain matches the user chain whenever the latter is
/// monotone.
pub(crate) fn create_cache_commit(
    repo: &git2::Repository,
    parent: git2::Oid,
    git_commit: &git2::Commit<'_>,
    record: &CacheRevision,
) -> Result<git2::Oid, SvnError> {
    let change_blob = repo.blob(&record.to_bytes()?)?;
    let pointer = format!("{}\n", git_commit.id());
    let pointer_blob = repo.blob(pointer.as_bytes())?;

    let mut builder = repo.treebuilder(None)?;
    builder.insert(CHANGE_ENTRY, change_blob, mode::FILE)?;
    builder.insert(POINTER_ENTRY, pointer_blob, mode::FILE)?;
    let tree = repo.find_tree(builder.write()?)?;

    let sig = cache_signature(git_commit.time().seconds())?;
    let parent_commit = repo.find_commit(parent)?;
    let message = format!("r{}", record.revision);
    Ok(repo.commit(None, &sig, &sig, &message, &tree, &[&parent_commit])?)
}

/// Parse the cache-revision record out of a cache commit.
pub(crate) fn parse_cache_commit(
    repo: &git2::Repository,
    commit: &git2::Commit<'_>,
) -> Result<CacheRevision, SvnError> {
    let tree = commit.tree()?;
    let entry = tree.get_name(CHANGE_ENTRY).ok_or_else(|| {
        SvnError::IllegalState(format!(
            "cache commit {} has no {} entry",
            commit.id(),
            CHANGE_ENTRY
        ))
    })?;
    let blob = repo.find_blob(entry.id())?;
    CacheRevision::from_bytes(blob.content())
}

/// Read the repository id from the root (revision 0) cache commit.
fn load_repository_id(repo: &git2::Repository, refname: &str) -> Result<String, SvnError> {
    let reference = repo.find_reference(refname)?;
    let mut oid = reference
        .target()
        .ok_or_else(|| SvnError::IllegalState(format!("{} has no target", refname)))?;
    loop {
        let commit = repo.find_commit(oid)?;
        if commit.parent_count() == 0 {
            let tree = commit.tree()?;
            let entry = tree.get_name(UUID_ENTRY).ok_or_else(|| {
                SvnError::IllegalState(format!(
                    "cache commit {} has no {} entry",
                    commit.id(),
                    UUID_ENTRY
                ))
            })?;
            let blob = repo.find_blob(entry.id())?;
            return Ok(String::from_utf8_lossy(blob.content()).trim().to_string());
        }
        oid = commit.parent_id(0)?;
    }
}

fn cache_signature(seconds: i64) -> Result<git2::Signature<'static>, git2::Error> {
    git2::Signature::new(
        CACHE_IDENT_NAME,
        CACHE_IDENT_EMAIL,
        &git2::Time::new(seconds, 0),
    )
}
