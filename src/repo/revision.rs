//! repo::revision
//!
//! The SVN revision handle.
//!
//! A [`GitRevision`] is an immutable record anchoring one SVN revision to
//! its cache commit and (except for revision 0) to a user-visible Git
//! commit. The revision store owns the canonical sequence and hands out
//! cheap clones; navigation back into tree state borrows the repository.

use std::collections::{BTreeMap, HashMap};

use crate::core::types::{svn_date, PropMap, PROP_AUTHOR, PROP_DATE, PROP_GIT_COMMIT, PROP_LOG};

use super::change::{self, ChangePair};
use super::error::SvnError;
use super::file::GitFile;
use super::repository::GitRepository;

/// The source of an SVN `copyfrom`: a path at a prior revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFrom {
    /// Revision the source path is read at.
    pub revision: i64,
    /// Normalized source path.
    pub path: String,
}

/// One SVN revision.
#[derive(Debug, Clone)]
pub struct GitRevision {
    id: i64,
    cache_commit: git2::Oid,
    git_commit: Option<git2::Oid>,
    date_ms: i64,
    author: Option<String>,
    log: Option<String>,
    copy_froms: HashMap<String, CopyFrom>,
}

/// One entry of a revision's change list.
#[derive(Debug, Clone)]
pub struct LogEntry<'a> {
    /// Old and new node, as in the change collector's output.
    pub pair: ChangePair<'a>,
    /// Rename source, when rename detection matched this path.
    pub copy_from: Option<CopyFrom>,
}

impl GitRevision {
    pub(crate) fn new(
        id: i64,
        cache_commit: git2::Oid,
        git_commit: Option<git2::Oid>,
        date_ms: i64,
        author: Option<String>,
        log: Option<String>,
        copy_froms: HashMap<String, CopyFrom>,
    ) -> Self {
        Self {
            id,
            cache_commit,
            git_commit,
            date_ms,
            author,
            log,
            copy_froms,
        }
    }

    /// The revision id; dense from 0.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The cache commit persisting this revision.
    pub fn cache_commit(&self) -> git2::Oid {
        self.cache_commit
    }

    /// The user-visible Git commit, `None` for revision 0.
    pub fn git_commit(&self) -> Option<git2::Oid> {
        self.git_commit
    }

    /// Commit time in milliseconds since the epoch.
    pub fn date_ms(&self) -> i64 {
        self.date_ms
    }

    /// Committer name, when a Git commit backs this revision.
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Trimmed commit message, when a Git commit backs this revision.
    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }

    /// The rename source for `path`, if this revision renamed it.
    pub fn copy_from(&self, path: &str) -> Option<&CopyFrom> {
        self.copy_froms.get(path)
    }

    /// Revision properties; internal ones (`svn:author`, `svn:log`,
    /// `svn:date`) only when requested.
    pub fn properties(&self, include_internal: bool) -> PropMap {
        let mut props = PropMap::new();
        if include_internal {
            if let Some(author) = &self.author {
                props.insert(PROP_AUTHOR.to_string(), author.clone());
            }
            if let Some(log) = &self.log {
                props.insert(PROP_LOG.to_string(), log.clone());
            }
            props.insert(PROP_DATE.to_string(), svn_date(self.date_ms));
        }
        if let Some(commit) = &self.git_commit {
            props.insert(PROP_GIT_COMMIT.to_string(), commit.to_string());
        }
        props
    }

    /// The root directory node of this revision.
    pub fn root<'a>(&self, repo: &'a GitRepository) -> Result<GitFile<'a>, SvnError> {
        match self.git_commit {
            Some(commit) => GitFile::commit_root(repo, commit, self.id),
            None => Ok(GitFile::empty_root(repo, self.id)),
        }
    }

    /// Resolve a path inside this revision, or `None` when absent.
    pub fn file<'a>(
        &self,
        repo: &'a GitRepository,
        path: &str,
    ) -> Result<Option<GitFile<'a>>, SvnError> {
        let mut node = self.root(repo)?;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            node = match node.entry(part)? {
                Some(child) => child,
                None => return Ok(None),
            };
        }
        Ok(Some(node))
    }

    /// The change list of this revision, recomputed from the trees.
    ///
    /// Directory deletes are reported as single entries (descendants are
    /// not expanded), matching what `svn log` shows. Revision 0 has no
    /// changes.
    pub fn changes<'a>(
        &self,
        repo: &'a GitRepository,
    ) -> Result<BTreeMap<String, LogEntry<'a>>, SvnError> {
        if self.git_commit.is_none() {
            return Ok(BTreeMap::new());
        }
        let old_root = repo.sure_revision(self.id - 1)?.root(repo)?;
        let new_root = self.root(repo)?;
        let mut out = BTreeMap::new();
        for (path, pair) in change::collect_changes(&old_root, &new_root, false)? {
            let copy_from = self.copy_froms.get(&path).cloned();
            out.insert(path, LogEntry { pair, copy_from });
        }
        Ok(out)
    }
}
