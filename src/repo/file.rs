//! repo::file
//!
//! The tree view: a read-only projection of a Git tree entry as an SVN
//! node.
//!
//! A [`GitFile`] pairs a tree entry with the revision it is viewed at and
//! the property fragments inherited from its ancestor directories. Kind,
//! size, MD5, content and the effective SVN property map are all derived
//! on demand; expensive derivations (per-blob config parses, MD5) are
//! memoized by object id inside the owning [`GitRepository`].
//!
//! Submodule entries surface as directories whose content comes from the
//! first linked repository holding the referenced commit; without one the
//! directory is empty. Symlinks expose the wire form `link <target>` with
//! `svn:special` set; size and MD5 account for the prefix.

use std::collections::BTreeMap;
use std::io::Cursor;

use crate::core::paths;
use crate::core::props::{self, Prop};
use crate::core::types::{
    mode, NodeKind, PropMap, LINK_PREFIX, PROP_ENTRY_AUTHOR, PROP_ENTRY_DATE, PROP_ENTRY_REV,
    PROP_ENTRY_UUID, PROP_EXECUTABLE, PROP_SPECIAL,
};

use super::error::SvnError;
use super::repository::GitRepository;
use super::revision::GitRevision;

/// Which object database an entry's objects live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoSource {
    /// The exported repository.
    Primary,
    /// A linked repository, by registration index.
    Linked(usize),
}

/// A raw Git tree entry: file mode and object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntry {
    /// Git file mode (see [`mode`]).
    pub mode: i32,
    /// Blob, tree or commit id, depending on mode.
    pub oid: git2::Oid,
}

/// An SVN node: one tree entry viewed at one revision.
#[derive(Clone)]
pub struct GitFile<'a> {
    repo: &'a GitRepository,
    entry: Option<TreeEntry>,
    source: RepoSource,
    full_path: String,
    props: Vec<Prop>,
    revision: i64,
}

impl std::fmt::Debug for GitFile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitFile")
            .field("full_path", &self.full_path)
            .field("entry", &self.entry)
            .field("revision", &self.revision)
            .finish()
    }
}

impl<'a> GitFile<'a> {
    /// Root node of a commit's tree.
    pub(crate) fn commit_root(
        repo: &'a GitRepository,
        commit_id: git2::Oid,
        revision: i64,
    ) -> Result<Self, SvnError> {
        let commit = repo.git_primary().find_commit(commit_id)?;
        let entry = TreeEntry {
            mode: mode::DIR,
            oid: commit.tree_id(),
        };
        Self::new(
            repo,
            Some(entry),
            RepoSource::Primary,
            String::new(),
            &[],
            revision,
        )
    }

    /// Root node of the synthetic empty tree (revision 0).
    pub(crate) fn empty_root(repo: &'a GitRepository, revision: i64) -> Self {
        Self {
            repo,
            entry: None,
            source: RepoSource::Primary,
            full_path: String::new(),
            props: Vec::new(),
            revision,
        }
    }

    fn new(
        repo: &'a GitRepository,
        entry: Option<TreeEntry>,
        source: RepoSource,
        full_path: String,
        parent_props: &[Prop],
        revision: i64,
    ) -> Result<Self, SvnError> {
        let kind = entry.map_or(NodeKind::Dir, |e| NodeKind::from_mode(e.mode));
        let own = repo.dir_properties(source, entry.as_ref())?;
        let props = props::join(parent_props, paths::base_name(&full_path), kind, own);
        Ok(Self {
            repo,
            entry,
            source,
            full_path,
            props,
            revision,
        })
    }

    /// Repository-absolute path of this node (empty for the root).
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Final path component; empty for the root.
    pub fn file_name(&self) -> &str {
        paths::base_name(&self.full_path)
    }

    /// The node kind derived from the Git file mode.
    pub fn kind(&self) -> NodeKind {
        self.entry
            .map_or(NodeKind::Dir, |e| NodeKind::from_mode(e.mode))
    }

    /// Whether this node is a directory (including submodules).
    pub fn is_directory(&self) -> bool {
        self.kind() == NodeKind::Dir
    }

    /// Whether this node is a symlink.
    pub fn is_symlink(&self) -> bool {
        self.kind() == NodeKind::Symlink
    }

    /// The revision this node is viewed at.
    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub(crate) fn tree_entry(&self) -> Option<&TreeEntry> {
        self.entry.as_ref()
    }

    pub(crate) fn source(&self) -> RepoSource {
        self.source
    }

    pub(crate) fn mode(&self) -> i32 {
        self.entry.map_or(mode::DIR, |e| e.mode)
    }

    pub(crate) fn prop_fragments(&self) -> &[Prop] {
        &self.props
    }

    /// The effective SVN property map of this node.
    ///
    /// Sources, in order: inherited and own config-file fragments,
    /// mode-derived properties (`svn:executable`, `svn:special`), and -
    /// when `include_internal` is set - the `svn:entry:*` properties
    /// taken from the node's last-change revision.
    pub fn properties(&self, include_internal: bool) -> Result<PropMap, SvnError> {
        let mut map = PropMap::new();
        let kind = self.kind();
        for prop in &self.props {
            prop.apply(kind, &mut map);
        }
        if let Some(entry) = &self.entry {
            if entry.mode == mode::EXECUTABLE {
                map.insert(PROP_EXECUTABLE.to_string(), "*".to_string());
            } else if entry.mode == mode::SYMLINK {
                map.insert(PROP_SPECIAL.to_string(), "*".to_string());
            }
        }
        if include_internal {
            let last = self.last_change()?;
            map.insert(
                PROP_ENTRY_UUID.to_string(),
                self.repo.uuid().to_string(),
            );
            map.insert(PROP_ENTRY_REV.to_string(), last.id().to_string());
            map.insert(
                PROP_ENTRY_DATE.to_string(),
                crate::core::types::svn_date(last.date_ms()),
            );
            if let Some(author) = last.author() {
                map.insert(PROP_ENTRY_AUTHOR.to_string(), author.to_string());
            }
        }
        Ok(map)
    }

    /// The newest revision `<=` this view's revision in which this path
    /// changed.
    pub fn last_change(&self) -> Result<GitRevision, SvnError> {
        match self.repo.last_change(&self.full_path, self.revision) {
            Some(rev) => self.repo.sure_revision(rev),
            None => Err(SvnError::IllegalState(format!(
                "no last change recorded for {}",
                self.full_path
            ))),
        }
    }

    /// Raw content bytes; symlinks yield the `link <target>` wire form,
    /// directories yield nothing.
    pub fn content(&self) -> Result<Vec<u8>, SvnError> {
        let entry = match &self.entry {
            Some(e) => e,
            None => return Ok(Vec::new()),
        };
        match self.kind() {
            NodeKind::Dir => Ok(Vec::new()),
            NodeKind::File => {
                let blob = self.repo.git(self.source).find_blob(entry.oid)?;
                Ok(blob.content().to_vec())
            }
            NodeKind::Symlink => {
                let blob = self.repo.git(self.source).find_blob(entry.oid)?;
                let mut buf = Vec::with_capacity(LINK_PREFIX.len() + blob.size());
                buf.extend_from_slice(LINK_PREFIX.as_bytes());
                buf.extend_from_slice(blob.content());
                Ok(buf)
            }
        }
    }

    /// Open the node content as a reader.
    pub fn open(&self) -> Result<Cursor<Vec<u8>>, SvnError> {
        Ok(Cursor::new(self.content()?))
    }

    /// Content length in bytes; symlinks include the wire prefix,
    /// directories report 0.
    pub fn size(&self) -> Result<u64, SvnError> {
        let entry = match &self.entry {
            Some(e) => e,
            None => return Ok(0),
        };
        match self.kind() {
            NodeKind::Dir => Ok(0),
            NodeKind::File => {
                let blob = self.repo.git(self.source).find_blob(entry.oid)?;
                Ok(blob.size() as u64)
            }
            NodeKind::Symlink => {
                let blob = self.repo.git(self.source).find_blob(entry.oid)?;
                Ok((LINK_PREFIX.len() + blob.size()) as u64)
            }
        }
    }

    /// Hex MD5 of the node content, memoized per object.
    ///
    /// Symlinks digest the `link <target>` form, so the same blob cached
    /// as a plain file keeps a separate digest.
    pub fn md5(&self) -> Result<String, SvnError> {
        let entry = match &self.entry {
            Some(e) => e,
            None => return self.repo.object_md5(git2::Oid::zero(), 'f', || Ok(Vec::new())),
        };
        let prefix = if self.is_symlink() { 'l' } else { 'f' };
        self.repo.object_md5(entry.oid, prefix, || self.content())
    }

    /// Child nodes of a directory, ordered by name. Empty for files.
    pub fn entries(&self) -> Result<BTreeMap<String, GitFile<'a>>, SvnError> {
        let mut out = BTreeMap::new();
        for (name, entry, source) in self.repo.load_tree(self.source, self.entry.as_ref())? {
            let full_path = paths::join(&self.full_path, &name);
            let child = GitFile::new(
                self.repo,
                Some(entry),
                source,
                full_path,
                &self.props,
                self.revision,
            )?;
            out.insert(name, child);
        }
        Ok(out)
    }

    /// Look up a single child by name.
    pub fn entry(&self, name: &str) -> Result<Option<GitFile<'a>>, SvnError> {
        for (entry_name, entry, source) in
            self.repo.load_tree(self.source, self.entry.as_ref())?
        {
            if entry_name == name {
                let full_path = paths::join(&self.full_path, name);
                return Ok(Some(GitFile::new(
                    self.repo,
                    Some(entry),
                    source,
                    full_path,
                    &self.props,
                    self.revision,
                )?));
            }
        }
        Ok(None)
    }
}
