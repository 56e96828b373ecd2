//! repo::commit
//!
//! The commit builder: an editor-style state machine that assembles a new
//! Git tree, validates SVN properties against the prospective commit, and
//! publishes it with a serialized fast-forward push.
//!
//! # Editor drive
//!
//! Operations arrive in depth-first order. The builder mirrors the
//! current editor depth with a stack of directory frames; `close_dir`
//! serializes the popped frame's tree into the object database and links
//! it into the parent. Property checks are deferred: each operation that
//! asserts properties records a validation action, and the whole list
//! replays against the tree view of the freshly built commit before the
//! push.
//!
//! # Outcome
//!
//! `commit` returns `Ok(None)` when the branch ref advanced concurrently
//! (non-fast-forward); the caller re-reads the latest revision and
//! restarts the drive. All other failures are errors.

use std::collections::{BTreeMap, HashMap};

use crate::core::paths;
use crate::core::props;
use crate::core::types::{mode, PropMap, User, LINK_PREFIX, PROP_EXECUTABLE, PROP_SPECIAL};

use super::error::SvnError;
use super::file::{GitFile, RepoSource, TreeEntry};
use super::repository::GitRepository;
use super::revision::GitRevision;

/// Staged content and properties for one file of a commit.
///
/// The protocol layer streams file content into this consumer and sets
/// the target SVN properties; the builder then reads off the final blob
/// and property map. Content left unset on a modified file keeps the
/// original blob.
#[derive(Debug)]
pub struct GitDeltaConsumer {
    original: Option<TreeEntry>,
    props: PropMap,
    content: Option<Vec<u8>>,
}

impl GitDeltaConsumer {
    pub(crate) fn create() -> Self {
        Self {
            original: None,
            props: PropMap::new(),
            content: None,
        }
    }

    pub(crate) fn modify(file: &GitFile<'_>) -> Result<Self, SvnError> {
        Ok(Self {
            original: file.tree_entry().copied(),
            props: file.properties(false)?,
            content: None,
        })
    }

    /// Append content bytes. Symlink content arrives in the wire form
    /// `link <target>`; the prefix is stripped before the blob is stored.
    pub fn write(&mut self, data: &[u8]) {
        self.content.get_or_insert_with(Vec::new).extend_from_slice(data);
    }

    /// Set or remove one target property.
    pub fn set_property(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.props.insert(name.to_string(), value.to_string());
            }
            None => {
                self.props.remove(name);
            }
        }
    }

    /// The target property map for this file.
    pub fn properties(&self) -> &PropMap {
        &self.props
    }

    fn original(&self) -> Option<&TreeEntry> {
        self.original.as_ref()
    }

    fn take_blob(&mut self, repo: &GitRepository) -> Result<Option<git2::Oid>, SvnError> {
        let content = match self.content.take() {
            Some(content) => content,
            None => return Ok(None),
        };
        let bytes = if self.props.contains_key(PROP_SPECIAL) {
            content
                .strip_prefix(LINK_PREFIX.as_bytes())
                .map(|rest| rest.to_vec())
                .unwrap_or(content)
        } else {
            content
        };
        Ok(Some(repo.git_primary().blob(&bytes)?))
    }
}

/// One staged directory of the commit being built.
#[derive(Debug)]
struct GitTreeUpdate {
    name: String,
    entries: BTreeMap<String, TreeEntry>,
}

impl GitTreeUpdate {
    fn new(name: String, entries: BTreeMap<String, TreeEntry>) -> Self {
        Self { name, entries }
    }

    fn build_tree(&self, repo: &git2::Repository) -> Result<git2::Oid, SvnError> {
        let mut builder = repo.treebuilder(None)?;
        for (name, entry) in &self.entries {
            builder.insert(name, entry.oid, entry.mode)?;
        }
        Ok(builder.write()?)
    }
}

/// Deferred property validation steps, replayed against the built commit.
#[derive(Debug)]
enum ValidateAction {
    OpenDir(String),
    CloseDir,
    CheckProps {
        name: Option<String>,
        expected: PropMap,
    },
}

/// Builds one commit from an SVN editor drive.
///
/// Obtained from [`GitRepository::commit_builder`]; captures the latest
/// revision at construction as the edit base.
pub struct GitCommitBuilder<'a> {
    repo: &'a GitRepository,
    revision: GitRevision,
    branch: String,
    tree_stack: Vec<GitTreeUpdate>,
    validate_actions: Vec<ValidateAction>,
    modified: Vec<String>,
    deleted: Vec<String>,
}

impl<'a> GitCommitBuilder<'a> {
    pub(crate) fn new(repo: &'a GitRepository) -> Result<Self, SvnError> {
        let revision = repo.latest();
        let root_entries = match revision.git_commit() {
            Some(commit_id) => {
                let commit = repo.git_primary().find_commit(commit_id)?;
                let entry = TreeEntry {
                    mode: mode::DIR,
                    oid: commit.tree_id(),
                };
                repo.load_entries_map(RepoSource::Primary, Some(&entry))?
            }
            None => BTreeMap::new(),
        };
        Ok(Self {
            repo,
            revision,
            branch: repo.git_branch().to_string(),
            tree_stack: vec![GitTreeUpdate::new(String::new(), root_entries)],
            validate_actions: Vec::new(),
            modified: Vec::new(),
            deleted: Vec::new(),
        })
    }

    /// The revision this edit is based on.
    pub fn base_revision(&self) -> &GitRevision {
        &self.revision
    }

    /// Verify the client's view of `path` is current.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` when the path does not exist at the base
    /// - `NotUpToDate` when the path changed after `rev`
    pub fn check_up_to_date(&self, path: &str, rev: i64) -> Result<(), SvnError> {
        let path = paths::normalize(path);
        match self.revision.file(self.repo, &path)? {
            None => Err(SvnError::EntryNotFound(path)),
            Some(file) => {
                if file.last_change()?.id() > rev {
                    Err(SvnError::NotUpToDate(path))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Add a directory in the current directory, optionally seeding its
    /// entries from an existing directory (copy semantics).
    pub fn add_dir(&mut self, name: &str, source: Option<&GitFile<'_>>) -> Result<(), SvnError> {
        let full_path = self.full_path(name);
        match self.tree_stack.last() {
            Some(frame) if frame.entries.contains_key(name) => {
                return Err(SvnError::AlreadyExists(full_path));
            }
            Some(_) => {}
            None => return Err(SvnError::IllegalState("empty editor stack".to_string())),
        }
        let entries = match source {
            Some(dir) => self.repo.load_entries_map(dir.source(), dir.tree_entry())?,
            None => BTreeMap::new(),
        };
        self.validate_actions
            .push(ValidateAction::OpenDir(name.to_string()));
        self.tree_stack
            .push(GitTreeUpdate::new(name.to_string(), entries));
        Ok(())
    }

    /// Open an existing subdirectory of the current directory.
    pub fn open_dir(&mut self, name: &str) -> Result<(), SvnError> {
        let full_path = self.full_path(name);
        let entry = {
            let frame = self
                .tree_stack
                .last_mut()
                .ok_or_else(|| SvnError::IllegalState("empty editor stack".to_string()))?;
            match frame.entries.remove(name) {
                Some(entry) if entry.mode == mode::DIR => entry,
                _ => return Err(SvnError::EntryNotFound(full_path)),
            }
        };
        let entries = self
            .repo
            .load_entries_map(RepoSource::Primary, Some(&entry))?;
        self.validate_actions
            .push(ValidateAction::OpenDir(name.to_string()));
        self.tree_stack
            .push(GitTreeUpdate::new(name.to_string(), entries));
        Ok(())
    }

    /// Record that the current directory's derived properties must equal
    /// `props` once the commit is built.
    pub fn check_dir_properties(&mut self, props: PropMap) {
        self.validate_actions.push(ValidateAction::CheckProps {
            name: None,
            expected: props,
        });
    }

    /// Close the current directory: serialize its tree and link it into
    /// the parent.
    ///
    /// # Errors
    ///
    /// - `Cancelled` when the directory is empty (Git cannot represent
    ///   empty trees)
    pub fn close_dir(&mut self) -> Result<(), SvnError> {
        if self.tree_stack.len() < 2 {
            return Err(SvnError::IllegalState(
                "close_dir without matching open".to_string(),
            ));
        }
        let frame = match self.tree_stack.pop() {
            Some(frame) => frame,
            None => return Err(SvnError::IllegalState("empty editor stack".to_string())),
        };
        let full_path = self.full_path(&frame.name);
        if frame.entries.is_empty() {
            return Err(SvnError::Cancelled(format!(
                "Empty directories are not supported: {}",
                full_path
            )));
        }
        let subtree = frame.build_tree(self.repo.git_primary())?;
        tracing::debug!(tree = %subtree, dir = %full_path, "created tree for directory");
        let parent = self
            .tree_stack
            .last_mut()
            .ok_or_else(|| SvnError::IllegalState("empty editor stack".to_string()))?;
        let replaced = parent.entries.insert(
            frame.name.clone(),
            TreeEntry {
                mode: mode::DIR,
                oid: subtree,
            },
        );
        if replaced.is_some() {
            return Err(SvnError::AlreadyExists(full_path));
        }
        self.validate_actions.push(ValidateAction::CloseDir);
        Ok(())
    }

    /// Stage a file in the current directory.
    ///
    /// `modify` asserts the name already exists; adding asserts it does
    /// not (`NotUpToDate` otherwise). A consumer that received no content
    /// keeps the original blob for modifications - its target properties
    /// still re-derive the file mode and are still validated - and fails
    /// with `IncompleteData` for additions.
    pub fn save_file(
        &mut self,
        name: &str,
        delta: &mut GitDeltaConsumer,
        modify: bool,
    ) -> Result<(), SvnError> {
        let full_path = self.full_path(name);
        let exists = match self.tree_stack.last() {
            Some(frame) => frame.entries.contains_key(name),
            None => return Err(SvnError::IllegalState("empty editor stack".to_string())),
        };
        if modify != exists {
            return Err(SvnError::NotUpToDate(full_path));
        }
        // Without a content delta, a modification keeps the original
        // blob; the target properties still decide the mode and still
        // get validated.
        let blob = delta.take_blob(self.repo)?;
        let oid = match blob {
            Some(oid) => oid,
            None => match delta.original() {
                Some(original) => original.oid,
                None => return Err(SvnError::IncompleteData(full_path)),
            },
        };
        let entry_mode = mode_for_props(delta.properties());
        if let Some(frame) = self.tree_stack.last_mut() {
            frame.entries.insert(
                name.to_string(),
                TreeEntry {
                    mode: entry_mode,
                    oid,
                },
            );
        }
        self.modified.push(full_path);
        self.validate_actions.push(ValidateAction::CheckProps {
            name: Some(name.to_string()),
            expected: delta.properties().clone(),
        });
        Ok(())
    }

    /// Delete an entry of the current directory.
    pub fn delete(&mut self, name: &str) -> Result<(), SvnError> {
        let full_path = self.full_path(name);
        let frame = self
            .tree_stack
            .last_mut()
            .ok_or_else(|| SvnError::IllegalState("empty editor stack".to_string()))?;
        if frame.entries.remove(name).is_none() {
            return Err(SvnError::EntryNotFound(full_path));
        }
        self.deleted.push(full_path);
        Ok(())
    }

    /// Assemble, validate and publish the commit.
    ///
    /// Verifies lock preconditions, builds the root tree, synthesizes the
    /// commit with the user as author and committer, replays the deferred
    /// property checks against the new tree view, and attempts the push
    /// under the repository-wide push mutex.
    ///
    /// Returns the new revision on success, or `None` when the push was
    /// rejected as non-fast-forward.
    pub fn commit(
        &mut self,
        user: &User,
        message: &str,
        lock_tokens: &HashMap<String, String>,
        keep_locks: bool,
    ) -> Result<Option<GitRevision>, SvnError> {
        let consumed =
            self.repo
                .lock_manager()
                .validate_commit(&self.modified, &self.deleted, lock_tokens)?;

        let _push_guard = self.repo.push_guard();

        if self.tree_stack.len() != 1 {
            return Err(SvnError::IllegalState(
                "editor drive left directories open".to_string(),
            ));
        }
        let root = match self.tree_stack.last() {
            Some(root) => root,
            None => return Err(SvnError::IllegalState("empty editor stack".to_string())),
        };
        let git = self.repo.git_primary();
        let tree_id = root.build_tree(git)?;
        tracing::debug!(tree = %tree_id, "created tree for commit");

        let signature = user.signature()?;
        let tree = git.find_tree(tree_id)?;
        let commit_id = match self.revision.git_commit() {
            Some(parent_id) => {
                let parent = git.find_commit(parent_id)?;
                git.commit(None, &signature, &signature, message, &tree, &[&parent])?
            }
            None => git.commit(None, &signature, &signature, message, &tree, &[])?,
        };

        tracing::info!(commit = %commit_id, "validating commit properties");
        self.validate_properties(commit_id)?;

        tracing::info!(commit = %commit_id, branch = %self.branch, "pushing commit");
        if !self
            .repo
            .push_mode()
            .push(git, commit_id, &self.branch)?
        {
            tracing::info!("non fast forward push rejected");
            return Ok(None);
        }

        self.repo.update_revisions()?;
        self.repo.lock_manager().complete_commit(&consumed, keep_locks);
        Ok(Some(self.repo.revision_by_git_commit(commit_id)?))
    }

    fn validate_properties(&self, commit_id: git2::Oid) -> Result<(), SvnError> {
        let root = GitFile::commit_root(self.repo, commit_id, self.revision.id() + 1)?;
        let mut stack = vec![root];
        for action in &self.validate_actions {
            match action {
                ValidateAction::OpenDir(name) => {
                    let top = stack.last().ok_or_else(|| {
                        SvnError::IllegalState("validator stack underflow".to_string())
                    })?;
                    let child = top.entry(name)?.ok_or_else(|| {
                        SvnError::IllegalState(format!(
                            "can't find {} in created commit",
                            name
                        ))
                    })?;
                    stack.push(child);
                }
                ValidateAction::CloseDir => {
                    stack.pop();
                }
                ValidateAction::CheckProps { name, expected } => {
                    let top = stack.last().ok_or_else(|| {
                        SvnError::IllegalState("validator stack underflow".to_string())
                    })?;
                    let node = match name {
                        Some(name) => top.entry(name)?.ok_or_else(|| {
                            SvnError::IllegalState(format!(
                                "can't find {} in created commit",
                                name
                            ))
                        })?,
                        None => top.clone(),
                    };
                    let actual = node.properties(false)?;
                    if &actual != expected {
                        return Err(property_mismatch(node.full_path(), &actual, expected));
                    }
                }
            }
        }
        Ok(())
    }

    fn full_path(&self, name: &str) -> String {
        let mut path = String::new();
        for frame in &self.tree_stack {
            if !frame.name.is_empty() {
                path.push('/');
                path.push_str(&frame.name);
            }
        }
        if !name.is_empty() {
            path.push('/');
            path.push_str(name);
        }
        path
    }
}

fn mode_for_props(props: &PropMap) -> i32 {
    if props.contains_key(PROP_SPECIAL) {
        mode::SYMLINK
    } else if props.contains_key(PROP_EXECUTABLE) {
        mode::EXECUTABLE
    } else {
        mode::FILE
    }
}

fn property_mismatch(path: &str, actual: &PropMap, expected: &PropMap) -> SvnError {
    let mut message = String::new();
    message.push_str(&format!("Can't commit entry: {}\n", path));
    message.push_str("Invalid svn properties found.\n");
    message.push_str("Expected:\n");
    for (name, value) in expected {
        message.push_str(&format!("  {} = {:?}\n", name, value));
    }
    message.push_str("Actual:\n");
    for (name, value) in actual {
        message.push_str(&format!("  {} = {:?}\n", name, value));
    }
    message.push_str("\n----------------\n");
    message.push_str("Subversion properties must be consistent with Git config files:\n");
    for file in props::CONFIG_FILES {
        message.push_str(&format!("  {}\n", file));
    }
    SvnError::PropertyMismatch(message)
}
