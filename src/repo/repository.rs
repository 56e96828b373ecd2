//! repo::repository
//!
//! The repository aggregate: the revision mapping cache and the caches
//! and locks shared by the tree view, the commit builder and the lock
//! manager.
//!
//! # Architecture
//!
//! A [`GitRepository`] owns the exported git2 repository, any linked
//! repositories used for submodule content, and the in-memory revision
//! store: the dense revision vector plus the date, hash and last-change
//! indexes. All Git access flows through this type.
//!
//! Extension runs in two phases. `cache_revisions` walks the exported
//! branch first-parent from its tip down to the newest already-mapped
//! commit and appends one cache commit per new Git commit to the side
//! branch, flushing the ref every few seconds so partial progress
//! survives crashes; it touches only the object database and takes no
//! state lock. `load_revisions` then re-reads the side branch and extends
//! the in-memory indexes under the exclusive lock, which is the moment
//! new revisions become visible to readers.
//!
//! # Concurrency
//!
//! One reader-writer lock guards the revision vector and the date/hash
//! indexes; readers copy out revision handles. The last-change index and
//! the md5/property caches take their own locks. Pushes serialize on a
//! dedicated mutex held from tree build to ref update.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use md5::{Digest, Md5};
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::core::props::{self, Prop};
use crate::core::types::mode;

use super::cache::{CacheChange, CacheRevision};
use super::change::{self, ChangePair};
use super::commit::{GitCommitBuilder, GitDeltaConsumer};
use super::error::SvnError;
use super::file::{GitFile, RepoSource, TreeEntry};
use super::last_change::LastChangeIndex;
use super::layout;
use super::lock::LockManager;
use super::push::GitPushMode;
use super::rename;
use super::revision::{CopyFrom, GitRevision};

/// Side-branch ref flush and progress report cadence during bulk
/// extension.
const REPORT_DELAY: Duration = Duration::from_millis(2500);

/// Options for opening a bridged repository.
#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    /// Short name of the exported branch.
    pub branch: String,
    /// How commits are published onto the branch ref.
    pub push_mode: GitPushMode,
    /// Whether rename detection feeds the per-revision rename maps.
    pub rename_detection: bool,
    /// Linked repositories resolving submodule commits, in priority
    /// order.
    pub linked: Vec<PathBuf>,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            branch: "master".to_string(),
            push_mode: GitPushMode::Simple,
            rename_detection: true,
            linked: Vec::new(),
        }
    }
}

#[derive(Default)]
struct RevisionCacheState {
    revisions: Vec<GitRevision>,
    by_date: BTreeMap<i64, i64>,
    by_hash: HashMap<git2::Oid, i64>,
}

/// A Git repository exported with SVN semantics.
pub struct GitRepository {
    repo: git2::Repository,
    linked: Vec<git2::Repository>,
    push_mode: GitPushMode,
    rename_detection: bool,
    git_branch: String,
    svn_branch: String,
    uuid: String,
    state: RwLock<RevisionCacheState>,
    last_changes: LastChangeIndex,
    md5_cache: Mutex<HashMap<String, String>>,
    dir_props_cache: Mutex<HashMap<git2::Oid, Vec<Prop>>>,
    file_props_cache: Mutex<HashMap<(git2::Oid, String), Option<Prop>>>,
    push_lock: Mutex<()>,
    locks: LockManager,
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.repo.path())
            .field("branch", &self.git_branch)
            .field("uuid", &self.uuid)
            .finish()
    }
}

impl GitRepository {
    /// Open a repository and bring the revision cache up to date.
    ///
    /// Creates the side branch with the synthetic revision 0 when
    /// missing; afterwards every commit reachable first-parent from the
    /// branch tip has a revision, and revision 0 always exists.
    pub fn open(path: &Path, options: RepositoryOptions) -> Result<GitRepository, SvnError> {
        let repo = git2::Repository::open(path)?;
        let mut linked = Vec::with_capacity(options.linked.len());
        for linked_path in &options.linked {
            linked.push(git2::Repository::open(linked_path)?);
        }
        let git_branch = format!("refs/heads/{}", options.branch);
        let (svn_branch, repository_id) = layout::init(&repo, &options.branch)?;
        let uuid = derive_uuid(&repository_id, &git_branch);

        let repository = GitRepository {
            repo,
            linked,
            push_mode: options.push_mode,
            rename_detection: options.rename_detection,
            git_branch,
            svn_branch,
            uuid,
            state: RwLock::new(RevisionCacheState::default()),
            last_changes: LastChangeIndex::new(),
            md5_cache: Mutex::new(HashMap::new()),
            dir_props_cache: Mutex::new(HashMap::new()),
            file_props_cache: Mutex::new(HashMap::new()),
            push_lock: Mutex::new(()),
            locks: LockManager::new(),
        };
        repository.update_revisions()?;
        tracing::info!(
            branch = %repository.git_branch,
            uuid = %repository.uuid,
            "repository ready"
        );
        Ok(repository)
    }

    /// The repository UUID reported to SVN clients.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Full ref name of the exported branch.
    pub fn git_branch(&self) -> &str {
        &self.git_branch
    }

    /// The lock manager of this repository.
    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub(crate) fn push_mode(&self) -> GitPushMode {
        self.push_mode
    }

    pub(crate) fn git_primary(&self) -> &git2::Repository {
        &self.repo
    }

    pub(crate) fn git(&self, source: RepoSource) -> &git2::Repository {
        match source {
            RepoSource::Primary => &self.repo,
            RepoSource::Linked(index) => &self.linked[index],
        }
    }

    pub(crate) fn push_guard(&self) -> MutexGuard<'_, ()> {
        self.push_lock.lock()
    }

    // =========================================================================
    // Revision store
    // =========================================================================

    /// The newest revision. Revision 0 exists from initialization, so
    /// this never fails.
    pub fn latest(&self) -> GitRevision {
        let state = self.state.read();
        state
            .revisions
            .last()
            .cloned()
            .expect("revision 0 exists after initialization")
    }

    /// Look up a revision by id.
    pub fn revision_by_id(&self, id: i64) -> Result<GitRevision, SvnError> {
        if id >= 0 {
            let state = self.state.read();
            if let Some(revision) = state.revisions.get(id as usize) {
                return Ok(revision.clone());
            }
        }
        Err(SvnError::NoSuchRevision(id.to_string()))
    }

    /// The newest revision whose date is `<= date_ms`, falling back to
    /// revision 0.
    pub fn revision_by_date(&self, date_ms: i64) -> GitRevision {
        let state = self.state.read();
        if let Some((_, &id)) = state.by_date.range(..=date_ms).next_back() {
            if let Some(revision) = state.revisions.get(id as usize) {
                return revision.clone();
            }
        }
        state
            .revisions
            .first()
            .cloned()
            .expect("revision 0 exists after initialization")
    }

    /// The revision mapped to a Git commit.
    pub fn revision_by_git_commit(&self, commit: git2::Oid) -> Result<GitRevision, SvnError> {
        let state = self.state.read();
        match state.by_hash.get(&commit) {
            Some(&id) => state
                .revisions
                .get(id as usize)
                .cloned()
                .ok_or_else(|| SvnError::IllegalState(format!("dangling hash index for r{}", id))),
            None => Err(SvnError::NoSuchRevision(commit.to_string())),
        }
    }

    pub(crate) fn sure_revision(&self, id: i64) -> Result<GitRevision, SvnError> {
        self.revision_by_id(id)
            .map_err(|_| SvnError::IllegalState(format!("no such revision {}", id)))
    }

    /// The newest revision `<= before` in which `path` changed, or `None`
    /// when the path is absent at `before`. The root always exists.
    pub fn last_change(&self, path: &str, before: i64) -> Option<i64> {
        if path.is_empty() {
            return Some(before);
        }
        self.last_changes.last_change(path, before)
    }

    /// Bring the revision store up to date with both the exported branch
    /// and the side branch.
    pub fn update_revisions(&self) -> Result<(), SvnError> {
        loop {
            self.load_revisions()?;
            if !self.cache_revisions()? {
                return Ok(());
            }
        }
    }

    /// Load cache commits from the side branch into the in-memory store.
    fn load_revisions(&self) -> Result<bool, SvnError> {
        // Fast check under the shared lock.
        {
            let state = self.state.read();
            if let Some(last) = state.revisions.last() {
                if self.cache_ref_tip()? == last.cache_commit() {
                    return Ok(false);
                }
            }
        }

        let mut state = self.state.write();
        let last_cache = state.revisions.last().map(|r| r.cache_commit());
        let tip = self.cache_ref_tip()?;
        let mut new_commits = Vec::new();
        let mut oid = tip;
        loop {
            if Some(oid) == last_cache {
                break;
            }
            let commit = self.repo.find_commit(oid)?;
            new_commits.push(oid);
            if commit.parent_count() == 0 {
                break;
            }
            oid = commit.parent_id(0)?;
        }
        if new_commits.is_empty() {
            return Ok(false);
        }

        let begin = Instant::now();
        let mut report = Instant::now();
        let mut processed = 0usize;
        tracing::info!(count = new_commits.len(), "loading cached revision changes");
        for oid in new_commits.iter().rev() {
            self.load_revision_info(&mut state, *oid)?;
            processed += 1;
            if report.elapsed() >= REPORT_DELAY {
                let per_sec = (processed as f64 / report.elapsed().as_secs_f64()) as u64;
                tracing::info!(processed, per_sec, "processed cached revisions");
                report = Instant::now();
                processed = 0;
            }
        }
        tracing::info!(
            elapsed_ms = begin.elapsed().as_millis() as u64,
            "cached revisions loaded"
        );
        Ok(true)
    }

    fn load_revision_info(
        &self,
        state: &mut RevisionCacheState,
        cache_oid: git2::Oid,
    ) -> Result<(), SvnError> {
        let cache_commit = self.repo.find_commit(cache_oid)?;
        let record = layout::parse_cache_commit(&self.repo, &cache_commit)?;
        if record.revision != state.revisions.len() as i64 {
            return Err(SvnError::IllegalState(format!(
                "cache commit {} carries r{} at chain depth {}",
                cache_oid,
                record.revision,
                state.revisions.len()
            )));
        }
        let date_ms = cache_commit.time().seconds() * 1000;
        let git_commit = record
            .git_commit
            .as_deref()
            .map(git2::Oid::from_str)
            .transpose()?;
        let (author, log) = match git_commit {
            Some(oid) => {
                let commit = self.repo.find_commit(oid)?;
                let author = commit.committer().name().map(str::to_string);
                let log = commit.message().map(|m| m.trim().to_string());
                (author, log)
            }
            None => (None, None),
        };

        let mut copy_froms = HashMap::new();
        for (new_path, old_path) in &record.renames {
            copy_froms.insert(
                new_path.clone(),
                CopyFrom {
                    revision: record.revision - 1,
                    path: old_path.clone(),
                },
            );
        }
        for (path, file_change) in &record.file_change {
            self.last_changes
                .record(path, record.revision, file_change.new_blob.is_none());
        }

        let revision = GitRevision::new(
            record.revision,
            cache_oid,
            git_commit,
            date_ms,
            author,
            log,
            copy_froms,
        );
        if record.revision > 0 {
            let monotone = state
                .by_date
                .iter()
                .next_back()
                .map_or(true, |(&date, _)| date <= date_ms);
            if monotone {
                state.by_date.insert(date_ms, record.revision);
            }
        }
        if let Some(oid) = git_commit {
            state.by_hash.insert(oid, record.revision);
        }
        state.revisions.push(revision);
        Ok(())
    }

    /// Extend the side branch with cache commits for new Git commits.
    ///
    /// Runs entirely against the object database; the in-memory store is
    /// only read. Returns whether anything was appended.
    fn cache_revisions(&self) -> Result<bool, SvnError> {
        // Fast check under the shared lock.
        {
            let state = self.state.read();
            if let Some(last) = state.revisions.last() {
                match self.branch_tip()? {
                    None => return Ok(false),
                    Some(tip) => {
                        if Some(tip) == last.git_commit() {
                            return Ok(false);
                        }
                    }
                }
            }
        }
        let tip = match self.branch_tip()? {
            Some(tip) => tip,
            None => return Ok(false),
        };

        let mut new_commits = Vec::new();
        {
            let state = self.state.read();
            let mut oid = tip;
            loop {
                if state.by_hash.contains_key(&oid) {
                    break;
                }
                let commit = self.repo.find_commit(oid)?;
                new_commits.push(oid);
                if commit.parent_count() == 0 {
                    break;
                }
                oid = commit.parent_id(0)?;
            }
        }
        if new_commits.is_empty() {
            return Ok(false);
        }

        let (mut cache_id, mut revision_id) = {
            let state = self.state.read();
            let last = state
                .revisions
                .last()
                .ok_or_else(|| SvnError::IllegalState("revision store is empty".to_string()))?;
            (last.cache_commit(), last.id() + 1)
        };

        let begin = Instant::now();
        let mut report = Instant::now();
        let mut processed = 0usize;
        tracing::info!(count = new_commits.len(), "caching revision changes");
        for oid in new_commits.iter().rev() {
            let commit = self.repo.find_commit(*oid)?;
            let parent = if commit.parent_count() > 0 {
                Some(commit.parent_id(0)?)
            } else {
                None
            };
            let record = self.create_cache(parent, *oid, revision_id)?;
            cache_id = layout::create_cache_commit(&self.repo, cache_id, &commit, &record)?;
            processed += 1;
            revision_id += 1;
            if report.elapsed() >= REPORT_DELAY {
                let per_sec = (processed as f64 / report.elapsed().as_secs_f64()) as u64;
                tracing::info!(processed, per_sec, "cached revisions");
                report = Instant::now();
                processed = 0;
                self.repo
                    .reference(&self.svn_branch, cache_id, true, "revision cache checkpoint")?;
            }
        }
        self.repo
            .reference(&self.svn_branch, cache_id, true, "revision cache update")?;
        tracing::info!(
            elapsed_ms = begin.elapsed().as_millis() as u64,
            "revision changes cached"
        );
        Ok(true)
    }

    fn create_cache(
        &self,
        old_commit: Option<git2::Oid>,
        new_commit: git2::Oid,
        revision_id: i64,
    ) -> Result<CacheRevision, SvnError> {
        let old_root = match old_commit {
            Some(oid) => GitFile::commit_root(self, oid, revision_id - 1)?,
            None => GitFile::empty_root(self, revision_id - 1),
        };
        let new_root = GitFile::commit_root(self, new_commit, revision_id)?;

        let mut file_change = BTreeMap::new();
        for (path, pair) in change::collect_changes(&old_root, &new_root, true)? {
            file_change.insert(path, cache_change(&pair));
        }

        let old_tree = match old_commit {
            Some(oid) => Some(self.repo.find_commit(oid)?.tree_id()),
            None => None,
        };
        let new_tree = self.repo.find_commit(new_commit)?.tree_id();
        let renames =
            rename::collect_renames(&self.repo, old_tree, new_tree, self.rename_detection)?;

        Ok(CacheRevision {
            branches: BTreeMap::new(),
            file_change,
            git_commit: Some(new_commit.to_string()),
            renames,
            revision: revision_id,
        })
    }

    fn branch_tip(&self) -> Result<Option<git2::Oid>, SvnError> {
        match self.repo.find_reference(&self.git_branch) {
            Ok(reference) => Ok(reference.target()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn cache_ref_tip(&self) -> Result<git2::Oid, SvnError> {
        let reference = self.repo.find_reference(&self.svn_branch)?;
        reference
            .target()
            .ok_or_else(|| SvnError::IllegalState(format!("{} has no target", self.svn_branch)))
    }

    // =========================================================================
    // Tree access and caches
    // =========================================================================

    /// Resolve a directory-like entry to the tree holding its children.
    ///
    /// Submodule entries resolve through the linked repositories in
    /// registration order; without a hit the entry has no tree and reads
    /// as empty.
    fn resolve_tree(
        &self,
        source: RepoSource,
        entry: Option<&TreeEntry>,
    ) -> Result<Option<(RepoSource, git2::Oid)>, SvnError> {
        let entry = match entry {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if entry.mode == mode::DIR {
            return Ok(Some((source, entry.oid)));
        }
        if entry.mode == mode::GITLINK {
            for (index, linked) in self.linked.iter().enumerate() {
                if linked.odb()?.exists(entry.oid) {
                    let commit = linked.find_commit(entry.oid)?;
                    return Ok(Some((RepoSource::Linked(index), commit.tree_id())));
                }
            }
        }
        Ok(None)
    }

    fn read_tree(
        &self,
        source: RepoSource,
        tree_oid: git2::Oid,
    ) -> Result<Vec<(String, TreeEntry, RepoSource)>, SvnError> {
        let tree = self.git(source).find_tree(tree_oid)?;
        let mut out = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let name = match entry.name() {
                Some(name) => name.to_string(),
                None => continue,
            };
            out.push((
                name,
                TreeEntry {
                    mode: entry.filemode(),
                    oid: entry.id(),
                },
                source,
            ));
        }
        Ok(out)
    }

    pub(crate) fn load_tree(
        &self,
        source: RepoSource,
        entry: Option<&TreeEntry>,
    ) -> Result<Vec<(String, TreeEntry, RepoSource)>, SvnError> {
        match self.resolve_tree(source, entry)? {
            Some((source, tree_oid)) => self.read_tree(source, tree_oid),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn load_entries_map(
        &self,
        source: RepoSource,
        entry: Option<&TreeEntry>,
    ) -> Result<BTreeMap<String, TreeEntry>, SvnError> {
        let mut out = BTreeMap::new();
        for (name, entry, _) in self.load_tree(source, entry)? {
            out.insert(name, entry);
        }
        Ok(out)
    }

    /// Property fragments contributed by a directory's own config files,
    /// memoized by tree id.
    pub(crate) fn dir_properties(
        &self,
        source: RepoSource,
        entry: Option<&TreeEntry>,
    ) -> Result<Vec<Prop>, SvnError> {
        let (source, tree_oid) = match self.resolve_tree(source, entry)? {
            Some(resolved) => resolved,
            None => return Ok(Vec::new()),
        };
        if let Some(cached) = self.dir_props_cache.lock().get(&tree_oid) {
            return Ok(cached.clone());
        }
        let mut fragments = Vec::new();
        for (name, child, child_source) in self.read_tree(source, tree_oid)? {
            if !props::is_config_file(&name) {
                continue;
            }
            if let Some(prop) = self.file_property(child_source, &name, child.oid)? {
                fragments.push(prop);
            }
        }
        self.dir_props_cache
            .lock()
            .insert(tree_oid, fragments.clone());
        Ok(fragments)
    }

    /// Parse one config blob into a fragment, memoized by (id, name).
    fn file_property(
        &self,
        source: RepoSource,
        name: &str,
        oid: git2::Oid,
    ) -> Result<Option<Prop>, SvnError> {
        let key = (oid, name.to_string());
        if let Some(cached) = self.file_props_cache.lock().get(&key) {
            return Ok(cached.clone());
        }
        let blob = self.git(source).find_blob(oid)?;
        let prop = props::parse_config(name, blob.content());
        self.file_props_cache.lock().insert(key, prop.clone());
        Ok(prop)
    }

    /// Memoized hex MD5 of an object's content.
    pub(crate) fn object_md5<F>(
        &self,
        oid: git2::Oid,
        kind: char,
        content: F,
    ) -> Result<String, SvnError>
    where
        F: FnOnce() -> Result<Vec<u8>, SvnError>,
    {
        let key = format!("{}{}", kind, oid);
        if let Some(cached) = self.md5_cache.lock().get(&key) {
            return Ok(cached.clone());
        }
        let bytes = content()?;
        let mut digest = Md5::new();
        digest.update(&bytes);
        let hex = to_hex(&digest.finalize());
        self.md5_cache.lock().insert(key, hex.clone());
        Ok(hex)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Start an editor drive on top of the latest revision.
    pub fn commit_builder(&self) -> Result<GitCommitBuilder<'_>, SvnError> {
        GitCommitBuilder::new(self)
    }

    /// A delta consumer for a newly added file.
    pub fn create_file(&self) -> GitDeltaConsumer {
        GitDeltaConsumer::create()
    }

    /// A delta consumer modifying an existing file.
    pub fn modify_file(&self, file: &GitFile<'_>) -> Result<GitDeltaConsumer, SvnError> {
        GitDeltaConsumer::modify(file)
    }
}

fn cache_change(pair: &ChangePair<'_>) -> CacheChange {
    let old = pair.old.as_ref().and_then(|f| f.tree_entry().copied());
    let new = pair.new.as_ref().and_then(|f| f.tree_entry().copied());
    CacheChange {
        new_blob: new.map(|e| e.oid.to_string()),
        new_mode: new.map(|e| e.mode),
        old_blob: old.map(|e| e.oid.to_string()),
        old_mode: old.map(|e| e.mode),
    }
}

fn derive_uuid(repository_id: &str, git_branch: &str) -> String {
    let mut digest = Md5::new();
    digest.update(repository_id.as_bytes());
    digest.update(b"\0");
    digest.update(git_branch.as_bytes());
    let bytes: [u8; 16] = digest.finalize().into();
    uuid::Builder::from_md5_bytes(bytes).into_uuid().to_string()
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_stable_and_branch_scoped() {
        let a = derive_uuid("repo-id", "refs/heads/master");
        let b = derive_uuid("repo-id", "refs/heads/master");
        let c = derive_uuid("repo-id", "refs/heads/main");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn hex_encoding() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x10]), "00ff10");
    }
}
