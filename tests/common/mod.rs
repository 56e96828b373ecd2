//! Shared test fixture: real git repositories created via the git CLI in
//! temporary directories.

// Each test binary compiles this module separately and uses a subset.
#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use svnbridge::repo::{GitRepository, RepositoryOptions};

/// A real git repository on disk, driven through the git CLI.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create an initialized repository with no commits yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        run_git(dir.path(), &["init", "--initial-branch=master"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);
        Self { dir }
    }

    /// Path to the working directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open the bridged repository with default options.
    pub fn open(&self) -> GitRepository {
        GitRepository::open(self.path(), RepositoryOptions::default())
            .expect("failed to open bridged repository")
    }

    /// Write a file (creating parent directories), add and commit it.
    /// Returns the new commit id in hex.
    pub fn commit_file(&self, path: &str, content: &str, message: &str) -> String {
        self.write_file(path, content);
        run_git(self.path(), &["add", path]);
        run_git(self.path(), &["commit", "-m", message]);
        self.head()
    }

    /// Like [`commit_file`], but with a fixed commit time (seconds since
    /// the epoch).
    pub fn commit_file_at(&self, path: &str, content: &str, message: &str, epoch: i64) -> String {
        self.write_file(path, content);
        run_git(self.path(), &["add", path]);
        let date = format!("@{} +0000", epoch);
        run_git_env(
            self.path(),
            &["commit", "-m", message],
            &[("GIT_AUTHOR_DATE", &date), ("GIT_COMMITTER_DATE", &date)],
        );
        self.head()
    }

    /// Remove a file and commit the deletion.
    pub fn commit_rm(&self, path: &str, message: &str) -> String {
        run_git(self.path(), &["rm", "-r", path]);
        run_git(self.path(), &["commit", "-m", message]);
        self.head()
    }

    /// Rename a path and commit the move.
    pub fn commit_mv(&self, from: &str, to: &str, message: &str) -> String {
        run_git(self.path(), &["mv", from, to]);
        run_git(self.path(), &["commit", "-m", message]);
        self.head()
    }

    /// Write a file without staging it.
    pub fn write_file(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(full, content).expect("write file");
    }

    /// Current HEAD commit id in hex.
    pub fn head(&self) -> String {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(self.path())
            .output()
            .expect("git rev-parse failed");
        String::from_utf8(output.stdout)
            .expect("utf8")
            .trim()
            .to_string()
    }

    /// First-parent history of HEAD, oldest first, in hex.
    pub fn history(&self) -> Vec<String> {
        let output = Command::new("git")
            .args(["rev-list", "--first-parent", "--reverse", "HEAD"])
            .current_dir(self.path())
            .output()
            .expect("git rev-list failed");
        String::from_utf8(output.stdout)
            .expect("utf8")
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Run a git command in the given directory, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) {
    run_git_env(dir, args, &[]);
}

/// Run a git command with extra environment variables.
pub fn run_git_env(dir: &Path, args: &[&str], env: &[(&str, &str)]) {
    let mut command = Command::new("git");
    command.args(args).current_dir(dir);
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("git command failed to spawn");
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}
