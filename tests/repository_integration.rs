//! Integration tests for the revision store and the tree view, driven
//! against real git repositories.

mod common;

use common::TestRepo;

use svnbridge::core::types::NodeKind;
use svnbridge::repo::{ChangeKind, SvnError, SvnErrorCode};

// =============================================================================
// Revision mapping
// =============================================================================

#[test]
fn empty_repository_bootstraps_revision_zero() {
    let repo = TestRepo::new();
    let bridge = repo.open();

    let latest = bridge.latest();
    assert_eq!(latest.id(), 0);
    assert_eq!(latest.git_commit(), None);
    assert_eq!(latest.author(), None);

    let root = latest.root(&bridge).expect("root");
    assert!(root.entries().expect("entries").is_empty());
    assert_eq!(bridge.uuid().len(), 36);
}

#[test]
fn commits_map_to_dense_revisions() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "first");
    repo.commit_file("b.txt", "two", "second");
    repo.commit_file("a.txt", "three", "third");

    let bridge = repo.open();
    let history = repo.history();

    assert_eq!(bridge.latest().id(), 3);
    for (index, hex) in history.iter().enumerate() {
        let revision = bridge.revision_by_id(index as i64 + 1).expect("revision");
        assert_eq!(revision.git_commit().map(|o| o.to_string()).as_deref(), Some(hex.as_str()));
        let by_hash = bridge
            .revision_by_git_commit(git2::Oid::from_str(hex).expect("oid"))
            .expect("by hash");
        assert_eq!(by_hash.id(), index as i64 + 1);
    }
}

#[test]
fn revision_out_of_range_is_rejected() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "first");
    let bridge = repo.open();

    let err = bridge.revision_by_id(99).expect_err("out of range");
    assert_eq!(err.code(), SvnErrorCode::FsNoSuchRevision);
    let err = bridge.revision_by_id(-1).expect_err("negative");
    assert_eq!(err.code(), SvnErrorCode::FsNoSuchRevision);

    let unknown = git2::Oid::from_str("0123456789012345678901234567890123456789").expect("oid");
    let err = bridge.revision_by_git_commit(unknown).expect_err("unmapped");
    assert!(matches!(err, SvnError::NoSuchRevision(_)));
}

#[test]
fn update_picks_up_new_commits() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "first");
    let bridge = repo.open();
    assert_eq!(bridge.latest().id(), 1);

    repo.commit_file("b.txt", "two", "second");
    bridge.update_revisions().expect("update");
    assert_eq!(bridge.latest().id(), 2);

    // A second update without new commits is a no-op.
    bridge.update_revisions().expect("update");
    assert_eq!(bridge.latest().id(), 2);
}

#[test]
fn cache_persists_across_reopen() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "first");
    repo.commit_file("b.txt", "two", "second");

    let first = repo.open();
    let uuid = first.uuid().to_string();
    let latest = first.latest().id();
    drop(first);

    let second = repo.open();
    assert_eq!(second.latest().id(), latest);
    assert_eq!(second.uuid(), uuid);
    let history = repo.history();
    assert_eq!(
        second
            .revision_by_id(1)
            .expect("r1")
            .git_commit()
            .map(|o| o.to_string())
            .as_deref(),
        Some(history[0].as_str())
    );
}

#[test]
fn revision_metadata_comes_from_the_git_commit() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "first message");
    let bridge = repo.open();

    let revision = bridge.revision_by_id(1).expect("r1");
    assert_eq!(revision.author(), Some("Test User"));
    assert_eq!(revision.log(), Some("first message"));

    let props = revision.properties(true);
    assert_eq!(props.get("svn:author").map(String::as_str), Some("Test User"));
    assert_eq!(props.get("svn:log").map(String::as_str), Some("first message"));
    assert!(props.contains_key("svn:date"));
    assert!(props.contains_key("git:commit"));
}

// =============================================================================
// Date index
// =============================================================================

#[test]
fn revision_by_date_finds_the_floor() {
    let repo = TestRepo::new();
    repo.commit_file_at("a.txt", "one", "first", 1_000_000);
    repo.commit_file_at("b.txt", "two", "second", 2_000_000);
    let bridge = repo.open();

    assert_eq!(bridge.revision_by_date(0).id(), 0);
    assert_eq!(bridge.revision_by_date(1_000_000_000).id(), 1);
    assert_eq!(bridge.revision_by_date(1_500_000_000).id(), 1);
    assert_eq!(bridge.revision_by_date(2_000_000_000).id(), 2);
    assert_eq!(bridge.revision_by_date(i64::MAX).id(), 2);
}

#[test]
fn out_of_order_commit_times_stay_out_of_the_date_index() {
    let repo = TestRepo::new();
    repo.commit_file_at("a.txt", "one", "first", 1_000_000);
    repo.commit_file_at("b.txt", "two", "second", 2_000_000);
    repo.commit_file_at("c.txt", "three", "third", 1_500_000);
    let bridge = repo.open();

    // The out-of-order revision exists in the sequence...
    assert_eq!(bridge.latest().id(), 3);
    assert_eq!(bridge.revision_by_id(3).expect("r3").date_ms(), 1_500_000_000);
    // ...but byDate never answers a later revision than asked for.
    assert_eq!(bridge.revision_by_date(1_500_000_000).id(), 1);
    assert_eq!(bridge.revision_by_date(2_000_000_000).id(), 2);
}

// =============================================================================
// Last-change index
// =============================================================================

#[test]
fn last_change_tracks_modifications_and_deletions() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "create");
    repo.commit_file("a.txt", "two", "modify");
    let bridge = repo.open();

    assert_eq!(bridge.last_change("/a.txt", 1), Some(1));
    assert_eq!(bridge.last_change("/a.txt", 2), Some(2));
    assert_eq!(bridge.last_change("/missing.txt", 2), None);
    assert_eq!(bridge.last_change("", 2), Some(2));

    repo.commit_rm("a.txt", "delete");
    bridge.update_revisions().expect("update");
    assert_eq!(bridge.last_change("/a.txt", 2), Some(2));
    assert_eq!(bridge.last_change("/a.txt", 3), None);
}

#[test]
fn directories_have_change_history() {
    let repo = TestRepo::new();
    repo.commit_file("d/a.txt", "one", "create dir");
    let bridge = repo.open();

    assert_eq!(bridge.last_change("/d", 1), Some(1));
    assert_eq!(bridge.last_change("/d/a.txt", 1), Some(1));
}

// =============================================================================
// Tree view
// =============================================================================

#[test]
fn file_node_content_size_and_md5() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "hello world", "create");
    let bridge = repo.open();

    let latest = bridge.latest();
    let file = latest
        .file(&bridge, "/a.txt")
        .expect("lookup")
        .expect("present");
    assert_eq!(file.kind(), NodeKind::File);
    assert_eq!(file.full_path(), "/a.txt");
    assert_eq!(file.file_name(), "a.txt");
    assert_eq!(file.content().expect("content"), b"hello world");
    assert_eq!(file.size().expect("size"), 11);
    assert_eq!(file.md5().expect("md5"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    // Memoized second read returns the same digest.
    assert_eq!(file.md5().expect("md5"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
}

#[test]
fn missing_paths_resolve_to_none() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "create");
    let bridge = repo.open();

    let latest = bridge.latest();
    assert!(latest.file(&bridge, "/missing.txt").expect("lookup").is_none());
    assert!(latest.file(&bridge, "/a.txt/below").expect("lookup").is_none());
}

#[cfg(unix)]
#[test]
fn symlink_node_carries_the_wire_prefix() {
    let repo = TestRepo::new();
    repo.commit_file("target.txt", "content", "create target");
    std::os::unix::fs::symlink("target.txt", repo.path().join("link")).expect("symlink");
    common::run_git(repo.path(), &["add", "link"]);
    common::run_git(repo.path(), &["commit", "-m", "add link"]);

    let bridge = repo.open();
    let latest = bridge.latest();
    let link = latest.file(&bridge, "/link").expect("lookup").expect("present");
    assert_eq!(link.kind(), NodeKind::Symlink);
    assert_eq!(link.content().expect("content"), b"link target.txt");
    assert_eq!(link.size().expect("size"), 15);
    let props = link.properties(false).expect("props");
    assert_eq!(props.get("svn:special").map(String::as_str), Some("*"));
}

#[cfg(unix)]
#[test]
fn executable_node_gets_the_executable_property() {
    use std::os::unix::fs::PermissionsExt;

    let repo = TestRepo::new();
    repo.write_file("run.sh", "#!/bin/sh\n");
    std::fs::set_permissions(
        repo.path().join("run.sh"),
        std::fs::Permissions::from_mode(0o755),
    )
    .expect("chmod");
    common::run_git(repo.path(), &["add", "run.sh"]);
    common::run_git(repo.path(), &["commit", "-m", "add script"]);

    let bridge = repo.open();
    let latest = bridge.latest();
    let script = latest
        .file(&bridge, "/run.sh")
        .expect("lookup")
        .expect("present");
    let props = script.properties(false).expect("props");
    assert_eq!(props.get("svn:executable").map(String::as_str), Some("*"));
}

#[test]
fn gitignore_derives_inherited_svn_ignore() {
    let repo = TestRepo::new();
    repo.commit_file("logs/.gitignore", "*.log\n", "ignore logs");
    repo.commit_file("logs/sub/keep.txt", "keep", "subdir");
    let bridge = repo.open();

    let latest = bridge.latest();
    let logs = latest.file(&bridge, "/logs").expect("lookup").expect("present");
    let props = logs.properties(false).expect("props");
    assert_eq!(props.get("svn:ignore").map(String::as_str), Some("*.log\n"));

    // Unanchored patterns are inherited by subdirectories.
    let sub = latest
        .file(&bridge, "/logs/sub")
        .expect("lookup")
        .expect("present");
    let props = sub.properties(false).expect("props");
    assert_eq!(props.get("svn:ignore").map(String::as_str), Some("*.log\n"));
}

#[test]
fn internal_entry_properties_track_the_last_change() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "create");
    repo.commit_file("b.txt", "two", "other change");
    let bridge = repo.open();

    let latest = bridge.latest();
    let file = latest
        .file(&bridge, "/a.txt")
        .expect("lookup")
        .expect("present");
    let props = file.properties(true).expect("props");
    assert_eq!(
        props.get("svn:entry:uuid").map(String::as_str),
        Some(bridge.uuid())
    );
    // a.txt last changed in r1, even though latest is r2.
    assert_eq!(props.get("svn:entry:committed-rev").map(String::as_str), Some("1"));
    assert_eq!(
        props.get("svn:entry:last-author").map(String::as_str),
        Some("Test User")
    );
    assert!(props.contains_key("svn:entry:committed-date"));
}

// =============================================================================
// Change lists and renames
// =============================================================================

#[test]
fn change_lists_classify_edits() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "create");
    repo.commit_file("a.txt", "two", "modify");
    let bridge = repo.open();

    let r1 = bridge.revision_by_id(1).expect("r1");
    let changes = r1.changes(&bridge).expect("changes");
    assert_eq!(changes["/a.txt"].pair.kind(), ChangeKind::Add);

    let r2 = bridge.revision_by_id(2).expect("r2");
    let changes = r2.changes(&bridge).expect("changes");
    assert_eq!(changes["/a.txt"].pair.kind(), ChangeKind::Modify);

    repo.commit_rm("a.txt", "delete");
    bridge.update_revisions().expect("update");
    let r3 = bridge.revision_by_id(3).expect("r3");
    let changes = r3.changes(&bridge).expect("changes");
    assert_eq!(changes["/a.txt"].pair.kind(), ChangeKind::Delete);
}

#[test]
fn renames_answer_copy_from() {
    let repo = TestRepo::new();
    repo.commit_file(
        "old.txt",
        "a reasonably long body so similarity scoring has something to chew on\n",
        "create",
    );
    repo.commit_mv("old.txt", "new.txt", "rename");
    let bridge = repo.open();

    let r2 = bridge.revision_by_id(2).expect("r2");
    let copy = r2.copy_from("/new.txt").expect("copyfrom");
    assert_eq!(copy.revision, 1);
    assert_eq!(copy.path, "/old.txt");

    let changes = r2.changes(&bridge).expect("changes");
    let entry = &changes["/new.txt"];
    assert_eq!(entry.pair.kind(), ChangeKind::Add);
    assert_eq!(entry.copy_from.as_ref().expect("copyfrom").path, "/old.txt");
}

// =============================================================================
// Submodules
// =============================================================================

#[test]
fn submodules_read_through_linked_repositories() {
    let main = TestRepo::new();
    main.commit_file("a.txt", "one", "base");

    let sub = TestRepo::new();
    let sub_head = sub.commit_file("inner.txt", "inner content", "sub commit");

    // Record the submodule commit as a gitlink entry.
    let cacheinfo = format!("160000,{},vendor", sub_head);
    common::run_git(
        main.path(),
        &["update-index", "--add", "--cacheinfo", &cacheinfo],
    );
    common::run_git(main.path(), &["commit", "-m", "add submodule"]);

    // Without a linked repository the submodule reads as an empty
    // directory.
    let unlinked = main.open();
    let latest = unlinked.latest();
    let vendor = latest
        .file(&unlinked, "/vendor")
        .expect("lookup")
        .expect("present");
    assert_eq!(vendor.kind(), NodeKind::Dir);
    assert!(vendor.entries().expect("entries").is_empty());
    drop(unlinked);

    // With the owning repository linked, its tree shows through.
    let linked = svnbridge::repo::GitRepository::open(
        main.path(),
        svnbridge::repo::RepositoryOptions {
            linked: vec![sub.path().to_path_buf()],
            ..Default::default()
        },
    )
    .expect("open linked");
    let latest = linked.latest();
    let vendor = latest
        .file(&linked, "/vendor")
        .expect("lookup")
        .expect("present");
    assert_eq!(vendor.kind(), NodeKind::Dir);
    let inner = latest
        .file(&linked, "/vendor/inner.txt")
        .expect("lookup")
        .expect("present");
    assert_eq!(inner.content().expect("content"), b"inner content");
}

#[test]
fn revision_zero_has_no_changes() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "one", "create");
    let bridge = repo.open();

    let r0 = bridge.revision_by_id(0).expect("r0");
    assert!(r0.changes(&bridge).expect("changes").is_empty());
}
