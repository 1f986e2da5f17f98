//! Staging, renaming and committing through a sandbox

use std::fs;

use serde_json::json;
use stowage_repo::{FileState, PathArg, RepoErrorKind, RepoPath, Sandbox, Status};

const FILES: [&str; 3] = [
    include_str!("fixtures/file1"),
    include_str!("fixtures/file2"),
    include_str!("fixtures/file3"),
];
const FILELIST: [&str; 3] = ["file1", "file2", "file3"];
const MSG: &str = "added some files";
const USER: &str = "Tester <test@example.com>";

fn sandbox() -> (tempfile::TempDir, Sandbox) {
    let dir = tempfile::tempdir().unwrap();
    Sandbox::create(dir.path(), false).unwrap();
    let sandbox = Sandbox::open(dir.path()).unwrap();
    (dir, sandbox)
}

fn paths(list: &[RepoPath]) -> Vec<&str> {
    list.iter().map(RepoPath::as_str).collect()
}

fn added(status: &Status) -> Vec<&str> {
    paths(&status.added)
}

fn removed(status: &Status) -> Vec<&str> {
    paths(&status.removed)
}

#[test]
fn test_open_bare_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    git2::Repository::init_bare(dir.path()).unwrap();
    let err = Sandbox::open(dir.path()).unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::InvalidArgument);
}

#[test]
fn test_add_file_content_fail() {
    let (_dir, sb) = sandbox();
    for path in ["/tmp/nothere", "../invalidpath", "/a/b/../../../invalidpath", ".git/config", ""] {
        let err = sb.add_file_content(path, "").unwrap_err();
        assert!(err.kind().is_path_invalid(), "{}: {}", path, err);
    }
}

#[test]
fn test_add_file_content_success() {
    let (dir, sb) = sandbox();
    let add = |name: &str, content: &str| {
        sb.add_file_content(name, dir.path().to_string_lossy().as_bytes())
            .unwrap();
        sb.add_file_content(name, content).unwrap();
        let on_disk = fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(on_disk, content, "file content mismatch");
    };

    add("file1", "1");
    add("d/file1", "");
    add("a/b/c/d/e/file1", "this is totally nested");

    // trailing separator is dropped
    sb.add_file_content("dir/", "dirpath").unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("dir")).unwrap(), "dirpath");

    let status = sb.status().unwrap();
    assert_eq!(
        added(&status),
        vec!["a/b/c/d/e/file1", "d/file1", "dir", "file1"]
    );
}

#[test]
fn test_add_file_content_kind_conflicts() {
    let (_dir, sb) = sandbox();
    sb.add_file_content("d/file1", "x").unwrap();

    let err = sb.add_file_content("d", "x").unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::PathExists);

    let err = sb.add_file_content("d/file1/child", "x").unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::PathNotDir);
}

#[test]
fn test_commit_fail() {
    let (_dir, sb) = sandbox();
    for (message, author) in [("", ""), ("m", ""), ("", "m"), ("  ", USER)] {
        let err = sb.commit(message, author).unwrap_err();
        assert_eq!(*err.kind(), RepoErrorKind::InvalidArgument);
    }

    let err = sb.commit(MSG, USER).unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::NothingToCommit);

    sb.add_file_content("file1", FILES[0]).unwrap();
    sb.commit(MSG, USER).unwrap();
    let err = sb.commit(MSG, USER).unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::NothingToCommit);
}

#[test]
fn test_file_modification() {
    let (_dir, sb) = sandbox();
    sb.add_file_content("file1", FILES[0]).unwrap();
    sb.add_file_content("file2", FILES[1]).unwrap();

    let status = sb.status().unwrap();
    assert_eq!(added(&status), vec!["file1", "file2"]);

    let id = sb.commit(MSG, USER).unwrap();
    assert_eq!(sb.resolve(None).unwrap().id, id);

    let status = sb.status().unwrap();
    assert_eq!(paths(&status.clean), vec!["file1", "file2"]);
    assert!(status.is_clean());
}

#[test]
fn test_status_partitions() {
    let (dir, sb) = sandbox();
    sb.add_file_content("file1", FILES[0]).unwrap();
    sb.add_file_content("file2", FILES[1]).unwrap();
    sb.add_file_content("gone", FILES[1]).unwrap();
    sb.commit(MSG, USER).unwrap();

    sb.add_file_content("file2", FILES[2]).unwrap();
    sb.add_file_content("file3", FILES[2]).unwrap();
    fs::remove_file(dir.path().join("gone")).unwrap();
    fs::write(dir.path().join("loose"), "untracked").unwrap();
    fs::write(dir.path().join(".gitignore"), "*.tmp\n").unwrap();
    fs::write(dir.path().join("scratch.tmp"), "ignored").unwrap();

    let status = sb.status().unwrap();
    assert_eq!(paths(&status.modified), vec!["file2"]);
    assert_eq!(added(&status), vec!["file3"]);
    assert_eq!(paths(&status.deleted), vec!["gone"]);
    assert_eq!(paths(&status.unknown), vec![".gitignore", "loose"]);
    assert_eq!(paths(&status.ignored), vec!["scratch.tmp"]);
    assert_eq!(paths(&status.clean), vec!["file1"]);
    assert!(status.removed.is_empty());
    assert!(!status.is_clean());

    let states: Vec<_> = status
        .entries()
        .filter(|(p, _)| p.as_str() == "file2" || p.as_str() == "gone")
        .map(|(_, s)| s)
        .collect();
    assert_eq!(states, vec![FileState::Modified, FileState::Deleted]);
}

#[test]
fn test_status_nodes() {
    let (_dir, sb) = sandbox();
    sb.add_file_content("file1", FILES[0]).unwrap();
    sb.add_file_content("file2", FILES[1]).unwrap();
    sb.commit(MSG, USER).unwrap();
    sb.add_file_content("file2", FILES[2]).unwrap();
    sb.add_file_content("file3", FILES[2]).unwrap();

    let status = sb.status().unwrap();
    let nodes: Vec<_> = status.nodes().collect();
    assert_eq!(nodes.len(), 1);
    let fentries: Vec<_> = nodes[0].fentries().collect();
    assert_eq!(fentries.len(), 3, "number of file entries != 3");
    assert_eq!(fentries[1].size, FILES[2].len() as u64);
    assert_eq!(nodes[0].rev(), 0);
}

#[test]
fn test_mkdir() {
    let (dir, sb) = sandbox();
    for bad in ["../1", "/tmp/fail"] {
        let err = sb.mkdir(bad).unwrap_err();
        assert_eq!(*err.kind(), RepoErrorKind::PathInvalid);
    }
    assert!(sb.mkdir("1").unwrap());
    assert!(sb.mkdir("1/2").unwrap());
    assert!(sb.mkdir("3/2/1").unwrap());
    assert!(sb.mkdir("3/2/1").unwrap());
    assert!(sb.mkdir("").unwrap());
    assert!(dir.path().join("3/2/1").is_dir());

    sb.add_file_content("file1", FILES[0]).unwrap();
    let err = sb.mkdir("file1").unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::PathExists);
    let err = sb.mkdir("file1/sub").unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::PathNotDir);
}

#[test]
fn test_rename_file_failure() {
    let (_dir, sb) = sandbox();

    // wrong shapes are caught when converting loose request data
    for bad in [json!(null), json!([true])] {
        let err = PathArg::from_value(&bad).unwrap_err();
        assert_eq!(*err.kind(), RepoErrorKind::TypeMismatch);
    }
    let err = PathArg::destination_from_value(&json!(["../move1"])).unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::TypeMismatch);

    let expect_invalid = |sources: PathArg, dest: &str| {
        let err = sb.rename(sources.clone(), dest).unwrap_err();
        assert!(err.kind().is_path_invalid(), "{:?} -> {}: {}", sources, dest, err);
    };

    // destination out of the tree
    expect_invalid("../file1".into(), "../move1");
    // source does not exist
    expect_invalid("../file1".into(), "move1");
    expect_invalid(vec!["../file1", "file"].into(), "move1");

    // never overwrite a file
    sb.add_file_content("file1", FILES[0]).unwrap();
    sb.add_file_content("move1", FILES[0]).unwrap();
    expect_invalid(["file1"].into(), "move1");
    let err = sb.rename("file1", "move1").unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::PathExists);
    sb.add_file_content("file2", FILES[0]).unwrap();
    expect_invalid(["file1", "file2"].into(), "move1");
    expect_invalid(["file1", "file2"].into(), "move1/move2");

    // no valid source
    expect_invalid(["/file1", "/file2"].into(), "move2");

    // nothing moved
    let status = sb.status().unwrap();
    assert_eq!(added(&status), vec!["file1", "file2", "move1"]);
}

#[test]
fn test_rename_file_success() {
    let (_dir, sb) = sandbox();
    sb.add_file_content("file1", FILES[0]).unwrap();

    let (errs, copied) = sb.rename("file1", "move1").unwrap().into_parts();
    assert_eq!(errs, 0);
    assert_eq!(copied[0].basename, "file1");
    assert_eq!(added(&sb.status().unwrap()), vec!["move1"]);
    sb.commit(MSG, USER).unwrap();

    sb.rename("move1", "move2").unwrap();
    let status = sb.status().unwrap();
    assert_eq!(removed(&status), vec!["move1"]);
    assert_eq!(added(&status), vec!["move2"]);

    sb.rename("move2", "dir/move3").unwrap();
    assert_eq!(added(&sb.status().unwrap()), vec!["dir/move3"]);

    for (name, content) in FILELIST.iter().zip(FILES) {
        sb.add_file_content(name, content).unwrap();
    }
    sb.commit(MSG, USER).unwrap();

    let nd = "some/nested/dir";
    let outcome = sb.rename(FILELIST, nd).unwrap();
    assert_eq!(outcome.error_count(), 0);
    let status = sb.status().unwrap();
    assert_eq!(
        added(&status),
        FILELIST.iter().map(|f| format!("{}/{}", nd, f)).collect::<Vec<_>>()
    );
    assert_eq!(removed(&status), FILELIST);
}

#[test]
fn test_rename_file_other() {
    let (_dir, sb) = sandbox();
    for name in FILELIST {
        sb.add_file_content(name, FILES[0]).unwrap();
    }
    sb.commit(MSG, USER).unwrap();

    let outcome = sb.rename(FILELIST, "move1").unwrap();
    assert_eq!(outcome.error_count(), 0);

    let outcome = sb
        .rename(["move1/file1", "move1/file2", "move2/file3"], "")
        .unwrap();
    assert_eq!(outcome.error_count(), 1);
    assert_eq!(outcome.failures[0].source, "move2/file3");
    let targets: Vec<_> = outcome.copied.iter().map(|c| c.target.as_str()).collect();
    assert_eq!(targets, vec!["file1", "file2"]);
}

#[test]
fn test_rename_batch_skips_existing_target() {
    let (dir, sb) = sandbox();
    for name in ["a", "b", "c", "d/c"] {
        sb.add_file_content(name, name).unwrap();
    }
    sb.commit(MSG, USER).unwrap();

    let outcome = sb.rename(["a", "b", "c"], "d").unwrap();
    assert_eq!(outcome.error_count(), 1);
    assert_eq!(outcome.failures[0].source, "c");
    assert_eq!(*outcome.failures[0].error.kind(), RepoErrorKind::PathExists);
    let targets: Vec<_> = outcome.copied.iter().map(|c| c.target.as_str()).collect();
    assert_eq!(targets, vec!["d/a", "d/b"]);

    // the unrelated file keeps its content and the failed source stays put
    assert_eq!(fs::read_to_string(dir.path().join("d/c")).unwrap(), "d/c");
    assert!(dir.path().join("c").is_file());

    let err = sb.rename("d/a", "d/c").unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::PathExists);
}

#[test]
fn test_rename_into_existing_directory() {
    let (dir, sb) = sandbox();
    sb.add_file_content("file1", FILES[0]).unwrap();
    sb.mkdir("target").unwrap();

    let outcome = sb.rename("file1", "target").unwrap();
    assert_eq!(outcome.copied[0].target.as_str(), "target/file1");
    assert!(dir.path().join("target/file1").is_file());
    assert!(!dir.path().join("file1").exists());
}

#[test]
fn test_rename_batch_conflict_leaves_first_in_place() {
    let (_dir, sb) = sandbox();
    sb.add_file_content("a/same", "first").unwrap();
    sb.add_file_content("b/same", "second").unwrap();

    let outcome = sb.rename(["a/same", "b/same"], "dest").unwrap();
    assert_eq!(outcome.error_count(), 1);
    assert_eq!(*outcome.failures[0].error.kind(), RepoErrorKind::PathExists);
    assert_eq!(outcome.copied.len(), 1);

    let status = sb.status().unwrap();
    assert_eq!(added(&status), vec!["b/same", "dest/same"]);
    assert!(sb.files(None).unwrap().is_empty());
}

#[test]
fn test_rename_directory() {
    let (dir, sb) = sandbox();
    sb.add_file_content("src/a", "1").unwrap();
    sb.add_file_content("src/sub/b", "2").unwrap();
    sb.commit(MSG, USER).unwrap();

    sb.rename("src", "dst").unwrap();
    let status = sb.status().unwrap();
    assert_eq!(added(&status), vec!["dst/a", "dst/sub/b"]);
    assert_eq!(removed(&status), vec!["src/a", "src/sub/b"]);
    assert!(!dir.path().join("src").exists());

    let err = sb.rename("dst", "dst/inner").unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::PathInvalid);
}

#[test]
fn test_remove_and_commit() {
    let (dir, sb) = sandbox();
    for name in FILELIST {
        sb.add_file_content(name, FILES[1]).unwrap();
    }
    sb.commit(MSG, USER).unwrap();

    assert_eq!(sb.remove("file2").unwrap(), 1);
    assert!(!dir.path().join("file2").exists());
    assert_eq!(removed(&sb.status().unwrap()), vec!["file2"]);

    let err = sb.remove("file2").unwrap_err();
    assert_eq!(*err.kind(), RepoErrorKind::PathInvalid);

    sb.commit("drop file2", USER).unwrap();
    let files = sb.files(None).unwrap();
    let listed: Vec<_> = files.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(listed, vec!["file1", "file3"]);
}
