#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run a git command in `repo`, panicking on failure
pub fn git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {args:?}: {e}"));
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn configure_user(repo: &Path) {
    git(repo, &["config", "user.name", "Test User"]);
    git(repo, &["config", "user.email", "test@example.com"]);
}

/// Helper to create a test git repository
pub fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    git(&repo_path, &["init", "-b", "main"]);
    configure_user(&repo_path);

    (temp_dir, repo_path)
}

/// Helper to create a commit
pub fn create_commit(repo_path: &Path, file: &str, content: &str, message: &str) {
    let file_path = repo_path.join(file);
    fs::write(&file_path, content).expect("Failed to write file");

    git(repo_path, &["add", file]);
    git(repo_path, &["commit", "-m", message]);
}

/// Clone `remote` to `dest` and configure a test user there
pub fn clone_repo(remote: &Path, dest: &Path) {
    let parent = dest.parent().expect("clone dest needs a parent");
    git(
        parent,
        &[
            "clone",
            remote.to_str().unwrap(),
            dest.to_str().unwrap(),
        ],
    );
    configure_user(dest);
}

/// Create a bare "remote" seeded with one commit, plus a working clone of it
///
/// Returns (tempdir, bare remote path, clone path). The clone tracks the
/// remote's main branch, so pull/push work without further setup.
pub fn create_remote_pair() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_path_buf();

    let seed = base.join("seed");
    fs::create_dir(&seed).unwrap();
    git(&seed, &["init", "-b", "main"]);
    configure_user(&seed);
    create_commit(&seed, "README.md", "seed\n", "Initial commit");

    let remote = base.join("remote.git");
    git(
        &base,
        &[
            "clone",
            "--bare",
            seed.to_str().unwrap(),
            remote.to_str().unwrap(),
        ],
    );

    let clone = base.join("clone");
    clone_repo(&remote, &clone);

    (temp_dir, remote, clone)
}
