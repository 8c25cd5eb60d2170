mod helpers;

use gitdrive::Repository;
use gitdrive::git::{ConflictSide, SyncOrchestrator};
use helpers::{clone_repo, create_commit, create_remote_pair, create_test_repo, git};
use std::fs;

#[tokio::test]
async fn test_sync_with_nothing_to_do() {
    let (_temp, _remote, clone) = create_remote_pair();
    let repo = Repository::new(&clone);
    let orchestrator = SyncOrchestrator::new(&repo);

    let result = orchestrator.sync(None).await.unwrap();

    assert!(result.success);
    assert!(result.pulled);
    assert!(result.pushed);
    assert!(result.conflicts.is_empty());
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_sync_pushes_local_commit() {
    let (_temp, remote, clone) = create_remote_pair();
    create_commit(&clone, "local.txt", "local work\n", "Local commit");
    let repo = Repository::new(&clone);
    let orchestrator = SyncOrchestrator::new(&repo);

    let result = orchestrator.sync(None).await.unwrap();

    assert!(result.success);
    assert!(result.pulled);
    assert!(result.pushed);
    let remote_tip = git(&remote, &["log", "-n", "1", "--format=%s"]);
    assert_eq!(remote_tip.trim(), "Local commit");
}

#[tokio::test]
async fn test_sync_pulls_remote_commit() {
    let (temp, remote, clone) = create_remote_pair();

    // A second clone pushes a change the first one doesn't have yet
    let other = temp.path().join("other");
    clone_repo(&remote, &other);
    create_commit(&other, "shared.txt", "from other\n", "Other's commit");
    git(&other, &["push"]);

    let repo = Repository::new(&clone);
    let result = SyncOrchestrator::new(&repo).sync(None).await.unwrap();

    assert!(result.success);
    assert!(clone.join("shared.txt").exists());
}

#[tokio::test]
async fn test_sync_preserves_uncommitted_work_across_pull() {
    let (temp, remote, clone) = create_remote_pair();

    let other = temp.path().join("other");
    clone_repo(&remote, &other);
    create_commit(&other, "incoming.txt", "incoming\n", "Incoming commit");
    git(&other, &["push"]);

    // Dirty, uncommitted local edit to an unrelated file
    fs::write(clone.join("notes.txt"), "scratch\n").unwrap();

    let repo = Repository::new(&clone);
    let result = SyncOrchestrator::new(&repo).sync(None).await.unwrap();

    assert!(result.success);
    assert!(clone.join("incoming.txt").exists());
    assert_eq!(fs::read_to_string(clone.join("notes.txt")).unwrap(), "scratch\n");
}

#[tokio::test]
async fn test_sync_detects_conflicts() {
    let (temp, remote, clone) = create_remote_pair();

    // Remote side changes the same line
    let other = temp.path().join("other");
    clone_repo(&remote, &other);
    create_commit(&other, "README.md", "their version\n", "Their change");
    git(&other, &["push"]);

    // Local side commits a competing change
    create_commit(&clone, "README.md", "our version\n", "Our change");

    let repo = Repository::new(&clone);
    let orchestrator = SyncOrchestrator::new(&repo);
    let result = orchestrator.sync(None).await.unwrap();

    assert!(!result.success);
    assert!(!result.pulled);
    assert!(!result.pushed);
    assert_eq!(result.conflicts, vec!["README.md".to_string()]);
    assert_eq!(result.error.as_deref(), Some("Merge conflicts detected"));

    // The conflicted state is left for the caller to resolve
    orchestrator
        .resolve_conflict("README.md", ConflictSide::Theirs)
        .await
        .unwrap();
    assert!(repo.conflicted_paths().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_reports_push_failure_after_clean_pull() {
    let (_temp, _remote, clone) = create_remote_pair();
    create_commit(&clone, "local.txt", "local\n", "Local commit");
    // Pull still works against the real remote; push goes nowhere
    git(&clone, &["remote", "set-url", "--push", "origin", "/nonexistent/push.git"]);

    let repo = Repository::new(&clone);
    let result = SyncOrchestrator::new(&repo).sync(None).await.unwrap();

    assert!(!result.success);
    assert!(result.pulled);
    assert!(!result.pushed);
    assert!(result.conflicts.is_empty());
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_checkout_branch_stashes_and_restores_dirty_tree() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "file.txt", "committed\n", "Initial commit");
    let repo = Repository::new(&repo_path);
    let orchestrator = SyncOrchestrator::new(&repo);

    fs::write(repo_path.join("file.txt"), "work in progress\n").unwrap();

    orchestrator.checkout_branch("feature", true).await.unwrap();

    assert_eq!(repo.current_branch().await.unwrap().as_deref(), Some("feature"));
    // The uncommitted modification survived the switch
    assert_eq!(
        fs::read_to_string(repo_path.join("file.txt")).unwrap(),
        "work in progress\n"
    );
    assert!(repo.stash_list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_branch_on_clean_tree() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "file.txt", "content\n", "Initial commit");
    let repo = Repository::new(&repo_path);

    SyncOrchestrator::new(&repo)
        .checkout_branch("feature", true)
        .await
        .unwrap();

    assert_eq!(repo.current_branch().await.unwrap().as_deref(), Some("feature"));
    assert!(repo.is_clean().await.unwrap());
}

#[tokio::test]
async fn test_checkout_existing_branch() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "file.txt", "content\n", "Initial commit");
    git(&repo_path, &["branch", "other"]);
    let repo = Repository::new(&repo_path);

    SyncOrchestrator::new(&repo)
        .checkout_branch("other", false)
        .await
        .unwrap();

    assert_eq!(repo.current_branch().await.unwrap().as_deref(), Some("other"));
}

#[tokio::test]
async fn test_checkout_ref_detaches_head() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "file.txt", "one\n", "First");
    let repo = Repository::new(&repo_path);
    let first = repo.head_commit().await.unwrap().unwrap();
    create_commit(&repo_path, "file.txt", "two\n", "Second");

    SyncOrchestrator::new(&repo).checkout_ref(&first).await.unwrap();

    assert!(repo.current_branch().await.unwrap().is_none());
    assert_eq!(repo.head_commit().await.unwrap().unwrap(), first);
}

#[tokio::test]
async fn test_merge_brings_in_branch_work() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "base.txt", "base\n", "Base");
    git(&repo_path, &["checkout", "-b", "feature"]);
    create_commit(&repo_path, "feature.txt", "feature\n", "Feature work");
    git(&repo_path, &["checkout", "main"]);
    let repo = Repository::new(&repo_path);

    SyncOrchestrator::new(&repo).merge("feature").await.unwrap();

    assert!(repo_path.join("feature.txt").exists());
}

#[tokio::test]
async fn test_failed_rebase_leaves_branch_and_head_unchanged() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "file.txt", "base\n", "Base");
    git(&repo_path, &["checkout", "-b", "feature"]);
    create_commit(&repo_path, "file.txt", "feature version\n", "Feature change");
    git(&repo_path, &["checkout", "main"]);
    create_commit(&repo_path, "file.txt", "main version\n", "Main change");
    git(&repo_path, &["checkout", "feature"]);

    let repo = Repository::new(&repo_path);
    let head_before = repo.head_commit().await.unwrap().unwrap();

    let result = SyncOrchestrator::new(&repo).rebase("main").await;
    assert!(result.is_err());

    // Abort ran: same branch, same HEAD, no rebase in progress
    assert_eq!(repo.current_branch().await.unwrap().as_deref(), Some("feature"));
    assert_eq!(repo.head_commit().await.unwrap().unwrap(), head_before);
    let state = repo.state().await.unwrap();
    assert!(!state.in_rebase);
    assert!(state.conflicted_files.is_empty());
}

#[tokio::test]
async fn test_successful_rebase_replays_commits() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "base.txt", "base\n", "Base");
    git(&repo_path, &["checkout", "-b", "feature"]);
    create_commit(&repo_path, "feature.txt", "feature\n", "Feature change");
    git(&repo_path, &["checkout", "main"]);
    create_commit(&repo_path, "main.txt", "main\n", "Main change");
    git(&repo_path, &["checkout", "feature"]);

    let repo = Repository::new(&repo_path);
    SyncOrchestrator::new(&repo).rebase("main").await.unwrap();

    assert!(repo_path.join("main.txt").exists());
    assert!(repo_path.join("feature.txt").exists());
    assert_eq!(repo.log(10).await.unwrap()[0].message, "Feature change");
}

#[tokio::test]
async fn test_stash_push_with_nothing_to_stash() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "file.txt", "content\n", "Initial commit");
    let repo = Repository::new(&repo_path);

    let stashed = SyncOrchestrator::new(&repo)
        .stash_push("nothing here")
        .await
        .unwrap();

    assert!(!stashed);
    assert!(repo.stash_list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stash_push_and_pop_roundtrip() {
    let (_temp, repo_path) = create_test_repo();
    create_commit(&repo_path, "file.txt", "committed\n", "Initial commit");
    let repo = Repository::new(&repo_path);
    let orchestrator = SyncOrchestrator::new(&repo);

    fs::write(repo_path.join("file.txt"), "dirty\n").unwrap();

    let stashed = orchestrator.stash_push("wip").await.unwrap();
    assert!(stashed);
    assert!(repo.is_clean().await.unwrap());
    assert_eq!(repo.stash_list().await.unwrap().len(), 1);

    repo.stash_pop().await.unwrap();
    assert_eq!(fs::read_to_string(repo_path.join("file.txt")).unwrap(), "dirty\n");
    assert!(repo.stash_list().await.unwrap().is_empty());
}
