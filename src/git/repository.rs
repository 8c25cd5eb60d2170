use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audit::logger::AuditLogger;
use crate::config::settings::{Config, ConfigError};
use crate::error::{EngineResult, GitError, GitResult};
use crate::events::ActivityObserver;
use crate::git::executor::{CommandOutput, ExecOptions, GitExecutor};
use crate::git::identity::IdentityOverride;
use crate::git::parser::{
    self, BlameInfo, BranchInfo, CommitInfo, FileState, FileStatus, ReflogEntry, StashEntry,
};
use crate::git::version::GitVersion;

/// Record separator for sentinel-delimited log/reflog formats.
/// Unusual enough that it cannot collide with a commit subject field.
pub(crate) const RECORD_SENTINEL: &str = "<<gitdrive>>";

fn log_format() -> String {
    format!("--format=%H%n%h%n%s%n%an%n%ae%n%aI%n%D%n{RECORD_SENTINEL}")
}

fn reflog_format() -> String {
    format!("--format=%H%n%h%n%gs%n%aI%n{RECORD_SENTINEL}")
}

/// How `reset` moves HEAD relative to the index and working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Soft,
    Mixed,
    Hard,
}

impl ResetMode {
    fn flag(self) -> &'static str {
        match self {
            ResetMode::Soft => "--soft",
            ResetMode::Mixed => "--mixed",
            ResetMode::Hard => "--hard",
        }
    }
}

/// Represents a git repository and provides the high-level operation surface
#[derive(Debug)]
pub struct Repository {
    path: PathBuf,
    executor: GitExecutor,
}

impl Repository {
    /// Detect git repository from current working directory
    pub fn discover() -> GitResult<Self> {
        let current_dir = env::current_dir().map_err(GitError::IoError)?;
        Self::discover_from(&current_dir)
    }

    /// Detect git repository starting from a specific directory
    pub fn discover_from<P: AsRef<Path>>(start_path: P) -> GitResult<Self> {
        let mut current = start_path.as_ref().to_path_buf();

        loop {
            if current.join(".git").exists() {
                return Ok(Self::new(current));
            }

            if !current.pop() {
                return Err(GitError::NotARepository);
            }
        }
    }

    /// Create a Repository for a known git directory
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let executor = GitExecutor::new(&path);

        Self { path, executor }
    }

    /// Create a Repository with executor bounds taken from configuration
    pub fn with_config<P: AsRef<Path>>(path: P, config: &Config) -> Self {
        let path = path.as_ref().to_path_buf();
        let executor = GitExecutor::with_config(&path, config);

        Self { path, executor }
    }

    /// Discover the repository around the working directory, applying the
    /// saved engine configuration (falling back to defaults when none exists)
    /// and attaching the audit log when command logging is enabled
    ///
    /// The configured git binary is gated before any command is issued: an
    /// installation too old for the features the engine drives fails here,
    /// not midway through an operation with an unrecognized-flag error.
    pub fn discover_configured() -> EngineResult<Self> {
        let config = match Config::load() {
            Ok(config) => config,
            Err(ConfigError::ReadError(_)) => Config::default_config(),
            Err(e) => return Err(e.into()),
        };

        GitVersion::ensure_supported(&config.git.binary)?;

        let discovered = Self::discover()?;
        let mut repo = Self::with_config(discovered.path, &config);

        if config.behavior.log_commands {
            let logger = match &config.behavior.audit_log_path {
                Some(path) => AuditLogger::with_path(path)?,
                None => AuditLogger::new()?,
            };
            repo.add_observer(Arc::new(logger));
        }

        Ok(repo)
    }

    /// Share an externally owned identity override handle
    pub fn with_identity(mut self, identity: IdentityOverride) -> Self {
        self.executor = self.executor.with_identity(identity);
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ActivityObserver>) {
        self.executor.add_observer(observer);
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the git executor for this repository
    pub fn executor(&self) -> &GitExecutor {
        &self.executor
    }

    /// Initialize a fresh repository, optionally wiring up an origin remote
    pub async fn init<P: AsRef<Path>>(path: P, remote_url: Option<&str>) -> GitResult<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;

        let repo = Self::new(path);
        repo.executor
            .execute(["init"])
            .await?
            .require_success("init")?;

        if let Some(url) = remote_url {
            repo.executor
                .execute(["remote", "add", "origin", url])
                .await?
                .require_success("remote")?;
        }

        Ok(repo)
    }

    /// Clone a repository, streaming progress lines to `on_progress`
    ///
    /// Clone is the one operation with materially larger bounds: a ten-minute
    /// timeout and a larger output buffer.
    pub async fn clone<F>(
        url: &str,
        dest: &Path,
        credential: Option<&str>,
        on_progress: F,
    ) -> GitResult<Self>
    where
        F: FnMut(&str) + Send,
    {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let executor = GitExecutor::new(&parent);
        let opts = executor.clone_options(credential);
        executor
            .execute_streaming(
                [
                    OsStr::new("clone"),
                    OsStr::new("--progress"),
                    OsStr::new(url),
                    dest.as_os_str(),
                ],
                opts,
                on_progress,
            )
            .await?
            .require_success("clone")?;

        Ok(Self::new(dest))
    }

    /// Get status entries for every changed, untracked or conflicted path
    pub async fn status(&self) -> GitResult<Vec<FileStatus>> {
        let output = self
            .executor
            .execute(["status", "--porcelain=v2", "-z"])
            .await?
            .require_success("status")?;
        Ok(parser::parse_status(&output.stdout))
    }

    /// True when the working tree has no changes at all
    pub async fn is_clean(&self) -> GitResult<bool> {
        Ok(self.status().await?.is_empty())
    }

    /// Paths currently in unresolved merge state
    pub async fn conflicted_paths(&self) -> GitResult<Vec<String>> {
        Ok(self
            .status()
            .await?
            .into_iter()
            .filter(|entry| entry.status == FileState::Conflict)
            .map(|entry| entry.path)
            .collect())
    }

    /// Get the current branch name, or None in detached HEAD state
    pub async fn current_branch(&self) -> GitResult<Option<String>> {
        match self.executor.execute(["branch", "--show-current"]).await {
            Ok(output) if output.success => {
                let branch = output.stdout.trim();
                if branch.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(branch.to_string()))
                }
            }
            Ok(_) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Full hash of HEAD, or None before the first commit
    pub async fn head_commit(&self) -> GitResult<Option<String>> {
        let output = self.executor.execute(["rev-parse", "HEAD"]).await?;
        if output.success {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Stage the given paths
    pub async fn stage(&self, paths: &[&str]) -> GitResult<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.executor.execute(args).await?.require_success("add")?;
        Ok(())
    }

    /// Stage everything, including untracked files
    pub async fn stage_all(&self) -> GitResult<()> {
        self.executor
            .execute(["add", "-A"])
            .await?
            .require_success("add")?;
        Ok(())
    }

    /// Remove the given paths from the index, leaving the working tree alone
    pub async fn unstage(&self, paths: &[&str]) -> GitResult<()> {
        let mut args = vec!["reset", "HEAD", "--"];
        args.extend_from_slice(paths);
        self.executor.execute(args).await?.require_success("reset")?;
        Ok(())
    }

    /// Commit staged changes; returns the new HEAD hash
    pub async fn commit(&self, message: &str) -> GitResult<String> {
        self.executor
            .execute(["commit", "-m", message])
            .await?
            .require_success("commit")?;
        let output = self
            .executor
            .execute(["rev-parse", "HEAD"])
            .await?
            .require_success("rev-parse")?;
        Ok(output.stdout.trim().to_string())
    }

    /// Rewrite the message of the most recent commit
    pub async fn reword(&self, message: &str) -> GitResult<String> {
        self.executor
            .execute(["commit", "--amend", "-m", message])
            .await?
            .require_success("commit")?;
        let output = self
            .executor
            .execute(["rev-parse", "HEAD"])
            .await?
            .require_success("rev-parse")?;
        Ok(output.stdout.trim().to_string())
    }

    /// Fold the last `count` commits into one with a fresh message
    ///
    /// Implemented as a soft reset plus commit; if the commit fails, the
    /// original HEAD is restored best-effort so the reset does not strand the
    /// caller mid-squash.
    pub async fn squash(&self, count: usize, message: &str) -> GitResult<String> {
        let saved = self
            .executor
            .execute(["rev-parse", "HEAD"])
            .await?
            .require_success("rev-parse")?
            .stdout
            .trim()
            .to_string();

        let target = format!("HEAD~{count}");
        self.executor
            .execute(["reset", "--soft", target.as_str()])
            .await?
            .require_success("reset")?;

        match self.commit(message).await {
            Ok(hash) => Ok(hash),
            Err(e) => {
                if let Err(restore) = self
                    .executor
                    .execute(["reset", "--soft", saved.as_str()])
                    .await
                {
                    tracing::warn!(error = %restore, "failed to restore HEAD after aborted squash");
                }
                Err(e)
            }
        }
    }

    /// Diff of unstaged (or, with `staged`, index) changes
    pub async fn diff(&self, staged: bool, path: Option<&str>) -> GitResult<String> {
        let mut args = vec!["diff"];
        if staged {
            args.push("--cached");
        }
        if let Some(p) = path {
            args.push("--");
            args.push(p);
        }
        let output = self.executor.execute(args).await?.require_success("diff")?;
        Ok(output.stdout)
    }

    /// Recent commits, newest first, bounded by `limit`
    pub async fn log(&self, limit: usize) -> GitResult<Vec<CommitInfo>> {
        let limit_str = limit.to_string();
        let format = log_format();
        let output = self
            .executor
            .execute(["log", "-n", limit_str.as_str(), format.as_str()])
            .await?;
        if !output.success {
            // Empty repo has no commits
            return Ok(Vec::new());
        }
        Ok(parser::parse_log(&output.stdout, RECORD_SENTINEL))
    }

    /// All local and remote branches
    pub async fn branches(&self) -> GitResult<Vec<BranchInfo>> {
        let output = self
            .executor
            .execute([
                "branch",
                "-a",
                "--format=%(HEAD)%09%(refname)%09%(objectname:short)",
            ])
            .await?
            .require_success("branch")?;
        Ok(parser::parse_branches(&output.stdout))
    }

    /// Delete a local branch
    pub async fn delete_branch(&self, name: &str, force: bool) -> GitResult<()> {
        let flag = if force { "-D" } else { "-d" };
        self.executor
            .execute(["branch", flag, name])
            .await?
            .require_success("branch")?;
        Ok(())
    }

    /// Reference movements of HEAD, newest first
    pub async fn reflog(&self, limit: usize) -> GitResult<Vec<ReflogEntry>> {
        let limit_str = limit.to_string();
        let format = reflog_format();
        let output = self
            .executor
            .execute(["log", "-g", "-n", limit_str.as_str(), format.as_str()])
            .await?;
        if !output.success {
            // A fresh repo has no reflog yet
            return Ok(Vec::new());
        }
        Ok(parser::parse_reflog(&output.stdout, RECORD_SENTINEL))
    }

    /// Per-line authorship for a file
    pub async fn blame(&self, path: &str) -> GitResult<Vec<BlameInfo>> {
        let output = self
            .executor
            .execute(["blame", "--line-porcelain", "--", path])
            .await?
            .require_success("blame")?;
        Ok(parser::parse_blame(&output.stdout))
    }

    /// Current stash entries
    pub async fn stash_list(&self) -> GitResult<Vec<StashEntry>> {
        let output = self
            .executor
            .execute(["stash", "list", "--format=%gd%x00%s"])
            .await?;
        if !output.success {
            return Ok(Vec::new());
        }
        Ok(parser::parse_stash_list(&output.stdout))
    }

    /// Reapply and drop the most recent stash
    pub async fn stash_pop(&self) -> GitResult<()> {
        self.executor
            .execute(["stash", "pop"])
            .await?
            .require_success("stash pop")?;
        Ok(())
    }

    /// Create a new commit reverting the given one
    pub async fn revert(&self, commit: &str) -> GitResult<()> {
        self.executor
            .execute(["revert", "--no-edit", commit])
            .await?
            .require_success("revert")?;
        Ok(())
    }

    /// Move HEAD (and optionally index/tree) to the given target
    pub async fn reset(&self, mode: ResetMode, target: &str) -> GitResult<()> {
        self.executor
            .execute(["reset", mode.flag(), target])
            .await?
            .require_success("reset")?;
        Ok(())
    }

    /// Apply a single commit on top of HEAD
    pub async fn cherry_pick(&self, commit: &str) -> GitResult<()> {
        self.executor
            .execute(["cherry-pick", commit])
            .await?
            .require_success("cherry-pick")?;
        Ok(())
    }

    /// Create a tag at HEAD; annotated when a message is given
    pub async fn tag_create(&self, name: &str, message: Option<&str>) -> GitResult<()> {
        let output = match message {
            Some(msg) => self.executor.execute(["tag", "-a", name, "-m", msg]).await?,
            None => self.executor.execute(["tag", name]).await?,
        };
        output.require_success("tag")?;
        Ok(())
    }

    /// Push a single tag to origin
    pub async fn tag_push(&self, name: &str, credential: Option<&str>) -> GitResult<()> {
        let refspec = format!("refs/tags/{name}");
        self.executor
            .execute_with(
                ["push", "origin", refspec.as_str()],
                ExecOptions::with_credential(credential),
            )
            .await?
            .require_success("push")?;
        Ok(())
    }

    /// Delete a local tag
    pub async fn tag_delete(&self, name: &str) -> GitResult<()> {
        self.executor
            .execute(["tag", "-d", name])
            .await?
            .require_success("tag")?;
        Ok(())
    }

    /// Fetch from the default remote
    pub async fn fetch(&self, credential: Option<&str>) -> GitResult<()> {
        self.executor
            .execute_with(["fetch"], ExecOptions::with_credential(credential))
            .await?
            .require_success("fetch")?;
        Ok(())
    }

    /// Pull the upstream branch, rebasing local commits and autostashing
    pub async fn pull(&self, credential: Option<&str>) -> GitResult<CommandOutput> {
        self.executor
            .execute_with(
                ["pull", "--rebase", "--autostash"],
                ExecOptions::with_credential(credential),
            )
            .await?
            .require_success("pull")
    }

    /// Push the current branch to its upstream
    pub async fn push(&self, credential: Option<&str>) -> GitResult<CommandOutput> {
        self.executor
            .execute_with(["push"], ExecOptions::with_credential(credential))
            .await?
            .require_success("push")
    }

    /// Fetch a pull-request head ref into a local branch and check it out
    pub async fn checkout_pull_request_head(
        &self,
        number: u64,
        credential: Option<&str>,
    ) -> GitResult<String> {
        let branch = format!("pr-{number}");
        let refspec = format!("pull/{number}/head:{branch}");
        self.executor
            .execute_with(
                ["fetch", "origin", refspec.as_str()],
                ExecOptions::with_credential(credential),
            )
            .await?
            .require_success("fetch")?;
        self.executor
            .execute(["checkout", branch.as_str()])
            .await?
            .require_success("checkout")?;
        Ok(branch)
    }

    /// Query the aggregate repository state
    pub async fn state(&self) -> GitResult<RepositoryState> {
        let current_branch = self.current_branch().await?;
        let upstream = self.upstream_info(&current_branch).await?;
        let status_entries = self.status().await?;
        let recent_commits = self.log(10).await?;
        let stashes = self.stash_list().await?;

        let mut staged = Vec::new();
        let mut unstaged = Vec::new();
        let mut untracked = Vec::new();
        let mut conflicted = Vec::new();

        for entry in status_entries {
            match entry.status {
                FileState::Untracked => untracked.push(entry),
                FileState::Conflict => conflicted.push(entry),
                _ if entry.staged => staged.push(entry),
                _ => unstaged.push(entry),
            }
        }

        // Detect in-progress merge/rebase from git's state files
        let in_merge = self.path.join(".git/MERGE_HEAD").exists();
        let in_rebase = self.path.join(".git/rebase-merge").exists()
            || self.path.join(".git/rebase-apply").exists();

        Ok(RepositoryState {
            current_branch,
            upstream,
            staged_files: staged,
            unstaged_files: unstaged,
            untracked_files: untracked,
            conflicted_files: conflicted,
            recent_commits,
            stashes,
            in_merge,
            in_rebase,
        })
    }

    /// Get upstream tracking info for the current branch
    async fn upstream_info(&self, branch: &Option<String>) -> GitResult<Option<UpstreamInfo>> {
        let branch_name = match branch {
            Some(b) => b,
            None => return Ok(None), // Detached HEAD
        };

        let refspec = format!("refs/heads/{branch_name}");
        let output = self
            .executor
            .execute(["for-each-ref", "--format=%(upstream:short)", refspec.as_str()])
            .await?;
        if !output.success {
            return Ok(None);
        }
        let upstream_branch = output.stdout.trim().to_string();
        if upstream_branch.is_empty() {
            return Ok(None); // No upstream configured
        }

        let range = format!("{branch_name}...{upstream_branch}");
        let output = self
            .executor
            .execute(["rev-list", "--left-right", "--count", range.as_str()])
            .await?;
        if !output.success {
            return Ok(None);
        }

        let parts: Vec<&str> = output.stdout.split_whitespace().collect();
        if parts.len() != 2 {
            return Ok(None);
        }

        Ok(Some(UpstreamInfo {
            remote_branch: upstream_branch,
            ahead: parts[0].parse().unwrap_or(0),
            behind: parts[1].parse().unwrap_or(0),
        }))
    }
}

/// Upstream tracking information
#[derive(Debug, Clone)]
pub struct UpstreamInfo {
    pub remote_branch: String,
    pub ahead: usize,
    pub behind: usize,
}

/// Aggregate snapshot of a repository
#[derive(Debug, Clone)]
pub struct RepositoryState {
    pub current_branch: Option<String>,
    pub upstream: Option<UpstreamInfo>,
    pub staged_files: Vec<FileStatus>,
    pub unstaged_files: Vec<FileStatus>,
    pub untracked_files: Vec<FileStatus>,
    pub conflicted_files: Vec<FileStatus>,
    pub recent_commits: Vec<CommitInfo>,
    pub stashes: Vec<StashEntry>,
    pub in_merge: bool,
    pub in_rebase: bool,
}

impl RepositoryState {
    /// Check if the repository is in a clean state (no changes)
    pub fn is_clean(&self) -> bool {
        self.staged_files.is_empty()
            && self.unstaged_files.is_empty()
            && self.untracked_files.is_empty()
            && self.conflicted_files.is_empty()
    }

    /// Check if in detached HEAD state
    pub fn is_detached(&self) -> bool {
        self.current_branch.is_none()
    }
}
