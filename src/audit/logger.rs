use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::events::{ActivityEvent, ActivityObserver, CommandCompleted};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only history of executed git commands
///
/// Registered as an activity observer; records completion events only. The
/// command strings it receives are already redacted, so no credential ever
/// reaches the log file. Write failures are swallowed: losing a history line
/// must not fail the invocation that produced it.
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a new AuditLogger with the default log path
    pub fn new() -> std::io::Result<Self> {
        let log_path = Self::default_log_path()?;
        Self::with_path(log_path)
    }

    /// Create an AuditLogger with a custom log path
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        // Ensure directory exists
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Get the default log path: ~/.config/gitdrive/history.log
    fn default_log_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "HOME environment variable not set",
            )
        })?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("gitdrive")
            .join("history.log"))
    }

    /// Log a completed command
    pub fn log_completed(&self, event: &CommandCompleted) -> std::io::Result<()> {
        // Check and rotate log if needed
        self.rotate_if_needed()?;

        let timestamp = event.completed_at.to_rfc3339();
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        let exit = event
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string());

        let log_entry = format!(
            "[{}] [{}] [{}] [exit:{}] [{}ms] {}\n",
            timestamp,
            user,
            event.repo_path.display(),
            exit,
            event.duration_ms,
            event.command
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(log_entry.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            // Rotate: history.log -> history.log.1
            let backup_path = self.log_path.with_extension("log.1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl ActivityObserver for AuditLogger {
    fn on_event(&self, event: &ActivityEvent) {
        if let ActivityEvent::CommandCompleted(completed) = event {
            if let Err(e) = self.log_completed(completed) {
                tracing::warn!(error = %e, "failed to write audit log entry");
            }
        }
    }
}
