use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Single-use credential helper script
///
/// Git invokes the program named by `GIT_ASKPASS` whenever it needs a
/// credential; the program's stdout becomes the answer. The script created
/// here prints exactly one secret and nothing else, lives in its own private
/// temp directory, and is scoped to exactly one invocation: the executor
/// creates it immediately before spawning and removes it as soon as the
/// subprocess completes, whatever the outcome.
#[derive(Debug)]
pub struct AskpassScript {
    path: PathBuf,
    // Owns the directory so dropping the script also cleans up the dir.
    _dir: TempDir,
}

impl AskpassScript {
    /// Write a fresh helper script containing `secret`
    pub fn create(secret: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("gitdrive-askpass").tempdir()?;

        #[cfg(unix)]
        let path = {
            let path = dir.path().join("askpass.sh");
            // printf is immune to echo's escape handling; single quotes keep
            // the secret out of shell interpretation.
            let escaped = secret.replace('\'', r"'\''");
            fs::write(&path, format!("#!/bin/sh\nprintf '%s\\n' '{}'\n", escaped))?;

            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&path, perms)?;
            path
        };

        #[cfg(windows)]
        let path = {
            let path = dir.path().join("askpass.bat");
            fs::write(&path, format!("@echo off\r\necho {}\r\n", secret))?;
            path
        };

        Ok(Self { path, _dir: dir })
    }

    /// Path to hand to git via `GIT_ASKPASS`
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the script. Idempotent; failures are logged and swallowed
    /// (cleanup of a temp file must never mask the invocation's own result).
    pub fn remove(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove askpass script");
            }
        }
    }
}

impl Drop for AskpassScript {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_writes_script() {
        let script = AskpassScript::create("hunter2").unwrap();
        assert!(script.path().exists());

        let contents = fs::read_to_string(script.path()).unwrap();
        assert!(contents.contains("hunter2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_script_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let script = AskpassScript::create("hunter2").unwrap();
        let mode = fs::metadata(script.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_drop_removes_script() {
        let script = AskpassScript::create("hunter2").unwrap();
        let path = script.path().to_path_buf();
        assert!(path.exists());

        drop(script);
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let script = AskpassScript::create("hunter2").unwrap();
        script.remove();
        script.remove();
        assert!(!script.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_with_single_quote_is_escaped() {
        let script = AskpassScript::create("pa'ss").unwrap();
        let contents = fs::read_to_string(script.path()).unwrap();
        assert!(contents.contains(r"pa'\''ss"));
    }
}
