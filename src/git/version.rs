use std::process::Command;

use crate::error::{GitError, GitResult};

/// Git features the engine drives, paired with the release that shipped them.
///
/// The effective minimum version is the newest entry; the error for an old
/// installation names the features it would lose instead of a bare number.
const REQUIRED_FEATURES: &[(&str, (u32, u32))] = &[
    ("pull --rebase --autostash", (2, 9)),
    ("status --porcelain=v2 -z", (2, 11)),
    ("stash push", (2, 13)),
    ("branch --show-current", (2, 22)),
];

/// Oldest git release in which every required feature is present
pub fn minimum_version() -> GitVersion {
    let (major, minor) = REQUIRED_FEATURES
        .iter()
        .map(|(_, introduced)| *introduced)
        .max()
        .unwrap_or((2, 0));
    GitVersion {
        major,
        minor,
        patch: 0,
    }
}

/// Version reported by a git binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    /// Version of the default `git` on PATH
    pub fn detect() -> GitResult<Self> {
        Self::detect_binary("git")
    }

    /// Version reported by a specific (possibly configured) git binary
    pub fn detect_binary(binary: &str) -> GitResult<Self> {
        let output = Command::new(binary).arg("--version").output().map_err(|e| {
            GitError::GitVersionDetectionFailed(format!("failed to run {binary} --version: {e}"))
        })?;

        if !output.status.success() {
            return Err(GitError::GitVersionDetectionFailed(format!(
                "{binary} --version exited with {}",
                output.status
            )));
        }

        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    /// Parse output like "git version 2.39.2" or "git version 2.39.2.windows.1"
    pub fn parse(version_output: &str) -> GitResult<Self> {
        let numbers = version_output
            .trim()
            .strip_prefix("git version ")
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or_else(|| {
                GitError::ParseError(format!("unexpected git version output: {version_output}"))
            })?;

        let mut fields = numbers.split('.');
        let major = parse_field(fields.next(), numbers)?;
        let minor = parse_field(fields.next(), numbers)?;
        // Suffixes like ".windows.1" leave a non-numeric third field
        let patch = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);

        Ok(Self {
            major,
            minor,
            patch,
        })
    }

    fn at_least(&self, (major, minor): (u32, u32)) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    /// True when every feature the engine drives is available
    pub fn is_supported(&self) -> bool {
        self.missing_features().is_empty()
    }

    /// Names of required features this version predates
    pub fn missing_features(&self) -> Vec<&'static str> {
        REQUIRED_FEATURES
            .iter()
            .filter(|(_, introduced)| !self.at_least(*introduced))
            .map(|(feature, _)| *feature)
            .collect()
    }

    /// Gate an installation before the engine starts issuing commands
    ///
    /// Detects the binary's version and fails with the list of features the
    /// installation is missing when it is too old to drive.
    pub fn ensure_supported(binary: &str) -> GitResult<Self> {
        let version = Self::detect_binary(binary)?;
        let missing = version.missing_features();
        if !missing.is_empty() {
            return Err(GitError::GitVersionTooOld {
                found: version.to_string(),
                required: minimum_version().to_string(),
                missing: missing.join(", "),
            });
        }
        Ok(version)
    }
}

fn parse_field(field: Option<&str>, numbers: &str) -> GitResult<u32> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| GitError::ParseError(format!("invalid git version number: {numbers}")))
}

impl std::fmt::Display for GitVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
