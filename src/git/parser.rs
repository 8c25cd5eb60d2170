//! Parsers for the machine-readable streams git emits.
//!
//! Every parser here is a pure, total function: malformed or truncated input
//! yields a best-effort partial result (unparsable records are skipped)
//! rather than an error, because the upstream tool's output can vary slightly
//! across versions.

use chrono::DateTime;
use serde::Serialize;

/// Classification of a changed path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Added,
    Modified,
    Deleted,
    Renamed,
    Untracked,
    Conflict,
}

/// One changed, untracked or conflicted path from `git status`
///
/// Staged and unstaged changes are distinct dimensions: a path modified in
/// both yields two entries, one per dimension. `Conflict` entries represent
/// unresolved merge state and carry `staged: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub path: String,
    pub status: FileState,
    pub staged: bool,
    pub old_path: Option<String>,
}

/// One revision from `git log`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub short_hash: String,
    pub message: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub refs: String,
}

/// One branch from `git branch -a`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    pub name: String,
    pub current: bool,
    pub remote: bool,
    pub last_commit: Option<String>,
}

/// Per-line authorship from `git blame --line-porcelain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlameInfo {
    pub line: usize,
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub message: String,
}

/// One reference movement from the reflog, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflogEntry {
    pub hash: String,
    pub short_hash: String,
    pub action: String,
    pub description: String,
    pub date: String,
    pub index: usize,
}

/// One entry from `git stash list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StashEntry {
    pub index: String,
    pub message: String,
}

fn state_for(code: char) -> FileState {
    match code {
        'A' => FileState::Added,
        'D' => FileState::Deleted,
        'R' | 'C' => FileState::Renamed,
        // 'M', 'T' and anything a future git invents degrade to Modified.
        _ => FileState::Modified,
    }
}

fn code_chars(xy: &str) -> (char, char) {
    let mut chars = xy.chars();
    let first = chars.next().unwrap_or('.');
    let second = chars.next().unwrap_or('.');
    (first, second)
}

/// Parse NUL-delimited `git status --porcelain=v2 -z` output
///
/// A clean tree (empty stream) yields an empty vec. Rename records consume
/// the following NUL field as the pre-rename path and map to a single entry
/// with `old_path` set.
pub fn parse_status(output: &str) -> Vec<FileStatus> {
    let mut entries = Vec::new();
    let mut records = output.split('\0');

    while let Some(record) = records.next() {
        if record.is_empty() || record.starts_with('#') {
            continue;
        }

        match record.chars().next() {
            Some('1') => {
                // 1 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <path>
                let fields: Vec<&str> = record.splitn(9, ' ').collect();
                if fields.len() < 9 {
                    continue;
                }
                let (index, worktree) = code_chars(fields[1]);
                let path = fields[8].to_string();
                if index != '.' {
                    entries.push(FileStatus {
                        path: path.clone(),
                        status: state_for(index),
                        staged: true,
                        old_path: None,
                    });
                }
                if worktree != '.' {
                    entries.push(FileStatus {
                        path,
                        status: state_for(worktree),
                        staged: false,
                        old_path: None,
                    });
                }
            }
            Some('2') => {
                // 2 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <X><score> <path>
                // followed by the original path in its own NUL field
                let fields: Vec<&str> = record.splitn(10, ' ').collect();
                if fields.len() < 10 {
                    continue;
                }
                let (index, _) = code_chars(fields[1]);
                let old_path = records.next().filter(|p| !p.is_empty()).map(String::from);
                entries.push(FileStatus {
                    path: fields[9].to_string(),
                    status: FileState::Renamed,
                    staged: index != '.',
                    old_path,
                });
            }
            Some('u') => {
                // u <XY> <sub> <m1> <m2> <m3> <mW> <h1> <h2> <h3> <path>
                let fields: Vec<&str> = record.splitn(11, ' ').collect();
                if fields.len() < 11 {
                    continue;
                }
                entries.push(FileStatus {
                    path: fields[10].to_string(),
                    status: FileState::Conflict,
                    staged: false,
                    old_path: None,
                });
            }
            Some('?') => {
                let fields: Vec<&str> = record.splitn(2, ' ').collect();
                if fields.len() < 2 {
                    continue;
                }
                entries.push(FileStatus {
                    path: fields[1].to_string(),
                    status: FileState::Untracked,
                    staged: false,
                    old_path: None,
                });
            }
            _ => {}
        }
    }

    entries
}

/// Parse sentinel-delimited `git log` output
///
/// Each record is seven lines in fixed order: full hash, short hash, subject,
/// author name, author email, ISO date, ref names. The trailing sentinel of
/// the final record does not produce a spurious empty record.
pub fn parse_log(output: &str, sentinel: &str) -> Vec<CommitInfo> {
    let mut commits = Vec::new();

    for chunk in output.split(sentinel) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }

        let lines: Vec<&str> = chunk.lines().collect();
        if lines.len() < 6 {
            continue;
        }

        commits.push(CommitInfo {
            hash: lines[0].trim().to_string(),
            short_hash: lines[1].trim().to_string(),
            message: lines[2].trim().to_string(),
            author: lines[3].trim().to_string(),
            email: lines[4].trim().to_string(),
            date: lines[5].trim().to_string(),
            refs: lines.get(6).map(|l| l.trim().to_string()).unwrap_or_default(),
        });
    }

    commits
}

/// Actions recognized in reflog descriptions; anything else maps to "unknown"
const REFLOG_ACTIONS: &[&str] = &[
    "commit",
    "checkout",
    "reset",
    "merge",
    "rebase",
    "pull",
    "push",
    "clone",
    "branch",
    "cherry-pick",
    "revert",
    "stash",
    "am",
];

fn reflog_action(description: &str) -> String {
    let head = description.split(':').next().unwrap_or("");
    let word = head.split_whitespace().next().unwrap_or("");
    if REFLOG_ACTIONS.contains(&word) {
        word.to_string()
    } else {
        "unknown".to_string()
    }
}

/// Parse sentinel-delimited `git log -g` output, newest first
///
/// Records are four lines: full hash, short hash, reflog subject, ISO date.
/// The action token is the leading word before the first colon of the subject
/// (e.g. "checkout: moving from a to b" → "checkout").
pub fn parse_reflog(output: &str, sentinel: &str) -> Vec<ReflogEntry> {
    let mut entries = Vec::new();

    for chunk in output.split(sentinel) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }

        let lines: Vec<&str> = chunk.lines().collect();
        if lines.len() < 4 {
            continue;
        }

        let description = lines[2].trim().to_string();
        entries.push(ReflogEntry {
            hash: lines[0].trim().to_string(),
            short_hash: lines[1].trim().to_string(),
            action: reflog_action(&description),
            description,
            date: lines[3].trim().to_string(),
            index: entries.len(),
        });
    }

    entries
}

#[derive(Default)]
struct BlameBlock {
    hash: String,
    line: usize,
    author: String,
    email: String,
    time: Option<i64>,
    message: String,
}

impl BlameBlock {
    fn finish(self) -> Option<BlameInfo> {
        if self.hash.is_empty() || self.line == 0 {
            return None;
        }
        let date = self
            .time
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        let short_hash = self.hash.get(..7).unwrap_or(&self.hash).to_string();
        Some(BlameInfo {
            line: self.line,
            short_hash,
            hash: self.hash,
            author: self.author,
            email: self.email,
            date,
            message: self.message,
        })
    }
}

/// Parse `git blame --line-porcelain` output, one record per source line
///
/// Each block is a header (`<hash> <orig-line> <final-line> [<count>]`)
/// followed by metadata lines and finalized by the tab-prefixed content line.
/// The `author-time` Unix timestamp is converted to an RFC3339 date.
pub fn parse_blame(output: &str) -> Vec<BlameInfo> {
    let mut entries = Vec::new();
    let mut current: Option<BlameBlock> = None;

    for line in output.lines() {
        if line.starts_with('\t') {
            if let Some(block) = current.take() {
                if let Some(entry) = block.finish() {
                    entries.push(entry);
                }
            }
            continue;
        }

        match current.as_mut() {
            None => {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() >= 3
                    && fields[0].len() >= 7
                    && fields[0].chars().all(|c| c.is_ascii_hexdigit())
                {
                    if let Ok(line_no) = fields[2].parse::<usize>() {
                        current = Some(BlameBlock {
                            hash: fields[0].to_string(),
                            line: line_no,
                            ..BlameBlock::default()
                        });
                    }
                }
            }
            Some(block) => {
                if let Some(rest) = line.strip_prefix("author ") {
                    block.author = rest.to_string();
                } else if let Some(rest) = line.strip_prefix("author-mail ") {
                    block.email = rest
                        .trim_start_matches('<')
                        .trim_end_matches('>')
                        .to_string();
                } else if let Some(rest) = line.strip_prefix("author-time ") {
                    block.time = rest.trim().parse().ok();
                } else if let Some(rest) = line.strip_prefix("summary ") {
                    block.message = rest.to_string();
                }
            }
        }
    }

    entries
}

/// Parse `git branch -a --format=%(HEAD)%09%(refname)%09%(objectname:short)`
pub fn parse_branches(output: &str) -> Vec<BranchInfo> {
    let mut branches = Vec::new();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            continue;
        }

        let current = fields[0].trim() == "*";
        let last_commit = fields
            .get(2)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if let Some(name) = fields[1].strip_prefix("refs/heads/") {
            branches.push(BranchInfo {
                name: name.to_string(),
                current,
                remote: false,
                last_commit,
            });
        } else if let Some(name) = fields[1].strip_prefix("refs/remotes/") {
            // origin/HEAD is a symref, not a branch
            if name.ends_with("/HEAD") {
                continue;
            }
            branches.push(BranchInfo {
                name: name.to_string(),
                current: false,
                remote: true,
                last_commit,
            });
        }
    }

    branches
}

/// Parse `git stash list --format=%gd%x00%s` output
pub fn parse_stash_list(output: &str) -> Vec<StashEntry> {
    let mut stashes = Vec::new();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\0').collect();
        if parts.len() >= 2 {
            stashes.push(StashEntry {
                index: parts[0].to_string(),
                message: parts[1].to_string(),
            });
        }
    }

    stashes
}
