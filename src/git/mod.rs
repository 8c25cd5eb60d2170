pub mod askpass;
pub mod executor;
pub mod identity;
pub mod parser;
pub mod repository;
pub mod sync;
pub mod version;

// Re-export commonly used types
pub use askpass::AskpassScript;
pub use executor::{CommandOutput, ExecOptions, GitExecutor};
pub use identity::{Identity, IdentityOverride};
pub use parser::{
    BlameInfo, BranchInfo, CommitInfo, FileState, FileStatus, ReflogEntry, StashEntry,
    parse_blame, parse_branches, parse_log, parse_reflog, parse_stash_list, parse_status,
};
pub use repository::{Repository, RepositoryState, ResetMode, UpstreamInfo};
pub use sync::{ConflictSide, SyncOrchestrator, SyncResult};
pub use version::GitVersion;
