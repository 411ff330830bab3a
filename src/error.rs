use std::path::PathBuf;

/// Everything that can go wrong across the workflow and the converters.
///
/// Each variant's message names the failing stage and, where one exists, the
/// corrective action. All of these surface at the top level of the binary and
/// terminate the process with exit status 1; nothing is swallowed lower down.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("'{0}' does not exist or is not a directory")]
    NotADirectory(PathBuf),

    #[error("'{0}' is not a git repository")]
    NotARepository(PathBuf),

    #[error("the repository has uncommitted changes; commit or stash them before proceeding")]
    UncommittedChanges,

    #[error("`{tool}` not found in PATH; install it with: {install}")]
    ToolNotAvailable {
        tool: &'static str,
        install: &'static str,
    },

    #[error(
        "a display-name change requires the git-filter-repo engine; \
         rerun without --filter-branch or without --new-name"
    )]
    NameRewriteNeedsFilterRepo,

    #[error("backup '{0}' already exists; remove it before rerunning")]
    SnapshotExists(String),

    #[error("canceled by user; no changes made")]
    Declined,

    /// Non-zero exit from the rewrite tool. Carries the tool's own
    /// diagnostics verbatim; the recovery path is the backup, not a retry.
    #[error("history rewrite failed:\n{0}")]
    RewriteFailed(String),

    #[error("`git {command}` failed: {detail}")]
    Git { command: String, detail: String },

    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error("file should be csv: {0}")]
    NotCsv(PathBuf),

    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("csv read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("prompt failed: {0}")]
    Prompt(String),
}
