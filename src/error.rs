use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

/// Failure taxonomy for node construction and message handling.
///
/// Every operational failure returns through this type; nodes never panic on
/// bad configuration, missing repositories or transport errors.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Node construction from a raw configuration value failed, or an
    /// outcome payload could not be serialized.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field resolved to an unusable value. Raised before any
    /// repository or network I/O.
    #[error("configuration did not resolve: {0}")]
    ConfigResolution(String),

    /// The authentication type tag is not one of the recognized values.
    #[error("unsupported auth type {0:?}")]
    UnsupportedAuthType(String),

    /// The configured SSH key file could not be read.
    #[error("cannot read ssh key {}", path.display())]
    SshKey {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The work directory does not contain an openable repository.
    #[error("cannot open repository at {}", path.display())]
    RepositoryOpen {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// The working tree is clean; there is nothing to stage or commit.
    #[error("no changes to commit")]
    NoChangesToCommit,

    /// The fetched history is not a descendant of the local branch, so a
    /// forced pull cannot fast-forward.
    #[error("fetched history diverged; fast-forward not possible")]
    NonFastForward,

    /// Clone, fetch or push failed in the transport or authentication layer.
    #[error("git transport failed: {0}")]
    Transport(#[source] git2::Error),

    /// Any other libgit2 failure (worktree, index, object lookup).
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}
