//! Pluggable automation nodes.
//!
//! Each node is constructed once from a JSON configuration object and then
//! handles messages one at a time: it resolves its configuration against the
//! incoming message (literal values, `${...}` markers, metadata fallbacks),
//! runs its operation and writes derived values back into the message.

mod git_clone;
mod git_commit;
mod git_create_tag;
mod git_log;
mod git_push;
mod ps;

pub use git_clone::GitCloneNode;
pub use git_commit::{GitCommitConfig, GitCommitNode};
pub use git_create_tag::{GitCreateTagConfig, GitCreateTagNode};
pub use git_log::{GitLogConfig, GitLogNode};
pub use git_push::GitPushNode;
pub use ps::{PsConfig, PsNode};

use crate::error::Result;
use crate::message::Message;

/// One step in an automation pipeline.
///
/// Implementations keep their configuration immutable after construction and
/// hold no per-call state, so a single instance may serve concurrent calls.
/// Callers that point two messages at the same work directory are expected
/// to serialize them.
pub trait Node: Send + Sync {
    /// Stable kind identifier, e.g. `ci/gitClone`.
    fn kind(&self) -> &'static str;

    /// Handle one message: resolve the configuration against it, run the
    /// operation and record the results on the message.
    fn on_message(&self, msg: &mut Message) -> Result<()>;
}
