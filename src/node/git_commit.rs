use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{GitBaseConfig, SignatureConfig};
use crate::error::Result;
use crate::git;
use crate::message::{Message, KEY_HASH, KEY_WORK_DIR};
use crate::node::Node;
use crate::template::{self, Environment};

/// Configuration for [`GitCommitNode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitCommitConfig {
    #[serde(flatten)]
    pub base: GitBaseConfig,
    /// Pathspec staged before committing; defaults to everything.
    pub pattern: String,
    /// Commit message.
    pub message: String,
    pub signature: SignatureConfig,
}

impl Default for GitCommitConfig {
    fn default() -> Self {
        Self {
            base: GitBaseConfig::default(),
            pattern: "*".to_string(),
            message: String::new(),
            signature: SignatureConfig::default(),
        }
    }
}

impl GitCommitConfig {
    fn has_variables(&self) -> bool {
        self.base.has_variables()
            || template::has_variables(&self.pattern)
            || template::has_variables(&self.message)
            || self.signature.has_variables()
    }
}

/// `ci/gitCommit`: stage everything matching the pattern and commit it,
/// recording the new commit id in `hash` metadata.
pub struct GitCommitNode {
    config: GitCommitConfig,
    has_vars: bool,
}

impl GitCommitNode {
    pub fn new(config: GitCommitConfig) -> Self {
        let has_vars = config.has_variables();
        Self { config, has_vars }
    }

    /// Build the node from a raw JSON configuration object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::new(serde_json::from_value(value)?))
    }

    pub fn config(&self) -> &GitCommitConfig {
        &self.config
    }
}

impl Node for GitCommitNode {
    fn kind(&self) -> &'static str {
        "ci/gitCommit"
    }

    fn on_message(&self, msg: &mut Message) -> Result<()> {
        let env = self.has_vars.then(|| Environment::from_message(msg));
        let env = env.as_ref();

        let repository = self.config.base.configured_repository(env);
        let work_dir = self.config.base.resolve_work_dir(msg, env, &repository);
        msg.metadata
            .set(KEY_WORK_DIR, work_dir.display().to_string());

        let pattern = template::render_opt(&self.config.pattern, env);
        let pattern = if pattern.is_empty() {
            "*"
        } else {
            pattern.as_str()
        };
        let message = template::render_opt(&self.config.message, env);
        let (author_name, author_email) = self.config.signature.resolve(env)?;

        let oid = git::commit_all(&work_dir, pattern, &message, &author_name, &author_email)?;
        msg.metadata.set(KEY_HASH, oid.to_string());
        debug!("committed {} in {}", oid, work_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::message::{DataType, Metadata};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn commit_node(dir: &TempDir, message: &str) -> GitCommitNode {
        GitCommitNode::from_value(json!({
            "directory": dir.path().display().to_string(),
            "message": message,
            "signature": { "authorName": "CI Bot", "authorEmail": "ci@example.com" }
        }))
        .unwrap()
    }

    #[test]
    fn defaults_pattern_to_everything() {
        let node = GitCommitNode::from_value(json!({ "message": "release" })).unwrap();
        assert_eq!(node.config().pattern, "*");
        assert_eq!(node.kind(), "ci/gitCommit");
    }

    #[test]
    fn flattens_base_fields_alongside_its_own() {
        let node = GitCommitNode::from_value(json!({
            "directory": "/work",
            "pattern": "src/*",
            "message": "update ${metadata.ref}",
            "signature": { "authorName": "CI Bot", "authorEmail": "ci@example.com" }
        }))
        .unwrap();

        assert_eq!(node.config().base.directory, "/work");
        assert_eq!(node.config().pattern, "src/*");
        assert!(node.has_vars);
    }

    #[test]
    fn commits_staged_changes_and_records_hash() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), "v1").unwrap();

        let node = commit_node(&dir, "add notes");
        let mut msg = Message::new("tick", DataType::Json, "{}").with_metadata(Metadata::new());
        node.on_message(&mut msg).unwrap();

        let hash = msg.metadata.value(KEY_HASH).to_string();
        assert_eq!(hash.len(), 40);
        assert_eq!(
            msg.metadata.value(KEY_WORK_DIR),
            dir.path().display().to_string()
        );

        let repo = git2::Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id().to_string(), hash);
        assert_eq!(head.message().unwrap(), "add notes");
        assert_eq!(head.author().name().unwrap(), "CI Bot");
    }

    #[test]
    fn renders_markers_in_the_commit_message() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), "v1").unwrap();

        let node = commit_node(&dir, "deploy ${metadata.ref}");
        let metadata: Metadata = [("ref", "main")].into_iter().collect();
        let mut msg = Message::new("tick", DataType::Json, "{}").with_metadata(metadata);
        node.on_message(&mut msg).unwrap();

        let repo = git2::Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message().unwrap(), "deploy main");
    }

    #[test]
    fn clean_tree_reports_nothing_to_commit() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();

        let node = commit_node(&dir, "noop");
        let mut msg = Message::new("tick", DataType::Json, "{}").with_metadata(Metadata::new());
        let err = node.on_message(&mut msg).unwrap_err();

        assert!(matches!(err, NodeError::NoChangesToCommit));
        assert!(msg.metadata.value(KEY_HASH).is_empty());
    }

    #[test]
    fn missing_signature_is_a_resolution_error() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), "v1").unwrap();

        let node = GitCommitNode::from_value(json!({
            "directory": dir.path().display().to_string(),
            "message": "update"
        }))
        .unwrap();
        let mut msg = Message::new("tick", DataType::Json, "{}").with_metadata(Metadata::new());
        let err = node.on_message(&mut msg).unwrap_err();

        assert!(matches!(err, NodeError::ConfigResolution(_)));
    }
}
