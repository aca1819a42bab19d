use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{GitBaseConfig, SignatureConfig};
use crate::error::Result;
use crate::git;
use crate::message::{Message, KEY_HASH, KEY_WORK_DIR};
use crate::node::Node;
use crate::template::{self, Environment};

/// Configuration for [`GitCreateTagNode`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitCreateTagConfig {
    #[serde(flatten)]
    pub base: GitBaseConfig,
    /// Tag name, e.g. `v1.4.0`.
    pub tag: String,
    /// Tag annotation message.
    pub message: String,
    pub signature: SignatureConfig,
}

impl GitCreateTagConfig {
    fn has_variables(&self) -> bool {
        self.base.has_variables()
            || template::has_variables(&self.tag)
            || template::has_variables(&self.message)
            || self.signature.has_variables()
    }
}

/// `ci/gitCreateTag`: annotate the current `HEAD` commit with a tag and
/// record the tag object id in `hash` metadata.
pub struct GitCreateTagNode {
    config: GitCreateTagConfig,
    has_vars: bool,
}

impl GitCreateTagNode {
    pub fn new(config: GitCreateTagConfig) -> Self {
        let has_vars = config.has_variables();
        Self { config, has_vars }
    }

    /// Build the node from a raw JSON configuration object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::new(serde_json::from_value(value)?))
    }

    pub fn config(&self) -> &GitCreateTagConfig {
        &self.config
    }
}

impl Node for GitCreateTagNode {
    fn kind(&self) -> &'static str {
        "ci/gitCreateTag"
    }

    fn on_message(&self, msg: &mut Message) -> Result<()> {
        let env = self.has_vars.then(|| Environment::from_message(msg));
        let env = env.as_ref();

        let repository = self.config.base.configured_repository(env);
        let work_dir = self.config.base.resolve_work_dir(msg, env, &repository);
        msg.metadata
            .set(KEY_WORK_DIR, work_dir.display().to_string());

        let tag = template::render_opt(&self.config.tag, env);
        let message = template::render_opt(&self.config.message, env);
        let (tagger_name, tagger_email) = self.config.signature.resolve(env)?;

        let oid = git::create_tag(&work_dir, &tag, &message, &tagger_name, &tagger_email)?;
        msg.metadata.set(KEY_HASH, oid.to_string());
        debug!("tagged {} as {} in {}", oid, tag, work_dir.display());
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

    fn seeded_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), "v1").unwrap();
        git::commit_all(dir.path(), "*", "seed", "CI Bot", "ci@example.com").unwrap();
        dir
    }

    fn tag_node(dir: &TempDir, tag: &str) -> GitCreateTagNode {
        GitCreateTagNode::from_value(json!({
            "directory": dir.path().display().to_string(),
            "tag": tag,
            "message": format!("release {tag}"),
            "signature": { "authorName": "CI Bot", "authorEmail": "ci@example.com" }
        }))
        .unwrap()
    }

    #[test]
    fn tags_head_and_records_the_tag_id() {
        let dir = seeded_repo();
        let node = tag_node(&dir, "v1.0.0");
        let mut msg = Message::new("tick", DataType::Json, "{}").with_metadata(Metadata::new());
        node.on_message(&mut msg).unwrap();

        let tag_id = msg.metadata.value(KEY_HASH).to_string();
        let repo = git2::Repository::open(dir.path()).unwrap();
        let tag = repo
            .find_tag(git2::Oid::from_str(&tag_id).unwrap())
            .unwrap();
        assert_eq!(tag.name().unwrap(), "v1.0.0");
        assert_eq!(tag.message().unwrap(), "release v1.0.0");
        assert_eq!(
            tag.target_id(),
            repo.head().unwrap().peel_to_commit().unwrap().id()
        );
    }

    #[test]
    fn renders_markers_in_the_tag_name() {
        let dir = seeded_repo();
        let node = GitCreateTagNode::from_value(json!({
            "directory": dir.path().display().to_string(),
            "tag": "v${metadata.buildNumber}",
            "message": "tagged build",
            "signature": { "authorName": "CI Bot", "authorEmail": "ci@example.com" }
        }))
        .unwrap();

        let metadata: Metadata = [("buildNumber", "42")].into_iter().collect();
        let mut msg = Message::new("tick", DataType::Json, "{}").with_metadata(metadata);
        node.on_message(&mut msg).unwrap();

        let repo = git2::Repository::open(dir.path()).unwrap();
        assert!(repo.revparse_single("refs/tags/v42").is_ok());
    }

    #[test]
    fn unborn_head_surfaces_the_git_error() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();

        let node = tag_node(&dir, "v1.0.0");
        let mut msg = Message::new("tick", DataType::Json, "{}").with_metadata(Metadata::new());
        let err = node.on_message(&mut msg).unwrap_err();

        assert!(matches!(err, NodeError::Git(_)));
        assert!(msg.metadata.value(KEY_HASH).is_empty());
    }
}
