use log::debug;
use serde_json::Value;

use crate::config::GitBaseConfig;
use crate::error::Result;
use crate::git;
use crate::message::{Message, KEY_WORK_DIR};
use crate::node::Node;
use crate::template::Environment;

/// `ci/gitClone`: clone the repository when the work directory is absent,
/// fast-forward pull when it already holds a checkout.
///
/// The resolved work directory is written to `workDir` metadata before the
/// git work starts, so downstream nodes see it even when the sync fails.
#[derive(Debug)]
pub struct GitCloneNode {
    config: GitBaseConfig,
    has_vars: bool,
}

impl GitCloneNode {
    pub fn new(config: GitBaseConfig) -> Self {
        let has_vars = config.has_variables();
        Self { config, has_vars }
    }

    /// Build the node from a raw JSON configuration object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::new(serde_json::from_value(value)?))
    }

    pub fn config(&self) -> &GitBaseConfig {
        &self.config
    }
}

impl Node for GitCloneNode {
    fn kind(&self) -> &'static str {
        "ci/gitClone"
    }

    fn on_message(&self, msg: &mut Message) -> Result<()> {
        let env = self.has_vars.then(|| Environment::from_message(msg));
        let env = env.as_ref();

        let repository = self.config.resolve_repository(msg, env);
        let reference = self.config.resolve_reference(msg, env);
        let work_dir = self.config.resolve_work_dir(msg, env, &repository);
        msg.metadata
            .set(KEY_WORK_DIR, work_dir.display().to_string());

        let auth = self.config.resolve_auth()?;
        let proxy = self.config.resolve_proxy_url();
        let outcome = git::sync(&work_dir, &repository, &reference, &auth, proxy.as_deref())?;
        debug!(
            "synced {} into {}: {:?}",
            repository,
            work_dir.display(),
            outcome
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::message::{DataType, Metadata};
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_configuration() {
        let node = GitCloneNode::from_value(json!({
            "repository": "https://github.com/acme/widgets.git",
            "authType": "username-password",
            "authUser": "ci",
            "authPassword": "s3cret",
            "proxyUrl": "http://proxy:3128"
        }))
        .unwrap();

        assert_eq!(node.kind(), "ci/gitClone");
        assert_eq!(node.config().auth_user, "ci");
        assert!(!node.has_vars);
    }

    #[test]
    fn detects_markers_at_construction() {
        let node = GitCloneNode::from_value(json!({
            "repository": "${metadata.gitHttpUrl}",
            "authType": "token",
            "authPassword": "t0ken"
        }))
        .unwrap();

        assert!(node.has_vars);
    }

    #[test]
    fn rejects_malformed_configuration() {
        let err = GitCloneNode::from_value(json!({ "repository": 42 })).unwrap_err();
        assert!(matches!(err, NodeError::Json(_)));
    }

    #[test]
    fn records_work_dir_before_failing_on_auth() {
        let node = GitCloneNode::from_value(json!({
            "repository": "https://github.com/acme/widgets.git",
            "directory": "/tmp/ci-base"
        }))
        .unwrap();

        let mut msg = Message::new("tick", DataType::Json, "{}").with_metadata(Metadata::new());
        let err = node.on_message(&mut msg).unwrap_err();

        assert!(matches!(err, NodeError::UnsupportedAuthType(_)));
        assert_eq!(msg.metadata.value(KEY_WORK_DIR), "/tmp/ci-base/widgets");
    }
}
