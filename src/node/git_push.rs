use log::debug;
use serde_json::Value;

use crate::config::GitBaseConfig;
use crate::error::Result;
use crate::git;
use crate::message::{Message, KEY_WORK_DIR};
use crate::node::Node;
use crate::template::Environment;

/// `ci/gitPush`: push the configured refspecs from the work directory to the
/// remote.
///
/// The remote URL falls back to call metadata like the clone node's, but the
/// work directory is derived from the configured URL only, so a push that
/// dials a metadata-supplied remote still targets the checkout produced by
/// the configuration it shares with the surrounding pipeline.
pub struct GitPushNode {
    config: GitBaseConfig,
    has_vars: bool,
}

impl GitPushNode {
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

impl Node for GitPushNode {
    fn kind(&self) -> &'static str {
        "ci/gitPush"
    }

    fn on_message(&self, msg: &mut Message) -> Result<()> {
        let env = self.has_vars.then(|| Environment::from_message(msg));
        let env = env.as_ref();

        let ref_specs = self.config.resolve_ref_specs(env)?;
        let configured = self.config.configured_repository(env);
        let work_dir = self.config.resolve_work_dir(msg, env, &configured);
        msg.metadata
            .set(KEY_WORK_DIR, work_dir.display().to_string());

        let repository = self.config.resolve_repository(msg, env);
        let auth = self.config.resolve_auth()?;
        let proxy = self.config.resolve_proxy_url();
        git::push(&work_dir, &repository, &ref_specs, &auth, proxy.as_deref())?;
        debug!("pushed {:?} to {}", ref_specs, repository);
        Ok(())
    }
}
