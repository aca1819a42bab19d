use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GitBaseConfig;
use crate::error::Result;
use crate::git;
use crate::message::{DataType, Message, KEY_WORK_DIR};
use crate::node::Node;
use crate::template::{self, Environment};

/// Configuration for [`GitLogNode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitLogConfig {
    #[serde(flatten)]
    pub base: GitBaseConfig,
    /// Maximum number of entries; `0` walks the whole history.
    pub limit: usize,
    /// Inclusive lower bound, `yyyy-MM-dd` or `yyyy-MM-dd HH:mm:ss` (UTC).
    pub start_time: String,
    /// Inclusive upper bound, same formats as `startTime`.
    pub end_time: String,
}

impl Default for GitLogConfig {
    fn default() -> Self {
        Self {
            base: GitBaseConfig::default(),
            limit: 10,
            start_time: String::new(),
            end_time: String::new(),
        }
    }
}

impl GitLogConfig {
    fn has_variables(&self) -> bool {
        self.base.has_variables()
            || template::has_variables(&self.start_time)
            || template::has_variables(&self.end_time)
    }
}

/// `ci/gitLog`: walk the work directory's history newest-first and replace
/// the message payload with a JSON array of commit entries.
pub struct GitLogNode {
    config: GitLogConfig,
    has_vars: bool,
}

impl GitLogNode {
    pub fn new(mut config: GitLogConfig) -> Self {
        config.start_time = config.start_time.trim().to_string();
        config.end_time = config.end_time.trim().to_string();
        let has_vars = config.has_variables();
        Self { config, has_vars }
    }

    /// Build the node from a raw JSON configuration object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::new(serde_json::from_value(value)?))
    }

    pub fn config(&self) -> &GitLogConfig {
        &self.config
    }
}

impl Node for GitLogNode {
    fn kind(&self) -> &'static str {
        "ci/gitLog"
    }

    fn on_message(&self, msg: &mut Message) -> Result<()> {
        let env = self.has_vars.then(|| Environment::from_message(msg));
        let env = env.as_ref();

        let repository = self.config.base.configured_repository(env);
        let work_dir = self.config.base.resolve_work_dir(msg, env, &repository);
        msg.metadata
            .set(KEY_WORK_DIR, work_dir.display().to_string());

        let start =
            git::parse_time_bound(&template::render_opt(&self.config.start_time, env), false);
        let end = git::parse_time_bound(&template::render_opt(&self.config.end_time, env), true);

        let entries = git::log(&work_dir, self.config.limit, start, end)?;
        msg.set_data(serde_json::to_string(&entries)?, DataType::Json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::LogEntry;
    use crate::message::Metadata;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_limit_to_ten() {
        let node = GitLogNode::from_value(json!({})).unwrap();
        assert_eq!(node.config().limit, 10);
        assert_eq!(node.kind(), "ci/gitLog");
    }

    #[test]
    fn trims_time_bounds_at_construction() {
        let node = GitLogNode::from_value(json!({
            "startTime": "  2024-01-01  ",
            "endTime": " 2024-02-01 12:00:00 "
        }))
        .unwrap();

        assert_eq!(node.config().start_time, "2024-01-01");
        assert_eq!(node.config().end_time, "2024-02-01 12:00:00");
    }

    #[test]
    fn replaces_the_payload_with_history_entries() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "one").unwrap();
        git::commit_all(dir.path(), "*", "first", "CI Bot", "ci@example.com").unwrap();
        fs::write(dir.path().join("b.txt"), "two").unwrap();
        git::commit_all(dir.path(), "*", "second", "CI Bot", "ci@example.com").unwrap();

        let node = GitLogNode::from_value(json!({
            "directory": dir.path().display().to_string()
        }))
        .unwrap();
        let mut msg = Message::new("tick", DataType::Text, "ignored")
            .with_metadata(Metadata::new());
        node.on_message(&mut msg).unwrap();

        assert_eq!(msg.data_type, DataType::Json);
        let entries: Vec<LogEntry> = serde_json::from_str(&msg.data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "first");
        assert_eq!(entries[0].author.name, "CI Bot");
    }
}
