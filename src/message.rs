use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata key holding the resolved local directory of the last clone or pull.
pub const KEY_WORK_DIR: &str = "workDir";
/// Metadata key holding the default reference for clone and pull.
pub const KEY_REF: &str = "ref";
/// Metadata key holding the default SSH remote URL.
pub const KEY_GIT_SSH_URL: &str = "gitSshUrl";
/// Metadata key holding the default HTTP(S) remote URL.
pub const KEY_GIT_HTTP_URL: &str = "gitHttpUrl";
/// Metadata key receiving the commit or tag id produced by an operation.
pub const KEY_HASH: &str = "hash";

/// Kind of payload carried in [`Message::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    #[default]
    Json,
    Text,
    Binary,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Json => "JSON",
            DataType::Text => "TEXT",
            DataType::Binary => "BINARY",
        }
    }
}

/// String-keyed values travelling with a [`Message`].
///
/// Nodes read caller-supplied defaults from here (remote URLs, reference,
/// work directory) and write derived values back for downstream nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    values: HashMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value under `key`, or the empty string when absent.
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, String>> for Metadata {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One invocation's payload: what a node receives and may rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Generated per message.
    pub id: Uuid,
    /// Creation time, epoch milliseconds.
    pub ts: i64,
    /// Caller-defined message type tag.
    pub msg_type: String,
    pub data_type: DataType,
    /// Message body; interpretation follows [`Message::data_type`].
    pub data: String,
    pub metadata: Metadata,
}

impl Message {
    pub fn new(
        msg_type: impl Into<String>,
        data_type: DataType,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ts: Utc::now().timestamp_millis(),
            msg_type: msg_type.into(),
            data_type,
            data: data.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Replace the body and mark its payload kind.
    pub fn set_data(&mut self, data: String, data_type: DataType) {
        self.data = data;
        self.data_type = data_type;
    }
}
