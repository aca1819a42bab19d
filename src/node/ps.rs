use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::message::{DataType, Message};
use crate::metrics;
use crate::node::Node;

/// Configuration for [`PsNode`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PsConfig {
    /// Metric group names to collect (see [`metrics::ALL_OPTIONS`]); empty
    /// collects every group.
    pub options: Vec<String>,
}

/// `ci/ps`: replace the message payload with a JSON snapshot of host
/// metrics. Groups that cannot be read on this host are left out.
pub struct PsNode {
    config: PsConfig,
}

impl PsNode {
    pub fn new(config: PsConfig) -> Self {
        Self { config }
    }

    /// Build the node from a raw JSON configuration object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::new(serde_json::from_value(value)?))
    }

    pub fn config(&self) -> &PsConfig {
        &self.config
    }
}

impl Node for PsNode {
    fn kind(&self) -> &'static str {
        "ci/ps"
    }

    fn on_message(&self, msg: &mut Message) -> Result<()> {
        let snapshot = metrics::snapshot(&self.config.options);
        msg.set_data(serde_json::to_string(&snapshot)?, DataType::Json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_option_list() {
        let node =
            PsNode::from_value(json!({ "options": ["host/info", "mem/virtualMemory"] })).unwrap();
        assert_eq!(
            node.config().options,
            ["host/info", "mem/virtualMemory"]
        );
        assert_eq!(node.kind(), "ci/ps");
    }

    #[test]
    fn selected_group_lands_in_the_payload() {
        let node = PsNode::from_value(json!({ "options": ["mem/virtualMemory"] })).unwrap();
        let mut msg = Message::new("queryServerMetrics", DataType::Text, "");
        node.on_message(&mut msg).unwrap();

        assert_eq!(msg.data_type, DataType::Json);
        let payload: Value = serde_json::from_str(&msg.data).unwrap();
        let object = payload.as_object().unwrap();
        assert!(object.keys().all(|key| key == "mem/virtualMemory"));
    }

    #[test]
    fn unknown_group_produces_an_empty_snapshot() {
        let node = PsNode::from_value(json!({ "options": ["flux-capacitor"] })).unwrap();
        let mut msg = Message::new("queryServerMetrics", DataType::Text, "");
        node.on_message(&mut msg).unwrap();

        assert_eq!(msg.data, "{}");
    }
}
