use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::message::{DataType, Message};

/// Matches `${name}` substitution markers. Names may contain ASCII letters,
/// digits, `_`, `-`, `.` and brackets (`metadata.gitHttpUrl`, `items[0]`).
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_.\[\]-]+)\}").expect("marker pattern"));

/// Whether `input` contains at least one `${name}` marker.
///
/// Nodes call this once per configuration field at initialization so that the
/// per-call [`Environment`] is only built for configurations that need it.
pub fn has_variables(input: &str) -> bool {
    MARKER.is_match(input)
}

/// Substitute every `${name}` marker in `input` with its binding from `env`.
///
/// Markers without a binding are left verbatim, so rendering is deterministic
/// and repeatable on partially resolvable input.
pub fn render(input: &str, env: &Environment) -> String {
    MARKER
        .replace_all(input, |caps: &Captures| match env.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// [`render`] against an environment that is only built when the node's
/// configuration carries markers; `None` passes the input through.
pub fn render_opt(input: &str, env: Option<&Environment>) -> String {
    match env {
        Some(env) => render(input, env),
        None => input.to_string(),
    }
}

/// Flat name→value scope a template renders against, rebuilt per invocation.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the scope for one message: every metadata entry under
    /// `metadata.<key>`, the top-level fields of a JSON object body under
    /// their bare names (scalars verbatim, composites as compact JSON), and
    /// the message built-ins `id`, `ts`, `data`, `msgType` and `dataType`.
    /// Built-ins are bound last and shadow body fields of the same name.
    pub fn from_message(msg: &Message) -> Self {
        let mut env = Self::new();
        for (key, value) in msg.metadata.iter() {
            env.set(format!("metadata.{key}"), value.clone());
        }
        if msg.data_type == DataType::Json {
            if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&msg.data) {
                for (key, value) in fields {
                    let rendered = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    env.set(key, rendered);
                }
            }
        }
        env.set("id", msg.id.to_string());
        env.set("ts", msg.ts.to_string());
        env.set("data", msg.data.clone());
        env.set("msgType", msg.msg_type.clone());
        env.set("dataType", msg.data_type.as_str().to_string());
        env
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Metadata;

    #[test]
    fn detects_markers() {
        assert!(has_variables("${metadata.gitHttpUrl}"));
        assert!(has_variables("release-${version}-final"));
        assert!(!has_variables("refs/heads/main"));
        assert!(!has_variables(""));
        // An unclosed marker is not a marker.
        assert!(!has_variables("${unterminated"));
    }

    #[test]
    fn renders_bound_markers_and_keeps_unbound_ones() {
        let mut env = Environment::new();
        env.set("metadata.ref", "main");

        assert_eq!(render("refs/heads/${metadata.ref}", &env), "refs/heads/main");
        assert_eq!(render("${missing}/x/${metadata.ref}", &env), "${missing}/x/main");
        assert_eq!(render("no markers here", &env), "no markers here");
    }

    #[test]
    fn environment_includes_metadata_body_and_builtins() {
        let metadata: Metadata = [("workDir", "/srv/repos")].into_iter().collect();
        let msg = Message::new(
            "buildFinished",
            DataType::Json,
            r#"{"version":"1.4.0","count":3,"tags":["a","b"]}"#,
        )
        .with_metadata(metadata);

        let env = Environment::from_message(&msg);
        assert_eq!(env.get("metadata.workDir"), Some("/srv/repos"));
        assert_eq!(env.get("version"), Some("1.4.0"));
        assert_eq!(env.get("count"), Some("3"));
        assert_eq!(env.get("tags"), Some(r#"["a","b"]"#));
        assert_eq!(env.get("msgType"), Some("buildFinished"));
        assert_eq!(env.get("dataType"), Some("JSON"));
        assert_eq!(env.get("id"), Some(msg.id.to_string().as_str()));
    }

    #[test]
    fn builtins_shadow_body_fields() {
        let msg = Message::new("t", DataType::Json, r#"{"msgType":"spoofed"}"#);
        let env = Environment::from_message(&msg);
        assert_eq!(env.get("msgType"), Some("t"));
    }

    #[test]
    fn non_object_and_non_json_bodies_add_no_fields() {
        let msg = Message::new("t", DataType::Json, "[1,2,3]");
        let env = Environment::from_message(&msg);
        assert_eq!(env.get("0"), None);

        let msg = Message::new("t", DataType::Text, r#"{"version":"1.0"}"#);
        let env = Environment::from_message(&msg);
        assert_eq!(env.get("version"), None);
        // The raw body is still reachable through the built-in.
        assert_eq!(env.get("data"), Some(r#"{"version":"1.0"}"#));
    }
}
