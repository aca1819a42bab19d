use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::{AuthKind, ResolvedAuth};
use crate::error::{NodeError, Result};
use crate::message::{Message, KEY_GIT_HTTP_URL, KEY_GIT_SSH_URL, KEY_REF, KEY_WORK_DIR};
use crate::template::{self, Environment};

/// Shared connection settings embedded by every git node configuration.
///
/// `repository`, `directory`, `reference` and `refSpecs` accept `${...}`
/// markers and fall back to call metadata when left empty (see the resolve
/// methods). Authentication and proxy fields are taken literally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitBaseConfig {
    /// Remote repository URL.
    pub repository: String,
    /// Base local directory; the repository short name is joined onto it.
    pub directory: String,
    /// Branch or tag to clone or pull.
    pub reference: String,
    /// Comma-separated local-to-remote reference mappings, e.g.
    /// `refs/heads/main:refs/heads/main`.
    pub ref_specs: String,
    /// One of `ssh-key` (alias `ssh`), `username-password` (alias
    /// `password`) or `token`.
    pub auth_type: String,
    pub auth_user: String,
    /// Password, token or SSH key passphrase depending on `authType`.
    pub auth_password: String,
    /// SSH private key path, required for `ssh-key` auth.
    pub auth_pem_file: String,
    pub proxy_url: String,
    pub proxy_username: String,
    pub proxy_password: String,
}

impl GitBaseConfig {
    /// Whether any templated field carries a `${...}` marker. Computed once
    /// at node initialization so the per-call environment is only built when
    /// something will actually render.
    pub fn has_variables(&self) -> bool {
        template::has_variables(&self.repository)
            || template::has_variables(&self.directory)
            || template::has_variables(&self.reference)
            || template::has_variables(&self.ref_specs)
    }

    /// Remote URL for operations that dial out: a configured value is
    /// rendered, an empty one falls back to the metadata URL matching the
    /// authentication scheme (`gitSshUrl` for ssh tags, `gitHttpUrl`
    /// otherwise).
    pub fn resolve_repository(&self, msg: &Message, env: Option<&Environment>) -> String {
        if self.repository.is_empty() {
            let key = if AuthKind::is_ssh_tag(&self.auth_type) {
                KEY_GIT_SSH_URL
            } else {
                KEY_GIT_HTTP_URL
            };
            msg.metadata.value(key).to_string()
        } else {
            template::render_opt(&self.repository, env)
        }
    }

    /// Remote URL without the metadata fallback. Local-only operations use
    /// this for work directory derivation, so a directory handed down via
    /// `workDir` metadata is reused verbatim instead of having the remote's
    /// repository name appended a second time.
    pub fn configured_repository(&self, env: Option<&Environment>) -> String {
        if self.repository.is_empty() {
            String::new()
        } else {
            template::render_opt(&self.repository, env)
        }
    }

    /// Reference to clone or pull; empty configuration falls back to the
    /// `ref` metadata entry.
    pub fn resolve_reference(&self, msg: &Message, env: Option<&Environment>) -> String {
        if self.reference.is_empty() {
            msg.metadata.value(KEY_REF).to_string()
        } else {
            template::render_opt(&self.reference, env)
        }
    }

    /// Local directory for this operation: the configured directory
    /// (rendered) or the `workDir` metadata entry, joined with the short
    /// name of `repo_url`. An empty short name leaves the base untouched.
    pub fn resolve_work_dir(
        &self,
        msg: &Message,
        env: Option<&Environment>,
        repo_url: &str,
    ) -> PathBuf {
        let base = if self.directory.is_empty() {
            msg.metadata.value(KEY_WORK_DIR).to_string()
        } else {
            template::render_opt(&self.directory, env)
        };
        let short = repo_short_name(repo_url);
        if short.is_empty() {
            PathBuf::from(base)
        } else {
            Path::new(&base).join(short)
        }
    }

    /// Rendered, comma-split, trimmed refspec list. At least one non-empty
    /// mapping is required.
    pub fn resolve_ref_specs(&self, env: Option<&Environment>) -> Result<Vec<String>> {
        let rendered = template::render_opt(&self.ref_specs, env);
        let specs: Vec<String> = rendered
            .split(',')
            .map(str::trim)
            .filter(|spec| !spec.is_empty())
            .map(str::to_string)
            .collect();
        if specs.is_empty() {
            return Err(NodeError::ConfigResolution(
                "refSpecs did not resolve to any mapping".to_string(),
            ));
        }
        Ok(specs)
    }

    pub fn resolve_auth(&self) -> Result<ResolvedAuth> {
        ResolvedAuth::select(
            &self.auth_type,
            &self.auth_user,
            &self.auth_password,
            &self.auth_pem_file,
        )
    }

    /// Proxy URL with credentials spliced in, the only form the transport
    /// accepts them in. `None` when no proxy is configured.
    pub fn resolve_proxy_url(&self) -> Option<String> {
        if self.proxy_url.is_empty() {
            return None;
        }
        if self.proxy_username.is_empty() {
            return Some(self.proxy_url.clone());
        }
        match self.proxy_url.split_once("://") {
            Some((scheme, rest)) if self.proxy_password.is_empty() => {
                Some(format!("{scheme}://{}@{rest}", self.proxy_username))
            }
            Some((scheme, rest)) => Some(format!(
                "{scheme}://{}:{}@{rest}",
                self.proxy_username, self.proxy_password
            )),
            None => Some(self.proxy_url.clone()),
        }
    }
}

/// Commit and tag author identity. Both fields accept `${...}` markers and
/// must resolve non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignatureConfig {
    pub author_name: String,
    pub author_email: String,
}

impl SignatureConfig {
    pub fn has_variables(&self) -> bool {
        template::has_variables(&self.author_name) || template::has_variables(&self.author_email)
    }

    pub fn resolve(&self, env: Option<&Environment>) -> Result<(String, String)> {
        let name = template::render_opt(&self.author_name, env);
        let email = template::render_opt(&self.author_email, env);
        if name.is_empty() || email.is_empty() {
            return Err(NodeError::ConfigResolution(
                "signature authorName and authorEmail are required".to_string(),
            ));
        }
        Ok((name, email))
    }
}

/// Repository short name: the URL basename with one trailing `.git` removed.
/// Works for HTTP(S), `ssh://` and scp-like `git@host:owner/repo.git` forms.
pub fn repo_short_name(url: &str) -> &str {
    let name = url.rsplit('/').next().unwrap_or("");
    name.strip_suffix(".git").unwrap_or(name)
}
