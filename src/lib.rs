//! # ci-nodes
//!
//! A library of pluggable automation nodes for git pipelines and host metrics.
//!
//! ## Overview
//!
//! `ci-nodes` packages the building blocks of a CI-style automation pipeline
//! as independent nodes. Each node is constructed once from a JSON
//! configuration object and then handles messages one at a time: clone or
//! update a repository, commit and tag work trees, push refspecs, query
//! commit history, or snapshot host metrics. Configuration values resolve
//! dynamically per call, so one node instance can serve many repositories.
//!
//! ## Key Features
//!
//! - **Clone-or-pull**: one node keeps a work directory current, cloning on
//!   first use and fast-forwarding afterwards
//! - **Dynamic configuration**: `${...}` markers render against message
//!   metadata and JSON body fields; empty fields fall back to metadata
//! - **Pipeline chaining**: nodes write resolved work directories and
//!   produced commit ids back into message metadata for downstream nodes
//! - **Authentication**: SSH keys, username/password and token auth, with
//!   optional HTTP proxying
//! - **Host metrics**: CPU, memory, disk and network snapshots as JSON
//!
//! ## Architecture
//!
//! The library is organized into modules that separate resolution from
//! execution:
//!
//! - Message envelope and metadata keys ([`message`])
//! - `${...}` marker rendering ([`template`])
//! - Shared configuration and its resolution rules ([`config`], [`auth`])
//! - Git execution against a work directory ([`git`])
//! - Host metric collection ([`metrics`])
//! - The node trait and its implementations ([`node`])

/// Credential selection and transport callbacks for git remotes.
///
/// Maps an `authType` tag and its companion fields onto libgit2 credentials
/// (SSH key, username/password or token) and builds the remote callbacks the
/// git operations dial with. Certificate and host-key checks are skipped, so
/// self-signed and private remotes work out of the box.
pub mod auth;

/// Shared node configuration and its per-call resolution rules.
///
/// `GitBaseConfig` carries the fields every git node embeds: remote URL,
/// directory, reference, refspecs, auth and proxy settings. The resolve
/// methods implement the precedence the nodes rely on (configured literal,
/// then `${...}` rendering, then metadata fallback).
pub mod config;

/// Error taxonomy shared by every node.
pub mod error;

/// Git operations against a local work directory.
///
/// Thin, stateless wrappers over libgit2: clone-or-pull with fast-forward
/// semantics, stage-and-commit, annotated tagging, pushing refspecs and a
/// bounded history walk. Every function opens the repository fresh, so
/// callers are free to interleave operations from different nodes.
pub mod git;

/// The message envelope nodes receive and rewrite.
///
/// Carries a typed payload plus string metadata. Well-known metadata keys
/// (`workDir`, `ref`, `gitSshUrl`, `gitHttpUrl`, `hash`) are the contract
/// between nodes in a pipeline.
pub mod message;

/// Host metric collection.
///
/// Snapshots host, CPU, memory, disk and network figures into a JSON object
/// keyed by metric group. Groups that cannot be read on the current host are
/// omitted rather than reported as errors.
pub mod metrics;

/// The node trait and the built-in node implementations.
///
/// Each node pairs a configuration struct with an `on_message` handler:
/// `GitCloneNode`, `GitCommitNode`, `GitCreateTagNode`, `GitPushNode`,
/// `GitLogNode` and `PsNode`.
pub mod node;

/// `${...}` marker rendering against a per-message environment.
///
/// The environment exposes metadata under `metadata.*`, top-level fields of
/// JSON object payloads under their own names, and the message built-ins
/// (`id`, `ts`, `data`, `msgType`, `dataType`). Unresolved markers are left
/// verbatim.
pub mod template;
