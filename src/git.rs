use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    Commit, FetchOptions, IndexAddOption, Oid, ProxyOptions, PushOptions, Repository, Signature,
    Sort, StatusOptions,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::ResolvedAuth;
use crate::error::{NodeError, Result};

/// How a clone-or-pull run changed the work directory.
///
/// Nodes treat all three as success; the distinction is for library callers
/// that care whether any work happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The directory did not exist and was cloned from scratch.
    Cloned,
    /// The local branch was moved to the fetched tip and checked out.
    FastForwarded,
    /// The local branch already matched the remote.
    AlreadyUpToDate,
}

/// Clone `url` into `work_dir`, or force-pull if the directory already
/// exists. `reference` selects what gets checked out: a branch name (bare or
/// `refs/heads/…`) or a tag (bare or `refs/tags/…`); empty means the
/// remote's default branch on clone and the current branch on pull. Repeat
/// runs against an unchanged remote succeed with
/// [`SyncOutcome::AlreadyUpToDate`].
pub fn sync(
    work_dir: &Path,
    url: &str,
    reference: &str,
    auth: &ResolvedAuth,
    proxy_url: Option<&str>,
) -> Result<SyncOutcome> {
    require_url(url)?;
    if work_dir.exists() {
        let repo = open_repo(work_dir)?;
        pull(&repo, url, reference, auth, proxy_url)
    } else {
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options(auth, proxy_url));
        debug!("cloning {url} into {}", work_dir.display());
        let repo = builder.clone(url, work_dir).map_err(NodeError::Transport)?;
        if !reference.is_empty() {
            checkout_reference(&repo, reference)?;
        }
        Ok(SyncOutcome::Cloned)
    }
}

/// Point a fresh clone's HEAD at `reference`. A branch gets a local branch
/// created at the remote-tracking tip when the clone's default did not
/// already provide one; a tag checks out detached at its peeled commit. Bare
/// names try the branch first, then the tag.
fn checkout_reference(repo: &Repository, reference: &str) -> Result<()> {
    let is_tag_ref = reference.starts_with("refs/tags/");
    if !is_tag_ref {
        let branch = short_branch(reference);
        let refname = format!("refs/heads/{branch}");
        if repo.find_reference(&refname).is_ok() {
            return checkout_ref(repo, &refname);
        }
        if let Ok(remote) = repo.find_reference(&format!("refs/remotes/origin/{branch}")) {
            let tip = remote.peel_to_commit()?.id();
            repo.reference(&refname, tip, true, "checkout after clone")?;
            return checkout_ref(repo, &refname);
        }
        if reference.starts_with("refs/heads/") {
            return Err(NodeError::ConfigResolution(format!(
                "reference {reference:?} does not exist in the cloned repository"
            )));
        }
    }
    let tag = reference.strip_prefix("refs/tags/").unwrap_or(reference);
    match repo.find_reference(&format!("refs/tags/{tag}")) {
        Ok(tag_ref) => {
            let target = tag_ref.peel_to_commit()?.id();
            repo.set_head_detached(target)?;
            repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
            Ok(())
        }
        Err(_) => Err(NodeError::ConfigResolution(format!(
            "reference {reference:?} matches no branch or tag in the cloned repository"
        ))),
    }
}

fn checkout_ref(repo: &Repository, refname: &str) -> Result<()> {
    repo.set_head(refname)?;
    repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
    Ok(())
}

/// Force-pull: fetch the reference from `url` directly (no configured
/// remote) and fast-forward the local branch to it. Tag references detach
/// instead of fast-forwarding a branch.
fn pull(
    repo: &Repository,
    url: &str,
    reference: &str,
    auth: &ResolvedAuth,
    proxy_url: Option<&str>,
) -> Result<SyncOutcome> {
    if reference.starts_with("refs/tags/") {
        return pull_tag(repo, url, reference, auth, proxy_url);
    }
    let branch = match short_branch(reference) {
        "" => current_branch(repo)?,
        name => name.to_string(),
    };

    let mut remote = repo.remote_anonymous(url)?;
    let mut fetch = fetch_options(auth, proxy_url);
    debug!("fetching {branch} from {url}");
    remote
        .fetch(&[branch.as_str()], Some(&mut fetch), None)
        .map_err(NodeError::Transport)?;

    let fetch_head = repo.find_reference("FETCH_HEAD")?;
    let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
    let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

    if analysis.is_up_to_date() {
        return Ok(SyncOutcome::AlreadyUpToDate);
    }
    if !analysis.is_fast_forward() {
        return Err(NodeError::NonFastForward);
    }

    let refname = format!("refs/heads/{branch}");
    match repo.find_reference(&refname) {
        Ok(mut local) => {
            local.set_target(fetch_commit.id(), "fast-forward")?;
        }
        // Fetched a branch that does not exist locally yet.
        Err(_) => {
            repo.reference(&refname, fetch_commit.id(), true, "fast-forward")?;
        }
    }
    repo.set_head(&refname)?;
    repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
    Ok(SyncOutcome::FastForwarded)
}

/// Fetch a `refs/tags/…` reference and detach HEAD at its peeled commit.
/// HEAD already sitting on that commit is the up-to-date case.
fn pull_tag(
    repo: &Repository,
    url: &str,
    reference: &str,
    auth: &ResolvedAuth,
    proxy_url: Option<&str>,
) -> Result<SyncOutcome> {
    let mut remote = repo.remote_anonymous(url)?;
    let mut fetch = fetch_options(auth, proxy_url);
    debug!("fetching {reference} from {url}");
    remote
        .fetch(&[reference], Some(&mut fetch), None)
        .map_err(NodeError::Transport)?;

    let target = repo.find_reference("FETCH_HEAD")?.peel_to_commit()?.id();
    let current = repo.head().ok().and_then(|head| head.target());
    if current == Some(target) {
        return Ok(SyncOutcome::AlreadyUpToDate);
    }
    repo.set_head_detached(target)?;
    repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
    Ok(SyncOutcome::FastForwarded)
}

/// Stage everything matching `pattern` and commit it. Fails with
/// [`NodeError::NoChangesToCommit`] when the working tree is clean.
pub fn commit_all(
    work_dir: &Path,
    pattern: &str,
    message: &str,
    author_name: &str,
    author_email: &str,
) -> Result<Oid> {
    let repo = open_repo(work_dir)?;

    let mut status_opts = StatusOptions::new();
    status_opts.include_untracked(true);
    let statuses = repo.statuses(Some(&mut status_opts))?;
    if statuses.is_empty() {
        return Err(NodeError::NoChangesToCommit);
    }

    let mut index = repo.index()?;
    index.add_all([pattern], IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let signature = Signature::now(author_name, author_email)?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None, // first commit on an unborn branch
    };
    let parents: Vec<&Commit> = parent.iter().collect();

    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    debug!("committed {oid} in {}", work_dir.display());
    Ok(oid)
}

/// Create an annotated tag at the current HEAD commit and return the tag
/// object's id. A repository without a resolvable HEAD is an error.
pub fn create_tag(
    work_dir: &Path,
    tag_name: &str,
    message: &str,
    tagger_name: &str,
    tagger_email: &str,
) -> Result<Oid> {
    let repo = open_repo(work_dir)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    let signature = Signature::now(tagger_name, tagger_email)?;
    let oid = repo.tag(tag_name, head_commit.as_object(), &signature, message, false)?;
    debug!("tagged {} as {tag_name} ({oid})", head_commit.id());
    Ok(oid)
}

/// Push the given refspecs to `url`, dialed directly as an anonymous remote.
pub fn push(
    work_dir: &Path,
    url: &str,
    ref_specs: &[String],
    auth: &ResolvedAuth,
    proxy_url: Option<&str>,
) -> Result<()> {
    require_url(url)?;
    let repo = open_repo(work_dir)?;
    let mut remote = repo.remote_anonymous(url)?;

    let mut options = PushOptions::new();
    options.remote_callbacks(auth.remote_callbacks());
    if let Some(proxy) = proxy_url {
        options.proxy_options(proxy_options(proxy));
    }

    let specs: Vec<&str> = ref_specs.iter().map(String::as_str).collect();
    debug!("pushing {specs:?} to {url}");
    remote
        .push(&specs, Some(&mut options))
        .map_err(NodeError::Transport)
}

/// History entries newest-first by committer time, optionally bounded to an
/// inclusive `[start, end]` window of committer epoch seconds. `limit` 0
/// collects until history is exhausted.
pub fn log(
    work_dir: &Path,
    limit: usize,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Vec<LogEntry>> {
    let repo = open_repo(work_dir)?;
    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;
    revwalk.set_sorting(Sort::TIME)?;

    let mut entries = Vec::new();
    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        let when = commit.committer().when().seconds();
        // Out-of-window commits are skipped, not treated as a stop
        // condition; times are not guaranteed monotonic across a history.
        if start.is_some_and(|s| when < s) || end.is_some_and(|e| when > e) {
            continue;
        }
        entries.push(LogEntry::from_commit(&commit));
        if limit > 0 && entries.len() >= limit {
            break;
        }
    }
    Ok(entries)
}

/// One commit as reported by the log query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub hash: String,
    pub author: PersonStamp,
    pub committer: PersonStamp,
    /// Embedded tag object when a merge commit was created from a signed
    /// tag; empty otherwise.
    pub merge_tag: String,
    pub message: String,
    pub tree_hash: String,
    /// Commit message encoding; `UTF-8` when the commit carries no explicit
    /// encoding header.
    pub encoding: String,
}

/// Author or committer identity with its timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonStamp {
    pub name: String,
    pub email: String,
    /// RFC 3339, preserving the commit's own UTC offset.
    pub when: String,
}

impl LogEntry {
    fn from_commit(commit: &Commit<'_>) -> Self {
        let merge_tag = commit
            .header_field_bytes("mergetag")
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_default();
        Self {
            hash: commit.id().to_string(),
            author: PersonStamp::from_signature(&commit.author()),
            committer: PersonStamp::from_signature(&commit.committer()),
            merge_tag,
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            tree_hash: commit.tree_id().to_string(),
            encoding: commit.message_encoding().unwrap_or("UTF-8").to_string(),
        }
    }
}

impl PersonStamp {
    fn from_signature(signature: &Signature<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(signature.email_bytes()).into_owned(),
            when: format_time(signature.when()),
        }
    }
}

/// Parse a `yyyy-MM-dd[ HH:mm:ss]` window bound as UTC epoch seconds. A bare
/// date expands to the start or end of that day. Empty input means
/// unbounded; unparseable input is logged and also treated as unbounded.
pub fn parse_time_bound(input: &str, end_of_day: bool) -> Option<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let full = if trimmed.len() == 10 {
        let suffix = if end_of_day { "23:59:59" } else { "00:00:00" };
        format!("{trimmed} {suffix}")
    } else {
        trimmed.to_string()
    };
    match NaiveDateTime::parse_from_str(&full, "%Y-%m-%d %H:%M:%S") {
        Ok(when) => Some(when.and_utc().timestamp()),
        Err(err) => {
            warn!("ignoring unparseable time bound {trimmed:?}: {err}");
            None
        }
    }
}

fn format_time(time: git2::Time) -> String {
    FixedOffset::east_opt(time.offset_minutes() * 60)
        .or_else(|| FixedOffset::east_opt(0))
        .and_then(|offset| offset.timestamp_opt(time.seconds(), 0).single())
        .map(|when| when.to_rfc3339())
        .unwrap_or_else(|| time.seconds().to_string())
}

fn open_repo(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|source| NodeError::RepositoryOpen {
        path: path.to_path_buf(),
        source,
    })
}

fn current_branch(repo: &Repository) -> Result<String> {
    let head = repo.head()?;
    if !head.is_branch() {
        return Err(NodeError::ConfigResolution(
            "HEAD is detached; set `reference` to pick what to pull".to_string(),
        ));
    }
    head.shorthand().map(str::to_string).ok_or_else(|| {
        NodeError::ConfigResolution("current branch name is not valid UTF-8".to_string())
    })
}

fn short_branch(reference: &str) -> &str {
    reference.strip_prefix("refs/heads/").unwrap_or(reference)
}

fn fetch_options<'a>(auth: &'a ResolvedAuth, proxy_url: Option<&str>) -> FetchOptions<'a> {
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(auth.remote_callbacks());
    if let Some(proxy) = proxy_url {
        fetch.proxy_options(proxy_options(proxy));
    }
    fetch
}

fn proxy_options(url: &str) -> ProxyOptions<'static> {
    let mut proxy = ProxyOptions::new();
    proxy.url(url);
    proxy
}

fn require_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(NodeError::ConfigResolution(
            "repository URL resolved empty; set `repository` or supply gitSshUrl/gitHttpUrl metadata"
                .to_string(),
        ));
    }
    Ok(())
}
