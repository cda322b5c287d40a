//! `git` service: publish a remote branch into a local working copy, check
//! out branches, and list them.
//!
//! All operations shell out to the `git` CLI. Credentials never appear on
//! the command line or in the repository: HTTP credentials travel as an
//! `http.extraHeader` set through the child's environment, and SSH keys
//! live in a temporary 0600 file for the duration of one call.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::rpc::{MethodSet, RpcService};

/// Prefix of branches created by `git.Publish`.
pub const BRANCH_PREFIX: &str = "auto-";

/// Length of the random suffix appended to published branch names.
const SUFFIX_LEN: usize = 8;

/// Parameters of `git.Publish`.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitTarget {
    /// Remote repository URL (`https://...`, `http://...` or SSH form).
    pub url: String,
    /// Private key for SSH remotes.
    pub sshkey: String,
    /// Passphrase of `sshkey`. Not supported; must be empty.
    pub sshkeysalt: String,
    /// Local working copy.
    pub path: String,
    /// Remote branch (or tag) to publish.
    pub branch: String,
    /// HTTP user.
    pub user: String,
    /// HTTP password.
    pub password: String,
}

impl fmt::Debug for GitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitTarget")
            .field("url", &self.url)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Parameters of `git.Branches`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoPath {
    /// Local working copy.
    pub path: String,
}

/// Parameters of `git.Checkout`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    /// Local working copy.
    pub path: String,
    /// Local branch to check out.
    pub branch: String,
}

/// Result of `git.Branches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    /// Currently checked-out branch.
    pub current: String,
    /// All local branches.
    pub branches: Vec<String>,
}

/// Receiver for the `git` service.
#[derive(Debug, Clone)]
pub struct GitService {
    git_bin: PathBuf,
}

impl GitService {
    /// Uses the `git` binary found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_binary("git")
    }

    /// Uses a specific `git` binary.
    #[must_use]
    pub fn with_binary(git_bin: impl Into<PathBuf>) -> Self {
        Self {
            git_bin: git_bin.into(),
        }
    }

    /// `git.Publish`: brings `target.path` up to date with the remote and
    /// checks out a fresh `auto-*` branch at `target.branch`. Every other
    /// local branch is deleted. Returns the new branch name.
    async fn publish(self: Arc<Self>, target: GitTarget) -> anyhow::Result<String> {
        validate(&target)?;
        let auth = GitAuth::prepare(&target).await?;
        let path = Path::new(&target.path);

        if is_empty_dir(path).await? {
            self.run(None, &["clone", &target.url, &target.path], &auth)
                .await?;
        } else {
            if !path.join(".git").exists() {
                bail!("target path is not a git repository");
            }
            self.run(
                Some(path),
                &["fetch", &target.url, "+refs/heads/*:refs/remotes/origin/*"],
                &auth,
            )
            .await?;
        }

        let listing = self
            .run(
                Some(path),
                &["for-each-ref", "--format=%(objectname) %(refname)"],
                &auth,
            )
            .await?;
        let (hash, reference) =
            find_reference(&listing, &target.branch).ok_or_else(|| anyhow!("reference not found"))?;

        let branch = branch_name(reference);
        let full = format!("refs/heads/{branch}");
        self.run(Some(path), &["update-ref", &full, hash], &auth)
            .await?;
        self.run(Some(path), &["checkout", "-f", &branch], &auth)
            .await?;
        self.clean_branches(path, &full).await?;

        tracing::info!(path = %target.path, %branch, "published");
        Ok(branch)
    }

    /// `git.Checkout`: force-checks out a local branch and returns git's
    /// combined output.
    async fn checkout(self: Arc<Self>, request: CheckoutRequest) -> anyhow::Result<String> {
        if request.branch.is_empty() {
            bail!("branch required");
        }
        let path = Path::new(&request.path);
        self.run(Some(path), &["checkout", "-f", &request.branch], &GitAuth::Anonymous)
            .await
    }

    /// `git.Branches`: current and local branches of a working copy.
    async fn branches(self: Arc<Self>, repo: RepoPath) -> anyhow::Result<BranchInfo> {
        let path = Path::new(&repo.path);
        let current = self
            .run(Some(path), &["rev-parse", "--abbrev-ref", "HEAD"], &GitAuth::Anonymous)
            .await?;
        let listing = self
            .run(
                Some(path),
                &["for-each-ref", "--format=%(refname:short)", "refs/heads/"],
                &GitAuth::Anonymous,
            )
            .await?;
        Ok(BranchInfo {
            current: current.trim().to_string(),
            branches: non_empty_lines(&listing),
        })
    }

    /// Deletes every local branch except `keep` (a full ref name).
    async fn clean_branches(&self, path: &Path, keep: &str) -> anyhow::Result<()> {
        let listing = self
            .run(
                Some(path),
                &["for-each-ref", "--format=%(refname)", "refs/heads/"],
                &GitAuth::Anonymous,
            )
            .await?;
        for reference in non_empty_lines(&listing) {
            if reference != keep {
                self.run(Some(path), &["update-ref", "-d", &reference], &GitAuth::Anonymous)
                    .await?;
            }
        }
        Ok(())
    }

    /// Runs one git command, returning stdout followed by stderr.
    async fn run(&self, dir: Option<&Path>, args: &[&str], auth: &GitAuth) -> anyhow::Result<String> {
        let subcommand = args.first().copied().unwrap_or_default();
        let mut cmd = Command::new(&self.git_bin);
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0").kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        auth.apply(&mut cmd);

        tracing::debug!(subcommand, dir = ?dir, "running git");
        let output = cmd
            .output()
            .await
            .with_context(|| format!("failed to run git {subcommand}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            bail!("git {subcommand} failed: {}", stderr.trim());
        }
        Ok(format!("{stdout}{stderr}"))
    }
}

impl Default for GitService {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcService for GitService {
    fn methods(set: &mut MethodSet<Self>) {
        set.with_params("Publish", Self::publish)
            .with_params("Checkout", Self::checkout)
            .with_params("Branches", Self::branches);
    }
}

/// Credentials for one git call.
enum GitAuth {
    Anonymous,
    Basic { header: String },
    SshKey(TempKey),
}

impl GitAuth {
    async fn prepare(target: &GitTarget) -> anyhow::Result<Self> {
        if is_http(&target.url) {
            if target.user.is_empty() || target.password.is_empty() {
                return Ok(Self::Anonymous);
            }
            return Ok(Self::Basic {
                header: basic_auth_header(&target.user, &target.password),
            });
        }
        if target.sshkey.is_empty() {
            return Ok(Self::Anonymous);
        }
        if !target.sshkeysalt.is_empty() {
            bail!("passphrase-protected ssh keys are not supported");
        }
        Ok(Self::SshKey(TempKey::write(&target.sshkey).await?))
    }

    /// Environment entries are readable only by the agent's own user, unlike
    /// command-line arguments.
    fn apply(&self, cmd: &mut Command) {
        match self {
            Self::Anonymous => {}
            Self::Basic { header } => {
                cmd.env("GIT_CONFIG_COUNT", "1")
                    .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                    .env("GIT_CONFIG_VALUE_0", header);
            }
            Self::SshKey(key) => {
                cmd.env(
                    "GIT_SSH_COMMAND",
                    format!(
                        "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=no",
                        key.path.display()
                    ),
                );
            }
        }
    }
}

/// Private key written to a temporary file, removed on drop.
struct TempKey {
    path: PathBuf,
}

impl TempKey {
    async fn write(key: &str) -> anyhow::Result<Self> {
        let path = std::env::temp_dir().join(format!("agentx-key-{}", uuid::Uuid::new_v4()));
        let mut contents = key.to_string();
        if !contents.ends_with('\n') {
            contents.push('\n');
        }
        tokio::fs::write(&path, contents)
            .await
            .context("failed to write ssh key")?;
        let guard = Self { path };
        restrict_permissions(&guard.path).await?;
        Ok(guard)
    }
}

impl Drop for TempKey {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .context("failed to restrict ssh key permissions")
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

fn validate(target: &GitTarget) -> anyhow::Result<()> {
    let problem = if target.path.is_empty() {
        Some("path required")
    } else if target.url.is_empty() {
        Some("url required")
    } else if is_http(&target.url) {
        (target.user.is_empty() != target.password.is_empty())
            .then_some("user and password required")
    } else if target.sshkey.is_empty() {
        Some("sshkey required")
    } else {
        None
    };
    match problem {
        Some(problem) => bail!("config error: {problem}"),
        None => Ok(()),
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn basic_auth_header(user: &str, password: &str) -> String {
    format!(
        "Authorization: Basic {}",
        STANDARD.encode(format!("{user}:{password}"))
    )
}

/// A missing directory counts as empty.
async fn is_empty_dir(path: &Path) -> anyhow::Result<bool> {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_none()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(err) => Err(err).with_context(|| format!("cannot read {}", path.display())),
    }
}

/// Picks the first non-local ref whose name ends in `/<branch>` from
/// `for-each-ref --format='%(objectname) %(refname)'` output.
fn find_reference<'a>(listing: &'a str, branch: &str) -> Option<(&'a str, &'a str)> {
    if branch.is_empty() {
        return None;
    }
    let suffix = format!("/{branch}");
    listing
        .lines()
        .filter_map(|line| line.trim().split_once(' '))
        .find(|(_, reference)| !reference.starts_with("refs/heads/") && reference.ends_with(&suffix))
}

fn branch_name(reference: &str) -> String {
    let base = reference.rsplit('/').next().unwrap_or(reference);
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LEN)
        .collect();
    format!("{BRANCH_PREFIX}{base}-{suffix}")
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
