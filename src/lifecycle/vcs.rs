use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use crate::config::loader::VcsConfig;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("{0:?} is not a git repository")]
    NotARepository(PathBuf),

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsOutcome {
    /// False when the working tree had nothing new to commit.
    pub committed: bool,
    pub upstream_set: bool,
}

#[async_trait]
pub trait VcsClient: Send + Sync {
    async fn commit_and_push(&self, repo: &Path) -> Result<VcsOutcome, VcsError>;
}

pub struct GitClient {
    remote: String,
    commit_message: String,
}

struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl GitClient {
    pub fn new(remote: impl Into<String>, commit_message: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            commit_message: commit_message.into(),
        }
    }

    pub fn from_config(config: &VcsConfig) -> Self {
        Self::new(&config.remote, &config.commit_message)
    }

    async fn git(&self, repo: &Path, args: &[&str]) -> Result<GitOutput, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo)
            .output()
            .await?;
        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn git_checked(&self, repo: &Path, args: &[&str]) -> Result<GitOutput, VcsError> {
        let output = self.git(repo, args).await?;
        if !output.success {
            return Err(VcsError::CommandFailed {
                command: args.join(" "),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    async fn current_branch(&self, repo: &Path) -> Result<String, VcsError> {
        let output = self
            .git_checked(repo, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}

#[async_trait]
impl VcsClient for GitClient {
    async fn commit_and_push(&self, repo: &Path) -> Result<VcsOutcome, VcsError> {
        if !repo.join(".git").exists() {
            return Err(VcsError::NotARepository(repo.to_path_buf()));
        }

        let mut outcome = VcsOutcome::default();

        self.git_checked(repo, &["add", "-A"]).await?;

        let commit = self
            .git(repo, &["commit", "-m", &self.commit_message])
            .await?;
        if commit.success {
            outcome.committed = true;
        } else if !nothing_to_commit(&commit.stdout, &commit.stderr) {
            return Err(VcsError::CommandFailed {
                command: "commit".to_string(),
                stderr: commit.stderr.trim().to_string(),
            });
        }

        let push = self.git(repo, &["push"]).await?;
        if push.success {
            return Ok(outcome);
        }
        if !needs_upstream(&push.stderr) {
            return Err(VcsError::CommandFailed {
                command: "push".to_string(),
                stderr: push.stderr.trim().to_string(),
            });
        }

        let branch = self.current_branch(repo).await?;
        tracing::info!(
            "No upstream for {}, retrying with --set-upstream {}",
            branch,
            self.remote
        );
        self.git_checked(repo, &["push", "--set-upstream", &self.remote, &branch])
            .await?;
        outcome.upstream_set = true;
        Ok(outcome)
    }
}

fn nothing_to_commit(stdout: &str, stderr: &str) -> bool {
    [stdout, stderr]
        .iter()
        .any(|s| s.contains("nothing to commit") || s.contains("nothing added to commit"))
}

fn needs_upstream(stderr: &str) -> bool {
    stderr.contains("has no upstream branch") || stderr.contains("--set-upstream")
}
