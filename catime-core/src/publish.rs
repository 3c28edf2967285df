//! Conflict-retried publishing of catalog state.
//!
//! The catalog lives in a shared versioned store written by one CI job at a
//! time, but jobs can overlap. Publishing is optimistic: commit, push, and
//! on rejection pull-with-rebase and push again, at most
//! [`MAX_PUSH_ATTEMPTS`] times. Exhausting the bound is fatal so an entry
//! is never silently dropped.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{info, warn};

/// Upper bound on push attempts before a publish fails loudly.
pub const MAX_PUSH_ATTEMPTS: u32 = 3;

/// Errors from publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("push rejected after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Outcome of a single push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// The remote advanced underneath us; rebase and retry.
    Rejected,
}

/// Transport to the shared versioned store holding the catalog.
pub trait Remote {
    /// Record the given paths as one durable change.
    fn commit(&mut self, paths: &[PathBuf], message: &str) -> Result<(), PublishError>;

    /// Attempt to publish the recorded change.
    fn push(&mut self) -> Result<PushOutcome, PublishError>;

    /// Replay the local change on top of the advanced remote state.
    fn pull_rebase(&mut self) -> Result<(), PublishError>;
}

/// Commit and push, rebasing and retrying on rejection.
pub fn publish_with_retry<R: Remote>(
    remote: &mut R,
    paths: &[PathBuf],
    message: &str,
) -> Result<(), PublishError> {
    remote.commit(paths, message)?;

    for attempt in 1..=MAX_PUSH_ATTEMPTS {
        match remote.push()? {
            PushOutcome::Accepted => {
                info!(attempt, "published");
                return Ok(());
            }
            PushOutcome::Rejected => {
                warn!(attempt, "push rejected, rebasing");
                remote.pull_rebase()?;
            }
        }
    }

    Err(PublishError::RetriesExhausted {
        attempts: MAX_PUSH_ATTEMPTS,
    })
}

/// Git-backed remote, shelling out the way the CI environment does.
pub struct GitRemote {
    repo_dir: PathBuf,
    identity: Option<(String, String)>,
}

impl GitRemote {
    pub fn new(repo_dir: impl AsRef<Path>) -> Self {
        Self {
            repo_dir: repo_dir.as_ref().to_path_buf(),
            identity: None,
        }
    }

    /// Set the committer identity (CI environments have none configured).
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output, PublishError> {
        Command::new("git")
            .current_dir(&self.repo_dir)
            .args(args)
            .output()
            .map_err(PublishError::from)
    }

    /// Run git, treating a non-zero exit as an error.
    fn git_ok(&self, args: &[&str]) -> Result<(), PublishError> {
        let output = self.git(args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(PublishError::Command {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Remote for GitRemote {
    fn commit(&mut self, paths: &[PathBuf], message: &str) -> Result<(), PublishError> {
        if let Some((name, email)) = &self.identity {
            self.git_ok(&["config", "user.name", name])?;
            self.git_ok(&["config", "user.email", email])?;
        }

        let mut add = vec!["add".to_string()];
        add.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        let add_args: Vec<&str> = add.iter().map(String::as_str).collect();
        self.git_ok(&add_args)?;

        self.git_ok(&["commit", "-m", message])
    }

    fn push(&mut self) -> Result<PushOutcome, PublishError> {
        // Any push failure is treated as a conflict: the caller rebases and
        // retries, and persistent failures surface as exhausted retries.
        let output = self.git(&["push"])?;
        if output.status.success() {
            Ok(PushOutcome::Accepted)
        } else {
            Ok(PushOutcome::Rejected)
        }
    }

    fn pull_rebase(&mut self) -> Result<(), PublishError> {
        self.git_ok(&["pull", "--rebase"])
    }
}
