//! One-shot remote command execution.
//!
//! Every call opens its own session, runs a single command and closes the
//! session again. Nothing is pooled and nothing is retried: a failure stays
//! with the host that produced it.

mod client;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::SshExecutor;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// How to authenticate against the remote host.
#[derive(Clone)]
pub enum Credential {
    Password(String),
    KeyFile(PathBuf),
}

impl Credential {
    fn is_empty(&self) -> bool {
        match self {
            Credential::Password(p) => p.is_empty(),
            Credential::KeyFile(path) => path.as_os_str().is_empty(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(***)"),
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

/// Where and as whom a command runs.
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
}

impl SshTarget {
    pub fn validate(&self) -> Result<(), SshError> {
        if self.host.trim().is_empty() {
            return Err(SshError::InvalidTarget("host"));
        }
        if self.port == 0 {
            return Err(SshError::InvalidTarget("port"));
        }
        if self.username.trim().is_empty() {
            return Err(SshError::InvalidTarget("username"));
        }
        if self.credential.is_empty() {
            return Err(SshError::InvalidTarget("credential"));
        }
        Ok(())
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SshError {
    #[error("invalid SSH target: {0} is required")]
    InvalidTarget(&'static str),

    #[error("SSH connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    #[error("SSH authentication failed for {user}@{host}")]
    Auth { host: String, user: String },

    #[error("SSH connection to {host} timed out")]
    Timeout { host: String },

    #[error("{stderr}")]
    Command { host: String, stderr: String },
}

impl SshError {
    /// True for failures that happened before the command could run.
    pub fn is_connection_error(&self) -> bool {
        !matches!(self, SshError::Command { .. })
    }
}

/// Runs one command on one host.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, target: &SshTarget, command: &str) -> Result<CommandOutput, SshError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> SshTarget {
        SshTarget {
            host: "10.0.0.5".to_string(),
            port: 22,
            username: "streamer".to_string(),
            credential: Credential::Password("Secret123".to_string()),
        }
    }

    #[test]
    fn test_validate_target() {
        assert!(target().validate().is_ok());

        let mut t = target();
        t.host = " ".to_string();
        assert_eq!(t.validate(), Err(SshError::InvalidTarget("host")));

        let mut t = target();
        t.credential = Credential::Password(String::new());
        assert_eq!(t.validate(), Err(SshError::InvalidTarget("credential")));

        let mut t = target();
        t.port = 0;
        assert_eq!(t.validate(), Err(SshError::InvalidTarget("port")));
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", target());
        assert!(!rendered.contains("Secret123"));
        assert_eq!(target().to_string(), "streamer@10.0.0.5:22");
    }

    #[test]
    fn test_connection_error_kinds() {
        let timeout = SshError::Timeout { host: "h".into() };
        let command = SshError::Command {
            host: "h".into(),
            stderr: "Failed to restart nimble.service".into(),
        };
        assert!(timeout.is_connection_error());
        assert!(!command.is_connection_error());
        assert_eq!(command.to_string(), "Failed to restart nimble.service");
    }
}
