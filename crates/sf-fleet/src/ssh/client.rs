use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

use super::{CommandExecutor, CommandOutput, Credential, SshError, SshTarget};

/// Exit status the OpenSSH client uses for its own failures.
const SSH_CLIENT_FAILURE: i32 = 255;
/// `sshpass` exit status for a rejected password.
const SSHPASS_BAD_PASSWORD: i32 = 5;
/// `sshpass` exit status for an unknown host key.
const SSHPASS_HOST_KEY: i32 = 6;

/// Executor backed by the system `ssh` client (`sshpass` for passwords).
#[derive(Debug, Clone)]
pub struct SshExecutor {
    ready_timeout: Duration,
}

impl SshExecutor {
    pub fn new(ready_timeout: Duration) -> Self {
        Self { ready_timeout }
    }

    /// Program, arguments and optional environment for one invocation.
    fn invocation(&self, target: &SshTarget, command: &str) -> Invocation {
        // ConnectTimeout only accepts whole seconds
        let connect_timeout = self.ready_timeout.as_secs().max(1);

        let mut ssh_args: Vec<String> = vec![
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            "LogLevel=ERROR".into(),
            "-o".into(),
            format!("ConnectTimeout={}", connect_timeout),
            "-o".into(),
            "NumberOfPasswordPrompts=1".into(),
        ];

        match &target.credential {
            Credential::Password(password) => {
                let mut args = vec!["-e".to_string(), "ssh".to_string()];
                args.append(&mut ssh_args);
                args.extend([
                    "-p".to_string(),
                    target.port.to_string(),
                    format!("{}@{}", target.username, target.host),
                    command.to_string(),
                ]);
                Invocation {
                    program: "sshpass",
                    args,
                    password: Some(password.clone()),
                }
            }
            Credential::KeyFile(key) => {
                let mut args = vec!["-i".to_string(), key.display().to_string()];
                args.append(&mut ssh_args);
                args.extend([
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                    "-p".to_string(),
                    target.port.to_string(),
                    format!("{}@{}", target.username, target.host),
                    command.to_string(),
                ]);
                Invocation {
                    program: "ssh",
                    args,
                    password: None,
                }
            }
        }
    }
}

struct Invocation {
    program: &'static str,
    args: Vec<String>,
    password: Option<String>,
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    async fn execute(&self, target: &SshTarget, command: &str) -> Result<CommandOutput, SshError> {
        target.validate()?;

        let invocation = self.invocation(target, command);
        debug!("[ssh] {} connecting", target);

        let mut cmd = tokio::process::Command::new(invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(password) = &invocation.password {
            cmd.env("SSHPASS", password);
        }

        let output = cmd.output().await.map_err(|e| SshError::Connection {
            host: target.host.clone(),
            reason: format!("cannot run {}: {}", invocation.program, e),
        })?;

        let result = classify(
            target,
            invocation.password.is_some(),
            output.status.code(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        );

        match &result {
            Ok(out) => debug!("[ssh] {} closed (exit {:?})", target, out.exit_code),
            Err(e) => debug!("[ssh] {} closed with error: {}", target, e),
        }
        result
    }
}

/// Turn a finished ssh process into a command result.
fn classify(
    target: &SshTarget,
    via_sshpass: bool,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
) -> Result<CommandOutput, SshError> {
    let host = target.host.clone();
    let reason = stderr.trim();

    let Some(code) = exit_code else {
        return Err(SshError::Connection {
            host,
            reason: "ssh terminated by signal".to_string(),
        });
    };

    // sshpass passes the remote exit status through, and a remote command
    // may itself exit 5 (LSB "not installed"). Only a silent 5 or an ssh
    // denial is a rejected password.
    if via_sshpass
        && code == SSHPASS_BAD_PASSWORD
        && (reason.is_empty() || reason.contains("Permission denied"))
    {
        return Err(SshError::Auth {
            host,
            user: target.username.clone(),
        });
    }
    if via_sshpass && code == SSHPASS_HOST_KEY {
        return Err(SshError::Connection {
            host,
            reason: "host key rejected".to_string(),
        });
    }

    if code == SSH_CLIENT_FAILURE {
        if reason.contains("Permission denied") {
            return Err(SshError::Auth {
                host,
                user: target.username.clone(),
            });
        }
        if reason.contains("timed out") {
            return Err(SshError::Timeout { host });
        }
        let reason = if reason.is_empty() {
            format!("ssh exited with status {}", code)
        } else {
            reason.to_string()
        };
        return Err(SshError::Connection { host, reason });
    }

    if !reason.is_empty() {
        return Err(SshError::Command {
            host,
            stderr: reason.to_string(),
        });
    }

    Ok(CommandOutput {
        stdout,
        stderr,
        exit_code: Some(code),
    })
}
