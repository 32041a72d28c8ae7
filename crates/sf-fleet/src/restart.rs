use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::model::Server;
use crate::ssh::{CommandExecutor, SshTarget};
use crate::validation::ValidationError;

/// Result of one remote service action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartOutcome {
    pub server_id: String,
    pub display_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestartOutcome {
    fn failed(server_id: &str, display_name: &str, error: impl Into<String>) -> Self {
        Self {
            server_id: server_id.to_string(),
            display_name: display_name.to_string(),
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Service names end up in a shell command line.
pub fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("serviceName", "Invalid service name"))
    }
}

pub fn restart_command(service: &str) -> String {
    format!("sudo service {} restart", service)
}

pub fn reload_command(service: &str) -> String {
    format!("sudo systemctl reload {}", service)
}

/// Run `command` on one target and fold the result into an outcome.
pub async fn run_service_command(
    executor: &dyn CommandExecutor,
    server_id: &str,
    display_name: &str,
    target: &SshTarget,
    command: &str,
) -> RestartOutcome {
    match executor.execute(target, command).await {
        Ok(out) => {
            info!("'{}' succeeded on {} ({})", command, display_name, target.host);
            let stdout = out.stdout.trim();
            let output = if stdout.is_empty() {
                format!("Command \"{}\" executed successfully on {}", command, target.host)
            } else {
                stdout.to_string()
            };
            RestartOutcome {
                server_id: server_id.to_string(),
                display_name: display_name.to_string(),
                success: true,
                output: Some(output),
                error: None,
            }
        }
        Err(e) => {
            warn!("'{}' failed on {} ({}): {}", command, display_name, target.host, e);
            RestartOutcome::failed(server_id, display_name, e.to_string())
        }
    }
}

/// Restart `service_name` on every server concurrently.
///
/// One failing host never stops the others. The call returns once every
/// server has settled, with exactly one outcome per server in input order.
pub async fn restart_servers(
    executor: Arc<dyn CommandExecutor>,
    servers: Vec<Server>,
    service_name: &str,
) -> Result<Vec<RestartOutcome>, ValidationError> {
    validate_service_name(service_name)?;
    let command = restart_command(service_name);
    info!("Restarting {} on {} server(s)", service_name, servers.len());

    let mut join_set = JoinSet::new();
    for (index, server) in servers.iter().cloned().enumerate() {
        let executor = executor.clone();
        let command = command.clone();
        join_set.spawn(async move {
            let outcome = run_service_command(
                executor.as_ref(),
                &server.id,
                &server.display_name,
                &server.ssh_target(),
                &command,
            )
            .await;
            (index, outcome)
        });
    }

    let mut results: Vec<Option<RestartOutcome>> = vec![None; servers.len()];
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, outcome)) => results[index] = Some(outcome),
            Err(e) => warn!("Restart task failed: {}", e),
        }
    }

    Ok(servers
        .iter()
        .zip(results)
        .map(|(server, outcome)| {
            outcome.unwrap_or_else(|| {
                RestartOutcome::failed(&server.id, &server.display_name, "restart task aborted")
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServerType;
    use crate::ssh::mock::MockExecutor;
    use crate::ssh::{CommandOutput, SshError};
    use std::time::Duration;

    fn server(id: &str, name: &str, ip: &str) -> Server {
        Server {
            id: id.to_string(),
            display_name: name.to_string(),
            ip_address: ip.to_string(),
            ssh_username: "streamer".to_string(),
            ssh_password: "Secret123".to_string(),
            port: 22,
            origin_ip_with_port: "10.0.0.5:1935".to_string(),
            created_at: String::new(),
            server_type: ServerType::Origin,
            parent_server_id: None,
            status: None,
            last_checked: None,
        }
    }

    #[test]
    fn test_service_name_rules() {
        assert!(validate_service_name("nimble").is_ok());
        assert!(validate_service_name("nimble@edge-1.service").is_ok());
        assert!(validate_service_name("").is_err());
        assert!(validate_service_name("nimble; rm -rf /").is_err());
        assert_eq!(restart_command("nimble"), "sudo service nimble restart");
        assert_eq!(reload_command("nimble"), "sudo systemctl reload nimble");
    }

    #[tokio::test]
    async fn test_partial_failures_are_attributed() {
        let mock = Arc::new(MockExecutor::new(|target, _| match target.host.as_str() {
            "10.1.0.2" => Err(SshError::Connection {
                host: target.host.clone(),
                reason: "No route to host".into(),
            }),
            "10.1.0.4" => Err(SshError::Timeout {
                host: target.host.clone(),
            }),
            _ => Ok(CommandOutput::default()),
        }));
        let servers = vec![
            server("a", "BSNL Vijayawada", "10.1.0.1"),
            server("b", "City Media Main CDN", "10.1.0.2"),
            server("c", "Ulka Test", "10.1.0.3"),
            server("d", "Rlitel Kolkata CDN", "10.1.0.4"),
        ];

        let results = restart_servers(mock.clone(), servers, "nimble").await.unwrap();

        assert_eq!(results.len(), 4);
        let names: Vec<&str> = results.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["BSNL Vijayawada", "City Media Main CDN", "Ulka Test", "Rlitel Kolkata CDN"]);
        let flags: Vec<bool> = results.iter().map(|r| r.success).collect();
        assert_eq!(flags, vec![true, false, true, false]);
        assert_eq!(results[1].error.as_deref(), Some("SSH connection to 10.1.0.2 failed: No route to host"));
        assert_eq!(
            results[0].output.as_deref(),
            Some("Command \"sudo service nimble restart\" executed successfully on 10.1.0.1")
        );

        assert_eq!(mock.calls().len(), 4);
        assert!(mock.commands().iter().all(|c| c == "sudo service nimble restart"));
    }

    #[tokio::test]
    async fn test_all_failures_still_return() {
        let mock = Arc::new(MockExecutor::new(|target, _| {
            Err(SshError::Auth {
                host: target.host.clone(),
                user: target.username.clone(),
            })
        }));
        let servers = vec![server("a", "A", "10.1.0.1"), server("b", "B", "10.1.0.2")];

        let results = restart_servers(mock, servers, "nimble").await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success && r.error.is_some()));
    }

    #[tokio::test]
    async fn test_bad_service_name_contacts_nobody() {
        let mock = Arc::new(MockExecutor::answering(""));
        let err = restart_servers(mock.clone(), vec![server("a", "A", "10.1.0.1")], "nimble && reboot")
            .await
            .unwrap_err();
        assert_eq!(err.field, "serviceName");
        assert!(mock.calls().is_empty());
    }

    struct SlowFirst;

    #[async_trait::async_trait]
    impl CommandExecutor for SlowFirst {
        async fn execute(&self, target: &SshTarget, _command: &str) -> Result<CommandOutput, SshError> {
            if target.host == "10.1.0.1" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(CommandOutput::stdout(format!("restarted {}", target.host)))
        }
    }

    #[tokio::test]
    async fn test_order_follows_input_not_completion() {
        let servers = vec![server("a", "A", "10.1.0.1"), server("b", "B", "10.1.0.2")];
        let results = restart_servers(Arc::new(SlowFirst), servers, "nimble").await.unwrap();
        assert_eq!(results[0].server_id, "a");
        assert_eq!(results[0].output.as_deref(), Some("restarted 10.1.0.1"));
        assert_eq!(results[1].server_id, "b");
    }
}
