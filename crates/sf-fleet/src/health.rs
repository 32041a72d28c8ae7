use serde::Serialize;
use tracing::{debug, info};

use crate::model::{Server, ServerStatus};
use crate::ssh::CommandExecutor;
use crate::store::{JsonStore, StoreError};

/// Disk usage of the root filesystem; any answer proves the host is up.
pub const HEALTH_COMMAND: &str = "df -h / | tail -1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealth {
    pub status: ServerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_checked: String,
}

/// Probe one server. Never fails: problems are reported in the result.
pub async fn probe(executor: &dyn CommandExecutor, server: &Server) -> ServerHealth {
    let result = executor.execute(&server.ssh_target(), HEALTH_COMMAND).await;
    let last_checked = chrono::Utc::now().to_rfc3339();

    match result {
        Ok(out) => ServerHealth {
            status: ServerStatus::Online,
            disk_space: Some(out.stdout.trim().to_string()),
            error: None,
            last_checked,
        },
        Err(e) => ServerHealth {
            status: if e.is_connection_error() {
                ServerStatus::Offline
            } else {
                ServerStatus::Error
            },
            disk_space: None,
            error: Some(e.to_string()),
            last_checked,
        },
    }
}

/// Probe the server with `id` and persist its new status.
///
/// Returns `Ok(None)` when no such server exists.
pub async fn check_and_record(
    executor: &dyn CommandExecutor,
    store: &JsonStore<Server>,
    id: &str,
) -> Result<Option<ServerHealth>, StoreError> {
    let Some(server) = store.get(id).await? else {
        return Ok(None);
    };

    let health = probe(executor, &server).await;
    if server.status != Some(health.status) {
        debug!("{}: {:?} -> {:?}", server.display_name, server.status, health.status);
    }

    let recorded = store
        .update(id, |s| {
            s.status = Some(health.status);
            s.last_checked = Some(health.last_checked.clone());
        })
        .await?;
    if recorded.is_none() {
        // deleted while the probe was running
        return Ok(None);
    }

    info!("Health check {}: {:?}", server.display_name, health.status);
    Ok(Some(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServerType;
    use crate::ssh::mock::MockExecutor;
    use crate::ssh::{CommandOutput, SshError};
    use tempfile::tempdir;

    fn server(id: &str, ip: &str) -> Server {
        Server {
            id: id.to_string(),
            display_name: format!("server {id}"),
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

    fn scripted() -> MockExecutor {
        MockExecutor::new(|target, _| match target.host.as_str() {
            "10.0.0.1" => Ok(CommandOutput::stdout("/dev/sda1  40G  12G  28G  30% /\n")),
            "10.0.0.2" => Err(SshError::Timeout {
                host: target.host.clone(),
            }),
            _ => Err(SshError::Command {
                host: target.host.clone(),
                stderr: "df: /: Permission denied".into(),
            }),
        })
    }

    #[tokio::test]
    async fn test_probe_statuses() {
        let exec = scripted();

        let up = probe(&exec, &server("a", "10.0.0.1")).await;
        assert_eq!(up.status, ServerStatus::Online);
        assert_eq!(up.disk_space.as_deref(), Some("/dev/sda1  40G  12G  28G  30% /"));

        let down = probe(&exec, &server("b", "10.0.0.2")).await;
        assert_eq!(down.status, ServerStatus::Offline);
        assert!(down.error.is_some());

        let broken = probe(&exec, &server("c", "10.0.0.3")).await;
        assert_eq!(broken.status, ServerStatus::Error);
        assert_eq!(exec.commands(), vec![HEALTH_COMMAND; 3]);
    }

    #[tokio::test]
    async fn test_check_and_record_updates_store() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("servers.json"));
        store.save(server("a", "10.0.0.1")).await.unwrap();
        store.save(server("b", "10.0.0.2")).await.unwrap();
        let exec = scripted();

        let health = check_and_record(&exec, &store, "b").await.unwrap().unwrap();
        assert_eq!(health.status, ServerStatus::Offline);

        let stored = store.get("b").await.unwrap().unwrap();
        assert_eq!(stored.status, Some(ServerStatus::Offline));
        assert_eq!(stored.last_checked.as_deref(), Some(health.last_checked.as_str()));
        assert!(store.get("a").await.unwrap().unwrap().status.is_none());

        assert!(check_and_record(&exec, &store, "zzz").await.unwrap().is_none());
    }
}
