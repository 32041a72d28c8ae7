use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::model::Server;
use crate::ssh::{CommandExecutor, SshError};

#[derive(Debug, Error)]
pub enum ConfigWriteError {
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Remote(#[from] SshError),
}

/// Wrap `value` in single quotes for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Shell command that writes `content` to `path`, creating parent directories.
pub fn write_command(path: &str, content: &str) -> String {
    let path = shell_quote(path);
    format!(
        "mkdir -p \"$(dirname {path})\" && printf '%s\\n' {} > {path}",
        shell_quote(content)
    )
}

/// Pushes JSON config files to servers and reloads the streaming service.
///
/// Write and reload are two separate commands. If the write fails the reload
/// is skipped; if the reload fails the new file stays in place.
#[derive(Clone)]
pub struct ConfigWriter {
    executor: Arc<dyn CommandExecutor>,
    reload_command: String,
}

impl ConfigWriter {
    pub fn new(executor: Arc<dyn CommandExecutor>, reload_command: impl Into<String>) -> Self {
        Self {
            executor,
            reload_command: reload_command.into(),
        }
    }

    pub async fn write_config<T>(&self, server: &Server, path: &str, content: &T) -> Result<(), ConfigWriteError>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string_pretty(content)?;
        self.executor
            .execute(&server.ssh_target(), &write_command(path, &json))
            .await?;
        info!("Wrote {} on {}", path, server.display_name);
        Ok(())
    }

    pub async fn reload(&self, server: &Server) -> Result<(), ConfigWriteError> {
        self.executor
            .execute(&server.ssh_target(), &self.reload_command)
            .await?;
        info!("Reloaded service on {}", server.display_name);
        Ok(())
    }

    pub async fn write_and_reload<T>(&self, server: &Server, path: &str, content: &T) -> Result<(), ConfigWriteError>
    where
        T: Serialize + ?Sized,
    {
        self.write_config(server, path, content).await?;
        self.reload(server).await
    }

    pub async fn remove_config_and_reload(&self, server: &Server, path: &str) -> Result<(), ConfigWriteError> {
        self.executor
            .execute(&server.ssh_target(), &format!("rm -f {}", shell_quote(path)))
            .await?;
        info!("Removed {} on {}", path, server.display_name);
        self.reload(server).await
    }
}
