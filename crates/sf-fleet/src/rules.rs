use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sf_common::config::EnvConfig;
use sf_common::error::AppError;
use thiserror::Error;
use tracing::info;

use crate::config_writer::shell_quote;
use crate::model::Route;
use crate::ssh::{CommandExecutor, Credential, SshError, SshTarget};

#[derive(Debug, Error)]
pub enum RulesError {
    #[error(transparent)]
    Remote(#[from] SshError),

    #[error("Failed to parse configuration file: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        raw: String,
    },
}

/// Content of the streaming server's rules file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesDocument {
    #[serde(rename = "SyncResponse", default)]
    pub sync_response: SyncResponse,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(rename = "Routes", default)]
    pub routes: Vec<Route>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RulesDocument {
    pub fn routes(&self) -> &[Route] {
        &self.sync_response.routes
    }
}

/// Where the rules file lives.
#[derive(Debug, Clone)]
pub struct RulesSource {
    pub target: SshTarget,
    pub path: String,
}

impl RulesSource {
    pub fn from_config(config: &EnvConfig) -> Result<Self, AppError> {
        let host = config
            .rules_host
            .clone()
            .ok_or_else(|| AppError::Config("SF_RULES_HOST is not set".to_string()))?;
        let username = config
            .rules_user
            .clone()
            .ok_or_else(|| AppError::Config("SF_RULES_USER is not set".to_string()))?;
        let password = config
            .rules_password
            .clone()
            .ok_or_else(|| AppError::Config("SF_RULES_PASSWORD is not set".to_string()))?;

        Ok(Self {
            target: SshTarget {
                host,
                port: config.rules_port,
                username,
                credential: Credential::Password(password),
            },
            path: config.rules_path.clone(),
        })
    }
}

/// Parse the rules file. Header lines before the first `{` line are skipped.
pub fn parse_rules(raw: &str) -> Result<RulesDocument, RulesError> {
    let body: String = raw
        .lines()
        .skip_while(|line| !line.trim_start().starts_with('{'))
        .collect::<Vec<_>>()
        .join("\n");

    serde_json::from_str(&body).map_err(|source| RulesError::Parse {
        source,
        raw: raw.to_string(),
    })
}

pub async fn fetch_rules(
    executor: &dyn CommandExecutor,
    source: &RulesSource,
) -> Result<RulesDocument, RulesError> {
    let out = executor
        .execute(&source.target, &format!("cat {}", shell_quote(&source.path)))
        .await?;
    let doc = parse_rules(&out.stdout)?;
    info!("Loaded {} route(s) from {}:{}", doc.routes().len(), source.target.host, source.path);
    Ok(doc)
}
