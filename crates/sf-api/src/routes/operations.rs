use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sf_fleet::model::DEFAULT_SSH_PORT;
use sf_fleet::restart::{reload_command, restart_command, restart_servers, validate_service_name};
use sf_fleet::ssh::{Credential, SshTarget};
use sf_fleet::validation::ValidationError;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/restart-server", post(restart_server))
        .route("/reload-server", post(reload_server))
        .route("/restart-nimble", post(restart_many))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRequest {
    #[serde(default)]
    server_id: String,
    #[serde(default)]
    ip_address: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    ssh_username: String,
    #[serde(default)]
    ssh_password: Option<String>,
    #[serde(default)]
    service_name: Option<String>,
}

impl ServiceRequest {
    fn service_name<'a>(&'a self, state: &'a ApiState) -> &'a str {
        self.service_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&state.env.service_name)
    }

    /// Connection fields come from the request when it carries a password.
    /// Without one, the stored server's target is used and the request must
    /// name that same host, user and port.
    async fn target(&self, state: &ApiState) -> ApiResult<SshTarget> {
        for (field, value) in [
            ("serverId", &self.server_id),
            ("ipAddress", &self.ip_address),
            ("sshUsername", &self.ssh_username),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::required(field).into());
            }
        }

        let target = match self.ssh_password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => SshTarget {
                host: self.ip_address.trim().to_string(),
                port: self.port.unwrap_or(DEFAULT_SSH_PORT),
                username: self.ssh_username.trim().to_string(),
                credential: Credential::Password(password.to_string()),
            },
            None => {
                let stored = state
                    .servers
                    .get(&self.server_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Server not found"))?;
                let mismatch = self.ip_address.trim() != stored.ip_address
                    || self.ssh_username.trim() != stored.ssh_username
                    || self.port.is_some_and(|p| p != stored.port);
                if mismatch {
                    warn!(
                        "Refusing stored credentials of {} for {}@{}",
                        stored.display_name, self.ssh_username, self.ip_address
                    );
                    return Err(ApiError::BadRequest(
                        "Connection details do not match the stored server; provide sshPassword".to_string(),
                    ));
                }
                stored.ssh_target()
            }
        };

        target
            .validate()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(target)
    }
}

async fn run_on_one(state: &ApiState, req: &ServiceRequest, command: String, verb: &str) -> ApiResult<Json<Value>> {
    let target = req.target(state).await?;
    let out = state.executor.execute(&target, &command).await?;
    info!("{} on {} (server {})", command, target.host, req.server_id);

    Ok(Json(json!({
        "success": true,
        "message": format!("{} executed successfully on {}", verb, target.host),
        "output": out.stdout.trim(),
    })))
}

async fn restart_server(
    State(state): State<ApiState>,
    payload: Result<Json<ServiceRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let service = req.service_name(&state);
    validate_service_name(service)?;
    run_on_one(&state, &req, restart_command(service), "Restart").await
}

async fn reload_server(
    State(state): State<ApiState>,
    payload: Result<Json<ServiceRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let service = req.service_name(&state);
    validate_service_name(service)?;
    run_on_one(&state, &req, reload_command(service), "Reload").await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestartManyRequest {
    #[serde(default)]
    server_ids: Vec<String>,
    #[serde(default)]
    service_name: Option<String>,
}

/// Restart the service on every selected server and report per server.
async fn restart_many(
    State(state): State<ApiState>,
    payload: Result<Json<RestartManyRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    if req.server_ids.is_empty() {
        return Err(ApiError::BadRequest("No servers selected".to_string()));
    }

    let service = req
        .service_name
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.env.service_name.clone());

    // Keep the caller's order; unknown and repeated ids are dropped.
    let stored = state.servers.list().await?;
    let mut seen = HashSet::new();
    let selected: Vec<_> = req
        .server_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| stored.iter().find(|s| &s.id == id).cloned())
        .collect();
    if selected.is_empty() {
        return Err(ApiError::not_found("No matching servers found"));
    }

    let results = restart_servers(state.executor.clone(), selected, &service).await?;
    let succeeded = results.iter().filter(|r| r.success).count();
    info!("Restart of {}: {}/{} succeeded", service, succeeded, results.len());

    Ok(Json(json!({
        "success": true,
        "message": format!("Restart completed on {} of {} servers", succeeded, results.len()),
        "results": results,
    })))
}
