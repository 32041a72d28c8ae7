use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sf_fleet::health::check_and_record;
use sf_fleet::servers::ServerInput;
use sf_fleet::store::new_id;
use sf_fleet::topology::{check_parent_chain, children_of};
use sf_fleet::validation::ValidationError;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/", get(list_servers).post(add_server))
        .route("/health", get(health_by_query))
        .route("/{id}", get(get_server).put(update_server).delete(delete_server))
        .route("/{id}/health", post(check_health))
        .merge(super::server_routes::router())
}

async fn list_servers(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let servers: Vec<_> = state.servers.list().await?.iter().map(|s| s.redacted()).collect();
    Ok(Json(json!({"success": true, "data": servers})))
}

async fn get_server(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let server = state
        .servers
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Server not found"))?;
    Ok(Json(json!({"success": true, "data": server.redacted()})))
}

async fn add_server(
    State(state): State<ApiState>,
    payload: Result<Json<ServerInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(input) = payload?;
    input.validate(true)?;

    let server = input.into_server(new_id(), chrono::Utc::now().to_rfc3339());
    check_parent_chain(&server, &state.servers.list().await?)?;

    let server = state.servers.save(server).await?;
    info!("Server {} registered ({})", server.display_name, server.ip_address);
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "data": server.redacted()})),
    ))
}

async fn update_server(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<ServerInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let servers = state.servers.list().await?;
    let existing = servers
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| ApiError::not_found("Server not found"))?;

    input.validate(false)?;
    let server = input.apply_to(existing);
    check_parent_chain(&server, &servers)?;

    let server = state.servers.save(server).await?;
    info!("Server {} updated", server.display_name);
    Ok(Json(json!({"success": true, "data": server.redacted()})))
}

async fn delete_server(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let servers = state.servers.list().await?;
    let children = children_of(&id, &servers);
    if !children.is_empty() {
        let names: Vec<&str> = children.iter().map(|s| s.display_name.as_str()).collect();
        return Err(ApiError::Conflict(format!(
            "Server is the parent of: {}",
            names.join(", ")
        )));
    }

    if !state.servers.delete(&id).await? {
        return Err(ApiError::not_found("Server not found"));
    }
    info!("Server {} deleted", id);
    Ok(Json(json!({"success": true})))
}

async fn check_health(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let health = check_and_record(state.executor.as_ref(), &state.servers, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Server not found"))?;
    Ok(Json(json!({"success": true, "data": health})))
}

#[derive(Deserialize)]
struct HealthQuery {
    id: Option<String>,
}

async fn health_by_query(
    state: State<ApiState>,
    Query(query): Query<HealthQuery>,
) -> ApiResult<Json<Value>> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ValidationError::new("id", "Server ID is required"))?;
    check_health(state, Path(id)).await
}
