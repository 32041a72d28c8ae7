//! Routes pushed directly to one server's `routes.d` directory.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sf_fleet::model::{Route, Server};
use sf_fleet::store::new_id;
use sf_fleet::validation::{ConsistencyError, ValidationError};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

pub fn router() -> Router<ApiState> {
    Router::new().route("/routes", get(list_routes).post(push_route).delete(remove_route))
}

fn route_file(state: &ApiState, route_id: &str) -> String {
    format!("{}/{}.conf", state.env.route_config_dir, route_id)
}

async fn find_server(state: &ApiState, id: &str) -> ApiResult<Server> {
    state
        .servers
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Server not found"))
}

async fn list_routes(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let routes = state.routes.list().await?;
    Ok(Json(json!({"success": true, "data": routes})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushRouteRequest {
    #[serde(default)]
    server_id: String,
    route: Option<Route>,
}

async fn push_route(
    State(state): State<ApiState>,
    payload: Result<Json<PushRouteRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    if body.server_id.is_empty() {
        return Err(ValidationError::new("serverId", "Server ID is required").into());
    }
    let mut route = body
        .route
        .ok_or_else(|| ValidationError::new("route", "Route configuration is required"))?;
    let server = find_server(&state, &body.server_id).await?;

    for (field, value) in [
        ("path", &route.path),
        ("origin", &route.origin),
        ("origin_path", &route.origin_path),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::required(field).into());
        }
    }

    let origin_ip = server.origin_ip();
    if !route.origin.contains(origin_ip) {
        return Err(ConsistencyError::OriginIpMismatch {
            server: server.display_name.clone(),
            origin_ip: origin_ip.to_string(),
            route_origin: route.origin.clone(),
        }
        .into());
    }

    route.id = new_id();
    let route = state.routes.save(route).await?;

    let remote = json!({
        "path": route.path,
        "origin": route.origin,
        "origin_path": route.origin_path,
        "use_ssl": route.use_ssl,
        "playlist_caching_interval": route.playlist_caching_interval,
    });
    state
        .config_writer
        .write_and_reload(&server, &route_file(&state, &route.id), &remote)
        .await?;

    info!("Route {} pushed to {}", route.path, server.display_name);
    Ok(Json(json!({"success": true, "data": route})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveRouteQuery {
    server_id: Option<String>,
    route_id: Option<String>,
}

async fn remove_route(
    State(state): State<ApiState>,
    Query(query): Query<RemoveRouteQuery>,
) -> ApiResult<Json<Value>> {
    let (Some(server_id), Some(route_id)) = (query.server_id, query.route_id) else {
        return Err(ApiError::BadRequest(
            "Server ID and Route ID are required".to_string(),
        ));
    };
    let server = find_server(&state, &server_id).await?;
    // Only ids we handed out ever reach the remote path.
    if state.routes.get(&route_id).await?.is_none() {
        return Err(ApiError::not_found("Route not found"));
    }

    state
        .config_writer
        .remove_config_and_reload(&server, &route_file(&state, &route_id))
        .await?;
    state.routes.delete(&route_id).await?;

    info!("Route {} removed from {}", route_id, server.display_name);
    Ok(Json(json!({"success": true})))
}
