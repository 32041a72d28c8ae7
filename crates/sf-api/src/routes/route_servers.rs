use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sf_fleet::model::AssignmentDraft;
use sf_fleet::store::new_id;
use sf_fleet::validation::{check_draft, validate_assignment};
use tracing::{info, warn};

use super::rules::load_rules;
use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/", get(list_assignments).post(save_assignment).delete(delete_by_query))
        .route("/{id}", get(get_assignment).delete(delete_by_path))
}

async fn list_assignments(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let assignments = state.assignments.list().await?;
    Ok(Json(json!({"success": true, "data": assignments})))
}

async fn get_assignment(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let assignment = state
        .assignments
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Assignment not found"))?;
    Ok(Json(json!({"success": true, "data": assignment})))
}

/// Validate against the live rules file and known servers, then upsert.
async fn save_assignment(
    State(state): State<ApiState>,
    payload: Result<Json<AssignmentDraft>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(draft) = payload?;
    check_draft(&draft)?;

    let rules = load_rules(&state).await?;
    let servers = state.servers.list().await?;
    let mut assignment = validate_assignment(&draft, rules.routes(), &servers).map_err(|e| {
        warn!("Rejected assignment for {:?}: {}", draft.from, e);
        e
    })?;

    if assignment.id.is_empty() {
        assignment.id = new_id();
    }
    let assignment = state.assignments.save(assignment).await?;
    info!(
        "Assignment {} saved: {} -> {} server(s)",
        assignment.id,
        assignment.from,
        assignment.servers.len()
    );
    Ok(Json(json!({"success": true, "data": assignment})))
}

#[derive(Deserialize)]
struct DeleteQuery {
    id: Option<String>,
}

async fn delete_by_query(
    state: State<ApiState>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<Value>> {
    match query.id.filter(|id| !id.is_empty()) {
        Some(id) => delete_by_path(state, Path(id)).await,
        None => Err(ApiError::BadRequest("Assignment ID is required".to_string())),
    }
}

async fn delete_by_path(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    if !state.assignments.delete(&id).await? {
        return Err(ApiError::not_found("Assignment not found"));
    }
    info!("Assignment {} deleted", id);
    Ok(Json(json!({"success": true})))
}
