use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use sf_fleet::rules::{fetch_rules, RulesDocument, RulesSource};

use crate::error::ApiResult;
use crate::state::ApiState;

pub fn router() -> Router<ApiState> {
    Router::new().route("/rules", get(get_rules))
}

/// Read and parse the rules file from the configured rules host.
pub(crate) async fn load_rules(state: &ApiState) -> ApiResult<RulesDocument> {
    let source = RulesSource::from_config(&state.env)?;
    Ok(fetch_rules(state.executor.as_ref(), &source).await?)
}

async fn get_rules(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let rules = load_rules(&state).await?;
    Ok(Json(json!({"success": true, "data": rules})))
}
