use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sf_common::error::AppError;
use sf_fleet::config_writer::ConfigWriteError;
use sf_fleet::rules::RulesError;
use sf_fleet::ssh::SshError;
use sf_fleet::store::StoreError;
use sf_fleet::topology::TopologyError;
use sf_fleet::validation::{AssignmentError, ConsistencyError, ValidationError};
use tracing::error;

/// Error returned by every handler, rendered as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Consistency(ConsistencyError),
    Topology(TopologyError),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Remote(SshError),
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Consistency(_)
            | ApiError::Topology(_)
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Remote(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            ApiError::Validation(e) => Some(e.field),
            ApiError::Topology(_) => Some("parentServerId"),
            _ => None,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Validation(e) => e.to_string(),
            ApiError::Consistency(e) => e.to_string(),
            ApiError::Topology(e) => e.to_string(),
            ApiError::Remote(e) => e.to_string(),
            ApiError::BadRequest(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Internal(m) => m.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            error!("{}", message);
        }

        let mut body = json!({ "success": false, "error": message });
        if let Some(field) = self.field() {
            body["field"] = json!(field);
        }
        if let ApiError::Consistency(ConsistencyError::OriginPathMismatch { expected, received }) = &self {
            body["expected"] = json!(expected);
            body["received"] = json!(received);
        }
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<ConsistencyError> for ApiError {
    fn from(e: ConsistencyError) -> Self {
        ApiError::Consistency(e)
    }
}

impl From<AssignmentError> for ApiError {
    fn from(e: AssignmentError) -> Self {
        match e {
            AssignmentError::Invalid(e) => ApiError::Validation(e),
            AssignmentError::Inconsistent(e) => ApiError::Consistency(e),
        }
    }
}

impl From<TopologyError> for ApiError {
    fn from(e: TopologyError) -> Self {
        ApiError::Topology(e)
    }
}

impl From<SshError> for ApiError {
    fn from(e: SshError) -> Self {
        ApiError::Remote(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<ConfigWriteError> for ApiError {
    fn from(e: ConfigWriteError) -> Self {
        match e {
            ConfigWriteError::Remote(e) => ApiError::Remote(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RulesError> for ApiError {
    fn from(e: RulesError) -> Self {
        match e {
            RulesError::Remote(e) => ApiError::Remote(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
