//! Route/server consistency checks run before an assignment is persisted.
//!
//! Everything here is pure: the caller loads routes and servers first and
//! the same inputs always produce the same verdict.

use thiserror::Error;

use crate::model::{AssignmentDraft, Route, RouteServerAssignment, Server, ServerRef, StreamType};

/// A missing or malformed input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn required(field: &'static str) -> Self {
        Self::new(field, format!("{} is required", field))
    }
}

/// The assignment disagrees with the known routes or servers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("No matching route found for path {from}")]
    NoMatchingRoute { from: String },

    #[error("Origin path mismatch. Expected: {expected}")]
    OriginPathMismatch { expected: String, received: String },

    #[error("Server not found: {id}")]
    ServerNotFound { id: String },

    #[error("Server origin IP mismatch for server: {server}")]
    OriginIpMismatch {
        server: String,
        origin_ip: String,
        route_origin: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Inconsistent(#[from] ConsistencyError),
}

/// Blank counts as missing, but the raw value is what gets compared and stored.
fn present<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::required(field)),
    }
}

/// Required fields of a draft, checked and borrowed.
#[derive(Debug)]
pub struct DraftFields<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub servers: &'a [ServerRef],
    pub route_kind: StreamType,
}

/// Field-level checks only. Needs neither routes nor servers, so callers can
/// reject a bad draft before loading anything.
pub fn check_draft(draft: &AssignmentDraft) -> Result<DraftFields<'_>, ValidationError> {
    let from = present(&draft.from, "from")?;
    let to = present(&draft.to, "to")?;
    let servers = match &draft.servers {
        Some(refs) if !refs.is_empty() => refs.as_slice(),
        _ => return Err(ValidationError::new("servers", "servers must list at least one server")),
    };
    let kind = present(&draft.route_kind, "route_kind")?;
    let route_kind: StreamType = kind.parse().map_err(|_| {
        ValidationError::new("route_kind", "route_kind must be one of DASH, HLS, CMAF")
    })?;
    Ok(DraftFields {
        from,
        to,
        servers,
        route_kind,
    })
}

/// Check a candidate assignment against the current routes and servers.
///
/// Checks short-circuit in order: required fields, route lookup by `from`,
/// exact `to` match against the route's origin URL, then every server's
/// origin IP against the route origin. The first failure wins.
///
/// The returned assignment keeps the draft's id (empty if none was given) and
/// carries fresh snapshots of the referenced servers.
pub fn validate_assignment(
    draft: &AssignmentDraft,
    routes: &[Route],
    servers: &[Server],
) -> Result<RouteServerAssignment, AssignmentError> {
    let DraftFields {
        from,
        to,
        servers: refs,
        route_kind,
    } = check_draft(draft)?;

    let route = routes
        .iter()
        .find(|r| r.path == from)
        .ok_or_else(|| ConsistencyError::NoMatchingRoute {
            from: from.to_string(),
        })?;

    let expected = route.origin_url();
    if to != expected {
        return Err(ConsistencyError::OriginPathMismatch {
            expected,
            received: to.to_string(),
        }
        .into());
    }

    let mut snapshots = Vec::with_capacity(refs.len());
    for server_ref in refs {
        let server = servers
            .iter()
            .find(|s| s.id == server_ref.id)
            .ok_or_else(|| ConsistencyError::ServerNotFound {
                id: server_ref.id.clone(),
            })?;

        // Containment, not host equality: "10.0.0.5" also matches "110.0.0.50".
        let origin_ip = server.origin_ip();
        if !route.origin.contains(origin_ip) {
            return Err(ConsistencyError::OriginIpMismatch {
                server: server.display_name.clone(),
                origin_ip: origin_ip.to_string(),
                route_origin: route.origin.clone(),
            }
            .into());
        }
        snapshots.push(server.snapshot());
    }

    Ok(RouteServerAssignment {
        id: draft.id.clone().unwrap_or_default(),
        priority: draft.priority.unwrap_or_default(),
        route_kind,
        from: from.to_string(),
        to: to.to_string(),
        servers: snapshots,
    })
}
