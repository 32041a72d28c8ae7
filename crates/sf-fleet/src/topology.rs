use std::collections::HashSet;
use thiserror::Error;

use crate::model::{Server, ServerType};

/// Longest parent chain an edge server may sit at the end of.
pub const MAX_PARENT_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("origin servers cannot have a parent server")]
    OriginWithParent,

    #[error("edge servers must reference a parent server")]
    EdgeWithoutParent,

    #[error("a server cannot be its own parent")]
    SelfParent,

    #[error("parent server not found: {0}")]
    UnknownParent(String),

    #[error("parent chain loops back to server {0}")]
    Cycle(String),

    #[error("parent chain is deeper than {MAX_PARENT_DEPTH} servers")]
    TooDeep,
}

/// Check the `parentServerId` chain `candidate` would create.
///
/// `servers` is the current store content. A stored record with the
/// candidate's id is ignored in favor of the candidate itself, so the same
/// call works for creates and edits.
pub fn check_parent_chain(candidate: &Server, servers: &[Server]) -> Result<(), TopologyError> {
    let parent = match (candidate.server_type, candidate.parent_server_id.as_deref()) {
        (ServerType::Origin, None) => return Ok(()),
        (ServerType::Origin, Some(_)) => return Err(TopologyError::OriginWithParent),
        (ServerType::Edge, None) => return Err(TopologyError::EdgeWithoutParent),
        (ServerType::Edge, Some(p)) => p,
    };
    if parent == candidate.id {
        return Err(TopologyError::SelfParent);
    }

    let mut visited: HashSet<&str> = HashSet::from([candidate.id.as_str()]);
    let mut current = parent;
    for _ in 0..MAX_PARENT_DEPTH {
        if !visited.insert(current) {
            return Err(TopologyError::Cycle(current.to_string()));
        }
        let node = servers
            .iter()
            .filter(|s| s.id != candidate.id)
            .find(|s| s.id == current)
            .ok_or_else(|| TopologyError::UnknownParent(current.to_string()))?;

        match node.parent_server_id.as_deref() {
            None => return Ok(()),
            Some(next) => current = next,
        }
    }
    Err(TopologyError::TooDeep)
}

/// Servers whose parent is `id`.
pub fn children_of<'a>(id: &str, servers: &'a [Server]) -> Vec<&'a Server> {
    servers
        .iter()
        .filter(|s| s.parent_server_id.as_deref() == Some(id))
        .collect()
}
