// crates/geotree-core/src/error.rs
use crate::common::{Level, NodeId};
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the hierarchy store, the consistency engine and the
/// cascading selector.
///
/// `NotFound`, `InvalidLevel` and `Conflict` are expected conditions the
/// caller can correct or retry. `Inconsistent` means a post-condition check
/// found the parent/child references disagreeing; it is fatal to the
/// operation that detected it and is never repaired automatically.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("{level} {id} not found")]
    NotFound { level: Level, id: NodeId },

    #[error("invalid level: {0}")]
    InvalidLevel(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("inconsistent hierarchy at {level} {id}: {detail}")]
    Inconsistent {
        level: Level,
        id: NodeId,
        detail: String,
    },

    #[error("invalid id: {0:?}")]
    InvalidId(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("fetching {level} list timed out after {after:?}")]
    Timeout { level: Level, after: Duration },

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("binary snapshot error: {0}")]
    Bincode(#[from] bincode::Error),

    #[cfg(feature = "json")]
    #[error("JSON snapshot error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GeoError>;

impl GeoError {
    /// `true` for conditions a caller can fix by correcting input or retrying
    /// after re-reading current state.
    pub fn is_recoverable(&self) -> bool {
        match self {
            GeoError::NotFound { .. }
            | GeoError::InvalidLevel(_)
            | GeoError::Conflict(_)
            | GeoError::InvalidId(_)
            | GeoError::Validation(_)
            | GeoError::Timeout { .. }
            | GeoError::Fetch(_) => true,
            GeoError::Inconsistent { .. }
            | GeoError::Backend(_)
            | GeoError::Io(_)
            | GeoError::Bincode(_) => false,
            #[cfg(feature = "json")]
            GeoError::Json(_) => false,
        }
    }

    /// HTTP-like status code for the request/response boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            GeoError::NotFound { .. } => 404,
            GeoError::InvalidLevel(_) | GeoError::InvalidId(_) | GeoError::Validation(_) => 400,
            GeoError::Conflict(_) => 409,
            GeoError::Fetch(_) => 502,
            GeoError::Timeout { .. } => 504,
            _ => 500,
        }
    }

    pub(crate) fn not_found(level: Level, id: &NodeId) -> Self {
        GeoError::NotFound {
            level,
            id: id.clone(),
        }
    }
}
