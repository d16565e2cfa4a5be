// crates/geotree-core/src/api.rs

//! Request and response shapes of the four operations the hierarchy exposes
//! over a request/response boundary: `children`, `create`, `update`, `remove`.

use crate::common::{Level, NodeId};
use crate::error::{GeoError, Result};
use crate::model::{Ancestors, Node, NodeUpdate};
use crate::text::NameMatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a child list: enough to render a selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSummary {
    pub id: NodeId,
    pub name: String,
    pub child_count: usize,
}

impl From<&Node> for ChildSummary {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            child_count: node.child_count(),
        }
    }
}

impl NameMatch for ChildSummary {
    fn name_str(&self) -> &str {
        &self.name
    }
}

/// A node with its children resolved to summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: NodeId,
    pub level: Level,
    pub name: String,
    pub parent_id: Option<NodeId>,
    pub ancestors: Ancestors,
    pub children: Vec<ChildSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeView {
    pub fn new(node: Node, children: Vec<ChildSummary>) -> Self {
        Self {
            id: node.id,
            level: node.level,
            name: node.name,
            parent_id: node.parent,
            ancestors: node.ancestors,
            children,
            created_at: node.created_at,
            updated_at: node.updated_at,
        }
    }
}

/// Body of a create call; see [`Hierarchy::create_from`](crate::Hierarchy::create_from).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub level: Level,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
}

impl From<UpdateRequest> for NodeUpdate {
    fn from(req: UpdateRequest) -> Self {
        NodeUpdate {
            name: req.name,
            parent: req.parent_id,
        }
    }
}

/// `{ success, data | error }` envelope returned across the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: 200,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: 201,
            ..Self::ok(data)
        }
    }

    pub fn failed(err: &GeoError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            status: err.status_code(),
        }
    }
}

impl<T> ApiResponse<T> {
    /// Envelope for the outcome of a create: 201 on success.
    pub fn from_created(result: Result<T>) -> Self {
        match result {
            Ok(data) => ApiResponse::created(data),
            Err(err) => ApiResponse::failed(&err),
        }
    }
}

impl<T> From<Result<T>> for ApiResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(err) => ApiResponse::failed(&err),
        }
    }
}
