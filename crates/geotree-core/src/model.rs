// crates/geotree-core/src/model.rs
use crate::common::{Level, NodeId};
use crate::text::NameMatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Denormalized references to every ancestor of a node.
///
/// Convenience for readers only. The authoritative path is `parent` /
/// `children`; these fields are refreshed whenever a node (or one of its
/// ancestors) is reparented.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestors {
    pub country: Option<NodeId>,
    pub region: Option<NodeId>,
    pub state: Option<NodeId>,
    pub city: Option<NodeId>,
}

impl Ancestors {
    pub fn get(&self, level: Level) -> Option<&NodeId> {
        match level {
            Level::Country => self.country.as_ref(),
            Level::Region => self.region.as_ref(),
            Level::State => self.state.as_ref(),
            Level::City => self.city.as_ref(),
            Level::Street => None,
        }
    }

    fn slot(&mut self, level: Level) -> Option<&mut Option<NodeId>> {
        match level {
            Level::Country => Some(&mut self.country),
            Level::Region => Some(&mut self.region),
            Level::State => Some(&mut self.state),
            Level::City => Some(&mut self.city),
            Level::Street => None,
        }
    }

    /// The ancestors a child of `parent` must carry.
    pub fn below(parent: &Node) -> Ancestors {
        let mut out = parent.ancestors.clone();
        if let Some(slot) = out.slot(parent.level) {
            *slot = Some(parent.id.clone());
        }
        out
    }
}

/// One record of the hierarchy: a country, region, state, city or street.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub level: Level,
    pub name: String,
    /// Immediate parent; `None` only for countries.
    pub parent: Option<NodeId>,
    /// Immediate children; always empty for streets.
    pub children: BTreeSet<NodeId>,
    pub ancestors: Ancestors,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub(crate) fn new(level: Level, name: String, parent: Option<&Node>) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::generate(),
            level,
            name,
            parent: parent.map(|p| p.id.clone()),
            children: BTreeSet::new(),
            ancestors: parent.map(Ancestors::below).unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn lists_child(&self, id: &NodeId) -> bool {
        self.children.contains(id)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl NameMatch for Node {
    fn name_str(&self) -> &str {
        &self.name
    }
}

/// Field changes accepted by [`crate::Hierarchy::update`].
///
/// A `parent` different from the node's current parent makes the update a
/// reparent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "parentId")]
    pub parent: Option<NodeId>,
}

impl NodeUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            parent: None,
        }
    }

    pub fn reparent(parent: NodeId) -> Self {
        Self {
            name: None,
            parent: Some(parent),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent.is_none()
    }
}
