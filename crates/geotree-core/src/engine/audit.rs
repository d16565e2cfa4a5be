// crates/geotree-core/src/engine/audit.rs
use crate::common::{Level, NodeId, TreeStats};
use crate::error::{GeoError, Result};
use crate::model::Node;
use crate::traits::DocumentStore;
use std::collections::HashMap;
use thiserror::Error;
use tracing::error;

/// A broken parent/child link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("{level} {id} points to parent {parent}, which does not exist")]
    MissingParent {
        level: Level,
        id: NodeId,
        parent: NodeId,
    },

    #[error("{level} {id} points to parent {parent}, which is a {found}")]
    WrongParentLevel {
        level: Level,
        id: NodeId,
        parent: NodeId,
        found: Level,
    },

    #[error("{level} {id} has no parent reference")]
    NoParent { level: Level, id: NodeId },

    #[error("country {id} has a parent reference to {parent}")]
    UnexpectedParent { id: NodeId, parent: NodeId },

    #[error("{level} {id} points to parent {parent}, which does not list it as a child")]
    ParentMissingChild {
        level: Level,
        id: NodeId,
        parent: NodeId,
    },

    #[error("{level} {parent} lists child {child}, which does not exist")]
    DanglingChild {
        level: Level,
        parent: NodeId,
        child: NodeId,
    },

    #[error("{level} {parent} lists child {child}, whose parent is {actual:?}")]
    ForeignChild {
        level: Level,
        parent: NodeId,
        child: NodeId,
        actual: Option<NodeId>,
    },

    #[error("{level} {child} is listed by several parents: {parents:?}")]
    MultipleOwners {
        level: Level,
        child: NodeId,
        parents: Vec<NodeId>,
    },

    #[error("street {id} lists {count} children")]
    LeafWithChildren { id: NodeId, count: usize },
}

impl Violation {
    /// The document a repair pass should start from.
    pub fn subject(&self) -> (Level, &NodeId) {
        match self {
            Violation::MissingParent { level, id, .. }
            | Violation::WrongParentLevel { level, id, .. }
            | Violation::NoParent { level, id }
            | Violation::ParentMissingChild { level, id, .. } => (*level, id),
            Violation::UnexpectedParent { id, .. } => (Level::Country, id),
            Violation::DanglingChild { level, parent, .. } => (*level, parent),
            Violation::ForeignChild { level, child, .. }
            | Violation::MultipleOwners { level, child, .. } => (*level, child),
            Violation::LeafWithChildren { id, .. } => (Level::Street, id),
        }
    }

    pub fn into_error(self) -> GeoError {
        let (level, id) = self.subject();
        let (level, id) = (level, id.clone());
        GeoError::Inconsistent {
            level,
            id,
            detail: self.to_string(),
        }
    }
}

/// Result of a full-tree audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub stats: TreeStats,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Ok` when clean, otherwise the first violation as `Inconsistent`.
    pub fn into_result(self) -> Result<TreeStats> {
        match self.violations.into_iter().next() {
            None => Ok(self.stats),
            Some(v) => Err(v.into_error()),
        }
    }
}

/// Logs and builds an `Inconsistent` error for `id`.
pub(crate) fn report_inconsistent(level: Level, id: &NodeId, detail: String) -> GeoError {
    error!(kind = %level, id = %id, %detail, "hierarchy invariant violated");
    GeoError::Inconsistent {
        level,
        id: id.clone(),
        detail,
    }
}

/// Post-condition of a committed mutation.
///
/// Re-reads `focus` from one snapshot and checks that every pair of
/// documents in it agrees: a node pointing at a parent in the set is listed
/// by that parent, a parent in the set lists only nodes that point back, and
/// a focus document that no longer exists is listed by nobody in the set.
pub(crate) fn verify_links<S: DocumentStore + ?Sized>(
    store: &S,
    subject: (Level, &NodeId),
    focus: &[(Level, NodeId)],
) -> Result<()> {
    let docs = store.get_many(focus)?;
    let present: Vec<&Node> = docs.iter().flatten().map(|v| &v.node).collect();
    let absent: Vec<&(Level, NodeId)> = focus
        .iter()
        .zip(&docs)
        .filter(|(_, doc)| doc.is_none())
        .map(|(key, _)| key)
        .collect();

    let mut violations = Vec::new();
    for node in &present {
        for other in &present {
            if node.id == other.id || node.level.parent() != Some(other.level) {
                continue;
            }
            let points_up = node.parent.as_ref() == Some(&other.id);
            let listed = other.lists_child(&node.id);
            if points_up && !listed {
                violations.push(Violation::ParentMissingChild {
                    level: node.level,
                    id: node.id.clone(),
                    parent: other.id.clone(),
                });
            } else if listed && !points_up {
                violations.push(Violation::ForeignChild {
                    level: node.level,
                    parent: other.id.clone(),
                    child: node.id.clone(),
                    actual: node.parent.clone(),
                });
            }
        }
        if let Some(parent) = &node.parent {
            if absent.iter().any(|(_, id)| id == parent) {
                violations.push(Violation::MissingParent {
                    level: node.level,
                    id: node.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }
    for (level, id) in &absent {
        for other in &present {
            if other.level.child() == Some(*level) && other.lists_child(id) {
                violations.push(Violation::DanglingChild {
                    level: other.level,
                    parent: other.id.clone(),
                    child: id.clone(),
                });
            }
        }
    }

    if violations.is_empty() {
        return Ok(());
    }
    for v in &violations {
        error!(violation = %v, "post-commit check failed");
    }
    let detail = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(report_inconsistent(subject.0, subject.1, detail))
}

/// Full scan of all five record sets.
pub(crate) fn audit<S: DocumentStore + ?Sized>(store: &S) -> Result<AuditReport> {
    let mut sets: Vec<HashMap<NodeId, Node>> = Vec::with_capacity(Level::ALL.len());
    let mut stats = TreeStats::default();
    for level in Level::ALL {
        let set: HashMap<NodeId, Node> = store
            .scan(level)?
            .into_iter()
            .map(|v| (v.node.id.clone(), v.node))
            .collect();
        stats.set(level, set.len());
        sets.push(set);
    }
    let locate = |id: &NodeId| {
        Level::ALL
            .into_iter()
            .find(|l| sets[l.depth()].contains_key(id))
    };

    let mut violations = Vec::new();
    for level in Level::ALL {
        let mut owners: HashMap<&NodeId, Vec<NodeId>> = HashMap::new();
        let mut ids: Vec<&NodeId> = sets[level.depth()].keys().collect();
        ids.sort();

        for id in ids {
            let node = &sets[level.depth()][id];
            check_parent(node, &sets, &locate, &mut violations);

            match level.child() {
                None if node.has_children() => violations.push(Violation::LeafWithChildren {
                    id: id.clone(),
                    count: node.child_count(),
                }),
                None => {}
                Some(child_level) => {
                    for child_id in &node.children {
                        owners.entry(child_id).or_default().push(id.clone());
                        match sets[child_level.depth()].get(child_id) {
                            None => violations.push(Violation::DanglingChild {
                                level,
                                parent: id.clone(),
                                child: child_id.clone(),
                            }),
                            Some(child) if child.parent.as_ref() != Some(id) => {
                                violations.push(Violation::ForeignChild {
                                    level: child_level,
                                    parent: id.clone(),
                                    child: child_id.clone(),
                                    actual: child.parent.clone(),
                                })
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
        }

        if let Some(child_level) = level.child() {
            let mut shared: Vec<(&NodeId, Vec<NodeId>)> =
                owners.into_iter().filter(|(_, p)| p.len() > 1).collect();
            shared.sort();
            for (child, parents) in shared {
                violations.push(Violation::MultipleOwners {
                    level: child_level,
                    child: child.clone(),
                    parents,
                });
            }
        }
    }

    for v in &violations {
        error!(violation = %v, "audit found a broken link");
    }
    Ok(AuditReport { stats, violations })
}

fn check_parent(
    node: &Node,
    sets: &[HashMap<NodeId, Node>],
    locate: &impl Fn(&NodeId) -> Option<Level>,
    violations: &mut Vec<Violation>,
) {
    let (above, parent_id) = match (node.level.parent(), &node.parent) {
        (None, None) => return,
        (None, Some(parent)) => {
            violations.push(Violation::UnexpectedParent {
                id: node.id.clone(),
                parent: parent.clone(),
            });
            return;
        }
        (Some(_), None) => {
            violations.push(Violation::NoParent {
                level: node.level,
                id: node.id.clone(),
            });
            return;
        }
        (Some(above), Some(parent)) => (above, parent),
    };

    match sets[above.depth()].get(parent_id) {
        Some(parent) if !parent.lists_child(&node.id) => {
            violations.push(Violation::ParentMissingChild {
                level: node.level,
                id: node.id.clone(),
                parent: parent_id.clone(),
            })
        }
        Some(_) => {}
        None => match locate(parent_id) {
            Some(found) => violations.push(Violation::WrongParentLevel {
                level: node.level,
                id: node.id.clone(),
                parent: parent_id.clone(),
                found,
            }),
            None => violations.push(Violation::MissingParent {
                level: node.level,
                id: node.id.clone(),
                parent: parent_id.clone(),
            }),
        },
    }
}
