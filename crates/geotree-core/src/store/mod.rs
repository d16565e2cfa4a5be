// crates/geotree-core/src/store/mod.rs

//! # Hierarchy Store
//!
//! Versioned documents and the atomic write batches the consistency engine
//! commits against a [`crate::traits::DocumentStore`].

use crate::common::{Level, NodeId};
use crate::model::Node;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

/// Optimistic-concurrency version of a stored document. Bumped on every
/// committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    pub const INITIAL: Version = Version(1);

    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub version: Version,
    pub node: Node,
}

impl Versioned {
    pub fn key(&self) -> (Level, NodeId) {
        (self.node.level, self.node.id.clone())
    }
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create a document that must not exist yet.
    Insert(Node),
    /// Overwrite a document that must still be at `expected`.
    Replace { node: Node, expected: Version },
    /// Delete a document that must still be at `expected`.
    Remove {
        level: Level,
        id: NodeId,
        expected: Version,
    },
}

impl WriteOp {
    pub fn level(&self) -> Level {
        match self {
            WriteOp::Insert(node) | WriteOp::Replace { node, .. } => node.level,
            WriteOp::Remove { level, .. } => *level,
        }
    }

    pub fn id(&self) -> &NodeId {
        match self {
            WriteOp::Insert(node) | WriteOp::Replace { node, .. } => &node.id,
            WriteOp::Remove { id, .. } => id,
        }
    }

    pub fn expected(&self) -> Option<Version> {
        match self {
            WriteOp::Insert(_) => None,
            WriteOp::Replace { expected, .. } | WriteOp::Remove { expected, .. } => Some(*expected),
        }
    }
}

/// Multi-document write applied as one unit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> &mut Self {
        self.ops.push(WriteOp::Insert(node));
        self
    }

    pub fn replace(&mut self, node: Node, expected: Version) -> &mut Self {
        self.ops.push(WriteOp::Replace { node, expected });
        self
    }

    pub fn remove(&mut self, level: Level, id: NodeId, expected: Version) -> &mut Self {
        self.ops.push(WriteOp::Remove { level, id, expected });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Why a batch was rejected. A rejected batch changed nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error("{level} {id} changed concurrently (expected {expected:?}, found {found:?})")]
    Stale {
        level: Level,
        id: NodeId,
        expected: Option<Version>,
        found: Option<Version>,
    },

    #[error("country name {name:?} is already taken by {existing}")]
    DuplicateName { name: String, existing: NodeId },

    #[error("backend: {0}")]
    Backend(String),
}

impl CommitError {
    /// `true` when the rejection was a lost version check on `id`.
    pub fn is_stale_on(&self, id: &NodeId) -> bool {
        matches!(self, CommitError::Stale { id: stale, .. } if stale == id)
    }
}
