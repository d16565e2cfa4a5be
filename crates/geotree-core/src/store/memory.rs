// crates/geotree-core/src/store/memory.rs
use super::{CommitError, Version, Versioned, WriteBatch, WriteOp};
use crate::common::{Level, NodeId};
use crate::error::{GeoError, Result};
use crate::model::Node;
use crate::text::fold_key;
use crate::traits::DocumentStore;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Collections {
    /// One record set per level, indexed by `Level::depth`.
    levels: [HashMap<NodeId, Versioned>; 5],
    /// Unique index: folded country name -> country id.
    country_names: HashMap<String, NodeId>,
}

impl Collections {
    fn set(&self, level: Level) -> &HashMap<NodeId, Versioned> {
        &self.levels[level.depth()]
    }

    fn set_mut(&mut self, level: Level) -> &mut HashMap<NodeId, Versioned> {
        &mut self.levels[level.depth()]
    }

    fn version_of(&self, level: Level, id: &NodeId) -> Option<Version> {
        self.set(level).get(id).map(|v| v.version)
    }

    /// Checks every precondition of `batch` without touching anything.
    fn validate(&self, batch: &WriteBatch) -> std::result::Result<(), CommitError> {
        for op in batch.ops() {
            let found = self.version_of(op.level(), op.id());
            if found != op.expected() {
                return Err(CommitError::Stale {
                    level: op.level(),
                    id: op.id().clone(),
                    expected: op.expected(),
                    found,
                });
            }
        }
        self.validate_country_names(batch)
    }

    fn validate_country_names(&self, batch: &WriteBatch) -> std::result::Result<(), CommitError> {
        let country_ops: Vec<&WriteOp> = batch
            .ops()
            .iter()
            .filter(|op| op.level() == Level::Country)
            .collect();
        if country_ops.is_empty() {
            return Ok(());
        }

        let mut names = self.country_names.clone();
        // Names held by documents this batch replaces or removes are released first.
        for op in &country_ops {
            names.retain(|_, owner| owner != op.id());
        }
        for op in country_ops {
            let node = match op {
                WriteOp::Insert(node) | WriteOp::Replace { node, .. } => node,
                WriteOp::Remove { .. } => continue,
            };
            let key = fold_key(&node.name);
            if let Some(existing) = names.get(&key) {
                return Err(CommitError::DuplicateName {
                    name: node.name.clone(),
                    existing: existing.clone(),
                });
            }
            names.insert(key, node.id.clone());
        }
        Ok(())
    }

    fn apply(&mut self, batch: WriteBatch) {
        for op in batch.into_ops() {
            match op {
                WriteOp::Insert(node) => {
                    self.index_name(&node);
                    self.set_mut(node.level).insert(
                        node.id.clone(),
                        Versioned {
                            version: Version::INITIAL,
                            node,
                        },
                    );
                }
                WriteOp::Replace { node, expected } => {
                    self.unindex_name(node.level, &node.id);
                    self.index_name(&node);
                    self.set_mut(node.level).insert(
                        node.id.clone(),
                        Versioned {
                            version: expected.next(),
                            node,
                        },
                    );
                }
                WriteOp::Remove { level, id, .. } => {
                    self.unindex_name(level, &id);
                    self.set_mut(level).remove(&id);
                }
            }
        }
    }

    fn index_name(&mut self, node: &Node) {
        if node.level == Level::Country {
            self.country_names
                .insert(fold_key(&node.name), node.id.clone());
        }
    }

    fn unindex_name(&mut self, level: Level, id: &NodeId) {
        if level == Level::Country {
            self.country_names.retain(|_, owner| owner != id);
        }
    }
}

/// In-memory document store guarded by a single read-write lock.
///
/// Reads share the lock and therefore always observe whole batches;
/// `commit` validates and applies under the exclusive lock, which makes
/// every batch atomic and serializable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from previously persisted nodes, all at the initial
    /// version. Duplicate ids or duplicate country names are rejected.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Result<Self> {
        let mut collections = Collections::default();
        for node in nodes {
            if let Some(level) = Level::ALL
                .into_iter()
                .find(|l| collections.set(*l).contains_key(&node.id))
            {
                return Err(GeoError::Conflict(format!(
                    "duplicate id {} (already stored as a {level})",
                    node.id
                )));
            }
            if node.level == Level::Country {
                if let Some(existing) = collections.country_names.get(&fold_key(&node.name)) {
                    return Err(GeoError::Conflict(format!(
                        "country name {:?} is used by both {existing} and {}",
                        node.name, node.id
                    )));
                }
            }
            collections.index_name(&node);
            collections.set_mut(node.level).insert(
                node.id.clone(),
                Versioned {
                    version: Version::INITIAL,
                    node,
                },
            );
        }
        Ok(Self {
            inner: RwLock::new(collections),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, level: Level, id: &NodeId) -> Result<Option<Versioned>> {
        Ok(self.read().set(level).get(id).cloned())
    }

    fn get_many(&self, keys: &[(Level, NodeId)]) -> Result<Vec<Option<Versioned>>> {
        let guard = self.read();
        Ok(keys
            .iter()
            .map(|(level, id)| guard.set(*level).get(id).cloned())
            .collect())
    }

    fn scan(&self, level: Level) -> Result<Vec<Versioned>> {
        Ok(self.read().set(level).values().cloned().collect())
    }

    fn count(&self, level: Level) -> Result<usize> {
        Ok(self.read().set(level).len())
    }

    fn locate(&self, id: &NodeId) -> Result<Option<Level>> {
        let guard = self.read();
        Ok(Level::ALL
            .into_iter()
            .find(|level| guard.set(*level).contains_key(id)))
    }

    fn commit(&self, batch: WriteBatch) -> std::result::Result<(), CommitError> {
        let mut guard = self.write();
        guard.validate(&batch)?;
        guard.apply(batch);
        Ok(())
    }
}
