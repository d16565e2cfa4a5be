// crates/geotree-core/src/engine/mod.rs

//! # Consistency Engine
//!
//! Create, reparent and delete a node together with the child lists of its
//! neighbours. Every mutation is one [`WriteBatch`] committed against the
//! [`DocumentStore`]; losing an optimistic version check on a neighbour is
//! retried from a fresh read, losing it on the node itself is a `Conflict`.
//! After each commit the touched documents are re-read from one snapshot and
//! checked for bidirectionality; a broken link surfaces as `Inconsistent`.

pub mod audit;

use crate::api::{ChildSummary, CreateRequest, NodeView};
use crate::common::{EngineConfig, Level, NodeId, TreeStats};
use crate::error::{GeoError, Result};
use crate::model::{Ancestors, Node, NodeUpdate};
use crate::store::{CommitError, MemoryStore, Version, Versioned, WriteBatch};
use crate::text::{normalize_name, NameMatch};
use crate::traits::{ChildFetcher, DocumentStore};
use async_trait::async_trait;
use audit::AuditReport;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// The location hierarchy: a stateless engine over a document store.
///
/// `Hierarchy` holds no mutable state of its own, so any number of request
/// workers can share one (or each build their own over a shared store).
#[derive(Debug)]
pub struct Hierarchy<S = MemoryStore> {
    store: S,
    config: EngineConfig,
}

impl Hierarchy<MemoryStore> {
    /// An empty hierarchy backed by a [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl Default for Hierarchy<MemoryStore> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<S: DocumentStore> Hierarchy<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // -----------------------------------------------------------------------
    // MUTATIONS
    // -----------------------------------------------------------------------

    /// Creates a node under `parent` and registers it in the parent's child
    /// list in the same commit.
    ///
    /// Countries take no parent; every other level requires a parent at the
    /// level directly above. Concurrent creates under one parent all succeed:
    /// a create that loses the parent's version check re-reads and retries,
    /// without the `max_retries` bound. Every lost check means another commit
    /// to the parent landed, so the loop always makes progress.
    pub fn create(&self, level: Level, name: &str, parent: Option<&NodeId>) -> Result<Node> {
        let name = normalize_name(name)
            .ok_or_else(|| GeoError::Validation(format!("{level} name is required")))?;

        let parent_id = match (level.parent(), parent) {
            (None, None) => return self.create_root(level, name),
            (None, Some(_)) => {
                return Err(GeoError::InvalidLevel(format!("a {level} has no parent")))
            }
            (Some(above), None) => {
                return Err(GeoError::InvalidLevel(format!(
                    "a {level} must be created under a {above}"
                )))
            }
            (Some(_), Some(id)) => id,
        };

        let mut attempt: u64 = 0;
        loop {
            let parent = self.fetch_parent(level, parent_id)?;
            let node = Node::new(level, name.clone(), Some(&parent.node));

            let mut updated_parent = parent.node.clone();
            updated_parent.children.insert(node.id.clone());
            updated_parent.touch();

            let mut batch = WriteBatch::new();
            batch
                .insert(node.clone())
                .replace(updated_parent, parent.version);

            match self.store.commit(batch) {
                Ok(()) => {
                    audit::verify_links(
                        &self.store,
                        (level, &node.id),
                        &[(level, node.id.clone()), (parent.node.level, parent_id.clone())],
                    )?;
                    info!(kind = %level, id = %node.id, parent_id = %parent_id, "created");
                    return Ok(node);
                }
                Err(err @ CommitError::Stale { .. }) => {
                    attempt += 1;
                    debug!(kind = %level, parent_id = %parent_id, attempt, %err, "create lost a race, retrying");
                }
                Err(err) => return Err(self.commit_failed(level, err)),
            }
        }
    }

    /// [`create`](Self::create) driven by a request body.
    pub fn create_from(&self, req: CreateRequest) -> Result<Node> {
        self.create(req.level, &req.name, req.parent_id.as_ref())
    }

    fn create_root(&self, level: Level, name: String) -> Result<Node> {
        let node = Node::new(level, name, None);
        let mut batch = WriteBatch::new();
        batch.insert(node.clone());
        self.store
            .commit(batch)
            .map_err(|err| self.commit_failed(level, err))?;
        info!(kind = %level, id = %node.id, name = %node.name, "created");
        Ok(node)
    }

    /// Renames and/or reparents a node.
    ///
    /// A `parent` different from the current one is a reparent: the new
    /// parent is verified first (nothing is written if it is missing or at
    /// the wrong level), then the node, its old parent, its new parent and
    /// the denormalized ancestors of its whole subtree are committed as one
    /// batch. If the node itself changed since it was read the update fails
    /// with `Conflict` and the caller should re-read before retrying.
    pub fn update(&self, level: Level, id: &NodeId, update: NodeUpdate) -> Result<Node> {
        if update.is_empty() {
            return Err(GeoError::Validation(format!("nothing to update on {level} {id}")));
        }
        let name = match update.name.as_deref() {
            Some(raw) => Some(
                normalize_name(raw)
                    .ok_or_else(|| GeoError::Validation(format!("{level} name is required")))?,
            ),
            None => None,
        };
        if level.is_root() && update.parent.is_some() {
            return Err(GeoError::InvalidLevel(format!("a {level} has no parent")));
        }

        let original = self.fetch(level, id)?;
        let mut current = original.clone();
        let mut attempt = 0;
        loop {
            let new_parent = update
                .parent
                .as_ref()
                .filter(|p| current.node.parent.as_ref() != Some(*p));

            let (batch, updated, focus) = match new_parent {
                Some(new_parent) => self.reparent_batch(&current, new_parent, name.as_deref())?,
                None => match name.as_deref() {
                    Some(name) if name != current.node.name => {
                        let mut node = current.node.clone();
                        node.name = name.to_owned();
                        node.touch();
                        let mut batch = WriteBatch::new();
                        batch.replace(node.clone(), current.version);
                        (batch, node, vec![(level, id.clone())])
                    }
                    _ => return Ok(current.node),
                },
            };

            match self.store.commit(batch) {
                Ok(()) => {
                    audit::verify_links(&self.store, (level, id), &focus)?;
                    match new_parent {
                        Some(to) => info!(
                            kind = %level,
                            id = %id,
                            from = ?current.node.parent,
                            to = %to,
                            "reparented"
                        ),
                        None => info!(kind = %level, id = %id, name = %updated.name, "renamed"),
                    }
                    return Ok(updated);
                }
                Err(err @ CommitError::Stale { .. }) => {
                    if err.is_stale_on(id) || attempt >= self.config.max_retries {
                        return Err(self.commit_failed(level, err));
                    }
                    attempt += 1;
                    debug!(kind = %level, id = %id, attempt, %err, "update lost a race, retrying");
                    current = self.fetch(level, id)?;
                    if current.version != original.version {
                        return Err(GeoError::Conflict(format!(
                            "{level} {id} was modified concurrently; re-read and retry"
                        )));
                    }
                }
                Err(err) => return Err(self.commit_failed(level, err)),
            }
        }
    }

    /// Builds the batch that moves `current` under `new_parent_id`.
    fn reparent_batch(
        &self,
        current: &Versioned,
        new_parent_id: &NodeId,
        name: Option<&str>,
    ) -> Result<(WriteBatch, Node, Vec<(Level, NodeId)>)> {
        let level = current.node.level;
        let id = &current.node.id;
        let new_parent = self.fetch_parent(level, new_parent_id)?;
        let above = new_parent.node.level;

        let old_parent_id = current.node.parent.clone().ok_or_else(|| {
            audit::report_inconsistent(level, id, format!("{level} has no parent reference"))
        })?;
        let old_parent = self.store.get(above, &old_parent_id)?.ok_or_else(|| {
            audit::report_inconsistent(
                level,
                id,
                format!("parent {above} {old_parent_id} does not exist"),
            )
        })?;

        let mut node = current.node.clone();
        node.parent = Some(new_parent_id.clone());
        node.ancestors = Ancestors::below(&new_parent.node);
        if let Some(name) = name {
            node.name = name.to_owned();
        }
        node.touch();

        let mut old = old_parent.node.clone();
        old.children.remove(id);
        old.touch();

        let mut new = new_parent.node.clone();
        new.children.insert(id.clone());
        new.touch();

        let mut batch = WriteBatch::new();
        batch
            .replace(node.clone(), current.version)
            .replace(old, old_parent.version)
            .replace(new, new_parent.version);
        for (descendant, version) in self.refreshed_descendants(&node)? {
            batch.replace(descendant, version);
        }

        let focus = vec![
            (level, id.clone()),
            (above, old_parent_id),
            (above, new_parent_id.clone()),
        ];
        Ok((batch, node, focus))
    }

    /// Every descendant of `root` with its denormalized ancestors recomputed
    /// from `root`'s (already updated) position.
    fn refreshed_descendants(&self, root: &Node) -> Result<Vec<(Node, Version)>> {
        let mut out = Vec::new();
        let mut ancestors: HashMap<NodeId, Ancestors> = HashMap::new();
        ancestors.insert(root.id.clone(), Ancestors::below(root));

        let mut queue: VecDeque<Node> = VecDeque::from([root.clone()]);
        while let Some(parent) = queue.pop_front() {
            let Some(child_level) = parent.level.child() else {
                continue;
            };
            let inherited = ancestors
                .get(&parent.id)
                .cloned()
                .unwrap_or_else(|| Ancestors::below(&parent));
            for child_id in &parent.children {
                // A child deleted since `parent` was read bumps the parent's
                // version, so the commit will be rejected and retried.
                let Some(child) = self.store.get(child_level, child_id)? else {
                    debug!(kind = %child_level, id = %child_id, "listed child vanished during reparent");
                    continue;
                };
                let mut refreshed = child.node;
                refreshed.ancestors = inherited.clone();
                ancestors.insert(refreshed.id.clone(), Ancestors::below(&refreshed));
                queue.push_back(refreshed.clone());
                out.push((refreshed, child.version));
            }
        }
        Ok(out)
    }

    /// Deletes a leaf node and removes it from its parent's child list.
    ///
    /// Refuses with `Conflict` while the node still has children; nothing is
    /// cascaded.
    pub fn delete(&self, level: Level, id: &NodeId) -> Result<Node> {
        let mut attempt = 0;
        loop {
            let current = self.fetch(level, id)?;
            if current.node.has_children() {
                let below = level.child().map(Level::collection).unwrap_or("children");
                return Err(GeoError::Conflict(format!(
                    "{level} {id} still has {} {below}; remove them first",
                    current.node.child_count()
                )));
            }

            let mut batch = WriteBatch::new();
            batch.remove(level, id.clone(), current.version);
            let mut focus = vec![(level, id.clone())];

            if let Some(parent_id) = &current.node.parent {
                let above = level.parent().ok_or_else(|| {
                    audit::report_inconsistent(level, id, format!("{level} has a parent reference"))
                })?;
                let parent = self.store.get(above, parent_id)?.ok_or_else(|| {
                    audit::report_inconsistent(
                        level,
                        id,
                        format!("parent {above} {parent_id} does not exist"),
                    )
                })?;
                let mut updated_parent = parent.node;
                updated_parent.children.remove(id);
                updated_parent.touch();
                batch.replace(updated_parent, parent.version);
                focus.push((above, parent_id.clone()));
            }

            match self.store.commit(batch) {
                Ok(()) => {
                    audit::verify_links(&self.store, (level, id), &focus)?;
                    info!(kind = %level, id = %id, "deleted");
                    return Ok(current.node);
                }
                Err(err @ CommitError::Stale { .. }) if attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(kind = %level, id = %id, attempt, %err, "delete lost a race, retrying");
                }
                Err(err) => return Err(self.commit_failed(level, err)),
            }
        }
    }

    // -----------------------------------------------------------------------
    // READS
    // -----------------------------------------------------------------------

    pub fn get(&self, level: Level, id: &NodeId) -> Result<Node> {
        self.fetch(level, id).map(|v| v.node)
    }

    /// A node with its child list resolved to summaries.
    pub fn view(&self, level: Level, id: &NodeId) -> Result<NodeView> {
        let node = self.get(level, id)?;
        let children = match level.child() {
            Some(child_level) => self.summaries(child_level, &node)?,
            None => Vec::new(),
        };
        Ok(NodeView::new(node, children))
    }

    /// All nodes of one level, ordered by name.
    pub fn list(&self, level: Level) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = self.store.scan(level)?.into_iter().map(|v| v.node).collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(nodes)
    }

    /// The root list.
    pub fn countries(&self) -> Result<Vec<ChildSummary>> {
        Ok(self
            .list(Level::Country)?
            .iter()
            .map(ChildSummary::from)
            .collect())
    }

    /// Children of `parent_id`, which lives at `level_above`.
    pub fn children(&self, level_above: Level, parent_id: &NodeId) -> Result<Vec<ChildSummary>> {
        let child_level = level_above.child_or_err()?;
        let parent = self.get(level_above, parent_id)?;
        self.summaries(child_level, &parent)
    }

    fn summaries(&self, child_level: Level, parent: &Node) -> Result<Vec<ChildSummary>> {
        let keys: Vec<(Level, NodeId)> = parent
            .children
            .iter()
            .map(|id| (child_level, id.clone()))
            .collect();
        let mut out: Vec<ChildSummary> = self
            .store
            .get_many(&keys)?
            .iter()
            .flatten()
            .map(|v| ChildSummary::from(&v.node))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    /// The chain from the country down to the node, inclusive.
    ///
    /// The chain always has exactly `level.depth() + 1` entries; a missing
    /// or mislevelled parent on the way up is reported as `Inconsistent`.
    pub fn path(&self, level: Level, id: &NodeId) -> Result<Vec<Node>> {
        let mut chain = vec![self.get(level, id)?];
        while let Some(above) = chain[chain.len() - 1].level.parent() {
            let child = &chain[chain.len() - 1];
            let parent_id = child.parent.clone().ok_or_else(|| {
                audit::report_inconsistent(child.level, &child.id, "no parent reference".into())
            })?;
            let parent = self.store.get(above, &parent_id)?.ok_or_else(|| {
                audit::report_inconsistent(
                    child.level,
                    &child.id,
                    format!("parent {above} {parent_id} does not exist"),
                )
            })?;
            chain.push(parent.node);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Nodes of `level` whose name matches `name`, accent- and case-insensitive.
    pub fn find_by_name(&self, level: Level, name: &str) -> Result<Vec<Node>> {
        Ok(self
            .list(level)?
            .into_iter()
            .filter(|n| n.is_named(name))
            .collect())
    }

    pub fn stats(&self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        for level in Level::ALL {
            stats.set(level, self.store.count(level)?);
        }
        Ok(stats)
    }

    /// Walks all five record sets and reports every broken link.
    ///
    /// Meant for a quiescent store (after loading a snapshot, or as an
    /// offline repair pass); each violation is logged at error level.
    pub fn audit(&self) -> Result<AuditReport> {
        audit::audit(&self.store)
    }

    // -----------------------------------------------------------------------
    // HELPERS
    // -----------------------------------------------------------------------

    fn fetch(&self, level: Level, id: &NodeId) -> Result<Versioned> {
        self.store
            .get(level, id)?
            .ok_or_else(|| GeoError::not_found(level, id))
    }

    /// Reads the parent a `level` node must hang under. An id that exists at
    /// some other level is a level violation rather than a missing node.
    fn fetch_parent(&self, level: Level, parent_id: &NodeId) -> Result<Versioned> {
        let above = level
            .parent()
            .ok_or_else(|| GeoError::InvalidLevel(format!("a {level} has no parent")))?;
        if let Some(parent) = self.store.get(above, parent_id)? {
            return Ok(parent);
        }
        match self.store.locate(parent_id)? {
            Some(found) => Err(GeoError::InvalidLevel(format!(
                "{parent_id} is a {found}; a {level} must be placed under a {above}"
            ))),
            None => Err(GeoError::not_found(above, parent_id)),
        }
    }

    fn commit_failed(&self, level: Level, err: CommitError) -> GeoError {
        match err {
            CommitError::Stale { .. } => {
                warn!(kind = %level, %err, "giving up after concurrent modification");
                GeoError::Conflict(format!("{err}; re-read and retry"))
            }
            CommitError::DuplicateName { .. } => GeoError::Conflict(err.to_string()),
            CommitError::Backend(msg) => GeoError::Backend(msg),
        }
    }
}

#[async_trait]
impl<S: DocumentStore> ChildFetcher for Hierarchy<S> {
    async fn fetch_children(&self, level: Level, parent: Option<NodeId>) -> Result<Vec<ChildSummary>> {
        match (level.parent(), parent) {
            (None, None) => self.countries(),
            (Some(above), Some(parent)) => self.children(above, &parent),
            (None, Some(_)) => Err(GeoError::InvalidLevel(format!("a {level} has no parent"))),
            (Some(above), None) => Err(GeoError::InvalidLevel(format!(
                "listing {} requires a parent {above}",
                level.collection()
            ))),
        }
    }
}
