// crates/geotree-core/src/rollup.rs

//! # Aggregation Rollup
//!
//! Display totals of stores, orders, products and customers located under a
//! node. Domain entities carry only a state name, so a node is first resolved
//! to the set of state names it covers and the entities are counted against
//! that set. Counts are recomputed on every call; they are display data and
//! must never drive a mutation decision.

use crate::common::{Level, NodeId};
use crate::engine::Hierarchy;
use crate::error::{GeoError, Result};
use crate::text::fold_key;
use crate::traits::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The entity a total is shown for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Stores,
    Orders,
    Products,
    Customers,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Stores,
        EntityKind::Orders,
        EntityKind::Products,
        EntityKind::Customers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Stores => "stores",
            EntityKind::Orders => "orders",
            EntityKind::Products => "products",
            EntityKind::Customers => "customers",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_end_matches('s');
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str().trim_end_matches('s').eq_ignore_ascii_case(s))
            .ok_or_else(|| GeoError::Validation(format!("unknown entity kind {s:?}")))
    }
}

/// A store, located by the state in its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: String,
    pub state: String,
}

/// A customer, located by the state in their address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub state: String,
}

/// An order, located through the store it was placed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    #[serde(alias = "storeId")]
    pub store_id: String,
}

/// A product, located through the store that lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    #[serde(alias = "storeId")]
    pub store_id: String,
}

/// The domain entities a rollup counts. Owned by other services; the
/// hierarchy only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCatalog {
    #[serde(default)]
    pub stores: Vec<StoreRecord>,
    #[serde(default)]
    pub orders: Vec<OrderRecord>,
    #[serde(default)]
    pub products: Vec<ProductRecord>,
    #[serde(default)]
    pub customers: Vec<CustomerRecord>,
}

impl EntityCatalog {
    /// Counts the entities located in any of `states` (folded names).
    pub fn counts_in(&self, states: &BTreeSet<String>) -> EntityCounts {
        let covers = |state: &str| states.contains(&fold_key(state));
        let local_stores: HashSet<&str> = self
            .stores
            .iter()
            .filter(|s| covers(&s.state))
            .map(|s| s.id.as_str())
            .collect();

        EntityCounts {
            stores: local_stores.len(),
            orders: self
                .orders
                .iter()
                .filter(|o| local_stores.contains(o.store_id.as_str()))
                .count(),
            products: self
                .products
                .iter()
                .filter(|p| local_stores.contains(p.store_id.as_str()))
                .count(),
            customers: self.customers.iter().filter(|c| covers(&c.state)).count(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub stores: usize,
    pub orders: usize,
    pub products: usize,
    pub customers: usize,
}

impl EntityCounts {
    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Stores => self.stores,
            EntityKind::Orders => self.orders,
            EntityKind::Products => self.products,
            EntityKind::Customers => self.customers,
        }
    }
}

/// How much of the node the counts actually describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RollupScope {
    /// Every state under the node: the counts are exact for the node.
    Subtree,
    /// Entities are located no finer than their state, so a city or street
    /// reports the totals of its enclosing state.
    AncestorState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollup {
    pub level: Level,
    pub id: NodeId,
    /// Folded names of the states the counts cover.
    pub states: BTreeSet<String>,
    pub counts: EntityCounts,
    pub scope: RollupScope,
}

impl<S: DocumentStore> Hierarchy<S> {
    /// Folded names of the states a node covers: every state in its subtree
    /// for countries and regions, itself for a state, and the single
    /// enclosing state for cities and streets.
    pub fn leaf_states(&self, level: Level, id: &NodeId) -> Result<BTreeSet<String>> {
        if level >= Level::State {
            let path = self.path(level, id)?;
            let state = &path[Level::State.depth()];
            return Ok(BTreeSet::from([fold_key(&state.name)]));
        }

        let mut frontier = vec![self.get(level, id)?];
        while let Some(child_level) = frontier
            .first()
            .and_then(|n| n.level.child())
            .filter(|l| *l <= Level::State)
        {
            let keys: Vec<(Level, NodeId)> = frontier
                .iter()
                .flat_map(|n| n.children.iter().map(move |c| (child_level, c.clone())))
                .collect();
            let docs = self.store().get_many(&keys)?;
            let missing = docs.iter().filter(|d| d.is_none()).count();
            if missing > 0 {
                debug!(kind = %child_level, missing, "children vanished during rollup walk");
            }
            frontier = docs.into_iter().flatten().map(|v| v.node).collect();
        }
        Ok(frontier.iter().map(|n| fold_key(&n.name)).collect())
    }

    /// Totals of `catalog` entities located under the node.
    pub fn rollup(&self, level: Level, id: &NodeId, catalog: &EntityCatalog) -> Result<Rollup> {
        let states = self.leaf_states(level, id)?;
        let counts = catalog.counts_in(&states);
        let scope = if level > Level::State {
            RollupScope::AncestorState
        } else {
            RollupScope::Subtree
        };
        Ok(Rollup {
            level,
            id: id.clone(),
            states,
            counts,
            scope,
        })
    }
}
