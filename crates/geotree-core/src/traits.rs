// crates/geotree-core/src/traits.rs
use crate::api::ChildSummary;
use crate::common::{Level, NodeId};
use crate::error::Result;
use crate::store::{CommitError, Versioned, WriteBatch};
use async_trait::async_trait;
use std::sync::Arc;

/// Backend abstraction for the five record sets.
///
/// Every mutation of the hierarchy reaches the backend as one
/// [`WriteBatch`], which the backend must apply atomically: either every
/// version check passes and every write becomes visible together, or the
/// batch is rejected and nothing changes. That is the only concurrency
/// control the engine relies on; it keeps no in-process shared state.
pub trait DocumentStore: Send + Sync {
    /// Reads one document.
    fn get(&self, level: Level, id: &NodeId) -> Result<Option<Versioned>>;

    /// Reads several documents from a single consistent snapshot, so that a
    /// batch committed concurrently is seen either entirely or not at all.
    fn get_many(&self, keys: &[(Level, NodeId)]) -> Result<Vec<Option<Versioned>>>;

    /// All documents of one record set, in no particular order.
    fn scan(&self, level: Level) -> Result<Vec<Versioned>>;

    fn count(&self, level: Level) -> Result<usize> {
        Ok(self.scan(level)?.len())
    }

    /// Finds the level an id lives at, if any.
    fn locate(&self, id: &NodeId) -> Result<Option<Level>> {
        for level in Level::ALL {
            if self.get(level, id)?.is_some() {
                return Ok(Some(level));
            }
        }
        Ok(None)
    }

    /// Applies a batch atomically. Each document appears at most once.
    fn commit(&self, batch: WriteBatch) -> std::result::Result<(), CommitError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get(&self, level: Level, id: &NodeId) -> Result<Option<Versioned>> {
        (**self).get(level, id)
    }

    fn get_many(&self, keys: &[(Level, NodeId)]) -> Result<Vec<Option<Versioned>>> {
        (**self).get_many(keys)
    }

    fn scan(&self, level: Level) -> Result<Vec<Versioned>> {
        (**self).scan(level)
    }

    fn count(&self, level: Level) -> Result<usize> {
        (**self).count(level)
    }

    fn locate(&self, id: &NodeId) -> Result<Option<Level>> {
        (**self).locate(id)
    }

    fn commit(&self, batch: WriteBatch) -> std::result::Result<(), CommitError> {
        (**self).commit(batch)
    }
}

/// The request layer the cascading selector fetches child lists through.
///
/// `level` is the level of the nodes being fetched; `parent` is `None` only
/// when fetching countries.
#[async_trait]
pub trait ChildFetcher: Send + Sync {
    async fn fetch_children(&self, level: Level, parent: Option<NodeId>) -> Result<Vec<ChildSummary>>;
}

#[async_trait]
impl<F: ChildFetcher + ?Sized> ChildFetcher for Arc<F> {
    async fn fetch_children(&self, level: Level, parent: Option<NodeId>) -> Result<Vec<ChildSummary>> {
        (**self).fetch_children(level, parent).await
    }
}
