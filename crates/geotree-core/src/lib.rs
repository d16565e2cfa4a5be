// crates/geotree-core/src/lib.rs

//! A five-level location hierarchy (country → region → state → city →
//! street) kept consistent under concurrent edits.
//!
//! - [`Hierarchy`] creates, reparents and deletes nodes so that every
//!   parent reference and every child list always agree.
//! - [`Hierarchy::rollup`] totals domain entities located under a node.
//! - [`CascadingSelector`] drives a drill-down UI one level at a time and
//!   ignores responses that arrive after the user has moved on.
//!
//! ```
//! use geotree_core::{Hierarchy, Level};
//!
//! let h = Hierarchy::in_memory();
//! let ng = h.create(Level::Country, "Nigeria", None)?;
//! let sw = h.create(Level::Region, "South-West", Some(&ng.id))?;
//! let lagos = h.create(Level::State, "Lagos", Some(&sw.id))?;
//!
//! assert!(h.get(Level::Region, &sw.id)?.lists_child(&lagos.id));
//! assert_eq!(h.path(Level::State, &lagos.id)?.len(), 3);
//! # Ok::<(), geotree_core::GeoError>(())
//! ```

pub mod api; // Request/response shapes
pub mod common;
pub mod engine; // Consistency engine + audit
pub mod error;
pub mod loader; // Snapshot persistence
pub mod model;
pub mod rollup;
pub mod selector;
pub mod store; // Versioned document store
pub mod text;
pub mod traits;

pub use crate::api::{ApiResponse, ChildSummary, CreateRequest, NodeView, UpdateRequest};
pub use crate::common::{EngineConfig, Level, NodeId, SelectorConfig, TreeStats};
pub use crate::engine::audit::{AuditReport, Violation};
pub use crate::engine::Hierarchy;
pub use crate::error::{GeoError, Result};
pub use crate::loader::Snapshot;
pub use crate::model::{Ancestors, Node, NodeUpdate};
pub use crate::rollup::{EntityCatalog, EntityCounts, EntityKind, Rollup, RollupScope};
pub use crate::selector::{ApplyOutcome, CascadingSelector, FetchOutcome, FetchRequest, Listing, Selection};
pub use crate::store::{MemoryStore, WriteBatch};
pub use crate::traits::{ChildFetcher, DocumentStore};

pub mod prelude {
    pub use crate::{
        CascadingSelector, ChildFetcher, ChildSummary, DocumentStore, GeoError, Hierarchy, Level, Node,
        NodeId, NodeUpdate, Result,
    };
    pub use crate::text::NameMatch;
}
