use clap::{Parser, Subcommand};
use geotree_core::{Level, NodeId};
use std::path::PathBuf;

/// CLI arguments for geotree
#[derive(Debug, Parser)]
#[command(
    name = "geotree",
    version,
    about = "Inspect and edit a country → region → state → city → street hierarchy"
)]
pub struct CliArgs {
    /// Snapshot file to load and save (`.bin`, or `.json` with the json feature)
    #[arg(short = 'd', long = "data", env = "GEOTREE_DATA", global = true)]
    pub data: Option<PathBuf>,

    /// Retries after losing a concurrent-modification check on a neighbour
    #[arg(long = "max-retries", env = "GEOTREE_MAX_RETRIES", global = true)]
    pub max_retries: Option<u32>,

    /// Per-level fetch timeout used by `drill`, in milliseconds
    #[arg(long = "fetch-timeout-ms", global = true)]
    pub fetch_timeout_ms: Option<u64>,

    /// Print results as a `{ success, data | error }` JSON envelope
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show how many nodes each level holds
    Stats,

    /// List every node of a level, optionally filtered by name
    List {
        /// country, region, state, city or street (plural accepted)
        level: Level,
        /// Accent- and case-insensitive substring of the name
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
    },

    /// List the children of a node
    Children {
        /// Level of the parent node
        level: Level,
        id: NodeId,
    },

    /// Show one node with its path and children
    Show { level: Level, id: NodeId },

    /// Create a node (countries take no parent)
    Create {
        level: Level,
        name: String,
        #[arg(short = 'p', long = "parent")]
        parent: Option<NodeId>,
    },

    /// Rename and/or move a node
    Update {
        level: Level,
        id: NodeId,
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
        /// New parent, one level up
        #[arg(short = 'p', long = "parent")]
        parent: Option<NodeId>,
    },

    /// Delete a node that has no children
    Delete { level: Level, id: NodeId },

    /// Count stores, orders, products and customers under a node
    Rollup {
        level: Level,
        id: NodeId,
        /// JSON file with `stores`, `orders`, `products` and `customers` arrays
        #[arg(short = 'e', long = "entities")]
        entities: PathBuf,
        /// Only print this entity kind
        #[arg(short = 'k', long = "kind")]
        kind: Option<geotree_core::EntityKind>,
    },

    /// Check every parent/child link in the snapshot
    Audit,

    /// Walk down by names, e.g. `drill Nigeria South-West Lagos`
    Drill {
        /// Names to select, country first
        names: Vec<String>,
    },
}

impl Commands {
    /// Whether the command changes the tree and the snapshot must be saved.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Create { .. } | Commands::Update { .. } | Commands::Delete { .. }
        )
    }
}
