// crates/geotree-core/src/common.rs
use crate::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One of the five levels of the location hierarchy.
///
/// The order of the variants is the order of the hierarchy: every node's
/// parent lives exactly one level up, and `Country` is the only root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Country,
    Region,
    State,
    City,
    Street,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Country,
        Level::Region,
        Level::State,
        Level::City,
        Level::Street,
    ];

    /// Number of parent hops between a node of this level and its country.
    #[inline]
    pub fn depth(self) -> usize {
        self as usize
    }

    pub fn from_depth(depth: usize) -> Option<Level> {
        Self::ALL.get(depth).copied()
    }

    /// The level directly above, `None` for `Country`.
    pub fn parent(self) -> Option<Level> {
        self.depth().checked_sub(1).and_then(Self::from_depth)
    }

    /// The level directly below, `None` for `Street`.
    pub fn child(self) -> Option<Level> {
        Self::from_depth(self.depth() + 1)
    }

    pub fn is_root(self) -> bool {
        self == Level::Country
    }

    pub fn is_leaf(self) -> bool {
        self == Level::Street
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Country => "country",
            Level::Region => "region",
            Level::State => "state",
            Level::City => "city",
            Level::Street => "street",
        }
    }

    /// Name of the record set this level is persisted in.
    pub fn collection(self) -> &'static str {
        match self {
            Level::Country => "countries",
            Level::Region => "regions",
            Level::State => "states",
            Level::City => "cities",
            Level::Street => "streets",
        }
    }

    /// Children level, or `InvalidLevel` when asked below the leaf.
    pub(crate) fn child_or_err(self) -> Result<Level> {
        self.child()
            .ok_or_else(|| GeoError::InvalidLevel(format!("{self} is the leaf level and has no children")))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = GeoError;

    /// Accepts the singular or the collection name, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Level::ALL
            .into_iter()
            .find(|l| s.eq_ignore_ascii_case(l.as_str()) || s.eq_ignore_ascii_case(l.collection()))
            .ok_or_else(|| GeoError::InvalidLevel(format!("unknown level {s:?}")))
    }
}

/// Stable identity of a node: 24 lowercase hex characters.
///
/// The first eight characters encode the creation second, the remaining
/// sixteen are random, so ids sort roughly by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub const LEN: usize = 24;

    pub fn generate() -> Self {
        let secs = chrono::Utc::now().timestamp() as u32;
        let random = uuid::Uuid::new_v4().simple().to_string();
        NodeId(format!("{secs:08x}{}", &random[..16]))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let valid = s.len() == Self::LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(NodeId(s.to_owned()))
        } else {
            Err(GeoError::InvalidId(s.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = GeoError;

    fn try_from(s: String) -> Result<Self> {
        NodeId::parse(&s)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl FromStr for NodeId {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        NodeId::parse(s)
    }
}

/// Simple aggregate statistics for the hierarchy.
///
/// Returned by [`crate::Hierarchy::stats`]; one count per record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub countries: usize,
    pub regions: usize,
    pub states: usize,
    pub cities: usize,
    pub streets: usize,
}

impl TreeStats {
    pub fn get(&self, level: Level) -> usize {
        match level {
            Level::Country => self.countries,
            Level::Region => self.regions,
            Level::State => self.states,
            Level::City => self.cities,
            Level::Street => self.streets,
        }
    }

    pub(crate) fn set(&mut self, level: Level, count: usize) {
        match level {
            Level::Country => self.countries = count,
            Level::Region => self.regions = count,
            Level::State => self.states = count,
            Level::City => self.cities = count,
            Level::Street => self.streets = count,
        }
    }

    pub fn total(&self) -> usize {
        Level::ALL.into_iter().map(|l| self.get(l)).sum()
    }
}

/// Tuning for the consistency engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many times an update or delete re-reads and re-commits after
    /// losing an optimistic version check on a neighbouring document. Creates
    /// are not bounded by this.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_retries: 8 }
    }
}

/// Tuning for the cascading selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorConfig {
    /// A fetch that has not resolved within this interval is reported as a
    /// failed fetch.
    pub fetch_timeout: Duration,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
        }
    }
}
