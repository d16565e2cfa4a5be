// crates/geotree-core/src/selector.rs

//! # Cascading Selector
//!
//! Client-side drill-down state: pick a country, its regions load; pick a
//! region, its states load; and so on down to the streets of a city.
//!
//! The machine is single-threaded and cooperative. Selecting synchronously
//! updates [`Selection`], discards every deeper list and hands back a
//! [`FetchRequest`] for the next level down. The caller runs the request
//! whenever it likes and feeds the [`FetchOutcome`] back through
//! [`CascadingSelector::apply`], which drops it if the level it was meant
//! for has since been cleared or re-requested. Nothing is retried
//! automatically.
//!
//! ```no_run
//! use geotree_core::{CascadingSelector, Hierarchy, Level};
//!
//! # async fn demo(h: Hierarchy) -> geotree_core::Result<()> {
//! let mut selector = CascadingSelector::default();
//! selector.refresh_countries(&h).await;
//! let nigeria = selector.items(Level::Country)[0].id.clone();
//! selector.select_and_fetch(&h, Level::Country, &nigeria).await?;
//! for region in selector.items(Level::Region) {
//!     println!("{}", region.name);
//! }
//! # Ok(())
//! # }
//! ```

use crate::api::ChildSummary;
use crate::common::{Level, NodeId, SelectorConfig};
use crate::error::{GeoError, Result};
use crate::traits::ChildFetcher;
use std::time::Duration;
use tracing::{debug, warn};

/// What is selected, one variant per depth. Each variant carries exactly
/// the choices valid at that depth, so a city can never be selected without
/// its state, region and country.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    NoSelection,
    CountrySelected {
        country: ChildSummary,
    },
    RegionSelected {
        country: ChildSummary,
        region: ChildSummary,
    },
    StateSelected {
        country: ChildSummary,
        region: ChildSummary,
        state: ChildSummary,
    },
    CitySelected {
        country: ChildSummary,
        region: ChildSummary,
        state: ChildSummary,
        city: ChildSummary,
    },
}

impl Selection {
    /// Deepest selected level.
    pub fn level(&self) -> Option<Level> {
        match self {
            Selection::NoSelection => None,
            Selection::CountrySelected { .. } => Some(Level::Country),
            Selection::RegionSelected { .. } => Some(Level::Region),
            Selection::StateSelected { .. } => Some(Level::State),
            Selection::CitySelected { .. } => Some(Level::City),
        }
    }

    /// Selected items from the country down.
    pub fn path(&self) -> Vec<&ChildSummary> {
        match self {
            Selection::NoSelection => vec![],
            Selection::CountrySelected { country } => vec![country],
            Selection::RegionSelected { country, region } => vec![country, region],
            Selection::StateSelected {
                country,
                region,
                state,
            } => vec![country, region, state],
            Selection::CitySelected {
                country,
                region,
                state,
                city,
            } => vec![country, region, state, city],
        }
    }

    pub fn selected(&self, level: Level) -> Option<&ChildSummary> {
        self.path().get(level.depth()).copied()
    }

    fn into_path(self) -> Vec<ChildSummary> {
        match self {
            Selection::NoSelection => vec![],
            Selection::CountrySelected { country } => vec![country],
            Selection::RegionSelected { country, region } => vec![country, region],
            Selection::StateSelected {
                country,
                region,
                state,
            } => vec![country, region, state],
            Selection::CitySelected {
                country,
                region,
                state,
                city,
            } => vec![country, region, state, city],
        }
    }

    /// Inverse of `into_path`; anything past the city is ignored.
    fn from_path(path: Vec<ChildSummary>) -> Self {
        let mut it = path.into_iter();
        match (it.next(), it.next(), it.next(), it.next()) {
            (None, ..) => Selection::NoSelection,
            (Some(country), None, ..) => Selection::CountrySelected { country },
            (Some(country), Some(region), None, _) => Selection::RegionSelected { country, region },
            (Some(country), Some(region), Some(state), None) => Selection::StateSelected {
                country,
                region,
                state,
            },
            (Some(country), Some(region), Some(state), Some(city)) => Selection::CitySelected {
                country,
                region,
                state,
                city,
            },
        }
    }

    /// Keeps the choices down to and including `keep`.
    fn truncated(self, keep: Option<Level>) -> Self {
        let mut path = self.into_path();
        path.truncate(keep.map_or(0, |l| l.depth() + 1));
        Self::from_path(path)
    }

    /// Adds a choice at `level`, which must sit directly below the current
    /// deepest selection.
    fn extended(self, level: Level, item: ChildSummary) -> Result<Self> {
        if level.is_leaf() {
            return Err(GeoError::InvalidLevel(format!("a {level} cannot be selected")));
        }
        if self.level() != level.parent() {
            return Err(GeoError::InvalidLevel(format!(
                "cannot select a {level} while the deepest selection is {:?}",
                self.level()
            )));
        }
        let mut path = self.into_path();
        path.push(item);
        Ok(Self::from_path(path))
    }
}

/// Identifies one fetch; a response is applied only while its level is
/// still waiting on this exact ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

/// The list shown for one level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Listing {
    #[default]
    Empty,
    Loading {
        ticket: Ticket,
    },
    Ready(Vec<ChildSummary>),
    Failed(String),
}

impl Listing {
    /// Items to display; empty unless the list is ready.
    pub fn items(&self) -> &[ChildSummary] {
        match self {
            Listing::Ready(items) => items,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Listing::Loading { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Listing::Ready(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Listing::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// A child-list fetch the selector is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    ticket: Ticket,
    level: Level,
    parent: Option<NodeId>,
    timeout: Duration,
}

impl FetchRequest {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Level of the nodes being fetched.
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// Runs the fetch, turning an overrun of the timeout into a failure.
    pub async fn run<F: ChildFetcher + ?Sized>(self, fetcher: &F) -> FetchOutcome {
        let fetch = fetcher.fetch_children(self.level, self.parent.clone());
        let result = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(GeoError::Timeout {
                level: self.level,
                after: self.timeout,
            }),
        };
        FetchOutcome {
            ticket: self.ticket,
            level: self.level,
            result,
        }
    }
}

/// A resolved fetch, to be handed to [`CascadingSelector::apply`].
#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: Ticket,
    pub level: Level,
    pub result: Result<Vec<ChildSummary>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The list for the level was updated (with items or with an error).
    Applied,
    /// The level was cleared or re-requested since; the outcome was dropped.
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct CascadingSelector {
    selection: Selection,
    lists: [Listing; 5],
    next_ticket: u64,
    config: SelectorConfig,
}

impl CascadingSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn listing(&self, level: Level) -> &Listing {
        &self.lists[level.depth()]
    }

    pub fn items(&self, level: Level) -> &[ChildSummary] {
        self.listing(level).items()
    }

    /// The level whose list is being drilled into: the children of the
    /// deepest selection, or the countries when nothing is selected.
    pub fn focus_level(&self) -> Level {
        self.selection
            .level()
            .and_then(Level::child)
            .unwrap_or(Level::Country)
    }

    /// The first level whose last fetch failed, with the message.
    pub fn error(&self) -> Option<(Level, &str)> {
        Level::ALL
            .into_iter()
            .find_map(|l| self.listing(l).error().map(|e| (l, e)))
    }

    pub fn is_loading(&self) -> bool {
        self.lists.iter().any(Listing::is_loading)
    }

    /// Starts over: no selection, every list discarded, countries loading.
    pub fn load_countries(&mut self) -> FetchRequest {
        self.selection = Selection::NoSelection;
        self.clear_below(Level::Country);
        self.begin(Level::Country, None)
    }

    /// Selects the item `id` from the list shown at `level`.
    ///
    /// Every selection and list below `level` is discarded before this
    /// returns; the returned request fetches the children of the new choice.
    pub fn select(&mut self, level: Level, id: &NodeId) -> Result<FetchRequest> {
        let child_level = level
            .child()
            .ok_or_else(|| GeoError::InvalidLevel(format!("a {level} cannot be selected")))?;
        if let Some(above) = level.parent() {
            if self.selection.selected(above).is_none() {
                return Err(GeoError::InvalidLevel(format!(
                    "select a {above} before selecting a {level}"
                )));
            }
        }
        let item = self
            .items(level)
            .iter()
            .find(|item| &item.id == id)
            .cloned()
            .ok_or_else(|| GeoError::not_found(level, id))?;

        self.selection = self
            .selection
            .clone()
            .truncated(level.parent())
            .extended(level, item)?;
        self.clear_below(child_level);
        Ok(self.begin(child_level, Some(id.clone())))
    }

    /// Jumps back to an ancestor: `None` for the country list, or a level
    /// that is currently selected.
    ///
    /// Behaves like re-selecting the ancestor's current choice, except that
    /// no list at or above the ancestor's children is fetched again when it
    /// is already loaded. A request is returned only if the children list
    /// was not ready (still loading or failed).
    pub fn breadcrumb(&mut self, to: Option<Level>) -> Result<Option<FetchRequest>> {
        let Some(level) = to else {
            self.selection = Selection::NoSelection;
            self.clear_below(Level::Country);
            return Ok(None);
        };
        let chosen = self
            .selection
            .selected(level)
            .map(|item| item.id.clone())
            .ok_or_else(|| GeoError::InvalidLevel(format!("no {level} is selected")))?;
        let child_level = level.child_or_err()?;

        self.selection = std::mem::take(&mut self.selection).truncated(Some(level));
        self.clear_below(child_level);
        if self.listing(child_level).is_ready() {
            return Ok(None);
        }
        Ok(Some(self.begin(child_level, Some(chosen))))
    }

    /// Applies a fetch result if its level is still waiting on it.
    pub fn apply(&mut self, outcome: FetchOutcome) -> ApplyOutcome {
        let slot = &mut self.lists[outcome.level.depth()];
        match &*slot {
            Listing::Loading { ticket } if *ticket == outcome.ticket => {}
            _ => {
                debug!(kind = %outcome.level, ticket = outcome.ticket.0, "dropping stale fetch result");
                return ApplyOutcome::Stale;
            }
        }
        *slot = match outcome.result {
            Ok(items) => Listing::Ready(items),
            Err(err) => {
                warn!(kind = %outcome.level, error = %err, "fetch failed");
                Listing::Failed(err.to_string())
            }
        };
        ApplyOutcome::Applied
    }

    /// Select, fetch and apply in one go.
    pub async fn select_and_fetch<F: ChildFetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        level: Level,
        id: &NodeId,
    ) -> Result<ApplyOutcome> {
        let request = self.select(level, id)?;
        let outcome = request.run(fetcher).await;
        Ok(self.apply(outcome))
    }

    /// Reset and reload the country list in one go.
    pub async fn refresh_countries<F: ChildFetcher + ?Sized>(&mut self, fetcher: &F) -> ApplyOutcome {
        let request = self.load_countries();
        let outcome = request.run(fetcher).await;
        self.apply(outcome)
    }

    fn begin(&mut self, level: Level, parent: Option<NodeId>) -> FetchRequest {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.lists[level.depth()] = Listing::Loading { ticket };
        FetchRequest {
            ticket,
            level,
            parent,
            timeout: self.config.fetch_timeout,
        }
    }

    /// Discards every list strictly below `level`.
    fn clear_below(&mut self, level: Level) {
        for list in &mut self.lists[level.depth() + 1..] {
            *list = Listing::Empty;
        }
    }
}
