//! Search domains: the producers a query fans out to.

use crate::rank::match_rank;
use capy_resources::{Link, Resource, ResourceStore};
use std::cmp::Ordering;
use std::sync::Arc;

/// Width of one rank band. Raw ranks are clamped into it.
pub const BAND_WIDTH: u32 = 100;

/// Fixed rank offset of a domain. Lower bands sort first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankBand(pub u32);

impl RankBand {
    pub const WINDOWS: Self = Self(0);
    pub const NOTIFICATIONS: Self = Self(100);
    pub const RECENT_FILES: Self = Self(200);
    pub const APPLICATIONS: Self = Self(300);
    pub const SESSION: Self = Self(400);
    pub const FILES: Self = Self(500);
    pub const DEVICES: Self = Self(600);

    /// Place a raw match rank inside this band.
    pub fn rank(self, raw: u32) -> u32 {
        self.0 + raw.min(BAND_WIDTH - 1)
    }

    /// Whether `rank` falls inside this band.
    pub fn contains(self, rank: u32) -> bool {
        rank >= self.0 && rank < self.0 + BAND_WIDTH
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainKind {
    /// Cheap, always queried, results kept in the domain's own order.
    AlwaysOn,
    /// Queried only for long enough terms and merged by rank.
    Broad,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub link: Link,
    /// Raw rank from the domain; the aggregator adds the band.
    pub rank: u32,
}

impl Hit {
    pub fn new(link: Link, rank: u32) -> Self {
        Self { link, rank }
    }
}

pub trait SearchDomain: Send + Sync {
    fn name(&self) -> &str;

    fn band(&self) -> RankBand;

    fn kind(&self) -> DomainKind;

    /// Candidates for an already lower-cased `term`.
    fn search(&self, term: &str) -> Vec<Hit>;

    /// Gate checked before [`search`](Self::search).
    fn relevant_for_search(&self, _term: &str) -> bool {
        true
    }
}

type ResourceFilter = Box<dyn Fn(&Resource, &str) -> bool + Send + Sync>;
type ResourceOrder = Box<dyn Fn(&Resource, &Resource) -> Ordering + Send + Sync>;

/// A domain backed by one store collection, matching on title and
/// keywords.
pub struct CollectionDomain {
    name: String,
    prefix: String,
    store: Arc<ResourceStore>,
    band: RankBand,
    kind: DomainKind,
    relevant: Option<ResourceFilter>,
    order: Option<ResourceOrder>,
    with_actions: bool,
}

impl CollectionDomain {
    pub fn new(
        name: impl Into<String>,
        store: Arc<ResourceStore>,
        prefix: impl Into<String>,
        band: RankBand,
        kind: DomainKind,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            store,
            band,
            kind,
            relevant: None,
            order: None,
            with_actions: false,
        }
    }

    /// Per-resource gate, e.g. to keep the launcher's own window out.
    pub fn with_relevance<F>(mut self, relevant: F) -> Self
    where
        F: Fn(&Resource, &str) -> bool + Send + Sync + 'static,
    {
        self.relevant = Some(Box::new(relevant));
        self
    }

    /// Order for always-on results; defaults to path order.
    pub fn with_order<F>(mut self, order: F) -> Self
    where
        F: Fn(&Resource, &Resource) -> Ordering + Send + Sync + 'static,
    {
        self.order = Some(Box::new(order));
        self
    }

    /// Also offer matching action links of each resource.
    pub fn with_action_links(mut self) -> Self {
        self.with_actions = true;
        self
    }
}

impl SearchDomain for CollectionDomain {
    fn name(&self) -> &str {
        &self.name
    }

    fn band(&self) -> RankBand {
        self.band
    }

    fn kind(&self) -> DomainKind {
        self.kind
    }

    fn search(&self, term: &str) -> Vec<Hit> {
        let mut resources = self.store.get_by_prefix(&self.prefix);
        if let Some(order) = &self.order {
            resources.sort_by(|a, b| order(a, b));
        }

        let mut hits = Vec::new();
        for resource in &resources {
            if let Some(relevant) = &self.relevant {
                if !relevant(resource, term) {
                    continue;
                }
            }

            if let Some(rank) = match_rank(term, &resource.title, &resource.keywords) {
                hits.push(Hit::new(resource.search_link(), rank));
            }

            if self.with_actions && !term.is_empty() {
                for link in resource.action_links(term) {
                    let rank = match_rank(term, &link.title, &[]).unwrap_or(0);
                    let mut link = link.clone();
                    link.profile = Some(resource.profile.clone());
                    if link.icon.is_empty() {
                        link.icon = resource.icon.clone();
                    }
                    hits.push(Hit::new(link, rank));
                }
            }
        }
        hits
    }
}
