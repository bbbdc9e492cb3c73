//! Fan-out and merge of one query across all search domains.

use crate::domain::{DomainKind, Hit, SearchDomain};
use capy_resources::{Link, ResourceStore};
use log::{debug, warn};
use std::sync::Arc;
use std::thread;

/// Default minimum term length for broad domains.
pub const DEFAULT_MIN_TERM_LENGTH: usize = 3;

pub struct SearchAggregator {
    domains: Vec<Arc<dyn SearchDomain>>,
    min_term_length: usize,
    store: Option<Arc<ResourceStore>>,
}

impl Default for SearchAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TERM_LENGTH)
    }
}

impl SearchAggregator {
    pub fn new(min_term_length: usize) -> Self {
        Self {
            domains: Vec::new(),
            min_term_length,
            store: None,
        }
    }

    /// Store used for path completion.
    pub fn with_store(mut self, store: Arc<ResourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn register(&mut self, domain: Arc<dyn SearchDomain>) {
        debug!(
            "Search domain {} registered in band {}",
            domain.name(),
            domain.band().0
        );
        self.domains.push(domain);
        self.domains.sort_by_key(|d| d.band());
    }

    pub fn min_term_length(&self) -> usize {
        self.min_term_length
    }

    /// Ranked links for `term`.
    ///
    /// Always-on domains come first, each in its own order. Broad domains
    /// are skipped for terms shorter than the minimum; their hits are
    /// merged and stably sorted by banded rank.
    pub fn query(&self, term: &str) -> Vec<Link> {
        let term = term.to_lowercase();
        let broad_enabled = term.chars().count() >= self.min_term_length;

        let active: Vec<&Arc<dyn SearchDomain>> = self
            .domains
            .iter()
            .filter(|d| d.kind() == DomainKind::AlwaysOn || broad_enabled)
            .filter(|d| d.relevant_for_search(&term))
            .collect();

        let results: Vec<(DomainKind, Vec<Hit>)> = thread::scope(|scope| {
            let handles: Vec<_> = active
                .iter()
                .map(|domain| {
                    let term = term.as_str();
                    let band = domain.band();
                    let kind = domain.kind();
                    let handle = scope.spawn(move || {
                        domain
                            .search(term)
                            .into_iter()
                            .map(|hit| Hit::new(hit.link, band.rank(hit.rank)))
                            .collect::<Vec<_>>()
                    });
                    (domain.name(), kind, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, kind, handle)| {
                    let hits = handle.join().unwrap_or_else(|_| {
                        warn!("Search domain {} panicked", name);
                        Vec::new()
                    });
                    (kind, hits)
                })
                .collect()
        });

        let mut always_on = Vec::new();
        let mut broad = Vec::new();
        for (kind, hits) in results {
            match kind {
                DomainKind::AlwaysOn => always_on.extend(hits),
                DomainKind::Broad => broad.extend(hits),
            }
        }
        broad.sort_by_key(|hit| hit.rank);

        debug!(
            "Search {:?}: {} always-on, {} broad hits",
            term,
            always_on.len(),
            broad.len()
        );
        always_on
            .into_iter()
            .chain(broad)
            .map(|hit| hit.link)
            .collect()
    }

    /// Reserved endpoints and stored paths starting with `prefix`, sorted.
    pub fn complete(&self, prefix: &str) -> Vec<String> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        let mut paths: Vec<String> = store
            .reserved_paths()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .chain(store.paths(prefix))
            .collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CollectionDomain, RankBand};
    use capy_resources::{ChangeBus, Profile, Resource};

    fn session() -> (Arc<ResourceStore>, SearchAggregator) {
        let store = Arc::new(ResourceStore::new(ChangeBus::new()));
        let mut aggregator = SearchAggregator::new(3).with_store(store.clone());
        aggregator.register(Arc::new(CollectionDomain::new(
            "applications",
            store.clone(),
            "/application/",
            RankBand::APPLICATIONS,
            DomainKind::Broad,
        )));
        aggregator.register(Arc::new(CollectionDomain::new(
            "windows",
            store.clone(),
            "/window/",
            RankBand::WINDOWS,
            DomainKind::AlwaysOn,
        )));
        aggregator.register(Arc::new(CollectionDomain::new(
            "notifications",
            store.clone(),
            "/notification/",
            RankBand::NOTIFICATIONS,
            DomainKind::AlwaysOn,
        )));
        (store, aggregator)
    }

    fn put(store: &ResourceStore, path: &str, title: &str, profile: Profile) {
        store.put(path, Resource::new(path, title, profile)).unwrap();
    }

    #[test]
    fn test_bands_beat_match_position() {
        let (store, aggregator) = session();
        put(&store, "/window/1", "Firefox", Profile::Window);
        put(
            &store,
            "/application/firefox.desktop",
            "Firefox Web Browser",
            Profile::Application,
        );
        put(&store, "/application/campfire.desktop", "Campfire", Profile::Application);

        let hrefs: Vec<_> = aggregator.query("fire").into_iter().map(|l| l.href).collect();
        assert_eq!(
            hrefs,
            vec![
                "/window/1",
                "/application/firefox.desktop",
                "/application/campfire.desktop",
            ]
        );
    }

    #[test]
    fn test_short_terms_skip_broad_domains() {
        let (store, aggregator) = session();
        put(&store, "/window/1", "Terminal", Profile::Window);
        put(&store, "/notification/7", "Battery low", Profile::Notification);
        put(&store, "/application/foot.desktop", "Foot", Profile::Application);

        let all: Vec<_> = aggregator.query("").into_iter().map(|l| l.href).collect();
        assert_eq!(all, vec!["/window/1", "/notification/7"]);

        let short: Vec<_> = aggregator.query("a").into_iter().map(|l| l.href).collect();
        assert_eq!(short, vec!["/window/1", "/notification/7"]);

        let long = aggregator.query("foo");
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].href, "/application/foot.desktop");
    }

    #[test]
    fn test_always_on_not_resorted() {
        let store = Arc::new(ResourceStore::new(ChangeBus::new()));
        put(&store, "/window/1", "xx term", Profile::Window);
        put(&store, "/window/2", "term", Profile::Window);

        let mut aggregator = SearchAggregator::new(3);
        aggregator.register(Arc::new(CollectionDomain::new(
            "windows",
            store,
            "/window/",
            RankBand::WINDOWS,
            DomainKind::AlwaysOn,
        )));

        let hrefs: Vec<_> = aggregator.query("TERM").into_iter().map(|l| l.href).collect();
        assert_eq!(hrefs, vec!["/window/1", "/window/2"]);
    }

    struct Gated;

    impl SearchDomain for Gated {
        fn name(&self) -> &str {
            "gated"
        }
        fn band(&self) -> RankBand {
            RankBand::DEVICES
        }
        fn kind(&self) -> DomainKind {
            DomainKind::Broad
        }
        fn search(&self, _term: &str) -> Vec<Hit> {
            vec![Hit::new(Link::new("/device/bat0", capy_resources::Relation::DefaultAction), 0)]
        }
        fn relevant_for_search(&self, term: &str) -> bool {
            term.starts_with("bat")
        }
    }

    #[test]
    fn test_relevance_gate() {
        let mut aggregator = SearchAggregator::new(3);
        aggregator.register(Arc::new(Gated));
        assert_eq!(aggregator.query("battery").len(), 1);
        assert!(aggregator.query("firefox").is_empty());
    }

    #[test]
    fn test_complete() {
        let (store, aggregator) = session();
        put(&store, "/window/1", "Terminal", Profile::Window);
        put(&store, "/window/2", "Editor", Profile::Window);

        assert_eq!(aggregator.complete("/window/"), vec!["/window/1", "/window/2"]);
        assert_eq!(aggregator.complete("/sea"), vec!["/search"]);

        put(&store, "/application/x.desktop", "X", Profile::Application);
        put(&store, "/device/BAT0", "Battery", Profile::Device);
        assert_eq!(
            aggregator.complete("/"),
            vec![
                "/application/x.desktop",
                "/complete",
                "/device/BAT0",
                "/icon",
                "/search",
                "/watch",
                "/window/1",
                "/window/2",
            ]
        );
    }
}
