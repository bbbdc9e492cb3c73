//! Search wiring: one domain per collection, in fixed rank bands.

use crate::services::power::DEVICES_PREFIX;
use capy_resources::{Resource, ResourceStore};
use capy_search::{CollectionDomain, DomainKind, RankBand, SearchAggregator};
use std::sync::Arc;

/// Title prefix of the launcher's own window.
pub const LAUNCHER_TITLE: &str = "Capy launcher";

fn not_launcher(resource: &Resource, _term: &str) -> bool {
    !resource.title.starts_with(LAUNCHER_TITLE)
}

/// Windows listed in stacking order when producers provide one.
fn by_stacking(a: &Resource, b: &Resource) -> std::cmp::Ordering {
    let key = |r: &Resource| r.details.get("stacking").and_then(|v| v.as_u64());
    key(a).cmp(&key(b))
}

/// Newest first, for collections carrying a `timestamp` detail.
fn newest_first(a: &Resource, b: &Resource) -> std::cmp::Ordering {
    let key = |r: &Resource| r.details.get("timestamp").and_then(|v| v.as_u64());
    key(b).cmp(&key(a))
}

pub fn build_aggregator(store: &Arc<ResourceStore>, min_term_length: usize) -> SearchAggregator {
    let mut aggregator = SearchAggregator::new(min_term_length).with_store(store.clone());

    aggregator.register(Arc::new(
        CollectionDomain::new(
            "windows",
            store.clone(),
            "/window/",
            RankBand::WINDOWS,
            DomainKind::AlwaysOn,
        )
        .with_relevance(not_launcher)
        .with_order(by_stacking),
    ));
    aggregator.register(Arc::new(
        CollectionDomain::new(
            "notifications",
            store.clone(),
            "/notification/",
            RankBand::NOTIFICATIONS,
            DomainKind::AlwaysOn,
        )
        .with_order(newest_first),
    ));
    aggregator.register(Arc::new(
        CollectionDomain::new(
            "recent files",
            store.clone(),
            "/recent/",
            RankBand::RECENT_FILES,
            DomainKind::AlwaysOn,
        )
        .with_order(newest_first),
    ));
    aggregator.register(Arc::new(capy_apps::application_domain(store.clone())));
    aggregator.register(Arc::new(
        CollectionDomain::new(
            "session",
            store.clone(),
            "/session/",
            RankBand::SESSION,
            DomainKind::Broad,
        )
        .with_action_links(),
    ));
    aggregator.register(Arc::new(CollectionDomain::new(
        "files",
        store.clone(),
        "/file/",
        RankBand::FILES,
        DomainKind::Broad,
    )));
    aggregator.register(Arc::new(CollectionDomain::new(
        "devices",
        store.clone(),
        DEVICES_PREFIX,
        RankBand::DEVICES,
        DomainKind::Broad,
    )));

    aggregator
}
