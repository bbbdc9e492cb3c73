//! capy-apps: Desktop application catalog for CapyServices.
//!
//! Scans the XDG application directories for `.desktop` files and keeps
//! the `/application/` collection of the resource store in sync with them.

mod catalog;
mod desktop_entry;
mod paths;

pub use catalog::{APPLICATIONS_PREFIX, AppCatalog, CatalogWatcher, app_for_wm_class};
pub use desktop_entry::{DesktopAction, DesktopApp, parse_desktop_entry};
pub use paths::application_directories;

use capy_resources::ResourceStore;
use capy_search::{CollectionDomain, DomainKind, RankBand};
use std::sync::Arc;

/// Search domain over installed applications and their actions.
pub fn application_domain(store: Arc<ResourceStore>) -> CollectionDomain {
    CollectionDomain::new(
        "applications",
        store,
        APPLICATIONS_PREFIX,
        RankBand::APPLICATIONS,
        DomainKind::Broad,
    )
    .with_action_links()
}

#[cfg(test)]
mod tests {
    use super::*;
    use capy_resources::ChangeBus;
    use capy_search::SearchDomain;
    use std::fs;

    #[test]
    fn test_application_domain_matches_keywords() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("foot.desktop"),
            "[Desktop Entry]\nType=Application\nName=Foot\nExec=foot\nKeywords=shell;prompt;\n",
        )
        .unwrap();

        let store = Arc::new(ResourceStore::new(ChangeBus::new()));
        let catalog = AppCatalog::new(&store, vec![dir.path().to_path_buf()]).unwrap();
        catalog.refresh().unwrap();

        let domain = application_domain(store);
        let hits = domain.search("shell");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].link.title, "Foot");
        assert_eq!(hits[0].rank, capy_search::KEYWORD_RANK);
    }
}
