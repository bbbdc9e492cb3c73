//! App catalog service.
//!
//! Wraps the capy-apps crate: one initial scan on a background thread,
//! then a rescan whenever an application directory changes.

use capy_apps::{AppCatalog, CatalogWatcher, application_directories};
use capy_resources::ResourceStore;
use log::{info, warn};
use std::sync::{Arc, Mutex, PoisonError};

/// Keeps the application directory watch alive.
pub type AppsHandle = Arc<Mutex<Option<CatalogWatcher>>>;

/// Start background indexing of apps.
/// The returned handle keeps the directory watch alive.
pub fn start_indexing(store: &Arc<ResourceStore>) -> Option<AppsHandle> {
    let catalog = match AppCatalog::new(store, application_directories()) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            warn!("App catalog not started: {}", e);
            return None;
        }
    };

    info!("Starting app catalog background indexing (capy-apps)...");

    let handle = Arc::new(Mutex::new(None));
    let slot = handle.clone();
    let spawned = std::thread::Builder::new()
        .name("app-index".to_string())
        .spawn(move || {
            if let Err(e) = catalog.refresh() {
                warn!("App catalog refresh failed: {}", e);
            }
            match catalog.watch() {
                Ok(watcher) => {
                    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(watcher);
                }
                Err(e) => warn!("Application directories not watched: {}", e),
            }
        });

    if let Err(e) = spawned {
        warn!("Failed to spawn app indexing: {}", e);
        return None;
    }
    Some(handle)
}
