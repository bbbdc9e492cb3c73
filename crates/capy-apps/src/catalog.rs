//! App Catalog implementation.

use crate::desktop_entry::{DesktopApp, desktop_file_id, parse_desktop_file};
use capy_resources::{Change, CollectionWriter, Resource, ResourceStore, StoreError};
use log::{debug, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Collection the catalog writes to.
pub const APPLICATIONS_PREFIX: &str = "/application/";

const RESCAN_DELAY: Duration = Duration::from_millis(500);

/// The application catalog: sole writer of `/application/`.
pub struct AppCatalog {
    writer: CollectionWriter,
    dirs: Vec<PathBuf>,
}

impl AppCatalog {
    pub fn new(store: &Arc<ResourceStore>, dirs: Vec<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            writer: store.claim(APPLICATIONS_PREFIX)?,
            dirs,
        })
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Desktop applications indexed by ID (e.g. "firefox.desktop").
    /// An id found in an earlier directory shadows later ones.
    pub fn scan(&self) -> BTreeMap<String, DesktopApp> {
        let mut apps = BTreeMap::new();
        let mut seen = HashSet::new();

        for dir in &self.dirs {
            if !dir.exists() {
                continue;
            }

            let walker = walkdir::WalkDir::new(dir)
                .follow_links(true)
                .max_depth(3)
                .sort_by_file_name();
            for entry in walker.into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                let Some(id) = desktop_file_id(dir, path) else {
                    continue;
                };
                // A hidden entry still shadows the same id further down.
                if !seen.insert(id.clone()) {
                    continue;
                }
                if let Some(app) = parse_desktop_file(&id, path) {
                    apps.insert(id, app);
                }
            }
        }

        apps
    }

    /// Rescan and swap the collection.
    pub fn refresh(&self) -> Result<Vec<Change>, StoreError> {
        info!("Scanning app catalog...");
        let resources: Vec<Resource> = self
            .scan()
            .values()
            .map(|app| app.to_resource(self.writer.path_of(&app.id)))
            .collect();
        let count = resources.len();
        let changes = self.writer.replace_with(resources)?;
        info!(
            "App catalog refresh complete: {} apps, {} changes",
            count,
            changes.len()
        );
        Ok(changes)
    }

    /// Rescan whenever an application directory changes.
    pub fn watch(self: Arc<Self>) -> Result<CatalogWatcher, notify::Error> {
        let (tx, rx) = mpsc::channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(RESCAN_DELAY, tx)?;
        for dir in self.dirs.iter().filter(|d| d.is_dir()) {
            if let Err(e) = debouncer.watcher().watch(dir, RecursiveMode::Recursive) {
                warn!("Cannot watch {}: {}", dir.display(), e);
            }
        }

        thread::Builder::new()
            .name("app-catalog".to_string())
            .spawn(move || {
                for result in rx {
                    match result {
                        Ok(events) if events.iter().any(|e| affects_catalog(&e.path)) => {
                            debug!("Application change: {} paths", events.len());
                            if let Err(e) = self.refresh() {
                                warn!("App catalog refresh failed: {}", e);
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Application watch error: {}", e),
                    }
                }
            })
            .map_err(notify::Error::io)?;

        Ok(CatalogWatcher {
            _debouncer: debouncer,
        })
    }
}

/// Desktop files and the directories holding them.
fn affects_catalog(path: &Path) -> bool {
    match path.extension() {
        None => true,
        Some(ext) => ext == "desktop",
    }
}

/// Keeps the directory watch alive; dropping it stops the rescan thread.
pub struct CatalogWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

/// Get the application resource for a window's StartupWMClass, falling
/// back to the desktop file basename.
pub fn app_for_wm_class(store: &ResourceStore, wm_class: &str) -> Option<Arc<Resource>> {
    let wanted = wm_class.to_lowercase();
    store
        .find_first(APPLICATIONS_PREFIX, |res| {
            res.details
                .get("startupWmClass")
                .and_then(|v| v.as_str())
                .is_some_and(|c| c.to_lowercase() == wanted)
        })
        .or_else(|| {
            store.find_first(APPLICATIONS_PREFIX, |res| {
                res.path
                    .trim_start_matches(APPLICATIONS_PREFIX)
                    .trim_end_matches(".desktop")
                    .to_lowercase()
                    == wanted
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use capy_resources::ChangeBus;
    use std::fs;

    fn write_app(dir: &std::path::Path, rel: &str, name: &str, extra: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            path,
            format!(
                "[Desktop Entry]\nType=Application\nName={}\nExec={}\n{}\n",
                name,
                name.to_lowercase(),
                extra
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_refresh_publishes_applications() {
        let user = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        write_app(user.path(), "editor.desktop", "UserEditor", "");
        write_app(system.path(), "editor.desktop", "SystemEditor", "");
        write_app(system.path(), "kde4/kate.desktop", "Kate", "StartupWMClass=KateWindow");
        write_app(system.path(), "hidden.desktop", "Hidden", "NoDisplay=true");

        let store = Arc::new(ResourceStore::new(ChangeBus::new()));
        let catalog = AppCatalog::new(
            &store,
            vec![user.path().to_path_buf(), system.path().to_path_buf()],
        )
        .unwrap();
        catalog.refresh().unwrap();

        assert_eq!(
            store.paths(APPLICATIONS_PREFIX),
            vec!["/application/editor.desktop", "/application/kde4-kate.desktop"]
        );
        assert_eq!(
            store.get("/application/editor.desktop").unwrap().title,
            "UserEditor"
        );

        fs::remove_file(user.path().join("editor.desktop")).unwrap();
        let changes = catalog.refresh().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(
            store.get("/application/editor.desktop").unwrap().title,
            "SystemEditor"
        );
    }

    #[test]
    fn test_hidden_user_entry_shadows_system() {
        let user = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        write_app(user.path(), "editor.desktop", "Editor", "Hidden=true");
        write_app(system.path(), "editor.desktop", "Editor", "");

        let store = Arc::new(ResourceStore::new(ChangeBus::new()));
        let catalog = AppCatalog::new(
            &store,
            vec![user.path().to_path_buf(), system.path().to_path_buf()],
        )
        .unwrap();
        assert!(catalog.scan().is_empty());
    }

    #[test]
    fn test_single_catalog_per_store() {
        let store = Arc::new(ResourceStore::new(ChangeBus::new()));
        let _first = AppCatalog::new(&store, Vec::new()).unwrap();
        assert!(matches!(
            AppCatalog::new(&store, Vec::new()),
            Err(StoreError::CollectionClaimed(_))
        ));
    }

    #[test]
    fn test_affects_catalog() {
        assert!(affects_catalog(Path::new("/usr/share/applications/foot.desktop")));
        assert!(affects_catalog(Path::new("/usr/share/applications/kde4")));
        assert!(!affects_catalog(Path::new("/usr/share/applications/mimeinfo.cache")));
    }

    #[test]
    fn test_watch_rescans_on_new_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ResourceStore::new(ChangeBus::new()));
        let catalog = Arc::new(AppCatalog::new(&store, vec![dir.path().to_path_buf()]).unwrap());
        catalog.refresh().unwrap();
        let _watcher = Arc::clone(&catalog).watch().unwrap();

        write_app(dir.path(), "foot.desktop", "Foot", "");

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while store.get("/application/foot.desktop").is_none() {
            assert!(std::time::Instant::now() < deadline, "catalog never rescanned");
            thread::sleep(Duration::from_millis(50));
        }
    }

    #[test]
    fn test_app_for_wm_class() {
        let dir = tempfile::tempdir().unwrap();
        write_app(dir.path(), "org.kde.kate.desktop", "Kate", "StartupWMClass=KateWindow");
        write_app(dir.path(), "foot.desktop", "Foot", "");

        let store = Arc::new(ResourceStore::new(ChangeBus::new()));
        let catalog = AppCatalog::new(&store, vec![dir.path().to_path_buf()]).unwrap();
        catalog.refresh().unwrap();

        assert_eq!(app_for_wm_class(&store, "katewindow").unwrap().title, "Kate");
        assert_eq!(app_for_wm_class(&store, "Foot").unwrap().title, "Foot");
        assert!(app_for_wm_class(&store, "nothing").is_none());
    }
}
