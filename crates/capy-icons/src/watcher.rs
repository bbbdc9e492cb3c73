//! Rebuilds the icon index when the icon directories change.

use crate::error::IconError;
use crate::paths::icon_extension;
use crate::resolver::IconResolver;
use log::{debug, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, DebouncedEvent, Debouncer, new_debouncer};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Debounce window; a steady stream of changes still rebuilds once per window.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the watch alive; dropping it stops the rebuild thread.
pub struct IconWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl IconWatcher {
    pub fn watch(resolver: Arc<IconResolver>) -> Result<Self, IconError> {
        let (tx, rx) = mpsc::channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(DEBOUNCE, tx)?;

        let dirs = resolver.watched_dirs();
        for dir in &dirs {
            if let Err(e) = debouncer.watcher().watch(dir, RecursiveMode::Recursive) {
                warn!("Cannot watch {}: {}", dir.display(), e);
            }
        }
        info!("Watching {} icon directories", dirs.len());

        thread::Builder::new()
            .name("icon-watcher".to_string())
            .spawn(move || {
                for result in rx {
                    match result {
                        Ok(events) if needs_reload(&events) => {
                            info!("Icon directories changed, reloading");
                            resolver.reload();
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Icon watch error: {}", e),
                    }
                }
                debug!("Icon watcher stopped");
            })?;

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

fn needs_reload(events: &[DebouncedEvent]) -> bool {
    events.iter().any(|event| is_relevant(&event.path))
}

/// Icon files, theme indexes and directories; not caches or editor droppings.
fn is_relevant(path: &Path) -> bool {
    match path.extension() {
        None => true,
        Some(_) if path.file_name().is_some_and(|n| n == "index.theme") => true,
        Some(_) => icon_extension(path).is_some(),
    }
}
