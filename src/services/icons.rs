//! Icon service.
//!
//! Owns the icon resolver, publishes the installed themes under
//! `/icontheme/` and keeps the index fresh while icon directories change.

use capy_icons::{IconConfig, IconError, IconResolver, IconWatcher};
use capy_resources::{CollectionWriter, ResourceStore};
use log::{info, warn};
use std::sync::Arc;

pub const ICON_THEMES_PREFIX: &str = "/icontheme/";

pub struct IconService {
    pub resolver: Arc<IconResolver>,
    _themes: Option<CollectionWriter>,
    _watcher: Option<IconWatcher>,
}

impl IconService {
    pub fn start(store: &Arc<ResourceStore>, config: IconConfig) -> Result<Self, IconError> {
        let resolver = Arc::new(IconResolver::new(config)?);
        info!(
            "Icon resolver ready, default theme {}",
            resolver.default_theme().as_deref().unwrap_or("hicolor")
        );

        let themes = match store.claim(ICON_THEMES_PREFIX) {
            Ok(writer) => {
                if let Err(e) = resolver.publish_themes(&writer) {
                    warn!("Cannot publish icon themes: {}", e);
                }
                Some(writer)
            }
            Err(e) => {
                warn!("Icon themes not published: {}", e);
                None
            }
        };

        let watcher = match IconWatcher::watch(resolver.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Icon directories not watched: {}", e);
                None
            }
        };

        Ok(Self {
            resolver,
            _themes: themes,
            _watcher: watcher,
        })
    }
}
