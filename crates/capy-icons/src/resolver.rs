//! Icon name resolution across the theme inheritance chain.

use crate::config::{DefaultTheme, IconConfig};
use crate::convert::{IconConverter, XpmConverter};
use crate::error::IconError;
use crate::index::{IconFile, IconFormat, IconIndex, rank_candidates};
use crate::paths::{discover_theme_name, icon_extension};
use crate::runtime::{RawImage, RuntimeIconCache};
use crate::theme::{IconTheme, build_search_order, load_themes, resolve_theme_id};
use capy_resources::{Change, CollectionWriter, StoreError};
use log::{info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

/// Resolved lookups kept before the memo starts over.
const LOOKUP_CACHE_LIMIT: usize = 4096;

#[derive(Default)]
struct ThemeState {
    themes: BTreeMap<String, IconTheme>,
    default_theme: Option<String>,
    search_order: Vec<String>,
    index: IconIndex,
}

impl ThemeState {
    fn load(config: &IconConfig) -> Self {
        let themes = load_themes(&config.basedirs);

        let requested = match &config.default_theme {
            DefaultTheme::Override(name) => Some(name.clone()),
            DefaultTheme::Discovered => discover_theme_name(&config.settings_files),
        };
        let default_theme = requested.and_then(|name| {
            let id = resolve_theme_id(&name, &themes);
            if id.is_none() {
                warn!("Icon theme {} not installed, falling back to hicolor", name);
            }
            id
        });

        let search_order = build_search_order(default_theme.as_deref(), &themes);
        info!("Icon theme search order: {}", search_order.join(" -> "));
        let index = IconIndex::build(&config.basedirs, &themes, &search_order);

        Self {
            themes,
            default_theme,
            search_order,
            index,
        }
    }
}

/// Resolves `(name, size)` to a file on disk.
///
/// Lookups walk the search order and stop at the first theme that has the
/// name, picking the candidate whose size window is nearest. Runtime icons
/// and flat pixmap directories are consulted after the themes.
pub struct IconResolver {
    config: RwLock<IconConfig>,
    state: RwLock<ThemeState>,
    lookups: Mutex<HashMap<(String, u32), PathBuf>>,
    runtime: RuntimeIconCache,
    converter: Box<dyn IconConverter>,
    failed_conversions: Mutex<HashSet<PathBuf>>,
    file_icons: RwLock<HashSet<PathBuf>>,
}

impl IconResolver {
    pub fn new(config: IconConfig) -> Result<Self, IconError> {
        Self::with_converter(config, Box::new(XpmConverter))
    }

    pub fn with_converter(
        config: IconConfig,
        converter: Box<dyn IconConverter>,
    ) -> Result<Self, IconError> {
        let runtime = RuntimeIconCache::open(&config.session_dir)?;
        let state = ThemeState::load(&config);
        Ok(Self {
            config: RwLock::new(config),
            state: RwLock::new(state),
            lookups: Mutex::new(HashMap::new()),
            runtime,
            converter,
            failed_conversions: Mutex::new(HashSet::new()),
            file_icons: RwLock::new(HashSet::new()),
        })
    }

    fn state(&self) -> RwLockReadGuard<'_, ThemeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookups(&self) -> MutexGuard<'_, HashMap<(String, u32), PathBuf>> {
        self.lookups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn default_theme(&self) -> Option<String> {
        self.state().default_theme.clone()
    }

    pub fn search_order(&self) -> Vec<String> {
        self.state().search_order.clone()
    }

    pub fn themes(&self) -> Vec<IconTheme> {
        self.state().themes.values().cloned().collect()
    }

    /// Base directories worth watching for changes.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        config.basedirs.iter().filter(|d| d.is_dir()).cloned().collect()
    }

    /// Re-read themes, the default theme and the index from disk.
    pub fn reload(&self) {
        let fresh = {
            let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
            ThemeState::load(&config)
        };
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        self.lookups().clear();
        self.failed_conversions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Switch the default theme and reload.
    pub fn set_default_theme(&self, default_theme: DefaultTheme) {
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .default_theme = default_theme;
        self.reload();
    }

    pub fn resolve(&self, name: &str, size: u32) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        if name.starts_with('/') {
            let path = PathBuf::from(name);
            let allowed = self
                .file_icons
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&path);
            return (allowed && path.is_file()).then_some(path);
        }

        let key = (name.to_string(), size);
        if let Some(hit) = self.lookups().get(&key) {
            return Some(hit.clone());
        }

        // Misses are not remembered: names come from readers and are unbounded.
        let found = self.find(name, size)?;
        let mut lookups = self.lookups();
        if lookups.len() >= LOOKUP_CACHE_LIMIT {
            lookups.clear();
        }
        lookups.insert(key, found.clone());
        Some(found)
    }

    fn find(&self, name: &str, size: u32) -> Option<PathBuf> {
        let state = self.state();

        for theme in &state.search_order {
            let Some(candidates) = state.index.themed(theme, name) else {
                continue;
            };
            for candidate in rank_candidates(candidates, size) {
                match candidate.format {
                    IconFormat::Png | IconFormat::Svg => return Some(candidate.path.clone()),
                    IconFormat::Xpm => {
                        if let Some(path) = self.converted(theme, name, candidate) {
                            return Some(path);
                        }
                    }
                }
            }
        }

        if let Some(path) = self.runtime.lookup(name, size) {
            return Some(path);
        }

        state.index.flat(name).map(Path::to_path_buf)
    }

    /// Converted copy of a legacy-format candidate, converting on first use.
    fn converted(&self, theme: &str, name: &str, candidate: &IconFile) -> Option<PathBuf> {
        let target = {
            let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
            config
                .conversion_dir
                .join(theme)
                .join(&candidate.dir)
                .join(format!("{}.png", name))
        };
        if target.is_file() {
            return Some(target);
        }

        let mut failed = self
            .failed_conversions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if failed.contains(&candidate.path) {
            return None;
        }
        match self.converter.convert(&candidate.path, &target) {
            Ok(()) => Some(target),
            Err(e) => {
                warn!("Could not convert {}: {}", candidate.path.display(), e);
                failed.insert(candidate.path.clone());
                None
            }
        }
    }

    /// Cache raw pixel images and return the icon name they resolve under.
    pub fn add_runtime_icon(&self, images: &[RawImage]) -> Result<String, IconError> {
        self.runtime.add(images)
    }

    /// Allow `path` to be served as an icon by its absolute name.
    pub fn add_file_icon(&self, path: &Path) -> bool {
        if !path.is_absolute() || !path.is_file() || icon_extension(path).is_none() {
            return false;
        }
        self.file_icons
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf());
        true
    }

    /// Publish the loaded themes as `icontheme` resources.
    pub fn publish_themes(&self, writer: &CollectionWriter) -> Result<Vec<Change>, StoreError> {
        let resources = self
            .state()
            .themes
            .values()
            .map(IconTheme::to_resource)
            .collect();
        writer.replace_with(resources)
    }
}
