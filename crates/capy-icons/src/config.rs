//! Startup configuration for the icon resolver.

use crate::paths;
use std::path::PathBuf;

/// Environment variable that overrides the default icon theme.
pub const THEME_ENV: &str = "CAPY_ICON_THEME";

/// Where the default theme comes from.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum DefaultTheme {
    /// Use this theme id (or title).
    Override(String),
    /// Look it up in the toolkit settings files.
    #[default]
    Discovered,
}

#[derive(Clone, Debug)]
pub struct IconConfig {
    pub default_theme: DefaultTheme,
    /// Base directories, most local first. Themes live in `<basedir>/<id>/`,
    /// flat icons directly in `<basedir>/`.
    pub basedirs: Vec<PathBuf>,
    /// Settings files scanned for `DefaultTheme::Discovered`.
    pub settings_files: Vec<PathBuf>,
    /// Root of the legacy-format conversion cache.
    pub conversion_dir: PathBuf,
    /// Root of the runtime icon cache.
    pub session_dir: PathBuf,
}

impl IconConfig {
    /// Standard XDG locations. `theme` is the configured override, if any;
    /// [`THEME_ENV`] takes precedence over it.
    pub fn from_environment(theme: Option<String>) -> Self {
        let default_theme = std::env::var(THEME_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or(theme)
            .map(DefaultTheme::Override)
            .unwrap_or_default();

        Self {
            default_theme,
            basedirs: paths::icon_base_directories(),
            settings_files: paths::toolkit_settings_files(),
            conversion_dir: paths::conversion_cache_dir(),
            session_dir: paths::session_icons_dir(),
        }
    }
}
