//! Path helpers for XDG directories and toolkit settings files.

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Icon base directories, most local first:
/// `~/.icons`, `$XDG_DATA_HOME/icons`, each `$XDG_DATA_DIRS/icons`, pixmaps.
pub fn icon_base_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    // User icons
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".icons"));
    }
    if let Some(data_home) = dirs::data_dir() {
        dirs.push(data_home.join("icons"));
    }

    // System icons
    for data_dir in data_directories() {
        dirs.push(data_dir.join("icons"));
    }

    // Standard fallback
    dirs.push(PathBuf::from("/usr/share/pixmaps"));

    dirs
}

/// `$XDG_DATA_DIRS` in configured order.
pub fn data_directories() -> Vec<PathBuf> {
    let xdg_data_dirs = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());

    xdg_data_dirs
        .split(':')
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Toolkit settings files that may name the icon theme, in lookup order.
pub fn toolkit_settings_files() -> Vec<PathBuf> {
    let config_home = dirs::config_dir().unwrap_or_else(|| PathBuf::from("/nonexistent"));
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/nonexistent"));

    vec![
        config_home.join("gtk-4.0/settings.ini"),
        PathBuf::from("/etc/gtk-4.0/settings.ini"),
        config_home.join("gtk-3.0/settings.ini"),
        PathBuf::from("/etc/gtk-3.0/settings.ini"),
        config_home.join("gtk-2.0/settings.ini"),
        PathBuf::from("/etc/gtk-2.0/settings.ini"),
        home.join(".gtkrc-2.0"),
        PathBuf::from("/etc/gtk-2.0/gtkrc"),
    ]
}

/// Directory for icons converted from legacy formats.
pub fn conversion_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("CapyServices")
        .join("converted")
}

/// Directory for runtime (content-addressed) session icons.
pub fn session_icons_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("capy-session-icons")
}

/// Extract the value of `gtk-icon-theme-name` from a settings file.
///
/// Handles both `settings.ini` (`gtk-icon-theme-name=Papirus`) and
/// gtkrc (`gtk-icon-theme-name = "Papirus"`) syntax.
pub fn theme_name_from_settings(content: &str) -> Option<String> {
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() != "gtk-icon-theme-name" {
            continue;
        }
        let value = value.trim().trim_matches('"').trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

/// Scan `files` in order; the first that declares a theme name wins.
pub fn discover_theme_name(files: &[PathBuf]) -> Option<String> {
    files.iter().find_map(|file| {
        let name = fs::read_to_string(file)
            .ok()
            .and_then(|c| theme_name_from_settings(&c))?;
        info!("Default icon theme {} taken from {}", name, file.display());
        Some(name)
    })
}

/// Image extension of `path`, lower-cased, if it is one we serve.
pub fn icon_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("png"),
        "svg" => Some("svg"),
        "xpm" => Some("xpm"),
        _ => None,
    }
}
