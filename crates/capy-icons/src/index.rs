//! Icon index: icon name -> candidate files, per theme plus a flat table.

use crate::paths::icon_extension;
use crate::theme::IconTheme;
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IconFormat {
    Png,
    Svg,
    /// Needs conversion before it can be served.
    Xpm,
}

impl IconFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match icon_extension(path)? {
            "png" => Some(IconFormat::Png),
            "svg" => Some(IconFormat::Svg),
            "xpm" => Some(IconFormat::Xpm),
            _ => None,
        }
    }
}

/// One file that can serve an icon name within a size window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IconFile {
    pub path: PathBuf,
    pub min_size: u32,
    pub max_size: u32,
    pub format: IconFormat,
    /// Theme directory the file came from, e.g. `48x48/apps`.
    pub dir: String,
}

impl IconFile {
    /// 0 inside the window, otherwise the gap to the nearer bound.
    pub fn distance(&self, size: u32) -> u32 {
        if size < self.min_size {
            self.min_size - size
        } else if size > self.max_size {
            size - self.max_size
        } else {
            0
        }
    }
}

/// Candidates ordered best first: ascending distance, ties keep index order.
pub fn rank_candidates(candidates: &[IconFile], size: u32) -> Vec<&IconFile> {
    let mut ranked: Vec<&IconFile> = candidates.iter().collect();
    ranked.sort_by_key(|c| c.distance(size));
    ranked
}

type NameTable = HashMap<String, Vec<IconFile>>;

#[derive(Debug, Default)]
pub struct IconIndex {
    themed: HashMap<String, NameTable>,
    flat: HashMap<String, PathBuf>,
}

impl IconIndex {
    /// Index the themes named in `search_order` across all `basedirs`,
    /// plus the flat (non-themed) files directly inside each basedir.
    pub fn build(
        basedirs: &[PathBuf],
        themes: &BTreeMap<String, IconTheme>,
        search_order: &[String],
    ) -> Self {
        let mut themed = HashMap::new();
        for id in search_order {
            if let Some(theme) = themes.get(id) {
                themed.insert(id.clone(), index_theme(basedirs, theme));
            }
        }

        let mut flat = HashMap::new();
        for dir in basedirs {
            for (name, path) in list_icon_files(dir) {
                if matches!(IconFormat::from_path(&path), Some(IconFormat::Xpm)) {
                    continue;
                }
                flat.entry(name).or_insert(path);
            }
        }

        let index = Self { themed, flat };
        info!(
            "Indexed {} themed names across {} themes, {} flat icons",
            index.themed.values().map(|t| t.len()).sum::<usize>(),
            index.themed.len(),
            index.flat.len()
        );
        index
    }

    pub fn themed(&self, theme: &str, name: &str) -> Option<&[IconFile]> {
        self.themed
            .get(theme)?
            .get(name)
            .map(Vec::as_slice)
            .filter(|c| !c.is_empty())
    }

    pub fn flat(&self, name: &str) -> Option<&Path> {
        self.flat.get(name).map(PathBuf::as_path)
    }

    /// Every name known to `theme`.
    pub fn names(&self, theme: &str) -> Vec<&str> {
        self.themed
            .get(theme)
            .map(|t| t.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn index_theme(basedirs: &[PathBuf], theme: &IconTheme) -> NameTable {
    let mut table: NameTable = HashMap::new();
    for basedir in basedirs {
        let root = basedir.join(&theme.id);
        if !root.is_dir() {
            continue;
        }
        for dir in &theme.dirs {
            for (name, path) in list_icon_files(&root.join(&dir.path)) {
                let Some(format) = IconFormat::from_path(&path) else {
                    continue;
                };
                table.entry(name).or_default().push(IconFile {
                    path,
                    min_size: dir.min_size,
                    max_size: dir.max_size,
                    format,
                    dir: dir.path.clone(),
                });
            }
        }
    }
    table
}

/// `(stem, path)` of every icon file directly inside `dir`, sorted by path.
fn list_icon_files(dir: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && icon_extension(p).is_some())
        .filter_map(|p| {
            let stem = p.file_stem()?.to_str()?.to_string();
            Some((stem, p))
        })
        .collect();
    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}
