//! Icon theme loading and the inheritance walk.

use crate::error::IconError;
use capy_resources::{Profile, Resource};
use log::{debug, warn};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

/// The universal fallback theme.
pub const HICOLOR: &str = "hicolor";

/// Default `Threshold` when a directory does not declare one.
const DEFAULT_THRESHOLD: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeType {
    Fixed,
    Scalable,
    Threshold,
}

/// One icon directory declared by a theme, e.g. `48x48/apps`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThemeDir {
    pub path: String,
    pub size: u32,
    pub min_size: u32,
    pub max_size: u32,
    pub size_type: SizeType,
    pub context: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IconTheme {
    pub id: String,
    pub title: String,
    pub comment: String,
    /// Parent theme ids, in declared order.
    pub inherits: Vec<String>,
    pub dirs: Vec<ThemeDir>,
}

impl IconTheme {
    /// Store representation under `/icontheme/<id>`.
    pub fn to_resource(&self) -> Resource {
        let dirs: Vec<_> = self
            .dirs
            .iter()
            .map(|d| {
                json!({
                    "path": d.path,
                    "minSize": d.min_size,
                    "maxSize": d.max_size,
                    "context": d.context,
                })
            })
            .collect();

        Resource::new(
            format!("/icontheme/{}", self.id),
            self.title.clone(),
            Profile::IconTheme,
        )
        .with_comment(self.comment.clone())
        .with_detail("inherits", self.inherits.clone())
        .with_detail("dirs", dirs)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse an `index.theme` file.
///
/// The first group must be `[Icon Theme]`. Directory groups that are not
/// listed in `Directories`, lack a `Size` or carry an unknown `Type` are
/// skipped with a warning.
pub fn parse_index_theme(id: &str, content: &str) -> Result<IconTheme, IconError> {
    let mut groups: Vec<(String, HashMap<String, String>)> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            groups.push((line[1..line.len() - 1].to_string(), HashMap::new()));
            continue;
        }

        if let (Some((key, value)), Some((_, entries))) = (line.split_once('='), groups.last_mut())
        {
            entries.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let mut groups = groups.into_iter();
    let (name, head) = groups
        .next()
        .ok_or_else(|| IconError::Theme(format!("{}: empty", id)))?;
    if name != "Icon Theme" {
        return Err(IconError::Theme(format!(
            "{}: expected [Icon Theme], found [{}]",
            id, name
        )));
    }

    let declared: HashSet<String> = head
        .get("Directories")
        .map(|d| split_list(d))
        .unwrap_or_default()
        .into_iter()
        .collect();

    let mut dirs = Vec::new();
    for (dir_name, entries) in groups {
        if !declared.contains(&dir_name) {
            debug!("{}: [{}] not listed in Directories", id, dir_name);
            continue;
        }
        match parse_theme_dir(&dir_name, &entries) {
            Some(dir) => dirs.push(dir),
            None => warn!("{}: skipping directory [{}]", id, dir_name),
        }
    }

    Ok(IconTheme {
        id: id.to_string(),
        title: head.get("Name").cloned().unwrap_or_else(|| id.to_string()),
        comment: head.get("Comment").cloned().unwrap_or_default(),
        inherits: head.get("Inherits").map(|i| split_list(i)).unwrap_or_default(),
        dirs,
    })
}

fn parse_theme_dir(path: &str, entries: &HashMap<String, String>) -> Option<ThemeDir> {
    let number = |key: &str| entries.get(key).and_then(|v| v.parse::<u32>().ok());

    let size = number("Size")?;
    let size_type = match entries.get("Type").map(|t| t.to_lowercase()).as_deref() {
        Some("fixed") => SizeType::Fixed,
        Some("scalable") => SizeType::Scalable,
        Some("threshold") | None => SizeType::Threshold,
        Some(_) => return None,
    };

    let (min_size, max_size) = match size_type {
        SizeType::Fixed => (size, size),
        SizeType::Scalable => (
            number("MinSize").unwrap_or(size),
            number("MaxSize").unwrap_or(size),
        ),
        SizeType::Threshold => {
            let threshold = number("Threshold").unwrap_or(DEFAULT_THRESHOLD);
            (size.saturating_sub(threshold), size.saturating_add(threshold))
        }
    };
    if min_size > max_size {
        return None;
    }

    Some(ThemeDir {
        path: path.to_string(),
        size,
        min_size,
        max_size,
        size_type,
        context: entries.get("Context").cloned().unwrap_or_default(),
    })
}

/// Read every `<basedir>/<id>/index.theme`. A theme found in an earlier
/// (more local) basedir shadows the same id further down the list.
pub fn load_themes<P: AsRef<Path>>(basedirs: &[P]) -> BTreeMap<String, IconTheme> {
    let mut themes = BTreeMap::new();

    for basedir in basedirs {
        let Ok(entries) = fs::read_dir(basedir.as_ref()) else {
            continue;
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let index_file = entry.path().join("index.theme");
            let id = entry.file_name().to_string_lossy().to_string();
            if themes.contains_key(&id) || !index_file.is_file() {
                continue;
            }

            let parsed = fs::read_to_string(&index_file)
                .map_err(IconError::from)
                .and_then(|content| parse_index_theme(&id, &content));
            match parsed {
                Ok(theme) => {
                    themes.insert(id, theme);
                }
                Err(e) => warn!("Error reading {}: {}", index_file.display(), e),
            }
        }
    }

    themes
}

/// Map a configured theme name to a loaded theme id, matching the id
/// first and the display title second.
pub fn resolve_theme_id(name: &str, themes: &BTreeMap<String, IconTheme>) -> Option<String> {
    if themes.contains_key(name) {
        return Some(name.to_string());
    }
    themes
        .values()
        .find(|t| t.title == name)
        .map(|t| t.id.clone())
}

/// Depth-first walk of `Inherits` starting at `default_theme`, ending with
/// hicolor exactly once. Unknown themes are skipped and cycles are cut by
/// the visited set.
pub fn build_search_order(
    default_theme: Option<&str>,
    themes: &BTreeMap<String, IconTheme>,
) -> Vec<String> {
    fn walk(
        id: &str,
        themes: &BTreeMap<String, IconTheme>,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) {
        if id == HICOLOR || !visited.insert(id.to_string()) {
            return;
        }
        let Some(theme) = themes.get(id) else {
            return;
        };
        order.push(id.to_string());
        for parent in &theme.inherits {
            walk(parent, themes, visited, order);
        }
    }

    let mut order = Vec::new();
    let mut visited = HashSet::new();
    if let Some(id) = default_theme {
        walk(id, themes, &mut visited, &mut order);
    }
    order.push(HICOLOR.to_string());
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADWAITA: &str = "\
[Icon Theme]
Name=Adwaita
Comment=The Only One
Inherits=AdwaitaLegacy, hicolor
Directories=16x16/apps,48x48/apps,scalable/apps,32x32/bogus,unlisted

[16x16/apps]
Size=16
Type=Fixed
Context=Applications

[48x48/apps]
Size=48
Threshold=4

[scalable/apps]
Size=128
MinSize=8
MaxSize=512
Type=Scalable

[32x32/bogus]
Size=32
Type=Weird

[not-declared]
Size=24
";

    fn theme(id: &str, inherits: &[&str]) -> IconTheme {
        IconTheme {
            id: id.to_string(),
            title: id.to_string(),
            comment: String::new(),
            inherits: inherits.iter().map(|s| s.to_string()).collect(),
            dirs: Vec::new(),
        }
    }

    fn themes(list: Vec<IconTheme>) -> BTreeMap<String, IconTheme> {
        list.into_iter().map(|t| (t.id.clone(), t)).collect()
    }

    #[test]
    fn test_parse_index_theme() {
        let theme = parse_index_theme("Adwaita", ADWAITA).unwrap();
        assert_eq!(theme.title, "Adwaita");
        assert_eq!(theme.inherits, vec!["AdwaitaLegacy", "hicolor"]);
        assert_eq!(theme.dirs.len(), 3);

        let fixed = &theme.dirs[0];
        assert_eq!((fixed.min_size, fixed.max_size), (16, 16));
        assert_eq!(fixed.context, "Applications");

        let threshold = &theme.dirs[1];
        assert_eq!(threshold.size_type, SizeType::Threshold);
        assert_eq!((threshold.min_size, threshold.max_size), (44, 52));

        let scalable = &theme.dirs[2];
        assert_eq!((scalable.min_size, scalable.max_size), (8, 512));
    }

    #[test]
    fn test_parse_survives_out_of_range_sizes() {
        let content = "\
[Icon Theme]
Name=Big
Directories=big,inverted,huge

[big]
Size=4294967295

[inverted]
Size=32
MinSize=64
MaxSize=16
Type=Scalable

[huge]
Size=99999999999
";
        let theme = parse_index_theme("Big", content).unwrap();
        assert_eq!(theme.dirs.len(), 1);
        assert_eq!(theme.dirs[0].path, "big");
        assert_eq!(theme.dirs[0].max_size, u32::MAX);
        assert_eq!(theme.dirs[0].min_size, u32::MAX - DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_parse_requires_icon_theme_group() {
        let err = parse_index_theme("x", "[Something]\nName=x\n").unwrap_err();
        assert!(matches!(err, IconError::Theme(_)));
    }

    #[test]
    fn test_search_order_depth_first() {
        let themes = themes(vec![
            theme("A", &["B", "C"]),
            theme("B", &["D"]),
            theme("C", &[]),
            theme("D", &[]),
            theme(HICOLOR, &[]),
        ]);
        assert_eq!(
            build_search_order(Some("A"), &themes),
            vec!["A", "B", "D", "C", "hicolor"]
        );
    }

    #[test]
    fn test_search_order_survives_cycles() {
        let themes = themes(vec![
            theme("A", &["B"]),
            theme("B", &["A", "hicolor"]),
            theme(HICOLOR, &["A"]),
        ]);
        let order = build_search_order(Some("A"), &themes);
        assert_eq!(order, vec!["A", "B", "hicolor"]);
        assert_eq!(order.iter().filter(|t| *t == HICOLOR).count(), 1);
    }

    #[test]
    fn test_search_order_without_default() {
        let themes = themes(vec![theme("A", &[])]);
        assert_eq!(build_search_order(None, &themes), vec!["hicolor"]);
        assert_eq!(build_search_order(Some("missing"), &themes), vec!["hicolor"]);
        assert_eq!(build_search_order(Some("hicolor"), &themes), vec!["hicolor"]);
    }

    #[test]
    fn test_resolve_theme_id_by_title() {
        let mut t = theme("breeze-dark", &[]);
        t.title = "Breeze Dark".to_string();
        let themes = themes(vec![t]);
        assert_eq!(resolve_theme_id("Breeze Dark", &themes).as_deref(), Some("breeze-dark"));
        assert_eq!(resolve_theme_id("breeze-dark", &themes).as_deref(), Some("breeze-dark"));
        assert!(resolve_theme_id("nope", &themes).is_none());
    }

    #[test]
    fn test_load_themes_local_shadows_system() {
        let user = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        for (base, name) in [(user.path(), "User"), (system.path(), "System")] {
            let dir = base.join("mytheme");
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("index.theme"),
                format!("[Icon Theme]\nName={}\nDirectories=\n", name),
            )
            .unwrap();
        }
        fs::create_dir_all(system.path().join("broken")).unwrap();
        fs::write(system.path().join("broken/index.theme"), "garbage").unwrap();

        let loaded = load_themes(&[user.path(), system.path()]);
        assert_eq!(loaded["mytheme"].title, "User");
        assert!(!loaded.contains_key("broken"));
    }

    #[test]
    fn test_theme_resource() {
        let theme = parse_index_theme("Adwaita", ADWAITA).unwrap();
        let res = theme.to_resource();
        assert_eq!(res.path, "/icontheme/Adwaita");
        assert_eq!(res.profile, Profile::IconTheme);
        assert_eq!(res.details["dirs"][1]["maxSize"], 52);
    }
}
