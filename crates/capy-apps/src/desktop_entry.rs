//! Desktop entry parsing.

use capy_resources::{Profile, Relation, Resource};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A `[Desktop Action <id>]` group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesktopAction {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub exec: Option<String>,
}

/// parsed from .desktop files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesktopApp {
    pub id: String,
    pub name: String,
    pub exec: String,
    pub icon_name: Option<String>,
    pub startup_wm_class: Option<String>,
    pub comment: Option<String>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub actions: Vec<DesktopAction>,
    pub desktop_file_path: PathBuf,
}

impl DesktopApp {
    /// Resource published at `path`, launchable via its default action and
    /// carrying one action link per desktop action.
    pub fn to_resource(&self, path: String) -> Resource {
        let icon = self.icon_name.clone().unwrap_or_default();
        let mut resource = Resource::new(path, self.name.clone(), Profile::Application)
            .with_comment(self.comment.clone().unwrap_or_default())
            .with_icon(icon.clone())
            .with_keywords(self.keywords.iter().cloned())
            .with_detail("exec", self.exec.clone())
            .with_detail("categories", self.categories.clone())
            .with_detail(
                "desktopFile",
                self.desktop_file_path.to_string_lossy().to_string(),
            )
            .add_link("", "Launch", icon.clone(), Relation::DefaultAction);

        if let Some(wm_class) = &self.startup_wm_class {
            resource = resource.with_detail("startupWmClass", wm_class.clone());
        }

        for action in &self.actions {
            resource = resource.add_link(
                &format!("?action={}", action.id),
                action.name.clone(),
                action.icon.clone().unwrap_or_else(|| icon.clone()),
                Relation::Action,
            );
        }
        resource
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse desktop entry text.
///
/// Returns `None` for anything that should not be listed: non-application
/// entries, entries missing `Name` or `Exec`, and entries marked
/// `NoDisplay` or `Hidden`.
pub fn parse_desktop_entry(id: &str, path: &Path, content: &str) -> Option<DesktopApp> {
    let mut groups: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].to_string();
            groups.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        if let (Some(group), Some((key, value))) = (&current, line.split_once('=')) {
            if let Some(entries) = groups.get_mut(group) {
                entries
                    .entry(key.trim().to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
    }

    let entries = groups.get("Desktop Entry")?;
    if entries.get("Type").map(|s| s.as_str()) != Some("Application") {
        return None;
    }
    let flag = |key: &str| entries.get(key).is_some_and(|v| v == "true");
    if flag("NoDisplay") || flag("Hidden") {
        return None;
    }

    let actions = entries
        .get("Actions")
        .map(|a| split_list(a))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|action_id| {
            let group = groups.get(&format!("Desktop Action {}", action_id))?;
            Some(DesktopAction {
                name: group.get("Name")?.clone(),
                icon: group.get("Icon").cloned(),
                exec: group.get("Exec").cloned(),
                id: action_id,
            })
        })
        .collect();

    Some(DesktopApp {
        id: id.to_string(),
        name: entries.get("Name")?.clone(),
        exec: entries.get("Exec")?.clone(),
        icon_name: entries.get("Icon").cloned(),
        startup_wm_class: entries.get("StartupWMClass").cloned(),
        comment: entries.get("Comment").cloned(),
        categories: entries
            .get("Categories")
            .map(|s| split_list(s))
            .unwrap_or_default(),
        keywords: entries
            .get("Keywords")
            .map(|s| split_list(s))
            .unwrap_or_default(),
        actions,
        desktop_file_path: path.to_path_buf(),
    })
}

/// Parse a .desktop file into a DesktopApp struct.
pub fn parse_desktop_file(id: &str, path: &Path) -> Option<DesktopApp> {
    let content = fs::read_to_string(path).ok()?;
    parse_desktop_entry(id, path, &content)
}

/// Desktop file id: path relative to the applications dir, `/` -> `-`.
pub fn desktop_file_id(applications_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(applications_dir).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOT: &str = "\
[Desktop Entry]
Type=Application
Name=Foot
Name[de]=Fuß
Comment=A wayland terminal emulator
Exec=foot
Icon=foot
Keywords=shell;prompt;command;commandline;
Categories=System;TerminalEmulator;
StartupWMClass=foot
Actions=server;bogus;

[Desktop Action server]
Name=Foot Server
Exec=foot --server
";

    #[test]
    fn test_parse_desktop_entry() {
        let app = parse_desktop_entry("foot.desktop", Path::new("/a/foot.desktop"), FOOT).unwrap();
        assert_eq!(app.name, "Foot");
        assert_eq!(app.keywords, vec!["shell", "prompt", "command", "commandline"]);
        assert_eq!(app.categories, vec!["System", "TerminalEmulator"]);
        assert_eq!(app.actions.len(), 1);
        assert_eq!(app.actions[0].exec.as_deref(), Some("foot --server"));
    }

    #[test]
    fn test_hidden_entries_skipped() {
        for flag in ["NoDisplay=true", "Hidden=true"] {
            let content = format!("[Desktop Entry]\nType=Application\nName=X\nExec=x\n{}\n", flag);
            assert!(parse_desktop_entry("x.desktop", Path::new("/x.desktop"), &content).is_none());
        }
        let link = "[Desktop Entry]\nType=Link\nName=X\nURL=https://example.org\n";
        assert!(parse_desktop_entry("x.desktop", Path::new("/x.desktop"), link).is_none());
    }

    #[test]
    fn test_to_resource() {
        let app = parse_desktop_entry("foot.desktop", Path::new("/a/foot.desktop"), FOOT).unwrap();
        let res = app.to_resource("/application/foot.desktop".into());

        assert_eq!(res.profile, Profile::Application);
        assert_eq!(res.keywords.len(), 4);
        assert_eq!(res.search_link().href, "/application/foot.desktop");
        let actions = res.action_links("server");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].href, "/application/foot.desktop?action=server");
        assert_eq!(actions[0].icon, "foot");
    }

    #[test]
    fn test_desktop_file_id() {
        let dir = Path::new("/usr/share/applications");
        assert_eq!(
            desktop_file_id(dir, &dir.join("kde4/kate.desktop")).as_deref(),
            Some("kde4-kate.desktop")
        );
        assert_eq!(desktop_file_id(dir, Path::new("/elsewhere/x.desktop")), None);
    }
}
