//! Path helpers for XDG application directories.

use std::path::PathBuf;

/// Get all application .desktop file directories, most local first.
pub fn application_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Some(data_home) = dirs::data_dir() {
        dirs.push(data_home.join("applications"));
    }

    let xdg_data_dirs = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    for data_dir in xdg_data_dirs.split(':') {
        if !data_dir.is_empty() {
            dirs.push(PathBuf::from(data_dir).join("applications"));
        }
    }

    // App formats (flatpak, snap)
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".local/share/flatpak/exports/share/applications"));
    }
    dirs.push(PathBuf::from("/var/lib/flatpak/exports/share/applications"));
    dirs.push(PathBuf::from("/var/lib/snapd/desktop/applications"));

    dirs.dedup();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_data_dirs_order() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("XDG_DATA_DIRS", "/opt/share:/usr/share");
        }

        let dirs = application_directories();
        let opt = dirs
            .iter()
            .position(|d| d == &PathBuf::from("/opt/share/applications"));
        let usr = dirs
            .iter()
            .position(|d| d == &PathBuf::from("/usr/share/applications"));
        assert!(opt.is_some() && opt < usr);

        unsafe {
            env::remove_var("XDG_DATA_DIRS");
        }
    }
}
