use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

use crate::plugin::manifest::Category;

pub const CONFIG_FILE_NAME: &str = "registry.toml";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(path))
}

/// Resolve `path` against `root` unless it is already absolute.
pub fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub fn get_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

pub fn get_category_dir(plugins_dir: &Path, category: Category) -> PathBuf {
    plugins_dir.join(category.dir_name())
}

pub fn get_plugin_dir(plugins_dir: &Path, category: Category, plugin_id: &str) -> PathBuf {
    get_category_dir(plugins_dir, category).join(plugin_id)
}

pub fn get_manifest_path(plugins_dir: &Path, category: Category, plugin_id: &str) -> PathBuf {
    get_plugin_dir(plugins_dir, category, plugin_id).join(MANIFEST_FILE_NAME)
}

pub fn get_versions_dir(plugins_dir: &Path, category: Category, plugin_id: &str) -> PathBuf {
    get_plugin_dir(plugins_dir, category, plugin_id).join("versions")
}

pub fn get_archive_path(
    plugins_dir: &Path,
    category: Category,
    plugin_id: &str,
    version: &str,
) -> PathBuf {
    get_versions_dir(plugins_dir, category, plugin_id).join(format!("{}.zip", version))
}
