//! Manifest discovery under the plugins root.
//!
//! The plugins root holds one directory per [`Category`]. How manifests are
//! laid out inside a category has changed over time, so the lookup is
//! selected by a [`DiscoveryStrategy`]. Results are sorted by path so that
//! repeated runs see manifests in the same order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::plugin::manifest::Category;
use crate::utils::paths::{MANIFEST_FILE_NAME, get_category_dir};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Every file named manifest.json at any depth (`<category>/<id>/manifest.json`)
    #[default]
    Recursive,
    /// Every *.json file directly inside the category directory
    Flat,
}

/// A manifest file found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredManifest {
    pub category: Category,
    pub path: PathBuf,
}

/// Find manifest files inside one category directory.
pub fn find_manifests(category_dir: &Path, strategy: DiscoveryStrategy) -> Result<Vec<PathBuf>> {
    let mut manifests = match strategy {
        DiscoveryStrategy::Recursive => find_recursive(category_dir),
        DiscoveryStrategy::Flat => find_flat(category_dir)?,
    };
    manifests.sort();
    Ok(manifests)
}

fn find_recursive(category_dir: &Path) -> Vec<PathBuf> {
    let mut manifests = Vec::new();

    for entry in WalkDir::new(category_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE_NAME {
            manifests.push(entry.into_path());
        }
    }

    manifests
}

fn find_flat(category_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(category_dir)
        .with_context(|| format!("Failed to read category directory: {:?}", category_dir))?;

    let mut manifests = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            manifests.push(path);
        }
    }

    Ok(manifests)
}

/// Discover manifests in every category, official first.
///
/// Missing category directories are skipped.
pub fn discover_all(
    plugins_dir: &Path,
    strategy: DiscoveryStrategy,
) -> Result<Vec<DiscoveredManifest>> {
    let mut discovered = Vec::new();

    for category in Category::ALL {
        let category_dir = get_category_dir(plugins_dir, category);
        if !category_dir.is_dir() {
            tracing::warn!(category = %category, "Category directory not found: {:?}", category_dir);
            continue;
        }

        let paths = find_manifests(&category_dir, strategy)?;
        tracing::info!(category = %category, count = paths.len(), "Found {} plugins in {}/", paths.len(), category);

        discovered.extend(
            paths
                .into_iter()
                .map(|path| DiscoveredManifest { category, path }),
        );
    }

    Ok(discovered)
}
