//! Registry aggregation.
//!
//! Collects every manifest under the plugins root into one
//! [`RegistryDocument`]. Aggregation is best-effort: a manifest that cannot
//! be read, parsed or validated is reported and skipped, and the remaining
//! plugins are still written. The document is regenerated from scratch on
//! every run.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::RegistryError;
use crate::plugin::discovery::{DiscoveryStrategy, discover_all};
use crate::plugin::manifest::{
    Author, Category, Manifest, PluginCategory, Repository, VersionEntry,
};
use crate::plugin::validation::{ManifestFailure, validate_manifest_file};

/// One plugin as published in registry.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub id: String,
    pub name: String,
    pub author: Author,
    pub description: String,
    pub category: PluginCategory,
    pub tags: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub repository: Repository,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub screenshots: Vec<Value>,
    #[serde(rename = "latestVersion")]
    pub latest_version: String,
    pub versions: Vec<VersionEntry>,
    /// True only for official plugins
    pub verified: bool,
    pub category_type: Category,
}

impl PluginRecord {
    pub fn from_manifest(manifest: Manifest, category: Category) -> Self {
        Self {
            id: manifest.id,
            name: manifest.name,
            author: manifest.author,
            description: manifest.description,
            category: manifest.category,
            tags: manifest.tags,
            icon: manifest.icon,
            repository: manifest.repository,
            license: manifest.license,
            homepage: manifest.homepage,
            screenshots: manifest.screenshots,
            latest_version: manifest.latest_version,
            versions: manifest.versions,
            verified: category.is_verified(),
            category_type: category,
        }
    }
}

/// The generated registry.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Registry format version
    pub version: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    /// Base URL clients download artifacts from
    pub cdn: String,
    pub plugins: Vec<PluginRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySummary {
    pub total: usize,
    pub official: usize,
    pub community: usize,
}

impl RegistryDocument {
    pub fn summary(&self) -> RegistrySummary {
        let official = self.plugins.iter().filter(|p| p.verified).count();
        RegistrySummary {
            total: self.plugins.len(),
            official,
            community: self.plugins.len() - official,
        }
    }
}

/// Settings for one aggregation run.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub schema_version: String,
    pub cdn: String,
    pub discovery: DiscoveryStrategy,
}

impl From<&Config> for RegistryOptions {
    fn from(config: &Config) -> Self {
        Self {
            schema_version: config.schema_version.clone(),
            cdn: config.cdn.clone(),
            discovery: config.discovery,
        }
    }
}

/// Result of an aggregation run: the document plus every skipped manifest.
#[derive(Debug)]
pub struct Aggregation {
    pub document: RegistryDocument,
    pub errors: Vec<ManifestFailure>,
}

/// Name order used in the registry, following locale collation: names
/// compare case-insensitively first, then lowercase sorts before uppercase.
/// Remaining ties fall back to code point order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

/// Official plugins first, then by name. The sort is stable, so plugins
/// with identical names keep discovery order.
pub fn sort_plugins(plugins: &mut [PluginRecord]) {
    plugins.sort_by(|a, b| {
        b.verified
            .cmp(&a.verified)
            .then_with(|| compare_names(&a.name, &b.name))
    });
}

/// Aggregate every manifest under `plugins_dir` into a registry document.
pub fn build_registry(plugins_dir: &Path, options: &RegistryOptions) -> Result<Aggregation> {
    tracing::info!("Generating plugin registry from {}", plugins_dir.display());

    let mut plugins = Vec::new();
    let mut errors = Vec::new();
    let mut seen_ids: HashMap<String, PathBuf> = HashMap::new();

    for discovered in discover_all(plugins_dir, options.discovery)? {
        let manifest = match validate_manifest_file(&discovered.path) {
            Ok(m) => m,
            Err(error) => {
                tracing::error!("Failed to process {}: {}", discovered.path.display(), error);
                errors.push(ManifestFailure {
                    path: discovered.path,
                    category: discovered.category,
                    error,
                });
                continue;
            }
        };

        if let Some(first) = seen_ids.get(&manifest.id) {
            let error = RegistryError::SchemaViolation {
                path: discovered.path.clone(),
                errors: vec![format!(
                    "id '{}' is already used by {}",
                    manifest.id,
                    first.display()
                )],
            };
            tracing::error!("Failed to process {}: {}", discovered.path.display(), error);
            errors.push(ManifestFailure {
                path: discovered.path,
                category: discovered.category,
                error,
            });
            continue;
        }
        seen_ids.insert(manifest.id.clone(), discovered.path.clone());

        let version_count = manifest.versions.len();
        tracing::info!(
            id = %manifest.id,
            category = %discovered.category,
            "Added: {} v{} ({} version{})",
            manifest.name,
            manifest.latest_version,
            version_count,
            if version_count > 1 { "s" } else { "" }
        );
        plugins.push(PluginRecord::from_manifest(manifest, discovered.category));
    }

    sort_plugins(&mut plugins);

    let document = RegistryDocument {
        version: options.schema_version.clone(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        cdn: options.cdn.clone(),
        plugins,
    };

    Ok(Aggregation { document, errors })
}

/// Write the document as pretty-printed JSON, replacing any previous file.
pub fn write_registry(document: &RegistryDocument, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let content = serde_json::to_string_pretty(document)?;
    fs::write(output, content)
        .with_context(|| format!("Failed to write registry: {}", output.display()))?;

    let summary = document.summary();
    tracing::info!(
        total = summary.total,
        official = summary.official,
        community = summary.community,
        "Registry written to {}",
        output.display()
    );
    Ok(())
}
