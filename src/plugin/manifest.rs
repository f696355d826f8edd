//! Plugin manifest data model.
//!
//! Defines the typed form of `manifest.json`. Field names follow the JSON
//! wire format (camelCase); optional fields have serde defaults so older
//! manifests keep parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Registry tier a plugin is published under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Official,
    Community,
}

impl Category {
    /// Categories in the order they are aggregated.
    pub const ALL: [Category; 2] = [Category::Official, Category::Community];

    /// Directory name under the plugins root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Official => "official",
            Category::Community => "community",
        }
    }

    /// Official plugins are the only verified ones.
    pub fn is_verified(self) -> bool {
        self == Category::Official
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Editor area a plugin extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginCategory {
    Tool,
    Window,
    Inspector,
    System,
    ImportExport,
}

impl PluginCategory {
    pub const NAMES: [&'static str; 5] = ["Tool", "Window", "Inspector", "System", "ImportExport"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    /// GitHub handle
    pub github: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// VCS kind, usually "git"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    Cdn,
    Npm,
}

/// Where the built bundle is served from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    #[serde(rename = "type")]
    pub kind: DistributionKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

/// Dependency name to version constraint, e.g. `"ecs-version": ">=2.0.0"`.
///
/// Only the keys the schema names are type-checked; other entries are
/// carried through unchanged.
pub type Requirements = BTreeMap<String, Value>;

/// Key every release must declare in its requirements.
pub const ECS_VERSION_KEY: &str = "ecs-version";

/// One published release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub version: String,
    pub release_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<String>,
    /// Immutable archive for this release (always https)
    pub zip_url: String,
    pub requirements: Requirements,
}

/// Plugin manifest from manifest.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub author: Author,
    pub description: String,
    pub category: PluginCategory,
    pub repository: Repository,
    pub license: String,

    pub requirements: Requirements,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,

    /// Elements are not constrained by the schema and are kept as written
    #[serde(default)]
    pub tags: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default)]
    pub screenshots: Vec<Value>,

    pub latest_version: String,
    pub versions: Vec<VersionEntry>,
}

impl Manifest {
    /// Find a release by its version string.
    pub fn find_version(&self, version: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// The release `latestVersion` points at, if listed.
    pub fn latest_entry(&self) -> Option<&VersionEntry> {
        self.find_version(&self.latest_version)
    }
}
