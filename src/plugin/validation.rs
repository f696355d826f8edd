//! Manifest validation.
//!
//! Combines the generic [`schema`](crate::plugin::schema) walk with checks
//! that are specific to plugin manifests: the non-empty `versions` list,
//! per-release required fields, and `latestVersion` pointing at a listed
//! release. Used directly by `validate` and before aggregation.

use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::RegistryError;
use crate::plugin::discovery::{DiscoveryStrategy, discover_all};
use crate::plugin::manifest::{Category, ECS_VERSION_KEY, Manifest, PluginCategory};
use crate::plugin::schema::{self, Schema};

/// Top-level fields every manifest must carry.
pub const REQUIRED_FIELDS: [&str; 10] = [
    "id",
    "name",
    "author",
    "description",
    "category",
    "repository",
    "requirements",
    "license",
    "latestVersion",
    "versions",
];

pub(crate) static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("Invalid id pattern"));
pub(crate) static SEMVER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("Invalid version pattern"));
static HTTPS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://.+").expect("Invalid URL pattern"));
static GITHUB_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://github\.com/.+").expect("Invalid GitHub pattern"));

fn version_entry_schema() -> Schema {
    Schema::object()
        .required(&["version", "releaseDate", "zipUrl", "requirements"])
        .property("version", Schema::string().pattern(SEMVER_PATTERN.clone()))
        .property("releaseDate", Schema::string())
        .property("changes", Schema::string().optional())
        .property("zipUrl", Schema::string().pattern(HTTPS_PATTERN.clone()))
        .property(
            "requirements",
            Schema::object()
                .required(&[ECS_VERSION_KEY])
                .property(ECS_VERSION_KEY, Schema::string()),
        )
}

/// Rules for each top-level property, checked when the property is present.
static MANIFEST_PROPERTIES: LazyLock<Vec<(&'static str, Schema)>> = LazyLock::new(|| {
    vec![
        ("id", Schema::string().pattern(ID_PATTERN.clone())),
        ("name", Schema::string().min_length(1).max_length(100)),
        (
            "latestVersion",
            Schema::string().pattern(SEMVER_PATTERN.clone()),
        ),
        (
            "versions",
            Schema::array().min_items(1).items(version_entry_schema()),
        ),
        (
            "author",
            Schema::object()
                .required(&["name", "github"])
                .property("name", Schema::string())
                .property("github", Schema::string())
                .property("email", Schema::string().optional()),
        ),
        (
            "description",
            Schema::string().min_length(10).max_length(500),
        ),
        (
            "category",
            Schema::string().one_of(&PluginCategory::NAMES),
        ),
        (
            "repository",
            Schema::object()
                .required(&["url"])
                .property("type", Schema::string().optional())
                .property("url", Schema::string().pattern(GITHUB_PATTERN.clone())),
        ),
        (
            "distribution",
            Schema::object()
                .optional()
                .required(&["type", "url"])
                .property("type", Schema::string().one_of(&["cdn", "npm"]))
                .property("url", Schema::string().pattern(HTTPS_PATTERN.clone()))
                .property("css", Schema::string().optional()),
        ),
        (
            "requirements",
            Schema::object()
                .required(&[ECS_VERSION_KEY])
                .property(ECS_VERSION_KEY, Schema::string())
                .property("editor-version", Schema::string().optional()),
        ),
        ("license", Schema::string()),
        ("tags", Schema::array().optional()),
        ("icon", Schema::string().optional()),
        ("homepage", Schema::string().optional()),
        ("screenshots", Schema::array().optional()),
    ]
});

/// Same notion of "present" as a loosely typed truthiness check:
/// null, false, 0, "" and missing all count as absent.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Validate a parsed manifest and return every problem found.
///
/// An empty result means the manifest is valid. Messages are unique and
/// keep the order in which they were first found.
pub fn validate_manifest_value(manifest: &Value) -> Vec<String> {
    let Some(object) = manifest.as_object() else {
        return vec!["manifest must be a JSON object".to_string()];
    };

    let mut errors = Vec::new();

    for field in REQUIRED_FIELDS {
        if !object.contains_key(field) {
            errors.push(format!("Missing required field: {}", field));
        }
    }

    if let Some(versions) = object.get("versions").and_then(Value::as_array) {
        if versions.is_empty() {
            errors.push("versions array cannot be empty".to_string());
        }

        for (index, entry) in versions.iter().enumerate() {
            for field in ["version", "zipUrl", "requirements"] {
                if !is_truthy(entry.get(field)) {
                    errors.push(format!("versions[{}].{} is required", index, field));
                }
            }
        }
    }

    for (field, field_schema) in MANIFEST_PROPERTIES.iter() {
        if let Some(value) = object.get(*field) {
            errors.extend(schema::validate(value, field_schema, field));
        }
    }

    if let (Some(latest), Some(versions)) = (
        object.get("latestVersion").and_then(Value::as_str),
        object.get("versions").and_then(Value::as_array),
    ) && !versions.is_empty()
        && !versions
            .iter()
            .any(|v| v.get("version").and_then(Value::as_str) == Some(latest))
    {
        errors.push(format!(
            "latestVersion {} does not match any entry in versions",
            latest
        ));
    }

    let mut seen = HashSet::new();
    errors.retain(|e| seen.insert(e.clone()));
    errors
}

/// Read and parse a manifest file without validating it.
pub fn load_manifest_value(path: &Path) -> Result<Value, RegistryError> {
    if !path.exists() {
        return Err(RegistryError::MissingFile(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;

    serde_json::from_str(&content).map_err(|e| RegistryError::MalformedJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Validate an already parsed manifest and convert it to its typed form.
pub fn parse_manifest(path: &Path, value: Value) -> Result<Manifest, RegistryError> {
    let errors = validate_manifest_value(&value);
    if !errors.is_empty() {
        return Err(RegistryError::SchemaViolation {
            path: path.to_path_buf(),
            errors,
        });
    }

    serde_json::from_value(value).map_err(|e| RegistryError::SchemaViolation {
        path: path.to_path_buf(),
        errors: vec![e.to_string()],
    })
}

/// Load, parse and validate a single manifest file.
pub fn validate_manifest_file(path: &Path) -> Result<Manifest, RegistryError> {
    tracing::debug!("Validating: {}", path.display());
    let value = load_manifest_value(path)?;
    let manifest = parse_manifest(path, value)?;
    tracing::info!(id = %manifest.id, "Validation passed: {}", path.display());
    Ok(manifest)
}

/// A manifest that failed validation.
#[derive(Debug)]
pub struct ManifestFailure {
    pub path: PathBuf,
    pub category: Category,
    pub error: RegistryError,
}

/// Outcome of validating every manifest under the plugins root.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub passed: Vec<PathBuf>,
    pub failures: Vec<ManifestFailure>,
}

impl ValidationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failures.len()
    }
}

/// Validate every manifest in every category.
///
/// Never stops at the first failure. Plugin ids must be unique across all
/// categories; the second manifest claiming an id is reported as a failure.
pub fn validate_all(
    plugins_dir: &Path,
    strategy: DiscoveryStrategy,
) -> anyhow::Result<ValidationReport> {
    let mut report = ValidationReport::default();
    let mut seen_ids: HashMap<String, PathBuf> = HashMap::new();

    for discovered in discover_all(plugins_dir, strategy)? {
        match validate_manifest_file(&discovered.path) {
            Ok(manifest) => {
                if let Some(first) = seen_ids.get(&manifest.id) {
                    let error = RegistryError::SchemaViolation {
                        path: discovered.path.clone(),
                        errors: vec![format!(
                            "id '{}' is already used by {}",
                            manifest.id,
                            first.display()
                        )],
                    };
                    tracing::warn!("{}", error);
                    report.failures.push(ManifestFailure {
                        path: discovered.path,
                        category: discovered.category,
                        error,
                    });
                    continue;
                }
                seen_ids.insert(manifest.id, discovered.path.clone());
                report.passed.push(discovered.path);
            }
            Err(error) => {
                tracing::warn!("{}", error);
                report.failures.push(ManifestFailure {
                    path: discovered.path,
                    category: discovered.category,
                    error,
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::tests::sample_manifest_json;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_manifest(path: &Path, value: &Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    #[test]
    fn test_valid_manifest_has_no_errors() {
        let manifest = sample_manifest_json("tree-editor", "Tree Editor");
        assert_eq!(validate_manifest_value(&manifest), Vec::<String>::new());
    }

    #[test]
    fn test_valid_manifest_with_every_optional_field() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["author"]["email"] = json!("jane@example.com");
        manifest["tags"] = json!(["ai", "graph"]);
        manifest["icon"] = json!("GitBranch");
        manifest["homepage"] = json!("https://example.com");
        manifest["screenshots"] = json!(["https://example.com/1.png"]);
        manifest["requirements"] = json!({ "ecs-version": ">=2.0.0", "editor-version": ">=1.0.0" });
        manifest["distribution"] = json!({ "type": "npm", "url": "https://unpkg.com/tree-editor" });
        assert!(validate_manifest_value(&manifest).is_empty());
    }

    #[test]
    fn test_each_missing_required_field_is_named() {
        for field in REQUIRED_FIELDS {
            let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
            manifest.as_object_mut().unwrap().remove(field);
            let errors = validate_manifest_value(&manifest);
            assert!(
                errors.iter().any(|e| e.contains(field)),
                "no error names '{}': {:?}",
                field,
                errors
            );
        }
    }

    #[test]
    fn test_missing_id_message() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest.as_object_mut().unwrap().remove("id");
        assert_eq!(
            validate_manifest_value(&manifest),
            vec!["Missing required field: id".to_string()]
        );
    }

    #[test]
    fn test_empty_versions_fails() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["versions"] = json!([]);
        let errors = validate_manifest_value(&manifest);
        assert!(errors.contains(&"versions array cannot be empty".to_string()));
        assert!(errors.iter().all(|e| e.contains("versions")));
    }

    #[test]
    fn test_non_https_zip_url_fails() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["versions"][1]["zipUrl"] = json!("http://cdn.example.com/tree-editor/1.1.0.zip");
        assert_eq!(
            validate_manifest_value(&manifest),
            vec!["versions[1].zipUrl format is invalid".to_string()]
        );
    }

    #[test]
    fn test_missing_release_fields_reported_once() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["versions"][0]
            .as_object_mut()
            .unwrap()
            .remove("zipUrl");
        assert_eq!(
            validate_manifest_value(&manifest),
            vec!["versions[0].zipUrl is required".to_string()]
        );
    }

    #[test]
    fn test_empty_release_version_is_treated_as_missing() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["versions"][0]["version"] = json!("");
        let errors = validate_manifest_value(&manifest);
        assert!(errors.contains(&"versions[0].version is required".to_string()));
        assert!(errors.contains(&"versions[0].version format is invalid".to_string()));
    }

    #[test]
    fn test_release_requirements_need_ecs_version() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["versions"][0]["requirements"] = json!({ "editor-version": ">=1.0.0" });
        assert_eq!(
            validate_manifest_value(&manifest),
            vec!["versions[0].requirements.ecs-version is required".to_string()]
        );
    }

    #[test]
    fn test_latest_version_must_be_listed() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["latestVersion"] = json!("2.0.0");
        assert_eq!(
            validate_manifest_value(&manifest),
            vec!["latestVersion 2.0.0 does not match any entry in versions".to_string()]
        );
    }

    #[test]
    fn test_field_rules() {
        let mut manifest = sample_manifest_json("Tree_Editor", "");
        manifest["description"] = json!("short");
        manifest["category"] = json!("Widget");
        manifest["repository"]["url"] = json!("https://gitlab.com/janedoe/tree-editor");
        manifest["author"] = json!({ "name": "Jane" });
        assert_eq!(
            validate_manifest_value(&manifest),
            vec![
                "id format is invalid".to_string(),
                "name must be at least 1 characters".to_string(),
                "author.github is required".to_string(),
                "description must be at least 10 characters".to_string(),
                "category must be one of: Tool, Window, Inspector, System, ImportExport"
                    .to_string(),
                "repository.url format is invalid".to_string(),
            ]
        );
    }

    #[test]
    fn test_optional_distribution_is_checked_when_present() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["distribution"] = json!({ "type": "ftp", "url": "http://x" });
        assert_eq!(
            validate_manifest_value(&manifest),
            vec![
                "distribution.type must be one of: cdn, npm".to_string(),
                "distribution.url format is invalid".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_top_level_requirements() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest.as_object_mut().unwrap().remove("requirements");
        assert_eq!(
            validate_manifest_value(&manifest),
            vec!["Missing required field: requirements".to_string()]
        );
    }

    #[test]
    fn test_top_level_requirements_need_ecs_version() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["requirements"] = json!({ "editor-version": ">=1.0.0" });
        assert_eq!(
            validate_manifest_value(&manifest),
            vec!["requirements.ecs-version is required".to_string()]
        );
    }

    #[test]
    fn test_non_object_release_entry() {
        let mut manifest = sample_manifest_json("tree-editor", "Tree Editor");
        manifest["versions"] = json!(["1.0.0"]);
        assert_eq!(
            validate_manifest_value(&manifest),
            vec![
                "versions[0].version is required".to_string(),
                "versions[0].zipUrl is required".to_string(),
                "versions[0].requirements is required".to_string(),
                "versions[0] must be an object".to_string(),
                "latestVersion 1.1.0 does not match any entry in versions".to_string(),
            ]
        );
    }

    #[test]
    fn test_untyped_array_elements_are_accepted_and_parsed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.json");
        let mut value = sample_manifest_json("tree-editor", "Tree Editor");
        value["screenshots"] = json!([
            { "url": "https://example.com/1.png", "caption": "Graph view" },
            "https://example.com/2.png"
        ]);
        value["tags"] = json!(["graph", 3]);
        value["requirements"]["plugin-api"] = json!(2);
        assert!(validate_manifest_value(&value).is_empty());

        let manifest = parse_manifest(&path, value).unwrap();
        assert_eq!(manifest.screenshots[0]["caption"], "Graph view");
        assert_eq!(manifest.screenshots[1], "https://example.com/2.png");
        assert_eq!(manifest.tags[1], 3);
        assert_eq!(manifest.requirements["plugin-api"], 2);
    }

    #[test]
    fn test_non_object_manifest() {
        assert_eq!(
            validate_manifest_value(&json!([1, 2, 3])),
            vec!["manifest must be a JSON object".to_string()]
        );
    }

    #[test]
    fn test_validate_manifest_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let result = validate_manifest_file(&temp_dir.path().join("manifest.json"));
        assert!(matches!(result, Err(RegistryError::MissingFile(_))));
    }

    #[test]
    fn test_validate_manifest_file_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.json");
        fs::write(&path, "{ \"id\": ").unwrap();
        let result = validate_manifest_file(&path);
        assert!(matches!(result, Err(RegistryError::MalformedJson { .. })));
    }

    #[test]
    fn test_validate_manifest_file_ok() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.json");
        write_manifest(&path, &sample_manifest_json("tree-editor", "Tree Editor"));
        let manifest = validate_manifest_file(&path).unwrap();
        assert_eq!(manifest.name, "Tree Editor");
    }

    #[test]
    fn test_validate_all_collects_every_failure() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_manifest(
            &root.join("official/a/manifest.json"),
            &sample_manifest_json("a", "Alpha"),
        );
        let mut bad = sample_manifest_json("b", "Beta");
        bad["versions"] = json!([]);
        write_manifest(&root.join("community/b/manifest.json"), &bad);
        fs::create_dir_all(root.join("community/c")).unwrap();
        fs::write(root.join("community/c/manifest.json"), "not json").unwrap();

        let report = validate_all(root, DiscoveryStrategy::Recursive).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed, vec![root.join("official/a/manifest.json")]);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[1].error,
            RegistryError::MalformedJson { .. }
        ));
    }

    #[test]
    fn test_validate_all_rejects_duplicate_ids() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_manifest(
            &root.join("official/a/manifest.json"),
            &sample_manifest_json("shared-id", "Alpha"),
        );
        write_manifest(
            &root.join("community/b/manifest.json"),
            &sample_manifest_json("shared-id", "Beta"),
        );

        let report = validate_all(root, DiscoveryStrategy::Recursive).unwrap();
        assert_eq!(report.passed.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].category, Category::Community);
        assert!(report.failures[0].error.schema_errors()[0].contains("already used"));
    }

    #[test]
    fn test_validate_all_flat_layout() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_manifest(
            &root.join("official/alpha.json"),
            &sample_manifest_json("alpha", "Alpha"),
        );

        let report = validate_all(root, DiscoveryStrategy::Flat).unwrap();
        assert!(report.is_success());
        assert_eq!(report.passed.len(), 1);
    }
}
