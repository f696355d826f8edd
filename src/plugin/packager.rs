//! Building and packaging plugin releases.
//!
//! Produces `plugins/<category>/<id>/versions/<version>.zip` from the
//! plugin's repository. Published archives are immutable: packaging a
//! version whose archive already exists is refused before anything is
//! cloned or built.
//!
//! The external steps (clone, install, build) go through [`BuildTools`];
//! [`CommandBuildTools`] runs git and npm.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::config::PackagingConfig;
use crate::error::RegistryError;
use crate::plugin::manifest::Category;
use crate::plugin::validation::{ID_PATTERN, SEMVER_PATTERN, validate_manifest_file};
use crate::utils::paths::{get_archive_path, get_manifest_path, get_versions_dir};

/// External build steps.
pub trait BuildTools {
    /// Shallow-clone `url` into `dest`.
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<(), RegistryError>;

    fn install_dependencies(&self, build_dir: &Path) -> Result<(), RegistryError>;

    /// Build the project; output is expected in `<build_dir>/dist`.
    fn build(&self, build_dir: &Path) -> Result<(), RegistryError>;
}

/// Runs git and npm as child processes with inherited stdout/stderr.
#[derive(Debug, Clone)]
pub struct CommandBuildTools {
    git: String,
    npm: String,
}

impl CommandBuildTools {
    pub fn new(git: impl Into<String>, npm: impl Into<String>) -> Self {
        Self {
            git: git.into(),
            npm: npm.into(),
        }
    }

    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<(), RegistryError> {
        let command_line = format!("{} {}", program, args.join(" "));
        tracing::debug!(cwd = %cwd.display(), "Running `{}`", command_line);

        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| RegistryError::io(program, e))?;

        if !status.success() {
            return Err(RegistryError::CommandFailed {
                command: command_line,
                status: status.code(),
            });
        }
        Ok(())
    }
}

impl From<&PackagingConfig> for CommandBuildTools {
    fn from(config: &PackagingConfig) -> Self {
        Self::new(config.git.clone(), config.npm.clone())
    }
}

impl BuildTools for CommandBuildTools {
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<(), RegistryError> {
        let cwd = dest.parent().unwrap_or(Path::new("."));
        let dest = dest.to_string_lossy();
        self.run(&self.git, &["clone", "--depth", "1", url, &dest], cwd)
    }

    fn install_dependencies(&self, build_dir: &Path) -> Result<(), RegistryError> {
        self.run(&self.npm, &["install"], build_dir)
    }

    fn build(&self, build_dir: &Path) -> Result<(), RegistryError> {
        self.run(&self.npm, &["run", "build"], build_dir)
    }
}

/// Which release to package.
#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub category: Category,
    pub plugin_id: String,
    pub version: String,
}

/// A freshly written archive.
#[derive(Debug, Clone)]
pub struct PackageResult {
    pub archive_path: PathBuf,
    pub size_bytes: u64,
    /// Number of files stored in the archive
    pub file_count: usize,
}

pub struct Packager<T: BuildTools> {
    plugins_dir: PathBuf,
    temp_root: PathBuf,
    tools: T,
}

impl<T: BuildTools> Packager<T> {
    pub fn new(plugins_dir: PathBuf, temp_root: PathBuf, tools: T) -> Self {
        Self {
            plugins_dir,
            temp_root,
            tools,
        }
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Build one release and archive its `dist/` directory.
    ///
    /// This method:
    /// 1. Loads and validates the plugin manifest
    /// 2. Checks the version is listed in the manifest
    /// 3. Refuses to overwrite an existing archive
    /// 4. Clones the repository into a fresh working directory
    /// 5. Installs dependencies and builds (official plugins from
    ///    `packages/<id>`, community plugins from the repository root)
    /// 6. Zips the contents of `dist/` into the versions directory
    ///
    /// The working directory is removed whether or not the build succeeds.
    pub fn package(&self, request: &PackageRequest) -> Result<PackageResult, RegistryError> {
        let PackageRequest {
            category,
            plugin_id,
            version,
        } = request;
        let category = *category;

        if !ID_PATTERN.is_match(plugin_id) {
            return Err(RegistryError::InvalidArgument(format!(
                "Invalid plugin id '{}': must contain only lowercase letters, digits and hyphens",
                plugin_id
            )));
        }
        if !SEMVER_PATTERN.is_match(version) {
            return Err(RegistryError::InvalidArgument(format!(
                "Invalid version '{}': expected MAJOR.MINOR.PATCH",
                version
            )));
        }

        tracing::info!("Building and packaging {}/{} v{}", category, plugin_id, version);

        // 1. Manifest
        let manifest_path = get_manifest_path(&self.plugins_dir, category, plugin_id);
        let manifest = validate_manifest_file(&manifest_path)?;

        // 2. Version must be declared
        if manifest.find_version(version).is_none() {
            return Err(RegistryError::VersionNotFound {
                plugin_id: plugin_id.clone(),
                version: version.clone(),
            });
        }

        // 3. Published archives are immutable
        let archive_path = get_archive_path(&self.plugins_dir, category, plugin_id, version);
        if archive_path.exists() {
            return Err(RegistryError::DuplicateVersion {
                version: version.clone(),
                path: archive_path,
            });
        }

        let versions_dir = get_versions_dir(&self.plugins_dir, category, plugin_id);
        fs::create_dir_all(&versions_dir).map_err(|e| RegistryError::io(&versions_dir, e))?;

        // 4. Fresh working directory, removed on drop
        let work_dir = self.create_work_dir(plugin_id, version)?;
        let clone_dir = work_dir.path().join("repo");

        tracing::info!("Cloning repository {}", manifest.repository.url);
        self.tools
            .clone_repository(&manifest.repository.url, &clone_dir)?;

        // 5. Build
        let build_dir = match category {
            Category::Official => clone_dir.join("packages").join(plugin_id),
            Category::Community => clone_dir.clone(),
        };
        if !build_dir.is_dir() {
            return Err(RegistryError::BuildDirectoryMissing(build_dir));
        }
        tracing::info!("Build directory: {}", build_dir.display());

        tracing::info!("Installing dependencies...");
        self.tools.install_dependencies(&build_dir)?;

        tracing::info!("Building project...");
        self.tools.build(&build_dir)?;

        let dist_dir = build_dir.join("dist");
        if !dist_dir.is_dir() {
            return Err(RegistryError::BuildArtifactMissing(dist_dir));
        }

        // 6. Archive
        tracing::info!("Creating ZIP archive...");
        let file_count = match create_zip_archive(&dist_dir, &archive_path) {
            Ok(count) => count,
            Err(e) => {
                // A partial archive would block the next attempt as a duplicate
                let _ = fs::remove_file(&archive_path);
                return Err(e);
            }
        };

        if !archive_path.is_file() {
            return Err(RegistryError::BuildArtifactMissing(archive_path));
        }
        let size_bytes = fs::metadata(&archive_path)
            .map_err(|e| RegistryError::io(&archive_path, e))?
            .len();

        tracing::info!(
            files = file_count,
            "Package created: {} ({:.2} KB)",
            archive_path.display(),
            size_bytes as f64 / 1024.0
        );

        Ok(PackageResult {
            archive_path,
            size_bytes,
            file_count,
        })
    }

    fn create_work_dir(&self, plugin_id: &str, version: &str) -> Result<TempDir, RegistryError> {
        fs::create_dir_all(&self.temp_root).map_err(|e| RegistryError::io(&self.temp_root, e))?;
        tempfile::Builder::new()
            .prefix(&format!("{}-{}-", plugin_id, version))
            .tempdir_in(&self.temp_root)
            .map_err(|e| RegistryError::io(&self.temp_root, e))
    }
}

/// Zip the contents of `source_dir` (not the directory itself) into `archive_path`.
///
/// Entry names use `/` separators. Returns the number of files written.
pub fn create_zip_archive(source_dir: &Path, archive_path: &Path) -> Result<usize, RegistryError> {
    let file = fs::File::create(archive_path).map_err(|e| RegistryError::io(archive_path, e))?;
    let mut writer = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut file_count = 0;
    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source_dir).to_path_buf();
            RegistryError::io(path, io::Error::other(e))
        })?;

        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| RegistryError::io(entry.path(), io::Error::other(e)))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{}/", name), options)
                .map_err(|e| RegistryError::io(archive_path, io::Error::other(e)))?;
        } else if entry.file_type().is_file() {
            writer
                .start_file(name, options)
                .map_err(|e| RegistryError::io(archive_path, io::Error::other(e)))?;
            let mut source =
                fs::File::open(entry.path()).map_err(|e| RegistryError::io(entry.path(), e))?;
            io::copy(&mut source, &mut writer).map_err(|e| RegistryError::io(archive_path, e))?;
            file_count += 1;
        }
        // Skip symlinks and other file types
    }

    writer
        .finish()
        .map_err(|e| RegistryError::io(archive_path, io::Error::other(e)))?;
    Ok(file_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::tests::sample_manifest_json;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Records every step and fakes a repository on clone.
    #[derive(Default)]
    struct FakeTools {
        calls: RefCell<Vec<String>>,
        /// Relative build directory created on clone
        build_subdir: Option<String>,
        /// Whether `build` writes a dist directory
        produce_dist: bool,
    }

    impl FakeTools {
        fn official(plugin_id: &str) -> Self {
            Self {
                build_subdir: Some(format!("packages/{}", plugin_id)),
                produce_dist: true,
                ..Default::default()
            }
        }

        fn community() -> Self {
            Self {
                build_subdir: Some(String::new()),
                produce_dist: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl BuildTools for FakeTools {
        fn clone_repository(&self, url: &str, dest: &Path) -> Result<(), RegistryError> {
            self.calls.borrow_mut().push(format!("clone {}", url));
            fs::create_dir_all(dest).unwrap();
            if let Some(ref subdir) = self.build_subdir {
                fs::create_dir_all(dest.join(subdir)).unwrap();
            }
            Ok(())
        }

        fn install_dependencies(&self, _build_dir: &Path) -> Result<(), RegistryError> {
            self.calls.borrow_mut().push("install".to_string());
            Ok(())
        }

        fn build(&self, build_dir: &Path) -> Result<(), RegistryError> {
            self.calls.borrow_mut().push("build".to_string());
            if self.produce_dist {
                let dist = build_dir.join("dist");
                fs::create_dir_all(dist.join("assets")).unwrap();
                fs::write(dist.join("index.js"), "export default {};").unwrap();
                fs::write(dist.join("assets/style.css"), "body {}").unwrap();
            }
            Ok(())
        }
    }

    fn setup(category: Category, plugin_id: &str) -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let plugins_dir = temp_dir.path().join("plugins");
        let temp_root = temp_dir.path().join(".temp");
        let manifest_path = get_manifest_path(&plugins_dir, category, plugin_id);
        fs::create_dir_all(manifest_path.parent().unwrap()).unwrap();
        fs::write(
            &manifest_path,
            serde_json::to_string_pretty(&sample_manifest_json(plugin_id, "Tree Editor")).unwrap(),
        )
        .unwrap();
        (temp_dir, plugins_dir, temp_root)
    }

    fn request(category: Category, plugin_id: &str, version: &str) -> PackageRequest {
        PackageRequest {
            category,
            plugin_id: plugin_id.to_string(),
            version: version.to_string(),
        }
    }

    fn archive_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    #[test]
    fn test_existing_archive_rejected_before_build() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Official, "tree-editor");
        let archive = get_archive_path(&plugins_dir, Category::Official, "tree-editor", "1.0.0");
        fs::create_dir_all(archive.parent().unwrap()).unwrap();
        fs::write(&archive, "published").unwrap();

        let packager = Packager::new(plugins_dir, temp_root.clone(), FakeTools::official("tree-editor"));
        let result = packager.package(&request(Category::Official, "tree-editor", "1.0.0"));

        assert!(matches!(result, Err(RegistryError::DuplicateVersion { .. })));
        assert!(packager.tools().calls().is_empty());
        assert!(!temp_root.exists());
        assert_eq!(fs::read_to_string(&archive).unwrap(), "published");
    }

    #[test]
    fn test_unknown_version_rejected_before_build() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Official, "tree-editor");
        let packager = Packager::new(plugins_dir, temp_root, FakeTools::official("tree-editor"));

        let result = packager.package(&request(Category::Official, "tree-editor", "3.0.0"));
        assert!(matches!(result, Err(RegistryError::VersionNotFound { .. })));
        assert!(packager.tools().calls().is_empty());
    }

    #[test]
    fn test_missing_manifest() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Official, "tree-editor");
        let packager = Packager::new(plugins_dir, temp_root, FakeTools::community());

        let result = packager.package(&request(Category::Community, "tree-editor", "1.0.0"));
        assert!(matches!(result, Err(RegistryError::MissingFile(_))));
    }

    #[test]
    fn test_invalid_plugin_id_rejected() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Official, "tree-editor");
        let packager = Packager::new(plugins_dir, temp_root, FakeTools::community());

        let result = packager.package(&request(Category::Official, "../escape", "1.0.0"));
        assert!(matches!(result, Err(RegistryError::InvalidArgument(_))));
        let result = packager.package(&request(Category::Official, "tree-editor", "latest"));
        assert!(matches!(result, Err(RegistryError::InvalidArgument(_))));
    }

    #[test]
    fn test_package_official_plugin() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Official, "tree-editor");
        let packager = Packager::new(
            plugins_dir.clone(),
            temp_root.clone(),
            FakeTools::official("tree-editor"),
        );

        let result = packager
            .package(&request(Category::Official, "tree-editor", "1.0.0"))
            .unwrap();

        assert_eq!(
            result.archive_path,
            get_archive_path(&plugins_dir, Category::Official, "tree-editor", "1.0.0")
        );
        assert_eq!(result.file_count, 2);
        assert!(result.size_bytes > 0);
        assert_eq!(
            archive_names(&result.archive_path),
            vec!["assets/", "assets/style.css", "index.js"]
        );
        assert_eq!(
            packager.tools().calls(),
            vec![
                "clone https://github.com/janedoe/tree-editor".to_string(),
                "install".to_string(),
                "build".to_string(),
            ]
        );
        assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 0);
    }

    #[test]
    fn test_package_community_plugin_builds_from_root() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Community, "my-plugin");
        let packager = Packager::new(plugins_dir, temp_root, FakeTools::community());

        let result = packager
            .package(&request(Category::Community, "my-plugin", "1.1.0"))
            .unwrap();
        assert!(result.archive_path.ends_with("versions/1.1.0.zip"));
        assert!(archive_names(&result.archive_path).contains(&"index.js".to_string()));
    }

    #[test]
    fn test_missing_build_directory() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Official, "tree-editor");
        let packager = Packager::new(plugins_dir, temp_root, FakeTools::community());

        let result = packager.package(&request(Category::Official, "tree-editor", "1.0.0"));
        assert!(matches!(result, Err(RegistryError::BuildDirectoryMissing(_))));
        assert_eq!(packager.tools().calls().len(), 1);
    }

    #[test]
    fn test_missing_dist_is_fatal_and_cleans_up() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Official, "tree-editor");
        let tools = FakeTools {
            produce_dist: false,
            ..FakeTools::official("tree-editor")
        };
        let packager = Packager::new(plugins_dir.clone(), temp_root.clone(), tools);

        let result = packager.package(&request(Category::Official, "tree-editor", "1.0.0"));
        assert!(matches!(result, Err(RegistryError::BuildArtifactMissing(_))));
        assert!(
            !get_archive_path(&plugins_dir, Category::Official, "tree-editor", "1.0.0").exists()
        );
        assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 0);
    }

    #[test]
    fn test_second_package_of_same_version_is_duplicate() {
        let (_temp, plugins_dir, temp_root) = setup(Category::Official, "tree-editor");
        let packager = Packager::new(plugins_dir, temp_root, FakeTools::official("tree-editor"));

        packager
            .package(&request(Category::Official, "tree-editor", "1.0.0"))
            .unwrap();
        let result = packager.package(&request(Category::Official, "tree-editor", "1.0.0"));
        assert!(matches!(result, Err(RegistryError::DuplicateVersion { .. })));
        assert_eq!(packager.tools().calls().len(), 3);
    }

    #[test]
    fn test_command_build_tools_reports_failure() {
        let temp_dir = TempDir::new().unwrap();
        let tools = CommandBuildTools::new("git", "false");
        let result = tools.build(temp_dir.path());
        assert!(matches!(
            result,
            Err(RegistryError::CommandFailed { .. }) | Err(RegistryError::Io { .. })
        ));
    }
}
