//! Error kinds shared by validation, aggregation, packaging and scanning.

use std::fmt;
use std::path::PathBuf;

/// Failure of a single registry operation.
///
/// Batch operations (validating every manifest, generating the registry,
/// scanning every plugin) collect these per item and keep going; a single
/// operation such as packaging one version aborts on the first one.
#[derive(Debug)]
pub enum RegistryError {
    /// A file the operation depends on does not exist.
    MissingFile(PathBuf),
    /// A manifest could not be parsed as JSON.
    MalformedJson { path: PathBuf, message: String },
    /// A manifest parsed but broke one or more schema rules.
    SchemaViolation { path: PathBuf, errors: Vec<String> },
    /// The requested version is not listed in the manifest.
    VersionNotFound { plugin_id: String, version: String },
    /// An archive for this version was already published.
    DuplicateVersion { version: String, path: PathBuf },
    /// The cloned repository has no directory to build from.
    BuildDirectoryMissing(PathBuf),
    /// The build finished without producing the expected output.
    BuildArtifactMissing(PathBuf),
    /// An external tool exited unsuccessfully.
    CommandFailed { command: String, status: Option<i32> },
    /// A request could not be sent or the response could not be read.
    NetworkUnavailable { url: String, message: String },
    /// The remote answered with a non-2xx status.
    NonSuccessStatus { url: String, status: u16 },
    /// A caller-supplied identifier is not usable.
    InvalidArgument(String),
    /// Any other filesystem failure.
    Io { path: PathBuf, source: std::io::Error },
}

impl RegistryError {
    /// Per-field messages for schema violations, empty for every other kind.
    pub fn schema_errors(&self) -> &[String] {
        match self {
            RegistryError::SchemaViolation { errors, .. } => errors,
            _ => &[],
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::MissingFile(path) => {
                write!(f, "Manifest file not found: {}", path.display())
            }
            RegistryError::MalformedJson { path, message } => {
                write!(f, "Invalid JSON in {}: {}", path.display(), message)
            }
            RegistryError::SchemaViolation { path, errors } => {
                write!(f, "Validation errors in {}:", path.display())?;
                for error in errors {
                    write!(f, "\n  {}", error)?;
                }
                Ok(())
            }
            RegistryError::VersionNotFound { plugin_id, version } => {
                write!(
                    f,
                    "Version {} not found in manifest.json of '{}'",
                    version, plugin_id
                )
            }
            RegistryError::DuplicateVersion { version, path } => write!(
                f,
                "Version {} already exists: {}\nVersions are immutable. Please increment the version number.",
                version,
                path.display()
            ),
            RegistryError::BuildDirectoryMissing(path) => {
                write!(f, "Build directory not found: {}", path.display())
            }
            RegistryError::BuildArtifactMissing(path) => {
                write!(f, "Build artifact not found: {}", path.display())
            }
            RegistryError::CommandFailed { command, status } => match status {
                Some(code) => write!(f, "Command `{}` failed with exit code {}", command, code),
                None => write!(f, "Command `{}` was terminated by a signal", command),
            },
            RegistryError::NetworkUnavailable { url, message } => {
                write!(f, "Request to {} failed: {}", url, message)
            }
            RegistryError::NonSuccessStatus { url, status } => {
                write!(f, "Request to {} returned HTTP {}", url, status)
            }
            RegistryError::InvalidArgument(message) => f.write_str(message),
            RegistryError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
