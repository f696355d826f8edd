pub mod discovery;
pub mod manifest;
pub mod packager;
pub mod registry;
pub mod schema;
pub mod security;
pub mod validation;

pub use discovery::{DiscoveredManifest, DiscoveryStrategy, discover_all};
pub use manifest::{Category, Manifest, PluginCategory, VersionEntry};
pub use packager::{BuildTools, CommandBuildTools, PackageRequest, PackageResult, Packager};
pub use registry::{Aggregation, RegistryDocument, RegistryOptions, build_registry, write_registry};
pub use security::{SecurityReport, SecurityScanner, SecurityWarning};
pub use validation::{ManifestFailure, ValidationReport, validate_all, validate_manifest_file};
