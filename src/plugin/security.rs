//! Security checks for published plugins.
//!
//! For each manifest the scanner confirms the GitHub repository exists,
//! confirms the distribution URLs answer, then looks through the
//! repository's top-level `.ts`/`.js` sources for risky patterns.
//! Pattern findings are advisory and never fail a check; an unreachable
//! repository or distribution URL does.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::SecurityConfig;
use crate::error::RegistryError;
use crate::plugin::discovery::{DiscoveryStrategy, discover_all};
use crate::plugin::manifest::{Distribution, Repository};
use crate::plugin::validation::{ManifestFailure, load_manifest_value};

static DANGEROUS_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"eval\s*\(", "Usage of eval() is not allowed"),
        (r"Function\s*\(", "Usage of Function() constructor is not allowed"),
        (r"new\s+Function\s*\(", "Usage of new Function() is not allowed"),
        (r"\.innerHTML\s*=", "Direct innerHTML assignment is discouraged (XSS risk)"),
        (r"document\.write\s*\(", "Usage of document.write() is not allowed"),
        (r"dangerouslySetInnerHTML", "Usage of dangerouslySetInnerHTML is discouraged"),
        (r"__proto__", "Prototype pollution risk detected"),
        (r"child_process", "Usage of child_process is not allowed"),
        (
            r#"require\s*\(\s*['"`]fs['"`]\s*\)"#,
            "File system access should be through API only",
        ),
    ]
    .into_iter()
    .map(|(pattern, message)| (Regex::new(pattern).expect("Invalid security pattern"), message))
    .collect()
});

static GITHUB_REPO_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"github\.com/([^/]+)/([^/]+)").expect("Invalid GitHub pattern"));

const SCANNED_EXTENSIONS: [&str; 2] = [".ts", ".js"];

/// A risky pattern found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityWarning {
    pub file: String,
    pub message: String,
}

impl fmt::Display for SecurityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

/// Match every dangerous pattern against one file. Each pattern is reported
/// at most once per file.
pub fn scan_source(file_name: &str, content: &str) -> Vec<SecurityWarning> {
    DANGEROUS_PATTERNS
        .iter()
        .filter(|(pattern, _)| pattern.is_match(content))
        .map(|(_, message)| SecurityWarning {
            file: file_name.to_string(),
            message: message.to_string(),
        })
        .collect()
}

/// Split a GitHub repository URL into `(owner, repo)`, dropping a trailing `.git`.
pub fn parse_github_repo(url: &str) -> Result<(String, String), RegistryError> {
    let captures = GITHUB_REPO_PATTERN
        .captures(url)
        .ok_or_else(|| RegistryError::InvalidArgument(format!("Invalid GitHub repository URL: {}", url)))?;

    let owner = captures[1].to_string();
    let repo = captures[2].trim_end_matches(".git").to_string();
    Ok((owner, repo))
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoLicense {
    #[serde(default)]
    pub spdx_id: Option<String>,
}

/// The subset of the GitHub repository resource the scanner reports.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub license: Option<RepoLicense>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RepoInfo {
    pub fn license_id(&self) -> &str {
        self.license
            .as_ref()
            .and_then(|l| l.spdx_id.as_deref())
            .unwrap_or("None")
    }
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    download_url: Option<String>,
}

/// The manifest fields a security check needs.
#[derive(Debug, Deserialize)]
struct ScanTarget {
    name: String,
    repository: Repository,
    #[serde(default)]
    distribution: Option<Distribution>,
}

/// Result of checking one manifest.
#[derive(Debug)]
pub struct ScanReport {
    pub path: PathBuf,
    pub name: String,
    pub repository: RepoInfo,
    pub warnings: Vec<SecurityWarning>,
}

/// Outcome of checking every manifest under the plugins root.
#[derive(Debug, Default)]
pub struct SecurityReport {
    pub passed: Vec<ScanReport>,
    pub failures: Vec<ManifestFailure>,
}

impl SecurityReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Blocking GitHub and distribution URL checker.
pub struct SecurityScanner {
    client: reqwest::blocking::Client,
    api_base: String,
}

impl SecurityScanner {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::blocking::Response, RegistryError> {
        let response = request.send().map_err(|e| {
            tracing::warn!(error = %e, url = %url, "Request failed");
            RegistryError::NetworkUnavailable {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        tracing::debug!(status = %response.status(), url = %url, "Received HTTP response");

        if !response.status().is_success() {
            return Err(RegistryError::NonSuccessStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, RegistryError> {
        let response = self.send(self.client.get(url), url)?;
        response
            .json()
            .map_err(|e| RegistryError::NetworkUnavailable {
                url: url.to_string(),
                message: format!("Invalid response body: {}", e),
            })
    }

    /// Confirm the repository exists on GitHub.
    pub fn check_repository(&self, repo_url: &str) -> Result<RepoInfo, RegistryError> {
        tracing::info!("Checking repository: {}", repo_url);

        let (owner, repo) = parse_github_repo(repo_url)?;
        let api_url = format!("{}/repos/{}/{}", self.api_base, owner, repo);
        let info: RepoInfo = self.get_json(&api_url)?;

        tracing::info!(
            stars = info.stargazers_count,
            license = %info.license_id(),
            updated_at = %info.updated_at.as_deref().unwrap_or("unknown"),
            "Repository exists: {}",
            info.full_name
        );
        Ok(info)
    }

    /// Confirm a distribution URL answers a HEAD request with 2xx.
    pub fn check_distribution_url(&self, url: &str) -> Result<(), RegistryError> {
        tracing::info!("Checking distribution URL: {}", url);
        self.send(self.client.head(url), url)?;
        tracing::info!("Distribution URL is accessible: {}", url);
        Ok(())
    }

    /// Scan the repository's top-level sources for dangerous patterns.
    ///
    /// Never fails; problems reaching the repository are logged and yield
    /// whatever was collected so far.
    pub fn scan_repository_code(&self, repo_url: &str) -> Vec<SecurityWarning> {
        tracing::info!("Scanning repository code for security issues...");

        let mut warnings = Vec::new();
        if let Err(e) = self.collect_warnings(repo_url, &mut warnings) {
            tracing::warn!(error = %e, "Could not scan repository");
        }

        if warnings.is_empty() {
            tracing::info!("No obvious security issues detected");
        } else {
            for warning in &warnings {
                tracing::warn!("Security warning: {}", warning);
            }
            tracing::warn!("Please review these patterns manually.");
        }
        warnings
    }

    fn collect_warnings(
        &self,
        repo_url: &str,
        warnings: &mut Vec<SecurityWarning>,
    ) -> Result<(), RegistryError> {
        let (owner, repo) = parse_github_repo(repo_url)?;
        let contents_url = format!("{}/repos/{}/{}/contents", self.api_base, owner, repo);
        let entries: Vec<ContentEntry> = self.get_json(&contents_url)?;

        for entry in entries {
            if entry.kind != "file"
                || !SCANNED_EXTENSIONS.iter().any(|ext| entry.name.ends_with(ext))
            {
                continue;
            }
            let Some(download_url) = entry.download_url else {
                continue;
            };

            let content = match self
                .send(self.client.get(&download_url), &download_url)
                .and_then(|r| {
                    r.text().map_err(|e| RegistryError::NetworkUnavailable {
                        url: download_url.clone(),
                        message: e.to_string(),
                    })
                }) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(file = %entry.name, error = %e, "Skipping file");
                    continue;
                }
            };

            warnings.extend(scan_source(&entry.name, &content));
        }
        Ok(())
    }

    /// Run every check for one manifest file.
    ///
    /// Distribution checks are skipped when the manifest has no
    /// `distribution` block.
    pub fn check_manifest(&self, path: &Path) -> Result<ScanReport, RegistryError> {
        tracing::info!("=== Security check for {} ===", path.display());

        let value = load_manifest_value(path)?;
        let target: ScanTarget =
            serde_json::from_value(value).map_err(|e| RegistryError::SchemaViolation {
                path: path.to_path_buf(),
                errors: vec![e.to_string()],
            })?;

        let repository = self.check_repository(&target.repository.url)?;

        match &target.distribution {
            Some(distribution) => {
                self.check_distribution_url(&distribution.url)?;
                if let Some(ref css) = distribution.css {
                    self.check_distribution_url(css)?;
                }
            }
            None => tracing::debug!("No distribution block, skipping URL checks"),
        }

        let warnings = self.scan_repository_code(&target.repository.url);

        tracing::info!("Security check completed for {}", target.name);
        Ok(ScanReport {
            path: path.to_path_buf(),
            name: target.name,
            repository,
            warnings,
        })
    }

    /// Check every manifest in every category, one at a time.
    pub fn check_all(
        &self,
        plugins_dir: &Path,
        strategy: DiscoveryStrategy,
    ) -> Result<SecurityReport> {
        let mut report = SecurityReport::default();

        for discovered in discover_all(plugins_dir, strategy)? {
            match self.check_manifest(&discovered.path) {
                Ok(scan) => report.passed.push(scan),
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
}
