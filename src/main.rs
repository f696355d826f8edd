mod cli;

use ecs_plugin_registry::config;
use ecs_plugin_registry::logging;
use ecs_plugin_registry::plugin;
use ecs_plugin_registry::utils;

use anyhow::{Result, anyhow};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use plugin::manifest::Category;
use plugin::registry::RegistryOptions;
use plugin::{
    CommandBuildTools, DiscoveryStrategy, ManifestFailure, PackageRequest, Packager,
    SecurityScanner, build_registry, validate_all, validate_manifest_file, write_registry,
};
use std::path::{Path, PathBuf};
use utils::paths::get_config_path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load_required(path)?,
        None => Config::load(&get_config_path(&cli.root))?,
    };

    // Guard must be kept alive so buffered file logs are flushed
    let log_dir = config.log_dir(&cli.root)?;
    let _log_guard = logging::init_logging(&config.logging.level, log_dir.as_deref());

    let discovery = cli.discovery.unwrap_or(config.discovery);
    let plugins_dir = config.plugins_dir(&cli.root)?;

    match cli.command {
        Commands::Validate { manifest } => match manifest {
            Some(path) => handle_validate_one(&path),
            None => handle_validate_all(&plugins_dir, discovery),
        },
        Commands::Generate { output } => {
            let output = match output {
                Some(path) => path,
                None => config.output_path(&cli.root)?,
            };
            handle_generate(&config, &plugins_dir, discovery, &output)
        }
        Commands::Package {
            category,
            plugin_id,
            version,
        } => handle_package(&config, &cli.root, &plugins_dir, category, plugin_id, version),
        Commands::Security { manifest } => {
            handle_security(&config, &plugins_dir, discovery, manifest.as_deref())
        }
    }
}

fn print_failures(failures: &[ManifestFailure]) {
    for failure in failures {
        match failure.error.schema_errors() {
            [] => eprintln!("  - {}: {}", failure.path.display(), failure.error),
            errors => {
                eprintln!("  - {}:", failure.path.display());
                for error in errors {
                    eprintln!("      {}", error);
                }
            }
        }
    }
}

fn handle_validate_one(path: &Path) -> Result<()> {
    match validate_manifest_file(path) {
        Ok(manifest) => {
            println!(
                "\x1b[32m[OK]\x1b[0m {} ({} v{}) is valid",
                path.display(),
                manifest.id,
                manifest.latest_version
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("\x1b[31m[ERROR]\x1b[0m {}", e);
            std::process::exit(1);
        }
    }
}

fn handle_validate_all(plugins_dir: &Path, discovery: DiscoveryStrategy) -> Result<()> {
    let report = validate_all(plugins_dir, discovery)?;

    if !report.is_success() {
        eprintln!(
            "\x1b[31m[ERROR]\x1b[0m {} of {} manifest(s) failed validation:",
            report.failures.len(),
            report.total()
        );
        print_failures(&report.failures);
        std::process::exit(1);
    }

    println!(
        "\x1b[32m[OK]\x1b[0m All {} manifest(s) are valid",
        report.passed.len()
    );
    Ok(())
}

fn handle_generate(
    config: &Config,
    plugins_dir: &Path,
    discovery: DiscoveryStrategy,
    output: &Path,
) -> Result<()> {
    let options = RegistryOptions {
        discovery,
        ..RegistryOptions::from(config)
    };
    let aggregation = build_registry(plugins_dir, &options)?;

    if !aggregation.errors.is_empty() {
        eprintln!(
            "\x1b[33m[WARN]\x1b[0m {} manifest(s) skipped:",
            aggregation.errors.len()
        );
        print_failures(&aggregation.errors);
    }

    write_registry(&aggregation.document, output)?;

    let summary = aggregation.document.summary();
    println!("\x1b[32m[OK]\x1b[0m Registry generated");
    println!("  Total:     {}", summary.total);
    println!("  Official:  {}", summary.official);
    println!("  Community: {}", summary.community);
    println!("  Output:    {}", output.display());
    Ok(())
}

fn handle_package(
    config: &Config,
    root: &Path,
    plugins_dir: &Path,
    category: Category,
    plugin_id: String,
    version: String,
) -> Result<()> {
    let temp_root: PathBuf = config.temp_root(root)?;
    let packager = Packager::new(
        plugins_dir.to_path_buf(),
        temp_root,
        CommandBuildTools::from(&config.packaging),
    );

    let result = packager
        .package(&PackageRequest {
            category,
            plugin_id,
            version,
        })
        .map_err(|e| anyhow!("Packaging failed: {}", e))?;

    println!("\x1b[32m[OK]\x1b[0m Package created");
    println!("  File: {}", result.archive_path.display());
    println!("  Size: {:.2} KB", result.size_bytes as f64 / 1024.0);
    Ok(())
}

fn handle_security(
    config: &Config,
    plugins_dir: &Path,
    discovery: DiscoveryStrategy,
    manifest: Option<&Path>,
) -> Result<()> {
    let scanner = SecurityScanner::new(&config.security)?;

    let (passed, failures) = match manifest {
        Some(path) => match scanner.check_manifest(path) {
            Ok(report) => (vec![report], Vec::new()),
            Err(e) => {
                eprintln!("\x1b[31m[ERROR]\x1b[0m Security check failed: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            let report = scanner.check_all(plugins_dir, discovery)?;
            (report.passed, report.failures)
        }
    };

    for report in &passed {
        if report.warnings.is_empty() {
            println!("\x1b[32m[OK]\x1b[0m {}", report.name);
        } else {
            println!(
                "\x1b[33m[WARN]\x1b[0m {}: {} pattern(s) to review",
                report.name,
                report.warnings.len()
            );
            for warning in &report.warnings {
                println!("  - {}", warning);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!("\x1b[31m[ERROR]\x1b[0m Security check failed:");
        print_failures(&failures);
        std::process::exit(1);
    }

    println!("\x1b[32m[OK]\x1b[0m All security checks passed");
    Ok(())
}
