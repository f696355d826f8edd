use clap::{Parser, Subcommand};
use ecs_plugin_registry::plugin::{Category, DiscoveryStrategy};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "plugin-registry")]
#[command(about = "Validate, aggregate, package and scan editor plugins", long_about = None)]
pub struct Cli {
    /// Repository root containing plugins/ and registry.toml
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to <root>/registry.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override how manifests are found inside each category
    #[arg(long, global = true, value_enum)]
    pub discovery: Option<DiscoveryStrategy>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate one manifest, or every manifest when none is given
    Validate {
        manifest: Option<PathBuf>,
    },
    /// Build registry.json from all valid manifests
    Generate {
        /// Output file (overrides the configured path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build a plugin release and archive it as versions/<version>.zip
    Package {
        #[arg(value_enum)]
        category: Category,
        plugin_id: String,
        version: String,
    },
    /// Check repositories, distribution URLs and sources of published plugins
    Security {
        manifest: Option<PathBuf>,
    },
}
