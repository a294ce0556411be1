//! `sleet`: maintain a static, versioned package feed.
//!
//! Every command operates on the feed at `--feed` (a local directory).
//! Exit code 0 on success, 1 on any failure; the top-level message stays
//! concise and the full failure chain is available at debug level.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use semver::Version;
use sleet_storage::{LocalFileSystem, StorageFileSystem};
use sleet_sync::{FeedSyncConfig, FeedSyncEngine};
use sleet_types::{FeedCapability, PackageIdentity, PackageInput, PackageMetadata};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sleet", version, about = "Static package feed generator")]
struct Cli {
    /// Feed root directory.
    #[arg(long, global = true, value_name = "PATH", default_value = ".")]
    feed: PathBuf,

    /// Enable verbose logging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new feed.
    Init,

    /// Add a package to the feed.
    Push {
        /// Package id.
        #[arg(long)]
        id: String,
        /// Package version.
        #[arg(long)]
        version: Version,
        /// Path to a JSON file with package metadata.
        #[arg(long, value_name = "PATH")]
        metadata: Option<PathBuf>,
        /// Feed-relative path of the package archive payload.
        #[arg(long, value_name = "PATH")]
        content_path: Option<String>,
        /// Overwrite the package if it is already present.
        #[arg(long)]
        force: bool,
        /// Maximum non-pinned versions retained per package id.
        #[arg(long, value_name = "N")]
        retain: Option<usize>,
        /// Identity protected from pruning, as id@version. Repeatable.
        #[arg(long = "pin", value_name = "ID@VERSION")]
        pins: Vec<String>,
    },

    /// Remove a package from the feed.
    Delete {
        /// Package id.
        #[arg(long)]
        id: String,
        /// Package version.
        #[arg(long)]
        version: Version,
    },

    /// Rebuild all derived indexes from the authoritative package index.
    Recreate,

    /// Check every derived index against the authoritative package index.
    Validate,

    /// Print feed size counters.
    Stats,

    /// Show or edit the feed's format requirements.
    FeedSettings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    /// Print the requirements block.
    Show,
    /// Require a capability, as name:version.
    AddCapability { capability: FeedCapabilityArg },
    /// Drop a required capability by name.
    RemoveCapability { name: String },
}

/// Newtype so clap can parse `name:version` directly.
#[derive(Debug, Clone)]
struct FeedCapabilityArg(FeedCapability);

impl std::str::FromStr for FeedCapabilityArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(FeedCapabilityArg).map_err(|e| format!("{e}"))
    }
}

fn parse_pin(raw: &str) -> Result<PackageIdentity> {
    let (id, version) = raw
        .split_once('@')
        .ok_or_else(|| anyhow!("pin must be id@version, got `{raw}`"))?;
    let version = Version::parse(version).with_context(|| format!("invalid pin version in `{raw}`"))?;
    Ok(PackageIdentity::new(id, version))
}

fn load_metadata(path: &PathBuf) -> Result<PackageMetadata> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading metadata file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing metadata file {}", path.display()))
}

async fn run(cli: Cli) -> Result<()> {
    let fs: Arc<dyn StorageFileSystem> = Arc::new(LocalFileSystem::new(&cli.feed));

    match cli.command {
        Command::Init => {
            FeedSyncEngine::new(fs, FeedSyncConfig::default()).init().await?;
            println!("feed initialized at {}", cli.feed.display());
        }
        Command::Push {
            id,
            version,
            metadata,
            content_path,
            force,
            retain,
            pins,
        } => {
            let pinned: HashSet<PackageIdentity> = pins
                .iter()
                .map(|p| parse_pin(p))
                .collect::<Result<_>>()?;
            let engine = FeedSyncEngine::new(
                fs,
                FeedSyncConfig {
                    retention_limit: retain,
                    pinned,
                    force,
                    disable_telemetry: false,
                },
            );

            let mut input = PackageInput::new(PackageIdentity::new(id, version));
            if let Some(path) = &metadata {
                input.metadata = load_metadata(path)?;
            }
            input.content_path = content_path;

            engine.push(vec![input]).await?;
            println!("pushed 1 package");
        }
        Command::Delete { id, version } => {
            let engine = FeedSyncEngine::new(fs, FeedSyncConfig::default());
            engine
                .remove(vec![PackageIdentity::new(id, version)])
                .await?;
            println!("deleted 1 package");
        }
        Command::Recreate => {
            FeedSyncEngine::new(fs, FeedSyncConfig::default())
                .recreate()
                .await?;
            println!("derived indexes rebuilt");
        }
        Command::Validate => {
            let diagnostics = FeedSyncEngine::new(fs, FeedSyncConfig::default())
                .validate()
                .await?;
            if diagnostics.is_empty() {
                println!("feed is consistent");
            } else {
                for diagnostic in &diagnostics {
                    println!("{diagnostic}");
                }
                return Err(anyhow!("{} inconsistencies found", diagnostics.len()));
            }
        }
        Command::Stats => {
            let stats = FeedSyncEngine::new(fs, FeedSyncConfig::default())
                .stats()
                .await?;
            println!("packages: {}", stats.packages);
            println!("versions: {}", stats.versions);
        }
        Command::FeedSettings { action } => {
            let engine = FeedSyncEngine::new(fs, FeedSyncConfig::default());
            match action {
                SettingsAction::Show => {
                    let reqs = engine.requirements().await?;
                    println!("creator version:  {}", reqs.creator_version);
                    println!("required version: {}", reqs.required_version);
                    if reqs.required_capabilities.is_empty() {
                        println!("capabilities:     (none)");
                    } else {
                        for cap in &reqs.required_capabilities {
                            println!("capability:       {cap}");
                        }
                    }
                }
                SettingsAction::AddCapability { capability } => {
                    engine.add_capability(capability.0).await?;
                    println!("capability added");
                }
                SettingsAction::RemoveCapability { name } => {
                    engine.remove_capability(&name).await?;
                    println!("capability removed");
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            debug!("{e:?}");
            ExitCode::FAILURE
        }
    }
}
