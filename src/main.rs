//! configd command-line interface.
//!
//! A thin layer over the library: parse and validate configuration files,
//! diff them, and drive the snapshot/version managers against the local
//! host. All behavior lives in the library; this binary only wires the
//! composition root together.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser as CliParser, Subcommand};
use tracing_subscriber::EnvFilter;

use configd::config::EngineConfig;
use configd::diff::calculate_diff;
use configd::executor::LocalExecutor;
use configd::parser::Parser;
use configd::snapshot::{FsStore, SnapshotFormat, SnapshotManager, SnapshotStatus, VersionManager};
use configd::validate::Validator;

#[derive(CliParser)]
#[command(name = "configd", version, about = "Configuration-state engine for network devices")]
struct Cli {
    /// Path to a TOML engine configuration file.
    #[arg(short, long, global = true, env = "CONFIGD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the storage directory.
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a configuration file and print the tree as JSON.
    Parse {
        /// Configuration file (one statement per line)
        file: PathBuf,
    },

    /// Validate a configuration file against the baseline rules.
    Validate {
        /// Configuration file
        file: PathBuf,
    },

    /// Diff two configuration files.
    Diff {
        /// Old configuration file
        old: PathBuf,
        /// New configuration file
        new: PathBuf,
    },

    /// Snapshot operations against the local host.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// Version-history operations against the local host.
    Version {
        #[command(subcommand)]
        action: VersionAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Capture a new snapshot.
    Create {
        /// Snapshot name
        name: String,
        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Export format: native, json, yaml, xml
        #[arg(short, long, default_value = "native")]
        format: String,
    },
    /// List snapshots, newest first.
    List {
        /// Maximum number to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one snapshot's metadata as JSON.
    Show {
        /// Snapshot id
        id: String,
    },
    /// Delete a snapshot.
    Delete {
        /// Snapshot id
        id: String,
    },
    /// Restore the configuration from a snapshot.
    Restore {
        /// Snapshot id
        id: String,
        /// Validate only, apply nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Compare two snapshots line-by-line.
    Compare {
        /// Older snapshot id
        old_id: String,
        /// Newer snapshot id
        new_id: String,
        /// Use the structural tree diff instead of line sets
        #[arg(long)]
        tree: bool,
    },
}

#[derive(Subcommand)]
enum VersionAction {
    /// Capture the live configuration as a new version.
    Create {
        /// Version name
        name: String,
        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Creator recorded on the version
        #[arg(long)]
        created_by: Option<String>,
        /// Tags attached to the version
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// List versions, highest number first.
    List,
    /// Restore the configuration from a version.
    Restore {
        /// Version id
        id: String,
        /// Validate only, apply nothing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }

    match cli.command {
        Commands::Parse { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let tree = Parser::new().parse_config(&text);
            println!("{}", serde_json::to_string_pretty(&tree.to_dict())?);
        }

        Commands::Validate { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let tree = Parser::new().parse_config(&text);
            let errors = Validator::new().validate(&tree);
            if errors.is_empty() {
                println!("{}: valid", file.display());
            } else {
                for error in &errors {
                    println!("{} [{}]: {}", error.path, error.error_type, error.message);
                }
                bail!("{} validation error(s)", errors.len());
            }
        }

        Commands::Diff { old, new } => {
            let parser = Parser::new();
            let old_text = std::fs::read_to_string(&old)
                .with_context(|| format!("reading {}", old.display()))?;
            let new_text = std::fs::read_to_string(&new)
                .with_context(|| format!("reading {}", new.display()))?;
            let diff = calculate_diff(&parser.parse_config(&old_text), &parser.parse_config(&new_text));
            if diff.is_empty() {
                println!("no differences");
            } else {
                println!("{}", diff.render());
            }
        }

        Commands::Snapshot { action } => {
            let manager = snapshot_manager(&config)?;
            run_snapshot_action(&manager, action).await?;
        }

        Commands::Version { action } => {
            let manager = version_manager(&config)?;
            run_version_action(&manager, action).await?;
        }
    }

    Ok(())
}

fn snapshot_manager(config: &EngineConfig) -> Result<SnapshotManager> {
    config.validate()?;
    let store = Arc::new(FsStore::new(&config.storage_dir)?);
    let executor = Arc::new(LocalExecutor::new());
    Ok(SnapshotManager::new(executor, store, config.clone()))
}

fn version_manager(config: &EngineConfig) -> Result<VersionManager> {
    config.validate()?;
    let store = Arc::new(FsStore::new(&config.storage_dir)?);
    let executor = Arc::new(LocalExecutor::new());
    Ok(VersionManager::new(executor, store, config.clone()))
}

async fn run_snapshot_action(manager: &SnapshotManager, action: SnapshotAction) -> Result<()> {
    match action {
        SnapshotAction::Create {
            name,
            description,
            format,
        } => {
            let format: SnapshotFormat = format.parse()?;
            let snapshot = manager.create_snapshot(&name, &description, format).await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            if snapshot.status != SnapshotStatus::Completed {
                bail!("snapshot creation failed");
            }
        }
        SnapshotAction::List { limit } => {
            for snapshot in manager.list_snapshots(limit) {
                println!(
                    "{}  {}  {:<11} {}",
                    snapshot.id,
                    snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    snapshot.status.to_string(),
                    snapshot.name
                );
            }
        }
        SnapshotAction::Show { id } => match manager.get_snapshot(&id) {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => bail!("snapshot '{id}' not found"),
        },
        SnapshotAction::Delete { id } => {
            if manager.delete_snapshot(&id).await? {
                println!("deleted {id}");
            } else {
                bail!("snapshot '{id}' not found");
            }
        }
        SnapshotAction::Restore { id, dry_run } => {
            let report = manager.restore_from_snapshot(&id, dry_run).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        SnapshotAction::Compare {
            old_id,
            new_id,
            tree,
        } => {
            if tree {
                let diff = manager.compare_trees(&old_id, &new_id)?;
                if diff.is_empty() {
                    println!("no differences");
                } else {
                    println!("{}", diff.render());
                }
            } else {
                for entry in manager.compare_configs(&old_id, &new_id)? {
                    let marker = match entry.change {
                        configd::snapshot::LineChange::Added => '+',
                        configd::snapshot::LineChange::Removed => '-',
                    };
                    println!("{marker} {}", entry.line);
                }
            }
        }
    }
    Ok(())
}

async fn run_version_action(manager: &VersionManager, action: VersionAction) -> Result<()> {
    match action {
        VersionAction::Create {
            name,
            description,
            created_by,
            tag,
        } => {
            let version = manager
                .create_version(&name, &description, created_by.as_deref(), tag)
                .await?;
            println!("{}", serde_json::to_string_pretty(&version)?);
        }
        VersionAction::List => {
            for version in manager.list_versions() {
                println!(
                    "v{:04}  {}  {:<11} {}  {}",
                    version.version,
                    version.created_at.format("%Y-%m-%d %H:%M:%S"),
                    version.status.to_string(),
                    version.id,
                    version.name
                );
            }
        }
        VersionAction::Restore { id, dry_run } => {
            let report = manager.restore_version(&id, dry_run).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
