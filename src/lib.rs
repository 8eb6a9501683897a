//! # configd - A Configuration-State Engine for Network Devices
//!
//! configd manages the persistent, hierarchical configuration state of a
//! network device: it parses a line-oriented command grammar into a
//! structured tree, tracks differences between tree states, validates values
//! against declarative rules, and maintains an auditable, content-addressed
//! history of full-configuration snapshots that can be listed, compared, and
//! restored.
//!
//! ## Core Concepts
//!
//! - **Commands**: textual `set`/`delete`/`comment`/`rename`/`edit`
//!   statements, one per line
//! - **Tree**: the hierarchical configuration state, with tombstoned deletes
//!   and per-node annotations
//! - **Diff**: added/removed/modified paths between two tree states
//! - **Rules**: declarative constraints matched against flattened tree paths
//! - **Snapshots**: immutable, content-hashed captures of full state
//! - **Versions**: numbered history entries with lineage and tags
//! - **Executor**: the abstract "run one command line" capability through
//!   which live device state is read and restored
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                SnapshotManager / VersionManager                      │
//! │     (capture, list, compare, restore, prune, version lineage)        │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                  │                  │               │
//!          ▼                  ▼                  ▼               ▼
//! ┌───────────────┐ ┌────────────────┐ ┌───────────────┐ ┌─────────────┐
//! │    Parser     │ │  Diff Engine   │ │   Validator   │ │ ObjectStore │
//! │ (text → tree) │ │ (tree × tree)  │ │ (rules)       │ │ (fs/memory) │
//! └───────────────┘ └────────────────┘ └───────────────┘ └─────────────┘
//!          │
//!          ▼
//! ┌───────────────┐          ┌──────────────────────────────────────────┐
//! │  ConfigNode   │          │          Executor (local, ...)            │
//! │  (tree model) │          │  single capability: run one command line  │
//! └───────────────┘          └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use configd::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = EngineConfig::default();
//!     let executor = Arc::new(LocalExecutor::new());
//!     let store = Arc::new(FsStore::new(&config.storage_dir)?);
//!
//!     let manager = SnapshotManager::new(executor, store, config);
//!
//!     let snapshot = manager
//!         .create_snapshot("nightly", "scheduled capture", SnapshotFormat::Native)
//!         .await;
//!     assert_eq!(snapshot.status, SnapshotStatus::Completed);
//!
//!     let diff = manager.compare_trees(&older_id, &snapshot.id)?;
//!     println!("{}", diff.render());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of the most commonly needed types.

    // Error handling
    pub use crate::error::{Error, Result};

    // Engine configuration
    pub use crate::config::EngineConfig;

    // Grammar and tree
    pub use crate::parser::{CommandType, ConfigCommand, Parser};
    pub use crate::tree::ConfigNode;

    // Diffing
    pub use crate::diff::{calculate_diff, ConfigDiff};

    // Validation
    pub use crate::validate::{ValidationError, ValidationRule, Validator, ValueType};

    // Execution
    pub use crate::executor::{
        CommandResult, CommandSet, CommandStatus, Executor, LocalExecutor, RetryPolicy,
        ScriptedExecutor,
    };

    // Snapshots and versions
    pub use crate::snapshot::{
        ConfigSnapshot, ConfigVersion, FsStore, MemoryStore, ObjectStore, RestoreReport,
        SnapshotFormat, SnapshotManager, SnapshotStatus, VersionManager, VersionStatus,
    };
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for configd operations.
///
/// Provides the main [`Error`](error::Error) enum covering apply failures,
/// storage problems, connectivity loss, and serialization errors, each with
/// a machine-readable kind.
pub mod error;

/// Engine configuration: storage location, retention, timeouts, retry
/// policy, and the device command dialect.
pub mod config;

// ============================================================================
// Configuration Model
// ============================================================================

/// Command-grammar parser for `set`/`delete`/`comment`/`rename`/`edit`
/// statements, with quote-aware tokenization and a lenient skip-on-noise
/// contract.
pub mod parser;

/// The hierarchical configuration tree: tombstoned deletes, per-node
/// comments, flatten/export, and command application.
pub mod tree;

/// Pure diff engine comparing two trees at the flattened-path level.
pub mod diff;

/// Declarative validation rules matched against flattened tree paths.
pub mod validate;

// ============================================================================
// Infrastructure
// ============================================================================

/// Command execution layer: the abstract [`Executor`](executor::Executor)
/// capability, a local implementation, a scripted test double, and retry
/// policies with backoff.
pub mod executor;

/// Snapshot and version management over durable storage: capture, compare,
/// transactional restore, retention pruning, and version lineage.
pub mod snapshot;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of configd.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
