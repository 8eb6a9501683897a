//! Snapshot and version management.
//!
//! This module orchestrates the parser, tree, and diff engine into a durable
//! history of configuration state:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  SnapshotManager / VersionManager                    │
//! │        (capture, list, compare, restore, prune, lineage)             │
//! └─────────────────────────────────────────────────────────────────────┘
//!                │                    │                     │
//!                ▼                    ▼                     ▼
//!     ┌──────────────────┐ ┌───────────────────┐ ┌───────────────────┐
//!     │     Executor      │ │      Parser       │ │    ObjectStore    │
//!     │ (live config I/O) │ │ (text → tree)     │ │ (content + meta)  │
//!     └──────────────────┘ └───────────────────┘ └───────────────────┘
//! ```
//!
//! A snapshot is an immutable, content-hashed capture of the full
//! configuration at a point in time. Content (the configuration text) and
//! metadata (everything else) are persisted separately — metadata is queried
//! far more often. Restores replay the stored text through the executor line
//! by line inside a single logical transaction: the first rejected line
//! aborts the whole batch, pending changes are discarded, and the previous
//! committed state stays intact.
//!
//! Concurrency discipline: ids are generated, so concurrent creates never
//! collide; restores are serialized through a mutex and hold a shared lock
//! that prune/delete acquire exclusively, so a snapshot is never pruned out
//! from under an in-flight restore.

/// Durable storage backends.
pub mod store;

/// Numbered version history with lineage and tags.
pub mod version;

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::diff::{calculate_diff, ConfigDiff};
use crate::error::{Error, Result};
use crate::executor::{CommandResult, CommandSet, Executor, RetryPolicy};
use crate::parser::Parser;
use crate::tree::ConfigNode;

pub use store::{FsStore, MemoryStore, ObjectStore, StoreError};
pub use version::{ConfigVersion, VersionManager, VersionStatus};

const CONTENT_BUCKET: &str = "snapshots";
const META_BUCKET: &str = "snapshot-meta";

// ============================================================================
// Records
// ============================================================================

/// Export format for stored configuration text.
///
/// Every non-native format is a lossless wrapping of the line-oriented
/// content; restore unwraps it back to native lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// The device's own one-statement-per-line format.
    Native,
    /// JSON wrapping: `{"configuration": [lines]}`.
    Json,
    /// YAML wrapping: a `configuration` sequence.
    Yaml,
    /// XML wrapping: one `<command>` element per line.
    Xml,
}

impl SnapshotFormat {
    /// File extension used for stored content.
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Native => "cfg",
            SnapshotFormat::Json => "json",
            SnapshotFormat::Yaml => "yaml",
            SnapshotFormat::Xml => "xml",
        }
    }
}

impl std::fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotFormat::Native => write!(f, "native"),
            SnapshotFormat::Json => write!(f, "json"),
            SnapshotFormat::Yaml => write!(f, "yaml"),
            SnapshotFormat::Xml => write!(f, "xml"),
        }
    }
}

impl FromStr for SnapshotFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(SnapshotFormat::Native),
            "json" => Ok(SnapshotFormat::Json),
            "yaml" => Ok(SnapshotFormat::Yaml),
            "xml" => Ok(SnapshotFormat::Xml),
            other => Err(Error::Config(format!("unknown snapshot format '{other}'"))),
        }
    }
}

/// Lifecycle of a snapshot: `pending → in_progress → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Created but capture not started.
    Pending,
    /// Capture in flight.
    InProgress,
    /// Captured and persisted.
    Completed,
    /// Capture or persistence failed; the record carries no usable content.
    Failed,
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotStatus::Pending => write!(f, "pending"),
            SnapshotStatus::InProgress => write!(f, "in_progress"),
            SnapshotStatus::Completed => write!(f, "completed"),
            SnapshotStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An immutable, content-hashed capture of full configuration state.
///
/// Never mutated after creation — "changing" a snapshot always means
/// creating a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Opaque generated id.
    pub id: String,
    /// Human-chosen name.
    pub name: String,
    /// Human description.
    pub description: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Stored content format.
    pub format: SnapshotFormat,
    /// Stored content size in bytes.
    pub size: u64,
    /// SHA-256 hex digest of the stored content.
    pub checksum: String,
    /// Digest of the canonicalized tree export.
    pub config_hash: String,
    /// Lifecycle status; callers must check this after creation.
    pub status: SnapshotStatus,
    /// Free-form device metadata (software version and the like).
    #[serde(default)]
    pub version_info: HashMap<String, String>,
    /// Nested-dictionary export of the tree at capture time.
    #[serde(default)]
    pub config_data: Value,
}

/// Outcome of a restore (or import) operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Id of the snapshot or version that was restored.
    pub target_id: String,
    /// True if nothing was applied.
    pub dry_run: bool,
    /// Id of the automatic safety capture taken before applying.
    pub safety_id: Option<String>,
    /// Number of configuration lines applied.
    pub applied_lines: usize,
}

/// A single line-level difference between two stored configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDiff {
    /// The configuration line.
    pub line: String,
    /// Whether the line appeared or disappeared.
    pub change: LineChange,
}

/// Direction of a line-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineChange {
    /// Present only in the newer configuration.
    Added,
    /// Present only in the older configuration.
    Removed,
}

// ============================================================================
// Shared executor plumbing
// ============================================================================

/// Runs one command through the retry policy. Transport errors are retried;
/// exhausting the policy surfaces as [`Error::Unavailable`]. A completed
/// command with a non-zero exit is returned as-is for the caller to judge.
pub(crate) async fn run_command(
    executor: &dyn Executor,
    retry: &RetryPolicy,
    command: &str,
    timeout: Duration,
) -> Result<CommandResult> {
    retry
        .execute(|| executor.execute(command, timeout))
        .await
        .map_err(|e| Error::Unavailable {
            attempts: e.attempts,
            message: e.last_error.to_string(),
        })
}

/// Fetches the live configuration text from the device.
pub(crate) async fn fetch_live_config(
    executor: &dyn Executor,
    commands: &CommandSet,
    retry: &RetryPolicy,
    timeout: Duration,
) -> Result<String> {
    let result = run_command(executor, retry, &commands.show_config, timeout).await?;
    if !result.is_success() {
        return Err(Error::apply(&commands.show_config, result.error_message()));
    }
    Ok(result.stdout)
}

/// Replays configuration lines through the executor as one logical
/// transaction: enter configuration mode, apply each line, commit, save.
/// The first rejected line discards the pending changes and aborts.
pub(crate) async fn apply_transaction(
    executor: &dyn Executor,
    commands: &CommandSet,
    retry: &RetryPolicy,
    timeout: Duration,
    text: &str,
) -> Result<usize> {
    let enter = run_command(executor, retry, &commands.enter_config, timeout).await?;
    if !enter.is_success() {
        return Err(Error::apply(&commands.enter_config, enter.error_message()));
    }

    let mut applied = 0;
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let result = match run_command(executor, retry, line, timeout).await {
            Ok(result) => result,
            Err(e) => {
                rollback_session(executor, commands, retry, timeout).await;
                return Err(e);
            }
        };

        if !result.is_success() {
            rollback_session(executor, commands, retry, timeout).await;
            return Err(Error::TransactionAborted {
                line: line.to_string(),
                message: result.error_message(),
            });
        }
        applied += 1;
    }

    let commit = run_command(executor, retry, &commands.commit, timeout).await?;
    if !commit.is_success() {
        rollback_session(executor, commands, retry, timeout).await;
        return Err(Error::apply(&commands.commit, commit.error_message()));
    }

    if let Err(e) = run_command(executor, retry, &commands.exit_config, timeout).await {
        warn!(error = %e, "failed to leave configuration mode after commit");
    }
    if let Err(e) = run_command(executor, retry, &commands.save, timeout).await {
        warn!(error = %e, "failed to save committed configuration");
    }

    Ok(applied)
}

/// Best-effort discard of a failed configuration session.
async fn rollback_session(
    executor: &dyn Executor,
    commands: &CommandSet,
    retry: &RetryPolicy,
    timeout: Duration,
) {
    if let Err(e) = run_command(executor, retry, &commands.discard, timeout).await {
        warn!(error = %e, "failed to discard pending configuration changes");
    }
    if let Err(e) = run_command(executor, retry, &commands.exit_config, timeout).await {
        warn!(error = %e, "failed to leave configuration mode");
    }
}

/// Parses `key: value` lines into a metadata map with normalized keys.
pub(crate) fn parse_version_info(output: &str) -> HashMap<String, String> {
    let mut info = HashMap::new();
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_ascii_lowercase().replace(' ', "_");
            if !key.is_empty() {
                info.insert(key, value.trim().to_string());
            }
        }
    }
    info
}

// ============================================================================
// Hashing and format conversion
// ============================================================================

/// Full SHA-256 hex digest of arbitrary bytes.
pub(crate) fn digest(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Digest of the canonicalized (sorted-key JSON) tree export, truncated to
/// 16 hex characters — enough to content-address configuration states.
pub(crate) fn tree_hash(config_data: &Value) -> String {
    let canonical = config_data.to_string();
    let mut hash = digest(canonical.as_bytes());
    hash.truncate(16);
    hash
}

fn config_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

#[derive(Debug, Serialize, Deserialize)]
struct WrappedConfig {
    configuration: Vec<String>,
}

/// Converts native configuration text into the requested export format.
pub fn convert_config(text: &str, format: SnapshotFormat) -> Result<String> {
    match format {
        SnapshotFormat::Native => Ok(text.to_string()),
        SnapshotFormat::Json => {
            let wrapped = WrappedConfig {
                configuration: config_lines(text).map(String::from).collect(),
            };
            Ok(serde_json::to_string_pretty(&wrapped)?)
        }
        SnapshotFormat::Yaml => {
            let wrapped = WrappedConfig {
                configuration: config_lines(text).map(String::from).collect(),
            };
            Ok(serde_yaml::to_string(&wrapped)?)
        }
        SnapshotFormat::Xml => {
            let mut out = String::from("<configuration>\n");
            for line in config_lines(text) {
                out.push_str("  <command>");
                out.push_str(&xml_escape(line));
                out.push_str("</command>\n");
            }
            out.push_str("</configuration>\n");
            Ok(out)
        }
    }
}

/// Unwraps stored text back into native one-statement-per-line form.
pub fn extract_native(text: &str, format: SnapshotFormat) -> Result<String> {
    match format {
        SnapshotFormat::Native => Ok(text.to_string()),
        SnapshotFormat::Json => {
            let wrapped: WrappedConfig = serde_json::from_str(text)?;
            Ok(wrapped.configuration.join("\n"))
        }
        SnapshotFormat::Yaml => {
            let wrapped: WrappedConfig = serde_yaml::from_str(text)?;
            Ok(wrapped.configuration.join("\n"))
        }
        SnapshotFormat::Xml => {
            let mut lines = Vec::new();
            for line in text.lines() {
                let line = line.trim();
                if let Some(inner) = line
                    .strip_prefix("<command>")
                    .and_then(|rest| rest.strip_suffix("</command>"))
                {
                    lines.push(xml_unescape(inner));
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn content_key(id: &str, format: SnapshotFormat) -> String {
    format!("{id}.{}", format.extension())
}

fn meta_key(id: &str) -> String {
    format!("{id}.json")
}

// ============================================================================
// Snapshot manager
// ============================================================================

/// Manager for configuration snapshots: capture, retrieval, comparison,
/// transactional restore, and retention pruning.
///
/// Explicitly constructed and owned by the caller's composition root; there
/// is no process-wide instance.
pub struct SnapshotManager {
    executor: Arc<dyn Executor>,
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
    index: parking_lot::RwLock<Vec<ConfigSnapshot>>,
    restore_lock: tokio::sync::Mutex<()>,
    maintenance: tokio::sync::RwLock<()>,
}

impl SnapshotManager {
    /// Creates a manager, loading the metadata index from storage.
    ///
    /// A corrupt or unreadable index degrades to an empty one — it must
    /// never prevent new snapshots from being created.
    pub fn new(
        executor: Arc<dyn Executor>,
        store: Arc<dyn ObjectStore>,
        config: EngineConfig,
    ) -> Self {
        let index = load_index(store.as_ref());
        Self {
            executor,
            store,
            config,
            index: parking_lot::RwLock::new(index),
            restore_lock: tokio::sync::Mutex::new(()),
            maintenance: tokio::sync::RwLock::new(()),
        }
    }

    /// Captures a snapshot of the live configuration.
    ///
    /// Failure at any step yields a `Failed`-status snapshot rather than an
    /// error — callers must check [`ConfigSnapshot::status`].
    pub async fn create_snapshot(
        &self,
        name: &str,
        description: &str,
        format: SnapshotFormat,
    ) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            timestamp: Utc::now(),
            format,
            size: 0,
            checksum: String::new(),
            config_hash: String::new(),
            status: SnapshotStatus::Pending,
            version_info: HashMap::new(),
            config_data: Value::Object(serde_json::Map::new()),
        };

        snapshot.status = SnapshotStatus::InProgress;
        match self.capture(&mut snapshot).await {
            Ok(()) => {
                info!(snapshot_id = %snapshot.id, name, "created snapshot");
                self.index.write().push(snapshot.clone());
                if let Err(e) = self.prune_old_snapshots().await {
                    warn!(error = %e, "snapshot pruning failed");
                }
            }
            Err(e) => {
                error!(snapshot_id = %snapshot.id, error = %e, "snapshot creation failed");
                snapshot.status = SnapshotStatus::Failed;
            }
        }
        snapshot
    }

    async fn capture(&self, snapshot: &mut ConfigSnapshot) -> Result<()> {
        let text = fetch_live_config(
            self.executor.as_ref(),
            &self.config.commands,
            &self.config.retry,
            self.config.command_timeout,
        )
        .await?;

        snapshot.version_info = self.fetch_version_info().await;

        let tree = Parser::new().parse_config(&text);
        snapshot.config_data = tree.to_dict();
        snapshot.config_hash = tree_hash(&snapshot.config_data);

        let formatted = convert_config(&text, snapshot.format)?;
        snapshot.checksum = digest(formatted.as_bytes());
        snapshot.size = formatted.len() as u64;
        snapshot.status = SnapshotStatus::Completed;

        self.store
            .put(
                CONTENT_BUCKET,
                &content_key(&snapshot.id, snapshot.format),
                formatted.as_bytes(),
            )
            .map_err(|e| Error::storage(e.to_string()))?;
        let meta = serde_json::to_vec_pretty(&snapshot)?;
        self.store
            .put(META_BUCKET, &meta_key(&snapshot.id), &meta)
            .map_err(|e| Error::storage(e.to_string()))?;

        Ok(())
    }

    async fn fetch_version_info(&self) -> HashMap<String, String> {
        let result = run_command(
            self.executor.as_ref(),
            &self.config.retry,
            &self.config.commands.show_version,
            self.config.command_timeout,
        )
        .await;

        match result {
            Ok(result) if result.is_success() => parse_version_info(&result.stdout),
            Ok(result) => {
                warn!(status = %result.status, "version query failed");
                HashMap::new()
            }
            Err(e) => {
                warn!(error = %e, "could not fetch device version info");
                HashMap::new()
            }
        }
    }

    /// Lists snapshot metadata, newest first. Content is never loaded.
    pub fn list_snapshots(&self, limit: Option<usize>) -> Vec<ConfigSnapshot> {
        let mut snapshots = self.index.read().clone();
        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            snapshots.truncate(limit);
        }
        snapshots
    }

    /// Looks up a snapshot by id.
    pub fn get_snapshot(&self, id: &str) -> Option<ConfigSnapshot> {
        self.index.read().iter().find(|s| s.id == id).cloned()
    }

    /// Deletes a snapshot's content and metadata together.
    ///
    /// Returns `Ok(false)` when the id is absent — a missing snapshot is a
    /// signal, not an error.
    pub async fn delete_snapshot(&self, id: &str) -> Result<bool> {
        let _guard = self.maintenance.write().await;

        let Some(snapshot) = self.get_snapshot(id) else {
            return Ok(false);
        };
        self.remove_stored(&snapshot)?;
        self.index.write().retain(|s| s.id != id);
        info!(snapshot_id = %id, "deleted snapshot");
        Ok(true)
    }

    /// Restores the device configuration from a snapshot.
    ///
    /// With `dry_run` only existence and readability are checked. A real
    /// restore first takes an automatic safety snapshot, then replays the
    /// stored lines transactionally; the first failing line aborts the whole
    /// restore with the prior committed state intact. At most one restore is
    /// in flight per manager.
    pub async fn restore_from_snapshot(&self, id: &str, dry_run: bool) -> Result<RestoreReport> {
        let snapshot = self
            .get_snapshot(id)
            .ok_or_else(|| Error::snapshot_not_found(id))?;

        let stored = self
            .store
            .get(CONTENT_BUCKET, &content_key(&snapshot.id, snapshot.format))
            .map_err(|e| Error::storage(format!("snapshot content unreadable: {e}")))?;
        let text = extract_native(&String::from_utf8_lossy(&stored), snapshot.format)?;

        if dry_run {
            debug!(snapshot_id = %id, "restore dry run passed");
            return Ok(RestoreReport {
                target_id: id.to_string(),
                dry_run: true,
                safety_id: None,
                applied_lines: 0,
            });
        }

        let _restore = self.restore_lock.lock().await;

        let safety = self
            .create_snapshot(
                &format!("pre-restore-{id}"),
                &format!("Automatic safety snapshot before restoring {id}"),
                SnapshotFormat::Native,
            )
            .await;
        if safety.status != SnapshotStatus::Completed {
            return Err(Error::storage(
                "safety snapshot failed, aborting restore".to_string(),
            ));
        }

        let _guard = self.maintenance.read().await;
        let applied = apply_transaction(
            self.executor.as_ref(),
            &self.config.commands,
            &self.config.retry,
            self.config.command_timeout,
            &text,
        )
        .await?;

        info!(snapshot_id = %id, applied, "restored configuration from snapshot");
        Ok(RestoreReport {
            target_id: id.to_string(),
            dry_run: false,
            safety_id: Some(safety.id),
            applied_lines: applied,
        })
    }

    /// Compares two stored configurations as line sets.
    ///
    /// A cheaper, coarser comparison than [`SnapshotManager::compare_trees`]:
    /// it reports which lines appeared and disappeared, with no structural
    /// awareness. Output is sorted for stability.
    pub fn compare_configs(&self, old_id: &str, new_id: &str) -> Result<Vec<LineDiff>> {
        let old_text = self.load_native_text(old_id)?;
        let new_text = self.load_native_text(new_id)?;

        let old_lines: HashSet<&str> = config_lines(&old_text).collect();
        let new_lines: HashSet<&str> = config_lines(&new_text).collect();

        let mut added: Vec<&str> = new_lines.difference(&old_lines).copied().collect();
        let mut removed: Vec<&str> = old_lines.difference(&new_lines).copied().collect();
        added.sort_unstable();
        removed.sort_unstable();

        let mut diffs = Vec::with_capacity(added.len() + removed.len());
        for line in added {
            diffs.push(LineDiff {
                line: line.to_string(),
                change: LineChange::Added,
            });
        }
        for line in removed {
            diffs.push(LineDiff {
                line: line.to_string(),
                change: LineChange::Removed,
            });
        }
        Ok(diffs)
    }

    /// Structural comparison of two snapshots through the tree diff engine.
    pub fn compare_trees(&self, old_id: &str, new_id: &str) -> Result<ConfigDiff> {
        let old = self
            .get_snapshot(old_id)
            .ok_or_else(|| Error::snapshot_not_found(old_id))?;
        let new = self
            .get_snapshot(new_id)
            .ok_or_else(|| Error::snapshot_not_found(new_id))?;

        let old_tree = ConfigNode::from_dict(&old.config_data);
        let new_tree = ConfigNode::from_dict(&new.config_data);
        Ok(calculate_diff(&old_tree, &new_tree))
    }

    /// Rebuilds the configuration tree captured by a snapshot.
    pub fn restore_tree(&self, id: &str) -> Result<ConfigNode> {
        let snapshot = self
            .get_snapshot(id)
            .ok_or_else(|| Error::snapshot_not_found(id))?;
        Ok(ConfigNode::from_dict(&snapshot.config_data))
    }

    /// Exports the live configuration in the requested format.
    pub async fn export_config(&self, format: SnapshotFormat) -> Result<String> {
        let text = fetch_live_config(
            self.executor.as_ref(),
            &self.config.commands,
            &self.config.retry,
            self.config.command_timeout,
        )
        .await?;
        convert_config(&text, format)
    }

    /// Imports configuration text, applying it transactionally after an
    /// automatic safety snapshot. With `dry_run` the text is only parsed.
    pub async fn import_config(&self, text: &str, dry_run: bool) -> Result<RestoreReport> {
        let parser = Parser::new();
        let parsed = text
            .lines()
            .filter(|line| parser.parse_line(line).is_some())
            .count();

        if dry_run {
            return Ok(RestoreReport {
                target_id: format!("import ({parsed} statements)"),
                dry_run: true,
                safety_id: None,
                applied_lines: 0,
            });
        }

        let _restore = self.restore_lock.lock().await;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let safety = self
            .create_snapshot(
                &format!("pre-import-{stamp}"),
                "Automatic safety snapshot before configuration import",
                SnapshotFormat::Native,
            )
            .await;
        if safety.status != SnapshotStatus::Completed {
            return Err(Error::storage(
                "safety snapshot failed, aborting import".to_string(),
            ));
        }

        let _guard = self.maintenance.read().await;
        let applied = apply_transaction(
            self.executor.as_ref(),
            &self.config.commands,
            &self.config.retry,
            self.config.command_timeout,
            text,
        )
        .await?;

        info!(applied, "imported configuration");
        Ok(RestoreReport {
            target_id: format!("import ({parsed} statements)"),
            dry_run: false,
            safety_id: Some(safety.id),
            applied_lines: applied,
        })
    }

    /// Prunes storage down to the configured retention limit, keeping the
    /// most recent snapshots by timestamp. Content and metadata are removed
    /// together per item. Returns the number of snapshots removed.
    pub async fn prune_old_snapshots(&self) -> Result<usize> {
        let _guard = self.maintenance.write().await;

        let excess: Vec<ConfigSnapshot> = {
            let index = self.index.read();
            if index.len() <= self.config.max_snapshots {
                return Ok(0);
            }
            let mut sorted = index.clone();
            sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            sorted.split_off(self.config.max_snapshots)
        };

        let mut removed = 0;
        for snapshot in &excess {
            match self.remove_stored(snapshot) {
                Ok(()) => {
                    self.index.write().retain(|s| s.id != snapshot.id);
                    debug!(snapshot_id = %snapshot.id, "pruned snapshot");
                    removed += 1;
                }
                Err(e) => {
                    warn!(snapshot_id = %snapshot.id, error = %e, "failed to prune snapshot");
                }
            }
        }
        Ok(removed)
    }

    /// Removes content first, then metadata; a content failure leaves the
    /// item fully intact so the pair never splits.
    fn remove_stored(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        self.store
            .delete(CONTENT_BUCKET, &content_key(&snapshot.id, snapshot.format))
            .map_err(|e| Error::storage(e.to_string()))?;
        self.store
            .delete(META_BUCKET, &meta_key(&snapshot.id))
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(())
    }

    fn load_native_text(&self, id: &str) -> Result<String> {
        let snapshot = self
            .get_snapshot(id)
            .ok_or_else(|| Error::snapshot_not_found(id))?;
        let stored = self
            .store
            .get(CONTENT_BUCKET, &content_key(&snapshot.id, snapshot.format))
            .map_err(|e| Error::storage(e.to_string()))?;
        extract_native(&String::from_utf8_lossy(&stored), snapshot.format)
    }
}

fn load_index(store: &dyn ObjectStore) -> Vec<ConfigSnapshot> {
    let keys = match store.list(META_BUCKET) {
        Ok(keys) => keys,
        Err(e) => {
            warn!(error = %e, "could not list snapshot index, starting empty");
            return Vec::new();
        }
    };

    let mut snapshots = Vec::new();
    for key in keys {
        let bytes = match store.get(META_BUCKET, &key) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "skipping unreadable snapshot metadata");
                continue;
            }
        };
        match serde_json::from_slice::<ConfigSnapshot>(&bytes) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => {
                warn!(key = %key, error = %e, "skipping corrupt snapshot metadata");
            }
        }
    }
    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trip() {
        let text = "set system host-name router1\nset service ssh port 22";
        for format in [
            SnapshotFormat::Native,
            SnapshotFormat::Json,
            SnapshotFormat::Yaml,
            SnapshotFormat::Xml,
        ] {
            let converted = convert_config(text, format).unwrap();
            let restored = extract_native(&converted, format).unwrap();
            assert_eq!(restored, text, "round trip through {format}");
        }
    }

    #[test]
    fn test_xml_escaping() {
        let text = "set system login banner '<warn & stay out>'";
        let xml = convert_config(text, SnapshotFormat::Xml).unwrap();
        assert!(xml.contains("&lt;warn &amp; stay out&gt;"));
        assert_eq!(extract_native(&xml, SnapshotFormat::Xml).unwrap(), text);
    }

    #[test]
    fn test_tree_hash_is_stable_and_content_addressed() {
        let a = serde_json::json!({"system": {"host-name": "r1"}});
        let b = serde_json::json!({"system": {"host-name": "r1"}});
        let c = serde_json::json!({"system": {"host-name": "r2"}});
        assert_eq!(tree_hash(&a), tree_hash(&b));
        assert_ne!(tree_hash(&a), tree_hash(&c));
        assert_eq!(tree_hash(&a).len(), 16);
    }

    #[test]
    fn test_parse_version_info() {
        let output = "Version: 1.4.2\nBuild Date: 2026-01-10\nUptime: 4 days";
        let info = parse_version_info(output);
        assert_eq!(info.get("version").map(String::as_str), Some("1.4.2"));
        assert_eq!(info.get("build_date").map(String::as_str), Some("2026-01-10"));
    }

    #[test]
    fn test_snapshot_format_from_str() {
        assert_eq!("native".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Native);
        assert_eq!("YAML".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Yaml);
        assert!("tar".parse::<SnapshotFormat>().is_err());
    }
}
