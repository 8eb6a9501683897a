//! Numbered configuration version history.
//!
//! Versions are snapshots with lineage: each carries a monotonically
//! increasing number, a back-reference to its parent, free-form tags, and a
//! lifecycle status. The number is assigned by scanning existing versions
//! and taking max + 1 — a read-then-increment that is serialized through a
//! creation mutex so concurrent creates can never mint duplicate numbers.
//!
//! Lifecycle: `active → archived → rolled_back`. Creating a version makes it
//! the Active head and archives the previous one. Restoring an older version
//! marks the version that was Active at restore time as RolledBack — the
//! only permitted status regression.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    apply_transaction, digest, fetch_live_config, tree_hash, ObjectStore, RestoreReport,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::parser::Parser;

const CONTENT_BUCKET: &str = "versions";
const META_BUCKET: &str = "version-meta";

/// Lifecycle status of a configuration version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// The current head of the history.
    Active,
    /// Superseded by a newer version.
    Archived,
    /// Was active, then restored away from.
    RolledBack,
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionStatus::Active => write!(f, "active"),
            VersionStatus::Archived => write!(f, "archived"),
            VersionStatus::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// A named, numbered entry in the configuration history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigVersion {
    /// Opaque generated id.
    pub id: String,
    /// Monotonically increasing version number, unique per store.
    pub version: u32,
    /// Human-chosen name.
    pub name: String,
    /// Human description.
    pub description: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Creator, when known.
    pub created_by: Option<String>,
    /// Lifecycle status.
    pub status: VersionStatus,
    /// Stored content size in bytes.
    pub size: u64,
    /// SHA-256 hex digest of the stored content.
    pub checksum: String,
    /// Digest of the canonicalized tree export.
    pub config_hash: String,
    /// Id of the immediately preceding version, if any.
    pub parent_version: Option<String>,
    /// Free-form labels for retrieval.
    #[serde(default)]
    pub tags: Vec<String>,
}

fn content_key(version: u32, id: &str) -> String {
    format!("v{version:04}_{id}.cfg")
}

fn meta_key(id: &str) -> String {
    format!("{id}.json")
}

/// Manager for the numbered version history.
pub struct VersionManager {
    executor: Arc<dyn Executor>,
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
    index: parking_lot::RwLock<Vec<ConfigVersion>>,
    create_lock: tokio::sync::Mutex<()>,
    restore_lock: tokio::sync::Mutex<()>,
    maintenance: tokio::sync::RwLock<()>,
}

impl VersionManager {
    /// Creates a manager, loading the metadata index from storage. Corrupt
    /// entries are skipped; an unreadable index degrades to empty.
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
            create_lock: tokio::sync::Mutex::new(()),
            restore_lock: tokio::sync::Mutex::new(()),
            maintenance: tokio::sync::RwLock::new(()),
        }
    }

    /// Captures the live configuration as a new version.
    ///
    /// The new version becomes the Active head; the previous Active version
    /// is archived and recorded as the parent.
    pub async fn create_version(
        &self,
        name: &str,
        description: &str,
        created_by: Option<&str>,
        tags: Vec<String>,
    ) -> Result<ConfigVersion> {
        // Serializes the read-then-increment so concurrent creates cannot
        // mint duplicate version numbers.
        let _lock = self.create_lock.lock().await;

        let text = fetch_live_config(
            self.executor.as_ref(),
            &self.config.commands,
            &self.config.retry,
            self.config.command_timeout,
        )
        .await?;

        let (number, parent) = {
            let index = self.index.read();
            let number = index.iter().map(|v| v.version).max().unwrap_or(0) + 1;
            let parent = index
                .iter()
                .max_by_key(|v| v.version)
                .map(|v| v.id.clone());
            (number, parent)
        };

        let tree = Parser::new().parse_config(&text);
        let version = ConfigVersion {
            id: Uuid::new_v4().to_string(),
            version: number,
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            created_by: created_by.map(String::from),
            status: VersionStatus::Active,
            size: text.len() as u64,
            checksum: digest(text.as_bytes()),
            config_hash: tree_hash(&tree.to_dict()),
            parent_version: parent,
            tags,
        };

        self.store
            .put(
                CONTENT_BUCKET,
                &content_key(version.version, &version.id),
                text.as_bytes(),
            )
            .map_err(|e| Error::storage(e.to_string()))?;
        self.persist_meta(&version)?;

        // Archive the previous head.
        let previous_active: Vec<ConfigVersion> = self
            .index
            .read()
            .iter()
            .filter(|v| v.status == VersionStatus::Active)
            .cloned()
            .collect();
        for mut previous in previous_active {
            previous.status = VersionStatus::Archived;
            self.update_version(previous)?;
        }

        self.index.write().push(version.clone());
        info!(version = version.version, name, "created configuration version");

        if let Err(e) = self.prune_old_versions().await {
            warn!(error = %e, "version pruning failed");
        }

        Ok(version)
    }

    /// Lists versions, highest number first.
    pub fn list_versions(&self) -> Vec<ConfigVersion> {
        let mut versions = self.index.read().clone();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        versions
    }

    /// Looks up a version by id.
    pub fn get_version(&self, id: &str) -> Option<ConfigVersion> {
        self.index.read().iter().find(|v| v.id == id).cloned()
    }

    /// Returns the versions carrying a tag, highest number first.
    pub fn find_by_tag(&self, tag: &str) -> Vec<ConfigVersion> {
        let mut versions: Vec<ConfigVersion> = self
            .index
            .read()
            .iter()
            .filter(|v| v.tags.iter().any(|t| t == tag))
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        versions
    }

    /// Restores the device configuration from a stored version.
    ///
    /// Takes an automatic safety version first, replays the stored lines
    /// transactionally, and on success marks the version that was Active at
    /// restore time as RolledBack.
    pub async fn restore_version(&self, id: &str, dry_run: bool) -> Result<RestoreReport> {
        let version = self
            .get_version(id)
            .ok_or_else(|| Error::version_not_found(id))?;

        let stored = self
            .store
            .get(CONTENT_BUCKET, &content_key(version.version, &version.id))
            .map_err(|e| Error::storage(format!("version content unreadable: {e}")))?;
        let text = String::from_utf8_lossy(&stored).to_string();

        if dry_run {
            return Ok(RestoreReport {
                target_id: id.to_string(),
                dry_run: true,
                safety_id: None,
                applied_lines: 0,
            });
        }

        let _restore = self.restore_lock.lock().await;

        let active_before = self
            .index
            .read()
            .iter()
            .find(|v| v.status == VersionStatus::Active)
            .cloned();

        let safety = self
            .create_version(
                &format!("pre-restore-v{}", version.version),
                &format!("Automatic capture before restoring version v{}", version.version),
                None,
                Vec::new(),
            )
            .await?;

        let _guard = self.maintenance.read().await;
        let applied = apply_transaction(
            self.executor.as_ref(),
            &self.config.commands,
            &self.config.retry,
            self.config.command_timeout,
            &text,
        )
        .await?;

        if let Some(mut previous) = active_before {
            if previous.id != version.id {
                previous.status = VersionStatus::RolledBack;
                if let Err(e) = self.update_version(previous) {
                    warn!(error = %e, "failed to record rolled_back status");
                }
            }
        }

        info!(version = version.version, applied, "restored configuration version");
        Ok(RestoreReport {
            target_id: id.to_string(),
            dry_run: false,
            safety_id: Some(safety.id),
            applied_lines: applied,
        })
    }

    /// Deletes a version's content and metadata together. Returns
    /// `Ok(false)` when the id is absent.
    pub async fn delete_version(&self, id: &str) -> Result<bool> {
        let _guard = self.maintenance.write().await;

        let Some(version) = self.get_version(id) else {
            return Ok(false);
        };
        self.remove_stored(&version)?;
        self.index.write().retain(|v| v.id != id);
        info!(version = version.version, "deleted configuration version");
        Ok(true)
    }

    /// Prunes storage down to the configured retention limit, keeping the
    /// most recent versions by creation time.
    pub async fn prune_old_versions(&self) -> Result<usize> {
        let _guard = self.maintenance.write().await;

        let excess: Vec<ConfigVersion> = {
            let index = self.index.read();
            if index.len() <= self.config.max_versions {
                return Ok(0);
            }
            let mut sorted = index.clone();
            sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            sorted.split_off(self.config.max_versions)
        };

        let mut removed = 0;
        for version in &excess {
            match self.remove_stored(version) {
                Ok(()) => {
                    self.index.write().retain(|v| v.id != version.id);
                    debug!(version = version.version, "pruned version");
                    removed += 1;
                }
                Err(e) => {
                    warn!(version = version.version, error = %e, "failed to prune version");
                }
            }
        }
        Ok(removed)
    }

    fn persist_meta(&self, version: &ConfigVersion) -> Result<()> {
        let meta = serde_json::to_vec_pretty(version)?;
        self.store
            .put(META_BUCKET, &meta_key(&version.id), &meta)
            .map_err(|e| Error::storage(e.to_string()))
    }

    /// Rewrites a version's metadata and its index entry.
    fn update_version(&self, version: ConfigVersion) -> Result<()> {
        self.persist_meta(&version)?;
        let mut index = self.index.write();
        if let Some(entry) = index.iter_mut().find(|v| v.id == version.id) {
            *entry = version;
        }
        Ok(())
    }

    fn remove_stored(&self, version: &ConfigVersion) -> Result<()> {
        self.store
            .delete(CONTENT_BUCKET, &content_key(version.version, &version.id))
            .map_err(|e| Error::storage(e.to_string()))?;
        self.store
            .delete(META_BUCKET, &meta_key(&version.id))
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(())
    }

    /// Checks the invariant that version numbers are unique; used by tests
    /// exercising concurrent creation.
    pub fn has_unique_version_numbers(&self) -> bool {
        let index = self.index.read();
        let mut seen = HashSet::new();
        index.iter().all(|v| seen.insert(v.version))
    }
}

fn load_index(store: &dyn ObjectStore) -> Vec<ConfigVersion> {
    let keys = match store.list(META_BUCKET) {
        Ok(keys) => keys,
        Err(e) => {
            warn!(error = %e, "could not list version index, starting empty");
            return Vec::new();
        }
    };

    let mut versions = Vec::new();
    for key in keys {
        let bytes = match store.get(META_BUCKET, &key) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "skipping unreadable version metadata");
                continue;
            }
        };
        match serde_json::from_slice::<ConfigVersion>(&bytes) {
            Ok(version) => versions.push(version),
            Err(e) => {
                warn!(key = %key, error = %e, "skipping corrupt version metadata");
            }
        }
    }
    versions
}
