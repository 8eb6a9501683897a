//! Diff engine for configuration trees.
//!
//! Compares two trees at the flattened-path level: both trees are reduced to
//! dotted-path → value maps and every path in the union is classified as
//! added, removed, or modified. Paths present with equal values in both
//! trees are omitted.
//!
//! [`calculate_diff`] is a pure, total function — it never fails for any two
//! valid trees, and diffing a tree against itself always yields an empty
//! diff.

use std::collections::BTreeMap;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::{scalar_to_string, ConfigNode};

/// The result of comparing two configuration trees.
///
/// Two diffs are equal iff all three maps are equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDiff {
    /// Paths absent in the old tree, present in the new one.
    pub added: BTreeMap<String, Value>,
    /// Paths present in the old tree, absent in the new one.
    pub removed: BTreeMap<String, Value>,
    /// Paths present in both with unequal values: path → (old, new).
    pub modified: BTreeMap<String, (Value, Value)>,
}

impl ConfigDiff {
    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of changed paths.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Renders the diff as colored `+`/`-`/`~` lines for terminal output.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for (path, value) in &self.removed {
            lines.push(
                format!("- {} = {}", path, scalar_to_string(value))
                    .red()
                    .to_string(),
            );
        }
        for (path, value) in &self.added {
            lines.push(
                format!("+ {} = {}", path, scalar_to_string(value))
                    .green()
                    .to_string(),
            );
        }
        for (path, (old, new)) in &self.modified {
            lines.push(
                format!(
                    "~ {} = {} -> {}",
                    path,
                    scalar_to_string(old),
                    scalar_to_string(new)
                )
                .yellow()
                .to_string(),
            );
        }
        lines.join("\n")
    }
}

impl std::fmt::Display for ConfigDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "ConfigDiff(empty)");
        }
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("Added: {} items", self.added.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("Removed: {} items", self.removed.len()));
        }
        if !self.modified.is_empty() {
            parts.push(format!("Modified: {} items", self.modified.len()));
        }
        write!(f, "ConfigDiff({})", parts.join(", "))
    }
}

/// Compares two configuration trees at the flattened-path level.
pub fn calculate_diff(old: &ConfigNode, new: &ConfigNode) -> ConfigDiff {
    let old_flat = old.flatten();
    let new_flat = new.flatten();

    let mut diff = ConfigDiff::default();

    let all_paths = old_flat.keys().chain(new_flat.keys());
    for path in all_paths {
        if diff.added.contains_key(path)
            || diff.removed.contains_key(path)
            || diff.modified.contains_key(path)
        {
            continue;
        }
        match (old_flat.get(path), new_flat.get(path)) {
            (None, Some(new_value)) => {
                diff.added.insert(path.clone(), new_value.clone());
            }
            (Some(old_value), None) => {
                diff.removed.insert(path.clone(), old_value.clone());
            }
            (Some(old_value), Some(new_value)) if old_value != new_value => {
                diff.modified
                    .insert(path.clone(), (old_value.clone(), new_value.clone()));
            }
            _ => {}
        }
    }

    diff
}
