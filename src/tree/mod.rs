//! Configuration tree model.
//!
//! A configuration is a tree of named nodes. Interior nodes group related
//! settings; leaves carry scalar values. Deletes are tombstones: the node
//! stays addressable (and visible to [`ConfigNode::flatten`]) but is excluded
//! from [`ConfigNode::to_dict`] exports.
//!
//! Two invariants hold at all times:
//!
//! - A node with a value has no children, and vice versa. [`ConfigNode::set_value`]
//!   evicts children; [`ConfigNode::add_child`] clears the value.
//! - A node's `path` equals its parent's path plus its own name.
//!   [`ConfigNode::rename_child`] rewrites descendant paths to preserve this.

use indexmap::IndexMap;
use serde_json::Value;

use crate::parser::{CommandType, ConfigCommand};

/// An ordered sequence of path segments locating a node in the tree.
pub type ConfigPath = Vec<String>;

/// A node in the configuration tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNode {
    /// Path from the tree root to this node.
    pub path: ConfigPath,
    /// Scalar content; present only on leaves.
    pub value: Option<Value>,
    /// Child nodes, keyed by segment name (insertion order preserved).
    pub children: IndexMap<String, ConfigNode>,
    /// Tombstone flag: logically removed but retained for history.
    pub deleted: bool,
    /// Free-text annotation attached by a `comment` command.
    pub comment: Option<String>,
}

impl ConfigNode {
    /// Creates an empty root node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty node at the given path.
    pub fn with_path(path: ConfigPath) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    /// Returns the node's own segment name (empty for the root).
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    /// Returns true if this node has neither value nor children.
    pub fn is_empty_leaf(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    /// Adds a child node, returning the existing child if already present.
    ///
    /// Adding a child to a valued node clears the value, preserving the
    /// value/children exclusivity invariant.
    pub fn add_child(&mut self, name: impl Into<String>) -> &mut ConfigNode {
        let name = name.into();
        if self.value.is_some() {
            self.value = None;
        }
        let mut child_path = self.path.clone();
        child_path.push(name.clone());
        self.children
            .entry(name)
            .or_insert_with(|| ConfigNode::with_path(child_path))
    }

    /// Looks up a descendant by path; absence at any level yields `None`.
    pub fn get_child<S: AsRef<str>>(&self, path: &[S]) -> Option<&ConfigNode> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.children.get(first.as_ref())?.get_child(rest),
        }
    }

    /// Mutable variant of [`ConfigNode::get_child`].
    pub fn get_child_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut ConfigNode> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.children.get_mut(first.as_ref())?.get_child_mut(rest),
        }
    }

    /// Assigns a scalar value, evicting any existing children.
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = Some(value.into());
        self.children.clear();
    }

    /// Re-keys a direct child, preserving its subtree.
    ///
    /// Descendant `path` fields are rewritten under the new name. Renaming
    /// onto an existing name replaces that sibling. Returns false if `old`
    /// does not exist.
    pub fn rename_child(&mut self, old: &str, new_name: &str) -> bool {
        let Some(mut node) = self.children.shift_remove(old) else {
            return false;
        };
        node.rebase(&self.path, new_name);
        self.children.insert(new_name.to_string(), node);
        true
    }

    fn rebase(&mut self, parent_path: &[String], name: &str) {
        self.path = parent_path.to_vec();
        self.path.push(name.to_string());
        let own_path = self.path.clone();
        for (child_name, child) in self.children.iter_mut() {
            let child_name = child_name.clone();
            child.rebase(&own_path, &child_name);
        }
    }

    /// Flattens the tree into a dotted-path → value map.
    ///
    /// Only leaf values are emitted. Tombstoned nodes are included so the
    /// delete history stays inspectable; use [`ConfigNode::to_dict`] for an
    /// export that honors tombstones.
    pub fn flatten(&self) -> std::collections::BTreeMap<String, Value> {
        let mut result = std::collections::BTreeMap::new();
        self.flatten_into("", &mut result);
        result
    }

    fn flatten_into(&self, prefix: &str, out: &mut std::collections::BTreeMap<String, Value>) {
        for (name, child) in &self.children {
            let full_path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            if let Some(value) = &child.value {
                out.insert(full_path, value.clone());
            } else if !child.children.is_empty() {
                child.flatten_into(&full_path, out);
            }
        }
    }

    /// Exports the tree as a nested JSON object, skipping tombstoned subtrees.
    pub fn to_dict(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, child) in &self.children {
            if child.deleted {
                continue;
            }
            if let Some(value) = &child.value {
                map.insert(name.clone(), value.clone());
            } else if !child.children.is_empty() {
                map.insert(name.clone(), child.to_dict());
            }
        }
        Value::Object(map)
    }

    /// Builds a tree from a nested JSON object.
    ///
    /// Non-object input yields an empty tree. The result never contains
    /// tombstoned nodes.
    pub fn from_dict(data: &Value) -> ConfigNode {
        let mut root = ConfigNode::new();
        if let Value::Object(map) = data {
            populate(&mut root, map);
        }
        root
    }

    /// Applies a parsed command to the tree.
    ///
    /// Intermediate nodes are created as needed for every command type.
    /// `delete` tombstones the final child if present (idempotent, no-op when
    /// absent); `comment` attaches text only to an existing node; `edit` is a
    /// no-op here — its cursor is maintained by the apply loop in the parser.
    pub fn apply(&mut self, command: &ConfigCommand) {
        let Some((last, parents)) = command.path.split_last() else {
            return;
        };

        let mut node = self;
        for part in parents {
            node = node.add_child(part.clone());
        }

        match command.command_type {
            CommandType::Set => {
                let child = node.add_child(last.clone());
                child.deleted = false;
                if let Some(value) = &command.value {
                    child.set_value(Value::String(value.clone()));
                }
            }
            CommandType::Delete => {
                if let Some(child) = node.children.get_mut(last) {
                    child.deleted = true;
                }
            }
            CommandType::Comment => {
                if let Some(child) = node.children.get_mut(last) {
                    child.comment = command.value.clone();
                }
            }
            CommandType::Rename => {
                if let Some(new_name) = &command.value {
                    node.rename_child(last, new_name);
                }
            }
            CommandType::Edit => {}
        }
    }
}

fn populate(node: &mut ConfigNode, map: &serde_json::Map<String, Value>) {
    for (key, value) in map {
        let child = node.add_child(key.clone());
        match value {
            Value::Object(inner) => populate(child, inner),
            other => child.set_value(other.clone()),
        }
    }
}

/// Renders a scalar value without JSON quoting for strings.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_child_is_idempotent() {
        let mut root = ConfigNode::new();
        root.add_child("interfaces").add_child("eth0");
        root.add_child("interfaces");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children["interfaces"].children.len(), 1);
    }

    #[test]
    fn test_value_children_exclusivity() {
        let mut node = ConfigNode::new();
        node.add_child("a").set_value("1");
        // set_value on the parent evicts children
        node.set_value("scalar");
        assert!(node.children.is_empty());
        assert_eq!(node.value, Some(json!("scalar")));

        // adding a child to a valued node clears the value
        node.add_child("b");
        assert!(node.value.is_none());
        assert_eq!(node.children.len(), 1);
    }

    #[test]
    fn test_paths_track_parents() {
        let mut root = ConfigNode::new();
        let leaf = root.add_child("system").add_child("host-name");
        assert_eq!(leaf.path, vec!["system".to_string(), "host-name".to_string()]);
    }

    #[test]
    fn test_rename_rewrites_descendant_paths() {
        let mut root = ConfigNode::new();
        root.add_child("interfaces")
            .add_child("eth0")
            .add_child("address")
            .set_value("10.0.0.1/24");

        let interfaces = root.get_child_mut(&["interfaces"]).unwrap();
        assert!(interfaces.rename_child("eth0", "eth1"));

        let address = root.get_child(&["interfaces", "eth1", "address"]).unwrap();
        assert_eq!(
            address.path,
            vec!["interfaces".to_string(), "eth1".to_string(), "address".to_string()]
        );
        assert!(root.get_child(&["interfaces", "eth0"]).is_none());
    }

    #[test]
    fn test_flatten_includes_tombstones() {
        let mut root = ConfigNode::new();
        root.add_child("system").add_child("host-name").set_value("router1");
        root.get_child_mut(&["system", "host-name"]).unwrap().deleted = true;

        let flat = root.flatten();
        assert_eq!(flat.get("system.host-name"), Some(&json!("router1")));
        assert_eq!(root.to_dict(), json!({}));
    }

    #[test]
    fn test_to_dict_skips_valueless_leaves() {
        let mut root = ConfigNode::new();
        root.add_child("service").add_child("ssh");
        assert_eq!(root.to_dict(), json!({}));
    }

    #[test]
    fn test_from_dict_round_trip() {
        let data = json!({
            "interfaces": {
                "ethernet": {
                    "eth0": {"address": "192.168.1.1/24", "description": "Uplink"}
                }
            },
            "system": {"host-name": "router1"}
        });
        let tree = ConfigNode::from_dict(&data);
        assert_eq!(tree.to_dict(), data);
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&json!("eth0")), "eth0");
        assert_eq!(scalar_to_string(&json!(1500)), "1500");
        assert_eq!(scalar_to_string(&json!(true)), "true");
    }
}
