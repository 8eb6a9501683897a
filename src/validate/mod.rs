//! Declarative validation engine.
//!
//! Rules are bound to path *patterns* — dotted segment lists where `*`
//! matches exactly one arbitrary segment. Lookup is exact match first, then
//! the first wildcard pattern that matches; ties between wildcard patterns
//! are resolved by rule insertion order, which is why the rule set is an
//! ordered map.
//!
//! For a matched value the checks run in a fixed order: required, type
//! coercion (a coercion failure short-circuits the remaining checks for that
//! path), numeric range, allowed-value membership, regex pattern, and a
//! custom predicate. Every failing check appends its own error, so one value
//! can produce several. Tombstoned subtrees are never validated.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::{scalar_to_string, ConfigNode};

/// Classification of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// A required value is missing.
    Required,
    /// The value could not be coerced to the declared type.
    InvalidType,
    /// The value is not in the allowed set.
    InvalidValue,
    /// The value is outside the numeric range.
    Range,
    /// The value does not match the regex pattern.
    Pattern,
    /// A custom predicate rejected the value.
    Custom,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValidationErrorKind::Required => "required",
            ValidationErrorKind::InvalidType => "invalid_type",
            ValidationErrorKind::InvalidValue => "invalid_value",
            ValidationErrorKind::Range => "range",
            ValidationErrorKind::Pattern => "pattern",
            ValidationErrorKind::Custom => "custom",
        };
        write!(f, "{name}")
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dotted path of the offending node.
    pub path: String,
    /// Human-readable description.
    pub message: String,
    /// Machine-readable classification.
    pub error_type: ValidationErrorKind,
}

/// Scalar type a rule may require a value to coerce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Any stringifiable scalar.
    Str,
    /// Integer.
    Int,
    /// Floating point number.
    Float,
    /// Boolean (`true`/`false`/`0`/`1`).
    Bool,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Str => "str",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
        };
        write!(f, "{name}")
    }
}

/// Custom validation predicate: `Ok(())` accepts, `Err(message)` rejects.
pub type CustomValidator = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

/// A declarative constraint bound to a path pattern.
#[derive(Clone, Default)]
pub struct ValidationRule {
    /// The value must be present.
    pub required: bool,
    /// The value must coerce to this type.
    pub data_type: Option<ValueType>,
    /// Inclusive lower bound for numeric values.
    pub min_value: Option<f64>,
    /// Inclusive upper bound for numeric values.
    pub max_value: Option<f64>,
    /// The stringified value must be one of these.
    pub allowed_values: Option<Vec<String>>,
    /// The stringified value must match this pattern.
    pub pattern: Option<Regex>,
    custom: Option<CustomValidator>,
}

impl std::fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRule")
            .field("required", &self.required)
            .field("data_type", &self.data_type)
            .field("min_value", &self.min_value)
            .field("max_value", &self.max_value)
            .field("allowed_values", &self.allowed_values)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl ValidationRule {
    /// Creates an empty rule that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the value as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Requires the value to coerce to the given type.
    pub fn data_type(mut self, data_type: ValueType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Sets the inclusive numeric lower bound.
    pub fn min_value(mut self, min: f64) -> Self {
        self.min_value = Some(min);
        self
    }

    /// Sets the inclusive numeric upper bound.
    pub fn max_value(mut self, max: f64) -> Self {
        self.max_value = Some(max);
        self
    }

    /// Restricts the value to a fixed set.
    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Requires the stringified value to match a pattern.
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Attaches a custom predicate.
    pub fn custom<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(validator));
        self
    }
}

static IPV4_CIDR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}/\d{1,2}$").expect("invalid address pattern")
});

static IPV4_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").expect("invalid ipv4 pattern")
});

static HOSTNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9-]+$").expect("invalid hostname pattern"));

/// Baseline rules for common configuration paths.
fn baseline_rules() -> IndexMap<String, ValidationRule> {
    let mut rules = IndexMap::new();

    // Interface configuration
    rules.insert(
        "interfaces.*.*.address".to_string(),
        ValidationRule::new().pattern(IPV4_CIDR_PATTERN.clone()),
    );
    rules.insert(
        "interfaces.*.*.mtu".to_string(),
        ValidationRule::new()
            .data_type(ValueType::Int)
            .min_value(68.0)
            .max_value(9000.0),
    );

    // System configuration
    rules.insert(
        "system.host-name".to_string(),
        ValidationRule::new().pattern(HOSTNAME_PATTERN.clone()),
    );
    rules.insert(
        "system.time-zone".to_string(),
        ValidationRule::new().allowed_values(["UTC", "America/New_York", "Europe/London"]),
    );
    rules.insert(
        "system.time-server.*".to_string(),
        ValidationRule::new().pattern(IPV4_PATTERN.clone()),
    );
    rules.insert(
        "system.name-server.*".to_string(),
        ValidationRule::new().pattern(IPV4_PATTERN.clone()),
    );

    // SSH service
    rules.insert(
        "service.ssh.port".to_string(),
        ValidationRule::new()
            .data_type(ValueType::Int)
            .min_value(1.0)
            .max_value(65535.0),
    );
    rules.insert(
        "service.ssh.allow-root".to_string(),
        ValidationRule::new().data_type(ValueType::Bool),
    );

    // Firewall rules must carry an action
    rules.insert(
        "firewall.name.*.rule.*.action".to_string(),
        ValidationRule::new()
            .required()
            .allowed_values(["accept", "drop", "reject"]),
    );

    // VPN peers
    rules.insert(
        "vpn.ipsec.*.remote-address".to_string(),
        ValidationRule::new().required().pattern(IPV4_PATTERN.clone()),
    );

    rules
}

/// Validation engine holding an ordered, mutable rule set.
#[derive(Debug, Clone)]
pub struct Validator {
    rules: IndexMap<String, ValidationRule>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Creates a validator with the baseline rule set.
    pub fn new() -> Self {
        Self {
            rules: baseline_rules(),
        }
    }

    /// Creates a validator with no rules.
    pub fn empty() -> Self {
        Self {
            rules: IndexMap::new(),
        }
    }

    /// Adds or replaces a rule. Replacing keeps the original insertion slot,
    /// so wildcard resolution order is stable across overrides.
    pub fn add_rule(&mut self, path: impl Into<String>, rule: ValidationRule) {
        self.rules.insert(path.into(), rule);
    }

    /// Removes a rule; returns true if it existed.
    pub fn remove_rule(&mut self, path: &str) -> bool {
        self.rules.shift_remove(path).is_some()
    }

    /// Number of active rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Validates a configuration tree, returning every failure found.
    ///
    /// The walk visits valued nodes and, for `required` rules, valueless
    /// leaves; tombstoned subtrees are skipped. Output order is stable for a
    /// fixed tree and rule set.
    pub fn validate(&self, config: &ConfigNode) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.validate_node(config, "", &mut errors);
        errors
    }

    fn validate_node(&self, node: &ConfigNode, prefix: &str, errors: &mut Vec<ValidationError>) {
        for (name, child) in &node.children {
            if child.deleted {
                continue;
            }
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };

            if let Some(value) = &child.value {
                if let Some(rule) = self.find_matching_rule(&path) {
                    check_value(&path, value, rule, errors);
                }
            } else if child.children.is_empty() {
                if let Some(rule) = self.find_matching_rule(&path) {
                    if rule.required {
                        errors.push(ValidationError {
                            path: path.clone(),
                            message: "Required value is missing".to_string(),
                            error_type: ValidationErrorKind::Required,
                        });
                    }
                }
            }

            self.validate_node(child, &path, errors);
        }
    }

    /// Finds the rule for a path: exact match first, then the first wildcard
    /// pattern in insertion order.
    fn find_matching_rule(&self, path: &str) -> Option<&ValidationRule> {
        if let Some(rule) = self.rules.get(path) {
            return Some(rule);
        }
        self.rules
            .iter()
            .find(|(pattern, _)| path_matches(pattern, path))
            .map(|(_, rule)| rule)
    }
}

/// Checks whether a dotted path matches a pattern where `*` stands for
/// exactly one segment. Segment counts must be equal.
fn path_matches(pattern: &str, path: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('.').collect();
    let path_parts: Vec<&str> = path.split('.').collect();

    pattern_parts.len() == path_parts.len()
        && pattern_parts
            .iter()
            .zip(&path_parts)
            .all(|(pattern_part, path_part)| *pattern_part == "*" || pattern_part == path_part)
}

fn check_value(path: &str, value: &Value, rule: &ValidationRule, errors: &mut Vec<ValidationError>) {
    let mut numeric = value.as_f64();

    if let Some(expected) = rule.data_type {
        match coerce(value, expected) {
            Ok(coerced) => {
                if coerced.is_some() {
                    numeric = coerced;
                }
            }
            Err(message) => {
                errors.push(ValidationError {
                    path: path.to_string(),
                    message,
                    error_type: ValidationErrorKind::InvalidType,
                });
                return;
            }
        }
    }

    if let (Some(min), Some(n)) = (rule.min_value, numeric) {
        if n < min {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("Value {n} is below minimum {min}"),
                error_type: ValidationErrorKind::Range,
            });
        }
    }
    if let (Some(max), Some(n)) = (rule.max_value, numeric) {
        if n > max {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("Value {n} exceeds maximum {max}"),
                error_type: ValidationErrorKind::Range,
            });
        }
    }

    if let Some(allowed) = &rule.allowed_values {
        let text = scalar_to_string(value);
        if !allowed.iter().any(|candidate| candidate == &text) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("Value {} not in allowed values: {}", text, allowed.join(", ")),
                error_type: ValidationErrorKind::InvalidValue,
            });
        }
    }

    if let Some(pattern) = &rule.pattern {
        let text = scalar_to_string(value);
        if !pattern.is_match(&text) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("Value {} does not match pattern: {}", text, pattern.as_str()),
                error_type: ValidationErrorKind::Pattern,
            });
        }
    }

    if let Some(custom) = &rule.custom {
        if let Err(message) = custom(value) {
            errors.push(ValidationError {
                path: path.to_string(),
                message,
                error_type: ValidationErrorKind::Custom,
            });
        }
    }
}

/// Attempts to coerce a value to the expected type, returning the numeric
/// representation when one exists (used by the range checks).
fn coerce(value: &Value, expected: ValueType) -> std::result::Result<Option<f64>, String> {
    let text = scalar_to_string(value);
    match expected {
        ValueType::Str => Ok(None),
        ValueType::Int => value
            .as_i64()
            .or_else(|| text.trim().parse::<i64>().ok())
            .map(|n| Some(n as f64))
            .ok_or_else(|| "Invalid type, expected int".to_string()),
        ValueType::Float => value
            .as_f64()
            .or_else(|| text.trim().parse::<f64>().ok())
            .map(Some)
            .ok_or_else(|| "Invalid type, expected float".to_string()),
        ValueType::Bool => {
            let is_bool = value.is_boolean()
                || matches!(
                    text.trim().to_ascii_lowercase().as_str(),
                    "true" | "false" | "0" | "1"
                );
            if is_bool {
                Ok(None)
            } else {
                Err("Invalid type, expected bool".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn tree(text: &str) -> ConfigNode {
        Parser::new().parse_config(text)
    }

    #[test]
    fn test_path_matching() {
        assert!(path_matches("interfaces.*.*.mtu", "interfaces.ethernet.eth0.mtu"));
        assert!(!path_matches("interfaces.*.*.mtu", "interfaces.ethernet.mtu"));
        assert!(!path_matches("system.host-name", "system.domain-name"));
        assert!(path_matches("a.*.c", "a.b.c"));
    }

    #[test]
    fn test_valid_tree_has_no_errors() {
        let validator = Validator::new();
        let config = tree(
            "set interfaces ethernet eth0 address '192.168.1.1/24'\n\
             set interfaces ethernet eth0 mtu 1500\n\
             set system host-name router1",
        );
        assert!(validator.validate(&config).is_empty());
    }

    #[test]
    fn test_mtu_out_of_range() {
        let validator = Validator::new();
        let config = tree("set interfaces ethernet eth0 mtu 12000");
        let errors = validator.validate(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ValidationErrorKind::Range);
        assert_eq!(errors[0].path, "interfaces.ethernet.eth0.mtu");
    }

    #[test]
    fn test_type_coercion_failure_short_circuits() {
        let validator = Validator::new();
        let config = tree("set interfaces ethernet eth0 mtu jumbo");
        let errors = validator.validate(&config);
        // only invalid_type; the range checks were skipped
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ValidationErrorKind::InvalidType);
    }

    #[test]
    fn test_firewall_action_membership() {
        let validator = Validator::new();
        let config = tree("set firewall name in rule 10 action bounce");
        let errors = validator.validate(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ValidationErrorKind::InvalidValue);
    }

    #[test]
    fn test_required_fires_on_valueless_leaf() {
        let mut config = ConfigNode::new();
        config
            .add_child("firewall")
            .add_child("name")
            .add_child("in")
            .add_child("rule")
            .add_child("10")
            .add_child("action");
        let validator = Validator::new();
        let errors = validator.validate(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ValidationErrorKind::Required);
        assert_eq!(errors[0].path, "firewall.name.in.rule.10.action");
    }

    #[test]
    fn test_tombstoned_nodes_are_skipped() {
        let validator = Validator::new();
        let config = tree(
            "set interfaces ethernet eth0 mtu 12000\n\
             delete interfaces ethernet eth0 mtu",
        );
        assert!(validator.validate(&config).is_empty());
    }

    #[test]
    fn test_multiple_errors_for_one_value() {
        let mut validator = Validator::empty();
        validator.add_rule(
            "system.host-name",
            ValidationRule::new()
                .allowed_values(["router1", "router2"])
                .pattern(Regex::new(r"^[a-z]+$").unwrap()),
        );
        let errors = validator.validate(&tree("set system host-name FW-01"));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].error_type, ValidationErrorKind::InvalidValue);
        assert_eq!(errors[1].error_type, ValidationErrorKind::Pattern);
    }

    #[test]
    fn test_wildcard_resolution_uses_insertion_order() {
        let mut validator = Validator::empty();
        validator.add_rule(
            "a.*.c",
            ValidationRule::new().allowed_values(["first"]),
        );
        validator.add_rule(
            "a.b.*",
            ValidationRule::new().allowed_values(["second"]),
        );
        // both patterns match a.b.c; the earlier insertion wins
        let errors = validator.validate(&tree("set a b c second"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("allowed values: first"));
    }

    #[test]
    fn test_validator_is_deterministic() {
        let validator = Validator::new();
        let config = tree(
            "set interfaces ethernet eth0 mtu 40\n\
             set firewall name in rule 10 action bounce\n\
             set service ssh port 99999",
        );
        let first = validator.validate(&config);
        let second = validator.validate(&config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_validator() {
        let mut validator = Validator::empty();
        validator.add_rule(
            "system.host-name",
            ValidationRule::new().custom(|value| {
                let text = scalar_to_string(value);
                if text.len() <= 8 {
                    Ok(())
                } else {
                    Err(format!("host name '{text}' is longer than 8 characters"))
                }
            }),
        );
        let errors = validator.validate(&tree("set system host-name verylonghostname"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ValidationErrorKind::Custom);
    }

    #[test]
    fn test_add_and_remove_rule() {
        let mut validator = Validator::empty();
        validator.add_rule("x.y", ValidationRule::new().required());
        assert_eq!(validator.rule_count(), 1);
        assert!(validator.remove_rule("x.y"));
        assert!(!validator.remove_rule("x.y"));
    }
}
