//! Command-grammar parser.
//!
//! Recognizes the line-oriented configuration grammar:
//!
//! ```text
//! set <path-segment>+ [value]
//! delete <path-segment>+
//! comment <path-segment>+ <text>
//! rename <path-segment>+ to <new-name>
//! edit <path-segment>+
//! ```
//!
//! The grammar is intentionally lenient: blank lines, `#`/`!` comments, and
//! anything that does not match a statement shape (device banners, prompts)
//! are silently skipped. Segments and values may be quoted with `"` or `'`
//! to include literal whitespace; an unterminated quote fails only that line.
//!
//! [`Parser::parse_line`] is a stateless, single-pass recognizer. The `edit`
//! cursor — which makes subsequent command paths relative — lives in the
//! apply loop of [`Parser::parse_config`], not in the line parser.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tree::{ConfigNode, ConfigPath};

/// The statement shape of a parsed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// Create or overwrite a value at a path.
    Set,
    /// Tombstone a path.
    Delete,
    /// Attach an annotation to a path.
    Comment,
    /// Re-key the final segment of a path.
    Rename,
    /// Move the apply cursor to a path.
    Edit,
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandType::Set => write!(f, "set"),
            CommandType::Delete => write!(f, "delete"),
            CommandType::Comment => write!(f, "comment"),
            CommandType::Rename => write!(f, "rename"),
            CommandType::Edit => write!(f, "edit"),
        }
    }
}

/// A parsed grammar statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigCommand {
    /// The statement shape.
    pub command_type: CommandType,
    /// Target path.
    pub path: ConfigPath,
    /// New value for `set`, comment text for `comment`, new name for `rename`.
    pub value: Option<String>,
    /// The original source line, kept for diagnostics.
    pub original: String,
}

impl ConfigCommand {
    /// Resolves this command's path relative to an `edit` cursor.
    pub fn with_base(&self, base: &[String]) -> ConfigCommand {
        if base.is_empty() {
            return self.clone();
        }
        let mut path = base.to_vec();
        path.extend(self.path.iter().cloned());
        ConfigCommand {
            path,
            ..self.clone()
        }
    }
}

/// Parser for the configuration command grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    /// Creates a new parser.
    pub fn new() -> Self {
        Self
    }

    /// Parses a single line into a command.
    ///
    /// Returns `None` for blank lines, `#`/`!` comments, unrecognized
    /// statements, and lines with unterminated quotes — none of these are
    /// errors, the grammar tolerates textual noise.
    pub fn parse_line(&self, line: &str) -> Option<ConfigCommand> {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            return None;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        let command = match keyword.to_ascii_lowercase().as_str() {
            "set" => self.parse_set(rest, line),
            "delete" => self.parse_delete(rest, line),
            "comment" => self.parse_comment(rest, line),
            "rename" => self.parse_rename(rest, line),
            "edit" => self.parse_edit(rest, line),
            _ => None,
        };

        if command.is_none() {
            debug!(line, "skipping unrecognized configuration line");
        }
        command
    }

    /// Parses complete configuration text into a tree.
    ///
    /// Starts from an empty tree and applies each successfully parsed command
    /// in order. `edit` statements move the cursor; all other paths are
    /// resolved relative to it.
    pub fn parse_config(&self, text: &str) -> ConfigNode {
        let mut root = ConfigNode::new();
        let mut cursor: Vec<String> = Vec::new();

        for line in text.lines() {
            let Some(command) = self.parse_line(line) else {
                continue;
            };
            if command.command_type == CommandType::Edit {
                cursor = command.path;
                continue;
            }
            root.apply(&command.with_base(&cursor));
        }

        root
    }

    /// `set <path>+ [value]` — with two or more tokens the final token is the
    /// value; a single token is a valueless path. Deterministic, but
    /// genuinely ambiguous for valueless multi-segment paths (see tests).
    fn parse_set(&self, rest: &str, original: &str) -> Option<ConfigCommand> {
        let mut tokens = tokenize(rest)?;
        if tokens.is_empty() {
            return None;
        }
        let value = if tokens.len() >= 2 { tokens.pop() } else { None };
        Some(ConfigCommand {
            command_type: CommandType::Set,
            path: tokens,
            value,
            original: original.to_string(),
        })
    }

    fn parse_delete(&self, rest: &str, original: &str) -> Option<ConfigCommand> {
        let tokens = tokenize(rest)?;
        if tokens.is_empty() {
            return None;
        }
        Some(ConfigCommand {
            command_type: CommandType::Delete,
            path: tokens,
            value: None,
            original: original.to_string(),
        })
    }

    /// `comment <path>+ <text>` — the final (conventionally quoted) token is
    /// the annotation text.
    fn parse_comment(&self, rest: &str, original: &str) -> Option<ConfigCommand> {
        let mut tokens = tokenize(rest)?;
        if tokens.len() < 2 {
            return None;
        }
        let text = tokens.pop();
        Some(ConfigCommand {
            command_type: CommandType::Comment,
            path: tokens,
            value: text,
            original: original.to_string(),
        })
    }

    /// `rename <path>+ to <new-name>` — split on the first ` to `.
    fn parse_rename(&self, rest: &str, original: &str) -> Option<ConfigCommand> {
        let lower = rest.to_ascii_lowercase();
        let idx = lower.find(" to ")?;
        let (old_part, new_part) = (&rest[..idx], &rest[idx + 4..]);

        let path = tokenize(old_part)?;
        let new_name = tokenize(new_part)?.into_iter().next()?;
        if path.is_empty() {
            return None;
        }
        Some(ConfigCommand {
            command_type: CommandType::Rename,
            path,
            value: Some(new_name),
            original: original.to_string(),
        })
    }

    fn parse_edit(&self, rest: &str, original: &str) -> Option<ConfigCommand> {
        let tokens = tokenize(rest)?;
        if tokens.is_empty() {
            return None;
        }
        Some(ConfigCommand {
            command_type: CommandType::Edit,
            path: tokens,
            value: None,
            original: original.to_string(),
        })
    }
}

/// Splits a string on whitespace, treating quoted substrings as atomic
/// tokens. Quotes are stripped; whitespace inside quotes is preserved.
/// Returns `None` on an unterminated quote.
fn tokenize(input: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = ' ';

    for ch in input.chars() {
        if (ch == '"' || ch == '\'') && (!in_quotes || ch == quote_char) {
            if in_quotes {
                in_quotes = false;
            } else {
                in_quotes = true;
                quote_char = ch;
            }
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return None;
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<ConfigCommand> {
        Parser::new().parse_line(line)
    }

    #[test]
    fn test_set_with_quoted_value() {
        let cmd = parse("set interfaces ethernet eth0 address '192.168.1.1/24'").unwrap();
        assert_eq!(cmd.command_type, CommandType::Set);
        assert_eq!(cmd.path, vec!["interfaces", "ethernet", "eth0", "address"]);
        assert_eq!(cmd.value.as_deref(), Some("192.168.1.1/24"));
    }

    #[test]
    fn test_quoted_value_preserves_whitespace() {
        let cmd = parse(r#"set interfaces ethernet eth0 description "Uplink to core""#).unwrap();
        assert_eq!(cmd.value.as_deref(), Some("Uplink to core"));
    }

    #[test]
    fn test_single_token_set_has_no_value() {
        let cmd = parse("set interfaces").unwrap();
        assert_eq!(cmd.path, vec!["interfaces"]);
        assert_eq!(cmd.value, None);
    }

    #[test]
    fn test_blank_comment_and_banner_lines_yield_none() {
        assert!(parse("").is_none());
        assert!(parse("   ").is_none());
        assert!(parse("# a comment").is_none());
        assert!(parse("! legacy comment").is_none());
        assert!(parse("Welcome to the router CLI").is_none());
    }

    #[test]
    fn test_unterminated_quote_skips_line() {
        assert!(parse("set system host-name 'router").is_none());
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let cmd = parse("SET system host-name router1").unwrap();
        assert_eq!(cmd.command_type, CommandType::Set);
        assert!(parse("Delete system ntp").is_some());
    }

    #[test]
    fn test_delete_and_comment() {
        let del = parse("delete interfaces ethernet eth0 description").unwrap();
        assert_eq!(del.command_type, CommandType::Delete);
        assert_eq!(del.path.len(), 4);
        assert_eq!(del.value, None);

        let com = parse(r#"comment firewall name in "WAN inbound""#).unwrap();
        assert_eq!(com.command_type, CommandType::Comment);
        assert_eq!(com.path, vec!["firewall", "name", "in"]);
        assert_eq!(com.value.as_deref(), Some("WAN inbound"));
    }

    #[test]
    fn test_rename() {
        let cmd = parse("rename interfaces ethernet eth0 to eth1").unwrap();
        assert_eq!(cmd.command_type, CommandType::Rename);
        assert_eq!(cmd.path, vec!["interfaces", "ethernet", "eth0"]);
        assert_eq!(cmd.value.as_deref(), Some("eth1"));
    }

    #[test]
    fn test_edit_sets_cursor_for_subsequent_commands() {
        let text = "edit interfaces ethernet eth0\nset address '10.0.0.1/24'\nset mtu 1500";
        let tree = Parser::new().parse_config(text);
        let address = tree.get_child(&["interfaces", "ethernet", "eth0", "address"]);
        assert!(address.is_some());
        assert_eq!(
            tree.get_child(&["interfaces", "ethernet", "eth0", "mtu"])
                .and_then(|n| n.value.clone()),
            Some(serde_json::json!("1500"))
        );
    }

    // The grammar cannot distinguish "multi-segment path without a value"
    // from "path whose final token is a value". The deterministic rule is:
    // two or more tokens means the last one is the value.
    #[test]
    fn test_set_without_value_is_ambiguous() {
        let cmd = parse("set service ssh").unwrap();
        assert_eq!(cmd.path, vec!["service"]);
        assert_eq!(cmd.value.as_deref(), Some("ssh"));
    }

    #[test]
    fn test_tokenize_mixed_quotes() {
        let tokens = tokenize(r#"a "b c" 'd e' f"#).unwrap();
        assert_eq!(tokens, vec!["a", "b c", "d e", "f"]);
        // a quote character of the other kind is literal inside quotes
        let tokens = tokenize(r#""it's fine""#).unwrap();
        assert_eq!(tokens, vec!["it's fine"]);
    }
}
