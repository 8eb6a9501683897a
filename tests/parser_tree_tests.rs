//! Integration tests for the command parser and configuration tree.

use configd::parser::{CommandType, Parser};
use configd::tree::ConfigNode;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_parse_and_export_scenario() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "set interfaces ethernet eth0 address '192.168.1.1/24'\n\
         set interfaces ethernet eth0 description \"Uplink\"",
    );

    assert_eq!(
        tree.to_dict(),
        json!({
            "interfaces": {
                "ethernet": {
                    "eth0": {
                        "address": "192.168.1.1/24",
                        "description": "Uplink"
                    }
                }
            }
        })
    );
}

#[test]
fn test_delete_tombstones_single_leaf() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "set interfaces ethernet eth0 address '192.168.1.1/24'\n\
         set interfaces ethernet eth0 description \"Uplink\"\n\
         delete interfaces ethernet eth0 description",
    );

    assert_eq!(
        tree.to_dict(),
        json!({
            "interfaces": {
                "ethernet": {
                    "eth0": {
                        "address": "192.168.1.1/24"
                    }
                }
            }
        })
    );

    // the tombstoned node is still addressable
    let node = tree
        .get_child(&["interfaces", "ethernet", "eth0", "description"])
        .unwrap();
    assert!(node.deleted);
}

#[test]
fn test_delete_is_idempotent() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "set system ntp server 10.0.0.5\n\
         delete system ntp\n\
         delete system ntp",
    );
    assert_eq!(tree.to_dict(), json!({}));
}

#[test]
fn test_set_after_delete_revives_node() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "set system host-name router1\n\
         delete system host-name\n\
         set system host-name router2",
    );
    assert_eq!(tree.to_dict(), json!({"system": {"host-name": "router2"}}));
}

#[test]
fn test_comment_attaches_to_existing_node_only() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "set firewall name in rule 10 action accept\n\
         comment firewall name in \"WAN inbound\"\n\
         comment firewall name out \"no such node\"",
    );

    let commented = tree.get_child(&["firewall", "name", "in"]).unwrap();
    assert_eq!(commented.comment.as_deref(), Some("WAN inbound"));

    // commenting a missing node creates intermediates but attaches nothing
    let missing = tree.get_child(&["firewall", "name", "out"]);
    assert!(missing.is_none());
}

#[test]
fn test_rename_preserves_subtree() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "set interfaces ethernet eth0 address '10.0.0.1/24'\n\
         set interfaces ethernet eth0 mtu 1500\n\
         rename interfaces ethernet eth0 to eth2",
    );

    assert_eq!(
        tree.to_dict(),
        json!({
            "interfaces": {
                "ethernet": {
                    "eth2": {"address": "10.0.0.1/24", "mtu": "1500"}
                }
            }
        })
    );
}

#[test]
fn test_edit_cursor_scopes_following_commands() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "edit interfaces ethernet eth0\n\
         set address '10.0.0.1/24'\n\
         set description 'LAN'\n\
         delete description\n\
         edit system\n\
         set host-name router1",
    );

    assert_eq!(
        tree.to_dict(),
        json!({
            "interfaces": {"ethernet": {"eth0": {"address": "10.0.0.1/24"}}},
            "system": {"host-name": "router1"}
        })
    );
}

#[test]
fn test_noise_lines_are_ignored() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "Welcome to router1\n\
         # maintenance window 02:00\n\
         ! legacy banner\n\
         \n\
         set system host-name router1\n\
         set system bad 'unterminated\n\
         show interfaces",
    );
    assert_eq!(tree.to_dict(), json!({"system": {"host-name": "router1"}}));
}

#[test]
fn test_parse_line_reports_command_metadata() {
    let parser = Parser::new();
    let cmd = parser
        .parse_line("  set service ssh port 22  ")
        .expect("line should parse");
    assert_eq!(cmd.command_type, CommandType::Set);
    assert_eq!(cmd.original, "set service ssh port 22");
    assert_eq!(cmd.path, vec!["service", "ssh"]);
    assert_eq!(cmd.value.as_deref(), Some("22"));
}

#[test]
fn test_flatten_emits_only_leaf_values() {
    let parser = Parser::new();
    let tree = parser.parse_config(
        "set interfaces ethernet eth0 address '10.0.0.1/24'\n\
         set system host-name router1",
    );

    let flat = tree.flatten();
    assert_eq!(flat.len(), 2);
    assert_eq!(
        flat.get("interfaces.ethernet.eth0.address"),
        Some(&json!("10.0.0.1/24"))
    );
    assert_eq!(flat.get("system.host-name"), Some(&json!("router1")));
    assert!(!flat.contains_key("interfaces"));
}

#[test]
fn test_from_dict_never_produces_tombstones() {
    let data = json!({"a": {"b": "1"}, "c": "2"});
    let tree = ConfigNode::from_dict(&data);

    fn no_tombstones(node: &ConfigNode) -> bool {
        !node.deleted && node.children.values().all(no_tombstones)
    }
    assert!(no_tombstones(&tree));
    assert_eq!(tree.to_dict(), data);
}
