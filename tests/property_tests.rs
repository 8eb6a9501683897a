//! Property tests for the tree model and diff engine.

use configd::diff::calculate_diff;
use configd::parser::Parser;
use configd::tree::{scalar_to_string, ConfigNode};
use proptest::prelude::*;
use serde_json::Value;

/// Nested configuration maps: string leaves, non-empty objects, segment
/// names without whitespace, dots, or quotes. The root is always an object.
fn arb_config_map() -> impl Strategy<Value = Value> {
    let leaf = "[a-zA-Z0-9 ./:-]{1,12}".prop_map(Value::String);
    let node = leaf.prop_recursive(3, 24, 4, |inner| {
        prop::collection::btree_map("[a-z][a-z0-9-]{0,6}", inner, 1..4)
            .prop_map(|map| Value::Object(map.into_iter().collect()))
    });
    prop::collection::btree_map("[a-z][a-z0-9-]{0,6}", node, 1..4)
        .prop_map(|map| Value::Object(map.into_iter().collect()))
}

/// Renders a tree's flattened paths back into `set` statements.
fn to_set_statements(tree: &ConfigNode) -> String {
    tree.flatten()
        .iter()
        .map(|(path, value)| {
            format!(
                "set {} '{}'",
                path.split('.').collect::<Vec<_>>().join(" "),
                scalar_to_string(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

proptest! {
    #[test]
    fn prop_from_dict_to_dict_round_trip(data in arb_config_map()) {
        let tree = ConfigNode::from_dict(&data);
        prop_assert_eq!(tree.to_dict(), data);
    }

    #[test]
    fn prop_flatten_apply_inverse(data in arb_config_map()) {
        let original = ConfigNode::from_dict(&data);
        let statements = to_set_statements(&original);
        let reparsed = Parser::new().parse_config(&statements);
        prop_assert_eq!(reparsed.to_dict(), original.to_dict());
    }

    #[test]
    fn prop_diff_identity(data in arb_config_map()) {
        let tree = ConfigNode::from_dict(&data);
        prop_assert!(calculate_diff(&tree, &tree).is_empty());
    }

    #[test]
    fn prop_diff_symmetry(a in arb_config_map(), b in arb_config_map()) {
        let tree_a = ConfigNode::from_dict(&a);
        let tree_b = ConfigNode::from_dict(&b);

        let forward = calculate_diff(&tree_a, &tree_b);
        let backward = calculate_diff(&tree_b, &tree_a);

        prop_assert_eq!(&forward.added, &backward.removed);
        prop_assert_eq!(&forward.removed, &backward.added);
        for (path, (old, new)) in &forward.modified {
            prop_assert_eq!(
                backward.modified.get(path),
                Some(&(new.clone(), old.clone()))
            );
        }
    }

    #[test]
    fn prop_no_node_has_value_and_children(statements in prop::collection::vec(
        (
            "[a-z]{1,5}",
            "[a-z]{1,5}",
            "[a-zA-Z0-9]{1,8}",
        ),
        1..20,
    )) {
        // arbitrary interleavings of set commands over overlapping paths
        let text = statements
            .iter()
            .map(|(a, b, value)| format!("set {a} {b} {value}"))
            .chain(statements.iter().map(|(a, _, value)| format!("set {a} {value}")))
            .collect::<Vec<_>>()
            .join("\n");
        let tree = Parser::new().parse_config(&text);

        fn exclusive(node: &ConfigNode) -> bool {
            (node.value.is_none() || node.children.is_empty())
                && node.children.values().all(exclusive)
        }
        prop_assert!(exclusive(&tree));
    }
}
