//! Full-text search detection.
//!
//! A value with no field attached can only be matched by searching every
//! column, which the SQL dialect cannot express. Such trees are rejected.

use sigsql_model::Node;

/// Whether the tree holds a value that is not attached to a field.
pub fn has_bare_value(node: &Node) -> bool {
    match node {
        Node::Value(_) => true,
        Node::Subexpression(child) | Node::Not(child) => has_bare_value(child),
        Node::And(children) | Node::Or(children) => children.iter().any(has_bare_value),
        Node::MapItem { .. } | Node::NullCheck(_) | Node::NotNullCheck(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_scalar_beside_map_item() {
        let tree = Node::group(Node::or(vec![
            Node::map_item("Image", "*\\cmd.exe"),
            Node::value("mimikatz"),
        ]));
        assert!(has_bare_value(&tree));
    }

    #[test]
    fn test_same_scalar_as_map_item_value() {
        let tree = Node::group(Node::or(vec![
            Node::map_item("Image", "*\\cmd.exe"),
            Node::map_item("CommandLine", "mimikatz"),
        ]));
        assert!(!has_bare_value(&tree));
    }

    #[test]
    fn test_bare_list_under_not() {
        let tree = Node::and(vec![
            Node::map_item("EventID", 1),
            Node::not(Node::group(Node::value(vec!["a", "b"]))),
        ]);
        assert!(has_bare_value(&tree));
    }

    #[test]
    fn test_top_level_value() {
        assert!(has_bare_value(&Node::value(4624)));
        assert!(!has_bare_value(&Node::not_null("User")));
    }
}
