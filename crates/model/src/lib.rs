//! Core domain model for sigsql rule compilation.
//!
//! This crate defines the types handed over by the upstream rule parser:
//! - `Node`: the boolean condition tree of a detection rule
//! - `Leaf`: a terminal value (string, integer or list) attached to a field
//! - `AggregationDescriptor`: the optional post-match statistical filter
//! - `ParsedRule`: everything the compiler needs for one rule

use std::fmt;

use serde::{Deserialize, Serialize};

/// A terminal value of the condition tree.
///
/// Lists are expected to hold only strings and integers. A nested list is
/// still representable so the generator can reject it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Leaf {
    String(String),
    Integer(i64),
    List(Vec<Leaf>),
}

impl Leaf {
    /// True for a list whose items are all integers.
    pub fn is_integer_list(&self) -> bool {
        match self {
            Self::List(items) => items.iter().all(|item| matches!(item, Self::Integer(_))),
            _ => false,
        }
    }

    /// The literal text of the value, without any escaping.
    pub fn raw_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Leaf {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Leaf {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Leaf {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Leaf {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl<T: Into<Leaf>> From<Vec<T>> for Leaf {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// A node of the condition tree.
///
/// The tree is built once by the parser and only read by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    /// Grouping marker, rendered as parentheses
    Subexpression(Box<Node>),
    /// Field/value constraint
    MapItem { field: String, value: Leaf },
    NullCheck(String),
    NotNullCheck(String),
    /// A value with no field attached (full-text search keyword)
    Value(Leaf),
}

impl Node {
    pub fn and(children: Vec<Node>) -> Self {
        Self::And(children)
    }

    pub fn or(children: Vec<Node>) -> Self {
        Self::Or(children)
    }

    pub fn not(child: Node) -> Self {
        Self::Not(Box::new(child))
    }

    pub fn group(child: Node) -> Self {
        Self::Subexpression(Box::new(child))
    }

    pub fn map_item(field: impl Into<String>, value: impl Into<Leaf>) -> Self {
        Self::MapItem {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn null(field: impl Into<String>) -> Self {
        Self::NullCheck(field.into())
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Self::NotNullCheck(field.into())
    }

    pub fn value(value: impl Into<Leaf>) -> Self {
        Self::Value(value.into())
    }
}

/// Parsed aggregation expression of a rule condition
/// (e.g. `| count() by User > 5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationDescriptor {
    /// Aggregate function as written in the rule (count, min, max, sum, avg)
    pub aggfunc: String,

    /// Field the function is applied to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggfield: Option<String>,

    /// Field to group by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupfield: Option<String>,

    /// Comparison operator of the threshold (`>`, `<=`, ...)
    pub cond_op: String,

    /// Threshold value
    pub condition: serde_json::Number,
}

impl AggregationDescriptor {
    pub fn new(
        aggfunc: impl Into<String>,
        cond_op: impl Into<String>,
        condition: impl Into<serde_json::Number>,
    ) -> Self {
        Self {
            aggfunc: aggfunc.into(),
            aggfield: None,
            groupfield: None,
            cond_op: cond_op.into(),
            condition: condition.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.aggfield = Some(field.into());
        self
    }

    pub fn grouped_by(mut self, field: impl Into<String>) -> Self {
        self.groupfield = Some(field.into());
        self
    }
}

/// One top-level condition of a rule with its optional aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub search: Node,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationDescriptor>,
}

impl ConditionGroup {
    pub fn new(search: Node) -> Self {
        Self {
            search,
            aggregation: None,
        }
    }
}

/// A detection rule as produced by the rule parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedRule {
    /// Rule title, used for diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Fields declared by the rule for output selection
    #[serde(default)]
    pub fields: Vec<String>,

    /// Parsed conditions, in rule order
    #[serde(default)]
    pub conditions: Vec<ConditionGroup>,
}

impl ParsedRule {
    /// Create a rule with a single condition group.
    pub fn new(search: Node) -> Self {
        Self {
            conditions: vec![ConditionGroup::new(search)],
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Attach an aggregation to the last condition group.
    pub fn with_aggregation(mut self, aggregation: AggregationDescriptor) -> Self {
        if let Some(group) = self.conditions.last_mut() {
            group.aggregation = Some(aggregation);
        }
        self
    }

    pub fn with_condition(mut self, group: ConditionGroup) -> Self {
        self.conditions.push(group);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_from_json() {
        let leaf: Leaf = serde_json::from_str(r#"[1, "a", [2]]"#).unwrap();
        assert_eq!(
            leaf,
            Leaf::List(vec![
                Leaf::Integer(1),
                Leaf::String("a".into()),
                Leaf::List(vec![Leaf::Integer(2)]),
            ])
        );
    }

    #[test]
    fn test_leaf_raw_text() {
        assert_eq!(Leaf::from("> 100").raw_text(), "> 100");
        assert_eq!(Leaf::from(4624).raw_text(), "4624");
        assert_eq!(Leaf::from(vec![1, 2]).raw_text(), "[1, 2]");
    }

    #[test]
    fn test_integer_list() {
        assert!(Leaf::from(vec![1, 2]).is_integer_list());
        assert!(!Leaf::List(vec![Leaf::Integer(1), Leaf::from("a")]).is_integer_list());
        assert!(!Leaf::from(1).is_integer_list());
    }

    #[test]
    fn test_node_deserialization() {
        let json = r#"{
            "type": "subexpression",
            "value": {
                "type": "and",
                "value": [
                    {"type": "map_item", "value": {"field": "EventID", "value": 4624}},
                    {"type": "not_null_check", "value": "User"}
                ]
            }
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(
            node,
            Node::group(Node::and(vec![
                Node::map_item("EventID", 4624),
                Node::not_null("User"),
            ]))
        );
    }

    #[test]
    fn test_rule_deserialization() {
        let json = r#"{
            "title": "Brute force",
            "conditions": [{
                "search": {"type": "map_item", "value": {"field": "EventID", "value": 4625}},
                "aggregation": {"aggfunc": "count", "groupfield": "User", "cond_op": ">", "condition": 5}
            }]
        }"#;
        let rule: ParsedRule = serde_json::from_str(json).unwrap();
        assert!(rule.fields.is_empty());
        let agg = rule.conditions[0].aggregation.as_ref().unwrap();
        assert_eq!(agg.aggfunc, "count");
        assert_eq!(agg.groupfield.as_deref(), Some("User"));
        assert_eq!(agg.condition.to_string(), "5");
    }

    #[test]
    fn test_with_aggregation_targets_last_group() {
        let rule = ParsedRule::new(Node::map_item("a", 1))
            .with_condition(ConditionGroup::new(Node::map_item("b", 2)))
            .with_aggregation(AggregationDescriptor::new("count", ">", 1));
        assert!(rule.conditions[0].aggregation.is_none());
        assert!(rule.conditions[1].aggregation.is_some());
    }
}
