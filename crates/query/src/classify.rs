//! Leaf classification: picks the expression shape for a field/value pair.

use sigsql_model::Leaf;

use crate::escape::{escape_value, has_wildcard, quote};
use crate::QueryError;

/// Marker in a mapped field name requesting a length comparison.
const LENGTH_MARKER: &str = "LENGTH";

/// Build the expression for `field` constrained by `value`.
///
/// `rendered` is the escaped and quoted form of `value`. The checks run in a
/// fixed order because the shapes overlap.
pub(crate) fn classify(field: &str, value: &Leaf, rendered: &str) -> Result<String, QueryError> {
    let wildcard = has_wildcard(rendered);

    if is_set_literal(rendered) && !wildcard && value.is_integer_list() {
        return Ok(format!("{} IN {}", field, rendered));
    }

    if field.contains(LENGTH_MARKER) {
        return match value {
            Leaf::List(_) => Err(QueryError::UnsupportedValueType {
                field: field.to_string(),
                kind: "list",
            }),
            _ => Ok(format!("({} {})", field, value.raw_text())),
        };
    }

    match value {
        Leaf::List(items) => Ok(expand_list(field, items)),
        Leaf::String(_) | Leaf::Integer(_) if wildcard => Ok(like(field, rendered)),
        Leaf::String(_) | Leaf::Integer(_) => Ok(format!("{} = {}", field, rendered)),
    }
}

/// Expand a list into one pattern match per item, OR-ed together.
///
/// Items are always matched as patterns, with or without wildcards.
fn expand_list(field: &str, items: &[Leaf]) -> String {
    let matches: Vec<String> = items
        .iter()
        .map(|item| like(field, &quote(&escape_value(&item.raw_text()))))
        .collect();
    format!("({})", matches.join(" OR "))
}

/// Case-insensitive pattern match.
fn like(field: &str, pattern: &str) -> String {
    format!("LOWER({}) LIKE {}", field, pattern.to_lowercase())
}

/// `("a", "b")`-shaped text: parenthesized and comma separated.
fn is_set_literal(rendered: &str) -> bool {
    rendered.starts_with('(') && rendered.ends_with(')') && rendered.contains(',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_equality() {
        let sql = classify("EventID", &Leaf::from(4624), "\"4624\"").unwrap();
        assert_eq!(sql, "EventID = \"4624\"");
    }

    #[test]
    fn test_wildcard_is_case_insensitive() {
        let sql = classify("Image", &Leaf::from("*\\CMD.exe"), "\"%\\\\CMD.exe\"").unwrap();
        assert_eq!(sql, "LOWER(Image) LIKE \"%\\\\cmd.exe\"");
    }

    #[test]
    fn test_integer_list_is_set_membership() {
        let sql = classify("EventID", &Leaf::from(vec![4624, 4625]), "(\"4624\", \"4625\")").unwrap();
        assert_eq!(sql, "EventID IN (\"4624\", \"4625\")");
    }

    #[test]
    fn test_string_list_expands() {
        let value = Leaf::from(vec!["a", "B*"]);
        let sql = classify("CommandLine", &value, "(\"a\", \"B%\")").unwrap();
        assert_eq!(
            sql,
            "(LOWER(CommandLine) LIKE \"a\" OR LOWER(CommandLine) LIKE \"b%\")"
        );
    }

    #[test]
    fn test_single_integer_list_expands() {
        let sql = classify("EventID", &Leaf::from(vec![1]), "(\"1\")").unwrap();
        assert_eq!(sql, "(LOWER(EventID) LIKE \"1\")");
    }

    #[test]
    fn test_length_comparison_uses_raw_value() {
        let sql = classify("LENGTH(CommandLine)", &Leaf::from("> 100"), "\"> 100\"").unwrap();
        assert_eq!(sql, "(LENGTH(CommandLine) > 100)");
    }

    #[test]
    fn test_length_comparison_rejects_list() {
        let value = Leaf::from(vec!["> 1", "< 5"]);
        assert!(matches!(
            classify("LENGTH(CommandLine)", &value, "(\"> 1\", \"< 5\")"),
            Err(QueryError::UnsupportedValueType { kind: "list", .. })
        ));
    }

    #[test]
    fn test_set_literal_with_wildcard_is_not_membership() {
        let value = Leaf::from(vec!["a_b", "c"]);
        let sql = classify("f", &value, "(\"a\\_b\", \"c\")").unwrap();
        assert_eq!(sql, "(LOWER(f) LIKE \"a\\_b\" OR LOWER(f) LIKE \"c\")");
    }
}
