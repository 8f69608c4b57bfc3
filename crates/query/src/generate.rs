//! Condition tree to WHERE-clause text.

use sigsql_model::{Leaf, Node};

use crate::classify::classify;
use crate::escape::{escape_value, quote};
use crate::mapping::{resolve_names, FieldMapping};
use crate::QueryError;

const AND_TOKEN: &str = " AND ";
const OR_TOKEN: &str = " OR ";
const NOT_TOKEN: &str = "NOT ";
const LIST_SEPARATOR: &str = ", ";

/// Recursive generator over the condition tree.
///
/// Every node yields either text or `None`, meaning "no constraint".
pub struct NodeGenerator<'a, M: ?Sized> {
    mapping: &'a M,
}

impl<'a, M: FieldMapping + ?Sized> NodeGenerator<'a, M> {
    pub fn new(mapping: &'a M) -> Self {
        Self { mapping }
    }

    pub fn generate(&self, node: &Node) -> Result<Option<String>, QueryError> {
        match node {
            Node::And(children) => self.join(children, AND_TOKEN),
            Node::Or(children) => self.join(children, OR_TOKEN),
            Node::Not(child) => Ok(self
                .generate(child)?
                .map(|inner| format!("{}{}", NOT_TOKEN, inner))),
            Node::Subexpression(child) => Ok(self
                .generate(child)?
                .filter(|inner| !inner.is_empty())
                .map(|inner| format!("({})", inner))),
            Node::MapItem { field, value } => self.map_item(field, value).map(Some),
            Node::NullCheck(field) => Ok(Some(format!("{} IS NULL", field))),
            Node::NotNullCheck(field) => Ok(Some(format!("{} IS NOT NULL", field))),
            Node::Value(leaf) => render_leaf(leaf).map(Some),
        }
    }

    fn join(&self, children: &[Node], token: &str) -> Result<Option<String>, QueryError> {
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            if let Some(part) = self.generate(child)? {
                parts.push(part);
            }
        }

        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(parts.join(token)))
        }
    }

    fn map_item(&self, field: &str, value: &Leaf) -> Result<String, QueryError> {
        let names = resolve_names(self.mapping, field, Some(value))?;
        let rendered = render_leaf(value)?;

        if let [name] = names.as_slice() {
            return classify(name, value, &rendered);
        }

        // One rule field backed by several columns: any of them may match.
        let expressions = names
            .iter()
            .map(|name| classify(name, value, &rendered))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("({})", expressions.join(OR_TOKEN)))
    }
}

/// Render a leaf as a dialect value: quoted scalar or parenthesized list.
pub fn render_leaf(leaf: &Leaf) -> Result<String, QueryError> {
    match leaf {
        Leaf::String(s) => Ok(quote(&escape_value(s))),
        Leaf::Integer(i) => Ok(quote(&i.to_string())),
        Leaf::List(items) => render_list(items),
    }
}

fn render_list(items: &[Leaf]) -> Result<String, QueryError> {
    let rendered = items
        .iter()
        .map(|item| match item {
            Leaf::List(_) => Err(QueryError::InvalidListType),
            scalar => render_leaf(scalar),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({})", rendered.join(LIST_SEPARATOR)))
}
