pub mod ids;
pub mod normalize;
pub(crate) mod walk;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QbError;

/// Stable identity of a node, unique across the whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Leaf condition: `field operator value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: NodeId,
    pub field: String,
    pub operator: String,
    pub value: Value,
}

/// Ordered children joined by a combinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: NodeId,
    pub combinator: String,
    pub rules: Vec<Node>,
}

impl Group {
    pub fn new(id: NodeId, combinator: impl Into<String>) -> Self {
        Group {
            id,
            combinator: combinator.into(),
            rules: Vec::new(),
        }
    }

    /// Copy of this group's header with a different child list. Children are
    /// shared, not deep-copied.
    pub(crate) fn with_rules(&self, rules: Vec<Node>) -> Self {
        Group {
            id: self.id.clone(),
            combinator: self.combinator.clone(),
            rules,
        }
    }
}

/// A child of a group. Clones share the underlying node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Rule(Arc<Rule>),
    Group(Arc<Group>),
}

/// Which variant a node is, without borrowing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Rule,
    Group,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Rule => write!(f, "rule"),
            NodeKind::Group => write!(f, "group"),
        }
    }
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Rule(rule) => &rule.id,
            Node::Group(group) => &group.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Rule(_) => NodeKind::Rule,
            Node::Group(_) => NodeKind::Group,
        }
    }

    pub fn as_rule(&self) -> Option<&Rule> {
        match self {
            Node::Rule(rule) => Some(rule),
            Node::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Rule(_) => None,
            Node::Group(group) => Some(group),
        }
    }

    /// True when both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Rule(a), Node::Rule(b)) => Arc::ptr_eq(a, b),
            (Node::Group(a), Node::Group(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Rule> for Node {
    fn from(rule: Rule) -> Self {
        Node::Rule(Arc::new(rule))
    }
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Node::Group(Arc::new(group))
    }
}

/// One generation of the query tree. The root is always a group.
///
/// A `Query` is an immutable value: edits produce a new `Query` that shares
/// every subtree off the edited path with this one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Query {
    root: Arc<Group>,
}

impl Query {
    pub fn new(root: Group) -> Self {
        Query {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root.id
    }

    /// True when `other` is the very same generation, not merely equal.
    pub fn ptr_eq(&self, other: &Query) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    /// Whether any node, root included, carries `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.root.id == *id || walk::find(&self.root, id).is_some()
    }

    /// Number of nodes including the root.
    pub fn node_count(&self) -> usize {
        1 + walk::count(&self.root)
    }

    /// Every id in the tree, root first, depth-first in child order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.root.id.clone()];
        walk::collect_ids(&self.root, &mut ids);
        ids
    }

    /// Plain-data form: `{id, combinator, rules: [...]}` with rules as
    /// `{id, field, operator, value}`.
    pub fn to_value(&self) -> Result<Value, QbError> {
        serde_json::to_value(self).map_err(|e| QbError::Serialize(e.to_string()))
    }
}

impl From<Group> for Query {
    fn from(root: Group) -> Self {
        Query::new(root)
    }
}
