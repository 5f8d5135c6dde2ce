//! Persistent edits over a [`Query`].
//!
//! Every edit locates its target with a single depth-first descent, validates
//! the request, then rebuilds only the groups on the root-to-target path.
//! The input query is never modified and all other subtrees are shared with
//! the result.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::error::QbError;
use crate::tree::ids::{IdGenerator, RandomIds};
use crate::tree::{walk, Group, Node, NodeId, NodeKind, Query, Rule};

/// Partial update of a rule. Unset parts are left alone, except that a new
/// `field` resets `operator` and `value` to the field's defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RulePatch {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl RulePatch {
    pub fn field(name: impl Into<String>) -> Self {
        RulePatch {
            field: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn operator(name: impl Into<String>) -> Self {
        RulePatch {
            operator: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn value(value: Value) -> Self {
        RulePatch {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn with_operator(mut self, name: impl Into<String>) -> Self {
        self.operator = Some(name.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// An edit intent raised by a rendering layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    AddRule {
        parent: NodeId,
    },
    AddGroup {
        parent: NodeId,
    },
    Remove {
        id: NodeId,
    },
    UpdateRule {
        id: NodeId,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        operator: Option<String>,
        #[serde(default)]
        value: Option<Value>,
    },
    UpdateCombinator {
        id: NodeId,
        combinator: String,
    },
}

/// Result of adding a node: the new generation and the new node's id.
#[derive(Debug, Clone)]
pub struct Added {
    pub query: Query,
    pub id: NodeId,
}

pub struct TreeEditor {
    catalog: Arc<Catalog>,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for TreeEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeEditor")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl TreeEditor {
    /// Editor with random uuid-based ids.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_ids(catalog, Arc::new(RandomIds))
    }

    pub fn with_ids(catalog: Arc<Catalog>, ids: Arc<dyn IdGenerator>) -> Self {
        TreeEditor { catalog, ids }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        &*self.ids
    }

    /// Detached rule with a fresh id, the default field, its first operator
    /// and an empty value.
    pub fn create_rule(&self) -> Result<Rule, QbError> {
        let field = self.catalog.default_field()?.to_string();
        let operator = self.catalog.default_operator(&field)?;
        Ok(Rule {
            id: self.ids.next_id(NodeKind::Rule),
            field,
            operator,
            value: Value::String(String::new()),
        })
    }

    /// Detached empty group with a fresh id and the default combinator.
    pub fn create_group(&self) -> Group {
        Group::new(self.ids.next_id(NodeKind::Group), self.catalog.default_combinator())
    }

    pub fn add_rule(&self, query: &Query, parent: &str) -> Result<Added, QbError> {
        self.check_group(query, parent)?;
        let mut rule = self.create_rule()?;
        rule.id = self.fresh_id(query, rule.id, NodeKind::Rule)?;
        self.append(query, parent, rule.into())
    }

    pub fn add_group(&self, query: &Query, parent: &str) -> Result<Added, QbError> {
        self.check_group(query, parent)?;
        let mut group = self.create_group();
        group.id = self.fresh_id(query, group.id, NodeKind::Group)?;
        self.append(query, parent, group.into())
    }

    /// Drop the node with `id` and its whole subtree.
    pub fn remove(&self, query: &Query, id: &str) -> Result<Query, QbError> {
        let root = query.root();
        if root.id == *id {
            return Err(QbError::invalid_target(id, "the root group cannot be removed"));
        }
        let path = walk::path_to(root, id).ok_or_else(|| QbError::NotFound(id.to_string()))?;
        debug!(id, depth = path.len(), "removing node");
        Ok(Query::new(walk::rebuild(root, &path, |_| None)))
    }

    pub fn update_rule(
        &self,
        query: &Query,
        id: &str,
        patch: &RulePatch,
    ) -> Result<Query, QbError> {
        let root = query.root();
        if root.id == *id {
            return Err(QbError::invalid_target(id, "the root is a group, not a rule"));
        }
        let path = walk::path_to(root, id).ok_or_else(|| QbError::NotFound(id.to_string()))?;
        let current = match walk::node_at(root, &path) {
            Some(Node::Rule(rule)) => rule,
            Some(Node::Group(_)) => {
                return Err(QbError::invalid_target(id, "expected a rule, found a group"));
            }
            None => return Err(QbError::NotFound(id.to_string())),
        };

        let updated = self.patched(current, patch)?;
        debug!(id, field = %updated.field, operator = %updated.operator, "updating rule");
        Ok(Query::new(walk::rebuild(root, &path, |_| Some(updated.into()))))
    }

    pub fn update_combinator(
        &self,
        query: &Query,
        id: &str,
        combinator: &str,
    ) -> Result<Query, QbError> {
        if !self.catalog.has_combinator(combinator) {
            return Err(QbError::InvalidValue(format!("unknown combinator: {combinator}")));
        }
        debug!(id, combinator, "changing combinator");
        self.edit_group(query, id, |group| Group {
            id: group.id.clone(),
            combinator: combinator.to_string(),
            rules: group.rules.clone(),
        })
    }

    /// Apply an [`Edit`]. Adds report the new node's id.
    pub fn apply(&self, query: &Query, edit: &Edit) -> Result<(Query, Option<NodeId>), QbError> {
        match edit {
            Edit::AddRule { parent } => {
                let added = self.add_rule(query, parent.as_str())?;
                Ok((added.query, Some(added.id)))
            }
            Edit::AddGroup { parent } => {
                let added = self.add_group(query, parent.as_str())?;
                Ok((added.query, Some(added.id)))
            }
            Edit::Remove { id } => Ok((self.remove(query, id.as_str())?, None)),
            Edit::UpdateRule {
                id,
                field,
                operator,
                value,
            } => {
                let patch = RulePatch {
                    field: field.clone(),
                    operator: operator.clone(),
                    value: value.clone(),
                };
                Ok((self.update_rule(query, id.as_str(), &patch)?, None))
            }
            Edit::UpdateCombinator { id, combinator } => {
                Ok((self.update_combinator(query, id.as_str(), combinator)?, None))
            }
        }
    }

    fn patched(&self, current: &Rule, patch: &RulePatch) -> Result<Rule, QbError> {
        let mut rule = current.clone();
        if let Some(field) = &patch.field {
            if self.catalog.field(field).is_none() {
                return Err(QbError::InvalidValue(format!("unknown field: {field}")));
            }
            if *field != current.field {
                rule.operator = self.catalog.default_operator(field)?;
                rule.value = Value::String(String::new());
                rule.field = field.clone();
            }
        }
        if let Some(operator) = &patch.operator {
            rule.operator = operator.clone();
        }
        if let Some(value) = &patch.value {
            rule.value = value.clone();
        }
        Ok(rule)
    }

    fn check_group(&self, query: &Query, id: &str) -> Result<(), QbError> {
        let root = query.root();
        if root.id == *id {
            return Ok(());
        }
        match walk::find(root, id) {
            Some(hit) if hit.node.as_group().is_some() => Ok(()),
            Some(_) => Err(QbError::invalid_target(id, "expected a group, found a rule")),
            None => Err(QbError::NotFound(id.to_string())),
        }
    }

    // Keeps `candidate` unless the tree already uses it; a generator that
    // never repeats itself needs at most node_count + 1 tries.
    fn fresh_id(
        &self,
        query: &Query,
        candidate: NodeId,
        kind: NodeKind,
    ) -> Result<NodeId, QbError> {
        let mut id = candidate;
        for _ in 0..=query.node_count() {
            if !query.contains(id.as_str()) {
                return Ok(id);
            }
            trace!(%id, "generated id already in use");
            id = self.ids.next_id(kind);
        }
        Err(QbError::InvalidValue("id generator keeps returning ids already in use".into()))
    }

    fn append(&self, query: &Query, parent: &str, child: Node) -> Result<Added, QbError> {
        let id = child.id().clone();
        debug!(parent, %id, kind = %child.kind(), "appending node");
        let query = self.edit_group(query, parent, move |group| {
            let mut rules = group.rules.clone();
            rules.push(child);
            group.with_rules(rules)
        })?;
        Ok(Added { query, id })
    }

    fn edit_group<F>(&self, query: &Query, id: &str, edit: F) -> Result<Query, QbError>
    where
        F: FnOnce(&Group) -> Group,
    {
        let root = query.root();
        if root.id == *id {
            return Ok(Query::new(edit(root)));
        }
        let path = walk::path_to(root, id).ok_or_else(|| QbError::NotFound(id.to_string()))?;
        let group = match walk::node_at(root, &path) {
            Some(Node::Group(group)) => &**group,
            Some(Node::Rule(_)) => {
                return Err(QbError::invalid_target(id, "expected a group, found a rule"));
            }
            None => return Err(QbError::NotFound(id.to_string())),
        };
        let replacement = Node::from(edit(group));
        Ok(Query::new(walk::rebuild(root, &path, |_| Some(replacement))))
    }
}
