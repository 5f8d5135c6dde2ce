use crate::catalog::{Catalog, CombinatorDefinition, FieldDefinition, OperatorDefinition};
use crate::error::QbError;
use crate::tree::{walk, Group, Node, NodeId, Query, Rule};

/// Read-only view over one query generation and its catalog.
///
/// Holds no tree of its own; build a new `Schema` for each generation.
#[derive(Debug, Clone, Copy)]
pub struct Schema<'a> {
    query: &'a Query,
    catalog: &'a Catalog,
}

impl<'a> Schema<'a> {
    pub fn new(query: &'a Query, catalog: &'a Catalog) -> Self {
        Schema { query, catalog }
    }

    pub fn query(&self) -> &'a Query {
        self.query
    }

    /// Nesting depth of `id`: the root's children are level 0 and each
    /// enclosing group below the root adds one. `None` for unknown ids and
    /// for the root itself, which has no level.
    pub fn level(&self, id: &str) -> Option<usize> {
        walk::find(self.query.root(), id).map(|hit| hit.level)
    }

    /// [`Schema::level`] with `-1` standing in for "no level".
    pub fn get_level(&self, id: &str) -> i64 {
        self.level(id).map_or(-1, |level| level as i64)
    }

    pub fn is_rule_group(&self, id: &str) -> bool {
        self.find_group(id).is_some()
    }

    pub fn is_rule(&self, id: &str) -> bool {
        self.find_rule(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.query.contains(id)
    }

    /// Parent of `id`: `None` for the root, [`QbError::NotFound`] when no
    /// node carries `id`.
    pub fn get_parent_id(&self, id: &str) -> Result<Option<&'a NodeId>, QbError> {
        let root = self.query.root();
        if root.id == *id {
            return Ok(None);
        }
        walk::find(root, id)
            .map(|hit| Some(&hit.parent.id))
            .ok_or_else(|| QbError::NotFound(id.to_string()))
    }

    pub fn find_rule(&self, id: &str) -> Option<&'a Rule> {
        walk::find(self.query.root(), id).and_then(|hit| hit.node.as_rule())
    }

    /// Group with `id`, the root included.
    pub fn find_group(&self, id: &str) -> Option<&'a Group> {
        let root = self.query.root();
        if root.id == *id {
            return Some(root);
        }
        walk::find(root, id).and_then(|hit| hit.node.as_group())
    }

    pub fn find_node(&self, id: &str) -> Option<&'a Node> {
        walk::find(self.query.root(), id).map(|hit| hit.node)
    }

    pub fn node_count(&self) -> usize {
        self.query.node_count()
    }

    pub fn fields(&self) -> &'a [FieldDefinition] {
        self.catalog.fields()
    }

    pub fn combinators(&self) -> &'a [CombinatorDefinition] {
        self.catalog.combinators()
    }

    /// Catalog entry for `name`, extra data included.
    pub fn get_field_definition(&self, name: &str) -> Option<&'a FieldDefinition> {
        self.catalog.field(name)
    }

    pub fn get_operators(&self, field: &str) -> Result<Vec<OperatorDefinition>, QbError> {
        self.catalog.operators_for(field)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Map};

    use super::*;
    use crate::tree::fixtures::*;

    fn catalog() -> Catalog {
        Catalog::new().with_fields(vec![
            FieldDefinition::new("firstName", "First Name"),
            FieldDefinition::new("lastName", "Last Name"),
            FieldDefinition::new("age", "Age"),
        ])
    }

    #[test]
    fn levels() {
        let (q, c) = (nested(), catalog());
        let schema = Schema::new(&q, &c);
        assert_eq!(schema.get_level("222"), 0);
        assert_eq!(schema.get_level("333"), 0);
        assert_eq!(schema.get_level("444"), 0);
        assert_eq!(schema.get_level("555"), 1);
    }

    #[test]
    fn level_of_unknown_id() {
        let (q, c) = (nested(), catalog());
        let schema = Schema::new(&q, &c);
        assert_eq!(schema.get_level("546"), -1);
        assert_eq!(schema.level("546"), None);
    }

    #[test]
    fn root_has_no_level() {
        let (q, c) = (nested(), catalog());
        let schema = Schema::new(&q, &c);
        assert_eq!(schema.get_level("111"), -1);
        assert_eq!(schema.level("111"), None);
    }

    #[test]
    fn classification() {
        let (q, c) = (nested(), catalog());
        let schema = Schema::new(&q, &c);
        assert!(schema.is_rule("222"));
        assert!(!schema.is_rule_group("222"));
        assert!(schema.is_rule_group("444"));
        assert!(schema.is_rule_group("111"));
        assert!(!schema.is_rule("111"));
        assert!(!schema.is_rule("546"));
        assert!(!schema.is_rule_group("546"));
    }

    #[test]
    fn parents() {
        let (q, c) = (nested(), catalog());
        let schema = Schema::new(&q, &c);
        assert_eq!(schema.get_parent_id("111").unwrap(), None);
        assert_eq!(schema.get_parent_id("222").unwrap().map(NodeId::as_str), Some("111"));
        assert_eq!(schema.get_parent_id("555").unwrap().map(NodeId::as_str), Some("444"));
        assert!(matches!(schema.get_parent_id("546"), Err(QbError::NotFound(_))));
    }

    #[test]
    fn find_nodes() {
        let (q, c) = (nested(), catalog());
        let schema = Schema::new(&q, &c);
        assert_eq!(schema.find_rule("555").unwrap().field, "firstName");
        assert_eq!(schema.find_group("444").unwrap().rules.len(), 1);
        assert!(schema.find_rule("444").is_none());
        assert_eq!(schema.find_node("333").unwrap().id().as_str(), "333");
        assert_eq!(schema.node_count(), 5);
        assert!(schema.contains("111"));
    }

    #[test]
    fn field_definition_keeps_extra_identity() {
        let mut extra = Map::new();
        extra.insert("extra".into(), json!("Some extra data related to the chosen field."));
        let c = Catalog::new()
            .with_fields(vec![FieldDefinition::new("foo", "Foo Field").with_extra(extra)]);
        let q = nested();
        let schema = Schema::new(&q, &c);
        let def = schema.get_field_definition("foo").unwrap();
        assert!(Arc::ptr_eq(&def.extra, &c.fields()[0].extra));
        assert!(schema.get_field_definition("bar").is_none());
    }

    #[test]
    fn catalog_passthrough() {
        let (q, c) = (nested(), catalog());
        let schema = Schema::new(&q, &c);
        assert_eq!(schema.fields().len(), 3);
        assert_eq!(schema.combinators().len(), 2);
        assert_eq!(schema.get_operators("age").unwrap().len(), 10);
    }
}
