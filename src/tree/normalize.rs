//! Building a [`Query`] from externally supplied plain data.
//!
//! Groups are recognised by a `rules` or `combinator` key, rules by a `field`
//! key. Missing ids are generated, missing combinators, operators and values
//! are defaulted; shapes that cannot be repaired are rejected.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use super::ids::IdGenerator;
use super::{Group, Node, NodeId, NodeKind, Query, Rule};
use crate::catalog::Catalog;
use crate::error::QbError;

/// Empty root group with a fresh id and the default combinator.
pub fn empty(catalog: &Catalog, ids: &dyn IdGenerator) -> Query {
    Query::new(Group::new(ids.next_id(NodeKind::Group), catalog.default_combinator()))
}

/// Normalize `value` into a query. `null` yields [`empty`].
pub fn normalize(
    value: &Value,
    catalog: &Catalog,
    ids: &dyn IdGenerator,
) -> Result<Query, QbError> {
    if value.is_null() {
        return Ok(empty(catalog, ids));
    }
    let root = as_object(value)?;
    if !is_group_shape(root) {
        return Err(QbError::InvalidValue("query root must be a group".into()));
    }

    let mut taken = HashSet::new();
    reserve_ids(value, &mut taken)?;
    let supplied = taken.len();

    let mut builder = Normalizer {
        catalog,
        ids,
        taken,
    };
    let root = builder.group(root)?;
    debug!(
        supplied,
        generated = builder.taken.len() - supplied,
        "normalized query"
    );
    Ok(Query::new(root))
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, QbError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(QbError::InvalidValue(format!(
            "expected a rule or group object, got {other}"
        ))),
    }
}

fn is_group_shape(map: &Map<String, Value>) -> bool {
    map.contains_key("rules") || map.contains_key("combinator")
}

fn read_id(map: &Map<String, Value>) -> Result<Option<NodeId>, QbError> {
    match map.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(NodeId::new(s.clone()))),
        Some(Value::Number(n)) => Ok(Some(NodeId::new(n.to_string()))),
        Some(other) => Err(QbError::InvalidValue(format!("invalid id: {other}"))),
    }
}

// First pass: every supplied id, so generated ids can avoid them and
// duplicates are caught before anything is built.
fn reserve_ids(value: &Value, taken: &mut HashSet<NodeId>) -> Result<(), QbError> {
    let map = as_object(value)?;
    if let Some(id) = read_id(map)? {
        if !taken.insert(id.clone()) {
            return Err(QbError::InvalidValue(format!("duplicate id: {id}")));
        }
    }
    if let Some(Value::Array(children)) = map.get("rules") {
        for child in children {
            reserve_ids(child, taken)?;
        }
    }
    Ok(())
}

struct Normalizer<'a> {
    catalog: &'a Catalog,
    ids: &'a dyn IdGenerator,
    taken: HashSet<NodeId>,
}

impl Normalizer<'_> {
    fn id_for(&mut self, map: &Map<String, Value>, kind: NodeKind) -> Result<NodeId, QbError> {
        if let Some(id) = read_id(map)? {
            return Ok(id);
        }
        // A generator that never repeats itself needs at most len + 1 tries.
        for _ in 0..=self.taken.len() {
            let id = self.ids.next_id(kind);
            if self.taken.insert(id.clone()) {
                return Ok(id);
            }
        }
        Err(QbError::InvalidValue("id generator keeps returning ids already in use".into()))
    }

    fn node(&mut self, value: &Value) -> Result<Node, QbError> {
        let map = as_object(value)?;
        if is_group_shape(map) {
            Ok(self.group(map)?.into())
        } else if map.contains_key("field") {
            Ok(self.rule(map)?.into())
        } else {
            Err(QbError::InvalidValue(format!(
                "node is neither a rule nor a group: {value}"
            )))
        }
    }

    fn group(&mut self, map: &Map<String, Value>) -> Result<Group, QbError> {
        let id = self.id_for(map, NodeKind::Group)?;
        let combinator = match map.get("combinator") {
            None | Some(Value::Null) => self.catalog.default_combinator().to_string(),
            Some(Value::String(name)) if self.catalog.has_combinator(name) => name.clone(),
            Some(other) => {
                return Err(QbError::InvalidValue(format!("unknown combinator: {other}")));
            }
        };
        let rules = match map.get("rules") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(children)) => children
                .iter()
                .map(|child| self.node(child))
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(QbError::InvalidValue(format!(
                    "group {id}: `rules` must be a list, got {other}"
                )));
            }
        };
        Ok(Group {
            id,
            combinator,
            rules,
        })
    }

    fn rule(&mut self, map: &Map<String, Value>) -> Result<Rule, QbError> {
        let id = self.id_for(map, NodeKind::Rule)?;
        let field = match map.get("field") {
            Some(Value::String(field)) => field.clone(),
            other => {
                return Err(QbError::InvalidValue(format!(
                    "rule {id}: `field` must be a string, got {}",
                    other.unwrap_or(&Value::Null)
                )));
            }
        };
        let operator = match map.get("operator") {
            Some(Value::String(op)) => op.clone(),
            None | Some(Value::Null) => self.fallback_operator(&field),
            Some(other) => {
                return Err(QbError::InvalidValue(format!(
                    "rule {id}: `operator` must be a string, got {other}"
                )));
            }
        };
        let value = map
            .get("value")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
        Ok(Rule {
            id,
            field,
            operator,
            value,
        })
    }

    // Input rules may name fields the catalog does not know; they keep an
    // empty operator rather than failing the whole query.
    fn fallback_operator(&self, field: &str) -> String {
        self.catalog.default_operator(field).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::catalog::{FieldDefinition, OperatorDefinition};
    use crate::tree::ids::SequentialIds;

    fn catalog() -> Catalog {
        Catalog::new().with_fields(vec![
            FieldDefinition::new("firstName", "First Name"),
            FieldDefinition::new("lastName", "Last Name"),
            FieldDefinition::new("age", "Age"),
        ])
    }

    #[test]
    fn keeps_supplied_ids_and_values() {
        let input = json!({
            "combinator": "and",
            "id": "111",
            "rules": [{"id": "222", "field": "firstName", "value": "Test", "operator": "="}]
        });
        let q = normalize(&input, &catalog(), &SequentialIds::new()).unwrap();
        assert_eq!(q.to_value().unwrap(), input);
    }

    #[test]
    fn fills_missing_ids_and_defaults() {
        let input = json!({"rules": [{"field": "age"}, {"rules": []}]});
        let q = normalize(&input, &catalog(), &SequentialIds::new()).unwrap();
        assert_eq!(
            q.to_value().unwrap(),
            json!({
                "id": "g-1",
                "combinator": "and",
                "rules": [
                    {"id": "r-2", "field": "age", "operator": "null", "value": ""},
                    {"id": "g-3", "combinator": "and", "rules": []}
                ]
            })
        );
    }

    #[test]
    fn generated_ids_skip_supplied_ones() {
        let input = json!({"rules": [{"field": "age"}, {"id": "r-2", "field": "age"}]});
        let q = normalize(&input, &catalog(), &SequentialIds::new()).unwrap();
        let ids: Vec<String> = q.ids().iter().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["g-1", "r-3", "r-2"]);
    }

    #[test]
    fn numeric_ids_become_strings() {
        let input = json!({"id": 7, "rules": []});
        let q = normalize(&input, &catalog(), &SequentialIds::new()).unwrap();
        assert_eq!(q.root_id().as_str(), "7");
    }

    #[test]
    fn null_gives_empty_default() {
        let q = normalize(&Value::Null, &catalog(), &SequentialIds::new()).unwrap();
        assert!(q.root().rules.is_empty());
        assert_eq!(q.root().combinator, "and");
    }

    #[test]
    fn duplicate_ids_rejected() {
        let input = json!({
            "id": "1",
            "rules": [{"id": "2", "field": "age"}, {"id": "2", "field": "age"}]
        });
        assert!(matches!(
            normalize(&input, &catalog(), &SequentialIds::new()),
            Err(QbError::InvalidValue(_))
        ));
    }

    #[test]
    fn unrepairable_shapes_rejected() {
        let ids = SequentialIds::new();
        for bad in [
            json!({"rules": "nope"}),
            json!({"field": "age"}),
            json!({"rules": [{"label": "what am I"}]}),
            json!({"rules": [{"field": 3}]}),
            json!({"combinator": "xor", "rules": []}),
            json!({"rules": [42]}),
            json!("query"),
        ] {
            assert!(
                matches!(normalize(&bad, &catalog(), &ids), Err(QbError::InvalidValue(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn stuck_generator_fails() {
        struct Stuck;
        impl IdGenerator for Stuck {
            fn next_id(&self, _kind: NodeKind) -> NodeId {
                NodeId::from("same")
            }
        }
        let input = json!({"rules": [{"field": "age"}]});
        assert!(normalize(&input, &catalog(), &Stuck).is_err());
    }

    #[test]
    fn unknown_field_keeps_empty_operator_with_resolver() {
        let catalog = catalog().with_resolver(|_: &str, _: &FieldDefinition| {
            vec![OperatorDefinition::new("=", "=")]
        });
        let input = json!({"rules": [{"field": "ghost"}]});
        let q = normalize(&input, &catalog, &SequentialIds::new()).unwrap();
        assert_eq!(q.root().rules[0].as_rule().unwrap().operator, "");
    }
}
