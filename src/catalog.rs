//! Fields, operators and combinators offered to leaf rules and groups.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QbError;

/// A field a rule can test. Everything besides `name` and `label` is opaque
/// extra data, kept behind an `Arc` so operator resolvers always see the
/// registered payload itself rather than a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    pub extra: Arc<Map<String, Value>>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        FieldDefinition {
            name: name.into(),
            label: label.into(),
            extra: Arc::new(Map::new()),
        }
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = Arc::new(extra);
        self
    }

    /// Build from `{name, label?, ...extra}`. A missing label falls back to
    /// the name.
    pub fn from_value(value: &Value) -> Result<Self, QbError> {
        let Value::Object(map) = value else {
            return Err(QbError::InvalidValue(format!(
                "field definition must be an object, got {value}"
            )));
        };
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| QbError::InvalidValue("field definition without a name".into()))?
            .to_string();
        let label = map
            .get("label")
            .and_then(Value::as_str)
            .map_or_else(|| name.clone(), str::to_string);
        let extra: Map<String, Value> = map
            .iter()
            .filter(|(k, _)| k.as_str() != "name" && k.as_str() != "label")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(FieldDefinition::new(name, label).with_extra(extra))
    }

    pub fn to_value(&self) -> Value {
        let mut map = (*self.extra).clone();
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("label".into(), Value::String(self.label.clone()));
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDefinition {
    pub name: String,
    pub label: String,
}

impl OperatorDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        OperatorDefinition {
            name: name.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinatorDefinition {
    pub name: String,
    pub label: String,
}

impl CombinatorDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        CombinatorDefinition {
            name: name.into(),
            label: label.into(),
        }
    }
}

pub fn default_operators() -> Vec<OperatorDefinition> {
    vec![
        OperatorDefinition::new("null", "Is Null"),
        OperatorDefinition::new("notNull", "Is Not Null"),
        OperatorDefinition::new("in", "In"),
        OperatorDefinition::new("notIn", "Not In"),
        OperatorDefinition::new("=", "="),
        OperatorDefinition::new("!=", "!="),
        OperatorDefinition::new("<", "<"),
        OperatorDefinition::new(">", ">"),
        OperatorDefinition::new("<=", "<="),
        OperatorDefinition::new(">=", ">="),
    ]
}

pub fn default_combinators() -> Vec<CombinatorDefinition> {
    vec![
        CombinatorDefinition::new("and", "AND"),
        CombinatorDefinition::new("or", "OR"),
    ]
}

/// Per-field operator lookup supplied by the host.
///
/// Receives the catalog's own [`FieldDefinition`] for the field, extra data
/// included.
pub trait OperatorResolver: Send + Sync {
    fn operators(&self, field: &str, definition: &FieldDefinition) -> Vec<OperatorDefinition>;
}

impl<F> OperatorResolver for F
where
    F: Fn(&str, &FieldDefinition) -> Vec<OperatorDefinition> + Send + Sync,
{
    fn operators(&self, field: &str, definition: &FieldDefinition) -> Vec<OperatorDefinition> {
        self(field, definition)
    }
}

/// Resolver serving the `operators` list found in each field's extra data,
/// falling back to a static list for fields without one.
#[derive(Debug, Clone)]
pub struct FieldOperators {
    per_field: HashMap<String, Vec<OperatorDefinition>>,
    fallback: Vec<OperatorDefinition>,
}

impl FieldOperators {
    /// Parse every field's `operators` entry up front; a malformed list fails
    /// here instead of being ignored at lookup time.
    pub fn from_fields(
        fields: &[FieldDefinition],
        fallback: Vec<OperatorDefinition>,
    ) -> Result<Self, QbError> {
        let mut per_field = HashMap::new();
        for field in fields {
            if let Some(list) = field.extra.get("operators") {
                let operators = serde_json::from_value(list.clone()).map_err(|e| {
                    QbError::InvalidValue(format!("field {}: operators: {e}", field.name))
                })?;
                per_field.insert(field.name.clone(), operators);
            }
        }
        Ok(FieldOperators {
            per_field,
            fallback,
        })
    }
}

impl OperatorResolver for FieldOperators {
    fn operators(&self, field: &str, _definition: &FieldDefinition) -> Vec<OperatorDefinition> {
        self.per_field
            .get(field)
            .unwrap_or(&self.fallback)
            .clone()
    }
}

/// Everything a rendering layer or editor needs to know beyond the tree.
#[derive(Clone)]
pub struct Catalog {
    fields: Vec<FieldDefinition>,
    operators: Vec<OperatorDefinition>,
    resolver: Option<Arc<dyn OperatorResolver>>,
    combinators: Vec<CombinatorDefinition>,
    default_field: Option<String>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("fields", &self.fields)
            .field("operators", &self.operators)
            .field("resolver", &self.resolver.as_ref().map(|_| "<dyn OperatorResolver>"))
            .field("combinators", &self.combinators)
            .field("default_field", &self.default_field)
            .finish()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog {
            fields: Vec::new(),
            operators: default_operators(),
            resolver: None,
            combinators: default_combinators(),
            default_field: None,
        }
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(mut self, fields: Vec<FieldDefinition>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_operators(mut self, operators: Vec<OperatorDefinition>) -> Self {
        self.operators = operators;
        self
    }

    /// Install a dynamic resolver. It takes precedence over the static list.
    pub fn with_resolver(mut self, resolver: impl OperatorResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_combinators(
        mut self,
        combinators: Vec<CombinatorDefinition>,
    ) -> Result<Self, QbError> {
        if combinators.is_empty() {
            return Err(QbError::InvalidValue("combinator list must not be empty".into()));
        }
        self.combinators = combinators;
        Ok(self)
    }

    pub fn with_default_field(mut self, name: impl Into<String>) -> Self {
        self.default_field = Some(name.into());
        self
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn combinators(&self) -> &[CombinatorDefinition] {
        &self.combinators
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_combinator(&self, name: &str) -> bool {
        self.combinators.iter().any(|c| c.name == name)
    }

    /// First configured combinator.
    pub fn default_combinator(&self) -> &str {
        self.combinators.first().map_or("and", |c| c.name.as_str())
    }

    /// Field given to new rules: the configured default, else the first field.
    pub fn default_field(&self) -> Result<&str, QbError> {
        self.default_field
            .as_deref()
            .or_else(|| self.fields.first().map(|f| f.name.as_str()))
            .ok_or_else(|| QbError::InvalidValue("field catalog is empty".into()))
    }

    /// Operators applicable to `field`.
    ///
    /// With a resolver installed the field must exist in the catalog; the
    /// static list applies to every field.
    pub fn operators_for(&self, field: &str) -> Result<Vec<OperatorDefinition>, QbError> {
        match &self.resolver {
            Some(resolver) => {
                let definition = self
                    .field(field)
                    .ok_or_else(|| QbError::InvalidValue(format!("unknown field: {field}")))?;
                Ok(resolver.operators(field, definition))
            }
            None => Ok(self.operators.clone()),
        }
    }

    /// First applicable operator name, or empty when none apply.
    pub fn default_operator(&self, field: &str) -> Result<String, QbError> {
        Ok(self
            .operators_for(field)?
            .into_iter()
            .next()
            .map(|op| op.name)
            .unwrap_or_default())
    }

    /// Load from `{fields, operators?, combinators?, default_field?}`.
    ///
    /// Fields carrying their own `operators` list get them through
    /// [`FieldOperators`].
    pub fn from_value(value: &Value) -> Result<Self, QbError> {
        let Value::Object(map) = value else {
            return Err(QbError::InvalidValue("catalog must be an object".into()));
        };

        let mut catalog = Catalog::new();
        if let Some(fields) = map.get("fields") {
            let Value::Array(items) = fields else {
                return Err(QbError::InvalidValue("`fields` must be a list".into()));
            };
            catalog.fields = items
                .iter()
                .map(FieldDefinition::from_value)
                .collect::<Result<_, _>>()?;
        }
        if let Some(operators) = map.get("operators") {
            catalog.operators = serde_json::from_value(operators.clone())
                .map_err(|e| QbError::InvalidValue(format!("operators: {e}")))?;
        }
        if let Some(combinators) = map.get("combinators") {
            let combinators = serde_json::from_value(combinators.clone())
                .map_err(|e| QbError::InvalidValue(format!("combinators: {e}")))?;
            catalog = catalog.with_combinators(combinators)?;
        }
        if let Some(name) = map.get("default_field") {
            let name = name
                .as_str()
                .ok_or_else(|| QbError::InvalidValue("`default_field` must be a string".into()))?;
            catalog.default_field = Some(name.to_string());
        }
        if catalog.fields.iter().any(|f| f.extra.contains_key("operators")) {
            let resolver = FieldOperators::from_fields(&catalog.fields, catalog.operators.clone())?;
            catalog = catalog.with_resolver(resolver);
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn names(ops: &[OperatorDefinition]) -> Vec<&str> {
        ops.iter().map(|op| op.name.as_str()).collect()
    }

    #[test]
    fn defaults() {
        let catalog = Catalog::new();
        assert_eq!(catalog.combinators().len(), 2);
        assert_eq!(catalog.default_combinator(), "and");
        let ops = catalog.operators_for("anything").unwrap();
        assert_eq!(ops.len(), 10);
        assert_eq!(ops[0].label, "Is Null");
        assert!(catalog.default_field().is_err());
    }

    #[test]
    fn static_operators_replace_defaults() {
        let catalog = Catalog::new().with_operators(vec![
            OperatorDefinition::new("null", "Custom Is Null"),
            OperatorDefinition::new("notNull", "Is Not Null"),
            OperatorDefinition::new("in", "In"),
            OperatorDefinition::new("notIn", "Not In"),
        ]);
        let ops = catalog.operators_for("firstName").unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0].label, "Custom Is Null");
    }

    #[test]
    fn resolver_takes_precedence() {
        let catalog = Catalog::new()
            .with_fields(vec![FieldDefinition::new("age", "Age")])
            .with_resolver(|_: &str, _: &FieldDefinition| vec![OperatorDefinition::new(">", ">")]);
        assert_eq!(names(&catalog.operators_for("age").unwrap()), vec![">"]);
        assert_eq!(catalog.default_operator("age").unwrap(), ">");
    }

    #[test]
    fn resolver_rejects_unknown_field() {
        let catalog = Catalog::new()
            .with_resolver(|_: &str, _: &FieldDefinition| -> Vec<OperatorDefinition> {
                Vec::new()
            });
        assert!(matches!(catalog.operators_for("ghost"), Err(QbError::InvalidValue(_))));
    }

    #[test]
    fn empty_resolver_result_gives_empty_default_operator() {
        let catalog = Catalog::new()
            .with_fields(vec![FieldDefinition::new("foo", "Foo")])
            .with_resolver(|_: &str, _: &FieldDefinition| -> Vec<OperatorDefinition> {
                Vec::new()
            });
        assert_eq!(catalog.default_operator("foo").unwrap(), "");
    }

    #[test]
    fn resolver_sees_registered_extra_by_identity() {
        let mut foo_extra = Map::new();
        foo_extra.insert("foo".into(), json!("foo"));
        let mut bar_extra = Map::new();
        bar_extra.insert("bar".into(), json!("bar"));

        let foo = FieldDefinition::new("foo", "Foo Field").with_extra(foo_extra);
        let bar = FieldDefinition::new("bar", "Bar Field").with_extra(bar_extra);
        let (foo_ptr, bar_ptr) = (Arc::clone(&foo.extra), Arc::clone(&bar.extra));

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let catalog = Catalog::new()
            .with_fields(vec![foo, bar])
            .with_resolver(move |field: &str, def: &FieldDefinition| -> Vec<OperatorDefinition> {
                match field {
                    "foo" => assert!(Arc::ptr_eq(&def.extra, &foo_ptr)),
                    "bar" => assert!(Arc::ptr_eq(&def.extra, &bar_ptr)),
                    other => panic!("unknown field selected: {other}"),
                }
                seen.fetch_add(1, Ordering::SeqCst);
                Vec::new()
            });

        // a cloned catalog still hands out the same payloads
        let cloned = catalog.clone();
        cloned.operators_for("foo").unwrap();
        catalog.operators_for("bar").unwrap();
        catalog.operators_for("foo").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn field_from_value_splits_extra() {
        let def =
            FieldDefinition::from_value(&json!({"name": "foo", "label": "Foo", "kind": "text"}))
                .unwrap();
        assert_eq!(def.name, "foo");
        assert_eq!(def.label, "Foo");
        assert_eq!(def.extra.get("kind"), Some(&json!("text")));
        assert!(!def.extra.contains_key("name"));
        assert_eq!(def.to_value(), json!({"name": "foo", "label": "Foo", "kind": "text"}));
    }

    #[test]
    fn field_label_defaults_to_name() {
        let def = FieldDefinition::from_value(&json!({"name": "age"})).unwrap();
        assert_eq!(def.label, "age");
        assert!(FieldDefinition::from_value(&json!({"label": "x"})).is_err());
    }

    #[test]
    fn load_from_value() {
        let catalog = Catalog::from_value(&json!({
            "fields": [{"name": "firstName", "label": "First Name"}, {"name": "age"}],
            "operators": [{"name": "=", "label": "equals"}],
            "combinators": [{"name": "or", "label": "OR"}, {"name": "and", "label": "AND"}],
            "default_field": "age"
        }))
        .unwrap();
        assert_eq!(catalog.fields().len(), 2);
        assert_eq!(catalog.default_field().unwrap(), "age");
        assert_eq!(catalog.default_combinator(), "or");
        assert_eq!(names(&catalog.operators_for("age").unwrap()), vec!["="]);
    }

    #[test]
    fn per_field_operators_from_config() {
        let catalog = Catalog::from_value(&json!({
            "fields": [
                {"name": "age", "operators": [{"name": ">", "label": "greater"}]},
                {"name": "name"}
            ],
            "operators": [{"name": "=", "label": "="}]
        }))
        .unwrap();
        assert_eq!(names(&catalog.operators_for("age").unwrap()), vec![">"]);
        assert_eq!(names(&catalog.operators_for("name").unwrap()), vec!["="]);
    }

    #[test]
    fn malformed_field_operators_rejected() {
        let err = Catalog::from_value(&json!({
            "fields": [{"name": "age", "operators": "greater-than"}]
        }))
        .unwrap_err();
        match err {
            QbError::InvalidValue(msg) => {
                assert!(msg.starts_with("field age: operators:"), "{msg}")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Catalog::from_value(&json!({
            "fields": [{"name": "age", "operators": [{"name": ">"}]}]
        }))
        .is_err());
    }

    #[test]
    fn empty_combinators_rejected() {
        assert!(Catalog::new().with_combinators(Vec::new()).is_err());
        assert!(Catalog::from_value(&json!({"combinators": []})).is_err());
        assert!(Catalog::from_value(&json!({"fields": "nope"})).is_err());
    }
}
