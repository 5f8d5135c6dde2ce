//! Nested boolean query trees: a root group of rules and sub-groups joined
//! by combinators, with read-only introspection ([`schema`]) and persistent,
//! structurally shared edits ([`editor`]).

pub mod builder;
pub mod catalog;
pub mod editor;
pub mod error;
pub mod format;
pub mod output;
pub mod parser;
pub mod schema;
pub mod tracing_init;
pub mod tree;

pub use builder::QueryBuilder;
pub use catalog::{Catalog, CombinatorDefinition, FieldDefinition, OperatorDefinition};
pub use editor::{Added, Edit, RulePatch, TreeEditor};
pub use error::QbError;
pub use schema::Schema;
pub use tree::{Group, Node, NodeId, Query, Rule};
