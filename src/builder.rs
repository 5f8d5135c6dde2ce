//! Host-side controller: owns the current query generation, turns edit
//! intents into new generations and tells listeners about each one.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::catalog::Catalog;
use crate::editor::{Edit, TreeEditor};
use crate::error::QbError;
use crate::schema::Schema;
use crate::tree::ids::{IdGenerator, RandomIds};
use crate::tree::{normalize, NodeId, Query};

type Listener = Box<dyn FnMut(&Query) + Send>;

pub struct QueryBuilder {
    catalog: Arc<Catalog>,
    editor: TreeEditor,
    query: Query,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("query", &self.query)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl QueryBuilder {
    /// Builder over the empty default query.
    pub fn new(catalog: Catalog) -> Self {
        Self::with_ids(catalog, Arc::new(RandomIds))
    }

    pub fn with_ids(catalog: Catalog, ids: Arc<dyn IdGenerator>) -> Self {
        let query = normalize::empty(&catalog, &*ids);
        Self::assemble(catalog, ids, query)
    }

    /// Builder over an initial query in plain-data form.
    pub fn from_value(
        catalog: Catalog,
        initial: &Value,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, QbError> {
        let query = normalize::normalize(initial, &catalog, &*ids)?;
        Ok(Self::assemble(catalog, ids, query))
    }

    fn assemble(catalog: Catalog, ids: Arc<dyn IdGenerator>, query: Query) -> Self {
        let catalog = Arc::new(catalog);
        QueryBuilder {
            editor: TreeEditor::with_ids(Arc::clone(&catalog), ids),
            catalog,
            query,
            listeners: Vec::new(),
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn schema(&self) -> Schema<'_> {
        Schema::new(&self.query, &self.catalog)
    }

    pub fn editor(&self) -> &TreeEditor {
        &self.editor
    }

    /// Register a change listener. It is called right away with the current
    /// query, then after every successful edit.
    pub fn on_change(&mut self, mut listener: impl FnMut(&Query) + Send + 'static) {
        listener(&self.query);
        self.listeners.push(Box::new(listener));
    }

    /// Apply one edit. On success the new generation replaces the current one
    /// and listeners are notified; on failure nothing changes.
    pub fn dispatch(&mut self, edit: &Edit) -> Result<Option<NodeId>, QbError> {
        let (next, created) = self.editor.apply(&self.query, edit)?;
        debug!(?edit, nodes = next.node_count(), "query changed");
        self.query = next;
        for listener in &mut self.listeners {
            listener(&self.query);
        }
        Ok(created)
    }

    pub fn add_rule(&mut self, parent: &str) -> Result<NodeId, QbError> {
        let id = self.dispatch(&Edit::AddRule {
            parent: parent.into(),
        })?;
        id.ok_or_else(|| QbError::NotFound(parent.to_string()))
    }

    pub fn add_group(&mut self, parent: &str) -> Result<NodeId, QbError> {
        let id = self.dispatch(&Edit::AddGroup {
            parent: parent.into(),
        })?;
        id.ok_or_else(|| QbError::NotFound(parent.to_string()))
    }

    pub fn remove(&mut self, id: &str) -> Result<(), QbError> {
        self.dispatch(&Edit::Remove { id: id.into() }).map(|_| ())
    }

    pub fn update_combinator(&mut self, id: &str, combinator: &str) -> Result<(), QbError> {
        self.dispatch(&Edit::UpdateCombinator {
            id: id.into(),
            combinator: combinator.to_string(),
        })
        .map(|_| ())
    }
}
