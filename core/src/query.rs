//! Projection-aware query execution.
//!
//! A [`Query`] describes a store operation. Wrapping it in a [`ProjectionQuery`] and
//! tagging it with [`ProjectionQuery::projection`] asks the [`QueryInterceptor`] to return
//! projected records instead of raw documents. Tagging never changes the query's filter,
//! sort or limit.
//!
//! | operation | untagged | tagged |
//! |-----------|----------|--------|
//! | `Find` | raw documents | one record per document, input order |
//! | `FindOne` | raw document | one record (`{}` when nothing matched) |
//! | `Count`, `Update`, `Delete` | raw output | raw output (tag ignored) |
//!
//! # Example
//!
//! ```ignore
//! let interceptor = QueryInterceptor::new(store, projector);
//!
//! let query = ProjectionQuery::new(Query::find("user").filter("status", json!("active")))
//!     .projection("list", Some(caller));
//!
//! let QueryOutcome::Records(records) = interceptor.exec(&query).await? else {
//!     unreachable!()
//! };
//! ```

use crate::context::Caller;
use crate::document::Document;
use crate::error::{ProjectionError, Result};
use crate::projector::DocumentProjector;
use crate::record::ProjectedRecord;
use crate::store::DocumentStore;
use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Kind of store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOp {
    /// Multi-document read
    Find,
    /// Single-document read
    FindOne,
    /// Count matching documents
    Count,
    /// Update matching documents
    Update,
    /// Delete matching documents
    Delete,
}

impl QueryOp {
    /// Whether projection applies to this operation.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Find | Self::FindOne)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// A store operation with equality filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    model: String,
    op: QueryOp,
    filter: Map<String, Value>,
    sort: Vec<(String, SortOrder)>,
    limit: Option<usize>,
    changes: Map<String, Value>,
}

impl Query {
    fn new(model: impl Into<String>, op: QueryOp) -> Self {
        Self {
            model: model.into(),
            op,
            filter: Map::new(),
            sort: Vec::new(),
            limit: None,
            changes: Map::new(),
        }
    }

    /// Multi-document read.
    #[must_use]
    pub fn find(model: impl Into<String>) -> Self {
        Self::new(model, QueryOp::Find)
    }

    /// Single-document read.
    #[must_use]
    pub fn find_one(model: impl Into<String>) -> Self {
        Self::new(model, QueryOp::FindOne)
    }

    /// Count of matching documents.
    #[must_use]
    pub fn count(model: impl Into<String>) -> Self {
        Self::new(model, QueryOp::Count)
    }

    /// Update of matching documents with the given attribute changes.
    #[must_use]
    pub fn update(model: impl Into<String>, changes: Map<String, Value>) -> Self {
        let mut query = Self::new(model, QueryOp::Update);
        query.changes = changes;
        query
    }

    /// Delete of matching documents.
    #[must_use]
    pub fn delete(model: impl Into<String>) -> Self {
        Self::new(model, QueryOp::Delete)
    }

    /// Require `path` to equal `value`.
    #[must_use]
    pub fn filter(mut self, path: impl Into<String>, value: Value) -> Self {
        self.filter.insert(path.into(), value);
        self
    }

    /// Add a sort key.
    #[must_use]
    pub fn sort_by(mut self, path: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((path.into(), order));
        self
    }

    /// Limit the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Target model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Operation kind.
    #[must_use]
    pub const fn op(&self) -> QueryOp {
        self.op
    }

    /// Equality filters.
    #[must_use]
    pub const fn filters(&self) -> &Map<String, Value> {
        &self.filter
    }

    /// Sort keys in priority order.
    #[must_use]
    pub fn sort_keys(&self) -> &[(String, SortOrder)] {
        &self.sort
    }

    /// Result limit.
    #[must_use]
    pub const fn result_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Attribute changes of an update.
    #[must_use]
    pub const fn changes(&self) -> &Map<String, Value> {
        &self.changes
    }
}

/// Raw output of a store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput<D> {
    /// Documents of a `Find`
    Many(Vec<D>),
    /// Document of a `FindOne`
    One(Option<D>),
    /// Result of a `Count`
    Count(u64),
    /// Number of documents touched by an `Update` or `Delete`
    Affected(u64),
}

/// Projection requested for a query.
#[derive(Clone)]
pub struct ProjectionTag {
    view: String,
    caller: Option<Arc<dyn Caller>>,
}

impl ProjectionTag {
    /// View name.
    #[must_use]
    pub fn view(&self) -> &str {
        &self.view
    }

    /// Requesting caller.
    #[must_use]
    pub fn caller(&self) -> Option<&dyn Caller> {
        self.caller.as_deref()
    }
}

impl fmt::Debug for ProjectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionTag")
            .field("view", &self.view)
            .field("caller", &self.caller.as_ref().map(|caller| caller.user_id()))
            .finish()
    }
}

/// A query that may carry a projection tag.
#[derive(Debug, Clone)]
pub struct ProjectionQuery {
    query: Query,
    tag: Option<ProjectionTag>,
}

impl ProjectionQuery {
    /// Wrap an untagged query.
    #[must_use]
    pub const fn new(query: Query) -> Self {
        Self { query, tag: None }
    }

    /// Tag the query with a view and the requesting caller.
    #[must_use]
    pub fn projection(mut self, view: impl Into<String>, caller: Option<Arc<dyn Caller>>) -> Self {
        self.tag = Some(ProjectionTag {
            view: view.into(),
            caller,
        });
        self
    }

    /// Wrapped query.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Projection tag, if any.
    #[must_use]
    pub const fn tag(&self) -> Option<&ProjectionTag> {
        self.tag.as_ref()
    }
}

impl From<Query> for ProjectionQuery {
    fn from(query: Query) -> Self {
        Self::new(query)
    }
}

/// Result of executing a [`ProjectionQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<D> {
    /// Untagged query, or an operation projection does not apply to
    Raw(QueryOutput<D>),
    /// Tagged `FindOne`
    Record(ProjectedRecord),
    /// Tagged `Find`, in input order
    Records(Vec<ProjectedRecord>),
}

/// Executes queries against a store, projecting tagged reads.
///
/// The interceptor does not authorize views. Hosts check
/// [`PermissionGate::can_use_projection`](crate::permission::PermissionGate::can_use_projection)
/// before tagging a query with a caller-supplied view.
pub struct QueryInterceptor<S: DocumentStore> {
    store: Arc<S>,
    projector: Arc<DocumentProjector<S::Document>>,
}

impl<S: DocumentStore> QueryInterceptor<S> {
    /// Create an interceptor.
    #[must_use]
    pub const fn new(store: Arc<S>, projector: Arc<DocumentProjector<S::Document>>) -> Self {
        Self { store, projector }
    }

    /// Execute a query.
    ///
    /// # Errors
    ///
    /// Propagates store errors, and projection errors for tagged reads
    /// (see [`DocumentProjector::project`]).
    pub async fn exec(&self, query: &ProjectionQuery) -> Result<QueryOutcome<S::Document>> {
        let Some(tag) = query.tag() else {
            return Ok(QueryOutcome::Raw(self.store.execute(query.query()).await?));
        };

        let inner = query.query();
        if !inner.op().is_read() {
            tracing::debug!(
                model = %inner.model(),
                op = ?inner.op(),
                view = %tag.view(),
                "Projection ignored for non-read query"
            );
            return Ok(QueryOutcome::Raw(self.store.execute(inner).await?));
        }

        let populate = self.projector.populate_paths(inner.model(), tag.view());

        match self.store.execute(inner).await? {
            QueryOutput::Many(mut documents) => {
                if !populate.is_empty() && !documents.is_empty() {
                    self.store.populate(&mut documents, populate).await?;
                }
                let records = try_join_all(documents.iter().map(|document| {
                    self.projector
                        .project(Some(document), Some(tag.view()), tag.caller())
                }))
                .await?;
                Ok(QueryOutcome::Records(records))
            }
            QueryOutput::One(mut document) => {
                if let Some(document) = document.as_mut() {
                    if !populate.is_empty() {
                        self.store
                            .populate(std::slice::from_mut(document), populate)
                            .await?;
                    }
                }
                let record = self
                    .projector
                    .project(document.as_ref(), Some(tag.view()), tag.caller())
                    .await?;
                Ok(QueryOutcome::Record(record))
            }
            other => Ok(QueryOutcome::Raw(other)),
        }
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Projector applied to tagged reads.
    #[must_use]
    pub const fn projector(&self) -> &Arc<DocumentProjector<S::Document>> {
        &self.projector
    }
}

/// Document to project with [`project_document`].
#[derive(Debug, Clone, Copy)]
pub enum ProjectionTarget<'a, D> {
    /// An already loaded document
    Loaded(&'a D),
    /// A document to re-fetch by identifier
    ById {
        /// Model name
        model: &'a str,
        /// Document identifier
        id: &'a str,
    },
}

/// Project a loaded document, or fetch one by identifier and project it.
///
/// A document that cannot be found projects to an empty record.
///
/// # Errors
///
/// Propagates store errors and [`DocumentProjector::project`] errors.
pub async fn project_document<S: DocumentStore>(
    store: &S,
    projector: &DocumentProjector<S::Document>,
    target: ProjectionTarget<'_, S::Document>,
    view: &str,
    caller: Option<&dyn Caller>,
) -> Result<ProjectedRecord> {
    match target {
        ProjectionTarget::Loaded(document) => {
            projector.project(Some(document), Some(view), caller).await
        }
        ProjectionTarget::ById { model, id } => {
            let document = store.find_by_id(model, id).await?;
            if let Some(found) = document.as_ref() {
                if found.model_name() != model {
                    return Err(ProjectionError::DocumentStore(format!(
                        "store returned a {} document for a {model} lookup",
                        found.model_name()
                    )));
                }
            }
            projector.project(document.as_ref(), Some(view), caller).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagging_preserves_query() {
        let query = Query::find("user")
            .filter("status", json!("active"))
            .sort_by("username", SortOrder::Ascending)
            .limit(10);
        let tagged = ProjectionQuery::new(query.clone()).projection("list", None);

        assert_eq!(tagged.query(), &query);
        assert_eq!(tagged.tag().map(ProjectionTag::view), Some("list"));
        assert!(ProjectionQuery::from(query).tag().is_none());
    }

    #[test]
    fn test_read_operations() {
        assert!(QueryOp::Find.is_read());
        assert!(QueryOp::FindOne.is_read());
        assert!(!QueryOp::Count.is_read());
        assert!(!QueryOp::Update.is_read());
        assert!(!QueryOp::Delete.is_read());
    }
}
