//! Storage seams: the source document store and the denormalized publication store.
//!
//! # Implementations
//!
//! - `PostgresPublicationStore` (in `docview-projections`): production publication store
//! - `InMemoryDocumentStore` / `InMemoryPublicationStore` (in `docview-testing`): fast,
//!   deterministic testing
//!
//! The source document store is owned by the host application; it only has to implement
//! [`DocumentStore`].

use crate::document::Document;
use crate::error::Result;
use crate::query::{Query, QueryOutput};
use crate::record::ProjectedRecord;
use crate::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Source document store.
///
/// # Errors
///
/// Implementations report driver failures as
/// [`ProjectionError::DocumentStore`](crate::error::ProjectionError::DocumentStore).
pub trait DocumentStore: Send + Sync {
    /// Document type produced by this store.
    type Document: Document;

    /// Execute a query without any projection applied.
    fn execute(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<QueryOutput<Self::Document>>> + Send;

    /// Fetch the canonical document of `model` by identifier.
    fn find_by_id(
        &self,
        model: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Self::Document>>> + Send;

    /// Eager-load related documents at `paths` into `documents`.
    ///
    /// Default implementation loads nothing.
    fn populate(
        &self,
        documents: &mut [Self::Document],
        paths: &[String],
    ) -> impl Future<Output = Result<()>> + Send {
        let _ = (documents, paths);
        async { Ok(()) }
    }
}

/// Unique key of a published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicationKey {
    /// Source model name
    pub model: String,
    /// View (projection) name
    pub projection: String,
    /// Source document identifier
    pub ref_id: String,
}

impl PublicationKey {
    /// Create a key.
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        projection: impl Into<String>,
        ref_id: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            projection: projection.into(),
            ref_id: ref_id.into(),
        }
    }
}

/// Persisted denormalized snapshot of one projection of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedDocument {
    /// (model, projection, refId)
    pub key: PublicationKey,
    /// Projected record at publish time
    pub body: ProjectedRecord,
    /// Time of the last upsert
    pub updated_at: DateTime<Utc>,
}

/// Filter for deleting snapshots of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationFilter {
    /// Source model name
    pub model: String,
    /// Source document identifier
    pub ref_id: String,
    /// Restrict to one view; `None` matches every view of the document
    pub projection: Option<String>,
}

impl PublicationFilter {
    /// Match every snapshot of a document.
    #[must_use]
    pub fn document(model: impl Into<String>, ref_id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ref_id: ref_id.into(),
            projection: None,
        }
    }

    /// Narrow to one view.
    #[must_use]
    pub fn view(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Whether `key` matches this filter.
    #[must_use]
    pub fn matches(&self, key: &PublicationKey) -> bool {
        key.model == self.model
            && key.ref_id == self.ref_id
            && self
                .projection
                .as_ref()
                .is_none_or(|projection| *projection == key.projection)
    }
}

/// Denormalized publication store.
///
/// Writes are keyed by the exact (model, projection, refId) triple. Concurrent publishes
/// of the same key are only safe if `upsert` is atomic per key.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `impl Future`
/// so the synchronizer can hold it as `Arc<dyn PublicationStore>`.
pub trait PublicationStore: Send + Sync {
    /// Insert or replace the snapshot stored under `document.key`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Storage`](crate::error::ProjectionError::Storage) if the
    /// write fails.
    fn upsert(
        &self,
        document: PublishedDocument,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Delete every snapshot matching `filter`, returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Storage`](crate::error::ProjectionError::Storage) if the
    /// delete fails.
    fn delete(
        &self,
        filter: PublicationFilter,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>>;

    /// Fetch one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Storage`](crate::error::ProjectionError::Storage) if the
    /// read fails.
    fn find(
        &self,
        key: PublicationKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PublishedDocument>>> + Send + '_>>;
}
