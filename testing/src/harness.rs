//! Fluent harness for publication tests.

#![allow(clippy::missing_panics_doc)] // Assertion helpers panic by design

use crate::memory::{InMemoryDocumentStore, InMemoryPublicationStore};
use crate::mocks::test_clock;
use docview_core::accessor::AccessorRegistry;
use docview_core::config::ViewsConfig;
use docview_core::document::JsonDocument;
use docview_core::error::Result;
use docview_core::projector::DocumentProjector;
use docview_core::publish::{LifecycleEvent, PublicationSynchronizer, PublishReport};
use docview_core::record::ProjectedRecord;
use std::sync::Arc;

/// Test harness wiring a [`PublicationSynchronizer`] to in-memory backends.
///
/// This helper makes publication tests more readable by providing a builder-style
/// interface for seeding documents, firing lifecycle events and asserting on snapshots.
///
/// # Example
///
/// ```ignore
/// let mut harness = PublicationTestHarness::new(config, AccessorRegistry::new());
///
/// harness
///     .given_document(active_user)
///     .when_saved("user", "u-1")
///     .await?
///     .then_published("user", "card", "u-1");
/// ```
pub struct PublicationTestHarness {
    documents: Arc<InMemoryDocumentStore>,
    publications: Arc<InMemoryPublicationStore>,
    synchronizer: PublicationSynchronizer<InMemoryDocumentStore>,
    last_report: Option<PublishReport>,
}

impl PublicationTestHarness {
    /// Create a harness over empty stores and a fixed clock.
    #[must_use]
    pub fn new(config: ViewsConfig, accessors: AccessorRegistry<JsonDocument>) -> Self {
        Self::with_stores(
            config,
            accessors,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryPublicationStore::new()),
        )
    }

    /// Create a harness over the given stores.
    ///
    /// Useful when the document store needs references declared up front.
    #[must_use]
    pub fn with_stores(
        config: ViewsConfig,
        accessors: AccessorRegistry<JsonDocument>,
        documents: Arc<InMemoryDocumentStore>,
        publications: Arc<InMemoryPublicationStore>,
    ) -> Self {
        let projector = Arc::new(DocumentProjector::new(Arc::new(config), accessors));
        let synchronizer = PublicationSynchronizer::new(
            Arc::clone(&documents),
            publications.clone(),
            projector,
            Arc::new(test_clock()),
        );

        Self {
            documents,
            publications,
            synchronizer,
            last_report: None,
        }
    }

    /// Insert or replace a source document.
    pub fn given_document(&mut self, document: JsonDocument) -> &mut Self {
        self.documents.insert(document);
        self
    }

    /// Remove a source document without firing any event.
    pub fn given_removed(&mut self, model: &str, id: &str) -> &mut Self {
        self.documents.remove(model, id);
        self
    }

    /// Run `publish` for a document, as a post-save hook would.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`](docview_core::error::ProjectionError) if the document
    /// fetch fails.
    pub async fn when_saved(&mut self, model: &str, id: &str) -> Result<&mut Self> {
        let report = self.synchronizer.publish(model, id).await?;
        self.last_report = Some(report);
        Ok(self)
    }

    /// Deliver a lifecycle event through the hook adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`](docview_core::error::ProjectionError) if handling the
    /// event fails.
    pub async fn when_event(&mut self, event: LifecycleEvent) -> Result<&mut Self> {
        self.synchronizer.on_document_event(&event).await?;
        Ok(self)
    }

    /// Assert that a snapshot exists.
    #[allow(clippy::panic)] // Intentional panic for test assertions
    pub fn then_published(&self, model: &str, view: &str, id: &str) -> &Self {
        assert!(
            self.publications.contains(model, view, id),
            "Expected ({model}, {view}, {id}) to be published, found {:?}",
            self.publications.keys()
        );
        self
    }

    /// Assert that no snapshot exists.
    #[allow(clippy::panic)] // Intentional panic for test assertions
    pub fn then_not_published(&self, model: &str, view: &str, id: &str) -> &Self {
        assert!(
            !self.publications.contains(model, view, id),
            "Expected ({model}, {view}, {id}) to NOT be published"
        );
        self
    }

    /// Body of a snapshot, if published.
    #[must_use]
    pub fn published_body(&self, model: &str, view: &str, id: &str) -> Option<ProjectedRecord> {
        self.publications.get(model, view, id).map(|doc| doc.body)
    }

    /// Report of the last [`PublicationTestHarness::when_saved`] call.
    #[must_use]
    pub const fn last_report(&self) -> Option<&PublishReport> {
        self.last_report.as_ref()
    }

    /// Source document store.
    #[must_use]
    pub const fn documents(&self) -> &Arc<InMemoryDocumentStore> {
        &self.documents
    }

    /// Publication store.
    #[must_use]
    pub const fn publications(&self) -> &Arc<InMemoryPublicationStore> {
        &self.publications
    }

    /// Synchronizer under test.
    #[must_use]
    pub const fn synchronizer(&self) -> &PublicationSynchronizer<InMemoryDocumentStore> {
        &self.synchronizer
    }
}
