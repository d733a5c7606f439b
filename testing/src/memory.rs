//! In-memory backends for fast, deterministic testing
//!
//! - [`InMemoryDocumentStore`]: `JsonDocument` collections with equality filters,
//!   sorting, limits and reference-based eager loading
//! - [`InMemoryPublicationStore`]: `HashMap`-based snapshot storage with failure injection

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test panicked

use docview_core::document::{Attribute, Document, Embedded, JsonDocument};
use docview_core::error::{ProjectionError, Result};
use docview_core::query::{Query, QueryOp, QueryOutput, SortOrder};
use docview_core::store::{
    DocumentStore, PublicationFilter, PublicationKey, PublicationStore, PublishedDocument,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

/// In-memory source document store.
///
/// Documents are kept per model in insertion order, so `Find` results are deterministic.
/// Attributes declared with [`InMemoryDocumentStore::with_reference`] hold identifiers of
/// documents in another model and are replaced by those documents when populated.
///
/// # Example
///
/// ```
/// use docview_testing::InMemoryDocumentStore;
/// use docview_core::document::JsonDocument;
/// use docview_core::store::DocumentStore;
/// use serde_json::json;
///
/// # async fn example() -> docview_core::error::Result<()> {
/// let store = InMemoryDocumentStore::new();
/// store.insert(JsonDocument::new("user", "u-1").with_attribute("username", json!("ada")));
///
/// let user = store.find_by_id("user", "u-1").await?;
/// assert!(user.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<JsonDocument>>>>,
    references: Arc<RwLock<HashMap<(String, String), String>>>,
    unavailable: Arc<AtomicBool>,
    execute_calls: Arc<AtomicUsize>,
    find_by_id_calls: Arc<AtomicUsize>,
    populate_calls: Arc<AtomicUsize>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `path` on `model` references documents of `target`.
    #[must_use]
    pub fn with_reference(
        self,
        model: impl Into<String>,
        path: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.references
            .write()
            .unwrap()
            .insert((model.into(), path.into()), target.into());
        self
    }

    /// Insert a document, replacing any document with the same model and id.
    pub fn insert(&self, document: JsonDocument) {
        let mut collections = self.collections.write().unwrap();
        let collection = collections
            .entry(document.model_name().to_string())
            .or_default();
        match collection.iter_mut().find(|d| d.id() == document.id()) {
            Some(existing) => *existing = document,
            None => collection.push(document),
        }
    }

    /// Remove a document, returning it if present.
    pub fn remove(&self, model: &str, id: &str) -> Option<JsonDocument> {
        let mut collections = self.collections.write().unwrap();
        let collection = collections.get_mut(model)?;
        let index = collection.iter().position(|d| d.id() == id)?;
        Some(collection.remove(index))
    }

    /// Get a copy of a stored document without counting a store call.
    #[must_use]
    pub fn get(&self, model: &str, id: &str) -> Option<JsonDocument> {
        self.collections
            .read()
            .unwrap()
            .get(model)
            .and_then(|collection| collection.iter().find(|d| d.id() == id).cloned())
    }

    /// Number of documents stored for `model`.
    #[must_use]
    pub fn count(&self, model: &str) -> usize {
        self.collections
            .read()
            .unwrap()
            .get(model)
            .map_or(0, Vec::len)
    }

    /// Make every operation fail with [`ProjectionError::DocumentStore`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Number of `execute` calls so far.
    #[must_use]
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of `find_by_id` calls so far.
    #[must_use]
    pub fn find_by_id_calls(&self) -> usize {
        self.find_by_id_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of `populate` calls so far.
    #[must_use]
    pub fn populate_calls(&self) -> usize {
        self.populate_calls.load(AtomicOrdering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(ProjectionError::DocumentStore(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn matching(&self, query: &Query) -> Vec<JsonDocument> {
        let collections = self.collections.read().unwrap();
        let Some(collection) = collections.get(query.model()) else {
            return Vec::new();
        };

        let mut documents: Vec<JsonDocument> = collection
            .iter()
            .filter(|document| matches_filter(document, query))
            .cloned()
            .collect();

        if !query.sort_keys().is_empty() {
            documents.sort_by(|a, b| {
                query
                    .sort_keys()
                    .iter()
                    .map(|(path, order)| {
                        let ordering = compare_values(&plain(a, path), &plain(b, path));
                        match order {
                            SortOrder::Ascending => ordering,
                            SortOrder::Descending => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        if let Some(limit) = query.result_limit() {
            documents.truncate(limit);
        }
        documents
    }

    fn update_matching(&self, query: &Query) -> u64 {
        let mut collections = self.collections.write().unwrap();
        let Some(collection) = collections.get_mut(query.model()) else {
            return 0;
        };

        let mut affected = 0;
        for document in collection
            .iter_mut()
            .filter(|document| matches_filter(document, query))
        {
            for (name, value) in query.changes() {
                document.set_attribute(name.clone(), value.clone());
            }
            affected += 1;
        }
        affected
    }

    fn delete_matching(&self, query: &Query) -> u64 {
        let mut collections = self.collections.write().unwrap();
        let Some(collection) = collections.get_mut(query.model()) else {
            return 0;
        };

        let before = collection.len();
        collection.retain(|document| !matches_filter(document, query));
        (before - collection.len()) as u64
    }

    fn resolve_reference(&self, target: &str, id: &Value) -> Option<Arc<JsonDocument>> {
        let id = match id {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        self.get(target, &id).map(Arc::new)
    }
}

fn plain(document: &JsonDocument, path: &str) -> Value {
    document
        .attribute(path)
        .map_or(Value::Null, Attribute::into_plain)
}

fn matches_filter(document: &JsonDocument, query: &Query) -> bool {
    query
        .filters()
        .iter()
        .all(|(path, expected)| plain(document, path) == *expected)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl DocumentStore for InMemoryDocumentStore {
    type Document = JsonDocument;

    async fn execute(&self, query: &Query) -> Result<QueryOutput<JsonDocument>> {
        self.execute_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_available()?;

        Ok(match query.op() {
            QueryOp::Find => QueryOutput::Many(self.matching(query)),
            QueryOp::FindOne => QueryOutput::One(self.matching(query).into_iter().next()),
            QueryOp::Count => QueryOutput::Count(self.matching(query).len() as u64),
            QueryOp::Update => QueryOutput::Affected(self.update_matching(query)),
            QueryOp::Delete => QueryOutput::Affected(self.delete_matching(query)),
        })
    }

    async fn find_by_id(&self, model: &str, id: &str) -> Result<Option<JsonDocument>> {
        self.find_by_id_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_available()?;
        Ok(self.get(model, id))
    }

    async fn populate(&self, documents: &mut [JsonDocument], paths: &[String]) -> Result<()> {
        self.populate_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_available()?;

        for document in documents.iter_mut() {
            for path in paths {
                let target = self
                    .references
                    .read()
                    .unwrap()
                    .get(&(document.model_name().to_string(), path.clone()))
                    .cloned();
                let Some(target) = target else {
                    tracing::trace!(model = %document.model_name(), path = %path, "No reference declared");
                    continue;
                };

                let embedded = match document.attributes().get(path) {
                    Some(Value::Array(ids)) => Some(Embedded::Many(
                        ids.iter()
                            .filter_map(|id| self.resolve_reference(&target, id))
                            .collect(),
                    )),
                    Some(id) => self.resolve_reference(&target, id).map(Embedded::One),
                    None => None,
                };

                if let Some(embedded) = embedded {
                    document.embed(path.clone(), embedded);
                }
            }
        }
        Ok(())
    }
}

/// In-memory publication store for fast, deterministic testing.
///
/// Upserts for views registered with [`InMemoryPublicationStore::fail_upserts_for`] fail
/// with [`ProjectionError::Storage`], which lets tests exercise per-view failure isolation.
///
/// # Example
///
/// ```
/// use docview_testing::InMemoryPublicationStore;
/// use docview_core::store::{PublicationKey, PublicationStore, PublishedDocument};
/// use docview_core::record::ProjectedRecord;
/// use chrono::Utc;
///
/// # async fn example() -> docview_core::error::Result<()> {
/// let store = InMemoryPublicationStore::new();
/// store
///     .upsert(PublishedDocument {
///         key: PublicationKey::new("user", "card", "u-1"),
///         body: ProjectedRecord::new(),
///         updated_at: Utc::now(),
///     })
///     .await?;
///
/// assert!(store.contains("user", "card", "u-1"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryPublicationStore {
    data: Arc<RwLock<HashMap<PublicationKey, PublishedDocument>>>,
    failing_views: Arc<RwLock<HashSet<String>>>,
    upserts: Arc<AtomicUsize>,
}

impl InMemoryPublicationStore {
    /// Create a new empty publication store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make upserts of `view` fail.
    pub fn fail_upserts_for(&self, view: impl Into<String>) {
        self.failing_views.write().unwrap().insert(view.into());
    }

    /// Clear all snapshots (for test isolation)
    pub fn clear(&self) {
        self.data.write().unwrap().clear();
    }

    /// Get the number of stored snapshots
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    /// Check if a snapshot exists
    #[must_use]
    pub fn contains(&self, model: &str, view: &str, ref_id: &str) -> bool {
        self.data
            .read()
            .unwrap()
            .contains_key(&PublicationKey::new(model, view, ref_id))
    }

    /// Get a copy of a snapshot
    #[must_use]
    pub fn get(&self, model: &str, view: &str, ref_id: &str) -> Option<PublishedDocument> {
        self.data
            .read()
            .unwrap()
            .get(&PublicationKey::new(model, view, ref_id))
            .cloned()
    }

    /// All snapshot keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<PublicationKey> {
        let mut keys: Vec<_> = self.data.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of successful upserts so far
    #[must_use]
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(AtomicOrdering::SeqCst)
    }
}

impl PublicationStore for InMemoryPublicationStore {
    fn upsert(
        &self,
        document: PublishedDocument,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self
                .failing_views
                .read()
                .unwrap()
                .contains(&document.key.projection)
            {
                return Err(ProjectionError::Storage(format!(
                    "upsert rejected for view {}",
                    document.key.projection
                )));
            }

            self.data
                .write()
                .unwrap()
                .insert(document.key.clone(), document);
            self.upserts.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        })
    }

    fn delete(
        &self,
        filter: PublicationFilter,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move {
            let mut data = self.data.write().unwrap();
            let before = data.len();
            data.retain(|key, _| !filter.matches(key));
            Ok((before - data.len()) as u64)
        })
    }

    fn find(
        &self,
        key: PublicationKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PublishedDocument>>> + Send + '_>> {
        Box::pin(async move { Ok(self.data.read().unwrap().get(&key).cloned()) })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use super::*;
    use docview_core::record::ProjectedRecord;
    use serde_json::json;

    fn users() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store.insert(
            JsonDocument::new("user", "u-1")
                .with_attribute("username", json!("carol"))
                .with_attribute("status", json!("active")),
        );
        store.insert(
            JsonDocument::new("user", "u-2")
                .with_attribute("username", json!("ada"))
                .with_attribute("status", json!("active")),
        );
        store.insert(
            JsonDocument::new("user", "u-3")
                .with_attribute("username", json!("bob"))
                .with_attribute("status", json!("banned")),
        );
        store
    }

    fn ids(output: QueryOutput<JsonDocument>) -> Vec<String> {
        match output {
            QueryOutput::Many(documents) => documents.iter().map(Document::id).collect(),
            other => panic!("expected documents, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_find_filters_sorts_and_limits() {
        let store = users();

        let query = Query::find("user")
            .filter("status", json!("active"))
            .sort_by("username", SortOrder::Ascending);
        assert_eq!(ids(store.execute(&query).await.unwrap()), ["u-2", "u-1"]);

        let query = Query::find("user")
            .sort_by("username", SortOrder::Descending)
            .limit(2);
        assert_eq!(ids(store.execute(&query).await.unwrap()), ["u-1", "u-3"]);

        assert_eq!(store.execute_calls(), 2);
    }

    #[tokio::test]
    async fn test_count_update_delete() {
        let store = users();

        let count = store
            .execute(&Query::count("user").filter("status", json!("active")))
            .await
            .unwrap();
        assert_eq!(count, QueryOutput::Count(2));

        let mut changes = serde_json::Map::new();
        changes.insert("status".to_string(), json!("banned"));
        let updated = store
            .execute(&Query::update("user", changes).filter("username", json!("ada")))
            .await
            .unwrap();
        assert_eq!(updated, QueryOutput::Affected(1));

        let deleted = store
            .execute(&Query::delete("user").filter("status", json!("banned")))
            .await
            .unwrap();
        assert_eq!(deleted, QueryOutput::Affected(2));
        assert_eq!(store.count("user"), 1);
    }

    #[tokio::test]
    async fn test_populate_embeds_referenced_documents() {
        let store = InMemoryDocumentStore::new().with_reference("post", "author", "user");
        store.insert(JsonDocument::new("user", "u-1").with_attribute("username", json!("ada")));

        let mut posts = vec![
            JsonDocument::new("post", "p-1").with_attribute("author", json!("u-1")),
            JsonDocument::new("post", "p-2").with_attribute("author", json!("missing")),
        ];
        store
            .populate(&mut posts, &["author".to_string()])
            .await
            .unwrap();

        assert_eq!(
            posts[0].attribute("author.username").unwrap().into_plain(),
            json!("ada")
        );
        assert_eq!(
            posts[1].attribute("author").unwrap().into_plain(),
            json!("missing")
        );
        assert_eq!(store.populate_calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = users();
        store.set_unavailable(true);

        assert!(matches!(
            store.find_by_id("user", "u-1").await,
            Err(ProjectionError::DocumentStore(_))
        ));
    }

    #[tokio::test]
    async fn test_publication_store_upsert_and_delete() {
        let store = InMemoryPublicationStore::new();
        let now = chrono::Utc::now();

        for (view, id) in [("card", "u-1"), ("detail", "u-1"), ("card", "u-2")] {
            store
                .upsert(PublishedDocument {
                    key: PublicationKey::new("user", view, id),
                    body: ProjectedRecord::new(),
                    updated_at: now,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 3);

        let removed = store
            .delete(PublicationFilter::document("user", "u-1").view("card"))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let removed = store
            .delete(PublicationFilter::document("user", "u-1"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.keys(), [PublicationKey::new("user", "card", "u-2")]);
    }

    #[tokio::test]
    async fn test_publication_store_failure_injection() {
        let store = InMemoryPublicationStore::new();
        store.fail_upserts_for("detail");

        let result = store
            .upsert(PublishedDocument {
                key: PublicationKey::new("user", "detail", "u-1"),
                body: ProjectedRecord::new(),
                updated_at: chrono::Utc::now(),
            })
            .await;

        assert!(matches!(result, Err(ProjectionError::Storage(_))));
        assert!(store.is_empty());
        assert_eq!(store.upsert_count(), 0);
    }
}
