//! `PublishWorker` tests against in-memory backends

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use docview_core::accessor::AccessorRegistry;
use docview_core::config::{PublishRule, ViewDefinition, ViewsConfig};
use docview_core::document::JsonDocument;
use docview_core::projector::DocumentProjector;
use docview_core::publish::{LifecycleEvent, PublicationSynchronizer};
use docview_projections::{PublishWorker, WorkerSummary};
use docview_testing::{InMemoryDocumentStore, InMemoryPublicationStore, init_tracing, test_clock};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

struct Fixture {
    documents: Arc<InMemoryDocumentStore>,
    publications: Arc<InMemoryPublicationStore>,
    synchronizer: Arc<PublicationSynchronizer<InMemoryDocumentStore>>,
}

fn fixture() -> Fixture {
    let config = ViewsConfig::default()
        .with_projection("user", "card", ViewDefinition::new().field("name", "username"))
        .with_publish("user", "card", PublishRule::Always);
    let documents = Arc::new(InMemoryDocumentStore::new());
    let publications = Arc::new(InMemoryPublicationStore::new());
    let projector = Arc::new(DocumentProjector::new(
        Arc::new(config),
        AccessorRegistry::new(),
    ));
    let synchronizer = Arc::new(PublicationSynchronizer::new(
        Arc::clone(&documents),
        publications.clone(),
        projector,
        Arc::new(test_clock()),
    ));

    Fixture {
        documents,
        publications,
        synchronizer,
    }
}

fn user(id: &str, name: &str) -> JsonDocument {
    JsonDocument::new("user", id).with_attribute("username", json!(name))
}

#[tokio::test]
async fn test_worker_applies_events_in_order_until_channel_closes() {
    init_tracing();
    let fixture = fixture();
    fixture.documents.insert(user("u-1", "ada"));
    fixture.documents.insert(user("u-2", "bob"));

    let (events_tx, events_rx) = mpsc::channel(16);
    let (worker, _shutdown) = PublishWorker::new(Arc::clone(&fixture.synchronizer), events_rx);

    events_tx.send(LifecycleEvent::saved("user", "u-1")).await.unwrap();
    events_tx.send(LifecycleEvent::saved("user", "u-2")).await.unwrap();
    events_tx.send(LifecycleEvent::removed("user", "u-1")).await.unwrap();
    drop(events_tx);

    let summary = worker.run().await;

    assert_eq!(
        summary,
        WorkerSummary {
            processed: 3,
            failed: 0
        }
    );
    assert!(!fixture.publications.contains("user", "card", "u-1"));
    let snapshot = fixture.publications.get("user", "card", "u-2").expect("u-2 published");
    assert_eq!(snapshot.body.get("name"), Some(&json!("bob")));
}

#[tokio::test]
async fn test_worker_counts_failures_and_keeps_going() {
    let fixture = fixture();
    fixture.documents.insert(user("u-1", "ada"));

    let (events_tx, events_rx) = mpsc::channel(16);
    let (worker, _shutdown) = PublishWorker::new(Arc::clone(&fixture.synchronizer), events_rx);
    let handle = tokio::spawn(worker.run());

    fixture.documents.set_unavailable(true);
    events_tx.send(LifecycleEvent::saved("user", "u-1")).await.unwrap();
    tokio::task::yield_now().await;
    while fixture.documents.find_by_id_calls() == 0 {
        tokio::task::yield_now().await;
    }
    fixture.documents.set_unavailable(false);
    events_tx.send(LifecycleEvent::saved("user", "u-1")).await.unwrap();
    drop(events_tx);

    let summary = handle.await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 1);
    assert!(fixture.publications.contains("user", "card", "u-1"));
}

#[tokio::test]
async fn test_worker_stops_on_shutdown_signal() {
    let fixture = fixture();
    let (events_tx, events_rx) = mpsc::channel(16);
    let (worker, shutdown) = PublishWorker::new(Arc::clone(&fixture.synchronizer), events_rx);

    let handle = tokio::spawn(worker.run());
    shutdown.send(true).unwrap();

    let summary = handle.await.unwrap();

    assert_eq!(summary, WorkerSummary::default());
    assert!(fixture.publications.is_empty());
    drop(events_tx);
}
