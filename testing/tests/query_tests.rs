//! Query interceptor behavior

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::panic)] // Tests can panic on unexpected variants

use docview_core::accessor::AccessorRegistry;
use docview_core::config::{ViewDefinition, ViewsConfig};
use docview_core::context::{Caller, RequestContext};
use docview_core::document::{Document, JsonDocument};
use docview_core::permission::PermissionGate;
use docview_core::projector::DocumentProjector;
use docview_core::query::{
    ProjectionQuery, Query, QueryInterceptor, QueryOutcome, QueryOutput, SortOrder,
};
use docview_core::Value;
use docview_testing::{InMemoryDocumentStore, StaticCaller};
use serde_json::json;
use std::sync::Arc;

fn store() -> Arc<InMemoryDocumentStore> {
    let store = InMemoryDocumentStore::new().with_reference("user", "team", "team");
    store.insert(JsonDocument::new("team", "t-1").with_attribute("name", json!("core")));
    store.insert(
        JsonDocument::new("user", "u-1")
            .with_attribute("username", json!("carol"))
            .with_attribute("status", json!("active"))
            .with_attribute("team", json!("t-1")),
    );
    store.insert(
        JsonDocument::new("user", "u-2")
            .with_attribute("username", json!("ada"))
            .with_attribute("status", json!("active"))
            .with_attribute("team", json!("t-1")),
    );
    store.insert(
        JsonDocument::new("user", "u-3")
            .with_attribute("username", json!("bob"))
            .with_attribute("status", json!("banned")),
    );
    Arc::new(store)
}

fn interceptor(store: Arc<InMemoryDocumentStore>) -> QueryInterceptor<InMemoryDocumentStore> {
    let accessors = AccessorRegistry::new().with_accessor(
        "user",
        "viewer",
        |_doc: &JsonDocument, caller| {
            Box::pin(async move {
                Ok(caller
                    .and_then(|caller| caller.user_id())
                    .map_or(Value::Null, |id| json!(id)))
            })
        },
    );
    let config = ViewsConfig::default()
        .with_projection("user", "list", ViewDefinition::new().field("name", "username"))
        .with_projection(
            "user",
            "detail",
            ViewDefinition::new()
                .field("name", "username")
                .field("teamName", "team.name")
                .field("viewer", "_viewer")
                .populate("team"),
        );
    let projector = Arc::new(DocumentProjector::new(Arc::new(config), accessors));
    QueryInterceptor::new(store, projector)
}

#[tokio::test]
async fn test_untagged_find_returns_raw_documents() {
    let interceptor = interceptor(store());

    let outcome = interceptor
        .exec(&Query::find("user").filter("status", json!("active")).into())
        .await
        .unwrap();

    let QueryOutcome::Raw(QueryOutput::Many(documents)) = outcome else {
        panic!("expected raw documents");
    };
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].id(), "u-1");
    assert_eq!(
        documents[0].attribute("team").map(|a| a.into_plain()),
        Some(json!("t-1"))
    );
    assert_eq!(interceptor.store().populate_calls(), 0);
}

#[tokio::test]
async fn test_tagged_find_projects_each_result_in_order() {
    let interceptor = interceptor(store());
    let query = ProjectionQuery::new(
        Query::find("user")
            .filter("status", json!("active"))
            .sort_by("username", SortOrder::Ascending),
    )
    .projection("list", None);

    let QueryOutcome::Records(records) = interceptor.exec(&query).await.unwrap() else {
        panic!("expected projected records");
    };

    let records: Vec<Value> = records.into_iter().map(Value::from).collect();
    assert_eq!(
        records,
        [
            json!({ "name": "ada", "_id": "u-2" }),
            json!({ "name": "carol", "_id": "u-1" }),
        ]
    );
}

#[tokio::test]
async fn test_tagged_find_one_populates_and_passes_caller() {
    let interceptor = interceptor(store());
    let caller: Arc<dyn Caller> = Arc::new(RequestContext::new("admin-1"));
    let query = ProjectionQuery::new(Query::find_one("user").filter("username", json!("ada")))
        .projection("detail", Some(caller));

    let QueryOutcome::Record(record) = interceptor.exec(&query).await.unwrap() else {
        panic!("expected one projected record");
    };

    assert_eq!(
        Value::from(record),
        json!({ "name": "ada", "teamName": "core", "viewer": "admin-1", "_id": "u-2" })
    );
    assert_eq!(interceptor.store().populate_calls(), 1);
}

#[tokio::test]
async fn test_tagged_find_one_without_match_is_empty_record() {
    let interceptor = interceptor(store());
    let query = ProjectionQuery::new(Query::find_one("user").filter("username", json!("zed")))
        .projection("detail", None);

    let QueryOutcome::Record(record) = interceptor.exec(&query).await.unwrap() else {
        panic!("expected one projected record");
    };

    assert!(record.is_empty());
    assert_eq!(interceptor.store().populate_calls(), 0);
}

#[tokio::test]
async fn test_tag_is_ignored_for_non_read_operations() {
    let store = store();
    let interceptor = interceptor(Arc::clone(&store));

    let count = interceptor
        .exec(
            &ProjectionQuery::new(Query::count("user").filter("status", json!("active")))
                .projection("list", None),
        )
        .await
        .unwrap();
    assert_eq!(count, QueryOutcome::Raw(QueryOutput::Count(2)));

    let deleted = interceptor
        .exec(
            &ProjectionQuery::new(Query::delete("user").filter("status", json!("banned")))
                .projection("list", None),
        )
        .await
        .unwrap();
    assert_eq!(deleted, QueryOutcome::Raw(QueryOutput::Affected(1)));
    assert_eq!(store.count("user"), 2);
}

#[tokio::test]
async fn test_tagged_read_with_unknown_view_fails() {
    let interceptor = interceptor(store());
    let query = ProjectionQuery::new(Query::find("user")).projection("admin", None);

    let error = interceptor.exec(&query).await.unwrap_err();

    assert!(error.is_configuration_error());
}

#[tokio::test]
async fn test_gate_check_precedes_tagged_query() {
    let store = store();
    let interceptor = interceptor(Arc::clone(&store));
    let gate = PermissionGate::new(Arc::new(
        ViewsConfig::default()
            .with_projection("user", "list", ViewDefinition::new().field("name", "username"))
            .with_projection("user", "detail", ViewDefinition::new().field("name", "username"))
            .with_public_view("user", "list"),
    ));
    let caller: Arc<dyn Caller> = Arc::new(StaticCaller::deny_all());

    let mut outcomes = Vec::new();
    for view in ["detail", "list"] {
        if !gate.can_use_projection(Some(caller.as_ref()), "user", view) {
            continue;
        }
        let query = ProjectionQuery::new(Query::find_one("user").filter("username", json!("ada")))
            .projection(view, Some(Arc::clone(&caller)));
        outcomes.push(interceptor.exec(&query).await.unwrap());
    }

    assert_eq!(store.execute_calls(), 1);
    let [QueryOutcome::Record(record)] = outcomes.as_slice() else {
        panic!("expected a single projected record");
    };
    assert_eq!(Value::from(record.clone()), json!({ "name": "ada", "_id": "u-2" }));
}
