//! Publication synchronizer.
//!
//! Keeps denormalized snapshots of configured views in sync with their source documents.
//!
//! # State Machine
//!
//! Per (model, document, view):
//!
//! ```text
//!              publish (condition holds)
//! Unpublished ─────────────────────────────► Published ◄──┐
//!      ▲                                        │   │      │ publish (upsert in place)
//!      │      publish (condition fails)         │   └──────┘
//!      └────────────────────────────────────────┤
//!                                               │ depublish (document removed)
//!                                               ▼
//!                                            Deleted
//! ```
//!
//! # Failure Isolation
//!
//! Views are processed sequentially. A failure while projecting, upserting or
//! depublishing one view is logged, recorded in the [`PublishReport`], and does not stop
//! the remaining views. Only the initial document fetch fails the whole call.

use crate::config::{Condition, PublishRule};
use crate::document::{Attribute, Document};
use crate::environment::Clock;
use crate::error::Result;
use crate::projector::DocumentProjector;
use crate::store::{
    DocumentStore, PublicationFilter, PublicationKey, PublicationStore, PublishedDocument,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Source-document lifecycle event delivered by the host's post-save / post-remove hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Document created or updated
    Saved {
        /// Model name
        model: String,
        /// Document identifier
        id: String,
    },
    /// Document removed
    Removed {
        /// Model name
        model: String,
        /// Document identifier
        id: String,
    },
}

impl LifecycleEvent {
    /// Post-save event.
    #[must_use]
    pub fn saved(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Saved {
            model: model.into(),
            id: id.into(),
        }
    }

    /// Post-remove event.
    #[must_use]
    pub fn removed(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Removed {
            model: model.into(),
            id: id.into(),
        }
    }
}

/// Outcome of one view during [`PublicationSynchronizer::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOutcome {
    /// Snapshot upserted
    Published,
    /// Snapshot removed (condition failed or document vanished)
    Depublished,
    /// Processing failed; the error was logged
    Failed(String),
}

/// Per-view outcomes of one publish pass, in view-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    views: Vec<(String, ViewOutcome)>,
}

impl PublishReport {
    fn record(&mut self, view: &str, outcome: ViewOutcome) {
        self.views.push((view.to_string(), outcome));
    }

    /// All outcomes.
    #[must_use]
    pub fn views(&self) -> &[(String, ViewOutcome)] {
        &self.views
    }

    /// Outcome of one view.
    #[must_use]
    pub fn outcome(&self, view: &str) -> Option<&ViewOutcome> {
        self.views
            .iter()
            .find(|(name, _)| name == view)
            .map(|(_, outcome)| outcome)
    }

    /// Views whose snapshot was upserted.
    pub fn published(&self) -> impl Iterator<Item = &str> {
        self.views
            .iter()
            .filter(|(_, outcome)| *outcome == ViewOutcome::Published)
            .map(|(name, _)| name.as_str())
    }

    /// Views that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.views.iter().filter_map(|(name, outcome)| match outcome {
            ViewOutcome::Failed(reason) => Some((name.as_str(), reason.as_str())),
            _ => None,
        })
    }

    /// Whether no view was processed (model not published).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Coercive equality between a condition value and a document value.
///
/// - `null` equals only `null` (absent attributes read as `null`)
/// - numbers, numeric strings and booleans compare numerically (`"1" == 1`, `true == 1`)
/// - arrays compare element-wise with each other, or as their comma-joined string form
///   against a scalar (`["a"] == "a"`)
/// - objects compare key-wise with each other and never equal a scalar
///
/// Unlike JavaScript `==`, objects are never stringified and arrays compare by content
/// rather than identity.
#[must_use]
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| loose_eq(x, y)))
        }
        (Value::Object(_), _) | (_, Value::Object(_)) => false,
        (Value::Array(items), scalar) | (scalar, Value::Array(items)) => {
            loose_eq(&Value::String(join_primitive(items)), scalar)
        }
        (a, b) => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => numbers_equal(x, y),
            _ => false,
        },
    }
}

#[allow(clippy::float_cmp)] // Exact comparison is the intended semantics
fn numbers_equal(x: f64, y: f64) -> bool {
    x == y
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
            }
        }
        _ => None,
    }
}

fn join_primitive(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(nested) => join_primitive(nested),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether every condition pair holds against the live document.
#[must_use]
pub fn condition_holds(condition: &Condition, document: &dyn Document) -> bool {
    condition.iter().all(|(path, expected)| {
        let actual = document
            .attribute(path)
            .map_or(Value::Null, Attribute::into_plain);
        loose_eq(expected, &actual)
    })
}

/// Maintains published snapshots for the documents of store `S`.
pub struct PublicationSynchronizer<S: DocumentStore> {
    store: Arc<S>,
    publications: Arc<dyn PublicationStore>,
    projector: Arc<DocumentProjector<S::Document>>,
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> PublicationSynchronizer<S> {
    /// Create a synchronizer.
    ///
    /// Publish rules are read from the projector's configuration, so views and rules
    /// always come from the same [`ViewsConfig`](crate::config::ViewsConfig).
    #[must_use]
    pub fn new(
        store: Arc<S>,
        publications: Arc<dyn PublicationStore>,
        projector: Arc<DocumentProjector<S::Document>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publications,
            projector,
            clock,
        }
    }

    /// Recompute every published view of a document.
    ///
    /// Returns an empty report if the model has no publish rules. If the document no
    /// longer exists, all of its snapshots are removed.
    ///
    /// # Errors
    ///
    /// Returns an error only if fetching the source document fails; per-view failures
    /// are reported in the [`PublishReport`].
    pub async fn publish(&self, model: &str, id: &str) -> Result<PublishReport> {
        let mut report = PublishReport::default();

        let Some(rules) = self.projector.config().publish_rules(model) else {
            tracing::trace!(model = %model, ref_id = %id, "Model has no publications");
            return Ok(report);
        };

        let Some(document) = self.store.find_by_id(model, id).await? else {
            tracing::debug!(
                model = %model,
                ref_id = %id,
                "Source document not found, removing publications"
            );
            let outcome = match self.depublish(model, id, None).await {
                Ok(_) => ViewOutcome::Depublished,
                Err(e) => ViewOutcome::Failed(e.to_string()),
            };
            for view in rules.keys() {
                report.record(view, outcome.clone());
            }
            return Ok(report);
        };

        for (view, rule) in rules {
            let outcome = self.publish_view(&document, model, id, view, rule).await;
            report.record(view, outcome);
        }

        Ok(report)
    }

    async fn publish_view(
        &self,
        document: &S::Document,
        model: &str,
        id: &str,
        view: &str,
        rule: &PublishRule,
    ) -> ViewOutcome {
        if let PublishRule::When(condition) = rule {
            if !condition_holds(condition, document) {
                tracing::debug!(
                    model = %model,
                    view = %view,
                    ref_id = %id,
                    "Publish condition not met, depublishing"
                );
                return match self.depublish(model, id, Some(view)).await {
                    Ok(_) => ViewOutcome::Depublished,
                    Err(e) => {
                        tracing::warn!(
                            model = %model,
                            view = %view,
                            ref_id = %id,
                            error = %e,
                            "Failed to depublish view"
                        );
                        ViewOutcome::Failed(e.to_string())
                    }
                };
            }
        }

        let body = match self.projector.project(Some(document), Some(view), None).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    model = %model,
                    view = %view,
                    ref_id = %id,
                    error = %e,
                    "Failed to compute publication"
                );
                return ViewOutcome::Failed(e.to_string());
            }
        };

        let published = PublishedDocument {
            key: PublicationKey::new(model, view, id),
            body,
            updated_at: self.clock.now(),
        };

        match self.publications.upsert(published).await {
            Ok(()) => {
                tracing::debug!(model = %model, view = %view, ref_id = %id, "Published view");
                ViewOutcome::Published
            }
            Err(e) => {
                tracing::error!(
                    model = %model,
                    view = %view,
                    ref_id = %id,
                    error = %e,
                    "Failed to save publication"
                );
                ViewOutcome::Failed(e.to_string())
            }
        }
    }

    /// Remove snapshots of a document: one view, or every view when `view` is `None`.
    ///
    /// Returns the number of snapshots removed.
    ///
    /// # Errors
    ///
    /// Propagates publication store errors.
    pub async fn depublish(&self, model: &str, id: &str, view: Option<&str>) -> Result<u64> {
        let mut filter = PublicationFilter::document(model, id);
        if let Some(view) = view {
            filter = filter.view(view);
        }

        let removed = self.publications.delete(filter).await?;
        tracing::debug!(
            model = %model,
            ref_id = %id,
            view = ?view,
            removed,
            "Depublished"
        );
        Ok(removed)
    }

    /// Apply a lifecycle event: publish on save, depublish every view on removal.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`PublicationSynchronizer::publish`] and
    /// [`PublicationSynchronizer::depublish`].
    pub async fn on_document_event(&self, event: &LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::Saved { model, id } => {
                self.publish(model, id).await?;
            }
            LifecycleEvent::Removed { model, id } => {
                self.depublish(model, id, None).await?;
            }
        }
        Ok(())
    }

    /// Projector used to compute snapshot bodies.
    #[must_use]
    pub const fn projector(&self) -> &Arc<DocumentProjector<S::Document>> {
        &self.projector
    }
}
