//! `PublishWorker` for draining document lifecycle events.
//!
//! # Overview
//!
//! Hosts that cannot await publication inside their save/remove hooks push
//! [`LifecycleEvent`]s onto a tokio channel instead. The worker:
//! - Receives events in order
//! - Publishes on save and depublishes every view on removal
//! - Logs failures and keeps going
//! - Stops on a shutdown signal or when every sender is dropped
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  LifecycleEvent  ┌──────────────┐
//! │  Save hooks  │ ───── mpsc ────► │ PublishWorker│
//! └──────────────┘                  └──────┬───────┘
//!                                          │
//!                                          ▼
//!                               ┌────────────────────────┐
//!                               │PublicationSynchronizer │
//!                               └────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docview_projections::PublishWorker;
//!
//! let (events_tx, events_rx) = tokio::sync::mpsc::channel(1024);
//! let (worker, shutdown) = PublishWorker::new(synchronizer, events_rx);
//!
//! let handle = tokio::spawn(worker.run());
//!
//! events_tx.send(LifecycleEvent::saved("user", "u-1")).await?;
//!
//! // Later, in a signal handler:
//! shutdown.send(true).ok();
//! let summary = handle.await?;
//! ```

use docview_core::publish::{LifecycleEvent, PublicationSynchronizer};
use docview_core::store::DocumentStore;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Counts reported when a [`PublishWorker`] stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Events handled successfully
    pub processed: u64,
    /// Events whose handling returned an error
    pub failed: u64,
}

/// Applies queued lifecycle events through a [`PublicationSynchronizer`].
///
/// Events are handled one at a time, in arrival order, so saves and removals of the same
/// document never race each other.
pub struct PublishWorker<S: DocumentStore> {
    synchronizer: Arc<PublicationSynchronizer<S>>,
    events: mpsc::Receiver<LifecycleEvent>,
    /// Shutdown signal
    shutdown: watch::Receiver<bool>,
}

impl<S: DocumentStore> PublishWorker<S> {
    /// Create a worker over a receiving channel.
    ///
    /// Returns the worker and a shutdown sender. Send `true` to the shutdown sender to
    /// stop the worker; dropping the sender stops it as well.
    #[must_use]
    pub fn new(
        synchronizer: Arc<PublicationSynchronizer<S>>,
        events: mpsc::Receiver<LifecycleEvent>,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = Self {
            synchronizer,
            events,
            shutdown: shutdown_rx,
        };

        (worker, shutdown_tx)
    }

    /// Process events until shutdown or until the channel closes.
    ///
    /// Individual failures are logged and counted; they never stop the loop.
    pub async fn run(mut self) -> WorkerSummary {
        let mut summary = WorkerSummary::default();
        tracing::info!("Starting publish worker");

        while !*self.shutdown.borrow() {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Event channel closed");
                        break;
                    };
                    self.handle(&event, &mut summary).await;
                }

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            "Publish worker stopped"
        );
        summary
    }

    async fn handle(&self, event: &LifecycleEvent, summary: &mut WorkerSummary) {
        match self.synchronizer.on_document_event(event).await {
            Ok(()) => summary.processed += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::error!(event = ?event, error = %e, "Failed to handle lifecycle event");
            }
        }
    }
}
