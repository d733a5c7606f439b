//! Publication backends for docview.
//!
//! # Overview
//!
//! This crate provides concrete implementations around the publication synchronizer:
//! - **`PostgreSQL`**: Persistent publication store with JSONB bodies
//! - **`PublishWorker`**: Background task applying queued lifecycle events
//!
//! # Read-Side Separation
//!
//! Published views can live in a **separate database** from the source documents:
//!
//! ```text
//! Document DB (Write)   →  Lifecycle events  →  Publication DB (Read)
//! ```
//!
//! # Wiring
//!
//! ```ignore
//! use docview_projections::{PostgresPublicationStore, PublishWorker};
//!
//! let publications = Arc::new(
//!     PostgresPublicationStore::new_with_separate_db(url, DEFAULT_TABLE.to_string()).await?,
//! );
//! publications.migrate().await?;
//!
//! let synchronizer = Arc::new(PublicationSynchronizer::new(
//!     documents,
//!     publications,
//!     projector,
//!     Arc::new(SystemClock),
//! ));
//!
//! let (events_tx, events_rx) = tokio::sync::mpsc::channel(1024);
//! let (worker, shutdown) = PublishWorker::new(synchronizer, events_rx);
//! tokio::spawn(worker.run());
//! ```

pub mod postgres;
pub mod worker;

// Re-export main types for convenience
pub use postgres::{DEFAULT_TABLE, PostgresPublicationStore};
pub use worker::{PublishWorker, WorkerSummary};
