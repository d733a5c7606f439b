//! # Docview Core
//!
//! Projection resolution and publication synchronization for document stores.
//!
//! A **projection** (or view) is a named, restricted field mapping applied to a stored
//! document. Each output field is described by a fallback chain such as
//! `"displayName => username => _defaultName"`: candidates are tried in order and the
//! first non-empty value wins. Candidates carrying the accessor marker (`_`) are computed
//! by registered async accessors instead of being read from stored attributes.
//!
//! A **publication** is a persisted snapshot of a projection, kept in sync with its source
//! document by the [`publish::PublicationSynchronizer`].
//!
//! ## Components
//!
//! - [`chain`]: parses fallback-chain expressions
//! - [`resolver`]: resolves one output field from a document
//! - [`projector`]: applies a whole view to a document
//! - [`query`]: routes tagged read queries through the projector
//! - [`permission`]: decides whether a caller may use a view
//! - [`publish`]: maintains published snapshots on document changes
//!
//! ## Example
//!
//! ```
//! use docview_core::accessor::AccessorRegistry;
//! use docview_core::config::{ViewDefinition, ViewsConfig};
//! use docview_core::document::JsonDocument;
//! use docview_core::projector::DocumentProjector;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> docview_core::error::Result<()> {
//! let config = ViewsConfig::default()
//!     .with_projection("user", "list", ViewDefinition::new().field("name", "username"));
//! let projector = DocumentProjector::new(Arc::new(config), AccessorRegistry::new());
//!
//! let user = JsonDocument::new("user", "u-1").with_attribute("username", json!("ada"));
//! let record = projector.project(Some(&user), Some("list"), None).await?;
//!
//! assert_eq!(record.get("name"), Some(&json!("ada")));
//! assert_eq!(record.get("_id"), Some(&json!("u-1")));
//! # Ok(())
//! # }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde_json::Value;

pub mod accessor;
pub mod chain;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod permission;
pub mod projector;
pub mod publish;
pub mod query;
pub mod record;
pub mod resolver;
pub mod store;

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Publication timestamps are taken from the injected clock so tests can pin them.
    ///
    /// # Examples
    ///
    /// ```
    /// use docview_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use accessor::AccessorRegistry;
pub use config::{ChainSyntax, PublishRule, ViewDefinition, ViewsConfig};
pub use context::{Caller, RequestContext};
pub use document::{Attribute, Document, JsonDocument};
pub use error::{ProjectionError, Result};
pub use permission::PermissionGate;
pub use projector::DocumentProjector;
pub use publish::{LifecycleEvent, PublicationSynchronizer, PublishReport, ViewOutcome};
pub use query::{ProjectionQuery, Query, QueryInterceptor, QueryOp, QueryOutcome};
pub use record::ProjectedRecord;
pub use store::{DocumentStore, PublicationStore, PublishedDocument};
