//! Error types for projection and publication operations.

use thiserror::Error;

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Errors raised while resolving projections or maintaining publications.
///
/// Configuration errors are never defaulted away: a view that does not match the
/// document it is applied to must fail loudly before a record reaches a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    // ═══════════════════════════════════════════════════════════
    // Input Errors
    // ═══════════════════════════════════════════════════════════

    /// No view (package) name was supplied.
    #[error("Missing package name for projection")]
    MissingPackageName,

    // ═══════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════

    /// The model has no projection configuration at all.
    #[error("No projection configured for model {model}")]
    UnknownModelProjection {
        /// Model name of the document
        model: String,
    },

    /// The model is configured, but not for the requested view.
    #[error("No projection configured for model {model} and package {view}")]
    UnknownProjectionView {
        /// Model name of the document
        model: String,
        /// Requested view name
        view: String,
    },

    /// A chain references a computed accessor that is not registered for the model.
    #[error("Projection accessor {accessor} missing on model {model}")]
    MissingAccessor {
        /// Model name of the document
        model: String,
        /// Expected accessor name
        accessor: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Runtime Errors
    // ═══════════════════════════════════════════════════════════

    /// A registered accessor failed while computing its value.
    #[error("Projection accessor {accessor} failed on model {model}: {reason}")]
    Accessor {
        /// Model name of the document
        model: String,
        /// Accessor name
        accessor: String,
        /// Failure description
        reason: String,
    },

    /// The source document store failed.
    #[error("Document store error: {0}")]
    DocumentStore(String),

    /// The publication store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProjectionError {
    /// Whether this error stems from a projection configuration mismatch.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownModelProjection { .. }
                | Self::UnknownProjectionView { .. }
                | Self::MissingAccessor { .. }
        )
    }
}
