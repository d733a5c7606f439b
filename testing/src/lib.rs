//! # Docview Testing
//!
//! Testing utilities and helpers for docview.
//!
//! This crate provides:
//! - In-memory document and publication stores
//! - Deterministic clock and caller mocks
//! - A fluent harness for publication tests
//! - Tracing initialisation for test output
//!
//! ## Example
//!
//! ```ignore
//! use docview_testing::PublicationTestHarness;
//!
//! #[tokio::test]
//! async fn test_publish_user() {
//!     let mut harness = PublicationTestHarness::new(config(), AccessorRegistry::new());
//!
//!     harness
//!         .given_document(JsonDocument::new("user", "u-1").with_attribute("status", json!("active")))
//!         .when_saved("user", "u-1")
//!         .await
//!         .unwrap()
//!         .then_published("user", "card", "u-1");
//! }
//! ```

use chrono::{DateTime, Utc};
use docview_core::environment::Clock;

mod harness;
mod memory;

pub use harness::PublicationTestHarness;
pub use memory::{InMemoryDocumentStore, InMemoryPublicationStore};

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use docview_core::context::Caller;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making snapshot timestamps reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use docview_testing::mocks::FixedClock;
    /// use docview_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Caller whose capability check always returns the same answer.
    ///
    /// Useful for exercising both branches of the permission gate without building a
    /// permission set.
    #[derive(Debug, Clone, Copy)]
    pub struct StaticCaller {
        granted: bool,
    }

    impl StaticCaller {
        /// Caller holding every permission.
        #[must_use]
        pub const fn allow_all() -> Self {
            Self { granted: true }
        }

        /// Caller holding no permission.
        #[must_use]
        pub const fn deny_all() -> Self {
            Self { granted: false }
        }
    }

    impl Caller for StaticCaller {
        fn has_permission(&self, _permission: &str) -> bool {
            self.granted
        }
    }
}

/// Install a `tracing` subscriber for test output.
///
/// Honors `RUST_LOG` and defaults to `debug` for docview crates. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docview_core=debug,warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, StaticCaller, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use docview_core::context::Caller;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_static_caller() {
        assert!(StaticCaller::allow_all().has_permission("projection.user.detail"));
        assert!(!StaticCaller::deny_all().has_permission("projection.user.detail"));
    }
}
