//! Computed-accessor registry.
//!
//! Chain candidates carrying the accessor marker (`_fullName`) are computed by async
//! functions registered per model instead of being read from stored attributes. Lookup is
//! an explicit (model, accessor name) map; a candidate without a registered accessor is a
//! configuration error ([`ProjectionError::MissingAccessor`](crate::error::ProjectionError::MissingAccessor)).
//!
//! # Example
//!
//! ```
//! use docview_core::accessor::AccessorRegistry;
//! use docview_core::document::{Document, JsonDocument};
//! use serde_json::{json, Value};
//!
//! let accessors = AccessorRegistry::<JsonDocument>::new().with_accessor(
//!     "user",
//!     "fullName",
//!     |doc, _caller| {
//!         Box::pin(async move {
//!             let first = doc.attribute("first").map_or(Value::Null, |a| a.into_plain());
//!             let last = doc.attribute("last").map_or(Value::Null, |a| a.into_plain());
//!             Ok(json!(format!("{} {}", first.as_str().unwrap_or(""), last.as_str().unwrap_or(""))))
//!         })
//!     },
//! );
//!
//! assert!(accessors.contains("user", "fullName"));
//! ```

use crate::context::Caller;
use crate::error::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Future returned by an accessor. `Value::Null` means "no value".
pub type AccessorFuture<'a> = BoxFuture<'a, Result<Value>>;

/// Type-erased accessor function for documents of type `D`.
pub type AccessorFn<D> =
    dyn for<'a> Fn(&'a D, Option<&'a dyn Caller>) -> AccessorFuture<'a> + Send + Sync;

/// Accessors keyed by model name, then accessor name.
pub struct AccessorRegistry<D> {
    accessors: HashMap<String, HashMap<String, Arc<AccessorFn<D>>>>,
}

impl<D> AccessorRegistry<D> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accessors: HashMap::new(),
        }
    }

    /// Register an accessor for `model`.
    ///
    /// The accessor receives the document and the (possibly absent) requesting caller.
    /// Registering the same name twice replaces the earlier accessor.
    pub fn register<F>(
        &mut self,
        model: impl Into<String>,
        name: impl Into<String>,
        accessor: F,
    ) -> &mut Self
    where
        F: for<'a> Fn(&'a D, Option<&'a dyn Caller>) -> AccessorFuture<'a> + Send + Sync + 'static,
    {
        self.accessors
            .entry(model.into())
            .or_default()
            .insert(name.into(), Arc::new(accessor));
        self
    }

    /// Builder form of [`AccessorRegistry::register`].
    #[must_use]
    pub fn with_accessor<F>(
        mut self,
        model: impl Into<String>,
        name: impl Into<String>,
        accessor: F,
    ) -> Self
    where
        F: for<'a> Fn(&'a D, Option<&'a dyn Caller>) -> AccessorFuture<'a> + Send + Sync + 'static,
    {
        self.register(model, name, accessor);
        self
    }

    /// Look up an accessor.
    #[must_use]
    pub fn get(&self, model: &str, name: &str) -> Option<&Arc<AccessorFn<D>>> {
        self.accessors.get(model)?.get(name)
    }

    /// Whether an accessor is registered.
    #[must_use]
    pub fn contains(&self, model: &str, name: &str) -> bool {
        self.get(model, name).is_some()
    }
}

impl<D> Default for AccessorRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for AccessorRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .accessors
            .iter()
            .flat_map(|(model, accessors)| {
                accessors.keys().map(move |name| format!("{model}.{name}"))
            })
            .collect();
        names.sort();
        f.debug_struct("AccessorRegistry")
            .field("accessors", &names)
            .finish()
    }
}
