//! Requesting-caller context.
//!
//! The caller is passed to computed accessors and consulted by the
//! [`PermissionGate`](crate::permission::PermissionGate). It may be absent for anonymous
//! requests and for system work such as publication.

use std::collections::HashSet;

/// A requesting caller that can answer capability checks.
pub trait Caller: Send + Sync {
    /// Whether the caller holds the named permission.
    fn has_permission(&self, permission: &str) -> bool;

    /// Caller identifier, if authenticated.
    fn user_id(&self) -> Option<&str> {
        None
    }
}

/// Caller context backed by a fixed permission set.
///
/// # Example
///
/// ```
/// use docview_core::context::{Caller, RequestContext};
///
/// let ctx = RequestContext::new("u-1").with_permission("projection.user.detail");
/// assert!(ctx.has_permission("projection.user.detail"));
/// assert!(!ctx.has_permission("projection.user.admin"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user_id: Option<String>,
    permissions: HashSet<String>,
}

impl RequestContext {
    /// Create a context for an authenticated user.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            permissions: HashSet::new(),
        }
    }

    /// Create an anonymous context without permissions.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Grant a permission.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }
}

impl Caller for RequestContext {
    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}
