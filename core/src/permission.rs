//! Permission gate for projection views.
//!
//! # Truth Table
//!
//! | view configured | public | caller | capability check | result |
//! |-----------------|--------|--------|------------------|--------|
//! | no              | any    | any    | not consulted    | `false` (warning logged) |
//! | yes             | yes    | any    | not consulted    | `true` |
//! | yes             | no     | absent | not consulted    | `false` |
//! | yes             | no     | present| `false`          | `false` |
//! | yes             | no     | present| `true`           | `true` |

use crate::config::ViewsConfig;
use crate::context::Caller;
use std::sync::Arc;

/// Permission name guarding a view: `projection.<model>.<view>`.
#[must_use]
pub fn projection_permission(model: &str, view: &str) -> String {
    format!("projection.{model}.{view}")
}

/// Decides whether a caller may use a view. Default policy is deny.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    config: Arc<ViewsConfig>,
}

impl PermissionGate {
    /// Create a gate over the given configuration.
    #[must_use]
    pub const fn new(config: Arc<ViewsConfig>) -> Self {
        Self { config }
    }

    /// Whether `caller` may use `view` of `model`.
    #[must_use]
    pub fn can_use_projection(&self, caller: Option<&dyn Caller>, model: &str, view: &str) -> bool {
        if self.config.view(model, view).is_none() {
            tracing::warn!(
                model = %model,
                view = %view,
                "Projection permission requested for unconfigured view"
            );
            return false;
        }

        if self.config.is_public(model, view) {
            return true;
        }

        caller.is_some_and(|caller| caller.has_permission(&projection_permission(model, view)))
    }
}
