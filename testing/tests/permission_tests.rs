//! Permission gate decisions

use docview_core::config::ViewsConfig;
use docview_core::context::RequestContext;
use docview_core::permission::{PermissionGate, projection_permission};
use docview_testing::{StaticCaller, init_tracing};
use proptest::prelude::*;
use std::sync::Arc;

#[allow(clippy::unwrap_used)]
fn gate() -> PermissionGate {
    let config = ViewsConfig::from_json_str(
        r#"{
            "projections": {
                "user": {
                    "list": { "name": "username" },
                    "detail": { "email": "email" }
                }
            },
            "public": { "user": ["list"] }
        }"#,
    )
    .unwrap();
    PermissionGate::new(Arc::new(config))
}

#[test]
fn test_public_view_is_granted_regardless_of_caller() {
    let gate = gate();

    assert!(gate.can_use_projection(None, "user", "list"));
    assert!(gate.can_use_projection(Some(&StaticCaller::deny_all()), "user", "list"));
    assert!(gate.can_use_projection(Some(&StaticCaller::allow_all()), "user", "list"));
}

#[test]
fn test_private_view_follows_capability_check() {
    let gate = gate();
    let granted =
        RequestContext::new("u-1").with_permission(projection_permission("user", "detail"));

    assert!(!gate.can_use_projection(None, "user", "detail"));
    assert!(!gate.can_use_projection(Some(&StaticCaller::deny_all()), "user", "detail"));
    assert!(!gate.can_use_projection(Some(&RequestContext::anonymous()), "user", "detail"));
    assert!(gate.can_use_projection(Some(&granted), "user", "detail"));
}

#[test]
fn test_unconfigured_view_is_denied_without_error() {
    init_tracing();
    let gate = gate();

    assert!(!gate.can_use_projection(Some(&StaticCaller::allow_all()), "user", "admin"));
    assert!(!gate.can_use_projection(Some(&StaticCaller::allow_all()), "invoice", "list"));
}

proptest! {
    #[test]
    fn prop_unconfigured_views_are_always_denied(view in "[a-z]{1,12}", granted in any::<bool>()) {
        prop_assume!(view != "list" && view != "detail");
        let gate = gate();
        let caller = if granted { StaticCaller::allow_all() } else { StaticCaller::deny_all() };

        prop_assert!(!gate.can_use_projection(Some(&caller), "user", &view));
        prop_assert!(!gate.can_use_projection(None, "user", &view));
    }
}
