//! Single-field resolution.

use crate::accessor::AccessorRegistry;
use crate::chain::{Candidate, FallbackChain};
use crate::context::Caller;
use crate::document::{Attribute, Document};
use crate::error::{ProjectionError, Result};
use serde_json::Value;
use std::sync::Arc;

/// Whether a resolved value counts as "no value" for fallback purposes.
///
/// `null` is empty, and so is a zero-length array: fallback continues past empty lists.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Resolves one output field by walking its fallback chain.
#[derive(Debug)]
pub struct FieldResolver<D> {
    accessors: Arc<AccessorRegistry<D>>,
}

impl<D> Clone for FieldResolver<D> {
    fn clone(&self) -> Self {
        Self {
            accessors: Arc::clone(&self.accessors),
        }
    }
}

impl<D: Document> FieldResolver<D> {
    /// Create a resolver backed by the given accessors.
    #[must_use]
    pub const fn new(accessors: Arc<AccessorRegistry<D>>) -> Self {
        Self { accessors }
    }

    /// Resolve a chain against a document.
    ///
    /// Candidates are evaluated strictly in order and evaluation stops at the first
    /// non-empty value, so later accessors never run once a value is found. Returns
    /// `Ok(None)` when every candidate is empty (or the chain is empty).
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::MissingAccessor`] if a marked candidate is neither a
    /// schema attribute nor a registered accessor, and propagates accessor failures.
    pub async fn resolve_field(
        &self,
        chain: &FallbackChain,
        document: &D,
        caller: Option<&dyn Caller>,
    ) -> Result<Option<Value>> {
        for candidate in chain.iter() {
            let value = self.resolve_candidate(candidate, document, caller).await?;
            if !is_empty_value(&value) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn resolve_candidate(
        &self,
        candidate: &Candidate,
        document: &D,
        caller: Option<&dyn Caller>,
    ) -> Result<Value> {
        let accessor_name = match candidate.accessor_name() {
            Some(name) if !document.has_attribute(candidate.name()) => name,
            _ => {
                return Ok(document
                    .attribute(candidate.name())
                    .map_or(Value::Null, Attribute::into_plain));
            }
        };

        let model = document.model_name();
        let Some(accessor) = self.accessors.get(model, accessor_name) else {
            tracing::error!(
                model = %model,
                accessor = %accessor_name,
                "Projection accessor missing"
            );
            return Err(ProjectionError::MissingAccessor {
                model: model.to_string(),
                accessor: accessor_name.to_string(),
            });
        };

        accessor(document, caller).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::chain::ChainParser;
    use crate::config::ChainSyntax;
    use crate::context::RequestContext;
    use crate::document::JsonDocument;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chain(expression: &str) -> FallbackChain {
        ChainParser::new(ChainSyntax::default()).parse(Some(expression))
    }

    #[test]
    fn test_emptiness_rule() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!([null])));
        assert!(!is_empty_value(&json!("")));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!({})));
    }

    #[tokio::test]
    async fn test_empty_array_falls_through() {
        let resolver = FieldResolver::new(Arc::new(AccessorRegistry::new()));
        let doc = JsonDocument::new("user", "u-1")
            .with_attribute("aliases", json!([]))
            .with_attribute("names", json!(["ada"]));

        let value = resolver
            .resolve_field(&chain("aliases => names"), &doc, None)
            .await
            .unwrap();
        assert_eq!(value, Some(json!(["ada"])));
    }

    #[tokio::test]
    async fn test_first_non_empty_scalar_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let accessors = AccessorRegistry::<JsonDocument>::new().with_accessor(
            "user",
            "computed",
            move |_doc, _caller| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(json!("computed")) })
            },
        );
        let resolver = FieldResolver::new(Arc::new(accessors));
        let doc = JsonDocument::new("user", "u-1").with_attribute("username", json!("ada"));

        let value = resolver
            .resolve_field(&chain("username => _computed"), &doc, None)
            .await
            .unwrap();
        assert_eq!(value, Some(json!("ada")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let value = resolver
            .resolve_field(&chain("nickname => _computed"), &doc, None)
            .await
            .unwrap();
        assert_eq!(value, Some(json!("computed")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_accessor_is_an_error() {
        let resolver = FieldResolver::new(Arc::new(AccessorRegistry::new()));
        let doc = JsonDocument::new("user", "u-1");

        let err = resolver
            .resolve_field(&chain("_fullName"), &doc, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProjectionError::MissingAccessor {
                model: "user".to_string(),
                accessor: "fullName".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_marked_schema_attribute_is_read_as_stored() {
        let resolver = FieldResolver::new(Arc::new(AccessorRegistry::new()));
        let doc = JsonDocument::new("user", "u-1").with_attribute("_legacy", json!("old"));

        let value = resolver
            .resolve_field(&chain("_legacy"), &doc, None)
            .await
            .unwrap();
        assert_eq!(value, Some(json!("old")));
    }

    #[tokio::test]
    async fn test_accessor_receives_caller() {
        let accessors = AccessorRegistry::<JsonDocument>::new().with_accessor(
            "user",
            "viewer",
            |_doc, caller| {
                Box::pin(async move {
                    Ok(caller
                        .and_then(Caller::user_id)
                        .map_or(Value::Null, |id| json!(id)))
                })
            },
        );
        let resolver = FieldResolver::new(Arc::new(accessors));
        let doc = JsonDocument::new("user", "u-1");
        let ctx = RequestContext::new("viewer-9");

        let value = resolver
            .resolve_field(&chain("_viewer"), &doc, Some(&ctx))
            .await
            .unwrap();
        assert_eq!(value, Some(json!("viewer-9")));

        let anonymous = resolver
            .resolve_field(&chain("_viewer"), &doc, None)
            .await
            .unwrap();
        assert_eq!(anonymous, None);
    }

    #[tokio::test]
    async fn test_empty_chain_resolves_to_none() {
        let resolver = FieldResolver::new(Arc::new(AccessorRegistry::new()));
        let doc = JsonDocument::new("user", "u-1");
        let empty = ChainParser::new(ChainSyntax::default()).parse(None);

        assert_eq!(resolver.resolve_field(&empty, &doc, None).await.unwrap(), None);
    }
}
