//! Whole-document projection.
//!
//! # Resolution Order
//!
//! 1. Absent document → empty record
//! 2. Missing view name → [`ProjectionError::MissingPackageName`]
//! 3. Model without projections → [`ProjectionError::UnknownModelProjection`]
//! 4. Model without the view → [`ProjectionError::UnknownProjectionView`]
//! 5. Every configured field resolves concurrently; `_id` is always added
//!
//! Within one field the fallback chain is sequential; distinct fields share no state and
//! each writes its own key, so their resolution order is unspecified.

use crate::accessor::AccessorRegistry;
use crate::chain::ChainParser;
use crate::config::{ID_FIELD, ViewDefinition, ViewsConfig};
use crate::context::Caller;
use crate::document::Document;
use crate::error::{ProjectionError, Result};
use crate::record::ProjectedRecord;
use crate::resolver::FieldResolver;
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;

/// Applies named views to documents of type `D`.
#[derive(Debug)]
pub struct DocumentProjector<D> {
    config: Arc<ViewsConfig>,
    parser: ChainParser,
    resolver: FieldResolver<D>,
}

impl<D: Document> DocumentProjector<D> {
    /// Create a projector owning its accessor registry.
    #[must_use]
    pub fn new(config: Arc<ViewsConfig>, accessors: AccessorRegistry<D>) -> Self {
        Self::with_shared_accessors(config, Arc::new(accessors))
    }

    /// Create a projector sharing an accessor registry.
    #[must_use]
    pub fn with_shared_accessors(
        config: Arc<ViewsConfig>,
        accessors: Arc<AccessorRegistry<D>>,
    ) -> Self {
        Self {
            parser: ChainParser::from_config(&config),
            resolver: FieldResolver::new(accessors),
            config,
        }
    }

    /// Configuration this projector applies.
    #[must_use]
    pub fn config(&self) -> &ViewsConfig {
        &self.config
    }

    /// Look up the definition of `view` for `model`.
    ///
    /// # Errors
    ///
    /// - [`ProjectionError::MissingPackageName`] if `view` is absent or empty
    /// - [`ProjectionError::UnknownModelProjection`] if the model has no views
    /// - [`ProjectionError::UnknownProjectionView`] if the model lacks this view
    pub fn view_definition(&self, model: &str, view: Option<&str>) -> Result<&ViewDefinition> {
        let view = view
            .filter(|view| !view.is_empty())
            .ok_or(ProjectionError::MissingPackageName)?;

        let views = self.config.model_views(model).ok_or_else(|| {
            ProjectionError::UnknownModelProjection {
                model: model.to_string(),
            }
        })?;

        views
            .get(view)
            .ok_or_else(|| ProjectionError::UnknownProjectionView {
                model: model.to_string(),
                view: view.to_string(),
            })
    }

    /// Eager-load paths declared for a view; empty when the view is unknown.
    #[must_use]
    pub fn populate_paths(&self, model: &str, view: &str) -> &[String] {
        self.config
            .view(model, view)
            .map(ViewDefinition::populate_paths)
            .unwrap_or_default()
    }

    /// Project one document through a view.
    ///
    /// # Errors
    ///
    /// Returns the lookup errors of [`DocumentProjector::view_definition`], and
    /// propagates field resolution errors such as
    /// [`ProjectionError::MissingAccessor`]. No partial record is returned on failure.
    pub async fn project(
        &self,
        document: Option<&D>,
        view: Option<&str>,
        caller: Option<&dyn Caller>,
    ) -> Result<ProjectedRecord> {
        let Some(document) = document else {
            return Ok(ProjectedRecord::new());
        };

        let definition = self.view_definition(document.model_name(), view)?;

        let chains: Vec<_> = definition
            .fields()
            .filter(|(field, _)| *field != ID_FIELD)
            .map(|(field, expression)| (field, self.parser.parse(Some(expression))))
            .collect();

        let resolved = try_join_all(chains.iter().map(|(field, chain)| async move {
            let value = self.resolver.resolve_field(chain, document, caller).await?;
            Ok::<_, ProjectionError>(((*field).to_string(), value.unwrap_or(Value::Null)))
        }))
        .await?;

        let mut record: ProjectedRecord = resolved.into_iter().collect();
        record.insert(ID_FIELD, Value::String(document.id()));

        tracing::trace!(
            model = %document.model_name(),
            view = ?view,
            fields = record.len(),
            "Projected document"
        );

        Ok(record)
    }
}
