//! Static view configuration.
//!
//! Configuration is loaded once at startup and shared read-only (`Arc<ViewsConfig>`) by
//! the chain parser, the projector, the permission gate and the synchronizer.
//!
//! # Format
//!
//! ```json
//! {
//!   "projections": {
//!     "user": {
//!       "list": { "name": "displayName => username", "avatar": "_avatarUrl" },
//!       "detail": { "name": "username", "team": "team", "_populate": "team" }
//!     }
//!   },
//!   "publish": {
//!     "user": {
//!       "list": true,
//!       "detail": { "condition": { "status": "active" } }
//!     }
//!   },
//!   "public": { "user": ["list"] },
//!   "syntax": { "separator": "=>", "accessor_marker": "_" }
//! }
//! ```
//!
//! Every section is optional.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

/// Default separator between fallback-chain candidates.
pub const DEFAULT_SEPARATOR: &str = "=>";

/// Default prefix marking a computed-accessor candidate.
pub const DEFAULT_ACCESSOR_MARKER: char = '_';

/// Identifier field present in every projected record.
pub const ID_FIELD: &str = "_id";

/// Reserved view key declaring related documents to eager-load.
pub const POPULATE_KEY: &str = "_populate";

/// Environment variable holding the path of the JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "DOCVIEW_CONFIG";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(String),

    /// Configuration could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Invalid(String),
}

/// Fallback-chain syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSyntax {
    /// Separator between candidates (default `=>`)
    pub separator: String,
    /// Prefix marking a computed accessor (default `_`)
    pub accessor_marker: char,
}

impl Default for ChainSyntax {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            accessor_marker: DEFAULT_ACCESSOR_MARKER,
        }
    }
}

/// Field map of one view: output field name → fallback-chain expression.
///
/// The reserved [`POPULATE_KEY`] entry is kept apart from the output fields; it lists
/// related-document paths the query interceptor eager-loads before projecting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, ViewEntry>")]
pub struct ViewDefinition {
    fields: BTreeMap<String, String>,
    populate: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ViewEntry {
    Expression(String),
    Paths(Vec<String>),
}

impl TryFrom<BTreeMap<String, ViewEntry>> for ViewDefinition {
    type Error = String;

    fn try_from(entries: BTreeMap<String, ViewEntry>) -> Result<Self, Self::Error> {
        let mut definition = Self::new();
        for (key, entry) in entries {
            match (key.as_str(), entry) {
                (POPULATE_KEY, ViewEntry::Expression(paths)) => {
                    definition
                        .populate
                        .extend(paths.split_whitespace().map(str::to_string));
                }
                (POPULATE_KEY, ViewEntry::Paths(paths)) => definition.populate.extend(paths),
                (_, ViewEntry::Expression(expression)) => {
                    definition.fields.insert(key, expression);
                }
                (_, ViewEntry::Paths(_)) => {
                    return Err(format!(
                        "field `{key}` must be a fallback-chain expression"
                    ));
                }
            }
        }
        Ok(definition)
    }
}

impl ViewDefinition {
    /// Create an empty view.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            populate: Vec::new(),
        }
    }

    /// Add an output field with its fallback-chain expression.
    ///
    /// Using [`POPULATE_KEY`] as the name declares eager-load paths instead.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        let name = name.into();
        let expression = expression.into();
        if name == POPULATE_KEY {
            self.populate
                .extend(expression.split_whitespace().map(str::to_string));
        } else {
            self.fields.insert(name, expression);
        }
        self
    }

    /// Declare a related-document path to eager-load.
    #[must_use]
    pub fn populate(mut self, path: impl Into<String>) -> Self {
        self.populate.push(path.into());
        self
    }

    /// Output fields and their expressions, ordered by field name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Expression configured for one output field.
    #[must_use]
    pub fn expression(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Eager-load paths.
    #[must_use]
    pub fn populate_paths(&self) -> &[String] {
        &self.populate
    }
}

/// Condition map of a publish rule: source field path → required value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition(BTreeMap<String, Value>);

impl Condition {
    /// Create an empty condition (always holds).
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Require `path` to equal `value`.
    #[must_use]
    pub fn require(mut self, path: impl Into<String>, value: Value) -> Self {
        self.0.insert(path.into(), value);
        self
    }

    /// Path/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the condition has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Publication rule for one view of a model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPublishRule")]
pub enum PublishRule {
    /// Always publish (`true` in configuration)
    Always,
    /// Publish only while every condition pair matches the live document
    When(Condition),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPublishRule {
    Flag(bool),
    Conditional { condition: BTreeMap<String, Value> },
}

impl TryFrom<RawPublishRule> for PublishRule {
    type Error = String;

    fn try_from(raw: RawPublishRule) -> Result<Self, Self::Error> {
        match raw {
            RawPublishRule::Flag(true) => Ok(Self::Always),
            RawPublishRule::Flag(false) => Err(
                "publish rule must be `true` or an object with a `condition`; remove the view instead of setting `false`"
                    .to_string(),
            ),
            RawPublishRule::Conditional { condition } => Ok(Self::When(Condition(condition))),
        }
    }
}

/// Complete view configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewsConfig {
    projections: BTreeMap<String, BTreeMap<String, ViewDefinition>>,
    publish: BTreeMap<String, BTreeMap<String, PublishRule>>,
    public: BTreeMap<String, BTreeSet<String>>,
    syntax: ChainSyntax,
}

impl ViewsConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and [`ConfigError::Invalid`]
    /// when validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the errors of
    /// [`ViewsConfig::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Load the file named by the `DOCVIEW_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvVarNotSet`] if the variable is missing, otherwise the
    /// errors of [`ViewsConfig::from_file`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .map_err(|_| ConfigError::EnvVarNotSet(CONFIG_ENV_VAR.to_string()))?;
        Self::from_file(path)
    }

    /// Validate cross-section consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty separator, a whitespace accessor
    /// marker, empty model or view names, or a published view without a projection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.syntax.separator.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "chain separator must not be empty".to_string(),
            ));
        }
        if self.syntax.accessor_marker.is_whitespace() {
            return Err(ConfigError::Invalid(
                "accessor marker must not be whitespace".to_string(),
            ));
        }

        for (model, views) in &self.projections {
            if model.is_empty() {
                return Err(ConfigError::Invalid("empty model name".to_string()));
            }
            if views.keys().any(String::is_empty) {
                return Err(ConfigError::Invalid(format!(
                    "empty view name for model {model}"
                )));
            }
        }

        for (model, views) in &self.publish {
            for view in views.keys() {
                if self.view(model, view).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "published view {model}.{view} has no projection definition"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Add (or replace) a projection view.
    #[must_use]
    pub fn with_projection(
        mut self,
        model: impl Into<String>,
        view: impl Into<String>,
        definition: ViewDefinition,
    ) -> Self {
        self.projections
            .entry(model.into())
            .or_default()
            .insert(view.into(), definition);
        self
    }

    /// Add (or replace) a publish rule.
    #[must_use]
    pub fn with_publish(
        mut self,
        model: impl Into<String>,
        view: impl Into<String>,
        rule: PublishRule,
    ) -> Self {
        self.publish
            .entry(model.into())
            .or_default()
            .insert(view.into(), rule);
        self
    }

    /// Allow a view to be used without a permission check.
    #[must_use]
    pub fn with_public_view(mut self, model: impl Into<String>, view: impl Into<String>) -> Self {
        self.public
            .entry(model.into())
            .or_default()
            .insert(view.into());
        self
    }

    /// Replace the chain syntax.
    #[must_use]
    pub fn with_syntax(mut self, syntax: ChainSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// All views configured for a model.
    #[must_use]
    pub fn model_views(&self, model: &str) -> Option<&BTreeMap<String, ViewDefinition>> {
        self.projections.get(model)
    }

    /// One view of a model.
    #[must_use]
    pub fn view(&self, model: &str, view: &str) -> Option<&ViewDefinition> {
        self.projections.get(model)?.get(view)
    }

    /// Publish rules of a model, ordered by view name.
    #[must_use]
    pub fn publish_rules(&self, model: &str) -> Option<&BTreeMap<String, PublishRule>> {
        self.publish.get(model).filter(|rules| !rules.is_empty())
    }

    /// Whether a view is on the public allow-list.
    #[must_use]
    pub fn is_public(&self, model: &str, view: &str) -> bool {
        self.public
            .get(model)
            .is_some_and(|views| views.contains(view))
    }

    /// Chain syntax.
    #[must_use]
    pub const fn syntax(&self) -> &ChainSyntax {
        &self.syntax
    }
}
