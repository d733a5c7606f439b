//! Document abstraction consumed by the projection engine.
//!
//! The engine never talks to a concrete database driver. It reads documents through the
//! [`Document`] trait, which exposes:
//!
//! - the model name and identifier
//! - a schema check (`has_attribute`) used to tell stored attributes from accessors
//! - raw attribute access by (dotted) path
//! - plain conversion that keeps virtual fields
//!
//! [`JsonDocument`] is a ready-made implementation over `serde_json` values, used by the
//! in-memory store and by hosts whose driver already yields JSON.

use crate::config::ID_FIELD;
use crate::error::{ProjectionError, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Raw value of a stored attribute.
#[derive(Debug, Clone)]
pub enum Attribute {
    /// Plain JSON value
    Value(Value),
    /// Nested document; converted with [`Document::to_plain`] before use
    Embedded(Arc<dyn Document>),
    /// Sequence whose elements may be nested documents
    List(Vec<Attribute>),
}

impl Attribute {
    /// Convert to a plain JSON value, applying plain conversion to nested documents
    /// element-wise.
    #[must_use]
    pub fn into_plain(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Embedded(document) => document.to_plain(),
            Self::List(items) => Value::Array(items.into_iter().map(Self::into_plain).collect()),
        }
    }
}

/// A loaded source document.
///
/// # Dyn Compatibility
///
/// The trait is object safe so nested documents can be carried as
/// `Arc<dyn Document>` inside [`Attribute::Embedded`].
pub trait Document: Send + Sync + fmt::Debug {
    /// Model (collection) name of the document.
    fn model_name(&self) -> &str;

    /// Document identifier, used as the `_id` field and as the publication `refId`.
    fn id(&self) -> String;

    /// Whether `path` is a stored attribute in the model's schema.
    ///
    /// Chain candidates carrying the accessor marker are only treated as computed
    /// accessors when this returns `false`.
    fn has_attribute(&self, path: &str) -> bool;

    /// Raw attribute value at `path`, or `None` if unset.
    fn attribute(&self, path: &str) -> Option<Attribute>;

    /// Plain record of the document including virtual fields.
    fn to_plain(&self) -> Value;
}

/// Nested document(s) stored under one attribute of a [`JsonDocument`].
#[derive(Debug, Clone, PartialEq)]
pub enum Embedded {
    /// Single related document
    One(Arc<JsonDocument>),
    /// Sequence of related documents
    Many(Vec<Arc<JsonDocument>>),
}

impl Embedded {
    fn to_attribute(&self) -> Attribute {
        match self {
            Self::One(document) => Attribute::Embedded(document.clone()),
            Self::Many(documents) => Attribute::List(
                documents
                    .iter()
                    .map(|document| Attribute::Embedded(document.clone() as Arc<dyn Document>))
                    .collect(),
            ),
        }
    }
}

/// JSON-backed document.
///
/// # Example
///
/// ```
/// use docview_core::document::{Document, JsonDocument};
/// use serde_json::json;
///
/// let user = JsonDocument::new("user", "u-1")
///     .with_attribute("username", json!("ada"))
///     .with_attribute("profile", json!({ "city": "London" }))
///     .with_virtual("initials", json!("A"));
///
/// assert!(user.has_attribute("profile.city"));
/// assert_eq!(user.to_plain()["initials"], json!("A"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    model: String,
    id: String,
    schema: BTreeSet<String>,
    attributes: Map<String, Value>,
    virtuals: Map<String, Value>,
    embedded: BTreeMap<String, Embedded>,
}

impl JsonDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
            schema: BTreeSet::new(),
            attributes: Map::new(),
            virtuals: Map::new(),
            embedded: BTreeMap::new(),
        }
    }

    /// Build a document from a JSON object carrying an `_id` field.
    ///
    /// Every other top-level key becomes a stored attribute.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Serialization`] if `value` is not an object or has no
    /// string/number `_id`.
    pub fn from_value(model: impl Into<String>, value: Value) -> Result<Self> {
        let Value::Object(mut attributes) = value else {
            return Err(ProjectionError::Serialization(
                "document must be a JSON object".to_string(),
            ));
        };
        let id = match attributes.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(ProjectionError::Serialization(format!(
                    "document must carry a string or number {ID_FIELD}"
                )));
            }
        };

        let mut document = Self::new(model, id);
        document.schema = attributes.keys().cloned().collect();
        document.attributes = attributes;
        Ok(document)
    }

    /// Set a stored attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Declare a schema attribute without setting it.
    #[must_use]
    pub fn declare(mut self, name: impl Into<String>) -> Self {
        self.schema.insert(name.into());
        self
    }

    /// Set a virtual (computed, non-schema) field included in plain conversion.
    #[must_use]
    pub fn with_virtual(mut self, name: impl Into<String>, value: Value) -> Self {
        self.virtuals.insert(name.into(), value);
        self
    }

    /// Embed a related document under `name`.
    #[must_use]
    pub fn with_embedded(mut self, name: impl Into<String>, document: Self) -> Self {
        self.embed(name, Embedded::One(Arc::new(document)));
        self
    }

    /// Embed a sequence of related documents under `name`.
    #[must_use]
    pub fn with_embedded_list(mut self, name: impl Into<String>, documents: Vec<Self>) -> Self {
        self.embed(
            name,
            Embedded::Many(documents.into_iter().map(Arc::new).collect()),
        );
        self
    }

    /// Set a stored attribute in place.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.embedded.remove(&name);
        self.schema.insert(name.clone());
        self.attributes.insert(name, value);
    }

    /// Replace an attribute with embedded documents (eager-loading).
    pub fn embed(&mut self, name: impl Into<String>, embedded: Embedded) {
        let name = name.into();
        self.attributes.remove(&name);
        self.schema.insert(name.clone());
        self.embedded.insert(name, embedded);
    }

    /// Stored attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Embedded documents under `name`, if any.
    #[must_use]
    pub fn embedded(&self, name: &str) -> Option<&Embedded> {
        self.embedded.get(name)
    }
}

impl Document for JsonDocument {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn has_attribute(&self, path: &str) -> bool {
        if path == ID_FIELD || self.schema.contains(path) {
            return true;
        }
        path.split_once('.')
            .is_some_and(|(head, _)| self.schema.contains(head))
    }

    fn attribute(&self, path: &str) -> Option<Attribute> {
        if path == ID_FIELD {
            return Some(Attribute::Value(Value::String(self.id.clone())));
        }
        if let Some(embedded) = self.embedded.get(path) {
            return Some(embedded.to_attribute());
        }
        if let Some((head, rest)) = path.split_once('.') {
            match self.embedded.get(head) {
                Some(Embedded::One(document)) => return document.attribute(rest),
                Some(Embedded::Many(documents)) => {
                    let (index, rest) = match rest.split_once('.') {
                        Some((index, rest)) => (index, Some(rest)),
                        None => (rest, None),
                    };
                    let document = index
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| documents.get(index))?;
                    return match rest {
                        Some(rest) => document.attribute(rest),
                        None => Some(Attribute::Embedded(document.clone())),
                    };
                }
                None => {}
            }
        }

        lookup(&self.attributes, path)
            .or_else(|| lookup(&self.virtuals, path))
            .cloned()
            .map(Attribute::Value)
    }

    fn to_plain(&self) -> Value {
        let mut plain = Map::new();
        plain.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        plain.extend(self.attributes.clone());
        plain.extend(self.virtuals.clone());
        for (name, embedded) in &self.embedded {
            plain.insert(name.clone(), embedded.to_attribute().into_plain());
        }
        Value::Object(plain)
    }
}

/// Dotted-path lookup through nested objects and array indices.
fn lookup<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
