//! Projected output records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Plain output of a projection: output field name → resolved value.
///
/// Fields whose chain produced no value are present with `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectedRecord(Map<String, Value>);

impl ProjectedRecord {
    /// Create an empty record (the projection of an absent document).
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Value of one field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a field.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<ProjectedRecord> for Value {
    fn from(record: ProjectedRecord) -> Self {
        Self::Object(record.0)
    }
}

impl From<Map<String, Value>> for ProjectedRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for ProjectedRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
