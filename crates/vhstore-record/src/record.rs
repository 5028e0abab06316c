//! Configuration record type
//!
//! Provides [`Record`], the immutable snapshot of one persisted configuration
//! entity. Every transformation produces a new record carrying the same id.

use crate::category;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identifier of a configuration record
///
/// Stable across rewrites of the same logical entity.
pub type RecordId = Uuid;

/// Ordered attribute mapping of a record
pub type Attributes = serde_json::Map<String, Value>;

/// Parent references keyed by parent category
pub type Parents = BTreeMap<String, RecordId>;

/// Immutable snapshot of one configuration entity
///
/// # Invariants
/// - `id` is unique within a record set
/// - Records are never mutated; the `with_*`/`without_*` methods return a
///   replacement carrying the same id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,

    #[serde(rename = "type")]
    category: String,

    #[serde(default)]
    attributes: Attributes,

    #[serde(default)]
    parents: Parents,
}

impl Record {
    /// Create new record
    #[inline]
    #[must_use]
    pub fn new(
        id: RecordId,
        category: impl Into<String>,
        attributes: Attributes,
        parents: Parents,
    ) -> Self {
        Self {
            id,
            category: category.into(),
            attributes,
            parents,
        }
    }

    /// Parse a record from its JSON form
    ///
    /// # Errors
    /// Returns error if the document is not a valid record
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(RecordError::from)
    }

    /// Serialize the record to JSON
    ///
    /// # Errors
    /// Returns error if an attribute value cannot be serialized
    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string(self).map_err(RecordError::from)
    }

    /// Record id
    #[inline]
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Category tag as persisted (may be fully qualified in old stores)
    #[inline]
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Whether this record belongs to `short` category, in either the short
    /// or the fully qualified spelling
    #[inline]
    #[must_use]
    pub fn is_category(&self, short: &str) -> bool {
        category::short_name(&self.category) == short
    }

    /// All attributes
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Single attribute
    #[inline]
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute as string, if present and a JSON string
    #[inline]
    #[must_use]
    pub fn string_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Whether the attribute is present (null counts as present)
    #[inline]
    #[must_use]
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// The `name` attribute
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.string_attribute(crate::attr::NAME)
    }

    /// All parent references
    #[inline]
    #[must_use]
    pub fn parents(&self) -> &Parents {
        &self.parents
    }

    /// Parent id for the given parent category
    #[inline]
    #[must_use]
    pub fn parent(&self, category: &str) -> Option<RecordId> {
        self.parents.get(category).copied()
    }

    /// Replacement record with a different category tag
    #[must_use]
    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..self.clone()
        }
    }

    /// Replacement record with a new attribute mapping
    #[must_use]
    pub fn with_attributes(&self, attributes: Attributes) -> Self {
        Self {
            id: self.id,
            category: self.category.clone(),
            attributes,
            parents: self.parents.clone(),
        }
    }

    /// Replacement record with one attribute set
    #[must_use]
    pub fn with_attribute(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.insert(key.into(), value.into());
        self.with_attributes(attributes)
    }

    /// Replacement record with one attribute removed
    #[must_use]
    pub fn without_attribute(&self, key: &str) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.shift_remove(key);
        self.with_attributes(attributes)
    }

    /// Replacement record with new parent references
    #[must_use]
    pub fn with_parents(&self, parents: Parents) -> Self {
        Self {
            parents,
            ..self.clone()
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}[{}] '{}'", self.category, self.id, name),
            None => write!(f, "{}[{}]", self.category, self.id),
        }
    }
}

/// Builder for records
///
/// Mostly useful for fixtures and synthesized records.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    id: RecordId,
    category: String,
    attributes: Attributes,
    parents: Parents,
}

impl RecordBuilder {
    /// Start a record with a fresh random id
    #[inline]
    #[must_use]
    pub fn new(category: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), category)
    }

    /// Start a record with an explicit id
    #[inline]
    #[must_use]
    pub fn with_id(id: RecordId, category: impl Into<String>) -> Self {
        Self {
            id,
            category: category.into(),
            attributes: Attributes::new(),
            parents: Parents::new(),
        }
    }

    /// Set an attribute
    #[inline]
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the `name` attribute
    #[inline]
    #[must_use]
    pub fn name(self, name: impl Into<String>) -> Self {
        self.attribute(crate::attr::NAME, name.into())
    }

    /// Add a parent reference
    #[inline]
    #[must_use]
    pub fn parent(mut self, category: impl Into<String>, id: RecordId) -> Self {
        self.parents.insert(category.into(), id);
        self
    }

    /// Finish the record
    #[inline]
    #[must_use]
    pub fn build(self) -> Record {
        Record::new(self.id, self.category, self.attributes, self.parents)
    }
}

/// Record errors
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Record JSON could not be parsed or produced
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}
