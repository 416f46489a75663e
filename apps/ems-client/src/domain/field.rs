//! Message Field Model
//!
//! Generic typed fields for venue messages: every message is a set of
//! named values which may be strings, integers, floats, date-times,
//! booleans, nested groups, or repeated groups.
//!
//! Venue messages are sparse: most fields are optional and absent fields
//! are read with a default. The `*_or` accessors implement that
//! check-then-read pattern once; the `require_*` accessors are for fields
//! a decoder cannot proceed without.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Errors
// =============================================================================

/// Failure to decode a message into a typed payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A required field was absent.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A field was present with an unexpected value shape.
    #[error("field `{field}` is not a {expected}")]
    WrongType {
        /// Field name as it appeared in the message.
        field: String,
        /// The shape the decoder needed.
        expected: &'static str,
    },

    /// The message type tag did not match any known payload.
    #[error("unexpected message type `{0}`")]
    UnexpectedMessageType(String),

    /// A numeric field could not be represented in the target type.
    #[error("field `{0}` is out of range")]
    OutOfRange(String),
}

// =============================================================================
// Field Values
// =============================================================================

/// A single typed field value.
///
/// Untagged variant order matters for deserialization: date-times must
/// precede plain strings or an RFC 3339 value reads back as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Date-time value (UTC).
    DateTime(DateTime<Utc>),
    /// Text value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Nested group of named fields.
    Group(FieldMap),
    /// Repeated group.
    Array(Vec<FieldValue>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<FieldMap> for FieldValue {
    fn from(value: FieldMap) -> Self {
        Self::Group(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self {
        Self::Array(value)
    }
}

// =============================================================================
// Field Map
// =============================================================================

/// Named field container carried by every message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    entries: BTreeMap<String, FieldValue>,
}

impl FieldMap {
    /// Create an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Builder-style insert for literal construction.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.get(name)
    }

    /// Whether a field exists under this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    // -------------------------------------------------------------------------
    // Decode-with-default accessors
    // -------------------------------------------------------------------------

    /// Read a string field, or the default when absent or mistyped.
    #[must_use]
    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.get(name) {
            Some(FieldValue::Str(s)) => s.as_str(),
            _ => default,
        }
    }

    /// Read an integer field, or the default when absent or mistyped.
    #[must_use]
    pub fn i64_or(&self, name: &str, default: i64) -> i64 {
        match self.get(name) {
            Some(FieldValue::Int(n)) => *n,
            _ => default,
        }
    }

    /// Read a float field, or the default when absent or mistyped.
    ///
    /// Integer values widen to float, matching venue schemas that relax
    /// numeric field types between versions.
    #[must_use]
    pub fn f64_or(&self, name: &str, default: f64) -> f64 {
        match self.get(name) {
            Some(FieldValue::Float(x)) => *x,
            #[allow(clippy::cast_precision_loss)]
            Some(FieldValue::Int(n)) => *n as f64,
            _ => default,
        }
    }

    /// Read a boolean field, or the default when absent or mistyped.
    #[must_use]
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(FieldValue::Bool(b)) => *b,
            _ => default,
        }
    }

    /// Read a date-time field, or the default when absent or mistyped.
    #[must_use]
    pub fn date_time_or(&self, name: &str, default: DateTime<Utc>) -> DateTime<Utc> {
        match self.get(name) {
            Some(FieldValue::DateTime(t)) => *t,
            _ => default,
        }
    }

    // -------------------------------------------------------------------------
    // Checked accessors
    // -------------------------------------------------------------------------

    /// Read a required string field.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the field is absent or not a string.
    pub fn require_str(&self, name: &str) -> Result<&str, DecodeError> {
        match self.get(name) {
            Some(FieldValue::Str(s)) => Ok(s.as_str()),
            Some(_) => Err(DecodeError::WrongType {
                field: name.to_string(),
                expected: "string",
            }),
            None => Err(DecodeError::MissingField(name.to_string())),
        }
    }

    /// Read a required integer field.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the field is absent or not an integer.
    pub fn require_i64(&self, name: &str) -> Result<i64, DecodeError> {
        match self.get(name) {
            Some(FieldValue::Int(n)) => Ok(*n),
            Some(_) => Err(DecodeError::WrongType {
                field: name.to_string(),
                expected: "integer",
            }),
            None => Err(DecodeError::MissingField(name.to_string())),
        }
    }

    /// Read a required float field (integers widen).
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the field is absent or not numeric.
    pub fn require_f64(&self, name: &str) -> Result<f64, DecodeError> {
        match self.get(name) {
            Some(FieldValue::Float(x)) => Ok(*x),
            #[allow(clippy::cast_precision_loss)]
            Some(FieldValue::Int(n)) => Ok(*n as f64),
            Some(_) => Err(DecodeError::WrongType {
                field: name.to_string(),
                expected: "float",
            }),
            None => Err(DecodeError::MissingField(name.to_string())),
        }
    }

    /// Read a required boolean field.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the field is absent or not a boolean.
    pub fn require_bool(&self, name: &str) -> Result<bool, DecodeError> {
        match self.get(name) {
            Some(FieldValue::Bool(b)) => Ok(*b),
            Some(_) => Err(DecodeError::WrongType {
                field: name.to_string(),
                expected: "boolean",
            }),
            None => Err(DecodeError::MissingField(name.to_string())),
        }
    }

    /// Read a required date-time field.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the field is absent or not a date-time.
    pub fn require_date_time(&self, name: &str) -> Result<DateTime<Utc>, DecodeError> {
        match self.get(name) {
            Some(FieldValue::DateTime(t)) => Ok(*t),
            Some(_) => Err(DecodeError::WrongType {
                field: name.to_string(),
                expected: "date-time",
            }),
            None => Err(DecodeError::MissingField(name.to_string())),
        }
    }

    /// Read a required nested group.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the field is absent or not a group.
    pub fn require_group(&self, name: &str) -> Result<&Self, DecodeError> {
        match self.get(name) {
            Some(FieldValue::Group(g)) => Ok(g),
            Some(_) => Err(DecodeError::WrongType {
                field: name.to_string(),
                expected: "group",
            }),
            None => Err(DecodeError::MissingField(name.to_string())),
        }
    }

    /// Read a required repeated group.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the field is absent or not repeated.
    pub fn require_array(&self, name: &str) -> Result<&[FieldValue], DecodeError> {
        match self.get(name) {
            Some(FieldValue::Array(items)) => Ok(items.as_slice()),
            Some(_) => Err(DecodeError::WrongType {
                field: name.to_string(),
                expected: "array",
            }),
            None => Err(DecodeError::MissingField(name.to_string())),
        }
    }

    /// Read an optional repeated group; absent reads as empty.
    #[must_use]
    pub fn array_or_empty(&self, name: &str) -> &[FieldValue] {
        match self.get(name) {
            Some(FieldValue::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }
}

impl FromIterator<(String, FieldValue)> for FieldMap {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> FieldMap {
        FieldMap::new()
            .with("ticker", "IBM US")
            .with("amount", 4500_i64)
            .with("limitPrice", 123.45)
            .with("working", true)
    }

    #[test]
    fn defaults_apply_for_absent_fields() {
        let fields = sample();
        assert_eq!(fields.str_or("broker", "-"), "-");
        assert_eq!(fields.i64_or("routeId", 0), 0);
        assert!((fields.f64_or("avgPrice", 0.0) - 0.0).abs() < f64::EPSILON);
        assert!(!fields.bool_or("isManual", false));
    }

    #[test]
    fn defaults_apply_for_mistyped_fields() {
        let fields = sample();
        // "amount" is an integer, not a string.
        assert_eq!(fields.str_or("amount", "-"), "-");
    }

    #[test]
    fn present_fields_read_through() {
        let fields = sample();
        assert_eq!(fields.str_or("ticker", "-"), "IBM US");
        assert_eq!(fields.i64_or("amount", 0), 4500);
        assert!((fields.f64_or("limitPrice", 0.0) - 123.45).abs() < f64::EPSILON);
        assert!(fields.bool_or("working", false));
    }

    #[test]
    fn integers_widen_to_float() {
        let fields = sample();
        assert!((fields.f64_or("amount", 0.0) - 4500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn require_reports_missing_and_mistyped() {
        let fields = sample();
        assert_eq!(
            fields.require_str("broker"),
            Err(DecodeError::MissingField("broker".to_string()))
        );
        assert_eq!(
            fields.require_str("amount"),
            Err(DecodeError::WrongType {
                field: "amount".to_string(),
                expected: "string",
            })
        );
    }

    #[test]
    fn nested_groups_round_trip() {
        let inner = FieldMap::new().with("name", "VWAP").with("fixValue", "V");
        let fields = FieldMap::new().with("strategy", inner.clone());
        assert_eq!(fields.require_group("strategy"), Ok(&inner));
    }

    #[test]
    fn date_time_fields_read_back() {
        let t = Utc.with_ymd_and_hms(2024, 11, 3, 14, 30, 0).unwrap();
        let fields = FieldMap::new().with("dateTimeOfFill", t);
        assert_eq!(fields.require_date_time("dateTimeOfFill"), Ok(t));
    }
}
