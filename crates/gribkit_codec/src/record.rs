//! Decoded record: an ordered key/value schema with missing flags.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Reserved key holding the bulk numeric payload.
pub const VALUES_KEY: &str = "values";

/// One key of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Key name.
    pub name: String,
    /// Namespaces the key is listed under.
    pub namespaces: Vec<String>,
    /// Stored value; `None` marks the key missing.
    pub value: Option<Value>,
}

/// A decoded record.
///
/// Field order is the record's natural key order and is preserved across
/// encode/decode. When a name occurs more than once, reads and writes
/// address the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    /// Starts building a record.
    #[must_use]
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// All fields in natural order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == key)
    }

    fn field_mut(&mut self, key: &str) -> CodecResult<&mut Field> {
        self.fields
            .iter_mut()
            .find(|f| f.name == key)
            .ok_or_else(|| CodecError::key_not_found(key))
    }

    /// Returns true if the key is present (missing or not).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Key names in natural order, optionally restricted to a namespace.
    #[must_use]
    pub fn keys(&self, namespace: Option<&str>) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| namespace.map_or(true, |ns| f.namespaces.iter().any(|n| n == ns)))
            .map(|f| f.name.clone())
            .collect()
    }

    /// The stored value, `Ok(None)` if the key is marked missing.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::KeyNotFound`] if the key is absent.
    pub fn get(&self, key: &str) -> CodecResult<Option<&Value>> {
        self.field(key)
            .map(|f| f.value.as_ref())
            .ok_or_else(|| CodecError::key_not_found(key))
    }

    /// Replaces the value of an existing key, clearing its missing flag.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::KeyNotFound`] if the key is absent.
    pub fn set(&mut self, key: &str, value: Value) -> CodecResult<()> {
        self.field_mut(key)?.value = Some(value);
        Ok(())
    }

    /// Returns true if the key is marked missing.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::KeyNotFound`] if the key is absent.
    pub fn is_missing(&self, key: &str) -> CodecResult<bool> {
        self.get(key).map(|v| v.is_none())
    }

    /// Marks an existing key missing.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::KeyNotFound`] if the key is absent.
    pub fn set_missing(&mut self, key: &str) -> CodecResult<()> {
        self.field_mut(key)?.value = None;
        Ok(())
    }
}

/// Builder for [`Record`], used by samples and fixtures.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    fields: Vec<Field>,
}

impl RecordBuilder {
    /// Appends a key outside any namespace.
    #[must_use]
    pub fn field(self, name: &str, value: impl Into<Value>) -> Self {
        self.field_in(name, &[], value)
    }

    /// Appends a key listed under the given namespaces.
    #[must_use]
    pub fn field_in(mut self, name: &str, namespaces: &[&str], value: impl Into<Value>) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            namespaces: namespaces.iter().map(|s| (*s).to_string()).collect(),
            value: Some(value.into()),
        });
        self
    }

    /// Appends a key that is marked missing.
    #[must_use]
    pub fn missing_in(mut self, name: &str, namespaces: &[&str]) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            namespaces: namespaces.iter().map(|s| (*s).to_string()).collect(),
            value: None,
        });
        self
    }

    /// Finishes the record.
    #[must_use]
    pub fn build(self) -> Record {
        Record {
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::builder()
            .field_in("shortName", &["ls", "parameter"], "msl")
            .field_in("stepRange", &["ls", "time"], "6")
            .missing_in("scaleFactorOfSecondFixedSurface", &[])
            .field(VALUES_KEY, vec![1.0, 2.0])
            .build()
    }

    #[test]
    fn keys_keep_natural_order() {
        let r = record();
        assert_eq!(
            r.keys(None),
            vec![
                "shortName",
                "stepRange",
                "scaleFactorOfSecondFixedSurface",
                "values"
            ]
        );
        assert_eq!(r.keys(Some("time")), vec!["stepRange"]);
        assert!(r.keys(Some("geography")).is_empty());
    }

    #[test]
    fn missing_flag_round_trip() {
        let mut r = record();
        assert!(r.is_missing("scaleFactorOfSecondFixedSurface").unwrap());

        r.set("scaleFactorOfSecondFixedSurface", Value::Long(5)).unwrap();
        assert!(!r.is_missing("scaleFactorOfSecondFixedSurface").unwrap());

        r.set_missing("scaleFactorOfSecondFixedSurface").unwrap();
        assert_eq!(r.get("scaleFactorOfSecondFixedSurface").unwrap(), None);
    }

    #[test]
    fn absent_keys_are_errors() {
        let mut r = record();
        assert!(!r.contains("nope"));
        assert!(matches!(r.get("nope"), Err(CodecError::KeyNotFound { .. })));
        assert!(matches!(
            r.set("nope", Value::Long(1)),
            Err(CodecError::KeyNotFound { .. })
        ));
        assert!(matches!(
            r.set_missing("nope"),
            Err(CodecError::KeyNotFound { .. })
        ));
    }
}
