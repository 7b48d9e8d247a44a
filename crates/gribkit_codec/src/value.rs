//! Dynamic value type stored under record keys.

use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The representation a caller asks a key to be read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// Signed 64-bit integer.
    Long,
    /// 64-bit floating point.
    Double,
    /// Text.
    Text,
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Long => f.write_str("long"),
            NativeType::Double => f.write_str("double"),
            NativeType::Text => f.write_str("text"),
        }
    }
}

/// A value held by a record key.
///
/// The scalar/array distinction is part of the variant, so writers pick
/// the scalar or array path from the tag rather than by inspecting the
/// data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Integer scalar.
    Long(i64),
    /// Floating point scalar.
    Double(f64),
    /// Text scalar.
    Text(String),
    /// Integer array.
    LongArray(Vec<i64>),
    /// Floating point array.
    DoubleArray(Vec<f64>),
}

impl Value {
    /// Returns true for the array variants.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::LongArray(_) | Value::DoubleArray(_))
    }

    /// Number of elements; scalars count as one.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Value::LongArray(v) => v.len(),
            Value::DoubleArray(v) => v.len(),
            _ => 1,
        }
    }

    /// Returns true for empty arrays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element type of this value.
    #[must_use]
    pub fn native_type(&self) -> NativeType {
        match self {
            Value::Long(_) | Value::LongArray(_) => NativeType::Long,
            Value::Double(_) | Value::DoubleArray(_) => NativeType::Double,
            Value::Text(_) => NativeType::Text,
        }
    }

    /// Get this value as an integer, if it is one.
    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an integer array, if it is one.
    #[must_use]
    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Value::LongArray(v) => Some(v),
            _ => None,
        }
    }

    /// Get this value as a float array, if it is one.
    #[must_use]
    pub fn as_double_array(&self) -> Option<&[f64]> {
        match self {
            Value::DoubleArray(v) => Some(v),
            _ => None,
        }
    }

    /// Text form used for index entries and selections.
    ///
    /// Array elements are joined with `/`.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Value::Long(n) => n.to_string(),
            Value::Double(x) => x.to_string(),
            Value::Text(s) => s.clone(),
            Value::LongArray(v) => join(v.iter().map(ToString::to_string)),
            Value::DoubleArray(v) => join(v.iter().map(ToString::to_string)),
        }
    }

    /// Parses index text back into a scalar of the requested type.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] if the text does not parse.
    pub fn parse_text(key: &str, text: &str, ty: NativeType) -> CodecResult<Value> {
        Value::Text(text.to_string()).into_scalar(key, Some(ty))
    }

    /// Converts a scalar into the requested type.
    ///
    /// `None` keeps the natural representation. Floats convert to integers
    /// by truncation.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] for arrays or unparsable text.
    pub fn into_scalar(self, key: &str, ty: Option<NativeType>) -> CodecResult<Value> {
        if self.is_array() {
            return Err(CodecError::type_mismatch(key, "expected a scalar"));
        }
        let Some(ty) = ty else {
            return Ok(self);
        };
        match (self, ty) {
            (v @ Value::Long(_), NativeType::Long)
            | (v @ Value::Double(_), NativeType::Double)
            | (v @ Value::Text(_), NativeType::Text) => Ok(v),
            (Value::Long(n), NativeType::Double) => Ok(Value::Double(n as f64)),
            (Value::Double(x), NativeType::Long) => double_to_long(key, x).map(Value::Long),
            (Value::Text(s), NativeType::Long) => s
                .trim()
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|_| CodecError::type_mismatch(key, format!("{s:?} is not a long"))),
            (Value::Text(s), NativeType::Double) => s
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| CodecError::type_mismatch(key, format!("{s:?} is not a double"))),
            (v, NativeType::Text) => Ok(Value::Text(v.to_text())),
            (v, ty) => Err(CodecError::type_mismatch(
                key,
                format!("cannot read {:?} as {ty}", v.native_type()),
            )),
        }
    }

    /// Converts an array (or a scalar, as a one-element array) into the
    /// requested element type.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] for text arrays or unparsable
    /// text.
    pub fn into_array(self, key: &str, ty: Option<NativeType>) -> CodecResult<Value> {
        let ty = ty.unwrap_or(self.native_type());
        match (self, ty) {
            (_, NativeType::Text) => Err(CodecError::type_mismatch(
                key,
                "arrays cannot be read as text",
            )),
            (v @ Value::LongArray(_), NativeType::Long)
            | (v @ Value::DoubleArray(_), NativeType::Double) => Ok(v),
            (Value::LongArray(v), NativeType::Double) => Ok(Value::DoubleArray(
                v.into_iter().map(|n| n as f64).collect(),
            )),
            (Value::DoubleArray(v), NativeType::Long) => v
                .into_iter()
                .map(|x| double_to_long(key, x))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::LongArray),
            (scalar, ty) => match scalar.into_scalar(key, Some(ty))? {
                Value::Long(n) => Ok(Value::LongArray(vec![n])),
                Value::Double(x) => Ok(Value::DoubleArray(vec![x])),
                other => Err(CodecError::type_mismatch(
                    key,
                    format!("cannot read {:?} as an array", other.native_type()),
                )),
            },
        }
    }
}

fn double_to_long(key: &str, x: f64) -> CodecResult<i64> {
    if x.is_finite() {
        #[allow(clippy::cast_possible_truncation)]
        Ok(x as i64)
    } else {
        Err(CodecError::type_mismatch(key, format!("{x} is not a long")))
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join("/")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Long(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::LongArray(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::DoubleArray(v)
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Value::DoubleArray(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_is_part_of_the_tag() {
        assert!(!Value::from(5).is_array());
        assert!(!Value::from("12").is_array());
        assert!(Value::from(vec![1.0, 2.0]).is_array());
        assert_eq!(Value::from(vec![1i64, 2, 3]).len(), 3);
        assert_eq!(Value::from(7).len(), 1);
    }

    #[test]
    fn scalar_conversions() {
        assert_eq!(
            Value::from("12").into_scalar("stepRange", Some(NativeType::Long)).unwrap(),
            Value::Long(12)
        );
        assert_eq!(
            Value::from(3).into_scalar("level", Some(NativeType::Double)).unwrap(),
            Value::Double(3.0)
        );
        assert_eq!(
            Value::from(101325.0).into_scalar("p", Some(NativeType::Text)).unwrap(),
            Value::Text("101325".to_string())
        );
        assert_eq!(
            Value::from(2.75).into_scalar("x", Some(NativeType::Long)).unwrap(),
            Value::Long(2)
        );
        assert_eq!(Value::from(9).into_scalar("x", None).unwrap(), Value::Long(9));
    }

    #[test]
    fn scalar_conversion_failures() {
        let err = Value::from("msl")
            .into_scalar("shortName", Some(NativeType::Long))
            .unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));

        let err = Value::from(f64::NAN)
            .into_scalar("x", Some(NativeType::Long))
            .unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));

        let err = Value::from(vec![1i64]).into_scalar("pl", None).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn array_conversions() {
        assert_eq!(
            Value::from(vec![1i64, 2]).into_array("pl", Some(NativeType::Double)).unwrap(),
            Value::DoubleArray(vec![1.0, 2.0])
        );
        assert_eq!(
            Value::from(4).into_array("level", None).unwrap(),
            Value::LongArray(vec![4])
        );
        assert!(Value::from(vec![1.0])
            .into_array("values", Some(NativeType::Text))
            .is_err());
    }

    #[test]
    fn text_form() {
        assert_eq!(Value::from(20110225).to_text(), "20110225");
        assert_eq!(Value::from(vec![1i64, 2, 3]).to_text(), "1/2/3");
        assert_eq!(
            Value::parse_text("dataDate", "20110225", NativeType::Long).unwrap(),
            Value::Long(20110225)
        );
    }
}
