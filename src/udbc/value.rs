use crate::udbc::serializer::{self, ParamError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Decimal(Decimal),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

/// One result row: column name to value.
pub type Row = HashMap<String, Value>;

/// 将 T: Serialize 转为位置参数列表
///
/// Tuples, sequences and scalars are accepted; structs and maps have no
/// positional order and are rejected.
pub fn to_values<T: Serialize + ?Sized>(t: &T) -> Result<Vec<Value>, ParamError> {
    match serializer::to_value(t)? {
        Value::List(vec) => Ok(vec),
        Value::Map(_) => Err(ParamError::Named),
        other => Ok(vec![other]),
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}
impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}
impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_values_unit() {
        let args = ();
        let values = to_values(&args).unwrap();
        assert_eq!(values.len(), 0);
    }

    #[test]
    fn test_to_values_tuple() {
        let args = (1, "hello", None::<i64>);
        let values = to_values(&args).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], Value::I32(1));
        assert_eq!(values[1], Value::Str("hello".to_string()));
        assert_eq!(values[2], Value::Null);
    }

    #[test]
    fn test_to_values_scalar_and_slice() {
        assert_eq!(to_values(&42i64).unwrap(), vec![Value::I64(42)]);
        assert_eq!(
            to_values(&["a", "b"][..]).unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn test_to_values_rejects_struct() {
        #[derive(Serialize)]
        struct Args {
            id: i64,
        }
        assert!(to_values(&Args { id: 1 }).is_err());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::U64(7).as_i64(), Some(7));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert!(Value::from(None::<i32>).is_null());
    }
}
