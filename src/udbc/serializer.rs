//! serde front end for bind parameters.
//!
//! Any `Serialize` type becomes a [`Value`]: sequences and tuples become
//! `Value::List`, structs and maps become `Value::Map`. `()` stands for
//! "no parameters" and yields an empty list.

use std::collections::HashMap;

use serde::Serialize;
use serde::ser::{self, Impossible};
use thiserror::Error;

use crate::udbc::value::Value;

#[derive(Error, Debug)]
pub enum ParamError {
    #[error("named parameters are not supported, pass a tuple or a slice")]
    Named,
    #[error("map keys must be strings")]
    NonStringKey,
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for ParamError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        ParamError::Custom(msg.to_string())
    }
}

/// Converts one serializable value into a [`Value`].
pub fn to_value<T: Serialize + ?Sized>(t: &T) -> Result<Value, ParamError> {
    t.serialize(ParamSerializer)
}

pub struct ParamSerializer;

// 无符号整数放入能容纳其范围的最小有符号类型
macro_rules! scalar {
    ($($method:ident($ty:ty) => $build:expr;)*) => {
        $(
            fn $method(self, v: $ty) -> Result<Value, ParamError> {
                Ok($build(v))
            }
        )*
    };
}

impl ser::Serializer for ParamSerializer {
    type Ok = Value;
    type Error = ParamError;
    type SerializeSeq = ListBuilder;
    type SerializeTuple = ListBuilder;
    type SerializeTupleStruct = ListBuilder;
    type SerializeTupleVariant = ListBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    scalar! {
        serialize_bool(bool) => Value::Bool;
        serialize_i8(i8) => |v: i8| Value::I16(v.into());
        serialize_i16(i16) => Value::I16;
        serialize_i32(i32) => Value::I32;
        serialize_i64(i64) => Value::I64;
        serialize_u8(u8) => |v: u8| Value::I16(v.into());
        serialize_u16(u16) => |v: u16| Value::I32(v.into());
        serialize_u32(u32) => |v: u32| Value::I64(v.into());
        serialize_u64(u64) => Value::U64;
        serialize_f32(f32) => |v: f32| Value::F64(v.into());
        serialize_f64(f64) => Value::F64;
        serialize_char(char) => |v: char| Value::Str(v.to_string());
        serialize_str(&str) => |v: &str| Value::Str(v.to_owned());
        serialize_bytes(&[u8]) => |v: &[u8]| Value::Bytes(v.to_vec());
    }

    fn serialize_none(self) -> Result<Value, ParamError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, ParamError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, ParamError> {
        Ok(Value::List(Vec::new()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, ParamError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, ParamError> {
        Ok(Value::Str(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, ParamError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Value, ParamError> {
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ListBuilder, ParamError> {
        Ok(ListBuilder(Vec::with_capacity(len.unwrap_or_default())))
    }

    fn serialize_tuple(self, len: usize) -> Result<ListBuilder, ParamError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<ListBuilder, ParamError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        len: usize,
    ) -> Result<ListBuilder, ParamError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, ParamError> {
        Ok(MapBuilder::with_capacity(len.unwrap_or_default()))
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, ParamError> {
        Ok(MapBuilder::with_capacity(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        len: usize,
    ) -> Result<MapBuilder, ParamError> {
        Ok(MapBuilder::with_capacity(len))
    }
}

pub struct ListBuilder(Vec<Value>);

impl ListBuilder {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ParamError> {
        self.0.push(to_value(value)?);
        Ok(())
    }
}

impl ser::SerializeSeq for ListBuilder {
    type Ok = Value;
    type Error = ParamError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ParamError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ParamError> {
        Ok(Value::List(self.0))
    }
}

impl ser::SerializeTuple for ListBuilder {
    type Ok = Value;
    type Error = ParamError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ParamError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ParamError> {
        Ok(Value::List(self.0))
    }
}

impl ser::SerializeTupleStruct for ListBuilder {
    type Ok = Value;
    type Error = ParamError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ParamError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ParamError> {
        Ok(Value::List(self.0))
    }
}

impl ser::SerializeTupleVariant for ListBuilder {
    type Ok = Value;
    type Error = ParamError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ParamError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ParamError> {
        Ok(Value::List(self.0))
    }
}

pub struct MapBuilder {
    entries: HashMap<String, Value>,
    pending_key: Option<String>,
}

impl MapBuilder {
    fn with_capacity(len: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(len),
            pending_key: None,
        }
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = ParamError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), ParamError> {
        self.pending_key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ParamError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| ParamError::Custom("map value without a key".into()))?;
        self.entries.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, ParamError> {
        Ok(Value::Map(self.entries))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = ParamError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), ParamError> {
        self.entries.insert(key.to_owned(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, ParamError> {
        Ok(Value::Map(self.entries))
    }
}

impl ser::SerializeStructVariant for MapBuilder {
    type Ok = Value;
    type Error = ParamError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), ParamError> {
        self.entries.insert(key.to_owned(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, ParamError> {
        Ok(Value::Map(self.entries))
    }
}

/// Accepts only string-like map keys.
struct KeySerializer;

macro_rules! reject_keys {
    ($($method:ident($($arg:ty),*);)*) => {
        $(
            fn $method(self, $(_: $arg),*) -> Result<String, ParamError> {
                Err(ParamError::NonStringKey)
            }
        )*
    };
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = ParamError;
    type SerializeSeq = Impossible<String, ParamError>;
    type SerializeTuple = Impossible<String, ParamError>;
    type SerializeTupleStruct = Impossible<String, ParamError>;
    type SerializeTupleVariant = Impossible<String, ParamError>;
    type SerializeMap = Impossible<String, ParamError>;
    type SerializeStruct = Impossible<String, ParamError>;
    type SerializeStructVariant = Impossible<String, ParamError>;

    fn serialize_str(self, v: &str) -> Result<String, ParamError> {
        Ok(v.to_owned())
    }

    fn serialize_char(self, v: char) -> Result<String, ParamError> {
        Ok(v.to_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, ParamError> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, ParamError> {
        value.serialize(self)
    }

    reject_keys! {
        serialize_bool(bool);
        serialize_i8(i8);
        serialize_i16(i16);
        serialize_i32(i32);
        serialize_i64(i64);
        serialize_u8(u8);
        serialize_u16(u16);
        serialize_u32(u32);
        serialize_u64(u64);
        serialize_f32(f32);
        serialize_f64(f64);
        serialize_bytes(&[u8]);
        serialize_none();
        serialize_unit();
        serialize_unit_struct(&'static str);
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<String, ParamError> {
        Err(ParamError::NonStringKey)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, ParamError> {
        Err(ParamError::NonStringKey)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, ParamError> {
        Err(ParamError::NonStringKey)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, ParamError> {
        Err(ParamError::NonStringKey)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, ParamError> {
        Err(ParamError::NonStringKey)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, ParamError> {
        Err(ParamError::NonStringKey)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, ParamError> {
        Err(ParamError::NonStringKey)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, ParamError> {
        Err(ParamError::NonStringKey)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, ParamError> {
        Err(ParamError::NonStringKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn unsigned_values_keep_their_range() {
        assert_eq!(to_value(&200u8).unwrap(), Value::I16(200));
        assert_eq!(to_value(&u32::MAX).unwrap(), Value::I64(u32::MAX as i64));
        assert_eq!(to_value(&u64::MAX).unwrap(), Value::U64(u64::MAX));
    }

    #[test]
    fn chrono_dates_serialize_as_text() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(to_value(&d).unwrap(), Value::Str("2024-02-29".into()));
    }

    #[test]
    fn unit_means_no_parameters() {
        assert_eq!(to_value(&()).unwrap(), Value::List(Vec::new()));
    }

    #[test]
    fn map_keys_must_be_strings() {
        let mut m = HashMap::new();
        m.insert(1, "x");
        assert!(matches!(to_value(&m), Err(ParamError::NonStringKey)));

        let mut m = HashMap::new();
        m.insert("id", 1i64);
        assert_eq!(
            to_value(&m).unwrap(),
            Value::Map(HashMap::from([("id".to_string(), Value::I64(1))]))
        );
    }
}
