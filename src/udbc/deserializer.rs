use crate::udbc::value::{Row, Value};
use serde::de::value::Error;
use serde::de::{self, DeserializeOwned, Deserializer, IntoDeserializer, MapAccess, Visitor};

/// 将一行数据映射为目标类型
pub fn from_row<T: DeserializeOwned>(row: &Row) -> Result<T, Error> {
    T::deserialize(RowDeserializer::new(row))
}

pub struct RowDeserializer<'a> {
    row: &'a Row,
}

impl<'a> RowDeserializer<'a> {
    pub fn new(row: &'a Row) -> Self {
        Self { row }
    }
}

impl<'de, 'a> Deserializer<'de> for RowDeserializer<'a> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(RowMapAccess::new(self.row))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string
        unit seq tuple tuple_struct map struct enum identifier ignored_any
        unit_struct newtype_struct bytes byte_buf option
    }
}

struct RowMapAccess<'a> {
    iter: std::collections::hash_map::Iter<'a, String, Value>,
    current: Option<&'a Value>,
}

impl<'a> RowMapAccess<'a> {
    fn new(row: &'a Row) -> Self {
        Self {
            iter: row.iter(),
            current: None,
        }
    }
}

impl<'de, 'a> MapAccess<'de> for RowMapAccess<'a> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some((k, v)) => {
                self.current = Some(v);
                seed.deserialize(k.as_str().into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let value = self
            .current
            .take()
            .ok_or_else(|| <Error as de::Error>::custom("value requested before key"))?;
        seed.deserialize(ValueDeserializer { value })
    }
}

pub struct ValueDeserializer<'a> {
    pub value: &'a Value,
}

impl<'de, 'a> Deserializer<'de> for ValueDeserializer<'a> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(v) => visitor.visit_bool(*v),
            Value::I16(v) => visitor.visit_i16(*v),
            Value::I32(v) => visitor.visit_i32(*v),
            Value::I64(v) => visitor.visit_i64(*v),
            Value::U64(v) => visitor.visit_u64(*v),
            Value::F64(v) => visitor.visit_f64(*v),
            Value::Str(v) => visitor.visit_str(v),
            Value::Bytes(v) => visitor.visit_bytes(v),
            Value::Date(d) => visitor.visit_string(d.to_string()),
            Value::Time(t) => visitor.visit_string(t.to_string()),
            Value::DateTime(dt) => visitor.visit_string(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::DateTimeUtc(dt) => visitor.visit_string(dt.to_rfc3339()),
            Value::Decimal(d) => visitor.visit_string(d.to_string()),
            Value::List(_) | Value::Map(_) => visitor.visit_unit(),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string
        unit seq tuple tuple_struct map struct enum identifier
        unit_struct newtype_struct bytes byte_buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct User {
        id: i32,
        name: String,
        nickname: Option<String>,
        score: Option<i64>,
    }

    #[test]
    fn maps_row_to_struct() {
        let mut row = Row::new();
        row.insert("id".into(), Value::I64(7));
        row.insert("name".into(), Value::Str("ann".into()));
        row.insert("nickname".into(), Value::Null);
        row.insert("score".into(), Value::I64(90));
        let user: User = from_row(&row).unwrap();
        assert_eq!(
            user,
            User {
                id: 7,
                name: "ann".into(),
                nickname: None,
                score: Some(90),
            }
        );
    }

    #[test]
    fn out_of_range_integer_is_an_error() {
        let mut row = Row::new();
        row.insert("id".into(), Value::I64(i64::MAX));
        row.insert("name".into(), Value::Str("x".into()));
        assert!(from_row::<User>(&row).is_err());
    }

    #[test]
    fn extra_columns_are_ignored() {
        #[derive(Deserialize)]
        struct Count {
            n: u64,
        }
        let mut row = Row::new();
        row.insert("n".into(), Value::I64(3));
        row.insert("other".into(), Value::Str("ignored".into()));
        let c: Count = from_row(&row).unwrap();
        assert_eq!(c.n, 3);
    }
}
