use crate::udbc::value::Value;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::{Column, Value as MyValue};
use rust_decimal::Decimal;
use std::str::FromStr;

/// MySQL collation id of the `binary` character set.
const BINARY_CHARSET: u16 = 63;

pub fn from_mysql_value(v: &MyValue, column: Option<&Column>) -> Value {
    match v {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::I64(*i),
        MyValue::UInt(u) => Value::U64(*u),
        MyValue::Float(f) => Value::F64(*f as f64),
        MyValue::Double(d) => Value::F64(*d),
        MyValue::Bytes(b) => from_mysql_bytes(b, column),
        MyValue::Date(y, m, d, h, min, s, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(*y as i32, *m as u32, *d as u32) else {
                // zero dates ("0000-00-00") have no calendar value
                return Value::Null;
            };
            let is_date_column = column
                .map(|c| matches!(c.column_type(), ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE))
                .unwrap_or(false);
            if is_date_column || (*h == 0 && *min == 0 && *s == 0 && *micro == 0 && column.is_none()) {
                return Value::Date(date);
            }
            match date.and_hms_micro_opt(*h as u32, *min as u32, *s as u32, *micro) {
                Some(dt) => Value::DateTime(dt),
                None => Value::Date(date),
            }
        }
        MyValue::Time(is_neg, days, h, min, s, micro) => {
            let total_h = *days * 24 + (*h as u32);
            match NaiveTime::from_hms_micro_opt(total_h, *min as u32, *s as u32, *micro) {
                Some(t) if !*is_neg => Value::Time(t),
                _ => Value::Str(format!(
                    "{}{:02}:{:02}:{:02}",
                    if *is_neg { "-" } else { "" },
                    total_h,
                    min,
                    s
                )),
            }
        }
    }
}

fn from_mysql_bytes(b: &[u8], column: Option<&Column>) -> Value {
    let Some(column) = column else {
        return match std::str::from_utf8(b) {
            Ok(s) => Value::Str(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        };
    };
    match column.column_type() {
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => std::str::from_utf8(b)
            .ok()
            .and_then(|s| Decimal::from_str(s).ok())
            .map(Value::Decimal)
            .unwrap_or_else(|| Value::Bytes(b.to_vec())),
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::I64)
            .unwrap_or_else(|| Value::Bytes(b.to_vec())),
        _ if column.character_set() == BINARY_CHARSET => Value::Bytes(b.to_vec()),
        _ => match std::str::from_utf8(b) {
            Ok(s) => Value::Str(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        },
    }
}

pub fn to_mysql_value(v: &Value) -> MyValue {
    match v {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(if *b { 1 } else { 0 }),
        Value::I16(i) => MyValue::Int(*i as i64),
        Value::I32(i) => MyValue::Int(*i as i64),
        Value::I64(i) => MyValue::Int(*i),
        Value::U64(u) => MyValue::UInt(*u),
        Value::F64(f) => MyValue::Double(*f),
        Value::Str(s) => MyValue::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Date(d) => MyValue::Date(
            d.year() as u16,
            d.month() as u8,
            d.day() as u8,
            0u8,
            0u8,
            0u8,
            0u32,
        ),
        Value::Time(t) => MyValue::Time(
            false,
            0u32,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => datetime_to_mysql(dt),
        Value::DateTimeUtc(dt) => datetime_to_mysql(&dt.naive_utc()),
        Value::Decimal(d) => MyValue::Bytes(d.to_string().into_bytes()),
        Value::List(_) | Value::Map(_) => MyValue::Bytes(Vec::new()),
    }
}

fn datetime_to_mysql(dt: &NaiveDateTime) -> MyValue {
    MyValue::Date(
        dt.date().year() as u16,
        dt.date().month() as u8,
        dt.date().day() as u8,
        dt.time().hour() as u8,
        dt.time().minute() as u8,
        dt.time().second() as u8,
        dt.and_utc().timestamp_subsec_micros(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_without_column_metadata() {
        assert_eq!(from_mysql_value(&MyValue::Int(1), None), Value::I64(1));
        assert_eq!(from_mysql_value(&MyValue::NULL, None), Value::Null);
        assert_eq!(
            from_mysql_value(&MyValue::Bytes(b"abc".to_vec()), None),
            Value::Str("abc".into())
        );
        assert_eq!(
            from_mysql_value(&MyValue::Bytes(vec![0xff, 0xfe]), None),
            Value::Bytes(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn dates_and_zero_dates() {
        let v = from_mysql_value(&MyValue::Date(2024, 5, 1, 0, 0, 0, 0), None);
        assert_eq!(v, Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()));
        let v = from_mysql_value(&MyValue::Date(2024, 5, 1, 13, 30, 0, 0), None);
        assert!(matches!(v, Value::DateTime(_)));
        assert_eq!(from_mysql_value(&MyValue::Date(0, 0, 0, 0, 0, 0, 0), None), Value::Null);
    }

    #[test]
    fn long_intervals_fall_back_to_text() {
        let v = from_mysql_value(&MyValue::Time(true, 1, 2, 3, 4, 0), None);
        assert_eq!(v, Value::Str("-26:03:04".into()));
    }

    #[test]
    fn bind_values() {
        assert_eq!(to_mysql_value(&Value::Bool(true)), MyValue::Int(1));
        assert_eq!(to_mysql_value(&Value::U64(5)), MyValue::UInt(5));
        assert_eq!(to_mysql_value(&Value::from("x")), MyValue::Bytes(b"x".to_vec()));
    }
}
