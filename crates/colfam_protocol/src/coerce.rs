//! Value coercion against a declared column type.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::net::IpAddr;
use thiserror::Error;
use uuid::Uuid;

use crate::types::ColumnType;
use crate::value::Value;

/// A value that does not fit its declared column type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, got {got}")]
pub struct CoercionError {
    pub expected: String,
    pub got: String,
}

impl CoercionError {
    fn new(column_type: &ColumnType, value: &Value) -> Self {
        Self {
            expected: column_type.cql_name(),
            got: describe(value),
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Text(_) | Value::Null => value.to_string(),
        other => format!("{} {}", other.type_name(), other),
    }
}

/// Coerce `value` into the canonical variant for `column_type`.
///
/// `Null` passes through unchanged; deciding what a null means is the
/// caller's business. Collections may not contain nulls, tuples may.
pub fn coerce_value(column_type: &ColumnType, value: Value) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match column_type {
        ColumnType::TinyInt => coerce_integer(column_type, value, |v| i8::try_from(v).ok().map(Value::TinyInt)),
        ColumnType::SmallInt => coerce_integer(column_type, value, |v| i16::try_from(v).ok().map(Value::SmallInt)),
        ColumnType::Int => coerce_integer(column_type, value, |v| i32::try_from(v).ok().map(Value::Int)),
        ColumnType::BigInt | ColumnType::Counter => {
            coerce_integer(column_type, value, |v| Some(Value::BigInt(v)))
        }
        ColumnType::Float => {
            let wide = coerce_float(column_type, value.clone())?;
            if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
                return Err(CoercionError::new(column_type, &value));
            }
            Ok(Value::Float(wide as f32))
        }
        ColumnType::Double => coerce_float(column_type, value).map(Value::Double),
        ColumnType::Boolean => match value {
            Value::Boolean(_) => Ok(value),
            Value::Text(ref s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(CoercionError::new(column_type, &value)),
            },
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::Text => match value {
            Value::Text(_) => Ok(value),
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::Ascii => match value {
            Value::Text(ref s) if s.is_ascii() => Ok(value),
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::Blob => match value {
            Value::Blob(_) => Ok(value),
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::Uuid => coerce_uuid(column_type, value, false),
        ColumnType::TimeUuid => coerce_uuid(column_type, value, true),
        ColumnType::Timestamp => coerce_timestamp(column_type, value),
        ColumnType::Date => match value {
            Value::Date(_) => Ok(value),
            Value::Timestamp(ts) => Ok(Value::Date(ts.date_naive())),
            Value::Text(ref s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| CoercionError::new(column_type, &value)),
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::Inet => match value {
            Value::Inet(_) => Ok(value),
            Value::Text(ref s) => s
                .parse::<IpAddr>()
                .map(Value::Inet)
                .map_err(|_| CoercionError::new(column_type, &value)),
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::Set(item) => match value {
            Value::Set(items) | Value::List(items) => {
                let mut out: Vec<Value> = Vec::with_capacity(items.len());
                for element in coerce_elements(item, items)? {
                    if !out.contains(&element) {
                        out.push(element);
                    }
                }
                Ok(Value::Set(out))
            }
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::List(item) => match value {
            Value::List(items) | Value::Set(items) => {
                Ok(Value::List(coerce_elements(item, items)?))
            }
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::Map(key_type, value_type) => match value {
            Value::Map(entries) => {
                let mut out: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let k = coerce_element(key_type, k)?;
                    let v = coerce_element(value_type, v)?;
                    match out.iter_mut().find(|(existing, _)| *existing == k) {
                        Some(slot) => slot.1 = v,
                        None => out.push((k, v)),
                    }
                }
                Ok(Value::Map(out))
            }
            other => Err(CoercionError::new(column_type, &other)),
        },
        ColumnType::Tuple(types) => match value {
            Value::Tuple(items) | Value::List(items) if items.len() == types.len() => {
                let coerced = types
                    .iter()
                    .zip(items)
                    .map(|(ty, v)| coerce_value(ty, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Tuple(coerced))
            }
            other => Err(CoercionError::new(column_type, &other)),
        },
    }
}

fn coerce_elements(item: &ColumnType, items: Vec<Value>) -> Result<Vec<Value>, CoercionError> {
    items.into_iter().map(|v| coerce_element(item, v)).collect()
}

fn coerce_element(item: &ColumnType, value: Value) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Err(CoercionError {
            expected: format!("non-null {}", item.cql_name()),
            got: "NULL".to_string(),
        });
    }
    coerce_value(item, value)
}

fn coerce_integer(
    column_type: &ColumnType,
    value: Value,
    narrow: impl Fn(i64) -> Option<Value>,
) -> Result<Value, CoercionError> {
    let wide = match &value {
        Value::Text(s) => s.trim().parse::<i64>().ok(),
        Value::Double(f) => exact_i64(*f),
        Value::Float(f) => exact_i64(f64::from(*f)),
        other => other.as_i64(),
    };
    wide.and_then(narrow)
        .ok_or_else(|| CoercionError::new(column_type, &value))
}

/// `f` as an `i64` when it is a whole number inside the `i64` range.
///
/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
pub fn exact_i64(f: f64) -> Option<i64> {
    const LOWER: f64 = i64::MIN as f64;
    const UPPER: f64 = -(i64::MIN as f64);
    (f.is_finite() && f.fract() == 0.0 && f >= LOWER && f < UPPER).then(|| f as i64)
}

fn coerce_float(column_type: &ColumnType, value: Value) -> Result<f64, CoercionError> {
    match &value {
        Value::Double(v) => Ok(*v),
        Value::Float(v) => Ok(f64::from(*v)),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoercionError::new(column_type, &value)),
        other => other
            .as_i64()
            .map(|v| v as f64)
            .ok_or_else(|| CoercionError::new(column_type, &value)),
    }
}

fn coerce_uuid(column_type: &ColumnType, value: Value, time_based: bool) -> Result<Value, CoercionError> {
    let uuid = match &value {
        Value::Uuid(u) => Some(*u),
        Value::Text(s) => Uuid::parse_str(s.trim()).ok(),
        _ => None,
    };
    match uuid {
        Some(u) if !time_based || u.get_version_num() == 1 => Ok(Value::Uuid(u)),
        _ => Err(CoercionError::new(column_type, &value)),
    }
}

fn coerce_timestamp(column_type: &ColumnType, value: Value) -> Result<Value, CoercionError> {
    let ts = match &value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive)),
        other => other
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
    };
    ts.map(Value::Timestamp)
        .ok_or_else(|| CoercionError::new(column_type, &value))
}
