// Tagged CQL value model plus the conversion rules used by positional and map scans.
use std::collections::HashMap;
use std::net::IpAddr;

use serde_json::{Map as JsonMap, Value as JsonValue};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::core::error::{Error, ErrorKind};

/// One result row keyed by column name.
pub type RowMap = HashMap<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Counter(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Uuid(Uuid),
    Timestamp(OffsetDateTime),
    Date(Date),
    Inet(IpAddr),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::TinyInt(_) => "tinyint",
            Value::SmallInt(_) => "smallint",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Counter(_) => "counter",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Inet(_) => "inet",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Render as JSON. Timestamps become RFC 3339 strings, blobs become
    /// arrays of bytes, and map keys are stringified.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(value) => JsonValue::Bool(*value),
            Value::TinyInt(value) => JsonValue::from(*value),
            Value::SmallInt(value) => JsonValue::from(*value),
            Value::Int(value) => JsonValue::from(*value),
            Value::BigInt(value) | Value::Counter(value) => JsonValue::from(*value),
            Value::Float(value) => JsonValue::from(*value),
            Value::Double(value) => JsonValue::from(*value),
            Value::Text(value) => JsonValue::from(value.clone()),
            Value::Blob(bytes) => JsonValue::from(bytes.clone()),
            Value::Uuid(uuid) => JsonValue::from(uuid.to_string()),
            Value::Timestamp(ts) => match ts.format(&Rfc3339) {
                Ok(text) => JsonValue::from(text),
                Err(_) => JsonValue::from(ts.unix_timestamp()),
            },
            Value::Date(date) => JsonValue::from(date.to_string()),
            Value::Inet(addr) => JsonValue::from(addr.to_string()),
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                JsonValue::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => {
                let mut object = JsonMap::new();
                for (key, value) in entries {
                    let key = match key {
                        Value::Text(text) => text.clone(),
                        other => other.to_json().to_string(),
                    };
                    object.insert(key, value.to_json());
                }
                JsonValue::Object(object)
            }
        }
    }
}

/// Render a row map as a JSON object.
pub fn row_to_json(row: &RowMap) -> JsonValue {
    JsonValue::Object(
        row.iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    String => Text,
    Vec<u8> => Blob,
    Uuid => Uuid,
    OffsetDateTime => Timestamp,
    Date => Date,
    IpAddr => Inet,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Conversion from a column value into a host type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, Error>;
}

/// A positional scan slot. Every `FromValue` type is a destination.
pub trait Destination {
    /// Fail exactly when `assign` would, without writing.
    fn check(&self, value: &Value) -> Result<(), Error>;
    fn assign(&mut self, value: &Value) -> Result<(), Error>;
}

impl<T: FromValue> Destination for T {
    fn check(&self, value: &Value) -> Result<(), Error> {
        T::from_value(value).map(drop)
    }

    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        *self = T::from_value(value)?;
        Ok(())
    }
}

/// Assign `values` to `dest` in order, all or nothing: every value is
/// checked before any destination is written. On failure the error comes
/// with the index of the offending column. Lengths must already match.
pub fn assign_all(
    dest: &mut [&mut dyn Destination],
    values: &[Value],
) -> Result<(), (usize, Error)> {
    for (index, (slot, value)) in dest.iter().zip(values).enumerate() {
        slot.check(value).map_err(|err| (index, err))?;
    }
    for (index, (slot, value)) in dest.iter_mut().zip(values).enumerate() {
        slot.assign(value).map_err(|err| (index, err))?;
    }
    Ok(())
}

fn mismatch(expected: &str, found: &Value) -> Error {
    if found.is_null() {
        return Error::new(ErrorKind::Type)
            .with_message(format!("cannot scan null into {expected}"))
            .with_hint("Scan nullable columns into an Option.");
    }
    Error::new(ErrorKind::Type).with_message(format!(
        "expected {expected}, found {}",
        found.type_name()
    ))
}

fn integer(value: &Value, expected: &str) -> Result<i64, Error> {
    match value {
        Value::TinyInt(v) => Ok(i64::from(*v)),
        Value::SmallInt(v) => Ok(i64::from(*v)),
        Value::Int(v) => Ok(i64::from(*v)),
        Value::BigInt(v) | Value::Counter(v) => Ok(*v),
        other => Err(mismatch(expected, other)),
    }
}

macro_rules! integer_from_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, Error> {
                    let wide = integer(value, $name)?;
                    <$ty>::try_from(wide).map_err(|_| {
                        Error::new(ErrorKind::Type)
                            .with_message(format!("{wide} is out of range for {}", $name))
                    })
                }
            }
        )*
    };
}

integer_from_value! {
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Boolean(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Float(v) => Ok(*v),
            other => Err(mismatch("f32", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Double(v) => Ok(*v),
            other => Err(mismatch("f64", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Blob(v) => Ok(v.clone()),
            other => Err(mismatch("Vec<u8>", other)),
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => Ok(items.clone()),
            other => Err(mismatch("Vec<Value>", other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Uuid(v) => Ok(*v),
            other => Err(mismatch("Uuid", other)),
        }
    }
}

impl FromValue for OffsetDateTime {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Timestamp(v) => Ok(*v),
            other => Err(mismatch("OffsetDateTime", other)),
        }
    }
}

impl FromValue for Date {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Date(v) => Ok(*v),
            other => Err(mismatch("Date", other)),
        }
    }
}

impl FromValue for IpAddr {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Inet(v) => Ok(*v),
            other => Err(mismatch("IpAddr", other)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, Error> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
