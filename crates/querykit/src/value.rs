//! Bound parameter values.
//!
//! [`Value`] is the single scalar type that flows from the builder to the
//! execution layer. It implements `ToSql`/`FromSql` so the same type is used
//! for bound parameters and for decoded result columns.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};

/// A bindable scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Whether this value turns a comparison into `IS NULL`.
    ///
    /// True for SQL NULL and for the text `"null"` in any letter case.
    pub fn is_null_marker(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.eq_ignore_ascii_case("null"),
            _ => false,
        }
    }

    /// Borrow the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Read the integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
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
        Value::Int(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.naive_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            // Postgres infers the parameter type from the column; narrow to it.
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Text(v) => v.as_str().to_sql_checked(ty, out),
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMPTZ => v.and_utc().to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let value = match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => Value::Int(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
            Type::FLOAT4 => Value::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::TIMESTAMP => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc()),
            _ => Value::Text(String::from_sql(ty, raw)?),
        };
        Ok(value)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Value::Null)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
        ) || <String as FromSql>::accepts(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_marker() {
        assert!(Value::Null.is_null_marker());
        assert!(Value::from("null").is_null_marker());
        assert!(Value::from("NuLL").is_null_marker());
        assert!(!Value::from("nullable").is_null_marker());
        assert!(!Value::Int(0).is_null_marker());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
    }

    #[test]
    fn test_int_narrows_to_parameter_type() {
        let mut buf = BytesMut::new();
        Value::Int(7).to_sql_checked(&Type::INT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 7]);

        let mut buf = BytesMut::new();
        Value::Int(7).to_sql_checked(&Type::INT8, &mut buf).unwrap();
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_int_overflow_is_an_error() {
        let mut buf = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql_checked(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn test_text_rejects_integer_column() {
        let mut buf = BytesMut::new();
        assert!(Value::from("x").to_sql_checked(&Type::INT4, &mut buf).is_err());
    }

    #[test]
    fn test_null_binds_as_sql_null() {
        let mut buf = BytesMut::new();
        let is_null = Value::Null.to_sql_checked(&Type::TEXT, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
    }

    #[test]
    fn test_decode_columns() {
        assert_eq!(Value::from_sql(&Type::INT4, &[0, 0, 0, 42]).unwrap(), Value::Int(42));
        assert_eq!(Value::from_sql(&Type::BOOL, &[1]).unwrap(), Value::Bool(true));
        assert_eq!(
            Value::from_sql(&Type::TEXT, b"hello").unwrap(),
            Value::Text("hello".into())
        );
        assert_eq!(Value::from_sql_null(&Type::INT8).unwrap(), Value::Null);
        assert!(<Value as FromSql>::accepts(&Type::VARCHAR));
        assert!(!<Value as FromSql>::accepts(&Type::BYTEA));
    }
}
