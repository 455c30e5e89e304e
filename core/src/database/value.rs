use std::{fmt, str::FromStr};

use bytes::BytesMut;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type as PgType};

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// A single scalar field value.
///
/// `Null` and `Text(String::new())` are different values and serialize differently.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Text(value) => value.parse().ok(),
            _ => None,
        }
    }

    /// Canonical text form of the value, `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(value) => Some(value.to_string()),
            Value::Int(value) => Some(value.to_string()),
            Value::Float(value) => Some(value.to_string()),
            Value::Text(value) => Some(value.clone()),
        }
    }

    /// Renders the value as a SQL literal: `NULL` unquoted, everything else single-quoted
    /// with embedded quotes doubled.
    pub fn to_sql_literal(&self) -> String {
        match self.to_text() {
            None => "NULL".to_string(),
            Some(text) => format!("'{}'", text.replace('\'', "''")),
        }
    }

    /// Byte length of [`Value::to_sql_literal`] without allocating the literal.
    pub fn sql_literal_len(&self) -> usize {
        match self {
            Value::Null => 4,
            Value::Text(value) => value.len() + value.matches('\'').count() + 2,
            other => other.to_text().map(|text| text.len() + 2).unwrap_or(4),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            None => write!(f, "NULL"),
            Some(text) => write!(f, "{}", text),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

fn is_text_type(ty: &PgType) -> bool {
    *ty == PgType::TEXT
        || *ty == PgType::VARCHAR
        || *ty == PgType::BPCHAR
        || *ty == PgType::NAME
        || *ty == PgType::UNKNOWN
}

fn is_coercible_type(ty: &PgType) -> bool {
    is_text_type(ty)
        || *ty == PgType::BOOL
        || *ty == PgType::INT2
        || *ty == PgType::INT4
        || *ty == PgType::INT8
        || *ty == PgType::FLOAT4
        || *ty == PgType::FLOAT8
        || *ty == PgType::NUMERIC
        || is_textual_type(ty)
}

// Types read back as their canonical text form.
fn is_textual_type(ty: &PgType) -> bool {
    *ty == PgType::DATE
        || *ty == PgType::TIME
        || *ty == PgType::TIMESTAMP
        || *ty == PgType::TIMESTAMPTZ
        || *ty == PgType::UUID
        || *ty == PgType::JSON
        || *ty == PgType::JSONB
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, BoxError> {
    match NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        Ok(timestamp) => Ok(timestamp),
        Err(_) => Ok(text.parse::<NaiveDateTime>()?),
    }
}

fn parse_bool(text: &str) -> Result<bool, BoxError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "y" | "yes" | "on" => Ok(true),
        "f" | "false" | "0" | "n" | "no" | "off" => Ok(false),
        other => Err(format!("invalid boolean literal: {}", other).into()),
    }
}

// Binds the text form of a value to whatever column type the server inferred,
// so `'1234'` can land in an INT8 column the same way a quoted literal would.
fn encode_text(text: &str, ty: &PgType, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let trimmed = text.trim();
    if *ty == PgType::BOOL {
        parse_bool(trimmed)?.to_sql(ty, out)
    } else if *ty == PgType::INT2 {
        trimmed.parse::<i16>()?.to_sql(ty, out)
    } else if *ty == PgType::INT4 {
        trimmed.parse::<i32>()?.to_sql(ty, out)
    } else if *ty == PgType::INT8 {
        trimmed.parse::<i64>()?.to_sql(ty, out)
    } else if *ty == PgType::FLOAT4 {
        trimmed.parse::<f32>()?.to_sql(ty, out)
    } else if *ty == PgType::FLOAT8 {
        trimmed.parse::<f64>()?.to_sql(ty, out)
    } else if *ty == PgType::NUMERIC {
        Decimal::from_str(trimmed)?.to_sql(ty, out)
    } else if *ty == PgType::DATE {
        trimmed.parse::<NaiveDate>()?.to_sql(ty, out)
    } else if *ty == PgType::TIME {
        trimmed.parse::<NaiveTime>()?.to_sql(ty, out)
    } else if *ty == PgType::TIMESTAMP {
        parse_timestamp(trimmed)?.to_sql(ty, out)
    } else if *ty == PgType::TIMESTAMPTZ {
        trimmed.parse::<DateTime<FixedOffset>>()?.with_timezone(&Utc).to_sql(ty, out)
    } else if *ty == PgType::UUID {
        uuid::Uuid::parse_str(trimmed)?.to_sql(ty, out)
    } else if *ty == PgType::JSON || *ty == PgType::JSONB {
        serde_json::from_str::<serde_json::Value>(text)?.to_sql(ty, out)
    } else if is_text_type(ty) {
        text.to_sql(ty, out)
    } else {
        Err(format!("cannot bind value to column of type {}", ty).into())
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &PgType, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(value) if *ty == PgType::BOOL => value.to_sql(ty, out),
            Value::Int(value) if *ty == PgType::INT8 => value.to_sql(ty, out),
            Value::Float(value) if *ty == PgType::FLOAT8 => value.to_sql(ty, out),
            Value::Bool(value) if !is_text_type(ty) => encode_text(if *value { "1" } else { "0" }, ty, out),
            other => match other.to_text() {
                Some(text) => encode_text(&text, ty, out),
                None => Ok(IsNull::Yes),
            },
        }
    }

    fn accepts(ty: &PgType) -> bool {
        is_coercible_type(ty)
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &PgType, raw: &'a [u8]) -> Result<Self, BoxError> {
        if *ty == PgType::BOOL {
            Ok(Value::Bool(bool::from_sql(ty, raw)?))
        } else if *ty == PgType::INT2 {
            Ok(Value::Int(i16::from_sql(ty, raw)? as i64))
        } else if *ty == PgType::INT4 {
            Ok(Value::Int(i32::from_sql(ty, raw)? as i64))
        } else if *ty == PgType::INT8 {
            Ok(Value::Int(i64::from_sql(ty, raw)?))
        } else if *ty == PgType::FLOAT4 {
            Ok(Value::Float(f32::from_sql(ty, raw)? as f64))
        } else if *ty == PgType::FLOAT8 {
            Ok(Value::Float(f64::from_sql(ty, raw)?))
        } else if *ty == PgType::NUMERIC {
            // NUMERIC keeps its exact decimal text, f64 would round it.
            Ok(Value::Text(Decimal::from_sql(ty, raw)?.to_string()))
        } else if *ty == PgType::DATE {
            Ok(Value::Text(NaiveDate::from_sql(ty, raw)?.to_string()))
        } else if *ty == PgType::TIME {
            Ok(Value::Text(NaiveTime::from_sql(ty, raw)?.to_string()))
        } else if *ty == PgType::TIMESTAMP {
            Ok(Value::Text(NaiveDateTime::from_sql(ty, raw)?.to_string()))
        } else if *ty == PgType::TIMESTAMPTZ {
            Ok(Value::Text(DateTime::<Utc>::from_sql(ty, raw)?.to_rfc3339()))
        } else if *ty == PgType::UUID {
            Ok(Value::Text(uuid::Uuid::from_sql(ty, raw)?.to_string()))
        } else if *ty == PgType::JSON || *ty == PgType::JSONB {
            Ok(Value::Text(serde_json::Value::from_sql(ty, raw)?.to_string()))
        } else {
            Ok(Value::Text(String::from_sql(ty, raw)?))
        }
    }

    fn from_sql_null(_ty: &PgType) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(ty: &PgType) -> bool {
        is_coercible_type(ty) || <String as FromSql>::accepts(ty)
    }
}
