//! Row Value Model
//!
//! Scalar field values as read from a table, plus the `Row` tuple built from
//! them. Values carry a total order (type rank first, then value) so a
//! table's rows can always be sorted, even when a column mixes NULLs with
//! real values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// A single scalar field of a database record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// NUMERIC kept in its canonical text form
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    /// JSON / JSONB serialized to text
    Json(String),
}

impl FieldValue {
    /// Rank used to order values of different kinds
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Int(_) => 2,
            FieldValue::Float(_) => 3,
            FieldValue::Decimal(_) => 4,
            FieldValue::Text(_) => 5,
            FieldValue::Bytes(_) => 6,
            FieldValue::Date(_) => 7,
            FieldValue::Time(_) => 8,
            FieldValue::Timestamp(_) => 9,
            FieldValue::TimestampTz(_) => 10,
            FieldValue::Uuid(_) => 11,
            FieldValue::Json(_) => 12,
        }
    }
}

/// Numeric comparison of decimal text, falling back to the text itself
fn compare_decimals(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Decimal(a), Decimal(b)) => compare_decimals(a, b),
            (Text(a), Text(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Time(a), Time(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (TimestampTz(a), TimestampTz(b)) => a.cmp(b),
            (Uuid(a), Uuid(b)) => a.cmp(b),
            (Json(a), Json(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FieldValue {}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Text(s) => write!(f, "'{}'", s),
            FieldValue::Bytes(bytes) => {
                write!(f, "\\x")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::Time(t) => write!(f, "{}", t),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts),
            FieldValue::TimestampTz(ts) => write!(f, "{}", ts.to_rfc3339()),
            FieldValue::Uuid(u) => write!(f, "{}", u),
            FieldValue::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// One database record: an ordered, fixed-arity tuple of fields.
///
/// Ordering is lexicographic over the fields in column order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Vec<FieldValue>);

impl Row {
    pub fn new(fields: Vec<FieldValue>) -> Self {
        Self(fields)
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.0
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, ")")
    }
}

/// Build a `Row` from heterogeneous literals: `row![1, "a", 3]`
#[macro_export]
macro_rules! row {
    ($($field:expr),* $(,)?) => {
        $crate::snapshot::value::Row::new(vec![$($crate::snapshot::value::FieldValue::from($field)),*])
    };
}
