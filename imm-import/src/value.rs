//! Cell and parameter values shared by the workbook, SQL and database layers

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A single spreadsheet cell or statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Empty cell / SQL NULL
    Null,
    /// Text
    String(String),
    /// Whole number
    Int(i64),
    /// Decimal number
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Calendar date without time
    Date(NaiveDate),
    /// Date and time
    DateTime(NaiveDateTime),
}

impl Value {
    /// Build a text value, treating empty or whitespace-only text as null
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Value::Null
        } else {
            Value::String(s)
        }
    }

    /// Build a numeric value, collapsing floats without a fraction to integers
    pub fn number(f: f64) -> Self {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            Value::Int(f as i64)
        } else {
            Value::Float(f)
        }
    }

    /// Build a date or datetime value, dropping a midnight time component
    pub fn timestamp(dt: NaiveDateTime) -> Self {
        if dt.time() == NaiveTime::MIN {
            Value::Date(dt.date())
        } else {
            Value::DateTime(dt)
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as integer
    ///
    /// Text holding a plain integer (e.g. an id typed into a text cell) also converts.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Canonical text form used for equality and distinct counting
    ///
    /// Returns `None` for null so that callers can skip empty cells.
    pub fn canonical(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.canonical() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "(null)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
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
    fn test_text_blank_is_null() {
        assert_eq!(Value::text("   "), Value::Null);
        assert_eq!(Value::text("Victoria"), Value::String("Victoria".into()));
    }

    #[test]
    fn test_number_collapses_whole_floats() {
        assert_eq!(Value::number(12.0), Value::Int(12));
        assert_eq!(Value::number(48.419603), Value::Float(48.419603));
    }

    #[test]
    fn test_timestamp_drops_midnight() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 3).unwrap();
        assert_eq!(Value::timestamp(date.and_hms_opt(0, 0, 0).unwrap()), Value::Date(date));
        assert!(matches!(
            Value::timestamp(date.and_hms_opt(14, 30, 0).unwrap()),
            Value::DateTime(_)
        ));
    }

    #[test]
    fn test_as_int_accepts_numeric_text() {
        assert_eq!(Value::from(" 42 ").as_int(), Some(42));
        assert_eq!(Value::from("NEW?").as_int(), None);
        assert_eq!(Value::Float(7.0).as_int(), Some(7));
        assert_eq!(Value::Float(7.5).as_int(), None);
    }

    #[test]
    fn test_canonical_trims_text() {
        assert_eq!(Value::from("  Gonzales Point ").canonical().as_deref(), Some("Gonzales Point"));
        assert_eq!(Value::Null.canonical(), None);
        let date = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(Value::Date(date).canonical().as_deref(), Some("1999-12-31"));
    }
}
