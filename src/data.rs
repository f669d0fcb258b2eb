use std::fmt;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;

use crate::mapping::DataKind;

/// A raw input row. Every cell enters the pipeline as text.
pub type Row = Vec<String>;

/// A storable cell, produced once foreign keys have been patched in.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Coerces a text cell according to the column kind. Integer and real
    /// columns turn empty cells into `Null`; text that does not parse is kept
    /// as text, the way SQLite column affinity treats it.
    pub fn coerce(self, kind: DataKind) -> Value {
        let Value::Text(text) = self else {
            return self;
        };
        match kind {
            DataKind::Text => Value::Text(text),
            DataKind::Integer => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else if let Ok(parsed) = trimmed.trim_start_matches('+').parse::<i64>() {
                    Value::Integer(parsed)
                } else {
                    Value::Text(text)
                }
            }
            DataKind::Real => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else if let Ok(parsed) = trimmed.parse::<f64>() {
                    Value::Real(parsed)
                } else {
                    Value::Text(text)
                }
            }
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
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

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value.trim(), fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_integer_kind_parses_signed_values() {
        assert_eq!(Value::from("42").coerce(DataKind::Integer), Value::Integer(42));
        assert_eq!(Value::from("+7").coerce(DataKind::Integer), Value::Integer(7));
        assert_eq!(Value::from("-3").coerce(DataKind::Integer), Value::Integer(-3));
    }

    #[test]
    fn coerce_numeric_kinds_turn_blank_into_null() {
        assert_eq!(Value::from("").coerce(DataKind::Integer), Value::Null);
        assert_eq!(Value::from("  ").coerce(DataKind::Real), Value::Null);
        assert_eq!(Value::from("").coerce(DataKind::Text), Value::from(""));
    }

    #[test]
    fn coerce_keeps_unparseable_text() {
        assert_eq!(
            Value::from("n/a").coerce(DataKind::Integer),
            Value::from("n/a")
        );
        assert_eq!(Value::from("12.5").coerce(DataKind::Real), Value::Real(12.5));
    }

    #[test]
    fn coerce_leaves_non_text_values_untouched() {
        assert_eq!(Value::Integer(9).coerce(DataKind::Text), Value::Integer(9));
        assert_eq!(Value::Null.coerce(DataKind::Integer), Value::Null);
    }

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024/05/06").unwrap(), expected);
        assert!(parse_naive_date("yesterday").is_err());
    }
}
