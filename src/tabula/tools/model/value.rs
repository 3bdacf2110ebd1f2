use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Milliseconds in one spreadsheet day.
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A single cell value.
///
/// Arithmetic consumers treat [`Value::Null`] as `0` and text consumers treat
/// it as the empty string.
#[derive(Debug, Clone)]
pub enum Value {
    /// Double precision number.
    Number(f64),
    /// Plain text.
    Text(String),
    /// Calendar instant without a time zone.
    Date(NaiveDateTime),
    /// Missing value.
    Null,
}

/// The kind of a non-null [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Number,
    Date,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Number => write!(f, "number"),
            ValueKind::Date => write!(f, "date"),
            ValueKind::Text => write!(f, "text"),
        }
    }
}

impl Value {
    /// Builds a value from free-form text: blank text is `Null`, finite
    /// numeric text is a `Number`, anything else stays `Text`.
    pub fn infer(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match parse_finite(trimmed) {
            Some(number) => Value::Number(number),
            None => Value::Text(text.to_string()),
        }
    }

    /// Returns the kind of the value, or `None` for `Null`.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Number(_) => Some(ValueKind::Number),
            Value::Text(_) => Some(ValueKind::Text),
            Value::Date(_) => Some(ValueKind::Date),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value. Text is parsed when it holds a finite
    /// number; dates and `Null` have no numeric view.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            Value::Text(text) => parse_finite(text.trim()),
            Value::Date(_) | Value::Null => None,
        }
    }

    /// Numeric view used by arithmetic: anything without a number is `0`.
    pub fn number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Text view used by text operations: `Null` is the empty string.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Text(text) => Cow::Borrowed(text.as_str()),
            Value::Null => Cow::Borrowed(""),
            other => Cow::Owned(other.to_string()),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(value) => Some(*value),
            _ => None,
        }
    }

    /// Total order used by sorting: `Null < Number < Date < Text`, numbers
    /// numerically, dates by instant and text by code point.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Number(lhs), Value::Number(rhs)) => {
                normalize(*lhs).total_cmp(&normalize(*rhs))
            }
            (Value::Date(lhs), Value::Date(rhs)) => lhs.cmp(rhs),
            (Value::Text(lhs), Value::Text(rhs)) => lhs.cmp(rhs),
            (lhs, rhs) => lhs.kind().cmp(&rhs.kind()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(lhs), Value::Number(rhs)) => {
                normalize(*lhs).to_bits() == normalize(*rhs).to_bits()
            }
            (Value::Text(lhs), Value::Text(rhs)) => lhs == rhs,
            (Value::Date(lhs), Value::Date(rhs)) => lhs == rhs,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Number(value) => normalize(*value).to_bits().hash(state),
            Value::Text(value) => value.hash(state),
            Value::Date(value) => value.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
            Value::Date(value) => {
                if value.hour() == 0 && value.minute() == 0 && value.second() == 0 {
                    write!(f, "{}", value.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            Value::Null => Ok(()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
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

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Folds `-0.0` into `0.0` and every NaN into the canonical NaN so that
/// equality, hashing and ordering agree.
fn normalize(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else if value.is_nan() {
        f64::NAN
    } else {
        value
    }
}

pub(crate) fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Converts a spreadsheet date serial (days since 1899-12-30) into a date.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round();
    // `i64::MAX as f64` rounds up to 2^63, which no i64 holds.
    if millis.abs() >= i64::MAX as f64 {
        return None;
    }
    excel_epoch()?.checked_add_signed(Duration::try_milliseconds(millis as i64)?)
}

/// Converts a date into a spreadsheet date serial.
pub fn datetime_to_excel_serial(value: &NaiveDateTime) -> Option<f64> {
    let elapsed = value.signed_duration_since(excel_epoch()?);
    Some(elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY)
}

/// Parses a textual date in one of the accepted layouts.
pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

    let trimmed = text.trim();
    for format in DATETIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(value);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Calendar month (1-12) of a date value.
pub(crate) fn month_of(value: &NaiveDateTime) -> u32 {
    value.month()
}
