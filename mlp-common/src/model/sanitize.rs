//! Value sanitizing by column type
//!
//! Incoming JSON is coerced to the shape PostgreSQL expects for the
//! column. Anything that cannot be coerced becomes `null`; the caller
//! decides whether a null is acceptable (see `Model::validate_required`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Number, Value};

use crate::schema::{ColumnDefinition, PgType};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Sanitize a value for a declared column, applying its choices list
pub fn sanitize_column(value: &Value, column: &ColumnDefinition) -> Value {
    let clean = sanitize(value, column.pg_type);
    match (&clean, &column.choices) {
        (Value::String(s), Some(choices)) if !choices.iter().any(|c| c == s) => Value::Null,
        _ => clean,
    }
}

/// Coerce `value` to `pg_type`, or `null` when it cannot be coerced
pub fn sanitize(value: &Value, pg_type: PgType) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match pg_type {
        PgType::SmallInt => parse_int(value)
            .and_then(|n| i16::try_from(n).ok())
            .map(Value::from)
            .unwrap_or(Value::Null),
        PgType::Integer => parse_int(value)
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::from)
            .unwrap_or(Value::Null),
        PgType::BigInt => parse_int(value).map(Value::from).unwrap_or(Value::Null),
        PgType::Real => parse_float(value)
            .filter(|f| f.abs() <= f64::from(f32::MAX))
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PgType::Double | PgType::Numeric => parse_float(value)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PgType::Boolean => parse_bool(value).map(Value::Bool).unwrap_or(Value::Null),
        PgType::Text | PgType::Varchar => {
            parse_text(value).map(Value::String).unwrap_or(Value::Null)
        }
        PgType::Date => text_of(value)
            .and_then(|s| parse_date(&s))
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        PgType::Time => text_of(value)
            .and_then(|s| parse_time(&s))
            .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        PgType::Timestamp => text_of(value)
            .and_then(|s| parse_timestamp(&s))
            .map(|ts| Value::String(ts.format(TIMESTAMP_FORMAT).to_string()))
            .unwrap_or(Value::Null),
        PgType::TimestampTz => text_of(value)
            .and_then(|s| parse_timestamptz(&s))
            .map(Value::String)
            .unwrap_or(Value::Null),
        PgType::Json | PgType::Jsonb => value.clone(),
    }
}

/// Leading integer of a string, or the truncated value of a number.
/// Values outside the `i64` range are `None`.
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .map(f64::trunc)
                .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim_start();
            let digits_start = usize::from(s.starts_with(['+', '-']));
            let end = s[digits_start..]
                .find(|c: char| !c.is_ascii_digit())
                .map(|i| i + digits_start)
                .unwrap_or(s.len());
            if end == digits_start {
                return None;
            }
            s[..end].parse().ok()
        }
        _ => None,
    }
}

/// Longest leading decimal literal of a string, or the value of a number
fn parse_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim_start();
            let bytes = s.as_bytes();
            let mut end = 0;
            if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
                end += 1;
            }
            let int_start = end;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            let mut mantissa_digits = end - int_start;
            if end < bytes.len() && bytes[end] == b'.' {
                let frac_start = end + 1;
                let mut frac_end = frac_start;
                while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
                    frac_end += 1;
                }
                mantissa_digits += frac_end - frac_start;
                if mantissa_digits > 0 {
                    end = frac_end;
                }
            }
            if mantissa_digits == 0 {
                return None;
            }
            // Exponent only counts when followed by at least one digit
            if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
                let mut exp_end = end + 1;
                if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
                    exp_end += 1;
                }
                let exp_digits_start = exp_end;
                while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                    exp_end += 1;
                }
                if exp_end > exp_digits_start {
                    end = exp_end;
                }
            }
            s[..end].parse().ok()
        }
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Some(false),
            Some(f) if f == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_text(value: &Value) -> Option<String> {
    let text = text_of(value)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Scalars rendered as text; arrays and objects have no text form
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// RFC 3339 with offset; naive input is taken as UTC
fn parse_timestamptz(s: &str) -> Option<String> {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(dt) => Some(dt.to_rfc3339()),
        Err(_) => parse_timestamp(s).map(|ts| ts.and_utc().to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_parse_int_semantics() {
        assert_eq!(sanitize(&json!(42), PgType::Integer), json!(42));
        assert_eq!(sanitize(&json!("42"), PgType::Integer), json!(42));
        assert_eq!(sanitize(&json!("  -17 apples"), PgType::Integer), json!(-17));
        assert_eq!(sanitize(&json!(3.9), PgType::Integer), json!(3));
        assert_eq!(sanitize(&json!("abc"), PgType::Integer), Value::Null);
        assert_eq!(sanitize(&json!(""), PgType::BigInt), Value::Null);
        assert_eq!(sanitize(&json!(true), PgType::Integer), Value::Null);
    }

    #[test]
    fn test_integer_narrowed_to_column_width() {
        assert_eq!(sanitize(&json!("2147483647"), PgType::Integer), json!(2147483647));
        assert_eq!(sanitize(&json!("2147483648"), PgType::Integer), Value::Null);
        assert_eq!(sanitize(&json!(-2147483649i64), PgType::Integer), Value::Null);
        assert_eq!(sanitize(&json!("99999999999"), PgType::Integer), Value::Null);
        assert_eq!(sanitize(&json!(32767), PgType::SmallInt), json!(32767));
        assert_eq!(sanitize(&json!("40000"), PgType::SmallInt), Value::Null);
        assert_eq!(sanitize(&json!("99999999999"), PgType::BigInt), json!(99999999999i64));
        assert_eq!(sanitize(&json!("99999999999999999999"), PgType::BigInt), Value::Null);
        assert_eq!(sanitize(&json!(1e30), PgType::BigInt), Value::Null);
        assert_eq!(sanitize(&json!(3e9), PgType::Integer), Value::Null);
        assert_eq!(sanitize(&json!("1e39"), PgType::Real), Value::Null);
        assert_eq!(sanitize(&json!("1e39"), PgType::Double), json!(1e39));
    }

    #[test]
    fn test_float_parse_float_semantics() {
        assert_eq!(sanitize(&json!("49.25N"), PgType::Double), json!(49.25));
        assert_eq!(sanitize(&json!("-.5"), PgType::Real), json!(-0.5));
        assert_eq!(sanitize(&json!("1e3"), PgType::Numeric), json!(1000.0));
        assert_eq!(sanitize(&json!("2e"), PgType::Double), json!(2.0));
        assert_eq!(sanitize(&json!("."), PgType::Double), Value::Null);
        assert_eq!(sanitize(&json!("Infinity"), PgType::Double), Value::Null);
        assert_eq!(sanitize(&json!("1e400"), PgType::Double), Value::Null);
    }

    #[test]
    fn test_boolean_forms() {
        for truthy in [json!(true), json!("t"), json!("Yes"), json!("on"), json!("1"), json!(1)] {
            assert_eq!(sanitize(&truthy, PgType::Boolean), json!(true), "{:?}", truthy);
        }
        for falsy in [json!(false), json!("f"), json!("NO"), json!("off"), json!("0"), json!(0)] {
            assert_eq!(sanitize(&falsy, PgType::Boolean), json!(false), "{:?}", falsy);
        }
        assert_eq!(sanitize(&json!("maybe"), PgType::Boolean), Value::Null);
        assert_eq!(sanitize(&json!(2), PgType::Boolean), Value::Null);
    }

    #[test]
    fn test_text_trimmed_and_stringified() {
        assert_eq!(sanitize(&json!("  Wheeler "), PgType::Text), json!("Wheeler"));
        assert_eq!(sanitize(&json!("   "), PgType::Varchar), Value::Null);
        assert_eq!(sanitize(&json!(1902), PgType::Text), json!("1902"));
        assert_eq!(sanitize(&json!(["a"]), PgType::Text), Value::Null);
    }

    #[test]
    fn test_text_choices() {
        let column =
            ColumnDefinition::new("image_state", PgType::Varchar).choices(&["raw", "master"]);
        assert_eq!(sanitize_column(&json!(" master "), &column), json!("master"));
        assert_eq!(sanitize_column(&json!("bogus"), &column), Value::Null);
    }

    #[test]
    fn test_dates_and_times() {
        assert_eq!(sanitize(&json!("1927-08-14"), PgType::Date), json!("1927-08-14"));
        assert_eq!(
            sanitize(&json!("1927-08-14T10:00:00Z"), PgType::Date),
            json!("1927-08-14")
        );
        assert_eq!(sanitize(&json!("14/08/1927"), PgType::Date), Value::Null);

        assert_eq!(
            sanitize(&json!("2024-05-01 10:30:00"), PgType::Timestamp),
            json!("2024-05-01T10:30:00")
        );
        assert_eq!(
            sanitize(&json!("2024-05-01"), PgType::Timestamp),
            json!("2024-05-01T00:00:00")
        );
        assert_eq!(sanitize(&json!("09:15"), PgType::Time), json!("09:15:00"));
        assert_eq!(sanitize(&json!("not a time"), PgType::Time), Value::Null);
    }

    #[test]
    fn test_json_passthrough() {
        let doc = json!({"exif": {"iso": 100}});
        assert_eq!(sanitize(&doc, PgType::Jsonb), doc);
        assert_eq!(sanitize(&Value::Null, PgType::Jsonb), Value::Null);
    }
}
