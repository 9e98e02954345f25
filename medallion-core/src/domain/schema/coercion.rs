// medallion-core/src/domain/schema/coercion.rs
//
// "Coerce, don't crash": a cell that cannot be converted becomes null and is
// counted, the row itself is never rejected here.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

use crate::domain::table::{ColumnType, Value};

/// Outcome of converting a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Ok(Value),
    /// Input was blank, output is null. Not a failure.
    Blank,
    /// Input had content that could not be converted.
    Failed,
}

pub type Coercer = fn(&Value) -> Coerced;

/// Dispatch table: declared column type -> conversion routine.
pub const COERCERS: [(ColumnType, Coercer); 5] = [
    (ColumnType::Int, coerce_int),
    (ColumnType::Float, coerce_float),
    (ColumnType::String, coerce_string),
    (ColumnType::Date, coerce_date),
    (ColumnType::Bool, coerce_bool),
];

pub fn coercer_for(kind: ColumnType) -> Coercer {
    COERCERS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, f)| *f)
        .unwrap_or(coerce_string)
}

pub fn coerce(kind: ColumnType, value: &Value) -> Coerced {
    if value.is_blank() {
        return Coerced::Blank;
    }
    coercer_for(kind)(value)
}

// Currency symbols and thousands separators seen in POS exports ("₹1,299.00").
#[allow(clippy::expect_used)]
static NUMERIC_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,_\s₹$€£]").expect("literal pattern"));

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%d/%m/%Y %H:%M"];

fn clean_numeric(s: &str) -> String {
    NUMERIC_NOISE.replace_all(s.trim(), "").into_owned()
}

fn coerce_int(value: &Value) -> Coerced {
    match value {
        Value::Int(i) => Coerced::Ok(Value::Int(*i)),
        Value::Float(f) => integral(*f).map(|i| Coerced::Ok(Value::Int(i))).unwrap_or(Coerced::Failed),
        Value::Bool(b) => Coerced::Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => {
            let cleaned = clean_numeric(s);
            if let Ok(i) = cleaned.parse::<i64>() {
                return Coerced::Ok(Value::Int(i));
            }
            cleaned
                .parse::<f64>()
                .ok()
                .and_then(integral)
                .map(|i| Coerced::Ok(Value::Int(i)))
                .unwrap_or(Coerced::Failed)
        }
        _ => Coerced::Failed,
    }
}

/// Whole float that fits in an i64. `i64::MAX as f64` rounds up to 2^63, hence the strict bound.
fn integral(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn coerce_float(value: &Value) -> Coerced {
    match value {
        Value::Float(f) => Coerced::Ok(Value::Float(*f)),
        Value::Int(i) => Coerced::Ok(Value::Float(*i as f64)),
        Value::Str(s) => match clean_numeric(s).parse::<f64>() {
            Ok(f) if f.is_finite() => Coerced::Ok(Value::Float(f)),
            _ => Coerced::Failed,
        },
        _ => Coerced::Failed,
    }
}

fn coerce_string(value: &Value) -> Coerced {
    match value {
        Value::Str(s) => Coerced::Ok(Value::Str(s.trim().to_string())),
        other => match other.as_text() {
            Some(t) => Coerced::Ok(Value::Str(t)),
            None => Coerced::Blank,
        },
    }
}

fn coerce_date(value: &Value) -> Coerced {
    match value {
        Value::Date(d) => Coerced::Ok(Value::Date(*d)),
        Value::Str(s) => parse_date(s.trim())
            .map(|d| Coerced::Ok(Value::Date(d)))
            .unwrap_or(Coerced::Failed),
        _ => Coerced::Failed,
    }
}

fn coerce_bool(value: &Value) -> Coerced {
    match value {
        Value::Bool(b) => Coerced::Ok(Value::Bool(*b)),
        Value::Int(i) => Coerced::Ok(Value::Bool(*i != 0)),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Coerced::Ok(Value::Bool(true)),
            "false" | "f" | "no" | "0" => Coerced::Ok(Value::Bool(false)),
            _ => Coerced::Failed,
        },
        _ => Coerced::Failed,
    }
}

/// Business date from a date or timestamp string; the time part is dropped.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_dispatch_covers_every_type() {
        for kind in [
            ColumnType::Int,
            ColumnType::Float,
            ColumnType::String,
            ColumnType::Date,
            ColumnType::Bool,
        ] {
            assert!(COERCERS.iter().any(|(k, _)| *k == kind));
        }
    }

    #[test]
    fn test_numeric_noise_is_stripped() {
        assert_eq!(
            coerce(ColumnType::Float, &Value::str("₹1,299.50")),
            Coerced::Ok(Value::Float(1299.5))
        );
        assert_eq!(coerce(ColumnType::Int, &Value::str("3.0")), Coerced::Ok(Value::Int(3)));
        assert_eq!(coerce(ColumnType::Int, &Value::str("-50")), Coerced::Ok(Value::Int(-50)));
    }

    #[test]
    fn test_unparseable_cell_fails_instead_of_panicking() {
        assert_eq!(coerce(ColumnType::Int, &Value::str("two")), Coerced::Failed);
        assert_eq!(coerce(ColumnType::Date, &Value::str("yesterday")), Coerced::Failed);
    }

    #[test]
    fn test_int_out_of_range_fails_instead_of_saturating() {
        assert_eq!(coerce(ColumnType::Int, &Value::str("1e300")), Coerced::Failed);
        assert_eq!(coerce(ColumnType::Int, &Value::Float(-1e300)), Coerced::Failed);
        assert_eq!(coerce(ColumnType::Int, &Value::Float(f64::INFINITY)), Coerced::Failed);
        assert_eq!(coerce(ColumnType::Int, &Value::str("1e3")), Coerced::Ok(Value::Int(1000)));
    }

    #[test]
    fn test_blank_is_not_a_failure() {
        assert_eq!(coerce(ColumnType::Float, &Value::str("nan")), Coerced::Blank);
        assert_eq!(coerce(ColumnType::String, &Value::Null), Coerced::Blank);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date("2024-03-09"), Some(date(2024, 3, 9)));
        assert_eq!(parse_date("2024-03-09 18:22:01"), Some(date(2024, 3, 9)));
        assert_eq!(parse_date("2024-03-09T18:22:01.123"), Some(date(2024, 3, 9)));
        assert_eq!(parse_date("2024-03-09T18:22:01+05:30"), Some(date(2024, 3, 9)));
        assert_eq!(parse_date("09/03/2024"), Some(date(2024, 3, 9)));
    }
}
