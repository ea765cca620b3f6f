//! Type system glue: lexical parsing and ordering of typed values.
//!
//! The serialization layer hands the engine raw strings; this module turns
//! them into [`Value`]s per data-type URI and provides the ordering used by
//! comparison functions.

use std::cmp::Ordering;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveTime};
use thiserror::Error;

use arbiter_core::id::DataType;
use arbiter_core::value::Value;

/// Errors raised while parsing a lexical value.
#[derive(Debug, Error)]
pub enum TypeError {
    #[error("Cannot parse '{lexical}' as {data_type}")]
    Parse { data_type: DataType, lexical: String },
}

impl TypeError {
    fn parse(data_type: &DataType, lexical: &str) -> Self {
        Self::Parse {
            data_type: data_type.clone(),
            lexical: lexical.to_string(),
        }
    }
}

/// Parse a lexical value into a typed value.
///
/// Unknown data-type URIs produce an `Extension` value carrying the lexical
/// form; hosts that register extension types interpret them in their own
/// functions.
pub fn parse_value(data_type: &DataType, lexical: &str) -> Result<Value, TypeError> {
    let err = || TypeError::parse(data_type, lexical);

    let value = if *data_type == DataType::string() {
        Value::String(lexical.to_string())
    } else if *data_type == DataType::boolean() {
        match lexical {
            "true" | "1" => Value::Boolean(true),
            "false" | "0" => Value::Boolean(false),
            _ => return Err(err()),
        }
    } else if *data_type == DataType::integer() {
        Value::Integer(lexical.trim().parse().map_err(|_| err())?)
    } else if *data_type == DataType::double() {
        Value::Double(lexical.trim().parse().map_err(|_| err())?)
    } else if *data_type == DataType::date() {
        Value::Date(NaiveDate::parse_from_str(lexical, "%Y-%m-%d").map_err(|_| err())?)
    } else if *data_type == DataType::time() {
        Value::Time(NaiveTime::parse_from_str(lexical, "%H:%M:%S%.f").map_err(|_| err())?)
    } else if *data_type == DataType::date_time() {
        Value::DateTime(DateTime::parse_from_rfc3339(lexical).map_err(|_| err())?)
    } else if *data_type == DataType::any_uri() {
        Value::AnyUri(lexical.to_string())
    } else if *data_type == DataType::hex_binary() {
        Value::HexBinary(parse_hex(lexical).ok_or_else(err)?)
    } else if *data_type == DataType::base64_binary() {
        Value::Base64Binary(BASE64.decode(lexical.trim()).map_err(|_| err())?)
    } else if *data_type == DataType::day_time_duration() {
        Value::DayTimeDuration(parse_day_time_duration(lexical).ok_or_else(err)?)
    } else if *data_type == DataType::year_month_duration() {
        Value::YearMonthDuration(parse_year_month_duration(lexical).ok_or_else(err)?)
    } else if *data_type == DataType::x500_name() {
        Value::X500Name(lexical.to_string())
    } else if *data_type == DataType::rfc822_name() {
        Value::Rfc822Name(lexical.to_string())
    } else if *data_type == DataType::dns_name() {
        Value::DnsName(lexical.to_string())
    } else if *data_type == DataType::ip_address() {
        Value::IpAddress(lexical.to_string())
    } else {
        Value::Extension {
            data_type: data_type.clone(),
            lexical: lexical.to_string(),
        }
    };
    Ok(value)
}

/// Compare two values of the same data type.
///
/// Returns `None` for values of different types and for types without a
/// defined ordering.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::DayTimeDuration(x), Value::DayTimeDuration(y)) => Some(x.cmp(y)),
        (Value::YearMonthDuration(x), Value::YearMonthDuration(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn parse_hex(lexical: &str) -> Option<Vec<u8>> {
    let lexical = lexical.trim();
    if lexical.len() % 2 != 0 {
        return None;
    }
    (0..lexical.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(lexical.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Parse an ISO 8601 day-time duration (`PnDTnHnMnS`) into whole seconds.
fn parse_day_time_duration(lexical: &str) -> Option<i64> {
    let lexical = lexical.trim();
    let (negative, rest) = match lexical.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lexical),
    };
    let rest = rest.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut seconds: i64 = 0;
    if !date_part.is_empty() {
        let days: i64 = date_part.strip_suffix('D')?.parse().ok()?;
        seconds += days * 86_400;
    }
    let mut remaining = time_part;
    for (suffix, factor) in [('H', 3_600), ('M', 60), ('S', 1)] {
        if let Some(position) = remaining.find(suffix) {
            let number: i64 = remaining[..position].parse().ok()?;
            seconds += number * factor;
            remaining = &remaining[position + 1..];
        }
    }
    if !remaining.is_empty() {
        return None;
    }
    Some(if negative { -seconds } else { seconds })
}

/// Parse an ISO 8601 year-month duration (`PnYnM`) into whole months.
fn parse_year_month_duration(lexical: &str) -> Option<i32> {
    let lexical = lexical.trim();
    let (negative, rest) = match lexical.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lexical),
    };
    let mut remaining = rest.strip_prefix('P')?;

    let mut months: i32 = 0;
    for (suffix, factor) in [('Y', 12), ('M', 1)] {
        if let Some(position) = remaining.find(suffix) {
            let number: i32 = remaining[..position].parse().ok()?;
            months += number * factor;
            remaining = &remaining[position + 1..];
        }
    }
    if !remaining.is_empty() {
        return None;
    }
    Some(if negative { -months } else { months })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(
            parse_value(&DataType::string(), "hello").unwrap(),
            Value::String("hello".to_string())
        );
        assert_eq!(
            parse_value(&DataType::boolean(), "true").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            parse_value(&DataType::integer(), "42").unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            parse_value(&DataType::double(), "2.5").unwrap(),
            Value::Double(2.5)
        );
    }

    #[test]
    fn test_parse_temporal() {
        assert!(matches!(
            parse_value(&DataType::date(), "2024-03-01").unwrap(),
            Value::Date(_)
        ));
        assert!(matches!(
            parse_value(&DataType::time(), "09:30:00").unwrap(),
            Value::Time(_)
        ));
        assert!(matches!(
            parse_value(&DataType::date_time(), "2024-03-01T09:30:00Z").unwrap(),
            Value::DateTime(_)
        ));
        assert!(parse_value(&DataType::date(), "not-a-date").is_err());
    }

    #[test]
    fn test_parse_binary() {
        assert_eq!(
            parse_value(&DataType::hex_binary(), "0AFF").unwrap(),
            Value::HexBinary(vec![0x0a, 0xff])
        );
        assert_eq!(
            parse_value(&DataType::base64_binary(), "aGk=").unwrap(),
            Value::Base64Binary(b"hi".to_vec())
        );
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!(
            parse_value(&DataType::day_time_duration(), "P1DT2H3M4S").unwrap(),
            Value::DayTimeDuration(86_400 + 2 * 3_600 + 3 * 60 + 4)
        );
        assert_eq!(
            parse_value(&DataType::day_time_duration(), "-PT30S").unwrap(),
            Value::DayTimeDuration(-30)
        );
        assert_eq!(
            parse_value(&DataType::year_month_duration(), "P2Y6M").unwrap(),
            Value::YearMonthDuration(30)
        );
    }

    #[test]
    fn test_unknown_data_type_is_extension() {
        let data_type = DataType::new("urn:example:data-type:color");
        assert_eq!(
            parse_value(&data_type, "red").unwrap(),
            Value::Extension {
                data_type,
                lexical: "red".to_string()
            }
        );
    }

    #[test]
    fn test_compare_same_and_mixed_types() {
        assert_eq!(
            compare_values(&Value::Integer(1), &Value::Integer(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::String("b".into()), &Value::String("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_values(&Value::Integer(1), &Value::Double(1.0)), None);
    }
}
