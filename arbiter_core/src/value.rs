//! Typed attribute values and bags.
//!
//! Every attribute in a request and every literal in a policy carries one of
//! these values. The set of built-in data types is closed; extension data
//! types registered by the host are carried as opaque typed strings.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::id::DataType;

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    AnyUri(String),
    HexBinary(Vec<u8>),
    Base64Binary(Vec<u8>),

    /// Duration in whole seconds.
    DayTimeDuration(i64),

    /// Duration in whole months.
    YearMonthDuration(i32),

    X500Name(String),
    Rfc822Name(String),
    DnsName(String),
    IpAddress(String),

    /// A value of an extension data type, kept in its lexical form.
    Extension { data_type: DataType, lexical: String },
}

impl Value {
    /// Get the data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::string(),
            Self::Boolean(_) => DataType::boolean(),
            Self::Integer(_) => DataType::integer(),
            Self::Double(_) => DataType::double(),
            Self::Date(_) => DataType::date(),
            Self::Time(_) => DataType::time(),
            Self::DateTime(_) => DataType::date_time(),
            Self::AnyUri(_) => DataType::any_uri(),
            Self::HexBinary(_) => DataType::hex_binary(),
            Self::Base64Binary(_) => DataType::base64_binary(),
            Self::DayTimeDuration(_) => DataType::day_time_duration(),
            Self::YearMonthDuration(_) => DataType::year_month_duration(),
            Self::X500Name(_) => DataType::x500_name(),
            Self::Rfc822Name(_) => DataType::rfc822_name(),
            Self::DnsName(_) => DataType::dns_name(),
            Self::IpAddress(_) => DataType::ip_address(),
            Self::Extension { data_type, .. } => data_type.clone(),
        }
    }

    /// Get the boolean payload, if this is a boolean value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the string payload, if this is a string value.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer payload, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the double payload, if this is a double value.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// An unordered, duplicate-permitting collection of values of one data type.
///
/// Attribute designators and selectors always resolve to a bag, even when
/// the request carries a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bag {
    data_type: DataType,
    values: Vec<Value>,
}

impl Bag {
    /// Create a bag from a list of values.
    pub fn new(data_type: DataType, values: Vec<Value>) -> Self {
        Self { data_type, values }
    }

    /// Create an empty bag of the given data type.
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            values: Vec::new(),
        }
    }

    /// Create a single-value bag.
    pub fn singleton(value: Value) -> Self {
        Self {
            data_type: value.data_type(),
            values: vec![value],
        }
    }

    /// The data type of the bag's values.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// The values in the bag, in insertion order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The number of values in the bag.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the bag contains the given value.
    pub fn contains(&self, value: &Value) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Add a value to the bag.
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Get the single value of a one-element bag.
    pub fn one_and_only(&self) -> Option<&Value> {
        if self.values.len() == 1 {
            self.values.first()
        } else {
            None
        }
    }
}
