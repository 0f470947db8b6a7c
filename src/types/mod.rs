//! Supported data types
//!
//! Every value stored in an attribute or associated data container belongs to a closed set
//! of scalar types (or a homogeneous array of one of them). Associated data may also hold a
//! [`ComplexDataObject`] tree for structures outside that set. Anything else is rejected
//! when the container is built, never later at serialization time.

pub mod complex;
pub mod range;

pub use complex::{ComplexDataObject, DataItem};
pub use range::{DateTimeRange, NumberRange};

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchemaError};

// =============================================================================
// Locale & Currency
// =============================================================================

static LOCALE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Z][a-z]{3})?(-([A-Z]{2}|[0-9]{3}))?$")
        .expect("locale pattern is a valid regex")
});

/// Language tag such as `en`, `en-US` or `zh-Hant-TW`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if !LOCALE_PATTERN.is_match(&tag) {
            return Err(SchemaError::InvalidValue(format!("`{tag}` is not a valid locale tag")));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The language subtag (`en` for `en-US`)
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl TryFrom<String> for Locale {
    type Error = SchemaError;

    fn try_from(tag: String) -> Result<Self> {
        Self::new(tag)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}

impl FromStr for Locale {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three-letter currency code such as `EUR`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(SchemaError::InvalidValue(format!("`{code}` is not a valid currency code")));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = SchemaError;

    fn try_from(code: String) -> Result<Self> {
        Self::new(code)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl FromStr for Currency {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Scalar & Value Types
// =============================================================================

/// The closed set of supported scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarType {
    String,
    Byte,
    Short,
    Integer,
    Long,
    Boolean,
    Character,
    BigDecimal,
    OffsetDateTime,
    LocalDateTime,
    LocalDate,
    LocalTime,
    DateTimeRange,
    BigDecimalNumberRange,
    LongNumberRange,
    IntegerNumberRange,
    ShortNumberRange,
    ByteNumberRange,
    Locale,
    Currency,
    Uuid,
    /// Only valid for associated data
    ComplexDataObject,
}

impl ScalarType {
    const ALL: [ScalarType; 22] = [
        ScalarType::String,
        ScalarType::Byte,
        ScalarType::Short,
        ScalarType::Integer,
        ScalarType::Long,
        ScalarType::Boolean,
        ScalarType::Character,
        ScalarType::BigDecimal,
        ScalarType::OffsetDateTime,
        ScalarType::LocalDateTime,
        ScalarType::LocalDate,
        ScalarType::LocalTime,
        ScalarType::DateTimeRange,
        ScalarType::BigDecimalNumberRange,
        ScalarType::LongNumberRange,
        ScalarType::IntegerNumberRange,
        ScalarType::ShortNumberRange,
        ScalarType::ByteNumberRange,
        ScalarType::Locale,
        ScalarType::Currency,
        ScalarType::Uuid,
        ScalarType::ComplexDataObject,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Byte => "Byte",
            ScalarType::Short => "Short",
            ScalarType::Integer => "Integer",
            ScalarType::Long => "Long",
            ScalarType::Boolean => "Boolean",
            ScalarType::Character => "Character",
            ScalarType::BigDecimal => "BigDecimal",
            ScalarType::OffsetDateTime => "OffsetDateTime",
            ScalarType::LocalDateTime => "LocalDateTime",
            ScalarType::LocalDate => "LocalDate",
            ScalarType::LocalTime => "LocalTime",
            ScalarType::DateTimeRange => "DateTimeRange",
            ScalarType::BigDecimalNumberRange => "BigDecimalNumberRange",
            ScalarType::LongNumberRange => "LongNumberRange",
            ScalarType::IntegerNumberRange => "IntegerNumberRange",
            ScalarType::ShortNumberRange => "ShortNumberRange",
            ScalarType::ByteNumberRange => "ByteNumberRange",
            ScalarType::Locale => "Locale",
            ScalarType::Currency => "Currency",
            ScalarType::Uuid => "UUID",
            ScalarType::ComplexDataObject => "ComplexDataObject",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ScalarType::Byte | ScalarType::Short | ScalarType::Integer | ScalarType::Long
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || *self == ScalarType::BigDecimal
    }

    /// Types whose indexed form depends on the number of indexed decimal places
    pub fn is_decimal_based(&self) -> bool {
        matches!(self, ScalarType::BigDecimal | ScalarType::BigDecimalNumberRange)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of an attribute or associated data: a scalar or an array of one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ValueType {
    scalar: ScalarType,
    array: bool,
}

impl ValueType {
    pub const fn scalar(scalar: ScalarType) -> Self {
        Self { scalar, array: false }
    }

    pub const fn array_of(scalar: ScalarType) -> Self {
        Self { scalar, array: true }
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar
    }

    pub fn is_array(&self) -> bool {
        self.array
    }

    pub fn is_complex(&self) -> bool {
        self.scalar == ScalarType::ComplexDataObject
    }
}

impl From<ScalarType> for ValueType {
    fn from(scalar: ScalarType) -> Self {
        Self::scalar(scalar)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "{}[]", self.scalar)
        } else {
            write!(f, "{}", self.scalar)
        }
    }
}

impl FromStr for ValueType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, array) = match s.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (s, false),
        };
        let scalar = ScalarType::from_name(name)
            .ok_or_else(|| SchemaError::InvalidValue(format!("unsupported data type `{s}`")))?;
        if array && scalar == ScalarType::ComplexDataObject {
            return Err(SchemaError::InvalidValue(
                "complex data objects cannot form arrays".to_string(),
            ));
        }
        Ok(Self { scalar, array })
    }
}

impl TryFrom<String> for ValueType {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ValueType> for String {
    fn from(value_type: ValueType) -> Self {
        value_type.to_string()
    }
}

// =============================================================================
// Value
// =============================================================================

/// A value of one of the supported types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Boolean(bool),
    Character(char),
    BigDecimal(Decimal),
    OffsetDateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    LocalDate(NaiveDate),
    LocalTime(NaiveTime),
    DateTimeRange(DateTimeRange),
    BigDecimalNumberRange(NumberRange<Decimal>),
    LongNumberRange(NumberRange<i64>),
    IntegerNumberRange(NumberRange<i32>),
    ShortNumberRange(NumberRange<i16>),
    ByteNumberRange(NumberRange<i8>),
    Locale(Locale),
    Currency(Currency),
    Uuid(Uuid),
    /// Homogeneous array of scalars
    Array(Vec<Value>),
}

impl Value {
    /// Scalar type of a non-array value
    fn scalar_type(&self) -> Option<ScalarType> {
        Some(match self {
            Value::String(_) => ScalarType::String,
            Value::Byte(_) => ScalarType::Byte,
            Value::Short(_) => ScalarType::Short,
            Value::Integer(_) => ScalarType::Integer,
            Value::Long(_) => ScalarType::Long,
            Value::Boolean(_) => ScalarType::Boolean,
            Value::Character(_) => ScalarType::Character,
            Value::BigDecimal(_) => ScalarType::BigDecimal,
            Value::OffsetDateTime(_) => ScalarType::OffsetDateTime,
            Value::LocalDateTime(_) => ScalarType::LocalDateTime,
            Value::LocalDate(_) => ScalarType::LocalDate,
            Value::LocalTime(_) => ScalarType::LocalTime,
            Value::DateTimeRange(_) => ScalarType::DateTimeRange,
            Value::BigDecimalNumberRange(_) => ScalarType::BigDecimalNumberRange,
            Value::LongNumberRange(_) => ScalarType::LongNumberRange,
            Value::IntegerNumberRange(_) => ScalarType::IntegerNumberRange,
            Value::ShortNumberRange(_) => ScalarType::ShortNumberRange,
            Value::ByteNumberRange(_) => ScalarType::ByteNumberRange,
            Value::Locale(_) => ScalarType::Locale,
            Value::Currency(_) => ScalarType::Currency,
            Value::Uuid(_) => ScalarType::Uuid,
            Value::Array(_) => return None,
        })
    }

    /// Type of the value; `None` for an empty array whose element type is unknown or for
    /// values outside the supported set.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Array(items) => {
                let first = items.first()?.scalar_type()?;
                items
                    .iter()
                    .all(|item| item.scalar_type() == Some(first))
                    .then_some(ValueType::array_of(first))
            }
            scalar => scalar.scalar_type().map(ValueType::scalar),
        }
    }

    /// Fail unless the value belongs to the supported set: scalars, or flat homogeneous
    /// arrays of scalars.
    pub fn check_supported(&self) -> Result<()> {
        if let Value::Array(items) = self {
            if items.iter().any(|item| matches!(item, Value::Array(_))) {
                return Err(SchemaError::InvalidValue(
                    "nested arrays are not a supported data type".to_string(),
                ));
            }
            if !items.is_empty() && self.value_type().is_none() {
                return Err(SchemaError::InvalidValue(
                    "array items must all be of the same type".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether the value can be stored under the declared type
    pub fn conforms_to(&self, expected: &ValueType) -> bool {
        match self {
            Value::Array(items) if items.is_empty() => expected.is_array(),
            _ => self.value_type().as_ref() == Some(expected),
        }
    }

    /// Type name used in error messages
    pub fn type_label(&self) -> String {
        match self.value_type() {
            Some(value_type) => value_type.to_string(),
            None if matches!(self, Value::Array(items) if items.is_empty()) => "[]".to_string(),
            None => "unsupported".to_string(),
        }
    }

    /// Convert the value to another type where a lossless conversion exists
    pub fn convert_to(&self, target: &ValueType) -> Result<Value> {
        if self.conforms_to(target) {
            return Ok(self.clone());
        }
        let mismatch = || SchemaError::type_mismatch("value", target, self.type_label());
        match self {
            Value::Array(items) if target.is_array() => {
                let element = ValueType::scalar(target.scalar_type());
                let converted = items
                    .iter()
                    .map(|item| item.convert_to(&element))
                    .collect::<Result<Vec<_>>>()
                    .map_err(|_| mismatch())?;
                Ok(Value::Array(converted))
            }
            Value::Array(_) => Err(mismatch()),
            _ if target.is_array() => Err(mismatch()),
            scalar => scalar.convert_scalar(target.scalar_type()).ok_or_else(mismatch),
        }
    }

    fn convert_scalar(&self, target: ScalarType) -> Option<Value> {
        if target == ScalarType::String {
            return Some(Value::String(self.to_string()));
        }
        if let Value::String(s) = self {
            return parse_scalar(s, target);
        }
        if let Some(decimal) = self.as_decimal() {
            return from_decimal(decimal, target);
        }
        None
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Byte(v) => Some(Decimal::from(*v)),
            Value::Short(v) => Some(Decimal::from(*v)),
            Value::Integer(v) => Some(Decimal::from(*v)),
            Value::Long(v) => Some(Decimal::from(*v)),
            Value::BigDecimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Add a numeric delta of the same type, failing on overflow
    pub fn checked_add(&self, delta: &Value) -> Result<Value> {
        let overflow = || SchemaError::InvalidValue(format!("adding {delta} to {self} overflows"));
        match (self, delta) {
            (Value::Byte(a), Value::Byte(b)) => a.checked_add(*b).map(Value::Byte).ok_or_else(overflow),
            (Value::Short(a), Value::Short(b)) => a.checked_add(*b).map(Value::Short).ok_or_else(overflow),
            (Value::Integer(a), Value::Integer(b)) => {
                a.checked_add(*b).map(Value::Integer).ok_or_else(overflow)
            }
            (Value::Long(a), Value::Long(b)) => a.checked_add(*b).map(Value::Long).ok_or_else(overflow),
            (Value::BigDecimal(a), Value::BigDecimal(b)) => {
                a.checked_add(*b).map(Value::BigDecimal).ok_or_else(overflow)
            }
            _ => Err(SchemaError::type_mismatch(
                "delta",
                self.type_label(),
                delta.type_label(),
            )),
        }
    }

    /// Whether a numeric value falls within a numeric range value of matching type
    pub fn within(&self, range: &Value) -> Option<bool> {
        Some(match (self, range) {
            (Value::Byte(v), Value::ByteNumberRange(r)) => r.contains(*v),
            (Value::Short(v), Value::ShortNumberRange(r)) => r.contains(*v),
            (Value::Integer(v), Value::IntegerNumberRange(r)) => r.contains(*v),
            (Value::Long(v), Value::LongNumberRange(r)) => r.contains(*v),
            (Value::BigDecimal(v), Value::BigDecimalNumberRange(r)) => r.contains(*v),
            _ => return None,
        })
    }

    /// JSON rendering used by complex data objects
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Byte(v) => (*v).into(),
            Value::Short(v) => (*v).into(),
            Value::Integer(v) => (*v).into(),
            Value::Long(v) => (*v).into(),
            Value::Boolean(v) => (*v).into(),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

fn parse_scalar(s: &str, target: ScalarType) -> Option<Value> {
    match target {
        ScalarType::Byte => s.parse().ok().map(Value::Byte),
        ScalarType::Short => s.parse().ok().map(Value::Short),
        ScalarType::Integer => s.parse().ok().map(Value::Integer),
        ScalarType::Long => s.parse().ok().map(Value::Long),
        ScalarType::Boolean => s.parse().ok().map(Value::Boolean),
        ScalarType::Character => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Value::Character(c)),
                _ => None,
            }
        }
        ScalarType::BigDecimal => s.parse().ok().map(Value::BigDecimal),
        ScalarType::OffsetDateTime => DateTime::parse_from_rfc3339(s).ok().map(Value::OffsetDateTime),
        ScalarType::LocalDateTime => s.parse().ok().map(Value::LocalDateTime),
        ScalarType::LocalDate => s.parse().ok().map(Value::LocalDate),
        ScalarType::LocalTime => s.parse().ok().map(Value::LocalTime),
        ScalarType::Locale => Locale::new(s).ok().map(Value::Locale),
        ScalarType::Currency => Currency::new(s).ok().map(Value::Currency),
        ScalarType::Uuid => s.parse().ok().map(Value::Uuid),
        _ => None,
    }
}

fn from_decimal(decimal: Decimal, target: ScalarType) -> Option<Value> {
    let integral = decimal.fract().is_zero();
    match target {
        ScalarType::Byte if integral => decimal.to_i8().map(Value::Byte),
        ScalarType::Short if integral => decimal.to_i16().map(Value::Short),
        ScalarType::Integer if integral => decimal.to_i32().map(Value::Integer),
        ScalarType::Long if integral => decimal.to_i64().map(Value::Long),
        ScalarType::BigDecimal => Some(Value::BigDecimal(decimal)),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(v) => f.write_str(v),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Character(v) => write!(f, "{v}"),
            Value::BigDecimal(v) => write!(f, "{v}"),
            Value::OffsetDateTime(v) => f.write_str(&v.to_rfc3339()),
            Value::LocalDateTime(v) => write!(f, "{v}"),
            Value::LocalDate(v) => write!(f, "{v}"),
            Value::LocalTime(v) => write!(f, "{v}"),
            Value::DateTimeRange(v) => write!(f, "{v}"),
            Value::BigDecimalNumberRange(v) => write!(f, "{v}"),
            Value::LongNumberRange(v) => write!(f, "{v}"),
            Value::IntegerNumberRange(v) => write!(f, "{v}"),
            Value::ShortNumberRange(v) => write!(f, "{v}"),
            Value::ByteNumberRange(v) => write!(f, "{v}"),
            Value::Locale(v) => write!(f, "{v}"),
            Value::Currency(v) => write!(f, "{v}"),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    String => String,
    i8 => Byte,
    i16 => Short,
    i32 => Integer,
    i64 => Long,
    bool => Boolean,
    char => Character,
    Decimal => BigDecimal,
    DateTime<FixedOffset> => OffsetDateTime,
    NaiveDateTime => LocalDateTime,
    NaiveDate => LocalDate,
    NaiveTime => LocalTime,
    DateTimeRange => DateTimeRange,
    NumberRange<Decimal> => BigDecimalNumberRange,
    NumberRange<i64> => LongNumberRange,
    NumberRange<i32> => IntegerNumberRange,
    NumberRange<i16> => ShortNumberRange,
    NumberRange<i8> => ByteNumberRange,
    Locale => Locale,
    Currency => Currency,
    Uuid => Uuid,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_validation() {
        assert!(Locale::new("en").is_ok());
        assert!(Locale::new("en-US").is_ok());
        assert!(Locale::new("zh-Hant-TW").is_ok());
        assert!(Locale::new("EN").is_err());
        assert!(Locale::new("en_US").is_err());
        assert_eq!(Locale::new("cs-CZ").unwrap().language(), "cs");
    }

    #[test]
    fn test_currency_validation() {
        assert!(Currency::new("EUR").is_ok());
        assert!(Currency::new("eur").is_err());
        assert!(Currency::new("EURO").is_err());
    }

    #[test]
    fn test_value_type_parsing() {
        let t: ValueType = "String[]".parse().unwrap();
        assert_eq!(t, ValueType::array_of(ScalarType::String));
        assert_eq!(t.to_string(), "String[]");
        assert!("Double".parse::<ValueType>().is_err());
        assert!("ComplexDataObject[]".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::from("a").value_type(), Some(ValueType::scalar(ScalarType::String)));
        assert_eq!(
            Value::from(vec![1i32, 2]).value_type(),
            Some(ValueType::array_of(ScalarType::Integer))
        );
        assert!(Value::Array(vec![]).conforms_to(&ValueType::array_of(ScalarType::Long)));
        assert!(!Value::from(1i32).conforms_to(&ValueType::scalar(ScalarType::Long)));
    }

    #[test]
    fn test_unsupported_values_rejected() {
        let mixed = Value::Array(vec![Value::from(1i32), Value::from("x")]);
        assert!(mixed.check_supported().is_err());
        let nested = Value::Array(vec![Value::from(vec![1i32])]);
        assert!(nested.check_supported().is_err());
        assert!(Value::from(vec!["a", "b"]).check_supported().is_ok());
    }

    #[test]
    fn test_conversions() {
        let long = ValueType::scalar(ScalarType::Long);
        assert_eq!(Value::from(5i32).convert_to(&long).unwrap(), Value::Long(5));
        assert_eq!(Value::from("42").convert_to(&long).unwrap(), Value::Long(42));
        assert_eq!(
            Value::from(7i64).convert_to(&ValueType::scalar(ScalarType::String)).unwrap(),
            Value::from("7")
        );
        assert!(Value::from("abc").convert_to(&long).is_err());
        assert!(Value::from(300i32).convert_to(&ValueType::scalar(ScalarType::Byte)).is_err());
        assert_eq!(
            Value::from(vec![1i32, 2]).convert_to(&ValueType::array_of(ScalarType::Long)).unwrap(),
            Value::from(vec![1i64, 2])
        );
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(Value::from(1i32).checked_add(&Value::from(2i32)).unwrap(), Value::from(3i32));
        assert!(Value::from(i8::MAX).checked_add(&Value::from(1i8)).is_err());
        assert!(Value::from(1i32).checked_add(&Value::from(1i64)).unwrap_err().is_type_mismatch());
    }
}
