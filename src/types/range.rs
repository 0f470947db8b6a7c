//! Range value types
//!
//! Ranges are closed on both ends; a missing bound is unbounded on that side. At least one
//! bound must be present and `from <= to` when both are.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// Numeric range over integers or decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeRepr<T>", into = "RangeRepr<T>")]
#[serde(bound(
    serialize = "T: Serialize + Copy",
    deserialize = "T: Deserialize<'de> + PartialOrd + Copy + fmt::Display"
))]
pub struct NumberRange<T> {
    from: Option<T>,
    to: Option<T>,
}

#[derive(Serialize, Deserialize)]
struct RangeRepr<T> {
    from: Option<T>,
    to: Option<T>,
}

impl<T: PartialOrd + Copy + fmt::Display> NumberRange<T> {
    pub fn new(from: Option<T>, to: Option<T>) -> Result<Self> {
        check_bounds(from.as_ref(), to.as_ref())?;
        Ok(Self { from, to })
    }

    pub fn between(from: T, to: T) -> Result<Self> {
        Self::new(Some(from), Some(to))
    }

    pub fn at_least(from: T) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn at_most(to: T) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn lower(&self) -> Option<T> {
        self.from
    }

    pub fn upper(&self) -> Option<T> {
        self.to
    }

    pub fn contains(&self, value: T) -> bool {
        self.from.map_or(true, |from| from <= value) && self.to.map_or(true, |to| value <= to)
    }
}

impl<T: PartialOrd + Copy + fmt::Display> TryFrom<RangeRepr<T>> for NumberRange<T> {
    type Error = SchemaError;

    fn try_from(repr: RangeRepr<T>) -> Result<Self> {
        Self::new(repr.from, repr.to)
    }
}

impl<T: Copy> From<NumberRange<T>> for RangeRepr<T> {
    fn from(range: NumberRange<T>) -> Self {
        Self {
            from: range.from,
            to: range.to,
        }
    }
}

impl<T: fmt::Display> fmt::Display for NumberRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bounds(f, self.from.as_ref(), self.to.as_ref())
    }
}

/// Range of moments in time, used for price validity among others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeRepr<DateTime<FixedOffset>>", into = "RangeRepr<DateTime<FixedOffset>>")]
pub struct DateTimeRange {
    from: Option<DateTime<FixedOffset>>,
    to: Option<DateTime<FixedOffset>>,
}

impl DateTimeRange {
    pub fn new(from: Option<DateTime<FixedOffset>>, to: Option<DateTime<FixedOffset>>) -> Result<Self> {
        check_bounds(from.as_ref(), to.as_ref())?;
        Ok(Self { from, to })
    }

    pub fn between(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> Result<Self> {
        Self::new(Some(from), Some(to))
    }

    pub fn since(from: DateTime<FixedOffset>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn until(to: DateTime<FixedOffset>) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn lower(&self) -> Option<DateTime<FixedOffset>> {
        self.from
    }

    pub fn upper(&self) -> Option<DateTime<FixedOffset>> {
        self.to
    }

    /// Whether the moment falls inside the range
    pub fn valid_at(&self, moment: DateTime<FixedOffset>) -> bool {
        self.from.map_or(true, |from| from <= moment) && self.to.map_or(true, |to| moment <= to)
    }
}

impl TryFrom<RangeRepr<DateTime<FixedOffset>>> for DateTimeRange {
    type Error = SchemaError;

    fn try_from(repr: RangeRepr<DateTime<FixedOffset>>) -> Result<Self> {
        Self::new(repr.from, repr.to)
    }
}

impl From<DateTimeRange> for RangeRepr<DateTime<FixedOffset>> {
    fn from(range: DateTimeRange) -> Self {
        Self {
            from: range.from,
            to: range.to,
        }
    }
}

impl fmt::Display for DateTimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bounds(
            f,
            self.from.map(|d| d.to_rfc3339()).as_ref(),
            self.to.map(|d| d.to_rfc3339()).as_ref(),
        )
    }
}

fn check_bounds<T: PartialOrd + fmt::Display>(from: Option<&T>, to: Option<&T>) -> Result<()> {
    match (from, to) {
        (None, None) => Err(SchemaError::InvalidValue(
            "range must have at least one bound".to_string(),
        )),
        (Some(from), Some(to)) if from > to => Err(SchemaError::InvalidValue(format!(
            "range lower bound {from} is greater than upper bound {to}"
        ))),
        _ => Ok(()),
    }
}

fn write_bounds<T: fmt::Display>(f: &mut fmt::Formatter<'_>, from: Option<&T>, to: Option<&T>) -> fmt::Result {
    f.write_str("[")?;
    if let Some(from) = from {
        write!(f, "{from}")?;
    }
    f.write_str(",")?;
    if let Some(to) = to {
        write!(f, "{to}")?;
    }
    f.write_str("]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_number_range_bounds() {
        let range = NumberRange::between(1i32, 10).unwrap();
        assert!(range.contains(1));
        assert!(range.contains(10));
        assert!(!range.contains(11));
        assert_eq!(range.to_string(), "[1,10]");

        assert!(NumberRange::between(10i32, 1).is_err());
        assert!(NumberRange::<i32>::new(None, None).is_err());
        assert!(NumberRange::at_most(5i64).contains(-100));
    }

    #[test]
    fn test_date_time_range_validity() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let start = tz.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = tz.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let range = DateTimeRange::between(start, end).unwrap();

        assert!(range.valid_at(tz.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        assert!(!range.valid_at(tz.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert!(DateTimeRange::since(start).valid_at(end));
    }

    #[test]
    fn test_range_deserialization_validates() {
        let ok: NumberRange<i64> = serde_json::from_str(r#"{"from":1,"to":2}"#).unwrap();
        assert_eq!(ok.lower(), Some(1));
        let err = serde_json::from_str::<NumberRange<i64>>(r#"{"from":3,"to":2}"#);
        assert!(err.is_err());
    }
}
