use std::fmt;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_SECOND: i64 = 1000;
const MILLIS_PER_HOUR: i64 = 3600 * MILLIS_PER_SECOND;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// A UTC instant, stored as milliseconds since the Unix epoch.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarDate(i64);

impl CalendarDate {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn from_hours(hours: i64) -> Self {
        Self(hours * MILLIS_PER_HOUR)
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    /// Hour of the day, 0-23, in UTC.
    ///
    pub fn hour_of_day(&self) -> u32 {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(instant) => instant.hour(),
            None => (self.0.rem_euclid(MILLIS_PER_DAY) / MILLIS_PER_HOUR) as u32,
        }
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(instant) => write!(f, "{}", instant.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeField {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeField {
    fn millis(&self) -> i64 {
        match self {
            TimeField::Second => MILLIS_PER_SECOND,
            TimeField::Minute => 60 * MILLIS_PER_SECOND,
            TimeField::Hour => MILLIS_PER_HOUR,
            TimeField::Day => MILLIS_PER_DAY,
        }
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            TimeField::Second => 0,
            TimeField::Minute => 1,
            TimeField::Hour => 2,
            TimeField::Day => 3,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(TimeField::Second),
            1 => Some(TimeField::Minute),
            2 => Some(TimeField::Hour),
            3 => Some(TimeField::Day),
            _ => None,
        }
    }
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeField::Second => "Second",
            TimeField::Minute => "Minute",
            TimeField::Hour => "Hour",
            TimeField::Day => "Day",
        };
        write!(f, "{name}")
    }
}

/// A fixed length period used as the unit of a time axis, e.g. "6 Hour".
///
/// Only fixed length fields are supported, so converting between a pair of dates and a count of
/// units is plain integer arithmetic.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "UnitFields")]
pub struct TimeUnit {
    field: TimeField,
    multiplier: i32,
}

/// Deserialized form of a `TimeUnit`, validated through `TimeUnit::new`.
///
#[derive(Deserialize)]
struct UnitFields {
    field: TimeField,
    multiplier: i32,
}

impl From<UnitFields> for TimeUnit {
    fn from(fields: UnitFields) -> Self {
        TimeUnit::new(fields.field, fields.multiplier)
    }
}

impl TimeUnit {
    /// A multiplier below 1 is taken as 1.
    ///
    pub fn new(field: TimeField, multiplier: i32) -> Self {
        Self {
            field,
            multiplier: multiplier.max(1),
        }
    }

    pub fn hours(multiplier: i32) -> Self {
        Self::new(TimeField::Hour, multiplier)
    }

    /// Map a GRIB "indicator of unit of time range" code to a unit.
    ///
    pub fn from_grib_code(code: i32) -> Option<Self> {
        let unit = match code {
            0 => Self::new(TimeField::Minute, 1),
            1 => Self::new(TimeField::Hour, 1),
            2 => Self::new(TimeField::Day, 1),
            10 => Self::new(TimeField::Hour, 3),
            11 => Self::new(TimeField::Hour, 6),
            12 => Self::new(TimeField::Hour, 12),
            13 => Self::new(TimeField::Second, 1),
            _ => return None,
        };

        Some(unit)
    }

    pub fn field(&self) -> TimeField {
        self.field
    }

    pub fn multiplier(&self) -> i32 {
        self.multiplier
    }

    pub fn millis(&self) -> i64 {
        self.field.millis() * self.multiplier as i64
    }

    /// Number of whole units from `start` to `end`. Fractions of a unit are truncated toward
    /// zero, and spans too long for an `i32` saturate.
    ///
    pub fn offset(&self, start: CalendarDate, end: CalendarDate) -> i32 {
        let count = end.millis().saturating_sub(start.millis()) / self.millis();

        count.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    pub fn add(&self, date: CalendarDate, count: i32) -> CalendarDate {
        CalendarDate::from_millis(date.millis() + count as i64 * self.millis())
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multiplier == 1 {
            write!(f, "{}", self.field)
        } else {
            write!(f, "{} {}", self.multiplier, self.field)
        }
    }
}
