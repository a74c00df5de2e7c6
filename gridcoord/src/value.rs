//! Raw coordinate values, one type per axis kind.
//!
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{helpers::rearrange, time::CalendarDate};

/// A bounded forecast lead time range, in units of the owning axis.
///
/// Intervals sort by their end bound first, then by their start bound, so intervals ending at
/// the same time are adjacent.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    pub start: i32,
    pub end: i32,
}

impl Interval {
    pub fn new(start: i32, end: i32) -> Self {
        let (start, end) = rearrange(start, end);
        Self { start, end }
    }

    pub fn len(&self) -> i32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// This interval moved by `by` units.
    ///
    pub fn shifted(&self, by: i32) -> Self {
        Self {
            start: self.start + by,
            end: self.end + by,
        }
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.end
            .cmp(&other.end)
            .then_with(|| self.start.cmp(&other.start))
    }
}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.start, self.end)
    }
}

/// A vertical coordinate: a single level, or a layer between two levels.
///
/// Floating point values are compared by total order and hashed by bit pattern, so a `Level`
/// can be used as a set or map key.
///
#[derive(Clone, Copy, Debug)]
pub struct Level {
    pub value1: f64,
    pub value2: f64,
    pub is_layer: bool,
}

impl Level {
    pub fn new(value: f64) -> Self {
        Self {
            value1: value,
            value2: f64::NAN,
            is_layer: false,
        }
    }

    pub fn layer(value1: f64, value2: f64) -> Self {
        Self {
            value1,
            value2,
            is_layer: true,
        }
    }

    /// Midpoint of a layer, or the level itself.
    ///
    pub fn midpoint(&self) -> f64 {
        if self.is_layer {
            (self.value1 + self.value2) / 2.0
        } else {
            self.value1
        }
    }
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Level {}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value1
            .total_cmp(&other.value1)
            .then_with(|| self.value2.total_cmp(&other.value2))
            .then_with(|| self.is_layer.cmp(&other.is_layer))
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Level {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value1.to_bits().hash(state);
        self.value2.to_bits().hash(state);
        self.is_layer.hash(state);
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_layer {
            write!(f, "({},{})", self.value1, self.value2)
        } else {
            write!(f, "{}", self.value1)
        }
    }
}

/// An ensemble member: (perturbation type, perturbation number).
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnsMember {
    pub code: i32,
    pub number: i32,
}

impl EnsMember {
    pub fn new(code: i32, number: i32) -> Self {
        Self { code, number }
    }
}

impl fmt::Display for EnsMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.code, self.number)
    }
}

/// A forecast time relative to some reference date: either an offset or an interval.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeValue {
    Offset(i32),
    Interval(Interval),
}

impl TimeValue {
    pub fn shifted(&self, by: i32) -> Self {
        match self {
            TimeValue::Offset(offset) => TimeValue::Offset(offset + by),
            TimeValue::Interval(interval) => TimeValue::Interval(interval.shifted(by)),
        }
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, TimeValue::Interval(_))
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeValue::Offset(offset) => write!(f, "{offset}"),
            TimeValue::Interval(interval) => write!(f, "{interval}"),
        }
    }
}

/// A value of a composite time axis: a runtime plus a time relative to that runtime.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time2D {
    pub run: CalendarDate,
    pub time: TimeValue,
}

impl Time2D {
    pub fn new(run: CalendarDate, time: TimeValue) -> Self {
        Self { run, time }
    }
}

impl fmt::Display for Time2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.run, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_order() {
        let mut intervals = vec![
            Interval::new(0, 6),
            Interval::new(3, 6),
            Interval::new(0, 3),
            Interval::new(6, 0),
        ];
        intervals.sort();
        intervals.dedup();
        assert_eq!(
            intervals,
            vec![Interval::new(0, 3), Interval::new(0, 6), Interval::new(3, 6)]
        );
        assert_eq!(Interval::new(6, 0).len(), 6);
        assert_eq!(Interval::new(0, 6).shifted(12), Interval::new(12, 18));
    }

    #[test]
    fn test_level_total_order() {
        let a = Level::new(500.0);
        let b = Level::new(500.0);
        let c = Level::layer(500.0, 700.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Level::new(250.0) < a);
        assert_eq!(c.midpoint(), 600.0);
        assert_eq!(c.to_string(), "(500,700)");
    }

    #[test]
    fn test_time2d_order() {
        let early = Time2D::new(CalendarDate::from_hours(0), TimeValue::Offset(12));
        let late = Time2D::new(CalendarDate::from_hours(6), TimeValue::Offset(0));
        assert!(early < late);
        assert_eq!(TimeValue::Offset(3).shifted(2), TimeValue::Offset(5));
    }
}
