//! Build configuration, passed explicitly to coordinate systems and consolidators.
//!
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::Interval;

/// What a sparse index does when a second record is written to an occupied cell.
///
/// Every policy counts the collision.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The most recently written record wins.
    #[default]
    KeepLast,

    /// The first record written wins.
    KeepFirst,

    /// The write fails with `Error::Duplicate`.
    Reject,
}

impl DuplicatePolicy {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            DuplicatePolicy::KeepLast => 0,
            DuplicatePolicy::KeepFirst => 1,
            DuplicatePolicy::Reject => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(DuplicatePolicy::KeepLast),
            1 => Some(DuplicatePolicy::KeepFirst),
            2 => Some(DuplicatePolicy::Reject),
            _ => None,
        }
    }
}

/// Time intervals to leave out when unioning interval axes.
///
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalFilter {
    /// Drop intervals of length zero
    pub exclude_zero: bool,

    /// Interval lengths to drop, by variable name
    pub excluded_lengths: HashMap<String, Vec<i32>>,
}

impl IntervalFilter {
    pub fn exclude_length(mut self, variable: impl Into<String>, len: i32) -> Self {
        self.excluded_lengths.entry(variable.into()).or_default().push(len);
        self
    }

    /// Whether `interval` should be left out of `variable`'s interval axis.
    ///
    pub fn rejects(&self, variable: &str, interval: &Interval) -> bool {
        if self.exclude_zero && interval.is_empty() {
            return true;
        }

        self.excluded_lengths
            .get(variable)
            .map(|lengths| lengths.contains(&interval.len()))
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub duplicates: DuplicatePolicy,
    pub interval_filter: IntervalFilter,

    /// Share one master runtime axis across every variable of a group, instead of only sharing
    /// runtime axes that are already identical
    pub dense: bool,

    /// Try the hour of day compaction of composite time axes when the orthogonal one fails
    pub regularize: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            duplicates: DuplicatePolicy::default(),
            interval_filter: IntervalFilter::default(),
            dense: false,
            regularize: true,
        }
    }
}
