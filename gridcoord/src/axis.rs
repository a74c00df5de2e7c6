//! Immutable coordinate axes.
//!
//! An axis is a strictly sorted, deduplicated sequence of values of one kind. Axes are produced
//! once, by freezing a builder or by a consolidator, and are never mutated afterwards. They are
//! handed around as [`Axis`], a cheap handle around a reference counted axis of a particular
//! kind, so the same axis instance can be referenced from any number of coordinate systems.
//!
use std::{
    collections::{BTreeSet, HashMap},
    fmt::{self, Debug, Display, Write},
    hash::{Hash, Hasher},
    mem::size_of,
    sync::{Arc, OnceLock},
};

use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncWrite};
use paste::paste;

use crate::{
    errors::{Error, Result},
    extio::{read_seq, write_seq, ExtendedAsyncRead, ExtendedAsyncWrite, Serialize},
    time::{CalendarDate, TimeUnit},
    time2d::Time2DAxis,
    value::{EnsMember, Interval, Level, Time2D, TimeValue},
};

/// Name given to interval axes whose intervals do not all have the same length.
pub const MIXED_INTERVALS: &str = "Mixed_intervals";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AxisKind {
    Runtime,
    Time,
    TimeIntv,
    Vert,
    Ens,
    Time2D,
}

impl AxisKind {
    pub const ALL: [AxisKind; 6] = [
        AxisKind::Runtime,
        AxisKind::Time,
        AxisKind::TimeIntv,
        AxisKind::Time2D,
        AxisKind::Vert,
        AxisKind::Ens,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AxisKind::Runtime => "reftime",
            AxisKind::Time => "time",
            AxisKind::TimeIntv => "timeIntv",
            AxisKind::Vert => "vert",
            AxisKind::Ens => "ens",
            AxisKind::Time2D => "time2D",
        }
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            AxisKind::Runtime => 0,
            AxisKind::Time => 1,
            AxisKind::TimeIntv => 2,
            AxisKind::Vert => 3,
            AxisKind::Ens => 4,
            AxisKind::Time2D => 5,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(AxisKind::Runtime),
            1 => Some(AxisKind::Time),
            2 => Some(AxisKind::TimeIntv),
            3 => Some(AxisKind::Vert),
            4 => Some(AxisKind::Ens),
            5 => Some(AxisKind::Time2D),
            _ => None,
        }
    }
}

impl Display for AxisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Strictly sorted, deduplicated values. The storage shared by every one dimensional axis kind.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coords<V> {
    values: Vec<V>,
}

impl<V> Coords<V>
where
    V: Ord + Clone,
{
    pub(crate) fn from_set(set: BTreeSet<V>) -> Self {
        Self {
            values: set.into_iter().collect(),
        }
    }

    pub(crate) fn from_unsorted(mut values: Vec<V>) -> Self {
        values.sort();
        values.dedup();

        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&V> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.values.iter()
    }

    /// Binary search. `Err` holds the insertion point for an absent value.
    ///
    pub fn search(&self, value: &V) -> std::result::Result<usize, usize> {
        self.values.binary_search(value)
    }

    /// Exact match scan, for kinds whose values are looked up rarely.
    ///
    pub fn position(&self, value: &V) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    pub fn lookup(&self) -> HashMap<V, usize>
    where
        V: Hash,
    {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| (value.clone(), index))
            .collect()
    }

    pub(crate) fn est_memory_size(&self) -> usize {
        size_of::<Self>() + self.values.len() * size_of::<V>()
    }
}

fn show_values<V: Display>(f: &mut impl Write, values: &[V]) -> fmt::Result {
    for value in values {
        write!(f, " {value},")?;
    }
    writeln!(f, " (n={})", values.len())
}

/// The model or analysis initialization times of a collection of forecasts.
///
#[derive(Clone, Debug)]
pub struct RuntimeAxis {
    code: i32,
    unit: TimeUnit,
    coords: Coords<CalendarDate>,
    name: OnceLock<String>,
}

impl RuntimeAxis {
    pub fn new(code: i32, unit: TimeUnit, values: Vec<CalendarDate>) -> Self {
        Self::from_coords(code, unit, Coords::from_unsorted(values))
    }

    pub(crate) fn from_coords(code: i32, unit: TimeUnit, coords: Coords<CalendarDate>) -> Self {
        Self {
            code,
            unit,
            coords,
            name: OnceLock::new(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn coords(&self) -> &Coords<CalendarDate> {
        &self.coords
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn date(&self, index: usize) -> Option<CalendarDate> {
        self.coords.get(index).copied()
    }

    pub fn first_date(&self) -> Option<CalendarDate> {
        self.date(0)
    }

    pub fn last_date(&self) -> Option<CalendarDate> {
        self.coords.values().last().copied()
    }

    pub fn index_of(&self, date: CalendarDate) -> Option<usize> {
        self.coords.search(&date).ok()
    }

    /// Offset of the runtime at `index` from the first runtime, in units of this axis.
    ///
    pub fn offset(&self, index: usize) -> Option<i32> {
        Some(self.unit.offset(self.first_date()?, self.date(index)?))
    }

    pub fn name(&self) -> &str {
        self.name
            .get()
            .map(String::as_str)
            .unwrap_or(AxisKind::Runtime.name())
    }

    pub fn set_name(&self, name: impl Into<String>) -> bool {
        self.name.set(name.into()).is_ok()
    }

    pub fn show_info(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(
            f,
            "{} {} code={} unit={} size={}",
            AxisKind::Runtime,
            self.name(),
            self.code,
            self.unit,
            self.len()
        )?;
        show_values(f, self.coords.values())
    }
}

impl PartialEq for RuntimeAxis {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.coords == other.coords
    }
}

impl Eq for RuntimeAxis {}

impl Hash for RuntimeAxis {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
        self.coords.hash(state);
    }
}

/// A value that can populate a one dimensional time axis: an offset or an interval.
///
pub trait TimeCoordValue: Ord + Copy + Hash + Debug + Display + Send + Sync + 'static {
    const KIND: AxisKind;

    fn shifted(&self, by: i32) -> Self;

    fn into_time_value(self) -> TimeValue;

    fn from_time_value(value: TimeValue) -> Option<Self>;

    /// The time axis held by `axis`, if it holds one of this flavor.
    ///
    fn time_axis(axis: &Axis) -> Option<&Arc<TimeAxis<Self>>>;

    fn into_axis(axis: TimeAxis<Self>) -> Axis;
}

impl TimeCoordValue for i32 {
    const KIND: AxisKind = AxisKind::Time;

    fn shifted(&self, by: i32) -> Self {
        self + by
    }

    fn into_time_value(self) -> TimeValue {
        TimeValue::Offset(self)
    }

    fn from_time_value(value: TimeValue) -> Option<Self> {
        match value {
            TimeValue::Offset(offset) => Some(offset),
            TimeValue::Interval(_) => None,
        }
    }

    fn time_axis(axis: &Axis) -> Option<&Arc<TimeAxis<Self>>> {
        axis.as_time()
    }

    fn into_axis(axis: TimeAxis<Self>) -> Axis {
        Axis::Time(Arc::new(axis))
    }
}

impl TimeCoordValue for Interval {
    const KIND: AxisKind = AxisKind::TimeIntv;

    fn shifted(&self, by: i32) -> Self {
        Interval::shifted(self, by)
    }

    fn into_time_value(self) -> TimeValue {
        TimeValue::Interval(self)
    }

    fn from_time_value(value: TimeValue) -> Option<Self> {
        match value {
            TimeValue::Interval(interval) => Some(interval),
            TimeValue::Offset(_) => None,
        }
    }

    fn time_axis(axis: &Axis) -> Option<&Arc<TimeAxis<Self>>> {
        axis.as_time_intv()
    }

    fn into_axis(axis: TimeAxis<Self>) -> Axis {
        Axis::TimeIntv(Arc::new(axis))
    }
}

/// Forecast times relative to a reference date, either offsets or intervals.
///
/// A "best" time axis additionally carries `time2runtime`: for each value, the 1-based index of
/// the runtime that supplies it, 0 meaning no runtime does.
///
#[derive(Clone, Debug)]
pub struct TimeAxis<T>
where
    T: TimeCoordValue,
{
    code: i32,
    unit: TimeUnit,
    ref_date: CalendarDate,
    coords: Coords<T>,
    time2runtime: Option<Vec<u32>>,
    name: OnceLock<String>,
}

impl<T> TimeAxis<T>
where
    T: TimeCoordValue,
{
    pub fn new(code: i32, unit: TimeUnit, ref_date: CalendarDate, values: Vec<T>) -> Self {
        Self::from_coords(code, unit, ref_date, Coords::from_unsorted(values))
    }

    pub(crate) fn from_coords(
        code: i32,
        unit: TimeUnit,
        ref_date: CalendarDate,
        coords: Coords<T>,
    ) -> Self {
        Self {
            code,
            unit,
            ref_date,
            coords,
            time2runtime: None,
            name: OnceLock::new(),
        }
    }

    pub(crate) fn with_time2runtime(mut self, time2runtime: Vec<u32>) -> Self {
        self.time2runtime = Some(time2runtime);
        self
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn ref_date(&self) -> CalendarDate {
        self.ref_date
    }

    pub fn coords(&self) -> &Coords<T> {
        &self.coords
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<T> {
        self.coords.get(index).copied()
    }

    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.coords.search(value).ok()
    }

    /// Insertion point for `value` if it is absent from this axis.
    ///
    pub fn search(&self, value: &T) -> std::result::Result<usize, usize> {
        self.coords.search(value)
    }

    /// For a best time axis, the 0-based index of the runtime supplying the value at `index`.
    ///
    pub fn runtime_index(&self, index: usize) -> Option<usize> {
        let run = *self.time2runtime.as_ref()?.get(index)?;
        (run > 0).then(|| run as usize - 1)
    }

    pub fn time2runtime(&self) -> Option<&[u32]> {
        self.time2runtime.as_deref()
    }

    /// The same times expressed relative to `ref_date`.
    ///
    pub fn rebased(&self, ref_date: CalendarDate) -> Self {
        if ref_date == self.ref_date {
            return self.clone();
        }
        let shift = self.unit.offset(ref_date, self.ref_date);
        let values = self.coords.iter().map(|value| value.shifted(shift)).collect();

        Self::new(self.code, self.unit, ref_date, values)
    }

    /// Date of the value at `index`; the end of the interval for interval axes.
    ///
    pub fn date(&self, index: usize) -> Option<CalendarDate> {
        let offset = match self.value(index)?.into_time_value() {
            TimeValue::Offset(offset) => offset,
            TimeValue::Interval(interval) => interval.end,
        };

        Some(self.unit.add(self.ref_date, offset))
    }

    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or(T::KIND.name())
    }

    pub fn set_name(&self, name: impl Into<String>) -> bool {
        self.name.set(name.into()).is_ok()
    }

    pub fn show_info(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(
            f,
            "{} {} code={} unit={} refDate={} size={}",
            T::KIND,
            self.name(),
            self.code,
            self.unit,
            self.ref_date,
            self.len()
        )?;
        show_values(f, self.coords.values())?;
        if let Some(time2runtime) = &self.time2runtime {
            writeln!(f, " time2runtime={time2runtime:?}")?;
        }

        Ok(())
    }
}

impl TimeAxis<Interval> {
    /// `"<len>_<unit>"` if every interval has the same length, otherwise [`MIXED_INTERVALS`].
    ///
    pub fn interval_name(&self) -> String {
        let mut lengths = self.coords.iter().map(Interval::len);
        match lengths.next() {
            None => MIXED_INTERVALS.to_string(),
            Some(first) => {
                if lengths.all(|len| len == first) {
                    format!(
                        "{}_{}",
                        first * self.unit.multiplier(),
                        self.unit.field()
                    )
                } else {
                    MIXED_INTERVALS.to_string()
                }
            }
        }
    }
}

impl<T: TimeCoordValue> PartialEq for TimeAxis<T> {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.coords == other.coords
            && self.time2runtime == other.time2runtime
    }
}

impl<T: TimeCoordValue> Eq for TimeAxis<T> {}

impl<T: TimeCoordValue> Hash for TimeAxis<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
        self.coords.hash(state);
        self.time2runtime.hash(state);
    }
}

/// Pressure, height, sigma or similar vertical coordinates.
///
#[derive(Clone, Debug)]
pub struct VertAxis {
    code: i32,
    units: String,
    is_layer: bool,
    coords: Coords<Level>,
    name: OnceLock<String>,
}

impl VertAxis {
    pub fn new(code: i32, units: impl Into<String>, values: Vec<Level>) -> Self {
        Self::from_coords(code, units.into(), Coords::from_unsorted(values))
    }

    pub(crate) fn from_coords(code: i32, units: String, coords: Coords<Level>) -> Self {
        let is_layer = coords.iter().any(|level| level.is_layer);
        Self {
            code,
            units,
            is_layer,
            coords,
            name: OnceLock::new(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn is_layer(&self) -> bool {
        self.is_layer
    }

    pub fn coords(&self) -> &Coords<Level> {
        &self.coords
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn level(&self, index: usize) -> Option<Level> {
        self.coords.get(index).copied()
    }

    pub fn index_of(&self, level: &Level) -> Option<usize> {
        self.coords.position(level)
    }

    pub fn name(&self) -> &str {
        self.name
            .get()
            .map(String::as_str)
            .unwrap_or(AxisKind::Vert.name())
    }

    pub fn set_name(&self, name: impl Into<String>) -> bool {
        self.name.set(name.into()).is_ok()
    }

    pub fn show_info(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(
            f,
            "{} {} code={} units={} isLayer={} size={}",
            AxisKind::Vert,
            self.name(),
            self.code,
            self.units,
            self.is_layer,
            self.len()
        )?;
        show_values(f, self.coords.values())
    }
}

impl PartialEq for VertAxis {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.coords == other.coords
    }
}

impl Eq for VertAxis {}

impl Hash for VertAxis {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
        self.coords.hash(state);
    }
}

#[derive(Clone, Debug)]
pub struct EnsAxis {
    code: i32,
    coords: Coords<EnsMember>,
    name: OnceLock<String>,
}

impl EnsAxis {
    pub fn new(code: i32, values: Vec<EnsMember>) -> Self {
        Self::from_coords(code, Coords::from_unsorted(values))
    }

    pub(crate) fn from_coords(code: i32, coords: Coords<EnsMember>) -> Self {
        Self {
            code,
            coords,
            name: OnceLock::new(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn coords(&self) -> &Coords<EnsMember> {
        &self.coords
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn member(&self, index: usize) -> Option<EnsMember> {
        self.coords.get(index).copied()
    }

    pub fn index_of(&self, member: &EnsMember) -> Option<usize> {
        self.coords.position(member)
    }

    pub fn name(&self) -> &str {
        self.name
            .get()
            .map(String::as_str)
            .unwrap_or(AxisKind::Ens.name())
    }

    pub fn set_name(&self, name: impl Into<String>) -> bool {
        self.name.set(name.into()).is_ok()
    }

    pub fn show_info(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(
            f,
            "{} {} code={} size={}",
            AxisKind::Ens,
            self.name(),
            self.code,
            self.len()
        )?;
        show_values(f, self.coords.values())
    }
}

impl PartialEq for EnsAxis {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.coords == other.coords
    }
}

impl Eq for EnsAxis {}

impl Hash for EnsAxis {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
        self.coords.hash(state);
    }
}

/// A single coordinate value of any kind.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisValue {
    Runtime(CalendarDate),
    Offset(i32),
    Interval(Interval),
    Level(Level),
    Ens(EnsMember),
    Time2D(Time2D),
}

impl Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Runtime(date) => write!(f, "{date}"),
            AxisValue::Offset(offset) => write!(f, "{offset}"),
            AxisValue::Interval(interval) => write!(f, "{interval}"),
            AxisValue::Level(level) => write!(f, "{level}"),
            AxisValue::Ens(member) => write!(f, "{member}"),
            AxisValue::Time2D(time2d) => write!(f, "{time2d}"),
        }
    }
}

/// A shared handle to a frozen axis of any kind.
///
/// Cloning an `Axis` is cheap and yields a handle to the same instance. Equality and hashing
/// are by value: two axes are equal if they have the same kind, code and ordered values, and
/// equal axes are interchangeable.
///
#[derive(Clone, Debug)]
pub enum Axis {
    Runtime(Arc<RuntimeAxis>),
    Time(Arc<TimeAxis<i32>>),
    TimeIntv(Arc<TimeAxis<Interval>>),
    Vert(Arc<VertAxis>),
    Ens(Arc<EnsAxis>),
    Time2D(Arc<Time2DAxis>),
}

macro_rules! accessor {
    ($variant:ident, $name:ident, $type:ty) => {
        paste! {
            pub fn [<as_ $name>](&self) -> Option<&Arc<$type>> {
                match self {
                    Axis::$variant(axis) => Some(axis),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! dispatch {
    ($self:ident, $axis:ident => $body:expr) => {
        match $self {
            Axis::Runtime($axis) => $body,
            Axis::Time($axis) => $body,
            Axis::TimeIntv($axis) => $body,
            Axis::Vert($axis) => $body,
            Axis::Ens($axis) => $body,
            Axis::Time2D($axis) => $body,
        }
    };
}

impl Axis {
    accessor!(Runtime, runtime, RuntimeAxis);
    accessor!(Time, time, TimeAxis<i32>);
    accessor!(TimeIntv, time_intv, TimeAxis<Interval>);
    accessor!(Vert, vert, VertAxis);
    accessor!(Ens, ens, EnsAxis);
    accessor!(Time2D, time2d, Time2DAxis);

    pub fn kind(&self) -> AxisKind {
        match self {
            Axis::Runtime(_) => AxisKind::Runtime,
            Axis::Time(_) => AxisKind::Time,
            Axis::TimeIntv(_) => AxisKind::TimeIntv,
            Axis::Vert(_) => AxisKind::Vert,
            Axis::Ens(_) => AxisKind::Ens,
            Axis::Time2D(_) => AxisKind::Time2D,
        }
    }

    pub fn code(&self) -> i32 {
        dispatch!(self, axis => axis.code())
    }

    pub fn unit(&self) -> String {
        match self {
            Axis::Runtime(axis) => axis.unit().to_string(),
            Axis::Time(axis) => axis.unit().to_string(),
            Axis::TimeIntv(axis) => axis.unit().to_string(),
            Axis::Vert(axis) => axis.units().to_string(),
            Axis::Ens(_) => String::new(),
            Axis::Time2D(axis) => axis.unit().to_string(),
        }
    }

    pub fn name(&self) -> &str {
        dispatch!(self, axis => axis.name())
    }

    /// Set the display name. A name can only be set once; returns `false` if it was already set.
    ///
    pub fn set_name(&self, name: impl Into<String>) -> bool {
        dispatch!(self, axis => axis.set_name(name))
    }

    /// Number of coordinate values. For a composite time axis this counts every (runtime, time)
    /// pair.
    ///
    pub fn len(&self) -> usize {
        dispatch!(self, axis => axis.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The extent of this axis along the dimensions of a sparse index. A composite time axis
    /// only contributes its time dimension; its runtime dimension belongs to the runtime axis.
    ///
    pub fn dim(&self) -> usize {
        match self {
            Axis::Time2D(axis) => axis.ntimes(),
            _ => self.len(),
        }
    }

    pub fn value(&self, index: usize) -> Option<AxisValue> {
        match self {
            Axis::Runtime(axis) => axis.date(index).map(AxisValue::Runtime),
            Axis::Time(axis) => axis.value(index).map(AxisValue::Offset),
            Axis::TimeIntv(axis) => axis.value(index).map(AxisValue::Interval),
            Axis::Vert(axis) => axis.level(index).map(AxisValue::Level),
            Axis::Ens(axis) => axis.member(index).map(AxisValue::Ens),
            Axis::Time2D(axis) => axis.values().get(index).copied().map(AxisValue::Time2D),
        }
    }

    /// Index of `value` in this axis, `None` if it is absent or of another kind.
    ///
    pub fn index_of(&self, value: &AxisValue) -> Option<usize> {
        match (self, value) {
            (Axis::Runtime(axis), AxisValue::Runtime(date)) => axis.index_of(*date),
            (Axis::Time(axis), AxisValue::Offset(offset)) => axis.index_of(offset),
            (Axis::TimeIntv(axis), AxisValue::Interval(interval)) => axis.index_of(interval),
            (Axis::Vert(axis), AxisValue::Level(level)) => axis.index_of(level),
            (Axis::Ens(axis), AxisValue::Ens(member)) => axis.index_of(member),
            (Axis::Time2D(axis), AxisValue::Time2D(time2d)) => axis.values().binary_search(time2d).ok(),
            _ => None,
        }
    }

    pub fn values(&self) -> Vec<AxisValue> {
        (0..self.len()).filter_map(|index| self.value(index)).collect()
    }

    /// Rough number of bytes used by this axis. Diagnostic only.
    ///
    pub fn est_memory_size(&self) -> usize {
        match self {
            Axis::Runtime(axis) => size_of::<RuntimeAxis>() + axis.coords().est_memory_size(),
            Axis::Time(axis) => size_of::<TimeAxis<i32>>() + axis.coords().est_memory_size(),
            Axis::TimeIntv(axis) => {
                size_of::<TimeAxis<Interval>>() + axis.coords().est_memory_size()
            }
            Axis::Vert(axis) => size_of::<VertAxis>() + axis.coords().est_memory_size(),
            Axis::Ens(axis) => size_of::<EnsAxis>() + axis.coords().est_memory_size(),
            Axis::Time2D(axis) => axis.est_memory_size(),
        }
    }

    pub fn show_info(&self, f: &mut impl Write) -> fmt::Result {
        dispatch!(self, axis => axis.show_info(f))
    }

    /// Whether both handles refer to the very same axis instance.
    ///
    pub fn ptr_eq(&self, other: &Axis) -> bool {
        match (self, other) {
            (Axis::Runtime(a), Axis::Runtime(b)) => Arc::ptr_eq(a, b),
            (Axis::Time(a), Axis::Time(b)) => Arc::ptr_eq(a, b),
            (Axis::TimeIntv(a), Axis::TimeIntv(b)) => Arc::ptr_eq(a, b),
            (Axis::Vert(a), Axis::Vert(b)) => Arc::ptr_eq(a, b),
            (Axis::Ens(a), Axis::Ens(b)) => Arc::ptr_eq(a, b),
            (Axis::Time2D(a), Axis::Time2D(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Axis {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Axis::Runtime(a), Axis::Runtime(b)) => a == b,
            (Axis::Time(a), Axis::Time(b)) => a == b,
            (Axis::TimeIntv(a), Axis::TimeIntv(b)) => a == b,
            (Axis::Vert(a), Axis::Vert(b)) => a == b,
            (Axis::Ens(a), Axis::Ens(b)) => a == b,
            (Axis::Time2D(a), Axis::Time2D(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Axis {}

impl Hash for Axis {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        dispatch!(self, axis => axis.hash(state))
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} size={}", self.kind(), self.name(), self.len())
    }
}

impl From<RuntimeAxis> for Axis {
    fn from(axis: RuntimeAxis) -> Self {
        Axis::Runtime(Arc::new(axis))
    }
}

impl From<TimeAxis<i32>> for Axis {
    fn from(axis: TimeAxis<i32>) -> Self {
        Axis::Time(Arc::new(axis))
    }
}

impl From<TimeAxis<Interval>> for Axis {
    fn from(axis: TimeAxis<Interval>) -> Self {
        Axis::TimeIntv(Arc::new(axis))
    }
}

impl From<VertAxis> for Axis {
    fn from(axis: VertAxis) -> Self {
        Axis::Vert(Arc::new(axis))
    }
}

impl From<EnsAxis> for Axis {
    fn from(axis: EnsAxis) -> Self {
        Axis::Ens(Arc::new(axis))
    }
}

impl From<Time2DAxis> for Axis {
    fn from(axis: Time2DAxis) -> Self {
        Axis::Time2D(Arc::new(axis))
    }
}

#[async_trait]
impl Serialize for RuntimeAxis {
    async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i32(self.code).await?;
        self.unit.write_to(stream).await?;
        write_seq(stream, self.coords.values()).await
    }

    async fn read_from(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self> {
        let code = stream.read_i32().await?;
        let unit = TimeUnit::read_from(stream).await?;
        let values = read_seq(stream).await?;

        Ok(Self::new(code, unit, values))
    }
}

/// `time2runtime`, when present, follows the values: a flag byte, then one 32 bit runtime
/// index per value.
///
#[async_trait]
impl<T> Serialize for TimeAxis<T>
where
    T: TimeCoordValue + Serialize,
{
    async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i32(self.code).await?;
        self.unit.write_to(stream).await?;
        self.ref_date.write_to(stream).await?;
        write_seq(stream, self.coords.values()).await?;
        match &self.time2runtime {
            Some(time2runtime) => {
                stream.write_byte(1).await?;
                for run in time2runtime {
                    stream.write_u32(*run).await?;
                }
            }
            None => stream.write_byte(0).await?,
        }

        Ok(())
    }

    async fn read_from(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self> {
        let code = stream.read_i32().await?;
        let unit = TimeUnit::read_from(stream).await?;
        let ref_date = CalendarDate::read_from(stream).await?;
        let values: Vec<T> = read_seq(stream).await?;
        let len = values.len();
        let axis = Self::new(code, unit, ref_date, values);

        match stream.read_byte().await? {
            0 => Ok(axis),
            1 => {
                let mut time2runtime = Vec::with_capacity(len);
                for _ in 0..len {
                    time2runtime.push(stream.read_u32().await?);
                }
                Ok(axis.with_time2runtime(time2runtime))
            }
            flag => Err(Error::BadTag(flag)),
        }
    }
}

#[async_trait]
impl Serialize for VertAxis {
    async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i32(self.code).await?;
        stream.write_str(&self.units).await?;
        write_seq(stream, self.coords.values()).await
    }

    async fn read_from(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self> {
        let code = stream.read_i32().await?;
        let units = stream.read_string().await?;
        let values = read_seq(stream).await?;

        Ok(Self::new(code, units, values))
    }
}

#[async_trait]
impl Serialize for EnsAxis {
    async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i32(self.code).await?;
        write_seq(stream, self.coords.values()).await
    }

    async fn read_from(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self> {
        let code = stream.read_i32().await?;
        let values = read_seq(stream).await?;

        Ok(Self::new(code, values))
    }
}

/// An axis is written as its kind tag followed by the axis itself. Names are not written.
///
#[async_trait]
impl Serialize for Axis {
    async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_byte(self.kind().tag()).await?;
        match self {
            Axis::Runtime(axis) => axis.write_to(stream).await,
            Axis::Time(axis) => axis.write_to(stream).await,
            Axis::TimeIntv(axis) => axis.write_to(stream).await,
            Axis::Vert(axis) => axis.write_to(stream).await,
            Axis::Ens(axis) => axis.write_to(stream).await,
            Axis::Time2D(axis) => axis.write_to(stream).await,
        }
    }

    async fn read_from(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self> {
        let tag = stream.read_byte().await?;
        let axis = match AxisKind::from_tag(tag).ok_or(Error::BadTag(tag))? {
            AxisKind::Runtime => Axis::from(RuntimeAxis::read_from(stream).await?),
            AxisKind::Time => Axis::from(TimeAxis::<i32>::read_from(stream).await?),
            AxisKind::TimeIntv => Axis::from(TimeAxis::<Interval>::read_from(stream).await?),
            AxisKind::Vert => Axis::from(VertAxis::read_from(stream).await?),
            AxisKind::Ens => Axis::from(EnsAxis::read_from(stream).await?),
            AxisKind::Time2D => Axis::from(Time2DAxis::read_from(stream).await?),
        };

        Ok(axis)
    }
}
