//! Axis builders.
//!
//! A builder discovers the distinct values of one coordinate kind in a stream of records. It
//! accumulates values until it is frozen, producing an immutable [`Axis`], and from then on maps
//! records to their index along that axis.
//!
//! The accumulation itself is done by a per-kind accumulator (`RuntimeValues`, `TimeValues`,
//! `VertValues`, `EnsValues` and `Time2DValues`), which the consolidators also use directly to
//! combine the values of already frozen axes.
//!
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    hash::Hash,
};

use crate::{
    axis::{Axis, AxisKind, Coords, EnsAxis, RuntimeAxis, TimeAxis, TimeCoordValue, VertAxis},
    config::BuildConfig,
    errors::{Error, Result},
    time::{CalendarDate, TimeUnit},
    time2d::Time2DValues,
    value::{EnsMember, Interval, Level, Time2D},
};

/// Accumulates the distinct values of one axis kind.
///
pub trait Accumulator {
    /// The raw value extracted from a record
    type Value: Clone + Eq + Hash;

    const KIND: AxisKind;

    fn add(&mut self, value: Self::Value);

    /// Fold in the values of an already frozen axis of the same kind.
    ///
    fn merge(&mut self, axis: &Axis) -> Result<()>;

    fn is_empty(&self) -> bool;

    /// Sort the accumulated values into an axis.
    ///
    fn finish(&self, config: &BuildConfig) -> Result<Axis>;

    /// The index along the sparse index dimension of every value in `axis`, keyed by value as
    /// returned by `normalize`.
    ///
    fn lookup(axis: &Axis) -> Result<HashMap<Self::Value, usize>>;

    /// Express a raw value the way `lookup` keys it for `axis`.
    ///
    fn normalize(_axis: &Axis, value: Self::Value) -> Self::Value {
        value
    }
}

fn check_kind(axis: &Axis, expected: AxisKind) -> Result<()> {
    if axis.kind() != expected {
        return Err(Error::KindMismatch {
            expected,
            got: axis.kind(),
        });
    }

    Ok(())
}

fn kind_mismatch(axis: &Axis, expected: AxisKind) -> Error {
    Error::KindMismatch {
        expected,
        got: axis.kind(),
    }
}

/// Accumulates runtimes.
///
pub struct RuntimeValues {
    code: i32,
    unit: TimeUnit,
    values: BTreeSet<CalendarDate>,
}

impl RuntimeValues {
    /// The time unit is required: it is the unit offsets between runtimes are expressed in.
    ///
    pub fn new(code: i32, unit: TimeUnit) -> Self {
        Self {
            code,
            unit,
            values: BTreeSet::new(),
        }
    }

    pub fn add_axis(&mut self, axis: &RuntimeAxis) {
        self.values.extend(axis.coords().iter().copied());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn build(&self) -> RuntimeAxis {
        RuntimeAxis::from_coords(self.code, self.unit, Coords::from_set(self.values.clone()))
    }
}

impl Accumulator for RuntimeValues {
    type Value = CalendarDate;
    const KIND: AxisKind = AxisKind::Runtime;

    fn add(&mut self, value: CalendarDate) {
        self.values.insert(value);
    }

    fn merge(&mut self, axis: &Axis) -> Result<()> {
        let axis = axis
            .as_runtime()
            .ok_or_else(|| kind_mismatch(axis, Self::KIND))?;
        self.add_axis(axis);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn finish(&self, _config: &BuildConfig) -> Result<Axis> {
        Ok(self.build().into())
    }

    fn lookup(axis: &Axis) -> Result<HashMap<CalendarDate, usize>> {
        let axis = axis
            .as_runtime()
            .ok_or_else(|| kind_mismatch(axis, Self::KIND))?;

        Ok(axis.coords().lookup())
    }
}

/// Accumulates offsets or intervals, each relative to its own reference date.
///
/// The finished axis uses the earliest reference date seen, and every value is shifted to be
/// relative to it.
///
pub struct TimeValues<T>
where
    T: TimeCoordValue,
{
    code: i32,
    unit: TimeUnit,
    values: BTreeSet<(CalendarDate, T)>,
}

impl<T> TimeValues<T>
where
    T: TimeCoordValue,
{
    pub fn new(code: i32, unit: TimeUnit) -> Self {
        Self {
            code,
            unit,
            values: BTreeSet::new(),
        }
    }

    pub fn add_axis(&mut self, axis: &TimeAxis<T>) {
        let ref_date = axis.ref_date();
        self.values
            .extend(axis.coords().iter().map(|value| (ref_date, *value)));
    }

    /// Keep only the values for which `keep` returns `true`.
    ///
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.values.retain(|(_, value)| keep(value));
    }

    pub fn ref_date(&self) -> Option<CalendarDate> {
        self.values.iter().map(|(ref_date, _)| *ref_date).min()
    }

    pub fn build(&self) -> TimeAxis<T> {
        let ref_date = self
            .ref_date()
            .unwrap_or_else(|| CalendarDate::from_millis(0));
        let values = self
            .values
            .iter()
            .map(|(date, value)| value.shifted(self.unit.offset(ref_date, *date)))
            .collect();

        TimeAxis::new(self.code, self.unit, ref_date, values)
    }
}

impl<T> Accumulator for TimeValues<T>
where
    T: TimeCoordValue,
{
    type Value = (CalendarDate, T);
    const KIND: AxisKind = T::KIND;

    fn add(&mut self, value: (CalendarDate, T)) {
        self.values.insert(value);
    }

    fn merge(&mut self, axis: &Axis) -> Result<()> {
        let axis = T::time_axis(axis).ok_or_else(|| kind_mismatch(axis, Self::KIND))?;
        self.add_axis(axis);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn finish(&self, _config: &BuildConfig) -> Result<Axis> {
        Ok(T::into_axis(self.build()))
    }

    fn lookup(axis: &Axis) -> Result<HashMap<(CalendarDate, T), usize>> {
        let axis = T::time_axis(axis).ok_or_else(|| kind_mismatch(axis, Self::KIND))?;
        let ref_date = axis.ref_date();

        Ok(axis
            .coords()
            .iter()
            .enumerate()
            .map(|(index, value)| ((ref_date, *value), index))
            .collect())
    }

    fn normalize(axis: &Axis, value: (CalendarDate, T)) -> (CalendarDate, T) {
        match T::time_axis(axis) {
            Some(axis) => {
                let (date, value) = value;
                let shift = axis.unit().offset(axis.ref_date(), date);
                (axis.ref_date(), value.shifted(shift))
            }
            None => value,
        }
    }
}

/// Accumulates vertical levels.
///
pub struct VertValues {
    code: i32,
    units: String,
    values: BTreeSet<Level>,
}

impl VertValues {
    pub fn new(code: i32, units: impl Into<String>) -> Self {
        Self {
            code,
            units: units.into(),
            values: BTreeSet::new(),
        }
    }

    pub fn add_axis(&mut self, axis: &VertAxis) {
        self.values.extend(axis.coords().iter().copied());
    }

    pub fn build(&self) -> VertAxis {
        VertAxis::from_coords(
            self.code,
            self.units.clone(),
            Coords::from_set(self.values.clone()),
        )
    }
}

impl Accumulator for VertValues {
    type Value = Level;
    const KIND: AxisKind = AxisKind::Vert;

    fn add(&mut self, value: Level) {
        self.values.insert(value);
    }

    fn merge(&mut self, axis: &Axis) -> Result<()> {
        let axis = axis.as_vert().ok_or_else(|| kind_mismatch(axis, Self::KIND))?;
        self.add_axis(axis);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn finish(&self, _config: &BuildConfig) -> Result<Axis> {
        Ok(self.build().into())
    }

    fn lookup(axis: &Axis) -> Result<HashMap<Level, usize>> {
        let axis = axis.as_vert().ok_or_else(|| kind_mismatch(axis, Self::KIND))?;

        Ok(axis.coords().lookup())
    }
}

/// Accumulates ensemble members.
///
pub struct EnsValues {
    code: i32,
    values: BTreeSet<EnsMember>,
}

impl EnsValues {
    pub fn new(code: i32) -> Self {
        Self {
            code,
            values: BTreeSet::new(),
        }
    }

    pub fn add_axis(&mut self, axis: &EnsAxis) {
        self.values.extend(axis.coords().iter().copied());
    }

    pub fn build(&self) -> EnsAxis {
        EnsAxis::from_coords(self.code, Coords::from_set(self.values.clone()))
    }
}

impl Accumulator for EnsValues {
    type Value = EnsMember;
    const KIND: AxisKind = AxisKind::Ens;

    fn add(&mut self, value: EnsMember) {
        self.values.insert(value);
    }

    fn merge(&mut self, axis: &Axis) -> Result<()> {
        let axis = axis.as_ens().ok_or_else(|| kind_mismatch(axis, Self::KIND))?;
        self.add_axis(axis);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn finish(&self, _config: &BuildConfig) -> Result<Axis> {
        Ok(self.build().into())
    }

    fn lookup(axis: &Axis) -> Result<HashMap<EnsMember, usize>> {
        let axis = axis.as_ens().ok_or_else(|| kind_mismatch(axis, Self::KIND))?;

        Ok(axis.coords().lookup())
    }
}

impl Accumulator for Time2DValues {
    type Value = Time2D;
    const KIND: AxisKind = AxisKind::Time2D;

    fn add(&mut self, value: Time2D) {
        if !Time2DValues::add(self, value) {
            tracing::warn!(
                kind = %Self::KIND,
                value = %value,
                "time value of the wrong flavor ignored"
            );
        }
    }

    fn merge(&mut self, axis: &Axis) -> Result<()> {
        let axis = axis
            .as_time2d()
            .ok_or_else(|| kind_mismatch(axis, Self::KIND))?;
        self.add_all(axis);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.nruns() == 0
    }

    fn finish(&self, config: &BuildConfig) -> Result<Axis> {
        Ok(Time2DValues::finish(self, config.regularize)?.into())
    }

    /// Maps each (runtime, time) value to its time index; the runtime index is supplied by the
    /// runtime axis.
    ///
    fn lookup(axis: &Axis) -> Result<HashMap<Time2D, usize>> {
        let axis = axis
            .as_time2d()
            .ok_or_else(|| kind_mismatch(axis, Self::KIND))?;

        Ok(axis
            .values()
            .iter()
            .filter_map(|value| axis.find(value).map(|(_, time)| (*value, time)))
            .collect())
    }
}

type Extract<R, V> = Box<dyn Fn(&R) -> Option<V>>;

enum State<A: Accumulator> {
    Pending(A),
    Frozen {
        axis: Axis,
        lookup: HashMap<A::Value, usize>,
    },
}

/// Builds one axis from records, using `extract` to get each record's value.
///
pub struct KindBuilder<R, A: Accumulator> {
    extract: Extract<R, A::Value>,
    state: State<A>,
}

impl<R, A> KindBuilder<R, A>
where
    A: Accumulator,
{
    fn new(values: A, extract: Extract<R, A::Value>) -> Self {
        Self {
            extract,
            state: State::Pending(values),
        }
    }

    fn ingest(&mut self, record: &R) {
        match &mut self.state {
            State::Pending(values) => match (self.extract)(record) {
                Some(value) => values.add(value),
                None => {
                    tracing::warn!(kind = %A::KIND, "malformed record: no value for axis");
                }
            },
            State::Frozen { .. } => {
                tracing::warn!(kind = %A::KIND, "record ingested after freeze ignored");
            }
        }
    }

    fn merge(&mut self, axis: &Axis) -> Result<()> {
        match &mut self.state {
            State::Pending(values) => values.merge(axis),
            State::Frozen { .. } => {
                tracing::warn!(kind = %A::KIND, "axis merged after freeze ignored");
                Ok(())
            }
        }
    }

    fn freeze(&mut self, config: &BuildConfig) -> Result<Axis> {
        match &self.state {
            State::Pending(values) => {
                let axis = values.finish(config)?;
                self.adopt(axis.clone())?;

                Ok(axis)
            }
            State::Frozen { axis, .. } => Ok(axis.clone()),
        }
    }

    fn adopt(&mut self, axis: Axis) -> Result<()> {
        check_kind(&axis, A::KIND)?;
        let lookup = A::lookup(&axis)?;
        self.state = State::Frozen { axis, lookup };

        Ok(())
    }

    fn axis(&self) -> Option<&Axis> {
        match &self.state {
            State::Pending(_) => None,
            State::Frozen { axis, .. } => Some(axis),
        }
    }

    fn index_of_record(&self, record: &R) -> Result<usize> {
        let (axis, lookup) = match &self.state {
            State::Pending(_) => return Err(Error::NotFrozen(A::KIND)),
            State::Frozen { axis, lookup } => (axis, lookup),
        };
        let value = match (self.extract)(record) {
            Some(value) => A::normalize(axis, value),
            None => {
                tracing::warn!(kind = %A::KIND, "malformed record: no value for axis, using index 0");
                return Ok(0);
            }
        };

        match lookup.get(&value) {
            Some(index) => Ok(*index),
            None => {
                tracing::warn!(
                    kind = %A::KIND,
                    axis = axis.name(),
                    "record value not found in axis, using index 0"
                );
                Ok(0)
            }
        }
    }
}

/// A builder for an axis of any kind, driven by records of type `R`.
///
pub enum AxisBuilder<R> {
    Runtime(KindBuilder<R, RuntimeValues>),
    Time(KindBuilder<R, TimeValues<i32>>),
    TimeIntv(KindBuilder<R, TimeValues<Interval>>),
    Vert(KindBuilder<R, VertValues>),
    Ens(KindBuilder<R, EnsValues>),
    Time2D(KindBuilder<R, Time2DValues>),
}

macro_rules! dispatch {
    ($self:ident, $builder:ident => $body:expr) => {
        match $self {
            AxisBuilder::Runtime($builder) => $body,
            AxisBuilder::Time($builder) => $body,
            AxisBuilder::TimeIntv($builder) => $body,
            AxisBuilder::Vert($builder) => $body,
            AxisBuilder::Ens($builder) => $body,
            AxisBuilder::Time2D($builder) => $body,
        }
    };
}

impl<R> AxisBuilder<R> {
    /// The runtime builder requires a time unit.
    ///
    pub fn runtime<F>(code: i32, unit: TimeUnit, extract: F) -> Self
    where
        F: Fn(&R) -> Option<CalendarDate> + 'static,
    {
        AxisBuilder::Runtime(KindBuilder::new(
            RuntimeValues::new(code, unit),
            Box::new(extract),
        ))
    }

    /// `extract` returns the offset together with the reference date it is relative to.
    ///
    pub fn time<F>(code: i32, unit: TimeUnit, extract: F) -> Self
    where
        F: Fn(&R) -> Option<(CalendarDate, i32)> + 'static,
    {
        AxisBuilder::Time(KindBuilder::new(TimeValues::new(code, unit), Box::new(extract)))
    }

    /// `extract` returns the interval together with the reference date it is relative to.
    ///
    pub fn time_intv<F>(code: i32, unit: TimeUnit, extract: F) -> Self
    where
        F: Fn(&R) -> Option<(CalendarDate, Interval)> + 'static,
    {
        AxisBuilder::TimeIntv(KindBuilder::new(TimeValues::new(code, unit), Box::new(extract)))
    }

    pub fn vert<F>(code: i32, units: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&R) -> Option<Level> + 'static,
    {
        AxisBuilder::Vert(KindBuilder::new(VertValues::new(code, units), Box::new(extract)))
    }

    pub fn ens<F>(code: i32, extract: F) -> Self
    where
        F: Fn(&R) -> Option<EnsMember> + 'static,
    {
        AxisBuilder::Ens(KindBuilder::new(EnsValues::new(code), Box::new(extract)))
    }

    /// A composite time axis builder. Records also need a runtime builder in the same coordinate
    /// system, with the same `code` and `unit`, to supply their runtime index.
    ///
    pub fn time2d<F>(code: i32, unit: TimeUnit, is_interval: bool, extract: F) -> Self
    where
        F: Fn(&R) -> Option<Time2D> + 'static,
    {
        AxisBuilder::Time2D(KindBuilder::new(
            Time2DValues::new(code, unit, is_interval),
            Box::new(extract),
        ))
    }

    pub fn kind(&self) -> AxisKind {
        match self {
            AxisBuilder::Runtime(_) => AxisKind::Runtime,
            AxisBuilder::Time(_) => AxisKind::Time,
            AxisBuilder::TimeIntv(_) => AxisKind::TimeIntv,
            AxisBuilder::Vert(_) => AxisKind::Vert,
            AxisBuilder::Ens(_) => AxisKind::Ens,
            AxisBuilder::Time2D(_) => AxisKind::Time2D,
        }
    }

    /// Add the record's value to the pending values. Idempotent.
    ///
    pub fn ingest(&mut self, record: &R) {
        dispatch!(self, builder => builder.ingest(record))
    }

    /// Fold the values of an already frozen axis of the same kind into the pending values.
    ///
    pub fn merge(&mut self, axis: &Axis) -> Result<()> {
        dispatch!(self, builder => builder.merge(axis))
    }

    /// Sort the pending values into an immutable axis. Freezing again returns the same axis.
    ///
    pub fn freeze(&mut self, config: &BuildConfig) -> Result<Axis> {
        dispatch!(self, builder => builder.freeze(config))
    }

    /// Freeze to an axis computed elsewhere, such as by a consolidator.
    ///
    pub fn adopt(&mut self, axis: Axis) -> Result<()> {
        dispatch!(self, builder => builder.adopt(axis))
    }

    pub fn is_frozen(&self) -> bool {
        self.axis().is_some()
    }

    pub fn axis(&self) -> Option<&Axis> {
        dispatch!(self, builder => builder.axis())
    }

    /// The record's index along this builder's axis.
    ///
    /// A record whose value can't be extracted or isn't in the axis gets index 0, with a
    /// warning, so one bad record can't stop an index from being built. Fails if the builder
    /// hasn't been frozen.
    ///
    pub fn index_of_record(&self, record: &R) -> Result<usize> {
        dispatch!(self, builder => builder.index_of_record(record))
    }
}

impl<R> fmt::Debug for AxisBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisBuilder")
            .field("kind", &self.kind())
            .field("axis", &self.axis())
            .finish()
    }
}
