//! Composite (runtime x time) axes.
//!
//! A forecast collection has, for each runtime, its own set of forecast times. Stored naively
//! that is one time axis per runtime. Usually the runs share their times, though, and the axis
//! can be compacted:
//!
//! * orthogonal: every run's times are contained in the widest run's times, so that one axis is
//!   shared by all runs;
//! * regular: the orthogonal test passes separately for the runs of each hour of day (all 00Z
//!   runs share an axis, all 06Z runs share another, and so on).
//!
//! Times are always stored relative to their own runtime. `offset(run)` gives the distance from
//! the first runtime to each run, in units of the axis, for deriving a single "best" time axis.
//!
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display, Write},
    hash::{Hash, Hasher},
    mem::size_of,
    sync::{Arc, OnceLock},
};

use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncWrite};

use crate::{
    axis::{Coords, RuntimeAxis, TimeAxis, TimeCoordValue, MIXED_INTERVALS},
    errors::{Error, Result},
    extio::{read_seq, write_seq, ExtendedAsyncRead, ExtendedAsyncWrite, Serialize},
    time::{CalendarDate, TimeUnit},
    value::{Interval, Time2D, TimeValue},
};

/// A one dimensional time axis used as a component of a composite time axis.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimeCoord {
    Offset(Arc<TimeAxis<i32>>),
    Interval(Arc<TimeAxis<Interval>>),
}

impl TimeCoord {
    /// Make a time coordinate from values of either flavor. Values of the other flavor are
    /// dropped.
    ///
    pub fn new<I>(is_interval: bool, code: i32, unit: TimeUnit, ref_date: CalendarDate, values: I) -> Self
    where
        I: IntoIterator<Item = TimeValue>,
    {
        if is_interval {
            TimeCoord::Interval(Arc::new(make_axis(code, unit, ref_date, values)))
        } else {
            TimeCoord::Offset(Arc::new(make_axis(code, unit, ref_date, values)))
        }
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, TimeCoord::Interval(_))
    }

    pub fn len(&self) -> usize {
        match self {
            TimeCoord::Offset(axis) => axis.len(),
            TimeCoord::Interval(axis) => axis.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ref_date(&self) -> CalendarDate {
        match self {
            TimeCoord::Offset(axis) => axis.ref_date(),
            TimeCoord::Interval(axis) => axis.ref_date(),
        }
    }

    pub fn value(&self, index: usize) -> Option<TimeValue> {
        match self {
            TimeCoord::Offset(axis) => axis.value(index).map(TimeValue::Offset),
            TimeCoord::Interval(axis) => axis.value(index).map(TimeValue::Interval),
        }
    }

    pub fn index_of(&self, value: &TimeValue) -> Option<usize> {
        match (self, value) {
            (TimeCoord::Offset(axis), TimeValue::Offset(offset)) => axis.index_of(offset),
            (TimeCoord::Interval(axis), TimeValue::Interval(interval)) => axis.index_of(interval),
            _ => None,
        }
    }

    pub fn values(&self) -> Vec<TimeValue> {
        match self {
            TimeCoord::Offset(axis) => axis.coords().iter().map(|v| TimeValue::Offset(*v)).collect(),
            TimeCoord::Interval(axis) => axis
                .coords()
                .iter()
                .map(|v| TimeValue::Interval(*v))
                .collect(),
        }
    }

    /// For a best time coordinate, the 0-based runtime index supplying the value at `index`.
    ///
    pub fn runtime_index(&self, index: usize) -> Option<usize> {
        match self {
            TimeCoord::Offset(axis) => axis.runtime_index(index),
            TimeCoord::Interval(axis) => axis.runtime_index(index),
        }
    }

    pub fn interval_name(&self) -> Option<String> {
        match self {
            TimeCoord::Offset(_) => None,
            TimeCoord::Interval(axis) => Some(axis.interval_name()),
        }
    }

    pub fn show_info(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            TimeCoord::Offset(axis) => axis.show_info(f),
            TimeCoord::Interval(axis) => axis.show_info(f),
        }
    }

    fn est_memory_size(&self) -> usize {
        match self {
            TimeCoord::Offset(axis) => size_of::<TimeAxis<i32>>() + axis.coords().est_memory_size(),
            TimeCoord::Interval(axis) => {
                size_of::<TimeAxis<Interval>>() + axis.coords().est_memory_size()
            }
        }
    }
}

fn make_axis<T, I>(code: i32, unit: TimeUnit, ref_date: CalendarDate, values: I) -> TimeAxis<T>
where
    T: TimeCoordValue,
    I: IntoIterator<Item = TimeValue>,
{
    let values = values.into_iter().filter_map(T::from_time_value).collect();
    TimeAxis::new(code, unit, ref_date, values)
}

/// How the time axes of the runs of a composite time axis are stored.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Time2DLayout {
    /// One time axis per runtime
    PerRun(Vec<TimeCoord>),

    /// One time axis shared by every runtime
    Orthogonal(TimeCoord),

    /// One time axis per runtime hour of day
    Regular(BTreeMap<u32, TimeCoord>),
}

impl Time2DLayout {
    fn coords(&self) -> Vec<&TimeCoord> {
        match self {
            Time2DLayout::PerRun(times) => times.iter().collect(),
            Time2DLayout::Orthogonal(otime) => vec![otime],
            Time2DLayout::Regular(regular) => regular.values().collect(),
        }
    }
}

/// Runtime and time coordinates of a forecast collection where the times depend on the runtime.
///
#[derive(Clone, Debug)]
pub struct Time2DAxis {
    code: i32,
    unit: TimeUnit,
    is_interval: bool,
    runtime: Arc<RuntimeAxis>,
    layout: Time2DLayout,

    /// The original per runtime times, when a compacted layout was made from them
    times: Option<Vec<TimeCoord>>,

    /// Offset of each runtime from the first runtime, in `unit`
    offsets: Vec<i32>,
    ntimes: usize,

    /// Every (runtime, time) pair in the inventory, sorted
    values: Vec<Time2D>,
    name: OnceLock<String>,
}

impl Time2DAxis {
    /// Most general form: a time coordinate for each runtime.
    ///
    pub fn per_run(
        code: i32,
        unit: TimeUnit,
        runtime: Arc<RuntimeAxis>,
        times: Vec<TimeCoord>,
    ) -> Result<Self> {
        check_run_count(&runtime, &times)?;
        let ntimes = times.iter().map(TimeCoord::len).max().unwrap_or(0);
        let is_interval = times.first().map(TimeCoord::is_interval).unwrap_or(false);

        Ok(Self::assemble(
            code,
            unit,
            is_interval,
            runtime,
            Time2DLayout::PerRun(times),
            None,
            ntimes,
        ))
    }

    /// Orthogonal form: every runtime has the same time coordinate, `otime`.
    ///
    /// `times`, the original per runtime coordinates, are kept if given so a best time axis can
    /// be derived from the actual inventory.
    ///
    pub fn orthogonal(
        code: i32,
        unit: TimeUnit,
        runtime: Arc<RuntimeAxis>,
        otime: TimeCoord,
        times: Option<Vec<TimeCoord>>,
    ) -> Result<Self> {
        if let Some(times) = &times {
            check_run_count(&runtime, times)?;
        }
        let ntimes = otime.len();
        let is_interval = otime.is_interval();

        Ok(Self::assemble(
            code,
            unit,
            is_interval,
            runtime,
            Time2DLayout::Orthogonal(otime),
            times,
            ntimes,
        ))
    }

    /// Regular form: all runtimes with the same hour of day have the same time coordinate.
    ///
    pub fn regular(
        code: i32,
        unit: TimeUnit,
        runtime: Arc<RuntimeAxis>,
        regular: BTreeMap<u32, TimeCoord>,
        times: Option<Vec<TimeCoord>>,
    ) -> Result<Self> {
        if let Some(times) = &times {
            check_run_count(&runtime, times)?;
        }
        for date in runtime.coords().iter() {
            if !regular.contains_key(&date.hour_of_day()) {
                return Err(Error::RunCount {
                    expected: runtime.len(),
                    got: regular.len(),
                });
            }
        }
        let ntimes = regular.values().map(TimeCoord::len).max().unwrap_or(0);
        let is_interval = regular
            .values()
            .next()
            .map(TimeCoord::is_interval)
            .unwrap_or(false);

        Ok(Self::assemble(
            code,
            unit,
            is_interval,
            runtime,
            Time2DLayout::Regular(regular),
            times,
            ntimes,
        ))
    }

    /// Choose the most compact layout for the given per runtime time coordinates.
    ///
    /// The orthogonal form is used when every run's values are contained in the widest run's
    /// values. Failing that, and if `regularize` is set, the regular form is used when the
    /// orthogonal test passes for each runtime hour of day. Otherwise one coordinate per run is
    /// kept.
    ///
    pub fn compact(
        code: i32,
        unit: TimeUnit,
        runtime: Arc<RuntimeAxis>,
        times: Vec<TimeCoord>,
        regularize: bool,
    ) -> Result<Self> {
        check_run_count(&runtime, &times)?;

        if let Some(otime) = test_orthogonal(times.iter()) {
            tracing::debug!(
                nruns = runtime.len(),
                ntimes = otime.len(),
                "composite time axis is orthogonal"
            );
            return Self::orthogonal(code, unit, runtime, otime, Some(times));
        }

        if regularize {
            if let Some(regular) = test_regular(&runtime, &times) {
                tracing::debug!(
                    nruns = runtime.len(),
                    hours = regular.len(),
                    "composite time axis is regular"
                );
                return Self::regular(code, unit, runtime, regular, Some(times));
            }
        }

        tracing::debug!(nruns = runtime.len(), "composite time axis kept per run");
        Self::per_run(code, unit, runtime, times)
    }

    fn assemble(
        code: i32,
        unit: TimeUnit,
        is_interval: bool,
        runtime: Arc<RuntimeAxis>,
        layout: Time2DLayout,
        times: Option<Vec<TimeCoord>>,
        ntimes: usize,
    ) -> Self {
        let offsets = match runtime.first_date() {
            Some(first) => runtime
                .coords()
                .iter()
                .map(|date| unit.offset(first, *date))
                .collect(),
            None => vec![],
        };

        let mut axis = Self {
            code,
            unit,
            is_interval,
            runtime,
            layout,
            times,
            offsets,
            ntimes,
            values: vec![],
            name: OnceLock::new(),
        };
        let mut values = vec![];
        for run in 0..axis.nruns() {
            if let (Some(date), Some(coord)) = (axis.ref_date(run), axis.inventory(run)) {
                values.extend(coord.values().into_iter().map(|time| Time2D::new(date, time)));
            }
        }
        axis.values = values;

        axis
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn is_interval(&self) -> bool {
        self.is_interval
    }

    pub fn is_orthogonal(&self) -> bool {
        matches!(self.layout, Time2DLayout::Orthogonal(_))
    }

    pub fn is_regular(&self) -> bool {
        matches!(self.layout, Time2DLayout::Regular(_))
    }

    pub fn runtime(&self) -> &Arc<RuntimeAxis> {
        &self.runtime
    }

    pub fn layout(&self) -> &Time2DLayout {
        &self.layout
    }

    pub fn nruns(&self) -> usize {
        self.runtime.len()
    }

    /// Extent of the time dimension: the size of the largest time coordinate.
    ///
    pub fn ntimes(&self) -> usize {
        self.ntimes
    }

    /// Number of (runtime, time) pairs in the inventory.
    ///
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Time2D] {
        &self.values
    }

    /// Offset of runtime `run` from the first runtime, in units of this axis.
    ///
    pub fn offset(&self, run: usize) -> Option<i32> {
        self.offsets.get(run).copied()
    }

    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    pub fn ref_date(&self, run: usize) -> Option<CalendarDate> {
        self.runtime.date(run)
    }

    /// The time coordinate used to index the times of runtime `run`.
    ///
    /// For the compacted layouts the coordinate is shared between runs, and its own reference
    /// date is that of whichever run it was taken from; values are always relative to
    /// `ref_date(run)`.
    ///
    pub fn time_coord(&self, run: usize) -> Option<&TimeCoord> {
        match &self.layout {
            Time2DLayout::PerRun(times) => times.get(run),
            Time2DLayout::Orthogonal(otime) => (run < self.nruns()).then_some(otime),
            Time2DLayout::Regular(regular) => {
                let hour = self.ref_date(run)?.hour_of_day();
                regular.get(&hour)
            }
        }
    }

    /// The times actually present for runtime `run`, which for a compacted layout may be fewer
    /// than `time_coord(run)` holds.
    ///
    pub fn inventory(&self, run: usize) -> Option<&TimeCoord> {
        match &self.times {
            Some(times) => times.get(run),
            None => self.time_coord(run),
        }
    }

    /// Original per runtime time coordinates, if known.
    ///
    pub fn times(&self) -> Option<&[TimeCoord]> {
        match (&self.times, &self.layout) {
            (Some(times), _) => Some(times),
            (None, Time2DLayout::PerRun(times)) => Some(times),
            _ => None,
        }
    }

    /// The value at the given (runtime, time) indices.
    ///
    pub fn org_value(&self, run: usize, time: usize) -> Option<Time2D> {
        let date = self.ref_date(run)?;
        let value = self.time_coord(run)?.value(time)?;

        Some(Time2D::new(date, value))
    }

    /// Find the (runtime, time) indices of `value`. The inverse of `org_value`.
    ///
    pub fn find(&self, value: &Time2D) -> Option<(usize, usize)> {
        let run = self.runtime.index_of(value.run)?;
        let time = self.time_coord(run)?.index_of(&value.time)?;

        Some((run, time))
    }

    /// Find the time index for a runtime, given a time value expressed relative to some other
    /// reference date, `value_ref`.
    ///
    pub fn match_time_coordinate(
        &self,
        run: usize,
        value: TimeValue,
        value_ref: CalendarDate,
    ) -> Option<usize> {
        let offset = self.unit.offset(self.ref_date(run)?, value_ref);
        self.time_coord(run)?.index_of(&value.shifted(offset))
    }

    /// Sorted union of the time values of every component time coordinate.
    ///
    pub fn offsets_sorted(&self) -> Vec<TimeValue> {
        if let Time2DLayout::Orthogonal(otime) = &self.layout {
            return otime.values();
        }
        let union: BTreeSet<TimeValue> = self
            .layout
            .coords()
            .into_iter()
            .flat_map(TimeCoord::values)
            .collect();

        union.into_iter().collect()
    }

    /// Interval name shared by the component time coordinates, or [`MIXED_INTERVALS`] if they
    /// differ. `None` unless this is an interval axis.
    ///
    pub fn time_interval_name(&self) -> Option<String> {
        if !self.is_interval {
            return None;
        }
        let mut first: Option<String> = None;
        for coord in self.layout.coords() {
            if coord.is_empty() {
                continue;
            }
            let name = coord.interval_name()?;
            if name == MIXED_INTERVALS {
                return Some(name);
            }
            match &first {
                None => first = Some(name),
                Some(first) if *first != name => return Some(MIXED_INTERVALS.to_string()),
                Some(_) => {}
            }
        }

        first
    }

    /// From the first time of the first runtime to the last time of the last runtime.
    ///
    pub fn date_range(&self) -> Option<(CalendarDate, CalendarDate)> {
        let last_run = self.nruns().checked_sub(1)?;
        let first = self.time_coord(0)?.value(0)?;
        let last_coord = self.time_coord(last_run)?;
        let last = last_coord.value(last_coord.len().checked_sub(1)?)?;

        let start = match first {
            TimeValue::Offset(offset) => offset,
            TimeValue::Interval(interval) => interval.start,
        };
        let end = match last {
            TimeValue::Offset(offset) => offset,
            TimeValue::Interval(interval) => interval.end,
        };

        Some((
            self.unit.add(self.ref_date(0)?, start),
            self.unit.add(self.ref_date(last_run)?, end),
        ))
    }

    /// The same axis, referencing `runtime` instead of its own runtime axis. Used to make value
    /// equal runtime axes the very same instance.
    ///
    /// If `runtime` is not value equal to this axis' runtime the axis is returned unchanged.
    ///
    pub fn with_runtime(&self, runtime: Arc<RuntimeAxis>) -> Self {
        if *runtime != *self.runtime {
            tracing::warn!(
                axis = self.name(),
                "runtime substitution skipped: runtime axes differ"
            );
            return self.clone();
        }
        let mut axis = self.clone();
        axis.runtime = runtime;

        axis
    }

    /// Derive a single "best" time coordinate: the union of the times of all runs, as offsets
    /// from the first runtime, each supplied by the latest runtime that has it.
    ///
    /// `master` is the runtime axis the resulting `time2runtime` indexes refer to. Runs missing
    /// from `master` are logged and do not supply any values.
    ///
    pub fn make_best(&self, master: &RuntimeAxis) -> TimeCoord {
        let ref_date = self
            .runtime
            .first_date()
            .unwrap_or_else(|| CalendarDate::from_millis(0));

        let mut union = BTreeSet::new();
        for run in 0..self.nruns() {
            let offset = self.offsets[run];
            if let Some(coord) = self.inventory(run) {
                union.extend(coord.values().into_iter().map(|v| v.shifted(offset)));
            }
        }
        let best = TimeCoord::new(self.is_interval, self.code, self.unit, ref_date, union);

        let mut time2runtime = vec![0_u32; best.len()];
        for run in 0..self.nruns() {
            let master_index = self.ref_date(run).and_then(|date| master.index_of(date));
            let master_index = match master_index {
                Some(index) => index,
                None => {
                    tracing::warn!(
                        axis = self.name(),
                        run,
                        "runtime missing from master runtime axis"
                    );
                    continue;
                }
            };
            let offset = self.offsets[run];
            if let Some(coord) = self.inventory(run) {
                for value in coord.values() {
                    if let Some(index) = best.index_of(&value.shifted(offset)) {
                        // later runtimes override earlier ones
                        time2runtime[index] = master_index as u32 + 1;
                    }
                }
            }
        }

        match best {
            TimeCoord::Offset(axis) => TimeCoord::Offset(Arc::new(
                (*axis).clone().with_time2runtime(time2runtime),
            )),
            TimeCoord::Interval(axis) => TimeCoord::Interval(Arc::new(
                (*axis).clone().with_time2runtime(time2runtime),
            )),
        }
    }

    /// For value `index` of a best time coordinate made by `make_best`, the (runtime, time)
    /// indices in this axis holding it.
    ///
    pub fn best_source(
        &self,
        best: &TimeCoord,
        master: &RuntimeAxis,
        index: usize,
    ) -> Option<(usize, usize)> {
        let date = master.date(best.runtime_index(index)?)?;
        let run = self.runtime.index_of(date)?;
        let value = best.value(index)?.shifted(-self.offset(run)?);
        let time = self.time_coord(run)?.index_of(&value)?;

        Some((run, time))
    }

    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or("time2D")
    }

    pub fn set_name(&self, name: impl Into<String>) -> bool {
        self.name.set(name.into()).is_ok()
    }

    pub fn est_memory_size(&self) -> usize {
        let components: usize = self
            .layout
            .coords()
            .into_iter()
            .map(TimeCoord::est_memory_size)
            .sum();

        size_of::<Self>()
            + self.runtime.coords().est_memory_size()
            + self.offsets.len() * size_of::<i32>()
            + self.values.len() * size_of::<Time2D>()
            + components
    }

    pub fn show_info(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(
            f,
            "time2D {} nruns={} ntimes={} isOrthogonal={} isRegular={}",
            self.name(),
            self.nruns(),
            self.ntimes,
            self.is_orthogonal(),
            self.is_regular()
        )?;
        self.runtime.show_info(f)?;

        write!(f, "All time values=")?;
        let all = self.offsets_sorted();
        for value in &all {
            write!(f, " {value},")?;
        }
        writeln!(f, " (n={})", all.len())?;

        match &self.layout {
            Time2DLayout::Orthogonal(otime) => otime.show_info(f),
            Time2DLayout::Regular(regular) => {
                for (hour, coord) in regular {
                    write!(f, "  hour {hour}: ")?;
                    coord.show_info(f)?;
                }
                Ok(())
            }
            Time2DLayout::PerRun(times) => {
                for (run, coord) in times.iter().enumerate() {
                    if let Some(date) = self.ref_date(run) {
                        write!(f, "  {date}: ")?;
                    }
                    coord.show_info(f)?;
                }
                Ok(())
            }
        }
    }
}

fn check_run_count(runtime: &RuntimeAxis, times: &[TimeCoord]) -> Result<()> {
    if times.len() != runtime.len() {
        return Err(Error::RunCount {
            expected: runtime.len(),
            got: times.len(),
        });
    }

    Ok(())
}

/// If the union of all values is no larger than the largest coordinate, then the largest
/// coordinate contains every other one and can stand in for all of them.
///
pub fn test_orthogonal<'a, I>(times: I) -> Option<TimeCoord>
where
    I: IntoIterator<Item = &'a TimeCoord>,
{
    let mut widest: Option<&TimeCoord> = None;
    let mut union = BTreeSet::new();
    for coord in times {
        if widest.map(|w| w.len() < coord.len()).unwrap_or(true) {
            widest = Some(coord);
        }
        union.extend(coord.values());
    }

    let widest = widest?;
    (union.len() == widest.len()).then(|| widest.clone())
}

/// Group the runs by runtime hour of day and test each group for orthogonality.
///
pub fn test_regular(runtime: &RuntimeAxis, times: &[TimeCoord]) -> Option<BTreeMap<u32, TimeCoord>> {
    if times.is_empty() {
        return None;
    }
    let mut groups: BTreeMap<u32, Vec<&TimeCoord>> = BTreeMap::new();
    for (date, coord) in runtime.coords().iter().zip(times) {
        groups.entry(date.hour_of_day()).or_default().push(coord);
    }

    groups
        .into_iter()
        .map(|(hour, group)| test_orthogonal(group).map(|otime| (hour, otime)))
        .collect()
}

impl PartialEq for Time2DAxis {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.is_interval == other.is_interval
            && self.runtime == other.runtime
            && self.layout == other.layout
            && self.times == other.times
    }
}

impl Eq for Time2DAxis {}

impl Hash for Time2DAxis {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
        self.is_interval.hash(state);
        self.runtime.hash(state);
        self.layout.hash(state);
        self.times.hash(state);
    }
}

impl Display for Time2DAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nruns={} ntimes={} isOrthogonal={} isRegular={}",
            self.name(),
            self.nruns(),
            self.ntimes,
            self.is_orthogonal(),
            self.is_regular()
        )
    }
}

/// Accumulates (runtime, time) values for a composite time axis.
///
pub struct Time2DValues {
    code: i32,
    unit: TimeUnit,
    is_interval: bool,
    runs: BTreeMap<CalendarDate, BTreeSet<TimeValue>>,
}

impl Time2DValues {
    pub fn new(code: i32, unit: TimeUnit, is_interval: bool) -> Self {
        Self {
            code,
            unit,
            is_interval,
            runs: BTreeMap::new(),
        }
    }

    pub fn is_interval(&self) -> bool {
        self.is_interval
    }

    /// Add a value. Returns `false`, adding nothing, if the value is an offset and this is an
    /// interval axis or vice versa.
    ///
    pub fn add(&mut self, value: Time2D) -> bool {
        if value.time.is_interval() != self.is_interval {
            return false;
        }
        self.runs.entry(value.run).or_default().insert(value.time);

        true
    }

    /// Make sure `run` is present, even if it has no times.
    ///
    pub fn add_run(&mut self, run: CalendarDate) {
        self.runs.entry(run).or_default();
    }

    /// Add every value in the inventory of a composite time axis. Runs without any times are
    /// kept.
    ///
    pub fn add_all(&mut self, axis: &Time2DAxis) {
        for run in axis.runtime().coords().iter() {
            self.add_run(*run);
        }
        for value in axis.values() {
            self.add(*value);
        }
    }

    /// Keep only the time values for which `keep` returns `true`. Runs left without times are
    /// kept.
    ///
    pub fn retain(&mut self, mut keep: impl FnMut(&TimeValue) -> bool) {
        for values in self.runs.values_mut() {
            values.retain(&mut keep);
        }
    }

    pub fn nruns(&self) -> usize {
        self.runs.len()
    }

    /// Make the composite time axis, compacting it if possible.
    ///
    pub fn finish(&self, regularize: bool) -> Result<Time2DAxis> {
        let runtime = Arc::new(RuntimeAxis::from_coords(
            self.code,
            self.unit,
            Coords::from_set(self.runs.keys().copied().collect()),
        ));
        let times = self
            .runs
            .iter()
            .map(|(run, values)| {
                TimeCoord::new(
                    self.is_interval,
                    self.code,
                    self.unit,
                    *run,
                    values.iter().copied(),
                )
            })
            .collect();

        Time2DAxis::compact(self.code, self.unit, runtime, times, regularize)
    }
}

#[async_trait]
impl Serialize for TimeCoord {
    async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<()> {
        match self {
            TimeCoord::Offset(axis) => {
                stream.write_byte(0).await?;
                axis.write_to(stream).await
            }
            TimeCoord::Interval(axis) => {
                stream.write_byte(1).await?;
                axis.write_to(stream).await
            }
        }
    }

    async fn read_from(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self> {
        match stream.read_byte().await? {
            0 => Ok(TimeCoord::Offset(Arc::new(TimeAxis::read_from(stream).await?))),
            1 => Ok(TimeCoord::Interval(Arc::new(TimeAxis::read_from(stream).await?))),
            tag => Err(Error::BadTag(tag)),
        }
    }
}

const PER_RUN: u8 = 0;
const ORTHOGONAL: u8 = 1;
const REGULAR: u8 = 2;

/// Written as code, unit, runtime axis, then the layout: a tag followed by its time
/// coordinates. Compacted layouts are followed by the original per runtime coordinates, if
/// kept.
///
#[async_trait]
impl Serialize for Time2DAxis {
    async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i32(self.code).await?;
        self.unit.write_to(stream).await?;
        self.runtime.write_to(stream).await?;
        match &self.layout {
            Time2DLayout::PerRun(times) => {
                stream.write_byte(PER_RUN).await?;
                return write_seq(stream, times).await;
            }
            Time2DLayout::Orthogonal(otime) => {
                stream.write_byte(ORTHOGONAL).await?;
                otime.write_to(stream).await?;
            }
            Time2DLayout::Regular(regular) => {
                stream.write_byte(REGULAR).await?;
                stream.write_varint(regular.len()).await?;
                for (hour, coord) in regular {
                    stream.write_u32(*hour).await?;
                    coord.write_to(stream).await?;
                }
            }
        }
        match &self.times {
            Some(times) => {
                stream.write_byte(1).await?;
                write_seq(stream, times).await
            }
            None => Ok(stream.write_byte(0).await?),
        }
    }

    async fn read_from(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self> {
        let code = stream.read_i32().await?;
        let unit = TimeUnit::read_from(stream).await?;
        let runtime = Arc::new(RuntimeAxis::read_from(stream).await?);
        let layout = match stream.read_byte().await? {
            PER_RUN => {
                let times = read_seq(stream).await?;
                return Self::per_run(code, unit, runtime, times);
            }
            ORTHOGONAL => Time2DLayout::Orthogonal(TimeCoord::read_from(stream).await?),
            REGULAR => {
                let len = stream.read_varint().await?;
                let mut regular = BTreeMap::new();
                for _ in 0..len {
                    let hour = stream.read_u32().await?;
                    regular.insert(hour, TimeCoord::read_from(stream).await?);
                }
                Time2DLayout::Regular(regular)
            }
            tag => return Err(Error::BadTag(tag)),
        };
        let times = match stream.read_byte().await? {
            0 => None,
            1 => Some(read_seq(stream).await?),
            flag => return Err(Error::BadTag(flag)),
        };

        match layout {
            Time2DLayout::Orthogonal(otime) => Self::orthogonal(code, unit, runtime, otime, times),
            Time2DLayout::Regular(regular) => Self::regular(code, unit, runtime, regular, times),
            Time2DLayout::PerRun(times) => Self::per_run(code, unit, runtime, times),
        }
    }
}
