use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    axis::Axis,
    builder::AxisBuilder,
    config::BuildConfig,
    coordsys::CoordinateSystem,
    sparse::SparseIndex,
    time::{CalendarDate, TimeUnit},
    value::{EnsMember, Interval, Level, Time2D, TimeValue},
};

/// Code shared by the time and runtime axes of fixture coordinate systems
pub(crate) const TIME_CODE: i32 = 1;

/// Code of the vertical axes of fixture coordinate systems
pub(crate) const VERT_CODE: i32 = 100;

/// A stand in for a decoded grid record: just enough fields to place it.
///
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Rec {
    pub id: usize,
    pub run: CalendarDate,
    pub time: TimeValue,
    pub level: Option<Level>,
    pub ens: Option<EnsMember>,
}

impl Rec {
    pub fn offset(id: usize, run: i64, time: i32, level: f64) -> Self {
        Self {
            id,
            run: hours(run),
            time: TimeValue::Offset(time),
            level: Some(Level::new(level)),
            ens: None,
        }
    }

    pub fn interval(id: usize, run: i64, start: i32, end: i32, level: f64) -> Self {
        Self {
            id,
            run: hours(run),
            time: TimeValue::Interval(Interval::new(start, end)),
            level: Some(Level::new(level)),
            ens: None,
        }
    }

    pub fn with_ens(mut self, code: i32, number: i32) -> Self {
        self.ens = Some(EnsMember::new(code, number));
        self
    }
}

pub(crate) fn hours(h: i64) -> CalendarDate {
    CalendarDate::from_hours(h)
}

pub(crate) fn unit() -> TimeUnit {
    TimeUnit::hours(1)
}

pub(crate) fn runtime_builder() -> AxisBuilder<Rec> {
    AxisBuilder::runtime(TIME_CODE, unit(), |rec: &Rec| Some(rec.run))
}

pub(crate) fn time_builder() -> AxisBuilder<Rec> {
    AxisBuilder::time(TIME_CODE, unit(), |rec: &Rec| match rec.time {
        TimeValue::Offset(offset) => Some((rec.run, offset)),
        TimeValue::Interval(_) => None,
    })
}

pub(crate) fn time_intv_builder() -> AxisBuilder<Rec> {
    AxisBuilder::time_intv(TIME_CODE, unit(), |rec: &Rec| match rec.time {
        TimeValue::Interval(interval) => Some((rec.run, interval)),
        TimeValue::Offset(_) => None,
    })
}

pub(crate) fn vert_builder() -> AxisBuilder<Rec> {
    AxisBuilder::vert(VERT_CODE, "Pa", |rec: &Rec| rec.level)
}

pub(crate) fn ens_builder() -> AxisBuilder<Rec> {
    AxisBuilder::ens(0, |rec: &Rec| rec.ens)
}

pub(crate) fn time2d_builder() -> AxisBuilder<Rec> {
    AxisBuilder::time2d(TIME_CODE, unit(), false, |rec: &Rec| {
        Some(Time2D::new(rec.run, rec.time))
    })
}

/// Every combination of the given runtimes, offsets and levels, with ids in that order.
///
pub(crate) fn grid(runs: &[i64], times: &[i32], levels: &[f64]) -> Vec<Rec> {
    let mut records = vec![];
    for run in runs {
        for time in times {
            for level in levels {
                records.push(Rec::offset(records.len(), *run, *time, *level));
            }
        }
    }

    records
}

/// Records with random runtimes, times (half of them intervals), levels and ensemble members.
///
pub(crate) fn random_records(n: usize, seed: u64) -> Vec<Rec> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|id| {
            let run = rng.gen_range(0..8) * 6;
            let level = [250.0, 500.0, 700.0, 850.0, 1000.0][rng.gen_range(0..5)];
            let record = if rng.gen_bool(0.5) {
                Rec::offset(id, run, rng.gen_range(0..12) * 3, level)
            } else {
                let start = rng.gen_range(0..4) * 6;
                Rec::interval(id, run, start, start + rng.gen_range(1..3) * 3, level)
            };
            record.with_ens(rng.gen_range(1..3), rng.gen_range(0..10))
        })
        .collect()
}

fn finished(builders: Vec<AxisBuilder<Rec>>, records: &[Rec]) -> CoordinateSystem<Rec> {
    let mut coordsys = CoordinateSystem::new(BuildConfig::default());
    for builder in builders {
        coordsys.add_builder(builder);
    }
    for record in records {
        coordsys.ingest(record);
    }
    coordsys.finish(records.iter().cloned()).unwrap();

    coordsys
}

/// A finished (runtime, time2D, vert) coordinate system.
///
pub(crate) fn coordsys_2d(records: &[Rec]) -> CoordinateSystem<Rec> {
    finished(
        vec![runtime_builder(), time2d_builder(), vert_builder()],
        records,
    )
}

/// A finished (runtime, time, vert) coordinate system.
///
pub(crate) fn coordsys_1d(records: &[Rec]) -> CoordinateSystem<Rec> {
    finished(vec![runtime_builder(), time_builder(), vert_builder()], records)
}

/// The tuple a record belongs at along `axes`, found by value. `None` if a value is absent.
///
pub(crate) fn tuple_of(axes: &[Axis], rec: &Rec) -> Option<Vec<usize>> {
    axes.iter()
        .map(|axis| match axis {
            Axis::Runtime(axis) => axis.index_of(rec.run),
            Axis::Time(axis) => match rec.time {
                TimeValue::Offset(offset) => {
                    let shift = axis.unit().offset(axis.ref_date(), rec.run);
                    axis.index_of(&(offset + shift))
                }
                TimeValue::Interval(_) => None,
            },
            Axis::TimeIntv(axis) => match rec.time {
                TimeValue::Interval(interval) => {
                    let shift = axis.unit().offset(axis.ref_date(), rec.run);
                    axis.index_of(&interval.shifted(shift))
                }
                TimeValue::Offset(_) => None,
            },
            Axis::Time2D(axis) => axis
                .find(&Time2D::new(rec.run, rec.time))
                .map(|(_, time)| time),
            Axis::Vert(axis) => axis.index_of(&rec.level?),
            Axis::Ens(axis) => axis.index_of(&rec.ens?),
        })
        .collect()
}

/// Id of the record stored where `rec` belongs.
///
pub(crate) fn lookup_id(axes: &[Axis], index: &SparseIndex<Rec>, rec: &Rec) -> Option<usize> {
    let tuple = tuple_of(axes, rec)?;
    index.lookup(&tuple).ok()?.map(|found| found.id)
}
