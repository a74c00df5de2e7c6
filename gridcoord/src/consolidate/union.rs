//! Union of one variable's axes across partitions.
//!
use std::sync::Arc;

use crate::{
    axis::{Axis, AxisKind},
    builder::{EnsValues, RuntimeValues, TimeValues, VertValues},
    config::BuildConfig,
    coordsys::CoordinateSystem,
    errors::{Error, Result},
    sparse::SparseIndex,
    time::TimeUnit,
    time2d::Time2DValues,
    value::{Interval, TimeValue},
};

use super::remap;

/// Accumulates the values of each axis kind across sources.
///
enum Union {
    Runtime(RuntimeValues),
    Time(TimeValues<i32>),
    TimeIntv(TimeValues<Interval>),
    Vert(VertValues),
    Ens(EnsValues),
    Time2D(Time2DValues),
}

/// Merges the axes of one variable from several partitions, kind by kind.
///
/// Each source adds its axes, in the same kind order. `finish` then produces one axis per
/// kind holding the union of the values of every source, with composite time axes compacted
/// again over the unioned inputs. A source's sparse index can then be moved onto the unioned
/// axes with `reindex`.
///
pub struct AxisUnionizer {
    variable: String,
    runtime_unit: TimeUnit,
    config: BuildConfig,
    unions: Vec<(Union, usize)>,
    nsources: usize,
    result: Option<Vec<Axis>>,
}

impl AxisUnionizer {
    /// The runtime unit is required: unioned runtimes are not assumed to share the unit of any
    /// one source.
    ///
    pub fn new(variable: impl Into<String>, runtime_unit: TimeUnit, config: BuildConfig) -> Self {
        Self {
            variable: variable.into(),
            runtime_unit,
            config,
            unions: vec![],
            nsources: 0,
            result: None,
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Add the axes of one source.
    ///
    pub fn add_axes(&mut self, axes: &[Axis]) -> Result<()> {
        self.nsources += 1;
        for axis in axes {
            let position = match self.position(axis.kind()) {
                Some(position) => position,
                None => {
                    let union = self.start(axis);
                    self.unions.push((union, 0));
                    self.unions.len() - 1
                }
            };
            let (union, count) = &mut self.unions[position];
            *count += 1;
            match (union, axis) {
                (Union::Runtime(values), Axis::Runtime(axis)) => values.add_axis(axis),
                (Union::Time(values), Axis::Time(axis)) => values.add_axis(axis),
                (Union::TimeIntv(values), Axis::TimeIntv(axis)) => values.add_axis(axis),
                (Union::Vert(values), Axis::Vert(axis)) => values.add_axis(axis),
                (Union::Ens(values), Axis::Ens(axis)) => values.add_axis(axis),
                (Union::Time2D(values), Axis::Time2D(axis)) => {
                    if values.is_interval() != axis.is_interval() {
                        return Err(Error::KindMismatch {
                            expected: AxisKind::Time2D,
                            got: axis_kind_of(axis.is_interval()),
                        });
                    }
                    values.add_all(axis);
                }
                (union, axis) => {
                    return Err(Error::KindMismatch {
                        expected: union_kind(union),
                        got: axis.kind(),
                    })
                }
            }
        }

        Ok(())
    }

    fn position(&self, kind: AxisKind) -> Option<usize> {
        self.unions
            .iter()
            .position(|(union, _)| union_kind(union) == kind)
    }

    fn start(&self, axis: &Axis) -> Union {
        match axis {
            Axis::Runtime(axis) => Union::Runtime(RuntimeValues::new(axis.code(), self.runtime_unit)),
            Axis::Time(axis) => Union::Time(TimeValues::new(axis.code(), axis.unit())),
            Axis::TimeIntv(axis) => Union::TimeIntv(TimeValues::new(axis.code(), axis.unit())),
            Axis::Vert(axis) => Union::Vert(VertValues::new(axis.code(), axis.units())),
            Axis::Ens(axis) => Union::Ens(EnsValues::new(axis.code())),
            Axis::Time2D(axis) => {
                Union::Time2D(Time2DValues::new(axis.code(), axis.unit(), axis.is_interval()))
            }
        }
    }

    /// Make the unioned axes, in the order their kinds were first seen.
    ///
    /// A kind missing from some sources is logged and unioned over the sources that have it.
    ///
    pub fn finish(&mut self) -> Result<Vec<Axis>> {
        for (union, count) in &self.unions {
            if *count < self.nsources {
                tracing::warn!(
                    variable = %self.variable,
                    kind = %union_kind(union),
                    sources = self.nsources,
                    found = *count,
                    "axis kind missing from some sources"
                );
            }
        }

        let filter = &self.config.interval_filter;
        let variable = &self.variable;
        let mut axes = vec![];
        for (union, _) in &mut self.unions {
            let axis = match union {
                Union::Runtime(values) => Axis::from(values.build()),
                Union::Time(values) => Axis::from(values.build()),
                Union::TimeIntv(values) => {
                    values.retain(|interval| !filter.rejects(variable, interval));
                    Axis::from(values.build())
                }
                Union::Vert(values) => Axis::from(values.build()),
                Union::Ens(values) => Axis::from(values.build()),
                Union::Time2D(values) => {
                    values.retain(|value| match value {
                        TimeValue::Interval(interval) => !filter.rejects(variable, interval),
                        TimeValue::Offset(_) => true,
                    });
                    Axis::from(values.finish(self.config.regularize)?)
                }
            };
            axes.push(axis);
        }
        link_runtime(&self.variable, &mut axes);
        self.result = Some(axes.clone());

        Ok(axes)
    }

    /// The unioned axes, once `finish` has been called.
    ///
    pub fn axes(&self) -> Option<&[Axis]> {
        self.result.as_deref()
    }

    /// Move a source's sparse index onto the unioned axes.
    ///
    /// Records at intervals left out by the interval filter are dropped, with a warning. Any
    /// other coordinate missing from the unioned axes is an error.
    ///
    pub fn reindex<R: Clone>(&self, coordsys: &CoordinateSystem<R>) -> Result<SparseIndex<R>> {
        let axes = self.result.as_ref().ok_or(Error::Unfinished)?;
        let index = coordsys.try_index()?;
        let old = coordsys.axes();
        let remaps = remap::plan(old, axes)?;
        let shape = axes.iter().map(Axis::dim).collect();

        let run_dim = old.iter().position(|axis| axis.kind() == AxisKind::Runtime);
        let filter = &self.config.interval_filter;
        let mut dropped = 0;
        let index = index.reindex_skipping(shape, &remaps, |dim, tuple| {
            let interval = match &old[dim] {
                Axis::TimeIntv(axis) => axis.value(tuple[dim]),
                Axis::Time2D(axis) => run_dim
                    .and_then(|run_dim| axis.org_value(tuple[run_dim], tuple[dim]))
                    .and_then(|value| match value.time {
                        TimeValue::Interval(interval) => Some(interval),
                        TimeValue::Offset(_) => None,
                    }),
                _ => None,
            };
            let filtered = interval
                .map(|interval| filter.rejects(&self.variable, &interval))
                .unwrap_or(false);
            if filtered {
                dropped += 1;
            }

            filtered
        })?;
        if dropped > 0 {
            tracing::warn!(
                variable = %self.variable,
                dropped,
                "records at filtered intervals dropped"
            );
        }

        Ok(index)
    }
}

fn union_kind(union: &Union) -> AxisKind {
    match union {
        Union::Runtime(_) => AxisKind::Runtime,
        Union::Time(_) => AxisKind::Time,
        Union::TimeIntv(_) => AxisKind::TimeIntv,
        Union::Vert(_) => AxisKind::Vert,
        Union::Ens(_) => AxisKind::Ens,
        Union::Time2D(_) => AxisKind::Time2D,
    }
}

fn axis_kind_of(is_interval: bool) -> AxisKind {
    if is_interval {
        AxisKind::TimeIntv
    } else {
        AxisKind::Time
    }
}

/// Make a composite time axis share the runtime axis of the same set. Logged if there is no
/// runtime axis, or if it doesn't hold the composite axis' runtimes.
///
pub(crate) fn link_runtime(variable: &str, axes: &mut [Axis]) {
    let Some(position) = axes.iter().position(|axis| axis.kind() == AxisKind::Time2D) else {
        return;
    };
    let Some(runtime) = axes.iter().find_map(|axis| axis.as_runtime()).map(Arc::clone) else {
        tracing::warn!(variable, "composite time axis without a runtime axis");
        return;
    };
    if let Some(time2d) = axes[position].as_time2d() {
        if !Arc::ptr_eq(time2d.runtime(), &runtime) && **time2d.runtime() == *runtime {
            axes[position] = Axis::from(time2d.with_runtime(runtime));
        } else if **time2d.runtime() != *runtime {
            tracing::warn!(
                variable,
                "runtime axis differs from the composite time axis runtimes"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::IntervalFilter,
        testing::{self, hours, Rec},
    };

    fn union_of(sources: &[&CoordinateSystem<Rec>]) -> Result<AxisUnionizer> {
        let mut unionizer = AxisUnionizer::new("Temperature", testing::unit(), BuildConfig::default());
        for source in sources {
            unionizer.add_axes(source.axes())?;
        }
        unionizer.finish()?;

        Ok(unionizer)
    }

    #[test]
    fn test_union_runtimes() -> Result<()> {
        let first = testing::grid(&[0, 6], &[0, 3], &[500.0, 850.0]);
        let mut second = testing::grid(&[6, 12], &[0, 3], &[500.0, 850.0]);
        for record in &mut second {
            record.id += 100;
        }
        let a = testing::coordsys_2d(&first);
        let b = testing::coordsys_2d(&second);

        let unionizer = union_of(&[&a, &b])?;
        let axes = unionizer.axes().unwrap();
        let runtime = axes[0].as_runtime().unwrap();
        assert_eq!(runtime.len(), 3);
        assert_eq!(
            runtime.coords().values(),
            &[hours(0), hours(6), hours(12)]
        );
        let time2d = axes[1].as_time2d().unwrap();
        assert!(Arc::ptr_eq(time2d.runtime(), runtime));
        assert!(time2d.is_orthogonal());

        for (coordsys, records) in [(&a, &first), (&b, &second)] {
            let index = unionizer.reindex(coordsys)?;
            assert_eq!(index.shape(), &[3, 2, 2]);
            for record in records {
                assert_eq!(testing::lookup_id(axes, &index, record), Some(record.id));
            }
        }

        Ok(())
    }

    #[test]
    fn test_union_rebases_time() -> Result<()> {
        let first = testing::grid(&[0], &[0, 6], &[500.0]);
        let second = testing::grid(&[6], &[0, 6], &[500.0]);
        let a = testing::coordsys_1d(&first);
        let b = testing::coordsys_1d(&second);

        let unionizer = union_of(&[&a, &b])?;
        let axes = unionizer.axes().unwrap();
        let time = axes[1].as_time().unwrap();
        assert_eq!(time.ref_date(), hours(0));
        assert_eq!(time.coords().values(), &[0, 6, 12]);

        let index = unionizer.reindex(&b)?;
        for record in &second {
            assert_eq!(testing::lookup_id(axes, &index, record), Some(record.id));
        }

        Ok(())
    }

    #[test]
    fn test_union_recompacts_time2d() -> Result<()> {
        // Each source is orthogonal on its own, the union is only regular
        let a = testing::coordsys_2d(&testing::grid(&[0, 24], &[0, 6, 12], &[500.0]));
        let b = testing::coordsys_2d(&testing::grid(&[12, 36], &[3, 9], &[500.0]));
        let unionizer = union_of(&[&a, &b])?;
        let time2d = unionizer.axes().unwrap()[1].as_time2d().unwrap();
        assert!(time2d.is_regular());
        assert_eq!(time2d.nruns(), 4);
        assert_eq!(time2d.ntimes(), 3);

        Ok(())
    }

    #[test]
    fn test_interval_filter() -> Result<()> {
        let records = vec![
            Rec::interval(0, 0, 0, 0, 500.0),
            Rec::interval(1, 0, 0, 3, 500.0),
            Rec::interval(2, 0, 0, 6, 500.0),
        ];
        let mut coordsys = CoordinateSystem::new(BuildConfig::default());
        coordsys
            .add_builder(testing::runtime_builder())
            .add_builder(testing::time_intv_builder());
        for record in &records {
            coordsys.ingest(record);
        }
        coordsys.finish(records.iter().cloned())?;

        let config = BuildConfig {
            interval_filter: IntervalFilter {
                exclude_zero: true,
                ..IntervalFilter::default()
            }
            .exclude_length("Precipitation", 3),
            ..BuildConfig::default()
        };
        let mut unionizer = AxisUnionizer::new("Precipitation", testing::unit(), config);
        unionizer.add_axes(coordsys.axes())?;
        let axes = unionizer.finish()?;
        let intervals = axes[1].as_time_intv().unwrap();
        assert_eq!(intervals.coords().values(), &[Interval::new(0, 6)]);

        // Records at the dropped intervals are left out
        let index = unionizer.reindex(&coordsys)?;
        assert_eq!(index.count_records(), 1);
        assert_eq!(testing::lookup_id(&axes, &index, &records[2]), Some(2));
        assert_eq!(testing::lookup_id(&axes, &index, &records[1]), None);

        Ok(())
    }

    #[test]
    fn test_missing_kind_is_partial() -> Result<()> {
        let a = testing::coordsys_1d(&testing::grid(&[0], &[0], &[500.0]));
        let mut b = CoordinateSystem::new(BuildConfig::default());
        b.add_builder(testing::runtime_builder());
        let records = testing::grid(&[6], &[0], &[500.0]);
        for record in &records {
            b.ingest(record);
        }
        b.finish(records)?;

        let unionizer = union_of(&[&a, &b])?;
        let axes = unionizer.axes().unwrap();
        assert_eq!(axes.len(), 3);
        assert_eq!(axes[0].len(), 2);
        assert!(matches!(unionizer.reindex(&b), Err(Error::Rank { .. })));

        Ok(())
    }

    #[test]
    fn test_reindex_before_finish() {
        let a = testing::coordsys_1d(&testing::grid(&[0], &[0], &[500.0]));
        let mut unionizer = AxisUnionizer::new("T", testing::unit(), BuildConfig::default());
        unionizer.add_axes(a.axes()).unwrap();
        assert!(matches!(unionizer.reindex(&a), Err(Error::Unfinished)));
    }
}
