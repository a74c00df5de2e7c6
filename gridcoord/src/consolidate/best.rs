//! Deriving the "best" group of a collection: one time per valid time, taken from the latest
//! runtime that has it.
//!
use std::sync::Arc;

use crate::{
    axis::{Axis, AxisKind, RuntimeAxis},
    coordsys::CoordinateSystem,
    errors::{Error, Result},
    sparse::SparseIndex,
    time::TimeUnit,
    time2d::TimeCoord,
    value::Time2D,
};

use super::uniquify::AxisDeduplicator;

/// Axes of a best group and, for each variable, the indexes of its axes in the group.
///
pub struct BestGroup {
    pub axes: Vec<Axis>,
    pub master: Arc<RuntimeAxis>,
    pub variables: Vec<Vec<usize>>,
}

/// Make the best group from a two dimensional group.
///
/// `shared` are the axes of the two dimensional group and `variables` the indexes of each
/// variable's axes in it. Runtime axes are dropped, each composite time axis is replaced by its
/// best time axis against `master`, and the remaining axes are deduplicated.
///
pub fn make_best_group(
    shared: &[Axis],
    variables: &[Vec<usize>],
    master: Arc<RuntimeAxis>,
) -> Result<BestGroup> {
    let mut dedup = AxisDeduplicator::new();
    let best_of: Vec<Option<usize>> = shared
        .iter()
        .map(|axis| match axis {
            Axis::Runtime(_) => None,
            Axis::Time2D(time2d) => {
                Some(dedup.add_axis(&best_axis(time2d.make_best(&master))))
            }
            axis => Some(dedup.add_axis(axis)),
        })
        .collect();

    let variables = variables
        .iter()
        .map(|indexes| {
            let mut best = vec![];
            for index in indexes {
                let mapped = best_of.get(*index).ok_or(Error::OutOfBounds {
                    dim: 0,
                    index: *index,
                    size: shared.len(),
                })?;
                best.extend(*mapped);
            }
            Ok::<_, Error>(best)
        })
        .collect::<Result<Vec<Vec<usize>>>>()?;

    Ok(BestGroup {
        axes: dedup.finish(),
        master,
        variables,
    })
}

fn best_axis(best: TimeCoord) -> Axis {
    match best {
        TimeCoord::Offset(axis) => Axis::Time(axis),
        TimeCoord::Interval(axis) => Axis::TimeIntv(axis),
    }
}

/// Index a variable's records along its best axes.
///
/// `best_axes` are the variable's axes in the best group: the axes of `coordsys` without the
/// runtime axis, with the composite time axis replaced by its best time axis. A record is kept
/// only if its runtime is the one that supplies its time in the best time axis.
///
pub fn best_index<R: Clone>(
    coordsys: &CoordinateSystem<R>,
    master: &RuntimeAxis,
    best_axes: &[Axis],
) -> Result<SparseIndex<R>> {
    let index = coordsys.try_index()?;
    let axes = coordsys.axes();
    let run_dim = axes.iter().position(|axis| axis.kind() == AxisKind::Runtime);
    let kept: Vec<usize> = (0..axes.len()).filter(|dim| Some(*dim) != run_dim).collect();
    if kept.len() != best_axes.len() {
        return Err(Error::Rank {
            expected: kept.len(),
            got: best_axes.len(),
        });
    }

    let shape = best_axes.iter().map(Axis::dim).collect();
    let mut best = SparseIndex::new(shape, index.policy());
    'cells: for (tuple, record) in index.occupied() {
        let mut best_tuple = Vec::with_capacity(kept.len());
        for (dim, best_axis) in kept.iter().zip(best_axes) {
            let old = &axes[*dim];
            let mapped = match (old, best_axis) {
                (Axis::Time2D(time2d), best_axis) => {
                    let run = run_dim.map(|run_dim| tuple[run_dim]).unwrap_or(0);
                    let value = time2d
                        .org_value(run, tuple[*dim])
                        .ok_or(Error::Unmapped {
                            dim: *dim,
                            index: tuple[*dim],
                        })?;
                    match best_position(best_axis, time2d.unit(), value, master)? {
                        Some(index) => index,
                        None => continue 'cells,
                    }
                }
                (old, new) => {
                    let value = old.value(tuple[*dim]).ok_or(Error::OutOfBounds {
                        dim: *dim,
                        index: tuple[*dim],
                        size: old.dim(),
                    })?;
                    new.index_of(&value).ok_or(Error::Unmapped {
                        dim: *dim,
                        index: tuple[*dim],
                    })?
                }
            };
            best_tuple.push(mapped);
        }
        best.add(record.clone(), &best_tuple)?;
    }

    Ok(best)
}

/// Index of `value` in a best time axis, if its runtime is the one supplying it.
///
/// `value` is shifted from its own runtime onto the reference date of `best`, which can be
/// earlier than the variable's first runtime.
///
fn best_position(
    best: &Axis,
    unit: TimeUnit,
    value: Time2D,
    master: &RuntimeAxis,
) -> Result<Option<usize>> {
    let coord = match best {
        Axis::Time(axis) => TimeCoord::Offset(Arc::clone(axis)),
        Axis::TimeIntv(axis) => TimeCoord::Interval(Arc::clone(axis)),
        other => {
            return Err(Error::KindMismatch {
                expected: AxisKind::Time,
                got: other.kind(),
            })
        }
    };
    let shifted = value.time.shifted(unit.offset(coord.ref_date(), value.run));
    let Some(index) = coord.index_of(&shifted) else {
        return Ok(None);
    };
    let supplier = coord.runtime_index(index);

    Ok((supplier.is_some() && supplier == master.index_of(value.run)).then_some(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BuildConfig,
        consolidate::share::AxisSharer,
        testing::{self, hours, Rec},
        value::TimeValue,
    };

    fn forecast() -> (Vec<Rec>, CoordinateSystem<Rec>) {
        // Two runs six hours apart, each forecasting 0, 6 and 12 hours out
        let records = testing::grid(&[0, 6], &[0, 6, 12], &[500.0]);
        let coordsys = testing::coordsys_2d(&records);

        (records, coordsys)
    }

    #[test]
    fn test_best_group() -> Result<()> {
        let (_, coordsys) = forecast();
        let mut sharer = AxisSharer::new(BuildConfig::default());
        sharer.add_axes(coordsys.axes());
        let shared = sharer.finish()?;
        let indexes = sharer.reindex_to_shared(coordsys.axes())?;
        let master = Arc::clone(coordsys.axes()[0].as_runtime().unwrap());

        // The shared composite time axis comes after the vertical axis
        let group = make_best_group(&shared, &[indexes], master)?;
        assert_eq!(group.axes.len(), 2);
        assert_eq!(group.variables, vec![vec![1, 0]]);
        assert_eq!(group.axes[0].kind(), AxisKind::Vert);

        let best = group.axes[1].as_time().unwrap();
        assert_eq!(best.ref_date(), hours(0));
        assert_eq!(best.coords().values(), &[0, 6, 12, 18]);
        assert_eq!(best.time2runtime(), Some(&[1_u32, 2, 2, 2][..]));

        assert!(matches!(
            make_best_group(&shared, &[vec![7]], Arc::clone(&group.master)),
            Err(Error::OutOfBounds { index: 7, .. })
        ));

        Ok(())
    }

    #[test]
    fn test_best_index_keeps_latest_runtime() -> Result<()> {
        let (records, coordsys) = forecast();
        let master = Arc::clone(coordsys.axes()[0].as_runtime().unwrap());
        let group = make_best_group(coordsys.axes(), &[vec![0, 1, 2]], Arc::clone(&master))?;

        let index = best_index(&coordsys, &master, &group.axes)?;
        assert_eq!(index.shape(), &[4, 1]);
        assert_eq!(index.count_records(), 4);

        let id = |run: i64, time: i32| {
            records
                .iter()
                .find(|record| record.run == hours(run) && record.time == TimeValue::Offset(time))
                .map(|record| record.id)
        };
        let found: Vec<Option<usize>> = (0..4)
            .map(|time| index.lookup(&[time, 0]).unwrap().map(|record| record.id))
            .collect();
        assert_eq!(found, vec![id(0, 0), id(6, 0), id(6, 6), id(6, 12)]);

        Ok(())
    }

    #[test]
    fn test_best_index_dense_group() -> Result<()> {
        // Humidity starts a run later than temperature, so its best axis is measured from the
        // group's first runtime rather than its own
        let temperature = testing::coordsys_2d(&testing::grid(&[0, 6], &[0, 6], &[500.0]));
        let humidity_records = testing::grid(&[6, 12], &[0, 6], &[500.0]);
        let humidity = testing::coordsys_2d(&humidity_records);

        let config = BuildConfig {
            dense: true,
            ..BuildConfig::default()
        };
        let mut sharer = AxisSharer::new(config);
        sharer.add_axes(temperature.axes());
        sharer.add_axes(humidity.axes());
        let shared = sharer.finish()?;
        let master = Arc::clone(sharer.master().unwrap());
        let variables = vec![
            sharer.reindex_to_shared(temperature.axes())?,
            sharer.reindex_to_shared(humidity.axes())?,
        ];
        let group = make_best_group(&shared, &variables, Arc::clone(&master))?;

        let best_axes: Vec<Axis> = group.variables[1]
            .iter()
            .map(|i| group.axes[*i].clone())
            .collect();
        let best = best_axes[0].as_time().unwrap();
        assert_eq!(best.ref_date(), hours(0));
        assert_eq!(best.coords().values(), &[6, 12, 18]);
        assert_eq!(best.time2runtime(), Some(&[2_u32, 3, 3][..]));

        // 06Z+6 is superseded by 12Z+0
        let index = best_index(&humidity, &master, &best_axes)?;
        assert_eq!(index.shape(), &[3, 1]);
        assert_eq!(index.count_records(), 3);
        let found: Vec<Option<usize>> = (0..3)
            .map(|time| index.lookup(&[time, 0]).unwrap().map(|record| record.id))
            .collect();
        let id = |run: i64, time: i32| {
            humidity_records
                .iter()
                .find(|record| record.run == hours(run) && record.time == TimeValue::Offset(time))
                .map(|record| record.id)
        };
        assert_eq!(found, vec![id(6, 0), id(12, 0), id(12, 6)]);

        Ok(())
    }

    #[test]
    fn test_best_index_wrong_rank() {
        let (_, coordsys) = forecast();
        let master = Arc::clone(coordsys.axes()[0].as_runtime().unwrap());
        assert!(matches!(
            best_index(&coordsys, &master, &[]),
            Err(Error::Rank { expected: 2, got: 0 })
        ));
    }
}
