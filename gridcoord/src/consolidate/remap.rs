//! Planning how the indices of old axes map onto new axes of the same kinds.
//!
use crate::{
    axis::{Axis, AxisKind, TimeAxis, TimeCoordValue},
    errors::{Error, Result},
    sparse::Remap,
    time2d::Time2DAxis,
};

/// One remap per dimension, to move a sparse index built along `old` to `new`.
///
/// Axes must be of the same kinds in the same order. A composite time axis remaps its time
/// dimension depending on the runtime dimension, so `old` must then also hold a runtime axis.
///
pub fn plan(old: &[Axis], new: &[Axis]) -> Result<Vec<Remap>> {
    if old.len() != new.len() {
        return Err(Error::Rank {
            expected: old.len(),
            got: new.len(),
        });
    }
    let run_dim = old.iter().position(|axis| axis.kind() == AxisKind::Runtime);

    old.iter()
        .zip(new)
        .map(|(old, new)| plan_axis(old, new, run_dim))
        .collect()
}

/// Remap for a single dimension. `run_dim` is the dimension of the runtime axis, needed only
/// for composite time axes.
///
pub fn plan_axis(old: &Axis, new: &Axis, run_dim: Option<usize>) -> Result<Remap> {
    if old.kind() != new.kind() {
        return Err(Error::KindMismatch {
            expected: old.kind(),
            got: new.kind(),
        });
    }
    if old.ptr_eq(new) || old == new {
        return Ok(Remap::Identity);
    }

    let remap = match (old, new) {
        (Axis::Runtime(old), Axis::Runtime(new)) => Remap::Table(
            old.coords()
                .iter()
                .map(|date| new.index_of(*date))
                .collect(),
        ),
        (Axis::Time(old), Axis::Time(new)) => Remap::Table(time_table(old, new)),
        (Axis::TimeIntv(old), Axis::TimeIntv(new)) => Remap::Table(time_table(old, new)),
        (Axis::Vert(old), Axis::Vert(new)) => Remap::Table(
            old.coords()
                .iter()
                .map(|level| new.index_of(level))
                .collect(),
        ),
        (Axis::Ens(old), Axis::Ens(new)) => Remap::Table(
            old.coords()
                .iter()
                .map(|member| new.index_of(member))
                .collect(),
        ),
        (Axis::Time2D(old), Axis::Time2D(new)) => {
            let on = run_dim.ok_or(Error::MissingAxis(AxisKind::Runtime))?;
            Remap::Dependent {
                on,
                tables: time2d_tables(old, new),
            }
        }
        _ => {
            return Err(Error::KindMismatch {
                expected: old.kind(),
                got: new.kind(),
            })
        }
    };

    Ok(remap)
}

/// Old time values are relative to the old reference date; shift them to the new one.
///
fn time_table<T: TimeCoordValue>(old: &TimeAxis<T>, new: &TimeAxis<T>) -> Vec<Option<usize>> {
    let shift = old.unit().offset(new.ref_date(), old.ref_date());
    old.coords()
        .iter()
        .map(|value| new.index_of(&value.shifted(shift)))
        .collect()
}

/// For each old runtime, the new time index of each old time index.
///
pub(crate) fn time2d_tables(old: &Time2DAxis, new: &Time2DAxis) -> Vec<Vec<Option<usize>>> {
    (0..old.nruns())
        .map(|run| {
            let ntimes = old.time_coord(run).map(|coord| coord.len()).unwrap_or(0);
            (0..ntimes)
                .map(|time| {
                    old.org_value(run, time)
                        .and_then(|value| new.find(&value))
                        .map(|(_, time)| time)
                })
                .collect()
        })
        .collect()
}
