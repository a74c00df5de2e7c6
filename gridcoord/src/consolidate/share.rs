//! Sharing axes between the variables of a group.
//!
use std::{collections::HashMap, sync::Arc};

use crate::{
    axis::{Axis, RuntimeAxis},
    builder::RuntimeValues,
    config::BuildConfig,
    coordsys::CoordinateSystem,
    errors::{Error, Result},
    sparse::SparseIndex,
    time2d::Time2DValues,
};

use super::{remap, uniquify::AxisDeduplicator};

/// Makes a shared set of axes from the axes of several variables.
///
/// Without `dense`, value equal axes collapse to a single instance and composite time axes
/// reference the shared instance of their runtime axis. With `dense`, every runtime axis is
/// replaced by one master runtime axis holding all runtimes, and every composite time axis is
/// rebuilt over the master runtime. Other axes are shared by value in both modes.
///
pub struct AxisSharer {
    config: BuildConfig,
    pending: Vec<Axis>,
    shared: Option<Vec<Axis>>,
    master: Option<Arc<RuntimeAxis>>,
    lookup: HashMap<Axis, usize>,
}

impl AxisSharer {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            pending: vec![],
            shared: None,
            master: None,
            lookup: HashMap::new(),
        }
    }

    pub fn is_dense(&self) -> bool {
        self.config.dense
    }

    /// Add the axes of one variable.
    ///
    pub fn add_axes(&mut self, axes: &[Axis]) {
        self.pending.extend(axes.iter().cloned());
    }

    /// Make the shared axes. Without `dense`, composite time axes come after every other
    /// shared axis.
    ///
    pub fn finish(&mut self) -> Result<Vec<Axis>> {
        let pending = std::mem::take(&mut self.pending);
        let mut dedup = AxisDeduplicator::new();
        let mut lookup = HashMap::new();

        if self.config.dense {
            let master = self.make_master(&pending);
            for axis in &pending {
                let shared = self.densify(axis, master.as_ref())?;
                lookup.insert(axis.clone(), dedup.add_axis(&shared));
            }
            self.master = master;
        } else {
            for axis in pending.iter().filter(|axis| axis.as_time2d().is_none()) {
                lookup.insert(axis.clone(), dedup.add_axis(axis));
            }
            for axis in pending.iter().filter_map(|axis| axis.as_time2d()) {
                let runtime = Axis::Runtime(Arc::clone(axis.runtime()));
                let shared = match dedup.get(&runtime).and_then(Axis::as_runtime) {
                    Some(runtime) if !Arc::ptr_eq(runtime, axis.runtime()) => {
                        Axis::from(axis.with_runtime(Arc::clone(runtime)))
                    }
                    _ => Axis::Time2D(Arc::clone(axis)),
                };
                lookup.insert(Axis::Time2D(Arc::clone(axis)), dedup.add_axis(&shared));
            }
            self.master = None;
        }

        let shared = dedup.finish();
        tracing::debug!(
            dense = self.config.dense,
            shared = shared.len(),
            "shared axes made"
        );
        self.lookup = lookup;
        self.shared = Some(shared.clone());

        Ok(shared)
    }

    fn make_master(&self, axes: &[Axis]) -> Option<Arc<RuntimeAxis>> {
        let mut values: Option<RuntimeValues> = None;
        for runtime in axes.iter().filter_map(Axis::as_runtime) {
            values
                .get_or_insert_with(|| RuntimeValues::new(runtime.code(), runtime.unit()))
                .add_axis(runtime);
        }

        values.map(|values| Arc::new(values.build()))
    }

    /// The shared form of `axis` when every runtime is replaced by `master`.
    ///
    fn densify(&self, axis: &Axis, master: Option<&Arc<RuntimeAxis>>) -> Result<Axis> {
        let Some(master) = master else {
            return Ok(axis.clone());
        };
        let shared = match axis {
            Axis::Runtime(_) => Axis::Runtime(Arc::clone(master)),
            Axis::Time2D(time2d) => {
                let mut values =
                    Time2DValues::new(time2d.code(), time2d.unit(), time2d.is_interval());
                values.add_all(time2d);
                for run in master.coords().iter() {
                    values.add_run(*run);
                }
                let dense = values.finish(self.config.regularize)?;
                Axis::from(dense.with_runtime(Arc::clone(master)))
            }
            axis => axis.clone(),
        };

        Ok(shared)
    }

    pub fn shared(&self) -> Option<&[Axis]> {
        self.shared.as_deref()
    }

    /// The master runtime axis, in dense mode.
    ///
    pub fn master(&self) -> Option<&Arc<RuntimeAxis>> {
        self.master.as_ref()
    }

    /// Index of the shared axis for each of `axes`, which must all have been added.
    ///
    pub fn reindex_to_shared(&self, axes: &[Axis]) -> Result<Vec<usize>> {
        if self.shared.is_none() {
            return Err(Error::Unfinished);
        }
        axes.iter()
            .map(|axis| {
                self.lookup
                    .get(axis)
                    .copied()
                    .ok_or(Error::MissingAxis(axis.kind()))
            })
            .collect()
    }

    /// Move a variable's sparse index onto its shared axes.
    ///
    pub fn reindex<R: Clone>(&self, coordsys: &CoordinateSystem<R>) -> Result<SparseIndex<R>> {
        let shared = self.shared.as_ref().ok_or(Error::Unfinished)?;
        let index = coordsys.try_index()?;
        let axes: Vec<Axis> = self
            .reindex_to_shared(coordsys.axes())?
            .into_iter()
            .map(|index| shared[index].clone())
            .collect();
        let remaps = remap::plan(coordsys.axes(), &axes)?;
        let shape = axes.iter().map(Axis::dim).collect();

        index.reindex(shape, &remaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, hours, Rec};

    fn temperature() -> (Vec<Rec>, CoordinateSystem<Rec>) {
        let records = testing::grid(&[0, 6], &[0, 6], &[500.0, 850.0]);
        let coordsys = testing::coordsys_2d(&records);
        (records, coordsys)
    }

    fn humidity() -> (Vec<Rec>, CoordinateSystem<Rec>) {
        let records = testing::grid(&[6, 12], &[0, 6], &[500.0, 850.0]);
        let coordsys = testing::coordsys_2d(&records);
        (records, coordsys)
    }

    fn wind() -> (Vec<Rec>, CoordinateSystem<Rec>) {
        let records = testing::grid(&[0, 6], &[0, 6], &[250.0, 500.0, 850.0]);
        let coordsys = testing::coordsys_2d(&records);
        (records, coordsys)
    }

    #[test]
    fn test_equal_axes_share_an_index() -> Result<()> {
        let (_, temperature) = temperature();
        let (_, wind) = wind();
        let mut sharer = AxisSharer::new(BuildConfig::default());
        sharer.add_axes(temperature.axes());
        sharer.add_axes(wind.axes());
        let shared = sharer.finish()?;

        let t = sharer.reindex_to_shared(temperature.axes())?;
        let w = sharer.reindex_to_shared(wind.axes())?;
        assert_eq!(shared.len(), 4);
        assert_eq!(t[0], w[0]);
        assert_eq!(t[1], w[1]);
        assert_ne!(t[2], w[2]);
        assert_eq!(shared[t[2]].len(), 2);
        assert_eq!(shared[w[2]].len(), 3);

        // The shared composite axis references the shared runtime instance
        let runtime = shared[t[0]].as_runtime().unwrap();
        let time2d = shared[t[1]].as_time2d().unwrap();
        assert!(Arc::ptr_eq(time2d.runtime(), runtime));
        assert!(sharer.master().is_none());

        Ok(())
    }

    #[test]
    fn test_exact_reindex_is_identity() -> Result<()> {
        let (records, temperature) = temperature();
        let (_, wind) = wind();
        let mut sharer = AxisSharer::new(BuildConfig::default());
        sharer.add_axes(wind.axes());
        sharer.add_axes(temperature.axes());
        sharer.finish()?;

        let index = sharer.reindex(&temperature)?;
        for record in &records {
            assert_eq!(
                testing::lookup_id(temperature.axes(), &index, record),
                Some(record.id)
            );
        }

        Ok(())
    }

    #[test]
    fn test_dense_master_runtime() -> Result<()> {
        let (temperature_records, temperature) = temperature();
        let (humidity_records, humidity) = humidity();
        let config = BuildConfig {
            dense: true,
            ..BuildConfig::default()
        };
        let mut sharer = AxisSharer::new(config);
        sharer.add_axes(temperature.axes());
        sharer.add_axes(humidity.axes());
        let shared = sharer.finish()?;

        let master = Arc::clone(sharer.master().unwrap());
        assert_eq!(master.coords().values(), &[hours(0), hours(6), hours(12)]);

        let t = sharer.reindex_to_shared(temperature.axes())?;
        let h = sharer.reindex_to_shared(humidity.axes())?;
        assert_eq!(t[0], h[0]);
        assert_ne!(t[1], h[1]);
        assert_eq!(t[2], h[2]);
        assert_eq!(shared.len(), 4);
        assert!(Arc::ptr_eq(shared[t[0]].as_runtime().unwrap(), &master));
        for i in [t[1], h[1]] {
            let time2d = shared[i].as_time2d().unwrap();
            assert!(Arc::ptr_eq(time2d.runtime(), &master));
            assert_eq!(time2d.nruns(), 3);
        }

        for (coordsys, records, positions) in [
            (&temperature, &temperature_records, &t),
            (&humidity, &humidity_records, &h),
        ] {
            let index = sharer.reindex(coordsys)?;
            assert_eq!(index.shape(), &[3, 2, 2]);
            let axes: Vec<Axis> = positions.iter().map(|i| shared[*i].clone()).collect();
            for record in records {
                assert_eq!(testing::lookup_id(&axes, &index, record), Some(record.id));
            }
        }

        Ok(())
    }

    #[test]
    fn test_unknown_axis() -> Result<()> {
        let (_, temperature) = temperature();
        let (_, wind) = wind();
        let mut sharer = AxisSharer::new(BuildConfig::default());
        assert!(matches!(
            sharer.reindex_to_shared(temperature.axes()),
            Err(Error::Unfinished)
        ));
        sharer.add_axes(temperature.axes());
        sharer.finish()?;
        assert!(matches!(
            sharer.reindex_to_shared(wind.axes()),
            Err(Error::MissingAxis(_))
        ));

        Ok(())
    }
}
