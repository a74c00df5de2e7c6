//! Merging one variable's coordinate systems from several partitions.
//!
use std::sync::Arc;

use crate::{
    axis::{Axis, RuntimeAxis},
    config::BuildConfig,
    coordsys::CoordinateSystem,
    errors::Result,
    intern::AxisInterner,
    sparse::SparseIndex,
    time::TimeUnit,
};

use super::union::{link_runtime, AxisUnionizer};

/// One variable merged across partitions.
///
pub struct MergedVariable<R> {
    /// Unioned axes, in the kind order of the partitions
    pub axes: Vec<Axis>,

    /// Every partition's records placed along `axes`
    pub index: SparseIndex<R>,

    /// The unioned runtime axis, if the variable has one
    pub master: Option<Arc<RuntimeAxis>>,

    /// For each runtime of `master`, the last partition that supplied it
    pub run2part: Vec<usize>,

    /// Whether every composite time axis has at most one time per runtime
    pub all_single_time: bool,
}

impl<R> MergedVariable<R> {
    pub fn ndups(&self) -> usize {
        self.index.ndups()
    }

    /// The finished coordinate system of the merged variable.
    ///
    pub fn into_coordsys(self, config: BuildConfig) -> Result<CoordinateSystem<R>> {
        CoordinateSystem::from_parts(config, self.axes, self.index)
    }
}

/// Merges one variable's coordinate systems from partitions, given in partition order.
///
/// Records of later partitions win when two partitions place a record in the same cell.
///
pub struct PartitionMerger<'a, R> {
    variable: String,
    runtime_unit: TimeUnit,
    config: BuildConfig,
    interner: Option<&'a AxisInterner>,
    partitions: Vec<&'a CoordinateSystem<R>>,
}

impl<'a, R> PartitionMerger<'a, R>
where
    R: Clone,
{
    pub fn new(variable: impl Into<String>, runtime_unit: TimeUnit, config: BuildConfig) -> Self {
        Self {
            variable: variable.into(),
            runtime_unit,
            config,
            interner: None,
            partitions: vec![],
        }
    }

    /// Make the merged axes canonical instances of `interner`.
    ///
    pub fn with_interner(mut self, interner: &'a AxisInterner) -> Self {
        self.interner = Some(interner);
        self
    }

    pub fn add_partition(&mut self, coordsys: &'a CoordinateSystem<R>) -> &mut Self {
        self.partitions.push(coordsys);
        self
    }

    pub fn npartitions(&self) -> usize {
        self.partitions.len()
    }

    /// Every partition must be finished.
    ///
    pub fn merge(&self) -> Result<MergedVariable<R>> {
        let mut unionizer =
            AxisUnionizer::new(&self.variable, self.runtime_unit, self.config.clone());
        for partition in &self.partitions {
            partition.try_index()?;
            unionizer.add_axes(partition.axes())?;
        }
        let mut axes = unionizer.finish()?;
        if let Some(interner) = self.interner {
            // runtime first, so the composite time axis picks up its canonical instance
            for is_runtime in [true, false] {
                for axis in axes.iter_mut() {
                    if axis.as_runtime().is_some() == is_runtime {
                        *axis = interner.intern(axis.clone());
                    }
                }
            }
            link_runtime(&self.variable, &mut axes);
        }

        let shape: Vec<usize> = axes.iter().map(Axis::dim).collect();
        let mut index = SparseIndex::new(shape, self.config.duplicates);
        for partition in &self.partitions {
            index.absorb(&unionizer.reindex(partition)?)?;
        }
        if index.ndups() > 0 {
            tracing::warn!(
                variable = %self.variable,
                ndups = index.ndups(),
                partitions = self.partitions.len(),
                "duplicate records across partitions"
            );
        }

        let master = axes.iter().find_map(Axis::as_runtime).cloned();
        let run2part = match &master {
            Some(master) => self.run2part(master),
            None => {
                tracing::warn!(variable = %self.variable, "merged variable has no runtime axis");
                vec![]
            }
        };
        let all_single_time = axes
            .iter()
            .filter_map(Axis::as_time2d)
            .all(|time2d| {
                (0..time2d.nruns())
                    .all(|run| time2d.inventory(run).map(|coord| coord.len()).unwrap_or(0) <= 1)
            });

        Ok(MergedVariable {
            axes,
            index,
            master,
            run2part,
            all_single_time,
        })
    }

    fn run2part(&self, master: &RuntimeAxis) -> Vec<usize> {
        let mut run2part = vec![0; master.len()];
        for (part, partition) in self.partitions.iter().enumerate() {
            let Some(runtime) = partition.axes().iter().find_map(Axis::as_runtime) else {
                tracing::warn!(
                    variable = %self.variable,
                    partition = part,
                    "partition has no runtime axis"
                );
                continue;
            };
            for date in runtime.coords().iter() {
                if let Some(run) = master.index_of(*date) {
                    run2part[run] = part;
                }
            }
        }

        run2part
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::IntervalFilter,
        errors::Error,
        testing::{self, hours, Rec},
    };

    fn partition(runs: &[i64], times: &[i32], first_id: usize) -> (Vec<Rec>, CoordinateSystem<Rec>) {
        let mut records = testing::grid(runs, times, &[500.0, 850.0]);
        for record in &mut records {
            record.id += first_id;
        }
        let coordsys = testing::coordsys_2d(&records);

        (records, coordsys)
    }

    fn merger<'a>() -> PartitionMerger<'a, Rec> {
        PartitionMerger::new("Temperature", testing::unit(), BuildConfig::default())
    }

    #[test]
    fn test_merge_partitions() -> Result<()> {
        let (first_records, first) = partition(&[0, 6], &[0, 3], 0);
        let (second_records, second) = partition(&[12], &[0, 3], 100);
        let mut merger = merger();
        merger.add_partition(&first).add_partition(&second);
        let merged = merger.merge()?;

        assert_eq!(merged.index.shape(), &[3, 2, 2]);
        assert_eq!(merged.ndups(), 0);
        assert_eq!(merged.run2part, vec![0, 0, 1]);
        assert!(!merged.all_single_time);
        let master = merged.master.as_ref().unwrap();
        assert_eq!(master.coords().values(), &[hours(0), hours(6), hours(12)]);

        for record in first_records.iter().chain(&second_records) {
            assert_eq!(
                testing::lookup_id(&merged.axes, &merged.index, record),
                Some(record.id)
            );
        }

        let coordsys = merged.into_coordsys(BuildConfig::default())?;
        assert_eq!(coordsys.shape(), vec![3, 2, 2]);

        Ok(())
    }

    #[test]
    fn test_later_partition_wins() -> Result<()> {
        let (_, first) = partition(&[0, 6], &[0], 0);
        let (second_records, second) = partition(&[6], &[0], 100);
        let mut merger = merger();
        merger.add_partition(&first).add_partition(&second);
        let merged = merger.merge()?;

        assert_eq!(merged.ndups(), 2);
        assert_eq!(merged.run2part, vec![0, 1]);
        assert!(merged.all_single_time);
        for record in &second_records {
            assert_eq!(
                testing::lookup_id(&merged.axes, &merged.index, record),
                Some(record.id)
            );
        }

        Ok(())
    }

    #[test]
    fn test_merge_with_interner() -> Result<()> {
        let (_, first) = partition(&[0], &[0, 3], 0);
        let (_, second) = partition(&[6], &[0, 3], 100);
        let interner = AxisInterner::new();

        let mut merger = merger().with_interner(&interner);
        merger.add_partition(&first).add_partition(&second);
        let merged = merger.merge()?;
        let again = merger.merge()?;

        let master = merged.master.as_ref().unwrap();
        let time2d = merged.axes[1].as_time2d().unwrap();
        assert!(Arc::ptr_eq(time2d.runtime(), master));
        for (axis, other) in merged.axes.iter().zip(&again.axes) {
            assert!(axis.ptr_eq(other));
        }

        Ok(())
    }

    #[test]
    fn test_merge_drops_filtered_intervals() -> Result<()> {
        let accumulated = |run: i64, first_id: usize| {
            let records = vec![
                Rec::interval(first_id, run, 0, 0, 500.0),
                Rec::interval(first_id + 1, run, 0, 6, 500.0),
            ];
            let mut coordsys = CoordinateSystem::new(BuildConfig::default());
            coordsys
                .add_builder(testing::runtime_builder())
                .add_builder(testing::time_intv_builder())
                .add_builder(testing::vert_builder());
            for record in &records {
                coordsys.ingest(record);
            }
            coordsys.finish(records.iter().cloned())?;

            Ok::<_, Error>((records, coordsys))
        };
        let (first_records, first) = accumulated(0, 0)?;
        let (second_records, second) = accumulated(6, 100)?;

        let config = BuildConfig {
            interval_filter: IntervalFilter {
                exclude_zero: true,
                ..IntervalFilter::default()
            },
            ..BuildConfig::default()
        };
        let mut merger = PartitionMerger::new("Precipitation", testing::unit(), config);
        merger.add_partition(&first).add_partition(&second);
        let merged = merger.merge()?;

        assert_eq!(merged.index.shape(), &[2, 2, 1]);
        assert_eq!(merged.index.count_records(), 2);
        assert_eq!(merged.ndups(), 0);
        // Only the six hour intervals, ids 1 and 101, survive the filter
        for record in first_records.iter().chain(&second_records) {
            let expected = (record.id % 100 == 1).then_some(record.id);
            assert_eq!(
                testing::lookup_id(&merged.axes, &merged.index, record),
                expected
            );
        }

        Ok(())
    }

    #[test]
    fn test_unfinished_partition() {
        let (_, first) = partition(&[0], &[0], 0);
        let mut unfinished = CoordinateSystem::new(BuildConfig::default());
        unfinished.add_builder(testing::runtime_builder());

        let mut merger = merger();
        merger.add_partition(&first).add_partition(&unfinished);
        assert!(matches!(merger.merge(), Err(Error::Unfinished)));
    }
}
