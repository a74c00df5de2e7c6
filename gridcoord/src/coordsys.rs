//! The coordinate system of one variable: its axes and the sparse index placing its records.
//!
use std::{
    fmt::{self, Write},
    sync::Arc,
};

use crate::{
    axis::{Axis, AxisKind},
    builder::AxisBuilder,
    config::BuildConfig,
    consolidate::remap,
    errors::{Error, Result},
    sparse::SparseIndex,
};

/// Builds the axes of a variable from its records, then indexes the records along them.
///
/// Axes are in the order their builders were added, which is also the order of the sparse
/// index's dimensions.
///
pub struct CoordinateSystem<R> {
    config: BuildConfig,
    builders: Vec<AxisBuilder<R>>,
    axes: Vec<Axis>,
    index: Option<SparseIndex<R>>,
}

impl<R> CoordinateSystem<R> {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            builders: vec![],
            axes: vec![],
            index: None,
        }
    }

    /// A finished coordinate system made from axes and an index computed elsewhere, such as by
    /// a consolidator.
    ///
    pub fn from_parts(config: BuildConfig, axes: Vec<Axis>, index: SparseIndex<R>) -> Result<Self> {
        let shape: Vec<usize> = axes.iter().map(Axis::dim).collect();
        if shape != index.shape() {
            return Err(Error::ShapeMismatch {
                expected: shape,
                got: index.shape().to_vec(),
            });
        }

        Ok(Self {
            config,
            builders: vec![],
            axes,
            index: Some(index),
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn add_builder(&mut self, builder: AxisBuilder<R>) -> &mut Self {
        self.builders.push(builder);
        self
    }

    pub fn builders(&self) -> &[AxisBuilder<R>] {
        &self.builders
    }

    /// Pass a record to every builder.
    ///
    pub fn ingest(&mut self, record: &R) {
        for builder in &mut self.builders {
            builder.ingest(record);
        }
    }

    /// Freeze every builder, in the order they were added, then index `records` along the
    /// frozen axes.
    ///
    pub fn finish<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
    {
        let mut axes = vec![];
        for builder in &mut self.builders {
            axes.push(builder.freeze(&self.config)?);
        }
        self.set_axes(axes)?;

        self.build_index(records)
    }

    /// Adopt axes computed elsewhere, one per builder in the same order, then index `records`
    /// along them.
    ///
    pub fn finish_with_axes<I>(&mut self, axes: Vec<Axis>, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
    {
        if axes.len() != self.builders.len() {
            return Err(Error::Rank {
                expected: self.builders.len(),
                got: axes.len(),
            });
        }
        for (builder, axis) in self.builders.iter_mut().zip(&axes) {
            builder.adopt(axis.clone())?;
        }
        self.set_axes(axes)?;

        self.build_index(records)
    }

    /// Make a composite time axis reference the very runtime axis of this coordinate system.
    ///
    fn set_axes(&mut self, mut axes: Vec<Axis>) -> Result<()> {
        if let Some(position) = axes.iter().position(|axis| axis.kind() == AxisKind::Time2D) {
            let runtime = axes
                .iter()
                .find_map(|axis| axis.as_runtime())
                .cloned()
                .ok_or(Error::MissingAxis(AxisKind::Runtime))?;
            if let Some(time2d) = axes[position].as_time2d() {
                if !Arc::ptr_eq(time2d.runtime(), &runtime) {
                    let linked = Axis::from(time2d.with_runtime(runtime));
                    if let Some(builder) = self.builders.get_mut(position) {
                        builder.adopt(linked.clone())?;
                    }
                    axes[position] = linked;
                }
            }
        }
        self.axes = axes;

        Ok(())
    }

    fn build_index<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
    {
        let mut index = SparseIndex::new(self.shape(), self.config.duplicates);
        for record in records {
            let tuple = self.tuple_of(&record)?;
            index.add(record, &tuple)?;
        }
        if index.ndups() > 0 {
            tracing::warn!(
                ndups = index.ndups(),
                records = index.content().len(),
                "duplicate records in coordinate system"
            );
        }
        self.index = Some(index);

        Ok(())
    }

    /// The record's tuple along the frozen axes.
    ///
    pub fn tuple_of(&self, record: &R) -> Result<Vec<usize>> {
        self.builders
            .iter()
            .map(|builder| builder.index_of_record(record))
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.index.is_some()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// First axis of the given kind.
    ///
    pub fn axis(&self, kind: AxisKind) -> Option<&Axis> {
        self.axes.iter().find(|axis| axis.kind() == kind)
    }

    pub fn index(&self) -> Option<&SparseIndex<R>> {
        self.index.as_ref()
    }

    pub fn try_index(&self) -> Result<&SparseIndex<R>> {
        self.index.as_ref().ok_or(Error::Unfinished)
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::dim).collect()
    }

    pub fn into_parts(self) -> Option<(Vec<Axis>, SparseIndex<R>)> {
        Some((self.axes, self.index?))
    }

    pub fn show_info(&self, f: &mut impl Write) -> fmt::Result {
        for axis in &self.axes {
            axis.show_info(f)?;
        }
        match &self.index {
            Some(index) => index.show(f),
            None => writeln!(f, "not finished"),
        }
    }
}

impl<R> CoordinateSystem<R>
where
    R: Clone,
{
    /// This coordinate system's index, rebuilt along `axes`, which must be of the same kinds in
    /// the same order as this coordinate system's axes.
    ///
    pub fn reindex(&self, axes: &[Axis]) -> Result<SparseIndex<R>> {
        let index = self.try_index()?;
        let remaps = remap::plan(&self.axes, axes)?;
        let shape = axes.iter().map(Axis::dim).collect();

        index.reindex(shape, &remaps)
    }
}
