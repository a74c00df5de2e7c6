//! Collapsing exact duplicate axes to single instances.
//!
use std::collections::HashMap;

use crate::{
    axis::Axis,
    coordsys::CoordinateSystem,
    errors::{Error, Result},
    sparse::SparseIndex,
};

use super::remap;

/// Keeps one instance of each distinct axis. Axes are never extended: only value equal axes
/// are merged.
///
#[derive(Default)]
pub struct AxisDeduplicator {
    unique: Vec<Axis>,
    lookup: HashMap<Axis, usize>,
}

impl AxisDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the unique axis equal to `axis`, adding it if it's new.
    ///
    pub fn add_axis(&mut self, axis: &Axis) -> usize {
        if let Some(index) = self.lookup.get(axis) {
            return *index;
        }
        let index = self.unique.len();
        self.unique.push(axis.clone());
        self.lookup.insert(axis.clone(), index);

        index
    }

    pub fn add_axes(&mut self, axes: &[Axis]) -> Vec<usize> {
        axes.iter().map(|axis| self.add_axis(axis)).collect()
    }

    pub fn len(&self) -> usize {
        self.unique.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }

    /// The unique axes, in the order they were first added.
    ///
    pub fn finish(&self) -> Vec<Axis> {
        self.unique.clone()
    }

    /// The unique instance equal to `axis`.
    ///
    pub fn get(&self, axis: &Axis) -> Option<&Axis> {
        self.lookup.get(axis).map(|index| &self.unique[*index])
    }

    pub fn index_of(&self, axis: &Axis) -> Option<usize> {
        self.lookup.get(axis).copied()
    }

    /// Index of the unique axis for each of `axes`, which must all have been added.
    ///
    pub fn reindex_to_unique(&self, axes: &[Axis]) -> Result<Vec<usize>> {
        axes.iter()
            .map(|axis| self.index_of(axis).ok_or(Error::MissingAxis(axis.kind())))
            .collect()
    }

    /// Rebuild a coordinate system's index along the unique instances of its axes.
    ///
    /// The unique instances are value equal to the originals, so every dimension is remapped
    /// as identity.
    ///
    pub fn reindex<R: Clone>(&self, coordsys: &CoordinateSystem<R>) -> Result<SparseIndex<R>> {
        let index = coordsys.try_index()?;
        let axes: Vec<Axis> = self
            .reindex_to_unique(coordsys.axes())?
            .into_iter()
            .map(|index| self.unique[index].clone())
            .collect();
        let remaps = remap::plan(coordsys.axes(), &axes)?;
        let shape = axes.iter().map(Axis::dim).collect();

        index.reindex(shape, &remaps)
    }
}
