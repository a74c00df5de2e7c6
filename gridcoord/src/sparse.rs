//! Sparse N-dimensional index from coordinate tuples to records.
//!
//! The index has one dimension per axis of a coordinate system. `track` holds a cell for every
//! possible tuple, containing the 1-based position of the cell's record in `content`, or 0 if
//! the cell is empty. Records themselves are only stored once, in the order they were added.
//!
use std::fmt::{self, Write};

use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncWrite};
use ndarray::{ArrayD, Dimension, ErrorKind, IxDyn, ShapeError};

use crate::{
    config::DuplicatePolicy,
    errors::{Error, Result},
    extio::{
        read_seq, write_seq, ExtendedAsyncRead, ExtendedAsyncWrite, Serialize, MAX_PREALLOC,
    },
};

/// How the indices of one dimension change when an index is rebuilt against new axes.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Remap {
    /// The axis is unchanged
    Identity,

    /// `table[old]` is the new index of old index `old`
    Table(Vec<Option<usize>>),

    /// The new index also depends on the old index along dimension `on`: `tables[on_index][old]`
    /// is the new index. Used for the time dimension of a composite time axis, whose values are
    /// relative to the runtime.
    Dependent {
        on: usize,
        tables: Vec<Vec<Option<usize>>>,
    },
}

impl Remap {
    fn apply(&self, dim: usize, tuple: &[usize]) -> Result<usize> {
        let index = tuple[dim];
        let mapped = match self {
            Remap::Identity => Some(index),
            Remap::Table(table) => table.get(index).copied().flatten(),
            Remap::Dependent { on, tables } => tuple
                .get(*on)
                .and_then(|run| tables.get(*run))
                .and_then(|table| table.get(index).copied().flatten()),
        };

        mapped.ok_or(Error::Unmapped { dim, index })
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Remap::Identity)
    }
}

#[derive(Clone, Debug)]
pub struct SparseIndex<R> {
    shape: Vec<usize>,
    strides: Vec<usize>,
    track: ArrayD<u32>,
    content: Vec<R>,
    ndups: usize,
    policy: DuplicatePolicy,
}

fn strides_for(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for dim in (0..shape.len().saturating_sub(1)).rev() {
        strides[dim] = strides[dim + 1] * shape[dim + 1];
    }

    strides
}

impl<R> SparseIndex<R> {
    pub fn new(shape: Vec<usize>, policy: DuplicatePolicy) -> Self {
        let track = ArrayD::zeros(IxDyn(&shape));
        let strides = strides_for(&shape);

        Self {
            shape,
            strides,
            track,
            content: vec![],
            ndups: 0,
            policy,
        }
    }

    /// Reassemble an index from its parts, as written by an external index writer.
    ///
    pub fn from_parts(
        shape: Vec<usize>,
        track: Vec<u32>,
        content: Vec<R>,
        ndups: usize,
        policy: DuplicatePolicy,
    ) -> Result<Self> {
        if let Some(bad) = track.iter().find(|pointer| **pointer as usize > content.len()) {
            return Err(Error::OutOfBounds {
                dim: 0,
                index: *bad as usize,
                size: content.len(),
            });
        }
        let track = ArrayD::from_shape_vec(IxDyn(&shape), track)?;
        let strides = strides_for(&shape);

        Ok(Self {
            shape,
            strides,
            track,
            content,
            ndups,
            policy,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of cells, occupied or not.
    ///
    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn ndups(&self) -> usize {
        self.ndups
    }

    /// Records retained, in the order they were added. Some may no longer be referenced by any
    /// cell, if a later record overwrote them.
    ///
    pub fn content(&self) -> &[R] {
        &self.content
    }

    /// Track values in row major order: 1-based positions in `content`, 0 for empty cells.
    ///
    pub fn track(&self) -> impl Iterator<Item = u32> + '_ {
        self.track.iter().copied()
    }

    /// Row major flat index of `tuple`, the last dimension varying fastest.
    ///
    pub fn flat_index(&self, tuple: &[usize]) -> Result<usize> {
        self.check(tuple)?;

        Ok(tuple
            .iter()
            .zip(&self.strides)
            .map(|(index, stride)| index * stride)
            .sum())
    }

    /// The tuple at flat index `flat`. The inverse of `flat_index`.
    ///
    pub fn tuple_of(&self, flat: usize) -> Result<Vec<usize>> {
        if flat >= self.len() {
            return Err(Error::OutOfBounds {
                dim: 0,
                index: flat,
                size: self.len(),
            });
        }

        Ok(self
            .strides
            .iter()
            .zip(&self.shape)
            .map(|(stride, size)| (flat / stride) % size)
            .collect())
    }

    fn check(&self, tuple: &[usize]) -> Result<()> {
        if tuple.len() != self.rank() {
            return Err(Error::Rank {
                expected: self.rank(),
                got: tuple.len(),
            });
        }
        for (dim, (index, size)) in tuple.iter().zip(&self.shape).enumerate() {
            if index >= size {
                return Err(Error::OutOfBounds {
                    dim,
                    index: *index,
                    size: *size,
                });
            }
        }

        Ok(())
    }

    /// Place `record` at `tuple`.
    ///
    /// If the cell is already occupied the duplicate count is incremented, and then the
    /// duplicate policy decides: `KeepLast` overwrites the cell, `KeepFirst` drops `record` and
    /// `Reject` fails with `Error::Duplicate`.
    ///
    pub fn add(&mut self, record: R, tuple: &[usize]) -> Result<()> {
        self.check(tuple)?;
        if self.collides(tuple)? {
            return Ok(());
        }
        self.content.push(record);
        self.track[IxDyn(tuple)] = self.content.len() as u32;

        Ok(())
    }

    /// Point the cell at `tuple` to an existing record, following the duplicate policy.
    ///
    fn place(&mut self, pointer: u32, tuple: &[usize]) -> Result<()> {
        if !self.collides(tuple)? {
            self.track[IxDyn(tuple)] = pointer;
        }

        Ok(())
    }

    /// Count a collision if the cell at `tuple` is occupied. Returns whether the write should be
    /// skipped.
    ///
    fn collides(&mut self, tuple: &[usize]) -> Result<bool> {
        if self.track[IxDyn(tuple)] == 0 {
            return Ok(false);
        }
        self.ndups += 1;
        match self.policy {
            DuplicatePolicy::KeepLast => Ok(false),
            DuplicatePolicy::KeepFirst => Ok(true),
            DuplicatePolicy::Reject => Err(Error::Duplicate {
                flat: self.flat_index(tuple)?,
            }),
        }
    }

    pub fn lookup(&self, tuple: &[usize]) -> Result<Option<&R>> {
        self.check(tuple)?;

        Ok(self.record(self.track[IxDyn(tuple)]))
    }

    pub fn lookup_flat(&self, flat: usize) -> Result<Option<&R>> {
        let tuple = self.tuple_of(flat)?;

        self.lookup(&tuple)
    }

    fn record(&self, pointer: u32) -> Option<&R> {
        match pointer {
            0 => None,
            pointer => self.content.get(pointer as usize - 1),
        }
    }

    /// Every occupied cell, with its tuple, in row major order.
    ///
    pub fn occupied(&self) -> impl Iterator<Item = (Vec<usize>, &R)> + '_ {
        self.track.indexed_iter().filter_map(|(index, pointer)| {
            self.record(*pointer)
                .map(|record| (index.slice().to_vec(), record))
        })
    }

    /// Number of occupied cells.
    ///
    pub fn count_records(&self) -> usize {
        self.track.iter().filter(|pointer| **pointer > 0).count()
    }

    pub fn count_missing(&self) -> usize {
        self.len() - self.count_records()
    }

    /// Fraction of cells that are occupied.
    ///
    pub fn density(&self) -> f64 {
        match self.len() {
            0 => 0.0,
            len => self.count_records() as f64 / len as f64,
        }
    }

    /// Write an occupancy map, `X` for occupied cells and `-` for empty ones, one dimension at a
    /// time. Dimensions of length 1 are skipped.
    ///
    pub fn show(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(
            f,
            "shape={:?} records={}/{} density={:.3} ndups={}",
            self.shape,
            self.count_records(),
            self.len(),
            self.density(),
            self.ndups
        )?;
        if self.is_empty() {
            return Ok(());
        }
        let dims: Vec<usize> = (0..self.rank()).filter(|dim| self.shape[*dim] > 1).collect();
        let mut tuple = vec![0; self.rank()];

        self.show_dims(f, &dims, &mut tuple, 0)
    }

    fn show_dims(
        &self,
        f: &mut impl Write,
        dims: &[usize],
        tuple: &mut Vec<usize>,
        depth: usize,
    ) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match dims {
            [] => writeln!(f, "{indent}{}", self.mark(tuple)),
            [dim] => {
                write!(f, "{indent}")?;
                for index in 0..self.shape[*dim] {
                    tuple[*dim] = index;
                    write!(f, "{}", self.mark(tuple))?;
                }
                writeln!(f)
            }
            [dim, rest @ ..] => {
                for index in 0..self.shape[*dim] {
                    tuple[*dim] = index;
                    writeln!(f, "{indent}{index}:")?;
                    self.show_dims(f, rest, tuple, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    fn mark(&self, tuple: &[usize]) -> char {
        match self.track[IxDyn(tuple)] {
            0 => '-',
            _ => 'X',
        }
    }
}

impl<R> SparseIndex<R>
where
    R: Clone,
{
    /// Rebuild this index with shape `shape`, moving every occupied cell according to the
    /// per-dimension `remaps`. Records keep their positions in `content`.
    ///
    /// Fails if an occupied cell has a coordinate that a remap has no new index for.
    ///
    pub fn reindex(&self, shape: Vec<usize>, remaps: &[Remap]) -> Result<SparseIndex<R>> {
        self.reindex_skipping(shape, remaps, |_, _| false)
    }

    /// Like `reindex`, except that an occupied cell whose coordinate along `dim` has no new
    /// index is left out, rather than failing, when `skip(dim, old_tuple)` returns `true`.
    ///
    pub fn reindex_skipping(
        &self,
        shape: Vec<usize>,
        remaps: &[Remap],
        mut skip: impl FnMut(usize, &[usize]) -> bool,
    ) -> Result<SparseIndex<R>> {
        if remaps.len() != self.rank() || shape.len() != self.rank() {
            return Err(Error::Rank {
                expected: self.rank(),
                got: remaps.len().min(shape.len()),
            });
        }
        let mut index = SparseIndex::new(shape, self.policy);
        index.content = self.content.clone();
        index.ndups = self.ndups;

        'cells: for (old, pointer) in self.track.indexed_iter() {
            if *pointer == 0 {
                continue;
            }
            let old = old.slice();
            let mut tuple = Vec::with_capacity(old.len());
            for (dim, remap) in remaps.iter().enumerate() {
                match remap.apply(dim, old) {
                    Ok(index) => tuple.push(index),
                    Err(_) if skip(dim, old) => continue 'cells,
                    Err(err) => return Err(err),
                }
            }
            index.check(&tuple)?;
            index.place(*pointer, &tuple)?;
        }

        Ok(index)
    }

    /// Add every record of `other`, which must have the same shape. Records of `other` win
    /// collisions under `KeepLast`; each collision is counted.
    ///
    pub fn absorb(&mut self, other: &SparseIndex<R>) -> Result<()> {
        if other.shape != self.shape {
            return Err(Error::ShapeMismatch {
                expected: self.shape.clone(),
                got: other.shape.clone(),
            });
        }
        self.ndups += other.ndups;
        for (tuple, record) in other.occupied() {
            self.add(record.clone(), &tuple)?;
        }

        Ok(())
    }
}

/// Written as the shape, the duplicate policy, the duplicate count, every track value in row
/// major order, then the records.
///
#[async_trait]
impl<R> Serialize for SparseIndex<R>
where
    R: Serialize + Send + Sync,
{
    async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_varint(self.rank()).await?;
        for size in &self.shape {
            stream.write_varint(*size).await?;
        }
        stream.write_byte(self.policy.tag()).await?;
        stream.write_varint(self.ndups).await?;
        let track: Vec<u32> = self.track().collect();
        for pointer in track {
            stream.write_varint(pointer as usize).await?;
        }
        write_seq(stream, &self.content).await
    }

    async fn read_from(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self> {
        let rank = stream.read_varint().await?;
        let mut shape = Vec::with_capacity(rank.min(MAX_PREALLOC));
        for _ in 0..rank {
            shape.push(stream.read_varint().await?);
        }
        let tag = stream.read_byte().await?;
        let policy = DuplicatePolicy::from_tag(tag).ok_or(Error::BadTag(tag))?;
        let ndups = stream.read_varint().await?;
        let len = shape
            .iter()
            .try_fold(1_usize, |len, size| len.checked_mul(*size))
            .ok_or_else(|| ShapeError::from_kind(ErrorKind::Overflow))?;
        let mut track = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            let pointer = stream.read_varint().await?;
            let pointer = u32::try_from(pointer).map_err(|_| Error::OutOfBounds {
                dim: 0,
                index: pointer,
                size: u32::MAX as usize,
            })?;
            track.push(pointer);
        }
        let content = read_seq(stream).await?;

        Self::from_parts(shape, track, content, ndups, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    fn index(shape: &[usize]) -> SparseIndex<&'static str> {
        SparseIndex::new(shape.to_vec(), DuplicatePolicy::KeepLast)
    }

    #[test]
    fn test_flat_index_injective() -> Result<()> {
        let index = index(&[3, 4, 2]);
        assert_eq!(index.len(), 24);
        assert_eq!(index.track().count(), 24);

        let mut seen = HashSet::new();
        for i in 0..3 {
            for j in 0..4 {
                for k in 0..2 {
                    let flat = index.flat_index(&[i, j, k])?;
                    assert!(flat < 24);
                    assert!(seen.insert(flat));
                    assert_eq!(index.tuple_of(flat)?, vec![i, j, k]);
                }
            }
        }
        assert_eq!(index.flat_index(&[0, 0, 1])?, 1);
        assert_eq!(index.flat_index(&[1, 0, 0])?, 8);

        Ok(())
    }

    #[test]
    fn test_wrong_rank() {
        let index = index(&[3, 4]);
        assert!(matches!(
            index.lookup(&[1]),
            Err(Error::Rank {
                expected: 2,
                got: 1
            })
        ));
        assert!(matches!(
            index.flat_index(&[1, 4]),
            Err(Error::OutOfBounds {
                dim: 1,
                index: 4,
                size: 4
            })
        ));
        assert!(index.tuple_of(12).is_err());
    }

    #[test]
    fn test_duplicate_keep_last() -> Result<()> {
        let mut index = index(&[2, 2]);
        index.add("a", &[0, 1])?;
        index.add("b", &[0, 1])?;
        assert_eq!(index.ndups(), 1);
        assert_eq!(index.lookup(&[0, 1])?, Some(&"b"));
        assert_eq!(index.content(), &["a", "b"]);
        assert_eq!(index.count_records(), 1);

        Ok(())
    }

    #[test]
    fn test_duplicate_keep_first() -> Result<()> {
        let mut index = SparseIndex::new(vec![2, 2], DuplicatePolicy::KeepFirst);
        index.add("a", &[1, 1])?;
        index.add("b", &[1, 1])?;
        assert_eq!(index.ndups(), 1);
        assert_eq!(index.lookup(&[1, 1])?, Some(&"a"));
        assert_eq!(index.content(), &["a"]);

        Ok(())
    }

    #[test]
    fn test_duplicate_reject() -> Result<()> {
        let mut index = SparseIndex::new(vec![2, 2], DuplicatePolicy::Reject);
        index.add("a", &[1, 0])?;
        assert!(matches!(
            index.add("b", &[1, 0]),
            Err(Error::Duplicate { flat: 2 })
        ));
        assert_eq!(index.ndups(), 1);
        assert_eq!(index.lookup(&[1, 0])?, Some(&"a"));

        Ok(())
    }

    #[test]
    fn test_lookup_and_density() -> Result<()> {
        let mut index = index(&[2, 3]);
        index.add("a", &[0, 0])?;
        index.add("b", &[1, 2])?;
        assert_eq!(index.lookup(&[0, 1])?, None);
        assert_eq!(index.lookup_flat(5)?, Some(&"b"));
        assert_eq!(index.count_records(), 2);
        assert_eq!(index.count_missing(), 4);
        assert!((index.density() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(index.track().collect::<Vec<u32>>(), vec![1, 0, 0, 0, 0, 2]);

        let occupied: Vec<(Vec<usize>, &&str)> = index.occupied().collect();
        assert_eq!(occupied, vec![(vec![0, 0], &"a"), (vec![1, 2], &"b")]);

        Ok(())
    }

    #[test]
    fn test_reindex_identity() -> Result<()> {
        let mut old = index(&[2, 3]);
        old.add("a", &[0, 2])?;
        old.add("b", &[1, 1])?;
        let new = old.reindex(vec![2, 3], &[Remap::Identity, Remap::Identity])?;
        assert_eq!(new.track().collect::<Vec<u32>>(), old.track().collect::<Vec<u32>>());
        assert_eq!(new.content(), old.content());

        Ok(())
    }

    #[test]
    fn test_reindex_table() -> Result<()> {
        let mut old = index(&[2, 2]);
        old.add("a", &[0, 0])?;
        old.add("b", &[1, 1])?;
        let remaps = [
            Remap::Table(vec![Some(1), Some(2)]),
            Remap::Table(vec![Some(0), Some(1)]),
        ];
        let new = old.reindex(vec![3, 2], &remaps)?;
        assert_eq!(new.lookup(&[1, 0])?, Some(&"a"));
        assert_eq!(new.lookup(&[2, 1])?, Some(&"b"));
        assert_eq!(new.count_records(), 2);

        Ok(())
    }

    #[test]
    fn test_reindex_dependent() -> Result<()> {
        let mut old = index(&[2, 2]);
        old.add("a", &[0, 1])?;
        old.add("b", &[1, 1])?;
        let remaps = [
            Remap::Identity,
            Remap::Dependent {
                on: 0,
                tables: vec![vec![Some(0), Some(1)], vec![Some(1), Some(2)]],
            },
        ];
        let new = old.reindex(vec![2, 3], &remaps)?;
        assert_eq!(new.lookup(&[0, 1])?, Some(&"a"));
        assert_eq!(new.lookup(&[1, 2])?, Some(&"b"));

        Ok(())
    }

    #[test]
    fn test_reindex_unmapped() -> Result<()> {
        let mut old = index(&[2, 2]);
        old.add("a", &[1, 0])?;
        let remaps = [Remap::Table(vec![Some(0), None]), Remap::Identity];
        assert!(matches!(
            old.reindex(vec![1, 2], &remaps),
            Err(Error::Unmapped { dim: 0, index: 1 })
        ));

        // Empty cells don't need a mapping
        let mut old = index(&[2, 2]);
        old.add("a", &[0, 0])?;
        assert!(old.reindex(vec![1, 2], &remaps).is_ok());

        Ok(())
    }

    #[test]
    fn test_reindex_skipping() -> Result<()> {
        let mut old = index(&[2, 2]);
        old.add("a", &[0, 1])?;
        old.add("b", &[1, 0])?;
        old.add("c", &[1, 1])?;
        let remaps = [Remap::Table(vec![Some(0), None]), Remap::Identity];

        let mut skipped = vec![];
        let new = old.reindex_skipping(vec![1, 2], &remaps, |dim, tuple| {
            skipped.push((dim, tuple.to_vec()));
            true
        })?;
        assert_eq!(skipped, vec![(0, vec![1, 0]), (0, vec![1, 1])]);
        assert_eq!(new.count_records(), 1);
        assert_eq!(new.lookup(&[0, 1])?, Some(&"a"));

        assert!(matches!(
            old.reindex_skipping(vec![1, 2], &remaps, |_, tuple| tuple[1] == 0),
            Err(Error::Unmapped { dim: 0, index: 1 })
        ));

        Ok(())
    }

    #[test]
    fn test_absorb() -> Result<()> {
        let mut first = index(&[2, 2]);
        first.add("a", &[0, 0])?;
        first.add("b", &[0, 1])?;
        let mut second = index(&[2, 2]);
        second.add("c", &[0, 1])?;
        second.add("d", &[1, 1])?;

        first.absorb(&second)?;
        assert_eq!(first.ndups(), 1);
        assert_eq!(first.lookup(&[0, 1])?, Some(&"c"));
        assert_eq!(first.lookup(&[1, 1])?, Some(&"d"));
        assert_eq!(first.count_records(), 3);

        let third = index(&[2, 3]);
        assert!(matches!(first.absorb(&third), Err(Error::ShapeMismatch { .. })));

        Ok(())
    }

    #[test]
    fn test_from_parts() -> Result<()> {
        let index = SparseIndex::from_parts(
            vec![2, 2],
            vec![0, 1, 2, 0],
            vec!["a", "b"],
            0,
            DuplicatePolicy::KeepLast,
        )?;
        assert_eq!(index.lookup(&[0, 1])?, Some(&"a"));
        assert_eq!(index.lookup(&[1, 0])?, Some(&"b"));

        assert!(SparseIndex::from_parts(
            vec![2, 2],
            vec![0, 1, 2],
            vec!["a", "b"],
            0,
            DuplicatePolicy::KeepLast,
        )
        .is_err());
        assert!(SparseIndex::from_parts(
            vec![1, 2],
            vec![0, 3],
            vec!["a", "b"],
            0,
            DuplicatePolicy::KeepLast,
        )
        .is_err());

        Ok(())
    }

    #[test]
    fn test_show_skips_unit_dimensions() -> Result<()> {
        let mut index = index(&[2, 1, 3]);
        index.add("a", &[0, 0, 1])?;
        index.add("b", &[1, 0, 2])?;
        let mut shown = String::new();
        index.show(&mut shown).unwrap();
        assert_eq!(
            shown,
            "shape=[2, 1, 3] records=2/6 density=0.333 ndups=0\n0:\n  -X-\n1:\n  --X\n"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_encode() -> Result<()> {
        let mut index: SparseIndex<u64> = SparseIndex::new(vec![2, 3], DuplicatePolicy::KeepFirst);
        index.add(1024, &[0, 2])?;
        index.add(2048, &[1, 0])?;
        index.add(4096, &[1, 0])?;

        let mut buffer: Vec<u8> = Vec::new();
        index.write_to(&mut buffer).await?;
        let read = SparseIndex::<u64>::read_from(&mut futures::io::Cursor::new(buffer)).await?;

        assert_eq!(read.shape(), &[2, 3]);
        assert_eq!(read.policy(), DuplicatePolicy::KeepFirst);
        assert_eq!(read.ndups(), 1);
        assert_eq!(read.track().collect::<Vec<u32>>(), index.track().collect::<Vec<u32>>());
        assert_eq!(read.content(), &[1024, 2048]);
        assert_eq!(read.lookup(&[1, 0])?, Some(&2048));

        Ok(())
    }

    #[tokio::test]
    async fn test_decode_overflowing_shape() -> Result<()> {
        let mut buffer: Vec<u8> = Vec::new();
        buffer.write_varint(3).await?;
        for _ in 0..3 {
            buffer.write_varint(1 << 40).await?;
        }
        buffer.write_byte(DuplicatePolicy::KeepLast.tag()).await?;
        buffer.write_varint(0).await?;

        let read = SparseIndex::<u64>::read_from(&mut futures::io::Cursor::new(buffer)).await;
        assert!(matches!(read, Err(Error::Shape(_))));

        Ok(())
    }

    #[tokio::test]
    async fn test_decode_truncated_track() -> Result<()> {
        let mut buffer: Vec<u8> = Vec::new();
        buffer.write_varint(2).await?;
        buffer.write_varint(1 << 20).await?;
        buffer.write_varint(1 << 20).await?;
        buffer.write_byte(DuplicatePolicy::KeepLast.tag()).await?;
        buffer.write_varint(0).await?;
        buffer.write_varint(1).await?;

        let read = SparseIndex::<u64>::read_from(&mut futures::io::Cursor::new(buffer)).await;
        assert!(matches!(read, Err(Error::Varint(_))));

        Ok(())
    }
}