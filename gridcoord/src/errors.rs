use std::io;
use std::result;

use thiserror::Error;

use crate::axis::AxisKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IO(#[from] io::Error),

    #[error("bad varint: {0}")]
    Varint(#[from] unsigned_varint::io::ReadError),

    #[error("wrong rank: expected {expected} indices, got {got}")]
    Rank { expected: usize, got: usize },

    #[error("index {index} out of bounds for dimension {dim} with size {size}")]
    OutOfBounds {
        dim: usize,
        index: usize,
        size: usize,
    },

    #[error("no value in target axis for index {index} of dimension {dim}")]
    Unmapped { dim: usize, index: usize },

    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("bad shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("duplicate record for cell {flat}")]
    Duplicate { flat: usize },

    #[error("{0} builder used before it was frozen")]
    NotFrozen(AxisKind),

    #[error("expected {expected} axis, got {got}")]
    KindMismatch { expected: AxisKind, got: AxisKind },

    #[error("expected one time axis per runtime ({expected}), got {got}")]
    RunCount { expected: usize, got: usize },

    #[error("coordinate system used before it was finished")]
    Unfinished,

    #[error("missing {0} axis")]
    MissingAxis(AxisKind),

    #[error("bad tag: {0}")]
    BadTag(u8),
}

pub type Result<T> = result::Result<T, Error>;
