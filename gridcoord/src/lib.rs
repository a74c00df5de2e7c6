pub mod axis;
pub mod builder;
pub mod config;
pub mod consolidate;
pub mod coordsys;
pub mod errors;
pub mod extio;
mod helpers;
pub mod intern;
pub mod sparse;
pub mod time;
pub mod time2d;
pub mod value;

#[cfg(test)]
mod testing;

pub use axis::{Axis, AxisKind, AxisValue, EnsAxis, RuntimeAxis, TimeAxis, VertAxis};
pub use builder::AxisBuilder;
pub use config::{BuildConfig, DuplicatePolicy, IntervalFilter};
pub use consolidate::{
    best_index, make_best_group, AxisDeduplicator, AxisSharer, AxisUnionizer, BestGroup,
    MergedVariable, PartitionMerger,
};
pub use coordsys::CoordinateSystem;
pub use errors::{Error, Result};
pub use extio::Serialize;
pub use intern::AxisInterner;
pub use sparse::{Remap, SparseIndex};
pub use time::{CalendarDate, TimeField, TimeUnit};
pub use time2d::{Time2DAxis, Time2DLayout, Time2DValues, TimeCoord};
pub use value::{EnsMember, Interval, Level, Time2D, TimeValue};
