//! Combining axes across partitions and variables, and moving sparse indexes onto the
//! combined axes.
//!
pub mod best;
pub mod partition;
pub mod remap;
pub mod share;
pub mod union;
pub mod uniquify;

pub use best::{best_index, make_best_group, BestGroup};
pub use partition::{MergedVariable, PartitionMerger};
pub use share::AxisSharer;
pub use union::AxisUnionizer;
pub use uniquify::AxisDeduplicator;
