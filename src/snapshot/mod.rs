//! Incremental merge store for harvested records.

pub mod merge;
pub mod store;

pub use merge::{count_new, merge};
pub use store::{SnapshotError, SnapshotStore};
