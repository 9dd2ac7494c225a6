mod diff;
mod snapshot;
mod store;

pub use diff::QueueDiff;
pub use snapshot::{QueueSnapshot, SnapshotRow};
pub use store::QueueStore;
