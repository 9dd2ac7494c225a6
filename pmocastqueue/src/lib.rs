//! Cast receiver queue synchronization.
//!
//! Keeps a local, ordered model of a remote playback queue consistent with
//! what the receiver reports, while the user reorders, removes, pins and
//! plays items. Remote commands go through a [`RemoteQueueClient`]; the
//! presentation layer is told which rows to refresh through a
//! [`QueueListener`].

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod model;
pub mod queue;
pub mod remote;
pub mod runtime;
pub mod synchronizer;

pub use config::SyncConfig;
pub use errors::QueueSyncError;
pub use events::{ChangeNotifier, QueueListener, QueueNotification, Subscription, SyncFailure};
pub use logging::init_logging;
pub use model::{
    AffectedRange, ItemId, ItemRole, MediaReference, OperationId, OperationKind, PlayerState,
    QueueItem, RepeatMode, SessionState,
};
pub use queue::{QueueDiff, QueueSnapshot, QueueStore, SnapshotRow};
pub use remote::{OperationIds, RemoteEvent, RemoteQueueClient};
pub use runtime::{RemoteEventSink, SyncHandle, SyncRuntime};
pub use synchronizer::{Dispatch, PlayOutcome, QueueLoadRequest, QueueSynchronizer};
