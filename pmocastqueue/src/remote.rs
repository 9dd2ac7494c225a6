//! Boundary with the session/transport layer.
//!
//! The synchronizer never talks to a receiver directly. It issues commands
//! through a `RemoteQueueClient` and consumes `RemoteEvent`s. Commands are
//! fire-and-forget: the client hands back an `OperationId` immediately and
//! later reports the outcome with `RemoteEvent::OperationResult`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{ItemId, MediaReference, OperationId, PlayerState, QueueItem, RepeatMode};

/// Commands understood by a cast receiver queue.
///
/// Implementations must not block on the network; the outcome of every
/// command is delivered later as a `RemoteEvent::OperationResult` carrying
/// the returned id.
pub trait RemoteQueueClient {
    /// Loads a brand new queue on the receiver, starting playback at
    /// `start_index`.
    fn load_queue(
        &mut self,
        items: &[MediaReference],
        start_index: usize,
        repeat_mode: RepeatMode,
    ) -> OperationId;

    fn jump_to_item(&mut self, item_id: ItemId) -> OperationId;

    /// Moves `item_id` so that it ends at `new_index` in the receiver queue.
    fn reorder(&mut self, item_id: ItemId, new_index: usize) -> OperationId;

    fn remove(&mut self, item_id: ItemId) -> OperationId;

    fn toggle_playback(&mut self) -> OperationId;

    fn set_repeat_mode(&mut self, mode: RepeatMode) -> OperationId;
}

impl<C: RemoteQueueClient + ?Sized> RemoteQueueClient for Box<C> {
    fn load_queue(
        &mut self,
        items: &[MediaReference],
        start_index: usize,
        repeat_mode: RepeatMode,
    ) -> OperationId {
        (**self).load_queue(items, start_index, repeat_mode)
    }

    fn jump_to_item(&mut self, item_id: ItemId) -> OperationId {
        (**self).jump_to_item(item_id)
    }

    fn reorder(&mut self, item_id: ItemId, new_index: usize) -> OperationId {
        (**self).reorder(item_id, new_index)
    }

    fn remove(&mut self, item_id: ItemId) -> OperationId {
        (**self).remove(item_id)
    }

    fn toggle_playback(&mut self) -> OperationId {
        (**self).toggle_playback()
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) -> OperationId {
        (**self).set_repeat_mode(mode)
    }
}

/// Inbound notifications from the receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Outcome of a previously issued command.
    OperationResult {
        operation: OperationId,
        success: bool,
    },
    /// Full queue state pushed by the receiver.
    QueueStateChanged {
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
    },
    PlaybackStatusChanged(PlayerState),
    ConnectivityChanged { connected: bool },
}

impl RemoteEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteEvent::OperationResult { .. } => "operation_result",
            RemoteEvent::QueueStateChanged { .. } => "queue_state_changed",
            RemoteEvent::PlaybackStatusChanged(_) => "playback_status_changed",
            RemoteEvent::ConnectivityChanged { .. } => "connectivity_changed",
        }
    }
}

/// Monotonic operation id source for client implementations.
#[derive(Debug, Default)]
pub struct OperationIds {
    next: AtomicU64,
}

impl OperationIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> OperationId {
        OperationId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
