use serde::Serialize;

use crate::model::{ItemId, ItemRole, PlayerState, QueueItem, RepeatMode, SessionState};
use crate::queue::QueueStore;

/// One row of the presented queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotRow {
    pub item: QueueItem,
    pub role: ItemRole,
}

/// Read-only view of the queue handed to the presentation layer.
///
/// This is a copy: it stays valid after the synchronizer moves on, but it
/// describes the queue as of the notification that produced it and must be
/// refreshed on the next change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    /// All items in play order, tagged with their role.
    pub rows: Vec<SnapshotRow>,
    pub current_item_id: Option<ItemId>,
    pub upcoming_item_id: Option<ItemId>,
    pub state: SessionState,
    pub detached: bool,
    /// True while the receiver is unreachable; interaction should be dimmed.
    pub stale: bool,
    pub player_state: PlayerState,
    pub repeat_mode: RepeatMode,
}

impl QueueSnapshot {
    pub(crate) fn capture(
        store: &QueueStore,
        state: SessionState,
        stale: bool,
        player_state: PlayerState,
        repeat_mode: RepeatMode,
    ) -> Self {
        let rows = store
            .items()
            .iter()
            .map(|item| SnapshotRow {
                role: store.role_of(item.item_id),
                item: item.clone(),
            })
            .collect();

        Self {
            rows,
            current_item_id: store.current_item_id(),
            upcoming_item_id: store.upcoming_item_id(),
            state,
            detached: store.is_detached(),
            stale,
            player_state,
            repeat_mode,
        }
    }

    /// Returns the number of rows in the snapshot.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the snapshot contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.rows.iter().map(|row| row.item.item_id).collect()
    }

    pub fn current_position(&self) -> Option<usize> {
        self.rows.iter().position(|row| row.role == ItemRole::Current)
    }

    /// JSON form handed to web front ends.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
