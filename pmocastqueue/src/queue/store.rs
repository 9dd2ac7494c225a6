//! Canonical in-memory queue.
//!
//! `QueueStore` is the only place where the order of the queue and the
//! current/upcoming roles live. It is a plain data structure:
//!   - it never talks to the receiver,
//!   - it never notifies anybody,
//!   - every mutation re-derives the upcoming item from the order and the
//!     current item.
//!
//! All mutations go through the owning `QueueSynchronizer`.

use std::collections::HashSet;

use crate::errors::QueueSyncError;
use crate::model::{ItemId, ItemRole, QueueItem};
use crate::queue::diff::QueueDiff;

#[derive(Clone, Debug, Default)]
pub struct QueueStore {
    items: Vec<QueueItem>,
    current_item_id: Option<ItemId>,
    upcoming_item_id: Option<ItemId>,
    detached: bool,
}

impl QueueStore {
    /// Creates an empty, attached store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole queue with a confirmed remote queue.
    ///
    /// Resets `detached` to false.
    pub fn load(
        &mut self,
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
    ) -> Result<(), QueueSyncError> {
        self.replace(items, current_item_id, false)
    }

    /// Replaces the whole queue with a local-only view built from a
    /// stand-alone media load.
    pub fn load_detached(
        &mut self,
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
    ) -> Result<(), QueueSyncError> {
        self.replace(items, current_item_id, true)
    }

    fn replace(
        &mut self,
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
        detached: bool,
    ) -> Result<(), QueueSyncError> {
        ensure_unique(&items)?;

        if let Some(current) = current_item_id {
            if !items.iter().any(|item| item.item_id == current) {
                return Err(QueueSyncError::invalid_state(format!(
                    "current item {} is not part of the loaded queue",
                    current
                )));
            }
        }

        self.items = items;
        self.current_item_id = current_item_id;
        self.detached = detached;
        self.recompute_upcoming();
        Ok(())
    }

    /// Empties the queue.
    pub fn clear(&mut self) {
        self.items.clear();
        self.current_item_id = None;
        self.upcoming_item_id = None;
        self.detached = false;
    }

    pub fn item_at(&self, position: usize) -> Result<&QueueItem, QueueSyncError> {
        self.items
            .get(position)
            .ok_or_else(|| QueueSyncError::out_of_range(position, self.items.len()))
    }

    pub fn position_of(&self, item_id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.item_id == item_id)
    }

    /// Moves the item at `from` so that it ends up at `to`.
    ///
    /// `from == to` is a no-op, even for positions outside the queue.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), QueueSyncError> {
        if from == to {
            return Ok(());
        }

        let len = self.items.len();
        if from >= len {
            return Err(QueueSyncError::out_of_range(from, len));
        }
        if to >= len {
            return Err(QueueSyncError::out_of_range(to, len));
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.recompute_upcoming();
        Ok(())
    }

    /// Removes and returns the item at `position`.
    ///
    /// Removing the current item clears the current role; no other item is
    /// promoted.
    pub fn remove_at(&mut self, position: usize) -> Result<QueueItem, QueueSyncError> {
        if position >= self.items.len() {
            return Err(QueueSyncError::out_of_range(position, self.items.len()));
        }

        let removed = self.items.remove(position);
        if self.current_item_id == Some(removed.item_id) {
            self.current_item_id = None;
        }
        self.recompute_upcoming();
        Ok(removed)
    }

    pub fn set_current(&mut self, item_id: ItemId) -> Result<(), QueueSyncError> {
        if self.position_of(item_id).is_none() {
            return Err(QueueSyncError::NotFound(item_id));
        }
        self.current_item_id = Some(item_id);
        self.recompute_upcoming();
        Ok(())
    }

    pub fn clear_current(&mut self) {
        self.current_item_id = None;
        self.upcoming_item_id = None;
    }

    /// Adopts a new order reported by the receiver.
    ///
    /// Items keep their identity through their id; the current role
    /// survives when its item is still present.
    pub fn reconcile(&mut self, items: Vec<QueueItem>) -> Result<QueueDiff, QueueSyncError> {
        ensure_unique(&items)?;

        let before = self.item_ids();
        let after: Vec<ItemId> = items.iter().map(|item| item.item_id).collect();
        let diff = QueueDiff::compute(&before, &after);

        self.current_item_id = self.current_item_id.filter(|id| after.contains(id));
        self.items = items;
        self.recompute_upcoming();
        Ok(diff)
    }

    pub fn set_detached(&mut self, detached: bool) {
        self.detached = detached;
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.item_id).collect()
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn current_item_id(&self) -> Option<ItemId> {
        self.current_item_id
    }

    pub fn upcoming_item_id(&self) -> Option<ItemId> {
        self.upcoming_item_id
    }

    pub fn current_item(&self) -> Option<&QueueItem> {
        self.current_item_id
            .and_then(|id| self.items.iter().find(|item| item.item_id == id))
    }

    pub fn upcoming_item(&self) -> Option<&QueueItem> {
        self.upcoming_item_id
            .and_then(|id| self.items.iter().find(|item| item.item_id == id))
    }

    pub fn current_position(&self) -> Option<usize> {
        self.current_item_id.and_then(|id| self.position_of(id))
    }

    pub fn upcoming_position(&self) -> Option<usize> {
        self.upcoming_item_id.and_then(|id| self.position_of(id))
    }

    pub fn role_of(&self, item_id: ItemId) -> ItemRole {
        if self.current_item_id == Some(item_id) {
            ItemRole::Current
        } else if self.upcoming_item_id == Some(item_id) {
            ItemRole::Upcoming
        } else {
            ItemRole::Other
        }
    }

    fn recompute_upcoming(&mut self) {
        self.upcoming_item_id = self
            .current_position()
            .and_then(|pos| self.items.get(pos + 1))
            .map(|item| item.item_id);
    }
}

fn ensure_unique(items: &[QueueItem]) -> Result<(), QueueSyncError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.item_id) {
            return Err(QueueSyncError::DuplicateItem(item.item_id));
        }
    }
    Ok(())
}
