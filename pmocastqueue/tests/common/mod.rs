#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use pmocastqueue::{
    ItemId, MediaReference, OperationId, OperationIds, QueueItem, RemoteQueueClient, RepeatMode,
};

/// Command recorded by `RecordingClient`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Load {
        content_ids: Vec<String>,
        start_index: usize,
        repeat_mode: RepeatMode,
    },
    Jump(ItemId),
    Reorder(ItemId, usize),
    Remove(ItemId),
    Toggle,
    Repeat(RepeatMode),
}

/// Fake receiver client that only records what it was asked to do.
#[derive(Clone, Default)]
pub struct RecordingClient {
    ids: Arc<OperationIds>,
    log: Arc<Mutex<Vec<(OperationId, Sent)>>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(_, sent)| sent.clone())
            .collect()
    }

    pub fn last_operation(&self) -> Option<OperationId> {
        self.log.lock().unwrap().last().map(|(op, _)| *op)
    }

    fn record(&self, sent: Sent) -> OperationId {
        let op = self.ids.allocate();
        self.log.lock().unwrap().push((op, sent));
        op
    }
}

impl RemoteQueueClient for RecordingClient {
    fn load_queue(
        &mut self,
        items: &[MediaReference],
        start_index: usize,
        repeat_mode: RepeatMode,
    ) -> OperationId {
        self.record(Sent::Load {
            content_ids: items.iter().map(|m| m.content_id.clone()).collect(),
            start_index,
            repeat_mode,
        })
    }

    fn jump_to_item(&mut self, item_id: ItemId) -> OperationId {
        self.record(Sent::Jump(item_id))
    }

    fn reorder(&mut self, item_id: ItemId, new_index: usize) -> OperationId {
        self.record(Sent::Reorder(item_id, new_index))
    }

    fn remove(&mut self, item_id: ItemId) -> OperationId {
        self.record(Sent::Remove(item_id))
    }

    fn toggle_playback(&mut self) -> OperationId {
        self.record(Sent::Toggle)
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) -> OperationId {
        self.record(Sent::Repeat(mode))
    }
}

pub fn media(id: u32) -> MediaReference {
    MediaReference::new(format!("track-{id}")).with_title(format!("Track {id}"))
}

pub fn items(ids: &[u32]) -> Vec<QueueItem> {
    ids.iter()
        .map(|id| QueueItem::new(ItemId(*id), media(*id)))
        .collect()
}

pub fn ids(raw: &[u32]) -> Vec<ItemId> {
    raw.iter().copied().map(ItemId).collect()
}
