use thiserror::Error;

use crate::model::ItemId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueSyncError {
    #[error("Position {position} out of range (queue length {len})")]
    OutOfRange { position: usize, len: usize },
    #[error("Item {0} not found in queue")]
    NotFound(ItemId),
    #[error("Item {0} appears more than once in queue")]
    DuplicateItem(ItemId),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Queue synchronizer runtime is stopped")]
    RuntimeStopped,
    #[error("Queue synchronizer runtime error: {0}")]
    Runtime(String),
}

impl QueueSyncError {
    pub fn out_of_range(position: usize, len: usize) -> Self {
        QueueSyncError::OutOfRange { position, len }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        QueueSyncError::InvalidState(message.into())
    }
}
