use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a queue entry, assigned by the receiver.
///
/// Ids are only unique within one queue generation. They are neither
/// sequential nor reusable, so nothing here derives meaning from their value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle returned by the remote client for every issued command.
///
/// Confirmations and failures are matched back to the command through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Content reference plus display metadata of a queue entry.
///
/// Immutable once the item has been enqueued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Content id or URL understood by the receiver.
    pub content_id: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// First image of the media metadata, if any.
    pub image_url: Option<String>,
}

impl MediaReference {
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            title: None,
            subtitle: None,
            image_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// One entry of the playback queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub item_id: ItemId,
    pub media: MediaReference,
}

impl QueueItem {
    pub fn new(item_id: ItemId, media: MediaReference) -> Self {
        Self { item_id, media }
    }
}

/// Receiver-side repeat behaviour sent along with queue loads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    Single,
    AllAndShuffle,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::Single => "single",
            RepeatMode::AllAndShuffle => "all_and_shuffle",
        }
    }
}

/// Player state reported by the receiver for the current item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
}

/// Lifecycle of one queue session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Empty,
    /// A remote queue load is in flight.
    Loading,
    /// Mirrors a live remote queue.
    Attached,
    /// Local view built from a stand-alone media load.
    Detached,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Loading => "loading",
            SessionState::Attached => "attached",
            SessionState::Detached => "detached",
        }
    }
}

/// Role of a row in the presented queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    Current,
    Upcoming,
    Other,
}

/// Inclusive span of rows touched by a queue change.
///
/// Bounds are expressed in the larger of the before/after layouts, so a
/// span may point past the end of a queue that shrank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedRange {
    pub start: usize,
    pub end: usize,
}

impl AffectedRange {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn single(position: usize) -> Self {
        Self::new(position, position)
    }

    /// Smallest range covering every position, or `None` if there is none.
    pub fn covering(positions: impl IntoIterator<Item = usize>) -> Option<Self> {
        positions.into_iter().fold(None, |acc, p| match acc {
            None => Some(Self::single(p)),
            Some(range) => Some(range.including(p)),
        })
    }

    pub fn including(self, position: usize) -> Self {
        Self {
            start: self.start.min(position),
            end: self.end.max(position),
        }
    }

    pub fn union(self, other: AffectedRange) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        self.start <= position && position <= self.end
    }
}

/// Kind of remote command, used to report failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    LoadQueue,
    JumpToItem,
    Reorder,
    Remove,
    TogglePlayback,
    SetRepeatMode,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::LoadQueue => "load_queue",
            OperationKind::JumpToItem => "jump_to_item",
            OperationKind::Reorder => "reorder",
            OperationKind::Remove => "remove",
            OperationKind::TogglePlayback => "toggle_playback",
            OperationKind::SetRepeatMode => "set_repeat_mode",
        }
    }
}
