//! Drives a queue session against an in-process loopback receiver.
//!
//! The session starts detached (one track cast from a list), gets promoted to
//! a real remote queue, then goes through a reorder, a pin, a removal and a
//! connection loss.
//!
//! Usage: `queue_session_demo [config.yaml]`

use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, unbounded};
use pmocastqueue::{
    ItemId, ItemRole, MediaReference, OperationId, OperationIds, PlayerState, QueueItem,
    QueueNotification, QueueSnapshot, RemoteEvent, RemoteQueueClient, RepeatMode, SyncConfig,
    SyncRuntime, init_logging,
};

const SETTLE: Duration = Duration::from_millis(100);

/// Receiver stand-in: applies every command to its own queue and reports
/// back like a real device would.
struct LoopbackReceiver {
    ops: OperationIds,
    next_item: u32,
    queue: Vec<QueueItem>,
    current: Option<ItemId>,
    playing: bool,
    events: Sender<RemoteEvent>,
}

impl LoopbackReceiver {
    fn new(events: Sender<RemoteEvent>) -> Self {
        Self {
            ops: OperationIds::new(),
            next_item: 100,
            queue: Vec::new(),
            current: None,
            playing: false,
            events,
        }
    }

    fn position_of(&self, item_id: ItemId) -> Option<usize> {
        self.queue.iter().position(|item| item.item_id == item_id)
    }

    fn reply(&self, success: bool) -> OperationId {
        let operation = self.ops.allocate();
        let _ = self
            .events
            .send(RemoteEvent::OperationResult { operation, success });
        if success {
            let _ = self.events.send(RemoteEvent::QueueStateChanged {
                items: self.queue.clone(),
                current_item_id: self.current,
            });
        }
        operation
    }
}

impl RemoteQueueClient for LoopbackReceiver {
    fn load_queue(
        &mut self,
        items: &[MediaReference],
        start_index: usize,
        _repeat_mode: RepeatMode,
    ) -> OperationId {
        self.queue = items
            .iter()
            .map(|media| {
                self.next_item += 1;
                QueueItem::new(ItemId(self.next_item), media.clone())
            })
            .collect();
        self.current = self.queue.get(start_index).map(|item| item.item_id);
        self.playing = true;
        let _ = self
            .events
            .send(RemoteEvent::PlaybackStatusChanged(PlayerState::Playing));
        self.reply(true)
    }

    fn jump_to_item(&mut self, item_id: ItemId) -> OperationId {
        let found = self.position_of(item_id).is_some();
        if found {
            self.current = Some(item_id);
        }
        self.reply(found)
    }

    fn reorder(&mut self, item_id: ItemId, new_index: usize) -> OperationId {
        let Some(position) = self.position_of(item_id) else {
            return self.reply(false);
        };
        let item = self.queue.remove(position);
        let target = new_index.min(self.queue.len());
        self.queue.insert(target, item);
        self.reply(true)
    }

    fn remove(&mut self, item_id: ItemId) -> OperationId {
        let Some(position) = self.position_of(item_id) else {
            return self.reply(false);
        };
        self.queue.remove(position);
        if self.current == Some(item_id) {
            self.current = self.queue.get(position).map(|item| item.item_id);
        }
        self.reply(true)
    }

    fn toggle_playback(&mut self) -> OperationId {
        self.playing = !self.playing;
        let state = if self.playing {
            PlayerState::Playing
        } else {
            PlayerState::Paused
        };
        let _ = self.events.send(RemoteEvent::PlaybackStatusChanged(state));
        self.reply(true)
    }

    fn set_repeat_mode(&mut self, _mode: RepeatMode) -> OperationId {
        self.reply(true)
    }
}

fn album() -> Vec<QueueItem> {
    [
        "Intro",
        "Blue Train",
        "Moment's Notice",
        "Locomotion",
        "I'm Old Fashioned",
    ]
    .iter()
    .zip(1u32..)
    .map(|(title, id)| {
        QueueItem::new(
            ItemId(id),
            MediaReference::new(format!("http://media.local/track/{id}.flac"))
                .with_title(*title)
                .with_subtitle("John Coltrane"),
        )
    })
    .collect()
}

fn print_queue(label: &str, snapshot: &QueueSnapshot) {
    println!(
        "\n== {label} [{}{}, {:?}]",
        snapshot.state.as_str(),
        if snapshot.stale { ", stale" } else { "" },
        snapshot.player_state
    );
    for (position, row) in snapshot.rows.iter().enumerate() {
        let marker = match row.role {
            ItemRole::Current => ">",
            ItemRole::Upcoming => "+",
            ItemRole::Other => " ",
        };
        println!(
            "{marker} {position:>2} {:>4} {}",
            row.item.item_id.to_string(),
            row.item.media.title.as_deref().unwrap_or("?")
        );
    }
}

fn main() -> Result<()> {
    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = SyncConfig::load(config_path.as_deref()).context("Failed to load config")?;
    init_logging(&config.logging.filter);

    let (event_tx, event_rx) = unbounded::<RemoteEvent>();
    let runtime = SyncRuntime::spawn(LoopbackReceiver::new(event_tx.clone()), &config)?;

    let sink = runtime.remote_events();
    thread::Builder::new()
        .name("loopback-receiver".into())
        .spawn(move || {
            for event in event_rx {
                if sink.send(event).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start loopback thread")?;

    let handle = runtime.handle();
    let (_subscription, notifications) = handle.subscribe_channel();

    handle.begin_detached(album(), Some(ItemId(1)))?;
    print_queue("detached", &handle.snapshot()?);

    let outcome = handle.request_play_item(ItemId(3))?;
    println!("play item 3 -> {outcome:?}");
    thread::sleep(SETTLE);
    print_queue("after promotion", &handle.snapshot()?);

    let last = handle.snapshot()?.len() - 1;
    println!("reorder {last} -> 0 -> {:?}", handle.request_reorder(last, 0)?);
    println!("pin 0 -> {:?}", handle.request_pin(0)?);
    println!("skip upcoming -> {:?}", handle.request_skip_upcoming()?);
    thread::sleep(SETTLE);
    print_queue("after edits", &handle.snapshot()?);

    println!("toggle -> {:?}", handle.request_toggle_playback()?);
    event_tx.send(RemoteEvent::ConnectivityChanged { connected: false })?;
    thread::sleep(SETTLE);
    let snapshot = handle.snapshot()?;
    print_queue("disconnected", &snapshot);

    let received: Vec<QueueNotification> = notifications.try_iter().collect();
    println!("\n{} notifications received", received.len());
    println!("{}", snapshot.to_json()?);

    handle.end_session()?;
    runtime.shutdown();
    Ok(())
}
