//! Thread hosted synchronizer.
//!
//! `SyncRuntime` moves a `QueueSynchronizer` onto a dedicated worker thread
//! so user intents and receiver events are applied one at a time, in the
//! order the worker dequeues them. Callers talk to it through a cloneable
//! `SyncHandle`; the session layer pushes receiver events through a
//! `RemoteEventSink`.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::errors::QueueSyncError;
use crate::events::{ChangeNotifier, QueueListener, QueueNotification, Subscription};
use crate::model::{ItemId, MediaReference, QueueItem, RepeatMode};
use crate::queue::QueueSnapshot;
use crate::remote::{RemoteEvent, RemoteQueueClient};
use crate::synchronizer::{Dispatch, PlayOutcome, QueueLoadRequest, QueueSynchronizer};

type Command<C> = Box<dyn FnOnce(&mut QueueSynchronizer<C>) + Send>;

enum Message<C: RemoteQueueClient> {
    Run(Command<C>),
    Shutdown,
}

/// Owner of the synchronizer worker thread. Dropping it stops the worker.
pub struct SyncRuntime<C: RemoteQueueClient + Send + 'static> {
    handle: SyncHandle<C>,
    join: Option<JoinHandle<()>>,
}

impl<C: RemoteQueueClient + Send + 'static> SyncRuntime<C> {
    pub fn spawn(client: C, config: &SyncConfig) -> Result<Self, QueueSyncError> {
        let (command_tx, command_rx) = bounded::<Message<C>>(config.runtime.command_capacity);
        let (remote_tx, remote_rx) = unbounded::<RemoteEvent>();

        let synchronizer = QueueSynchronizer::new(client, config);
        let notifier = synchronizer.notifier();

        let join = thread::Builder::new()
            .name("pmocastqueue-sync".into())
            .spawn(move || run_worker(synchronizer, command_rx, remote_rx))
            .map_err(|err| QueueSyncError::Runtime(err.to_string()))?;

        info!(
            command_capacity = config.runtime.command_capacity,
            "Queue synchronizer runtime started"
        );

        Ok(Self {
            handle: SyncHandle {
                commands: command_tx,
                remote: remote_tx,
                notifier,
            },
            join: Some(join),
        })
    }

    pub fn handle(&self) -> SyncHandle<C> {
        self.handle.clone()
    }

    pub fn remote_events(&self) -> RemoteEventSink {
        self.handle.remote_events()
    }

    /// Stops the worker and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        let _ = self.handle.commands.send(Message::Shutdown);
        if join.join().is_err() {
            warn!("Queue synchronizer worker panicked");
        }
        info!("Queue synchronizer runtime stopped");
    }
}

impl<C: RemoteQueueClient + Send + 'static> Drop for SyncRuntime<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker<C: RemoteQueueClient>(
    mut synchronizer: QueueSynchronizer<C>,
    commands: Receiver<Message<C>>,
    remote: Receiver<RemoteEvent>,
) {
    debug!("Queue synchronizer worker running");
    loop {
        select! {
            recv(commands) -> message => match message {
                Ok(Message::Run(command)) => {
                    // receiver events queued before the command are applied first
                    while let Ok(event) = remote.try_recv() {
                        synchronizer.handle_remote_event(event);
                    }
                    command(&mut synchronizer);
                }
                Ok(Message::Shutdown) | Err(_) => break,
            },
            recv(remote) -> event => match event {
                Ok(event) => synchronizer.handle_remote_event(event),
                Err(_) => break,
            },
        }
    }
    debug!("Queue synchronizer worker exiting");
}

/// Pushes receiver events to the worker.
#[derive(Clone)]
pub struct RemoteEventSink {
    tx: Sender<RemoteEvent>,
}

impl RemoteEventSink {
    pub fn send(&self, event: RemoteEvent) -> Result<(), QueueSyncError> {
        self.tx
            .send(event)
            .map_err(|_| QueueSyncError::RuntimeStopped)
    }
}

/// Blocking front end of a `SyncRuntime`.
///
/// Every call waits for the worker to apply it. Once the runtime is gone
/// calls return `QueueSyncError::RuntimeStopped`.
pub struct SyncHandle<C: RemoteQueueClient> {
    commands: Sender<Message<C>>,
    remote: Sender<RemoteEvent>,
    notifier: ChangeNotifier,
}

impl<C: RemoteQueueClient> Clone for SyncHandle<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            remote: self.remote.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<C: RemoteQueueClient + 'static> SyncHandle<C> {
    /// Runs `f` on the worker thread and returns its result.
    pub fn call<R, F>(&self, f: F) -> Result<R, QueueSyncError>
    where
        R: Send + 'static,
        F: FnOnce(&mut QueueSynchronizer<C>) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded(1);
        let command: Command<C> = Box::new(move |synchronizer| {
            let _ = reply_tx.send(f(synchronizer));
        });
        self.commands
            .send(Message::Run(command))
            .map_err(|_| QueueSyncError::RuntimeStopped)?;
        reply_rx.recv().map_err(|_| QueueSyncError::RuntimeStopped)
    }

    pub fn remote_events(&self) -> RemoteEventSink {
        RemoteEventSink {
            tx: self.remote.clone(),
        }
    }

    /// Listener callbacks run on the worker thread, while it holds the
    /// synchronizer. A callback that calls back into a [`SyncHandle`] waits
    /// for itself and never returns; forward the notification instead.
    pub fn subscribe(&self, listener: impl QueueListener + 'static) -> Subscription {
        self.notifier.subscribe(listener)
    }

    /// Channel flavour of [`SyncHandle::subscribe`]. The receiving side may
    /// call back into the handle freely.
    pub fn subscribe_channel(&self) -> (Subscription, Receiver<QueueNotification>) {
        self.notifier.subscribe_channel()
    }

    pub fn snapshot(&self) -> Result<QueueSnapshot, QueueSyncError> {
        self.call(|sync| sync.snapshot())
    }

    pub fn begin_detached(
        &self,
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
    ) -> Result<(), QueueSyncError> {
        self.call(move |sync| sync.begin_detached(items, current_item_id))?
    }

    pub fn request_load_queue(
        &self,
        media: Vec<MediaReference>,
        start_index: usize,
    ) -> Result<QueueLoadRequest, QueueSyncError> {
        self.call(move |sync| sync.request_load_queue(media, start_index))?
    }

    pub fn request_load_detached_queue(
        &self,
        start_item: Option<ItemId>,
    ) -> Result<QueueLoadRequest, QueueSyncError> {
        self.call(move |sync| sync.request_load_detached_queue(start_item))?
    }

    pub fn request_reorder(&self, from: usize, to: usize) -> Result<Dispatch, QueueSyncError> {
        self.call(move |sync| sync.request_reorder(from, to))?
    }

    pub fn request_remove(&self, position: usize) -> Result<Dispatch, QueueSyncError> {
        self.call(move |sync| sync.request_remove(position))?
    }

    pub fn request_pin(&self, position: usize) -> Result<Dispatch, QueueSyncError> {
        self.call(move |sync| sync.request_pin(position))?
    }

    pub fn request_play_item(&self, item_id: ItemId) -> Result<PlayOutcome, QueueSyncError> {
        self.call(move |sync| sync.request_play_item(item_id))?
    }

    pub fn request_play_upcoming(&self) -> Result<PlayOutcome, QueueSyncError> {
        self.call(|sync| sync.request_play_upcoming())?
    }

    pub fn request_skip_upcoming(&self) -> Result<Dispatch, QueueSyncError> {
        self.call(|sync| sync.request_skip_upcoming())?
    }

    pub fn request_toggle_playback(&self) -> Result<Dispatch, QueueSyncError> {
        self.call(|sync| sync.request_toggle_playback())?
    }

    pub fn request_set_repeat_mode(&self, mode: RepeatMode) -> Result<Dispatch, QueueSyncError> {
        self.call(move |sync| sync.request_set_repeat_mode(mode))?
    }

    pub fn end_session(&self) -> Result<(), QueueSyncError> {
        self.call(|sync| sync.end_session())
    }
}
