//! Queue synchronization engine.
//!
//! `QueueSynchronizer` owns the canonical `QueueStore` of one cast session
//! and is the only component allowed to mutate it. It sits between three
//! parties:
//!   - the user, whose intents (reorder, remove, pin, play, ...) arrive as
//!     `request_*` calls,
//!   - the receiver, reached through a `RemoteQueueClient` and heard from
//!     through `RemoteEvent`s,
//!   - the presentation layer, told about changes by the `ChangeNotifier`.
//!
//! Consistency rules:
//!   - reorders are applied optimistically and undone if the receiver
//!     refuses them,
//!   - removals and jumps only touch the local model once the receiver
//!     confirmed them,
//!   - a detached queue (local view of a stand-alone media load) never
//!     produces remote reorder/remove commands,
//!   - every full reload or remote reorder bumps a generation counter;
//!     results of commands issued under an older generation are dropped,
//!   - a new command on an item supersedes older in-flight commands on the
//!     same item.
//!
//! All methods must be called from a single execution context. See
//! `SyncRuntime` for a thread-hosted variant.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::errors::QueueSyncError;
use crate::events::{ChangeNotifier, QueueListener, Subscription, SyncFailure};
use crate::model::{
    AffectedRange, ItemId, MediaReference, OperationId, OperationKind, PlayerState, QueueItem,
    RepeatMode, SessionState,
};
use crate::queue::{QueueSnapshot, QueueStore};
use crate::remote::{RemoteEvent, RemoteQueueClient};

/// How a user intent was carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Applied to the local model only.
    Local,
    /// A remote command was issued.
    Remote(OperationId),
    /// Kept until the in-flight queue load completes.
    Deferred,
    /// Nothing to do.
    Noop,
}

/// Outcome of `request_play_item`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The item is already playing: the caller should open the full
    /// playback view instead of jumping.
    OpenPlaybackView,
    Jump(OperationId),
    /// The detached queue was promoted to a remote queue load.
    QueueLoad {
        operation: OperationId,
        start_position: usize,
    },
    Deferred,
}

/// Remote queue load issued by the synchronizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueLoadRequest {
    pub operation: OperationId,
    /// Media sent to the receiver, in queue order.
    pub items: Vec<MediaReference>,
    pub start_position: usize,
}

/// User intent kept while a queue load is in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Intent {
    Reorder { from: usize, to: usize },
    Remove { position: usize },
    Pin { position: usize },
    PlayItem(ItemId),
    PlayUpcoming,
    SkipUpcoming,
    TogglePlayback,
    SetRepeatMode(RepeatMode),
}

/// Queue load waiting for the receiver.
#[derive(Clone, Copy, Debug)]
struct LoadInFlight {
    operation: OperationId,
    /// State restored if the load fails.
    previous: SessionState,
    /// The receiver acknowledged the load command.
    accepted: bool,
}

#[derive(Clone, Debug)]
enum PendingKind {
    Jump { item_id: ItemId },
    Reorder { item_id: ItemId, from: usize, to: usize },
    Remove { item_id: ItemId },
    TogglePlayback,
    SetRepeatMode { mode: RepeatMode },
}

impl PendingKind {
    fn operation_kind(&self) -> OperationKind {
        match self {
            PendingKind::Jump { .. } => OperationKind::JumpToItem,
            PendingKind::Reorder { .. } => OperationKind::Reorder,
            PendingKind::Remove { .. } => OperationKind::Remove,
            PendingKind::TogglePlayback => OperationKind::TogglePlayback,
            PendingKind::SetRepeatMode { .. } => OperationKind::SetRepeatMode,
        }
    }

    fn item_id(&self) -> Option<ItemId> {
        match self {
            PendingKind::Jump { item_id }
            | PendingKind::Reorder { item_id, .. }
            | PendingKind::Remove { item_id } => Some(*item_id),
            _ => None,
        }
    }

    /// True if issuing `self` makes the outcome of `older` irrelevant.
    fn supersedes(&self, older: &PendingKind) -> bool {
        match (self, older) {
            (PendingKind::Jump { .. }, PendingKind::Jump { .. }) => true,
            (PendingKind::SetRepeatMode { .. }, PendingKind::SetRepeatMode { .. }) => true,
            (PendingKind::TogglePlayback, _) | (_, PendingKind::TogglePlayback) => false,
            _ => match (self.item_id(), older.item_id()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

#[derive(Clone, Debug)]
struct PendingOp {
    kind: PendingKind,
    generation: u64,
}

pub struct QueueSynchronizer<C: RemoteQueueClient> {
    client: C,
    store: QueueStore,
    state: SessionState,
    notifier: ChangeNotifier,
    pending: HashMap<OperationId, PendingOp>,
    loading: Option<LoadInFlight>,
    generation: u64,
    deferred: Option<Intent>,
    stale: bool,
    player_state: PlayerState,
    repeat_mode: RepeatMode,
    coalesce_while_loading: bool,
}

impl<C: RemoteQueueClient> QueueSynchronizer<C> {
    /// Creates the synchronizer of a new, empty session.
    pub fn new(client: C, config: &SyncConfig) -> Self {
        Self {
            client,
            store: QueueStore::new(),
            state: SessionState::Empty,
            notifier: ChangeNotifier::new(),
            pending: HashMap::new(),
            loading: None,
            generation: 0,
            deferred: None,
            stale: false,
            player_state: PlayerState::Idle,
            repeat_mode: config.queue.repeat_mode,
            coalesce_while_loading: config.queue.coalesce_while_loading,
        }
    }

    // =====================================================================
    //  READS
    // =====================================================================

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn player_state(&self) -> PlayerState {
        self.player_state
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of remote commands still waiting for a result.
    pub fn pending_operations(&self) -> usize {
        self.pending.len()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot::capture(
            &self.store,
            self.state,
            self.stale,
            self.player_state,
            self.repeat_mode,
        )
    }

    pub fn notifier(&self) -> ChangeNotifier {
        self.notifier.clone()
    }

    /// Installs the presentation listener, replacing the previous one.
    pub fn subscribe(&self, listener: impl QueueListener + 'static) -> Subscription {
        self.notifier.subscribe(listener)
    }

    // =====================================================================
    //  SESSION LIFECYCLE
    // =====================================================================

    /// Builds a local-only queue around a stand-alone media load.
    ///
    /// Anything in flight is superseded.
    pub fn begin_detached(
        &mut self,
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
    ) -> Result<(), QueueSyncError> {
        self.store.load_detached(items, current_item_id)?;
        self.state = SessionState::Detached;
        self.bump_generation();
        self.loading = None;
        self.deferred = None;

        info!(
            items = self.store.count(),
            current = ?current_item_id,
            "Detached queue built from stand-alone media load"
        );
        self.notifier.notify_changed(None);
        Ok(())
    }

    /// Issues a remote load of `media`, playback starting at `start_index`.
    pub fn request_load_queue(
        &mut self,
        media: Vec<MediaReference>,
        start_index: usize,
    ) -> Result<QueueLoadRequest, QueueSyncError> {
        if self.state == SessionState::Loading {
            return Err(QueueSyncError::invalid_state("queue load already in flight"));
        }
        if media.is_empty() {
            return Err(QueueSyncError::invalid_state("cannot load an empty queue"));
        }
        if start_index >= media.len() {
            return Err(QueueSyncError::out_of_range(start_index, media.len()));
        }
        Ok(self.issue_load(media, start_index))
    }

    /// Promotes the detached queue to a real remote queue.
    ///
    /// Playback starts at `start_item` when given, otherwise at the item
    /// that was playing when the detached queue was built.
    pub fn request_load_detached_queue(
        &mut self,
        start_item: Option<ItemId>,
    ) -> Result<QueueLoadRequest, QueueSyncError> {
        if self.state != SessionState::Detached {
            return Err(QueueSyncError::invalid_state(format!(
                "cannot promote a {} queue",
                self.state.as_str()
            )));
        }
        if self.store.is_empty() {
            return Err(QueueSyncError::invalid_state("detached queue is empty"));
        }

        let start_position = match start_item {
            Some(item_id) => self
                .store
                .position_of(item_id)
                .ok_or(QueueSyncError::NotFound(item_id))?,
            None => self.store.current_position().unwrap_or(0),
        };

        let media = self
            .store
            .items()
            .iter()
            .map(|item| item.media.clone())
            .collect();
        Ok(self.issue_load(media, start_position))
    }

    fn issue_load(&mut self, media: Vec<MediaReference>, start_position: usize) -> QueueLoadRequest {
        let previous = self.state;
        // a load supersedes every command in flight
        self.bump_generation();
        self.deferred = None;
        let operation = self
            .client
            .load_queue(&media, start_position, self.repeat_mode);
        self.loading = Some(LoadInFlight {
            operation,
            previous,
            accepted: false,
        });
        self.state = SessionState::Loading;

        info!(
            %operation,
            items = media.len(),
            start_position,
            repeat_mode = self.repeat_mode.as_str(),
            "Queue load issued"
        );

        QueueLoadRequest {
            operation,
            items: media,
            start_position,
        }
    }

    /// Tears the session down: the queue is emptied and every in-flight
    /// command is forgotten.
    pub fn end_session(&mut self) {
        self.store.clear();
        self.state = SessionState::Empty;
        self.bump_generation();
        self.loading = None;
        self.deferred = None;
        self.stale = false;
        self.player_state = PlayerState::Idle;

        info!("Queue session ended");
        self.notifier.notify_changed(None);
    }

    // =====================================================================
    //  USER INTENTS
    // =====================================================================

    pub fn request_reorder(&mut self, from: usize, to: usize) -> Result<Dispatch, QueueSyncError> {
        if self.defer_if_loading(Intent::Reorder { from, to })? {
            return Ok(Dispatch::Deferred);
        }
        if from == to {
            return Ok(Dispatch::Noop);
        }

        let item_id = self.store.item_at(from)?.item_id;
        let roles_before = self.role_positions();
        self.store.move_item(from, to)?;
        let affected = self.range_with_roles(AffectedRange::new(from, to), &roles_before);

        if self.store.is_detached() {
            debug!(%item_id, from, to, "Detached reorder applied locally");
            self.notifier.notify_changed(Some(affected));
            return Ok(Dispatch::Local);
        }

        let operation = self.client.reorder(item_id, to);
        self.track(operation, PendingKind::Reorder { item_id, from, to });
        debug!(%operation, %item_id, from, to, "Optimistic reorder issued");
        self.notifier.notify_changed(Some(affected));
        Ok(Dispatch::Remote(operation))
    }

    pub fn request_remove(&mut self, position: usize) -> Result<Dispatch, QueueSyncError> {
        if self.defer_if_loading(Intent::Remove { position })? {
            return Ok(Dispatch::Deferred);
        }

        let item_id = self.store.item_at(position)?.item_id;

        if self.store.is_detached() {
            self.remove_locally(position)?;
            debug!(%item_id, position, "Detached removal applied locally");
            return Ok(Dispatch::Local);
        }

        let operation = self.client.remove(item_id);
        self.track(operation, PendingKind::Remove { item_id });
        debug!(%operation, %item_id, position, "Remote removal issued");
        Ok(Dispatch::Remote(operation))
    }

    /// Moves the item at `position` into the upcoming slot, right after the
    /// current item (or to the head of the queue when nothing plays).
    pub fn request_pin(&mut self, position: usize) -> Result<Dispatch, QueueSyncError> {
        if self.defer_if_loading(Intent::Pin { position })? {
            return Ok(Dispatch::Deferred);
        }

        let item_id = self.store.item_at(position)?.item_id;
        let target = match self.store.current_position() {
            None => 0,
            Some(current) if current == position => return Ok(Dispatch::Noop),
            Some(current) if position < current => current,
            Some(current) => current + 1,
        };

        if target == position {
            return Ok(Dispatch::Noop);
        }
        debug!(%item_id, position, target, "Pinning item");
        self.request_reorder(position, target)
    }

    pub fn request_play_item(&mut self, item_id: ItemId) -> Result<PlayOutcome, QueueSyncError> {
        if self.defer_if_loading(Intent::PlayItem(item_id))? {
            return Ok(PlayOutcome::Deferred);
        }

        if self.store.position_of(item_id).is_none() {
            return Err(QueueSyncError::NotFound(item_id));
        }

        if self.state == SessionState::Detached {
            let load = self.request_load_detached_queue(Some(item_id))?;
            return Ok(PlayOutcome::QueueLoad {
                operation: load.operation,
                start_position: load.start_position,
            });
        }

        if self.store.current_item_id() == Some(item_id) {
            debug!(%item_id, "Selected item is already playing");
            return Ok(PlayOutcome::OpenPlaybackView);
        }

        let operation = self.client.jump_to_item(item_id);
        self.track(operation, PendingKind::Jump { item_id });
        debug!(%operation, %item_id, "Jump issued");
        Ok(PlayOutcome::Jump(operation))
    }

    pub fn request_play_upcoming(&mut self) -> Result<PlayOutcome, QueueSyncError> {
        if self.defer_if_loading(Intent::PlayUpcoming)? {
            return Ok(PlayOutcome::Deferred);
        }
        let item_id = self
            .store
            .upcoming_item_id()
            .ok_or_else(|| QueueSyncError::invalid_state("no upcoming item"))?;
        self.request_play_item(item_id)
    }

    /// Drops the upcoming item from the queue.
    pub fn request_skip_upcoming(&mut self) -> Result<Dispatch, QueueSyncError> {
        if self.defer_if_loading(Intent::SkipUpcoming)? {
            return Ok(Dispatch::Deferred);
        }
        let position = self
            .store
            .upcoming_position()
            .ok_or_else(|| QueueSyncError::invalid_state("no upcoming item"))?;
        self.request_remove(position)
    }

    pub fn request_toggle_playback(&mut self) -> Result<Dispatch, QueueSyncError> {
        if self.defer_if_loading(Intent::TogglePlayback)? {
            return Ok(Dispatch::Deferred);
        }
        let operation = self.client.toggle_playback();
        self.track(operation, PendingKind::TogglePlayback);
        debug!(%operation, "Playback toggle issued");
        Ok(Dispatch::Remote(operation))
    }

    /// Changes the repeat mode. Without a live remote queue the mode is only
    /// recorded and sent with the next load.
    pub fn request_set_repeat_mode(&mut self, mode: RepeatMode) -> Result<Dispatch, QueueSyncError> {
        if self.defer_if_loading(Intent::SetRepeatMode(mode))? {
            return Ok(Dispatch::Deferred);
        }
        if mode == self.repeat_mode {
            return Ok(Dispatch::Noop);
        }

        if self.state != SessionState::Attached {
            self.repeat_mode = mode;
            debug!(mode = mode.as_str(), "Repeat mode recorded for next load");
            return Ok(Dispatch::Local);
        }

        let operation = self.client.set_repeat_mode(mode);
        self.track(operation, PendingKind::SetRepeatMode { mode });
        debug!(%operation, mode = mode.as_str(), "Repeat mode change issued");
        Ok(Dispatch::Remote(operation))
    }

    // =====================================================================
    //  REMOTE EVENTS
    // =====================================================================

    /// Entry point for everything the receiver reports.
    ///
    /// Inconsistent remote payloads are logged and dropped; they never
    /// poison the session.
    pub fn handle_remote_event(&mut self, event: RemoteEvent) {
        let kind = event.kind();
        let result = match event {
            RemoteEvent::OperationResult { operation, success } => {
                self.on_operation_result(operation, success);
                Ok(())
            }
            RemoteEvent::QueueStateChanged {
                items,
                current_item_id,
            } => self.on_queue_state_changed(items, current_item_id),
            RemoteEvent::PlaybackStatusChanged(player_state) => {
                self.on_playback_status_changed(player_state);
                Ok(())
            }
            RemoteEvent::ConnectivityChanged { connected: true } => {
                self.on_reconnected();
                Ok(())
            }
            RemoteEvent::ConnectivityChanged { connected: false } => {
                self.on_disconnected();
                Ok(())
            }
        };

        if let Err(err) = result {
            warn!(event = kind, error = %err, "Remote event rejected");
        }
    }

    /// Routes a full queue state push to the matching handler.
    pub fn on_queue_state_changed(
        &mut self,
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
    ) -> Result<(), QueueSyncError> {
        match self.state {
            SessionState::Empty | SessionState::Loading | SessionState::Detached
                if items.is_empty() =>
            {
                debug!(state = self.state.as_str(), "Ignoring empty remote queue");
                Ok(())
            }
            SessionState::Loading if self.describes_previous_queue(&items) => {
                debug!(
                    items = items.len(),
                    "Queue state of the previous queue while loading"
                );
                self.apply_live_queue_state(items, current_item_id)
            }
            SessionState::Empty | SessionState::Loading | SessionState::Detached => {
                self.on_remote_queue_loaded(items, current_item_id)
            }
            SessionState::Attached => {
                if !self.store.is_empty() && !items.is_empty() && !self.shares_items(&items) {
                    return self.on_remote_queue_loaded(items, current_item_id);
                }
                self.apply_live_queue_state(items, current_item_id)
            }
        }
    }

    /// While loading, receivers keep reporting the queue being replaced.
    /// A push sharing ids with that queue only completes the load once the
    /// receiver acknowledged the load command.
    fn describes_previous_queue(&self, items: &[QueueItem]) -> bool {
        let accepted = self.loading.is_some_and(|load| load.accepted);
        !accepted && !self.store.is_detached() && self.shares_items(items)
    }

    fn shares_items(&self, items: &[QueueItem]) -> bool {
        items
            .iter()
            .any(|item| self.store.position_of(item.item_id).is_some())
    }

    /// Applies a push describing the queue already mirrored locally.
    fn apply_live_queue_state(
        &mut self,
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
    ) -> Result<(), QueueSyncError> {
        let same_order = self.store.count() == items.len()
            && self
                .store
                .items()
                .iter()
                .zip(&items)
                .all(|(local, remote)| local.item_id == remote.item_id);
        if !same_order {
            self.on_remote_queue_mutated(items)?;
        }
        if current_item_id != self.store.current_item_id() {
            self.on_remote_item_changed(current_item_id)?;
        }
        Ok(())
    }

    /// The receiver confirmed a whole new queue.
    pub fn on_remote_queue_loaded(
        &mut self,
        items: Vec<QueueItem>,
        current_item_id: Option<ItemId>,
    ) -> Result<(), QueueSyncError> {
        self.store.load(items, current_item_id)?;
        let was_loading = self.state == SessionState::Loading;
        self.state = SessionState::Attached;
        self.bump_generation();
        self.loading = None;

        info!(
            items = self.store.count(),
            current = ?current_item_id,
            was_loading,
            "Remote queue loaded"
        );
        self.notifier.notify_changed(None);
        self.replay_deferred();
        Ok(())
    }

    /// The receiver moved to another item (or to none).
    pub fn on_remote_item_changed(
        &mut self,
        current_item_id: Option<ItemId>,
    ) -> Result<(), QueueSyncError> {
        let roles_before = self.role_positions();
        match current_item_id {
            Some(item_id) => self.store.set_current(item_id)?,
            None => self.store.clear_current(),
        }

        debug!(
            current = ?current_item_id,
            upcoming = ?self.store.upcoming_item_id(),
            "Remote current item changed"
        );

        let affected =
            AffectedRange::covering(roles_before.into_iter().chain(self.role_positions()));
        if affected.is_some() {
            self.notifier.notify_changed(affected);
        }
        Ok(())
    }

    /// The receiver reported a new order for the live queue.
    ///
    /// The remote order always wins: optimistic local state that disagrees
    /// is dropped and results of older commands are ignored from now on.
    pub fn on_remote_queue_mutated(
        &mut self,
        updated_order: Vec<QueueItem>,
    ) -> Result<(), QueueSyncError> {
        let live = match self.state {
            SessionState::Attached => true,
            SessionState::Loading => !self.store.is_detached(),
            SessionState::Empty | SessionState::Detached => false,
        };
        if !live {
            return Err(QueueSyncError::invalid_state(format!(
                "remote reorder on a {} queue",
                self.state.as_str()
            )));
        }

        let roles_before = self.role_positions();
        let diff = self.store.reconcile(updated_order)?;
        self.bump_generation();

        debug!(
            keep = diff.kept,
            placed = diff.placed.len(),
            displaced = diff.displaced.len(),
            "Remote queue order reconciled"
        );

        let Some(span) = diff.span else {
            return Ok(());
        };
        let affected = self.range_with_roles(span, &roles_before);
        self.notifier.notify_changed(Some(affected));
        Ok(())
    }

    /// Connection lost: the queue is kept but marked stale.
    pub fn on_disconnected(&mut self) {
        if self.stale {
            return;
        }
        self.stale = true;
        info!(
            pending = self.pending.len(),
            "Receiver disconnected, queue marked stale"
        );
        self.notifier.notify_stale(true);
    }

    pub fn on_reconnected(&mut self) {
        if !self.stale {
            return;
        }
        self.stale = false;
        info!("Receiver reconnected");
        self.notifier.notify_stale(false);
    }

    pub fn on_playback_status_changed(&mut self, player_state: PlayerState) {
        if player_state == self.player_state {
            return;
        }
        self.player_state = player_state;
        if let Some(position) = self.store.current_position() {
            self.notifier
                .notify_changed(Some(AffectedRange::single(position)));
        }
    }

    /// Resolves a command issued earlier.
    pub fn on_operation_result(&mut self, operation: OperationId, success: bool) {
        if let Some(load) = self.loading.filter(|load| load.operation == operation) {
            self.on_load_result(load, success);
            return;
        }

        let Some(op) = self.pending.remove(&operation) else {
            debug!(%operation, success, "Ignoring result of unknown or superseded operation");
            return;
        };

        if op.generation != self.generation {
            debug!(
                %operation,
                success,
                op_generation = op.generation,
                generation = self.generation,
                "Discarding late result from an older queue generation"
            );
            return;
        }

        let kind = op.kind.operation_kind();
        if success {
            self.apply_confirmation(operation, op.kind);
            return;
        }

        warn!(%operation, kind = kind.as_str(), "Remote operation failed");
        let item_id = op.kind.item_id();
        let rolled_back = self.apply_failure(op.kind);
        self.notifier.notify_sync_failure(&SyncFailure {
            operation,
            kind,
            item_id,
            rolled_back,
        });
    }

    fn on_load_result(&mut self, load: LoadInFlight, success: bool) {
        let operation = load.operation;
        if success {
            debug!(%operation, "Queue load accepted, waiting for receiver queue state");
            self.loading = Some(LoadInFlight {
                accepted: true,
                ..load
            });
            return;
        }

        warn!(%operation, restored = load.previous.as_str(), "Queue load failed");
        self.loading = None;
        self.state = load.previous;
        self.notifier.notify_sync_failure(&SyncFailure {
            operation,
            kind: OperationKind::LoadQueue,
            item_id: None,
            rolled_back: false,
        });
        self.replay_deferred();
    }

    fn apply_confirmation(&mut self, operation: OperationId, kind: PendingKind) {
        match kind {
            PendingKind::Remove { item_id } => match self.store.position_of(item_id) {
                Some(position) => {
                    if let Err(err) = self.remove_locally(position) {
                        warn!(%operation, %item_id, error = %err, "Confirmed removal not applied");
                    }
                }
                None => debug!(%operation, %item_id, "Confirmed removal of an absent item"),
            },
            PendingKind::SetRepeatMode { mode } => {
                self.repeat_mode = mode;
                debug!(%operation, mode = mode.as_str(), "Repeat mode confirmed");
            }
            PendingKind::Jump { .. } | PendingKind::Reorder { .. } | PendingKind::TogglePlayback => {}
        }
    }

    /// Undoes what a failed command changed locally. Returns whether
    /// anything was rolled back.
    fn apply_failure(&mut self, kind: PendingKind) -> bool {
        match kind {
            PendingKind::Reorder { item_id, from, to } => {
                let Some(position) = self.store.position_of(item_id) else {
                    return false;
                };
                let target = from.min(self.store.count().saturating_sub(1));
                let roles_before = self.role_positions();
                if self.store.move_item(position, target).is_err() {
                    return false;
                }
                debug!(%item_id, from, to, "Optimistic reorder rolled back");
                let affected = self.range_with_roles(AffectedRange::new(position, target), &roles_before);
                self.notifier.notify_changed(Some(affected));
                true
            }
            PendingKind::Jump { .. }
            | PendingKind::Remove { .. }
            | PendingKind::TogglePlayback
            | PendingKind::SetRepeatMode { .. } => false,
        }
    }

    // =====================================================================
    //  INTERNALS
    // =====================================================================

    fn track(&mut self, operation: OperationId, kind: PendingKind) {
        let superseded: Vec<OperationId> = self
            .pending
            .iter()
            .filter(|(_, op)| kind.supersedes(&op.kind))
            .map(|(id, _)| *id)
            .collect();

        for id in superseded {
            self.pending.remove(&id);
            debug!(superseded = %id, by = %operation, "In-flight operation superseded");
        }

        self.pending.insert(
            operation,
            PendingOp {
                kind,
                generation: self.generation,
            },
        );
    }

    /// Starts a new queue generation. Commands issued before can no longer
    /// be resolved and are forgotten.
    fn bump_generation(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        self.pending.retain(|_, op| op.generation == generation);
    }

    /// Returns true when `intent` was kept for later because a load is in
    /// flight.
    fn defer_if_loading(&mut self, intent: Intent) -> Result<bool, QueueSyncError> {
        if self.state != SessionState::Loading {
            return Ok(false);
        }
        if !self.coalesce_while_loading {
            return Err(QueueSyncError::invalid_state("queue load in flight"));
        }
        if let Some(dropped) = self.deferred.replace(intent) {
            debug!(?dropped, "Coalescing deferred request");
        }
        Ok(true)
    }

    fn replay_deferred(&mut self) {
        let Some(intent) = self.deferred.take() else {
            return;
        };
        debug!(?intent, "Replaying deferred request");

        let result = match intent.clone() {
            Intent::Reorder { from, to } => self.request_reorder(from, to).map(|_| ()),
            Intent::Remove { position } => self.request_remove(position).map(|_| ()),
            Intent::Pin { position } => self.request_pin(position).map(|_| ()),
            Intent::PlayItem(item_id) => self.request_play_item(item_id).map(|_| ()),
            Intent::PlayUpcoming => self.request_play_upcoming().map(|_| ()),
            Intent::SkipUpcoming => self.request_skip_upcoming().map(|_| ()),
            Intent::TogglePlayback => self.request_toggle_playback().map(|_| ()),
            Intent::SetRepeatMode(mode) => self.request_set_repeat_mode(mode).map(|_| ()),
        };

        if let Err(err) = result {
            warn!(?intent, error = %err, "Deferred request no longer applies");
        }
    }

    fn remove_locally(&mut self, position: usize) -> Result<QueueItem, QueueSyncError> {
        let len_before = self.store.count();
        let roles_before = self.role_positions();
        let removed = self.store.remove_at(position)?;
        let affected = self.range_with_roles(
            AffectedRange::new(position, len_before.saturating_sub(1)),
            &roles_before,
        );
        self.notifier.notify_changed(Some(affected));
        Ok(removed)
    }

    fn role_positions(&self) -> Vec<usize> {
        [self.store.current_position(), self.store.upcoming_position()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Widens `range` to the current/upcoming rows before and after a
    /// mutation, since their decoration changes with them.
    fn range_with_roles(&self, range: AffectedRange, roles_before: &[usize]) -> AffectedRange {
        roles_before
            .iter()
            .copied()
            .chain(self.role_positions())
            .fold(range, AffectedRange::including)
    }
}
