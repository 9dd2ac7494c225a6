//! Change notification towards the presentation layer.
//!
//! A queue view has exactly one owner, so the notifier holds at most one
//! listener. Subscribing again replaces the previous listener. The returned
//! `Subscription` releases the listener when dropped, which ties the
//! listener lifetime to the view that created it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam_channel::Sender;
use tracing::debug;

use crate::model::{AffectedRange, ItemId, OperationId, OperationKind};

/// A remote command reported failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncFailure {
    pub operation: OperationId,
    pub kind: OperationKind,
    pub item_id: Option<ItemId>,
    /// True when an optimistic local change was undone.
    pub rolled_back: bool,
}

/// Receives queue changes. Called on the synchronizer's thread.
///
/// Under a [`SyncRuntime`](crate::SyncRuntime) that thread is the worker
/// serving every [`SyncHandle`](crate::SyncHandle) call, so a callback must
/// not call into a handle: the call waits on the worker it runs on and
/// blocks forever.
pub trait QueueListener: Send {
    /// The rows in `affected` must be re-rendered; `None` means everything.
    fn on_queue_changed(&mut self, affected: Option<AffectedRange>);

    fn on_sync_failure(&mut self, _failure: &SyncFailure) {}

    fn on_stale_changed(&mut self, _stale: bool) {}
}

/// Message form of the listener callbacks, for channel based consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueNotification {
    Changed(Option<AffectedRange>),
    SyncFailed(SyncFailure),
    Stale(bool),
}

impl QueueListener for Sender<QueueNotification> {
    fn on_queue_changed(&mut self, affected: Option<AffectedRange>) {
        let _ = self.send(QueueNotification::Changed(affected));
    }

    fn on_sync_failure(&mut self, failure: &SyncFailure) {
        let _ = self.send(QueueNotification::SyncFailed(failure.clone()));
    }

    fn on_stale_changed(&mut self, stale: bool) {
        let _ = self.send(QueueNotification::Stale(stale));
    }
}

#[derive(Default)]
struct Slot {
    active_id: Option<u64>,
    /// Taken out while a callback runs.
    listener: Option<Box<dyn QueueListener>>,
}

#[derive(Default)]
struct NotifierInner {
    slot: Mutex<Slot>,
    next_id: AtomicU64,
}

impl NotifierInner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-subscriber publisher of queue changes.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `listener`, replacing any previous one.
    pub fn subscribe(&self, listener: impl QueueListener + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let replaced = {
            let mut slot = self.inner.lock();
            if let Some(previous) = slot.active_id {
                debug!(previous, id, "Replacing queue listener");
            }
            slot.active_id = Some(id);
            slot.listener.replace(Box::new(listener))
        };
        // dropped outside the lock, it may own a subscription itself
        drop(replaced);
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribes a channel and returns its receiving end.
    pub fn subscribe_channel(
        &self,
    ) -> (Subscription, crossbeam_channel::Receiver<QueueNotification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (self.subscribe(tx), rx)
    }

    /// Releases a subscription. Equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    pub fn has_subscriber(&self) -> bool {
        self.inner.lock().active_id.is_some()
    }

    pub fn notify_changed(&self, affected: Option<AffectedRange>) {
        self.dispatch(|listener| listener.on_queue_changed(affected));
    }

    pub fn notify_sync_failure(&self, failure: &SyncFailure) {
        self.dispatch(|listener| listener.on_sync_failure(failure));
    }

    pub fn notify_stale(&self, stale: bool) {
        self.dispatch(|listener| listener.on_stale_changed(stale));
    }

    // The listener runs outside the lock so it may subscribe or drop its
    // own subscription from inside a callback.
    fn dispatch(&self, call: impl FnOnce(&mut dyn QueueListener)) {
        let (id, mut listener) = {
            let mut slot = self.inner.lock();
            match (slot.active_id, slot.listener.take()) {
                (Some(id), Some(listener)) => (id, listener),
                _ => return,
            }
        };

        call(listener.as_mut());

        let mut slot = self.inner.lock();
        if slot.active_id == Some(id) && slot.listener.is_none() {
            slot.listener = Some(listener);
            return;
        }
        drop(slot);
        drop(listener);
    }
}

/// Scoped registration of a queue listener.
///
/// Dropping it removes the listener unless a newer subscription already
/// replaced it.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    inner: Weak<NotifierInner>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.lock().active_id == Some(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let released = {
            let mut slot = inner.lock();
            if slot.active_id != Some(self.id) {
                return;
            }
            slot.active_id = None;
            slot.listener.take()
        };
        drop(released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_subscriber_receives_changes() {
        let notifier = ChangeNotifier::new();
        let (_sub, rx) = notifier.subscribe_channel();

        notifier.notify_changed(Some(AffectedRange::new(1, 3)));
        notifier.notify_stale(true);

        assert_eq!(
            rx.try_recv().unwrap(),
            QueueNotification::Changed(Some(AffectedRange::new(1, 3)))
        );
        assert_eq!(rx.try_recv().unwrap(), QueueNotification::Stale(true));
    }

    #[test]
    fn resubscribing_replaces_previous_listener() {
        let notifier = ChangeNotifier::new();
        let (first, first_rx) = notifier.subscribe_channel();
        let (second, second_rx) = notifier.subscribe_channel();

        assert!(!first.is_active());
        assert!(second.is_active());

        notifier.notify_changed(None);
        assert!(first_rx.try_recv().is_err());
        assert_eq!(second_rx.try_recv().unwrap(), QueueNotification::Changed(None));

        // dropping the stale handle must not remove the newer listener
        drop(first);
        assert!(notifier.has_subscriber());
    }

    #[test]
    fn dropping_subscription_releases_listener() {
        let notifier = ChangeNotifier::new();
        let (sub, rx) = notifier.subscribe_channel();
        notifier.unsubscribe(sub);

        assert!(!notifier.has_subscriber());
        notifier.notify_changed(None);
        assert!(rx.try_recv().is_err());
    }

    struct Resubscriber {
        notifier: ChangeNotifier,
        replacement: Option<Sender<QueueNotification>>,
        kept: Arc<Mutex<Vec<Subscription>>>,
    }

    impl QueueListener for Resubscriber {
        fn on_queue_changed(&mut self, _affected: Option<AffectedRange>) {
            if let Some(tx) = self.replacement.take() {
                let sub = self.notifier.subscribe(tx);
                self.kept.lock().unwrap().push(sub);
            }
        }
    }

    #[test]
    fn listener_may_resubscribe_from_callback() {
        let notifier = ChangeNotifier::new();
        let kept = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = crossbeam_channel::unbounded();
        let _sub = notifier.subscribe(Resubscriber {
            notifier: notifier.clone(),
            replacement: Some(tx),
            kept: Arc::clone(&kept),
        });

        notifier.notify_changed(None);
        notifier.notify_changed(Some(AffectedRange::single(0)));

        assert_eq!(
            rx.try_recv().unwrap(),
            QueueNotification::Changed(Some(AffectedRange::single(0)))
        );
        assert_eq!(kept.lock().unwrap().len(), 1);
    }
}
