//! Command lifecycle change notification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::Command;

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer of command lifecycle changes. Methods default to no-ops so
/// listeners implement only the events they care about.
pub trait CommandChangedListener: Send + Sync {
    fn on_command_added(&self, _command: &Command) {}
    fn on_command_updated(&self, _command: &Command) {}
    fn on_command_removed(&self, _command: &Command) {}
}

/// Fan-out of add/update/remove events to registered listeners.
///
/// Delivery is synchronous in the calling thread, in unspecified order. The
/// listener set is snapshotted before each fan-out pass, so a listener may
/// subscribe or unsubscribe listeners (including itself) during delivery
/// without affecting the current pass.
pub struct ChangeNotifier {
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn CommandChangedListener>)>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn CommandChangedListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Remove a listener. Returns false if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn notify_added(&self, command: &Command) {
        for listener in self.snapshot() {
            listener.on_command_added(command);
        }
    }

    pub fn notify_updated(&self, command: &Command) {
        for listener in self.snapshot() {
            listener.on_command_updated(command);
        }
    }

    pub fn notify_removed(&self, command: &Command) {
        for listener in self.snapshot() {
            listener.on_command_removed(command);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn CommandChangedListener>> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        added: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
    }

    impl CommandChangedListener for Recorder {
        fn on_command_added(&self, command: &Command) {
            self.added.lock().push(command.name.clone());
        }

        fn on_command_removed(&self, command: &Command) {
            self.removed.lock().push(command.name.clone());
        }
    }

    #[test]
    fn events_reach_all_listeners() {
        let notifier = ChangeNotifier::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        notifier.subscribe(a.clone());
        notifier.subscribe(b.clone());

        notifier.notify_added(&Command::new("build", "make", "custom"));

        assert_eq!(*a.added.lock(), ["build"]);
        assert_eq!(*b.added.lock(), ["build"]);
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let notifier = ChangeNotifier::new();
        let recorder = Arc::new(Recorder::default());
        let id = notifier.subscribe(recorder.clone());

        notifier.notify_added(&Command::new("one", "", "custom"));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.notify_added(&Command::new("two", "", "custom"));

        assert_eq!(*recorder.added.lock(), ["one"]);
    }

    /// A listener that unsubscribes itself while an event is being delivered.
    struct SelfRemover {
        notifier: Arc<ChangeNotifier>,
        id: Mutex<Option<SubscriptionId>>,
        seen: Mutex<Vec<String>>,
    }

    impl CommandChangedListener for SelfRemover {
        fn on_command_removed(&self, command: &Command) {
            self.seen.lock().push(command.name.clone());
            if let Some(id) = self.id.lock().take() {
                self.notifier.unsubscribe(id);
            }
        }
    }

    #[test]
    fn membership_mutation_during_delivery_does_not_affect_current_pass() {
        let notifier = Arc::new(ChangeNotifier::new());
        let remover = Arc::new(SelfRemover {
            notifier: notifier.clone(),
            id: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        });
        let observer = Arc::new(Recorder::default());

        *remover.id.lock() = Some(notifier.subscribe(remover.clone()));
        notifier.subscribe(observer.clone());

        // The remover drops out mid-delivery; the other listener still gets
        // this event, and the remover gets no further ones.
        notifier.notify_removed(&Command::new("gone", "", "custom"));
        notifier.notify_removed(&Command::new("after", "", "custom"));

        assert_eq!(*remover.seen.lock(), ["gone"]);
        assert_eq!(*observer.removed.lock(), ["gone", "after"]);
    }
}
