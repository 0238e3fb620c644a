use std::sync::Arc;
use std::sync::Mutex;

use crate::middleware::EpgListener;

/// UI-side callbacks fired by the channel router.
pub trait StatusListener: Send + Sync {
    /// Present/following events have been updated.
    fn update_now_next(&self);

    /// The current event is (un)locked by its parental age rating.
    fn age_locked(&self, locked: bool);

    /// The current channel is (un)locked.
    fn channel_locked(&self, locked: bool);
}

/// Shared slot holding the current [`StatusListener`].
///
/// A clone of the notifier is handed to the middleware as an EPG listener,
/// so notifications reach whichever listener is installed at that time.
#[derive(Clone, Default)]
pub struct StatusNotifier {
    listener: Arc<Mutex<Option<Arc<dyn StatusListener>>>>,
}

impl StatusNotifier {
    pub fn set_listener(&self, listener: Option<Arc<dyn StatusListener>>) {
        *self.lock() = listener;
    }

    pub fn has_listener(&self) -> bool {
        self.lock().is_some()
    }

    pub fn update_now_next(&self) {
        if let Some(listener) = self.listener() {
            listener.update_now_next();
        }
    }

    pub fn age_locked(&self, locked: bool) {
        if let Some(listener) = self.listener() {
            listener.age_locked(locked);
        }
    }

    pub fn channel_locked(&self, locked: bool) {
        if let Some(listener) = self.listener() {
            listener.channel_locked(locked);
        }
    }

    // The listener is cloned out of the slot so that it runs without the lock
    // held and may install another listener.
    fn listener(&self) -> Option<Arc<dyn StatusListener>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn StatusListener>>> {
        match self.listener.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EpgListener for StatusNotifier {
    fn now_next_updated(&self) {
        tracing::debug!("EPG updated");
        self.update_now_next();
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum Notification {
        NowNext,
        AgeLocked(bool),
        ChannelLocked(bool),
    }

    #[derive(Default)]
    pub(crate) struct RecordingListener {
        notifications: Mutex<Vec<Notification>>,
    }

    impl RecordingListener {
        pub(crate) fn notifications(&self) -> Vec<Notification> {
            self.notifications.lock().unwrap().clone()
        }

        fn push(&self, notification: Notification) {
            self.notifications.lock().unwrap().push(notification);
        }
    }

    impl StatusListener for RecordingListener {
        fn update_now_next(&self) {
            self.push(Notification::NowNext);
        }

        fn age_locked(&self, locked: bool) {
            self.push(Notification::AgeLocked(locked));
        }

        fn channel_locked(&self, locked: bool) {
            self.push(Notification::ChannelLocked(locked));
        }
    }
}
