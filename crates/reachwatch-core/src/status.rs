// Observable state for connectivity and app lifecycle
use crate::models::StatusSnapshot;
use tracing::debug;

type Subscriber<T> = Box<dyn FnMut(&T) + Send>;

/// A value that tells its subscribers when it actually changes
///
/// Writing the same value again is a no-op. Subscribers run synchronously,
/// in registration order, before `set` returns.
pub struct Observable<T> {
    value: T,
    subscribers: Vec<Subscriber<T>>,
}

impl<T: PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            subscribers: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Store `value`, notifying subscribers if it differs from the current one.
    /// Returns whether a notification went out.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }

        self.value = value;
        for subscriber in self.subscribers.iter_mut() {
            subscriber(&self.value);
        }
        true
    }

    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Holds the last known connectivity and lifecycle state
pub struct StatusHolder {
    online: Observable<Option<bool>>,
    foreground: Observable<bool>,
}

impl StatusHolder {
    /// The app always starts in the foreground. `initial_online` is the
    /// startup probe result, `None` when no probe was possible.
    pub fn new(initial_online: Option<bool>) -> Self {
        Self {
            online: Observable::new(initial_online),
            foreground: Observable::new(true),
        }
    }

    pub fn online(&self) -> Option<bool> {
        *self.online.get()
    }

    pub fn foreground(&self) -> bool {
        *self.foreground.get()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            online: self.online(),
            foreground: self.foreground(),
        }
    }

    /// Once set, connectivity can never go back to unknown
    pub fn set_online(&mut self, value: bool) -> bool {
        let changed = self.online.set(Some(value));
        if !changed {
            debug!("online already {}, ignoring", value);
        }
        changed
    }

    pub fn set_foreground(&mut self, value: bool) -> bool {
        let changed = self.foreground.set(value);
        if !changed {
            debug!("foreground already {}, ignoring", value);
        }
        changed
    }

    pub fn on_online_change<F>(&mut self, subscriber: F)
    where
        F: FnMut(&Option<bool>) + Send + 'static,
    {
        self.online.subscribe(subscriber);
    }

    pub fn on_foreground_change<F>(&mut self, subscriber: F)
    where
        F: FnMut(&bool) + Send + 'static,
    {
        self.foreground.subscribe(subscriber);
    }
}
