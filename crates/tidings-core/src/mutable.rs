#![forbid(unsafe_code)]

//! Notifier for arbitrary mutable aggregates where the caller decides
//! whether a mutation is worth a notification.
//!
//! ```ignore
//! let items = MutableNotifier::new(vec![1, 2, 3]);
//! items.mutate(|v| {
//!     v.push(4);
//!     Mutation::Notify
//! });
//! ```
//!
//! Unlike the collection notifiers, no delta is computed: listeners only get
//! a plain notification.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::{UsageError, raise};
use crate::registry::{Listener, ListenerRegistry, Subscription};
use crate::snapshot::{CowCell, Snapshot};
use crate::view::{Listenable, ValueListenable, View};

const KIND: &str = "MutableNotifier";

/// Whether a [`MutableNotifier::mutate`] closure wants listeners notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Notify listeners.
    Notify,
    /// Keep the change but stay silent.
    Silent,
}

impl From<bool> for Mutation {
    fn from(notify: bool) -> Self {
        if notify { Self::Notify } else { Self::Silent }
    }
}

struct MutableInner<C> {
    value: CowCell<C>,
    version: Cell<u64>,
    registry: Rc<ListenerRegistry<()>>,
}

/// Shared mutable value with caller-controlled notification.
pub struct MutableNotifier<C> {
    inner: Rc<MutableInner<C>>,
}

impl<C> Clone for MutableNotifier<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: Clone + 'static> MutableNotifier<C> {
    /// Create a notifier owning `value`.
    #[must_use]
    pub fn new(value: C) -> Self {
        Self {
            inner: Rc::new(MutableInner {
                value: CowCell::new(value),
                version: Cell::new(0),
                registry: Rc::new(ListenerRegistry::named(KIND)),
            }),
        }
    }

    /// Read-only snapshot of the current value.
    #[must_use]
    pub fn value(&self) -> Snapshot<C> {
        self.inner.value.snapshot()
    }

    /// Access the current value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        self.inner.value.with(f)
    }

    /// Apply `f` and notify listeners if it returns [`Mutation::Notify`].
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn mutate<M: Into<Mutation>>(&self, f: impl FnOnce(&mut C) -> M) -> Mutation {
        if let Err(err) = self.ensure_live() {
            raise(err);
        }
        let outcome = self.inner.value.mutate(|value| f(value).into());
        if outcome == Mutation::Notify {
            self.notify_listeners();
        }
        outcome
    }

    /// Notify listeners without mutating.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn notify_listeners(&self) {
        if let Err(err) = self.ensure_live() {
            raise(err);
        }
        self.inner.version.set(self.inner.version.get() + 1);
        if let Err(err) = self.inner.registry.dispatch(&()) {
            raise(err);
        }
    }

    /// Number of notifications sent.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Register a plain listener.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn add_listener(&self, listener: Listener) {
        if let Err(err) = self.inner.registry.add_listener(listener) {
            raise(err);
        }
    }

    /// Remove the first registration of a plain listener.
    pub fn remove_listener(&self, listener: &Listener) -> bool {
        self.inner.registry.remove_listener(listener)
    }

    /// Subscribe with a guard that unsubscribes on drop.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn subscribe(&self, f: impl Fn() + 'static) -> Subscription {
        match self.inner.registry.watch(f) {
            Ok(sub) => sub,
            Err(err) => raise(err),
        }
    }

    /// Read-only view of this notifier.
    #[must_use]
    pub fn view(&self) -> View<Snapshot<C>> {
        View::of(self)
    }

    /// Drop every listener and reject further use.
    ///
    /// # Panics
    ///
    /// Panics if already disposed or called during dispatch.
    #[track_caller]
    pub fn dispose(&self) {
        if let Err(err) = self.inner.registry.dispose() {
            raise(err);
        }
    }

    /// Whether [`dispose`](Self::dispose) was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.registry.is_disposed()
    }

    fn ensure_live(&self) -> Result<(), UsageError> {
        if self.is_disposed() {
            return Err(UsageError::Disposed { kind: KIND });
        }
        Ok(())
    }
}

impl<C: Clone + 'static> Listenable for MutableNotifier<C> {
    fn add_listener(&self, listener: Listener) {
        MutableNotifier::add_listener(self, listener);
    }

    fn remove_listener(&self, listener: &Listener) -> bool {
        MutableNotifier::remove_listener(self, listener)
    }
}

impl<C: Clone + 'static> ValueListenable<Snapshot<C>> for MutableNotifier<C> {
    fn value(&self) -> Snapshot<C> {
        MutableNotifier::value(self)
    }
}

impl<C: fmt::Debug + Clone + 'static> fmt::Debug for MutableNotifier<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableNotifier")
            .field("value", &self.value())
            .field("version", &self.version())
            .finish()
    }
}
