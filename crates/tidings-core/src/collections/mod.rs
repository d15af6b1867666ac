#![forbid(unsafe_code)]

//! Observable list, set, and map notifiers with structured change deltas.
//!
//! Every mutating call:
//!
//! 1. computes the added/removed delta (and, for lists, the lowest affected
//!    index) against the state *before* the mutation,
//! 2. performs the mutation,
//! 3. dispatches exactly one change event, or none if the delta is empty.
//!
//! # Invariants
//!
//! 1. A call that changes nothing (`clear()` on an empty list, adding set
//!    members that are already present, removing an absent key) dispatches
//!    nothing and does not bump the version.
//! 2. One true mutation produces exactly one event.
//! 3. `value()` returns a [`Snapshot`](crate::Snapshot): read-only, and
//!    never affected by later mutations.
//! 4. Lists keep positional duplicates; sets dedupe by `Eq + Hash`; maps key
//!    by `Eq + Hash`. Sets and maps keep insertion order.

mod list;
mod map;
mod set;

pub use list::{ListChange, ListNotifier};
pub use map::{MapChange, MapNotifier};
pub use set::{SetChange, SetNotifier};

use std::cell::Cell;
use std::ops::{Bound, Range, RangeBounds};
use std::rc::Rc;

use crate::error::{UsageError, raise};
use crate::registry::{ChangeListener, Listener, ListenerRegistry, Subscription};
use crate::snapshot::{CowCell, Snapshot};

/// Shared state behind every collection notifier.
pub(crate) struct Backing<C, E> {
    kind: &'static str,
    pub(crate) store: CowCell<C>,
    version: Cell<u64>,
    registry: Rc<ListenerRegistry<E>>,
}

impl<C: Clone, E: 'static> Backing<C, E> {
    pub(crate) fn new(kind: &'static str, value: C) -> Self {
        Self {
            kind,
            store: CowCell::new(value),
            version: Cell::new(0),
            registry: Rc::new(ListenerRegistry::named(kind)),
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot<C> {
        self.store.snapshot()
    }

    #[track_caller]
    pub(crate) fn ensure_live(&self) {
        if self.registry.is_disposed() {
            raise(UsageError::Disposed { kind: self.kind });
        }
    }

    /// Bump the version and dispatch one event.
    #[track_caller]
    pub(crate) fn publish(&self, event: E) {
        self.version.set(self.version.get() + 1);
        if let Err(err) = self.registry.dispatch(&event) {
            raise(err);
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.get()
    }

    #[track_caller]
    pub(crate) fn add_listener(&self, listener: Listener) {
        if let Err(err) = self.registry.add_listener(listener) {
            raise(err);
        }
    }

    pub(crate) fn remove_listener(&self, listener: &Listener) -> bool {
        self.registry.remove_listener(listener)
    }

    #[track_caller]
    pub(crate) fn add_change_listener(&self, listener: ChangeListener<E>) {
        if let Err(err) = self.registry.add_change_listener(listener) {
            raise(err);
        }
    }

    pub(crate) fn remove_change_listener(&self, listener: &ChangeListener<E>) -> bool {
        self.registry.remove_change_listener(listener)
    }

    #[track_caller]
    pub(crate) fn subscribe(&self, f: impl Fn(&E) + 'static) -> Subscription {
        match self.registry.subscribe(f) {
            Ok(sub) => sub,
            Err(err) => raise(err),
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.registry.len()
    }

    #[track_caller]
    pub(crate) fn dispose(&self) {
        if let Err(err) = self.registry.dispose() {
            raise(err);
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }
}

/// Listener and lifecycle methods shared by the collection notifiers.
///
/// Expands inside an `impl` block whose type has an `inner: Rc<Backing<_, $event>>`.
macro_rules! listener_surface {
    ($event:ty) => {
        /// Number of mutations that produced an event.
        #[must_use]
        pub fn version(&self) -> u64 {
            self.inner.version()
        }

        /// Register a plain listener.
        ///
        /// # Panics
        ///
        /// Panics if the notifier is disposed.
        #[track_caller]
        pub fn add_listener(&self, listener: $crate::registry::Listener) {
            self.inner.add_listener(listener);
        }

        /// Remove the first registration of a plain listener.
        pub fn remove_listener(&self, listener: &$crate::registry::Listener) -> bool {
            self.inner.remove_listener(listener)
        }

        /// Register a listener receiving the change delta.
        ///
        /// # Panics
        ///
        /// Panics if the notifier is disposed.
        #[track_caller]
        pub fn add_change_listener(&self, listener: $crate::registry::ChangeListener<$event>) {
            self.inner.add_change_listener(listener);
        }

        /// Remove the first registration of a change listener.
        pub fn remove_change_listener(
            &self,
            listener: &$crate::registry::ChangeListener<$event>,
        ) -> bool {
            self.inner.remove_change_listener(listener)
        }

        /// Subscribe to change deltas; dropping the guard unsubscribes.
        ///
        /// # Panics
        ///
        /// Panics if the notifier is disposed.
        #[track_caller]
        pub fn subscribe(&self, f: impl Fn(&$event) + 'static) -> $crate::registry::Subscription {
            self.inner.subscribe(f)
        }

        /// Number of registered listeners.
        #[must_use]
        pub fn listener_count(&self) -> usize {
            self.inner.listener_count()
        }

        /// Drop every listener and reject further use.
        ///
        /// # Panics
        ///
        /// Panics if already disposed or called during dispatch.
        #[track_caller]
        pub fn dispose(&self) {
            self.inner.dispose();
        }

        /// Whether `dispose()` was called.
        #[must_use]
        pub fn is_disposed(&self) -> bool {
            self.inner.is_disposed()
        }
    };
}

pub(crate) use listener_surface;

/// Resolve `range` against a collection of length `len`.
///
/// # Panics
///
/// Panics if the range is inverted or exceeds `len`.
#[track_caller]
pub(crate) fn resolve_range(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e + 1,
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    assert!(
        start <= end && end <= len,
        "range {start}..{end} out of bounds for length {len}"
    );
    start..end
}
