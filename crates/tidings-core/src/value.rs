#![forbid(unsafe_code)]

//! Scalar change notifier.
//!
//! # Design
//!
//! [`ValueNotifier<T>`] holds one value in shared, reference-counted storage.
//! Setting a value that differs (by `PartialEq`) from the current one bumps
//! the version and dispatches a [`ValueChange`] carrying both the new and
//! the old value. Plain listeners and change listeners share one
//! [`ListenerRegistry`], so they are notified together in registration
//! order.
//!
//! Cloning a `ValueNotifier` creates another handle to the **same** state.
//!
//! # Invariants
//!
//! 1. `set(v)` where `v == current` is a no-op: no version bump, no dispatch.
//! 2. `version` increments by exactly 1 per value-changing mutation.
//! 3. No borrow of the value is held during dispatch; listeners may read or
//!    write the notifier.
//! 4. While unidirectionally bound (see [`crate::binding`]), direct writes
//!    fail with [`UsageError::BoundTarget`].
//!
//! # Failure Modes
//!
//! - **Use after dispose**: `set`, `add_listener`, ... panic with
//!   [`UsageError::Disposed`]; `try_set` returns it.
//! - **Write inside `with`**: calling `set` from the `with` closure panics
//!   (`RefCell` borrow rules).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::binding::BindingState;
use crate::error::{UsageError, raise};
use crate::registry::{ChangeListener, Listener, ListenerRegistry, Subscription};
use crate::view::{Listenable, ValueListenable, View};

const KIND: &str = "ValueNotifier";

/// The change event dispatched by [`ValueNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueChange<T> {
    /// Value after the mutation.
    pub new: T,
    /// Value before the mutation.
    pub old: T,
}

pub(crate) struct ValueInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    pub(crate) registry: Rc<ListenerRegistry<ValueChange<T>>>,
    pub(crate) binding: RefCell<Option<BindingState>>,
}

/// A shared, version-tracked value with change notification.
pub struct ValueNotifier<T> {
    pub(crate) inner: Rc<ValueInner<T>>,
}

impl<T> Clone for ValueNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueNotifier")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("listeners", &self.inner.registry.len())
            .field(
                "binding",
                &self.inner.binding.borrow().as_ref().map(BindingState::kind),
            )
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> ValueNotifier<T> {
    /// Create a notifier with the given initial value (version 0).
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ValueInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                registry: Rc::new(ListenerRegistry::named(KIND)),
                binding: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ValueInner<T>>) -> Self {
        Self { inner }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this notifier.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Set a new value, notifying listeners if it differs from the current
    /// one.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed or unidirectionally bound. Use
    /// [`try_set`](Self::try_set) to handle those cases.
    #[track_caller]
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            raise(err);
        }
    }

    /// Set a new value. Returns whether the value changed.
    pub fn try_set(&self, value: T) -> Result<bool, UsageError> {
        self.ensure_live()?;
        if self.is_write_locked() {
            return Err(UsageError::BoundTarget);
        }
        self.force_set(value)
    }

    /// Modify a copy of the value and store it if it changed.
    ///
    /// # Panics
    ///
    /// Same conditions as [`set`](Self::set).
    #[track_caller]
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Write path that skips the bound-target check. Used by bindings.
    pub(crate) fn force_set(&self, value: T) -> Result<bool, UsageError> {
        self.ensure_live()?;
        let old = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return Ok(false);
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner
            .registry
            .dispatch(&ValueChange { new: value, old })?;
        Ok(true)
    }

    /// Number of value-changing mutations so far.
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

    /// Register a listener receiving `(new, old)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn add_change_listener(&self, listener: ChangeListener<ValueChange<T>>) {
        if let Err(err) = self.inner.registry.add_change_listener(listener) {
            raise(err);
        }
    }

    /// Remove the first registration of a change listener.
    pub fn remove_change_listener(&self, listener: &ChangeListener<ValueChange<T>>) -> bool {
        self.inner.registry.remove_change_listener(listener)
    }

    /// Subscribe to changes; dropping the guard unsubscribes.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn subscribe(&self, f: impl Fn(&ValueChange<T>) + 'static) -> Subscription {
        match self.inner.registry.subscribe(f) {
            Ok(sub) => sub,
            Err(err) => raise(err),
        }
    }

    /// Number of registered listeners, binding subscriptions included.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Read-only view of this notifier.
    #[must_use]
    pub fn view(&self) -> View<T> {
        View::of(self)
    }

    /// Unbind, drop every listener, and reject further use.
    ///
    /// # Panics
    ///
    /// Panics if already disposed or called from one of this notifier's
    /// listeners.
    #[track_caller]
    pub fn dispose(&self) {
        if let Err(err) = self.inner.registry.can_dispose() {
            raise(err);
        }
        self.unbind();
        if let Err(err) = self.inner.registry.dispose() {
            raise(err);
        }
    }

    /// Whether [`dispose`](Self::dispose) was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.registry.is_disposed()
    }

    pub(crate) fn ensure_live(&self) -> Result<(), UsageError> {
        if self.is_disposed() {
            return Err(UsageError::Disposed { kind: KIND });
        }
        Ok(())
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for ValueNotifier<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Listenable for ValueNotifier<T> {
    fn add_listener(&self, listener: Listener) {
        ValueNotifier::add_listener(self, listener);
    }

    fn remove_listener(&self, listener: &Listener) -> bool {
        ValueNotifier::remove_listener(self, listener)
    }
}

impl<T: Clone + PartialEq + 'static> ValueListenable<T> for ValueNotifier<T> {
    fn value(&self) -> T {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{change_listener, listener};

    #[test]
    fn get_set_basic() {
        let n = ValueNotifier::new(42);
        assert_eq!(n.get(), 42);
        assert_eq!(n.version(), 0);
        n.set(99);
        assert_eq!(n.get(), 99);
        assert_eq!(n.version(), 1);
    }

    #[test]
    fn equal_value_is_noop() {
        let n = ValueNotifier::new(1);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        n.add_listener(listener(move || c.set(c.get() + 1)));

        n.set(5);
        n.set(5);
        assert_eq!(count.get(), 1);
        assert_eq!(n.version(), 1);
        assert_eq!(n.try_set(5), Ok(false));
    }

    #[test]
    fn change_listener_sees_new_and_old() {
        let n = ValueNotifier::new(String::from("a"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        n.add_change_listener(change_listener(move |c: &ValueChange<String>| {
            s.borrow_mut().push((c.new.clone(), c.old.clone()));
        }));
        n.set("b".into());
        n.set("c".into());
        assert_eq!(
            *seen.borrow(),
            vec![("b".into(), "a".into()), ("c".into(), "b".into())]
        );
    }

    #[test]
    fn plain_and_change_listeners_share_order() {
        let n = ValueNotifier::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        n.add_listener(listener(move || l1.borrow_mut().push("plain")));
        let l2 = Rc::clone(&log);
        n.add_change_listener(change_listener(move |_: &ValueChange<i32>| {
            l2.borrow_mut().push("change")
        }));
        n.set(1);
        assert_eq!(*log.borrow(), vec!["plain", "change"]);
    }

    #[test]
    fn remove_listener_stops_notifications() {
        let n = ValueNotifier::new(0);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let l = listener(move || c.set(c.get() + 1));
        n.add_listener(Rc::clone(&l));
        n.set(1);
        assert!(n.remove_listener(&l));
        n.set(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn update_mutates_with_change_detection() {
        let n = ValueNotifier::new(vec![1, 2, 3]);
        n.update(|v| v.push(4));
        assert_eq!(n.get(), vec![1, 2, 3, 4]);
        assert_eq!(n.version(), 1);
        n.update(|_| {});
        assert_eq!(n.version(), 1);
    }

    #[test]
    fn with_borrows_without_clone() {
        let n = ValueNotifier::new(vec![1, 2, 3]);
        assert_eq!(n.with(|v| v.iter().sum::<i32>()), 6);
    }

    #[test]
    fn listener_may_write_back_reentrantly() {
        let n = ValueNotifier::new(0);
        let handle = n.clone();
        n.add_change_listener(change_listener(move |c: &ValueChange<i32>| {
            if c.new < 3 {
                handle.set(c.new + 1);
            }
        }));
        n.set(1);
        assert_eq!(n.get(), 3);
        assert_eq!(n.version(), 3);
    }

    #[test]
    fn clone_shares_state_and_listeners() {
        let a = ValueNotifier::new(0);
        let b = a.clone();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = a.subscribe(move |_| c.set(c.get() + 1));
        b.set(42);
        assert_eq!(a.get(), 42);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let n = ValueNotifier::new(0);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = n.subscribe(move |_| c.set(c.get() + 1));
        n.set(1);
        drop(sub);
        n.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(n.listener_count(), 0);
    }

    #[test]
    fn panicking_listener_does_not_reach_setter() {
        let n = ValueNotifier::new(0);
        n.add_listener(listener(|| panic!("bad listener")));
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        n.add_listener(listener(move || c.set(c.get() + 1)));
        n.set(1);
        assert_eq!(n.get(), 1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dispose_rejects_writes() {
        let n = ValueNotifier::new(0);
        n.dispose();
        assert!(n.is_disposed());
        assert_eq!(
            n.try_set(1),
            Err(UsageError::Disposed {
                kind: "ValueNotifier"
            })
        );
        assert_eq!(n.get(), 0);
    }

    #[test]
    #[should_panic(expected = "used after being disposed")]
    fn set_after_dispose_panics() {
        let n = ValueNotifier::new(0);
        n.dispose();
        n.set(1);
    }

    #[test]
    fn debug_format() {
        let n = ValueNotifier::new(42);
        let dbg = format!("{n:?}");
        assert!(dbg.contains("ValueNotifier"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("version"));
    }
}
