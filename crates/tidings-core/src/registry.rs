#![forbid(unsafe_code)]

//! Reentrancy-safe, insertion-ordered listener registry.
//!
//! # Design
//!
//! [`ListenerRegistry<E>`] stores listeners in a `Vec<Option<Entry>>`. An
//! entry is either a plain [`Listener`] (`Fn()`) or a typed
//! [`ChangeListener<E>`] (`Fn(&E)`), so notifiers route both shapes through
//! one dispatch path. Identity is the `Rc` pointer: adding the same `Rc`
//! twice registers it twice, and removal drops the first match only.
//!
//! No `RefCell` borrow is held while a listener runs. Listeners may add or
//! remove listeners, dispatch again, or mutate the notifier that owns the
//! registry.
//!
//! # Invariants
//!
//! 1. Dispatch order is add order as of dispatch start.
//! 2. Listeners added during a dispatch are not invoked by that dispatch.
//! 3. A listener removed during a dispatch is not invoked later in that
//!    pass; its slot is nulled and compacted once the outermost dispatch
//!    returns.
//! 4. A panicking listener is reported and skipped; later listeners still
//!    run.
//! 5. After `dispose()`, every operation except removal is rejected.
//!
//! # Performance
//!
//! | Operation    | Complexity                     |
//! |--------------|--------------------------------|
//! | `add_*`      | O(1) amortized (capacity doubles from 1) |
//! | `remove_*`   | O(n) scan                      |
//! | `dispatch`   | O(n) + one O(n) compaction if removals happened |
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Listener panic | User callback panics | Logged via `tracing::error!`, dispatch continues |
//! | Use after dispose | `add_*`/`dispatch`/`dispose` after `dispose()` | `Err(UsageError::Disposed)` |
//! | Dispose mid-dispatch | Listener disposes its own registry | `Err(UsageError::DisposeDuringDispatch)` |
//! | Remove after dispose | Teardown in any order | Returns `false` |

use std::cell::RefCell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use tracing::{error, trace};

use crate::error::{UsageError, panic_message};

/// A plain notification callback.
pub type Listener = Rc<dyn Fn()>;

/// A callback receiving the structured change event.
pub type ChangeListener<E> = Rc<dyn Fn(&E)>;

/// Wrap a closure as a [`Listener`] handle.
///
/// Keep the returned handle to remove the listener later.
pub fn listener(f: impl Fn() + 'static) -> Listener {
    Rc::new(f)
}

/// Wrap a closure as a [`ChangeListener`] handle.
pub fn change_listener<E>(f: impl Fn(&E) + 'static) -> ChangeListener<E> {
    Rc::new(f)
}

enum Entry<E> {
    Notify(Listener),
    Change(ChangeListener<E>),
}

impl<E> Clone for Entry<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Notify(f) => Self::Notify(Rc::clone(f)),
            Self::Change(f) => Self::Change(Rc::clone(f)),
        }
    }
}

impl<E> Entry<E> {
    fn invoke(&self, event: &E) {
        match self {
            Self::Notify(f) => f(),
            Self::Change(f) => f(event),
        }
    }

    fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Notify(a), Self::Notify(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            (Self::Change(a), Self::Change(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

struct RegistryState<E> {
    slots: Vec<Option<Entry<E>>>,
    /// Number of non-null slots.
    live: usize,
    /// Nesting depth of in-progress dispatches.
    depth: usize,
    /// Slots nulled while `depth > 0`, compacted when depth returns to 0.
    pending_removals: usize,
    disposed: bool,
}

impl<E> RegistryState<E> {
    fn compact(&mut self) {
        trace!(
            removed = self.pending_removals,
            live = self.live,
            "compacting listener slots"
        );
        self.slots.retain(Option::is_some);
        self.pending_removals = 0;
        self.shrink();
    }

    fn shrink(&mut self) {
        let capacity = self.slots.capacity();
        if self.slots.len() * 2 <= capacity {
            self.slots.shrink_to(capacity / 2);
        }
    }
}

/// Ordered, reentrancy-safe store of listeners for events of type `E`.
pub struct ListenerRegistry<E> {
    kind: &'static str,
    state: RefCell<RegistryState<E>>,
}

impl<E> ListenerRegistry<E> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::named("ListenerRegistry")
    }

    /// Create an empty registry whose errors name its owner (e.g.
    /// `"ValueNotifier"`).
    #[must_use]
    pub fn named(kind: &'static str) -> Self {
        Self {
            kind,
            state: RefCell::new(RegistryState {
                slots: Vec::new(),
                live: 0,
                depth: 0,
                pending_removals: 0,
                disposed: false,
            }),
        }
    }

    /// Name used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Register a plain listener.
    pub fn add_listener(&self, listener: Listener) -> Result<(), UsageError> {
        self.push(Entry::Notify(listener))
    }

    /// Register a change listener.
    pub fn add_change_listener(&self, listener: ChangeListener<E>) -> Result<(), UsageError> {
        self.push(Entry::Change(listener))
    }

    /// Remove the first registration of `listener`. Returns whether one was
    /// found. Always `false` after disposal.
    pub fn remove_listener(&self, listener: &Listener) -> bool {
        self.remove_entry(&Entry::Notify(Rc::clone(listener)))
    }

    /// Remove the first registration of `listener`.
    pub fn remove_change_listener(&self, listener: &ChangeListener<E>) -> bool {
        self.remove_entry(&Entry::Change(Rc::clone(listener)))
    }

    /// Invoke every registered listener with `event`.
    ///
    /// Listener panics are caught and reported; they never reach the caller.
    pub fn dispatch(&self, event: &E) -> Result<(), UsageError> {
        let end = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return Err(UsageError::Disposed { kind: self.kind });
            }
            if state.live == 0 {
                return Ok(());
            }
            state.depth += 1;
            state.slots.len()
        };

        for index in 0..end {
            let entry = {
                let state = self.state.borrow();
                state.slots.get(index).and_then(Clone::clone)
            };
            let Some(entry) = entry else {
                continue;
            };
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| entry.invoke(event))) {
                error!(
                    registry = self.kind,
                    index,
                    panic = %panic_message(payload.as_ref()),
                    "listener panicked during dispatch"
                );
            }
        }

        let mut state = self.state.borrow_mut();
        state.depth -= 1;
        if state.depth == 0 && state.pending_removals > 0 {
            state.compact();
        }
        Ok(())
    }

    /// The error [`dispose`](Self::dispose) would fail with right now, if any.
    ///
    /// Owners that tear down their own state before disposing the registry
    /// call this first so a rejected dispose leaves everything untouched.
    pub fn can_dispose(&self) -> Result<(), UsageError> {
        let state = self.state.borrow();
        if state.disposed {
            return Err(UsageError::Disposed { kind: self.kind });
        }
        if state.depth > 0 {
            return Err(UsageError::DisposeDuringDispatch { kind: self.kind });
        }
        Ok(())
    }

    /// Release all listeners and reject further use.
    pub fn dispose(&self) -> Result<(), UsageError> {
        self.can_dispose()?;
        let slots = {
            let mut state = self.state.borrow_mut();
            state.disposed = true;
            state.live = 0;
            state.pending_removals = 0;
            std::mem::take(&mut state.slots)
        };
        // Dropped outside the borrow: a listener may own a Subscription
        // pointing back at this registry.
        drop(slots);
        Ok(())
    }

    /// Number of registered listeners (not counting slots removed mid-dispatch).
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().live
    }

    /// Whether no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alias of `!is_empty()`.
    #[must_use]
    pub fn has_listeners(&self) -> bool {
        !self.is_empty()
    }

    /// Allocated slot capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.borrow().slots.capacity()
    }

    /// Whether a dispatch is currently running.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.state.borrow().depth > 0
    }

    /// Whether `dispose()` has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    fn push(&self, entry: Entry<E>) -> Result<(), UsageError> {
        let mut state = self.state.borrow_mut();
        if state.disposed {
            return Err(UsageError::Disposed { kind: self.kind });
        }
        if state.slots.len() == state.slots.capacity() {
            let grow = state.slots.capacity().max(1);
            state.slots.reserve_exact(grow);
        }
        state.slots.push(Some(entry));
        state.live += 1;
        Ok(())
    }

    fn remove_entry(&self, target: &Entry<E>) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return false;
            }
            let Some(index) = state
                .slots
                .iter()
                .position(|slot| slot.as_ref().is_some_and(|e| e.matches(target)))
            else {
                return false;
            };
            state.live -= 1;
            if state.depth > 0 {
                state.pending_removals += 1;
                state.slots[index].take()
            } else {
                let removed = state.slots.remove(index);
                state.shrink();
                removed
            }
        };
        drop(removed);
        true
    }
}

impl<E: 'static> ListenerRegistry<E> {
    /// Register `f` as a change listener and return a guard that removes it
    /// on drop.
    pub fn subscribe(
        self: &Rc<Self>,
        f: impl Fn(&E) + 'static,
    ) -> Result<Subscription, UsageError> {
        let listener: ChangeListener<E> = Rc::new(f);
        self.add_change_listener(Rc::clone(&listener))?;
        let registry = Rc::downgrade(self);
        Ok(Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove_change_listener(&listener);
            }
        }))
    }

    /// Register `f` as a plain listener and return a guard that removes it
    /// on drop.
    pub fn watch(self: &Rc<Self>, f: impl Fn() + 'static) -> Result<Subscription, UsageError> {
        let listener: Listener = Rc::new(f);
        self.add_listener(Rc::clone(&listener))?;
        let registry = Rc::downgrade(self);
        Ok(Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove_listener(&listener);
            }
        }))
    }
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ListenerRegistry")
            .field("kind", &self.kind)
            .field("live", &state.live)
            .field("slots", &state.slots.len())
            .field("depth", &state.depth)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// RAII guard for a registered listener.
///
/// Dropping the guard removes the listener. The guard holds only a weak
/// reference to the registry, so it never keeps a notifier alive.
#[must_use = "dropping a Subscription removes its listener immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Build a guard that runs `release` when dropped.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Remove the listener now.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Keep the listener registered for the registry's lifetime.
    pub fn detach(mut self) {
        self.release = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, Listener) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, listener(move || c.set(c.get() + 1)))
    }

    #[test]
    fn dispatch_in_add_order() {
        let registry = ListenerRegistry::<()>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ['A', 'B', 'C'] {
            let log = Rc::clone(&log);
            registry
                .add_listener(listener(move || log.borrow_mut().push(tag)))
                .unwrap();
        }
        registry.dispatch(&()).unwrap();
        assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
    }

    #[test]
    fn dispatch_with_no_listeners_is_noop() {
        let registry = ListenerRegistry::<u8>::new();
        registry.dispatch(&1).unwrap();
        assert!(!registry.is_dispatching());
        assert!(registry.is_empty());
    }

    #[test]
    fn change_listener_receives_event() {
        let registry = ListenerRegistry::<i32>::new();
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        registry
            .add_change_listener(change_listener(move |v: &i32| s.set(*v)))
            .unwrap();
        registry.dispatch(&42).unwrap();
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn duplicate_add_invokes_twice_and_remove_drops_one() {
        let registry = ListenerRegistry::<()>::new();
        let (count, l) = counter();
        registry.add_listener(Rc::clone(&l)).unwrap();
        registry.add_listener(Rc::clone(&l)).unwrap();
        registry.dispatch(&()).unwrap();
        assert_eq!(count.get(), 2);

        assert!(registry.remove_listener(&l));
        assert_eq!(registry.len(), 1);
        registry.dispatch(&()).unwrap();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn remove_unknown_listener_returns_false() {
        let registry = ListenerRegistry::<()>::new();
        let (_, l) = counter();
        assert!(!registry.remove_listener(&l));
    }

    #[test]
    fn plain_and_change_handles_are_distinct() {
        let registry = ListenerRegistry::<()>::new();
        let (_, l) = counter();
        registry.add_listener(Rc::clone(&l)).unwrap();
        let other: ChangeListener<()> = change_listener(|_| {});
        assert!(!registry.remove_change_listener(&other));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn capacity_grows_from_one_by_doubling() {
        let registry = ListenerRegistry::<()>::new();
        assert_eq!(registry.capacity(), 0);
        let mut capacities = Vec::new();
        for _ in 0..9 {
            registry.add_listener(listener(|| {})).unwrap();
            capacities.push(registry.capacity());
        }
        assert_eq!(capacities, vec![1, 2, 4, 4, 8, 8, 8, 8, 16]);
    }

    #[test]
    fn capacity_halves_as_removals_empty_it() {
        let registry = ListenerRegistry::<()>::new();
        let listeners: Vec<Listener> = (0..8).map(|_| listener(|| {})).collect();
        for l in &listeners {
            registry.add_listener(Rc::clone(l)).unwrap();
        }
        assert_eq!(registry.capacity(), 8);

        let mut capacities = Vec::new();
        for l in &listeners {
            assert!(registry.remove_listener(l));
            capacities.push(registry.capacity());
        }
        assert_eq!(capacities, vec![8, 8, 8, 4, 4, 2, 1, 0]);
    }

    #[test]
    fn listener_removing_itself_mid_dispatch() {
        let registry = Rc::new(ListenerRegistry::<()>::new());
        let count = Rc::new(Cell::new(0));
        let other = Rc::new(Cell::new(0));

        let slot: Rc<RefCell<Option<Listener>>> = Rc::new(RefCell::new(None));
        let this = {
            let registry = Rc::downgrade(&registry);
            let slot = Rc::clone(&slot);
            let count = Rc::clone(&count);
            listener(move || {
                count.set(count.get() + 1);
                if let (Some(r), Some(me)) = (registry.upgrade(), slot.borrow().as_ref()) {
                    assert!(r.remove_listener(me));
                }
            })
        };
        *slot.borrow_mut() = Some(Rc::clone(&this));
        registry.add_listener(Rc::clone(&this)).unwrap();
        let o = Rc::clone(&other);
        registry
            .add_listener(listener(move || o.set(o.get() + 1)))
            .unwrap();

        registry.dispatch(&()).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(other.get(), 1);
        assert_eq!(registry.len(), 1);

        registry.dispatch(&()).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(other.get(), 2);
    }

    #[test]
    fn removing_later_listener_mid_dispatch_skips_it() {
        let registry = Rc::new(ListenerRegistry::<()>::new());
        let (late_count, late) = counter();
        {
            let registry_weak = Rc::downgrade(&registry);
            let late = Rc::clone(&late);
            registry
                .add_listener(listener(move || {
                    if let Some(r) = registry_weak.upgrade() {
                        r.remove_listener(&late);
                    }
                }))
                .unwrap();
        }
        registry.add_listener(Rc::clone(&late)).unwrap();

        registry.dispatch(&()).unwrap();
        assert_eq!(late_count.get(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn listener_added_mid_dispatch_waits_for_next_pass() {
        let registry = Rc::new(ListenerRegistry::<()>::new());
        let (added_count, added) = counter();
        let armed = Rc::new(Cell::new(true));
        {
            let registry_weak = Rc::downgrade(&registry);
            let armed = Rc::clone(&armed);
            registry
                .add_listener(listener(move || {
                    if !armed.replace(false) {
                        return;
                    }
                    if let Some(r) = registry_weak.upgrade() {
                        r.add_listener(Rc::clone(&added)).unwrap();
                    }
                }))
                .unwrap();
        }
        registry.dispatch(&()).unwrap();
        assert_eq!(added_count.get(), 0);
        registry.dispatch(&()).unwrap();
        assert_eq!(added_count.get(), 1);
    }

    #[test]
    fn nested_dispatch_compacts_after_outermost() {
        let registry = Rc::new(ListenerRegistry::<u32>::new());
        let (victim_count, victim) = counter();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let registry_weak = Rc::downgrade(&registry);
            let victim = Rc::clone(&victim);
            let log = Rc::clone(&log);
            registry
                .add_change_listener(change_listener(move |depth: &u32| {
                    log.borrow_mut().push(*depth);
                    let Some(r) = registry_weak.upgrade() else {
                        return;
                    };
                    if *depth == 0 {
                        r.remove_listener(&victim);
                        r.dispatch(&1).unwrap();
                        assert!(r.is_dispatching());
                    }
                }))
                .unwrap();
        }
        registry.add_listener(Rc::clone(&victim)).unwrap();

        registry.dispatch(&0).unwrap();
        assert_eq!(*log.borrow(), vec![0, 1]);
        assert_eq!(victim_count.get(), 0);
        assert!(!registry.is_dispatching());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_dispatch() {
        let registry = ListenerRegistry::<()>::new();
        registry
            .add_listener(listener(|| panic!("listener failure")))
            .unwrap();
        let (count, l) = counter();
        registry.add_listener(l).unwrap();
        registry.dispatch(&()).unwrap();
        assert_eq!(count.get(), 1);
        assert!(!registry.is_dispatching());
    }

    #[test]
    fn dispose_rejects_further_use() {
        let registry = ListenerRegistry::<()>::named("Sample");
        let (count, l) = counter();
        registry.add_listener(Rc::clone(&l)).unwrap();
        registry.dispose().unwrap();
        assert!(registry.is_disposed());
        assert_eq!(count.get(), 0);

        let err = registry.add_listener(listener(|| {})).unwrap_err();
        assert_eq!(err, UsageError::Disposed { kind: "Sample" });
        assert!(registry.dispatch(&()).is_err());
        assert!(registry.dispose().is_err());
        // Removal stays tolerated for teardown.
        assert!(!registry.remove_listener(&l));
    }

    #[test]
    fn dispose_during_dispatch_fails() {
        let registry = Rc::new(ListenerRegistry::<()>::new());
        let result = Rc::new(RefCell::new(None));
        {
            let registry_weak = Rc::downgrade(&registry);
            let result = Rc::clone(&result);
            registry
                .add_listener(listener(move || {
                    if let Some(r) = registry_weak.upgrade() {
                        *result.borrow_mut() = Some(r.dispose());
                    }
                }))
                .unwrap();
        }
        registry.dispatch(&()).unwrap();
        assert!(matches!(
            result.borrow().as_ref(),
            Some(Err(UsageError::DisposeDuringDispatch { .. }))
        ));
        assert!(!registry.is_disposed());
        assert!(registry.can_dispose().is_ok());
        registry.dispose().unwrap();
        assert_eq!(
            registry.can_dispose(),
            Err(UsageError::Disposed { kind: "ListenerRegistry" })
        );
    }

    #[test]
    fn subscription_drop_removes_listener() {
        let registry = Rc::new(ListenerRegistry::<i32>::new());
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let sub = registry.subscribe(move |v| s.set(*v)).unwrap();
        registry.dispatch(&1).unwrap();
        assert_eq!(seen.get(), 1);

        drop(sub);
        assert!(registry.is_empty());
        registry.dispatch(&2).unwrap();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn subscription_detach_keeps_listener() {
        let registry = Rc::new(ListenerRegistry::<()>::new());
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        registry
            .watch(move || c.set(c.get() + 1))
            .unwrap()
            .detach();
        registry.dispatch(&()).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let registry = Rc::new(ListenerRegistry::<()>::new());
        let sub = registry.watch(|| {}).unwrap();
        drop(registry);
        sub.release();
    }

    #[test]
    fn debug_format() {
        let registry = ListenerRegistry::<()>::named("Thing");
        registry.add_listener(listener(|| {})).unwrap();
        let dbg = format!("{registry:?}");
        assert!(dbg.contains("Thing"));
        assert!(dbg.contains("live: 1"));
    }
}
