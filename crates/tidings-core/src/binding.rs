#![forbid(unsafe_code)]

//! Scalar-to-scalar bindings between [`ValueNotifier`]s.
//!
//! A binding is owned by its **target** notifier. A target holds at most one
//! binding; binding again first releases the previous one.
//!
//! - **Unidirectional**: the target copies the source immediately and on
//!   every source change. Direct writes to the target fail with
//!   [`UsageError::BoundTarget`] until [`ValueNotifier::unbind`].
//! - **Bidirectional**: the target copies the source immediately, then a
//!   change on either side is pushed to the other exactly once. A shared
//!   [`Propagation`] flag suppresses the echo.
//!
//! ```ignore
//! let source = ValueNotifier::new(42);
//! let target = ValueNotifier::new(0);
//! target.bind_bidirectional(&source);
//!
//! source.set(10);
//! assert_eq!(target.get(), 10);
//!
//! target.set(20);
//! assert_eq!(source.get(), 20);
//! ```
//!
//! Binding closures capture weak handles only, so two notifiers bound to
//! each other do not keep each other alive.

use std::cell::Cell;
use std::rc::Rc;

use tracing::warn;

use crate::error::raise;
use crate::registry::Subscription;
use crate::value::{ValueChange, ValueNotifier};

/// Direction of an active binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Target mirrors source; target is write-locked.
    Unidirectional,
    /// Both sides mirror each other.
    Bidirectional,
}

/// Which side of a bidirectional binding is currently propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Propagation {
    Idle,
    FromSource,
    FromTarget,
}

pub(crate) struct BindingState {
    kind: BindingKind,
    // Dropping these removes the binding listeners.
    _subscriptions: Vec<Subscription>,
}

impl BindingState {
    pub(crate) fn kind(&self) -> BindingKind {
        self.kind
    }
}

impl<T: Clone + PartialEq + 'static> ValueNotifier<T> {
    /// Mirror `source` into this notifier and forbid direct writes.
    ///
    /// # Panics
    ///
    /// Panics if either notifier is disposed.
    #[track_caller]
    pub fn bind_unidirectional(&self, source: &ValueNotifier<T>) {
        self.unbind();
        if let Err(err) = self.force_set(source.get()) {
            raise(err);
        }

        let target = Rc::downgrade(&self.inner);
        let forward = source
            .inner
            .registry
            .subscribe(move |change: &ValueChange<T>| {
                let Some(target) = target.upgrade() else {
                    return;
                };
                if let Err(err) = ValueNotifier::from_inner(target).force_set(change.new.clone()) {
                    warn!(%err, "unidirectional binding could not update its target");
                }
            });
        let forward = match forward {
            Ok(sub) => sub,
            Err(err) => raise(err),
        };

        *self.inner.binding.borrow_mut() = Some(BindingState {
            kind: BindingKind::Unidirectional,
            _subscriptions: vec![forward],
        });
    }

    /// Keep this notifier and `source` in sync in both directions.
    ///
    /// This notifier takes `source`'s value first.
    ///
    /// # Panics
    ///
    /// Panics if either notifier is disposed.
    #[track_caller]
    pub fn bind_bidirectional(&self, source: &ValueNotifier<T>) {
        self.unbind();
        if let Err(err) = self.force_set(source.get()) {
            raise(err);
        }

        let propagation = Rc::new(Cell::new(Propagation::Idle));

        let target = Rc::downgrade(&self.inner);
        let guard = Rc::clone(&propagation);
        let forward = source
            .inner
            .registry
            .subscribe(move |change: &ValueChange<T>| {
                if guard.get() != Propagation::Idle {
                    return;
                }
                let Some(target) = target.upgrade() else {
                    return;
                };
                guard.set(Propagation::FromSource);
                let result = ValueNotifier::from_inner(target).force_set(change.new.clone());
                guard.set(Propagation::Idle);
                if let Err(err) = result {
                    warn!(%err, "bidirectional binding could not update its target");
                }
            });
        let forward = match forward {
            Ok(sub) => sub,
            Err(err) => raise(err),
        };

        let origin = Rc::downgrade(&source.inner);
        let guard = Rc::clone(&propagation);
        let backward = self
            .inner
            .registry
            .subscribe(move |change: &ValueChange<T>| {
                if guard.get() != Propagation::Idle {
                    return;
                }
                let Some(origin) = origin.upgrade() else {
                    return;
                };
                guard.set(Propagation::FromTarget);
                let result = ValueNotifier::from_inner(origin).try_set(change.new.clone());
                guard.set(Propagation::Idle);
                if let Err(err) = result {
                    warn!(%err, "bidirectional binding could not update its source");
                }
            });
        let backward = match backward {
            Ok(sub) => sub,
            Err(err) => raise(err),
        };

        *self.inner.binding.borrow_mut() = Some(BindingState {
            kind: BindingKind::Bidirectional,
            _subscriptions: vec![forward, backward],
        });
    }

    /// Release the current binding. Returns whether one existed.
    pub fn unbind(&self) -> bool {
        let state = self.inner.binding.borrow_mut().take();
        // Subscriptions drop here, outside the borrow.
        state.is_some()
    }

    /// Direction of the active binding, if any.
    #[must_use]
    pub fn binding_kind(&self) -> Option<BindingKind> {
        self.inner.binding.borrow().as_ref().map(BindingState::kind)
    }

    /// Whether a binding is active.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding_kind().is_some()
    }

    pub(crate) fn is_write_locked(&self) -> bool {
        self.binding_kind() == Some(BindingKind::Unidirectional)
    }
}
