#![forbid(unsafe_code)]

//! Debounce / throttle controller.
//!
//! # Design
//!
//! The controller holds at most one [`Session`]:
//!
//! - `Timer`: a `spawn_local`ed tokio sleep. For debounce it fires the
//!   pending callback; for throttle it ends the cooldown.
//! - `InFlight`: a callback whose completion is being awaited (a fired
//!   debounce, or a [`DebounceController::throttle_future`] call).
//!
//! Each session gets a fresh id. A completion is routed to the consumers
//! only if its id still names the current session, so cancelled or
//! replaced work is silently discarded.
//!
//! # Invariants
//!
//! 1. `is_active()` is true exactly while a session exists.
//! 2. Listeners are notified when a session starts and when one is cleared
//!    (settled, expired, or cancelled). A dropped throttle call notifies
//!    nothing.
//! 3. After `debounce` is called N times in one window, only the last
//!    callback runs, once, one window after the last call.
//! 4. A callback failure or panic never escapes into the controller; it is
//!    routed to the error consumer, or logged.
//!
//! # Failure Modes
//!
//! - **No `LocalSet`**: scheduling calls panic (tokio `spawn_local`).
//! - **Use after dispose**: every operation panics with
//!   [`UsageError::Disposed`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tidings_core::{
    CallbackError, Listenable, Listener, ListenerRegistry, Subscription, UsageError,
    ValueListenable,
};
use tokio::task::{AbortHandle, spawn_local};
use tracing::{debug, error, trace, warn};

use super::completion::{Completion, invoke};
use super::config::DebounceOptions;

const KIND: &str = "DebounceController";

#[derive(Debug)]
enum Session {
    Timer { id: u64, abort: AbortHandle },
    InFlight { id: u64 },
}

impl Session {
    fn id(&self) -> u64 {
        match self {
            Self::Timer { id, .. } | Self::InFlight { id } => *id,
        }
    }

    fn stop(self) {
        if let Self::Timer { abort, .. } = self {
            abort.abort();
        }
    }
}

struct Inner<T> {
    options: DebounceOptions<T>,
    session: RefCell<Option<Session>>,
    next_id: Cell<u64>,
    registry: Rc<ListenerRegistry<()>>,
}

impl<T: 'static> Inner<T> {
    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        id
    }

    fn is_current(&self, id: u64) -> bool {
        self.session.borrow().as_ref().map(Session::id) == Some(id)
    }

    /// Install `session`, stopping whatever it replaces.
    fn install(&self, session: Session) {
        let previous = self.session.borrow_mut().replace(session);
        if let Some(previous) = previous {
            trace!(id = previous.id(), "session replaced");
            previous.stop();
        }
    }

    /// Clear the session if `id` is still current. Returns whether it was.
    fn clear_if_current(&self, id: u64) -> bool {
        let taken = {
            let mut slot = self.session.borrow_mut();
            if slot.as_ref().map(Session::id) == Some(id) {
                slot.take()
            } else {
                None
            }
        };
        taken.is_some()
    }

    /// Turn a fired debounce timer into an in-flight session.
    fn begin_flight(&self, id: u64) -> bool {
        let mut slot = self.session.borrow_mut();
        match slot.as_ref() {
            Some(Session::Timer { id: current, .. }) if *current == id => {
                *slot = Some(Session::InFlight { id });
                true
            }
            _ => false,
        }
    }

    fn notify(&self) {
        if self.registry.is_disposed() {
            return;
        }
        if let Err(err) = self.registry.dispatch(&()) {
            warn!(%err, "could not notify debounce listeners");
        }
    }

    /// Route a completion to the consumers, or stop here if stale.
    fn settle(&self, id: u64, result: Result<T, CallbackError>) {
        if !self.is_current(id) {
            trace!(id, "stale completion dropped");
            return;
        }
        self.route(result);
        if self.clear_if_current(id) {
            debug!(id, "session settled");
            self.notify();
        }
    }

    fn route(&self, result: Result<T, CallbackError>) {
        let outcome = match result {
            Ok(value) => match &self.options.consumer {
                Some(consumer) => catch_unwind(AssertUnwindSafe(|| consumer(value))),
                None => Ok(()),
            },
            Err(err) => match &self.options.error_consumer {
                Some(consumer) => catch_unwind(AssertUnwindSafe(|| consumer(&err))),
                None => {
                    warn!(%err, "callback failed with no error consumer");
                    Ok(())
                }
            },
        };
        if let Err(payload) = outcome {
            let err = CallbackError::from_panic(payload);
            error!(%err, "result consumer panicked");
        }
    }

    fn spawn_routing(weak: Weak<Self>, completion: Completion<T>) {
        spawn_local(async move {
            let result = completion.resolve().await;
            if let Some(inner) = weak.upgrade() {
                inner.route(result);
            }
        });
    }
}

/// Coalesces bursts of calls: debounce runs the last one after a quiet
/// window, throttle runs the first one and drops the rest for a cooldown.
///
/// Cloning yields another handle to the same controller. All scheduling
/// must happen inside a tokio [`LocalSet`](tokio::task::LocalSet).
pub struct DebounceController<T = ()> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for DebounceController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> DebounceController<T> {
    #[must_use]
    pub fn new(options: DebounceOptions<T>) -> Self {
        Self {
            inner: Rc::new(Inner {
                options,
                session: RefCell::new(None),
                next_id: Cell::new(0),
                registry: Rc::new(ListenerRegistry::named(KIND)),
            }),
        }
    }

    #[must_use]
    pub fn options(&self) -> &DebounceOptions<T> {
        &self.inner.options
    }

    /// Run `callback` once the configured window passes with no further
    /// `debounce` call.
    ///
    /// # Panics
    ///
    /// Panics if disposed or called outside a `LocalSet`.
    #[track_caller]
    pub fn debounce(&self, callback: impl FnOnce() -> Completion<T> + 'static) {
        self.debounce_for(self.inner.options.duration, callback);
    }

    /// [`debounce`](Self::debounce) with an explicit window.
    ///
    /// Any current session is replaced; replaced work never reaches the
    /// consumers.
    #[track_caller]
    pub fn debounce_for(
        &self,
        duration: Duration,
        callback: impl FnOnce() -> Completion<T> + 'static,
    ) {
        self.ensure_live();
        let id = self.inner.allocate_id();
        let weak = Rc::downgrade(&self.inner);
        let handle = spawn_local(async move {
            tokio::time::sleep(duration).await;
            let completion = {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.begin_flight(id) {
                    return;
                }
                trace!(id, "debounce window elapsed");
                invoke(callback)
            };
            let result = completion.resolve().await;
            if let Some(inner) = weak.upgrade() {
                inner.settle(id, result);
            }
        });
        self.inner.install(Session::Timer {
            id,
            abort: handle.abort_handle(),
        });
        debug!(id, ?duration, "debounce scheduled");
        self.inner.notify();
    }

    /// Run `callback` now unless a cooldown is active, then start one.
    ///
    /// Returns `false` (and notifies nothing) when the call was dropped.
    /// The callback's result is routed even if the cooldown is cancelled.
    ///
    /// # Panics
    ///
    /// Panics if disposed or called outside a `LocalSet`.
    #[track_caller]
    pub fn throttle(&self, callback: impl FnOnce() -> Completion<T> + 'static) -> bool {
        self.throttle_for(self.inner.options.duration, callback)
    }

    /// [`throttle`](Self::throttle) with an explicit cooldown.
    #[track_caller]
    pub fn throttle_for(
        &self,
        duration: Duration,
        callback: impl FnOnce() -> Completion<T> + 'static,
    ) -> bool {
        self.ensure_live();
        if self.is_active() {
            trace!("throttled call dropped");
            return false;
        }
        let id = self.inner.allocate_id();
        let weak = Rc::downgrade(&self.inner);
        let handle = spawn_local(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = weak.upgrade()
                && inner.clear_if_current(id)
            {
                debug!(id, "throttle cooldown expired");
                inner.notify();
            }
        });
        self.inner.install(Session::Timer {
            id,
            abort: handle.abort_handle(),
        });
        debug!(id, ?duration, "throttle window opened");
        self.inner.notify();

        match invoke(callback) {
            Completion::Ready(result) => self.inner.route(result),
            pending => Inner::spawn_routing(Rc::downgrade(&self.inner), pending),
        }
        true
    }

    /// Run `callback` unless a previous one is still running; the session
    /// lasts until the callback's completion settles.
    ///
    /// # Panics
    ///
    /// Panics if disposed, or if the callback returns a pending future
    /// outside a `LocalSet`.
    #[track_caller]
    pub fn throttle_future(&self, callback: impl FnOnce() -> Completion<T> + 'static) -> bool {
        self.ensure_live();
        if self.is_active() {
            trace!("throttled call dropped while in flight");
            return false;
        }
        let id = self.inner.allocate_id();
        self.inner.install(Session::InFlight { id });
        debug!(id, "throttled future started");
        self.inner.notify();

        match invoke(callback) {
            Completion::Ready(result) => self.inner.settle(id, result),
            pending => {
                let weak = Rc::downgrade(&self.inner);
                spawn_local(async move {
                    let result = pending.resolve().await;
                    if let Some(inner) = weak.upgrade() {
                        inner.settle(id, result);
                    }
                });
            }
        }
        true
    }

    /// Drop the current session. In-flight callbacks keep running but their
    /// completion is discarded. Listeners are notified if a session existed.
    ///
    /// # Panics
    ///
    /// Panics if disposed.
    #[track_caller]
    pub fn cancel(&self) {
        self.ensure_live();
        let taken = self.inner.session.borrow_mut().take();
        if let Some(session) = taken {
            debug!(id = session.id(), "session cancelled");
            session.stop();
            self.inner.notify();
        }
    }

    /// Whether a timer or in-flight callback is pending.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.session.borrow().is_some()
    }

    /// Register a listener for activity changes.
    ///
    /// # Panics
    ///
    /// Panics if disposed.
    #[track_caller]
    pub fn add_listener(&self, listener: Listener) {
        if let Err(err) = self.inner.registry.add_listener(listener) {
            raise(err);
        }
    }

    pub fn remove_listener(&self, listener: &Listener) -> bool {
        self.inner.registry.remove_listener(listener)
    }

    /// Subscribe with a guard that unsubscribes on drop.
    ///
    /// # Panics
    ///
    /// Panics if disposed.
    #[track_caller]
    pub fn subscribe(&self, f: impl Fn() + 'static) -> Subscription {
        match self.inner.registry.watch(f) {
            Ok(sub) => sub,
            Err(err) => raise(err),
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Cancel silently, drop every listener, and reject further use.
    ///
    /// # Panics
    ///
    /// Panics if already disposed or called from one of this controller's
    /// listeners.
    #[track_caller]
    pub fn dispose(&self) {
        if let Err(err) = self.inner.registry.can_dispose() {
            raise(err);
        }
        let taken = self.inner.session.borrow_mut().take();
        if let Some(session) = taken {
            session.stop();
        }
        if let Err(err) = self.inner.registry.dispose() {
            raise(err);
        }
        debug!("debounce controller disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.registry.is_disposed()
    }

    #[track_caller]
    fn ensure_live(&self) {
        if self.is_disposed() {
            raise(UsageError::Disposed { kind: KIND });
        }
    }
}

impl<T: 'static> Default for DebounceController<T> {
    fn default() -> Self {
        Self::new(DebounceOptions::default())
    }
}

impl<T: 'static> Listenable for DebounceController<T> {
    fn add_listener(&self, listener: Listener) {
        DebounceController::add_listener(self, listener);
    }

    fn remove_listener(&self, listener: &Listener) -> bool {
        DebounceController::remove_listener(self, listener)
    }
}

impl<T: 'static> ValueListenable<bool> for DebounceController<T> {
    fn value(&self) -> bool {
        self.is_active()
    }
}

impl<T: 'static> fmt::Debug for DebounceController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceController")
            .field("active", &self.is_active())
            .field("duration", &self.inner.options.duration)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[track_caller]
fn raise(err: UsageError) -> ! {
    panic!("{err}")
}
