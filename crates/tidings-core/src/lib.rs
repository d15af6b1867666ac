#![forbid(unsafe_code)]

//! Core: listener dispatch, observable values, and observable collections.
//!
//! # Role in tidings
//! `tidings-core` is the synchronous half of the library. It owns the
//! reentrancy-safe [`ListenerRegistry`] and every notifier built on it.
//! Timer-driven pieces (debounce / throttle) live in `tidings-runtime`.
//!
//! # Primary responsibilities
//! - **ListenerRegistry**: ordered, duplicate-tolerant listener storage that
//!   survives listeners mutating it mid-dispatch.
//! - **ValueNotifier**: a scalar with `PartialEq` change detection, old/new
//!   change events, and uni/bidirectional bindings.
//! - **MutableNotifier**: a value whose mutation closure decides whether to
//!   notify.
//! - **ListNotifier / SetNotifier / MapNotifier**: collections that report
//!   added/removed deltas and hand out copy-on-write [`Snapshot`]s.
//! - **View**: read-only and mapped adapters for UI code.
//!
//! # Threading
//! Everything here is single-threaded (`Rc` / `RefCell`); notifiers are
//! neither `Send` nor `Sync`.

pub mod binding;
pub mod collections;
pub mod error;
pub mod mutable;
pub mod providers;
pub mod registry;
pub mod snapshot;
pub mod value;
pub mod view;

pub use binding::BindingKind;
pub use collections::{
    ListChange, ListNotifier, MapChange, MapNotifier, SetChange, SetNotifier,
};
pub use error::{CallbackError, UsageError};
pub use mutable::{Mutation, MutableNotifier};
pub use providers::Providers;
pub use registry::{
    ChangeListener, Listener, ListenerRegistry, Subscription, change_listener, listener,
};
pub use snapshot::Snapshot;
pub use value::{ValueChange, ValueNotifier};
pub use view::{Listenable, ValueListenable, View};

// Re-exported so callers can name snapshot and delta types.
pub use indexmap::{IndexMap, IndexSet};
