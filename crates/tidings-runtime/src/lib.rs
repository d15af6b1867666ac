#![forbid(unsafe_code)]

//! Runtime: timer-driven helpers for tidings notifiers.
//!
//! # Role in tidings
//! `tidings-runtime` adds time to the synchronous `tidings-core` model. It
//! schedules work on a tokio current-thread runtime through
//! [`tokio::task::spawn_local`], so every call site must run inside a
//! [`LocalSet`](tokio::task::LocalSet).
//!
//! # Primary responsibilities
//! - **DebounceController**: run the last call after a quiet window, or the
//!   first call per cooldown, and expose the busy state as a
//!   `ValueListenable<bool>`.
//! - **Completion**: the sync-or-async result a scheduled callback returns.

pub mod debounce;

pub use debounce::{Completion, DebounceController, DebounceOptions};
