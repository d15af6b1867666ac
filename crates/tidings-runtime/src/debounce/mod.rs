#![forbid(unsafe_code)]

//! Debounce and throttle scheduling.
//!
//! ```ignore
//! let search = DebounceController::new(
//!     DebounceOptions::new()
//!         .with_duration(Duration::from_millis(250))
//!         .with_consumer(move |hits: Vec<Hit>| results.set(hits)),
//! );
//!
//! // On every keystroke; only the last query in a 250ms burst runs.
//! search.debounce(move || Completion::pending_ok(fetch_hits(query)));
//! ```

mod completion;
mod config;
mod controller;

pub use completion::Completion;
pub use config::{Consumer, DEFAULT_DURATION, DebounceOptions, ErrorConsumer};
pub use controller::DebounceController;
