#![forbid(unsafe_code)]

//! Error taxonomy shared by every notifier.
//!
//! Two families exist:
//!
//! - [`UsageError`]: programmer errors (operating on a disposed notifier,
//!   writing to a bound target, requiring a value that was never provided).
//!   Registry-level APIs return them as `Err`; notifier convenience methods
//!   panic with their message.
//! - [`CallbackError`]: failures raised by user code (listeners, debounced
//!   callbacks). These are isolated and reported, never propagated back into
//!   the mutating call.

use std::any::Any;
use std::fmt;

/// Programmer errors surfaced by notifiers, registries, and containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// An operation was attempted after `dispose()`.
    Disposed {
        /// Name of the disposed object (e.g. `"ValueNotifier"`).
        kind: &'static str,
    },
    /// `dispose()` was called while a dispatch was still running.
    DisposeDuringDispatch {
        /// Name of the object being disposed.
        kind: &'static str,
    },
    /// A direct write hit a unidirectionally bound target.
    BoundTarget,
    /// A required value was never provided.
    NotProvided {
        /// `std::any::type_name` of the requested value.
        type_name: &'static str,
    },
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed { kind } => write!(f, "a {kind} was used after being disposed"),
            Self::DisposeDuringDispatch { kind } => {
                write!(f, "a {kind} was disposed while dispatching to its listeners")
            }
            Self::BoundTarget => write!(
                f,
                "target is bound: cannot write to a unidirectionally bound notifier"
            ),
            Self::NotProvided { type_name } => {
                write!(f, "no value of type `{type_name}` was provided")
            }
        }
    }
}

impl std::error::Error for UsageError {}

/// Raise a usage error at the caller's location.
///
/// Used by the panicking convenience methods (`set`, `push`, ...) whose
/// fallible counterparts return the error instead.
#[track_caller]
pub(crate) fn raise(err: UsageError) -> ! {
    panic!("{err}")
}

/// A failure produced by user-supplied code.
#[derive(Debug)]
pub enum CallbackError {
    /// The callback returned an error value.
    Failed(Box<dyn std::error::Error + 'static>),
    /// The callback failed with a plain message.
    Message(String),
    /// The callback panicked; holds the panic message.
    Panicked(String),
}

impl CallbackError {
    /// Wrap any error value.
    pub fn failed(err: impl std::error::Error + 'static) -> Self {
        Self::Failed(Box::new(err))
    }

    /// Build an error from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Convert a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::Panicked(panic_message(payload.as_ref()))
    }

    /// Whether this error came from a panic.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "callback failed: {err}"),
            Self::Message(msg) => write!(f, "callback failed: {msg}"),
            Self::Panicked(msg) => write!(f, "callback panicked: {msg}"),
        }
    }
}

impl std::error::Error for CallbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
