#![forbid(unsafe_code)]

//! What a debounced or throttled callback hands back.
//!
//! A callback either finishes on the spot ([`Completion::Ready`]) or returns
//! a future the controller awaits ([`Completion::Pending`]). Both carry a
//! `Result`, and a panic inside the callback or its future is converted to
//! [`CallbackError::Panicked`] instead of unwinding through the controller.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tidings_core::CallbackError;

/// Outcome of invoking a callback.
pub enum Completion<T> {
    /// Finished synchronously.
    Ready(Result<T, CallbackError>),
    /// Still running; the controller awaits it.
    Pending(LocalBoxFuture<'static, Result<T, CallbackError>>),
}

impl<T: 'static> Completion<T> {
    /// Completed with `value`.
    pub fn ready(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    /// Failed with `err`.
    pub fn fail(err: CallbackError) -> Self {
        Self::Ready(Err(err))
    }

    pub fn from_result(result: Result<T, CallbackError>) -> Self {
        Self::Ready(result)
    }

    /// Await a fallible future.
    pub fn pending(fut: impl Future<Output = Result<T, CallbackError>> + 'static) -> Self {
        Self::Pending(fut.boxed_local())
    }

    /// Await an infallible future.
    pub fn pending_ok(fut: impl Future<Output = T> + 'static) -> Self {
        Self::Pending(fut.map(Ok).boxed_local())
    }

    /// Whether the callback already finished.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Await the outcome, turning a panic in the future into an error.
    pub(crate) async fn resolve(self) -> Result<T, CallbackError> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(CallbackError::from_panic(payload)),
            },
        }
    }
}

impl Completion<()> {
    /// Completed with no value.
    pub fn done() -> Self {
        Self::Ready(Ok(()))
    }
}

impl<T> From<Result<T, CallbackError>> for Completion<T> {
    fn from(result: Result<T, CallbackError>) -> Self {
        Self::Ready(result)
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(Ok(_)) => f.write_str("Completion::Ready(Ok(..))"),
            Self::Ready(Err(err)) => write!(f, "Completion::Ready(Err({err}))"),
            Self::Pending(_) => f.write_str("Completion::Pending(..)"),
        }
    }
}

/// Run `callback`, converting a synchronous panic into a failed completion.
pub(crate) fn invoke<T: 'static>(callback: impl FnOnce() -> Completion<T>) -> Completion<T> {
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(completion) => completion,
        Err(payload) => Completion::fail(CallbackError::from_panic(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn ready_variants_resolve_immediately() {
        assert_eq!(block_on(Completion::ready(3).resolve()).unwrap(), 3);
        assert!(block_on(Completion::done().resolve()).is_ok());
        let err = block_on(Completion::<u8>::fail(CallbackError::message("nope")).resolve());
        assert_eq!(err.unwrap_err().to_string(), "callback failed: nope");
    }

    #[test]
    fn pending_futures_are_awaited() {
        let c = Completion::pending_ok(async { 40 + 2 });
        assert!(!c.is_ready());
        assert_eq!(block_on(c.resolve()).unwrap(), 42);

        let c = Completion::<u8>::pending(async { Err(CallbackError::message("late")) });
        assert!(block_on(c.resolve()).is_err());
    }

    #[test]
    fn panicking_future_becomes_error() {
        let c = Completion::<u8>::pending_ok(async { panic!("async boom") });
        let err = block_on(c.resolve()).unwrap_err();
        assert!(err.is_panic());
        assert!(err.to_string().contains("async boom"));
    }

    #[test]
    fn invoke_catches_sync_panic() {
        let c = invoke::<u8>(|| panic!("sync boom"));
        let err = block_on(c.resolve()).unwrap_err();
        assert!(err.is_panic());
        assert!(err.to_string().contains("sync boom"));
    }

    #[test]
    fn from_result_conversion() {
        let c: Completion<i32> = Ok(5).into();
        assert!(c.is_ready());
        assert!(format!("{c:?}").contains("Ok"));
    }
}
