#![forbid(unsafe_code)]

//! Options for [`DebounceController`](super::DebounceController).

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tidings_core::CallbackError;

/// Window used when no explicit duration is given.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(300);

/// Receives the value a callback completed with.
pub type Consumer<T> = Rc<dyn Fn(T)>;

/// Receives the error a callback failed (or panicked) with.
pub type ErrorConsumer = Rc<dyn Fn(&CallbackError)>;

/// Configuration for a debounce/throttle controller.
pub struct DebounceOptions<T> {
    /// Debounce delay and throttle cooldown. Default: 300ms.
    pub duration: Duration,

    /// Called with each routed success value. Default: none (values are
    /// dropped).
    pub consumer: Option<Consumer<T>>,

    /// Called with each routed failure. Default: none (failures are logged
    /// at `warn` level and dropped).
    pub error_consumer: Option<ErrorConsumer>,
}

impl<T> Default for DebounceOptions<T> {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            consumer: None,
            error_consumer: None,
        }
    }
}

impl<T> Clone for DebounceOptions<T> {
    fn clone(&self) -> Self {
        Self {
            duration: self.duration,
            consumer: self.consumer.clone(),
            error_consumer: self.error_consumer.clone(),
        }
    }
}

impl<T> DebounceOptions<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn with_consumer(mut self, consumer: impl Fn(T) + 'static) -> Self {
        self.consumer = Some(Rc::new(consumer));
        self
    }

    #[must_use]
    pub fn with_error_consumer(mut self, consumer: impl Fn(&CallbackError) + 'static) -> Self {
        self.error_consumer = Some(Rc::new(consumer));
        self
    }
}

impl<T> fmt::Debug for DebounceOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceOptions")
            .field("duration", &self.duration)
            .field("consumer", &self.consumer.is_some())
            .field("error_consumer", &self.error_consumer.is_some())
            .finish()
    }
}
