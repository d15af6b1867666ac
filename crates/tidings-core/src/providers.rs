#![forbid(unsafe_code)]

//! Type-keyed container for handing notifiers to UI code.
//!
//! A host layer registers one value per type (usually a cloneable notifier
//! handle) and widgets look it up by type. Looking up a type that was never
//! provided is a usage error, reported by [`Providers::require`].
//!
//! ```ignore
//! let providers = Providers::new();
//! providers.provide(ValueNotifier::new(0_u32));
//!
//! let counter = providers.require::<ValueNotifier<u32>>()?;
//! counter.set(1);
//! ```

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::error::UsageError;

/// Values keyed by their concrete type.
#[derive(Default)]
pub struct Providers {
    values: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

impl Providers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value`, returning the value it replaced.
    pub fn provide<T: 'static>(&self, value: T) -> Option<T> {
        trace!(type_name = type_name::<T>(), "providing value");
        let previous = self
            .values
            .borrow_mut()
            .insert(TypeId::of::<T>(), Box::new(value));
        previous.and_then(|boxed| boxed.downcast::<T>().ok()).map(|b| *b)
    }

    /// Clone of the provided `T`, if any.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.values
            .borrow()
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    /// Clone of the provided `T`.
    ///
    /// # Errors
    ///
    /// [`UsageError::NotProvided`] if no `T` was provided.
    pub fn require<T: Clone + 'static>(&self) -> Result<T, UsageError> {
        self.get::<T>().ok_or(UsageError::NotProvided {
            type_name: type_name::<T>(),
        })
    }

    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.values.borrow().contains_key(&TypeId::of::<T>())
    }

    /// Remove and return the provided `T`.
    pub fn remove<T: 'static>(&self) -> Option<T> {
        let removed = self.values.borrow_mut().remove(&TypeId::of::<T>());
        removed.and_then(|boxed| boxed.downcast::<T>().ok()).map(|b| *b)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers")
            .field("len", &self.len())
            .finish()
    }
}
