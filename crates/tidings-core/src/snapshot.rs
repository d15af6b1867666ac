#![forbid(unsafe_code)]

//! Read-only, copy-on-write projections of notifier state.
//!
//! Notifiers keep their backing structure in an `Rc`. [`Snapshot`] hands out
//! a clone of that `Rc` and only implements `Deref`, so holders cannot
//! mutate through it. The next mutation on the notifier goes through
//! `Rc::make_mut`, which copies the structure if any snapshot is still
//! alive. A snapshot therefore never reflects later mutations.

use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// Immutable view of a notifier's state at the time it was taken.
pub struct Snapshot<C> {
    inner: Rc<C>,
}

impl<C> Snapshot<C> {
    pub(crate) fn new(inner: Rc<C>) -> Self {
        Self { inner }
    }

    /// Clone the underlying structure into an owned value.
    #[must_use]
    pub fn to_owned_value(&self) -> C
    where
        C: Clone,
    {
        (*self.inner).clone()
    }

    /// Whether two snapshots share storage (no mutation happened between
    /// them).
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<C> Clone for Snapshot<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C> Deref for Snapshot<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C> AsRef<C> for Snapshot<C> {
    fn as_ref(&self) -> &C {
        &self.inner
    }
}

impl<C: fmt::Debug> fmt::Debug for Snapshot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl<C: PartialEq> PartialEq for Snapshot<C> {
    fn eq(&self, other: &Self) -> bool {
        *self.inner == *other.inner
    }
}

impl<C: Eq> Eq for Snapshot<C> {}

impl<C: PartialEq> PartialEq<C> for Snapshot<C> {
    fn eq(&self, other: &C) -> bool {
        *self.inner == *other
    }
}

impl<'a, C> IntoIterator for &'a Snapshot<C>
where
    &'a C: IntoIterator,
{
    type Item = <&'a C as IntoIterator>::Item;
    type IntoIter = <&'a C as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        (&*self.inner).into_iter()
    }
}

#[cfg(feature = "serde")]
impl<C: serde::Serialize> serde::Serialize for Snapshot<C> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (*self.inner).serialize(serializer)
    }
}

/// Copy-on-write cell owning a notifier's backing structure.
pub(crate) struct CowCell<C> {
    inner: RefCell<Rc<C>>,
}

impl<C: Clone> CowCell<C> {
    pub(crate) fn new(value: C) -> Self {
        Self {
            inner: RefCell::new(Rc::new(value)),
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot<C> {
        Snapshot::new(Rc::clone(&self.inner.borrow()))
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.borrow())
    }

    /// Mutate in place, copying first if a snapshot still shares storage.
    ///
    /// The borrow is released before returning, so callers may dispatch
    /// afterwards.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let mut slot = self.inner.borrow_mut();
        f(Rc::make_mut(&mut slot))
    }
}
