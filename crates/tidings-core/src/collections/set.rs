#![forbid(unsafe_code)]

//! Insertion-ordered set notifier.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexSet;

use super::{Backing, listener_surface};
use crate::registry::Listener;
use crate::snapshot::Snapshot;
use crate::view::{Listenable, ValueListenable, View};

const KIND: &str = "SetNotifier";

/// Delta dispatched by [`SetNotifier`].
///
/// Both sides keep the order in which members entered or left.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound(
        serialize = "T: serde::Serialize + Hash + Eq",
        deserialize = "T: serde::Deserialize<'de> + Hash + Eq"
    ))
)]
pub struct SetChange<T> {
    /// Members that were not present before the mutation.
    pub added: IndexSet<T>,
    /// Members that were present before and are gone now.
    pub removed: IndexSet<T>,
}

impl<T: Hash + Eq> PartialEq for SetChange<T> {
    fn eq(&self, other: &Self) -> bool {
        self.added == other.added && self.removed == other.removed
    }
}

impl<T: Hash + Eq> Eq for SetChange<T> {}

impl<T: Hash + Eq> SetChange<T> {
    /// Whether the delta carries no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A shared [`IndexSet`] that reports every mutation as a [`SetChange`].
pub struct SetNotifier<T> {
    inner: Rc<Backing<IndexSet<T>, SetChange<T>>>,
}

impl<T> Clone for SetNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Eq + Hash + 'static> SetNotifier<T> {
    /// Create a notifier owning `members`.
    #[must_use]
    pub fn new(members: IndexSet<T>) -> Self {
        Self {
            inner: Rc::new(Backing::new(KIND, members)),
        }
    }

    listener_surface!(SetChange<T>);

    /// Read-only snapshot of the members.
    #[must_use]
    pub fn value(&self) -> Snapshot<IndexSet<T>> {
        self.inner.snapshot()
    }

    /// Access the members by reference.
    pub fn with<R>(&self, f: impl FnOnce(&IndexSet<T>) -> R) -> R {
        self.inner.store.with(f)
    }

    #[must_use]
    pub fn contains(&self, member: &T) -> bool {
        self.with(|set| set.contains(member))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.with(IndexSet::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only view of this notifier.
    #[must_use]
    pub fn view(&self) -> View<Snapshot<IndexSet<T>>> {
        View::of(self)
    }

    /// Add `member`. Returns `false` (and stays silent) if already present.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn insert(&self, member: T) -> bool {
        self.extend([member]) == 1
    }

    /// Add every member not yet present. Returns how many were added.
    #[track_caller]
    pub fn extend(&self, members: impl IntoIterator<Item = T>) -> usize {
        self.inner.ensure_live();
        let fresh: IndexSet<T> = self.with(|set| {
            members
                .into_iter()
                .filter(|m| !set.contains(m))
                .collect()
        });
        if fresh.is_empty() {
            return 0;
        }
        self.inner
            .store
            .mutate(|set| set.extend(fresh.iter().cloned()));
        let count = fresh.len();
        self.emit(fresh, IndexSet::new());
        count
    }

    /// Remove `member`. Returns whether it was present.
    #[track_caller]
    pub fn remove(&self, member: &T) -> bool {
        self.inner.ensure_live();
        if !self.contains(member) {
            return false;
        }
        self.remove_where(|m| m == member) == 1
    }

    /// Remove every listed member. Returns how many were present.
    #[track_caller]
    pub fn remove_all(&self, members: impl IntoIterator<Item = T>) -> usize {
        let doomed: HashSet<T> = members.into_iter().collect();
        self.remove_where(|m| doomed.contains(m))
    }

    /// Keep only members that also appear in `members`.
    #[track_caller]
    pub fn retain_all(&self, members: impl IntoIterator<Item = T>) -> usize {
        let keep: HashSet<T> = members.into_iter().collect();
        self.remove_where(|m| !keep.contains(m))
    }

    /// Keep only members matching `keep`.
    #[track_caller]
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> usize {
        self.remove_where(|m| !keep(m))
    }

    /// Remove every member matching `pred`. Returns how many were removed.
    #[track_caller]
    pub fn remove_where(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        self.inner.ensure_live();
        let doomed: IndexSet<T> =
            self.with(|set| set.iter().filter(|&m| pred(m)).cloned().collect());
        if doomed.is_empty() {
            return 0;
        }
        self.inner
            .store
            .mutate(|set| set.retain(|m| !doomed.contains(m)));
        let count = doomed.len();
        self.emit(IndexSet::new(), doomed);
        count
    }

    /// Remove every member.
    #[track_caller]
    pub fn clear(&self) {
        self.remove_where(|_| true);
    }

    #[track_caller]
    fn emit(&self, added: IndexSet<T>, removed: IndexSet<T>) {
        let change = SetChange { added, removed };
        if !change.is_empty() {
            self.inner.publish(change);
        }
    }
}

impl<T: Clone + Eq + Hash + 'static> Default for SetNotifier<T> {
    fn default() -> Self {
        Self::new(IndexSet::new())
    }
}

impl<T: Clone + Eq + Hash + 'static> FromIterator<T> for SetNotifier<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: Clone + Eq + Hash + 'static> Listenable for SetNotifier<T> {
    fn add_listener(&self, listener: Listener) {
        SetNotifier::add_listener(self, listener);
    }

    fn remove_listener(&self, listener: &Listener) -> bool {
        SetNotifier::remove_listener(self, listener)
    }
}

impl<T: Clone + Eq + Hash + 'static> ValueListenable<Snapshot<IndexSet<T>>> for SetNotifier<T> {
    fn value(&self) -> Snapshot<IndexSet<T>> {
        SetNotifier::value(self)
    }
}

impl<T: fmt::Debug + Clone + Eq + Hash + 'static> fmt::Debug for SetNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetNotifier")
            .field("members", &self.value())
            .field("version", &self.version())
            .finish()
    }
}
