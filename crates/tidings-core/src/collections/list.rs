#![forbid(unsafe_code)]

//! Ordered list notifier.
//!
//! Each [`ListChange`] reports the removed elements, the added elements,
//! and the lowest index the mutation touched. Reordering operations
//! (`sort*`, `shuffle*`) on a non-empty list report the whole resulting
//! contents as both added and removed at index 0.

use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeBounds;
use std::rc::Rc;

use rand::Rng;
use rand::seq::SliceRandom;

use super::{Backing, listener_surface, resolve_range};
use crate::snapshot::Snapshot;
use crate::view::{Listenable, ValueListenable, View};

const KIND: &str = "ListNotifier";

/// Delta dispatched by [`ListNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListChange<T> {
    /// Elements that entered the list, in list order.
    pub added: Vec<T>,
    /// Elements that left the list, in their former order.
    pub removed: Vec<T>,
    /// Lowest index affected.
    pub index: usize,
}

impl<T> ListChange<T> {
    /// Whether the delta carries no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A shared `Vec<T>` that reports every mutation as a [`ListChange`].
pub struct ListNotifier<T> {
    inner: Rc<Backing<Vec<T>, ListChange<T>>>,
}

impl<T> Clone for ListNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ListNotifier<T> {
    /// Create a notifier owning `items`.
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(Backing::new(KIND, items)),
        }
    }

    listener_surface!(ListChange<T>);

    // --- reads ---

    /// Read-only snapshot of the contents.
    #[must_use]
    pub fn value(&self) -> Snapshot<Vec<T>> {
        self.inner.snapshot()
    }

    /// Access the contents by reference.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.inner.store.with(|items| f(items.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.with(<[T]>::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.with(|items| items.get(index).cloned())
    }

    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.with(|items| items.contains(item))
    }

    /// Read-only view of this notifier.
    #[must_use]
    pub fn view(&self) -> View<Snapshot<Vec<T>>> {
        View::of(self)
    }

    // --- single-element edits ---

    /// Append `item`.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn push(&self, item: T) {
        self.inner.ensure_live();
        let index = self.inner.store.mutate(|items| {
            items.push(item.clone());
            items.len() - 1
        });
        self.emit(vec![item], Vec::new(), index);
    }

    /// Remove and return the last element.
    #[track_caller]
    pub fn pop(&self) -> Option<T> {
        self.inner.ensure_live();
        if self.is_empty() {
            return None;
        }
        let (index, item) = self.inner.store.mutate(|items| {
            let item = items.pop();
            (items.len(), item)
        });
        let item = item?;
        self.emit(Vec::new(), vec![item.clone()], index);
        Some(item)
    }

    /// Insert `item` at `index`, shifting later elements.
    ///
    /// # Panics
    ///
    /// Panics if disposed or `index > len`.
    #[track_caller]
    pub fn insert(&self, index: usize, item: T) {
        self.inner.ensure_live();
        let len = self.len();
        assert!(index <= len, "insert index {index} out of bounds for length {len}");
        self.inner
            .store
            .mutate(|items| items.insert(index, item.clone()));
        self.emit(vec![item], Vec::new(), index);
    }

    /// Replace the element at `index`, returning the previous one.
    ///
    /// Writing an equal value is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if disposed or `index >= len`.
    #[track_caller]
    pub fn set(&self, index: usize, item: T) -> T {
        self.inner.ensure_live();
        let len = self.len();
        assert!(index < len, "set index {index} out of bounds for length {len}");
        let current = self.with(|items| items[index].clone());
        if current == item {
            return current;
        }
        let old = self
            .inner
            .store
            .mutate(|items| std::mem::replace(&mut items[index], item.clone()));
        self.emit(vec![item], vec![old.clone()], index);
        old
    }

    /// Remove the first element equal to `item`.
    #[track_caller]
    pub fn remove(&self, item: &T) -> bool {
        self.inner.ensure_live();
        match self.with(|items| items.iter().position(|x| x == item)) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    /// Remove and return the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if disposed or `index >= len`.
    #[track_caller]
    pub fn remove_at(&self, index: usize) -> T {
        self.inner.ensure_live();
        let len = self.len();
        assert!(index < len, "remove index {index} out of bounds for length {len}");
        let item = self.inner.store.mutate(|items| items.remove(index));
        self.emit(Vec::new(), vec![item.clone()], index);
        item
    }

    // --- bulk edits ---

    /// Insert all of `items` at `index`, preserving their order.
    ///
    /// # Panics
    ///
    /// Panics if disposed or `index > len`.
    #[track_caller]
    pub fn insert_all(&self, index: usize, items: impl IntoIterator<Item = T>) {
        self.inner.ensure_live();
        let len = self.len();
        assert!(index <= len, "insert index {index} out of bounds for length {len}");
        let added: Vec<T> = items.into_iter().collect();
        if added.is_empty() {
            return;
        }
        self.inner.store.mutate(|current| {
            current.splice(index..index, added.iter().cloned());
        });
        self.emit(added, Vec::new(), index);
    }

    /// Append all of `items`.
    #[track_caller]
    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        let index = self.len();
        self.insert_all(index, items);
    }

    /// Overwrite elements starting at `index` with `items`.
    ///
    /// # Panics
    ///
    /// Panics if disposed or the written range runs past the end.
    #[track_caller]
    pub fn set_all(&self, index: usize, items: impl IntoIterator<Item = T>) {
        let added: Vec<T> = items.into_iter().collect();
        self.replace_checked(index..index + added.len(), added);
    }

    /// Remove and return the elements in `range`.
    ///
    /// # Panics
    ///
    /// Panics if disposed or the range is out of bounds.
    #[track_caller]
    pub fn remove_range(&self, range: impl RangeBounds<usize>) -> Vec<T> {
        self.inner.ensure_live();
        let range = resolve_range(range, self.len());
        if range.is_empty() {
            return Vec::new();
        }
        let start = range.start;
        let removed: Vec<T> = self
            .inner
            .store
            .mutate(|items| items.drain(range).collect());
        self.emit(Vec::new(), removed.clone(), start);
        removed
    }

    /// Replace the elements in `range` with `items` (lengths may differ).
    ///
    /// # Panics
    ///
    /// Panics if disposed or the range is out of bounds.
    #[track_caller]
    pub fn replace_range(
        &self,
        range: impl RangeBounds<usize>,
        items: impl IntoIterator<Item = T>,
    ) {
        self.inner.ensure_live();
        let range = resolve_range(range, self.len());
        let added: Vec<T> = items.into_iter().collect();
        self.splice_range(range, added);
    }

    /// Overwrite every element in `range` with clones of `item`.
    ///
    /// # Panics
    ///
    /// Panics if disposed or the range is out of bounds.
    #[track_caller]
    pub fn fill_range(&self, range: impl RangeBounds<usize>, item: T) {
        self.inner.ensure_live();
        let range = resolve_range(range, self.len());
        let added = vec![item; range.len()];
        self.splice_range(range, added);
    }

    /// Keep only the elements matching `keep`.
    #[track_caller]
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) {
        self.remove_where(|item| !keep(item));
    }

    /// Remove every element matching `pred`, returning how many were removed.
    #[track_caller]
    pub fn remove_where(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        self.inner.ensure_live();
        let doomed: Vec<bool> = self.with(|items| items.iter().map(&mut pred).collect());
        let Some(index) = doomed.iter().position(|d| *d) else {
            return 0;
        };
        let removed = self.inner.store.mutate(|items| {
            let mut removed = Vec::new();
            let mut flags = doomed.iter();
            items.retain(|item| {
                let drop_it = flags.next().copied().unwrap_or(false);
                if drop_it {
                    removed.push(item.clone());
                }
                !drop_it
            });
            removed
        });
        let count = removed.len();
        self.emit(Vec::new(), removed, index);
        count
    }

    /// Shorten the list to `len` elements; no-op if already shorter.
    #[track_caller]
    pub fn truncate(&self, len: usize) {
        self.inner.ensure_live();
        if len >= self.len() {
            return;
        }
        self.remove_range(len..);
    }

    /// Grow with clones of `fill` or shrink to `new_len`.
    #[track_caller]
    pub fn resize(&self, new_len: usize, fill: T) {
        self.inner.ensure_live();
        let len = self.len();
        match new_len.cmp(&len) {
            Ordering::Equal => {}
            Ordering::Less => self.truncate(new_len),
            Ordering::Greater => self.extend(std::iter::repeat_n(fill, new_len - len)),
        }
    }

    /// Remove every element.
    #[track_caller]
    pub fn clear(&self) {
        self.remove_range(..);
    }

    // --- reordering ---

    /// Sort ascending.
    #[track_caller]
    pub fn sort(&self)
    where
        T: Ord,
    {
        self.reorder(|items| items.sort());
    }

    /// Sort with a comparator.
    #[track_caller]
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) {
        self.reorder(|items| items.sort_by(compare));
    }

    /// Sort by a derived key.
    #[track_caller]
    pub fn sort_by_key<K: Ord>(&self, key: impl FnMut(&T) -> K) {
        self.reorder(|items| items.sort_by_key(key));
    }

    /// Shuffle with the thread-local generator.
    #[track_caller]
    pub fn shuffle(&self) {
        self.shuffle_with(&mut rand::rng());
    }

    /// Shuffle with a caller-supplied generator.
    #[track_caller]
    pub fn shuffle_with<R: Rng + ?Sized>(&self, rng: &mut R) {
        self.reorder(|items| items.shuffle(rng));
    }

    // --- internals ---

    #[track_caller]
    fn replace_checked(&self, range: std::ops::Range<usize>, added: Vec<T>) {
        self.inner.ensure_live();
        let len = self.len();
        assert!(
            range.end <= len,
            "range {}..{} out of bounds for length {len}",
            range.start,
            range.end
        );
        self.splice_range(range, added);
    }

    /// Splice `added` over `range`; identical replacement dispatches nothing.
    #[track_caller]
    fn splice_range(&self, range: std::ops::Range<usize>, added: Vec<T>) {
        let unchanged = self.with(|items| items[range.clone()] == added[..]);
        if unchanged {
            return;
        }
        let start = range.start;
        let removed: Vec<T> = self
            .inner
            .store
            .mutate(|items| items.splice(range, added.iter().cloned()).collect());
        self.emit(added, removed, start);
    }

    #[track_caller]
    fn reorder(&self, f: impl FnOnce(&mut Vec<T>)) {
        self.inner.ensure_live();
        if self.is_empty() {
            return;
        }
        let contents = self.inner.store.mutate(|items| {
            f(items);
            items.clone()
        });
        self.emit(contents.clone(), contents, 0);
    }

    #[track_caller]
    fn emit(&self, added: Vec<T>, removed: Vec<T>, index: usize) {
        let change = ListChange {
            added,
            removed,
            index,
        };
        if change.is_empty() {
            return;
        }
        self.inner.publish(change);
    }
}

impl<T: Clone + PartialEq + 'static> Default for ListNotifier<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: Clone + PartialEq + 'static> From<Vec<T>> for ListNotifier<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Clone + PartialEq + 'static> FromIterator<T> for ListNotifier<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: Clone + PartialEq + 'static> Listenable for ListNotifier<T> {
    fn add_listener(&self, listener: crate::registry::Listener) {
        ListNotifier::add_listener(self, listener);
    }

    fn remove_listener(&self, listener: &crate::registry::Listener) -> bool {
        ListNotifier::remove_listener(self, listener)
    }
}

impl<T: Clone + PartialEq + 'static> ValueListenable<Snapshot<Vec<T>>> for ListNotifier<T> {
    fn value(&self) -> Snapshot<Vec<T>> {
        ListNotifier::value(self)
    }
}

impl<T: fmt::Debug + Clone + PartialEq + 'static> fmt::Debug for ListNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListNotifier")
            .field("items", &self.value())
            .field("version", &self.version())
            .finish()
    }
}
