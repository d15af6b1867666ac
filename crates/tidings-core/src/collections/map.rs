#![forbid(unsafe_code)]

//! Insertion-ordered map notifier.
//!
//! Replacing a value reports the old entry as removed and the new entry as
//! added. Writing a value equal to the current one is a no-op.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{Backing, listener_surface};
use crate::registry::Listener;
use crate::snapshot::Snapshot;
use crate::view::{Listenable, ValueListenable, View};

const KIND: &str = "MapNotifier";

/// Delta dispatched by [`MapNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapChange<K, V> {
    /// Entries that were inserted or now hold a new value.
    pub added: Vec<(K, V)>,
    /// Entries that were removed or held the replaced value.
    pub removed: Vec<(K, V)>,
}

impl<K, V> MapChange<K, V> {
    /// Whether the delta carries no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl<K, V> Default for MapChange<K, V> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<K: Clone, V: Clone + PartialEq> MapChange<K, V> {
    /// Record that `key` moved from `old` (if any) to `new`.
    fn record(&mut self, key: &K, old: Option<V>, new: &V) {
        match old {
            Some(old) if old == *new => {}
            Some(old) => {
                self.removed.push((key.clone(), old));
                self.added.push((key.clone(), new.clone()));
            }
            None => self.added.push((key.clone(), new.clone())),
        }
    }
}

/// A shared [`IndexMap`] that reports every mutation as a [`MapChange`].
pub struct MapNotifier<K, V> {
    inner: Rc<Backing<IndexMap<K, V>, MapChange<K, V>>>,
}

impl<K, V> Clone for MapNotifier<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K, V> MapNotifier<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Create a notifier owning `entries`.
    #[must_use]
    pub fn new(entries: IndexMap<K, V>) -> Self {
        Self {
            inner: Rc::new(Backing::new(KIND, entries)),
        }
    }

    listener_surface!(MapChange<K, V>);

    /// Read-only snapshot of the entries.
    #[must_use]
    pub fn value(&self) -> Snapshot<IndexMap<K, V>> {
        self.inner.snapshot()
    }

    /// Access the entries by reference.
    pub fn with<R>(&self, f: impl FnOnce(&IndexMap<K, V>) -> R) -> R {
        self.inner.store.with(f)
    }

    /// Clone of the value under `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.with(|map| map.get(key).cloned())
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.with(|map| map.contains_key(key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.with(IndexMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only view of this notifier.
    #[must_use]
    pub fn view(&self) -> View<Snapshot<IndexMap<K, V>>> {
        View::of(self)
    }

    /// Insert or replace; returns the previous value.
    ///
    /// # Panics
    ///
    /// Panics if the notifier is disposed.
    #[track_caller]
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.ensure_live();
        let previous = self.get(&key);
        if previous.as_ref() == Some(&value) {
            return previous;
        }
        self.inner
            .store
            .mutate(|map| map.insert(key.clone(), value.clone()));
        let mut change = MapChange::default();
        change.record(&key, previous.clone(), &value);
        self.emit(change);
        previous
    }

    /// Insert every pair; the whole batch produces one event.
    ///
    /// A key repeated in `entries` keeps its last value, and the delta is
    /// taken against the contents before the call.
    #[track_caller]
    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>) {
        self.inner.ensure_live();
        let mut batch: IndexMap<K, V> = IndexMap::new();
        for (key, value) in entries {
            batch.insert(key, value);
        }
        let change = self.with(|map| {
            let mut change = MapChange::default();
            for (key, value) in &batch {
                change.record(key, map.get(key).cloned(), value);
            }
            change
        });
        if change.is_empty() {
            return;
        }
        self.inner.store.mutate(|map| map.extend(batch));
        self.emit(change);
    }

    /// Remove `key`, returning its value.
    #[track_caller]
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.ensure_live();
        if !self.contains_key(key) {
            return None;
        }
        let value = self.inner.store.mutate(|map| map.shift_remove(key))?;
        self.emit(MapChange {
            added: Vec::new(),
            removed: vec![(key.clone(), value.clone())],
        });
        Some(value)
    }

    /// Replace the value under `key` with `f(current)`.
    ///
    /// Returns the new value, or `None` (silently) if `key` is absent.
    #[track_caller]
    pub fn update(&self, key: &K, f: impl FnOnce(&V) -> V) -> Option<V> {
        self.inner.ensure_live();
        let current = self.get(key)?;
        let next = f(&current);
        self.insert(key.clone(), next.clone());
        Some(next)
    }

    /// Apply `f` to the value under `key`, or insert `default()` if absent.
    ///
    /// Returns the stored value.
    #[track_caller]
    pub fn update_or_insert_with(
        &self,
        key: K,
        f: impl FnOnce(&V) -> V,
        default: impl FnOnce() -> V,
    ) -> V {
        self.inner.ensure_live();
        let next = match self.get(&key) {
            Some(current) => f(&current),
            None => default(),
        };
        self.insert(key, next.clone());
        next
    }

    /// Value under `key`, inserting `default()` first if absent.
    #[track_caller]
    pub fn get_or_insert_with(&self, key: K, default: impl FnOnce() -> V) -> V {
        self.inner.ensure_live();
        if let Some(current) = self.get(&key) {
            return current;
        }
        let value = default();
        self.insert(key, value.clone());
        value
    }

    /// Replace every value with `f(key, value)`; one event for the batch.
    #[track_caller]
    pub fn update_all(&self, mut f: impl FnMut(&K, &V) -> V) {
        self.inner.ensure_live();
        let replacements: Vec<(K, V)> = self.with(|map| {
            map.iter()
                .filter_map(|(k, v)| {
                    let next = f(k, v);
                    (next != *v).then(|| (k.clone(), next))
                })
                .collect()
        });
        if replacements.is_empty() {
            return;
        }
        self.extend(replacements);
    }

    /// Keep only entries matching `keep`.
    #[track_caller]
    pub fn retain(&self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        self.remove_where(|k, v| !keep(k, v))
    }

    /// Remove every entry matching `pred`. Returns how many were removed.
    #[track_caller]
    pub fn remove_where(&self, mut pred: impl FnMut(&K, &V) -> bool) -> usize {
        self.inner.ensure_live();
        let doomed: Vec<bool> = self.with(|map| map.iter().map(|(k, v)| pred(k, v)).collect());
        if !doomed.contains(&true) {
            return 0;
        }
        let removed = self.inner.store.mutate(|map| {
            let mut removed = Vec::new();
            let mut flags = doomed.iter();
            map.retain(|k, v| {
                let drop_it = flags.next().copied().unwrap_or(false);
                if drop_it {
                    removed.push((k.clone(), v.clone()));
                }
                !drop_it
            });
            removed
        });
        let count = removed.len();
        self.emit(MapChange {
            added: Vec::new(),
            removed,
        });
        count
    }

    /// Remove every entry.
    #[track_caller]
    pub fn clear(&self) {
        self.remove_where(|_, _| true);
    }

    #[track_caller]
    fn emit(&self, change: MapChange<K, V>) {
        if !change.is_empty() {
            self.inner.publish(change);
        }
    }
}

impl<K, V> Default for MapNotifier<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new(IndexMap::new())
    }
}

impl<K, V> FromIterator<(K, V)> for MapNotifier<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<K, V> Listenable for MapNotifier<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    fn add_listener(&self, listener: Listener) {
        MapNotifier::add_listener(self, listener);
    }

    fn remove_listener(&self, listener: &Listener) -> bool {
        MapNotifier::remove_listener(self, listener)
    }
}

impl<K, V> ValueListenable<Snapshot<IndexMap<K, V>>> for MapNotifier<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    fn value(&self) -> Snapshot<IndexMap<K, V>> {
        MapNotifier::value(self)
    }
}

impl<K, V> fmt::Debug for MapNotifier<K, V>
where
    K: fmt::Debug + Clone + Eq + Hash + 'static,
    V: fmt::Debug + Clone + PartialEq + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapNotifier")
            .field("entries", &self.value())
            .field("version", &self.version())
            .finish()
    }
}
