#![forbid(unsafe_code)]

//! Listener-facing traits and read-only / mapped views.
//!
//! [`Listenable`] and [`ValueListenable`] are the whole surface a host UI
//! layer needs: subscribe to a rebuild signal and read the current value.
//! Every notifier implements them.
//!
//! [`View<T>`] is a read-only adapter over one or more sources. It exposes
//! the value (optionally transformed) and forwards listener registration to
//! the sources, but has no mutation API.
//!
//! # Invariants
//!
//! 1. `View::value()` always reads the sources' current state; transforms
//!    run on every read (no caching).
//! 2. A listener added to a view is registered on every source, so it fires
//!    once per source change.
//! 3. Views are `Clone`; clones share sources and transform.

use std::fmt;
use std::rc::Rc;

use crate::registry::Listener;

/// Something that can notify plain listeners.
pub trait Listenable {
    /// Register a plain listener.
    fn add_listener(&self, listener: Listener);

    /// Remove the first registration of `listener`; returns whether one was
    /// found.
    fn remove_listener(&self, listener: &Listener) -> bool;
}

/// A [`Listenable`] that also exposes a current value.
pub trait ValueListenable<T>: Listenable {
    /// Current value (a defensive snapshot for collections).
    fn value(&self) -> T;
}

/// Read-only, optionally mapped view over notifier state.
pub struct View<T> {
    read: Rc<dyn Fn() -> T>,
    sources: Rc<[Rc<dyn Listenable>]>,
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            read: Rc::clone(&self.read),
            sources: Rc::clone(&self.sources),
        }
    }
}

impl<T: 'static> View<T> {
    /// Wrap a notifier without exposing its mutation API.
    pub fn of<N>(source: &N) -> Self
    where
        N: ValueListenable<T> + Clone + 'static,
    {
        let reader = source.clone();
        let listenable: Rc<dyn Listenable> = Rc::new(source.clone());
        Self {
            read: Rc::new(move || reader.value()),
            sources: Rc::from(vec![listenable]),
        }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        (self.read)()
    }

    /// Derive a view whose value is `f` applied to this view's value.
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> View<U> {
        let read = Rc::clone(&self.read);
        View {
            read: Rc::new(move || f(read())),
            sources: Rc::clone(&self.sources),
        }
    }

    /// Derive a view from two views; listeners fire when either changes.
    pub fn combine<A: 'static, B: 'static>(
        a: &View<A>,
        b: &View<B>,
        f: impl Fn(A, B) -> T + 'static,
    ) -> Self {
        let read_a = Rc::clone(&a.read);
        let read_b = Rc::clone(&b.read);
        let sources: Vec<Rc<dyn Listenable>> =
            a.sources.iter().chain(b.sources.iter()).cloned().collect();
        Self {
            read: Rc::new(move || f(read_a(), read_b())),
            sources: Rc::from(sources),
        }
    }

    /// Number of underlying sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl<T> Listenable for View<T> {
    fn add_listener(&self, listener: Listener) {
        for source in self.sources.iter() {
            source.add_listener(Rc::clone(&listener));
        }
    }

    fn remove_listener(&self, listener: &Listener) -> bool {
        let mut removed = false;
        for source in self.sources.iter() {
            removed |= source.remove_listener(listener);
        }
        removed
    }
}

impl<T: 'static> ValueListenable<T> for View<T> {
    fn value(&self) -> T {
        self.get()
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("value", &self.get())
            .field("sources", &self.sources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::listener;
    use crate::value::ValueNotifier;
    use std::cell::Cell;

    #[test]
    fn view_reads_current_value() {
        let count = ValueNotifier::new(3);
        let view = View::of(&count);
        assert_eq!(view.get(), 3);
        count.set(7);
        assert_eq!(view.value(), 7);
    }

    #[test]
    fn mapped_view_transforms_on_read() {
        let count = ValueNotifier::new(2);
        let label = View::of(&count).map(|c| format!("items: {c}"));
        assert_eq!(label.get(), "items: 2");
        count.set(5);
        assert_eq!(label.get(), "items: 5");
    }

    #[test]
    fn mapped_view_chains() {
        let n = ValueNotifier::new(3);
        let view = View::of(&n).map(|v| v * 2).map(|v| v + 1);
        assert_eq!(view.get(), 7);
    }

    #[test]
    fn view_listeners_forward_to_source() {
        let n = ValueNotifier::new(0);
        let view = View::of(&n).map(|v| v % 2 == 0);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let l = listener(move || c.set(c.get() + 1));
        view.add_listener(Rc::clone(&l));

        n.set(1);
        n.set(2);
        assert_eq!(count.get(), 2);

        assert!(view.remove_listener(&l));
        n.set(3);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn combined_view_listens_to_both() {
        let w = ValueNotifier::new(10);
        let h = ValueNotifier::new(20);
        let area = View::combine(&View::of(&w), &View::of(&h), |a, b| a * b);
        assert_eq!(area.get(), 200);
        assert_eq!(area.source_count(), 2);

        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        area.add_listener(listener(move || c.set(c.get() + 1)));
        w.set(5);
        h.set(4);
        assert_eq!(count.get(), 2);
        assert_eq!(area.get(), 20);
    }

    #[test]
    fn debug_shows_value() {
        let n = ValueNotifier::new(42);
        let dbg = format!("{:?}", View::of(&n));
        assert!(dbg.contains("42"));
    }
}
