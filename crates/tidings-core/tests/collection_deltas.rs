#![forbid(unsafe_code)]

//! Integration tests for collection notifiers working together.
//!
//! These tests validate that:
//! - Deltas describe exactly what changed, once per mutation
//! - No-op mutations stay silent
//! - Listeners can mutate other notifiers (and their own) mid-dispatch
//! - A panicking listener does not starve the rest
//! - Views over collections track their sources

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tidings_core::{
    IndexSet, ListChange, ListNotifier, MapNotifier, SetNotifier, ValueNotifier, View, listener,
};
use tracing::Level;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init();
}

#[test]
fn list_add_then_remove_reports_both_sides() {
    init_tracing();
    let list = ListNotifier::new(vec![1, 2, 3]);
    let log: Rc<RefCell<Vec<ListChange<i32>>>> = Rc::default();
    let l = Rc::clone(&log);
    let _sub = list.subscribe(move |c| l.borrow_mut().push(c.clone()));

    list.push(4);
    list.remove(&2);

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!((log[0].added.as_slice(), log[0].index), (&[4][..], 3));
    assert_eq!((log[1].removed.as_slice(), log[1].index), (&[2][..], 1));
    assert_eq!(list.value(), vec![1, 3, 4]);
}

#[test]
fn push_then_remove_restores_contents() {
    let list = ListNotifier::new(vec!['a', 'b']);
    let log: Rc<RefCell<Vec<ListChange<char>>>> = Rc::default();
    let l = Rc::clone(&log);
    let _sub = list.subscribe(move |c| l.borrow_mut().push(c.clone()));

    list.push('x');
    list.remove(&'x');

    assert_eq!(list.value(), vec!['a', 'b']);
    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].added, log[1].removed);
    assert_eq!(log[0].removed, log[1].added);
    assert_eq!(log[0].index, log[1].index);
}

#[test]
fn no_op_mutations_are_silent_everywhere() {
    let list: ListNotifier<u8> = ListNotifier::default();
    let set: SetNotifier<u8> = [1, 2].into_iter().collect();
    let map: MapNotifier<&str, u8> = [("k", 1)].into_iter().collect();

    let fired = Rc::new(Cell::new(0));
    for target in [
        &list as &dyn tidings_core::Listenable,
        &set as &dyn tidings_core::Listenable,
        &map as &dyn tidings_core::Listenable,
    ] {
        let f = Rc::clone(&fired);
        target.add_listener(listener(move || f.set(f.get() + 1)));
    }

    list.clear();
    list.sort();
    list.remove_range(0..0);
    set.extend([1, 2]);
    set.remove(&9);
    set.retain(|_| true);
    map.insert("k", 1);
    map.remove(&"nope");
    map.update(&"k", |v| *v);

    assert_eq!(fired.get(), 0);
    assert_eq!(list.version() + set.version() + map.version(), 0);
}

#[test]
fn set_algebra_deltas() {
    let tags: SetNotifier<&str> = ["rust", "ui"].into_iter().collect();
    let added: Rc<RefCell<IndexSet<&str>>> = Rc::default();
    let removed: Rc<RefCell<IndexSet<&str>>> = Rc::default();
    let (a, r) = (Rc::clone(&added), Rc::clone(&removed));
    let _sub = tags.subscribe(move |c| {
        a.borrow_mut().extend(c.added.iter().copied());
        r.borrow_mut().extend(c.removed.iter().copied());
    });

    tags.extend(["ui", "async"]);
    tags.remove_all(["rust"]);
    tags.retain_all(["async", "ui", "wasm"]);

    assert_eq!(added.borrow().iter().copied().collect::<Vec<_>>(), vec!["async"]);
    assert_eq!(removed.borrow().iter().copied().collect::<Vec<_>>(), vec!["rust"]);
    assert_eq!(tags.version(), 2);
}

#[test]
fn listener_mirrors_list_length_into_value() {
    let list = ListNotifier::new(vec!['a']);
    let count = ValueNotifier::new(list.len());
    let (src, dst) = (list.clone(), count.clone());
    list.add_listener(listener(move || dst.set(src.len())));

    list.extend(['b', 'c']);
    assert_eq!(count.get(), 3);
    list.clear();
    assert_eq!(count.get(), 0);
}

#[test]
fn listener_may_mutate_its_own_list() {
    let list = ListNotifier::new(Vec::<u32>::new());
    let handle = list.clone();
    let _sub = list.subscribe(move |c| {
        // Cap the list at two elements.
        if c.added.len() == 1 && handle.len() > 2 {
            handle.remove_at(0);
        }
    });
    list.push(1);
    list.push(2);
    list.push(3);
    assert_eq!(list.value(), vec![2, 3]);
    assert_eq!(list.version(), 4);
}

#[test]
fn panicking_listener_does_not_starve_others() {
    init_tracing();
    let map: MapNotifier<u8, u8> = MapNotifier::default();
    let reached = Rc::new(Cell::new(0));
    map.add_listener(listener(|| panic!("listener bug")));
    let r = Rc::clone(&reached);
    map.add_listener(listener(move || r.set(r.get() + 1)));

    map.insert(1, 1);
    map.insert(2, 2);
    assert_eq!(reached.get(), 2);
    assert_eq!(map.len(), 2);
}

#[test]
fn views_over_collections() {
    let cart: MapNotifier<&str, u32> = [("apple", 2)].into_iter().collect();
    let discounts = ValueNotifier::new(0_u32);
    let total = View::combine(
        &cart.view().map(|m| m.values().sum::<u32>()),
        &discounts.view(),
        |sum, off| sum.saturating_sub(off),
    );

    let rebuilds = Rc::new(Cell::new(0));
    let r = Rc::clone(&rebuilds);
    tidings_core::Listenable::add_listener(&total, listener(move || r.set(r.get() + 1)));

    cart.insert("pear", 5);
    discounts.set(3);
    assert_eq!(total.get(), 4);
    assert_eq!(rebuilds.get(), 2);
}

#[cfg(feature = "serde")]
#[test]
fn change_events_serialize() {
    use tidings_core::{MapChange, SetChange, ValueChange};

    let change = ListChange {
        added: vec![1, 2],
        removed: vec![],
        index: 4,
    };
    let json = serde_json::to_string(&change).unwrap();
    assert_eq!(json, r#"{"added":[1,2],"removed":[],"index":4}"#);
    let back: ListChange<i32> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, change);

    let v = ValueChange { new: "b", old: "a" };
    assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"new":"b","old":"a"}"#);

    let s = SetChange {
        added: IndexSet::from([3]),
        removed: IndexSet::new(),
    };
    assert_eq!(serde_json::to_string(&s).unwrap(), r#"{"added":[3],"removed":[]}"#);

    let m: MapChange<String, u8> = MapChange {
        added: vec![("k".into(), 1)],
        removed: vec![],
    };
    assert_eq!(
        serde_json::to_string(&m).unwrap(),
        r#"{"added":[["k",1]],"removed":[]}"#
    );

    let list = ListNotifier::new(vec![1, 2]);
    assert_eq!(serde_json::to_string(&list.value()).unwrap(), "[1,2]");
}
