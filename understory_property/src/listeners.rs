// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered listener storage that tolerates mutation during delivery.
//!
//! Listeners live in a reference-counted, inline-allocated vector. A delivery
//! takes a [`snapshot`](ListenerRegistry::snapshot), which only bumps the
//! reference count. Adding or removing a listener while a snapshot is alive
//! copies the vector first (`Rc::make_mut`), so an in-flight delivery keeps
//! iterating the list as it was when the delivery began.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

/// Most properties have a handful of listeners.
const INLINE_LISTENERS: usize = 4;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one registered listener.
///
/// Ids are unique for the lifetime of the process, so an id obtained from one
/// property never matches a listener on another.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[must_use]
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// A change listener: receives the new value and, except for the initial
/// call of an eager link, the previous value.
pub type Listener<T> = Rc<dyn Fn(&T, Option<&T>)>;

type Entries<T> = SmallVec<[(ListenerId, Listener<T>); INLINE_LISTENERS]>;

/// A frozen view of the listeners registered when a delivery began.
pub struct ListenerSnapshot<T> {
    entries: Rc<Entries<T>>,
}

impl<T> ListenerSnapshot<T> {
    /// Iterates the listeners in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Listener<T>> + '_ {
        self.entries.iter().map(|(_, listener)| listener)
    }

    /// Returns the number of listeners in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot holds no listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> fmt::Debug for ListenerSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSnapshot")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Insertion-ordered listener set keyed by [`ListenerId`].
pub struct ListenerRegistry<T> {
    entries: RefCell<Rc<Entries<T>>>,
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: SmallVec<[ListenerId; INLINE_LISTENERS]> =
            self.entries.borrow().iter().map(|(id, _)| *id).collect();
        f.debug_struct("ListenerRegistry")
            .field("ids", &ids)
            .finish()
    }
}

impl<T> ListenerRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Rc::new(SmallVec::new())),
        }
    }

    /// Appends `listener` and returns its id.
    pub fn add(&self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId::next();
        Rc::make_mut(&mut self.entries.borrow_mut()).push((id, listener));
        id
    }

    /// Removes the listener with `id`.
    ///
    /// Returns `true` if it was registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let Some(pos) = entries.iter().position(|(existing, _)| *existing == id) else {
            return false;
        };
        Rc::make_mut(&mut entries).remove(pos);
        true
    }

    /// Returns `true` if a listener with `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.borrow().iter().any(|(existing, _)| *existing == id)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        *self.entries.borrow_mut() = Rc::new(SmallVec::new());
    }

    /// Freezes the current listener list for one delivery.
    #[must_use]
    pub fn snapshot(&self) -> ListenerSnapshot<T> {
        ListenerSnapshot {
            entries: Rc::clone(&self.entries.borrow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use core::cell::Cell;

    fn noop() -> Listener<i32> {
        Rc::new(|_, _| {})
    }

    #[test]
    fn add_remove_contains() {
        let registry = ListenerRegistry::<i32>::new();
        let a = registry.add(noop());
        let b = registry.add(noop());
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a));

        assert!(registry.remove(a));
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
        assert_eq!(registry.len(), 1);

        assert!(!registry.remove(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ids_are_unique_across_registries() {
        let first = ListenerRegistry::<i32>::new();
        let second = ListenerRegistry::<i32>::new();
        let a = first.add(noop());
        let b = second.add(noop());
        assert_ne!(a, b);
        assert!(!second.remove(a));
    }

    #[test]
    fn snapshot_is_unaffected_by_later_mutation() {
        let registry = ListenerRegistry::<i32>::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let a = registry.add(Rc::new(move |_, _| h.set(h.get() + 1)));

        let snapshot = registry.snapshot();
        registry.remove(a);
        registry.add(noop());
        registry.add(noop());

        assert_eq!(snapshot.len(), 1);
        for listener in snapshot.iter() {
            listener(&1, None);
        }
        assert_eq!(hits.get(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn preserves_insertion_order() {
        let registry = ListenerRegistry::<i32>::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..6 {
            let order = Rc::clone(&order);
            registry.add(Rc::new(move |_, _| order.borrow_mut().push(tag)));
        }
        for listener in registry.snapshot().iter() {
            listener(&0, None);
        }
        assert_eq!(*order.borrow(), [0, 1, 2, 3, 4, 5]);
    }
}
