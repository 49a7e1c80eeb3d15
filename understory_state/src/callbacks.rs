// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pending phase callbacks.
//!
//! During a restoration pass every participating element owns at most one
//! pending callback per [`Phase`]. [`PhaseCallbackSets`] holds one
//! insertion-ordered [`PhaseCallbackSet`] per phase. Inserting a second
//! callback for the same element and phase keeps the first and drops the new
//! one. Ordering between callbacks is decided by the order dependencies, not
//! by these sets.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashSet;

use crate::path::ElementPath;
use crate::phase::Phase;

/// A deferred action for one element and phase.
pub struct PhaseCallback {
    path: ElementPath,
    phase: Phase,
    action: Box<dyn FnOnce()>,
}

impl fmt::Debug for PhaseCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseCallback")
            .field("path", &self.path)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl PhaseCallback {
    /// Creates a callback that runs `action` for `path` in `phase`.
    pub fn new(path: ElementPath, phase: Phase, action: impl FnOnce() + 'static) -> Self {
        Self {
            path,
            phase,
            action: Box::new(action),
        }
    }

    /// The element this callback belongs to.
    #[must_use]
    pub fn path(&self) -> &ElementPath {
        &self.path
    }

    /// The phase this callback completes.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the action.
    pub fn run(self) {
        (self.action)();
    }
}

/// Insertion-ordered callbacks for one phase, at most one per element.
#[derive(Debug, Default)]
pub struct PhaseCallbackSet {
    entries: Vec<PhaseCallback>,
    members: HashSet<ElementPath>,
}

impl PhaseCallbackSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `callback` unless one for the same element is already present.
    ///
    /// Returns `true` if it was added.
    pub fn insert(&mut self, callback: PhaseCallback) -> bool {
        if !self.members.insert(callback.path.clone()) {
            return false;
        }
        self.entries.push(callback);
        true
    }

    /// Removes and returns the callback for `path`.
    pub fn remove(&mut self, path: &ElementPath) -> Option<PhaseCallback> {
        if !self.members.remove(path) {
            return None;
        }
        let pos = self.entries.iter().position(|c| &c.path == path)?;
        Some(self.entries.remove(pos))
    }

    /// Returns `true` if a callback for `path` is pending.
    #[must_use]
    pub fn contains(&self, path: &ElementPath) -> bool {
        self.members.contains(path)
    }

    /// Iterates pending callbacks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PhaseCallback> + '_ {
        self.entries.iter()
    }

    /// Iterates the elements with a pending callback, in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &ElementPath> + '_ {
        self.entries.iter().map(|c| &c.path)
    }

    /// Number of pending callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every pending callback without running it.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.members.clear();
    }
}

/// One [`PhaseCallbackSet`] per [`Phase`].
///
/// # Example
///
/// ```rust
/// use understory_state::{ElementPath, Phase, PhaseCallback, PhaseCallbackSets};
///
/// let mut sets = PhaseCallbackSets::new();
/// let path = ElementPath::new("sim.count");
/// assert!(sets.add_callback(PhaseCallback::new(path.clone(), Phase::Undefer, || {})));
/// assert!(!sets.add_callback(PhaseCallback::new(path.clone(), Phase::Undefer, || {})));
/// assert!(sets.add_callback(PhaseCallback::new(path, Phase::Notify, || {})));
/// assert_eq!(sets.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct PhaseCallbackSets {
    sets: [PhaseCallbackSet; 2],
}

impl PhaseCallbackSets {
    /// Creates empty sets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `callback` to the set for its phase, collapsing duplicates.
    ///
    /// Returns `true` if it was added.
    pub fn add_callback(&mut self, callback: PhaseCallback) -> bool {
        let phase = callback.phase;
        let added = self.sets[phase.index()].insert(callback);
        if !added {
            tracing::warn!(%phase, "duplicate phase callback ignored");
        }
        added
    }

    /// Number of pending callbacks across both phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.iter().map(PhaseCallbackSet::len).sum()
    }

    /// Returns `true` if both phases are drained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.iter().all(PhaseCallbackSet::is_empty)
    }

    /// Visits every pending callback, [`Phase::Undefer`] first.
    pub fn for_each(&self, mut visitor: impl FnMut(&PhaseCallback)) {
        for set in &self.sets {
            set.iter().for_each(&mut visitor);
        }
    }

    /// Returns the set for `phase`.
    #[must_use]
    pub fn set_for_phase(&self, phase: Phase) -> &PhaseCallbackSet {
        &self.sets[phase.index()]
    }

    /// Returns the set for `phase` mutably.
    pub fn set_for_phase_mut(&mut self, phase: Phase) -> &mut PhaseCallbackSet {
        &mut self.sets[phase.index()]
    }

    /// Drops every pending callback without running it.
    pub fn clear(&mut self) {
        self.sets.iter_mut().for_each(PhaseCallbackSet::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;

    fn path(s: &str) -> ElementPath {
        ElementPath::new(s)
    }

    #[test]
    fn first_insert_wins() {
        let hits = Rc::new(Cell::new(0));
        let mut set = PhaseCallbackSet::new();
        let first = Rc::clone(&hits);
        let second = Rc::clone(&hits);
        assert!(set.insert(PhaseCallback::new(path("a"), Phase::Undefer, move || first.set(1))));
        assert!(!set.insert(PhaseCallback::new(path("a"), Phase::Undefer, move || second.set(2))));
        assert_eq!(set.len(), 1);

        set.remove(&path("a")).unwrap().run();
        assert_eq!(hits.get(), 1);
        assert!(set.is_empty());
        assert!(!set.contains(&path("a")));
    }

    #[test]
    fn keeps_insertion_order() {
        let mut set = PhaseCallbackSet::new();
        for name in ["c", "a", "b"] {
            set.insert(PhaseCallback::new(path(name), Phase::Notify, || {}));
        }
        set.remove(&path("a"));
        let order: Vec<_> = set.paths().map(ElementPath::as_str).collect();
        assert_eq!(order, ["c", "b"]);
    }

    #[test]
    fn visits_both_phases() {
        let mut sets = PhaseCallbackSets::new();
        sets.add_callback(PhaseCallback::new(path("b"), Phase::Notify, || {}));
        sets.add_callback(PhaseCallback::new(path("a"), Phase::Undefer, || {}));
        sets.add_callback(PhaseCallback::new(path("b"), Phase::Undefer, || {}));

        let mut seen = vec![];
        sets.for_each(|c| seen.push((c.path().clone(), c.phase())));
        assert_eq!(
            seen,
            [
                (path("a"), Phase::Undefer),
                (path("b"), Phase::Undefer),
                (path("b"), Phase::Notify)
            ]
        );
        assert_eq!(sets.len(), 3);
        assert_eq!(sets.set_for_phase(Phase::Undefer).len(), 2);

        sets.clear();
        assert!(sets.is_empty());
    }
}
