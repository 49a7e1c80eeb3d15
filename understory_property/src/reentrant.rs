// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reentrant notification strategies.
//!
//! A listener may write back into the property that is notifying it. The
//! [`NotificationStrategy`] decides when that nested change is delivered:
//!
//! - [`QueueStrategy`] appends it to a FIFO work-list that the outermost
//!   delivery drains, so every listener sees changes in the order they
//!   happened.
//! - [`StackStrategy`] delivers it immediately, depth first, before the outer
//!   delivery resumes. Listeners registered after the writer observe the
//!   innermost change first.
//!
//! In both cases each listener in the snapshot taken when an event starts
//! delivery is called exactly once for that event.

use alloc::collections::VecDeque;
use core::cell::{Cell, RefCell};
use core::fmt;

/// A single value transition delivered to listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent<T> {
    /// The value after the change.
    pub new_value: T,
    /// The value before the change.
    ///
    /// `None` only for the initial call made by an eager link.
    pub old_value: Option<T>,
}

/// Selects the [`NotificationStrategy`] a property uses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReentrantPolicy {
    /// FIFO delivery of nested changes. See [`QueueStrategy`].
    #[default]
    Queue,
    /// Depth-first delivery of nested changes. See [`StackStrategy`].
    Stack,
}

impl ReentrantPolicy {
    /// Returns the strategy object for this policy.
    #[must_use]
    pub fn strategy<T: 'static>(self) -> &'static dyn NotificationStrategy<T> {
        match self {
            Self::Queue => &QueueStrategy as &'static dyn NotificationStrategy<T>,
            Self::Stack => &StackStrategy as &'static dyn NotificationStrategy<T>,
        }
    }
}

/// Per-property bookkeeping shared by the strategies.
pub struct PendingNotifications<T> {
    queue: RefCell<VecDeque<ChangeEvent<T>>>,
    draining: Cell<bool>,
    depth: Cell<usize>,
}

impl<T> Default for PendingNotifications<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PendingNotifications<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingNotifications")
            .field("queued", &self.queue.borrow().len())
            .field("draining", &self.draining.get())
            .field("depth", &self.depth.get())
            .finish()
    }
}

impl<T> PendingNotifications<T> {
    /// Creates empty bookkeeping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
            depth: Cell::new(0),
        }
    }

    /// Number of events waiting in the FIFO work-list.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Current nesting depth of deliveries.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    fn pop(&self) -> Option<ChangeEvent<T>> {
        self.queue.borrow_mut().pop_front()
    }
}

/// Tracks one level of delivery and restores the bookkeeping on unwind.
struct DeliveryGuard<'a, T> {
    pending: &'a PendingNotifications<T>,
    owns_queue: bool,
}

impl<'a, T> DeliveryGuard<'a, T> {
    fn enter(pending: &'a PendingNotifications<T>, owns_queue: bool) -> Self {
        pending.depth.set(pending.depth.get() + 1);
        if owns_queue {
            pending.draining.set(true);
        }
        Self {
            pending,
            owns_queue,
        }
    }
}

impl<T> Drop for DeliveryGuard<'_, T> {
    fn drop(&mut self) {
        self.pending.depth.set(self.pending.depth.get() - 1);
        if self.owns_queue {
            self.pending.draining.set(false);
            // Only non-empty if a listener panicked mid-drain.
            self.pending.queue.borrow_mut().clear();
        }
    }
}

/// Orders delivery of a change relative to deliveries already in progress.
pub trait NotificationStrategy<T> {
    /// Delivers `event`, now or later, by calling `deliver`.
    ///
    /// `deliver` calls every listener of the property once. It may reenter
    /// `dispatch` on the same `pending` bookkeeping.
    fn dispatch(
        &self,
        pending: &PendingNotifications<T>,
        event: ChangeEvent<T>,
        deliver: &dyn Fn(&ChangeEvent<T>),
    );
}

/// FIFO delivery: nested changes wait until the current event has reached
/// every listener.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use understory_property::{ChangeEvent, NotificationStrategy, PendingNotifications, QueueStrategy};
///
/// let pending = PendingNotifications::new();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let seen_by_deliver = Rc::clone(&seen);
/// QueueStrategy.dispatch(
///     &pending,
///     ChangeEvent { new_value: 2, old_value: Some(1) },
///     &|event: &ChangeEvent<i32>| seen_by_deliver.borrow_mut().push(event.new_value),
/// );
/// assert_eq!(*seen.borrow(), [2]);
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct QueueStrategy;

impl<T> NotificationStrategy<T> for QueueStrategy {
    fn dispatch(
        &self,
        pending: &PendingNotifications<T>,
        event: ChangeEvent<T>,
        deliver: &dyn Fn(&ChangeEvent<T>),
    ) {
        pending.queue.borrow_mut().push_back(event);
        if pending.draining.get() {
            tracing::trace!(
                queued = pending.queued(),
                "queued reentrant change notification"
            );
            return;
        }

        let _guard = DeliveryGuard::enter(pending, true);
        while let Some(next) = pending.pop() {
            deliver(&next);
        }
    }
}

/// Depth-first delivery: a nested change reaches every listener before the
/// outer delivery continues.
#[derive(Copy, Clone, Debug, Default)]
pub struct StackStrategy;

impl<T> NotificationStrategy<T> for StackStrategy {
    fn dispatch(
        &self,
        pending: &PendingNotifications<T>,
        event: ChangeEvent<T>,
        deliver: &dyn Fn(&ChangeEvent<T>),
    ) {
        let _guard = DeliveryGuard::enter(pending, false);
        if pending.depth() > 1 {
            tracing::trace!(depth = pending.depth(), "nested change notification");
        }
        deliver(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Drives `strategy` with a deliver function that re-dispatches until 5,
    /// returning the order in which events finished delivery.
    fn run(strategy: &dyn NotificationStrategy<i32>) -> Vec<(i32, i32)> {
        let pending = PendingNotifications::new();
        let finished = RefCell::new(Vec::new());

        fn deliver(
            strategy: &dyn NotificationStrategy<i32>,
            pending: &PendingNotifications<i32>,
            finished: &RefCell<Vec<(i32, i32)>>,
            event: &ChangeEvent<i32>,
        ) {
            if event.new_value < 5 {
                let next = ChangeEvent {
                    new_value: event.new_value + 1,
                    old_value: Some(event.new_value),
                };
                strategy.dispatch(pending, next, &|e: &ChangeEvent<i32>| {
                    deliver(strategy, pending, finished, e);
                });
            }
            finished
                .borrow_mut()
                .push((event.old_value.unwrap_or_default(), event.new_value));
        }

        strategy.dispatch(
            &pending,
            ChangeEvent {
                new_value: 2,
                old_value: Some(1),
            },
            &|e: &ChangeEvent<i32>| deliver(strategy, &pending, &finished, e),
        );
        assert_eq!(pending.depth(), 0);
        assert_eq!(pending.queued(), 0);
        finished.into_inner()
    }

    #[test]
    fn queue_delivers_in_order() {
        assert_eq!(
            run(ReentrantPolicy::Queue.strategy()),
            [(1, 2), (2, 3), (3, 4), (4, 5)]
        );
    }

    #[test]
    fn stack_delivers_innermost_first() {
        assert_eq!(
            run(ReentrantPolicy::Stack.strategy()),
            [(4, 5), (3, 4), (2, 3), (1, 2)]
        );
    }

    #[test]
    fn default_policy_is_queue() {
        assert_eq!(ReentrantPolicy::default(), ReentrantPolicy::Queue);
    }
}
