// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The observable value cell.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use core::cell::RefCell;
use core::fmt;

use crate::error::PropertyError;
use crate::listeners::{Listener, ListenerId, ListenerRegistry};
use crate::options::PropertyOptions;
use crate::reentrant::{ChangeEvent, PendingNotifications};

struct ValueState<T> {
    value: T,
    initial: T,
    deferred: bool,
    /// Last value written while deferred.
    staged: Option<T>,
    disposed: bool,
}

struct PropertyInner<T> {
    state: RefCell<ValueState<T>>,
    listeners: ListenerRegistry<T>,
    pending: PendingNotifications<T>,
    options: PropertyOptions<T>,
}

/// An observable, validated value cell.
///
/// Cloning a `Property` creates a new handle to the **same** cell. All access
/// happens on one thread; listeners may read and write any property,
/// including the one notifying them (see [`ReentrantPolicy`](crate::ReentrantPolicy)).
///
/// # Invariants
///
/// 1. The current value always satisfies the property's validator.
/// 2. A write equal to the current value (per the
///    [`EqualityPolicy`](crate::EqualityPolicy)) changes nothing and notifies
///    nobody.
/// 3. While deferred, writes are staged; the current value and listeners are
///    untouched until [`set_deferred(false)`](Self::set_deferred).
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use understory_property::Property;
///
/// let count = Property::new(7);
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let log = Rc::clone(&seen);
/// let id = count.lazy_link(move |new, old| log.borrow_mut().push((*new, old.copied())));
///
/// count.set(8).unwrap();
/// count.unlink(id).unwrap();
/// count.set(9).unwrap();
///
/// assert_eq!(*seen.borrow(), [(8, Some(7))]);
/// ```
pub struct Property<T> {
    inner: Rc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Property")
            .field("name", &self.inner.options.name())
            .field("value", &state.value)
            .field("deferred", &state.deferred)
            .field("staged", &state.staged)
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> Property<T> {
    /// Creates an unnamed property with no validation rules and structural
    /// equality.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::from_parts(initial, PropertyOptions::default())
    }
}

impl<T: Clone + fmt::Debug + 'static> Property<T> {
    /// Creates a property with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::Validation`] if `initial` fails validation.
    pub fn with_options(initial: T, options: PropertyOptions<T>) -> Result<Self, PropertyError> {
        options.validator().validate(&initial)?;
        Ok(Self::from_parts(initial, options))
    }

    fn from_parts(initial: T, options: PropertyOptions<T>) -> Self {
        Self {
            inner: Rc::new(PropertyInner {
                state: RefCell::new(ValueState {
                    value: initial.clone(),
                    initial,
                    deferred: false,
                    staged: None,
                    disposed: false,
                }),
                listeners: ListenerRegistry::new(),
                pending: PendingNotifications::new(),
                options,
            }),
        }
    }

    /// Returns the property name used in errors and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.options.name()
    }

    /// Returns the property's options.
    #[must_use]
    pub fn options(&self) -> &PropertyOptions<T> {
        &self.inner.options
    }

    /// Returns a clone of the current value.
    ///
    /// While deferred this is still the value from before the deferral began.
    #[must_use]
    pub fn value(&self) -> T {
        self.inner.state.borrow().value.clone()
    }

    /// Calls `f` with a reference to the current value.
    ///
    /// `f` must not write to this property.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.borrow().value)
    }

    /// Returns a clone of the value the property was created with.
    #[must_use]
    pub fn initial_value(&self) -> T {
        self.inner.state.borrow().initial.clone()
    }

    /// Writes a new value.
    ///
    /// The value is validated first. While deferred it is staged; otherwise,
    /// unless it equals the current value, it replaces the current value and
    /// listeners are notified before this returns (or, for a nested write
    /// under [`ReentrantPolicy::Queue`](crate::ReentrantPolicy::Queue), after
    /// the in-progress notification finishes).
    ///
    /// # Errors
    ///
    /// - [`PropertyError::Disposed`] if the property was disposed.
    /// - [`PropertyError::Validation`] if a rule rejects `value`; nothing changes.
    pub fn set(&self, value: T) -> Result<(), PropertyError> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        self.inner.options.validator().validate(&value)?;

        let current = {
            let mut state = self.inner.state.borrow_mut();
            if state.deferred {
                state.staged = Some(value);
                return Ok(());
            }
            state.value.clone()
        };
        // No borrow is held here: a custom equality may read this property.
        if self.inner.options.equality().equal(&current, &value) {
            return Ok(());
        }
        let old = core::mem::replace(&mut self.inner.state.borrow_mut().value, value);
        self.notify_listeners(Some(old));
        Ok(())
    }

    /// Writes the initial value back. See [`set`](Self::set).
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn reset(&self) -> Result<(), PropertyError> {
        self.set(self.initial_value())
    }

    /// Enters or leaves deferred mode.
    ///
    /// Entering returns `None`. Leaving commits the last staged value
    /// immediately, so [`value`](Self::value) reports it at once, and returns
    /// a [`DeferredNotifier`] that delivers the single coalesced change
    /// `(last staged value, value before deferral)` when invoked. If nothing
    /// was staged, or the staged value equals the current value, leaving
    /// returns `None` and nobody is notified.
    pub fn set_deferred(&self, deferred: bool) -> Option<DeferredNotifier<T>> {
        let (current, staged) = {
            let mut state = self.inner.state.borrow_mut();
            if deferred {
                if state.deferred {
                    tracing::warn!(property = %self.name(), "property is already deferred");
                }
                state.deferred = true;
                return None;
            }
            if !state.deferred {
                return None;
            }
            state.deferred = false;
            let staged = state.staged.take()?;
            (state.value.clone(), staged)
        };
        if self.inner.options.equality().equal(&current, &staged) {
            return None;
        }
        let old_value = core::mem::replace(&mut self.inner.state.borrow_mut().value, staged);
        Some(DeferredNotifier {
            property: Rc::downgrade(&self.inner),
            old_value,
        })
    }

    /// Returns `true` while writes are being staged.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.inner.state.borrow().deferred
    }

    /// Registers `listener` and immediately calls it with the current value
    /// and no previous value.
    pub fn link(&self, listener: impl Fn(&T, Option<&T>) + 'static) -> ListenerId {
        let listener: Listener<T> = Rc::new(listener);
        let id = self.inner.listeners.add(Rc::clone(&listener));
        let current = self.value();
        listener(&current, None);
        id
    }

    /// Registers `listener` without calling it.
    pub fn lazy_link(&self, listener: impl Fn(&T, Option<&T>) + 'static) -> ListenerId {
        self.inner.listeners.add(Rc::new(listener))
    }

    /// Removes the listener registered as `id`.
    ///
    /// Returns `Ok(true)` if it was removed. An unknown `id` is a logged
    /// no-op returning `Ok(false)`, unless the property was built with
    /// [`strict_unlink`](crate::PropertyOptionsBuilder::strict_unlink).
    ///
    /// # Errors
    ///
    /// [`PropertyError::UnknownListener`] in strict mode when `id` is not registered.
    pub fn unlink(&self, id: ListenerId) -> Result<bool, PropertyError> {
        if self.inner.listeners.remove(id) {
            return Ok(true);
        }
        if self.inner.options.strict_unlink() {
            return Err(PropertyError::UnknownListener {
                name: String::from(self.name()),
                id,
            });
        }
        tracing::warn!(
            property = %self.name(),
            listener = id.as_u64(),
            "unlink of a listener that is not registered"
        );
        Ok(false)
    }

    /// Returns `true` if `id` is registered on this property.
    #[must_use]
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.contains(id)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Releases the property: listeners are dropped and further writes fail.
    ///
    /// Disposing twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`PropertyError::DisposedWhileDeferred`] if a value was still staged.
    /// The staged value is discarded and the property is disposed anyway.
    pub fn dispose(&self) -> Result<(), PropertyError> {
        let staged = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            state.deferred = false;
            state.staged.take()
        };
        self.inner.listeners.clear();
        match staged {
            Some(staged) => Err(PropertyError::DisposedWhileDeferred {
                name: String::from(self.name()),
                staged: format!("{staged:?}"),
            }),
            None => Ok(()),
        }
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    /// Creates a non-owning handle to this property.
    #[must_use]
    pub fn downgrade(&self) -> WeakProperty<T> {
        WeakProperty {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns `true` if both handles refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn disposed_error(&self) -> PropertyError {
        PropertyError::Disposed {
            name: String::from(self.name()),
        }
    }

    fn notify_listeners(&self, old_value: Option<T>) {
        if self.inner.listeners.is_empty() {
            return;
        }
        let event = ChangeEvent {
            new_value: self.value(),
            old_value,
        };
        let inner = &*self.inner;
        let strategy = inner.options.reentrant().strategy::<T>();
        strategy.dispatch(&inner.pending, event, &|event: &ChangeEvent<T>| {
            let listeners = inner.listeners.snapshot();
            for listener in listeners.iter() {
                listener(&event.new_value, event.old_value.as_ref());
            }
        });
    }
}

/// A non-owning handle to a [`Property`].
pub struct WeakProperty<T> {
    inner: Weak<PropertyInner<T>>,
}

impl<T> Clone for WeakProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakProperty")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<T> WeakProperty<T> {
    /// Returns a strong handle if the property is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Property<T>> {
        self.inner.upgrade().map(|inner| Property { inner })
    }
}

/// Delivers the coalesced change of a finished deferral.
///
/// Returned by [`Property::set_deferred(false)`](Property::set_deferred). The
/// new value is already committed; listeners are only told when
/// [`notify`](Self::notify) is called. Coordinators such as a snapshot
/// restoration pass use this to decide *when* each property announces its
/// change.
#[must_use = "listeners are not notified until `notify` is called"]
pub struct DeferredNotifier<T> {
    property: Weak<PropertyInner<T>>,
    old_value: T,
}

impl<T: fmt::Debug> fmt::Debug for DeferredNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredNotifier")
            .field("old_value", &self.old_value)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + fmt::Debug + 'static> DeferredNotifier<T> {
    /// Returns the value from before the deferral began.
    #[must_use]
    pub fn old_value(&self) -> &T {
        &self.old_value
    }

    /// Notifies listeners with `(current value, value before deferral)`.
    ///
    /// Does nothing if the property has been dropped or disposed.
    pub fn notify(self) {
        let Some(inner) = self.property.upgrade() else {
            return;
        };
        let property = Property { inner };
        if !property.is_disposed() {
            property.notify_listeners(Some(self.old_value));
        }
    }

    /// Converts into a type-erased callback.
    #[must_use]
    pub fn into_callback(self) -> Box<dyn FnOnce()> {
        Box::new(move || self.notify())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equality::EqualityPolicy;
    use crate::reentrant::ReentrantPolicy;
    use crate::validation::{RuleKind, ValidationRule};
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::Cell;

    type Log<T> = Rc<RefCell<Vec<(T, Option<T>)>>>;

    fn record<T: Clone + fmt::Debug + 'static>(property: &Property<T>) -> (Log<T>, ListenerId) {
        let log: Log<T> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let id = property.lazy_link(move |new, old| sink.borrow_mut().push((new.clone(), old.cloned())));
        (log, id)
    }

    #[test]
    fn set_notifies_with_old_and_new() {
        let p = Property::new(1);
        let (log, _) = record(&p);
        p.set(2).unwrap();
        p.set(3).unwrap();
        assert_eq!(*log.borrow(), [(2, Some(1)), (3, Some(2))]);
        assert_eq!(p.value(), 3);
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let p = Property::new(5);
        let (log, _) = record(&p);
        p.set(5).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn link_then_unlink_scenario() {
        let p = Property::new(7);
        let (log, id) = record(&p);
        p.set(8).unwrap();
        assert!(p.unlink(id).unwrap());
        p.set(9).unwrap();
        assert_eq!(*log.borrow(), [(8, Some(7))]);
    }

    #[test]
    fn unlink_removes_exactly_one_listener() {
        let p = Property::new(0);
        let a = p.lazy_link(|_, _| {});
        let b = p.lazy_link(|_, _| {});
        let c = p.lazy_link(|_, _| {});
        assert_eq!(p.listener_count(), 3);

        assert!(p.unlink(b).unwrap());
        assert_eq!(p.listener_count(), 2);
        assert!(p.has_listener(a));
        assert!(!p.has_listener(b));
        assert!(p.has_listener(c));
    }

    #[test]
    fn unlink_unknown_listener_is_lenient_by_default() {
        let p = Property::new(0);
        let id = p.lazy_link(|_, _| {});
        assert!(p.unlink(id).unwrap());
        assert!(!p.unlink(id).unwrap());
    }

    #[test]
    fn unlink_unknown_listener_errors_in_strict_mode() {
        let options = PropertyOptions::builder()
            .name("strict")
            .strict_unlink(true)
            .build()
            .unwrap();
        let p = Property::with_options(0, options).unwrap();
        let id = p.lazy_link(|_, _| {});
        p.unlink(id).unwrap();
        let err = p.unlink(id).unwrap_err();
        assert_eq!(
            err,
            PropertyError::UnknownListener {
                name: "strict".into(),
                id
            }
        );
    }

    #[test]
    fn eager_link_calls_immediately_without_old_value() {
        let p = Property::new(String::from("a"));
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        p.link(move |new: &String, old| sink.borrow_mut().push((new.clone(), old.cloned())));
        p.set(String::from("b")).unwrap();
        assert_eq!(
            *calls.borrow(),
            [
                (String::from("a"), None),
                (String::from("b"), Some(String::from("a")))
            ]
        );
    }

    #[test]
    fn validation_fails_on_construction_and_set() {
        let options = || {
            PropertyOptions::builder()
                .rule(ValidationRule::predicate("even", |v: &i32| v % 2 == 0))
                .build()
                .unwrap()
        };
        let err = Property::with_options(3, options()).unwrap_err();
        let PropertyError::Validation(err) = err else {
            panic!("expected a validation error");
        };
        assert_eq!(err.rule, RuleKind::Predicate);
        assert_eq!(err.value, "3");

        let p = Property::with_options(2, options()).unwrap();
        let (log, _) = record(&p);
        assert!(matches!(p.set(5), Err(PropertyError::Validation(_))));
        assert_eq!(p.value(), 2);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn deferred_writes_coalesce_into_one_notification() {
        let p = Property::new(1);
        let (log, _) = record(&p);

        assert!(p.set_deferred(true).is_none());
        p.set(2).unwrap();
        p.set(3).unwrap();
        p.set(4).unwrap();
        assert_eq!(p.value(), 1);
        assert!(log.borrow().is_empty());

        let notifier = p.set_deferred(false).expect("a value was staged");
        assert_eq!(p.value(), 4);
        assert_eq!(*notifier.old_value(), 1);
        assert!(log.borrow().is_empty());

        notifier.notify();
        assert_eq!(*log.borrow(), [(4, Some(1))]);
    }

    #[test]
    fn deferral_without_writes_returns_none() {
        let p = Property::new(1);
        p.set_deferred(true);
        assert!(p.is_deferred());
        assert!(p.set_deferred(false).is_none());
        assert!(!p.is_deferred());
    }

    #[test]
    fn deferral_back_to_original_value_returns_none() {
        let p = Property::new(1);
        let (log, _) = record(&p);
        p.set_deferred(true);
        p.set(2).unwrap();
        p.set(1).unwrap();
        assert!(p.set_deferred(false).is_none());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn deferred_writes_are_still_validated() {
        let options = PropertyOptions::builder()
            .rule(ValidationRule::valid_values([1, 2]))
            .build()
            .unwrap();
        let p = Property::with_options(1, options).unwrap();
        p.set_deferred(true);
        assert!(p.set(3).is_err());
        assert!(p.set_deferred(false).is_none());
    }

    fn incrementing(policy: ReentrantPolicy, ceiling: i32) -> Vec<(i32, i32)> {
        let options = PropertyOptions::builder().reentrant(policy).build().unwrap();
        let p = Property::with_options(1, options).unwrap();

        let writer = p.downgrade();
        p.lazy_link(move |new, _| {
            if *new < ceiling {
                let p = writer.upgrade().expect("property is alive");
                p.set(new + 1).unwrap();
            }
        });

        let observed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&observed);
        p.lazy_link(move |new, old| {
            sink.borrow_mut().push((*old.expect("change has an old value"), *new));
        });

        p.set(2).unwrap();
        assert_eq!(p.value(), ceiling);
        observed.take()
    }

    #[test]
    fn queue_policy_delivers_in_increasing_order() {
        assert_eq!(
            incrementing(ReentrantPolicy::Queue, 6),
            [(1, 2), (2, 3), (3, 4), (4, 5), (5, 6)]
        );
    }

    #[test]
    fn stack_policy_delivers_deepest_change_first() {
        assert_eq!(
            incrementing(ReentrantPolicy::Stack, 6),
            [(5, 6), (4, 5), (3, 4), (2, 3), (1, 2)]
        );
    }

    #[test]
    fn every_listener_sees_each_event_once() {
        let p = Property::new(0);
        let late_calls = Rc::new(Cell::new(0));
        let late = Rc::clone(&late_calls);
        let adder = p.clone();
        let first_calls = Rc::new(Cell::new(0));
        let first = Rc::clone(&first_calls);
        p.lazy_link(move |_, _| {
            first.set(first.get() + 1);
            let late = Rc::clone(&late);
            adder.lazy_link(move |_, _| late.set(late.get() + 1));
        });

        p.set(1).unwrap();
        // The listener added during delivery does not see the event that added it.
        assert_eq!(first_calls.get(), 1);
        assert_eq!(late_calls.get(), 0);

        p.set(2).unwrap();
        assert_eq!(first_calls.get(), 2);
        assert_eq!(late_calls.get(), 1);
        assert_eq!(p.listener_count(), 3);
    }

    #[test]
    fn listener_removed_during_delivery_still_sees_current_event() {
        let p = Property::new(0);
        let hits = Rc::new(Cell::new(0));
        let victim_slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let remover = p.clone();
        let slot = Rc::clone(&victim_slot);
        p.lazy_link(move |_, _| {
            if let Some(id) = slot.take() {
                remover.unlink(id).unwrap();
            }
        });
        let h = Rc::clone(&hits);
        let victim = p.lazy_link(move |_, _| h.set(h.get() + 1));
        victim_slot.set(Some(victim));

        p.set(1).unwrap();
        assert_eq!(hits.get(), 1);
        p.set(2).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn structural_equality_suppresses_equal_contents() {
        let p = Property::new(Rc::new(vec![1, 2]));
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        p.lazy_link(move |_, _| c.set(c.get() + 1));

        p.set(Rc::new(vec![1, 2])).unwrap();
        assert_eq!(calls.get(), 0);
        p.set(Rc::new(vec![2, 1])).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn identity_equality_notifies_for_new_allocations() {
        let options = PropertyOptions::builder()
            .equality(EqualityPolicy::identity())
            .build()
            .unwrap();
        let shared = Rc::new(vec![1, 2]);
        let p = Property::with_options(Rc::clone(&shared), options).unwrap();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        p.lazy_link(move |_, _| c.set(c.get() + 1));

        p.set(Rc::clone(&shared)).unwrap();
        assert_eq!(calls.get(), 0);
        p.set(Rc::new(vec![1, 2])).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn custom_equality_may_read_the_same_property() {
        let slot: Rc<RefCell<Option<WeakProperty<i32>>>> = Rc::default();
        let reads = Rc::new(Cell::new(0));
        let (s, r) = (Rc::clone(&slot), Rc::clone(&reads));
        let options = PropertyOptions::builder()
            .equality(EqualityPolicy::custom(move |a: &i32, b: &i32| {
                if let Some(p) = s.borrow().as_ref().and_then(WeakProperty::upgrade) {
                    r.set(r.get() + 1);
                    assert_eq!(p.value(), *a);
                }
                a == b
            }))
            .build()
            .unwrap();
        let p = Property::with_options(1, options).unwrap();
        *slot.borrow_mut() = Some(p.downgrade());
        let (log, _) = record(&p);

        p.set(1).unwrap();
        p.set(2).unwrap();
        p.set_deferred(true);
        p.set(3).unwrap();
        p.set_deferred(false).expect("value was staged").notify();

        assert_eq!(reads.get(), 3);
        assert_eq!(p.value(), 3);
        assert_eq!(*log.borrow(), [(2, Some(1)), (3, Some(2))]);
    }

    #[test]
    fn reset_restores_initial_value() {
        let p = Property::new(10);
        let (log, _) = record(&p);
        p.set(11).unwrap();
        p.reset().unwrap();
        assert_eq!(p.value(), 10);
        assert_eq!(p.initial_value(), 10);
        assert_eq!(*log.borrow(), [(11, Some(10)), (10, Some(11))]);
    }

    #[test]
    fn dispose_reports_staged_value() {
        let p = Property::new(1);
        p.lazy_link(|_, _| {});
        p.set_deferred(true);
        p.set(2).unwrap();

        let err = p.dispose().unwrap_err();
        assert!(matches!(err, PropertyError::DisposedWhileDeferred { ref staged, .. } if staged == "2"));
        assert!(p.is_disposed());
        assert_eq!(p.listener_count(), 0);
        assert_eq!(p.value(), 1);
        assert!(matches!(p.set(3), Err(PropertyError::Disposed { .. })));
        assert!(p.dispose().is_ok());
    }

    #[test]
    fn notifier_after_dispose_does_nothing() {
        let p = Property::new(1);
        let (log, _) = record(&p);
        p.set_deferred(true);
        p.set(2).unwrap();
        let notifier = p.set_deferred(false).unwrap();
        p.dispose().unwrap();
        notifier.notify();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn clones_share_state() {
        let a = Property::new(1);
        let b = a.clone();
        b.set(2).unwrap();
        assert_eq!(a.value(), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Property::new(2)));
    }

    #[test]
    fn weak_handle_does_not_keep_property_alive() {
        let p = Property::new(1);
        let weak = p.downgrade();
        assert!(weak.upgrade().is_some());
        drop(p);
        assert!(weak.upgrade().is_none());
    }
}
