// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Property: observable, validated value cells.
//!
//! A [`Property<T>`] owns a value, checks every write against a
//! [`Validator`], suppresses writes that are equal under its
//! [`EqualityPolicy`], and notifies listeners of each change with the new and
//! previous value.
//!
//! ## Core Concepts
//!
//! ### Listeners
//!
//! - [`Property::link`] registers a listener and calls it at once with the
//!   current value.
//! - [`Property::lazy_link`] registers without calling.
//! - [`Property::unlink`] removes one listener by its [`ListenerId`].
//!
//! Listeners may add or remove listeners, and write to any property, while
//! being notified. Each delivery iterates the listener list as it was when
//! the delivery began.
//!
//! ### Reentrant writes
//!
//! When a listener writes to the property that is notifying it, the
//! [`ReentrantPolicy`] decides the delivery order:
//!
//! | Policy | Nested change delivered | Observed order |
//! |--------|-------------------------|----------------|
//! | [`ReentrantPolicy::Queue`] (default) | after the current event | oldest first |
//! | [`ReentrantPolicy::Stack`] | immediately, depth first | newest first |
//!
//! ### Deferred transactions
//!
//! [`Property::set_deferred`] stages writes. Leaving deferred mode commits the
//! last staged value and returns a [`DeferredNotifier`] that delivers one
//! coalesced change when the caller chooses. Coordinators such as a snapshot
//! restoration engine rely on this split between committing and notifying.
//!
//! ### Combinators
//!
//! [`multilink`] and [`lazy_multilink`] call one callback with the values of
//! several properties; [`DerivedProperty`] keeps a computed value up to date.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_property::{Property, PropertyOptions, ValidationRule};
//!
//! let options = PropertyOptions::builder()
//!     .name("percent")
//!     .rule(ValidationRule::predicate("0..=100", |v: &u32| *v <= 100))
//!     .build()
//!     .unwrap();
//! let percent = Property::with_options(50, options).unwrap();
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&log);
//! percent.lazy_link(move |new, old| sink.borrow_mut().push((*new, old.copied())));
//!
//! percent.set(75).unwrap();
//! assert!(percent.set(150).is_err());
//! assert_eq!(percent.value(), 75);
//!
//! // Deferred writes coalesce into one notification.
//! percent.set_deferred(true);
//! percent.set(10).unwrap();
//! percent.set(20).unwrap();
//! percent.set_deferred(false).unwrap().notify();
//!
//! assert_eq!(*log.borrow(), [(75, Some(50)), (20, Some(75))]);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod derived;
mod equality;
mod error;
mod listeners;
mod multilink;
mod options;
mod property;
mod reentrant;
mod validation;

pub use derived::DerivedProperty;
pub use equality::{EqualityPolicy, Identity};
pub use error::{ConfigurationError, PropertyError, ValidationError};
pub use listeners::{Listener, ListenerId, ListenerRegistry, ListenerSnapshot};
pub use multilink::{Dependencies, Multilink, SourceLink, lazy_multilink, multilink};
pub use options::{PropertyOptions, PropertyOptionsBuilder};
pub use property::{DeferredNotifier, Property, WeakProperty};
pub use reentrant::{
    ChangeEvent, NotificationStrategy, PendingNotifications, QueueStrategy, ReentrantPolicy,
    StackStrategy,
};
pub use validation::{Kinded, RuleKind, ValidationRule, Validator, ValueType};
