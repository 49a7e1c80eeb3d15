// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Combinators over several properties.
//!
//! [`multilink`] watches a set of [`Property`] handles and calls one callback
//! with the current values of all of them. The set is anything implementing
//! [`Dependencies`]: tuples of up to six properties of mixed types, or a
//! `Vec` of properties of one type.
//!
//! ## Firing rules
//!
//! - [`multilink`] calls the callback once when attached, no matter how many
//!   sources there are.
//! - [`lazy_multilink`] skips that initial call.
//! - Afterwards, every change notification from any source calls the
//!   callback once, with every source re-read at that moment.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::listeners::ListenerId;
use crate::property::{Property, WeakProperty};

/// A listener attached to one source of a [`Multilink`].
pub struct SourceLink {
    listener: ListenerId,
    detach: Box<dyn Fn(ListenerId)>,
}

impl fmt::Debug for SourceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceLink")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl SourceLink {
    /// Lazily links `on_change` to `property`.
    pub fn attach<T: Clone + fmt::Debug + 'static>(
        property: &Property<T>,
        on_change: &Rc<dyn Fn()>,
    ) -> Self {
        let notify = Rc::clone(on_change);
        let listener = property.lazy_link(move |_, _| notify());
        let source: WeakProperty<T> = property.downgrade();
        Self {
            listener,
            detach: Box::new(move |id| {
                // A disposed source has already dropped its listeners.
                let Some(property) = source.upgrade() else {
                    return;
                };
                if property.has_listener(id) {
                    let _removed = property.unlink(id);
                }
            }),
        }
    }

    /// Returns the id of the listener on the source.
    #[must_use]
    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    fn detach(self) {
        (self.detach)(self.listener);
    }
}

/// A fixed set of properties that can be watched together.
pub trait Dependencies: Clone + 'static {
    /// The current values of every source, in source order.
    type Values;

    /// Reads every source.
    fn values(&self) -> Self::Values;

    /// Lazily links `on_change` to every source.
    fn subscribe(&self, on_change: &Rc<dyn Fn()>) -> Vec<SourceLink>;
}

macro_rules! tuple_dependencies {
    ($($ty:ident . $idx:tt),+) => {
        impl<$($ty: Clone + fmt::Debug + 'static),+> Dependencies for ($(Property<$ty>,)+) {
            type Values = ($($ty,)+);

            fn values(&self) -> Self::Values {
                ($(self.$idx.value(),)+)
            }

            fn subscribe(&self, on_change: &Rc<dyn Fn()>) -> Vec<SourceLink> {
                alloc::vec![$(SourceLink::attach(&self.$idx, on_change)),+]
            }
        }
    };
}

tuple_dependencies!(A.0);
tuple_dependencies!(A.0, B.1);
tuple_dependencies!(A.0, B.1, C.2);
tuple_dependencies!(A.0, B.1, C.2, D.3);
tuple_dependencies!(A.0, B.1, C.2, D.3, E.4);
tuple_dependencies!(A.0, B.1, C.2, D.3, E.4, F.5);

impl<T: Clone + fmt::Debug + 'static> Dependencies for Vec<Property<T>> {
    type Values = Vec<T>;

    fn values(&self) -> Self::Values {
        self.iter().map(Property::value).collect()
    }

    fn subscribe(&self, on_change: &Rc<dyn Fn()>) -> Vec<SourceLink> {
        self.iter()
            .map(|property| SourceLink::attach(property, on_change))
            .collect()
    }
}

/// Handle returned by [`multilink`] and [`lazy_multilink`].
///
/// Dropping the handle, or calling [`dispose`](Self::dispose), unlinks the
/// callback from every source.
#[must_use = "dropping a Multilink unlinks it from its sources"]
pub struct Multilink {
    links: RefCell<Vec<SourceLink>>,
}

impl fmt::Debug for Multilink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multilink")
            .field("sources", &self.links.borrow().len())
            .finish()
    }
}

impl Multilink {
    /// Returns the number of sources still linked.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.links.borrow().len()
    }

    /// Returns `true` once the callback has been unlinked from every source.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.links.borrow().is_empty()
    }

    /// Unlinks the callback from every source. Idempotent.
    pub fn dispose(&self) {
        let links = core::mem::take(&mut *self.links.borrow_mut());
        for link in links {
            link.detach();
        }
    }
}

impl Drop for Multilink {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Calls `callback` now and after every change of any source.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use understory_property::{Property, multilink};
///
/// let width = Property::new(2);
/// let height = Property::new(3);
/// let area = Rc::new(Cell::new(0));
///
/// let sink = Rc::clone(&area);
/// let link = multilink((width.clone(), height.clone()), move |(w, h)| sink.set(w * h));
/// assert_eq!(area.get(), 6);
///
/// height.set(5).unwrap();
/// assert_eq!(area.get(), 10);
///
/// link.dispose();
/// width.set(100).unwrap();
/// assert_eq!(area.get(), 10);
/// ```
pub fn multilink<D: Dependencies>(sources: D, callback: impl Fn(D::Values) + 'static) -> Multilink {
    attach(sources, callback, true)
}

/// Like [`multilink`] without the initial call.
pub fn lazy_multilink<D: Dependencies>(
    sources: D,
    callback: impl Fn(D::Values) + 'static,
) -> Multilink {
    attach(sources, callback, false)
}

fn attach<D: Dependencies>(
    sources: D,
    callback: impl Fn(D::Values) + 'static,
    eager: bool,
) -> Multilink {
    let readers = sources.clone();
    let on_change: Rc<dyn Fn()> = Rc::new(move || callback(readers.values()));
    let links = sources.subscribe(&on_change);
    tracing::trace!(sources = links.len(), eager, "multilink attached");
    if eager {
        on_change();
    }
    Multilink {
        links: RefCell::new(links),
    }
}
