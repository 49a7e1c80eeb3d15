// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-only properties computed from other properties.

use core::fmt;

use crate::error::PropertyError;
use crate::listeners::ListenerId;
use crate::multilink::{Dependencies, Multilink, lazy_multilink};
use crate::options::PropertyOptions;
use crate::property::Property;

/// A property whose value is recomputed whenever one of its sources changes.
///
/// The derived value is stored in an ordinary [`Property`], so equality,
/// validation and the reentrant policy from its options apply to every
/// recomputation. Only the read and listen surface is exposed.
///
/// # Example
///
/// ```rust
/// use understory_property::{DerivedProperty, Property};
///
/// let first = Property::new(String::from("Ada"));
/// let last = Property::new(String::from("Lovelace"));
/// let full = DerivedProperty::new((first.clone(), last.clone()), |(f, l)| format!("{f} {l}"));
/// assert_eq!(full.value(), "Ada Lovelace");
///
/// last.set(String::from("Byron")).unwrap();
/// assert_eq!(full.value(), "Ada Byron");
/// ```
pub struct DerivedProperty<T> {
    output: Property<T>,
    link: Multilink,
}

impl<T: fmt::Debug> fmt::Debug for DerivedProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedProperty")
            .field("output", &self.output)
            .field("sources", &self.link.source_count())
            .finish()
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> DerivedProperty<T> {
    /// Derives a property from `sources` with structural equality.
    #[must_use]
    pub fn new<D: Dependencies>(sources: D, derive: impl Fn(D::Values) -> T + 'static) -> Self {
        let output = Property::new(derive(sources.values()));
        Self::wire(output, sources, derive)
    }
}

impl<T: Clone + fmt::Debug + 'static> DerivedProperty<T> {
    /// Derives a property from `sources` with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::Validation`] if the initial derived value is
    /// rejected.
    pub fn with_options<D: Dependencies>(
        sources: D,
        derive: impl Fn(D::Values) -> T + 'static,
        options: PropertyOptions<T>,
    ) -> Result<Self, PropertyError> {
        let output = Property::with_options(derive(sources.values()), options)?;
        Ok(Self::wire(output, sources, derive))
    }

    fn wire<D: Dependencies>(
        output: Property<T>,
        sources: D,
        derive: impl Fn(D::Values) -> T + 'static,
    ) -> Self {
        let target = output.clone();
        let link = lazy_multilink(sources, move |values| {
            if let Err(err) = target.set(derive(values)) {
                tracing::warn!(property = %target.name(), %err, "derived value rejected");
            }
        });
        Self { output, link }
    }

    /// Returns a clone of the current derived value.
    #[must_use]
    pub fn value(&self) -> T {
        self.output.value()
    }

    /// Calls `f` with a reference to the current derived value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.output.with(f)
    }

    /// See [`Property::link`].
    pub fn link(&self, listener: impl Fn(&T, Option<&T>) + 'static) -> ListenerId {
        self.output.link(listener)
    }

    /// See [`Property::lazy_link`].
    pub fn lazy_link(&self, listener: impl Fn(&T, Option<&T>) + 'static) -> ListenerId {
        self.output.lazy_link(listener)
    }

    /// See [`Property::unlink`].
    ///
    /// # Errors
    ///
    /// Same as [`Property::unlink`].
    pub fn unlink(&self, id: ListenerId) -> Result<bool, PropertyError> {
        self.output.unlink(id)
    }

    /// See [`Property::has_listener`].
    #[must_use]
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.output.has_listener(id)
    }

    /// See [`Property::listener_count`].
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.output.listener_count()
    }

    /// Detaches from the sources and disposes the output.
    ///
    /// # Errors
    ///
    /// Same as [`Property::dispose`].
    pub fn dispose(&self) -> Result<(), PropertyError> {
        self.link.dispose();
        self.output.dispose()
    }
}
