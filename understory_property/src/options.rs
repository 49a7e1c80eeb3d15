// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property configuration.
//!
//! This module provides [`PropertyOptions`] for storing the per-property
//! policies and [`PropertyOptionsBuilder`] for ergonomic, validated
//! construction.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::equality::EqualityPolicy;
use crate::error::ConfigurationError;
use crate::reentrant::ReentrantPolicy;
use crate::validation::{ValidationRule, Validator};

/// Name reported for properties constructed without one.
const UNNAMED: &str = "unnamed";

/// Policies for one property.
///
/// Built with [`PropertyOptionsBuilder`]; rule consistency is checked once, in
/// [`PropertyOptionsBuilder::build`].
///
/// # Example
///
/// ```rust
/// use understory_property::{PropertyOptions, ReentrantPolicy, ValidationRule};
///
/// let options = PropertyOptions::builder()
///     .name("volume")
///     .rule(ValidationRule::predicate("0..=11", |v: &u8| *v <= 11))
///     .reentrant(ReentrantPolicy::Stack)
///     .build()
///     .unwrap();
///
/// assert_eq!(options.name(), "volume");
/// assert_eq!(options.reentrant(), ReentrantPolicy::Stack);
/// assert!(options.validator().validate(&12).is_err());
/// ```
pub struct PropertyOptions<T> {
    name: Option<String>,
    validator: Validator<T>,
    equality: EqualityPolicy<T>,
    reentrant: ReentrantPolicy,
    strict_unlink: bool,
}

impl<T: PartialEq + fmt::Debug> PropertyOptions<T> {
    /// Starts a builder using [`EqualityPolicy::structural`].
    #[must_use]
    pub fn builder() -> PropertyOptionsBuilder<T> {
        PropertyOptionsBuilder::new()
    }
}

impl<T: PartialEq> Default for PropertyOptions<T> {
    fn default() -> Self {
        Self {
            name: None,
            validator: Validator::default(),
            equality: EqualityPolicy::structural(),
            reentrant: ReentrantPolicy::default(),
            strict_unlink: false,
        }
    }
}

impl<T> PropertyOptions<T> {
    /// Returns the property name used in errors and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }

    /// Returns the composed validator.
    #[must_use]
    #[inline]
    pub fn validator(&self) -> &Validator<T> {
        &self.validator
    }

    /// Returns the equality policy.
    #[must_use]
    #[inline]
    pub fn equality(&self) -> &EqualityPolicy<T> {
        &self.equality
    }

    /// Returns the reentrant notification policy.
    #[must_use]
    #[inline]
    pub fn reentrant(&self) -> ReentrantPolicy {
        self.reentrant
    }

    /// Returns whether unlinking an unregistered listener is an error.
    #[must_use]
    #[inline]
    pub fn strict_unlink(&self) -> bool {
        self.strict_unlink
    }
}

// Rules and equality print by kind only.
impl<T: fmt::Debug> fmt::Debug for PropertyOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyOptions")
            .field("name", &self.name())
            .field("validator", &self.validator)
            .field("equality", &self.equality)
            .field("reentrant", &self.reentrant)
            .field("strict_unlink", &self.strict_unlink)
            .finish()
    }
}

/// Builder for [`PropertyOptions`].
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use understory_property::{EqualityPolicy, PropertyOptionsBuilder};
///
/// let options = PropertyOptionsBuilder::with_equality(EqualityPolicy::<Rc<str>>::identity())
///     .name("title")
///     .strict_unlink(true)
///     .build()
///     .unwrap();
/// assert!(options.strict_unlink());
/// ```
pub struct PropertyOptionsBuilder<T> {
    name: Option<String>,
    rules: Vec<ValidationRule<T>>,
    equality: EqualityPolicy<T>,
    reentrant: ReentrantPolicy,
    strict_unlink: bool,
}

impl<T: fmt::Debug> fmt::Debug for PropertyOptionsBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyOptionsBuilder")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .field("equality", &self.equality)
            .field("reentrant", &self.reentrant)
            .field("strict_unlink", &self.strict_unlink)
            .finish()
    }
}

impl<T: PartialEq + fmt::Debug> PropertyOptionsBuilder<T> {
    /// Creates a builder that compares values structurally.
    #[must_use]
    pub fn new() -> Self {
        Self::with_equality(EqualityPolicy::structural())
    }
}

impl<T: PartialEq + fmt::Debug> Default for PropertyOptionsBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> PropertyOptionsBuilder<T> {
    /// Creates a builder with an explicit equality policy.
    ///
    /// Use this for value types without `PartialEq`.
    #[must_use]
    pub fn with_equality(equality: EqualityPolicy<T>) -> Self {
        Self {
            name: None,
            rules: Vec::new(),
            equality,
            reentrant: ReentrantPolicy::default(),
            strict_unlink: false,
        }
    }

    /// Sets the name reported in errors and logs.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a validation rule. Every rule must accept a value.
    #[must_use]
    pub fn rule(mut self, rule: ValidationRule<T>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds several validation rules.
    #[must_use]
    pub fn rules(mut self, rules: impl IntoIterator<Item = ValidationRule<T>>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Replaces the equality policy.
    #[must_use]
    pub fn equality(mut self, equality: EqualityPolicy<T>) -> Self {
        self.equality = equality;
        self
    }

    /// Sets the reentrant notification policy.
    #[must_use]
    pub fn reentrant(mut self, reentrant: ReentrantPolicy) -> Self {
        self.reentrant = reentrant;
        self
    }

    /// When `true`, unlinking a listener that is not registered is an error
    /// instead of a logged no-op.
    #[must_use]
    pub fn strict_unlink(mut self, strict: bool) -> Self {
        self.strict_unlink = strict;
        self
    }

    /// Builds the [`PropertyOptions`], composing the validation rules.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the rules contradict each other.
    pub fn build(self) -> Result<PropertyOptions<T>, ConfigurationError> {
        Ok(PropertyOptions {
            name: self.name,
            validator: Validator::new(self.rules)?,
            equality: self.equality,
            reentrant: self.reentrant,
            strict_unlink: self.strict_unlink,
        })
    }
}
