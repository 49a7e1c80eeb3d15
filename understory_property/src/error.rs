// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for property construction and mutation.

use alloc::string::String;

use thiserror::Error;

use crate::listeners::ListenerId;
use crate::validation::RuleKind;

/// A value was rejected by one of a property's validation rules.
///
/// Returned synchronously by construction, [`Property::set`](crate::Property::set)
/// and [`Property::reset`](crate::Property::reset). The property is left
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{rule} rejected value {value}: {message}")]
pub struct ValidationError {
    /// `Debug` rendering of the rejected value.
    pub value: String,
    /// Which kind of rule rejected the value.
    pub rule: RuleKind,
    /// Human-readable description of the failed rule.
    pub message: String,
}

/// The validation rules supplied for a property contradict each other.
///
/// Detected eagerly by [`PropertyOptionsBuilder::build`](crate::PropertyOptionsBuilder::build).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// An allow-list was supplied with no entries, so no value could ever be valid.
    #[error("allow-list rule has no entries")]
    EmptyAllowList,
    /// More than one allow-list rule was supplied.
    #[error("only one allow-list rule may be supplied")]
    DuplicateAllowList,
    /// Two value-type rules require different kinds.
    #[error("conflicting value-type rules: {first} and {second}")]
    ConflictingValueTypes {
        /// Kind named by the first rule.
        first: String,
        /// Kind named by the conflicting rule.
        second: String,
    },
    /// An allow-list entry fails another rule of the same property.
    #[error("allowed value {value} violates {rule}: {message}")]
    AllowListViolatesRule {
        /// `Debug` rendering of the offending entry.
        value: String,
        /// The rule the entry fails.
        rule: RuleKind,
        /// Description of the failed rule.
        message: String,
    },
}

/// Errors produced by [`Property`](crate::Property) operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// A value failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The property options are contradictory.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The property has been disposed and can no longer be written.
    #[error("property `{name}` has been disposed")]
    Disposed {
        /// Name of the disposed property.
        name: String,
    },
    /// A strict-mode property was asked to unlink a listener it does not hold.
    #[error("listener {id:?} is not registered on property `{name}`")]
    UnknownListener {
        /// Name of the property.
        name: String,
        /// The listener that was not found.
        id: ListenerId,
    },
    /// The property was disposed while a deferred value was still staged.
    ///
    /// The staged value is discarded; the property is disposed regardless.
    #[error("property `{name}` was disposed while deferred with staged value {staged}")]
    DisposedWhileDeferred {
        /// Name of the property.
        name: String,
        /// `Debug` rendering of the discarded value.
        staged: String,
    },
}
