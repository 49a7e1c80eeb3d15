// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for registration and restoration.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use thiserror::Error;
use understory_property::PropertyError;

use crate::diagnostics::OrderingDiagnostics;
use crate::path::ElementPath;
use crate::phase::Phase;

/// An engine API was called in a way that can never succeed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UsageError {
    /// A restoration pass is already running.
    #[error("a restoration pass is already in progress")]
    RestoreInProgress,
    /// An element was made to wait for its own phase.
    #[error("{path} cannot depend on its own {phase} phase")]
    SelfDependency {
        /// The element.
        path: ElementPath,
        /// The phase named on both sides.
        phase: Phase,
    },
    /// An element is already instrumented under this path.
    #[error("an element is already instrumented at {path}")]
    DuplicateElement {
        /// The contested path.
        path: ElementPath,
    },
    /// No element is instrumented under this path.
    #[error("no element is instrumented at {path}")]
    UnknownElement {
        /// The missing path.
        path: ElementPath,
    },
}

/// Why one element could not be read or written.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ElementError {
    /// The raw snapshot value does not deserialize into the element's type.
    #[error("value does not deserialize: {0}")]
    Deserialize(String),
    /// The element's value does not serialize.
    #[error("value does not serialize: {0}")]
    Serialize(String),
    /// The element rejected the value.
    #[error(transparent)]
    Property(#[from] PropertyError),
    /// The snapshot names a path with no instrumented element.
    #[error("no element is instrumented at this path")]
    NotInstrumented,
}

/// A snapshot value that could not be applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ApplyFailure {
    /// The element the value was meant for.
    pub path: ElementPath,
    /// What went wrong.
    pub error: ElementError,
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

/// Errors returned by [`StateEngine`](crate::StateEngine).
#[derive(Debug, Error)]
pub enum StateError {
    /// The call was invalid in the engine's current state.
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// The drain loop could not finish under the registered dependencies.
    ///
    /// The pass was abandoned. Elements whose [`Phase::Undefer`] had not run
    /// are still deferred.
    #[error("restoration ordering is unsatisfiable: {0}")]
    OrderingUnsatisfiable(Box<OrderingDiagnostics>),
    /// Some snapshot values could not be applied.
    ///
    /// The pass still drained: every other value was committed and notified.
    #[error("{} snapshot value(s) could not be applied", .failures.len())]
    Apply {
        /// One entry per rejected value, in path order.
        failures: Vec<ApplyFailure>,
    },
    /// An element's value could not be captured.
    #[error("cannot capture {path}: {source}")]
    Capture {
        /// The element.
        path: ElementPath,
        /// What went wrong.
        source: ElementError,
    },
}
