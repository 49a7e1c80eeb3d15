// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory State: ordered snapshot restoration for observable properties.
//!
//! Restoring a saved state writes many [`Property`](understory_property::Property)
//! values at once. Letting each write notify immediately would show
//! listeners half-restored state, so [`StateEngine`] splits every element's
//! update into two [`Phase`]s:
//!
//! - **[`Phase::Undefer`]**: the staged value is committed.
//! - **[`Phase::Notify`]**: listeners hear about the change.
//!
//! Application code orders these phases across elements with
//! [`StateEngine::register_dependency`]: "`a` must complete `Undefer` before
//! `b` runs `Notify`". The engine drains both phases to a fixed point,
//! honouring every dependency whose elements are both in the snapshot, and
//! reports an unsatisfiable set (a cycle) as
//! [`StateError::OrderingUnsatisfiable`] with an [`OrderingDiagnostics`]
//! report instead of looping.
//!
//! ## Building blocks
//!
//! | Type | Role |
//! |------|------|
//! | [`ElementPath`] | Hierarchical element name used as the key everywhere |
//! | [`Snapshot`] | Raw `serde_json` values per path, plus the present set |
//! | [`PhaseCallbackSets`] | Pending per-element callbacks, one set per phase |
//! | [`OrderDependencies`] | Four bidirectional [`OrderDependencyGraph`]s, one per phase pair |
//! | [`Instrumented`] | What the engine needs from an element |
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use understory_property::Property;
//! use understory_state::{ElementPath, Phase, StateEngine, StateError};
//!
//! let engine = StateEngine::new();
//! let a = Property::new(0_u32);
//! let b = Property::new(0_u32);
//! engine.instrument(ElementPath::new("a"), &a).unwrap();
//! engine.instrument(ElementPath::new("b"), &b).unwrap();
//!
//! let saved = engine.capture().unwrap();
//! a.set(5).unwrap();
//! engine.apply_snapshot(&saved).unwrap();
//! assert_eq!(a.value(), 0);
//!
//! // A cycle cannot be satisfied.
//! engine
//!     .register_dependency("a".into(), Phase::Notify, "b".into(), Phase::Undefer)
//!     .unwrap();
//! engine
//!     .register_dependency("b".into(), Phase::Notify, "a".into(), Phase::Undefer)
//!     .unwrap();
//! let mut snapshot = saved.clone();
//! snapshot.insert(ElementPath::new("a"), json!(1));
//! let err = engine.apply_snapshot(&snapshot).unwrap_err();
//! assert!(matches!(err, StateError::OrderingUnsatisfiable(_)));
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod callbacks;
mod diagnostics;
mod element;
mod engine;
mod error;
mod graph;
mod path;
mod phase;
mod snapshot;

pub use callbacks::{PhaseCallback, PhaseCallbackSet, PhaseCallbackSets};
pub use diagnostics::{OrderingDiagnostics, StallReason};
pub use element::{Instrumented, InstrumentedProperty};
pub use engine::{DEFAULT_MAX_ITERATIONS, EngineOptions, EngineState, RestoreReport, StateEngine};
pub use error::{ApplyFailure, ElementError, StateError, UsageError};
pub use graph::{Dependency, EdgeView, GraphInconsistency, OrderDependencies, OrderDependencyGraph};
pub use path::{ElementPath, SEPARATOR};
pub use phase::Phase;
pub use snapshot::Snapshot;
