// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The snapshot restoration engine.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use hashbrown::HashSet;
use serde::Serialize;
use serde::de::DeserializeOwned;
use smallvec::SmallVec;
use understory_property::Property;

use crate::callbacks::{PhaseCallback, PhaseCallbackSets};
use crate::diagnostics::{OrderingDiagnostics, StallReason};
use crate::element::{Instrumented, InstrumentedProperty};
use crate::error::{ApplyFailure, ElementError, StateError, UsageError};
use crate::graph::{Dependency, GraphInconsistency, OrderDependencies};
use crate::path::ElementPath;
use crate::phase::Phase;
use crate::snapshot::Snapshot;

/// Default bound on drain iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 5000;

/// Engine configuration.
///
/// # Example
///
/// ```rust
/// use understory_state::EngineOptions;
///
/// let options = EngineOptions::default().max_iterations(100);
/// assert_eq!(options.iteration_limit(), 100);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    max_iterations: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl EngineOptions {
    /// Sets the bound on drain iterations.
    #[must_use]
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Returns the bound on drain iterations.
    #[must_use]
    pub fn iteration_limit(&self) -> usize {
        self.max_iterations
    }
}

/// Where the engine is in a restoration pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No pass is running.
    #[default]
    Idle,
    /// Elements are being deferred and snapshot values applied.
    Deferring,
    /// Phase callbacks are being drained.
    Draining,
}

/// Summary of a successful restoration pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Elements deferred by this pass.
    pub deferred: usize,
    /// Snapshot values applied.
    pub applied: usize,
    /// Phase callbacks executed.
    pub callbacks: usize,
    /// Drain iterations.
    pub iterations: usize,
}

type Registry = BTreeMap<ElementPath, Rc<dyn Instrumented>>;

/// The elements taking part in one restoration pass.
struct PassScope<'a> {
    snapshot: &'a Snapshot,
    /// Elements this pass deferred and queued an `Undefer` callback for.
    participants: HashSet<ElementPath>,
}

impl PassScope<'_> {
    /// Only edges between two live elements constrain the drain. Anything
    /// else never gets phase callbacks this pass and so never completes.
    fn is_live(&self, path: &ElementPath) -> bool {
        self.snapshot.is_present(path) && self.participants.contains(path)
    }
}

struct EngineInner {
    elements: RefCell<Registry>,
    dependencies: RefCell<OrderDependencies>,
    callbacks: RefCell<PhaseCallbackSets>,
    state: Cell<EngineState>,
    options: EngineOptions,
}

/// Coordinates restoration of a [`Snapshot`] across instrumented elements.
///
/// A pass moves through [`EngineState::Deferring`] and
/// [`EngineState::Draining`] back to [`EngineState::Idle`]:
///
/// 1. Every instrumented element that is not already deferred is deferred,
///    and an [`Phase::Undefer`] callback is queued for it.
/// 2. Each snapshot value is written into its element, where it is staged.
/// 3. The drain loop repeatedly runs every eligible `Undefer` callback, then
///    every eligible [`Phase::Notify`] callback. Undeferring an element
///    commits its value and queues its `Notify` callback.
///
/// A callback is eligible when every registered dependency it waits on has
/// completed, counting only dependencies whose two elements both take part in
/// the pass: present in the snapshot and deferred by this pass. An element's `Notify` also always waits for its own
/// `Undefer`. Callbacks run with no engine state borrowed, so listeners may
/// read and write properties, register dependencies, or query the engine.
///
/// Clones share the same engine.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use serde_json::json;
/// use understory_property::Property;
/// use understory_state::{ElementPath, Phase, Snapshot, StateEngine};
///
/// let engine = StateEngine::new();
/// let width = Property::new(1.0_f64);
/// let area = Property::new(1.0_f64);
/// let w = ElementPath::new("sim.width");
/// let a = ElementPath::new("sim.area");
/// engine.instrument(w.clone(), &width).unwrap();
/// engine.instrument(a.clone(), &area).unwrap();
///
/// // Listeners of `area` may only run once `width` holds its restored value.
/// engine
///     .register_dependency(w.clone(), Phase::Undefer, a.clone(), Phase::Notify)
///     .unwrap();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// let width_reader = width.clone();
/// area.lazy_link(move |area, _| sink.borrow_mut().push((*area, width_reader.value())));
///
/// let mut snapshot = Snapshot::new();
/// snapshot.insert(w, json!(3.0));
/// snapshot.insert(a, json!(9.0));
/// engine.apply_snapshot(&snapshot).unwrap();
///
/// assert_eq!(*seen.borrow(), [(9.0, 3.0)]);
/// ```
#[derive(Clone)]
pub struct StateEngine {
    inner: Rc<EngineInner>,
}

impl fmt::Debug for StateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEngine")
            .field("state", &self.inner.state.get())
            .field("elements", &self.inner.elements.borrow().len())
            .field("dependencies", &self.inner.dependencies.borrow().len())
            .field("pending_callbacks", &self.inner.callbacks.borrow().len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Default for StateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateEngine {
    /// Creates an engine with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Creates an engine with `options`.
    #[must_use]
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                elements: RefCell::new(BTreeMap::new()),
                dependencies: RefCell::new(OrderDependencies::new()),
                callbacks: RefCell::new(PhaseCallbackSets::new()),
                state: Cell::new(EngineState::Idle),
                options,
            }),
        }
    }

    /// Returns the engine's options.
    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.inner.options
    }

    /// Returns the current pass state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.inner.state.get()
    }

    /// Returns `true` while a restoration pass is running.
    #[must_use]
    pub fn is_restoring(&self) -> bool {
        self.state() != EngineState::Idle
    }

    /// Number of phase callbacks not yet run.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }

    // --- elements ---

    /// Instruments `property` under `path`.
    ///
    /// # Errors
    ///
    /// [`UsageError::DuplicateElement`] if `path` is taken.
    pub fn instrument<T>(&self, path: ElementPath, property: &Property<T>) -> Result<(), StateError>
    where
        T: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static,
    {
        self.instrument_element(path, Rc::new(InstrumentedProperty::new(property.clone())))
    }

    /// Instruments a custom element under `path`.
    ///
    /// # Errors
    ///
    /// [`UsageError::DuplicateElement`] if `path` is taken.
    pub fn instrument_element(
        &self,
        path: ElementPath,
        element: Rc<dyn Instrumented>,
    ) -> Result<(), StateError> {
        let mut elements = self.inner.elements.borrow_mut();
        if elements.contains_key(&path) {
            return Err(UsageError::DuplicateElement { path }.into());
        }
        tracing::trace!(%path, "element instrumented");
        elements.insert(path, element);
        Ok(())
    }

    /// Removes the element at `path` and every dependency naming it.
    ///
    /// # Errors
    ///
    /// - [`UsageError::RestoreInProgress`] during a pass.
    /// - [`UsageError::UnknownElement`] if nothing is instrumented at `path`.
    pub fn unregister(&self, path: &ElementPath) -> Result<Rc<dyn Instrumented>, StateError> {
        self.ensure_idle()?;
        let element = self
            .inner
            .elements
            .borrow_mut()
            .remove(path)
            .ok_or_else(|| UsageError::UnknownElement { path: path.clone() })?;
        self.unregister_all_dependencies_for(path);
        Ok(element)
    }

    /// Returns the element at `path`.
    #[must_use]
    pub fn element(&self, path: &ElementPath) -> Option<Rc<dyn Instrumented>> {
        self.inner.elements.borrow().get(path).cloned()
    }

    /// Number of instrumented elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.inner.elements.borrow().len()
    }

    /// Paths of all instrumented elements, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<ElementPath> {
        self.inner.elements.borrow().keys().cloned().collect()
    }

    // --- dependencies ---

    /// Requires `before` to complete `before_phase` before `after` runs
    /// `after_phase`.
    ///
    /// Returns `Ok(false)` if the dependency already existed. Neither element
    /// has to be instrumented yet.
    ///
    /// # Errors
    ///
    /// [`UsageError::SelfDependency`] if both sides name the same element
    /// and phase.
    pub fn register_dependency(
        &self,
        before: ElementPath,
        before_phase: Phase,
        after: ElementPath,
        after_phase: Phase,
    ) -> Result<bool, StateError> {
        let dependency = Dependency {
            before,
            before_phase,
            after,
            after_phase,
        };
        tracing::trace!(%dependency, "registering dependency");
        Ok(self.inner.dependencies.borrow_mut().register(dependency)?)
    }

    /// Removes every dependency naming `path`; safe to call for any path.
    ///
    /// Returns the number removed.
    pub fn unregister_all_dependencies_for(&self, path: &ElementPath) -> usize {
        let mut dependencies = self.inner.dependencies.borrow_mut();
        if !dependencies.uses_path(path) {
            return 0;
        }
        let removed = dependencies.remove_all_for(path);
        debug_assert!(
            dependencies.validate().is_ok(),
            "dependency indices diverged after removing {path}"
        );
        removed
    }

    /// Total number of registered dependencies.
    #[must_use]
    pub fn count_dependencies(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Returns `true` if exactly this dependency is registered.
    #[must_use]
    pub fn has_dependency(
        &self,
        before: &ElementPath,
        before_phase: Phase,
        after: &ElementPath,
        after_phase: Phase,
    ) -> bool {
        self.inner.dependencies.borrow().contains(&Dependency {
            before: before.clone(),
            before_phase,
            after: after.clone(),
            after_phase,
        })
    }

    /// Every dependency naming `path`, sorted.
    #[must_use]
    pub fn dependencies_for(&self, path: &ElementPath) -> Vec<Dependency> {
        self.inner.dependencies.borrow().dependencies_for(path)
    }

    /// Returns `true` if `path` takes part in any dependency.
    #[must_use]
    pub fn uses_path(&self, path: &ElementPath) -> bool {
        self.inner.dependencies.borrow().uses_path(path)
    }

    /// Checks that the dependency indices mirror each other.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphInconsistency`] found.
    pub fn validate(&self) -> Result<(), GraphInconsistency> {
        self.inner.dependencies.borrow().validate()
    }

    // --- snapshots ---

    /// Reads every instrumented element into a [`Snapshot`].
    ///
    /// # Errors
    ///
    /// [`StateError::Capture`] for the first element that fails to encode.
    pub fn capture(&self) -> Result<Snapshot, StateError> {
        let elements = self.elements();
        let mut snapshot = Snapshot::new();
        for (path, element) in elements {
            let raw = element
                .capture_raw()
                .map_err(|source| StateError::Capture {
                    path: path.clone(),
                    source,
                })?;
            snapshot.insert(path, raw);
        }
        Ok(snapshot)
    }

    /// Runs one restoration pass for `snapshot`.
    ///
    /// # Errors
    ///
    /// - [`UsageError::RestoreInProgress`] if called during a pass, for
    ///   example from a listener.
    /// - [`StateError::OrderingUnsatisfiable`] if the drain loop cannot
    ///   finish. Pending callbacks are dropped and the engine returns to
    ///   idle; elements whose `Undefer` never ran stay deferred.
    /// - [`StateError::Apply`] if some values were rejected. The pass still
    ///   completes for everything else.
    pub fn apply_snapshot(&self, snapshot: &Snapshot) -> Result<RestoreReport, StateError> {
        self.ensure_idle()?;
        self.inner.state.set(EngineState::Deferring);
        tracing::debug!(values = snapshot.len(), "restoration pass started");

        let elements = self.elements();
        let mut report = RestoreReport::default();
        let mut scope = PassScope {
            snapshot,
            participants: HashSet::new(),
        };
        for (path, element) in &elements {
            if element.is_deferred() {
                continue;
            }
            element.defer();
            self.queue_undefer(path, element);
            scope.participants.insert(path.clone());
            report.deferred += 1;
        }
        tracing::debug!(deferred = report.deferred, "elements deferred");

        let mut failures = Vec::new();
        for (path, raw) in snapshot.values() {
            let result = match self.element(path) {
                Some(element) => element.apply_raw(raw),
                None => Err(ElementError::NotInstrumented),
            };
            match result {
                Ok(()) => report.applied += 1,
                Err(error) => failures.push(ApplyFailure {
                    path: path.clone(),
                    error,
                }),
            }
        }

        self.inner.state.set(EngineState::Draining);
        let drained = self.drain(&scope, &mut report);
        self.inner.state.set(EngineState::Idle);

        if let Err(diagnostics) = drained {
            self.inner.callbacks.borrow_mut().clear();
            tracing::error!(%diagnostics, "restoration ordering is unsatisfiable");
            return Err(StateError::OrderingUnsatisfiable(Box::new(diagnostics)));
        }
        debug_assert!(
            self.inner.callbacks.borrow().is_empty(),
            "drain finished with callbacks outstanding"
        );
        tracing::debug!(
            callbacks = report.callbacks,
            iterations = report.iterations,
            failures = failures.len(),
            "restoration pass finished"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(StateError::Apply { failures })
        }
    }

    fn ensure_idle(&self) -> Result<(), UsageError> {
        if self.is_restoring() {
            return Err(UsageError::RestoreInProgress);
        }
        Ok(())
    }

    fn elements(&self) -> Vec<(ElementPath, Rc<dyn Instrumented>)> {
        self.inner
            .elements
            .borrow()
            .iter()
            .map(|(path, element)| (path.clone(), Rc::clone(element)))
            .collect()
    }

    fn queue_undefer(&self, path: &ElementPath, element: &Rc<dyn Instrumented>) {
        let engine: Weak<EngineInner> = Rc::downgrade(&self.inner);
        let element = Rc::clone(element);
        let owner = path.clone();
        let undefer = move || {
            let notify = element.undefer();
            let Some(engine) = engine.upgrade() else {
                return;
            };
            let callback = match notify {
                Some(notify) => PhaseCallback::new(owner, Phase::Notify, notify),
                None => PhaseCallback::new(owner, Phase::Notify, || {}),
            };
            engine.callbacks.borrow_mut().add_callback(callback);
        };
        self.inner
            .callbacks
            .borrow_mut()
            .add_callback(PhaseCallback::new(path.clone(), Phase::Undefer, undefer));
    }

    fn drain(
        &self,
        scope: &PassScope<'_>,
        report: &mut RestoreReport,
    ) -> Result<(), OrderingDiagnostics> {
        let max_iterations = self.inner.options.max_iterations;
        let mut completed: HashSet<(ElementPath, Phase)> = HashSet::new();

        while !self.inner.callbacks.borrow().is_empty() {
            report.iterations += 1;
            if report.iterations > max_iterations {
                return Err(self.diagnose(
                    StallReason::IterationLimit { max_iterations },
                    report.iterations - 1,
                ));
            }

            let mut executed = 0;
            for phase in Phase::ALL {
                let candidates: SmallVec<[ElementPath; 8]> = self
                    .inner
                    .callbacks
                    .borrow()
                    .set_for_phase(phase)
                    .paths()
                    .cloned()
                    .collect();
                for path in candidates {
                    if !self.is_eligible(&path, phase, scope, &completed) {
                        continue;
                    }
                    let Some(callback) = self
                        .inner
                        .callbacks
                        .borrow_mut()
                        .set_for_phase_mut(phase)
                        .remove(&path)
                    else {
                        continue;
                    };
                    tracing::trace!(%path, %phase, "running phase callback");
                    callback.run();
                    completed.insert((path, phase));
                    executed += 1;
                }
            }
            report.callbacks += executed;

            tracing::debug!(
                iteration = report.iterations,
                executed,
                remaining = self.pending_callbacks(),
                "drain iteration finished"
            );
            if executed == 0 {
                return Err(self.diagnose(StallReason::NoProgress, report.iterations));
            }
        }
        Ok(())
    }

    fn is_eligible(
        &self,
        path: &ElementPath,
        phase: Phase,
        scope: &PassScope<'_>,
        completed: &HashSet<(ElementPath, Phase)>,
    ) -> bool {
        if phase == Phase::Notify && !completed.contains(&(path.clone(), Phase::Undefer)) {
            return false;
        }
        if !scope.is_live(path) {
            return true;
        }
        let dependencies = self.inner.dependencies.borrow();
        dependencies
            .graphs()
            .filter(|graph| graph.after_phase() == phase)
            .all(|graph| {
                graph.befores(path).all(|before| {
                    !scope.is_live(before)
                        || completed.contains(&(before.clone(), graph.before_phase()))
                })
            })
    }

    fn diagnose(&self, reason: StallReason, iterations: usize) -> OrderingDiagnostics {
        let mut pending = Vec::new();
        self.inner
            .callbacks
            .borrow()
            .for_each(|callback| pending.push((callback.path().clone(), callback.phase())));
        OrderingDiagnostics::new(
            reason,
            iterations,
            pending,
            self.inner.dependencies.borrow().to_vec(),
        )
    }
}
