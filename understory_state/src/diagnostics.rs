// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reports for restoration passes that cannot finish.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write as _};

use crate::graph::Dependency;
use crate::path::ElementPath;
use crate::phase::Phase;

/// Why the drain loop gave up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StallReason {
    /// A full iteration ran no callback, so no later iteration could either.
    NoProgress,
    /// The iteration bound was exceeded.
    IterationLimit {
        /// The configured bound.
        max_iterations: usize,
    },
}

/// Everything known about a restoration pass that could not drain.
///
/// `pending` lists the `(element, phase)` obligations still outstanding and
/// `dependencies` the registered edges touching any of them, both sorted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderingDiagnostics {
    /// Why the loop stopped.
    pub reason: StallReason,
    /// Iterations run before stopping.
    pub iterations: usize,
    /// Outstanding obligations.
    pub pending: Vec<(ElementPath, Phase)>,
    /// Registered dependencies with at least one outstanding endpoint.
    pub dependencies: Vec<Dependency>,
}

impl OrderingDiagnostics {
    /// Builds a report, keeping only the dependencies that touch `pending`.
    #[must_use]
    pub fn new(
        reason: StallReason,
        iterations: usize,
        mut pending: Vec<(ElementPath, Phase)>,
        all_dependencies: impl IntoIterator<Item = Dependency>,
    ) -> Self {
        pending.sort();
        let is_pending = |path: &ElementPath, phase: Phase| {
            pending
                .binary_search_by(|(p, ph)| (p, *ph).cmp(&(path, phase)))
                .is_ok()
        };
        let mut dependencies: Vec<Dependency> = all_dependencies
            .into_iter()
            .filter(|d| is_pending(&d.before, d.before_phase) || is_pending(&d.after, d.after_phase))
            .collect();
        dependencies.sort();
        Self {
            reason,
            iterations,
            pending,
            dependencies,
        }
    }

    /// Renders the relevant dependencies as a Graphviz digraph.
    ///
    /// Outstanding obligations are drawn in red.
    ///
    /// # Example
    ///
    /// ```rust
    /// use understory_state::{Dependency, ElementPath, OrderingDiagnostics, Phase, StallReason};
    ///
    /// let a = ElementPath::new("a");
    /// let report = OrderingDiagnostics::new(
    ///     StallReason::NoProgress,
    ///     1,
    ///     vec![(a.clone(), Phase::Undefer)],
    ///     [Dependency {
    ///         before: a.clone(),
    ///         before_phase: Phase::Notify,
    ///         after: a,
    ///         after_phase: Phase::Undefer,
    ///     }],
    /// );
    /// assert!(report.to_dot().contains("\"a:NOTIFY\" -> \"a:UNDEFER\";"));
    /// ```
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph restoration {\n");
        for (path, phase) in &self.pending {
            let _ = writeln!(out, "  \"{path}:{phase}\" [color=red];");
        }
        for dep in &self.dependencies {
            let _ = writeln!(
                out,
                "  \"{}:{}\" -> \"{}:{}\";",
                dep.before, dep.before_phase, dep.after, dep.after_phase
            );
        }
        out.push_str("}\n");
        out
    }
}

impl fmt::Display for OrderingDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            StallReason::NoProgress => {
                write!(f, "no progress after {} iteration(s)", self.iterations)?;
            }
            StallReason::IterationLimit { max_iterations } => {
                write!(f, "exceeded {max_iterations} iterations")?;
            }
        }
        f.write_str("; pending: [")?;
        for (i, (path, phase)) in self.pending.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{path}:{phase}")?;
        }
        f.write_str("]; dependencies: [")?;
        for (i, dep) in self.dependencies.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dep}")?;
        }
        f.write_str("]")
    }
}
