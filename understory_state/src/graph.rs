// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Order dependencies between element phases.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::{HashMap, HashSet};
use thiserror::Error;

use crate::error::UsageError;
use crate::path::ElementPath;
use crate::phase::Phase;

/// "`before` must complete `before_phase` before `after` may run
/// `after_phase`."
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dependency {
    /// Element that must go first.
    pub before: ElementPath,
    /// Phase `before` must complete.
    pub before_phase: Phase,
    /// Element that waits.
    pub after: ElementPath,
    /// Phase of `after` that waits.
    pub after_phase: Phase,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.before, self.before_phase, self.after, self.after_phase
        )
    }
}

/// Which half of an [`OrderDependencyGraph`] an inconsistency was found in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EdgeView {
    /// The index keyed by the element that goes first.
    Forward,
    /// The index keyed by the element that waits.
    Reverse,
}

impl fmt::Display for EdgeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        })
    }
}

/// A broken invariant found by [`OrderDependencyGraph::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GraphInconsistency {
    /// An edge is present in one index but not mirrored in the other.
    #[error("{edge} is missing from the {missing} index")]
    MissingMirror {
        /// The half-registered edge.
        edge: Dependency,
        /// The index that lacks it.
        missing: EdgeView,
    },
    /// An adjacency set was left empty instead of being pruned.
    #[error("empty {view} adjacency set for {path}")]
    EmptyAdjacency {
        /// Key of the empty set.
        path: ElementPath,
        /// The index holding it.
        view: EdgeView,
    },
}

type Adjacency = HashMap<ElementPath, HashSet<ElementPath>>;

/// Edges for one `(before_phase, after_phase)` combination.
///
/// Every edge is stored twice, once keyed by the element that goes first and
/// once keyed by the element that waits, so both "what must follow `x`?" and
/// "what must precede `x`?" are single lookups.
///
/// # Example
///
/// ```rust
/// use understory_state::{ElementPath, OrderDependencyGraph, Phase};
///
/// let a = ElementPath::new("a");
/// let b = ElementPath::new("b");
///
/// let mut graph = OrderDependencyGraph::new(Phase::Undefer, Phase::Notify);
/// graph.add_edge(a.clone(), b.clone());
///
/// assert!(graph.afters(&a).any(|p| *p == b));
/// assert!(graph.befores(&b).any(|p| *p == a));
///
/// graph.remove_all_edges_for(&b);
/// assert!(!graph.has_vertex(&a));
/// assert!(graph.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct OrderDependencyGraph {
    before_phase: Phase,
    after_phase: Phase,
    /// before -> elements that wait for it.
    forward: Adjacency,
    /// after -> elements it waits for.
    reverse: Adjacency,
}

impl OrderDependencyGraph {
    /// Creates an empty graph for one phase combination.
    #[must_use]
    pub fn new(before_phase: Phase, after_phase: Phase) -> Self {
        Self {
            before_phase,
            after_phase,
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Phase the "before" element completes.
    #[must_use]
    pub fn before_phase(&self) -> Phase {
        self.before_phase
    }

    /// Phase the "after" element waits in.
    #[must_use]
    pub fn after_phase(&self) -> Phase {
        self.after_phase
    }

    /// Records that `after` waits for `before`.
    ///
    /// Returns `false` if the edge already existed.
    pub fn add_edge(&mut self, before: ElementPath, after: ElementPath) -> bool {
        let added = self
            .forward
            .entry(before.clone())
            .or_default()
            .insert(after.clone());
        if added {
            self.reverse.entry(after).or_default().insert(before);
        }
        added
    }

    /// Returns `true` if `after` waits for `before`.
    #[must_use]
    pub fn has_edge(&self, before: &ElementPath, after: &ElementPath) -> bool {
        self.forward
            .get(before)
            .is_some_and(|afters| afters.contains(after))
    }

    /// Elements waiting for `before`.
    pub fn afters<'a>(&'a self, before: &ElementPath) -> impl Iterator<Item = &'a ElementPath> + 'a {
        self.forward.get(before).into_iter().flatten()
    }

    /// Elements `after` waits for.
    pub fn befores<'a>(&'a self, after: &ElementPath) -> impl Iterator<Item = &'a ElementPath> + 'a {
        self.reverse.get(after).into_iter().flatten()
    }

    /// Returns `true` if `path` takes part in any edge.
    #[must_use]
    pub fn has_vertex(&self, path: &ElementPath) -> bool {
        self.forward.contains_key(path) || self.reverse.contains_key(path)
    }

    /// Removes every edge touching `path`, pruning emptied sets.
    ///
    /// Returns the number of edges removed.
    pub fn remove_all_edges_for(&mut self, path: &ElementPath) -> usize {
        let mut removed = 0;

        if let Some(afters) = self.forward.remove(path) {
            for after in afters {
                remove_from(&mut self.reverse, &after, path);
                removed += 1;
            }
        }

        if let Some(befores) = self.reverse.remove(path) {
            for before in befores {
                remove_from(&mut self.forward, &before, path);
                removed += 1;
            }
        }

        removed
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(HashSet::len).sum()
    }

    /// Returns `true` if there are no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Iterates every edge in unspecified order.
    pub fn edges(&self) -> impl Iterator<Item = Dependency> + '_ {
        self.forward.iter().flat_map(move |(before, afters)| {
            afters.iter().map(move |after| Dependency {
                before: before.clone(),
                before_phase: self.before_phase,
                after: after.clone(),
                after_phase: self.after_phase,
            })
        })
    }

    /// Checks that both indices mirror each other and hold no empty sets.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphInconsistency`] found.
    pub fn validate(&self) -> Result<(), GraphInconsistency> {
        for (view, index, mirror) in [
            (EdgeView::Forward, &self.forward, &self.reverse),
            (EdgeView::Reverse, &self.reverse, &self.forward),
        ] {
            for (key, neighbors) in index {
                if neighbors.is_empty() {
                    return Err(GraphInconsistency::EmptyAdjacency {
                        path: key.clone(),
                        view,
                    });
                }
                for neighbor in neighbors {
                    if mirror.get(neighbor).is_some_and(|set| set.contains(key)) {
                        continue;
                    }
                    let (before, after, missing) = match view {
                        EdgeView::Forward => (key, neighbor, EdgeView::Reverse),
                        EdgeView::Reverse => (neighbor, key, EdgeView::Forward),
                    };
                    return Err(GraphInconsistency::MissingMirror {
                        edge: Dependency {
                            before: before.clone(),
                            before_phase: self.before_phase,
                            after: after.clone(),
                            after_phase: self.after_phase,
                        },
                        missing,
                    });
                }
            }
        }
        Ok(())
    }
}

fn remove_from(index: &mut Adjacency, key: &ElementPath, value: &ElementPath) {
    if let Some(set) = index.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

/// The four [`OrderDependencyGraph`]s, one per phase combination.
#[derive(Clone, Debug)]
pub struct OrderDependencies {
    graphs: [OrderDependencyGraph; 4],
}

impl Default for OrderDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderDependencies {
    /// Creates empty graphs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graphs: core::array::from_fn(|i| {
                OrderDependencyGraph::new(Phase::ALL[i / 2], Phase::ALL[i % 2])
            }),
        }
    }

    #[inline]
    fn slot(before_phase: Phase, after_phase: Phase) -> usize {
        before_phase.index() * 2 + after_phase.index()
    }

    /// Returns the graph for one phase combination.
    #[must_use]
    pub fn graph(&self, before_phase: Phase, after_phase: Phase) -> &OrderDependencyGraph {
        &self.graphs[Self::slot(before_phase, after_phase)]
    }

    /// Iterates the four graphs.
    pub fn graphs(&self) -> impl Iterator<Item = &OrderDependencyGraph> + '_ {
        self.graphs.iter()
    }

    /// Registers a dependency in the graph matching its phases.
    ///
    /// Returns `false` if it was already registered.
    ///
    /// # Errors
    ///
    /// [`UsageError::SelfDependency`] if `before` and `after` are the same
    /// element with the same phase.
    pub fn register(&mut self, dependency: Dependency) -> Result<bool, UsageError> {
        if dependency.before == dependency.after && dependency.before_phase == dependency.after_phase
        {
            return Err(UsageError::SelfDependency {
                path: dependency.before,
                phase: dependency.before_phase,
            });
        }
        let graph = &mut self.graphs[Self::slot(dependency.before_phase, dependency.after_phase)];
        Ok(graph.add_edge(dependency.before, dependency.after))
    }

    /// Returns `true` if exactly this dependency is registered.
    #[must_use]
    pub fn contains(&self, dependency: &Dependency) -> bool {
        self.graph(dependency.before_phase, dependency.after_phase)
            .has_edge(&dependency.before, &dependency.after)
    }

    /// Removes every dependency naming `path` on either side.
    ///
    /// Returns the number removed.
    pub fn remove_all_for(&mut self, path: &ElementPath) -> usize {
        self.graphs
            .iter_mut()
            .map(|graph| graph.remove_all_edges_for(path))
            .sum()
    }

    /// Returns `true` if `path` takes part in any dependency.
    #[must_use]
    pub fn uses_path(&self, path: &ElementPath) -> bool {
        self.graphs.iter().any(|graph| graph.has_vertex(path))
    }

    /// Total number of registered dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.iter().map(OrderDependencyGraph::edge_count).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.iter().all(OrderDependencyGraph::is_empty)
    }

    /// Every dependency naming `path` on either side, sorted.
    #[must_use]
    pub fn dependencies_for(&self, path: &ElementPath) -> Vec<Dependency> {
        let mut found: Vec<Dependency> = self
            .graphs
            .iter()
            .flat_map(|graph| {
                let waits_for = graph.befores(path).map(move |before| Dependency {
                    before: before.clone(),
                    before_phase: graph.before_phase,
                    after: path.clone(),
                    after_phase: graph.after_phase,
                });
                let blocks = graph.afters(path).map(move |after| Dependency {
                    before: path.clone(),
                    before_phase: graph.before_phase,
                    after: after.clone(),
                    after_phase: graph.after_phase,
                });
                waits_for.chain(blocks)
            })
            .collect();
        found.sort();
        found.dedup();
        found
    }

    /// Every registered dependency, sorted.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Dependency> {
        let mut all: Vec<Dependency> = self.graphs.iter().flat_map(OrderDependencyGraph::edges).collect();
        all.sort();
        all
    }

    /// Validates all four graphs.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphInconsistency`] found.
    pub fn validate(&self) -> Result<(), GraphInconsistency> {
        self.graphs.iter().try_for_each(OrderDependencyGraph::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ElementPath {
        ElementPath::new(s)
    }

    fn dep(before: &str, before_phase: Phase, after: &str, after_phase: Phase) -> Dependency {
        Dependency {
            before: path(before),
            before_phase,
            after: path(after),
            after_phase,
        }
    }

    #[test]
    fn edges_are_stored_in_both_directions() {
        let mut graph = OrderDependencyGraph::new(Phase::Notify, Phase::Undefer);
        assert!(graph.add_edge(path("a"), path("b")));
        assert!(graph.add_edge(path("a"), path("c")));
        assert!(!graph.add_edge(path("a"), path("b")));

        assert_eq!(graph.edge_count(), 2);
        assert!(graph.has_edge(&path("a"), &path("b")));
        assert!(!graph.has_edge(&path("b"), &path("a")));
        assert_eq!(graph.afters(&path("a")).count(), 2);
        assert_eq!(graph.befores(&path("c")).collect::<Vec<_>>(), [&path("a")]);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn removal_prunes_both_directions() {
        let mut graph = OrderDependencyGraph::new(Phase::Undefer, Phase::Undefer);
        graph.add_edge(path("a"), path("b"));
        graph.add_edge(path("b"), path("c"));
        graph.add_edge(path("d"), path("b"));

        assert_eq!(graph.remove_all_edges_for(&path("b")), 3);
        for name in ["a", "b", "c", "d"] {
            assert!(!graph.has_vertex(&path(name)), "{name} should be gone");
        }
        assert!(graph.is_empty());
        assert!(graph.validate().is_ok());
        assert_eq!(graph.remove_all_edges_for(&path("b")), 0);
    }

    #[test]
    fn removing_one_participant_removes_edge_from_both_views() {
        for victim in ["a", "b"] {
            let mut deps = OrderDependencies::new();
            let edge = dep("a", Phase::Undefer, "b", Phase::Notify);
            deps.register(edge.clone()).unwrap();
            assert!(deps.uses_path(&path("a")));

            assert_eq!(deps.remove_all_for(&path(victim)), 1);
            assert!(!deps.contains(&edge));
            assert!(!deps.uses_path(&path("a")));
            assert!(!deps.uses_path(&path("b")));
            assert!(deps.is_empty());
            assert!(deps.validate().is_ok());
        }
    }

    #[test]
    fn registers_into_matching_phase_graph() {
        let mut deps = OrderDependencies::new();
        deps.register(dep("a", Phase::Notify, "b", Phase::Undefer))
            .unwrap();
        assert_eq!(deps.graph(Phase::Notify, Phase::Undefer).edge_count(), 1);
        assert_eq!(deps.graph(Phase::Undefer, Phase::Notify).edge_count(), 0);
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn self_dependency_rules() {
        let mut deps = OrderDependencies::new();
        let err = deps
            .register(dep("a", Phase::Notify, "a", Phase::Notify))
            .unwrap_err();
        assert_eq!(
            err,
            UsageError::SelfDependency {
                path: path("a"),
                phase: Phase::Notify
            }
        );
        assert!(deps.register(dep("a", Phase::Notify, "a", Phase::Undefer)).unwrap());
    }

    #[test]
    fn dependencies_for_lists_both_sides() {
        let mut deps = OrderDependencies::new();
        deps.register(dep("a", Phase::Undefer, "b", Phase::Notify)).unwrap();
        deps.register(dep("b", Phase::Notify, "c", Phase::Notify)).unwrap();
        deps.register(dep("x", Phase::Undefer, "y", Phase::Undefer)).unwrap();

        assert_eq!(
            deps.dependencies_for(&path("b")),
            [
                dep("a", Phase::Undefer, "b", Phase::Notify),
                dep("b", Phase::Notify, "c", Phase::Notify),
            ]
        );
        assert_eq!(deps.to_vec().len(), 3);
    }

    #[test]
    fn validate_reports_half_registered_edge() {
        let mut graph = OrderDependencyGraph::new(Phase::Undefer, Phase::Notify);
        graph
            .forward
            .entry(path("a"))
            .or_default()
            .insert(path("b"));
        assert_eq!(
            graph.validate(),
            Err(GraphInconsistency::MissingMirror {
                edge: dep("a", Phase::Undefer, "b", Phase::Notify),
                missing: EdgeView::Reverse,
            })
        );

        let mut graph = OrderDependencyGraph::new(Phase::Undefer, Phase::Notify);
        graph.reverse.insert(path("z"), HashSet::new());
        assert!(matches!(
            graph.validate(),
            Err(GraphInconsistency::EmptyAdjacency { view: EdgeView::Reverse, .. })
        ));
    }

    #[test]
    fn dependency_display() {
        let edge = dep("sim.a", Phase::Undefer, "sim.b", Phase::Notify);
        assert_eq!(alloc::format!("{edge}"), "sim.a:UNDEFER -> sim.b:NOTIFY");
    }
}
