// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Captured program state.

use alloc::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::ElementPath;

/// Raw values keyed by element path, plus the set of paths that took part in
/// the capture.
///
/// Only dependencies between two present elements constrain a restoration
/// pass. Every path with a value is present; [`mark_present`](Self::mark_present)
/// adds paths that take part without carrying a value.
///
/// Serializes as
/// `{"values": {"<path>": <raw>, ...}, "present": ["<path>", ...]}`.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use understory_state::{ElementPath, Snapshot};
///
/// let mut snapshot = Snapshot::new();
/// snapshot.insert(ElementPath::new("sim.count"), json!(3));
///
/// let text = serde_json::to_string(&snapshot).unwrap();
/// assert_eq!(text, r#"{"values":{"sim.count":3},"present":["sim.count"]}"#);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    values: BTreeMap<ElementPath, Value>,
    #[serde(default)]
    present: BTreeSet<ElementPath>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw value for `path` and marks it present.
    ///
    /// Returns the value it replaces, if any.
    pub fn insert(&mut self, path: ElementPath, raw: Value) -> Option<Value> {
        self.present.insert(path.clone());
        self.values.insert(path, raw)
    }

    /// Marks `path` present without giving it a value.
    pub fn mark_present(&mut self, path: ElementPath) {
        self.present.insert(path);
    }

    /// Returns the raw value for `path`.
    #[must_use]
    pub fn get(&self, path: &ElementPath) -> Option<&Value> {
        self.values.get(path)
    }

    /// Returns `true` if `path` took part in the capture.
    ///
    /// Paths with a value are always present, even if a deserialized snapshot
    /// omitted them from its `present` list.
    #[must_use]
    pub fn is_present(&self, path: &ElementPath) -> bool {
        self.present.contains(path) || self.values.contains_key(path)
    }

    /// Iterates values in path order.
    pub fn values(&self) -> impl Iterator<Item = (&ElementPath, &Value)> + '_ {
        self.values.iter()
    }

    /// Iterates present paths in order.
    pub fn present(&self) -> impl Iterator<Item = &ElementPath> + '_ {
        self.present.iter()
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(ElementPath, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (ElementPath, Value)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (path, raw) in iter {
            snapshot.insert(path, raw);
        }
        snapshot
    }
}
