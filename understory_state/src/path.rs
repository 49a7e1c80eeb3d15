// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hierarchical element identifiers.

use alloc::rc::Rc;
use alloc::string::String;
use core::borrow::Borrow;
use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Stable, dot-separated name of an instrumented element, such as
/// `"sim.model.position"`.
///
/// Cloning is a reference-count bump. Paths compare, hash and order as their
/// full string.
///
/// # Example
///
/// ```rust
/// use understory_state::ElementPath;
///
/// let model = ElementPath::new("sim.model");
/// let position = model.child("position");
///
/// assert_eq!(position.as_str(), "sim.model.position");
/// assert_eq!(position.name(), "position");
/// assert_eq!(position.parent(), Some(model.clone()));
/// assert!(position.is_descendant_of(&model));
/// assert!(!ElementPath::new("sim.modelView").is_descendant_of(&model));
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementPath(Rc<str>);

impl ElementPath {
    /// Creates a path from its full string.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self(Rc::from(path))
    }

    /// Returns the full path string.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path of a direct child named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut full = String::with_capacity(self.0.len() + 1 + name.len());
        full.push_str(&self.0);
        full.push(SEPARATOR);
        full.push_str(name);
        Self::from(full)
    }

    /// Returns the enclosing path, or `None` for a single-segment path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rfind(SEPARATOR)
            .map(|split| Self::new(&self.0[..split]))
    }

    /// Returns the last segment.
    #[must_use]
    pub fn name(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(split) => &self.0[split + SEPARATOR.len_utf8()..],
            None => &self.0,
        }
    }

    /// Iterates the segments from the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.split(SEPARATOR)
    }

    /// Returns `true` if `self` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&*ancestor.0)
            && self.0[ancestor.0.len()..].starts_with(SEPARATOR)
    }
}

impl fmt::Debug for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementPath({:?})", &*self.0)
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ElementPath {
    fn from(path: String) -> Self {
        Self(Rc::from(path))
    }
}

impl Borrow<str> for ElementPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ElementPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ElementPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ElementPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}
