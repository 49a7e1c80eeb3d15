// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Restoration phases.

use core::fmt;

/// One step an element goes through during a restoration pass.
///
/// An element's [`Undefer`](Self::Undefer) always completes before its own
/// [`Notify`](Self::Notify).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// The element's staged value has been committed.
    Undefer,
    /// The element's listeners have been told about the change.
    Notify,
}

impl Phase {
    /// Both phases, in the order a drain pass visits them.
    pub const ALL: [Self; 2] = [Self::Undefer, Self::Notify];

    /// Dense index of this phase.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Undefer => 0,
            Self::Notify => 1,
        }
    }

    /// Upper-case label used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Undefer => "UNDEFER",
            Self::Notify => "NOTIFY",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
