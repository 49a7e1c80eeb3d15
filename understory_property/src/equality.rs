// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value comparison policies.
//!
//! A write that produces a value "equal" to the current one is a no-op: the
//! value is not replaced and no listener is notified. What "equal" means is
//! chosen per property with an [`EqualityPolicy`].

use alloc::rc::Rc;
use alloc::sync::Arc;
use core::fmt;

/// Identity comparison.
///
/// Scalars compare by value. Shared handles compare by address, so two
/// distinct allocations with equal contents are *not* identical.
pub trait Identity {
    /// Returns `true` if `self` and `other` are the same value.
    fn identical(&self, other: &Self) -> bool;
}

macro_rules! identity_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Identity for $ty {
                #[inline]
                #[allow(clippy::float_cmp, reason = "strict equality is the intended semantics")]
                fn identical(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

identity_by_eq!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    &'static str,
    alloc::string::String,
);

impl<T: ?Sized> Identity for Rc<T> {
    #[inline]
    fn identical(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Identity for Arc<T> {
    #[inline]
    fn identical(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: Identity> Identity for Option<T> {
    fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.identical(b),
            (None, None) => true,
            _ => false,
        }
    }
}

enum Compare<T> {
    Identity(fn(&T, &T) -> bool),
    Structural(fn(&T, &T) -> bool),
    Custom(Rc<dyn Fn(&T, &T) -> bool>),
}

/// How a property decides whether a write changes its value.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use understory_property::EqualityPolicy;
///
/// let a = Rc::new(vec![1, 2]);
/// let b = Rc::new(vec![1, 2]);
///
/// assert!(!EqualityPolicy::identity().equal(&a, &b));
/// assert!(EqualityPolicy::structural().equal(&a, &b));
/// ```
pub struct EqualityPolicy<T> {
    compare: Compare<T>,
}

impl<T> Clone for EqualityPolicy<T> {
    fn clone(&self) -> Self {
        let compare = match &self.compare {
            Compare::Identity(f) => Compare::Identity(*f),
            Compare::Structural(f) => Compare::Structural(*f),
            Compare::Custom(f) => Compare::Custom(Rc::clone(f)),
        };
        Self { compare }
    }
}

impl<T> fmt::Debug for EqualityPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.compare {
            Compare::Identity(_) => "Identity",
            Compare::Structural(_) => "Structural",
            Compare::Custom(_) => "Custom",
        };
        f.debug_tuple("EqualityPolicy").field(&name).finish()
    }
}

impl<T: Identity> EqualityPolicy<T> {
    /// Compares with [`Identity`]: strict equality for scalars, address
    /// equality for shared handles.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            compare: Compare::Identity(<T as Identity>::identical),
        }
    }
}

impl<T: PartialEq> EqualityPolicy<T> {
    /// Compares with `PartialEq`, which for containers and shared handles is a
    /// deep, structural comparison.
    #[must_use]
    pub fn structural() -> Self {
        Self {
            compare: Compare::Structural(<T as PartialEq>::eq),
        }
    }
}

impl<T> EqualityPolicy<T> {
    /// Compares with a custom function.
    ///
    /// The property holds no borrow while `eq` runs, so `eq` may read the
    /// property it belongs to.
    #[must_use]
    pub fn custom(eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            compare: Compare::Custom(Rc::new(eq)),
        }
    }

    /// Returns `true` if `a` and `b` are equal under this policy.
    #[must_use]
    pub fn equal(&self, a: &T, b: &T) -> bool {
        match &self.compare {
            Compare::Identity(f) | Compare::Structural(f) => f(a, b),
            Compare::Custom(f) => f(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn identity_distinguishes_allocations() {
        let policy = EqualityPolicy::<Rc<Vec<i32>>>::identity();
        let a = Rc::new(vec![1]);
        assert!(policy.equal(&a, &Rc::clone(&a)));
        assert!(!policy.equal(&a, &Rc::new(vec![1])));
    }

    #[test]
    fn identity_is_strict_for_scalars() {
        let policy = EqualityPolicy::<f64>::identity();
        assert!(policy.equal(&1.0, &1.0));
        assert!(!policy.equal(&f64::NAN, &f64::NAN));
    }

    #[test]
    fn structural_compares_contents() {
        let policy = EqualityPolicy::<Rc<Vec<i32>>>::structural();
        assert!(policy.equal(&Rc::new(vec![1, 2]), &Rc::new(vec![1, 2])));
        assert!(!policy.equal(&Rc::new(vec![1, 2]), &Rc::new(vec![2, 1])));
    }

    #[test]
    fn custom_policy_is_used() {
        let policy = EqualityPolicy::custom(|a: &f64, b: &f64| (a - b).abs() < 0.5);
        assert!(policy.equal(&1.0, &1.2));
        assert!(!policy.equal(&1.0, &2.0));
        assert_eq!(alloc::format!("{policy:?}"), "EqualityPolicy(\"Custom\")");
    }
}
