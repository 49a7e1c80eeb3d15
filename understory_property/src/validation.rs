// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value validation rules.
//!
//! A property carries a [`Validator`], the conjunction of any number of
//! [`ValidationRule`]s. Each rule is one of four strategies:
//!
//! - **Value type**: the value must report a given [`ValueType`] through the
//!   [`Kinded`] trait. Useful when `T` is a dynamically shaped value
//!   (`Option<_>`, a JSON-like enum) rather than a plain scalar.
//! - **Instance of**: the value, viewed as `dyn Any`, must be a given concrete type.
//! - **Valid values**: the value must equal one of a finite allow-list.
//! - **Predicate**: an arbitrary check.
//!
//! Rules are checked for mutual consistency once, when the validator is built,
//! and every rule is checked again on each write.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use crate::error::{ConfigurationError, ValidationError};

/// Identifies which kind of rule rejected a value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// A [`ValueType`] check.
    ValueType,
    /// A concrete-type check on a `dyn Any` view of the value.
    InstanceOf,
    /// A finite allow-list.
    ValidValues,
    /// A custom predicate.
    Predicate,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ValueType => "value-type rule",
            Self::InstanceOf => "instance-of rule",
            Self::ValidValues => "allow-list rule",
            Self::Predicate => "predicate rule",
        };
        f.write_str(name)
    }
}

/// Coarse runtime shape of a value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `true` or `false`.
    Boolean,
    /// Any integer or floating point number.
    Number,
    /// Text.
    String,
    /// Absence of a value.
    Null,
    /// An ordered sequence.
    Array,
    /// A keyed record.
    Object,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Null => "null",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// Values that can report their [`ValueType`] at runtime.
pub trait Kinded {
    /// Returns the runtime shape of this value.
    fn value_type(&self) -> ValueType;
}

macro_rules! kinded_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Kinded for $ty {
                #[inline]
                fn value_type(&self) -> ValueType {
                    ValueType::Number
                }
            }
        )*
    };
}

kinded_number!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Kinded for bool {
    fn value_type(&self) -> ValueType {
        ValueType::Boolean
    }
}

impl Kinded for String {
    fn value_type(&self) -> ValueType {
        ValueType::String
    }
}

impl Kinded for &str {
    fn value_type(&self) -> ValueType {
        ValueType::String
    }
}

impl<T: Kinded> Kinded for Option<T> {
    fn value_type(&self) -> ValueType {
        match self {
            Some(inner) => inner.value_type(),
            None => ValueType::Null,
        }
    }
}

impl<T> Kinded for Vec<T> {
    fn value_type(&self) -> ValueType {
        ValueType::Array
    }
}

impl<K, V, S> Kinded for hashbrown::HashMap<K, V, S> {
    fn value_type(&self) -> ValueType {
        ValueType::Object
    }
}

enum Rule<T> {
    ValueType {
        expected: ValueType,
        actual: fn(&T) -> ValueType,
    },
    InstanceOf {
        type_name: &'static str,
        check: fn(&T) -> bool,
    },
    ValidValues {
        values: Vec<T>,
        eq: fn(&T, &T) -> bool,
    },
    Predicate {
        description: String,
        check: Rc<dyn Fn(&T) -> bool>,
    },
}

impl<T: Clone> Clone for Rule<T> {
    fn clone(&self) -> Self {
        match self {
            Self::ValueType { expected, actual } => Self::ValueType {
                expected: *expected,
                actual: *actual,
            },
            Self::InstanceOf { type_name, check } => Self::InstanceOf {
                type_name: *type_name,
                check: *check,
            },
            Self::ValidValues { values, eq } => Self::ValidValues {
                values: values.clone(),
                eq: *eq,
            },
            Self::Predicate { description, check } => Self::Predicate {
                description: description.clone(),
                check: Rc::clone(check),
            },
        }
    }
}

/// One validation strategy for values of type `T`.
///
/// # Example
///
/// ```rust
/// use understory_property::{RuleKind, ValidationRule, ValueType};
///
/// let rule = ValidationRule::<Option<i32>>::value_type(ValueType::Number);
/// assert!(rule.check(&Some(3)).is_ok());
/// assert_eq!(rule.check(&None).unwrap_err().rule, RuleKind::ValueType);
///
/// let small = ValidationRule::predicate("less than 10", |v: &i32| *v < 10);
/// assert!(small.check(&12).is_err());
/// ```
pub struct ValidationRule<T> {
    rule: Rule<T>,
}

impl<T: Clone> Clone for ValidationRule<T> {
    fn clone(&self) -> Self {
        Self {
            rule: self.rule.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValidationRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Rule::ValueType { expected, .. } => f
                .debug_struct("ValueType")
                .field("expected", expected)
                .finish_non_exhaustive(),
            Rule::InstanceOf { type_name, .. } => f
                .debug_struct("InstanceOf")
                .field("type_name", type_name)
                .finish_non_exhaustive(),
            Rule::ValidValues { values, .. } => f
                .debug_struct("ValidValues")
                .field("values", values)
                .finish_non_exhaustive(),
            Rule::Predicate { description, .. } => f
                .debug_struct("Predicate")
                .field("description", description)
                .finish_non_exhaustive(),
        }
    }
}

impl<T: Kinded> ValidationRule<T> {
    /// Requires values to report `expected` as their [`ValueType`].
    #[must_use]
    pub fn value_type(expected: ValueType) -> Self {
        Self {
            rule: Rule::ValueType {
                expected,
                actual: <T as Kinded>::value_type,
            },
        }
    }
}

impl<T: AsRef<dyn Any>> ValidationRule<T> {
    /// Requires values, viewed as `dyn Any`, to hold a `U`.
    #[must_use]
    pub fn instance_of<U: Any>() -> Self {
        Self {
            rule: Rule::InstanceOf {
                type_name: core::any::type_name::<U>(),
                check: |value: &T| <T as AsRef<dyn Any>>::as_ref(value).is::<U>(),
            },
        }
    }
}

impl<T: PartialEq> ValidationRule<T> {
    /// Requires values to equal one of `values`.
    #[must_use]
    pub fn valid_values(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            rule: Rule::ValidValues {
                values: values.into_iter().collect(),
                eq: <T as PartialEq>::eq,
            },
        }
    }
}

impl<T> ValidationRule<T> {
    /// Requires values to satisfy `check`.
    ///
    /// `description` is reported in [`ValidationError::message`] on failure.
    #[must_use]
    pub fn predicate(description: impl Into<String>, check: impl Fn(&T) -> bool + 'static) -> Self {
        Self {
            rule: Rule::Predicate {
                description: description.into(),
                check: Rc::new(check),
            },
        }
    }

    /// Returns which kind of rule this is.
    #[must_use]
    pub fn kind(&self) -> RuleKind {
        match self.rule {
            Rule::ValueType { .. } => RuleKind::ValueType,
            Rule::InstanceOf { .. } => RuleKind::InstanceOf,
            Rule::ValidValues { .. } => RuleKind::ValidValues,
            Rule::Predicate { .. } => RuleKind::Predicate,
        }
    }

    fn describe(&self) -> String {
        match &self.rule {
            Rule::ValueType { expected, .. } => format!("expected a {expected}"),
            Rule::InstanceOf { type_name, .. } => format!("expected an instance of {type_name}"),
            Rule::ValidValues { values, .. } => {
                format!("expected one of {} allowed values", values.len())
            }
            Rule::Predicate { description, .. } => description.clone(),
        }
    }

    fn accepts(&self, value: &T) -> bool {
        match &self.rule {
            Rule::ValueType { expected, actual } => actual(value) == *expected,
            Rule::InstanceOf { check, .. } => check(value),
            Rule::ValidValues { values, eq } => values.iter().any(|allowed| eq(allowed, value)),
            Rule::Predicate { check, .. } => check(value),
        }
    }
}

impl<T: fmt::Debug> ValidationRule<T> {
    /// Checks `value` against this rule.
    pub fn check(&self, value: &T) -> Result<(), ValidationError> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(ValidationError {
                value: format!("{value:?}"),
                rule: self.kind(),
                message: self.describe(),
            })
        }
    }
}

/// The conjunction of a property's validation rules.
///
/// Every rule must accept a value for the validator to accept it. An empty
/// validator accepts everything.
pub struct Validator<T> {
    rules: Vec<ValidationRule<T>>,
}

impl<T> Default for Validator<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T: Clone> Clone for Validator<T> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rules)
            .finish()
    }
}

impl<T: fmt::Debug> Validator<T> {
    /// Composes `rules`, rejecting contradictory combinations.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::DuplicateAllowList`] for more than one allow-list.
    /// - [`ConfigurationError::EmptyAllowList`] for an allow-list with no entries.
    /// - [`ConfigurationError::ConflictingValueTypes`] for value-type rules that
    ///   name different kinds.
    /// - [`ConfigurationError::AllowListViolatesRule`] when an allowed value fails
    ///   another rule.
    pub fn new(rules: Vec<ValidationRule<T>>) -> Result<Self, ConfigurationError> {
        let mut expected_type: Option<ValueType> = None;
        let mut allow_list: Option<&Vec<T>> = None;

        for rule in &rules {
            match &rule.rule {
                Rule::ValueType { expected, .. } => match expected_type {
                    Some(first) if first != *expected => {
                        return Err(ConfigurationError::ConflictingValueTypes {
                            first: format!("{first}"),
                            second: format!("{expected}"),
                        });
                    }
                    _ => expected_type = Some(*expected),
                },
                Rule::ValidValues { values, .. } => {
                    if allow_list.is_some() {
                        return Err(ConfigurationError::DuplicateAllowList);
                    }
                    if values.is_empty() {
                        return Err(ConfigurationError::EmptyAllowList);
                    }
                    allow_list = Some(values);
                }
                Rule::InstanceOf { .. } | Rule::Predicate { .. } => {}
            }
        }

        if let Some(values) = allow_list {
            for value in values {
                for rule in rules.iter().filter(|r| r.kind() != RuleKind::ValidValues) {
                    if let Err(err) = rule.check(value) {
                        return Err(ConfigurationError::AllowListViolatesRule {
                            value: err.value,
                            rule: err.rule,
                            message: err.message,
                        });
                    }
                }
            }
        }

        Ok(Self { rules })
    }

    /// Checks `value` against every rule, reporting the first rejection.
    pub fn validate(&self, value: &T) -> Result<(), ValidationError> {
        self.rules.iter().try_for_each(|rule| rule.check(value))
    }
}

impl<T> Validator<T> {
    /// Returns `true` if no rules are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the number of configured rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }
}
