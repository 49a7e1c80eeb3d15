// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Elements the engine can defer, restore and capture.

use alloc::boxed::Box;
use alloc::string::ToString;
use core::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use understory_property::Property;

use crate::error::ElementError;

/// A deferrable element that reads and writes raw snapshot values.
///
/// Implemented for properties by [`InstrumentedProperty`]. Implement it
/// directly for elements that are not a single [`Property`].
pub trait Instrumented {
    /// Returns `true` while writes are being staged.
    fn is_deferred(&self) -> bool;

    /// Starts staging writes.
    fn defer(&self);

    /// Commits staged writes and returns the notification to run later, or
    /// `None` if nothing changed.
    fn undefer(&self) -> Option<Box<dyn FnOnce()>>;

    /// Writes a raw snapshot value.
    ///
    /// # Errors
    ///
    /// Returns an [`ElementError`] if `raw` does not decode or is rejected.
    fn apply_raw(&self, raw: &Value) -> Result<(), ElementError>;

    /// Reads the current value as a raw snapshot value.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::Serialize`] if the value cannot be encoded.
    fn capture_raw(&self) -> Result<Value, ElementError>;
}

/// Adapts a [`Property`] whose value is serde-encodable.
pub struct InstrumentedProperty<T> {
    property: Property<T>,
}

impl<T: fmt::Debug> fmt::Debug for InstrumentedProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedProperty")
            .field("property", &self.property)
            .finish()
    }
}

impl<T> InstrumentedProperty<T> {
    /// Wraps a handle to `property`.
    #[must_use]
    pub fn new(property: Property<T>) -> Self {
        Self { property }
    }

    /// Returns the wrapped property.
    #[must_use]
    pub fn property(&self) -> &Property<T> {
        &self.property
    }
}

impl<T> Instrumented for InstrumentedProperty<T>
where
    T: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static,
{
    fn is_deferred(&self) -> bool {
        self.property.is_deferred()
    }

    fn defer(&self) {
        // Entering deferral never yields a notifier.
        self.property.set_deferred(true);
    }

    fn undefer(&self) -> Option<Box<dyn FnOnce()>> {
        self.property
            .set_deferred(false)
            .map(|notifier| notifier.into_callback())
    }

    fn apply_raw(&self, raw: &Value) -> Result<(), ElementError> {
        let value = T::deserialize(raw).map_err(|err| ElementError::Deserialize(err.to_string()))?;
        self.property.set(value)?;
        Ok(())
    }

    fn capture_raw(&self) -> Result<Value, ElementError> {
        self.property
            .with(|value| serde_json::to_value(value))
            .map_err(|err| ElementError::Serialize(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec::Vec;
    use serde_json::json;
    use understory_property::{PropertyOptions, ValidationRule};

    #[test]
    fn applies_while_deferred_and_commits_on_undefer() {
        let property = Property::new(1_i64);
        let element = InstrumentedProperty::new(property.clone());

        element.defer();
        assert!(element.is_deferred());
        element.apply_raw(&json!(5)).unwrap();
        assert_eq!(property.value(), 1);

        let notify = element.undefer().expect("value changed");
        assert_eq!(property.value(), 5);
        notify();
        assert!(!element.is_deferred());
    }

    #[test]
    fn undefer_without_change_has_nothing_to_notify() {
        let element = InstrumentedProperty::new(Property::new(String::from("x")));
        element.defer();
        element.apply_raw(&json!("x")).unwrap();
        assert!(element.undefer().is_none());
    }

    #[test]
    fn decode_and_validation_failures_are_reported() {
        let options = PropertyOptions::builder()
            .rule(ValidationRule::predicate("short", |v: &Vec<u8>| v.len() < 3))
            .build()
            .unwrap();
        let element = InstrumentedProperty::new(Property::with_options(Vec::new(), options).unwrap());

        assert!(matches!(
            element.apply_raw(&json!("text")),
            Err(ElementError::Deserialize(_))
        ));
        assert!(matches!(
            element.apply_raw(&json!([1, 2, 3])),
            Err(ElementError::Property(_))
        ));
        element.apply_raw(&json!([1, 2])).unwrap();
        assert_eq!(element.capture_raw().unwrap(), json!([1, 2]));
    }
}
