//! Registry mapping operation-type identifiers to constructors.

use crate::error::OperationError;
use crate::fft::FftOperation;
use crate::filter::FilterOperation;
use crate::operation::{Operation, OperationType};
use crate::time_shift::TimeShiftOperation;
use crate::unit_conversion::UnitConversionOperation;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Builds a configured operation from its JSON configuration.
pub type Constructor = fn(&JsonValue) -> Result<Operation, OperationError>;

/// Lookup table from operation type to constructor.
///
/// The registry never falls back to a default operation: an unregistered
/// type is always an error.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    constructors: BTreeMap<&'static str, Constructor>,
}

impl OperationRegistry {
    /// Creates a registry with no operations.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Creates a registry with every built-in operation.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(OperationType::Fft, |config| {
            FftOperation::from_config(config).map(Operation::from)
        });
        registry.register(OperationType::Filter, |config| {
            FilterOperation::from_config(config).map(Operation::from)
        });
        registry.register(OperationType::UnitConversion, |config| {
            UnitConversionOperation::from_config(config).map(Operation::from)
        });
        registry.register(OperationType::TimeShift, |config| {
            TimeShiftOperation::from_config(config).map(Operation::from)
        });
        registry
    }

    /// Registers (or replaces) the constructor for an operation type.
    pub fn register(&mut self, operation_type: OperationType, constructor: Constructor) {
        self.constructors.insert(operation_type.as_str(), constructor);
    }

    /// Returns true if `operation_type` is registered.
    #[must_use]
    pub fn contains(&self, operation_type: &str) -> bool {
        self.constructors.contains_key(operation_type)
    }

    /// Returns the registered operation types in sorted order.
    #[must_use]
    pub fn available(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    /// Constructs the operation registered under `operation_type`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::UnknownOperation`] if the type is not
    /// registered, or [`OperationError::InvalidConfig`] if the configuration
    /// is rejected.
    pub fn create(
        &self,
        operation_type: &str,
        config: &JsonValue,
    ) -> Result<Operation, OperationError> {
        let constructor = self.constructors.get(operation_type).ok_or_else(|| {
            OperationError::UnknownOperation {
                operation_type: operation_type.to_string(),
                available: self.available().into_iter().map(String::from).collect(),
            }
        })?;

        let operation = constructor(config)?;
        tracing::debug!(operation_type, "constructed operation");
        Ok(operation)
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
