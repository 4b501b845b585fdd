//! Error types for transform operations.

use crate::operation::OperationType;
use sigflow_timeseries::DatasetError;
use std::fmt;

/// Errors raised while constructing or executing an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationError {
    /// No operation is registered under the requested type.
    UnknownOperation {
        operation_type: String,
        available: Vec<String>,
    },
    /// The operation's configuration was rejected at construction.
    InvalidConfig {
        operation: OperationType,
        reason: String,
    },
    /// The transform could not be applied to the given data.
    Transform {
        operation: OperationType,
        reason: String,
    },
    /// The input dataset does not have the shape the transform needs.
    Data {
        operation: OperationType,
        source: DatasetError,
    },
}

impl OperationError {
    pub(crate) fn invalid_config(operation: OperationType, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn transform(operation: OperationType, reason: impl Into<String>) -> Self {
        Self::Transform {
            operation,
            reason: reason.into(),
        }
    }

    /// Wraps a dataset shape error raised on behalf of `operation`.
    pub fn data(operation: OperationType) -> impl FnOnce(DatasetError) -> Self {
        move |source| Self::Data { operation, source }
    }

    /// Returns true if the error was raised before any data was processed.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownOperation { .. } | Self::InvalidConfig { .. }
        )
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperation {
                operation_type,
                available,
            } => {
                write!(
                    f,
                    "unknown operation type '{operation_type}' (available: {})",
                    available.join(", ")
                )
            }
            Self::InvalidConfig { operation, reason } => {
                write!(f, "invalid {operation} configuration: {reason}")
            }
            Self::Transform { operation, reason } => {
                write!(f, "{operation} failed: {reason}")
            }
            Self::Data { operation, source } => {
                write!(f, "{operation} cannot process input: {source}")
            }
        }
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Data { source, .. } => Some(source),
            _ => None,
        }
    }
}
