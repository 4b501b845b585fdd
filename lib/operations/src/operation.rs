//! The closed set of transform operations.

use crate::error::OperationError;
use crate::fft::FftOperation;
use crate::filter::FilterOperation;
use crate::time_shift::TimeShiftOperation;
use crate::unit_conversion::UnitConversionOperation;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sigflow_timeseries::TimeSeriesDataset;
use std::fmt;
use std::str::FromStr;

/// Identifies a kind of transform operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Fft,
    Filter,
    UnitConversion,
    TimeShift,
}

impl OperationType {
    /// All operation types, in registration order.
    pub const ALL: [Self; 4] = [Self::Fft, Self::Filter, Self::UnitConversion, Self::TimeShift];

    /// Returns the identifier used in node configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fft => "fft",
            Self::Filter => "filter",
            Self::UnitConversion => "unit_conversion",
            Self::TimeShift => "time_shift",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| OperationError::UnknownOperation {
                operation_type: s.to_string(),
                available: Self::ALL.iter().map(|op| op.as_str().to_string()).collect(),
            })
    }
}

/// A configured transform, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Fft(FftOperation),
    Filter(FilterOperation),
    UnitConversion(UnitConversionOperation),
    TimeShift(TimeShiftOperation),
}

impl Operation {
    /// Returns the kind of this operation.
    #[must_use]
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Fft(_) => OperationType::Fft,
            Self::Filter(_) => OperationType::Filter,
            Self::UnitConversion(_) => OperationType::UnitConversion,
            Self::TimeShift(_) => OperationType::TimeShift,
        }
    }

    /// Applies the transform to `input`, producing a new dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed for this transform or the
    /// transform cannot be computed.
    pub fn execute(&self, input: &TimeSeriesDataset) -> Result<TimeSeriesDataset, OperationError> {
        match self {
            Self::Fft(op) => op.execute(input),
            Self::Filter(op) => op.execute(input),
            Self::UnitConversion(op) => op.execute(input),
            Self::TimeShift(op) => op.execute(input),
        }
    }
}

impl From<FftOperation> for Operation {
    fn from(op: FftOperation) -> Self {
        Self::Fft(op)
    }
}

impl From<FilterOperation> for Operation {
    fn from(op: FilterOperation) -> Self {
        Self::Filter(op)
    }
}

impl From<UnitConversionOperation> for Operation {
    fn from(op: UnitConversionOperation) -> Self {
        Self::UnitConversion(op)
    }
}

impl From<TimeShiftOperation> for Operation {
    fn from(op: TimeShiftOperation) -> Self {
        Self::TimeShift(op)
    }
}

/// Decodes an operation's configuration object into its settings type.
///
/// A `null` configuration is treated as an empty object so that operations
/// with all-default settings need no configuration at all.
pub(crate) fn parse_settings<T: DeserializeOwned>(
    operation: OperationType,
    config: &JsonValue,
) -> Result<T, OperationError> {
    let object = match config {
        JsonValue::Null => JsonValue::Object(serde_json::Map::new()),
        JsonValue::Object(_) => config.clone(),
        other => {
            return Err(OperationError::invalid_config(
                operation,
                format!("expected a JSON object, found {other}"),
            ));
        }
    };

    serde_json::from_value(object)
        .map_err(|e| OperationError::invalid_config(operation, e.to_string()))
}
