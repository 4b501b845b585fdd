//! Constant time offset applied to every timestamp.

use crate::error::OperationError;
use crate::operation::{OperationType, parse_settings};
use chrono::TimeDelta;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sigflow_timeseries::{ChannelSamples, Sample, TimeSeriesDataset};

/// Largest shift representable as a nanosecond count.
const MAX_SHIFT_SECONDS: f64 = i64::MAX as f64 / 1e9;

#[derive(Debug, Deserialize)]
struct TimeShiftSettings {
    shift_seconds: f64,
}

/// Moves every sample forward (positive) or backward (negative) in time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeShiftOperation {
    shift_seconds: f64,
}

impl TimeShiftOperation {
    #[must_use]
    pub fn new(shift_seconds: f64) -> Self {
        Self { shift_seconds }
    }

    /// Builds the shift from its node configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidConfig`] if `shift_seconds` is
    /// missing, not a number, or not finite.
    pub fn from_config(config: &JsonValue) -> Result<Self, OperationError> {
        let settings: TimeShiftSettings = parse_settings(OperationType::TimeShift, config)?;
        let seconds = settings.shift_seconds;
        if !seconds.is_finite() || seconds.abs() > MAX_SHIFT_SECONDS {
            return Err(OperationError::invalid_config(
                OperationType::TimeShift,
                format!(
                    "shift_seconds must be finite and at most {MAX_SHIFT_SECONDS} in magnitude"
                ),
            ));
        }
        Ok(Self::new(settings.shift_seconds))
    }

    #[must_use]
    pub fn shift_seconds(&self) -> f64 {
        self.shift_seconds
    }

    fn delta(&self) -> TimeDelta {
        TimeDelta::nanoseconds((self.shift_seconds * 1e9).round() as i64)
    }

    /// Shifts every timestamp in `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` is not a well-formed time-domain dataset
    /// or a shifted timestamp falls outside the representable range.
    pub fn execute(&self, input: &TimeSeriesDataset) -> Result<TimeSeriesDataset, OperationError> {
        let delta = self.delta();
        let mut shifted = ChannelSamples::new();

        for (channel_id, samples) in input
            .channels()
            .map_err(OperationError::data(OperationType::TimeShift))?
        {
            let rows = samples
                .into_iter()
                .map(|s| {
                    let timestamp = s.timestamp.checked_add_signed(delta).ok_or_else(|| {
                        OperationError::transform(
                            OperationType::TimeShift,
                            format!("shifting {} by {delta} overflows", s.timestamp.to_rfc3339()),
                        )
                    })?;
                    Ok(Sample { timestamp, ..s })
                })
                .collect::<Result<Vec<_>, OperationError>>()?;
            shifted.insert(channel_id, rows);
        }

        tracing::debug!(
            shift_seconds = self.shift_seconds,
            rows = input.len(),
            "shifted timestamps"
        );
        Ok(TimeSeriesDataset::from_channels(shifted))
    }
}
