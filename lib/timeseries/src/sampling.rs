//! Sampling-rate estimation.

use crate::dataset::{ChannelId, Sample};
use crate::error::DatasetError;
use chrono::{DateTime, Utc};

/// Rate assumed for channels too short to measure a spacing.
pub const DEFAULT_SAMPLE_RATE: f64 = 1.0;

/// Returns `end - start` in fractional seconds.
#[must_use]
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Estimates the sampling rate of one channel as the reciprocal of its mean
/// sample spacing.
///
/// `samples` must already be sorted by timestamp. Channels with fewer than
/// two samples report [`DEFAULT_SAMPLE_RATE`].
///
/// # Errors
///
/// Returns [`DatasetError::DegenerateSampling`] if the mean spacing is not a
/// positive, finite number of seconds.
pub fn estimate_sample_rate(
    channel_id: ChannelId,
    samples: &[Sample],
) -> Result<f64, DatasetError> {
    let [first, .., last] = samples else {
        return Ok(DEFAULT_SAMPLE_RATE);
    };

    // The mean of consecutive differences telescopes to the overall span.
    let mean_interval =
        seconds_between(first.timestamp, last.timestamp) / (samples.len() - 1) as f64;
    if !mean_interval.is_finite() || mean_interval <= 0.0 {
        return Err(DatasetError::DegenerateSampling { channel_id });
    }

    Ok(1.0 / mean_interval)
}
