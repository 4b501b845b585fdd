//! Zero-phase Butterworth filtering.

use crate::butterworth::{self, Band, FilterError};
use crate::error::OperationError;
use crate::operation::{OperationType, parse_settings};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sigflow_timeseries::{ChannelSamples, Sample, TimeSeriesDataset, estimate_sample_rate};

/// Shape of the passband.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
}

impl FilterKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
        }
    }
}

/// Cutoff frequencies in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    Single(f64),
    Band { low: f64, high: f64 },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CutoffSetting {
    Single(f64),
    List(Vec<f64>),
}

#[derive(Debug, Deserialize)]
struct FilterSettings {
    #[serde(default, alias = "type")]
    filter_type: FilterKind,
    cutoff: CutoffSetting,
    #[serde(default = "default_order")]
    order: usize,
}

fn default_order() -> usize {
    4
}

/// Highest accepted filter order. Transfer-function coefficients lose all
/// precision long before this in double arithmetic.
pub const MAX_ORDER: usize = 32;

/// Butterworth filter applied forward and backward, so the output has no
/// phase shift relative to the input.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOperation {
    kind: FilterKind,
    cutoff: Cutoff,
    order: usize,
}

impl FilterOperation {
    /// Creates a filter after validating that `cutoff` suits `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidConfig`] if the order is zero or
    /// above [`MAX_ORDER`], a cutoff is not a positive finite number, a bandpass filter lacks a
    /// `low < high` pair, or a lowpass/highpass filter is given a pair.
    pub fn new(kind: FilterKind, cutoff: Cutoff, order: usize) -> Result<Self, OperationError> {
        let invalid = |reason: String| OperationError::invalid_config(OperationType::Filter, reason);

        if order == 0 || order > MAX_ORDER {
            return Err(invalid(format!(
                "order must be between 1 and {MAX_ORDER}, got {order}"
            )));
        }

        let positive = |hz: f64| hz.is_finite() && hz > 0.0;
        match (kind, cutoff) {
            (FilterKind::Bandpass, Cutoff::Band { low, high }) => {
                if !positive(low) || !positive(high) || low >= high {
                    return Err(invalid(format!(
                        "bandpass cutoff must satisfy 0 < low < high, got [{low}, {high}]"
                    )));
                }
            }
            (FilterKind::Bandpass, Cutoff::Single(_)) => {
                return Err(invalid(
                    "bandpass filter requires cutoff as [low, high]".to_string(),
                ));
            }
            (kind, Cutoff::Single(hz)) => {
                if !positive(hz) {
                    return Err(invalid(format!(
                        "{} cutoff must be a positive frequency, got {hz}",
                        kind.as_str()
                    )));
                }
            }
            (kind, Cutoff::Band { .. }) => {
                return Err(invalid(format!(
                    "{} filter requires a single cutoff frequency",
                    kind.as_str()
                )));
            }
        }

        Ok(Self {
            kind,
            cutoff,
            order,
        })
    }

    /// Builds the filter from its node configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidConfig`] if `cutoff` is missing or
    /// any option is invalid.
    pub fn from_config(config: &JsonValue) -> Result<Self, OperationError> {
        let settings: FilterSettings = parse_settings(OperationType::Filter, config)?;

        let cutoff = match settings.cutoff {
            CutoffSetting::Single(hz) => Cutoff::Single(hz),
            CutoffSetting::List(values) => match values.as_slice() {
                [low, high] => Cutoff::Band {
                    low: *low,
                    high: *high,
                },
                [hz] if settings.filter_type != FilterKind::Bandpass => Cutoff::Single(*hz),
                _ => {
                    return Err(OperationError::invalid_config(
                        OperationType::Filter,
                        format!(
                            "cutoff list must hold [low, high], got {} values",
                            values.len()
                        ),
                    ));
                }
            },
        };

        Self::new(settings.filter_type, cutoff, settings.order)
    }

    #[must_use]
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    #[must_use]
    pub fn cutoff(&self) -> Cutoff {
        self.cutoff
    }

    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Coefficient count of the designed transfer function. A bandpass
    /// doubles the polynomial degree.
    fn taps(&self) -> usize {
        match self.kind {
            FilterKind::Bandpass => 2 * self.order + 1,
            FilterKind::Lowpass | FilterKind::Highpass => self.order + 1,
        }
    }

    /// Normalizes the cutoff against a channel's Nyquist frequency.
    fn band(&self, sample_rate: f64) -> Result<Band, OperationError> {
        let nyquist = sample_rate / 2.0;
        let normalize = |hz: f64| {
            let wn = hz / nyquist;
            if wn > 0.0 && wn < 1.0 {
                Ok(wn)
            } else {
                Err(OperationError::transform(
                    OperationType::Filter,
                    format!(
                        "cutoff {hz} Hz must lie strictly between 0 and the Nyquist frequency {nyquist} Hz"
                    ),
                ))
            }
        };

        Ok(match (self.kind, self.cutoff) {
            (FilterKind::Bandpass, Cutoff::Band { low, high }) => {
                Band::Bandpass(normalize(low)?, normalize(high)?)
            }
            (FilterKind::Highpass, Cutoff::Single(hz)) => Band::Highpass(normalize(hz)?),
            (_, Cutoff::Single(hz)) => Band::Lowpass(normalize(hz)?),
            (_, Cutoff::Band { .. }) => {
                return Err(OperationError::transform(
                    OperationType::Filter,
                    "cutoff shape does not match filter type",
                ));
            }
        })
    }

    /// Filters every channel in `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` is not a well-formed time-domain dataset,
    /// a cutoff is at or above a channel's Nyquist frequency, or a channel
    /// is too short for zero-phase filtering.
    pub fn execute(&self, input: &TimeSeriesDataset) -> Result<TimeSeriesDataset, OperationError> {
        let channels = input
            .channels()
            .map_err(OperationError::data(OperationType::Filter))?;

        let mut filtered = ChannelSamples::new();
        for (channel_id, samples) in channels {
            let sample_rate = estimate_sample_rate(channel_id, &samples)
                .map_err(OperationError::data(OperationType::Filter))?;
            let band = self.band(sample_rate)?;

            let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
            let too_short = |e: FilterError| {
                let reason = format!("channel {channel_id}: {e}");
                OperationError::transform(OperationType::Filter, reason)
            };
            let required = 3 * self.taps();
            if values.len() <= required {
                return Err(too_short(FilterError::SignalTooShort {
                    len: values.len(),
                    required,
                }));
            }

            let output = butterworth::design(self.order, band)
                .filtfilt(&values)
                .map_err(too_short)?;

            tracing::debug!(
                channel = %channel_id,
                samples = values.len(),
                sample_rate,
                filter_type = self.kind.as_str(),
                order = self.order,
                "filtered channel"
            );

            let rows = samples
                .iter()
                .zip(output)
                .map(|(sample, value)| Sample { value, ..*sample })
                .collect();
            filtered.insert(channel_id, rows);
        }

        Ok(TimeSeriesDataset::from_channels(filtered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_channel_independent, channel_values, tones, two_channel_dataset};
    use serde_json::json;
    use std::f64::consts::PI;

    fn sine(freq: f64, len: usize, rate: f64) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / rate).sin())
            .collect()
    }

    fn max_error(got: &[f64], want: &[f64], range: std::ops::Range<usize>) -> f64 {
        range
            .map(|i| (got[i] - want[i]).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn config_defaults_to_fourth_order_lowpass() {
        let op = FilterOperation::from_config(&json!({ "cutoff": 50 })).expect("valid");
        assert_eq!(op.kind(), FilterKind::Lowpass);
        assert_eq!(op.order(), 4);
        assert_eq!(op.cutoff(), Cutoff::Single(50.0));
    }

    #[test]
    fn type_alias_is_accepted() {
        let op = FilterOperation::from_config(&json!({ "type": "highpass", "cutoff": 10.0 }))
            .expect("valid");
        assert_eq!(op.kind(), FilterKind::Highpass);
    }

    #[test]
    fn missing_cutoff_fails_at_construction() {
        let err = FilterOperation::from_config(&json!({ "filter_type": "lowpass", "order": 4 }))
            .unwrap_err();
        assert!(err.is_construction_error());
        assert!(err.to_string().contains("cutoff"), "{err}");
    }

    #[test]
    fn unknown_filter_type_is_invalid() {
        let err = FilterOperation::from_config(&json!({ "filter_type": "notch", "cutoff": 60 }))
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidConfig { .. }));
    }

    #[test]
    fn bandpass_requires_ordered_pair() {
        let single = FilterOperation::from_config(&json!({ "filter_type": "bandpass", "cutoff": 10 }));
        assert!(single.is_err());

        let reversed =
            FilterOperation::from_config(&json!({ "filter_type": "bandpass", "cutoff": [60, 40] }));
        assert!(reversed.is_err());

        let triple = FilterOperation::from_config(
            &json!({ "filter_type": "bandpass", "cutoff": [10, 20, 30] }),
        );
        assert!(triple.is_err());

        let op = FilterOperation::from_config(
            &json!({ "filter_type": "bandpass", "cutoff": [40, 60], "order": 2 }),
        )
        .expect("valid");
        assert_eq!(op.cutoff(), Cutoff::Band { low: 40.0, high: 60.0 });
    }

    #[test]
    fn lowpass_rejects_pair_and_nonpositive_cutoffs() {
        let pair = Cutoff::Band {
            low: 1.0,
            high: 2.0,
        };
        assert!(FilterOperation::new(FilterKind::Lowpass, pair, 4).is_err());
        assert!(FilterOperation::new(FilterKind::Highpass, Cutoff::Single(-5.0), 4).is_err());
        assert!(FilterOperation::new(FilterKind::Lowpass, Cutoff::Single(5.0), 0).is_err());
    }

    #[test]
    fn order_above_bound_fails_at_construction() {
        let err = FilterOperation::from_config(
            &json!({ "filter_type": "lowpass", "cutoff": 5, "order": 1_099_511_627_776_u64 }),
        )
        .unwrap_err();
        assert!(err.is_construction_error());
        assert!(err.to_string().contains("order"), "{err}");

        let cutoff = Cutoff::Single(5.0);
        assert!(FilterOperation::new(FilterKind::Lowpass, cutoff, MAX_ORDER + 1).is_err());
        assert!(FilterOperation::new(FilterKind::Lowpass, cutoff, MAX_ORDER).is_ok());
    }

    #[test]
    fn in_band_sinusoid_passes_without_phase_shift() {
        let rate = 1000.0;
        let input = TimeSeriesDataset::from_samples(tones(1, 1000, rate, &[(5.0, 1.0)]));
        let op = FilterOperation::new(FilterKind::Lowpass, Cutoff::Single(50.0), 4).expect("valid");

        let output = op.execute(&input).expect("filter");
        assert_eq!(output.len(), input.len());
        assert_eq!(output.columns(), input.columns());

        let got = channel_values(&output, 1);
        let want = sine(5.0, 1000, rate);
        assert!(max_error(&got, &want, 200..800) < 1e-3);
    }

    #[test]
    fn lowpass_removes_out_of_band_tone() {
        let rate = 1000.0;
        let input =
            TimeSeriesDataset::from_samples(tones(1, 1000, rate, &[(5.0, 1.0), (200.0, 0.5)]));
        let op = FilterOperation::new(FilterKind::Lowpass, Cutoff::Single(50.0), 4).expect("valid");

        let got = channel_values(&op.execute(&input).expect("filter"), 1);
        assert!(max_error(&got, &sine(5.0, 1000, rate), 200..800) < 1e-3);
    }

    #[test]
    fn highpass_removes_dc_offset() {
        let rate = 1000.0;
        let samples = tones(1, 1000, rate, &[(100.0, 1.0)])
            .into_iter()
            .map(|s| Sample {
                value: s.value + 3.0,
                ..s
            })
            .collect();
        let op = FilterOperation::new(FilterKind::Highpass, Cutoff::Single(20.0), 4).expect("valid");

        let got = channel_values(
            &op.execute(&TimeSeriesDataset::from_samples(samples))
                .expect("filter"),
            1,
        );
        assert!(max_error(&got, &sine(100.0, 1000, rate), 200..800) < 1e-3);
    }

    #[test]
    fn bandpass_keeps_only_center_tone() {
        let rate = 1000.0;
        let input = TimeSeriesDataset::from_samples(tones(
            1,
            1000,
            rate,
            &[(5.0, 1.0), (50.0, 1.0), (300.0, 1.0)],
        ));
        let op = FilterOperation::new(
            FilterKind::Bandpass,
            Cutoff::Band {
                low: 40.0,
                high: 60.0,
            },
            2,
        )
        .expect("valid");

        let got = channel_values(&op.execute(&input).expect("filter"), 1);
        assert!(max_error(&got, &sine(50.0, 1000, rate), 200..800) < 1e-2);
    }

    #[test]
    fn cutoff_above_nyquist_fails_at_execution() {
        let input = TimeSeriesDataset::from_samples(tones(1, 200, 100.0, &[(5.0, 1.0)]));
        let op = FilterOperation::new(FilterKind::Lowpass, Cutoff::Single(60.0), 4).expect("valid");

        let err = op.execute(&input).unwrap_err();
        assert!(matches!(err, OperationError::Transform { .. }));
        assert!(err.to_string().contains("Nyquist"));
    }

    #[test]
    fn short_channel_is_a_transform_error() {
        let input = TimeSeriesDataset::from_samples(tones(1, 10, 100.0, &[(5.0, 1.0)]));
        let op = FilterOperation::new(FilterKind::Lowpass, Cutoff::Single(10.0), 4).expect("valid");
        assert!(matches!(
            op.execute(&input),
            Err(OperationError::Transform { .. })
        ));
    }

    #[test]
    fn length_is_checked_before_design() {
        // 3 * (2 * 32 + 1) = 195 samples of edge padding for a maximal bandpass.
        let input = TimeSeriesDataset::from_samples(tones(1, 195, 1000.0, &[(50.0, 1.0)]));
        let cutoff = Cutoff::Band {
            low: 40.0,
            high: 60.0,
        };
        let op = FilterOperation::new(FilterKind::Bandpass, cutoff, MAX_ORDER).expect("valid");

        let err = op.execute(&input).unwrap_err();
        assert!(matches!(err, OperationError::Transform { .. }));
        assert!(err.to_string().contains("more than 195"), "{err}");
    }

    #[test]
    fn channels_are_filtered_independently() {
        let dataset = two_channel_dataset(400, 1000.0);
        let op = FilterOperation::new(FilterKind::Lowpass, Cutoff::Single(50.0), 4).expect("valid");
        assert_channel_independent(|d| op.execute(d).expect("filter"), &dataset);
    }

    #[test]
    fn input_dataset_is_not_modified() {
        let dataset = two_channel_dataset(400, 1000.0);
        let before = dataset.clone();
        let op = FilterOperation::new(FilterKind::Lowpass, Cutoff::Single(50.0), 4).expect("valid");
        let _ = op.execute(&dataset).expect("filter");
        assert_eq!(dataset, before);
    }
}
