//! Per-channel discrete Fourier transform.

use crate::error::OperationError;
use crate::operation::{OperationType, parse_settings};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sigflow_timeseries::{SpectralBin, TimeSeriesDataset, estimate_sample_rate};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Tapering window applied before the transform.
///
/// Coefficients are symmetric: the first and last sample get the same
/// weight, and a window of length one is `[1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hann,
    Hamming,
    Blackman,
}

impl Window {
    /// Looks a window up by name, case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "hann" | "hanning" => Some(Self::Hann),
            "hamming" => Some(Self::Hamming),
            "blackman" => Some(Self::Blackman),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hann => "hann",
            Self::Hamming => "hamming",
            Self::Blackman => "blackman",
        }
    }

    /// Computes the window coefficient at position `i` of `n` samples.
    #[must_use]
    pub fn coefficient(&self, i: usize, n: usize) -> f64 {
        if n <= 1 {
            return 1.0;
        }
        let x = 2.0 * PI * i as f64 / (n - 1) as f64;

        match self {
            Self::Hann => 0.5 - 0.5 * x.cos(),
            Self::Hamming => 0.54 - 0.46 * x.cos(),
            Self::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
        }
    }

    /// Generates all `n` window coefficients.
    #[must_use]
    pub fn coefficients(&self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.coefficient(i, n)).collect()
    }
}

#[derive(Debug, Deserialize)]
struct FftSettings {
    #[serde(default)]
    window: Option<String>,
    #[serde(default = "default_normalize")]
    normalize: bool,
}

fn default_normalize() -> bool {
    true
}

/// Converts each channel to its one-sided spectrum.
///
/// Output rows are `(frequency, magnitude, phase, channel_id)` for the
/// non-negative frequency bins `0..=(n-1)/2`, where bin `k` lies at
/// `k * sample_rate / n` Hz.
#[derive(Debug, Clone, PartialEq)]
pub struct FftOperation {
    window: Option<Window>,
    normalize: bool,
}

impl FftOperation {
    /// Creates an FFT with the given window and normalization.
    #[must_use]
    pub fn new(window: Option<Window>, normalize: bool) -> Self {
        Self { window, normalize }
    }

    /// Builds the operation from its node configuration.
    ///
    /// An unrecognized window name is not an error: it is logged and the
    /// transform runs without a window.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidConfig`] if the options have the
    /// wrong types.
    pub fn from_config(config: &JsonValue) -> Result<Self, OperationError> {
        let settings: FftSettings = parse_settings(OperationType::Fft, config)?;

        let window = settings.window.as_deref().and_then(|name| {
            let window = Window::from_name(name);
            if window.is_none() {
                tracing::warn!(window = name, "unknown FFT window, using none");
            }
            window
        });

        Ok(Self::new(window, settings.normalize))
    }

    #[must_use]
    pub fn window(&self) -> Option<Window> {
        self.window
    }

    #[must_use]
    pub fn normalize(&self) -> bool {
        self.normalize
    }

    /// Computes the spectrum of every channel in `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` is not a well-formed time-domain dataset.
    pub fn execute(&self, input: &TimeSeriesDataset) -> Result<TimeSeriesDataset, OperationError> {
        let channels = input
            .channels()
            .map_err(OperationError::data(OperationType::Fft))?;

        let mut planner = FftPlanner::<f64>::new();
        let mut spectra = BTreeMap::new();

        for (channel_id, samples) in channels {
            let n = samples.len();
            let sample_rate = estimate_sample_rate(channel_id, &samples)
                .map_err(OperationError::data(OperationType::Fft))?;

            let mut buffer: Vec<Complex<f64>> = samples
                .iter()
                .map(|s| Complex::new(s.value, 0.0))
                .collect();
            if let Some(window) = self.window {
                for (value, weight) in buffer.iter_mut().zip(window.coefficients(n)) {
                    value.re *= weight;
                }
            }

            planner.plan_fft_forward(n).process(&mut buffer);

            let scale = if self.normalize { n as f64 } else { 1.0 };
            let bins = buffer
                .iter()
                .take((n + 1) / 2)
                .enumerate()
                .map(|(k, x)| SpectralBin {
                    frequency: k as f64 * sample_rate / n as f64,
                    magnitude: x.norm() / scale,
                    phase: x.arg(),
                    channel_id,
                })
                .collect::<Vec<_>>();

            tracing::debug!(
                channel = %channel_id,
                samples = n,
                bins = bins.len(),
                sample_rate,
                "computed channel spectrum"
            );
            spectra.insert(channel_id, bins);
        }

        Ok(TimeSeriesDataset::from_spectra(spectra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_channel_independent, tones, two_channel_dataset};
    use crate::time_shift::TimeShiftOperation;
    use serde_json::json;
    use sigflow_timeseries::{ChannelId, Domain};

    fn peak(bins: &[SpectralBin]) -> SpectralBin {
        *bins
            .iter()
            .max_by(|a, b| a.magnitude.total_cmp(&b.magnitude))
            .expect("non-empty spectrum")
    }

    #[test]
    fn symmetric_windows_match_reference_values() {
        assert_eq!(Window::Hann.coefficients(1), vec![1.0]);

        let hann = Window::Hann.coefficients(5);
        let expected = [0.0, 0.5, 1.0, 0.5, 0.0];
        for (got, want) in hann.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }

        let hamming = Window::Hamming.coefficients(5);
        assert!((hamming[0] - 0.08).abs() < 1e-12);
        assert!((hamming[2] - 1.0).abs() < 1e-12);

        let blackman = Window::Blackman.coefficients(5);
        assert!(blackman[0].abs() < 1e-12);
        assert!((blackman[2] - 1.0).abs() < 1e-12);
        assert!((blackman[1] - blackman[3]).abs() < 1e-12);
    }

    #[test]
    fn config_defaults_to_normalized_without_window() {
        let op = FftOperation::from_config(&json!({})).expect("defaults");
        assert!(op.normalize());
        assert_eq!(op.window(), None);

        let op = FftOperation::from_config(&json!({ "window": "Hamming", "normalize": false }))
            .expect("valid");
        assert_eq!(op.window(), Some(Window::Hamming));
        assert!(!op.normalize());
    }

    #[test]
    fn unknown_window_falls_back_to_none() {
        let op = FftOperation::from_config(&json!({ "window": "kaiser" })).expect("not an error");
        assert_eq!(op.window(), None);
    }

    #[test]
    fn wrongly_typed_option_is_invalid_config() {
        let err = FftOperation::from_config(&json!({ "normalize": "yes" })).unwrap_err();
        assert!(matches!(err, OperationError::InvalidConfig { .. }));
    }

    #[test]
    fn spectrum_peaks_at_tone_frequency() {
        let input = TimeSeriesDataset::from_samples(tones(1, 1000, 1000.0, &[(50.0, 2.0)]));
        let output = FftOperation::new(None, true).execute(&input).expect("fft");

        assert_eq!(output.domain(), Domain::Frequency);
        let bins = output.bins().expect("frequency rows");
        assert_eq!(bins.len(), 500);
        assert_eq!(bins[0].frequency, 0.0);
        assert!((bins[499].frequency - 499.0).abs() < 1e-9);

        let top = peak(bins);
        assert!((top.frequency - 50.0).abs() < 1e-9);
        // A real tone splits its energy between the positive and negative bin.
        assert!((top.magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn odd_length_keeps_ceil_half_bins() {
        let input = TimeSeriesDataset::from_samples(tones(3, 7, 7.0, &[(1.0, 1.0)]));
        let output = FftOperation::new(None, false).execute(&input).expect("fft");
        let bins = output.bins().expect("frequency rows");
        assert_eq!(bins.len(), 4);
        assert!((bins[3].frequency - 3.0).abs() < 1e-6);
    }

    #[test]
    fn windowing_keeps_peak_location() {
        let input = TimeSeriesDataset::from_samples(tones(1, 1000, 1000.0, &[(50.0, 1.0)]));
        for window in [Window::Hann, Window::Hamming, Window::Blackman] {
            let output = FftOperation::new(Some(window), true)
                .execute(&input)
                .expect("fft");
            let top = peak(output.bins().expect("frequency rows"));
            assert!((top.frequency - 50.0).abs() < 1e-9, "{window:?}");
        }
    }

    #[test]
    fn magnitude_is_invariant_under_time_shift() {
        let input = two_channel_dataset(512, 1000.0);
        let shifted = TimeShiftOperation::new(-3.25)
            .execute(&input)
            .expect("shift");

        let fft = FftOperation::new(Some(Window::Hann), true);
        let before = fft.execute(&input).expect("fft");
        let after = fft.execute(&shifted).expect("fft");

        let before = before.bins().expect("bins");
        let after = after.bins().expect("bins");
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(after) {
            assert_eq!(a.channel_id, b.channel_id);
            assert!((a.frequency - b.frequency).abs() < 1e-9);
            assert!((a.magnitude - b.magnitude).abs() < 1e-9);
        }
    }

    #[test]
    fn channels_are_transformed_independently() {
        let dataset = two_channel_dataset(256, 500.0);
        let fft = FftOperation::new(Some(Window::Blackman), true);
        assert_channel_independent(|d| fft.execute(d).expect("fft"), &dataset);
    }

    #[test]
    fn output_keeps_channel_identity() {
        let output = FftOperation::new(None, true)
            .execute(&two_channel_dataset(100, 100.0))
            .expect("fft");
        assert_eq!(output.channel_ids(), vec![ChannelId(1), ChannelId(2)]);
        assert_eq!(output.len(), 100);
    }

    #[test]
    fn frequency_input_is_rejected() {
        let spectrum = FftOperation::new(None, true)
            .execute(&two_channel_dataset(16, 16.0))
            .expect("fft");
        let err = FftOperation::new(None, true).execute(&spectrum).unwrap_err();
        assert!(matches!(err, OperationError::Data { .. }));
    }
}
