//! Scalar unit conversion of sample values.

use crate::error::OperationError;
use crate::operation::{OperationType, parse_settings};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sigflow_timeseries::{ChannelSamples, Sample, TimeSeriesDataset};

/// A value remapping, either a named unit pair or a parameterized one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    CelsiusToFahrenheit,
    FahrenheitToCelsius,
    CelsiusToKelvin,
    KelvinToCelsius,
    MetersToFeet,
    FeetToMeters,
    MetersToInches,
    InchesToMeters,
    MpsToMph,
    MphToMps,
    MpsToKmph,
    KmphToMps,
    PaToPsi,
    PsiToPa,
    PaToBar,
    BarToPa,
    MvToV,
    VToMv,
    Scale { factor: f64 },
    Offset { offset: f64 },
}

const FEET_PER_METER: f64 = 3.28084;
const INCHES_PER_METER: f64 = 39.3701;
const MPH_PER_MPS: f64 = 2.23694;
const KMPH_PER_MPS: f64 = 3.6;
const PSI_PER_PA: f64 = 0.000_145_038;
const PA_PER_BAR: f64 = 100_000.0;
const KELVIN_OFFSET: f64 = 273.15;

impl Conversion {
    /// Every accepted conversion name.
    pub const NAMES: [&'static str; 20] = [
        "celsius_to_fahrenheit",
        "fahrenheit_to_celsius",
        "celsius_to_kelvin",
        "kelvin_to_celsius",
        "meters_to_feet",
        "feet_to_meters",
        "meters_to_inches",
        "inches_to_meters",
        "mps_to_mph",
        "mph_to_mps",
        "mps_to_kmph",
        "kmph_to_mps",
        "pa_to_psi",
        "psi_to_pa",
        "pa_to_bar",
        "bar_to_pa",
        "mv_to_v",
        "v_to_mv",
        "scale",
        "offset",
    ];

    /// Resolves a conversion by name. `factor` and `offset` are only used
    /// by the `scale` and `offset` conversions.
    #[must_use]
    pub fn from_name(name: &str, factor: f64, offset: f64) -> Option<Self> {
        Some(match name {
            "celsius_to_fahrenheit" => Self::CelsiusToFahrenheit,
            "fahrenheit_to_celsius" => Self::FahrenheitToCelsius,
            "celsius_to_kelvin" => Self::CelsiusToKelvin,
            "kelvin_to_celsius" => Self::KelvinToCelsius,
            "meters_to_feet" => Self::MetersToFeet,
            "feet_to_meters" => Self::FeetToMeters,
            "meters_to_inches" => Self::MetersToInches,
            "inches_to_meters" => Self::InchesToMeters,
            "mps_to_mph" => Self::MpsToMph,
            "mph_to_mps" => Self::MphToMps,
            "mps_to_kmph" => Self::MpsToKmph,
            "kmph_to_mps" => Self::KmphToMps,
            "pa_to_psi" => Self::PaToPsi,
            "psi_to_pa" => Self::PsiToPa,
            "pa_to_bar" => Self::PaToBar,
            "bar_to_pa" => Self::BarToPa,
            "mv_to_v" => Self::MvToV,
            "v_to_mv" => Self::VToMv,
            "scale" => Self::Scale { factor },
            "offset" => Self::Offset { offset },
            _ => return None,
        })
    }

    /// Applies the conversion to a single value.
    #[must_use]
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Self::CelsiusToFahrenheit => x * 9.0 / 5.0 + 32.0,
            Self::FahrenheitToCelsius => (x - 32.0) * 5.0 / 9.0,
            Self::CelsiusToKelvin => x + KELVIN_OFFSET,
            Self::KelvinToCelsius => x - KELVIN_OFFSET,
            Self::MetersToFeet => x * FEET_PER_METER,
            Self::FeetToMeters => x / FEET_PER_METER,
            Self::MetersToInches => x * INCHES_PER_METER,
            Self::InchesToMeters => x / INCHES_PER_METER,
            Self::MpsToMph => x * MPH_PER_MPS,
            Self::MphToMps => x / MPH_PER_MPS,
            Self::MpsToKmph => x * KMPH_PER_MPS,
            Self::KmphToMps => x / KMPH_PER_MPS,
            Self::PaToPsi => x * PSI_PER_PA,
            Self::PsiToPa => x / PSI_PER_PA,
            Self::PaToBar => x / PA_PER_BAR,
            Self::BarToPa => x * PA_PER_BAR,
            Self::MvToV => x / 1000.0,
            Self::VToMv => x * 1000.0,
            Self::Scale { factor } => x * factor,
            Self::Offset { offset } => x + offset,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnitConversionSettings {
    conversion: String,
    #[serde(default = "default_factor")]
    factor: f64,
    #[serde(default)]
    offset: f64,
}

fn default_factor() -> f64 {
    1.0
}

/// Remaps every sample value; timestamps and channels are untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitConversionOperation {
    conversion: Conversion,
}

impl UnitConversionOperation {
    #[must_use]
    pub fn new(conversion: Conversion) -> Self {
        Self { conversion }
    }

    /// Builds the conversion from its node configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidConfig`] if `conversion` is missing
    /// or names an unsupported conversion.
    pub fn from_config(config: &JsonValue) -> Result<Self, OperationError> {
        let settings: UnitConversionSettings =
            parse_settings(OperationType::UnitConversion, config)?;

        let conversion =
            Conversion::from_name(&settings.conversion, settings.factor, settings.offset)
                .ok_or_else(|| {
                    OperationError::invalid_config(
                        OperationType::UnitConversion,
                        format!(
                            "unknown conversion '{}' (supported: {})",
                            settings.conversion,
                            Conversion::NAMES.join(", ")
                        ),
                    )
                })?;

        Ok(Self::new(conversion))
    }

    #[must_use]
    pub fn conversion(&self) -> Conversion {
        self.conversion
    }

    /// Converts every value in `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` is not a well-formed time-domain dataset.
    pub fn execute(&self, input: &TimeSeriesDataset) -> Result<TimeSeriesDataset, OperationError> {
        let channels: ChannelSamples = input
            .channels()
            .map_err(OperationError::data(OperationType::UnitConversion))?
            .into_iter()
            .map(|(channel_id, samples)| {
                let converted = samples
                    .into_iter()
                    .map(|s| Sample {
                        value: self.conversion.apply(s.value),
                        ..s
                    })
                    .collect();
                (channel_id, converted)
            })
            .collect();

        tracing::debug!(conversion = ?self.conversion, rows = input.len(), "converted values");
        Ok(TimeSeriesDataset::from_channels(channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_channel_independent, channel_values, two_channel_dataset};
    use serde_json::json;

    const INVERSE_PAIRS: [(&str, &str); 9] = [
        ("celsius_to_fahrenheit", "fahrenheit_to_celsius"),
        ("celsius_to_kelvin", "kelvin_to_celsius"),
        ("meters_to_feet", "feet_to_meters"),
        ("meters_to_inches", "inches_to_meters"),
        ("mps_to_mph", "mph_to_mps"),
        ("mps_to_kmph", "kmph_to_mps"),
        ("pa_to_psi", "psi_to_pa"),
        ("pa_to_bar", "bar_to_pa"),
        ("mv_to_v", "v_to_mv"),
    ];

    fn op(name: &str) -> UnitConversionOperation {
        UnitConversionOperation::from_config(&json!({ "conversion": name })).expect("known name")
    }

    #[test]
    fn known_reference_points() {
        assert_eq!(Conversion::CelsiusToFahrenheit.apply(100.0), 212.0);
        assert_eq!(Conversion::FahrenheitToCelsius.apply(32.0), 0.0);
        assert_eq!(Conversion::CelsiusToKelvin.apply(0.0), 273.15);
        assert_eq!(Conversion::BarToPa.apply(1.5), 150_000.0);
        assert_eq!(Conversion::MvToV.apply(2500.0), 2.5);
        assert!((Conversion::MetersToFeet.apply(1.0) - 3.28084).abs() < 1e-12);
    }

    #[test]
    fn conversion_pairs_round_trip() {
        let dataset = two_channel_dataset(64, 100.0);
        for (forward, backward) in INVERSE_PAIRS {
            let there = op(forward).execute(&dataset).expect("convert");
            let back = op(backward).execute(&there).expect("convert");

            for channel in [1, 2] {
                let original = channel_values(&dataset, channel);
                let restored = channel_values(&back, channel);
                for (a, b) in original.iter().zip(&restored) {
                    assert!((a - b).abs() < 1e-9, "{forward}/{backward}: {a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn every_listed_name_resolves() {
        for name in Conversion::NAMES {
            assert!(Conversion::from_name(name, 1.0, 0.0).is_some(), "{name}");
        }
    }

    #[test]
    fn scale_and_offset_take_parameters() {
        let scale = UnitConversionOperation::from_config(
            &json!({ "conversion": "scale", "factor": 2.5 }),
        )
        .expect("valid");
        assert_eq!(scale.conversion(), Conversion::Scale { factor: 2.5 });

        let offset = UnitConversionOperation::from_config(
            &json!({ "conversion": "offset", "offset": -4.0 }),
        )
        .expect("valid");
        assert_eq!(offset.conversion().apply(10.0), 6.0);

        assert_eq!(op("scale").conversion().apply(7.0), 7.0);
        assert_eq!(op("offset").conversion().apply(7.0), 7.0);
    }

    #[test]
    fn missing_or_unknown_conversion_is_invalid() {
        let missing = UnitConversionOperation::from_config(&json!({})).unwrap_err();
        assert!(missing.to_string().contains("conversion"));

        let unknown =
            UnitConversionOperation::from_config(&json!({ "conversion": "furlongs_to_parsecs" }))
                .unwrap_err();
        assert!(matches!(unknown, OperationError::InvalidConfig { .. }));
        assert!(unknown.to_string().contains("celsius_to_fahrenheit"));
    }

    #[test]
    fn timestamps_and_channels_are_preserved() {
        let dataset = two_channel_dataset(32, 100.0);
        let output = op("v_to_mv").execute(&dataset).expect("convert");

        let before = dataset.channels().expect("channels");
        let after = output.channels().expect("channels");
        for (channel_id, samples) in &before {
            let converted = &after[channel_id];
            assert_eq!(samples.len(), converted.len());
            for (a, b) in samples.iter().zip(converted) {
                assert_eq!(a.timestamp, b.timestamp);
                assert_eq!(a.value * 1000.0, b.value);
            }
        }
    }

    #[test]
    fn channels_are_converted_independently() {
        let dataset = two_channel_dataset(32, 100.0);
        let conversion = op("celsius_to_kelvin");
        assert_channel_independent(|d| conversion.execute(d).expect("convert"), &dataset);
    }
}
