//! Dataset types.

use crate::error::DatasetError;
use crate::sampling::estimate_sample_rate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifies one channel of a multi-channel recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single time-domain measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub channel_id: ChannelId,
    pub value: f64,
}

impl Sample {
    /// Creates a new sample.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, channel_id: ChannelId, value: f64) -> Self {
        Self {
            timestamp,
            channel_id,
            value,
        }
    }
}

/// A single frequency-domain bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralBin {
    /// Bin frequency in Hz.
    pub frequency: f64,
    pub magnitude: f64,
    /// Phase in radians.
    pub phase: f64,
    pub channel_id: ChannelId,
}

/// The axis a dataset's rows are indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Time,
    Frequency,
}

impl Domain {
    /// Returns the domain as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Frequency => "frequency",
        }
    }

    /// Parses the string form produced by [`Self::as_str`].
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "time" => Some(Self::Time),
            "frequency" => Some(Self::Frequency),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-domain samples grouped by channel, each channel sorted by time.
pub type ChannelSamples = BTreeMap<ChannelId, Vec<Sample>>;

/// Multi-channel dataset flowing between workflow nodes.
///
/// Rows keep the order they were constructed with. Transforms read them
/// through [`TimeSeriesDataset::channels`], which groups by channel and sorts
/// by time, and emit channels in ascending channel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", content = "rows", rename_all = "snake_case")]
pub enum TimeSeriesDataset {
    /// `(timestamp, channel_id, value)` rows.
    Time(Vec<Sample>),
    /// `(frequency, magnitude, phase, channel_id)` rows.
    Frequency(Vec<SpectralBin>),
}

impl TimeSeriesDataset {
    /// Creates a time-domain dataset from raw samples.
    #[must_use]
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self::Time(samples)
    }

    /// Creates a frequency-domain dataset from raw bins.
    #[must_use]
    pub fn from_bins(bins: Vec<SpectralBin>) -> Self {
        Self::Frequency(bins)
    }

    /// Flattens per-channel samples into a dataset, in channel order.
    #[must_use]
    pub fn from_channels(channels: ChannelSamples) -> Self {
        Self::Time(channels.into_values().flatten().collect())
    }

    /// Flattens per-channel spectra into a dataset, in channel order.
    #[must_use]
    pub fn from_spectra(spectra: BTreeMap<ChannelId, Vec<SpectralBin>>) -> Self {
        Self::Frequency(spectra.into_values().flatten().collect())
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        match self {
            Self::Time(_) => Domain::Time,
            Self::Frequency(_) => Domain::Frequency,
        }
    }

    /// Returns the number of rows across all channels.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Time(samples) => samples.len(),
            Self::Frequency(bins) => bins.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the column names of this dataset's rows.
    #[must_use]
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Time(_) => &["timestamp", "channel_id", "value"],
            Self::Frequency(_) => &["frequency", "magnitude", "phase", "channel_id"],
        }
    }

    /// Returns the distinct channel ids in ascending order.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let ids: BTreeSet<ChannelId> = match self {
            Self::Time(samples) => samples.iter().map(|s| s.channel_id).collect(),
            Self::Frequency(bins) => bins.iter().map(|b| b.channel_id).collect(),
        };
        ids.into_iter().collect()
    }

    /// Returns the time-domain rows.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::WrongDomain`] for frequency-domain datasets.
    pub fn samples(&self) -> Result<&[Sample], DatasetError> {
        match self {
            Self::Time(samples) => Ok(samples),
            Self::Frequency(_) => Err(DatasetError::WrongDomain {
                expected: Domain::Time,
                found: Domain::Frequency,
            }),
        }
    }

    /// Returns the frequency-domain rows.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::WrongDomain`] for time-domain datasets.
    pub fn bins(&self) -> Result<&[SpectralBin], DatasetError> {
        match self {
            Self::Frequency(bins) => Ok(bins),
            Self::Time(_) => Err(DatasetError::WrongDomain {
                expected: Domain::Frequency,
                found: Domain::Time,
            }),
        }
    }

    /// Groups time-domain samples by channel, sorting each channel by time.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset is not time-domain or if a channel
    /// contains two samples with the same timestamp.
    pub fn channels(&self) -> Result<ChannelSamples, DatasetError> {
        let mut channels = ChannelSamples::new();
        for sample in self.samples()? {
            channels.entry(sample.channel_id).or_default().push(*sample);
        }

        for (channel_id, samples) in &mut channels {
            samples.sort_by_key(|s| s.timestamp);
            if let Some(pair) = samples.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
                return Err(DatasetError::DuplicateTimestamp {
                    channel_id: *channel_id,
                    timestamp: pair[0].timestamp,
                });
            }
        }

        Ok(channels)
    }

    /// Returns a dataset containing only the given channels.
    #[must_use]
    pub fn select_channels(&self, ids: &[ChannelId]) -> Self {
        match self {
            Self::Time(samples) => Self::Time(
                samples
                    .iter()
                    .filter(|s| ids.contains(&s.channel_id))
                    .copied()
                    .collect(),
            ),
            Self::Frequency(bins) => Self::Frequency(
                bins.iter()
                    .filter(|b| ids.contains(&b.channel_id))
                    .copied()
                    .collect(),
            ),
        }
    }

    /// Appends the rows of `other` after the rows of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::WrongDomain`] if the two datasets differ in
    /// domain.
    pub fn concat(self, other: Self) -> Result<Self, DatasetError> {
        match (self, other) {
            (Self::Time(mut left), Self::Time(right)) => {
                left.extend(right);
                Ok(Self::Time(left))
            }
            (Self::Frequency(mut left), Self::Frequency(right)) => {
                left.extend(right);
                Ok(Self::Frequency(left))
            }
            (left, right) => Err(DatasetError::WrongDomain {
                expected: left.domain(),
                found: right.domain(),
            }),
        }
    }

    /// Computes descriptive metadata for the dataset.
    ///
    /// The sampling rate is estimated from the lowest-numbered channel.
    ///
    /// # Errors
    ///
    /// Returns an error if a time-domain channel is malformed.
    pub fn summary(&self) -> Result<DatasetSummary, DatasetError> {
        let mut summary = DatasetSummary {
            domain: self.domain(),
            row_count: self.len(),
            channel_count: self.channel_ids().len(),
            start_time: None,
            end_time: None,
            sample_rate: None,
        };

        if let Self::Time(samples) = self {
            summary.start_time = samples.iter().map(|s| s.timestamp).min();
            summary.end_time = samples.iter().map(|s| s.timestamp).max();
            if let Some((channel_id, first)) = self.channels()?.into_iter().next() {
                summary.sample_rate = Some(estimate_sample_rate(channel_id, &first)?);
            }
        }

        Ok(summary)
    }
}

/// Descriptive metadata for a stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub domain: Domain,
    pub row_count: usize,
    pub channel_count: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Estimated sampling rate in Hz (time domain only).
    pub sample_rate: Option<f64>,
}
