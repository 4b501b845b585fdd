//! Multi-channel time-series data model.
//!
//! A [`TimeSeriesDataset`] is the unit of data passed between every stage of
//! a workflow. It holds either time-domain samples or frequency-domain bins,
//! tagged with the channel they belong to. Channels are always processed
//! independently of each other.

pub mod dataset;
pub mod error;
pub mod sampling;

pub use dataset::{
    ChannelId, ChannelSamples, DatasetSummary, Domain, Sample, SpectralBin, TimeSeriesDataset,
};
pub use error::DatasetError;
pub use sampling::{DEFAULT_SAMPLE_RATE, estimate_sample_rate, seconds_between};
