//! Error types for dataset access.

use crate::dataset::{ChannelId, Domain};
use chrono::{DateTime, Utc};
use std::fmt;

/// Errors raised when a dataset does not have the shape a consumer expects.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// The dataset holds rows of a different domain than required.
    WrongDomain { expected: Domain, found: Domain },
    /// Two samples in the same channel share a timestamp.
    DuplicateTimestamp {
        channel_id: ChannelId,
        timestamp: DateTime<Utc>,
    },
    /// The sample spacing of a channel cannot be turned into a rate.
    DegenerateSampling { channel_id: ChannelId },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongDomain { expected, found } => {
                write!(f, "expected a {expected}-domain dataset, found {found}-domain")
            }
            Self::DuplicateTimestamp {
                channel_id,
                timestamp,
            } => {
                write!(
                    f,
                    "channel {channel_id} has more than one sample at {}",
                    timestamp.to_rfc3339()
                )
            }
            Self::DegenerateSampling { channel_id } => {
                write!(f, "cannot estimate a sampling rate for channel {channel_id}")
            }
        }
    }
}

impl std::error::Error for DatasetError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_domain_display() {
        let err = DatasetError::WrongDomain {
            expected: Domain::Time,
            found: Domain::Frequency,
        };
        assert_eq!(
            err.to_string(),
            "expected a time-domain dataset, found frequency-domain"
        );
    }

    #[test]
    fn degenerate_sampling_display() {
        let err = DatasetError::DegenerateSampling {
            channel_id: ChannelId(3),
        };
        assert_eq!(err.to_string(), "cannot estimate a sampling rate for channel 3");
    }
}
