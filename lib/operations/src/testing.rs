//! Synthetic signals shared by the operation tests.

use chrono::{DateTime, TimeDelta, Utc};
use sigflow_timeseries::{ChannelId, Sample, TimeSeriesDataset};
use std::f64::consts::PI;

pub(crate) fn timestamp(index: usize, sample_rate: f64) -> DateTime<Utc> {
    let nanos = (index as f64 * 1e9 / sample_rate).round() as i64;
    DateTime::UNIX_EPOCH + TimeDelta::nanoseconds(nanos)
}

/// Samples of `sum(amplitude * sin(2 pi f t))` for one channel.
pub(crate) fn tones(
    channel: u32,
    len: usize,
    sample_rate: f64,
    components: &[(f64, f64)],
) -> Vec<Sample> {
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let value = components
                .iter()
                .map(|(freq, amp)| amp * (2.0 * PI * freq * t).sin())
                .sum();
            Sample::new(timestamp(i, sample_rate), ChannelId(channel), value)
        })
        .collect()
}

/// Two channels with different content, interleaved row by row.
pub(crate) fn two_channel_dataset(len: usize, sample_rate: f64) -> TimeSeriesDataset {
    let first = tones(1, len, sample_rate, &[(5.0, 1.0), (120.0, 0.5)]);
    let second = tones(2, len, sample_rate, &[(30.0, 2.0), (200.0, 0.25)]);
    let rows = first
        .into_iter()
        .zip(second)
        .flat_map(|(a, b)| [a, b])
        .collect();
    TimeSeriesDataset::from_samples(rows)
}

pub(crate) fn channel_values(dataset: &TimeSeriesDataset, channel: u32) -> Vec<f64> {
    dataset
        .channels()
        .expect("time-domain dataset")
        .remove(&ChannelId(channel))
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.value)
        .collect()
}

pub(crate) fn assert_channel_independent(
    run: impl Fn(&TimeSeriesDataset) -> TimeSeriesDataset,
    dataset: &TimeSeriesDataset,
) {
    let together = run(dataset);
    let separate = run(&dataset.select_channels(&[ChannelId(1)]))
        .concat(run(&dataset.select_channels(&[ChannelId(2)])))
        .expect("same domain");
    assert_eq!(together, separate);
}
