//! Filesystem-backed dataset store.

use crate::envelope::Envelope;
use async_trait::async_trait;
use sigflow_core::{DatasetId, StorageConfig};
use sigflow_timeseries::TimeSeriesDataset;
use sigflow_workflow::{DatasetStore, DatasetStoreError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores each dataset as `<dataset_id>.json` under a root directory.
///
/// Files are written to a temporary name and renamed into place, so a
/// reader never observes a partially written dataset.
#[derive(Debug, Clone)]
pub struct FsDatasetStore {
    root: PathBuf,
}

impl FsDatasetStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetStoreError::Io`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DatasetStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(io)?;
        tracing::debug!(root = %root.display(), "opened dataset store");
        Ok(Self { root })
    }

    /// Opens the store at the configured dataset directory.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetStoreError::Io`] if the directory cannot be created.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, DatasetStoreError> {
        Self::open(config.dataset_dir.clone()).await
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, dataset_id: DatasetId) -> PathBuf {
        self.root.join(format!("{dataset_id}.json"))
    }
}

#[async_trait]
impl DatasetStore for FsDatasetStore {
    #[tracing::instrument(skip_all, fields(%dataset_id))]
    async fn load(&self, dataset_id: DatasetId) -> Result<TimeSeriesDataset, DatasetStoreError> {
        let bytes = match tokio::fs::read(self.path_for(dataset_id)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(DatasetStoreError::NotFound { dataset_id });
            }
            Err(err) => return Err(io(err)),
        };

        let dataset = Envelope::<TimeSeriesDataset>::decode(&bytes)?.into_payload();
        tracing::debug!(rows = dataset.len(), "loaded dataset");
        Ok(dataset)
    }

    #[tracing::instrument(skip_all, fields(rows = dataset.len()))]
    async fn save(&self, dataset: &TimeSeriesDataset) -> Result<DatasetId, DatasetStoreError> {
        let dataset_id = DatasetId::new();
        let bytes = Envelope::new(dataset).encode()?;

        let path = self.path_for(dataset_id);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await.map_err(io)?;
        tokio::fs::rename(&staging, &path).await.map_err(io)?;

        tracing::debug!(%dataset_id, "saved dataset");
        Ok(dataset_id)
    }
}

fn io(err: std::io::Error) -> DatasetStoreError {
    DatasetStoreError::Io {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta};
    use sigflow_timeseries::{ChannelId, Sample, SpectralBin};

    fn samples() -> TimeSeriesDataset {
        let start = DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp");
        TimeSeriesDataset::from_samples(
            (0..10)
                .map(|i| {
                    Sample::new(
                        start + TimeDelta::milliseconds(i * 10),
                        ChannelId(1),
                        i as f64 * 0.5,
                    )
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsDatasetStore::open(dir.path()).await.expect("open");

        let dataset = samples();
        let id = store.save(&dataset).await.expect("save");

        assert!(dir.path().join(format!("{id}.json")).exists());
        assert_eq!(store.load(id).await.expect("load"), dataset);
    }

    #[tokio::test]
    async fn frequency_datasets_survive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsDatasetStore::open(dir.path()).await.expect("open");

        let dataset = TimeSeriesDataset::from_bins(vec![SpectralBin {
            frequency: 10.0,
            magnitude: 0.5,
            phase: -1.25,
            channel_id: ChannelId(3),
        }]);
        let id = store.save(&dataset).await.expect("save");
        assert_eq!(store.load(id).await.expect("load"), dataset);
    }

    #[tokio::test]
    async fn missing_dataset_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsDatasetStore::open(dir.path()).await.expect("open");

        let dataset_id = DatasetId::new();
        assert_eq!(
            store.load(dataset_id).await,
            Err(DatasetStoreError::NotFound { dataset_id })
        );
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsDatasetStore::open(dir.path()).await.expect("open");

        let dataset_id = DatasetId::new();
        std::fs::write(
            dir.path().join(format!("{dataset_id}.json")),
            br#"{"version": 2, "payload": null}"#,
        )
        .expect("write");

        assert_eq!(
            store.load(dataset_id).await,
            Err(DatasetStoreError::UnsupportedVersion { version: 2 })
        );
    }

    #[tokio::test]
    async fn open_creates_nested_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("a").join("b");
        let config = StorageConfig {
            dataset_dir: root.clone(),
            database_url: "sqlite::memory:".to_string(),
        };

        let store = FsDatasetStore::from_config(&config).await.expect("open");
        assert_eq!(store.root(), root);
        assert!(root.is_dir());
    }
}
