//! Dataset snapshot resolution and on-disk layout.
//!
//! The latest snapshot name (e.g. `CC-MAIN-2024-18`) is cached in a sidecar
//! file next to the data folders so repeated runs skip the hub lookup:
//! ```text
//! {data_root}/fineweb-latest_dump.txt
//! {data_root}/fineweb-CC-MAIN-2024-18/New_data - 0.full.csv
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::file_index::FileIndexResolver;
use crate::config::{AppConfig, OUTPUT_EXT};

const DATASETS_SERVER_URL: &str = "https://datasets-server.huggingface.co";

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("No usable snapshot found for dataset {0}")]
    NoSnapshot(String),

    #[error("Hub request failed: {0}")]
    Hub(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of the snapshot (config) names published for a dataset.
pub trait SnapshotSource {
    fn config_names(&self, dataset: &str) -> Result<Vec<String>, DatasetError>;
}

/// Lists configs through the Hugging Face datasets-server `/splits` endpoint.
pub struct HubSnapshotSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HubSnapshotSource {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, DatasetError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DatasetError::Hub(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn default_hub() -> Result<Self, DatasetError> {
        Self::new(DATASETS_SERVER_URL, 30)
    }
}

/// Response body from GET /splits
#[derive(Deserialize)]
struct SplitsResponse {
    splits: Vec<SplitEntry>,
}

#[derive(Deserialize)]
struct SplitEntry {
    config: String,
}

impl SnapshotSource for HubSnapshotSource {
    fn config_names(&self, dataset: &str) -> Result<Vec<String>, DatasetError> {
        let url = format!("{}/splits", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("dataset", dataset)])
            .send()
            .map_err(|e| DatasetError::Hub(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DatasetError::Hub(format!("status {}: {body}", status.as_u16())));
        }

        let parsed: SplitsResponse = response
            .json()
            .map_err(|e| DatasetError::Hub(e.to_string()))?;

        let names: BTreeSet<String> = parsed.splits.into_iter().map(|s| s.config).collect();
        Ok(names.into_iter().collect())
    }
}

/// Newest snapshot among `names`, ignoring `default` and `sample*` configs.
pub fn pick_latest_snapshot(names: &[String]) -> Option<String> {
    names
        .iter()
        .filter(|n| n.as_str() != "default" && !n.starts_with("sample"))
        .max()
        .cloned()
}

/// `HuggingFaceFW/fineweb` → `fineweb`.
pub fn data_name(dataset: &str) -> &str {
    dataset.rsplit('/').next().unwrap_or(dataset)
}

/// Resolved location of one dataset snapshot's batch files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    dataset: String,
    data_root: PathBuf,
    snapshot: String,
}

impl DatasetLayout {
    pub fn new(dataset: &str, data_root: impl Into<PathBuf>, snapshot: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            data_root: data_root.into(),
            snapshot: snapshot.to_string(),
        }
    }

    /// Resolve the snapshot (sidecar first, then `source`) and create the data folder.
    pub fn resolve(
        dataset: &str,
        data_root: &Path,
        source: &dyn SnapshotSource,
    ) -> Result<Self, DatasetError> {
        std::fs::create_dir_all(data_root)?;
        let sidecar = sidecar_path(data_root, dataset);

        let cached = match std::fs::read_to_string(&sidecar) {
            Ok(text) => Some(text.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %sidecar.display(), error = %e, "Unreadable snapshot sidecar");
                None
            }
        };

        let snapshot = match cached {
            Some(name) => name,
            None => {
                tracing::info!(dataset, "Fetching latest snapshot name");
                let names = source.config_names(dataset)?;
                pick_latest_snapshot(&names)
                    .ok_or_else(|| DatasetError::NoSnapshot(dataset.to_string()))?
            }
        };

        std::fs::write(&sidecar, &snapshot)?;

        let layout = Self::new(dataset, data_root, &snapshot);
        std::fs::create_dir_all(layout.data_dir())?;
        tracing::debug!(data_dir = %layout.data_dir().display(), "Dataset layout resolved");
        Ok(layout)
    }

    pub fn from_config(config: &AppConfig, source: &dyn SnapshotSource) -> Result<Self, DatasetError> {
        Self::resolve(&config.dataset, &config.data_dir, source)
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    pub fn data_name(&self) -> &str {
        data_name(&self.dataset)
    }

    /// `{data_root}/{data_name}-{snapshot}`
    pub fn data_dir(&self) -> PathBuf {
        self.data_root
            .join(format!("{}-{}", self.data_name(), self.snapshot))
    }

    /// Resolver over this snapshot's batch files.
    pub fn resolver(&self) -> FileIndexResolver {
        FileIndexResolver::new(self.data_dir(), OUTPUT_EXT)
    }
}

fn sidecar_path(data_root: &Path, dataset: &str) -> PathBuf {
    data_root.join(format!("{}-latest_dump.txt", data_name(dataset)))
}
