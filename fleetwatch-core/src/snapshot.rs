use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::client::{DetailsRequest, MonitoringApi};
use crate::errors::ErrorKind;
use crate::prelude::*;
use crate::transfer::{ExportPayload, ImportFile, ImportResult};
use crate::types::RawResponse;

pub const SNAPSHOT_ORGANIZATIONS_FILE: &str = "organizations.json";
pub const SNAPSHOT_DETAILS_FILE: &str = "monitoring_details.json";

pub fn read_json_from_dir<T>(dir: &Path, filename: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let path = dir.join(filename);
    let bytes = fs::read(&path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn write_json_to_dir<T>(dir: &Path, filename: &str, value: &T) -> Result<PathBuf>
where
    T: Serialize,
{
    fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    let file = fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(path)
}

/// Serves raw backend responses previously captured to a directory.
/// Export and import need the live backend and are refused.
pub struct SnapshotMonitoringApi {
    dir: PathBuf,
}

impl SnapshotMonitoringApi {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("snapshot directory {} does not exist", dir.display()),
            )
            .into());
        }
        info!("Serving monitoring data from snapshot {}", dir.display());
        Ok(SnapshotMonitoringApi { dir })
    }
}

#[async_trait]
impl MonitoringApi for SnapshotMonitoringApi {
    async fn list_organizations(&self) -> Result<RawResponse> {
        read_json_from_dir(&self.dir, SNAPSHOT_ORGANIZATIONS_FILE)
    }

    async fn list_monitoring_details(&self, _request: &DetailsRequest) -> Result<RawResponse> {
        read_json_from_dir(&self.dir, SNAPSHOT_DETAILS_FILE)
    }

    async fn export_monitoring_details(&self, _request: &DetailsRequest) -> Result<ExportPayload> {
        Err(ErrorKind::Unsupported("export is not available from a snapshot".to_string()).into())
    }

    async fn import_alert_records(&self, _file: &ImportFile) -> Result<ImportResult> {
        Err(ErrorKind::Unsupported("import is not available from a snapshot".to_string()).into())
    }
}

/// Captures the live organization and detail responses into `dir` so they
/// can be replayed with [`SnapshotMonitoringApi`].
pub async fn capture_snapshot(
    api: &dyn MonitoringApi,
    request: &DetailsRequest,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let organizations = api.list_organizations().await?;
    let details = api.list_monitoring_details(request).await?;
    Ok(vec![
        write_json_to_dir(dir, SNAPSHOT_ORGANIZATIONS_FILE, &organizations)?,
        write_json_to_dir(dir, SNAPSHOT_DETAILS_FILE, &details)?,
    ])
}
