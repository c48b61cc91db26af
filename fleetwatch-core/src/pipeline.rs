//! Fetch → normalize → filter → paginate, wired to a [`MonitoringApi`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::client::{DetailsRequest, MonitoringApi};
use crate::config::Settings;
use crate::controller::{Dashboard, LoadApplied, LoadPlan, LoadTicket};
use crate::mock::{mock_organizations, MockGenerator};
use crate::normalize::{backend_summary, normalize_organizations, normalize_records, SchemaMapping};
use crate::prelude::*;
use crate::transfer::{save_csv, save_export, validate_import_file, ImportFile, ImportResult};
use crate::types::{MonitoringRecord, Organization, QueryKey};
use crate::view::counters;

/// Cheap to clone; the TUI hands one to every background fetch.
#[derive(Clone)]
pub struct RecordFetcher {
    api: Arc<dyn MonitoringApi>,
    schema: Arc<SchemaMapping>,
    request_page_size: usize,
    session_token: Option<String>,
}

impl RecordFetcher {
    pub fn new(api: Arc<dyn MonitoringApi>, settings: &Settings) -> Self {
        RecordFetcher {
            api,
            schema: Arc::new(settings.schema.clone()),
            request_page_size: settings.request_page_size,
            session_token: settings.session_token.clone(),
        }
    }

    pub fn api(&self) -> &dyn MonitoringApi {
        self.api.as_ref()
    }

    pub fn request_for(&self, key: &QueryKey) -> DetailsRequest {
        DetailsRequest::for_key(key, self.request_page_size, self.session_token.as_deref())
    }

    pub async fn fetch_records(&self, key: &QueryKey) -> Result<Vec<MonitoringRecord>> {
        let raw = self
            .api
            .list_monitoring_details(&self.request_for(key))
            .await?;
        let records = normalize_records(&raw, &self.schema);
        if let Some(summary) = backend_summary(&raw, &self.schema) {
            let local = counters(&records);
            let matches = summary.total_count.is_none_or(|n| n == local.total as u64)
                && summary
                    .violation_count
                    .is_none_or(|n| n == local.violations as u64);
            if !matches {
                debug!(
                    ?summary,
                    local_total = local.total,
                    local_violations = local.violations,
                    "Backend summary differs from the returned records"
                );
            }
        }
        info!(records = records.len(), date = %key.date_string(), "Fetched monitoring records");
        Ok(records)
    }

    pub async fn fetch_organizations(&self) -> Result<Vec<Organization>> {
        let raw = self.api.list_organizations().await?;
        Ok(normalize_organizations(&raw, &self.schema))
    }

    /// Downloads the backend export for `key` and writes it into `out_dir`.
    pub async fn export_to(&self, key: &QueryKey, out_dir: &Path) -> Result<PathBuf> {
        let payload = match self
            .api
            .export_monitoring_details(&self.request_for(key))
            .await
        {
            Ok(payload) => payload,
            Err(err) => {
                error!("Export failed: {err}");
                return Err(err);
            }
        };
        save_export(out_dir, key.report_date, &payload)
    }

    pub async fn import(&self, file: &ImportFile) -> Result<ImportResult> {
        validate_import_file(&file.name, file.mime.as_deref())?;
        match self.api.import_alert_records(file).await {
            Ok(result) => {
                if result.success {
                    info!(file = %file.name, "Alert records imported");
                } else {
                    warn!(file = %file.name, "Backend rejected import: {}", result.message);
                }
                Ok(result)
            }
            Err(err) => {
                error!("Import of {} failed: {err}", file.name);
                Err(err)
            }
        }
    }
}

/// Sequential driver around a [`Dashboard`] for callers that can await each
/// step in turn, such as the one-shot CLI commands.
pub struct DashboardService {
    fetcher: RecordFetcher,
    dashboard: Dashboard,
}

impl DashboardService {
    pub fn new(api: Arc<dyn MonitoringApi>, settings: &Settings, report_date: NaiveDate) -> Self {
        let dashboard = Dashboard::new(report_date)
            .with_page_size(settings.page_size)
            .with_mock(MockGenerator::new(), settings.mock_record_count);
        DashboardService {
            fetcher: RecordFetcher::new(api, settings),
            dashboard,
        }
    }

    pub fn fetcher(&self) -> &RecordFetcher {
        &self.fetcher
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn dashboard_mut(&mut self) -> &mut Dashboard {
        &mut self.dashboard
    }

    /// Loads the fleet list. Returns true when sample fleets had to be used.
    pub async fn load_organizations(&mut self) -> bool {
        match self.fetcher.fetch_organizations().await {
            Ok(organizations) => {
                info!(count = organizations.len(), "Loaded organizations");
                self.dashboard.set_organizations(organizations);
                false
            }
            Err(err) => {
                warn!("Loading organizations failed, using sample fleets: {err}");
                self.dashboard.set_organizations(mock_organizations());
                true
            }
        }
    }

    /// Shows records for the current selection, from the cache slot if it
    /// matches, otherwise from the backend.
    pub async fn load(&mut self) -> LoadApplied {
        match self.dashboard.begin_load() {
            LoadPlan::Reuse => LoadApplied::Reused,
            LoadPlan::Fetch(ticket) => self.run(ticket).await,
            LoadPlan::AlreadyLoading => {
                // A previous load was abandoned before it completed.
                let ticket = self.dashboard.restart_load();
                self.run(ticket).await
            }
        }
    }

    pub async fn search(&mut self) -> LoadApplied {
        let ticket = self.dashboard.submit_search();
        self.run(ticket).await
    }

    async fn run(&mut self, ticket: LoadTicket) -> LoadApplied {
        let outcome = self.fetcher.fetch_records(ticket.key()).await;
        self.dashboard.complete_load(ticket, outcome)
    }

    pub async fn export(&self, out_dir: &Path) -> Result<PathBuf> {
        self.fetcher
            .export_to(&self.dashboard.query_key(), out_dir)
            .await
    }

    /// Writes the currently filtered records as CSV without a backend call.
    pub fn export_csv(&self, out_dir: &Path) -> Result<PathBuf> {
        save_csv(
            out_dir,
            self.dashboard.selection().report_date,
            self.dashboard.filtered(),
        )
    }

    /// Uploads `file`; a successful import drops the cache and reloads.
    pub async fn import(&mut self, file: &ImportFile) -> Result<ImportResult> {
        let result = self.fetcher.import(file).await?;
        if result.success {
            self.dashboard.invalidate();
            self.load().await;
        }
        Ok(result)
    }

    /// Rejects non-spreadsheet names before the file is even read.
    pub async fn import_path(&mut self, path: &Path) -> Result<ImportResult> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        validate_import_file(&name, None)?;
        let file = ImportFile::from_path(path)?;
        self.import(&file).await
    }
}
