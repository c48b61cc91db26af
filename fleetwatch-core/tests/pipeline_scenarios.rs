use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use fleetwatch_core::client::{DetailsRequest, MonitoringApi};
use fleetwatch_core::config::Settings;
use fleetwatch_core::controller::{CacheState, DataSource, LoadApplied, LoadPlan};
use fleetwatch_core::pipeline::{DashboardService, RecordFetcher};
use fleetwatch_core::prelude::*;
use fleetwatch_core::transfer::{ExportPayload, ImportFile, ImportResult};
use fleetwatch_core::types::RawResponse;
use serde_json::{json, Value};

/// Replays queued listing responses and counts every call.
#[derive(Default)]
struct ScriptedApi {
    listings: Mutex<VecDeque<Result<Value>>>,
    listing_calls: AtomicUsize,
    import_calls: AtomicUsize,
}

impl ScriptedApi {
    fn push_records(&self, count: usize) {
        let records: Vec<Value> = (1..=count)
            .map(|i| {
                json!({
                    "id": i,
                    "vehicleNumber": format!("粤J{i:05}"),
                    "driverName": if i % 10 == 0 { "王五" } else { "张三" },
                    "recordContent": if i % 4 == 0 { "疲劳驾驶，已记录违规行为" } else { "正常" },
                })
            })
            .collect();
        self.push(Ok(json!({ "records": records, "total": count })));
    }

    fn push(&self, response: Result<Value>) {
        self.listings.lock().unwrap().push_back(response);
    }

    fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }
}

fn unavailable() -> FleetError {
    FleetError::from(ErrorKind::Status {
        endpoint: "/vehicle/getVehMonitoringDetailsList".to_string(),
        status: 503,
    })
}

#[async_trait]
impl MonitoringApi for ScriptedApi {
    async fn list_organizations(&self) -> Result<RawResponse> {
        Ok(json!({ "orgList": [ { "id": "1", "name": "第一车队" } ] }))
    }

    async fn list_monitoring_details(&self, _request: &DetailsRequest) -> Result<RawResponse> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.listings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unavailable()))
    }

    async fn export_monitoring_details(&self, _request: &DetailsRequest) -> Result<ExportPayload> {
        Err(unavailable())
    }

    async fn import_alert_records(&self, _file: &ImportFile) -> Result<ImportResult> {
        self.import_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ImportResult {
            success: true,
            message: String::new(),
        })
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 23).unwrap()
}

fn service(api: &Arc<ScriptedApi>) -> DashboardService {
    DashboardService::new(api.clone(), &Settings::default(), date())
}

#[tokio::test]
async fn paginates_147_records_into_8_pages() {
    let api = Arc::new(ScriptedApi::default());
    api.push_records(147);
    let mut service = service(&api);

    assert_eq!(service.load().await, LoadApplied::Fresh);
    let view = service.dashboard().view();
    assert_eq!(view.page_info, "1/8");
    assert_eq!(view.rows.first().map(|r| r.index), Some(1));
    assert_eq!(view.rows.last().map(|r| r.index), Some(20));
    assert_eq!(view.counters.total, 147);
    assert_eq!(view.counters.violations, 36);
    assert_eq!(view.counters.normal, 111);

    service.dashboard_mut().goto_page("8").unwrap();
    let view = service.dashboard().view();
    assert_eq!(view.rows.len(), 7);
    assert_eq!(view.rows[0].vehicle_number, "粤J00141");
    assert_eq!(view.rows[6].vehicle_number, "粤J00147");
    assert!(view.pagination.prev_enabled);
    assert!(!view.pagination.next_enabled);
}

#[tokio::test]
async fn quick_search_without_matches_shows_no_data() {
    let api = Arc::new(ScriptedApi::default());
    api.push_records(147);
    let mut service = service(&api);
    service.load().await;

    service.dashboard_mut().set_quick_search("王五");
    assert_eq!(service.dashboard().filtered().len(), 14);
    assert_eq!(service.dashboard().view().counters.total, 14);

    service.dashboard_mut().set_quick_search("粤B");
    let view = service.dashboard().view();
    assert!(view.no_data);
    assert!(!view.pagination.visible);
    assert_eq!(service.dashboard().page_state().total_pages, 0);
    assert_eq!(service.dashboard().page_state().current_page, 1);
    assert_eq!(view.page_info, "0/0");
}

#[tokio::test]
async fn failed_listing_shows_sample_data_with_warning() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Err(unavailable()));
    let mut service = service(&api);

    assert_eq!(service.load().await, LoadApplied::Fallback);
    let dashboard = service.dashboard();
    assert_eq!(dashboard.source(), DataSource::Mock);
    assert_eq!(dashboard.cache_state(), CacheState::Fresh);
    let expected = dashboard
        .records()
        .iter()
        .filter(|r| r.is_violation())
        .count();
    let view = dashboard.view();
    assert_eq!(view.counters.violations, expected);
    assert!(view.warning.as_deref().is_some_and(|w| w.contains("503")));

    // The fallback is not cached, so the next load asks the backend again.
    api.push_records(3);
    assert_eq!(service.load().await, LoadApplied::Fresh);
    assert!(service.dashboard().warning().is_none());
    assert_eq!(api.listing_calls(), 2);
}

#[tokio::test]
async fn unparseable_listing_is_empty_not_an_error() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(json!({ "unexpected": true })));
    let mut service = service(&api);

    assert_eq!(service.load().await, LoadApplied::Fresh);
    assert!(service.dashboard().view().no_data);
    assert_eq!(service.dashboard().cache_state(), CacheState::Cached);
}

#[tokio::test]
async fn non_spreadsheet_import_is_rejected_before_upload() {
    let api = Arc::new(ScriptedApi::default());
    let mut service = service(&api);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.csv");
    std::fs::write(&path, "vehicle,alert\n").unwrap();

    let err = service.import_path(&path).await.unwrap_err();
    assert!(matches!(
        err.validation(),
        Some(ValidationError::UnsupportedImportFile { .. })
    ));
    assert_eq!(api.import_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.listing_calls(), 0);
}

#[tokio::test]
async fn successful_import_invalidates_and_reloads() {
    let api = Arc::new(ScriptedApi::default());
    api.push_records(10);
    api.push_records(12);
    let mut service = service(&api);
    service.load().await;
    assert_eq!(service.dashboard().records().len(), 10);

    let file = ImportFile {
        name: "alerts.xls".to_string(),
        mime: None,
        bytes: vec![1, 2, 3],
    };
    let result = service.import(&file).await.unwrap();
    assert!(result.success);
    assert_eq!(api.import_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.listing_calls(), 2);
    assert_eq!(service.dashboard().records().len(), 12);
}

#[tokio::test]
async fn explicit_search_always_refetches() {
    let api = Arc::new(ScriptedApi::default());
    api.push_records(5);
    api.push_records(6);
    let mut service = service(&api);

    service.load().await;
    assert_eq!(service.load().await, LoadApplied::Reused);
    assert_eq!(service.search().await, LoadApplied::Fresh);
    assert_eq!(service.dashboard().records().len(), 6);
    assert_eq!(api.listing_calls(), 2);
}

#[tokio::test]
async fn late_response_for_old_selection_is_dropped() {
    let api = Arc::new(ScriptedApi::default());
    api.push_records(40);
    api.push_records(8);
    let fetcher = RecordFetcher::new(api.clone(), &Settings::default());
    let mut service = DashboardService::new(api.clone(), &Settings::default(), date());

    let LoadPlan::Fetch(old) = service.dashboard_mut().begin_load() else {
        panic!("expected a fetch");
    };
    service.dashboard_mut().step_date(1);
    let LoadPlan::Fetch(new) = service.dashboard_mut().begin_load() else {
        panic!("expected a fetch");
    };

    let old_outcome = fetcher.fetch_records(old.key()).await;
    let new_outcome = fetcher.fetch_records(new.key()).await;

    let dashboard = service.dashboard_mut();
    assert_eq!(dashboard.complete_load(new, new_outcome), LoadApplied::Fresh);
    assert_eq!(dashboard.complete_load(old, old_outcome), LoadApplied::Stale);
    assert_eq!(dashboard.records().len(), 8);
    assert_eq!(dashboard.selection().report_date, date().succ_opt().unwrap());
}

#[tokio::test]
async fn export_failure_is_surfaced() {
    let api = Arc::new(ScriptedApi::default());
    let service = service(&api);
    let dir = tempfile::tempdir().unwrap();
    let err = service.export(dir.path()).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn csv_export_writes_filtered_records() {
    let api = Arc::new(ScriptedApi::default());
    api.push_records(30);
    let mut service = service(&api);
    service.load().await;
    service.dashboard_mut().set_quick_search("王五");

    let dir = tempfile::tempdir().unwrap();
    let path = service.export_csv(dir.path()).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert_eq!(text.lines().count(), 4);
}
