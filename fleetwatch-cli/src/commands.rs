//! One-shot subcommands built on [`DashboardService`].

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use fleetwatch_core::client::MonitoringApi;
use fleetwatch_core::config::Settings;
use fleetwatch_core::controller::LoadApplied;
use fleetwatch_core::pipeline::DashboardService;
use fleetwatch_core::snapshot::capture_snapshot;
use fleetwatch_core::types::QueryKey;
use fleetwatch_core::view::{DashboardView, TABLE_HEADERS};

use crate::error::CliResult;

pub struct ListRequest {
    pub organization_id: Option<String>,
    pub report_date: NaiveDate,
    pub search: String,
    pub page: String,
}

pub struct ExportRequest {
    pub organization_id: Option<String>,
    pub report_date: NaiveDate,
    pub search: String,
    pub out_dir: PathBuf,
    pub csv: bool,
}

fn service_for(
    api: Arc<dyn MonitoringApi>,
    settings: &Settings,
    organization_id: Option<String>,
    report_date: NaiveDate,
) -> DashboardService {
    let mut service = DashboardService::new(api, settings, report_date);
    service.dashboard_mut().select_organization(organization_id);
    service
}

fn warn_on_fallback(applied: LoadApplied, service: &DashboardService) {
    if applied == LoadApplied::Fallback {
        if let Some(warning) = service.dashboard().warning() {
            eprintln!("warning: {warning}");
        }
    }
}

pub async fn print_organizations(
    api: Arc<dyn MonitoringApi>,
    settings: &Settings,
) -> CliResult<()> {
    let mut service = DashboardService::new(api, settings, chrono::Local::now().date_naive());
    if service.load_organizations().await {
        eprintln!("warning: organizations unavailable, showing sample fleets");
    }
    for org in service.dashboard().organizations() {
        println!("{}\t{}", org.id, org.name);
    }
    Ok(())
}

pub async fn list(
    api: Arc<dyn MonitoringApi>,
    settings: &Settings,
    request: ListRequest,
) -> CliResult<()> {
    let mut service = service_for(api, settings, request.organization_id, request.report_date);
    let applied = service.load().await;
    warn_on_fallback(applied, &service);

    let dashboard = service.dashboard_mut();
    dashboard.set_quick_search(&request.search);
    if dashboard.page_state().total_pages > 0 {
        dashboard.goto_page(&request.page)?;
    }
    print!("{}", format_view(&dashboard.view()));
    Ok(())
}

pub async fn export(
    api: Arc<dyn MonitoringApi>,
    settings: &Settings,
    request: ExportRequest,
) -> CliResult<()> {
    let mut service = service_for(api, settings, request.organization_id, request.report_date);
    let path = if request.csv {
        let applied = service.load().await;
        warn_on_fallback(applied, &service);
        service.dashboard_mut().set_quick_search(&request.search);
        service.export_csv(&request.out_dir)?
    } else {
        service.export(&request.out_dir).await?
    };
    println!("{}", path.display());
    Ok(())
}

pub async fn import(
    api: Arc<dyn MonitoringApi>,
    settings: &Settings,
    file: &Path,
) -> CliResult<()> {
    let mut service = DashboardService::new(api, settings, chrono::Local::now().date_naive());
    let result = service.import_path(file).await?;
    if result.success {
        println!("import succeeded {}", result.message);
        Ok(())
    } else {
        Err(format!("import rejected: {}", result.message).into())
    }
}

pub async fn snapshot(
    api: Arc<dyn MonitoringApi>,
    settings: &Settings,
    organization_id: Option<String>,
    report_date: NaiveDate,
    out_dir: &Path,
) -> CliResult<()> {
    let service = DashboardService::new(api, settings, report_date);
    let fetcher = service.fetcher();
    let request = fetcher.request_for(&QueryKey::new(organization_id, report_date));
    for path in capture_snapshot(fetcher.api(), &request, out_dir).await? {
        println!("{}", path.display());
    }
    Ok(())
}

/// Plain-text rendering of a dashboard page.
pub fn format_view(view: &DashboardView) -> String {
    let mut out = String::new();
    if let Some(warning) = &view.warning {
        let _ = writeln!(out, "! {warning}");
    }
    let _ = writeln!(
        out,
        "total {}  violations {}  normal {}  page {}",
        view.counters.total, view.counters.violations, view.counters.normal, view.page_info
    );
    if view.no_data {
        out.push_str("No data\n");
        return out;
    }
    let _ = writeln!(out, "{}", TABLE_HEADERS.join("\t"));
    for row in &view.rows {
        let _ = writeln!(out, "{}", row.cells().join("\t"));
    }
    if view.pagination.visible {
        let pages: Vec<String> = view
            .pagination
            .pages
            .iter()
            .map(|button| {
                if button.active {
                    format!("[{}]", button.number)
                } else {
                    button.number.to_string()
                }
            })
            .collect();
        let _ = writeln!(
            out,
            "{} {} {}",
            if view.pagination.prev_enabled { "<" } else { " " },
            pages.join(" "),
            if view.pagination.next_enabled { ">" } else { " " },
        );
    }
    out
}
