//! Spreadsheet export and alert-record import helpers.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::prelude::*;
use crate::types::{MonitoringRecord, REPORT_DATE_FORMAT};

pub const XLS_MIME: &str = "application/vnd.ms-excel";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const EXPORT_FILE_PREFIX: &str = "vehicle_monitoring_details";

const CSV_HEADER: [&str; 12] = [
    "id",
    "vehicleNumber",
    "driverName",
    "startLocation",
    "departureTime",
    "destination",
    "route",
    "speed",
    "arrivalTime",
    "mileage",
    "recordContent",
    "processingStatus",
];

/// Body of a backend export response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// A spreadsheet selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImportFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_for_name(&name).map(str::to_string);
        let bytes = std::fs::read(path)?;
        Ok(ImportFile { name, mime, bytes })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

fn default_success() -> bool {
    true
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

fn mime_for_name(name: &str) -> Option<&'static str> {
    match extension(name).as_deref() {
        Some("xls") => Some(XLS_MIME),
        Some("xlsx") => Some(XLSX_MIME),
        _ => None,
    }
}

/// Accepts Excel workbooks, recognised by extension or MIME type.
pub fn validate_import_file(
    name: &str,
    mime: Option<&str>,
) -> std::result::Result<(), ValidationError> {
    let mime_ok = matches!(mime, Some(XLS_MIME) | Some(XLSX_MIME));
    if mime_ok || mime_for_name(name).is_some() {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedImportFile {
            name: name.to_string(),
        })
    }
}

pub fn export_file_name(report_date: NaiveDate) -> String {
    format!(
        "{EXPORT_FILE_PREFIX}_{}.xls",
        report_date.format(REPORT_DATE_FORMAT)
    )
}

pub fn csv_file_name(report_date: NaiveDate) -> String {
    format!(
        "{EXPORT_FILE_PREFIX}_{}.csv",
        report_date.format(REPORT_DATE_FORMAT)
    )
}

/// Writes a backend export into `dir`, named after the report date.
pub fn save_export(
    dir: &Path,
    report_date: NaiveDate,
    payload: &ExportPayload,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(report_date));
    std::fs::write(&path, &payload.bytes)?;
    info!(bytes = payload.bytes.len(), "Saved export to {}", path.display());
    Ok(path)
}

/// Writes the header row and one row per record.
pub fn write_csv<W: Write>(records: &[MonitoringRecord], writer: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(CSV_HEADER)?;
    for record in records {
        let fields: [&str; 12] = [
            &record.id,
            &record.vehicle_number,
            &record.driver_name,
            &record.start_location,
            &record.departure_time,
            &record.destination,
            &record.route,
            &record.speed,
            &record.arrival_time,
            &record.mileage,
            record.record_content(),
            &record.processing_status,
        ];
        writer.write_record(fields)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_csv(
    dir: &Path,
    report_date: NaiveDate,
    records: &[MonitoringRecord],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(csv_file_name(report_date));
    let file = std::fs::File::create(&path)?;
    write_csv(records, std::io::BufWriter::new(file))?;
    info!(records = records.len(), "Saved CSV to {}", path.display());
    Ok(path)
}
