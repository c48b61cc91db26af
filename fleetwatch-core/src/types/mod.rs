use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Alert text the backend uses for a trip without any violation.
pub const NORMAL_SENTINEL: &str = "正常";

pub const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Body of a listing response, before normalization.
pub type RawResponse = serde_json::Value;

/// Parses a `yyyy-MM-dd` report date.
pub fn parse_report_date(input: &str) -> crate::Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(input.trim(), REPORT_DATE_FORMAT)?)
}

/// True iff `record_content` carries an alert, i.e. it is non-empty and not
/// the normal sentinel.
pub fn is_violation(record_content: &str) -> bool {
    !record_content.is_empty() && record_content != NORMAL_SENTINEL
}

/// Canonical record fields, named as the UI and the mapping table refer to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum CanonicalField {
    Id,
    VehicleNumber,
    DriverName,
    StartLocation,
    DepartureTime,
    Destination,
    Route,
    Speed,
    ArrivalTime,
    Mileage,
    RecordContent,
    ProcessingStatus,
}

/// Plain field values a [`MonitoringRecord`] is built from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordFields {
    pub id: String,
    pub vehicle_number: String,
    pub driver_name: String,
    pub start_location: String,
    pub departure_time: String,
    pub destination: String,
    pub route: String,
    pub speed: String,
    pub arrival_time: String,
    pub mileage: String,
    pub record_content: String,
    pub processing_status: String,
}

impl RecordFields {
    pub fn set(&mut self, field: CanonicalField, value: String) {
        let slot = match field {
            CanonicalField::Id => &mut self.id,
            CanonicalField::VehicleNumber => &mut self.vehicle_number,
            CanonicalField::DriverName => &mut self.driver_name,
            CanonicalField::StartLocation => &mut self.start_location,
            CanonicalField::DepartureTime => &mut self.departure_time,
            CanonicalField::Destination => &mut self.destination,
            CanonicalField::Route => &mut self.route,
            CanonicalField::Speed => &mut self.speed,
            CanonicalField::ArrivalTime => &mut self.arrival_time,
            CanonicalField::Mileage => &mut self.mileage,
            CanonicalField::RecordContent => &mut self.record_content,
            CanonicalField::ProcessingStatus => &mut self.processing_status,
        };
        *slot = value;
    }
}

/// One vehicle trip entry as shown in the dashboard.
///
/// `record_content` and `is_violation` are private so the violation flag can
/// only ever be derived from the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RecordFields")]
pub struct MonitoringRecord {
    pub id: String,
    pub vehicle_number: String,
    pub driver_name: String,
    pub start_location: String,
    pub departure_time: String,
    pub destination: String,
    pub route: String,
    pub speed: String,
    pub arrival_time: String,
    pub mileage: String,
    record_content: String,
    pub processing_status: String,
    is_violation: bool,
}

impl MonitoringRecord {
    pub fn record_content(&self) -> &str {
        &self.record_content
    }

    pub fn is_violation(&self) -> bool {
        self.is_violation
    }

    pub fn field(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Id => &self.id,
            CanonicalField::VehicleNumber => &self.vehicle_number,
            CanonicalField::DriverName => &self.driver_name,
            CanonicalField::StartLocation => &self.start_location,
            CanonicalField::DepartureTime => &self.departure_time,
            CanonicalField::Destination => &self.destination,
            CanonicalField::Route => &self.route,
            CanonicalField::Speed => &self.speed,
            CanonicalField::ArrivalTime => &self.arrival_time,
            CanonicalField::Mileage => &self.mileage,
            CanonicalField::RecordContent => &self.record_content,
            CanonicalField::ProcessingStatus => &self.processing_status,
        }
    }
}

impl From<RecordFields> for MonitoringRecord {
    fn from(fields: RecordFields) -> Self {
        let is_violation = is_violation(&fields.record_content);
        MonitoringRecord {
            id: fields.id,
            vehicle_number: fields.vehicle_number,
            driver_name: fields.driver_name,
            start_location: fields.start_location,
            departure_time: fields.departure_time,
            destination: fields.destination,
            route: fields.route,
            speed: fields.speed,
            arrival_time: fields.arrival_time,
            mileage: fields.mileage,
            record_content: fields.record_content,
            processing_status: fields.processing_status,
            is_violation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// Identifies one cacheable result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub organization_id: Option<String>,
    pub report_date: NaiveDate,
}

impl QueryKey {
    pub fn new(organization_id: Option<String>, report_date: NaiveDate) -> Self {
        QueryKey {
            organization_id,
            report_date,
        }
    }

    pub fn date_string(&self) -> String {
        self.report_date.format(REPORT_DATE_FORMAT).to_string()
    }
}

/// Aggregate counts as reported by the backend next to the record list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendSummary {
    pub total_count: Option<u64>,
    pub violation_count: Option<u64>,
    pub normal_count: Option<u64>,
}
