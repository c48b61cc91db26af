//! Maps heterogeneous backend payloads onto [`MonitoringRecord`] and
//! [`Organization`].
//!
//! All shape knowledge lives in [`SchemaMapping`], a versioned table of
//! source field names per canonical field. Supporting a new backend shape is
//! a change to that table (or to the `[schema]` section of the config file),
//! never a new code path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::types::{
    BackendSummary, CanonicalField, MonitoringRecord, Organization, RawResponse, RecordFields,
    NORMAL_SENTINEL,
};

pub const SCHEMA_MAPPING_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub version: u32,
    /// Dot-separated paths to the record array, tried in order.
    pub list_fields: Vec<String>,
    /// Canonical field name (camelCase) to source field names, tried in order.
    pub fields: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub total_count_fields: Vec<String>,
    #[serde(default)]
    pub violation_count_fields: Vec<String>,
    #[serde(default)]
    pub normal_count_fields: Vec<String>,
    pub organization_list_fields: Vec<String>,
    pub organization_id_fields: Vec<String>,
    pub organization_name_fields: Vec<String>,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        let aliases: [(CanonicalField, &[&str]); 12] = [
            (CanonicalField::Id, &["id", "recordId"]),
            (CanonicalField::VehicleNumber, &["vehicleNumber", "vehicleNo"]),
            (CanonicalField::DriverName, &["driverName"]),
            (CanonicalField::StartLocation, &["startLocation"]),
            (CanonicalField::DepartureTime, &["departureTime", "startTime"]),
            (CanonicalField::Destination, &["destination"]),
            (CanonicalField::Route, &["route"]),
            (CanonicalField::Speed, &["speed"]),
            (CanonicalField::ArrivalTime, &["arrivalTime", "endTime"]),
            (CanonicalField::Mileage, &["mileage"]),
            (CanonicalField::RecordContent, &["recordContent", "alertContent"]),
            (CanonicalField::ProcessingStatus, &["processingStatus"]),
        ];
        SchemaMapping {
            version: SCHEMA_MAPPING_VERSION,
            list_fields: strings(&[
                "records",
                "vehMonitoringDetailsList",
                "data.records",
                "data.vehMonitoringDetailsList",
                "data",
            ]),
            fields: aliases
                .iter()
                .map(|(field, names)| (field.to_string(), strings(names)))
                .collect(),
            total_count_fields: strings(&["totalCount", "total"]),
            violation_count_fields: strings(&["violationCount"]),
            normal_count_fields: strings(&["normalCount"]),
            organization_list_fields: strings(&["orgList", "organizations", "data"]),
            organization_id_fields: strings(&["id", "orgId", "teamId"]),
            organization_name_fields: strings(&["name", "orgName", "teamName"]),
        }
    }
}

impl SchemaMapping {
    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.fields
            .get(&field.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Keys of `fields` that do not name a canonical field.
    pub fn unknown_fields(&self) -> Vec<&str> {
        self.fields
            .keys()
            .filter(|key| key.parse::<CanonicalField>().is_err())
            .map(String::as_str)
            .collect()
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Decodes the record list, in backend order. Never fails: an absent or
/// malformed list yields an empty sequence.
pub fn normalize_records(raw: &RawResponse, mapping: &SchemaMapping) -> Vec<MonitoringRecord> {
    let Some(items) = find_list(raw, &mapping.list_fields) else {
        warn!(
            schema_version = mapping.version,
            "Monitoring details response has no record list, treating it as empty"
        );
        return Vec::new();
    };

    let mut records = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            warn!(position, "Skipping monitoring record that is not an object");
            continue;
        };
        let mut fields = RecordFields::default();
        for field in CanonicalField::iter() {
            let value = first_scalar(object, mapping.aliases(field));
            match (field, value) {
                (_, Some(value)) => fields.set(field, value),
                (CanonicalField::Id, None) => fields.set(field, (position + 1).to_string()),
                (CanonicalField::RecordContent, None) => {
                    fields.set(field, NORMAL_SENTINEL.to_string())
                }
                (_, None) => {}
            }
        }
        if fields.record_content.is_empty() {
            fields.record_content = NORMAL_SENTINEL.to_string();
        }
        records.push(MonitoringRecord::from(fields));
    }
    records
}

pub fn normalize_organizations(raw: &RawResponse, mapping: &SchemaMapping) -> Vec<Organization> {
    let Some(items) = find_list(raw, &mapping.organization_list_fields) else {
        warn!("Organization response has no organization list, treating it as empty");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let id = first_scalar(object, &mapping.organization_id_fields)?;
            let name = first_scalar(object, &mapping.organization_name_fields)
                .unwrap_or_else(|| id.clone());
            Some(Organization { id, name })
        })
        .collect()
}

pub fn backend_summary(raw: &RawResponse, mapping: &SchemaMapping) -> Option<BackendSummary> {
    let object = raw.as_object()?;
    let count = |names: &[String]| {
        names
            .iter()
            .find_map(|name| object.get(name))
            .and_then(as_count)
    };
    let summary = BackendSummary {
        total_count: count(&mapping.total_count_fields),
        violation_count: count(&mapping.violation_count_fields),
        normal_count: count(&mapping.normal_count_fields),
    };
    if summary == BackendSummary::default() {
        None
    } else {
        debug!(?summary, "Backend reported summary counts");
        Some(summary)
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn find_list<'a>(raw: &'a Value, paths: &[String]) -> Option<&'a Vec<Value>> {
    if let Value::Array(items) = raw {
        return Some(items);
    }
    paths
        .iter()
        .filter_map(|path| lookup_path(raw, path))
        .find_map(Value::as_array)
}

fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| current.get(segment))
}

fn first_scalar(object: &serde_json::Map<String, Value>, names: &[String]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| object.get(name))
        .find_map(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
