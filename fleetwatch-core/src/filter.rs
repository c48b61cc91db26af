use crate::types::{CanonicalField, MonitoringRecord};

const SEARCHED_FIELDS: [CanonicalField; 3] = [
    CanonicalField::VehicleNumber,
    CanonicalField::DriverName,
    CanonicalField::RecordContent,
];

/// Quick-search filter: case-insensitive substring match on vehicle number,
/// driver name and record content. An empty (or blank) term keeps every
/// record in its original order.
pub fn apply_filter(records: &[MonitoringRecord], term: &str) -> Vec<MonitoringRecord> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| matches_needle(record, &needle))
        .cloned()
        .collect()
}

fn matches_needle(record: &MonitoringRecord, needle: &str) -> bool {
    SEARCHED_FIELDS
        .iter()
        .any(|field| record.field(*field).to_lowercase().contains(needle))
}
