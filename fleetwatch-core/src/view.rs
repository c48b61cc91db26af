//! Substrate-independent projection of the dashboard state: table rows,
//! pagination controls and summary counters.

use std::ops::RangeInclusive;

use crate::pagination::{PageSlice, PageState};
use crate::types::MonitoringRecord;

/// Maximum number of page-number buttons in the pagination control.
pub const PAGE_WINDOW: usize = 5;

pub const VIOLATION_BADGE: &str = "[违规]";

pub const TABLE_HEADERS: [&str; 12] = [
    "#",
    "Vehicle",
    "Driver",
    "From",
    "Departure",
    "To",
    "Route",
    "Speed",
    "Arrival",
    "Mileage",
    "Record",
    "Status",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// 1-based position within the filtered set.
    pub index: usize,
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
    pub is_violation: bool,
}

impl TableRow {
    fn new(index: usize, record: &MonitoringRecord) -> Self {
        TableRow {
            index,
            vehicle_number: record.vehicle_number.clone(),
            driver_name: record.driver_name.clone(),
            start_location: record.start_location.clone(),
            departure_time: record.departure_time.clone(),
            destination: record.destination.clone(),
            route: record.route.clone(),
            speed: record.speed.clone(),
            arrival_time: record.arrival_time.clone(),
            mileage: record.mileage.clone(),
            record_content: record.record_content().to_string(),
            processing_status: record.processing_status.clone(),
            is_violation: record.is_violation(),
        }
    }

    pub fn record_label(&self) -> String {
        if self.is_violation {
            format!("{VIOLATION_BADGE} {}", self.record_content)
        } else {
            self.record_content.clone()
        }
    }

    /// Cell texts in [`TABLE_HEADERS`] order.
    pub fn cells(&self) -> [String; 12] {
        [
            self.index.to_string(),
            self.vehicle_number.clone(),
            self.driver_name.clone(),
            self.start_location.clone(),
            self.departure_time.clone(),
            self.destination.clone(),
            self.route.clone(),
            self.speed.clone(),
            self.arrival_time.clone(),
            self.mileage.clone(),
            self.record_label(),
            self.processing_status.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub total: usize,
    pub violations: usize,
    pub normal: usize,
}

/// Counts over the whole filtered set, not just the visible page.
pub fn counters(filtered: &[MonitoringRecord]) -> Counters {
    let violations = filtered.iter().filter(|r| r.is_violation()).count();
    Counters {
        total: filtered.len(),
        violations,
        normal: filtered.len() - violations,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageButton {
    pub number: usize,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationControls {
    /// Hidden when there is at most one page.
    pub visible: bool,
    pub prev_enabled: bool,
    pub next_enabled: bool,
    pub pages: Vec<PageButton>,
}

/// Up to [`PAGE_WINDOW`] page numbers centered on `current`, shifted to stay
/// inside `1..=total_pages`.
pub fn page_window(current: usize, total_pages: usize) -> RangeInclusive<usize> {
    if total_pages == 0 {
        return RangeInclusive::new(1, 0);
    }
    let half = PAGE_WINDOW / 2;
    let mut start = current.saturating_sub(half).max(1);
    if total_pages >= PAGE_WINDOW {
        start = start.min(total_pages - PAGE_WINDOW + 1);
    }
    let end = (start + PAGE_WINDOW - 1).min(total_pages);
    start..=end
}

pub fn pagination_controls(state: &PageState) -> PaginationControls {
    if state.total_pages <= 1 {
        return PaginationControls::default();
    }
    PaginationControls {
        visible: true,
        prev_enabled: state.has_prev(),
        next_enabled: state.has_next(),
        pages: page_window(state.current_page, state.total_pages)
            .map(|number| PageButton {
                number,
                active: number == state.current_page,
            })
            .collect(),
    }
}

pub fn page_info(state: &PageState) -> String {
    let current = if state.total_pages > 0 {
        state.current_page
    } else {
        0
    };
    format!("{current}/{}", state.total_pages)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub rows: Vec<TableRow>,
    pub no_data: bool,
    pub pagination: PaginationControls,
    pub counters: Counters,
    pub page_info: String,
    pub warning: Option<String>,
}

pub fn project(
    page: &PageSlice<'_, MonitoringRecord>,
    state: &PageState,
    filtered: &[MonitoringRecord],
    warning: Option<&str>,
) -> DashboardView {
    let rows = page
        .items
        .iter()
        .enumerate()
        .map(|(offset, record)| TableRow::new(page.start + offset + 1, record))
        .collect();
    DashboardView {
        rows,
        no_data: filtered.is_empty(),
        pagination: pagination_controls(state),
        counters: counters(filtered),
        page_info: page_info(state),
        warning: warning.map(str::to_string),
    }
}
