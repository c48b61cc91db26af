//! Owned dashboard state: selection, cache slot, filter and page state.
//!
//! Nothing here performs I/O. Callers ask [`Dashboard::begin_load`] what to
//! do, run the fetch themselves and hand the outcome back to
//! [`Dashboard::complete_load`] together with the [`LoadTicket`] they were
//! given. A ticket that no longer matches the in-flight load or the current
//! selection is dropped, so a slow response can never overwrite newer state.

use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta};
use tracing::{debug, info, warn};

use crate::errors::ValidationError;
use crate::filter::apply_filter;
use crate::mock::{MockGenerator, DEFAULT_MOCK_RECORD_COUNT};
use crate::pagination::{paginate, parse_page_input, PageState, DEFAULT_PAGE_SIZE};
use crate::prelude::*;
use crate::types::{MonitoringRecord, Organization, QueryKey};
use crate::view::{project, DashboardView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub organization_id: Option<String>,
    pub report_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Fresh,
    Cached,
}

/// Where the records currently on display came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Empty,
    Remote,
    Cache,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    key: QueryKey,
}

impl LoadTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPlan {
    /// The cache slot matched; its records are already applied.
    Reuse,
    Fetch(LoadTicket),
    /// A fetch for the same key is still outstanding.
    AlreadyLoading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadApplied {
    Fresh,
    Reused,
    Fallback,
    Stale,
}

struct CacheSlot {
    key: QueryKey,
    records: Arc<[MonitoringRecord]>,
}

pub struct Dashboard {
    organizations: Vec<Organization>,
    selection: Selection,
    search_term: String,
    page: PageState,
    records: Arc<[MonitoringRecord]>,
    filtered: Vec<MonitoringRecord>,
    cache: Option<CacheSlot>,
    source: DataSource,
    warning: Option<String>,
    generation: u64,
    in_flight: Option<LoadTicket>,
    mock: MockGenerator,
    mock_record_count: usize,
}

impl Dashboard {
    pub fn new(report_date: NaiveDate) -> Self {
        Dashboard {
            organizations: Vec::new(),
            selection: Selection {
                organization_id: None,
                report_date,
            },
            search_term: String::new(),
            page: PageState::new(DEFAULT_PAGE_SIZE),
            records: Arc::from(Vec::new()),
            filtered: Vec::new(),
            cache: None,
            source: DataSource::Empty,
            warning: None,
            generation: 0,
            in_flight: None,
            mock: MockGenerator::new(),
            mock_record_count: DEFAULT_MOCK_RECORD_COUNT,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page = PageState::new(page_size);
        self
    }

    pub fn with_mock(mut self, mock: MockGenerator, record_count: usize) -> Self {
        self.mock = mock;
        self.mock_record_count = record_count;
        self
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn query_key(&self) -> QueryKey {
        QueryKey::new(
            self.selection.organization_id.clone(),
            self.selection.report_date,
        )
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn page_state(&self) -> &PageState {
        &self.page
    }

    pub fn records(&self) -> &[MonitoringRecord] {
        &self.records
    }

    pub fn filtered(&self) -> &[MonitoringRecord] {
        &self.filtered
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn cache_state(&self) -> CacheState {
        let key = self.query_key();
        match &self.cache {
            Some(slot) if slot.key == key => CacheState::Cached,
            _ => CacheState::Fresh,
        }
    }

    /// Display name of the selected fleet, "All fleets" when none is selected.
    pub fn organization_label(&self) -> String {
        match &self.selection.organization_id {
            None => "All fleets".to_string(),
            Some(id) => self
                .organizations
                .iter()
                .find(|org| &org.id == id)
                .map(|org| org.name.clone())
                .unwrap_or_else(|| id.clone()),
        }
    }

    pub fn set_organizations(&mut self, organizations: Vec<Organization>) {
        self.organizations = organizations;
    }

    /// Returns true when the selection changed, which also drops the cache
    /// and orphans any outstanding load.
    pub fn select_organization(&mut self, organization_id: Option<String>) -> bool {
        if self.selection.organization_id == organization_id {
            return false;
        }
        self.selection.organization_id = organization_id;
        self.selection_changed();
        true
    }

    pub fn select_date(&mut self, report_date: NaiveDate) -> bool {
        if self.selection.report_date == report_date {
            return false;
        }
        self.selection.report_date = report_date;
        self.selection_changed();
        true
    }

    /// Cycles through "all fleets" followed by every known organization.
    pub fn step_organization(&mut self, forward: bool) -> bool {
        let choices: Vec<Option<String>> = std::iter::once(None)
            .chain(self.organizations.iter().map(|org| Some(org.id.clone())))
            .collect();
        let position = choices
            .iter()
            .position(|choice| *choice == self.selection.organization_id)
            .unwrap_or(0);
        let next = if forward {
            (position + 1) % choices.len()
        } else {
            (position + choices.len() - 1) % choices.len()
        };
        self.select_organization(choices[next].clone())
    }

    pub fn step_date(&mut self, days: i64) -> bool {
        match self
            .selection
            .report_date
            .checked_add_signed(TimeDelta::days(days))
        {
            Some(date) => self.select_date(date),
            None => false,
        }
    }

    fn selection_changed(&mut self) {
        self.invalidate();
        if let Some(ticket) = self.in_flight.take() {
            debug!(
                generation = ticket.generation,
                "Selection changed, outstanding load will be discarded"
            );
        }
    }

    pub fn invalidate(&mut self) {
        if self.cache.take().is_some() {
            debug!("Cache slot cleared");
        }
    }

    /// Decides between the cache slot and a new fetch for the current key.
    pub fn begin_load(&mut self) -> LoadPlan {
        let key = self.query_key();
        if let Some(slot) = self.cache.as_ref().filter(|slot| slot.key == key) {
            let records = Arc::clone(&slot.records);
            debug!(records = records.len(), "Serving monitoring records from cache");
            self.apply_records(records, DataSource::Cache, None);
            return LoadPlan::Reuse;
        }
        if self
            .in_flight
            .as_ref()
            .is_some_and(|ticket| ticket.key == key)
        {
            return LoadPlan::AlreadyLoading;
        }
        LoadPlan::Fetch(self.issue_ticket(key))
    }

    /// Replaces any outstanding load for the current key with a new one.
    pub fn restart_load(&mut self) -> LoadTicket {
        let key = self.query_key();
        self.issue_ticket(key)
    }

    /// Explicit search: drops the cache and everything derived from it, then
    /// asks for a fetch of the current selection.
    pub fn submit_search(&mut self) -> LoadTicket {
        self.invalidate();
        self.records = Arc::from(Vec::new());
        self.filtered.clear();
        self.warning = None;
        self.source = DataSource::Empty;
        self.page.reset_to_first();
        self.page.recompute(0);
        let key = self.query_key();
        self.issue_ticket(key)
    }

    fn issue_ticket(&mut self, key: QueryKey) -> LoadTicket {
        self.generation += 1;
        let ticket = LoadTicket {
            generation: self.generation,
            key,
        };
        info!(
            generation = ticket.generation,
            date = %ticket.key.date_string(),
            organization = ?ticket.key.organization_id,
            "Loading monitoring records"
        );
        self.in_flight = Some(ticket.clone());
        ticket
    }

    /// Applies the outcome of the fetch started for `ticket`.
    ///
    /// A failed fetch leaves the cache empty and shows generated records
    /// with a warning instead.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        outcome: Result<Vec<MonitoringRecord>>,
    ) -> LoadApplied {
        let current = self.in_flight.as_ref() == Some(&ticket) && ticket.key == self.query_key();
        if !current {
            warn!(
                generation = ticket.generation,
                "Discarding stale monitoring records for {}",
                ticket.key.date_string()
            );
            return LoadApplied::Stale;
        }
        self.in_flight = None;

        match outcome {
            Ok(records) => {
                let records: Arc<[MonitoringRecord]> = Arc::from(records);
                info!(records = records.len(), "Monitoring records loaded");
                self.cache = Some(CacheSlot {
                    key: ticket.key,
                    records: Arc::clone(&records),
                });
                self.apply_records(records, DataSource::Remote, None);
                LoadApplied::Fresh
            }
            Err(err) => {
                warn!("Loading monitoring records failed, showing sample data: {err}");
                let records = self
                    .mock
                    .generate(ticket.key.report_date, self.mock_record_count);
                let warning = if err.is_transport() {
                    format!("Live data unavailable, showing sample data ({err})")
                } else {
                    format!("Could not read live data, showing sample data ({err})")
                };
                self.apply_records(Arc::from(records), DataSource::Mock, Some(warning));
                LoadApplied::Fallback
            }
        }
    }

    fn apply_records(
        &mut self,
        records: Arc<[MonitoringRecord]>,
        source: DataSource,
        warning: Option<String>,
    ) {
        self.records = records;
        self.source = source;
        self.warning = warning;
        self.page.reset_to_first();
        self.refilter();
    }

    fn refilter(&mut self) {
        self.filtered = apply_filter(&self.records, &self.search_term);
        self.page.recompute(self.filtered.len());
    }

    pub fn set_quick_search(&mut self, term: &str) {
        if self.search_term == term {
            return;
        }
        self.search_term = term.to_string();
        self.page.reset_to_first();
        self.refilter();
    }

    pub fn set_page_size(&mut self, page_size: usize) -> std::result::Result<(), ValidationError> {
        self.page.set_page_size(page_size)
    }

    /// Validates the "go to page" input before moving.
    pub fn goto_page(&mut self, input: &str) -> std::result::Result<usize, ValidationError> {
        let page = parse_page_input(input, self.page.total_pages)?;
        self.page.select(page);
        Ok(page)
    }

    pub fn select_page(&mut self, page: usize) -> bool {
        self.page.select(page)
    }

    pub fn next_page(&mut self) -> bool {
        self.page.select(self.page.current_page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        self.page.select(self.page.current_page.saturating_sub(1))
    }

    pub fn view(&self) -> DashboardView {
        let slice = paginate(&self.filtered, self.page.current_page, self.page.page_size);
        project(&slice, &self.page, &self.filtered, self.warning.as_deref())
    }
}
