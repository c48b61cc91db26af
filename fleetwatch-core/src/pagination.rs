use std::ops::Range;

use crate::errors::ValidationError;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 20, 50, 100];

/// `ceil(total_records / page_size)`, 0 for an empty set.
pub fn total_pages(total_records: usize, page_size: usize) -> usize {
    total_records.div_ceil(page_size.max(1))
}

/// Clamps `page` into `[1, max(total_pages, 1)]`.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub current_page: usize,
    pub page_size: usize,
    pub total_records: usize,
    pub total_pages: usize,
}

impl Default for PageState {
    fn default() -> Self {
        PageState::new(DEFAULT_PAGE_SIZE)
    }
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        PageState {
            current_page: 1,
            page_size: page_size.max(1),
            total_records: 0,
            total_pages: 0,
        }
    }

    /// Recomputes the page count for a new filtered set and clamps the
    /// current page into range.
    pub fn recompute(&mut self, total_records: usize) {
        self.total_records = total_records;
        self.total_pages = total_pages(total_records, self.page_size);
        self.current_page = clamp_page(self.current_page, self.total_pages);
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), ValidationError> {
        if page_size == 0 {
            return Err(ValidationError::ZeroPageSize);
        }
        self.page_size = page_size;
        self.current_page = 1;
        self.recompute(self.total_records);
        Ok(())
    }

    pub fn reset_to_first(&mut self) {
        self.current_page = 1;
    }

    pub fn select(&mut self, page: usize) -> bool {
        let page = clamp_page(page, self.total_pages);
        let changed = page != self.current_page;
        self.current_page = page;
        changed
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Index range of the current page within the filtered set.
    pub fn range(&self) -> Range<usize> {
        page_range(self.current_page, self.page_size, self.total_records)
    }
}

fn page_range(page: usize, page_size: usize, len: usize) -> Range<usize> {
    let start = ((page - 1) * page_size).min(len);
    let end = (page * page_size).min(len);
    start..end
}

#[derive(Debug, PartialEq, Eq)]
pub struct PageSlice<'a, T> {
    pub page: usize,
    pub total_pages: usize,
    /// Offset of `items[0]` within the filtered set.
    pub start: usize,
    pub items: &'a [T],
}

pub fn paginate<T>(filtered: &[T], page: usize, page_size: usize) -> PageSlice<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(filtered.len(), page_size);
    let page = clamp_page(page, total_pages);
    let range = page_range(page, page_size, filtered.len());
    PageSlice {
        page,
        total_pages,
        start: range.start,
        items: &filtered[range],
    }
}

/// Parses the "go to page" input, accepting only whole numbers within
/// `1..=total_pages`.
pub fn parse_page_input(input: &str, total_pages: usize) -> Result<usize, ValidationError> {
    let invalid = || ValidationError::InvalidPageNumber {
        input: input.to_string(),
        total_pages,
    };
    let page: usize = input.trim().parse().map_err(|_| invalid())?;
    if page < 1 || page > total_pages {
        return Err(invalid());
    }
    Ok(page)
}
