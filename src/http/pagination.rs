//! Pagination over list endpoints
//!
//! Vendors either page by offset/limit or by page/page_size; the fetch closure
//! picks the fields of [`PageRequest`] it needs and reports whether the vendor
//! signalled more data.

use std::fmt::Display;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number (page/page_size vendors)
    pub page_number: usize,
    /// Constant page size (page/page_size vendors)
    pub page_size: usize,
    /// Records already collected (offset/limit vendors)
    pub offset: usize,
    /// Records still wanted on this page (offset/limit vendors)
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub has_more: bool,
}

impl Page {
    pub fn new(items: Vec<Value>, has_more: bool) -> Self {
        Self { items, has_more }
    }

    /// Offset vendors: a full page means there may be more
    pub fn by_size(items: Vec<Value>, requested: usize) -> Self {
        let has_more = items.len() >= requested;
        Self { items, has_more }
    }
}

/// What to do when a page after the first one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFailure {
    /// Raise the error (actions)
    Propagate,
    /// Log it and keep what was collected (connectors)
    BestEffort,
}

/// Fetch pages until the cap, an empty page, or no further data is signalled
pub fn collect_pages<E, F>(
    max_results: Option<usize>,
    page_size: usize,
    on_failure: PageFailure,
    mut fetch: F,
) -> Result<Vec<Value>, E>
where
    E: Display,
    F: FnMut(PageRequest) -> Result<Page, E>,
{
    let page_size = page_size.max(1);
    let mut results: Vec<Value> = Vec::new();
    let mut page_number = 1;

    loop {
        let remaining = max_results.map(|max| max.saturating_sub(results.len()));
        if remaining == Some(0) {
            break;
        }

        let request = PageRequest {
            page_number,
            page_size,
            offset: results.len(),
            limit: remaining.map_or(page_size, |left| left.min(page_size)),
        };

        let page = match fetch(request) {
            Ok(page) => page,
            Err(e) if on_failure == PageFailure::BestEffort && page_number > 1 => {
                log::warn!(
                    "Failed to fetch page {}: {}. Returning {} records collected so far",
                    page_number,
                    e,
                    results.len()
                );
                break;
            }
            Err(e) => return Err(e),
        };

        let received = page.items.len();
        results.extend(page.items);

        if received == 0 || !page.has_more {
            break;
        }
        page_number += 1;
    }

    if let Some(max) = max_results {
        results.truncate(max);
    }

    Ok(results)
}

// ============================================================================
// TESTS
// ============================================================================
