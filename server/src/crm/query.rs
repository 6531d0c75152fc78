//! List query helpers: sorting and pagination.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::MAX_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Apply this order to an ascending comparison.
    #[must_use]
    pub const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Paging and sorting parameters of a list call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery<F, S> {
    /// 1-based page number (default 1).
    pub page: Option<usize>,
    /// Items per page (default from configuration, capped).
    pub page_size: Option<usize>,
    #[serde(default)]
    pub filters: F,
    pub sort_by: Option<S>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Items matching the filters across all pages.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Cut `items` into the requested page.
///
/// `page` below 1 is read as 1 and `page_size` is clamped to
/// `1..=MAX_PAGE_SIZE`. A page past the end is empty but still reports the
/// totals.
pub fn paginate<T>(
    items: Vec<T>,
    page: Option<usize>,
    page_size: Option<usize>,
    default_page_size: usize,
) -> Page<T> {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size
        .unwrap_or(default_page_size)
        .clamp(1, MAX_PAGE_SIZE);
    let total = items.len();
    let start = (page - 1).saturating_mul(page_size);

    let data = items.into_iter().skip(start).take(page_size).collect();

    Page {
        data,
        total,
        page,
        page_size,
        total_pages: total.div_ceil(page_size),
    }
}

/// Case-insensitive text comparison; a missing value sorts as empty.
pub(crate) fn cmp_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.unwrap_or_default().to_lowercase();
    let b = b.unwrap_or_default().to_lowercase();
    a.cmp(&b)
}

/// Case-insensitive substring match.
pub(crate) fn contains_ci(haystack: Option<&str>, needle_lower: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle_lower))
}

/// Lowercased search term, or `None` when blank.
pub(crate) fn search_term(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_middle_page() {
        let page = paginate((1..=25).collect::<Vec<i32>>(), Some(2), Some(10), 10);
        assert_eq!(page.data, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_paginate_last_partial_page() {
        let page = paginate((1..=25).collect::<Vec<i32>>(), Some(3), None, 10);
        assert_eq!(page.data, vec![21, 22, 23, 24, 25]);
    }

    #[test]
    fn test_paginate_past_end_is_empty() {
        let page = paginate((1..=5).collect::<Vec<i32>>(), Some(9), Some(10), 10);
        assert!(page.data.is_empty());
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_paginate_empty() {
        let page = paginate(Vec::<i32>::new(), None, None, 10);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn test_paginate_clamps_inputs() {
        let page = paginate((1..=500).collect::<Vec<i32>>(), Some(0), Some(1000), 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
        assert_eq!(page.data.len(), MAX_PAGE_SIZE);

        let page = paginate((1..=5).collect::<Vec<i32>>(), None, Some(0), 10);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_pages, 5);
    }

    #[test]
    fn test_sort_order_apply() {
        assert_eq!(SortOrder::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(SortOrder::Desc.apply(Ordering::Less), Ordering::Greater);
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(cmp_text(Some("alpha"), Some("Beta")), Ordering::Less);
        assert_eq!(cmp_text(None, Some("a")), Ordering::Less);
        assert!(contains_ci(Some("Acme Corp"), "corp"));
        assert!(!contains_ci(None, "corp"));
        assert_eq!(search_term(Some("  ACME ")), Some("acme".into()));
        assert_eq!(search_term(Some("   ")), None);
    }
}
