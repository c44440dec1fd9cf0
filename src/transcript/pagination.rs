//! Page slicing for normalized transcripts
//!
//! Pages are 1-indexed. `LAST_PAGE` (-1) resolves to the final page, which is
//! the default view since transcripts are append-only.

use serde::Serialize;

/// Sentinel page number meaning "resolve to the last page"
pub const LAST_PAGE: i64 = -1;

/// One page of a transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub messages: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

/// `max(1, ceil(total / limit))`
pub fn total_pages(total: usize, limit: usize) -> usize {
    let limit = limit.max(1);
    total.div_ceil(limit).max(1)
}

/// Resolve a requested page number against a known total.
///
/// `LAST_PAGE` maps to the last page; anything else is clamped into
/// `[1, total_pages]`.
pub fn resolve_page(requested: i64, total_pages: usize) -> usize {
    if requested == LAST_PAGE {
        return total_pages;
    }
    if requested < 1 {
        return 1;
    }
    (requested as u64).min(total_pages as u64) as usize
}

/// Slice `items` into the requested page
pub fn paginate<T>(items: Vec<T>, page: i64, limit: usize) -> Page<T> {
    let limit = limit.max(1);
    let total = items.len();
    let total_pages = total_pages(total, limit);
    let page = resolve_page(page, total_pages);

    let start = ((page - 1) * limit).min(total);
    let end = (page * limit).min(total);
    let messages = items.into_iter().skip(start).take(end - start).collect();

    Page {
        messages,
        total,
        page,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input_has_one_page() {
        let page = paginate(Vec::<u32>::new(), LAST_PAGE, 200);
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 1);
        assert!(page.messages.is_empty());
    }

    #[test]
    fn test_last_page_of_450() {
        let items: Vec<u32> = (0..450).collect();
        let page = paginate(items, LAST_PAGE, 200);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.messages.len(), 50);
        assert_eq!(page.messages[0], 400);
    }

    #[test]
    fn test_zero_and_negative_pages_clamp_to_first() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(paginate(items.clone(), 0, 3).page, 1);
        assert_eq!(paginate(items, -7, 3).page, 1);
    }

    proptest! {
        #[test]
        fn prop_total_pages_formula(total in 0usize..2000, limit in 1usize..600) {
            let items: Vec<usize> = (0..total).collect();
            let page = paginate(items, 1, limit);
            let expected = std::cmp::max(1, (total + limit - 1) / limit);
            prop_assert_eq!(page.total_pages, expected);
        }

        #[test]
        fn prop_last_page_matches_explicit(total in 0usize..2000, limit in 1usize..600) {
            let items: Vec<usize> = (0..total).collect();
            let last = paginate(items.clone(), LAST_PAGE, limit);
            let explicit = paginate(items, last.total_pages as i64, limit);
            prop_assert_eq!(last, explicit);
        }

        #[test]
        fn prop_beyond_range_clamps(
            total in 0usize..2000,
            limit in 1usize..600,
            extra in 1i64..50,
        ) {
            let items: Vec<usize> = (0..total).collect();
            let pages = total_pages(total, limit);
            let clamped = paginate(items.clone(), pages as i64 + extra, limit);
            let last = paginate(items, pages as i64, limit);
            prop_assert_eq!(clamped, last);
        }
    }
}
