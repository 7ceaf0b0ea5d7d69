//! Page arithmetic for paginated tables

use serde::Serialize;
use std::ops::Range;

/// Most page buttons shown at once
pub const MAX_PAGE_BUTTONS: usize = 5;

/// Current page and page size of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    current_page: usize,
    items_per_page: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Paginator {
    /// Start on page 1; a zero page size is treated as 1
    #[must_use]
    pub const fn new(items_per_page: usize) -> Self {
        Self {
            current_page: 1,
            items_per_page: if items_per_page == 0 { 1 } else { items_per_page },
        }
    }

    /// Current page (1-based)
    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    /// Rows per page
    #[must_use]
    pub const fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    /// `ceil(len / items_per_page)`
    #[must_use]
    pub const fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.items_per_page)
    }

    /// Go back to page 1
    pub const fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Move to `page`, clamped to the pages that exist
    pub fn set_page(&mut self, page: usize, len: usize) {
        self.current_page = page.clamp(1, self.total_pages(len).max(1));
    }

    /// Slice bounds of the current page within `len` rows
    #[must_use]
    pub fn page_range(&self, len: usize) -> Range<usize> {
        let start = (self.current_page - 1)
            .saturating_mul(self.items_per_page)
            .min(len);
        let end = start.saturating_add(self.items_per_page).min(len);
        start..end
    }

    /// Page buttons: at most [`MAX_PAGE_BUTTONS`], centred on the current
    /// page and clamped to `1..=total_pages`
    #[must_use]
    pub fn window(&self, len: usize) -> Vec<usize> {
        let total = self.total_pages(len);
        if total == 0 {
            return Vec::new();
        }

        let half = MAX_PAGE_BUTTONS / 2;
        let current = self.current_page.min(total);
        let mut start = current.saturating_sub(half).max(1);
        let end = (start + MAX_PAGE_BUTTONS - 1).min(total);
        start = end.saturating_sub(MAX_PAGE_BUTTONS - 1).max(1);

        (start..=end).collect()
    }

    /// Everything a paginator widget shows
    #[must_use]
    pub fn view(&self, len: usize) -> PaginatorView {
        let total_pages = self.total_pages(len);
        PaginatorView {
            current_page: self.current_page,
            total_pages,
            total_items: len,
            pages: self.window(len),
            has_prev: self.current_page > 1,
            has_next: self.current_page < total_pages,
        }
    }
}

/// Paginator widget contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginatorView {
    /// Current page (1-based)
    pub current_page: usize,
    /// Total number of pages
    pub total_pages: usize,
    /// Rows across all pages
    pub total_items: usize,
    /// Page buttons to draw
    pub pages: Vec<usize>,
    /// Whether "Previous" is enabled
    pub has_prev: bool,
    /// Whether "Next" is enabled
    pub has_next: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 10, 0)]
    #[case(1, 10, 1)]
    #[case(10, 10, 1)]
    #[case(11, 10, 2)]
    #[case(95, 10, 10)]
    fn test_total_pages(#[case] len: usize, #[case] per_page: usize, #[case] expected: usize) {
        assert_eq!(Paginator::new(per_page).total_pages(len), expected);
    }

    #[rstest]
    #[case(1, 20, vec![1, 2, 3, 4, 5])]
    #[case(2, 20, vec![1, 2, 3, 4, 5])]
    #[case(7, 20, vec![5, 6, 7, 8, 9])]
    #[case(19, 20, vec![16, 17, 18, 19, 20])]
    #[case(20, 20, vec![16, 17, 18, 19, 20])]
    #[case(2, 3, vec![1, 2, 3])]
    fn test_window(#[case] page: usize, #[case] pages: usize, #[case] expected: Vec<usize>) {
        let mut paginator = Paginator::new(1);
        paginator.set_page(page, pages);
        assert_eq!(paginator.window(pages), expected);
    }

    #[test]
    fn test_set_page_clamps() {
        let mut paginator = Paginator::new(10);
        paginator.set_page(9, 25);
        assert_eq!(paginator.current_page(), 3);

        paginator.set_page(0, 25);
        assert_eq!(paginator.current_page(), 1);

        paginator.set_page(4, 0);
        assert_eq!(paginator.current_page(), 1);
    }

    #[test]
    fn test_view_flags() {
        let mut paginator = Paginator::new(10);
        paginator.set_page(2, 25);
        let view = paginator.view(25);

        assert_eq!(view.total_pages, 3);
        assert!(view.has_prev);
        assert!(view.has_next);
        assert_eq!(paginator.page_range(25), 10..20);
    }

    #[test]
    fn test_empty_table_has_no_buttons() {
        let view = Paginator::new(10).view(0);
        assert!(view.pages.is_empty());
        assert!(!view.has_next);
        assert_eq!(Paginator::new(10).page_range(0), 0..0);
    }

    proptest! {
        #[test]
        fn page_sizes_add_up(len in 0usize..500, per_page in 1usize..40) {
            let mut paginator = Paginator::new(per_page);
            let total = paginator.total_pages(len);
            prop_assert_eq!(total, len.div_ceil(per_page));

            let mut seen = 0;
            for page in 1..=total {
                paginator.set_page(page, len);
                let rows = paginator.page_range(len).len();
                prop_assert!(rows <= per_page);
                if page == total {
                    prop_assert_eq!(rows, len - per_page * (total - 1));
                }
                seen += rows;
            }
            prop_assert_eq!(seen, len);
        }

        #[test]
        fn window_is_bounded_and_contains_current(len in 1usize..300, per_page in 1usize..10, page in 1usize..400) {
            let mut paginator = Paginator::new(per_page);
            paginator.set_page(page, len);
            let window = paginator.window(len);

            prop_assert!(!window.is_empty() && window.len() <= MAX_PAGE_BUTTONS);
            prop_assert!(window.contains(&paginator.current_page()));
            prop_assert!(window.iter().all(|p| (1..=paginator.total_pages(len)).contains(p)));
        }
    }
}
