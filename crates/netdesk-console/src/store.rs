//! Per-page record store
//!
//! The store is the single source of truth for a table: it owns the last
//! fetched collection, the filter, the derived filtered positions and,
//! for paginated tables, the current page.

use crate::{
    filter::FilterState,
    generation::{Generation, RequestGeneration},
    pagination::{Paginator, PaginatorView},
    render::{TableLayout, TableView},
};
use netdesk_core::{Filterable, RecordId};
use std::{cmp::Ordering, fmt};
use tracing::debug;

type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Collection plus filter state of one table
pub struct Store<T: Filterable> {
    items: Vec<T>,
    filter: FilterState,
    filtered: Vec<usize>,
    paginator: Option<Paginator>,
    sort: Option<Comparator<T>>,
    generation: RequestGeneration,
}

impl<T: Filterable + fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("items", &self.items.len())
            .field("filter", &self.filter)
            .field("filtered", &self.filtered.len())
            .field("paginator", &self.paginator)
            .field("sorted", &self.sort.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Filterable> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Filterable> Store<T> {
    /// Unpaginated store
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            filter: FilterState::identity(),
            filtered: Vec::new(),
            paginator: None,
            sort: None,
            generation: RequestGeneration::new(),
        }
    }

    /// Store whose render shows one page at a time
    #[must_use]
    pub fn paginated(items_per_page: usize) -> Self {
        Self {
            paginator: Some(Paginator::new(items_per_page)),
            ..Self::new()
        }
    }

    /// Replace the backing collection, keeping the current filter
    pub fn set_collection(&mut self, items: Vec<T>) {
        self.items = items;
        self.refilter();
        self.clamp_page();
    }

    /// Replace the filter and go back to the first page
    pub fn apply_filter(&mut self, filter: FilterState) {
        self.filter = filter;
        self.refilter();
        if let Some(paginator) = self.paginator.as_mut() {
            paginator.reset();
        }
    }

    fn refilter(&mut self) {
        self.filtered = self.filter.apply(&self.items);
    }

    /// Keep the current page within the filtered length
    fn clamp_page(&mut self) {
        let len = self.filtered.len();
        if let Some(paginator) = self.paginator.as_mut() {
            let page = paginator.current_page();
            paginator.set_page(page, len);
        }
    }

    /// Insert a pushed record, replacing the one with the same id
    pub fn upsert(&mut self, item: T) {
        match self.items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
        self.refilter();
        self.clamp_page();
    }

    /// Change every record matching `matches` in place
    ///
    /// Returns how many records were changed.
    pub fn update_where(
        &mut self,
        matches: impl Fn(&T) -> bool,
        mut change: impl FnMut(&mut T),
    ) -> usize {
        let mut changed = 0;
        for item in self.items.iter_mut().filter(|item| matches(item)) {
            change(item);
            changed += 1;
        }
        if changed > 0 {
            self.refilter();
            self.clamp_page();
        }
        changed
    }

    /// Start a fetch for this store
    #[must_use]
    pub fn begin_fetch(&self) -> Generation {
        self.generation.begin()
    }

    /// Whether `generation` belongs to the latest fetch
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation.is_current(generation)
    }

    /// Apply a fetched collection unless a newer fetch was started
    ///
    /// Returns whether the collection was replaced.
    pub fn apply_fetched(&mut self, generation: Generation, items: Vec<T>) -> bool {
        if !self.generation.is_current(generation) {
            debug!(?generation, "Discarding stale response");
            return false;
        }
        self.set_collection(items);
        true
    }

    /// Show the filtered records in this order; the collection is untouched
    pub fn sort_by(&mut self, compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) {
        self.sort = Some(Box::new(compare));
    }

    /// Back to collection order
    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    /// Move to `page`, clamped; ignored on unpaginated stores
    pub fn set_page(&mut self, page: usize) {
        let len = self.filtered.len();
        if let Some(paginator) = self.paginator.as_mut() {
            paginator.set_page(page, len);
        }
    }

    /// Current filter
    #[must_use]
    pub const fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// Whole collection in server order
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Record by id
    #[must_use]
    pub fn find(&self, id: RecordId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Filtered records in collection order
    pub fn filtered(&self) -> impl Iterator<Item = &T> {
        self.filtered.iter().filter_map(|&index| self.items.get(index))
    }

    /// Number of records passing the filter
    #[must_use]
    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    /// Records the table shows: filtered, sorted for display, current page
    #[must_use]
    pub fn visible(&self) -> Vec<&T> {
        let mut rows: Vec<&T> = self.filtered().collect();
        if let Some(compare) = &self.sort {
            rows.sort_by(|a, b| compare(a, b));
        }
        match &self.paginator {
            Some(paginator) => rows
                .get(paginator.page_range(rows.len()))
                .map(|page| page.to_vec())
                .unwrap_or_default(),
            None => rows,
        }
    }

    /// Paginator widget contents, for paginated stores
    #[must_use]
    pub fn paginator_view(&self) -> Option<PaginatorView> {
        self.paginator
            .as_ref()
            .map(|paginator| paginator.view(self.filtered.len()))
    }

    /// Rebuild `view` from the visible records
    pub fn render<L>(&self, layout: &L, view: &mut TableView)
    where
        L: TableLayout<T> + ?Sized,
    {
        view.rebuild(layout, self.visible());
    }
}
