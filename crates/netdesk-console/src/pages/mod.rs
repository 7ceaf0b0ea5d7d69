//! Page controllers
//!
//! A page owns its stores, charts and widgets. Fetches are split in two
//! steps so a request can run without holding the page: `fetch_*` tags the
//! request and returns a `'static` future, `apply_*` merges the result only
//! if no newer request was started. Failures go to the [`Notifier`] and the
//! previous state stays on screen.

pub mod bandwidth;
pub mod billing;
pub mod customers;
pub mod dashboard;
pub mod network_monitor;
pub mod payments;
pub mod settings;
pub mod tickets;
pub mod users;
pub mod whatsapp;

use crate::{
    api_client::ApiClient,
    filter::{FilterInput, FilterState},
    generation::Generation,
    pagination::PaginatorView,
    render::{TableLayout, TableView},
    store::Store,
};
use netdesk_core::{Filterable, Result, config::DisplayConfig};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::{fmt, future::Future, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    /// Action completed
    Success,
    /// Something worth knowing
    Info,
    /// Action failed
    Error,
}

/// One toast message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    /// Severity
    pub level: ToastLevel,
    /// Text shown to the operator
    pub message: String,
}

/// Shows short status messages to the operator
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Show `message`
    fn notify(&self, level: ToastLevel, message: &str);

    /// Report a completed action
    fn success(&self, message: &str) {
        self.notify(ToastLevel::Success, message);
    }

    /// Report a failure
    fn error(&self, message: &str) {
        self.notify(ToastLevel::Error, message);
    }
}

/// Notifier writing toasts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Success | ToastLevel::Info => info!(toast = ?level, "{message}"),
            ToastLevel::Error => error!(toast = ?level, "{message}"),
        }
    }
}

/// Notifier that keeps every toast
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    /// Toasts shown so far
    #[must_use]
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    /// Messages of the error toasts
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.toasts
            .lock()
            .iter()
            .filter(|toast| toast.level == ToastLevel::Error)
            .map(|toast| toast.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        self.toasts.lock().push(Toast {
            level,
            message: message.to_string(),
        });
    }
}

/// What every page is constructed with
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Backend client
    pub api: ApiClient,
    /// Locale, page size and refresh settings
    pub display: DisplayConfig,
    /// Toast sink
    pub notifier: Arc<dyn Notifier>,
}

impl PageContext {
    /// Bundle the page dependencies
    #[must_use]
    pub fn new(api: ApiClient, display: DisplayConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            display,
            notifier,
        }
    }

    /// Report a failed action and hand the error back
    pub(crate) fn fail<T>(&self, action: &str, error: netdesk_core::Error) -> Result<T> {
        warn!(action, "Request failed: {error}");
        self.notifier.error(&format!("Failed to {action}: {error}"));
        Err(error)
    }
}

/// Response of a tagged request
#[derive(Debug)]
pub struct Fetched<T> {
    /// Tag taken when the request started
    pub generation: Generation,
    /// Backend answer
    pub result: Result<T>,
}

/// Tag `request` with `generation`
pub(crate) fn tagged<T, F>(
    generation: Generation,
    request: F,
) -> impl Future<Output = Fetched<T>> + Send + 'static
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    async move {
        Fetched {
            generation,
            result: request.await,
        }
    }
}

/// Store, layout and rendered view of one table
pub struct RecordTable<T: Filterable, L: TableLayout<T>> {
    store: Store<T>,
    layout: L,
    view: TableView,
}

impl<T: Filterable, L: TableLayout<T>> fmt::Debug for RecordTable<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordTable")
            .field("rows", &self.view.len())
            .field("renders", &self.view.renders)
            .finish_non_exhaustive()
    }
}

impl<T: Filterable, L: TableLayout<T>> RecordTable<T, L> {
    /// Table showing every filtered record
    pub fn new(layout: L) -> Self {
        Self::with_store(Store::new(), layout)
    }

    /// Table showing one page at a time
    pub fn paginated(layout: L, items_per_page: usize) -> Self {
        Self::with_store(Store::paginated(items_per_page), layout)
    }

    fn with_store(store: Store<T>, layout: L) -> Self {
        let mut table = Self {
            store,
            layout,
            view: TableView::new(),
        };
        table.render();
        table
    }

    /// Backing store
    pub const fn store(&self) -> &Store<T> {
        &self.store
    }

    /// Rendered rows
    pub const fn view(&self) -> &TableView {
        &self.view
    }

    /// Paginator widget, for paginated tables
    pub fn paginator(&self) -> Option<PaginatorView> {
        self.store.paginator_view()
    }

    /// Tag a new fetch for this table
    pub fn begin_fetch(&self) -> Generation {
        self.store.begin_fetch()
    }

    /// Merge a fetched collection and redraw
    ///
    /// Returns whether the response was current.
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it; the rows are kept.
    pub fn apply(&mut self, ctx: &PageContext, what: &str, fetched: Fetched<Vec<T>>) -> Result<bool> {
        if !self.store.is_current(fetched.generation) {
            debug!(what, "Discarding stale response");
            return Ok(false);
        }
        match fetched.result {
            Ok(items) => {
                let applied = self.store.apply_fetched(fetched.generation, items);
                if applied {
                    self.render();
                }
                Ok(applied)
            }
            Err(e) => ctx.fail(&format!("load {what}"), e),
        }
    }

    /// Replace the filter from operator input and redraw from page 1
    ///
    /// # Errors
    ///
    /// Returns a validation error for unparseable or inverted dates; the
    /// current filter is kept.
    pub fn set_filter(&mut self, input: &FilterInput) -> Result<()> {
        let filter = FilterState::from_input(input)?;
        self.store.apply_filter(filter);
        self.render();
        Ok(())
    }

    /// Go to `page` and redraw
    pub fn set_page(&mut self, page: usize) {
        self.store.set_page(page);
        self.render();
    }

    /// Insert or replace one record and redraw
    pub fn upsert(&mut self, item: T) {
        self.store.upsert(item);
        self.render();
    }

    /// Change matching records in place and redraw; returns how many changed
    pub fn update_where(
        &mut self,
        matches: impl Fn(&T) -> bool,
        change: impl FnMut(&mut T),
    ) -> usize {
        let changed = self.store.update_where(matches, change);
        if changed > 0 {
            self.render();
        }
        changed
    }

    /// Rebuild the view from the store
    pub fn render(&mut self) {
        self.store.render(&self.layout, &mut self.view);
    }
}

/// Page data reloaded on a fixed interval
pub trait Refresh: Send + Sync + 'static {
    /// Payload of one refresh
    type Data: Send + 'static;

    /// Start a refresh without borrowing the page
    fn fetch(&self) -> impl Future<Output = Fetched<Self::Data>> + Send + 'static;

    /// Merge a refresh result
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    fn apply(&mut self, fetched: Fetched<Self::Data>) -> Result<bool>;
}

/// Refresh `page` now and then every `every`, until the task is aborted
pub fn spawn_poller<P: Refresh>(page: Arc<RwLock<P>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let request = page.read().fetch();
            let fetched = request.await;
            if let Err(e) = page.write().apply(fetched) {
                debug!("Poll failed, keeping previous data: {e}");
            }
        }
    })
}
