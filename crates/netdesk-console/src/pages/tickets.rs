//! Support tickets page

use super::{Fetched, PageContext, RecordTable, billing::display_date, tagged};
use crate::{
    filter::FilterInput,
    forms::TicketForm,
    pagination::PaginatorView,
    render::{TableLayout, TableView},
};
use netdesk_core::{Result, types::Ticket};
use std::future::Future;
use tracing::info;

/// Ticket table columns
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketLayout;

impl TableLayout<Ticket> for TicketLayout {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Ticket", "Subject", "Customer", "Priority", "Opened", "Status"]
    }

    fn cells(&self, item: &Ticket) -> Vec<String> {
        vec![
            item.ticket_number
                .clone()
                .unwrap_or_else(|| format!("#{}", item.id)),
            item.subject.clone(),
            item.customer
                .as_ref()
                .map_or_else(String::new, |c| c.name.clone()),
            item.priority.clone(),
            display_date(item.created_at.as_deref()),
            item.status.clone(),
        ]
    }

    fn actions(&self, item: &Ticket) -> Vec<&'static str> {
        if item.status == "closed" {
            vec!["view"]
        } else {
            vec!["view", "close"]
        }
    }

    fn empty_message(&self) -> &'static str {
        "No tickets found"
    }
}

/// Ticket list
#[derive(Debug)]
pub struct TicketsPage {
    ctx: PageContext,
    tickets: RecordTable<Ticket, TicketLayout>,
}

impl TicketsPage {
    /// Page with an empty table
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        Self {
            tickets: RecordTable::paginated(TicketLayout, ctx.display.items_per_page),
            ctx,
        }
    }

    /// Rendered rows
    #[must_use]
    pub const fn table(&self) -> &TableView {
        self.tickets.view()
    }

    /// Paginator widget
    #[must_use]
    pub fn paginator(&self) -> Option<PaginatorView> {
        self.tickets.paginator()
    }

    /// Start loading tickets
    pub fn fetch(&self) -> impl Future<Output = Fetched<Vec<Ticket>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.tickets.begin_fetch(), async move {
            api.list_tickets().await
        })
    }

    /// Merge loaded tickets
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply(&mut self, fetched: Fetched<Vec<Ticket>>) -> Result<bool> {
        self.tickets.apply(&self.ctx, "tickets", fetched)
    }

    /// Reload tickets
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn refresh(&mut self) -> Result<bool> {
        let fetched = self.fetch().await;
        self.apply(fetched)
    }

    /// Filter by search text, status and opening date
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad dates.
    pub fn filter(&mut self, input: &FilterInput) -> Result<()> {
        match self.tickets.set_filter(input) {
            Ok(()) => Ok(()),
            Err(e) => self.ctx.fail("filter tickets", e),
        }
    }

    /// Show page `page`
    pub fn set_page(&mut self, page: usize) {
        self.tickets.set_page(page);
    }

    /// Validate and open a ticket
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any request is made.
    pub async fn create_ticket(&mut self, form: TicketForm) -> Result<Ticket> {
        let request = match form.into_request() {
            Ok(request) => request,
            Err(e) => return self.ctx.fail("create ticket", e),
        };
        match self.ctx.api.create_ticket(&request).await {
            Ok(ticket) => {
                info!(id = ticket.id, priority = %ticket.priority, "Ticket created");
                self.ctx.notifier.success("Ticket created");
                self.tickets.upsert(ticket.clone());
                Ok(ticket)
            }
            Err(e) => self.ctx.fail("create ticket", e),
        }
    }
}
