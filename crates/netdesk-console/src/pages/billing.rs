//! Billing page: invoices and payments

use super::{Fetched, PageContext, RecordTable, tagged};
use crate::{
    filter::FilterInput,
    forms::{InvoiceForm, PaymentForm},
    pagination::PaginatorView,
    render::{TableLayout, TableView},
};
use netdesk_core::{
    Result,
    types::{Invoice, Payment},
    utils::{format_currency, format_date, parse_record_date},
};
use std::future::Future;
use tracing::info;

pub(crate) fn display_date(raw: Option<&str>) -> String {
    raw.and_then(parse_record_date)
        .map_or_else(|| "-".to_string(), format_date)
}

/// Invoice table columns
#[derive(Debug, Clone)]
pub struct InvoiceLayout {
    locale: String,
}

impl TableLayout<Invoice> for InvoiceLayout {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Invoice", "Customer", "Amount", "Due", "Status"]
    }

    fn cells(&self, item: &Invoice) -> Vec<String> {
        vec![
            item.invoice_number.clone(),
            item.customer
                .as_ref()
                .map_or_else(String::new, |c| c.name.clone()),
            format_currency(item.amount, &self.locale),
            display_date(item.due_date.as_deref()),
            item.status.clone(),
        ]
    }

    fn actions(&self, item: &Invoice) -> Vec<&'static str> {
        match item.status.as_str() {
            "unpaid" | "overdue" => vec!["view", "pay"],
            _ => vec!["view"],
        }
    }

    fn empty_message(&self) -> &'static str {
        "No invoices found"
    }
}

/// Payment table columns
#[derive(Debug, Clone)]
pub struct PaymentLayout {
    locale: String,
}

impl TableLayout<Payment> for PaymentLayout {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Date", "Customer", "Amount", "Method", "Status"]
    }

    fn cells(&self, item: &Payment) -> Vec<String> {
        vec![
            display_date(item.payment_date.as_deref()),
            item.customer
                .as_ref()
                .map_or_else(String::new, |c| c.name.clone()),
            format_currency(item.amount, &self.locale),
            item.method.clone().unwrap_or_else(|| "-".to_string()),
            item.status.clone(),
        ]
    }

    fn empty_message(&self) -> &'static str {
        "No payments found"
    }
}

/// Invoices and payments
#[derive(Debug)]
pub struct BillingPage {
    ctx: PageContext,
    invoices: RecordTable<Invoice, InvoiceLayout>,
    payments: RecordTable<Payment, PaymentLayout>,
}

impl BillingPage {
    /// Page with empty tables
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        let locale = ctx.display.locale.clone();
        let per_page = ctx.display.items_per_page;
        Self {
            invoices: RecordTable::paginated(
                InvoiceLayout {
                    locale: locale.clone(),
                },
                per_page,
            ),
            payments: RecordTable::new(PaymentLayout { locale }),
            ctx,
        }
    }

    /// Rendered invoice page
    #[must_use]
    pub const fn invoice_table(&self) -> &TableView {
        self.invoices.view()
    }

    /// Invoice paginator
    #[must_use]
    pub fn paginator(&self) -> Option<PaginatorView> {
        self.invoices.paginator()
    }

    /// Rendered payments
    #[must_use]
    pub const fn payment_table(&self) -> &TableView {
        self.payments.view()
    }

    /// Loaded invoices
    #[must_use]
    pub fn invoices(&self) -> &[Invoice] {
        self.invoices.store().items()
    }

    /// Start loading invoices
    pub fn fetch_invoices(&self) -> impl Future<Output = Fetched<Vec<Invoice>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.invoices.begin_fetch(), async move {
            api.list_invoices().await
        })
    }

    /// Merge loaded invoices
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply_invoices(&mut self, fetched: Fetched<Vec<Invoice>>) -> Result<bool> {
        self.invoices.apply(&self.ctx, "invoices", fetched)
    }

    /// Reload invoices
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn refresh_invoices(&mut self) -> Result<bool> {
        let fetched = self.fetch_invoices().await;
        self.apply_invoices(fetched)
    }

    /// Start loading payments
    pub fn fetch_payments(&self) -> impl Future<Output = Fetched<Vec<Payment>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.payments.begin_fetch(), async move {
            api.list_payments().await
        })
    }

    /// Merge loaded payments
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply_payments(&mut self, fetched: Fetched<Vec<Payment>>) -> Result<bool> {
        self.payments.apply(&self.ctx, "payments", fetched)
    }

    /// Reload payments
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn refresh_payments(&mut self) -> Result<bool> {
        let fetched = self.fetch_payments().await;
        self.apply_payments(fetched)
    }

    /// Filter invoices by search text, status and due date
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad dates; the filter is unchanged.
    pub fn filter_invoices(&mut self, input: &FilterInput) -> Result<()> {
        match self.invoices.set_filter(input) {
            Ok(()) => Ok(()),
            Err(e) => self.ctx.fail("filter invoices", e),
        }
    }

    /// Show invoice page `page`
    pub fn set_page(&mut self, page: usize) {
        self.invoices.set_page(page);
    }

    /// Validate and create an invoice
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any request is made.
    pub async fn create_invoice(&mut self, form: InvoiceForm) -> Result<Invoice> {
        let request = match form.into_request() {
            Ok(request) => request,
            Err(e) => return self.ctx.fail("create invoice", e),
        };
        match self.ctx.api.create_invoice(&request).await {
            Ok(invoice) => {
                info!(id = invoice.id, number = %invoice.invoice_number, "Invoice created");
                self.ctx.notifier.success("Invoice created");
                self.invoices.upsert(invoice.clone());
                Ok(invoice)
            }
            Err(e) => self.ctx.fail("create invoice", e),
        }
    }

    /// Validate and record a payment
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any request is made.
    pub async fn record_payment(&mut self, form: PaymentForm) -> Result<Payment> {
        let request = match form.into_request() {
            Ok(request) => request,
            Err(e) => return self.ctx.fail("record payment", e),
        };
        match self.ctx.api.record_payment(&request).await {
            Ok(payment) => {
                info!(id = payment.id, "Payment recorded");
                self.ctx.notifier.success("Payment recorded");
                self.payments.upsert(payment.clone());
                Ok(payment)
            }
            Err(e) => self.ctx.fail("record payment", e),
        }
    }
}
