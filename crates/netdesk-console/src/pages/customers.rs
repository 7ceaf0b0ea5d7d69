//! Customers page

use super::{Fetched, PageContext, RecordTable, billing::display_date, tagged};
use crate::{
    filter::FilterInput,
    forms::CustomerForm,
    pagination::PaginatorView,
    render::{TableLayout, TableView},
};
use netdesk_core::{Result, types::Customer};
use std::future::Future;
use tracing::info;

/// Customer table columns
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerLayout;

impl TableLayout<Customer> for CustomerLayout {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Name", "Phone", "Package", "Username", "Since", "Status"]
    }

    fn cells(&self, item: &Customer) -> Vec<String> {
        let or_dash = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        vec![
            item.name.clone(),
            or_dash(&item.phone),
            or_dash(&item.package),
            or_dash(&item.username),
            display_date(item.created_at.as_deref()),
            item.status.clone(),
        ]
    }

    fn actions(&self, _item: &Customer) -> Vec<&'static str> {
        vec!["view", "edit"]
    }

    fn empty_message(&self) -> &'static str {
        "No customers found"
    }
}

/// Subscriber list
#[derive(Debug)]
pub struct CustomersPage {
    ctx: PageContext,
    customers: RecordTable<Customer, CustomerLayout>,
}

impl CustomersPage {
    /// Page with an empty table
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        Self {
            customers: RecordTable::paginated(CustomerLayout, ctx.display.items_per_page),
            ctx,
        }
    }

    /// Rendered rows
    #[must_use]
    pub const fn table(&self) -> &TableView {
        self.customers.view()
    }

    /// Paginator widget
    #[must_use]
    pub fn paginator(&self) -> Option<PaginatorView> {
        self.customers.paginator()
    }

    /// Start loading customers
    pub fn fetch(&self) -> impl Future<Output = Fetched<Vec<Customer>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.customers.begin_fetch(), async move {
            api.list_customers().await
        })
    }

    /// Merge loaded customers
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply(&mut self, fetched: Fetched<Vec<Customer>>) -> Result<bool> {
        self.customers.apply(&self.ctx, "customers", fetched)
    }

    /// Reload customers
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn refresh(&mut self) -> Result<bool> {
        let fetched = self.fetch().await;
        self.apply(fetched)
    }

    /// Filter by search text, status and sign-up date
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad dates.
    pub fn filter(&mut self, input: &FilterInput) -> Result<()> {
        match self.customers.set_filter(input) {
            Ok(()) => Ok(()),
            Err(e) => self.ctx.fail("filter customers", e),
        }
    }

    /// Show page `page`
    pub fn set_page(&mut self, page: usize) {
        self.customers.set_page(page);
    }

    /// Validate and register a subscriber
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any request is made.
    pub async fn add_customer(&mut self, form: CustomerForm) -> Result<Customer> {
        let request = match form.into_request() {
            Ok(request) => request,
            Err(e) => return self.ctx.fail("add customer", e),
        };
        match self.ctx.api.create_customer(&request).await {
            Ok(customer) => {
                info!(id = customer.id, "Customer added");
                self.ctx.notifier.success("Customer added");
                self.customers.upsert(customer.clone());
                Ok(customer)
            }
            Err(e) => self.ctx.fail("add customer", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_customer_row_fills_missing_fields() {
        let customer: Customer = serde_json::from_value(json!({
            "id": 3,
            "name": "Siti Aminah",
            "packageName": "Home 20M",
            "createdAt": "2023-11-02T08:00:00Z"
        }))
        .unwrap();

        let row = CustomerLayout.row(&customer);

        assert_eq!(
            row.cells,
            vec!["Siti Aminah", "-", "Home 20M", "-", "02/11/2023", "active"]
        );
        assert_eq!(row.actions.len(), 2);
    }
}
