//! Payments overview with periodically refreshed totals

use super::{Fetched, PageContext, Refresh, tagged};
use crate::generation::RequestGeneration;
use netdesk_core::{Result, types::PaymentStats, utils::format_currency};
use std::future::Future;
use tracing::debug;

/// Payment totals
#[derive(Debug)]
pub struct PaymentsPage {
    ctx: PageContext,
    stats: Option<PaymentStats>,
    generation: RequestGeneration,
    refreshes: u64,
}

impl PaymentsPage {
    /// Page with empty cards
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            stats: None,
            generation: RequestGeneration::new(),
            refreshes: 0,
        }
    }

    /// Last loaded totals
    #[must_use]
    pub const fn stats(&self) -> Option<&PaymentStats> {
        self.stats.as_ref()
    }

    /// Successful refreshes so far
    #[must_use]
    pub const fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Cards as `(title, value)`; empty until the first load
    #[must_use]
    pub fn cards(&self) -> Vec<(&'static str, String)> {
        let Some(stats) = &self.stats else {
            return Vec::new();
        };
        let locale = &self.ctx.display.locale;
        vec![
            ("Today", format_currency(stats.total_today, locale)),
            ("This month", format_currency(stats.total_month, locale)),
            ("Pending", stats.pending_count.to_string()),
            ("Completed", stats.completed_count.to_string()),
        ]
    }

    /// Load the totals once
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn refresh(&mut self) -> Result<bool> {
        let fetched = self.fetch().await;
        self.apply(fetched)
    }
}

impl Refresh for PaymentsPage {
    type Data = PaymentStats;

    fn fetch(&self) -> impl Future<Output = Fetched<PaymentStats>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.generation.begin(), async move {
            api.payment_stats().await
        })
    }

    fn apply(&mut self, fetched: Fetched<PaymentStats>) -> Result<bool> {
        if !self.generation.is_current(fetched.generation) {
            debug!("Discarding stale payment stats");
            return Ok(false);
        }
        match fetched.result {
            Ok(stats) => {
                self.stats = Some(stats);
                self.refreshes += 1;
                Ok(true)
            }
            Err(e) => self.ctx.fail("load payment stats", e),
        }
    }
}
