//! Bandwidth management: usage, top consumers, limits, QoS and boosts

use super::{Fetched, PageContext, RecordTable, tagged};
use crate::{
    chart::Chart,
    endpoints::BandwidthStats,
    filter::FilterInput,
    forms::{BandwidthLimitForm, BoostForm, QosForm},
    generation::RequestGeneration,
    render::{TableLayout, TableView},
};
use netdesk_core::{Result, types::BandwidthUsage, utils::format_bandwidth};
use std::future::Future;
use tracing::{debug, info};

/// Bytes per megabyte on the top-consumers chart
const MB: f64 = 1024.0 * 1024.0;

/// Usage table columns
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageLayout;

impl TableLayout<BandwidthUsage> for UsageLayout {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Username", "Download", "Upload", "Total", "Profile"]
    }

    fn cells(&self, item: &BandwidthUsage) -> Vec<String> {
        vec![
            item.username.clone(),
            format_bandwidth(item.download),
            format_bandwidth(item.upload),
            format_bandwidth(item.download.saturating_add(item.upload)),
            item.profile.clone().unwrap_or_else(|| "default".to_string()),
        ]
    }

    fn actions(&self, _item: &BandwidthUsage) -> Vec<&'static str> {
        vec!["limit", "qos", "boost"]
    }

    fn empty_message(&self) -> &'static str {
        "No usage recorded"
    }
}

/// Bandwidth page
#[derive(Debug)]
pub struct BandwidthPage {
    ctx: PageContext,
    usage: RecordTable<BandwidthUsage, UsageLayout>,
    top_consumers: Chart,
    top_generation: RequestGeneration,
    stats: Option<BandwidthStats>,
    stats_generation: RequestGeneration,
}

impl BandwidthPage {
    /// Page with an empty table and chart
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        Self {
            usage: RecordTable::paginated(UsageLayout, ctx.display.items_per_page),
            top_consumers: Chart::bar("Top consumers (MB)", &["Download", "Upload"]),
            top_generation: RequestGeneration::new(),
            stats: None,
            stats_generation: RequestGeneration::new(),
            ctx,
        }
    }

    /// Rendered usage rows
    #[must_use]
    pub const fn usage_table(&self) -> &TableView {
        self.usage.view()
    }

    /// Top consumers bar chart
    #[must_use]
    pub const fn top_consumers(&self) -> &Chart {
        &self.top_consumers
    }

    /// Aggregated totals
    #[must_use]
    pub const fn stats(&self) -> Option<&BandwidthStats> {
        self.stats.as_ref()
    }

    /// Start loading per-subscriber usage
    pub fn fetch_usage(
        &self,
    ) -> impl Future<Output = Fetched<Vec<BandwidthUsage>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.usage.begin_fetch(), async move {
            api.bandwidth_usage().await
        })
    }

    /// Merge loaded usage
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply_usage(&mut self, fetched: Fetched<Vec<BandwidthUsage>>) -> Result<bool> {
        self.usage.apply(&self.ctx, "bandwidth usage", fetched)
    }

    /// Start loading the top consumers
    pub fn fetch_top(&self) -> impl Future<Output = Fetched<Vec<BandwidthUsage>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.top_generation.begin(), async move {
            api.top_consumers().await
        })
    }

    /// Redraw the top consumers chart
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply_top(&mut self, fetched: Fetched<Vec<BandwidthUsage>>) -> Result<bool> {
        if !self.top_generation.is_current(fetched.generation) {
            debug!("Discarding stale top consumers");
            return Ok(false);
        }
        let consumers = match fetched.result {
            Ok(consumers) => consumers,
            Err(e) => return self.ctx.fail("load top consumers", e),
        };

        #[allow(clippy::cast_precision_loss)]
        let (download, upload): (Vec<f64>, Vec<f64>) = consumers
            .iter()
            .map(|c| (c.download as f64 / MB, c.upload as f64 / MB))
            .unzip();
        let labels: Vec<String> = consumers.into_iter().map(|c| c.username).collect();
        self.top_consumers.set_data(labels, &[download, upload]);
        Ok(true)
    }

    /// Start loading the totals
    pub fn fetch_stats(&self) -> impl Future<Output = Fetched<BandwidthStats>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.stats_generation.begin(), async move {
            api.bandwidth_stats().await
        })
    }

    /// Merge loaded totals
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply_stats(&mut self, fetched: Fetched<BandwidthStats>) -> Result<bool> {
        if !self.stats_generation.is_current(fetched.generation) {
            return Ok(false);
        }
        match fetched.result {
            Ok(stats) => {
                self.stats = Some(stats);
                Ok(true)
            }
            Err(e) => self.ctx.fail("load bandwidth stats", e),
        }
    }

    /// Load usage, top consumers and totals
    ///
    /// # Errors
    ///
    /// Returns the first request error; the other sections are still loaded.
    pub async fn load(&mut self) -> Result<()> {
        let (usage, top, stats) =
            tokio::join!(self.fetch_usage(), self.fetch_top(), self.fetch_stats());
        let usage = self.apply_usage(usage);
        let top = self.apply_top(top);
        let stats = self.apply_stats(stats);
        usage.and(top).and(stats).map(|_| ())
    }

    /// Filter the usage table by username
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad dates.
    pub fn filter(&mut self, input: &FilterInput) -> Result<()> {
        match self.usage.set_filter(input) {
            Ok(()) => Ok(()),
            Err(e) => self.ctx.fail("filter usage", e),
        }
    }

    /// Validate and apply a permanent limit
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any request is made.
    pub async fn set_limit(&self, form: BandwidthLimitForm) -> Result<()> {
        let (username, limit) = match form.into_request() {
            Ok(request) => request,
            Err(e) => return self.ctx.fail("set bandwidth limit", e),
        };
        match self.ctx.api.set_bandwidth_limit(&username, &limit).await {
            Ok(_) => {
                info!(%username, down = limit.download_mbps, up = limit.upload_mbps, "Limit applied");
                self.ctx
                    .notifier
                    .success(&format!("Bandwidth limit applied to {username}"));
                Ok(())
            }
            Err(e) => self.ctx.fail("set bandwidth limit", e),
        }
    }

    /// Validate and assign a QoS profile
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any request is made.
    pub async fn set_qos(&mut self, form: QosForm) -> Result<()> {
        let (username, profile) = match form.into_request() {
            Ok(request) => request,
            Err(e) => return self.ctx.fail("set QoS profile", e),
        };
        match self.ctx.api.set_qos_profile(&username, &profile).await {
            Ok(_) => {
                info!(%username, profile = %profile.profile, "QoS profile applied");
                self.ctx
                    .notifier
                    .success(&format!("QoS profile {} applied to {username}", profile.profile));
                self.show_profile(&username, &profile.profile);
                Ok(())
            }
            Err(e) => self.ctx.fail("set QoS profile", e),
        }
    }

    /// Show `profile` on the usage row of `username`
    fn show_profile(&mut self, username: &str, profile: &str) {
        let changed = self
            .usage
            .update_where(|u| u.username == username, |u| u.profile = Some(profile.to_string()));
        if changed == 0 {
            debug!(%username, "QoS applied to a subscriber not in the usage table");
        }
    }

    /// Validate and apply a temporary boost
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any request is made.
    pub async fn boost(&self, form: BoostForm) -> Result<()> {
        let (username, boost) = match form.into_request() {
            Ok(request) => request,
            Err(e) => return self.ctx.fail("boost bandwidth", e),
        };
        match self.ctx.api.set_bandwidth_limit(&username, &boost).await {
            Ok(_) => {
                let hours = boost.duration_hours.unwrap_or_default();
                info!(%username, hours, "Boost applied");
                self.ctx
                    .notifier
                    .success(&format!("Boost applied to {username} for {hours}h"));
                Ok(())
            }
            Err(e) => self.ctx.fail("boost bandwidth", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api_client::{ApiClient, RecordingNavigator},
        pages::RecordingNotifier,
        session::MemorySession,
    };
    use netdesk_core::config::DisplayConfig;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn page(notifier: Arc<RecordingNotifier>) -> BandwidthPage {
        let api = ApiClient::new(
            "http://127.0.0.1:9",
            Arc::new(MemorySession::with_token("t")),
            Arc::new(RecordingNavigator::default()),
        );
        BandwidthPage::new(PageContext::new(api, DisplayConfig::default(), notifier))
    }

    fn usage(username: &str, download: u64, upload: u64) -> BandwidthUsage {
        BandwidthUsage {
            username: username.to_string(),
            download,
            upload,
            ..BandwidthUsage::default()
        }
    }

    #[test]
    fn test_usage_row() {
        let row = UsageLayout.row(&usage("budi", 1536, 512));

        assert_eq!(row.cells, vec!["budi", "1.50 KB", "512.00 B", "2.00 KB", "default"]);
    }

    #[test]
    fn test_top_consumers_chart_in_megabytes() {
        let mut page = page(Arc::new(RecordingNotifier::default()));
        let generation = page.top_generation.begin();

        page.apply_top(Fetched {
            generation,
            result: Ok(vec![
                usage("budi", 10 * 1024 * 1024, 1024 * 1024),
                usage("siti", 5 * 1024 * 1024, 0),
            ]),
        })
        .unwrap();

        let chart = page.top_consumers();
        assert_eq!(chart.labels(), ["budi", "siti"]);
        assert_eq!(chart.series()[0].data, vec![10.0, 5.0]);
        assert_eq!(chart.series()[1].data, vec![1.0, 0.0]);
        assert_eq!(chart.revision(), 1);
    }

    #[tokio::test]
    async fn test_boost_over_a_day_is_rejected() {
        let notifier = Arc::new(RecordingNotifier::default());
        let page = page(Arc::clone(&notifier));

        let err = page
            .boost(BoostForm {
                username: "budi".to_string(),
                download_mbps: 50,
                upload_mbps: 10,
                duration_hours: 25,
            })
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(
            notifier.errors(),
            vec![
                "Failed to boost bandwidth: Validation error: duration_hours - Boost lasts between 1 and 24 hours"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_profile_change_on_rows_without_ids() {
        let mut page = page(Arc::new(RecordingNotifier::default()));
        let generation = page.usage.begin_fetch();
        page.apply_usage(Fetched {
            generation,
            result: Ok(vec![usage("budi", 10, 10), usage("siti", 20, 20)]),
        })
        .unwrap();

        page.show_profile("siti", "gold");

        let table = page.usage_table();
        let names: Vec<&str> = table.rows.iter().map(|r| r.cells[0].as_str()).collect();
        assert_eq!(names, vec!["budi", "siti"]);
        assert_eq!(table.rows[0].cells[4], "default");
        assert_eq!(table.rows[1].cells[4], "gold");

        let budi = table.rows[0].id;
        let siti = table.rows[1].id;
        assert_ne!(budi, siti);
        assert_eq!(table.action(siti, "qos").unwrap().record_id, siti);
    }
}
