//! Dashboard: stats cards, network health and live traffic

use super::{Fetched, PageContext, RecordTable, Refresh, tagged};
use crate::{
    chart::Chart,
    generation::RequestGeneration,
    realtime::RealtimeListener,
    render::{TableLayout, TableView},
    socket::SocketEvent,
};
use chrono::{DateTime, Local};
use netdesk_core::{
    Result,
    types::{DashboardStats, Device, NetworkHealth},
    utils::{format_currency, group_thousands},
};
use serde::Deserialize;
use std::future::Future;
use tracing::debug;

/// Device table columns
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceLayout;

impl TableLayout<Device> for DeviceLayout {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Device", "Address", "Type", "Status"]
    }

    fn cells(&self, item: &Device) -> Vec<String> {
        vec![
            item.name.clone(),
            item.ip_address.clone().unwrap_or_else(|| "-".to_string()),
            item.device_type.clone().unwrap_or_else(|| "-".to_string()),
            item.status.clone(),
        ]
    }

    fn empty_message(&self) -> &'static str {
        "No devices registered"
    }
}

/// One point of the traffic graph pushed on `bandwidthUpdate`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrafficSample {
    /// Sample time
    pub timestamp: Option<String>,
    /// Download rate, bits per second
    #[serde(alias = "rx")]
    pub download: f64,
    /// Upload rate, bits per second
    #[serde(alias = "tx")]
    pub upload: f64,
}

impl TrafficSample {
    fn label(&self) -> String {
        match self.timestamp.as_deref() {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map_or_else(|_| raw.to_string(), |t| t.format("%H:%M:%S").to_string()),
            None => Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// Landing page
#[derive(Debug)]
pub struct DashboardPage {
    ctx: PageContext,
    stats: Option<DashboardStats>,
    stats_generation: RequestGeneration,
    health: Option<NetworkHealth>,
    health_generation: RequestGeneration,
    health_gauge: Chart,
    traffic: Chart,
    devices: RecordTable<Device, DeviceLayout>,
}

impl DashboardPage {
    /// Page with empty cards and charts
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        let history = ctx.display.chart_history;
        Self {
            stats: None,
            stats_generation: RequestGeneration::new(),
            health: None,
            health_generation: RequestGeneration::new(),
            health_gauge: Chart::gauge("Network health", 0.0, 100.0),
            traffic: Chart::line("Traffic", &["Download", "Upload"]).with_history(history),
            devices: RecordTable::new(DeviceLayout),
            ctx,
        }
    }

    /// Last loaded figures
    #[must_use]
    pub const fn stats(&self) -> Option<&DashboardStats> {
        self.stats.as_ref()
    }

    /// Stats cards as `(title, value)`; empty until the first load
    #[must_use]
    pub fn cards(&self) -> Vec<(&'static str, String)> {
        let Some(stats) = &self.stats else {
            return Vec::new();
        };
        let count = |n: u64| group_thousands(n, ',');
        vec![
            ("Customers", count(stats.total_customers)),
            ("Active customers", count(stats.active_customers)),
            (
                "Monthly revenue",
                format_currency(stats.monthly_revenue, &self.ctx.display.locale),
            ),
            ("Unpaid invoices", count(stats.unpaid_invoices)),
            ("Open tickets", count(stats.open_tickets)),
            ("Devices online", count(stats.online_devices)),
        ]
    }

    /// Last health summary
    #[must_use]
    pub const fn health(&self) -> Option<&NetworkHealth> {
        self.health.as_ref()
    }

    /// Health score gauge
    #[must_use]
    pub const fn health_gauge(&self) -> &Chart {
        &self.health_gauge
    }

    /// Rolling traffic graph
    #[must_use]
    pub const fn traffic(&self) -> &Chart {
        &self.traffic
    }

    /// Device status table
    #[must_use]
    pub const fn devices(&self) -> &TableView {
        self.devices.view()
    }

    /// Start loading the health summary
    pub fn fetch_health(&self) -> impl Future<Output = Fetched<NetworkHealth>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.health_generation.begin(), async move {
            api.network_health().await
        })
    }

    /// Merge a loaded health summary
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply_health(&mut self, fetched: Fetched<NetworkHealth>) -> Result<bool> {
        if !self.health_generation.is_current(fetched.generation) {
            debug!("Discarding stale health summary");
            return Ok(false);
        }
        match fetched.result {
            Ok(health) => {
                self.set_health(health);
                Ok(true)
            }
            Err(e) => self.ctx.fail("load network health", e),
        }
    }

    /// Start loading devices
    pub fn fetch_devices(&self) -> impl Future<Output = Fetched<Vec<Device>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.devices.begin_fetch(), async move {
            api.network_devices().await
        })
    }

    /// Merge loaded devices
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply_devices(&mut self, fetched: Fetched<Vec<Device>>) -> Result<bool> {
        self.devices.apply(&self.ctx, "devices", fetched)
    }

    /// Load stats, health and devices once
    ///
    /// # Errors
    ///
    /// Returns the first request error; the other sections are still loaded.
    pub async fn load(&mut self) -> Result<()> {
        let (stats, health, devices) =
            tokio::join!(self.fetch(), self.fetch_health(), self.fetch_devices());
        let stats = Refresh::apply(self, stats);
        let health = self.apply_health(health);
        let devices = self.apply_devices(devices);
        stats.and(health).and(devices).map(|_| ())
    }

    fn set_health(&mut self, health: NetworkHealth) {
        self.health_gauge.set_value(health.score);
        self.health = Some(health);
    }
}

impl Refresh for DashboardPage {
    type Data = DashboardStats;

    fn fetch(&self) -> impl Future<Output = Fetched<DashboardStats>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.stats_generation.begin(), async move {
            api.dashboard_stats().await
        })
    }

    fn apply(&mut self, fetched: Fetched<DashboardStats>) -> Result<bool> {
        if !self.stats_generation.is_current(fetched.generation) {
            debug!("Discarding stale dashboard stats");
            return Ok(false);
        }
        match fetched.result {
            Ok(stats) => {
                self.stats = Some(stats);
                Ok(true)
            }
            Err(e) => self.ctx.fail("load dashboard stats", e),
        }
    }
}

impl RealtimeListener for DashboardPage {
    fn handles(&self, name: &str) -> bool {
        matches!(
            name,
            "networkHealthUpdate" | "deviceStatusUpdate" | "bandwidthUpdate"
        )
    }

    fn on_event(&mut self, event: &SocketEvent) -> Result<()> {
        match event.name.as_str() {
            "networkHealthUpdate" => {
                let health = serde_json::from_value(event.payload.clone())?;
                self.set_health(health);
            }
            "deviceStatusUpdate" => {
                let device = serde_json::from_value(event.payload.clone())?;
                self.devices.upsert(device);
            }
            "bandwidthUpdate" => {
                let sample: TrafficSample = serde_json::from_value(event.payload.clone())?;
                self.traffic
                    .push_point(sample.label(), &[sample.download, sample.upload]);
            }
            _ => {}
        }
        Ok(())
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
    use serde_json::json;
    use std::sync::Arc;

    fn page(history: usize) -> DashboardPage {
        let api = ApiClient::new(
            "http://127.0.0.1:9",
            Arc::new(MemorySession::new()),
            Arc::new(RecordingNavigator::default()),
        );
        let display = DisplayConfig {
            chart_history: history,
            ..DisplayConfig::default()
        };
        DashboardPage::new(PageContext::new(
            api,
            display,
            Arc::new(RecordingNotifier::default()),
        ))
    }

    fn push(page: &mut DashboardPage, name: &str, payload: serde_json::Value) {
        page.on_event(&SocketEvent::new(name, payload)).unwrap();
    }

    #[test]
    fn test_cards_empty_until_loaded() {
        let mut page = page(20);
        assert!(page.cards().is_empty());

        let generation = page.stats_generation.begin();
        Refresh::apply(
            &mut page,
            Fetched {
                generation,
                result: Ok(DashboardStats {
                    total_customers: 1250,
                    monthly_revenue: 187_500_000.0,
                    ..DashboardStats::default()
                }),
            },
        )
        .unwrap();

        let cards = page.cards();
        assert_eq!(cards[0], ("Customers", "1,250".to_string()));
        assert_eq!(cards[2], ("Monthly revenue", "Rp 187.500.000".to_string()));
    }

    #[test]
    fn test_stale_stats_are_ignored() {
        let mut page = page(20);
        let old = page.stats_generation.begin();
        let new = page.stats_generation.begin();

        let fresh = DashboardStats {
            open_tickets: 3,
            ..DashboardStats::default()
        };
        assert!(Refresh::apply(&mut page, Fetched { generation: new, result: Ok(fresh) }).unwrap());
        assert!(
            !Refresh::apply(
                &mut page,
                Fetched {
                    generation: old,
                    result: Ok(DashboardStats::default()),
                },
            )
            .unwrap()
        );

        assert_eq!(page.stats().unwrap().open_tickets, 3);
    }

    #[test]
    fn test_health_push_moves_gauge() {
        let mut page = page(20);
        push(
            &mut page,
            "networkHealthUpdate",
            json!({"status": "degraded", "score": 75, "onlineDevices": 30, "offlineDevices": 2}),
        );

        assert_eq!(page.health_gauge().readout_text().as_deref(), Some("75%"));
        assert_eq!(page.health().unwrap().status, "degraded");
    }

    #[test]
    fn test_device_push_updates_row() {
        let mut page = page(20);
        push(
            &mut page,
            "deviceStatusUpdate",
            json!({"id": 5, "name": "ap-05", "status": "online"}),
        );
        push(
            &mut page,
            "deviceStatusUpdate",
            json!({"id": 5, "name": "ap-05", "status": "offline"}),
        );

        assert_eq!(page.devices().len(), 1);
        assert_eq!(page.devices().rows[0].cells[3], "offline");
    }

    #[test]
    fn test_traffic_keeps_last_points() {
        let mut page = page(3);
        for second in 0..5 {
            push(
                &mut page,
                "bandwidthUpdate",
                json!({
                    "timestamp": format!("2024-05-01T10:00:0{second}Z"),
                    "download": 1_000_000 * second,
                    "upload": 100_000
                }),
            );
        }

        assert_eq!(page.traffic().labels(), ["10:00:02", "10:00:03", "10:00:04"]);
        assert_eq!(page.traffic().series()[0].data, vec![2e6, 3e6, 4e6]);
    }
}
