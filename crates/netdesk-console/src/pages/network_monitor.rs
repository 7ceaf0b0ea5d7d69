//! Network monitor page
//!
//! REST calls control the collector; the panel itself is fed by socket
//! pushes, seeded with the latest stored snapshot on load.

use super::{PageContext, tagged};
use crate::{
    endpoints::MonitorStatus,
    generation::RequestGeneration,
    monitor::{MonitorPanel, NetworkSnapshot},
    realtime::RealtimeListener,
    socket::SocketEvent,
};
use netdesk_core::Result;
use serde_json::Value;
use tracing::{debug, info};

/// Network monitor page
#[derive(Debug)]
pub struct NetworkMonitorPage {
    ctx: PageContext,
    panel: MonitorPanel,
    status: Option<MonitorStatus>,
    snapshot_generation: RequestGeneration,
}

impl NetworkMonitorPage {
    /// Page with an empty panel
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            panel: MonitorPanel::new(),
            status: None,
            snapshot_generation: RequestGeneration::new(),
        }
    }

    /// Gauges, tables and issue lists
    #[must_use]
    pub const fn panel(&self) -> &MonitorPanel {
        &self.panel
    }

    /// Collector status, once loaded
    #[must_use]
    pub const fn status(&self) -> Option<&MonitorStatus> {
        self.status.as_ref()
    }

    /// Start the collector
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn start(&mut self) -> Result<()> {
        match self.ctx.api.start_monitor().await {
            Ok(_) => {
                info!("Network monitoring started");
                self.ctx.notifier.success("Network monitoring started");
                self.refresh_status().await
            }
            Err(e) => self.ctx.fail("start network monitoring", e),
        }
    }

    /// Stop the collector
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn stop(&mut self) -> Result<()> {
        match self.ctx.api.stop_monitor().await {
            Ok(_) => {
                info!("Network monitoring stopped");
                self.ctx.notifier.success("Network monitoring stopped");
                self.refresh_status().await
            }
            Err(e) => self.ctx.fail("stop network monitoring", e),
        }
    }

    /// Reload the collector status
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn refresh_status(&mut self) -> Result<()> {
        match self.ctx.api.monitor_status().await {
            Ok(status) => {
                self.status = Some(status);
                Ok(())
            }
            Err(e) => self.ctx.fail("load monitor status", e),
        }
    }

    /// Seed the panel with the latest stored snapshot
    ///
    /// Returns whether the snapshot was applied; a snapshot that arrives
    /// after a newer load was started is dropped.
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn load_snapshot(&mut self) -> Result<bool> {
        let api = self.ctx.api.clone();
        let fetched = tagged(self.snapshot_generation.begin(), async move {
            api.monitor_data().await
        })
        .await;

        if !self.snapshot_generation.is_current(fetched.generation) {
            debug!("Discarding stale monitor snapshot");
            return Ok(false);
        }
        match fetched.result {
            Ok(Value::Null) => Ok(false),
            Ok(raw) => match serde_json::from_value::<NetworkSnapshot>(raw) {
                Ok(snapshot) => {
                    self.panel.apply_snapshot(snapshot);
                    Ok(true)
                }
                Err(e) => self.ctx.fail("read monitor snapshot", e.into()),
            },
            Err(e) => self.ctx.fail("load monitor snapshot", e),
        }
    }
}

impl RealtimeListener for NetworkMonitorPage {
    fn handles(&self, name: &str) -> bool {
        self.panel.handles(name)
    }

    fn on_event(&mut self, event: &SocketEvent) -> Result<()> {
        self.panel.on_event(event)?;
        if event.name == "network_monitoring_error"
            && let Some(message) = self.panel.last_error()
        {
            self.ctx.notifier.error(message);
        }
        Ok(())
    }
}
