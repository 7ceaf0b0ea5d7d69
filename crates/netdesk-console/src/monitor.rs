//! Network monitor panel fed by pushed snapshots
//!
//! Each widget owns one field of the snapshot and is rebuilt from scratch
//! when that field is present. A snapshot without the field leaves the
//! widget as it was.

use crate::{
    chart::Chart,
    realtime::RealtimeListener,
    render::{Row, TableView},
    socket::SocketEvent,
};
use netdesk_core::{
    Result,
    utils::{format_bandwidth, format_bits_per_second, format_uptime},
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Most critical issues kept from `network_critical_issue` pushes
const MAX_PUSHED_ISSUES: usize = 100;

/// Router resource usage, in percent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resources {
    /// CPU load
    #[serde(alias = "cpuLoad")]
    pub cpu: Option<f64>,
    /// Memory in use
    #[serde(alias = "memoryUsage")]
    pub memory: Option<f64>,
    /// Disk in use
    #[serde(alias = "diskUsage")]
    pub disk: Option<f64>,
}

/// Whole non-negative count from an integer, float or numeric string
///
/// Collectors report counters in whichever of these they read from the
/// router; anything else reads as absent.
fn count_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let whole = f.trunc() as u64;
                    whole
                })
        }),
        Value::String(s) => s.trim().parse::<u64>().ok().or_else(|| {
            s.trim()
                .parse::<f64>()
                .ok()
                .and_then(|f| count_of(&Value::from(f)))
        }),
        _ => None,
    }
}

fn counter<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    Ok(count_of(&Value::deserialize(deserializer)?).unwrap_or_default())
}

fn optional_counter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error> {
    Ok(count_of(&Value::deserialize(deserializer)?))
}

/// Interface counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceStat {
    /// Interface name
    pub name: String,
    /// Link status
    #[serde(alias = "running")]
    pub status: Option<Value>,
    /// Received bytes
    #[serde(deserialize_with = "counter")]
    pub rx_bytes: u64,
    /// Transmitted bytes
    #[serde(deserialize_with = "counter")]
    pub tx_bytes: u64,
    /// Current receive rate, bits per second
    pub rx_rate: f64,
    /// Current transmit rate, bits per second
    pub tx_rate: f64,
}

impl InterfaceStat {
    fn status_text(&self) -> String {
        match &self.status {
            Some(Value::Bool(true)) => "up".to_string(),
            Some(Value::Bool(false)) => "down".to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => "-".to_string(),
        }
    }
}

/// Station associated with an access point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WirelessClient {
    /// Station MAC address
    #[serde(alias = "macAddress")]
    pub mac: String,
    /// Wireless interface
    pub interface: String,
    /// Signal strength, dBm
    #[serde(alias = "signalStrength")]
    pub signal: Option<i64>,
    /// Transmit rate, bits per second
    pub tx_rate: f64,
    /// Receive rate, bits per second
    pub rx_rate: f64,
    /// Association uptime, seconds
    #[serde(deserialize_with = "optional_counter")]
    pub uptime: Option<u64>,
}

/// Detected problem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Issue {
    /// Affected device or interface
    pub source: Option<String>,
    /// Problem description
    #[serde(alias = "description")]
    pub message: String,
    /// Detection time
    pub timestamp: Option<String>,
}

/// Issues bucketed by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issues {
    /// Needs action now
    pub critical: Option<Vec<Issue>>,
    /// Worth a look
    pub warning: Option<Vec<Issue>>,
}

/// Snapshot pushed on `monitoring-data` and `network_monitoring_update`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkSnapshot {
    /// Resource gauges
    #[serde(alias = "system")]
    pub resources: Option<Resources>,
    /// Interface table
    pub interfaces: Option<Vec<InterfaceStat>>,
    /// Wireless client table
    #[serde(alias = "wirelessClients")]
    pub wireless: Option<Vec<WirelessClient>>,
    /// Active connection counter
    pub active_connections: Option<u64>,
    /// Issue lists
    pub issues: Option<Issues>,
    /// Collection time
    pub timestamp: Option<String>,
}

/// Network monitor panel
#[derive(Debug, Clone)]
pub struct MonitorPanel {
    cpu: Chart,
    memory: Chart,
    disk: Chart,
    interfaces: TableView,
    wireless: TableView,
    active_connections: Option<u64>,
    critical: VecDeque<Issue>,
    warning: Vec<Issue>,
    last_error: Option<String>,
    last_update: Option<String>,
}

impl Default for MonitorPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorPanel {
    /// Empty panel
    #[must_use]
    pub fn new() -> Self {
        Self {
            cpu: Chart::gauge("CPU", 0.0, 100.0),
            memory: Chart::gauge("Memory", 0.0, 100.0),
            disk: Chart::gauge("Disk", 0.0, 100.0),
            interfaces: TableView::new(),
            wireless: TableView::new(),
            active_connections: None,
            critical: VecDeque::new(),
            warning: Vec::new(),
            last_error: None,
            last_update: None,
        }
    }

    /// CPU, memory and disk gauges
    #[must_use]
    pub const fn gauges(&self) -> [&Chart; 3] {
        [&self.cpu, &self.memory, &self.disk]
    }

    /// Interface table
    #[must_use]
    pub const fn interfaces(&self) -> &TableView {
        &self.interfaces
    }

    /// Wireless client table
    #[must_use]
    pub const fn wireless(&self) -> &TableView {
        &self.wireless
    }

    /// Active connection count, once reported
    #[must_use]
    pub const fn active_connections(&self) -> Option<u64> {
        self.active_connections
    }

    /// Critical issues, oldest first
    pub fn critical(&self) -> impl Iterator<Item = &Issue> {
        self.critical.iter()
    }

    /// Warnings from the last snapshot that carried them
    #[must_use]
    pub fn warning(&self) -> &[Issue] {
        &self.warning
    }

    /// Last `network_monitoring_error` message
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Collection time of the last snapshot
    #[must_use]
    pub fn last_update(&self) -> Option<&str> {
        self.last_update.as_deref()
    }

    /// Update every widget whose field is present
    pub fn apply_snapshot(&mut self, snapshot: NetworkSnapshot) {
        if let Some(resources) = snapshot.resources {
            for (gauge, value) in [
                (&mut self.cpu, resources.cpu),
                (&mut self.memory, resources.memory),
                (&mut self.disk, resources.disk),
            ] {
                if let Some(value) = value {
                    gauge.set_value(value);
                }
            }
        }

        if let Some(interfaces) = snapshot.interfaces {
            self.interfaces.fill(
                &["Interface", "Status", "RX", "TX", "RX rate", "TX rate"],
                "No interfaces",
                interfaces.iter().zip(0..).map(|(iface, id)| Row {
                    id,
                    cells: vec![
                        iface.name.clone(),
                        iface.status_text(),
                        format_bandwidth(iface.rx_bytes),
                        format_bandwidth(iface.tx_bytes),
                        format_bits_per_second(iface.rx_rate),
                        format_bits_per_second(iface.tx_rate),
                    ],
                    actions: Vec::new(),
                }),
            );
        }

        if let Some(clients) = snapshot.wireless {
            self.wireless.fill(
                &["MAC", "Interface", "Signal", "TX rate", "RX rate", "Uptime"],
                "No wireless clients",
                clients.iter().zip(0..).map(|(client, id)| Row {
                    id,
                    cells: vec![
                        client.mac.clone(),
                        client.interface.clone(),
                        client
                            .signal
                            .map_or_else(|| "-".to_string(), |s| format!("{s} dBm")),
                        format_bits_per_second(client.tx_rate),
                        format_bits_per_second(client.rx_rate),
                        client.uptime.map_or_else(|| "-".to_string(), format_uptime),
                    ],
                    actions: Vec::new(),
                }),
            );
        }

        if let Some(count) = snapshot.active_connections {
            self.active_connections = Some(count);
        }

        if let Some(issues) = snapshot.issues {
            if let Some(critical) = issues.critical {
                self.critical = critical.into();
            }
            if let Some(warning) = issues.warning {
                self.warning = warning;
            }
        }

        if snapshot.timestamp.is_some() {
            self.last_update = snapshot.timestamp;
        }
    }

    fn push_critical(&mut self, issue: Issue) {
        if self.critical.len() == MAX_PUSHED_ISSUES {
            self.critical.pop_front();
        }
        self.critical.push_back(issue);
    }
}

impl RealtimeListener for MonitorPanel {
    fn handles(&self, name: &str) -> bool {
        matches!(
            name,
            "monitoring-data"
                | "network_monitoring_update"
                | "network_critical_issue"
                | "network_monitoring_error"
        )
    }

    fn on_event(&mut self, event: &SocketEvent) -> Result<()> {
        match event.name.as_str() {
            "monitoring-data" | "network_monitoring_update" => {
                let snapshot = serde_json::from_value(event.payload.clone())?;
                self.apply_snapshot(snapshot);
            }
            "network_critical_issue" => {
                let issue = match &event.payload {
                    Value::String(message) => Issue {
                        message: message.clone(),
                        ..Issue::default()
                    },
                    other => serde_json::from_value(other.clone())?,
                };
                self.push_critical(issue);
            }
            "network_monitoring_error" => {
                let message = event
                    .payload
                    .as_str()
                    .or_else(|| event.payload.get("message").and_then(Value::as_str))
                    .unwrap_or("Unknown monitoring error");
                self.last_error = Some(message.to_string());
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn push(panel: &mut MonitorPanel, name: &str, payload: Value) {
        panel.on_event(&SocketEvent::new(name, payload)).unwrap();
    }

    fn full_snapshot() -> Value {
        json!({
            "resources": {"cpu": 42.0, "memory": 61.0, "disk": 12.0},
            "interfaces": [
                {"name": "ether1", "running": true, "rxBytes": 1536, "txBytes": 0, "rxRate": 2_000_000.0},
                {"name": "wlan1", "status": "down"}
            ],
            "wirelessClients": [
                {"macAddress": "AA:BB:CC:00:11:22", "interface": "wlan1", "signal": -61, "uptime": 3900}
            ],
            "activeConnections": 134,
            "issues": {
                "critical": [{"source": "ap-02", "message": "Device unreachable"}],
                "warning": [{"message": "High CPU"}, {"message": "Packet loss 3%"}]
            },
            "timestamp": "2024-05-01T10:00:00Z"
        })
    }

    #[test]
    fn test_full_snapshot_updates_every_widget() {
        let mut panel = MonitorPanel::new();
        push(&mut panel, "monitoring-data", full_snapshot());

        let [cpu, memory, _] = panel.gauges();
        assert_eq!(cpu.readout_text().as_deref(), Some("42%"));
        assert_eq!(memory.readout_text().as_deref(), Some("61%"));

        let rows = &panel.interfaces().rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells[1], "up");
        assert_eq!(rows[0].cells[2], "1.50 KB");
        assert_eq!(rows[0].cells[4], "2.00 Mbps");
        assert_eq!(rows[1].cells[1], "down");

        assert_eq!(panel.wireless().rows[0].cells[2], "-61 dBm");
        assert_eq!(panel.wireless().rows[0].cells[5], "1h 5m");
        assert_eq!(panel.active_connections(), Some(134));
        assert_eq!(panel.critical().count(), 1);
        assert_eq!(panel.warning().len(), 2);
        assert_eq!(panel.last_update(), Some("2024-05-01T10:00:00Z"));
    }

    #[test]
    fn test_counters_accept_floats_and_strings() {
        let mut panel = MonitorPanel::new();
        push(
            &mut panel,
            "monitoring-data",
            json!({
                "resources": {"cpu": 10.0},
                "interfaces": [
                    {"name": "ether1", "rxBytes": 1536.0, "txBytes": "2048"},
                    {"name": "ether2", "rxBytes": -5, "txBytes": "n/a"}
                ],
                "wirelessClients": [{"macAddress": "AA", "uptime": 3900.7}],
                "activeConnections": 7
            }),
        );

        let rows = &panel.interfaces().rows;
        assert_eq!(rows[0].cells[2], "1.50 KB");
        assert_eq!(rows[0].cells[3], "2.00 KB");
        assert_eq!(rows[1].cells[2], "0 B");
        assert_eq!(rows[1].cells[3], "0 B");
        assert_eq!(panel.wireless().rows[0].cells[5], "1h 5m");
        assert_eq!(panel.active_connections(), Some(7));
        assert_eq!(panel.gauges()[0].readout_text().as_deref(), Some("10%"));
    }

    #[test]
    fn test_missing_fields_leave_widgets_untouched() {
        let mut panel = MonitorPanel::new();
        push(&mut panel, "monitoring-data", full_snapshot());
        let interfaces_before = panel.interfaces().clone();

        push(
            &mut panel,
            "network_monitoring_update",
            json!({"resources": {"cpu": 90.0}, "issues": {"warning": []}}),
        );

        let [cpu, memory, _] = panel.gauges();
        assert_eq!(cpu.readout_text().as_deref(), Some("90%"));
        assert_eq!(memory.readout_text().as_deref(), Some("61%"));
        assert_eq!(panel.interfaces(), &interfaces_before);
        assert_eq!(panel.wireless().len(), 1);
        assert_eq!(panel.active_connections(), Some(134));
        assert_eq!(panel.critical().count(), 1);
        assert!(panel.warning().is_empty());
    }

    #[test]
    fn test_pushed_issue_and_error() {
        let mut panel = MonitorPanel::new();
        push(&mut panel, "network_critical_issue", json!("Core router down"));
        push(
            &mut panel,
            "network_critical_issue",
            json!({"source": "olt-1", "message": "PON port 3 LOS"}),
        );
        push(
            &mut panel,
            "network_monitoring_error",
            json!({"message": "SNMP timeout"}),
        );

        let messages: Vec<&str> = panel.critical().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["Core router down", "PON port 3 LOS"]);
        assert_eq!(panel.last_error(), Some("SNMP timeout"));
    }

    #[test]
    fn test_empty_snapshot_changes_nothing() {
        let mut panel = MonitorPanel::new();
        push(&mut panel, "monitoring-data", json!({}));

        assert_eq!(panel.interfaces().renders, 0);
        assert!(panel.gauges()[0].readout().is_none());
    }
}
