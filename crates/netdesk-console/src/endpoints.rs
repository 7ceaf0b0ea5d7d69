//! Typed helpers for the backend routes
//!
//! The backend answers either with the bare payload or wrapped as
//! `{"success": true, "data": ...}`; both shapes are accepted.

use crate::api_client::ApiClient;
use netdesk_core::{
    RecordId, Result,
    types::{
        BandwidthUsage, Customer, DashboardStats, Device, Invoice, MessageTemplate,
        NetworkHealth, Payment, PaymentStats, Ticket, User,
    },
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Settings groups stored by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingsKind {
    /// AI reply settings
    OpenAi,
    /// WhatsApp bot settings
    WhatsApp,
    /// Router / access point credentials
    NetworkDevice,
}

impl SettingsKind {
    /// Path segment under `/api/settings`
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::WhatsApp => "whatsapp",
            Self::NetworkDevice => "network-device",
        }
    }
}

/// New subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    /// Full name
    pub name: String,
    /// Phone number
    pub phone: String,
    /// Subscribed package
    pub package: String,
    /// E-mail address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Installation address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// New invoice
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    /// Billed customer
    pub customer_id: RecordId,
    /// Amount in IDR
    pub amount: f64,
    /// Due date, `YYYY-MM-DD`
    pub due_date: String,
    /// Optional notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// New payment against an invoice
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    /// Paid invoice
    pub invoice_id: RecordId,
    /// Amount in IDR
    pub amount: f64,
    /// Payment method
    pub payment_method: String,
    /// Bank or gateway reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// New support ticket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    /// Affected customer
    pub customer_id: RecordId,
    /// Short description
    pub subject: String,
    /// Full description
    pub description: String,
    /// `low`, `medium`, `high`, `urgent`
    pub priority: String,
}

/// Bandwidth limit applied to a subscriber
///
/// With `duration_hours` set the limit is a boost that expires on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthLimit {
    /// Download limit in Mbps
    pub download_mbps: u32,
    /// Upload limit in Mbps
    pub upload_mbps: u32,
    /// Boost duration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,
}

/// QoS profile assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QosProfile {
    /// Profile label as known by the network device
    pub profile: String,
}

/// Profile fields an operator may change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// E-mail address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Aggregated traffic figures
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BandwidthStats {
    /// Total downloaded bytes
    pub total_download: u64,
    /// Total uploaded bytes
    pub total_upload: u64,
    /// Subscribers with traffic in the window
    pub active_users: u64,
}

/// Network monitor service status
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorStatus {
    /// Whether the collector is running
    pub running: bool,
    /// Last collection time
    pub last_update: Option<String>,
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl ApiClient {
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(self.get::<Envelope<T>>(path).await?.into_inner())
    }

    async fn submit<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        Ok(self.post::<Envelope<T>, B>(path, body).await?.into_inner())
    }

    async fn replace<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        Ok(self.put::<Envelope<T>, B>(path, body).await?.into_inner())
    }

    /// `GET /api/settings/templates`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn list_templates(&self) -> Result<Vec<MessageTemplate>> {
        self.fetch("/api/settings/templates").await
    }

    /// `POST /api/settings/templates`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn save_template(&self, template: &MessageTemplate) -> Result<Value> {
        self.submit("/api/settings/templates", template).await
    }

    /// `DELETE /api/settings/templates/{category}/{key}`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn delete_template(&self, category: &str, key: &str) -> Result<Value> {
        self.delete(&format!(
            "/api/settings/templates/{}/{}",
            segment(category),
            segment(key)
        ))
        .await
    }

    /// `GET /api/settings/{kind}`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn get_settings(&self, kind: SettingsKind) -> Result<Value> {
        self.fetch(&format!("/api/settings/{}", kind.segment()))
            .await
    }

    /// `POST /api/settings/{kind}`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn save_settings(&self, kind: SettingsKind, settings: &Value) -> Result<Value> {
        self.submit(&format!("/api/settings/{}", kind.segment()), settings)
            .await
    }

    /// `GET /api/customers`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        self.fetch("/api/customers").await
    }

    /// `POST /api/customers`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer> {
        self.submit("/api/customers", customer).await
    }

    /// `GET /api/billing/invoices`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>> {
        self.fetch("/api/billing/invoices").await
    }

    /// `POST /api/billing/invoices`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice> {
        self.submit("/api/billing/invoices", invoice).await
    }

    /// `GET /api/billing/payments`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn list_payments(&self) -> Result<Vec<Payment>> {
        self.fetch("/api/billing/payments").await
    }

    /// `POST /api/billing/payments`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn record_payment(&self, payment: &NewPayment) -> Result<Payment> {
        self.submit("/api/billing/payments", payment).await
    }

    /// `GET /api/tickets`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        self.fetch("/api/tickets").await
    }

    /// `POST /api/tickets`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        self.submit("/api/tickets", ticket).await
    }

    /// `POST /api/bandwidth/limit/{username}`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn set_bandwidth_limit(
        &self,
        username: &str,
        limit: &BandwidthLimit,
    ) -> Result<Value> {
        self.submit(&format!("/api/bandwidth/limit/{}", segment(username)), limit)
            .await
    }

    /// `POST /api/bandwidth/qos/{username}`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn set_qos_profile(&self, username: &str, profile: &QosProfile) -> Result<Value> {
        self.submit(&format!("/api/bandwidth/qos/{}", segment(username)), profile)
            .await
    }

    /// `GET /api/network/health`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn network_health(&self) -> Result<NetworkHealth> {
        self.fetch("/api/network/health").await
    }

    /// `GET /api/network/devices`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn network_devices(&self) -> Result<Vec<Device>> {
        self.fetch("/api/network/devices").await
    }

    /// `GET /api/network/bandwidth-usage`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn bandwidth_usage(&self) -> Result<Vec<BandwidthUsage>> {
        self.fetch("/api/network/bandwidth-usage").await
    }

    /// `GET /api/network/bandwidth-stats`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn bandwidth_stats(&self) -> Result<BandwidthStats> {
        self.fetch("/api/network/bandwidth-stats").await
    }

    /// `GET /api/network/top-consumers`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn top_consumers(&self) -> Result<Vec<BandwidthUsage>> {
        self.fetch("/api/network/top-consumers").await
    }

    /// `GET /api/dashboard/stats`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.fetch("/api/dashboard/stats").await
    }

    /// `GET /api/payments/stats`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn payment_stats(&self) -> Result<PaymentStats> {
        self.fetch("/api/payments/stats").await
    }

    /// `GET /api/users`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.fetch("/api/users").await
    }

    /// `PUT /api/users/{id}`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn update_user(&self, id: RecordId, user: &Value) -> Result<User> {
        self.replace(&format!("/api/users/{id}"), user).await
    }

    /// `GET /api/users/profile`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn profile(&self) -> Result<User> {
        self.fetch("/api/users/profile").await
    }

    /// `PUT /api/users/profile`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        self.replace("/api/users/profile", update).await
    }

    /// `PUT /api/users/{id}/toggle-status`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn toggle_user_status(&self, id: RecordId) -> Result<User> {
        self.replace(&format!("/api/users/{id}/toggle-status"), &Value::Null)
            .await
    }

    /// `POST /api/network-monitor/start`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn start_monitor(&self) -> Result<Value> {
        self.submit("/api/network-monitor/start", &Value::Null)
            .await
    }

    /// `POST /api/network-monitor/stop`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn stop_monitor(&self) -> Result<Value> {
        self.submit("/api/network-monitor/stop", &Value::Null)
            .await
    }

    /// `GET /api/network-monitor/status`
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn monitor_status(&self) -> Result<MonitorStatus> {
        self.fetch("/api/network-monitor/status").await
    }

    /// `GET /api/network-monitor/data`, the latest full snapshot
    ///
    /// # Errors
    ///
    /// Any [`ApiClient::send`] error.
    pub async fn monitor_data(&self) -> Result<Value> {
        self.fetch("/api/network-monitor/data").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_envelope_accepts_both_shapes() {
        let wrapped: Envelope<Vec<i32>> =
            serde_json::from_value(json!({"success": true, "data": [1, 2]})).unwrap();
        let bare: Envelope<Vec<i32>> = serde_json::from_value(json!([3])).unwrap();

        assert_eq!(wrapped.into_inner(), vec![1, 2]);
        assert_eq!(bare.into_inner(), vec![3]);
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(segment("budi@home"), "budi%40home");
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }

    #[test]
    fn test_boost_serializes_duration_only_when_set() {
        let limit = BandwidthLimit {
            download_mbps: 20,
            upload_mbps: 5,
            duration_hours: None,
        };
        assert_eq!(
            serde_json::to_value(&limit).unwrap(),
            json!({"downloadMbps": 20, "uploadMbps": 5})
        );

        let boost = BandwidthLimit {
            duration_hours: Some(2),
            ..limit
        };
        assert_eq!(serde_json::to_value(&boost).unwrap()["durationHours"], 2);
    }

    #[test]
    fn test_settings_segments() {
        assert_eq!(SettingsKind::OpenAi.segment(), "openai");
        assert_eq!(SettingsKind::NetworkDevice.segment(), "network-device");
    }
}
