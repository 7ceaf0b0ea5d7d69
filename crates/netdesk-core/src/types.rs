//! Record types returned by the back-office API
//!
//! Records are owned by the backend. The client only reads the fields it
//! needs for filtering and display; anything else is kept verbatim in
//! `extra` so a record can be sent back without losing data.

use crate::utils::parse_record_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend record identifier
pub type RecordId = i64;

/// Read-only view of a record used by the client-side filter
pub trait Filterable: Clone + Send + Sync + 'static {
    /// Stable identifier
    fn id(&self) -> RecordId;

    /// Text fields searched by the free-text filter
    fn search_fields(&self) -> Vec<&str>;

    /// Status value matched by the status filter
    fn status(&self) -> Option<&str> {
        None
    }

    /// Date matched by the date-range filter
    fn date(&self) -> Option<NaiveDate> {
        None
    }
}

/// Customer reference embedded in invoices, payments and tickets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    /// Customer display name
    #[serde(default)]
    pub name: String,

    /// Customer phone number
    #[serde(default)]
    pub phone: Option<String>,
}

/// ISP subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Identifier
    pub id: RecordId,
    /// Full name
    pub name: String,
    /// Phone number, also used for WhatsApp notifications
    #[serde(default)]
    pub phone: Option<String>,
    /// E-mail address
    #[serde(default)]
    pub email: Option<String>,
    /// Installation address
    #[serde(default)]
    pub address: Option<String>,
    /// Subscribed package name
    #[serde(default, alias = "packageName")]
    pub package: Option<String>,
    /// PPPoE / hotspot username
    #[serde(default)]
    pub username: Option<String>,
    /// Subscription status (`active`, `suspended`, ...)
    #[serde(default = "default_active")]
    pub status: String,
    /// Creation timestamp as sent by the backend
    #[serde(default)]
    pub created_at: Option<String>,
    /// Fields the client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Billing invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Identifier
    pub id: RecordId,
    /// Human-facing invoice number
    #[serde(default)]
    pub invoice_number: String,
    /// Owning customer id
    #[serde(default)]
    pub customer_id: Option<RecordId>,
    /// Embedded customer
    #[serde(default, rename = "Customer", alias = "customer")]
    pub customer: Option<CustomerRef>,
    /// Amount in IDR
    #[serde(default)]
    pub amount: f64,
    /// Due date (`YYYY-MM-DD` or RFC 3339)
    #[serde(default)]
    pub due_date: Option<String>,
    /// `paid`, `unpaid`, `overdue`, `cancelled`
    #[serde(default)]
    pub status: String,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
    /// Fields the client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payment received against an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Identifier
    pub id: RecordId,
    /// Paid invoice
    #[serde(default)]
    pub invoice_id: Option<RecordId>,
    /// Embedded customer
    #[serde(default, rename = "Customer", alias = "customer")]
    pub customer: Option<CustomerRef>,
    /// Amount in IDR
    #[serde(default)]
    pub amount: f64,
    /// Payment method (`cash`, `transfer`, ...)
    #[serde(default, alias = "paymentMethod")]
    pub method: Option<String>,
    /// Bank or gateway reference
    #[serde(default)]
    pub reference: Option<String>,
    /// Settlement status
    #[serde(default)]
    pub status: String,
    /// Payment date
    #[serde(default)]
    pub payment_date: Option<String>,
    /// Fields the client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Support ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Identifier
    pub id: RecordId,
    /// Human-facing ticket number
    #[serde(default)]
    pub ticket_number: Option<String>,
    /// Short description
    #[serde(default, alias = "title")]
    pub subject: String,
    /// Full description
    #[serde(default)]
    pub description: Option<String>,
    /// `low`, `medium`, `high`, `urgent`
    #[serde(default)]
    pub priority: String,
    /// `open`, `in_progress`, `resolved`, `closed`
    #[serde(default)]
    pub status: String,
    /// Embedded customer
    #[serde(default, rename = "Customer", alias = "customer")]
    pub customer: Option<CustomerRef>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
    /// Fields the client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Back-office operator account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identifier
    pub id: RecordId,
    /// Login name
    pub username: String,
    /// E-mail address
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,
    /// `admin`, `operator`, `technician`
    #[serde(default)]
    pub role: String,
    /// Whether the account may log in
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Router, access point or switch known to the network monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Identifier
    pub id: RecordId,
    /// Device name
    pub name: String,
    /// Management address
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Device type
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    /// `online` or `offline`
    #[serde(default)]
    pub status: String,
    /// Last time the device answered
    #[serde(default)]
    pub last_seen: Option<String>,
}

/// Per-subscriber traffic counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthUsage {
    /// Identifier, when the backend provides one; rows without one are
    /// keyed by username
    #[serde(default)]
    pub id: RecordId,
    /// PPPoE username
    pub username: String,
    /// Downloaded bytes
    #[serde(default)]
    pub download: u64,
    /// Uploaded bytes
    #[serde(default)]
    pub upload: u64,
    /// Applied QoS profile label
    #[serde(default)]
    pub profile: Option<String>,
}

/// WhatsApp / AI message template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTemplate {
    /// Template group (`billing`, `support`, ...)
    pub category: String,
    /// Key unique within the category
    pub key: String,
    /// Body with `{{variable}}` placeholders
    pub content: String,
    /// Variables the body may reference
    #[serde(default)]
    pub variables: Vec<String>,
    /// Operator-facing description
    #[serde(default)]
    pub description: Option<String>,
}

/// Figures shown on the dashboard cards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    /// All customers
    pub total_customers: u64,
    /// Customers with an active subscription
    pub active_customers: u64,
    /// Revenue collected this month, IDR
    pub monthly_revenue: f64,
    /// Invoices not yet paid
    pub unpaid_invoices: u64,
    /// Tickets not closed
    pub open_tickets: u64,
    /// Devices currently online
    pub online_devices: u64,
}

/// Figures shown on the payments page cards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentStats {
    /// Collected today, IDR
    pub total_today: f64,
    /// Collected this month, IDR
    pub total_month: f64,
    /// Payments awaiting confirmation
    pub pending_count: u64,
    /// Payments confirmed this month
    pub completed_count: u64,
}

/// Network health summary pushed on `networkHealthUpdate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkHealth {
    /// `healthy`, `degraded`, `down`
    pub status: String,
    /// Health score between 0 and 100
    pub score: f64,
    /// Devices answering
    pub online_devices: u64,
    /// Devices not answering
    pub offline_devices: u64,
    /// Average latency in milliseconds
    pub latency_ms: Option<f64>,
}

fn default_active() -> String {
    "active".to_string()
}

const fn default_true() -> bool {
    true
}

fn customer_name(customer: Option<&CustomerRef>) -> &str {
    customer.map_or("", |c| c.name.as_str())
}

impl Filterable for Customer {
    fn id(&self) -> RecordId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(
            [&self.phone, &self.email, &self.address, &self.username]
                .into_iter()
                .filter_map(Option::as_deref),
        );
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(&self.status)
    }

    fn date(&self) -> Option<NaiveDate> {
        self.created_at.as_deref().and_then(parse_record_date)
    }
}

impl Filterable for Invoice {
    fn id(&self) -> RecordId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.invoice_number.as_str(), customer_name(self.customer.as_ref())]
    }

    fn status(&self) -> Option<&str> {
        Some(&self.status)
    }

    fn date(&self) -> Option<NaiveDate> {
        self.due_date
            .as_deref()
            .or(self.created_at.as_deref())
            .and_then(parse_record_date)
    }
}

impl Filterable for Payment {
    fn id(&self) -> RecordId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![customer_name(self.customer.as_ref())];
        fields.extend(
            [&self.reference, &self.method]
                .into_iter()
                .filter_map(Option::as_deref),
        );
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(&self.status)
    }

    fn date(&self) -> Option<NaiveDate> {
        self.payment_date.as_deref().and_then(parse_record_date)
    }
}

impl Filterable for Ticket {
    fn id(&self) -> RecordId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.subject.as_str(), customer_name(self.customer.as_ref())];
        fields.extend(
            [&self.ticket_number, &self.description]
                .into_iter()
                .filter_map(Option::as_deref),
        );
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(&self.status)
    }

    fn date(&self) -> Option<NaiveDate> {
        self.created_at.as_deref().and_then(parse_record_date)
    }
}

impl Filterable for User {
    fn id(&self) -> RecordId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.username.as_str()];
        fields.extend(
            [&self.email, &self.full_name]
                .into_iter()
                .filter_map(Option::as_deref),
        );
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(if self.is_active { "active" } else { "inactive" })
    }
}

impl Filterable for Device {
    fn id(&self) -> RecordId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(
            [&self.ip_address, &self.device_type]
                .into_iter()
                .filter_map(Option::as_deref),
        );
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(&self.status)
    }
}

/// Stable negative id for a subscriber row the backend sent without one
///
/// Backend ids are positive, so derived keys never collide with them.
fn username_key(username: &str) -> RecordId {
    // FNV-1a
    let hash = username.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    });
    let positive = RecordId::try_from(hash >> 1).unwrap_or(RecordId::MAX);
    -positive - 1
}

impl Filterable for BandwidthUsage {
    fn id(&self) -> RecordId {
        if self.id > 0 {
            self.id
        } else {
            username_key(&self.username)
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.username.as_str()];
        fields.extend(self.profile.as_deref());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_invoice_deserializes_sequelize_shape() {
        let invoice: Invoice = serde_json::from_value(json!({
            "id": 7,
            "invoiceNumber": "INV-2024-0007",
            "customerId": 3,
            "Customer": {"name": "Budi Santoso", "phone": "08123"},
            "amount": 150000,
            "dueDate": "2024-03-10",
            "status": "unpaid",
            "createdAt": "2024-03-01T02:00:00.000Z",
            "notes": "installment 1/3"
        }))
        .unwrap();

        assert_eq!(invoice.invoice_number, "INV-2024-0007");
        assert_eq!(invoice.customer.as_ref().unwrap().name, "Budi Santoso");
        assert_eq!(invoice.status(), Some("unpaid"));
        assert_eq!(invoice.date(), NaiveDate::from_ymd_opt(2024, 3, 10));
        assert_eq!(invoice.extra.get("notes"), Some(&json!("installment 1/3")));
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "id": 1,
            "name": "Sari",
            "status": "active",
            "odpPort": 12
        });
        let customer: Customer = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&customer).unwrap();

        assert_eq!(back["odpPort"], json!(12));
    }

    #[test]
    fn test_customer_defaults_to_active() {
        let customer: Customer = serde_json::from_value(json!({"id": 2, "name": "Andi"})).unwrap();
        assert_eq!(customer.status, "active");
        assert_eq!(customer.search_fields(), vec!["Andi"]);
    }

    #[test]
    fn test_ticket_accepts_title_alias() {
        let ticket: Ticket = serde_json::from_value(json!({
            "id": 4,
            "title": "No internet since morning",
            "priority": "high",
            "status": "open",
            "customer": {"name": "Rina"}
        }))
        .unwrap();

        assert_eq!(ticket.subject, "No internet since morning");
        assert!(ticket.search_fields().contains(&"Rina"));
    }

    #[test]
    fn test_user_status_is_derived_from_flag() {
        let user: User =
            serde_json::from_value(json!({"id": 1, "username": "admin", "isActive": false}))
                .unwrap();
        assert_eq!(user.status(), Some("inactive"));
    }

    #[test]
    fn test_stats_tolerate_missing_fields() {
        let stats: DashboardStats =
            serde_json::from_value(json!({"totalCustomers": 120, "monthlyRevenue": 1.5e7}))
                .unwrap();

        assert_eq!(stats.total_customers, 120);
        assert_eq!(stats.open_tickets, 0);
    }

    #[test]
    fn test_usage_rows_without_id_get_distinct_keys() {
        let rows: Vec<BandwidthUsage> =
            serde_json::from_value(json!([{"username": "budi"}, {"username": "siti"}])).unwrap();

        assert_eq!(rows[0].id, 0);
        assert_ne!(Filterable::id(&rows[0]), Filterable::id(&rows[1]));
        assert!(Filterable::id(&rows[0]) < 0);
        assert_eq!(Filterable::id(&rows[0]), Filterable::id(&rows[0].clone()));

        let with_id = BandwidthUsage {
            id: 12,
            ..rows[1].clone()
        };
        assert_eq!(Filterable::id(&with_id), 12);
    }
}
