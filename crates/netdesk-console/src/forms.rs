//! Form validation
//!
//! Forms are plain input structs validated with `validator`. A form that
//! fails validation never produces a request body.

use crate::endpoints::{
    BandwidthLimit, NewCustomer, NewInvoice, NewPayment, NewTicket, ProfileUpdate, QosProfile,
};
use chrono::NaiveDate;
use netdesk_core::{Error, RecordId};
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

/// Validate a form and turn the first failure into [`Error::Validation`]
///
/// # Errors
///
/// Returns the failing field (alphabetically first when several fail) and
/// its message.
pub fn check<T: Validate>(form: &T) -> netdesk_core::Result<()> {
    form.validate().map_err(|errors| first_error(&errors))
}

fn first_error(errors: &ValidationErrors) -> Error {
    let mut fields: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, list)| {
            list.first().map(|error| {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                (field.to_string(), message)
            })
        })
        .collect();
    fields.sort();

    fields.into_iter().next().map_or_else(
        || Error::validation("form", "Invalid input"),
        |(field, message)| Error::validation(field, message),
    )
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("This field is required".into());
        return Err(error);
    }
    Ok(())
}

fn iso_date(value: &str) -> std::result::Result<(), ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| {
            let mut error = ValidationError::new("date");
            error.message = Some("Expected a YYYY-MM-DD date".into());
            error
        })
}

fn known_priority(value: &str) -> std::result::Result<(), ValidationError> {
    match value {
        "low" | "medium" | "high" | "urgent" => Ok(()),
        _ => Err(ValidationError::new("invalid_priority")),
    }
}

fn known_role(value: &str) -> std::result::Result<(), ValidationError> {
    match value {
        "admin" | "operator" | "technician" => Ok(()),
        _ => Err(ValidationError::new("invalid_role")),
    }
}

/// New or edited customer
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CustomerForm {
    /// Full name
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    /// Phone number
    #[validate(custom(function = "not_blank"))]
    pub phone: String,
    /// Subscribed package
    #[validate(custom(function = "not_blank"))]
    pub package: String,
    /// E-mail address
    #[validate(email(message = "Invalid e-mail address"))]
    pub email: Option<String>,
    /// Installation address
    pub address: Option<String>,
}

impl CustomerForm {
    /// Validated request body
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_request(self) -> netdesk_core::Result<NewCustomer> {
        check(&self)?;
        Ok(NewCustomer {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            package: self.package.trim().to_string(),
            email: self.email.filter(|e| !e.trim().is_empty()),
            address: self.address.filter(|a| !a.trim().is_empty()),
        })
    }
}

/// New invoice
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InvoiceForm {
    /// Billed customer
    #[validate(range(min = 1, message = "Select a customer"))]
    pub customer_id: RecordId,
    /// Amount in IDR
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than zero"))]
    pub amount: f64,
    /// Due date, `YYYY-MM-DD`
    #[validate(custom(function = "iso_date"))]
    pub due_date: String,
    /// Optional notes
    pub notes: Option<String>,
}

impl InvoiceForm {
    /// Validated request body
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_request(self) -> netdesk_core::Result<NewInvoice> {
        check(&self)?;
        Ok(NewInvoice {
            customer_id: self.customer_id,
            amount: self.amount,
            due_date: self.due_date.trim().to_string(),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Payment against an invoice
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PaymentForm {
    /// Paid invoice
    #[validate(range(min = 1, message = "Select an invoice"))]
    pub invoice_id: RecordId,
    /// Amount in IDR
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than zero"))]
    pub amount: f64,
    /// Payment method
    #[validate(custom(function = "not_blank"))]
    pub method: String,
    /// Bank or gateway reference
    pub reference: Option<String>,
}

impl PaymentForm {
    /// Validated request body
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_request(self) -> netdesk_core::Result<NewPayment> {
        check(&self)?;
        Ok(NewPayment {
            invoice_id: self.invoice_id,
            amount: self.amount,
            payment_method: self.method.trim().to_string(),
            reference: self.reference.filter(|r| !r.trim().is_empty()),
        })
    }
}

/// New support ticket
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TicketForm {
    /// Affected customer
    #[validate(range(min = 1, message = "Select a customer"))]
    pub customer_id: RecordId,
    /// Short description
    #[validate(custom(function = "not_blank"))]
    pub subject: String,
    /// Full description
    #[validate(custom(function = "not_blank"))]
    pub description: String,
    /// `low`, `medium`, `high`, `urgent`
    #[validate(custom(function = "known_priority"))]
    pub priority: String,
}

impl TicketForm {
    /// Validated request body
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_request(self) -> netdesk_core::Result<NewTicket> {
        check(&self)?;
        Ok(NewTicket {
            customer_id: self.customer_id,
            subject: self.subject.trim().to_string(),
            description: self.description,
            priority: self.priority,
        })
    }
}

/// Bandwidth limit for a subscriber
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BandwidthLimitForm {
    /// PPPoE username
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    /// Download limit, Mbps
    #[validate(range(min = 1, max = 10000))]
    pub download_mbps: u32,
    /// Upload limit, Mbps
    #[validate(range(min = 1, max = 10000))]
    pub upload_mbps: u32,
}

impl BandwidthLimitForm {
    /// Validated username and request body
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_request(self) -> netdesk_core::Result<(String, BandwidthLimit)> {
        check(&self)?;
        Ok((
            self.username.trim().to_string(),
            BandwidthLimit {
                download_mbps: self.download_mbps,
                upload_mbps: self.upload_mbps,
                duration_hours: None,
            },
        ))
    }
}

/// Temporary bandwidth increase
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BoostForm {
    /// PPPoE username
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    /// Boosted download limit, Mbps
    #[validate(range(min = 1, max = 10000))]
    pub download_mbps: u32,
    /// Boosted upload limit, Mbps
    #[validate(range(min = 1, max = 10000))]
    pub upload_mbps: u32,
    /// Boost duration, hours
    #[validate(range(min = 1, max = 24, message = "Boost lasts between 1 and 24 hours"))]
    pub duration_hours: u32,
}

impl BoostForm {
    /// Validated username and request body
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_request(self) -> netdesk_core::Result<(String, BandwidthLimit)> {
        check(&self)?;
        Ok((
            self.username.trim().to_string(),
            BandwidthLimit {
                download_mbps: self.download_mbps,
                upload_mbps: self.upload_mbps,
                duration_hours: Some(self.duration_hours),
            },
        ))
    }
}

/// QoS profile selection
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct QosForm {
    /// PPPoE username
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    /// Profile label
    #[validate(custom(function = "not_blank"))]
    pub profile: String,
}

impl QosForm {
    /// Validated username and request body
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_request(self) -> netdesk_core::Result<(String, QosProfile)> {
        check(&self)?;
        Ok((
            self.username.trim().to_string(),
            QosProfile {
                profile: self.profile.trim().to_string(),
            },
        ))
    }
}

/// Operator account form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserForm {
    /// Login name
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    /// Display name
    pub full_name: Option<String>,
    /// E-mail address
    #[validate(email(message = "Invalid e-mail address"))]
    pub email: Option<String>,
    /// `admin`, `operator` or `technician`
    #[validate(custom(function = "known_role"))]
    pub role: String,
    /// New password; unchanged when absent
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    /// Repeated password
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: Option<String>,
}

impl UserForm {
    /// Validated profile update
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_profile_update(self) -> netdesk_core::Result<ProfileUpdate> {
        check(&self)?;
        Ok(ProfileUpdate {
            full_name: self.full_name.filter(|n| !n.trim().is_empty()),
            email: self.email.filter(|e| !e.trim().is_empty()),
            password: self.password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn field_of(err: &Error) -> &str {
        match err {
            Error::Validation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_customer_requires_name_phone_package() {
        let form = CustomerForm {
            name: "Budi".to_string(),
            phone: " ".to_string(),
            package: String::new(),
            ..CustomerForm::default()
        };

        let err = check(&form).unwrap_err();
        assert_eq!(field_of(&err), "package");
        assert_eq!(
            err.to_string(),
            "Validation error: package - This field is required"
        );
    }

    #[rstest]
    #[case(0, 10, false)]
    #[case(1, 1, true)]
    #[case(10_000, 10_000, true)]
    #[case(10_001, 5, false)]
    fn test_limit_ranges(#[case] down: u32, #[case] up: u32, #[case] ok: bool) {
        let form = BandwidthLimitForm {
            username: "budi".to_string(),
            download_mbps: down,
            upload_mbps: up,
        };
        assert_eq!(form.into_request().is_ok(), ok);
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(24, true)]
    #[case(25, false)]
    fn test_boost_duration(#[case] hours: u32, #[case] ok: bool) {
        let form = BoostForm {
            username: "budi".to_string(),
            download_mbps: 50,
            upload_mbps: 20,
            duration_hours: hours,
        };
        assert_eq!(form.into_request().is_ok(), ok);
    }

    #[test]
    fn test_password_confirmation() {
        let mut form = UserForm {
            username: "noc".to_string(),
            role: "operator".to_string(),
            password: Some("secret1".to_string()),
            confirm_password: Some("secret2".to_string()),
            ..UserForm::default()
        };
        let err = form.clone().into_profile_update().unwrap_err();
        assert_eq!(field_of(&err), "confirm_password");

        form.password = Some("abc".to_string());
        form.confirm_password = Some("abc".to_string());
        let err = form.clone().into_profile_update().unwrap_err();
        assert_eq!(field_of(&err), "password");

        form.password = Some("abcdef".to_string());
        form.confirm_password = Some("abcdef".to_string());
        assert_eq!(
            form.into_profile_update().unwrap().password.as_deref(),
            Some("abcdef")
        );
    }

    #[test]
    fn test_payment_amount_must_be_positive() {
        let form = PaymentForm {
            invoice_id: 3,
            amount: 0.0,
            method: "cash".to_string(),
            reference: None,
        };
        assert_eq!(field_of(&form.into_request().unwrap_err()), "amount");
    }

    #[test]
    fn test_invoice_form_builds_request() {
        let form = InvoiceForm {
            customer_id: 4,
            amount: 150_000.0,
            due_date: "2024-07-10".to_string(),
            notes: Some("  ".to_string()),
        };
        let request = form.into_request().unwrap();

        assert_eq!(request.due_date, "2024-07-10");
        assert!(request.notes.is_none());
    }

    #[test]
    fn test_ticket_priority_must_be_known() {
        let form = TicketForm {
            customer_id: 1,
            subject: "LOS".to_string(),
            description: "Red light on ONT".to_string(),
            priority: "critical".to_string(),
        };
        assert_eq!(field_of(&form.into_request().unwrap_err()), "priority");
    }

    #[test]
    fn test_qos_label_required() {
        let form = QosForm {
            username: "budi".to_string(),
            profile: String::new(),
        };
        assert!(form.into_request().unwrap_err().is_validation());
    }
}
