use common::models::PaymentStatus;
use serde::Serialize;
use uuid::Uuid;

/// The parts of a user account the payment flow reads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub payment_status: PaymentStatus,
}

impl Customer {
    /// Names of the contact fields that are blank or missing
    pub fn missing_contact_details(&self) -> Vec<&'static str> {
        let blank = |value: Option<&str>| value.is_none_or(|v| v.trim().is_empty());

        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if blank(self.email.as_deref()) {
            missing.push("email");
        }
        if blank(self.phone_number.as_deref()) {
            missing.push("phone_number");
        }
        missing
    }
}
