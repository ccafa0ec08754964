//! Domain values read and written by more than one service

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription tier stored on the user row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Free,
    Premium,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Free => "free",
            PaymentStatus::Premium => "premium",
        }
    }

    /// Unknown column values read as `Free`
    pub fn from_column(value: &str) -> Self {
        match value {
            "premium" => PaymentStatus::Premium,
            _ => PaymentStatus::Free,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
