use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Purchasable subscription tier; reference data
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    /// Price in the smallest currency unit
    pub amount: i64,
    pub plan_type: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}
