//! Application state shared across handlers

use common::jwt::JwtService;

use crate::service::PaymentService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub payment_service: PaymentService,
    /// Verifies access tokens issued by the auth service
    pub jwt_service: JwtService,
    pub webhook_secret: Option<String>,
}
