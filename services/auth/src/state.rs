use common::notification::NotificationQueue;
use std::sync::Arc;

use crate::config::AuthSettings;
use crate::oauth::{AuthStrategyRegistry, AuthorizationStates};
use crate::rate_limiter::AttemptLimiter;
use crate::service::AuthService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub strategies: AuthStrategyRegistry,
    pub authorization_states: Arc<dyn AuthorizationStates>,
    pub notifications: Arc<dyn NotificationQueue>,
    pub rate_limiter: AttemptLimiter,
    pub settings: Arc<AuthSettings>,
}
