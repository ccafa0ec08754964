//! Payment service routes

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use common::{
    ApiResponse, AppError, AppResult,
    validation::{Validate, ValidatedJson, collect_errors},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    middleware::{AuthUser, auth_middleware, require_webhook_signature},
    models::{PaymentHistoryEntry, Plan},
    service::{CreatePaymentRequest, PaymentDetails, WebhookOutcome},
    state::AppState,
    webhook::WebhookEvent,
};

impl Validate for CreatePaymentRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        collect_errors([
            if self.amount > 0 {
                Ok(())
            } else {
                Err("amount must be greater than zero".to_string())
            },
            if self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase()) {
                Ok(())
            } else {
                Err("currency must be a three-letter ISO code".to_string())
            },
            if self.number_of_valid_years >= 1 {
                Ok(())
            } else {
                Err("number_of_valid_years must be at least 1".to_string())
            },
        ])
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentDetailsRequest {
    pub payment_id: String,
}

impl Validate for PaymentDetailsRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        if self.payment_id.trim().is_empty() {
            return Err(vec!["payment_id is required".to_string()]);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub language: Option<String>,
}

/// Create the router for the payment service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/payment", post(create_payment))
        .route("/payment/details", post(payment_details))
        .route("/payment/history", get(payment_history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let webhook_routes = Router::new()
        .route("/payment/webhook", post(payment_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_webhook_signature,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/plans", get(list_plans))
        .merge(protected_routes)
        .merge(webhook_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "payment-service"
    }))
}

pub async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> AppResult<ApiResponse<Vec<Plan>>> {
    let plans = state
        .payment_service
        .list_plans(query.language.as_deref())
        .await?;

    Ok(ApiResponse::new("Plans fetched successfully", plans))
}

pub async fn create_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<CreatePaymentRequest>,
) -> AppResult<impl IntoResponse> {
    let order = state
        .payment_service
        .create_user_payment(user.id, &payload)
        .await?;

    Ok(ApiResponse::created("Payment order created successfully", order))
}

pub async fn payment_details(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<PaymentDetailsRequest>,
) -> AppResult<ApiResponse<PaymentDetails>> {
    let details = state
        .payment_service
        .get_user_payment_details(user.id, payload.payment_id.trim())
        .await?;

    Ok(ApiResponse::new("Payment details fetched successfully", details))
}

pub async fn payment_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<ApiResponse<Vec<PaymentHistoryEntry>>> {
    let history = state
        .payment_service
        .get_plan_payment_history(user.id)
        .await?;

    Ok(ApiResponse::new("Payment history fetched successfully", history))
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<ApiResponse<WebhookOutcome>> {
    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::validation(format!("Invalid webhook payload: {}", e)))?;

    let outcome = state.payment_service.handle_webhook(&event).await?;

    Ok(ApiResponse::new("Webhook processed", outcome))
}
