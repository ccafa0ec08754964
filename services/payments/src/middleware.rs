//! Bearer-token authentication and webhook signature checks

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use common::{AppError, jwt::TokenType};
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;
use crate::webhook::{SIGNATURE_HEADER, verify_signature};

/// Largest webhook body read for signature verification
const MAX_WEBHOOK_BYTES: usize = 1024 * 1024;

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AppError::authentication("Missing bearer token"))?;

    let claims = state
        .jwt_service
        .validate_token(bearer.token())
        .map_err(|e| {
            warn!("Failed to validate token: {}", e);
            AppError::authentication("Invalid or expired token")
        })?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::authentication("Invalid or expired token"));
    }

    req.extensions_mut().insert(AuthUser { id: claims.sub });

    Ok(next.run(req).await)
}

/// Reject webhook calls without a signature header; with a secret configured
/// the signature must also match the body
pub async fn require_webhook_signature(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AppError::authentication("Missing webhook signature"))?;

    let Some(secret) = state.webhook_secret.as_deref() else {
        return Ok(next.run(req).await);
    };

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BYTES)
        .await
        .map_err(|_| AppError::validation("Webhook body could not be read"))?;

    if !verify_signature(secret, &bytes, &signature) {
        warn!("Rejected webhook with a mismatched signature");
        return Err(AppError::authentication("Invalid webhook signature"));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
