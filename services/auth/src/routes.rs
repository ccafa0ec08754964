//! Authentication service routes

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use common::{
    ApiResponse, AppError, AppResult,
    notification::{Notification, dispatch},
    validation::{
        Validate, ValidatedJson, collect_errors, validate_name, validate_otp_code,
        validate_password, validate_phone_number,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{AuthProvider, User};
use crate::oauth::PendingAuthorization;
use crate::service::{AuthSession, TokenPair};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub phone_number: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        collect_errors([
            validate_name(&self.name),
            validate_phone_number(&self.phone_number),
            validate_password(&self.password),
        ])
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub user_id: Uuid,
    pub otp: String,
}

impl Validate for VerifyOtpRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        collect_errors([validate_otp_code(&self.otp)])
    }
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub user_id: Uuid,
}

impl Validate for ResendOtpRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        collect_errors([
            validate_phone_number(&self.phone_number),
            if self.password.is_empty() {
                Err("password is required".to_string())
            } else {
                Ok(())
            },
        ])
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub phone_number: String,
}

impl Validate for ForgotPasswordRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        collect_errors([validate_phone_number(&self.phone_number)])
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub phone_number: String,
    pub otp: String,
    pub new_password: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        collect_errors([
            validate_phone_number(&self.phone_number),
            validate_otp_code(&self.otp),
            validate_password(&self.new_password),
        ])
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

impl Validate for RefreshTokenRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        if self.refresh_token.is_empty() {
            return Err(vec!["refresh_token is required".to_string()]);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// A user plus the passcode, when the service is set to echo it
#[derive(Debug, Serialize)]
pub struct OtpIssued {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .route("/auth/:provider", get(oauth_redirect))
        .route("/auth/:provider/callback", get(oauth_callback))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let registration = state
        .auth_service
        .register(&payload.name, &payload.phone_number, &payload.password)
        .await?;

    let otp = deliver_otp(&state, &registration.user, registration.otp);

    Ok(ApiResponse::created(
        "User registered successfully, verify the OTP sent to your phone",
        OtpIssued {
            user: registration.user,
            otp,
        },
    ))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<VerifyOtpRequest>,
) -> AppResult<ApiResponse<()>> {
    let key = format!("verify-otp:{}", payload.user_id);
    state.rate_limiter.check(&key).await?;

    state
        .auth_service
        .verify_otp(payload.user_id, &payload.otp)
        .await?;
    state.rate_limiter.reset(&key).await;

    Ok(ApiResponse::new("OTP verified successfully", ()))
}

pub async fn resend_otp(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResendOtpRequest>,
) -> AppResult<ApiResponse<OtpIssued>> {
    state
        .rate_limiter
        .check(&format!("resend-otp:{}", payload.user_id))
        .await?;

    let issued = state.auth_service.resend_otp(payload.user_id).await?;
    let otp = deliver_otp(&state, &issued.user, issued.otp);

    Ok(ApiResponse::new(
        "OTP sent successfully",
        OtpIssued {
            user: issued.user,
            otp,
        },
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<ApiResponse<AuthSession>> {
    let key = format!("login:{}", payload.phone_number);
    state.rate_limiter.check(&key).await?;

    let session = state
        .auth_service
        .login(&payload.phone_number, &payload.password)
        .await?;
    state.rate_limiter.reset(&key).await;

    Ok(ApiResponse::new("Login successful", session))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<OtpIssued>> {
    state
        .rate_limiter
        .check(&format!("forgot-password:{}", payload.phone_number))
        .await?;

    let issued = state
        .auth_service
        .forgot_password(&payload.phone_number)
        .await?;
    let otp = deliver_otp(&state, &issued.user, issued.otp);

    Ok(ApiResponse::new(
        "OTP sent successfully",
        OtpIssued {
            user: issued.user,
            otp,
        },
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    let key = format!("reset-password:{}", payload.phone_number);
    state.rate_limiter.check(&key).await?;

    state
        .auth_service
        .reset_password(&payload.phone_number, &payload.otp, &payload.new_password)
        .await?;
    state.rate_limiter.reset(&key).await;

    Ok(ApiResponse::new("Password reset successfully", ()))
}

/// Refresh token endpoint
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshTokenRequest>,
) -> AppResult<ApiResponse<TokenPair>> {
    info!("Token refresh request");
    let tokens = state.auth_service.refresh(&payload.refresh_token).await?;

    Ok(ApiResponse::new("Token refreshed successfully", tokens))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshTokenRequest>,
) -> AppResult<ApiResponse<()>> {
    info!("Logout request");
    state.auth_service.logout(&payload.refresh_token).await?;

    Ok(ApiResponse::new("Logged out successfully", ()))
}

/// Send the browser to the provider's consent page
pub async fn oauth_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Redirect> {
    let provider = external_provider(&provider)?;
    let strategy = state.strategies.get(provider)?;

    let request = strategy.authorize_url();
    state
        .authorization_states
        .save(
            &request.csrf_state,
            &PendingAuthorization {
                provider,
                pkce_verifier: request.pkce_verifier,
            },
        )
        .await?;

    info!("Redirecting to {} for sign-in", provider.as_str());
    Ok(Redirect::to(&request.url))
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallbackParams>,
) -> AppResult<ApiResponse<AuthSession>> {
    let provider = external_provider(&provider)?;
    let strategy = state.strategies.get(provider)?;

    if let Some(error) = params.error {
        warn!("{} sign-in was declined: {}", provider.as_str(), error);
        return Err(AppError::authentication("OAuth sign-in was cancelled"));
    }

    let (Some(code), Some(csrf_state)) = (params.code, params.state) else {
        return Err(AppError::validation("code and state are required"));
    };

    let pending = state
        .authorization_states
        .take(&csrf_state)
        .await?
        .filter(|pending| pending.provider == provider)
        .ok_or_else(|| AppError::authentication("Invalid or expired OAuth state"))?;

    let profile = strategy
        .resolve_profile(&code, &pending.pkce_verifier)
        .await
        .map_err(|e| {
            warn!("{} sign-in failed: {:#}", provider.as_str(), e);
            AppError::authentication("OAuth sign-in failed")
        })?;

    let user = state.auth_service.find_or_create_oauth_user(&profile).await?;
    let session = state.auth_service.build_oauth_response(user).await?;

    Ok(ApiResponse::new("Login successful", session))
}

fn external_provider(name: &str) -> AppResult<AuthProvider> {
    match AuthProvider::parse(name) {
        Some(AuthProvider::Local) | None => {
            Err(AppError::not_found(format!("Unknown sign-in provider {}", name)))
        }
        Some(provider) => Ok(provider),
    }
}

/// Queue the passcode for SMS delivery; return it only when echoing is enabled
fn deliver_otp(state: &AppState, user: &User, otp: String) -> Option<String> {
    if let Some(phone_number) = &user.phone_number {
        dispatch(
            state.notifications.clone(),
            Notification {
                to: phone_number.clone(),
                subject: "Your verification code".to_string(),
                template: "otp".to_string(),
                data: json!({ "name": user.name, "otp": otp }),
            },
        );
    }

    state.settings.expose_otp.then_some(otp)
}
