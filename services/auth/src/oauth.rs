//! OAuth2 sign-in with Google and Facebook
//!
//! Each provider is an [`OAuthStrategy`]. Strategies are collected into an
//! [`AuthStrategyRegistry`] that `main` builds from settings and hands to the
//! router, so tests can register fakes in their place.

use anyhow::Result;
use async_trait::async_trait;
use common::{AppError, AppResult, cache::RedisPool};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{AuthSettings, OAuthProviderSettings};
use crate::models::AuthProvider;

/// Seconds a pending authorization stays redeemable
pub const AUTHORIZATION_TTL_SECONDS: u64 = 600;

/// Redirect target plus the secrets needed to finish the exchange
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_state: String,
    pub pkce_verifier: String,
}

/// Profile returned by a provider after a successful code exchange
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthUserProfile {
    pub provider: AuthProvider,
    pub id: String,
    pub email: Option<String>,
    pub name: String,
}

#[async_trait]
pub trait OAuthStrategy: Send + Sync {
    fn provider(&self) -> AuthProvider;

    fn authorize_url(&self) -> AuthorizationRequest;

    /// Exchange the authorization code and look up the signed-in profile
    async fn resolve_profile(&self, code: &str, pkce_verifier: &str) -> Result<OAuthUserProfile>;
}

/// Endpoints and credentials for one provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn google(settings: &OAuthProviderSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_url: settings.redirect_url.clone(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            profile_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string(), "profile".to_string()],
        }
    }

    pub fn facebook(settings: &OAuthProviderSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_url: settings.redirect_url.clone(),
            auth_url: "https://www.facebook.com/v18.0/dialog/oauth".to_string(),
            token_url: "https://graph.facebook.com/v18.0/oauth/access_token".to_string(),
            profile_url: "https://graph.facebook.com/me?fields=id,name,email".to_string(),
            scopes: vec!["email".to_string(), "public_profile".to_string()],
        }
    }
}

/// OAuth2 client wrapper
#[derive(Clone)]
pub struct OAuthClient {
    provider: AuthProvider,
    client: BasicClient,
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(provider: AuthProvider, config: OAuthConfig) -> Result<Self> {
        let mut client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(config.auth_url.clone())?,
            Some(TokenUrl::new(config.token_url.clone())?),
        )
        .set_redirect_uri(RedirectUrl::new(config.redirect_url.clone())?);

        // Facebook rejects client credentials sent as basic auth
        if provider == AuthProvider::Facebook {
            client = client.set_auth_type(AuthType::RequestBody);
        }

        Ok(Self {
            provider,
            client,
            config,
            http: reqwest::Client::new(),
        })
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<String> {
        info!(
            "Exchanging authorization code for access token for {}",
            self.provider.as_str()
        );

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| anyhow::anyhow!("Token exchange with {} failed: {}", self.provider.as_str(), e))?;

        Ok(token_response.access_token().secret().clone())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthUserProfile> {
        let response = self
            .http
            .get(&self.config.profile_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to get {} user profile: {}",
                self.provider.as_str(),
                response.status()
            );
        }

        let profile: ProviderProfile = response.json().await?;
        Ok(profile.into_profile(self.provider))
    }
}

#[async_trait]
impl OAuthStrategy for OAuthClient {
    fn provider(&self) -> AuthProvider {
        self.provider
    }

    fn authorize_url(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);

        for scope in &self.config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (url, csrf_token) = request.url();

        AuthorizationRequest {
            url: url.to_string(),
            csrf_state: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        }
    }

    async fn resolve_profile(&self, code: &str, pkce_verifier: &str) -> Result<OAuthUserProfile> {
        let access_token = self.exchange_code(code, pkce_verifier).await?;
        self.fetch_profile(&access_token).await
    }
}

/// Google's userinfo and Facebook's graph `/me` share these fields
#[derive(Debug, Deserialize)]
struct ProviderProfile {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

impl ProviderProfile {
    fn into_profile(self, provider: AuthProvider) -> OAuthUserProfile {
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("{} user", provider.as_str()));

        OAuthUserProfile {
            provider,
            id: self.id,
            email: self.email,
            name,
        }
    }
}

/// Strategies available to the HTTP layer, keyed by provider
#[derive(Clone, Default)]
pub struct AuthStrategyRegistry {
    strategies: HashMap<AuthProvider, Arc<dyn OAuthStrategy>>,
}

impl AuthStrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Arc<dyn OAuthStrategy>) {
        info!("Registering OAuth strategy for {}", strategy.provider().as_str());
        self.strategies.insert(strategy.provider(), strategy);
    }

    pub fn get(&self, provider: AuthProvider) -> AppResult<Arc<dyn OAuthStrategy>> {
        self.strategies.get(&provider).cloned().ok_or_else(|| {
            AppError::not_found(format!("{} sign-in is not enabled", provider.as_str()))
        })
    }

    /// Register a client for every provider with credentials in `settings`
    pub fn from_settings(settings: &AuthSettings) -> Result<Self> {
        let mut registry = Self::new();

        if let Some(google) = &settings.google {
            registry.register(Arc::new(OAuthClient::new(
                AuthProvider::Google,
                OAuthConfig::google(google),
            )?));
        }

        if let Some(facebook) = &settings.facebook {
            registry.register(Arc::new(OAuthClient::new(
                AuthProvider::Facebook,
                OAuthConfig::facebook(facebook),
            )?));
        }

        Ok(registry)
    }
}

/// Data remembered between the redirect and the callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub provider: AuthProvider,
    pub pkce_verifier: String,
}

#[async_trait]
pub trait AuthorizationStates: Send + Sync {
    async fn save(&self, csrf_state: &str, pending: &PendingAuthorization) -> Result<()>;

    /// Fetch and forget; a state can be redeemed once
    async fn take(&self, csrf_state: &str) -> Result<Option<PendingAuthorization>>;
}

/// Pending authorizations kept in Redis under `oauth_state:{csrf}`
#[derive(Clone)]
pub struct RedisAuthorizationStates {
    redis_pool: RedisPool,
}

impl RedisAuthorizationStates {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    fn key(csrf_state: &str) -> String {
        format!("oauth_state:{}", csrf_state)
    }
}

#[async_trait]
impl AuthorizationStates for RedisAuthorizationStates {
    async fn save(&self, csrf_state: &str, pending: &PendingAuthorization) -> Result<()> {
        let payload = serde_json::to_string(pending)?;
        self.redis_pool
            .set(
                &Self::key(csrf_state),
                &payload,
                Some(AUTHORIZATION_TTL_SECONDS),
            )
            .await
    }

    async fn take(&self, csrf_state: &str) -> Result<Option<PendingAuthorization>> {
        match self.redis_pool.take(&Self::key(csrf_state)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
