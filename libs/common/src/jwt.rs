//! JWT service for token generation and validation
//!
//! Tokens are signed either with an RS256 key pair or with an HS256 shared
//! secret. The auth service holds the signing key; services that only need to
//! check tokens may be configured with the public key alone.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::models::PaymentStatus;

/// Key material used to sign and verify tokens
#[derive(Debug, Clone)]
pub enum SigningKeys {
    /// RS256 PEM keys; the private key is absent on verify-only services
    Rsa {
        private_key: Option<String>,
        public_key: String,
    },
    /// HS256 shared secret
    Secret(String),
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub keys: SigningKeys,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HS256 shared secret; takes precedence over the RSA keys
    /// - `JWT_PRIVATE_KEY`: Private key (PEM or path), optional for verify-only services
    /// - `JWT_PUBLIC_KEY`: Public key (PEM or path), required when `JWT_SECRET` is unset
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let keys = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => SigningKeys::Secret(secret),
            _ => {
                let public_key = std::env::var("JWT_PUBLIC_KEY").map_err(|_| {
                    anyhow::anyhow!("Either JWT_SECRET or JWT_PUBLIC_KEY must be set")
                })?;
                let private_key = match std::env::var("JWT_PRIVATE_KEY") {
                    Ok(value) => Some(read_pem(&value)?),
                    Err(_) => None,
                };

                SigningKeys::Rsa {
                    private_key,
                    public_key: read_pem(&public_key)?,
                }
            }
        };

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(604800);

        Ok(JwtConfig {
            keys,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// Accept either an inline PEM or a path to a PEM file
fn read_pem(value: &str) -> Result<String> {
    if value.starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }

    std::fs::read_to_string(value)
        .map(|contents| contents.trim().to_string())
        .map_err(|e| anyhow::anyhow!("Failed to read key file {}: {}", value, e))
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Subscription tier at issue time
    pub payment_status: PaymentStatus,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Result<Self> {
        let (algorithm, encoding_key, decoding_key) = match &config.keys {
            SigningKeys::Secret(secret) => (
                Algorithm::HS256,
                Some(EncodingKey::from_secret(secret.as_bytes())),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            SigningKeys::Rsa {
                private_key,
                public_key,
            } => (
                Algorithm::RS256,
                private_key
                    .as_deref()
                    .map(|pem| EncodingKey::from_rsa_pem(pem.as_bytes()))
                    .transpose()?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;

        Ok(JwtService {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    pub fn generate_access_token(&self, user_id: Uuid, status: PaymentStatus) -> Result<String> {
        self.sign(user_id, status, TokenType::Access, self.config.access_token_expiry)
    }

    pub fn generate_refresh_token(&self, user_id: Uuid, status: PaymentStatus) -> Result<String> {
        self.sign(
            user_id,
            status,
            TokenType::Refresh,
            self.config.refresh_token_expiry,
        )
    }

    fn sign(
        &self,
        user_id: Uuid,
        payment_status: PaymentStatus,
        token_type: TokenType,
        lifetime: u64,
    ) -> Result<String> {
        let encoding_key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("JWT service is configured for verification only"))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs();

        let claims = Claims {
            sub: user_id,
            payment_status,
            iat: now,
            exp: now + lifetime,
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, encoding_key)?;
        Ok(token)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn secret_service(secret: &str) -> JwtService {
        JwtService::new(JwtConfig {
            keys: SigningKeys::Secret(secret.to_string()),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        })
        .unwrap()
    }

    #[test]
    fn access_token_round_trip() {
        let service = secret_service("milk-collection");
        let user_id = Uuid::new_v4();

        let token = service
            .generate_access_token(user_id, PaymentStatus::Premium)
            .unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.payment_status, PaymentStatus::Premium);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn refresh_tokens_are_marked() {
        let service = secret_service("milk-collection");

        let token = service
            .generate_refresh_token(Uuid::new_v4(), PaymentStatus::Free)
            .unwrap();

        assert_eq!(
            service.validate_token(&token).unwrap().token_type,
            TokenType::Refresh
        );
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let issuer = secret_service("one");
        let verifier = secret_service("two");

        let token = issuer
            .generate_access_token(Uuid::new_v4(), PaymentStatus::Free)
            .unwrap();

        assert!(verifier.validate_token(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(secret_service("s").validate_token("not.a.jwt").is_err());
    }

    #[test]
    #[serial]
    fn config_prefers_shared_secret() {
        unsafe {
            std::env::set_var("JWT_SECRET", "herd");
            std::env::set_var("JWT_ACCESS_TOKEN_EXPIRY", "60");
        }

        let config = JwtConfig::from_env().unwrap();
        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("JWT_ACCESS_TOKEN_EXPIRY");
        }

        assert!(matches!(config.keys, SigningKeys::Secret(ref s) if s == "herd"));
        assert_eq!(config.access_token_expiry, 60);
        assert_eq!(config.refresh_token_expiry, 604800);
    }

    #[test]
    #[serial]
    fn config_requires_some_key() {
        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("JWT_PUBLIC_KEY");
        }

        assert!(JwtConfig::from_env().is_err());
    }
}
