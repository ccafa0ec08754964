//! Request validation
//!
//! Validation runs as its own phase before a handler sees the request: the
//! [`ValidatedJson`] extractor deserializes the body, runs [`Validate`], and
//! only then hands the handler a statically typed value. Failures answer 422
//! with one message per offending field.

use axum::{
    Json, async_trait,
    extract::{FromRequest, Request},
};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use crate::error::AppError;

/// Field-level validation of a request payload
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<String>>;
}

/// Gather the failures of several field checks into one result
pub fn collect_errors<I>(checks: I) -> Result<(), Vec<String>>
where
    I: IntoIterator<Item = Result<(), String>>,
{
    let errors: Vec<String> = checks.into_iter().filter_map(Result::err).collect();
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// JSON body that has passed [`Validate`]
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(vec![rejection.body_text()]))?;

        value.validate().map_err(AppError::Validation)?;

        Ok(ValidatedJson(value))
    }
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("name is required".to_string());
    }

    if trimmed.chars().count() > 100 {
        return Err("name must be at most 100 characters long".to_string());
    }

    Ok(())
}

/// Phone numbers are 10 to 15 digits with an optional leading `+`
pub fn validate_phone_number(phone_number: &str) -> Result<(), String> {
    if phone_number.is_empty() {
        return Err("phone_number is required".to_string());
    }

    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("Failed to compile phone regex"));

    if !regex.is_match(phone_number) {
        return Err("phone_number must contain 10 to 15 digits".to_string());
    }

    Ok(())
}

/// Passwords need 8..=128 characters mixing upper, lower, digit and symbol
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("password is required".to_string());
    }

    if password.len() < 8 {
        return Err("password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("password must be at most 128 characters long".to_string());
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(
            "password must contain an uppercase letter, a lowercase letter, a digit and a special character"
                .to_string(),
        );
    }

    Ok(())
}

pub fn validate_otp_code(otp: &str) -> Result<(), String> {
    if otp.len() != 6 || !otp.chars().all(|c| c.is_ascii_digit()) {
        return Err("otp must be exactly 6 digits".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct SignUp {
        name: String,
        phone_number: String,
    }

    impl Validate for SignUp {
        fn validate(&self) -> Result<(), Vec<String>> {
            collect_errors([
                validate_name(&self.name),
                validate_phone_number(&self.phone_number),
            ])
        }
    }

    fn json_request(body: &str) -> Request {
        HttpRequest::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn phone_numbers() {
        assert!(validate_phone_number("9876543210").is_ok());
        assert!(validate_phone_number("+919876543210").is_ok());
        assert!(validate_phone_number("98765").is_err());
        assert!(validate_phone_number("98765abcde").is_err());
        assert!(validate_phone_number("").is_err());
    }

    #[test]
    fn passwords() {
        assert!(validate_password("Secret@123").is_ok());
        assert!(validate_password("secret@123").is_err());
        assert!(validate_password("Secret1234").is_err());
        assert!(validate_password("S@1a").is_err());
    }

    #[test]
    fn otp_codes() {
        assert!(validate_otp_code("123456").is_ok());
        assert!(validate_otp_code("12345").is_err());
        assert!(validate_otp_code("12345a").is_err());
    }

    #[test]
    fn collect_errors_keeps_every_failure() {
        let result = collect_errors([
            Ok(()),
            Err("name is required".to_string()),
            Err("otp must be exactly 6 digits".to_string()),
        ]);

        assert_eq!(result.unwrap_err().len(), 2);
    }

    #[tokio::test]
    async fn extractor_accepts_valid_payload() {
        let req = json_request(r#"{"name":"Asha","phone_number":"9876543210"}"#);

        let ValidatedJson(sign_up) = ValidatedJson::<SignUp>::from_request(req, &())
            .await
            .unwrap();
        assert_eq!(sign_up.name, "Asha");
    }

    #[tokio::test]
    async fn extractor_reports_field_errors() {
        let req = json_request(r#"{"name":"","phone_number":"12"}"#);

        match ValidatedJson::<SignUp>::from_request(req, &()).await {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn extractor_rejects_malformed_json() {
        let req = json_request(r#"{"name": "Asha""#);

        let result = ValidatedJson::<SignUp>::from_request(req, &()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
