//! Common library for the dairy farm platform
//!
//! This crate provides the infrastructure shared by the authentication and
//! payment services: database connectivity and migrations, the Redis pool,
//! token signing, the error kinds and response envelope every endpoint
//! speaks, request validation, and the notification outbox.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
pub mod jwt;
pub mod models;
pub mod notification;
pub mod response;
pub mod validation;

pub use error::{AppError, AppResult};
pub use response::ApiResponse;
