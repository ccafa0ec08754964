//! Authentication service models

pub mod otp;
pub mod user;

pub use otp::Otp;
pub use user::{AuthProvider, NewUser, User};
