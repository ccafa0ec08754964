//! Plans, subscriptions and the payment ledger

pub mod customer;
pub mod payment;
pub mod plan;

pub use customer::Customer;
pub use payment::{
    NewPaymentHistory, PaymentHistoryEntry, SubscriptionUpdate, UserPayment, UserPaymentHistory,
};
pub use plan::Plan;
