pub mod contact;
pub mod health;
pub mod metrics;
pub mod notify;
pub mod views;
