pub mod auth;
pub mod contacts;
pub mod dispatcher;
pub mod metrics;
pub mod session_guard;
pub mod submission;

#[cfg(test)]
pub mod fakes;
