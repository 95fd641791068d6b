use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use futures_util::FutureExt;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::{
    models::contact::NotifyPayload,
    services::{contacts::ContactStore, dispatcher::Forwarder, metrics},
};

lazy_static! {
    // Optional leading '+', then 10 to 15 digits, spaces or hyphens.
    static ref WHATSAPP_RE: Regex = Regex::new(r"^\+?[0-9\s-]{10,15}$").unwrap();
}

pub const SAVE_LABEL: &str = "Save WhatsApp Number";
pub const SAVING_LABEL: &str = "Saving...";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your WhatsApp number")]
    Empty,
    #[error("Please enter a valid WhatsApp number")]
    Malformed,
}

/// A number that passed validation. Stored exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppNumber(String);

impl WhatsAppNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

pub fn validate_whatsapp(input: &str) -> Result<WhatsAppNumber, ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    if !WHATSAPP_RE.is_match(input) {
        return Err(ValidationError::Malformed);
    }
    Ok(WhatsAppNumber(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Invalid(ValidationError),
    /// Another submission from the same form is still in flight.
    Busy,
    PersistFailed,
    /// Saved, but the automation side was not told.
    ForwardFailed,
    Success,
    Unexpected,
}

impl SubmissionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Invalid(_) => "invalid",
            SubmissionOutcome::Busy => "busy",
            SubmissionOutcome::PersistFailed => "persist_failed",
            SubmissionOutcome::ForwardFailed => "forward_failed",
            SubmissionOutcome::Success => "success",
            SubmissionOutcome::Unexpected => "unexpected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Transient user-facing notification for a submission outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub outcome: &'static str,
    pub level: NoticeLevel,
    pub message: String,
}

impl From<&SubmissionOutcome> for Notice {
    fn from(outcome: &SubmissionOutcome) -> Self {
        let (level, message) = match outcome {
            SubmissionOutcome::Invalid(e) => (NoticeLevel::Error, e.to_string()),
            SubmissionOutcome::Busy => (
                NoticeLevel::Warning,
                "A save is already in progress".to_string(),
            ),
            SubmissionOutcome::PersistFailed => (
                NoticeLevel::Error,
                "Failed to save WhatsApp number".to_string(),
            ),
            SubmissionOutcome::ForwardFailed => (
                NoticeLevel::Warning,
                "Saved locally, but failed to sync with automation".to_string(),
            ),
            SubmissionOutcome::Success => (
                NoticeLevel::Success,
                "WhatsApp number saved successfully!".to_string(),
            ),
            SubmissionOutcome::Unexpected => (
                NoticeLevel::Error,
                "An unexpected error occurred".to_string(),
            ),
        };
        Notice {
            outcome: outcome.label(),
            level,
            message,
        }
    }
}

/// Holds the busy flag for as long as it lives.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// WhatsApp number form bound to one signed-in identity.
pub struct ContactForm {
    email: String,
    busy: AtomicBool,
}

impl ContactForm {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn action_label(&self) -> &'static str {
        if self.is_busy() {
            SAVING_LABEL
        } else {
            SAVE_LABEL
        }
    }

    /// Validate, then persist, then forward. Never panics out to the caller.
    pub async fn submit(
        &self,
        input: &str,
        store: &dyn ContactStore,
        forwarder: &dyn Forwarder,
    ) -> SubmissionOutcome {
        let outcome = self.run(input, store, forwarder).await;
        metrics::record_submission(outcome.label());
        outcome
    }

    async fn run(
        &self,
        input: &str,
        store: &dyn ContactStore,
        forwarder: &dyn Forwarder,
    ) -> SubmissionOutcome {
        let whatsapp = match validate_whatsapp(input) {
            Ok(number) => number,
            Err(e) => return SubmissionOutcome::Invalid(e),
        };

        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return SubmissionOutcome::Busy;
        };

        let sequence = persist_then_forward(&self.email, whatsapp, store, forwarder);
        match AssertUnwindSafe(sequence).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!("Unexpected error while saving contact for {}", self.email);
                SubmissionOutcome::Unexpected
            }
        }
    }
}

async fn persist_then_forward(
    email: &str,
    whatsapp: WhatsAppNumber,
    store: &dyn ContactStore,
    forwarder: &dyn Forwarder,
) -> SubmissionOutcome {
    if let Err(e) = store.upsert_contact(email, whatsapp.as_str()).await {
        tracing::error!("Database error: {e}");
        return SubmissionOutcome::PersistFailed;
    }

    let payload = NotifyPayload {
        email: email.to_string(),
        whatsapp: whatsapp.into_inner(),
    };
    if let Err(e) = forwarder.forward(&payload).await {
        tracing::warn!("Forwarding error for {email}: {e}");
        return SubmissionOutcome::ForwardFailed;
    }

    SubmissionOutcome::Success
}

/// One form per identity, so concurrent requests from the same user share a busy flag.
///
/// Only forms some request still holds are kept; idle ones are evicted on the next lookup.
#[derive(Default)]
pub struct FormRegistry {
    forms: Mutex<HashMap<String, Arc<ContactForm>>>,
}

impl FormRegistry {
    pub fn form_for(&self, email: &str) -> Arc<ContactForm> {
        let mut forms = self.forms.lock().unwrap_or_else(|e| e.into_inner());
        forms.retain(|_, form| Arc::strong_count(form) > 1 || form.is_busy());
        forms
            .entry(email.to_string())
            .or_insert_with(|| Arc::new(ContactForm::new(email)))
            .clone()
    }
}
