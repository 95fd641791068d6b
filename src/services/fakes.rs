//! In-memory stand-ins for the store and forwarder, shared by unit tests.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use axum::{http::StatusCode, routing::post, Json, Router};
use tokio::net::TcpListener;

use crate::{
    models::contact::NotifyPayload,
    services::{
        contacts::{ContactStore, StoreError},
        dispatcher::{DispatchError, Forwarder},
    },
};

pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub struct MemoryContactStore {
    pub rows: Mutex<HashMap<String, Option<String>>>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub panic_on_write: AtomicBool,
    pub calls: CallLog,
}

impl MemoryContactStore {
    pub fn with_log(calls: CallLog) -> Self {
        Self {
            calls,
            ..Default::default()
        }
    }

    pub fn stored(&self, email: &str) -> Option<String> {
        self.rows.lock().unwrap().get(email).cloned().flatten()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn upsert_contact(&self, email: &str, whatsapp: &str) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(format!("upsert:{email}"));
        if self.panic_on_write.load(Ordering::SeqCst) {
            panic!("store exploded");
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write refused".into()));
        }
        self.rows
            .lock()
            .unwrap()
            .insert(email.to_string(), Some(whatsapp.to_string()));
        Ok(())
    }

    async fn find_whatsapp(&self, email: &str) -> Result<Option<String>, StoreError> {
        self.calls.lock().unwrap().push(format!("select:{email}"));
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read refused".into()));
        }
        Ok(self.stored(email))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("down".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingForwarder {
    pub sent: Mutex<Vec<NotifyPayload>>,
    pub fail: AtomicBool,
    pub calls: CallLog,
}

impl RecordingForwarder {
    pub fn with_log(calls: CallLog) -> Self {
        Self {
            calls,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, payload: &NotifyPayload) -> Result<(), DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("forward:{}", payload.email));
        self.sent.lock().unwrap().push(payload.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::UpstreamRejected(503));
        }
        Ok(())
    }
}

pub type Received = Arc<Mutex<Vec<NotifyPayload>>>;

/// Webhook on an ephemeral port that records payloads and answers with `status`.
pub async fn spawn_webhook(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let app = Router::new().route(
        "/hook",
        post(move |Json(payload): Json<NotifyPayload>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(payload);
                status
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), received)
}

/// URL of a port nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/hook")
}
