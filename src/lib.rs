pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use middleware::auth::JwtSecret;
use services::{
    contacts::ContactStore,
    dispatcher::{Forwarder, NotificationDispatcher},
    submission::FormRegistry,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub contacts: Arc<dyn ContactStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub forwarder: Arc<dyn Forwarder>,
    pub forms: Arc<FormRegistry>,
}

pub fn build_router(state: AppState) -> Router {
    // The dashboard API only answers the app's own origin; localhost is always allowed.
    let base = state.config.app_base_url.clone();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            match origin.to_str() {
                Ok(o) => {
                    o == base
                        || o.starts_with("http://localhost")
                        || o.starts_with("http://127.0.0.1")
                }
                Err(_) => false,
            }
        }));

    let api = Router::new()
        .route("/api/landing", get(routes::views::landing))
        .route("/api/dashboard", get(routes::views::dashboard))
        .route("/api/contact", put(routes::contact::submit_contact))
        .layer(axum::Extension(JwtSecret(state.config.auth_jwt_secret.clone())))
        .layer(cors);

    // The dispatcher sets its own permissive CORS headers on every response.
    let functions = Router::new().route(
        "/functions/v1/notify-n8n",
        post(routes::notify::notify_n8n).options(routes::notify::preflight),
    );

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .merge(api)
        .merge(functions)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::services::{
        auth::issue_session_token,
        fakes::{closed_port_url, spawn_webhook, MemoryContactStore, RecordingForwarder},
    };

    const SECRET: &str = "router-secret";
    const EMAIL: &str = "a@vitbhopal.ac.in";

    struct Harness {
        store: Arc<MemoryContactStore>,
        forwarder: Arc<RecordingForwarder>,
        app: Router,
    }

    fn harness(webhook_url: Option<String>) -> Harness {
        let store = Arc::new(MemoryContactStore::default());
        let forwarder = Arc::new(RecordingForwarder::default());
        let config = Config {
            database_url: "postgres://unused".into(),
            auth_jwt_secret: SECRET.into(),
            host: "127.0.0.1".into(),
            port: 0,
            app_base_url: "http://localhost".into(),
            n8n_webhook_url: webhook_url.clone(),
            notify_function_url: None,
        };
        let state = AppState {
            config: Arc::new(config),
            contacts: store.clone(),
            dispatcher: Arc::new(NotificationDispatcher::new(webhook_url)),
            forwarder: forwarder.clone(),
            forms: Arc::new(FormRegistry::default()),
        };
        Harness {
            store,
            forwarder,
            app: build_router(state),
        }
    }

    fn bearer() -> String {
        let token = issue_session_token(Uuid::new_v4(), EMAIL, SECRET, 300).unwrap();
        format!("Bearer {token}")
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn put_contact(whatsapp: &str) -> Request<Body> {
        Request::put("/api/contact")
            .header("Authorization", bearer())
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "whatsapp": whatsapp }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_short_circuits_with_cors() {
        let h = harness(None);
        let request = Request::options("/functions/v1/notify-n8n")
            .body(Body::from("garbage"))
            .unwrap();

        let response = h.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "authorization, x-client-info, apikey, content-type"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_notify_without_webhook_is_config_error() {
        let h = harness(None);
        let request = Request::post("/functions/v1/notify-n8n")
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "email": EMAIL, "whatsapp": "9876543210" }).to_string()))
            .unwrap();

        let (status, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Webhook URL not configured" }));
    }

    fn post_notify() -> Request<Body> {
        Request::post("/functions/v1/notify-n8n")
            .header("Content-Type", "application/json")
            .body(Body::from(
                json!({ "email": EMAIL, "whatsapp": "+91 98765 43210" }).to_string(),
            ))
            .unwrap()
    }

    async fn send_with_headers(app: &Router, request: Request<Body>) -> (StatusCode, String, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let origin = response.headers()["access-control-allow-origin"]
            .to_str()
            .unwrap()
            .to_string();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, origin, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_notify_relays_and_reports_success() {
        let (url, received) = spawn_webhook(StatusCode::OK).await;
        let h = harness(Some(url));

        let (status, origin, body) = send_with_headers(&h.app, post_notify()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(origin, "*");
        assert_eq!(
            body,
            json!({ "success": true, "message": "Data sent to n8n successfully" })
        );
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notify_hides_upstream_status() {
        let (url, received) = spawn_webhook(StatusCode::SERVICE_UNAVAILABLE).await;
        let h = harness(Some(url));

        let (status, origin, body) = send_with_headers(&h.app, post_notify()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(origin, "*");
        assert_eq!(body, json!({ "error": "Failed to send to n8n" }));
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notify_unreachable_webhook_is_500_with_message() {
        let h = harness(Some(closed_port_url().await));

        let (status, origin, body) = send_with_headers(&h.app, post_notify()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(origin, "*");
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("error sending request"), "{message}");
    }

    #[tokio::test]
    async fn test_end_to_end_valid_submission() {
        let h = harness(None);

        let (status, body) = send(&h.app, put_contact("+91 98765 43210")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "outcome": "success",
                "level": "success",
                "message": "WhatsApp number saved successfully!"
            })
        );
        assert_eq!(h.store.stored(EMAIL).as_deref(), Some("+91 98765 43210"));
        assert_eq!(h.forwarder.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_short_number_is_rejected() {
        let h = harness(None);

        let (status, body) = send(&h.app, put_contact("123")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Please enter a valid WhatsApp number");
        assert!(h.store.calls.lock().unwrap().is_empty());
        assert!(h.forwarder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_submission_is_a_warning() {
        let h = harness(None);
        h.forwarder.fail.store(true, Ordering::SeqCst);

        let (status, body) = send(&h.app, put_contact("9876543210")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["level"], "warning");
        assert_eq!(h.store.stored(EMAIL).as_deref(), Some("9876543210"));
    }

    #[tokio::test]
    async fn test_contact_requires_session() {
        let h = harness(None);
        let request = Request::put("/api/contact")
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "whatsapp": "9876543210" }).to_string()))
            .unwrap();

        let response = h.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_dashboard_view_follows_session() {
        let h = harness(None);
        h.store
            .rows
            .lock()
            .unwrap()
            .insert(EMAIL.into(), Some("9876543210".into()));

        let (_, anonymous) = send(&h.app, Request::get("/api/dashboard").body(Body::empty()).unwrap()).await;
        assert_eq!(anonymous, json!({ "redirect": "/" }));

        let request = Request::get("/api/dashboard")
            .header("Authorization", bearer())
            .body(Body::empty())
            .unwrap();
        let (_, signed_in) = send(&h.app, request).await;
        assert_eq!(
            signed_in,
            json!({ "redirect": null, "email": EMAIL, "whatsapp": "9876543210" })
        );
    }

    #[tokio::test]
    async fn test_landing_view_redirects_signed_in_visitors() {
        let h = harness(None);

        let (_, anonymous) = send(&h.app, Request::get("/api/landing").body(Body::empty()).unwrap()).await;
        assert_eq!(anonymous, json!({ "redirect": null }));

        let request = Request::get("/api/landing")
            .header("Authorization", bearer())
            .body(Body::empty())
            .unwrap();
        let (_, signed_in) = send(&h.app, request).await;
        assert_eq!(signed_in, json!({ "redirect": "/dashboard" }));
    }

    #[tokio::test]
    async fn test_health_reports_store_state() {
        let h = harness(None);
        let (status, _) = send(&h.app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        h.store.fail_reads.store(true, Ordering::SeqCst);
        let (status, body) = send(&h.app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
    }
}
