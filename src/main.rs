use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use placementsync_api::{
    build_router,
    config::Config,
    db,
    services::{
        contacts::{ContactStore, PgContactStore},
        dispatcher::{Forwarder, HttpForwarder, NotificationDispatcher},
        submission::FormRegistry,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let contacts: Arc<dyn ContactStore> = Arc::new(PgContactStore::new(pool));

    let dispatcher = Arc::new(NotificationDispatcher::new(config.n8n_webhook_url.clone()));
    if config.n8n_webhook_url.is_none() {
        info!("N8N_WEBHOOK_URL not set — notify-n8n will answer with a configuration error");
    }

    let forwarder: Arc<dyn Forwarder> = match &config.notify_function_url {
        Some(url) => {
            info!("Forwarding submissions to notify function at {}", url);
            Arc::new(HttpForwarder::new(url.clone()))
        }
        None => dispatcher.clone(),
    };

    let state = AppState {
        config: config.clone(),
        contacts,
        dispatcher,
        forwarder,
        forms: Arc::new(FormRegistry::default()),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("PlacementSync API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
