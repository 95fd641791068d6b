use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub auth_jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    /// Destination of the notify-n8n dispatcher. Absence is reported per request, not at startup.
    pub n8n_webhook_url: Option<String>,
    /// When set, submissions forward to a separately deployed dispatcher instead of the in-process one.
    pub notify_function_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            auth_jwt_secret: required("AUTH_JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            n8n_webhook_url: env::var("N8N_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
            notify_function_url: env::var("NOTIFY_FUNCTION_URL").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
