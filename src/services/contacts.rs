use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence seam for contact records, keyed by email.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Insert-or-update on the `email` conflict target.
    async fn upsert_contact(&self, email: &str, whatsapp: &str) -> Result<(), StoreError>;

    /// `Ok(None)` when there is no row or the row has no number yet.
    async fn find_whatsapp(&self, email: &str) -> Result<Option<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub struct PgContactStore {
    pool: PgPool,
}

impl PgContactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn upsert_contact(&self, email: &str, whatsapp: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (email, whatsapp)
             VALUES ($1, $2)
             ON CONFLICT (email) DO UPDATE
             SET whatsapp = EXCLUDED.whatsapp, updated_at = NOW()",
        )
        .bind(email)
        .bind(whatsapp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_whatsapp(&self, email: &str) -> Result<Option<String>, StoreError> {
        let row: Option<Option<String>> =
            sqlx::query_scalar("SELECT whatsapp FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.flatten())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
