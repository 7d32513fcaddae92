use crate::{
    error::{ApiError, Result},
    models::{RecommendationRow, StoredRecommendation},
};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction,
};
use std::path::Path;
use tracing::debug;

const RECOMMENDATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS recommendations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_key TEXT NOT NULL,
    model TEXT NOT NULL,
    items TEXT NOT NULL,
    generated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(target_key, model)
)
"#;

const UPSERT_SQL: &str = r#"
INSERT INTO recommendations (target_key, model, items, generated_at)
VALUES (?, ?, ?, ?)
ON CONFLICT(target_key, model)
DO UPDATE SET
    items = excluded.items,
    generated_at = excluded.generated_at
"#;

#[derive(FromRow)]
struct RecommendationRecord {
    model: String,
    items: String,
    generated_at: DateTime<Utc>,
}

/// Recommendation lists keyed by `(target_key, model)`.
#[derive(Debug, Clone)]
pub struct RecommendationStore {
    pool: SqlitePool,
}

impl RecommendationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens an existing SQLite database; never creates one.
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(ApiError::MissingPrerequisite(format!(
                "Database not found. Run the ingestion step to build it before generating recommendations: {}",
                db_path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(false)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the recommendations table if it is absent.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(RECOMMENDATIONS_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Inserts or replaces `rows` in a transaction of their own.
    pub async fn upsert(
        &self,
        rows: &[RecommendationRow],
        generated_at: DateTime<Utc>,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.begin().await?;
        let written = Self::upsert_in(&mut tx, rows, generated_at).await?;
        tx.commit().await?;
        Ok(written)
    }

    /// Inserts or replaces `rows` on the caller's connection or transaction.
    ///
    /// An existing `(target_key, model)` keeps its row but takes the new item
    /// list and timestamp. Repeated pairs within `rows` resolve to the last one.
    pub async fn upsert_in(
        conn: &mut SqliteConnection,
        rows: &[RecommendationRow],
        generated_at: DateTime<Utc>,
    ) -> Result<usize> {
        for row in rows {
            sqlx::query(UPSERT_SQL)
                .bind(&row.target_key)
                .bind(&row.model)
                .bind(serialize_items(&row.items)?)
                .bind(generated_at)
                .execute(&mut *conn)
                .await?;
        }
        debug!("Upserted {} recommendation rows", rows.len());
        Ok(rows.len())
    }

    /// Stored lists for `target_key`, optionally for one model, ordered by model.
    pub async fn find(
        &self,
        target_key: &str,
        model: Option<&str>,
    ) -> Result<Vec<StoredRecommendation>> {
        let records = match model {
            Some(model) => {
                sqlx::query_as::<_, RecommendationRecord>(
                    "SELECT model, items, generated_at FROM recommendations \
                     WHERE target_key = ? AND model = ? ORDER BY model",
                )
                .bind(target_key)
                .bind(model)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RecommendationRecord>(
                    "SELECT model, items, generated_at FROM recommendations \
                     WHERE target_key = ? ORDER BY model",
                )
                .bind(target_key)
                .fetch_all(&self.pool)
                .await?
            }
        };

        records
            .into_iter()
            .map(|record| {
                Ok(StoredRecommendation {
                    items: parse_items(&record.items)?,
                    model: record.model,
                    generated_at: record.generated_at,
                })
            })
            .collect()
    }
}

pub fn serialize_items(items: &[i64]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

/// Parses a stored item list. Anything but a JSON array of ids is corruption.
pub fn parse_items(raw: &str) -> Result<Vec<i64>> {
    serde_json::from_str(raw).map_err(|e| ApiError::CorruptedStorage(e.to_string()))
}
