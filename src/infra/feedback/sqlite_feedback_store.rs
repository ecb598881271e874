// SQLite-backed feedback store.
//
// Tables:
// - feedback: Accepted feedback entries, newest has the highest id

use crate::core::feedback::{Feedback, FeedbackError, FeedbackStore, NewFeedback};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

pub struct SqliteFeedbackStore {
    pool: Pool<Sqlite>,
}

impl SqliteFeedbackStore {
    /// Open (creating if needed) the database at `database_url` and migrate it.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure the file exists if it's a file path
        if !in_memory {
            let path_str = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            let path = Path::new(path_str);
            if !path.exists() {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::File::create(path)?;
            }
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        // Every connection to :memory: is its own database, so keep just one
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&conn_str)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), FeedbackError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                email TEXT,
                message TEXT NOT NULL,
                rating INTEGER,
                moderation_provider TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| FeedbackError::StorageError(e.to_string()))?;

        Ok(())
    }

    fn row_to_feedback(row: &SqliteRow) -> Feedback {
        let created_at_str: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Feedback {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            message: row.get("message"),
            rating: row.get::<Option<i64>, _>("rating").map(|r| r as u8),
            moderation_provider: row.get("moderation_provider"),
            created_at,
        }
    }
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn insert(
        &self,
        feedback: &NewFeedback,
        moderation_provider: &str,
    ) -> Result<Feedback, FeedbackError> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO feedback (name, email, message, rating, moderation_provider, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&feedback.name)
        .bind(&feedback.email)
        .bind(&feedback.message)
        .bind(feedback.rating.map(|r| r as i64))
        .bind(moderation_provider)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| FeedbackError::StorageError(e.to_string()))?;

        Ok(Feedback {
            id: result.last_insert_rowid(),
            name: feedback.name.clone(),
            email: feedback.email.clone(),
            message: feedback.message.clone(),
            rating: feedback.rating,
            moderation_provider: moderation_provider.to_string(),
            created_at,
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Feedback>, FeedbackError> {
        let row = sqlx::query("SELECT * FROM feedback WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FeedbackError::StorageError(e.to_string()))?;

        Ok(row.as_ref().map(Self::row_to_feedback))
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Feedback>, FeedbackError> {
        let rows = sqlx::query("SELECT * FROM feedback ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FeedbackError::StorageError(e.to_string()))?;

        Ok(rows.iter().map(Self::row_to_feedback).collect())
    }
}
