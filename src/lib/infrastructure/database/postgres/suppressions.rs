//! Postgres implementation of the SuppressionRepository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, FromRow};

use crate::{
    domain::communication::suppressions::{SuppressionEntry, SuppressionError, SuppressionRepository},
    infrastructure::database::postgres::PostgresDatabase,
};

#[derive(FromRow)]
struct SuppressionRecord {
    email: String,
    reason: String,
    source_event: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SuppressionRecord> for SuppressionEntry {
    type Error = SuppressionError;

    fn try_from(record: SuppressionRecord) -> Result<Self, Self::Error> {
        Ok(SuppressionEntry {
            email: record.email,
            reason: record.reason.parse().map_err(SuppressionError::StoreError)?,
            created_at: record.created_at,
            source_event: serde_json::from_str(&record.source_event)?,
        })
    }
}

#[async_trait]
impl SuppressionRepository for PostgresDatabase {
    #[mutants::skip]
    async fn get_entry(&self, email: &str) -> Result<Option<SuppressionEntry>, SuppressionError> {
        query_as::<_, SuppressionRecord>(
            r#"
            SELECT email, reason, source_event, created_at
            FROM email_suppressions
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(SuppressionEntry::try_from)
        .transpose()
    }

    #[mutants::skip]
    async fn put_entry(&self, entry: &SuppressionEntry) -> Result<(), SuppressionError> {
        query(
            r#"
            INSERT INTO email_suppressions (email, reason, source_event, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET reason = EXCLUDED.reason,
                source_event = EXCLUDED.source_event,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&entry.email)
        .bind(entry.reason.to_string())
        .bind(serde_json::to_string(&entry.source_event)?)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[mutants::skip]
    async fn delete_entry(&self, email: &str) -> Result<bool, SuppressionError> {
        let result = query("DELETE FROM email_suppressions WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[mutants::skip]
    async fn list_entries(&self) -> Result<Vec<SuppressionEntry>, SuppressionError> {
        query_as::<_, SuppressionRecord>(
            r#"
            SELECT email, reason, source_event, created_at
            FROM email_suppressions
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(SuppressionEntry::try_from)
        .collect()
    }

    #[mutants::skip]
    async fn get_soft_bounces(&self, email: &str) -> Result<u32, SuppressionError> {
        let count: Option<i32> =
            sqlx::query_scalar("SELECT count FROM email_soft_bounces WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(count.map(|count| count.max(0) as u32).unwrap_or_default())
    }

    #[mutants::skip]
    async fn put_soft_bounces(&self, email: &str, count: u32) -> Result<(), SuppressionError> {
        query(
            r#"
            INSERT INTO email_soft_bounces (email, count, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (email) DO UPDATE
            SET count = EXCLUDED.count, updated_at = NOW()
            "#,
        )
        .bind(email)
        .bind(i32::try_from(count).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[mutants::skip]
    async fn delete_soft_bounces(&self, email: &str) -> Result<(), SuppressionError> {
        query("DELETE FROM email_soft_bounces WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
