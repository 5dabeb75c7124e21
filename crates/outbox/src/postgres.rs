use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{BookingStatus, MessageId, SagaId};

use crate::{
    Channel, OutboxError, OutboxMessage, OutboxStatus, Result, SagaStatus, Version,
    repository::{OutboxRepository, validate_status_transition},
};

/// PostgreSQL-backed outbox repository.
///
/// Optimistic concurrency is enforced with a conditional
/// `UPDATE ... WHERE id = $1 AND version = $2`; zero affected rows means the
/// version moved and the caller gets a [`OutboxError::VersionConflict`].
#[derive(Clone)]
pub struct PostgresOutboxRepository {
    pool: PgPool,
}

impl PostgresOutboxRepository {
    /// Creates a new PostgreSQL outbox repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    fn row_to_message(row: PgRow) -> Result<OutboxMessage> {
        let channel_str: String = row.try_get("channel")?;
        let saga_status_str: String = row.try_get("saga_status")?;
        let outbox_status_str: String = row.try_get("outbox_status")?;
        let booking_status_str: String = row.try_get("booking_status")?;

        let decode = |field: &str| {
            OutboxError::Database(sqlx::Error::Decode(
                format!("unrecognized {field} value").into(),
            ))
        };

        Ok(OutboxMessage {
            id: MessageId::from_uuid(row.try_get::<Uuid, _>("id")?),
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            saga_type: row.try_get("saga_type")?,
            channel: Channel::parse(&channel_str).ok_or_else(|| decode("channel"))?,
            payload: row.try_get("payload")?,
            saga_status: SagaStatus::parse(&saga_status_str)
                .ok_or_else(|| decode("saga_status"))?,
            outbox_status: OutboxStatus::parse(&outbox_status_str)
                .ok_or_else(|| decode("outbox_status"))?,
            booking_status: BookingStatus::parse(&booking_status_str)
                .ok_or_else(|| decode("booking_status"))?,
            created_at: row.try_get("created_at")?,
            processed_at: row.try_get::<Option<DateTime<Utc>>, _>("processed_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn status_names(saga_statuses: &[SagaStatus]) -> Vec<String> {
        saga_statuses.iter().map(|s| s.as_str().to_string()).collect()
    }

    async fn insert(&self, mut message: OutboxMessage) -> Result<OutboxMessage> {
        message.version = Version::first();

        sqlx::query(
            r#"
            INSERT INTO outbox_messages
                (id, saga_id, saga_type, channel, payload, saga_status,
                 outbox_status, booking_status, created_at, processed_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(message.saga_id.as_uuid())
        .bind(&message.saga_type)
        .bind(message.channel.as_str())
        .bind(&message.payload)
        .bind(message.saga_status.as_str())
        .bind(message.outbox_status.as_str())
        .bind(message.booking_status.as_str())
        .bind(message.created_at)
        .bind(message.processed_at)
        .bind(message.version.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // A duplicate id means another writer stored this row first.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("outbox_messages_pkey")
            {
                return OutboxError::VersionConflict {
                    message_id: message.id,
                    expected: Version::initial(),
                    actual: Version::first(),
                };
            }
            OutboxError::Database(e)
        })?;

        Ok(message)
    }

    async fn update(&self, mut message: OutboxMessage) -> Result<OutboxMessage> {
        let stored = self
            .get(message.id)
            .await?
            .ok_or(OutboxError::MessageNotFound(message.id))?;

        if stored.version != message.version {
            return Err(OutboxError::VersionConflict {
                message_id: message.id,
                expected: message.version,
                actual: stored.version,
            });
        }
        validate_status_transition(&stored, &message)?;

        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET payload = $3,
                saga_status = $4,
                outbox_status = $5,
                booking_status = $6,
                processed_at = $7,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(message.version.as_i64())
        .bind(&message.payload)
        .bind(message.saga_status.as_str())
        .bind(message.outbox_status.as_str())
        .bind(message.booking_status.as_str())
        .bind(message.processed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // The version moved between our read and the conditional update.
            let actual = self
                .get(message.id)
                .await?
                .map(|m| m.version)
                .unwrap_or(Version::initial());
            return Err(OutboxError::VersionConflict {
                message_id: message.id,
                expected: message.version,
                actual,
            });
        }

        message.version = message.version.next();
        Ok(message)
    }
}

#[async_trait]
impl OutboxRepository for PostgresOutboxRepository {
    async fn save(&self, message: OutboxMessage) -> Result<OutboxMessage> {
        if message.version == Version::initial() {
            self.insert(message).await
        } else {
            self.update(message).await
        }
    }

    async fn get(&self, id: MessageId) -> Result<Option<OutboxMessage>> {
        let row = sqlx::query(
            r#"
            SELECT id, saga_id, saga_type, channel, payload, saga_status,
                   outbox_status, booking_status, created_at, processed_at, version
            FROM outbox_messages
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_message).transpose()
    }

    async fn find_by_saga(
        &self,
        channel: Channel,
        saga_type: &str,
        saga_id: SagaId,
        saga_statuses: &[SagaStatus],
    ) -> Result<Option<OutboxMessage>> {
        let row = sqlx::query(
            r#"
            SELECT id, saga_id, saga_type, channel, payload, saga_status,
                   outbox_status, booking_status, created_at, processed_at, version
            FROM outbox_messages
            WHERE channel = $1 AND saga_type = $2 AND saga_id = $3
              AND saga_status = ANY($4)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(channel.as_str())
        .bind(saga_type)
        .bind(saga_id.as_uuid())
        .bind(Self::status_names(saga_statuses))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_message).transpose()
    }

    async fn find_by_status(
        &self,
        channel: Channel,
        saga_type: &str,
        outbox_status: OutboxStatus,
        saga_statuses: &[SagaStatus],
    ) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, saga_id, saga_type, channel, payload, saga_status,
                   outbox_status, booking_status, created_at, processed_at, version
            FROM outbox_messages
            WHERE channel = $1 AND saga_type = $2 AND outbox_status = $3
              AND saga_status = ANY($4)
            ORDER BY created_at ASC
            "#,
        )
        .bind(channel.as_str())
        .bind(saga_type)
        .bind(outbox_status.as_str())
        .bind(Self::status_names(saga_statuses))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn delete_completed(
        &self,
        channel: Channel,
        saga_type: &str,
        outbox_status: OutboxStatus,
        saga_statuses: &[SagaStatus],
    ) -> Result<u64> {
        // A row still queued for send is never deleted.
        if outbox_status == OutboxStatus::Started {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM outbox_messages
            WHERE channel = $1 AND saga_type = $2 AND outbox_status = $3
              AND saga_status = ANY($4)
            "#,
        )
        .bind(channel.as_str())
        .bind(saga_type)
        .bind(outbox_status.as_str())
        .bind(Self::status_names(saga_statuses))
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            metrics::counter!("outbox_rows_deleted").increment(deleted);
        }
        Ok(deleted)
    }
}
