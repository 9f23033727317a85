//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use postwall_core::error::DomainError;
use postwall_core::repository::{EventRepository, NO_VERSION, StoredEvent, assign_versions};

const UNIQUE_VIOLATION: &str = "23505";

/// Row shape of the `event_store` table.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_id: Uuid,
    aggregate_type: String,
    event_type: String,
    payload: serde_json::Value,
    version: i64,
    correlation_id: Uuid,
    causation_id: Uuid,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_id: row.aggregate_id,
            aggregate_type: row.aggregate_type,
            event_type: row.event_type,
            payload: row.payload,
            version: row.version,
            correlation_id: row.correlation_id,
            causation_id: row.causation_id,
            occurred_at: row.occurred_at,
        }
    }
}

fn infrastructure(err: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// PostgreSQL-backed event repository.
///
/// Appends for one aggregate are serialized with a transaction-scoped
/// advisory lock; the `(aggregate_id, version)` unique constraint backs up
/// the version check.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    #[instrument(skip(self))]
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT event_id, aggregate_id, aggregate_type, event_type, payload,
                   version, correlation_id, causation_id, occurred_at
            FROM event_store
            WHERE aggregate_id = $1
            ORDER BY version ASC
            ",
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;

        debug!(event_count = rows.len(), "loaded event stream");
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    #[instrument(skip(self, events), fields(event_count = events.len()))]
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(|e| infrastructure(&e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(aggregate_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| infrastructure(&e))?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM event_store WHERE aggregate_id = $1")
                .bind(aggregate_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| infrastructure(&e))?;
        let actual = current.unwrap_or(NO_VERSION);

        if actual != expected_version {
            warn!(expected_version, actual, "stale expected version");
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let committed = assign_versions(expected_version, events);
        for event in &committed {
            sqlx::query(
                r"
                INSERT INTO event_store (
                    event_id, aggregate_id, aggregate_type, event_type, payload,
                    version, correlation_id, causation_id, occurred_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(event.event_id)
            .bind(aggregate_id)
            .bind(&event.aggregate_type)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.version)
            .bind(event.correlation_id)
            .bind(event.causation_id)
            .bind(event.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                    DomainError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual: event.version,
                    }
                }
                _ => infrastructure(&e),
            })?;
        }

        tx.commit().await.map_err(|e| infrastructure(&e))?;
        Ok(committed)
    }

    #[instrument(skip(self))]
    async fn list_aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        sqlx::query_scalar(
            r"
            SELECT aggregate_id
            FROM event_store
            GROUP BY aggregate_id
            ORDER BY MIN(position) ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))
    }
}
