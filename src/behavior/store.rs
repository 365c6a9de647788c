//! Behavior event persistence
//!
//! [`BehaviorStore`] is the write/read capability the recorder and the scoring
//! engine share. The Postgres implementation keeps increments atomic per dedup
//! key: concurrent repeats run a compare-and-retry loop under row-level
//! locking (`SELECT ... FOR UPDATE`), never a naive read-then-write.

use crate::behavior::event::{BehaviorEvent, BehaviorPayload, BehaviorType, WeightCurve};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

/// Fields of a behavior row about to be written.
#[derive(Debug, Clone)]
pub struct NewBehaviorEvent {
    pub user_id: i64,
    pub product_id: Option<i64>,
    pub behavior_type: BehaviorType,
    pub weight: f64,
    pub payload: Option<BehaviorPayload>,
}

/// Storage capability for behavior rows and the like table.
#[async_trait]
pub trait BehaviorStore: Send + Sync {
    /// Insert the row if its dedup key is absent, otherwise atomically
    /// increment its counter, recompute the weight along `curve`, and
    /// overwrite the payload when one is supplied. Returns the
    /// post-write row.
    async fn upsert_event(
        &self,
        new: NewBehaviorEvent,
        curve: WeightCurve,
    ) -> Result<BehaviorEvent>;

    /// Append a new row unconditionally (review and non-duplicate search
    /// events).
    async fn append_event(&self, new: NewBehaviorEvent) -> Result<BehaviorEvent>;

    /// Fold a repeat into an existing row by id: increment its counter and
    /// overwrite weight and payload (search near-duplicates).
    async fn fold_event(
        &self,
        id: Uuid,
        weight: f64,
        payload: Option<BehaviorPayload>,
    ) -> Result<()>;

    /// Delete the row for an exact (user, product, type) key. Returns whether
    /// a row existed.
    async fn delete_event(
        &self,
        user_id: i64,
        product_id: i64,
        behavior_type: BehaviorType,
    ) -> Result<bool>;

    /// The user's most recent rows, newest first.
    async fn recent_events(&self, user_id: i64, limit: usize) -> Result<Vec<BehaviorEvent>>;

    /// The user's most recent rows of one type, newest first.
    async fn recent_events_of_type(
        &self,
        user_id: i64,
        behavior_type: BehaviorType,
        limit: usize,
    ) -> Result<Vec<BehaviorEvent>>;

    /// Total behavior rows for the user (new-user detection).
    async fn count_events(&self, user_id: i64) -> Result<i64>;

    /// Create the like row if absent. Returns true when a row was created.
    async fn insert_like(&self, user_id: i64, product_id: i64) -> Result<bool>;

    /// Delete the like row if present. Returns true when a row was removed.
    async fn delete_like(&self, user_id: i64, product_id: i64) -> Result<bool>;
}

/// Postgres-backed behavior store.
#[derive(Clone)]
pub struct PgBehaviorStore {
    pool: PgPool,
}

impl PgBehaviorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    user_id: i64,
    product_id: Option<i64>,
    behavior_type: String,
    occurrence_count: i32,
    weight: f64,
    payload: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    /// Decode into the domain model. A malformed stored payload must not
    /// abort the caller: it is logged and treated as empty.
    fn into_event(self) -> Result<BehaviorEvent> {
        let behavior_type: BehaviorType = self
            .behavior_type
            .parse()
            .map_err(|_| Error::store(format!("corrupt behavior_type: {}", self.behavior_type)))?;

        let payload = match self.payload {
            Some(value) => match BehaviorPayload::decode(behavior_type, value) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(
                        event_id = %self.id,
                        user_id = self.user_id,
                        error = %e,
                        "dropping malformed stored payload"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(BehaviorEvent {
            id: self.id,
            user_id: self.user_id,
            product_id: self.product_id,
            behavior_type,
            occurrence_count: self.occurrence_count,
            weight: self.weight,
            payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn encode_payload(payload: &Option<BehaviorPayload>) -> Result<Option<serde_json::Value>> {
    payload
        .as_ref()
        .map(|p| {
            serde_json::to_value(p)
                .map_err(|e| Error::store(format!("payload serialization failed: {e}")))
        })
        .transpose()
}

const EVENT_COLUMNS: &str = "id, user_id, product_id, behavior_type, occurrence_count, \
     weight, payload, created_at, updated_at";

const UPSERT_MAX_ATTEMPTS: u32 = 3;

#[async_trait]
impl BehaviorStore for PgBehaviorStore {
    async fn upsert_event(
        &self,
        new: NewBehaviorEvent,
        curve: WeightCurve,
    ) -> Result<BehaviorEvent> {
        let payload_json = encode_payload(&new.payload)?;

        // Compare-and-retry: a concurrent insert on the same dedup key trips
        // the partial unique index, after which the locked-row path wins.
        let mut last_err = None;
        for _ in 0..UPSERT_MAX_ATTEMPTS {
            match self.try_upsert(&new, curve, payload_json.as_ref()).await {
                Ok(event) => return Ok(event),
                Err(e @ Error::ConstraintViolation { .. }) => {
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::store("upsert retries exhausted")))
    }

    async fn append_event(&self, new: NewBehaviorEvent) -> Result<BehaviorEvent> {
        let payload_json = encode_payload(&new.payload)?;

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            INSERT INTO behavior_events
                (id, user_id, product_id, behavior_type, occurrence_count, weight,
                 payload, created_at, updated_at)
            VALUES
                (gen_random_uuid(), $1, $2, $3, 1, $4, $5, NOW(), NOW())
            RETURNING {EVENT_COLUMNS}
            "#,
        ))
        .bind(new.user_id)
        .bind(new.product_id)
        .bind(new.behavior_type.as_str())
        .bind(new.weight)
        .bind(payload_json)
        .fetch_one(&self.pool)
        .await?;

        row.into_event()
    }

    async fn fold_event(
        &self,
        id: Uuid,
        weight: f64,
        payload: Option<BehaviorPayload>,
    ) -> Result<()> {
        let payload_json = encode_payload(&payload)?;

        sqlx::query(
            r#"
            UPDATE behavior_events SET
                occurrence_count = occurrence_count + 1,
                weight = $2,
                payload = COALESCE($3, payload),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(weight)
        .bind(payload_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_event(
        &self,
        user_id: i64,
        product_id: i64,
        behavior_type: BehaviorType,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM behavior_events
            WHERE user_id = $1 AND product_id = $2 AND behavior_type = $3
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(behavior_type.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn recent_events(&self, user_id: i64, limit: usize) -> Result<Vec<BehaviorEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM behavior_events
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    async fn recent_events_of_type(
        &self,
        user_id: i64,
        behavior_type: BehaviorType,
        limit: usize,
    ) -> Result<Vec<BehaviorEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM behavior_events
            WHERE user_id = $1 AND behavior_type = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        ))
        .bind(user_id)
        .bind(behavior_type.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    async fn count_events(&self, user_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM behavior_events WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn insert_like(&self, user_id: i64, product_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO product_likes (id, user_id, product_id, created_at)
            VALUES (gen_random_uuid(), $1, $2, NOW())
            ON CONFLICT (user_id, product_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_like(&self, user_id: i64, product_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM product_likes WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl PgBehaviorStore {
    async fn try_upsert(
        &self,
        new: &NewBehaviorEvent,
        curve: WeightCurve,
        payload_json: Option<&serde_json::Value>,
    ) -> Result<BehaviorEvent> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM behavior_events
            WHERE user_id = $1
              AND product_id IS NOT DISTINCT FROM $2
              AND behavior_type = $3
            FOR UPDATE
            "#,
        ))
        .bind(new.user_id)
        .bind(new.product_id)
        .bind(new.behavior_type.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let row = match existing {
            Some(row) => {
                let count = row.occurrence_count + 1;
                let weight = curve.weight_at(count);

                sqlx::query_as::<_, EventRow>(&format!(
                    r#"
                    UPDATE behavior_events SET
                        occurrence_count = $2,
                        weight = $3,
                        payload = COALESCE($4, payload),
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING {EVENT_COLUMNS}
                    "#,
                ))
                .bind(row.id)
                .bind(count)
                .bind(weight)
                .bind(payload_json)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, EventRow>(&format!(
                    r#"
                    INSERT INTO behavior_events
                        (id, user_id, product_id, behavior_type, occurrence_count,
                         weight, payload, created_at, updated_at)
                    VALUES
                        (gen_random_uuid(), $1, $2, $3, 1, $4, $5, NOW(), NOW())
                    RETURNING {EVENT_COLUMNS}
                    "#,
                ))
                .bind(new.user_id)
                .bind(new.product_id)
                .bind(new.behavior_type.as_str())
                .bind(new.weight)
                .bind(payload_json)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        row.into_event()
    }
}
