use crate::domain::events::DomainEvent;
use crate::ports::event_store::{EventStore as EventStoreTrait, Result};
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Row};
use uuid::Uuid;

/// Append events to the journal
///
/// Events from one operation are written in a single statement with UNNEST,
/// so a batch is recorded entirely or not at all.
pub(super) async fn insert_events<'e, E>(executor: E, events: &[DomainEvent]) -> Result<()>
where
    E: PgExecutor<'e>,
{
    if events.is_empty() {
        return Ok(());
    }

    let mut aggregate_ids = Vec::with_capacity(events.len());
    let mut aggregate_types = Vec::with_capacity(events.len());
    let mut event_types = Vec::with_capacity(events.len());
    let mut event_data_list = Vec::with_capacity(events.len());
    let mut occurred_at_list = Vec::with_capacity(events.len());

    for event in events {
        aggregate_ids.push(event.aggregate_id());
        aggregate_types.push(event.aggregate_type());
        event_types.push(event.event_type());
        event_data_list.push(serde_json::to_value(event)?);
        occurred_at_list.push(event.occurred_at());
    }

    sqlx::query(
        r#"
        INSERT INTO events (
            aggregate_id,
            aggregate_type,
            event_type,
            event_data,
            occurred_at
        )
        SELECT * FROM UNNEST($1::uuid[], $2::varchar[], $3::varchar[], $4::jsonb[], $5::timestamptz[])
        "#,
    )
    .bind(&aggregate_ids)
    .bind(&aggregate_types)
    .bind(&event_types)
    .bind(&event_data_list)
    .bind(&occurred_at_list)
    .execute(executor)
    .await?;

    Ok(())
}

/// PostgreSQL implementation of EventStore
///
/// Appends domain events to the `events` journal as JSONB.
/// The journal is an audit trail; current state lives in the circulation tables.
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Create a new EventStore with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    /// Append events to the journal
    async fn append(&self, events: Vec<DomainEvent>) -> Result<()> {
        insert_events(&self.pool, &events).await
    }

    /// Load every event recorded for an aggregate, oldest first
    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_data
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_data: serde_json::Value = row.try_get("event_data")?;
            events.push(serde_json::from_value(event_data)?);
        }

        Ok(events)
    }
}
