use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{
    EventStore, NewPendingEvent, NewPublishedEvent, NewTicket, Revision, StatusChange,
    StoreError,
};
use crate::config::TableNames;
use crate::models::{
    EventFilter, EventPatch, EventStatus, ParentSide, PublishedEvent, SubmittedEvent,
    TicketParent, TicketType,
};

const PENDING_COLUMNS: &str = "id, title, description, location, date, image_url, organizer_id, \
     status, approved_by, approved_at, rejection_reason, created_at, updated_at";

const PUBLISHED_COLUMNS: &str =
    "id, source_pending_id, title, description, location, date, image_url, organizer_id, created_at";

const TICKET_COLUMNS: &str =
    "id, event_pending_id, event_id, name, description, price, quantity, created_at";

#[derive(FromRow)]
struct PendingRow {
    id: Uuid,
    title: String,
    description: String,
    location: String,
    date: DateTime<Utc>,
    image_url: Option<String>,
    organizer_id: String,
    status: String,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<PendingRow> for SubmittedEvent {
    type Error = StoreError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<EventStatus>()
            .map_err(|e| StoreError::Corrupt(format!("event {}: {}", row.id, e)))?;

        Ok(SubmittedEvent {
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            date: row.date,
            image_url: row.image_url,
            organizer_id: row.organizer_id,
            status,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
            tickets: Vec::new(),
        })
    }
}

#[derive(FromRow)]
struct PublishedRow {
    id: Uuid,
    source_pending_id: Uuid,
    title: String,
    description: String,
    location: String,
    date: DateTime<Utc>,
    image_url: Option<String>,
    organizer_id: String,
    created_at: DateTime<Utc>,
}

impl From<PublishedRow> for PublishedEvent {
    fn from(row: PublishedRow) -> Self {
        PublishedEvent {
            id: row.id,
            source_pending_id: row.source_pending_id,
            title: row.title,
            description: row.description,
            location: row.location,
            date: row.date,
            image_url: row.image_url,
            organizer_id: row.organizer_id,
            created_at: row.created_at,
            tickets: Vec::new(),
        }
    }
}

/// Escapes `LIKE` wildcards so user input only matches literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate(db.message().to_string());
        }
    }
    StoreError::Database(err)
}

/// Postgres-backed store. Table names come from configuration and are validated identifiers.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    tables: TableNames,
}

impl PgEventStore {
    pub fn new(pool: PgPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_pending(&self, event: NewPendingEvent) -> Result<SubmittedEvent, StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, title, description, location, date, image_url, organizer_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            self.tables.pending, PENDING_COLUMNS
        );
        let row = sqlx::query_as::<_, PendingRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.date)
            .bind(&event.image_url)
            .bind(&event.organizer_id)
            .bind(EventStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        SubmittedEvent::try_from(row)
    }

    async fn find_pending(&self, id: Uuid) -> Result<Option<SubmittedEvent>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            PENDING_COLUMNS, self.tables.pending
        );
        sqlx::query_as::<_, PendingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .map(SubmittedEvent::try_from)
            .transpose()
    }

    async fn query_pending(&self, filter: &EventFilter) -> Result<Vec<SubmittedEvent>, StoreError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE TRUE",
            PENDING_COLUMNS, self.tables.pending
        ));
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(organizer_id) = &filter.organizer_id {
            query.push(" AND organizer_id = ").push_bind(organizer_id.clone());
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<PendingRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.into_iter().map(SubmittedEvent::try_from).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: EventStatus,
        change: StatusChange,
    ) -> Result<u64, StoreError> {
        let revision_guard = match change.revision {
            Revision::Any => "",
            Revision::At(_) => " AND updated_at IS NOT DISTINCT FROM $7",
        };
        let sql = format!(
            "UPDATE {} SET status = $3, approved_by = $4, approved_at = $5, rejection_reason = $6 \
             WHERE id = $1 AND status = $2{}",
            self.tables.pending, revision_guard
        );
        let mut query = sqlx::query(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(change.status.as_str())
            .bind(&change.acted_by)
            .bind(change.acted_at)
            .bind(&change.rejection_reason);
        if let Revision::At(updated_at) = change.revision {
            query = query.bind(updated_at);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        debug!(event_id = %id, rows = result.rows_affected(), "Conditional status update");
        Ok(result.rows_affected())
    }

    async fn update_content(
        &self,
        id: Uuid,
        expected: EventStatus,
        patch: &EventPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "UPDATE {} SET title = COALESCE($3, title), description = COALESCE($4, description), \
             location = COALESCE($5, location), date = COALESCE($6, date), \
             image_url = COALESCE($7, image_url), updated_at = $8 \
             WHERE id = $1 AND status = $2",
            self.tables.pending
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(&patch.title)
            .bind(&patch.description)
            .bind(&patch.location)
            .bind(patch.date)
            .bind(&patch.image_url)
            .bind(updated_at)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected())
    }

    async fn delete_pending(&self, id: Uuid, expected: EventStatus) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND status = $2",
            self.tables.pending
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected())
    }

    async fn insert_published(
        &self,
        event: NewPublishedEvent,
    ) -> Result<PublishedEvent, StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, source_pending_id, title, description, location, date, image_url, organizer_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            self.tables.published, PUBLISHED_COLUMNS
        );
        let row = sqlx::query_as::<_, PublishedRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(event.source_pending_id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.date)
            .bind(&event.image_url)
            .bind(&event.organizer_id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        Ok(row.into())
    }

    async fn find_published(&self, id: Uuid) -> Result<Option<PublishedEvent>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            PUBLISHED_COLUMNS, self.tables.published
        );
        let row = sqlx::query_as::<_, PublishedRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        Ok(row.map(PublishedEvent::from))
    }

    async fn query_published(&self, limit: Option<i64>) -> Result<Vec<PublishedEvent>, StoreError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM {} ORDER BY created_at DESC",
            PUBLISHED_COLUMNS, self.tables.published
        ));
        if let Some(limit) = limit {
            query.push(" LIMIT ").push_bind(limit.max(0));
        }

        let rows = query
            .build_query_as::<PublishedRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        Ok(rows.into_iter().map(PublishedEvent::from).collect())
    }

    async fn search_published(&self, query: &str) -> Result<Vec<PublishedEvent>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE title ILIKE $1 OR location ILIKE $1 ORDER BY created_at DESC",
            PUBLISHED_COLUMNS, self.tables.published
        );
        let rows = sqlx::query_as::<_, PublishedRow>(&sql)
            .bind(like_pattern(query.trim()))
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        Ok(rows.into_iter().map(PublishedEvent::from).collect())
    }

    async fn delete_published(&self, id: Uuid) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.tables.published);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected())
    }

    async fn insert_tickets(
        &self,
        parent: TicketParent,
        tickets: &[NewTicket],
    ) -> Result<Vec<TicketType>, StoreError> {
        if tickets.is_empty() {
            return Ok(Vec::new());
        }

        let (pending_id, event_id) = match parent {
            TicketParent::Pending(id) => (Some(id), None),
            TicketParent::Published(id) => (None, Some(id)),
        };

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} (id, event_pending_id, event_id, name, description, price, quantity) ",
            self.tables.tickets
        ));
        query.push_values(tickets, |mut row, ticket| {
            row.push_bind(Uuid::new_v4())
                .push_bind(pending_id)
                .push_bind(event_id)
                .push_bind(ticket.name.clone())
                .push_bind(ticket.description.clone())
                .push_bind(ticket.price)
                .push_bind(ticket.quantity);
        });
        query.push(format!(" RETURNING {}", TICKET_COLUMNS));

        query
            .build_query_as::<TicketType>()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn tickets_for(
        &self,
        side: ParentSide,
        ids: &[Uuid],
    ) -> Result<Vec<TicketType>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ANY($1) ORDER BY created_at ASC, id ASC",
            TICKET_COLUMNS,
            self.tables.tickets,
            side.column()
        );
        sqlx::query_as::<_, TicketType>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn repoint_tickets(
        &self,
        from: TicketParent,
        to: TicketParent,
    ) -> Result<u64, StoreError> {
        let from_column = from.side().column();
        let to_column = to.side().column();
        let sql = if from.side() == to.side() {
            format!(
                "UPDATE {} SET {} = $1 WHERE {} = $2",
                self.tables.tickets, to_column, from_column
            )
        } else {
            format!(
                "UPDATE {} SET {} = $1, {} = NULL WHERE {} = $2",
                self.tables.tickets, to_column, from_column, from_column
            )
        };
        let result = sqlx::query(&sql)
            .bind(to.id())
            .bind(from.id())
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected())
    }
}
