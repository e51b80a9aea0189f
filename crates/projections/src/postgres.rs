//! PostgreSQL-backed order read model.

use async_trait::async_trait;
use common::{AggregateId, Page};
use domain::{
    Aggregate, CustomerId, Location, Order, OrderEvent, OrderItem, OrderStatus, TrackingNumber,
};
use event_store::EventEnvelope;
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::handler::EventHandler;
use crate::repository::{OrderFilter, OrderRepository, OrderView, ResettableRepository};
use crate::{ProjectionError, Result};

const VIEW_COLUMNS: &str = "id, customer_id, tracking_number, status, origin, destination, current_location, items, notes, created_at, updated_at";

/// Read model stored in the `order_projections` table.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_view(row: PgRow) -> Result<OrderView> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| ProjectionError::InvalidRow(e.to_string()))?;

        let Json(origin): Json<Location> = row.try_get("origin")?;
        let Json(destination): Json<Location> = row.try_get("destination")?;
        let Json(items): Json<Vec<OrderItem>> = row.try_get("items")?;
        let Json(notes): Json<Vec<String>> = row.try_get("notes")?;
        let current_location = row
            .try_get::<Option<Json<Location>>, _>("current_location")?
            .map(|Json(location)| location);

        Ok(OrderView {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            tracking_number: TrackingNumber::new(row.try_get::<String, _>("tracking_number")?),
            status,
            origin,
            destination,
            current_location,
            items,
            notes,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn insert(&self, view: &OrderView) -> Result<()> {
        // A repeated creation event leaves the existing row untouched.
        sqlx::query(
            r#"
            INSERT INTO order_projections
                (id, customer_id, tracking_number, status, origin, destination, current_location, items, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(view.id.as_uuid())
        .bind(view.customer_id.as_str())
        .bind(view.tracking_number.as_str())
        .bind(view.status.as_str())
        .bind(Json(&view.origin))
        .bind(Json(&view.destination))
        .bind(view.current_location.as_ref().map(Json))
        .bind(Json(&view.items))
        .bind(Json(&view.notes))
        .bind(view.created_at)
        .bind(view.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, order_id: AggregateId, event: OrderEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {VIEW_COLUMNS} FROM order_projections WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ProjectionError::MissingRow { order_id })?;

        let mut view = Self::row_to_view(row)?;
        view.apply(event);

        sqlx::query(
            r#"
            UPDATE order_projections
            SET status = $2, current_location = $3, notes = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(view.status.as_str())
        .bind(view.current_location.as_ref().map(Json))
        .bind(Json(&view.notes))
        .bind(view.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for PostgresOrderRepository {
    fn name(&self) -> &'static str {
        "PostgresOrderRepository"
    }

    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, order_id = %event.aggregate_id))]
    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Order::aggregate_type() {
            return Ok(());
        }

        match event.decode::<OrderEvent>()? {
            OrderEvent::OrderCreated(data) => self.insert(&OrderView::from_created(data)).await?,
            other => self.update(event.aggregate_id, other).await?,
        }

        metrics::counter!("projections_events_processed").increment(1);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn get_by_id(&self, id: AggregateId) -> Result<OrderView> {
        let row = sqlx::query(&format!(
            "SELECT {VIEW_COLUMNS} FROM order_projections WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ProjectionError::NotFound(id.to_string()))?;

        Self::row_to_view(row)
    }

    async fn get_by_tracking_number(&self, tracking_number: &str) -> Result<OrderView> {
        let row = sqlx::query(&format!(
            "SELECT {VIEW_COLUMNS} FROM order_projections WHERE tracking_number = $1"
        ))
        .bind(tracking_number)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ProjectionError::NotFound(tracking_number.to_string()))?;

        Self::row_to_view(row)
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Page<OrderView>> {
        let mut where_clause = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if filter.customer_id.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if filter.status.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM order_projections{where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(ref customer_id) = filter.customer_id {
            count_query = count_query.bind(customer_id.as_str());
        }
        if let Some(status) = filter.status {
            count_query = count_query.bind(status.as_str());
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let mut sql = format!(
            "SELECT {VIEW_COLUMNS} FROM order_projections{where_clause} ORDER BY created_at DESC, id ASC"
        );
        if filter.limit > 0 {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        param_count += 1;
        sql.push_str(&format!(" OFFSET ${param_count}"));

        let mut query = sqlx::query(&sql);
        if let Some(ref customer_id) = filter.customer_id {
            query = query.bind(customer_id.as_str());
        }
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if filter.limit > 0 {
            query = query.bind(filter.limit as i64);
        }
        query = query.bind(filter.offset as i64);

        let rows = query.fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(Self::row_to_view)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total as usize, filter.offset, filter.limit))
    }
}

#[async_trait]
impl ResettableRepository for PostgresOrderRepository {
    async fn reset(&self) -> Result<()> {
        sqlx::query("TRUNCATE TABLE order_projections")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
