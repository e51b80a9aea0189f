//! Order command and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, CustomerId, Location, OrderItem, OrderStatus};
use event_store::EventStore;
use orders::{HistoryEntry, OrderService};
use projections::{OrderFilter, OrderView};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub order_service: OrderService<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub origin: Location,
    pub destination: Location,
    pub items: Vec<OrderItem>,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub new_status: String,
    pub location: Option<Location>,
    pub note: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct AddOrderNoteRequest {
    pub note: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub tracking_number: String,
}

#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub tracking_number: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderView> for OrderSummaryResponse {
    fn from(view: OrderView) -> Self {
        Self {
            id: view.id.to_string(),
            tracking_number: view.tracking_number.to_string(),
            status: view.status,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderSummaryResponse>,
    pub total_count: usize,
    pub current_page: usize,
    pub page_size: usize,
}

#[derive(Serialize)]
pub struct OrderCommandResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub version: i64,
}

#[derive(Serialize)]
pub struct OrderHistoryResponse {
    pub order_id: String,
    pub entries: Vec<HistoryEntry>,
}

const DEFAULT_PAGE_SIZE: usize = 10;

// -- Handlers --

/// POST /orders: register a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let (order_id, tracking_number) = state
        .order_service
        .create_order(
            CustomerId::new(req.customer_id),
            req.origin,
            req.destination,
            req.items,
        )
        .await?;

    let response = OrderCreatedResponse {
        order_id: order_id.to_string(),
        tracking_number: tracking_number.to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders: page through the read model.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, ApiError> {
    let limit = match query.limit {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(limit) => limit,
    };
    let mut filter = OrderFilter::new()
        .offset(query.offset.unwrap_or(0))
        .limit(limit);
    if let Some(customer_id) = query.customer_id.filter(|c| !c.is_empty()) {
        filter = filter.customer(CustomerId::new(customer_id));
    }
    if let Some(status) = query.status.filter(|s| !s.is_empty()) {
        filter = filter.status(parse_status(&status)?);
    }

    let page = state.order_service.list_orders(filter).await?;
    let current_page = page.current_page();

    Ok(Json(ListOrdersResponse {
        total_count: page.total,
        current_page,
        page_size: page.limit,
        items: page.items.into_iter().map(Into::into).collect(),
    }))
}

/// GET /orders/{id}: read one order from the read model.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    Ok(Json(state.order_service.get_order(order_id).await?))
}

/// GET /orders/tracking/{tracking_number}
#[tracing::instrument(skip(state))]
pub async fn get_by_tracking<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tracking_number): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(
        state
            .order_service
            .get_order_by_tracking(&tracking_number)
            .await?,
    ))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderCommandResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let new_status = parse_status(&req.new_status)?;

    let order = state
        .order_service
        .update_order_status(order_id, new_status, req.location, req.note)
        .await?;

    Ok(Json(OrderCommandResponse {
        order_id: order_id.to_string(),
        status: order.status(),
        version: order.version().as_i64(),
    }))
}

/// POST /orders/{id}/cancel: the body is optional.
#[tracing::instrument(skip(state, body))]
pub async fn cancel<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderCommandResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let req: CancelOrderRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelOrderRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let order = state
        .order_service
        .cancel_order(order_id, req.reason)
        .await?;

    Ok(Json(OrderCommandResponse {
        order_id: order_id.to_string(),
        status: order.status(),
        version: order.version().as_i64(),
    }))
}

/// POST /orders/{id}/notes
#[tracing::instrument(skip(state, req))]
pub async fn add_note<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AddOrderNoteRequest>,
) -> Result<Json<OrderCommandResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;

    let order = state
        .order_service
        .add_order_note(order_id, req.note)
        .await?;

    Ok(Json(OrderCommandResponse {
        order_id: order_id.to_string(),
        status: order.status(),
        version: order.version().as_i64(),
    }))
}

/// GET /orders/{id}/history: timeline straight from the event log.
#[tracing::instrument(skip(state))]
pub async fn history<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderHistoryResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let entries = state.order_service.get_order_history(order_id).await?;

    Ok(Json(OrderHistoryResponse {
        order_id: order_id.to_string(),
        entries,
    }))
}

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

fn parse_status(status: &str) -> Result<OrderStatus, ApiError> {
    status
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid status: {e}")))
}
