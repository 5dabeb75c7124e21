//! Booking endpoints: create a booking (which starts its saga) and
//! inspect the booking and its coordination state.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use common::{BookingId, SagaId};
use domain::{Booking, BookingStore, Money, RoomId};
use outbox::{Channel, OutboxRepository, SagaStatus};
use saga::{SagaOrchestrator, SAGA_TYPE};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub booking_store: Arc<dyn BookingStore>,
    pub repository: Arc<dyn OutboxRepository>,
    pub orchestrator: Arc<SagaOrchestrator>,
    /// Which saga coordinates which booking; filled at creation time.
    pub sagas: RwLock<HashMap<BookingId, SagaId>>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub guest_email: String,
    pub room_ids: Vec<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub deposit_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct BookingAcceptedResponse {
    pub booking_id: String,
    pub saga_id: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub guest_email: String,
    pub room_ids: Vec<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub deposit_cents: i64,
    pub status: String,
}

#[derive(Serialize)]
pub struct SagaRowResponse {
    pub message_id: String,
    pub channel: String,
    pub saga_status: String,
    pub outbox_status: String,
    pub booking_status: String,
    pub created_at: String,
    pub processed_at: Option<String>,
    pub version: i64,
}

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub saga_id: String,
    pub booking_id: String,
    pub booking_status: String,
    pub rows: Vec<SagaRowResponse>,
}

// -- Handlers --

/// POST /bookings — store the booking and start its saga.
///
/// Returns 202: acceptance means the saga started, not that the booking
/// is confirmed. Progress is observable through the booking status.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(axum::http::StatusCode, Json<BookingAcceptedResponse>), ApiError> {
    if req.guest_email.is_empty() {
        return Err(ApiError::BadRequest("guest_email is required".to_string()));
    }

    let booking = Booking::new(
        req.guest_email,
        req.room_ids.into_iter().map(RoomId::new).collect(),
        req.check_in,
        req.check_out,
        Money::from_cents(req.deposit_cents),
    );
    let booking_id = booking.id;
    booking.validate_for_reservation()?;

    state
        .booking_store
        .save(booking)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let saga_id = state.orchestrator.begin(booking_id).await?;
    state.sagas.write().await.insert(booking_id, saga_id);

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(BookingAcceptedResponse {
            booking_id: booking_id.to_string(),
            saga_id: saga_id.to_string(),
            status: "Pending".to_string(),
        }),
    ))
}

/// GET /bookings/:id — load a booking by ID.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let booking = state
        .booking_store
        .get(booking_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Booking {id} not found")))?;

    Ok(Json(BookingResponse {
        id: booking.id.to_string(),
        guest_email: booking.guest_email,
        room_ids: booking.room_ids.iter().map(|r| r.to_string()).collect(),
        check_in: booking.check_in,
        check_out: booking.check_out,
        deposit_cents: booking.deposit.cents(),
        status: booking.status.to_string(),
    }))
}

const ALL_SAGA_STATUSES: [SagaStatus; 6] = [
    SagaStatus::Started,
    SagaStatus::Processing,
    SagaStatus::Succeeded,
    SagaStatus::Compensating,
    SagaStatus::Compensated,
    SagaStatus::Failed,
];

/// GET /bookings/:id/saga — the latest outbox row per channel for the
/// booking's saga.
#[tracing::instrument(skip(state))]
pub async fn saga_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let saga_id = *state
        .sagas
        .read()
        .await
        .get(&booking_id)
        .ok_or_else(|| ApiError::NotFound(format!("No saga for booking {id}")))?;

    let booking = state
        .booking_store
        .get(booking_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Booking {id} not found")))?;

    let mut rows = Vec::new();
    for channel in Channel::ALL {
        let found = state
            .repository
            .find_by_saga(channel, SAGA_TYPE, saga_id, &ALL_SAGA_STATUSES)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        if let Some(row) = found {
            rows.push(SagaRowResponse {
                message_id: row.id.to_string(),
                channel: row.channel.to_string(),
                saga_status: row.saga_status.to_string(),
                outbox_status: row.outbox_status.to_string(),
                booking_status: row.booking_status.to_string(),
                created_at: row.created_at.to_rfc3339(),
                processed_at: row.processed_at.map(|t| t.to_rfc3339()),
                version: row.version.as_i64(),
            });
        }
    }

    Ok(Json(SagaStatusResponse {
        saga_id: saga_id.to_string(),
        booking_id: booking_id.to_string(),
        booking_status: booking.status.to_string(),
        rows,
    }))
}

fn parse_booking_id(id: &str) -> Result<BookingId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(BookingId::from(uuid))
}
