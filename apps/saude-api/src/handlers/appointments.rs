//! Consultas
//!
//! - `POST /api/appointments` (profissional), `GET /api/appointments`
//! - `GET /api/appointments/availability?professional_id=&at=`
//! - `GET /api/appointments/:id`, `DELETE /api/appointments/:id`
//! - `POST /api/appointments/:id/{confirm,start,complete,cancel,reschedule}`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use saude_db::models::{Appointment, Modality};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{OptionalJson, ValidatedJson};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::services::{AppointmentListQuery, ScheduleInput};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AppointmentRequest {
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 1, message = "A duração deve ser um número inteiro positivo (em minutos)"))]
    pub duration_minutes: Option<i32>,
    pub modality: Option<Modality>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub upcoming: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub professional_id: Uuid,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub professional_id: Uuid,
    pub at: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(min = 1, message = "O motivo do cancelamento é obrigatório"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
}

pub async fn schedule(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<AppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let appointment = state
        .appointments
        .schedule(
            &auth,
            ScheduleInput {
                patient_id: request.patient_id,
                scheduled_at: request.scheduled_at,
                duration_minutes: request.duration_minutes,
                modality: request.modality,
                notes: request.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let appointments = state
        .appointments
        .list(
            &auth,
            AppointmentListQuery {
                upcoming: query.upcoming,
                from: query.from,
                to: query.to,
            },
        )
        .await?;
    Ok(Json(appointments))
}

pub async fn availability(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let available = state
        .appointments
        .is_available(query.professional_id, query.at)
        .await?;
    Ok(Json(AvailabilityResponse {
        professional_id: query.professional_id,
        at: query.at,
        available,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(state.appointments.get(&auth, id).await?))
}

pub async fn confirm(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(state.appointments.confirm(&auth, id).await?))
}

pub async fn start(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(state.appointments.start(&auth, id).await?))
}

/// Corpo opcional: `{"notes": ...}` ou nenhum
pub async fn complete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    OptionalJson(request): OptionalJson<CompleteRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let notes = request.and_then(|r| r.notes);
    let appointment = state
        .appointments
        .complete(&auth, id, notes.as_deref())
        .await?;
    Ok(Json(appointment))
}

pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CancelRequest>,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(state.appointments.cancel(&auth, id, &request.reason).await?))
}

pub async fn reschedule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RescheduleRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = state
        .appointments
        .reschedule(&auth, id, request.scheduled_at)
        .await?;
    Ok(Json(appointment))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.appointments.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
