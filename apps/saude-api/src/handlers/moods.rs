//! Registros de humor
//!
//! - `POST /api/moods`, `GET /api/moods`, `GET /api/moods/stats` (paciente)
//! - `PATCH /api/moods/:id`, `DELETE /api/moods/:id` (paciente dono)
//! - `GET /api/patients/:patient_id/moods[/stats]` (profissional)

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use saude_db::models::{MoodEntry, MoodKind, MoodStats, UserRole};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{DateRangeQuery, ValidatedJson};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::services::MoodInput;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct MoodRequest {
    pub mood: MoodKind,
    #[validate(range(min = 1, max = 10, message = "Nível de humor deve estar entre 1 e 10"))]
    pub intensity: i64,
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MoodNotesRequest {
    pub notes: Option<String>,
}

pub async fn record(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<MoodRequest>,
) -> Result<(StatusCode, Json<MoodEntry>), ApiError> {
    let entry = state
        .moods
        .record(
            &auth,
            MoodInput {
                mood: request.mood,
                intensity: request.intensity,
                notes: request.notes,
                recorded_at: request.recorded_at,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn own_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<MoodEntry>>, ApiError> {
    auth.require(&[UserRole::Patient])?;
    range.check()?;
    let entries = state.moods.history(&auth, auth.id, range.from, range.to).await?;
    Ok(Json(entries))
}

pub async fn own_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<MoodStats>, ApiError> {
    auth.require(&[UserRole::Patient])?;
    range.check()?;
    let stats = state.moods.stats(&auth, auth.id, range.from, range.to).await?;
    Ok(Json(stats))
}

pub async fn patient_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(patient_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<MoodEntry>>, ApiError> {
    range.check()?;
    let entries = state.moods.history(&auth, patient_id, range.from, range.to).await?;
    Ok(Json(entries))
}

pub async fn patient_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(patient_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<MoodStats>, ApiError> {
    range.check()?;
    let stats = state.moods.stats(&auth, patient_id, range.from, range.to).await?;
    Ok(Json(stats))
}

pub async fn update_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<MoodNotesRequest>,
) -> Result<Json<MoodEntry>, ApiError> {
    let entry = state.moods.update_notes(&auth, id, request.notes).await?;
    Ok(Json(entry))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.moods.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
