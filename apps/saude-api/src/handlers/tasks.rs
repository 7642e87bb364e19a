//! Tarefas
//!
//! - `POST /api/tasks` (profissional), `GET /api/tasks?status=`
//! - `GET /api/tasks/:id`, `DELETE /api/tasks/:id`
//! - `POST /api/tasks/:id/complete`, `POST /api/tasks/:id/notes`
//! - `PUT /api/tasks/:id/status`
//! - `POST /api/tasks/overdue-sweep`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use saude_db::models::{Task, TaskStatus};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::ValidatedJson;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::services::{AssignTaskInput, SweepReport};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TaskRequest {
    pub patient_id: Uuid,
    #[validate(length(min = 1, max = 2000, message = "Descrição é obrigatória (até 2000 caracteres)"))]
    pub description: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TaskNoteRequest {
    #[validate(length(min = 1, message = "A nota não pode ser vazia"))]
    pub note: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

pub async fn assign(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<TaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state
        .tasks
        .assign(
            &auth,
            AssignTaskInput {
                patient_id: request.patient_id,
                description: request.description,
                due_at: request.due_at,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.tasks.list(&auth, query.status).await?))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.get(&auth, id).await?))
}

pub async fn complete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.complete(&auth, id).await?))
}

pub async fn add_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<TaskNoteRequest>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.add_note(&auth, id, &request.note).await?))
}

pub async fn set_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<TaskStatusRequest>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.set_status(&auth, id, request.status).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.tasks.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn sweep(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<SweepReport>, ApiError> {
    Ok(Json(state.tasks.sweep(&auth).await?))
}
