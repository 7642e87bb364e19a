//! Perfil do usuário autenticado e listagens
//!
//! - `GET /api/users/me`, `PUT /api/users/me`
//! - `PUT /api/users/me/password`
//! - `GET /api/users` (administrador)
//! - `GET /api/users/:id`
//! - `DELETE /api/users/:id` (o próprio ou administrador)
//! - `GET /api/patients` (profissional)

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use saude_db::models::{ProfileUpdate, User};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::ValidatedJson;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Nome não pode ser vazio"))]
    pub name: Option<String>,
    pub emergency_contact: Option<String>,
    pub history: Option<String>,
    #[validate(length(min = 1, message = "Especialidade não pode ser vazia"))]
    pub specialty: Option<String>,
    pub biography: Option<String>,
    pub available_hours: Option<Vec<String>>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(request: UpdateProfileRequest) -> Self {
        ProfileUpdate {
            name: request.name,
            emergency_contact: request.emergency_contact,
            history: request.history,
            specialty: request.specialty,
            biography: request.biography,
            available_hours: request.available_hours,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Senha atual é obrigatória"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres"))]
    pub new_password: String,
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.profile(&auth).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state.users.update_profile(&auth, request.into()).await?;
    Ok(Json(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .users
        .change_password(&auth, &request.current_password, request.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list_users(&auth).await?))
}

pub async fn list_patients(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list_patients(&auth).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.get(id).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.users.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
