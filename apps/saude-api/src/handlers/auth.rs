//! Cadastro e login
//!
//! - `POST /api/auth/register`
//! - `POST /api/auth/login`
//! - `GET /api/auth/validate-token`

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use saude_db::models::{PatientProfile, ProfessionalProfile, Profile, User, UserRole};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ValidatedJson;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::services::Registration;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Nome é obrigatório"))]
    pub name: String,
    #[validate(email(message = "Email inválido"))]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres"))]
    pub password: String,
    pub role: UserRole,
    pub birth_date: Option<NaiveDate>,
    pub cpf: Option<String>,
    pub emergency_contact: Option<String>,
    pub history: Option<String>,
    pub crm: Option<String>,
    pub specialty: Option<String>,
    pub biography: Option<String>,
    #[serde(default)]
    pub available_hours: Vec<String>,
}

impl RegisterRequest {
    fn into_registration(self) -> Result<Registration, ApiError> {
        let profile = match self.role {
            UserRole::Patient => match (self.birth_date, self.cpf) {
                (Some(birth_date), Some(cpf)) => Profile::Patient(PatientProfile {
                    birth_date,
                    cpf,
                    emergency_contact: self.emergency_contact,
                    history: self.history,
                }),
                _ => {
                    return Err(ApiError::BadRequest(
                        "Data de nascimento e CPF são obrigatórios para pacientes".to_string(),
                    ))
                }
            },
            UserRole::Professional => match (self.crm, self.specialty) {
                (Some(crm), Some(specialty)) => Profile::Professional(ProfessionalProfile {
                    crm,
                    specialty,
                    biography: self.biography,
                    available_hours: self.available_hours,
                }),
                _ => {
                    return Err(ApiError::BadRequest(
                        "CRM e especialidade são obrigatórios para profissionais".to_string(),
                    ))
                }
            },
            UserRole::Admin => Profile::Admin,
        };

        Ok(Registration {
            name: self.name,
            email: self.email,
            password: self.password,
            profile,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email inválido"))]
    pub email: String,
    #[validate(length(min = 1, message = "Senha é obrigatória"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// `POST /api/auth/register`: token opcional, exigido apenas para criar administradores
pub async fn register(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let registration = request.into_registration()?;
    let (user, token) = state.users.register(registration, caller).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (user, token) = state.users.login(&request.email, &request.password).await?;
    Ok(Json(AuthResponse { user, token }))
}

#[derive(Debug, Serialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub user: User,
}

/// `GET /api/auth/validate-token`: 401 se o token for inválido ou expirado
pub async fn validate_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ValidateTokenResponse>, ApiError> {
    let user = state.users.profile(&auth).await?;
    Ok(Json(ValidateTokenResponse { valid: true, user }))
}
