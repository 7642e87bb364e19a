//! Casos de uso da API
//!
//! Cada serviço recebe seus repositórios no construtor e aplica as regras de
//! acesso por papel e por participação antes de delegar ao domínio.

mod appointments;
mod moods;
mod tasks;
mod users;

pub use appointments::{AppointmentListQuery, AppointmentService, ScheduleInput};
pub use moods::{MoodInput, MoodService};
pub use tasks::{AssignTaskInput, SweepReport, TaskService};
pub use users::{Registration, UserService};

use saude_db::models::{User, UserRole};
use saude_db::repository::UserRepository;
use uuid::Uuid;

use crate::error::ApiError;

/// Carrega um usuário e confere o papel; 404 se ausente ou de outro papel
async fn ensure_role(
    users: &UserRepository,
    id: Uuid,
    role: UserRole,
    missing: &str,
) -> Result<User, ApiError> {
    match users.find_by_id(id).await? {
        Some(user) if user.role() == role => Ok(user),
        _ => Err(ApiError::NotFound(missing.to_string())),
    }
}

async fn ensure_patient(users: &UserRepository, id: Uuid) -> Result<User, ApiError> {
    ensure_role(users, id, UserRole::Patient, "Paciente não encontrado").await
}

async fn ensure_professional(users: &UserRepository, id: Uuid) -> Result<User, ApiError> {
    ensure_role(users, id, UserRole::Professional, "Profissional não encontrado").await
}

#[cfg(test)]
pub(crate) mod test_support {
    use anyhow::Result;
    use chrono::NaiveDate;
    use saude_db::models::{PatientProfile, ProfessionalProfile, Profile};
    use saude_db::Database;

    use super::{Registration, UserService};
    use crate::auth::{AuthUser, TokenIssuer};

    pub async fn database() -> Result<Database> {
        Database::in_memory().await
    }

    pub fn user_service(db: &Database) -> UserService {
        UserService::new(db.users(), TokenIssuer::new("segredo-de-teste", 24))
    }

    pub async fn patient(db: &Database, email: &str) -> Result<AuthUser> {
        let (user, _) = user_service(db)
            .register(
                Registration {
                    name: "Paciente de Teste".to_string(),
                    email: email.to_string(),
                    password: "senha123".to_string(),
                    profile: Profile::Patient(PatientProfile {
                        birth_date: NaiveDate::from_ymd_opt(1995, 9, 21).unwrap(),
                        cpf: format!("cpf-{}", email),
                        emergency_contact: None,
                        history: None,
                    }),
                },
                None,
            )
            .await?;
        Ok(AuthUser {
            id: user.id(),
            role: user.role(),
        })
    }

    pub async fn professional(db: &Database, email: &str) -> Result<AuthUser> {
        let (user, _) = user_service(db)
            .register(
                Registration {
                    name: "Profissional de Teste".to_string(),
                    email: email.to_string(),
                    password: "senha123".to_string(),
                    profile: Profile::Professional(ProfessionalProfile {
                        crm: format!("CRM-{}", email),
                        specialty: "Psiquiatria".to_string(),
                        biography: None,
                        available_hours: vec![],
                    }),
                },
                None,
            )
            .await?;
        Ok(AuthUser {
            id: user.id(),
            role: user.role(),
        })
    }
}
