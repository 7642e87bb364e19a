//! Usuários do sistema: pacientes, profissionais e administradores
//!
//! Os dados específicos de cada papel ficam em [`Profile`], uma união
//! etiquetada pelo papel, em vez de uma hierarquia de tipos.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Papel do usuário, usado para autorização
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Patient,
    Professional,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Patient => "patient",
            UserRole::Professional => "professional",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(UserRole::Patient),
            "professional" => Ok(UserRole::Professional),
            "admin" => Ok(UserRole::Admin),
            other => Err(DomainError::Validation(format!("Papel inválido: {}", other))),
        }
    }
}

/// Dados exclusivos do paciente
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub birth_date: NaiveDate,
    pub cpf: String,
    pub emergency_contact: Option<String>,
    pub history: Option<String>,
}

/// Dados exclusivos do profissional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    /// Registro no conselho profissional
    pub crm: String,
    pub specialty: String,
    pub biography: Option<String>,
    #[serde(default)]
    pub available_hours: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Profile {
    Patient(PatientProfile),
    Professional(ProfessionalProfile),
    Admin,
}

impl Profile {
    pub fn role(&self) -> UserRole {
        match self {
            Profile::Patient(_) => UserRole::Patient,
            Profile::Professional(_) => UserRole::Professional,
            Profile::Admin => UserRole::Admin,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        match self {
            Profile::Patient(p) => {
                require(&p.cpf, "CPF é obrigatório para pacientes")?;
            }
            Profile::Professional(p) => {
                require(&p.crm, "CRM é obrigatório para profissionais")?;
                require(&p.specialty, "Especialidade é obrigatória para profissionais")?;
            }
            Profile::Admin => {}
        }
        Ok(())
    }
}

fn require(value: &str, message: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(message.to_string()));
    }
    Ok(())
}

/// Dados para cadastro de um usuário (senha já convertida em hash)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
}

/// Campos de perfil que o próprio usuário pode alterar.
/// Campos que não se aplicam ao papel do usuário são ignorados.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub emergency_contact: Option<String>,
    pub history: Option<String>,
    pub specialty: Option<String>,
    pub biography: Option<String>,
    pub available_hours: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    #[serde(skip_serializing)]
    pub(crate) password_hash: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub(crate) profile: Profile,
}

impl User {
    pub fn new(new: NewUser, now: DateTime<Utc>) -> Result<Self, DomainError> {
        require(&new.name, "Nome é obrigatório")?;
        require(&new.email, "Email é obrigatório")?;
        new.profile.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            email: normalize_email(&new.email),
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
            profile: new.profile,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn role(&self) -> UserRole {
        self.profile.role()
    }

    pub fn apply_update(
        &mut self,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if let Some(name) = update.name {
            require(&name, "Nome é obrigatório")?;
            self.name = name.trim().to_string();
        }

        match &mut self.profile {
            Profile::Patient(p) => {
                if update.emergency_contact.is_some() {
                    p.emergency_contact = update.emergency_contact;
                }
                if update.history.is_some() {
                    p.history = update.history;
                }
            }
            Profile::Professional(p) => {
                if let Some(specialty) = update.specialty {
                    require(&specialty, "Especialidade é obrigatória para profissionais")?;
                    p.specialty = specialty;
                }
                if update.biography.is_some() {
                    p.biography = update.biography;
                }
                if let Some(hours) = update.available_hours {
                    p.available_hours = hours;
                }
            }
            Profile::Admin => {}
        }

        self.updated_at = now;
        Ok(())
    }

    pub fn set_password_hash(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.updated_at = now;
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
