use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::parse_column;
use crate::crypto::{open_text, seal_text, EncryptionKey};
use crate::error::DbError;
use crate::models::{PatientProfile, ProfessionalProfile, Profile, User, UserRole};

const SELECT_USER: &str = "SELECT id, name, email, password_hash, role, created_at, updated_at, \
     birth_date, cpf, emergency_contact, history_ciphertext, history_nonce, \
     crm, specialty, biography, available_hours FROM users";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    birth_date: Option<NaiveDate>,
    cpf: Option<String>,
    emergency_contact: Option<String>,
    history_ciphertext: Option<Vec<u8>>,
    history_nonce: Option<Vec<u8>>,
    crm: Option<String>,
    specialty: Option<String>,
    biography: Option<String>,
    available_hours: Option<Json<Vec<String>>>,
}

impl UserRow {
    fn into_domain(self, key: &EncryptionKey) -> Result<User, DbError> {
        let id = self.id;
        let missing = |field: &str| {
            DbError::CorruptRecord(format!("Usuário {} sem campo obrigatório {}", id, field))
        };

        let profile = match parse_column::<UserRole>(&self.role)? {
            UserRole::Patient => Profile::Patient(PatientProfile {
                birth_date: self.birth_date.ok_or_else(|| missing("birth_date"))?,
                cpf: self.cpf.ok_or_else(|| missing("cpf"))?,
                emergency_contact: self.emergency_contact,
                history: open_text(self.history_ciphertext, self.history_nonce, key)?,
            }),
            UserRole::Professional => Profile::Professional(ProfessionalProfile {
                crm: self.crm.ok_or_else(|| missing("crm"))?,
                specialty: self.specialty.ok_or_else(|| missing("specialty"))?,
                biography: self.biography,
                available_hours: self.available_hours.map(|hours| hours.0).unwrap_or_default(),
            }),
            UserRole::Admin => Profile::Admin,
        };

        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
            profile,
        })
    }
}

/// Colunas específicas de papel, na ordem em que são gravadas
struct ProfileColumns<'a> {
    birth_date: Option<NaiveDate>,
    cpf: Option<&'a str>,
    emergency_contact: Option<&'a str>,
    history_ciphertext: Option<Vec<u8>>,
    history_nonce: Option<Vec<u8>>,
    crm: Option<&'a str>,
    specialty: Option<&'a str>,
    biography: Option<&'a str>,
    available_hours: Option<Json<&'a Vec<String>>>,
}

impl<'a> ProfileColumns<'a> {
    fn from_profile(profile: &'a Profile, key: &EncryptionKey) -> Result<Self, DbError> {
        let mut columns = Self {
            birth_date: None,
            cpf: None,
            emergency_contact: None,
            history_ciphertext: None,
            history_nonce: None,
            crm: None,
            specialty: None,
            biography: None,
            available_hours: None,
        };

        match profile {
            Profile::Patient(p) => {
                let (history_ct, history_nonce) = seal_text(p.history.as_deref(), key)?;
                columns.birth_date = Some(p.birth_date);
                columns.cpf = Some(&p.cpf);
                columns.emergency_contact = p.emergency_contact.as_deref();
                columns.history_ciphertext = history_ct;
                columns.history_nonce = history_nonce;
            }
            Profile::Professional(p) => {
                columns.crm = Some(&p.crm);
                columns.specialty = Some(&p.specialty);
                columns.biography = p.biography.as_deref();
                columns.available_hours = Some(Json(&p.available_hours));
            }
            Profile::Admin => {}
        }

        Ok(columns)
    }
}

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    key: Arc<EncryptionKey>,
}

impl UserRepository {
    pub fn new(pool: SqlitePool, key: Arc<EncryptionKey>) -> Self {
        Self { pool, key }
    }

    pub async fn create(&self, user: &User) -> Result<(), DbError> {
        let columns = ProfileColumns::from_profile(&user.profile, &self.key)?;

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at, \
             birth_date, cpf, emergency_contact, history_ciphertext, history_nonce, \
             crm, specialty, biography, available_hours) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role().as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(columns.birth_date)
        .bind(columns.cpf)
        .bind(columns.emergency_contact)
        .bind(columns.history_ciphertext)
        .bind(columns.history_nonce)
        .bind(columns.crm)
        .bind(columns.specialty)
        .bind(columns.biography)
        .bind(columns.available_hours)
        .execute(&self.pool)
        .await?;

        debug!("Usuário gravado: {} ({})", user.id, user.role());
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_USER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_domain(&self.key)).transpose()
    }

    /// Busca pelo email já normalizado
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE email = ?", SELECT_USER))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_domain(&self.key)).transpose()
    }

    pub async fn exists_with_crm(&self, crm: &str) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE crm = ?")
            .bind(crm)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Lista usuários em ordem alfabética, opcionalmente de um único papel
    pub async fn find(&self, role: Option<UserRole>) -> Result<Vec<User>, DbError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "{} WHERE (? IS NULL OR role = ?) ORDER BY name ASC",
            SELECT_USER
        ))
        .bind(role.map(|r| r.as_str()))
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_domain(&self.key)).collect()
    }

    /// Grava nome, senha e campos de perfil. Email e papel não mudam.
    pub async fn update(&self, user: &User) -> Result<(), DbError> {
        let columns = ProfileColumns::from_profile(&user.profile, &self.key)?;

        let result = sqlx::query(
            "UPDATE users SET name = ?, password_hash = ?, updated_at = ?, \
             birth_date = ?, cpf = ?, emergency_contact = ?, history_ciphertext = ?, \
             history_nonce = ?, crm = ?, specialty = ?, biography = ?, available_hours = ? \
             WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.updated_at)
        .bind(columns.birth_date)
        .bind(columns.cpf)
        .bind(columns.emergency_contact)
        .bind(columns.history_ciphertext)
        .bind(columns.history_nonce)
        .bind(columns.crm)
        .bind(columns.specialty)
        .bind(columns.biography)
        .bind(columns.available_hours)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Usuário {}", user.id)));
        }
        Ok(())
    }

    /// Remove o usuário. Consultas, tarefas e humores não são apagados em
    /// cascata: se houver algum vinculado, falha com `ConstraintViolation`.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MoodEntry, MoodKind, NewMoodEntry, NewUser, ProfileUpdate};
    use crate::Database;
    use anyhow::Result;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 10, 9, 0, 0).unwrap()
    }

    fn professional(email: &str, crm: &str) -> User {
        User::new(
            NewUser {
                name: "Dra. Helena Costa".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                profile: Profile::Professional(ProfessionalProfile {
                    crm: crm.to_string(),
                    specialty: "Psicologia clínica".to_string(),
                    biography: None,
                    available_hours: vec!["seg 09:00-12:00".to_string()],
                }),
            },
            now(),
        )
        .unwrap()
    }

    fn patient(email: &str) -> User {
        User::new(
            NewUser {
                name: "Bruno Lima".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                profile: Profile::Patient(PatientProfile {
                    birth_date: NaiveDate::from_ymd_opt(1988, 11, 3).unwrap(),
                    cpf: format!("cpf-{}", email),
                    emergency_contact: Some("Carla".to_string()),
                    history: Some("Ansiedade generalizada".to_string()),
                }),
            },
            now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_each_role() -> Result<()> {
        let db = Database::in_memory().await?;
        let repo = db.users();

        let pro = professional("helena@clinica.com", "CRP-06/1234");
        let pat = patient("bruno@exemplo.com");
        repo.create(&pro).await?;
        repo.create(&pat).await?;

        assert_eq!(repo.find_by_id(pro.id()).await?, Some(pro.clone()));
        assert_eq!(
            repo.find_by_email("bruno@exemplo.com").await?,
            Some(pat.clone())
        );

        let raw: Vec<u8> = sqlx::query_scalar("SELECT history_ciphertext FROM users WHERE id = ?")
            .bind(pat.id())
            .fetch_one(db.pool())
            .await?;
        assert!(!String::from_utf8_lossy(&raw).contains("Ansiedade"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unique_email_and_crm() -> Result<()> {
        let db = Database::in_memory().await?;
        let repo = db.users();

        repo.create(&professional("a@clinica.com", "CRM-1")).await?;
        assert!(repo.exists_with_crm("CRM-1").await?);
        assert!(!repo.exists_with_crm("CRM-2").await?);

        let dup_email = repo.create(&professional("a@clinica.com", "CRM-2")).await;
        assert!(matches!(dup_email, Err(DbError::ConstraintViolation(_))));

        let dup_crm = repo.create(&professional("b@clinica.com", "CRM-1")).await;
        assert!(matches!(dup_crm, Err(DbError::ConstraintViolation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_role() -> Result<()> {
        let db = Database::in_memory().await?;
        let repo = db.users();

        repo.create(&professional("p@clinica.com", "CRM-9")).await?;
        repo.create(&patient("x@exemplo.com")).await?;
        repo.create(&patient("y@exemplo.com")).await?;

        assert_eq!(repo.find(None).await?.len(), 3);
        let patients = repo.find(Some(UserRole::Patient)).await?;
        assert_eq!(patients.len(), 2);
        assert!(patients.iter().all(|u| u.role() == UserRole::Patient));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_profile_and_password() -> Result<()> {
        let db = Database::in_memory().await?;
        let repo = db.users();

        let mut user = patient("z@exemplo.com");
        repo.create(&user).await?;

        user.apply_update(
            ProfileUpdate {
                history: Some("Em acompanhamento desde 2024".to_string()),
                ..Default::default()
            },
            now(),
        )?;
        user.set_password_hash("novo-hash".to_string(), now());
        repo.update(&user).await?;

        let stored = repo.find_by_id(user.id()).await?.expect("usuário gravado");
        assert_eq!(stored.password_hash(), "novo-hash");
        assert_eq!(stored, user);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_user() -> Result<()> {
        let db = Database::in_memory().await?;
        let repo = db.users();

        let user = patient("d@exemplo.com");
        repo.create(&user).await?;

        assert!(repo.delete(user.id()).await?);
        assert_eq!(repo.find_by_id(user.id()).await?, None);
        assert!(!repo.delete(user.id()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_user_with_linked_records_is_rejected() -> Result<()> {
        let db = Database::in_memory().await?;
        let repo = db.users();

        let user = patient("vinculado@exemplo.com");
        repo.create(&user).await?;
        let entry = MoodEntry::record(
            NewMoodEntry {
                patient_id: user.id(),
                mood: MoodKind::Neutral,
                intensity: 5,
                notes: None,
                recorded_at: None,
            },
            now(),
        )?;
        db.moods().create(&entry).await?;

        let result = repo.delete(user.id()).await;
        assert!(matches!(result, Err(DbError::ConstraintViolation(_))));
        assert!(repo.find_by_id(user.id()).await?.is_some());
        Ok(())
    }
}
