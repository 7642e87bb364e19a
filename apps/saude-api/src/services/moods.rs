use chrono::{DateTime, Utc};
use saude_db::models::{MoodEntry, MoodKind, MoodStats, NewMoodEntry, UserRole};
use saude_db::repository::{MoodRepository, UserRepository};
use tracing::info;
use uuid::Uuid;

use super::ensure_patient;
use crate::auth::AuthUser;
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct MoodInput {
    pub mood: MoodKind,
    pub intensity: i64,
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct MoodService {
    moods: MoodRepository,
    users: UserRepository,
}

impl MoodService {
    pub fn new(moods: MoodRepository, users: UserRepository) -> Self {
        Self { moods, users }
    }

    /// Apenas o próprio paciente registra seu humor
    pub async fn record(&self, auth: &AuthUser, input: MoodInput) -> Result<MoodEntry, ApiError> {
        auth.require(&[UserRole::Patient])?;

        let entry = MoodEntry::record(
            NewMoodEntry {
                patient_id: auth.id,
                mood: input.mood,
                intensity: input.intensity,
                notes: input.notes,
                recorded_at: input.recorded_at,
            },
            Utc::now(),
        )?;
        self.moods.create(&entry).await?;

        info!("Humor registrado: {} (paciente {})", entry.id(), auth.id);
        Ok(entry)
    }

    /// Paciente lê o próprio histórico; profissional lê o de qualquer paciente
    pub async fn history(
        &self,
        auth: &AuthUser,
        patient_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<MoodEntry>, ApiError> {
        self.authorize_read(auth, patient_id).await?;
        Ok(self.moods.find_by_patient(patient_id, from, to).await?)
    }

    pub async fn stats(
        &self,
        auth: &AuthUser,
        patient_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<MoodStats, ApiError> {
        let entries = self.history(auth, patient_id, from, to).await?;
        Ok(MoodStats::from_entries(&entries))
    }

    pub async fn update_notes(
        &self,
        auth: &AuthUser,
        id: Uuid,
        notes: Option<String>,
    ) -> Result<MoodEntry, ApiError> {
        let mut entry = self.owned_entry(auth, id).await?;
        entry.update_notes(notes);
        self.moods.update_notes(&entry).await?;
        Ok(entry)
    }

    pub async fn delete(&self, auth: &AuthUser, id: Uuid) -> Result<(), ApiError> {
        let entry = self.owned_entry(auth, id).await?;
        self.moods.delete(entry.id()).await?;
        info!("Registro de humor removido: {}", id);
        Ok(())
    }

    async fn owned_entry(&self, auth: &AuthUser, id: Uuid) -> Result<MoodEntry, ApiError> {
        auth.require(&[UserRole::Patient])?;

        let entry = self
            .moods
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Registro de humor não encontrado".to_string()))?;
        if entry.patient_id() != auth.id {
            return Err(ApiError::forbidden());
        }
        Ok(entry)
    }

    async fn authorize_read(&self, auth: &AuthUser, patient_id: Uuid) -> Result<(), ApiError> {
        match auth.role {
            UserRole::Patient if auth.id == patient_id => Ok(()),
            UserRole::Professional => ensure_patient(&self.users, patient_id).await.map(|_| ()),
            _ => Err(ApiError::forbidden()),
        }
    }
}
