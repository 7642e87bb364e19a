use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::parse_column;
use crate::crypto::{open_text, seal_text, EncryptionKey};
use crate::error::DbError;
use crate::models::{Intensity, MoodEntry, MoodKind};

const SELECT_MOOD: &str = "SELECT id, patient_id, recorded_at, mood, intensity, \
     notes_ciphertext, notes_nonce FROM mood_entries";

#[derive(FromRow)]
struct MoodRow {
    id: Uuid,
    patient_id: Uuid,
    recorded_at: DateTime<Utc>,
    mood: String,
    intensity: i64,
    notes_ciphertext: Option<Vec<u8>>,
    notes_nonce: Option<Vec<u8>>,
}

impl MoodRow {
    fn into_domain(self, key: &EncryptionKey) -> Result<MoodEntry, DbError> {
        let intensity = Intensity::new(self.intensity)
            .map_err(|e| DbError::CorruptRecord(e.to_string()))?;

        Ok(MoodEntry::restore(
            self.id,
            self.patient_id,
            self.recorded_at,
            parse_column::<MoodKind>(&self.mood)?,
            intensity,
            open_text(self.notes_ciphertext, self.notes_nonce, key)?,
        ))
    }
}

#[derive(Clone)]
pub struct MoodRepository {
    pool: SqlitePool,
    key: Arc<EncryptionKey>,
}

impl MoodRepository {
    pub fn new(pool: SqlitePool, key: Arc<EncryptionKey>) -> Self {
        Self { pool, key }
    }

    pub async fn create(&self, entry: &MoodEntry) -> Result<(), DbError> {
        let (notes_ct, notes_nonce) = seal_text(entry.notes(), &self.key)?;

        sqlx::query(
            "INSERT INTO mood_entries (id, patient_id, recorded_at, mood, intensity, \
             notes_ciphertext, notes_nonce) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id())
        .bind(entry.patient_id())
        .bind(entry.recorded_at())
        .bind(entry.mood().as_str())
        .bind(i64::from(entry.intensity().value()))
        .bind(notes_ct)
        .bind(notes_nonce)
        .execute(&self.pool)
        .await?;

        debug!("Registro de humor gravado: {}", entry.id());
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MoodEntry>, DbError> {
        let row: Option<MoodRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_MOOD))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_domain(&self.key)).transpose()
    }

    /// Histórico do paciente em ordem cronológica. `from` e `to` são
    /// limites inclusivos e opcionais.
    pub async fn find_by_patient(
        &self,
        patient_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<MoodEntry>, DbError> {
        let rows: Vec<MoodRow> = sqlx::query_as(&format!(
            "{} WHERE patient_id = ? \
             AND (? IS NULL OR recorded_at >= ?) \
             AND (? IS NULL OR recorded_at <= ?) \
             ORDER BY recorded_at ASC",
            SELECT_MOOD
        ))
        .bind(patient_id)
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_domain(&self.key)).collect()
    }

    /// Grava as notas; os demais campos do registro são imutáveis
    pub async fn update_notes(&self, entry: &MoodEntry) -> Result<(), DbError> {
        let (notes_ct, notes_nonce) = seal_text(entry.notes(), &self.key)?;

        let result = sqlx::query(
            "UPDATE mood_entries SET notes_ciphertext = ?, notes_nonce = ? WHERE id = ?",
        )
        .bind(notes_ct)
        .bind(notes_nonce)
        .bind(entry.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Registro de humor {}", entry.id())));
        }
        Ok(())
    }

    /// Remove o registro. Retorna `false` se ele não existia.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM mood_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMoodEntry;
    use crate::test_support::seed_patient;
    use crate::Database;
    use anyhow::Result;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 20, 0, 0).unwrap()
    }

    fn entry(patient: Uuid, mood: MoodKind, intensity: i64, days: i64) -> MoodEntry {
        MoodEntry::record(
            NewMoodEntry {
                patient_id: patient,
                mood,
                intensity,
                notes: Some("Dormi bem".to_string()),
                recorded_at: Some(base() + Duration::days(days)),
            },
            base(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_history_is_chronological_and_ranged() -> Result<()> {
        let db = Database::in_memory().await?;
        let patient = seed_patient(&db).await?;
        let repo = db.moods();

        let third = entry(patient, MoodKind::Good, 7, 2);
        let first = entry(patient, MoodKind::Bad, 3, 0);
        let second = entry(patient, MoodKind::Neutral, 5, 1);
        for e in [&third, &first, &second] {
            repo.create(e).await?;
        }

        let history = repo.find_by_patient(patient, None, None).await?;
        let ids: Vec<Uuid> = history.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id(), third.id()]);
        assert_eq!(history[0], first);

        let ranged = repo
            .find_by_patient(
                patient,
                Some(base() + Duration::days(1)),
                Some(base() + Duration::days(2)),
            )
            .await?;
        assert_eq!(ranged.len(), 2);

        let other = seed_patient(&db).await?;
        assert!(repo.find_by_patient(other, None, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_notes_and_delete() -> Result<()> {
        let db = Database::in_memory().await?;
        let patient = seed_patient(&db).await?;
        let repo = db.moods();

        let mut e = entry(patient, MoodKind::VeryGood, 9, 0);
        repo.create(&e).await?;

        e.update_notes(None);
        repo.update_notes(&e).await?;
        let stored = repo.find_by_id(e.id()).await?.expect("registro");
        assert_eq!(stored.notes(), None);
        assert_eq!(stored.intensity().value(), 9);

        assert!(repo.delete(e.id()).await?);
        assert!(repo.find_by_id(e.id()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_intensity_check_constraint() -> Result<()> {
        let db = Database::in_memory().await?;
        let patient = seed_patient(&db).await?;

        let result = sqlx::query(
            "INSERT INTO mood_entries (id, patient_id, recorded_at, mood, intensity) \
             VALUES (?, ?, ?, 'good', 11)",
        )
        .bind(Uuid::new_v4())
        .bind(patient)
        .bind(base())
        .execute(db.pool())
        .await;

        let err: DbError = result.unwrap_err().into();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
        Ok(())
    }
}
