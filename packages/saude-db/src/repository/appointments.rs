use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::parse_column;
use crate::crypto::{open_text, seal_text, EncryptionKey};
use crate::error::DbError;
use crate::models::{availability_window, Appointment, AppointmentStatus, Modality};

const SELECT_APPOINTMENT: &str = "SELECT id, patient_id, professional_id, scheduled_at, status, \
     notes_ciphertext, notes_nonce, duration_minutes, modality, created_at FROM appointments";

/// Critérios de busca de consultas. Campos vazios não filtram.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub statuses: Vec<AppointmentStatus>,
    /// Limite inferior inclusivo de `scheduled_at`
    pub from: Option<DateTime<Utc>>,
    /// Limite superior inclusivo de `scheduled_at`
    pub to: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct AppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    professional_id: Uuid,
    scheduled_at: DateTime<Utc>,
    status: String,
    notes_ciphertext: Option<Vec<u8>>,
    notes_nonce: Option<Vec<u8>>,
    duration_minutes: Option<i32>,
    modality: Option<String>,
    created_at: DateTime<Utc>,
}

impl AppointmentRow {
    fn into_domain(self, key: &EncryptionKey) -> Result<Appointment, DbError> {
        Ok(Appointment {
            id: self.id,
            patient_id: self.patient_id,
            professional_id: self.professional_id,
            scheduled_at: self.scheduled_at,
            status: parse_column(&self.status)?,
            notes: open_text(self.notes_ciphertext, self.notes_nonce, key)?,
            duration_minutes: self.duration_minutes,
            modality: self.modality.as_deref().map(parse_column::<Modality>).transpose()?,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct AppointmentRepository {
    pool: SqlitePool,
    key: Arc<EncryptionKey>,
}

impl AppointmentRepository {
    pub fn new(pool: SqlitePool, key: Arc<EncryptionKey>) -> Self {
        Self { pool, key }
    }

    pub async fn create(&self, appointment: &Appointment) -> Result<(), DbError> {
        let (notes_ct, notes_nonce) = seal_text(appointment.notes(), &self.key)?;

        sqlx::query(
            "INSERT INTO appointments (id, patient_id, professional_id, scheduled_at, status, \
             notes_ciphertext, notes_nonce, duration_minutes, modality, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(appointment.id)
        .bind(appointment.patient_id)
        .bind(appointment.professional_id)
        .bind(appointment.scheduled_at)
        .bind(appointment.status.as_str())
        .bind(notes_ct)
        .bind(notes_nonce)
        .bind(appointment.duration_minutes)
        .bind(appointment.modality.map(|m| m.as_str()))
        .bind(appointment.created_at)
        .bind(appointment.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Consulta gravada: {}", appointment.id);
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DbError> {
        let row: Option<AppointmentRow> =
            sqlx::query_as(&format!("{} WHERE id = ?", SELECT_APPOINTMENT))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_domain(&self.key)).transpose()
    }

    /// Lista consultas em ordem crescente de data
    pub async fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, DbError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_APPOINTMENT);
        query.push(" WHERE 1 = 1");

        if let Some(patient_id) = filter.patient_id {
            query.push(" AND patient_id = ").push_bind(patient_id);
        }
        if let Some(professional_id) = filter.professional_id {
            query.push(" AND professional_id = ").push_bind(professional_id);
        }
        if !filter.statuses.is_empty() {
            query.push(" AND status IN (");
            let mut separated = query.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(status.as_str());
            }
            separated.push_unseparated(")");
        }
        if let Some(from) = filter.from {
            query.push(" AND scheduled_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND scheduled_at <= ").push_bind(to);
        }
        query.push(" ORDER BY scheduled_at ASC");

        let rows: Vec<AppointmentRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.into_domain(&self.key)).collect()
    }

    /// Grava status, horário, anotações, duração e modalidade
    pub async fn update(&self, appointment: &Appointment) -> Result<(), DbError> {
        let (notes_ct, notes_nonce) = seal_text(appointment.notes(), &self.key)?;

        let result = sqlx::query(
            "UPDATE appointments SET scheduled_at = ?, status = ?, notes_ciphertext = ?, \
             notes_nonce = ?, duration_minutes = ?, modality = ?, updated_at = ? WHERE id = ?",
        )
        .bind(appointment.scheduled_at)
        .bind(appointment.status.as_str())
        .bind(notes_ct)
        .bind(notes_nonce)
        .bind(appointment.duration_minutes)
        .bind(appointment.modality.map(|m| m.as_str()))
        .bind(Utc::now())
        .bind(appointment.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Consulta {}", appointment.id)));
        }
        Ok(())
    }

    /// Remove a consulta. Retorna `false` se ela não existia.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Verifica se o profissional tem consulta agendada ou confirmada a até
    /// uma janela de distância (limites inclusivos) de `at`.
    ///
    /// `exclude` ignora uma consulta específica, usado no reagendamento.
    pub async fn has_conflict(
        &self,
        professional_id: Uuid,
        at: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<bool, DbError> {
        let window = availability_window();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments \
             WHERE professional_id = ? \
             AND status IN (?, ?) \
             AND scheduled_at >= ? AND scheduled_at <= ? \
             AND (? IS NULL OR id != ?)",
        )
        .bind(professional_id)
        .bind(AppointmentStatus::Scheduled.as_str())
        .bind(AppointmentStatus::Confirmed.as_str())
        .bind(at - window)
        .bind(at + window)
        .bind(exclude)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn is_available(
        &self,
        professional_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        Ok(!self.has_conflict(professional_id, at, None).await?)
    }
}
