use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::parse_column;
use crate::crypto::{open_text, seal_text, EncryptionKey};
use crate::error::DbError;
use crate::models::{Task, TaskStatus};

const SELECT_TASK: &str = "SELECT id, patient_id, professional_id, description, created_at, \
     due_at, status, patient_notes_ciphertext, patient_notes_nonce, completed FROM tasks";

/// Critérios de busca de tarefas
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub patient_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

#[derive(FromRow)]
struct TaskRow {
    id: Uuid,
    patient_id: Uuid,
    professional_id: Uuid,
    description: String,
    created_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    status: String,
    patient_notes_ciphertext: Option<Vec<u8>>,
    patient_notes_nonce: Option<Vec<u8>>,
    completed: bool,
}

impl TaskRow {
    fn into_domain(self, key: &EncryptionKey) -> Result<Task, DbError> {
        Ok(Task {
            id: self.id,
            patient_id: self.patient_id,
            professional_id: self.professional_id,
            description: self.description,
            created_at: self.created_at,
            due_at: self.due_at,
            status: parse_column(&self.status)?,
            patient_notes: open_text(
                self.patient_notes_ciphertext,
                self.patient_notes_nonce,
                key,
            )?,
            completed: self.completed,
        })
    }
}

#[derive(Clone)]
pub struct TaskRepository {
    pool: SqlitePool,
    key: Arc<EncryptionKey>,
}

impl TaskRepository {
    pub fn new(pool: SqlitePool, key: Arc<EncryptionKey>) -> Self {
        Self { pool, key }
    }

    pub async fn create(&self, task: &Task) -> Result<(), DbError> {
        let (notes_ct, notes_nonce) = seal_text(task.patient_notes(), &self.key)?;

        sqlx::query(
            "INSERT INTO tasks (id, patient_id, professional_id, description, created_at, \
             due_at, status, patient_notes_ciphertext, patient_notes_nonce, completed) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id)
        .bind(task.patient_id)
        .bind(task.professional_id)
        .bind(&task.description)
        .bind(task.created_at)
        .bind(task.due_at)
        .bind(task.status.as_str())
        .bind(notes_ct)
        .bind(notes_nonce)
        .bind(task.completed)
        .execute(&self.pool)
        .await?;

        debug!("Tarefa gravada: {}", task.id);
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, DbError> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_TASK))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_domain(&self.key)).transpose()
    }

    /// Lista tarefas por prazo crescente
    pub async fn find(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_TASK);
        query.push(" WHERE 1 = 1");

        if let Some(patient_id) = filter.patient_id {
            query.push(" AND patient_id = ").push_bind(patient_id);
        }
        if let Some(professional_id) = filter.professional_id {
            query.push(" AND professional_id = ").push_bind(professional_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY due_at ASC");

        let rows: Vec<TaskRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.into_domain(&self.key)).collect()
    }

    /// Grava status, conclusão e notas do paciente
    pub async fn update(&self, task: &Task) -> Result<(), DbError> {
        let (notes_ct, notes_nonce) = seal_text(task.patient_notes(), &self.key)?;

        let result = sqlx::query(
            "UPDATE tasks SET status = ?, completed = ?, patient_notes_ciphertext = ?, \
             patient_notes_nonce = ? WHERE id = ?",
        )
        .bind(task.status.as_str())
        .bind(task.completed)
        .bind(notes_ct)
        .bind(notes_nonce)
        .bind(task.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Tarefa {}", task.id)));
        }
        Ok(())
    }

    /// Remove a tarefa. Retorna `false` se ela não existia.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Marca como `OVERDUE` toda tarefa pendente com prazo anterior a `now`.
    /// Retorna apenas as tarefas cujo status mudou nesta chamada.
    ///
    /// Um único `UPDATE ... RETURNING` adquire o lock de escrita de imediato,
    /// sem a promoção de leitura para escrita de uma transação adiada.
    pub async fn mark_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>, DbError> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "UPDATE tasks SET status = ? WHERE due_at < ? AND status = ? \
             RETURNING id, patient_id, professional_id, description, created_at, \
             due_at, status, patient_notes_ciphertext, patient_notes_nonce, completed",
        )
        .bind(TaskStatus::Overdue.as_str())
        .bind(now)
        .bind(TaskStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut tasks = rows
            .into_iter()
            .map(|r| r.into_domain(&self.key))
            .collect::<Result<Vec<_>, _>>()?;
        tasks.sort_by_key(|t| t.due_at());

        if !tasks.is_empty() {
            info!("{} tarefa(s) marcada(s) como atrasada(s)", tasks.len());
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use crate::test_support::{seed_patient, seed_professional};
    use crate::Database;
    use anyhow::Result;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 12, 0, 0).unwrap()
    }

    fn new_task(patient: Uuid, professional: Uuid, due: DateTime<Utc>) -> Task {
        Task::new(NewTask {
            patient_id: patient,
            professional_id: professional,
            description: "Praticar respiração diafragmática".to_string(),
            created_at: day(1),
            due_at: due,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_with_encrypted_notes() -> Result<()> {
        let db = Database::in_memory().await?;
        let patient = seed_patient(&db).await?;
        let professional = seed_professional(&db).await?;
        let repo = db.tasks();

        let mut task = new_task(patient, professional, day(8));
        repo.create(&task).await?;

        task.add_note("Consegui fazer pela manhã");
        task.mark_completed();
        repo.update(&task).await?;

        let stored = repo.find_by_id(task.id()).await?.expect("tarefa gravada");
        assert_eq!(stored, task);
        assert!(stored.is_completed());
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_marks_only_past_due_open_tasks() -> Result<()> {
        let db = Database::in_memory().await?;
        let patient = seed_patient(&db).await?;
        let professional = seed_professional(&db).await?;
        let repo = db.tasks();

        let late = new_task(patient, professional, day(8));
        let future = new_task(patient, professional, day(20));
        let mut done = new_task(patient, professional, day(5));
        done.mark_completed();
        for t in [&late, &future, &done] {
            repo.create(t).await?;
        }

        let swept = repo.mark_overdue(day(9)).await?;
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id(), late.id());
        assert_eq!(swept[0].status(), TaskStatus::Overdue);

        let stored = repo.find_by_id(late.id()).await?.expect("tarefa");
        assert_eq!(stored.status(), TaskStatus::Overdue);
        let stored_done = repo.find_by_id(done.id()).await?.expect("tarefa");
        assert_eq!(stored_done.status(), TaskStatus::Completed);
        let stored_future = repo.find_by_id(future.id()).await?.expect("tarefa");
        assert_eq!(stored_future.status(), TaskStatus::Pending);

        // Nova varredura: nada muda, nada é contado
        let again = repo.mark_overdue(day(9)).await?;
        assert!(again.is_empty());
        let stored = repo.find_by_id(late.id()).await?.expect("tarefa");
        assert_eq!(stored.status(), TaskStatus::Overdue);
        Ok(())
    }

    #[tokio::test]
    async fn test_reopened_task_is_swept_by_status() -> Result<()> {
        let db = Database::in_memory().await?;
        let patient = seed_patient(&db).await?;
        let professional = seed_professional(&db).await?;
        let repo = db.tasks();

        let mut reopened = new_task(patient, professional, day(5));
        reopened.mark_completed();
        reopened.update_status(TaskStatus::Pending);
        repo.create(&reopened).await?;

        // o status decide; a flag `completed` continua verdadeira
        let swept = repo.mark_overdue(day(9)).await?;
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].status(), TaskStatus::Overdue);
        assert!(swept[0].is_completed());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_on_shared_file() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config = crate::DbConfig {
            db_path: temp_dir.path().join("sweep.db").to_string_lossy().to_string(),
            key_phrase: "frase-de-teste".to_string(),
            max_connections: 4,
            log_statements: false,
        };
        let db = Database::connect(&config).await?;
        let patient = seed_patient(&db).await?;
        let professional = seed_professional(&db).await?;
        let repo = db.tasks();
        for d in 2..8 {
            repo.create(&new_task(patient, professional, day(d))).await?;
        }

        let (a, b, c, d) = tokio::join!(
            repo.mark_overdue(day(9)),
            repo.mark_overdue(day(9)),
            repo.mark_overdue(day(9)),
            repo.mark_overdue(day(9)),
        );
        let total = a?.len() + b?.len() + c?.len() + d?.len();
        // cada tarefa muda de status exatamente uma vez
        assert_eq!(total, 6);

        let pending = repo
            .find(&TaskFilter {
                status: Some(TaskStatus::Pending),
                ..Default::default()
            })
            .await?;
        assert!(pending.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_is_strict_at_due_instant() -> Result<()> {
        let db = Database::in_memory().await?;
        let patient = seed_patient(&db).await?;
        let professional = seed_professional(&db).await?;
        let repo = db.tasks();

        let task = new_task(patient, professional, day(8));
        repo.create(&task).await?;

        assert!(repo.mark_overdue(day(8)).await?.is_empty());
        assert_eq!(
            repo.mark_overdue(day(8) + Duration::seconds(1)).await?.len(),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_status_and_owner() -> Result<()> {
        let db = Database::in_memory().await?;
        let patient = seed_patient(&db).await?;
        let other_patient = seed_patient(&db).await?;
        let professional = seed_professional(&db).await?;
        let repo = db.tasks();

        let mut done = new_task(patient, professional, day(10));
        done.mark_completed();
        repo.create(&done).await?;
        repo.create(&new_task(patient, professional, day(3))).await?;
        repo.create(&new_task(other_patient, professional, day(4)))
            .await?;

        let mine = repo
            .find(&TaskFilter {
                patient_id: Some(patient),
                ..Default::default()
            })
            .await?;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].due_at(), day(3));

        let completed = repo
            .find(&TaskFilter {
                professional_id: Some(professional),
                status: Some(TaskStatus::Completed),
                ..Default::default()
            })
            .await?;
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id(), done.id());

        assert!(repo.delete(done.id()).await?);
        assert!(repo.find_by_id(done.id()).await?.is_none());
        Ok(())
    }
}
