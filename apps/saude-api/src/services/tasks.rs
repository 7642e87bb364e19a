use chrono::{DateTime, Utc};
use saude_db::error::DomainError;
use saude_db::models::{NewTask, Task, TaskStatus, UserRole};
use saude_db::repository::{TaskFilter, TaskRepository, UserRepository};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::ensure_patient;
use crate::auth::AuthUser;
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct AssignTaskInput {
    pub patient_id: Uuid,
    pub description: String,
    pub due_at: DateTime<Utc>,
}

/// Resultado de uma varredura de tarefas atrasadas
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Tarefas que passaram de `PENDING` para `OVERDUE` nesta varredura
    pub updated: usize,
    pub tasks: Vec<Task>,
}

#[derive(Clone)]
pub struct TaskService {
    tasks: TaskRepository,
    users: UserRepository,
}

impl TaskService {
    pub fn new(tasks: TaskRepository, users: UserRepository) -> Self {
        Self { tasks, users }
    }

    pub async fn assign(&self, auth: &AuthUser, input: AssignTaskInput) -> Result<Task, ApiError> {
        auth.require(&[UserRole::Professional])?;
        ensure_patient(&self.users, input.patient_id).await?;

        let now = Utc::now();
        if input.due_at < now {
            return Err(DomainError::PastDate("A data limite").into());
        }

        let task = Task::new(NewTask {
            patient_id: input.patient_id,
            professional_id: auth.id,
            description: input.description,
            created_at: now,
            due_at: input.due_at,
        })?;
        self.tasks.create(&task).await?;

        info!("Tarefa {} atribuída ao paciente {}", task.id(), task.patient_id());
        Ok(task)
    }

    /// Paciente vê as próprias tarefas; profissional, as que atribuiu.
    /// Tarefas vencidas são reclassificadas antes de aplicar o filtro.
    pub async fn list(
        &self,
        auth: &AuthUser,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, ApiError> {
        let filter = match auth.role {
            UserRole::Patient => TaskFilter {
                patient_id: Some(auth.id),
                ..Default::default()
            },
            UserRole::Professional => TaskFilter {
                professional_id: Some(auth.id),
                ..Default::default()
            },
            UserRole::Admin => return Err(ApiError::forbidden()),
        };

        let now = Utc::now();
        let mut tasks = self.tasks.find(&filter).await?;
        for task in &mut tasks {
            self.refresh_overdue(task, now).await?;
        }

        if let Some(status) = status {
            tasks.retain(|t| t.status() == status);
        }
        Ok(tasks)
    }

    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> Result<Task, ApiError> {
        let mut task = self.participant_task(auth, id).await?;
        self.refresh_overdue(&mut task, Utc::now()).await?;
        Ok(task)
    }

    /// Paciente ou profissional responsável
    pub async fn complete(&self, auth: &AuthUser, id: Uuid) -> Result<Task, ApiError> {
        let mut task = self.participant_task(auth, id).await?;
        task.mark_completed();
        self.tasks.update(&task).await?;
        info!("Tarefa concluída: {}", id);
        Ok(task)
    }

    pub async fn add_note(&self, auth: &AuthUser, id: Uuid, note: &str) -> Result<Task, ApiError> {
        auth.require(&[UserRole::Patient])?;
        let note = note.trim();
        if note.is_empty() {
            return Err(ApiError::BadRequest("A nota não pode ser vazia".to_string()));
        }

        let mut task = self.participant_task(auth, id).await?;
        task.add_note(note);
        self.tasks.update(&task).await?;
        Ok(task)
    }

    pub async fn set_status(
        &self,
        auth: &AuthUser,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Task, ApiError> {
        auth.require(&[UserRole::Professional])?;
        let mut task = self.participant_task(auth, id).await?;
        task.update_status(status);
        self.tasks.update(&task).await?;
        info!("Status da tarefa {} alterado para {}", id, status);
        Ok(task)
    }

    pub async fn delete(&self, auth: &AuthUser, id: Uuid) -> Result<(), ApiError> {
        auth.require(&[UserRole::Professional])?;
        let task = self.participant_task(auth, id).await?;
        self.tasks.delete(task.id()).await?;
        info!("Tarefa removida: {}", id);
        Ok(())
    }

    /// Varredura disparada pela API
    pub async fn sweep(&self, auth: &AuthUser) -> Result<SweepReport, ApiError> {
        auth.require(&[UserRole::Professional, UserRole::Admin])?;
        self.sweep_overdue(Utc::now()).await
    }

    /// Varredura sem checagem de papel, usada pela tarefa periódica
    pub async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<SweepReport, ApiError> {
        let tasks = self.tasks.mark_overdue(now).await?;
        Ok(SweepReport {
            updated: tasks.len(),
            tasks,
        })
    }

    async fn participant_task(&self, auth: &AuthUser, id: Uuid) -> Result<Task, ApiError> {
        let task = self
            .tasks
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Tarefa não encontrada".to_string()))?;
        if !task.is_participant(auth.id) {
            return Err(ApiError::forbidden());
        }
        Ok(task)
    }

    /// Aplica a regra de atraso e grava só se o status mudou
    async fn refresh_overdue(&self, task: &mut Task, now: DateTime<Utc>) -> Result<(), ApiError> {
        let before = task.status();
        if task.check_overdue(now) && before != TaskStatus::Overdue {
            self.tasks.update(task).await?;
        }
        Ok(())
    }
}
