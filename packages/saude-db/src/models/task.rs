//! Tarefas atribuídas por profissionais aos pacientes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Status possíveis de uma tarefa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Completed,
    /// Prazo vencido sem conclusão; ainda pode ser concluída
    Overdue,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "overdue" => Ok(TaskStatus::Overdue),
            other => Err(DomainError::Validation(format!(
                "Status de tarefa inválido: {}",
                other
            ))),
        }
    }
}

/// Dados para criação de uma tarefa
#[derive(Debug, Clone)]
pub struct NewTask {
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// Tarefa de um paciente
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub(crate) id: Uuid,
    pub(crate) patient_id: Uuid,
    pub(crate) professional_id: Uuid,
    pub(crate) description: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) due_at: DateTime<Utc>,
    pub(crate) status: TaskStatus,
    pub(crate) patient_notes: Option<String>,
    pub(crate) completed: bool,
}

impl Task {
    pub fn new(new: NewTask) -> Result<Self, DomainError> {
        let description = new.description.trim();
        if description.is_empty() {
            return Err(DomainError::Validation("Descrição é obrigatória".to_string()));
        }
        if new.due_at < new.created_at {
            return Err(DomainError::DueBeforeCreation);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            professional_id: new.professional_id,
            description: description.to_string(),
            created_at: new.created_at,
            due_at: new.due_at,
            status: TaskStatus::Pending,
            patient_notes: None,
            completed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn patient_id(&self) -> Uuid {
        self.patient_id
    }

    pub fn professional_id(&self) -> Uuid {
        self.professional_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn patient_notes(&self) -> Option<&str> {
        self.patient_notes.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.professional_id == user_id
    }

    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed = true;
    }

    /// Define o status diretamente, sem checar transições.
    /// Usado para correções administrativas pelo profissional.
    pub fn update_status(&mut self, status: TaskStatus) {
        self.status = status;
        if status == TaskStatus::Completed {
            self.completed = true;
        }
    }

    pub fn add_note(&mut self, note: &str) {
        self.patient_notes = Some(match self.patient_notes.take() {
            Some(existing) => format!("{}\n{}", existing, note),
            None => note.to_string(),
        });
    }

    /// Aplica a regra de atraso: prazo vencido e tarefa não concluída.
    ///
    /// A regra é avaliada a cada chamada, então uma tarefa já `OVERDUE`
    /// continua retornando `true`.
    pub fn check_overdue(&mut self, now: DateTime<Utc>) -> bool {
        if now > self.due_at && self.status != TaskStatus::Completed {
            self.status = TaskStatus::Overdue;
            return true;
        }
        false
    }
}
