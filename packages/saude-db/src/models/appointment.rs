//! Consultas: ciclo de vida e regra de disponibilidade

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Janela simétrica, em minutos, em torno de um horário dentro da qual
/// outra consulta ativa do mesmo profissional é considerada conflitante.
/// Os limites são inclusivos.
pub const AVAILABILITY_WINDOW_MINUTES: i64 = 60;

pub fn availability_window() -> Duration {
    Duration::minutes(AVAILABILITY_WINDOW_MINUTES)
}

/// Status possíveis de uma consulta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Agendamento inicial, pendente de confirmação
    Scheduled,
    /// Confirmado
    Confirmed,
    /// Consulta em andamento
    InProgress,
    /// Consulta concluída
    Completed,
    /// Cancelada
    Cancelled,
}

impl AppointmentStatus {
    /// Representação persistida no banco
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Rótulo usado em mensagens ao usuário
    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "agendada",
            AppointmentStatus::Confirmed => "confirmada",
            AppointmentStatus::InProgress => "em andamento",
            AppointmentStatus::Completed => "concluída",
            AppointmentStatus::Cancelled => "cancelada",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Status que ocupam o horário do profissional
    pub fn blocks_schedule(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "in_progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(DomainError::Validation(format!(
                "Valor de status inválido: {}",
                other
            ))),
        }
    }
}

/// Modalidade de atendimento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    InPerson,
    Online,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::InPerson => "in_person",
            Modality::Online => "online",
        }
    }
}

impl std::str::FromStr for Modality {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_person" => Ok(Modality::InPerson),
            "online" => Ok(Modality::Online),
            other => Err(DomainError::Validation(format!(
                "Modalidade inválida: {}",
                other
            ))),
        }
    }
}

/// Dados para agendar uma nova consulta
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub modality: Option<Modality>,
    pub notes: Option<String>,
}

/// Representa uma consulta entre paciente e profissional
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    pub(crate) id: Uuid,
    pub(crate) patient_id: Uuid,
    pub(crate) professional_id: Uuid,
    pub(crate) scheduled_at: DateTime<Utc>,
    pub(crate) status: AppointmentStatus,
    pub(crate) notes: Option<String>,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) modality: Option<Modality>,
    pub(crate) created_at: DateTime<Utc>,
}

impl Appointment {
    /// Cria uma consulta no estado inicial `SCHEDULED`.
    ///
    /// Falha se o horário estiver no passado em relação a `now` ou se a
    /// duração informada não for positiva.
    pub fn schedule(new: NewAppointment, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if new.scheduled_at < now {
            return Err(DomainError::PastDate("A data da consulta"));
        }
        if let Some(duration) = new.duration_minutes {
            if duration <= 0 {
                return Err(DomainError::Validation(
                    "A duração deve ser um número inteiro positivo (em minutos)".to_string(),
                ));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            professional_id: new.professional_id,
            scheduled_at: new.scheduled_at,
            status: AppointmentStatus::Scheduled,
            notes: new.notes.filter(|n| !n.trim().is_empty()),
            duration_minutes: new.duration_minutes,
            modality: new.modality,
            created_at: now,
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

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn duration_minutes(&self) -> Option<i32> {
        self.duration_minutes
    }

    pub fn modality(&self) -> Option<Modality> {
        self.modality
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Paciente ou profissional da consulta
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.professional_id == user_id
    }

    /// `SCHEDULED` → `CONFIRMED`
    pub fn confirm(&mut self) -> Result<(), DomainError> {
        self.advance(
            AppointmentStatus::Scheduled,
            AppointmentStatus::Confirmed,
            "confirmadas",
            "agendadas",
        )
    }

    /// `CONFIRMED` → `IN_PROGRESS`
    pub fn start(&mut self) -> Result<(), DomainError> {
        self.advance(
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            "iniciadas",
            "confirmadas",
        )
    }

    /// `IN_PROGRESS` → `COMPLETED`, anexando as observações finais
    pub fn complete(&mut self, notes: Option<&str>) -> Result<(), DomainError> {
        self.advance(
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
            "concluídas",
            "em andamento",
        )?;
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            self.add_notes(notes);
        }
        Ok(())
    }

    /// Cancela a partir de qualquer status não terminal
    pub fn cancel(&mut self, reason: &str) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::TerminalAppointment {
                action: "cancelar",
                current: self.status,
            });
        }
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "O motivo do cancelamento é obrigatório".to_string(),
            ));
        }

        self.status = AppointmentStatus::Cancelled;
        self.add_notes(&format!("Cancelamento: {}", reason.trim()));
        Ok(())
    }

    /// Move a consulta para `new_time` e volta o status para `SCHEDULED`
    pub fn reschedule(
        &mut self,
        new_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if new_time < now {
            return Err(DomainError::PastDate("A nova data"));
        }
        if self.status.is_terminal() {
            return Err(DomainError::TerminalAppointment {
                action: "reagendar",
                current: self.status,
            });
        }

        self.scheduled_at = new_time;
        self.status = AppointmentStatus::Scheduled;
        self.add_notes(&format!(
            "Reagendada para {}",
            new_time.format("%d/%m/%Y %H:%M UTC")
        ));
        Ok(())
    }

    /// Anexa uma observação, separada por quebra de linha das anteriores
    pub fn add_notes(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{}\n{}", existing, note),
            None => note.to_string(),
        });
    }

    /// Indica se esta consulta ocupa o horário `candidate` do profissional
    pub fn conflicts_with(&self, candidate: DateTime<Utc>) -> bool {
        let window = availability_window();
        let delta = self.scheduled_at.signed_duration_since(candidate);
        self.status.blocks_schedule() && delta <= window && delta >= -window
    }

    fn advance(
        &mut self,
        from: AppointmentStatus,
        to: AppointmentStatus,
        action: &'static str,
        expected: &'static str,
    ) -> Result<(), DomainError> {
        if self.status != from {
            return Err(DomainError::InvalidTransition {
                action,
                expected,
                current: self.status,
            });
        }
        self.status = to;
        Ok(())
    }
}
