use chrono::{DateTime, Utc};
use saude_db::models::{Appointment, AppointmentStatus, Modality, NewAppointment, UserRole};
use saude_db::repository::{AppointmentFilter, AppointmentRepository, UserRepository};
use tracing::info;
use uuid::Uuid;

use super::{ensure_patient, ensure_professional};
use crate::auth::AuthUser;
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct ScheduleInput {
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub modality: Option<Modality>,
    pub notes: Option<String>,
}

/// `upcoming` tem precedência sobre o intervalo `from`/`to`
#[derive(Debug, Clone, Default)]
pub struct AppointmentListQuery {
    pub upcoming: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn unavailable() -> ApiError {
    ApiError::BadRequest("Horário indisponível para este profissional".to_string())
}

#[derive(Clone)]
pub struct AppointmentService {
    appointments: AppointmentRepository,
    users: UserRepository,
}

impl AppointmentService {
    pub fn new(appointments: AppointmentRepository, users: UserRepository) -> Self {
        Self {
            appointments,
            users,
        }
    }

    /// Agenda uma consulta do profissional autenticado.
    ///
    /// A disponibilidade é lida antes da gravação, sem bloqueio: dois
    /// agendamentos simultâneos para o mesmo horário podem ambos passar.
    pub async fn schedule(
        &self,
        auth: &AuthUser,
        input: ScheduleInput,
    ) -> Result<Appointment, ApiError> {
        auth.require(&[UserRole::Professional])?;
        ensure_patient(&self.users, input.patient_id).await?;

        let appointment = Appointment::schedule(
            NewAppointment {
                patient_id: input.patient_id,
                professional_id: auth.id,
                scheduled_at: input.scheduled_at,
                duration_minutes: input.duration_minutes,
                modality: input.modality,
                notes: input.notes,
            },
            Utc::now(),
        )?;

        if self
            .appointments
            .has_conflict(auth.id, input.scheduled_at, None)
            .await?
        {
            return Err(unavailable());
        }

        self.appointments.create(&appointment).await?;
        info!(
            "Consulta {} agendada para {} (profissional {})",
            appointment.id(),
            appointment.scheduled_at(),
            auth.id
        );
        Ok(appointment)
    }

    pub async fn list(
        &self,
        auth: &AuthUser,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, ApiError> {
        let mut filter = match auth.role {
            UserRole::Patient => AppointmentFilter {
                patient_id: Some(auth.id),
                ..Default::default()
            },
            UserRole::Professional => AppointmentFilter {
                professional_id: Some(auth.id),
                ..Default::default()
            },
            UserRole::Admin => return Err(ApiError::forbidden()),
        };

        if query.upcoming {
            filter.from = Some(Utc::now());
            filter.statuses = vec![AppointmentStatus::Scheduled, AppointmentStatus::Confirmed];
        } else {
            filter.from = query.from;
            filter.to = query.to;
        }

        Ok(self.appointments.find(&filter).await?)
    }

    pub async fn is_available(
        &self,
        professional_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ApiError> {
        ensure_professional(&self.users, professional_id).await?;
        Ok(self.appointments.is_available(professional_id, at).await?)
    }

    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> Result<Appointment, ApiError> {
        self.participant_appointment(auth, id).await
    }

    /// Qualquer participante pode confirmar
    pub async fn confirm(&self, auth: &AuthUser, id: Uuid) -> Result<Appointment, ApiError> {
        let mut appointment = self.participant_appointment(auth, id).await?;
        appointment.confirm()?;
        self.save(&appointment, "confirmada").await?;
        Ok(appointment)
    }

    pub async fn start(&self, auth: &AuthUser, id: Uuid) -> Result<Appointment, ApiError> {
        let mut appointment = self.owned_appointment(auth, id).await?;
        appointment.start()?;
        self.save(&appointment, "iniciada").await?;
        Ok(appointment)
    }

    pub async fn complete(
        &self,
        auth: &AuthUser,
        id: Uuid,
        notes: Option<&str>,
    ) -> Result<Appointment, ApiError> {
        let mut appointment = self.owned_appointment(auth, id).await?;
        appointment.complete(notes)?;
        self.save(&appointment, "concluída").await?;
        Ok(appointment)
    }

    pub async fn cancel(
        &self,
        auth: &AuthUser,
        id: Uuid,
        reason: &str,
    ) -> Result<Appointment, ApiError> {
        let mut appointment = self.participant_appointment(auth, id).await?;
        appointment.cancel(reason)?;
        self.save(&appointment, "cancelada").await?;
        Ok(appointment)
    }

    /// Remarca a consulta. A disponibilidade é conferida ignorando a
    /// própria consulta.
    pub async fn reschedule(
        &self,
        auth: &AuthUser,
        id: Uuid,
        new_time: DateTime<Utc>,
    ) -> Result<Appointment, ApiError> {
        let mut appointment = self.owned_appointment(auth, id).await?;
        appointment.reschedule(new_time, Utc::now())?;

        if self
            .appointments
            .has_conflict(appointment.professional_id(), new_time, Some(id))
            .await?
        {
            return Err(unavailable());
        }

        self.save(&appointment, "remarcada").await?;
        Ok(appointment)
    }

    pub async fn delete(&self, auth: &AuthUser, id: Uuid) -> Result<(), ApiError> {
        let appointment = self.owned_appointment(auth, id).await?;
        self.appointments.delete(appointment.id()).await?;
        info!("Consulta removida: {}", id);
        Ok(())
    }

    async fn save(&self, appointment: &Appointment, action: &str) -> Result<(), ApiError> {
        self.appointments.update(appointment).await?;
        info!("Consulta {} {}", appointment.id(), action);
        Ok(())
    }

    async fn participant_appointment(
        &self,
        auth: &AuthUser,
        id: Uuid,
    ) -> Result<Appointment, ApiError> {
        let appointment = self
            .appointments
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Consulta não encontrada".to_string()))?;
        if !appointment.is_participant(auth.id) {
            return Err(ApiError::forbidden());
        }
        Ok(appointment)
    }

    /// Apenas o profissional da consulta
    async fn owned_appointment(&self, auth: &AuthUser, id: Uuid) -> Result<Appointment, ApiError> {
        auth.require(&[UserRole::Professional])?;
        let appointment = self.participant_appointment(auth, id).await?;
        if appointment.professional_id() != auth.id {
            return Err(ApiError::forbidden());
        }
        Ok(appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{database, patient, professional};
    use anyhow::Result;
    use chrono::{Duration, DurationRound};

    /// Amanhã às 10:00 UTC
    fn tomorrow_at_ten() -> DateTime<Utc> {
        let midnight = Utc::now()
            .duration_trunc(Duration::days(1))
            .expect("truncamento de data");
        midnight + Duration::days(1) + Duration::hours(10)
    }

    fn input(patient_id: Uuid, at: DateTime<Utc>) -> ScheduleInput {
        ScheduleInput {
            patient_id,
            scheduled_at: at,
            duration_minutes: Some(50),
            modality: Some(Modality::InPerson),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_schedule_respects_availability_window() -> Result<()> {
        let db = database().await?;
        let service = AppointmentService::new(db.appointments(), db.users());
        let pat = patient(&db, "c1@exemplo.com").await?;
        let pro = professional(&db, "c2@clinica.com").await?;
        let ten = tomorrow_at_ten();

        service.schedule(&pro, input(pat.id, ten)).await?;

        let half_past = service
            .schedule(&pro, input(pat.id, ten + Duration::minutes(30)))
            .await;
        match half_past {
            Err(ApiError::BadRequest(msg)) => assert!(msg.contains("indisponível")),
            other => panic!("resultado inesperado: {:?}", other.map(|a| a.id())),
        }

        service
            .schedule(&pro, input(pat.id, ten + Duration::minutes(150)))
            .await?;

        assert!(!service.is_available(pro.id, ten + Duration::hours(1)).await?);
        let just_outside = ten - Duration::hours(1) - Duration::seconds(1);
        assert!(service.is_available(pro.id, just_outside).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_schedule_guards() -> Result<()> {
        let db = database().await?;
        let service = AppointmentService::new(db.appointments(), db.users());
        let pat = patient(&db, "c3@exemplo.com").await?;
        let pro = professional(&db, "c4@clinica.com").await?;

        assert!(matches!(
            service.schedule(&pat, input(pat.id, tomorrow_at_ten())).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .schedule(&pro, input(Uuid::new_v4(), tomorrow_at_ten()))
                .await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            service
                .schedule(&pro, input(pat.id, Utc::now() - Duration::hours(1)))
                .await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            service.is_available(pat.id, tomorrow_at_ten()).await,
            Err(ApiError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_lifecycle_through_service() -> Result<()> {
        let db = database().await?;
        let service = AppointmentService::new(db.appointments(), db.users());
        let pat = patient(&db, "c5@exemplo.com").await?;
        let pro = professional(&db, "c6@clinica.com").await?;

        let appointment = service.schedule(&pro, input(pat.id, tomorrow_at_ten())).await?;
        let id = appointment.id();

        // Paciente não inicia consulta
        assert!(matches!(service.start(&pat, id).await, Err(ApiError::Forbidden(_))));
        // Iniciar sem confirmar viola a transição
        assert!(matches!(service.start(&pro, id).await, Err(ApiError::BadRequest(_))));

        assert_eq!(
            service.confirm(&pat, id).await?.status(),
            AppointmentStatus::Confirmed
        );
        service.start(&pro, id).await?;
        let done = service.complete(&pro, id, Some("Boa evolução")).await?;
        assert_eq!(done.status(), AppointmentStatus::Completed);
        assert_eq!(done.notes(), Some("Boa evolução"));

        assert!(matches!(
            service.cancel(&pat, id, "Imprevisto").await,
            Err(ApiError::BadRequest(_))
        ));
        assert_eq!(service.get(&pat, id).await?.status(), AppointmentStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn test_reschedule_excludes_itself() -> Result<()> {
        let db = database().await?;
        let service = AppointmentService::new(db.appointments(), db.users());
        let pat = patient(&db, "c7@exemplo.com").await?;
        let pro = professional(&db, "c8@clinica.com").await?;
        let ten = tomorrow_at_ten();

        let first = service.schedule(&pro, input(pat.id, ten)).await?;
        let second = service
            .schedule(&pro, input(pat.id, ten + Duration::hours(4)))
            .await?;

        // Mover 30 minutos dentro da própria janela é permitido
        let moved = service
            .reschedule(&pro, first.id(), ten + Duration::minutes(30))
            .await?;
        assert_eq!(moved.status(), AppointmentStatus::Scheduled);
        assert!(moved.notes().unwrap_or_default().contains("Reagendada para"));

        // Colidir com a outra consulta não é
        let clash = service
            .reschedule(&pro, first.id(), ten + Duration::hours(4))
            .await;
        assert!(matches!(clash, Err(ApiError::BadRequest(_))));
        let stored = service.get(&pro, first.id()).await?;
        assert_eq!(stored.scheduled_at(), ten + Duration::minutes(30));

        service.cancel(&pat, second.id(), "Viagem").await?;
        service
            .reschedule(&pro, first.id(), ten + Duration::hours(4))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_listing() -> Result<()> {
        let db = database().await?;
        let service = AppointmentService::new(db.appointments(), db.users());
        let pat = patient(&db, "c9@exemplo.com").await?;
        let other = patient(&db, "c10@exemplo.com").await?;
        let pro = professional(&db, "c11@clinica.com").await?;
        let ten = tomorrow_at_ten();

        let a = service.schedule(&pro, input(pat.id, ten)).await?;
        let b = service
            .schedule(&pro, input(other.id, ten + Duration::days(2)))
            .await?;
        service.cancel(&pro, b.id(), "Agenda cheia").await?;

        let mine = service.list(&pat, AppointmentListQuery::default()).await?;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id(), a.id());

        let all = service.list(&pro, AppointmentListQuery::default()).await?;
        assert_eq!(all.len(), 2);

        let upcoming = service
            .list(
                &pro,
                AppointmentListQuery {
                    upcoming: true,
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(upcoming.len(), 1);

        let ranged = service
            .list(
                &pro,
                AppointmentListQuery {
                    from: Some(ten + Duration::days(1)),
                    to: Some(ten + Duration::days(3)),
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].id(), b.id());

        assert!(matches!(
            service.get(&other, a.id()).await,
            Err(ApiError::Forbidden(_))
        ));
        Ok(())
    }
}
