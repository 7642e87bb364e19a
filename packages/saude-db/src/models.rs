//! Modelos de domínio compartilhados entre aplicações
//!
//! Cada entidade é um registro independente ligado a um paciente (e, quando
//! aplicável, a um profissional) por identificador. As transições de estado
//! são métodos explícitos que falham com [`DomainError`](crate::error::DomainError)
//! sem alterar o registro.

mod appointment;
mod mood;
mod task;
mod user;

pub use appointment::{
    availability_window, Appointment, AppointmentStatus, Modality, NewAppointment,
    AVAILABILITY_WINDOW_MINUTES,
};
pub use mood::{Intensity, MoodEntry, MoodKind, MoodStats, MoodSummary, MoodTrendPoint, NewMoodEntry};
pub use task::{NewTask, Task, TaskStatus};
pub use user::{
    normalize_email, NewUser, PatientProfile, ProfessionalProfile, Profile, ProfileUpdate, User,
    UserRole,
};
