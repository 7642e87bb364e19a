use saude_db::Database;

use crate::auth::TokenIssuer;
use crate::services::{AppointmentService, MoodService, TaskService, UserService};

/// Serviços compartilhados pelos handlers
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub moods: MoodService,
    pub tasks: TaskService,
    pub appointments: AppointmentService,
}

impl AppState {
    pub fn new(db: &Database, tokens: TokenIssuer) -> Self {
        Self {
            users: UserService::new(db.users(), tokens),
            moods: MoodService::new(db.moods(), db.users()),
            tasks: TaskService::new(db.tasks(), db.users()),
            appointments: AppointmentService::new(db.appointments(), db.users()),
        }
    }
}
