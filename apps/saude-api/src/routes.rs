//! Montagem do roteador HTTP
//!
//! Rotas públicas: `/health`, `/api/auth/*`. Todas as demais exigem token
//! Bearer, resolvido pelo extrator [`crate::auth::AuthUser`] em cada handler.

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{appointments, auth, health, moods, tasks, users};
use crate::state::AppState;

/// Roteador completo da API, sem camadas de middleware
pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/validate-token", get(auth::validate_token))
        .route("/users/me", get(users::me).put(users::update_me))
        .route("/users/me/password", put(users::change_password))
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/patients", get(users::list_patients))
        .route(
            "/patients/:patient_id/moods",
            get(moods::patient_history),
        )
        .route(
            "/patients/:patient_id/moods/stats",
            get(moods::patient_stats),
        )
        .route("/moods", post(moods::record).get(moods::own_history))
        .route("/moods/stats", get(moods::own_stats))
        .route(
            "/moods/:id",
            axum::routing::patch(moods::update_notes).delete(moods::delete),
        )
        .route("/tasks", post(tasks::assign).get(tasks::list))
        .route("/tasks/overdue-sweep", post(tasks::sweep))
        .route("/tasks/:id", get(tasks::get).delete(tasks::delete))
        .route("/tasks/:id/complete", post(tasks::complete))
        .route("/tasks/:id/notes", post(tasks::add_note))
        .route("/tasks/:id/status", put(tasks::set_status))
        .route(
            "/appointments",
            post(appointments::schedule).get(appointments::list),
        )
        .route(
            "/appointments/availability",
            get(appointments::availability),
        )
        .route(
            "/appointments/:id",
            get(appointments::get).delete(appointments::delete),
        )
        .route("/appointments/:id/confirm", post(appointments::confirm))
        .route("/appointments/:id/start", post(appointments::start))
        .route("/appointments/:id/complete", post(appointments::complete))
        .route("/appointments/:id/cancel", post(appointments::cancel))
        .route("/appointments/:id/reschedule", post(appointments::reschedule));

    Router::new()
        .route("/health", get(health::check))
        .nest("/api", api)
        .with_state(state)
}

/// Camadas aplicadas de dentro para fora: limite de concorrência, CORS,
/// compressão e por último o trace de cada requisição.
///
/// `Router::layer` envolve cada rota separadamente, por isso o limite usa um
/// semáforo compartilhado: o teto vale para o servidor inteiro.
pub fn with_middleware(router: Router, max_concurrent_requests: usize) -> Router {
    router
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
