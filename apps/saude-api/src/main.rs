use anyhow::{Context, Result};
use saude_api::auth::TokenIssuer;
use saude_api::config::{AppConfig, LogFormat};
use saude_api::routes::{app_router, with_middleware};
use saude_api::state::AppState;
use saude_api::{built_info, sweeper};
use saude_db::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env é opcional
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    info!(
        "Iniciando {} v{} ({})",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::PROFILE
    );

    let db = Database::connect(&config.database).await?;
    let state = AppState::new(
        &db,
        TokenIssuer::new(&config.jwt_secret, config.jwt_expiry_hours),
    );

    let sweeper = match config.overdue_sweep_interval {
        Some(every) => Some(sweeper::spawn(state.tasks.clone(), every)),
        None => {
            warn!("Varredura periódica de tarefas desativada");
            None
        }
    };

    let app = with_middleware(app_router(state), config.max_concurrent_requests);
    let addr = config.bind_addr()?;
    info!("Servidor escutando em {}", addr);

    axum::Server::try_bind(&addr)
        .with_context(|| format!("Falha ao abrir {}", addr))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Erro no servidor HTTP")?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    db.pool().close().await;
    info!("Servidor encerrado");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Falha ao aguardar sinal de encerramento: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Sinal de encerramento recebido");
}
