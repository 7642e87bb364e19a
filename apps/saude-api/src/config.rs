//! Configuração da aplicação lida de variáveis de ambiente

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use saude_db::DbConfig;

/// Formato da saída de logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Segredo HS256 dos tokens
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub database: DbConfig,
    /// `None` desativa a varredura periódica de tarefas atrasadas
    pub overdue_sweep_interval: Option<Duration>,
    pub max_concurrent_requests: usize,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Lê a configuração do ambiente do processo.
    /// O `.env` deve ter sido carregado antes, se existir.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbConfig::default();

        let jwt_secret = get("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET não definido"))?;
        let key_phrase = get("DATABASE_KEY")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("DATABASE_KEY não definido"))?;

        let jwt_expiry_hours: i64 = parse_or(&get, "JWT_EXPIRY_HOURS", 24)?;
        if jwt_expiry_hours <= 0 {
            bail!("JWT_EXPIRY_HOURS deve ser positivo");
        }

        let sweep_secs: u64 = parse_or(&get, "OVERDUE_SWEEP_INTERVAL_SECS", 300)?;

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("LOG_FORMAT inválido: {}", other),
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 3000)?,
            jwt_secret,
            jwt_expiry_hours,
            database: DbConfig {
                db_path: get("DATABASE_PATH").unwrap_or(defaults.db_path),
                key_phrase,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
                log_statements: parse_or(&get, "DATABASE_LOG_STATEMENTS", false)?,
            },
            overdue_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            max_concurrent_requests: parse_or(&get, "MAX_CONCURRENT_REQUESTS", 256)?,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Endereço inválido: {}:{}", self.host, self.port))
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Valor inválido para {}: {} ({})", key, raw, e)),
        None => Ok(default),
    }
}
