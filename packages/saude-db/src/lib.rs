//! Saúde DB - Biblioteca de domínio e persistência da clínica de saúde mental
//!
//! Esta biblioteca fornece:
//! - Modelos de domínio (consultas, tarefas, registros de humor e usuários)
//!   com suas regras de ciclo de vida
//! - Repositórios SQLite para cada entidade
//! - Migrações automáticas do banco de dados
//! - Criptografia das anotações clínicas em texto livre

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use tracing::info;

pub mod crypto;
pub mod error;
pub mod migrations;
pub mod models;
pub mod repository;

use crypto::EncryptionKey;
use repository::{AppointmentRepository, MoodRepository, TaskRepository, UserRepository};

/// Configuração da conexão com o banco de dados
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Caminho para o arquivo SQLite
    pub db_path: String,
    /// Frase-senha da qual a chave de dados é derivada (Argon2id)
    pub key_phrase: String,
    /// Número máximo de conexões no pool
    pub max_connections: u32,
    /// Registra cada comando SQL executado
    pub log_statements: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: "data/saude-mental.db".to_string(),
            key_phrase: "".to_string(), // Vazio por segurança, deve ser definido explicitamente
            max_connections: 5,
            log_statements: false,
        }
    }
}

/// Inicializa o pool de conexões SQLite e aplica as migrações
pub async fn init_db_pool(config: &DbConfig) -> Result<SqlitePool> {
    let db_path = Path::new(&config.db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .context("Falha ao criar diretório para banco de dados")?;
        }
    }

    let mut connection_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true)
        .pragma("synchronous", "NORMAL");
    if !config.log_statements {
        connection_options = connection_options.disable_statement_logging();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connection_options)
        .await
        .context("Falha ao conectar ao banco de dados SQLite")?;

    migrations::run_migrations(&pool)
        .await
        .context("Falha ao aplicar migrações")?;

    info!("Banco de dados inicializado com sucesso: {}", config.db_path);
    Ok(pool)
}

/// Pool de conexões mais a chave de dados; ponto de entrada dos repositórios
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    key: Arc<EncryptionKey>,
}

impl Database {
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let pool = init_db_pool(config).await?;
        Self::from_pool(pool, &config.key_phrase).await
    }

    /// Usa um pool já migrado. Na primeira execução gera e grava o salt
    /// da derivação de chave.
    pub async fn from_pool(pool: SqlitePool, key_phrase: &str) -> Result<Self> {
        sqlx::query("INSERT OR IGNORE INTO key_material (id, salt, created_at) VALUES (1, ?, ?)")
            .bind(crypto::generate_salt().to_vec())
            .bind(Utc::now())
            .execute(&pool)
            .await
            .context("Falha ao registrar salt da chave de dados")?;

        let salt: Vec<u8> = sqlx::query_scalar("SELECT salt FROM key_material WHERE id = 1")
            .fetch_one(&pool)
            .await
            .context("Falha ao ler salt da chave de dados")?;

        let key = EncryptionKey::derive(key_phrase, &salt)
            .context("Falha ao derivar a chave de dados")?;

        Ok(Self {
            pool,
            key: Arc::new(key),
        })
    }

    /// Banco em memória com uma única conexão, para testes
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn in_memory() -> Result<Self> {
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        migrations::run_migrations(&pool).await?;
        Self::from_pool(pool, "frase-de-teste").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone(), self.key.clone())
    }

    pub fn appointments(&self) -> AppointmentRepository {
        AppointmentRepository::new(self.pool.clone(), self.key.clone())
    }

    pub fn tasks(&self) -> TaskRepository {
        TaskRepository::new(self.pool.clone(), self.key.clone())
    }

    pub fn moods(&self) -> MoodRepository {
        MoodRepository::new(self.pool.clone(), self.key.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_db_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");

        let config = DbConfig {
            db_path: db_path.to_string_lossy().to_string(),
            key_phrase: "test_password".to_string(),
            max_connections: 2,
            log_statements: true,
        };

        let db = Database::connect(&config).await?;

        let result: (i64,) = sqlx::query_as("SELECT 1").fetch_one(db.pool()).await?;
        assert_eq!(result.0, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_salt_is_stable_across_reconnects() -> Result<()> {
        let temp_dir = tempdir()?;
        let config = DbConfig {
            db_path: temp_dir.path().join("salt.db").to_string_lossy().to_string(),
            key_phrase: "frase".to_string(),
            ..Default::default()
        };

        let first = Database::connect(&config).await?;
        let salt_a: Vec<u8> = sqlx::query_scalar("SELECT salt FROM key_material")
            .fetch_one(first.pool())
            .await?;
        first.pool().close().await;

        let second = Database::connect(&config).await?;
        let salt_b: Vec<u8> = sqlx::query_scalar("SELECT salt FROM key_material")
            .fetch_one(second.pool())
            .await?;

        assert_eq!(salt_a, salt_b);
        assert_eq!(first.key.as_bytes(), second.key.as_bytes());
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_key_phrase_is_rejected() -> Result<()> {
        let temp_dir = tempdir()?;
        let config = DbConfig {
            db_path: temp_dir.path().join("empty.db").to_string_lossy().to_string(),
            ..Default::default()
        };

        assert!(Database::connect(&config).await.is_err());
        Ok(())
    }
}
