//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_initial_schema.sql
    r#"
    -- Usuários: campos comuns + campos específicos de cada papel
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('patient', 'professional', 'admin')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        birth_date TEXT,
        cpf TEXT UNIQUE,
        emergency_contact TEXT,
        history_ciphertext BLOB,
        history_nonce BLOB,
        crm TEXT UNIQUE,
        specialty TEXT,
        biography TEXT,
        available_hours TEXT -- JSON com lista de horários
    );

    -- Consultas (sem exclusão em cascata)
    CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        professional_id BLOB NOT NULL,
        scheduled_at TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('scheduled', 'confirmed', 'in_progress', 'completed', 'cancelled')),
        notes_ciphertext BLOB,
        notes_nonce BLOB,
        duration_minutes INTEGER CHECK (duration_minutes IS NULL OR duration_minutes > 0),
        modality TEXT CHECK (modality IS NULL OR modality IN ('in_person', 'online')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES users (id),
        FOREIGN KEY (professional_id) REFERENCES users (id)
    );

    -- Tarefas
    CREATE TABLE IF NOT EXISTS tasks (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        professional_id BLOB NOT NULL,
        description TEXT NOT NULL,
        created_at TEXT NOT NULL,
        due_at TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'overdue')),
        patient_notes_ciphertext BLOB,
        patient_notes_nonce BLOB,
        completed BOOLEAN NOT NULL DEFAULT 0,
        FOREIGN KEY (patient_id) REFERENCES users (id),
        FOREIGN KEY (professional_id) REFERENCES users (id)
    );

    -- Registros de humor
    CREATE TABLE IF NOT EXISTS mood_entries (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        recorded_at TEXT NOT NULL,
        mood TEXT NOT NULL CHECK (mood IN ('very_good', 'good', 'neutral', 'bad', 'very_bad')),
        intensity INTEGER NOT NULL CHECK (intensity BETWEEN 1 AND 10),
        notes_ciphertext BLOB,
        notes_nonce BLOB,
        FOREIGN KEY (patient_id) REFERENCES users (id)
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_users_role ON users (role);
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_professional_slot ON appointments (professional_id, scheduled_at);
    CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status);
    CREATE INDEX IF NOT EXISTS idx_tasks_patient_id ON tasks (patient_id);
    CREATE INDEX IF NOT EXISTS idx_tasks_professional_id ON tasks (professional_id);
    CREATE INDEX IF NOT EXISTS idx_tasks_due_status ON tasks (due_at, status);
    CREATE INDEX IF NOT EXISTS idx_mood_entries_patient_recorded ON mood_entries (patient_id, recorded_at);
    "#,
    // 002_key_material.sql
    r#"
    -- Salt da derivação da chave de dados (linha única)
    CREATE TABLE IF NOT EXISTS key_material (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        salt BLOB NOT NULL,
        created_at TEXT NOT NULL
    );
    "#,
];

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    let mut version: i64 = 0;
    match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => version = v,
        Err(e) => {
            // Pode ser a primeira execução
            error!("Erro ao obter versão do banco: {}", e);
        }
    }

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool.begin().await.with_context(|| {
            format!("Falha ao iniciar transação para migração {}", migration_version)
        })?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction.commit().await.with_context(|| {
            format!("Falha ao confirmar transação para migração {}", migration_version)
        })?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}
