//! Definições de erro para a biblioteca saude-db
//!
//! Este módulo define os tipos de erro usados pela biblioteca: erros de
//! domínio (regras de negócio) e erros de persistência.

use thiserror::Error;

use crate::models::AppointmentStatus;

/// Violações de regras de domínio
///
/// Todas representam entrada inválida do chamador e são sempre exibidas
/// com a mensagem original.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("Nível de humor deve estar entre 1 e 10 (recebido {0})")]
    IntensityOutOfRange(i64),

    #[error("A data limite não pode ser anterior à data de criação")]
    DueBeforeCreation,

    #[error("{0} não pode ser no passado")]
    PastDate(&'static str),

    #[error("Apenas consultas {expected} podem ser {action} (status atual: {})", .current.label())]
    InvalidTransition {
        action: &'static str,
        expected: &'static str,
        current: AppointmentStatus,
    },

    #[error("Não é possível {action} uma consulta {}", .current.label())]
    TerminalAppointment {
        action: &'static str,
        current: AppointmentStatus,
    },
}

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("Entidade não encontrada: {0}")]
    NotFound(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    #[error("Erro de criptografia: {0}")]
    CryptoError(String),

    #[error("Dados corrompidos: {0}")]
    CorruptRecord(String),

    #[error("Erro interno: {0}")]
    InternalError(String),
}

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(dbe) => {
                // SQLITE_CONSTRAINT_UNIQUE (2067), SQLITE_CONSTRAINT_PRIMARYKEY (1555),
                // SQLITE_CONSTRAINT_FOREIGNKEY (787), SQLITE_CONSTRAINT_CHECK (275)
                if let Some(code) = dbe.code() {
                    if matches!(code.as_ref(), "2067" | "1555" | "787" | "275" | "19") {
                        return DbError::ConstraintViolation(dbe.message().to_string());
                    }
                }
                DbError::QueryError(dbe.message().to_string())
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}

impl From<crate::crypto::CryptoError> for DbError {
    fn from(error: crate::crypto::CryptoError) -> Self {
        DbError::CryptoError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn test_transition_message_mentions_current_status() {
        let err = DomainError::InvalidTransition {
            action: "confirmadas",
            expected: "agendadas",
            current: AppointmentStatus::Completed,
        };
        let msg = err.to_string();
        assert!(msg.contains("agendadas"));
        assert!(msg.contains("concluída"));
    }
}
