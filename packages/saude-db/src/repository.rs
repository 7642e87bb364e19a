//! Repositórios SQLite
//!
//! Cada repositório carrega uma cópia do pool e da chave de dados. As
//! anotações em texto livre são criptografadas na escrita e abertas na
//! leitura; os modelos de domínio nunca veem os bytes cifrados.

mod appointments;
mod moods;
mod tasks;
mod users;

pub use appointments::{AppointmentFilter, AppointmentRepository};
pub use moods::MoodRepository;
pub use tasks::{TaskFilter, TaskRepository};
pub use users::UserRepository;

use std::str::FromStr;

use crate::error::{DbError, DomainError};

/// Converte um valor textual persistido de volta para o enum do domínio
fn parse_column<T>(value: &str) -> Result<T, DbError>
where
    T: FromStr<Err = DomainError>,
{
    value
        .parse()
        .map_err(|e: DomainError| DbError::CorruptRecord(e.to_string()))
}
