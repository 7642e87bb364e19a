//! API da clínica de saúde mental
//!
//! Camadas: `handlers` (HTTP e DTOs) chamam `services` (regras de acesso e
//! orquestração), que usam os repositórios de `saude_db`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;
pub mod sweeper;

/// Metadados de build gerados por `built`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
