//! Varredura periódica de tarefas vencidas

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::services::TaskService;

/// Dispara a varredura em segundo plano a cada `every`.
///
/// A primeira execução acontece imediatamente. Falhas são registradas e a
/// varredura segue no próximo ciclo.
pub fn spawn(tasks: TaskService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Varredura de tarefas vencidas ativa (intervalo: {:?})", every);

        loop {
            ticker.tick().await;
            match tasks.sweep_overdue(Utc::now()).await {
                Ok(report) if report.updated > 0 => {
                    info!("{} tarefa(s) marcada(s) como vencida(s)", report.updated)
                }
                Ok(_) => debug!("Nenhuma tarefa vencida"),
                Err(e) => warn!("Falha na varredura de tarefas vencidas: {}", e),
            }
        }
    })
}
