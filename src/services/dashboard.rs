use chrono::NaiveDate;
use log::{debug, warn};
use std::thread;

use crate::client::{ApiError, EscalaClient};
use crate::models::escala::*;

/// Read-only snapshot of the scheduling side shown on the landing screen.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardPreview {
    pub latest_job: Option<ExecucaoJob>,
    pub upcoming_alocacoes: usize,
    pub pending_trocas: usize,
    /// `None` when the statistics endpoint failed; the rest of the preview still renders.
    pub metrics: Option<DashboardMetrics>,
}

/// Most recently started job.
pub fn latest_job(jobs: &[ExecucaoJob]) -> Option<&ExecucaoJob> {
    jobs.iter().max_by_key(|j| (j.iniciou_em, j.id.0))
}

pub fn count_upcoming(alocacoes: &[Alocacao], today: NaiveDate) -> usize {
    alocacoes.iter().filter(|a| a.data >= today).count()
}

pub fn count_pending(trocas: &[Troca]) -> usize {
    trocas.iter().filter(|t| t.status == StatusTroca::Registrada).count()
}

/// Professionals ordered by hours worked in the period, heaviest first.
pub fn by_workload(metrics: &DashboardMetrics) -> Vec<&ProfissionalStats> {
    let mut stats: Vec<_> = metrics.profissionais.iter().collect();
    stats.sort_by(|a, b| b.horas_total.cmp(&a.horas_total).then_with(|| a.nome.cmp(&b.nome)));
    stats
}

pub fn load_preview(client: &EscalaClient, today: NaiveDate, semanas: u32) -> Result<DashboardPreview, String> {
    let (jobs, alocacoes, trocas, metrics) = thread::scope(|scope| {
        let jobs = scope.spawn(|| client.get_jobs());
        let alocacoes = scope.spawn(|| client.get_alocacoes_from(today));
        let trocas = scope.spawn(|| client.get_trocas());
        let metrics = client.get_estatisticas(semanas);
        (jobs.join(), alocacoes.join(), trocas.join(), metrics)
    });

    fn joined<T>(r: thread::Result<Result<T, ApiError>>, what: &str) -> Result<T, String> {
        r.unwrap_or_else(|_| Err(ApiError::Transport("fetch worker panicked".to_string())))
            .map_err(|e| format!("error loading {}: {}", what, e.message()))
    }

    let jobs = joined(jobs, "jobs")?;
    let alocacoes = joined(alocacoes, "allocations")?;
    let trocas = joined(trocas, "swaps")?;
    let metrics = match metrics {
        Ok(m) => Some(m),
        Err(e) => {
            warn!("Statistics unavailable: {}", e);
            None
        }
    };
    debug!(
        "Dashboard: {} jobs, {} allocations from {}, {} swaps",
        jobs.len(),
        alocacoes.len(),
        today,
        trocas.len()
    );

    Ok(DashboardPreview {
        latest_job: latest_job(&jobs).cloned(),
        upcoming_alocacoes: count_upcoming(&alocacoes, today),
        pending_trocas: count_pending(&trocas),
        metrics,
    })
}
