//! Read-only models for the `/api/escala/` endpoints consumed by the dashboard preview.
//! The scheduling engine that produces them lives elsewhere; only the fields the
//! preview shows are modeled.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::cadastros::{LocalId, ProfissionalId, SalaId, Turno};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct AlocacaoId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct TrocaId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipoJob {
    GeracaoSemanal,
    ConfirmacaoDiaria,
    SyncGoogle,
    PublicacaoGoogle,
    Replanejamento,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusJob {
    Pendente,
    Executando,
    Concluido,
    Erro,
    Cancelado,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExecucaoJob {
    pub id: JobId,
    pub tipo: TipoJob,
    pub status: StatusJob,
    pub iniciou_em: DateTime<Utc>,
    #[serde(default)]
    pub terminou_em: Option<DateTime<Utc>>,
    #[serde(default)]
    pub diff_resumo: String,
    #[serde(default)]
    pub autor: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusAlocacao {
    Gerado,
    Revisado,
    Confirmado,
    Ajustado,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alocacao {
    pub id: AlocacaoId,
    pub profissional: ProfissionalId,
    pub local: LocalId,
    pub sala: SalaId,
    pub data: NaiveDate,
    pub turno: Turno,
    pub status: StatusAlocacao,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTroca {
    Registrada,
    Aplicada,
    Cancelada,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Troca {
    pub id: TrocaId,
    pub data: NaiveDate,
    pub turno: Turno,
    pub profissional_origem: ProfissionalId,
    pub profissional_destino: ProfissionalId,
    #[serde(default)]
    pub motivo: String,
    pub status: StatusTroca,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Periodo {
    pub inicio: NaiveDate,
    pub fim: NaiveDate,
    pub semanas: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfissionalStats {
    pub nome: String,
    pub total_turnos: u32,
    pub horas_total: u32,
    #[serde(default)]
    pub locais: BTreeMap<String, u32>,
    pub dobras: u32,
}

/// Response of `GET /api/escala/alocacoes/estatisticas/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardMetrics {
    pub periodo: Periodo,
    pub profissionais: Vec<ProfissionalStats>,
}
