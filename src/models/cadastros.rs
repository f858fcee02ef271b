//! Models for the `/api/cadastros/` collections (locais, salas, capacidades,
//! profissionais, premissas globais).
//!
//! Notes
//! - Records returned by the backend deserialize into strongly typed structs; a payload
//!   that does not match fails decoding instead of being patched up with defaults.
//! - Optional text fields that the backend stores as blank strings default to `""`.
//! - Write payloads are separate `*Payload` structs where every field is optional, so the
//!   same type serves POST (create) and PATCH (partial update).

use chrono::{NaiveDate, NaiveTime};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalaId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapacidadeId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfissionalId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PremissasId(pub i64);

// =====================
// Enums
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Turno {
    Manha,
    Tarde,
}

impl Turno {
    pub const ALL: [Turno; 2] = [Turno::Manha, Turno::Tarde];

    pub fn as_str(self) -> &'static str {
        match self {
            Turno::Manha => "manha",
            Turno::Tarde => "tarde",
        }
    }
}

impl fmt::Display for Turno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Turno {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "manha" => Ok(Turno::Manha),
            "tarde" => Ok(Turno::Tarde),
            other => Err(format!("unknown shift '{}': expected 'manha' or 'tarde'", other)),
        }
    }
}

/// Day of week, Monday-first: 0 = Monday ... 6 = Sunday.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DiaSemana(u8);

impl DiaSemana {
    pub const ALL: [DiaSemana; 7] = [
        DiaSemana(0),
        DiaSemana(1),
        DiaSemana(2),
        DiaSemana(3),
        DiaSemana(4),
        DiaSemana(5),
        DiaSemana(6),
    ];

    pub fn index(self) -> u8 {
        self.0
    }

    /// Monday to Friday.
    pub fn is_weekday(self) -> bool {
        self.0 <= 4
    }

    pub fn short_name(self) -> &'static str {
        match self.0 {
            0 => "Seg",
            1 => "Ter",
            2 => "Qua",
            3 => "Qui",
            4 => "Sex",
            5 => "Sáb",
            _ => "Dom",
        }
    }
}

impl TryFrom<u8> for DiaSemana {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 6 {
            Ok(DiaSemana(value))
        } else {
            Err(format!("invalid day of week {}: expected 0 (Monday) to 6 (Sunday)", value))
        }
    }
}

impl From<DiaSemana> for u8 {
    fn from(value: DiaSemana) -> Self {
        value.0
    }
}

impl fmt::Display for DiaSemana {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalTipo {
    Associacao,
    #[default]
    Evento,
    Clinica,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classificacao {
    Estagiaria,
    Mei,
    Freelancer,
}

/// Blank strings (and null) become `None`; anything else must parse as `T`.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => T::deserialize(serde::de::value::StrDeserializer::<D::Error>::new(s)).map(Some),
    }
}

/// DRF renders decimals as strings ("150.00"); older deployments return numbers.
fn decimal_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Text(s)) if s.trim().is_empty() => None,
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Number(n)) => Some(n.to_string()),
    })
}

// =====================
// Records
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Local {
    pub id: LocalId,
    pub nome: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub endereco: String,
    #[serde(default)]
    pub observacao: String,
    pub prioridade_cobertura: u16,
    #[serde(default)]
    pub tipo: LocalTipo,
    #[serde(default)]
    pub manha_inicio: Option<String>,
    #[serde(default)]
    pub manha_fim: Option<String>,
    #[serde(default)]
    pub tarde_inicio: Option<String>,
    #[serde(default)]
    pub tarde_fim: Option<String>,
    #[serde(default)]
    pub sabado_inicio: Option<String>,
    #[serde(default)]
    pub sabado_fim: Option<String>,
    pub ativo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sala {
    pub id: SalaId,
    pub local: LocalId,
    pub nome: String,
    pub ativa: bool,
}

/// One persisted (room, day, shift) capacity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacidadeSala {
    pub id: CapacidadeId,
    pub sala: SalaId,
    /// `None` for special-date records outside the weekly recurrence.
    #[serde(default)]
    pub dia_semana: Option<DiaSemana>,
    pub turno: Turno,
    pub capacidade: u32,
    #[serde(default)]
    pub restricoes: String,
}

/// Body of `POST /api/cadastros/capacidade-salas/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCapacidadeSala {
    pub sala: SalaId,
    pub dia_semana: DiaSemana,
    pub turno: Turno,
    pub capacidade: u32,
    pub restricoes: String,
}

impl NewCapacidadeSala {
    pub fn new(sala: SalaId, dia_semana: DiaSemana, turno: Turno, capacidade: u32) -> Self {
        NewCapacidadeSala {
            sala,
            dia_semana,
            turno,
            capacidade,
            restricoes: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profissional {
    pub id: ProfissionalId,
    pub nome: String,
    pub email: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub turno_preferencial: Option<Turno>,
    #[serde(default)]
    pub google_calendar_id: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub classificacao: Option<Classificacao>,
    #[serde(default, deserialize_with = "decimal_as_string")]
    pub valor_diaria: Option<String>,
    #[serde(default, deserialize_with = "decimal_as_string")]
    pub valor_salario_mensal: Option<String>,
    #[serde(default, deserialize_with = "decimal_as_string")]
    pub valor_vale_transporte: Option<String>,
    #[serde(default, deserialize_with = "decimal_as_string")]
    pub comissao_sabado: Option<String>,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub cnpj: String,
    #[serde(default)]
    pub celular: String,
    #[serde(default)]
    pub banco_nome: String,
    #[serde(default)]
    pub banco_agencia: String,
    #[serde(default)]
    pub banco_conta: String,
    #[serde(default)]
    pub link_contrato: String,
    #[serde(default)]
    pub nome_empresarial: String,
    #[serde(default)]
    pub endereco_empresa: String,
    #[serde(default)]
    pub cnae: String,
    #[serde(default)]
    pub inscricao_municipal: String,
    #[serde(default)]
    pub data_contrato: Option<NaiveDate>,
    pub carga_semanal_alvo: u16,
    pub limite_dobras_semana: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub locais_preferidos: Vec<LocalId>,
    #[serde(default)]
    pub locais_proibidos: Vec<LocalId>,
    #[serde(default = "default_true")]
    pub ativo: bool,
}

fn default_true() -> bool {
    true
}

/// The singleton global scheduling premises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremissasGlobais {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PremissasId>,
    pub janela_planejamento_semanas: u16,
    pub limite_dobras_semana: u16,
    pub limite_horas_semana: u16,
    #[serde(default)]
    pub politica_revezamento: String,
    pub confirmacao_diaria: bool,
    #[serde(default)]
    pub observacoes: String,
}

impl Default for PremissasGlobais {
    /// Backend model defaults.
    fn default() -> Self {
        PremissasGlobais {
            id: None,
            janela_planejamento_semanas: 4,
            limite_dobras_semana: 2,
            limite_horas_semana: 70,
            politica_revezamento: String::new(),
            confirmacao_diaria: true,
            observacoes: String::new(),
        }
    }
}

impl PremissasGlobais {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=12).contains(&self.janela_planejamento_semanas) {
            return Err("planning window must be between 1 and 12 weeks".to_string());
        }
        if !(1..=84).contains(&self.limite_horas_semana) {
            return Err("weekly hour limit must be between 1 and 84".to_string());
        }
        if self.limite_dobras_semana > 14 {
            return Err("weekly double-shift limit must be at most 14".to_string());
        }
        Ok(())
    }
}

// =====================
// Write payloads
// =====================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocalPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endereco: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observacao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioridade_cobertura: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<LocalTipo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manha_inicio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manha_fim: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tarde_inicio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tarde_fim: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sabado_inicio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sabado_fim: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
}

/// Shift hours a new location starts with: morning, afternoon and Saturday.
pub const DEFAULT_TURNOS: [(&str, &str); 3] = [("08:00", "14:00"), ("14:00", "20:00"), ("09:00", "14:00")];

/// Parse a shift boundary given as `HH:MM` (the backend also renders `HH:MM:SS`).
pub fn parse_shift_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{}': expected HH:MM", raw))
}

impl LocalPayload {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(nome) = &self.nome
            && nome.trim().is_empty()
        {
            return Err("location name cannot be empty".to_string());
        }
        if self.prioridade_cobertura == Some(0) {
            return Err("coverage priority must be at least 1".to_string());
        }
        for (label, inicio, fim) in self.turnos() {
            let inicio = inicio.map(parse_shift_time).transpose()?;
            let fim = fim.map(parse_shift_time).transpose()?;
            if let (Some(i), Some(f)) = (inicio, fim)
                && i >= f
            {
                return Err(format!("{} shift must start before it ends", label));
            }
        }
        Ok(())
    }

    fn turnos(&self) -> [(&'static str, Option<&str>, Option<&str>); 3] {
        [
            ("morning", self.manha_inicio.as_deref(), self.manha_fim.as_deref()),
            ("afternoon", self.tarde_inicio.as_deref(), self.tarde_fim.as_deref()),
            ("saturday", self.sabado_inicio.as_deref(), self.sabado_fim.as_deref()),
        ]
    }

    /// Validated copy with every shift boundary rewritten as `HH:MM`.
    pub fn normalized(&self) -> Result<LocalPayload, String> {
        self.validate()?;
        let mut out = self.clone();
        for field in [
            &mut out.manha_inicio,
            &mut out.manha_fim,
            &mut out.tarde_inicio,
            &mut out.tarde_fim,
            &mut out.sabado_inicio,
            &mut out.sabado_fim,
        ] {
            if let Some(raw) = field {
                *raw = parse_shift_time(raw)?.format("%H:%M").to_string();
            }
        }
        Ok(out)
    }

    /// Fill shift hours the caller left unset with [`DEFAULT_TURNOS`].
    pub fn fill_default_turnos(&mut self) {
        let [(mi, mf), (ti, tf), (si, sf)] = DEFAULT_TURNOS;
        for (field, default) in [
            (&mut self.manha_inicio, mi),
            (&mut self.manha_fim, mf),
            (&mut self.tarde_inicio, ti),
            (&mut self.tarde_fim, tf),
            (&mut self.sabado_inicio, si),
            (&mut self.sabado_fim, sf),
        ] {
            if field.is_none() {
                *field = Some(default.to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalaPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativa: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfissionalPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turno_preferencial: Option<Turno>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classificacao: Option<Classificacao>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor_diaria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor_salario_mensal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carga_semanal_alvo: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limite_dobras_semana: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locais_preferidos: Option<Vec<LocalId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locais_proibidos: Option<Vec<LocalId>>,
}

impl ProfissionalPayload {
    /// Client-side mirror of the backend serializer rules, so obviously invalid input is
    /// rejected before any request is sent.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(email) = &self.email
            && !email.contains('@')
        {
            return Err("invalid email".to_string());
        }
        if self.carga_semanal_alvo.is_some_and(|h| h > 70) {
            return Err("weekly target load must be at most 70 hours".to_string());
        }
        if self.limite_dobras_semana.is_some_and(|d| d > 14) {
            return Err("weekly double-shift limit must be at most 14".to_string());
        }

        let preferidos: BTreeSet<LocalId> = self.locais_preferidos.iter().flatten().copied().collect();
        if self.locais_proibidos.iter().flatten().any(|l| preferidos.contains(l)) {
            return Err("a location cannot be both preferred and forbidden".to_string());
        }

        if self.valor_diaria.is_some() && self.valor_salario_mensal.is_some() {
            return Err("set either a daily rate or a monthly salary, not both".to_string());
        }
        match self.classificacao {
            Some(Classificacao::Estagiaria) if self.valor_diaria.is_some() => {
                Err("interns do not use a daily rate".to_string())
            }
            Some(Classificacao::Estagiaria) if self.valor_salario_mensal.is_none() => {
                Err("interns must have a monthly salary".to_string())
            }
            Some(Classificacao::Mei | Classificacao::Freelancer) if self.valor_diaria.is_none() => {
                Err("MEI/freelancer professionals must have a daily rate".to_string())
            }
            _ => Ok(()),
        }
    }
}
