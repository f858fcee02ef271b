pub mod models {
    pub mod auth;
    pub mod cadastros;
    pub mod escala;
}

pub mod client;
pub mod config;
pub mod grid;
pub mod utils;
#[cfg(test)]
mod stub_server;
pub mod services {
    pub mod cadastros;
    pub mod capacity;
    pub mod dashboard;
    pub mod session;
}

use crate::client::EscalaClient;
use crate::config::Config;
use crate::grid::WeeklyGrid;
use crate::models::auth::User;
use crate::models::cadastros::*;
use crate::services::capacity::{CapacityEditor, ReconcileError, weekly_summary};
use crate::services::session::{self, Session};
use crate::services::{cadastros, dashboard};
use crate::utils::{NoticeSlot, serde_enum_name};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "escala-admin", version, about = "Admin client for the escala scheduling backend")]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the logged-in user
    Me,
    /// Change the password of the logged-in user
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    /// Change the email of the logged-in user
    ChangeEmail {
        #[arg(long)]
        email: String,
    },
    /// Reset a forgotten password; works without credentials
    ResetPassword {
        #[command(subcommand)]
        action: ResetAction,
    },
    /// Locations
    Locais {
        #[command(subcommand)]
        action: LocaisAction,
    },
    /// Rooms
    Salas {
        #[command(subcommand)]
        action: SalasAction,
    },
    /// Professionals
    Profissionais {
        #[command(subcommand)]
        action: ProfissionaisAction,
    },
    /// Global scheduling premises
    Premissas {
        #[command(subcommand)]
        action: PremissasAction,
    },
    /// Weekly room capacity
    Capacidade {
        #[command(subcommand)]
        action: CapacidadeAction,
    },
    /// Scheduling overview: latest job, upcoming allocations, pending swaps
    Dashboard {
        #[arg(long, default_value_t = 4)]
        semanas: u32,
    },
}

#[derive(Debug, Subcommand)]
enum ResetAction {
    /// Email a reset link
    Request {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with the uid and token from the reset link
    Confirm {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        new: String,
    },
}

#[derive(Debug, Subcommand)]
enum LocaisAction {
    List,
    Create(LocalArgs),
    Update {
        id: i64,
        #[command(flatten)]
        fields: LocalArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Args)]
struct LocalArgs {
    #[arg(long)]
    nome: Option<String>,
    #[arg(long)]
    area: Option<String>,
    #[arg(long)]
    endereco: Option<String>,
    #[arg(long)]
    observacao: Option<String>,
    #[arg(long)]
    prioridade: Option<u16>,
    /// associacao, evento or clinica
    #[arg(long, value_parser = wire_value::<LocalTipo>)]
    tipo: Option<LocalTipo>,
    /// Morning shift as HH:MM-HH:MM
    #[arg(long, value_parser = shift_range)]
    manha: Option<(String, String)>,
    /// Afternoon shift as HH:MM-HH:MM
    #[arg(long, value_parser = shift_range)]
    tarde: Option<(String, String)>,
    /// Saturday shift as HH:MM-HH:MM
    #[arg(long, value_parser = shift_range)]
    sabado: Option<(String, String)>,
    #[arg(long)]
    ativo: Option<bool>,
}

impl From<LocalArgs> for LocalPayload {
    fn from(a: LocalArgs) -> Self {
        LocalPayload {
            nome: a.nome,
            area: a.area,
            endereco: a.endereco,
            observacao: a.observacao,
            prioridade_cobertura: a.prioridade,
            tipo: a.tipo,
            manha_inicio: a.manha.as_ref().map(|(i, _)| i.clone()),
            manha_fim: a.manha.map(|(_, f)| f),
            tarde_inicio: a.tarde.as_ref().map(|(i, _)| i.clone()),
            tarde_fim: a.tarde.map(|(_, f)| f),
            sabado_inicio: a.sabado.as_ref().map(|(i, _)| i.clone()),
            sabado_fim: a.sabado.map(|(_, f)| f),
            ativo: a.ativo,
        }
    }
}

#[derive(Debug, Subcommand)]
enum SalasAction {
    List,
    /// Create a room with the default Mon-Fri capacity
    Create {
        #[arg(long)]
        local: i64,
        #[arg(long)]
        nome: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        local: Option<i64>,
        #[arg(long)]
        nome: Option<String>,
        #[arg(long)]
        ativa: Option<bool>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum ProfissionaisAction {
    List,
    Create(ProfissionalArgs),
    Update {
        id: i64,
        #[command(flatten)]
        fields: ProfissionalArgs,
    },
}

#[derive(Debug, Args)]
struct ProfissionalArgs {
    #[arg(long)]
    nome: Option<String>,
    #[arg(long)]
    email: Option<String>,
    /// manha or tarde
    #[arg(long)]
    turno: Option<Turno>,
    /// estagiaria, mei or freelancer
    #[arg(long, value_parser = wire_value::<Classificacao>)]
    classificacao: Option<Classificacao>,
    #[arg(long)]
    valor_diaria: Option<String>,
    #[arg(long)]
    valor_salario_mensal: Option<String>,
    #[arg(long)]
    carga_semanal: Option<u16>,
    #[arg(long)]
    limite_dobras: Option<u16>,
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// Preferred location id (repeatable)
    #[arg(long = "preferido")]
    preferidos: Vec<i64>,
    /// Forbidden location id (repeatable)
    #[arg(long = "proibido")]
    proibidos: Vec<i64>,
}

impl From<ProfissionalArgs> for ProfissionalPayload {
    fn from(a: ProfissionalArgs) -> Self {
        let ids = |v: Vec<i64>| (!v.is_empty()).then(|| v.into_iter().map(LocalId).collect());
        ProfissionalPayload {
            nome: a.nome,
            email: a.email,
            turno_preferencial: a.turno,
            classificacao: a.classificacao,
            valor_diaria: a.valor_diaria,
            valor_salario_mensal: a.valor_salario_mensal,
            carga_semanal_alvo: a.carga_semanal,
            limite_dobras_semana: a.limite_dobras,
            tags: (!a.tags.is_empty()).then_some(a.tags),
            locais_preferidos: ids(a.preferidos),
            locais_proibidos: ids(a.proibidos),
        }
    }
}

#[derive(Debug, Subcommand)]
enum PremissasAction {
    Show,
    /// Update the premises; unset flags keep their stored value
    Set {
        #[arg(long)]
        janela_semanas: Option<u16>,
        #[arg(long)]
        limite_horas: Option<u16>,
        #[arg(long)]
        limite_dobras: Option<u16>,
        #[arg(long)]
        politica: Option<String>,
        #[arg(long)]
        confirmacao_diaria: Option<bool>,
        #[arg(long)]
        observacoes: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum CapacidadeAction {
    /// Grid of one room, or the weekly totals of every room
    Show { sala: Option<i64> },
    /// Edit the grid of a room and save it
    Set {
        sala: i64,
        /// Start from Mon-Fri 1 per shift
        #[arg(long)]
        default: bool,
        /// Start from an empty grid
        #[arg(long, conflicts_with = "default")]
        clear: bool,
        /// Cell edit such as `seg:manha=2` or `5:tarde=` (repeatable)
        #[arg(long = "cell", value_name = "DAY:SHIFT=VALUE")]
        cells: Vec<String>,
    },
}

/// `08:00-14:00` into its two boundaries; the times themselves are checked on submit.
fn shift_range(raw: &str) -> Result<(String, String), String> {
    raw.split_once('-')
        .map(|(i, f)| (i.trim().to_string(), f.trim().to_string()))
        .filter(|(i, f)| !i.is_empty() && !f.is_empty())
        .ok_or_else(|| format!("invalid shift '{}': expected HH:MM-HH:MM", raw))
}

/// clap parser for enums whose CLI spelling is their wire name.
fn wire_value<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
        .map_err(|_| format!("unknown value: {}", raw))
}

/// Print the outcome of an action the way a status line would show it.
fn report<T>(result: Result<T, String>, success: impl FnOnce(&T) -> String) -> Result<T, String> {
    let mut notice = NoticeSlot::default();
    notice.begin();
    match &result {
        Ok(v) => notice.success(success(v)),
        Err(e) => notice.error(e.clone()),
    }
    if let Some(n) = notice.current() {
        println!("{}", n);
    }
    result
}

fn run(command: Command) -> Result<(), String> {
    let cfg = Config::from_env()?;
    info!("Config loaded (api_url={}, timeout={}s)", cfg.api_url, cfg.timeout.as_secs());
    let client = EscalaClient::new(cfg.api_url.clone(), cfg.timeout);

    // Reset is for users who cannot log in.
    if let Command::ResetPassword { action } = command {
        return run_reset(&client, action);
    }

    let (username, password) = cfg.credentials()?;
    let mut session = Session::new();
    session
        .login(&client, username, password)
        .map_err(|e| format!("login failed: {}", e))?;

    let result = dispatch(&client, &mut session, command);
    session.logout(&client);
    result
}

fn run_reset(client: &EscalaClient, action: ResetAction) -> Result<(), String> {
    let result = match action {
        ResetAction::Request { email } => session::request_password_reset(client, &email),
        ResetAction::Confirm { uid, token, new } => session::confirm_password_reset(client, &uid, &token, &new),
    };
    report(result.map_err(|e| e.to_string()), |m| m.clone()).map(|_| ())
}

/// Run one command for the logged-in session. The backend decides what the user may do.
fn dispatch(client: &EscalaClient, session: &mut Session, command: Command) -> Result<(), String> {
    match command {
        Command::Me => {
            print_user(session.require_user().map_err(|e| e.to_string())?);
            Ok(())
        }
        Command::ChangePassword { current, new } => {
            let message = session
                .change_password(client, &current, &new)
                .map_err(|e| e.to_string());
            report(message, |m| m.clone()).map(|_| ())
        }
        Command::ChangeEmail { email } => {
            let user = session.change_email(client, &email).map_err(|e| e.to_string());
            report(user, |u| format!("email changed to {}", u.email)).map(|_| ())
        }
        Command::ResetPassword { action } => run_reset(client, action),
        Command::Locais { action } => run_locais(client, action),
        Command::Salas { action } => run_salas(client, action),
        Command::Profissionais { action } => run_profissionais(client, action),
        Command::Premissas { action } => run_premissas(client, action),
        Command::Capacidade { action } => run_capacidade(client, action),
        Command::Dashboard { semanas } => {
            let today = chrono::Local::now().date_naive();
            let preview = dashboard::load_preview(client, today, semanas)?;
            print_dashboard(&preview);
            Ok(())
        }
    }
}

fn run_locais(client: &EscalaClient, action: LocaisAction) -> Result<(), String> {
    match action {
        LocaisAction::List => {
            let overview = cadastros::load_overview(client)?;
            print_locais(&overview);
            Ok(())
        }
        LocaisAction::Create(args) => {
            report(cadastros::create_local(client, &args.into()), |l| {
                format!("location {} created (id {})", l.nome, l.id.0)
            })
            .map(|_| ())
        }
        LocaisAction::Update { id, fields } => {
            report(cadastros::update_local(client, LocalId(id), &fields.into()), |l| {
                format!("location {} updated", l.nome)
            })
            .map(|_| ())
        }
        LocaisAction::Delete { id } => {
            report(cadastros::delete_local(client, LocalId(id)), |_| format!("location {} deleted", id))
        }
    }
}

fn run_salas(client: &EscalaClient, action: SalasAction) -> Result<(), String> {
    match action {
        SalasAction::List => {
            let overview = cadastros::load_overview(client)?;
            print_salas(&overview);
            Ok(())
        }
        SalasAction::Create { local, nome } => {
            let payload = SalaPayload {
                local: Some(LocalId(local)),
                nome: Some(nome),
                ativa: Some(true),
            };
            report(cadastros::create_sala(client, &payload), |(s, _)| {
                format!("room {} created (id {}) with default Mon-Fri capacity", s.nome, s.id.0)
            })
            .map(|_| ())
        }
        SalasAction::Update { id, local, nome, ativa } => {
            let payload = SalaPayload {
                local: local.map(LocalId),
                nome,
                ativa,
            };
            report(cadastros::update_sala(client, SalaId(id), &payload), |s| {
                format!("room {} updated", s.nome)
            })
            .map(|_| ())
        }
        SalasAction::Delete { id } => {
            report(cadastros::delete_sala(client, SalaId(id)), |_| format!("room {} deleted", id))
        }
    }
}

fn run_profissionais(client: &EscalaClient, action: ProfissionaisAction) -> Result<(), String> {
    match action {
        ProfissionaisAction::List => {
            let list = cadastros::list_profissionais(client)?;
            print_profissionais(&list);
            Ok(())
        }
        ProfissionaisAction::Create(args) => {
            report(cadastros::create_profissional(client, &args.into()), |p| {
                format!("professional {} created (id {})", p.nome, p.id.0)
            })
            .map(|_| ())
        }
        ProfissionaisAction::Update { id, fields } => {
            report(
                cadastros::update_profissional(client, ProfissionalId(id), &fields.into()),
                |p| format!("professional {} updated", p.nome),
            )
            .map(|_| ())
        }
    }
}

fn run_premissas(client: &EscalaClient, action: PremissasAction) -> Result<(), String> {
    let mut premissas = cadastros::load_premissas(client)?;
    match action {
        PremissasAction::Show => {
            print_premissas(&premissas);
            Ok(())
        }
        PremissasAction::Set {
            janela_semanas,
            limite_horas,
            limite_dobras,
            politica,
            confirmacao_diaria,
            observacoes,
        } => {
            if let Some(v) = janela_semanas {
                premissas.janela_planejamento_semanas = v;
            }
            if let Some(v) = limite_horas {
                premissas.limite_horas_semana = v;
            }
            if let Some(v) = limite_dobras {
                premissas.limite_dobras_semana = v;
            }
            if let Some(v) = politica {
                premissas.politica_revezamento = v;
            }
            if let Some(v) = confirmacao_diaria {
                premissas.confirmacao_diaria = v;
            }
            if let Some(v) = observacoes {
                premissas.observacoes = v;
            }
            let saved = report(cadastros::save_premissas(client, &premissas), |_| "premises saved".to_string())?;
            print_premissas(&saved);
            Ok(())
        }
    }
}

fn run_capacidade(client: &EscalaClient, action: CapacidadeAction) -> Result<(), String> {
    let overview = cadastros::load_overview(client)?;
    match action {
        CapacidadeAction::Show { sala: None } => {
            print_weekly_summary(&overview.capacidades);
            Ok(())
        }
        CapacidadeAction::Show { sala: Some(id) } => {
            let sala = find_sala(&overview, SalaId(id))?;
            println!("{} (room {})", sala.nome, sala.id.0);
            print_grid(&WeeklyGrid::from_slots(sala.id, &overview.capacidades));
            println!("Saved total: {}", overview.room_total(sala.id));
            Ok(())
        }
        CapacidadeAction::Set {
            sala,
            default,
            clear,
            cells,
        } => {
            let sala = find_sala(&overview, SalaId(sala))?.id;

            let mut editor = CapacityEditor::new(overview.capacidades);
            editor.open(sala);
            if clear {
                editor.grid_mut().clear();
            }
            if default {
                editor.grid_mut().fill_default();
            }
            for cell in &cells {
                editor.grid_mut().apply_edit(cell)?;
            }

            print_grid(editor.grid());
            println!(
                "Filled total: {}  Saved total: {}",
                editor.filled_total(),
                editor.saved_total()
            );
            if editor.has_unsaved_changes() {
                println!("Grid differs from the saved capacity; saving now.");
            }

            let result = editor.submit(client);
            if let Some(notice) = editor.notice().current() {
                println!("{}", notice);
            }
            match result {
                Ok(outcome) => {
                    println!(
                        "created={} updated={} deleted={} unchanged={} saved_total={}",
                        outcome.created, outcome.updated, outcome.deleted, outcome.noops, outcome.saved_total
                    );
                    Ok(())
                }
                Err(ReconcileError::Partial { attempted, failures }) => {
                    for f in &failures {
                        warn!("{} failed: {}", f.op, f.error);
                    }
                    Err(format!("{} of {} capacity change(s) failed", failures.len(), attempted))
                }
                Err(e) => Err(e.to_string()),
            }
        }
    }
}

fn find_sala(overview: &cadastros::Overview, id: SalaId) -> Result<&Sala, String> {
    overview
        .salas
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| format!("room {} not found", id.0))
}

// =====================
// Output
// =====================

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}

fn print_user(user: &User) {
    println!("User:        {} ({})", user.username, user.name);
    println!("Email:       {}", user.email);
    println!("Role:        {} [{}]", user.role, user.roles.join(", "));
    println!("Staff:       {}  Superuser: {}", yes_no(user.is_staff), yes_no(user.is_superuser));
    let mut permissions = user.permissions.clone();
    permissions.sort();
    permissions.dedup();
    println!("Permissions: {}", permissions.len());
    for p in permissions {
        println!("  - {}", p);
    }
}

fn print_locais(overview: &cadastros::Overview) {
    println!("{:<5} {:<30} {:<12} {:<5} {:<6} {:>6} {:>9}", "ID", "Name", "Type", "Prio", "Active", "Rooms", "Capacity");
    for l in &overview.locais {
        println!(
            "{:<5} {:<30} {:<12} {:<5} {:<6} {:>6} {:>9}",
            l.id.0,
            l.nome,
            serde_enum_name(&l.tipo).unwrap_or_default(),
            l.prioridade_cobertura,
            yes_no(l.ativo),
            overview.salas_of(l.id).count(),
            overview.local_total(l.id)
        );
    }
}

fn print_salas(overview: &cadastros::Overview) {
    println!("{:<5} {:<25} {:<25} {:<6} {:>9}", "ID", "Room", "Location", "Active", "Capacity");
    for s in &overview.salas {
        let local = overview.local_of(s.id).map(|l| l.nome.as_str()).unwrap_or("-");
        println!(
            "{:<5} {:<25} {:<25} {:<6} {:>9}",
            s.id.0,
            s.nome,
            local,
            yes_no(s.ativa),
            overview.room_total(s.id)
        );
    }
}

fn print_profissionais(list: &[Profissional]) {
    println!("{:<5} {:<28} {:<30} {:<6} {:<11} {:>6} {:>7}", "ID", "Name", "Email", "Shift", "Class", "Hours", "Doubles");
    for p in list {
        println!(
            "{:<5} {:<28} {:<30} {:<6} {:<11} {:>6} {:>7}",
            p.id.0,
            p.nome,
            p.email,
            p.turno_preferencial.map(|t| t.as_str()).unwrap_or("-"),
            p.classificacao
                .and_then(|c| serde_enum_name(&c))
                .unwrap_or_else(|| "-".to_string()),
            p.carga_semanal_alvo,
            p.limite_dobras_semana
        );
    }
}

fn print_premissas(p: &PremissasGlobais) {
    println!("Planning window:     {} week(s)", p.janela_planejamento_semanas);
    println!("Weekly hour limit:   {}", p.limite_horas_semana);
    println!("Weekly double limit: {}", p.limite_dobras_semana);
    println!("Daily confirmation:  {}", yes_no(p.confirmacao_diaria));
    if !p.politica_revezamento.is_empty() {
        println!("Rotation policy:     {}", p.politica_revezamento);
    }
    if !p.observacoes.is_empty() {
        println!("Notes:               {}", p.observacoes);
    }
}

fn print_grid(grid: &WeeklyGrid) {
    println!("{:<5} {:>6} {:>6}", "Day", "Manhã", "Tarde");
    for row in grid.rows() {
        let show = |v: &str| if v.is_empty() { "-".to_string() } else { v.to_string() };
        println!(
            "{:<5} {:>6} {:>6}",
            row.dia_semana.short_name(),
            show(row.cell(Turno::Manha)),
            show(row.cell(Turno::Tarde))
        );
    }
}

fn print_weekly_summary(slots: &[CapacidadeSala]) {
    println!("{:<5} {:>6} {:>6}", "Day", "Manhã", "Tarde");
    for (dia, manha, tarde) in weekly_summary(slots) {
        println!("{:<5} {:>6} {:>6}", dia.short_name(), manha, tarde);
    }
    let special = slots.iter().filter(|s| s.dia_semana.is_none()).count();
    if special > 0 {
        println!("({} slot(s) without a weekday are not shown)", special);
    }
}

fn print_dashboard(preview: &dashboard::DashboardPreview) {
    match &preview.latest_job {
        Some(job) => println!(
            "Latest job:        {} {} (started {})",
            serde_enum_name(&job.tipo).unwrap_or_default(),
            serde_enum_name(&job.status).unwrap_or_default(),
            job.iniciou_em.format("%Y-%m-%d %H:%M")
        ),
        None => println!("Latest job:        -"),
    }
    println!("Upcoming allocations: {}", preview.upcoming_alocacoes);
    println!("Pending swaps:        {}", preview.pending_trocas);

    let Some(metrics) = &preview.metrics else {
        println!("Statistics unavailable");
        return;
    };
    println!(
        "\nWorkload {} to {} ({} week(s))",
        metrics.periodo.inicio, metrics.periodo.fim, metrics.periodo.semanas
    );
    println!("{:<28} {:>7} {:>6} {:>8}", "Professional", "Shifts", "Hours", "Doubles");
    for p in dashboard::by_workload(metrics) {
        println!("{:<28} {:>7} {:>6} {:>8}", p.nome, p.total_turnos, p.horas_total, p.dobras);
    }
}

// =====================
// .env loading
// =====================

#[derive(Debug)]
enum EnvSource {
    Explicit(PathBuf),
    Default(PathBuf),
}

/// Apply `explicit`, or `./.env` when it exists. Variables already set in the process
/// environment are left alone.
fn load_dotenv(explicit: Option<&Path>) -> Result<Option<EnvSource>, String> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        apply_env_file(path)?;
        return Ok(Some(EnvSource::Explicit(path.to_path_buf())));
    }

    let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
    let path = cwd.join(".env");
    if !path.is_file() {
        return Ok(None);
    }
    apply_env_file(&path)?;
    Ok(Some(EnvSource::Default(path)))
}

fn apply_env_file(path: &Path) -> Result<(), String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    for (n, line) in text.lines().enumerate() {
        let Some((key, value)) = parse_env_line(line).map_err(|e| format!("{}:{}: {}", path.display(), n + 1, e))?
        else {
            continue;
        };
        if std::env::var_os(key).is_none() {
            // Only called before any other thread exists.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

/// `KEY=value` with optional `export`, quotes and trailing comment. Blank and comment
/// lines yield `None`.
fn parse_env_line(line: &str) -> Result<Option<(&str, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let (key, raw) = line.split_once('=').ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    let raw = raw.trim();
    let value = match raw.chars().next() {
        Some(q @ ('"' | '\'')) => unquote(&raw[1..], q)?,
        _ => raw.split('#').next().unwrap_or_default().trim_end().to_string(),
    };
    Ok(Some((key, value)))
}

/// Body of a quoted value up to the closing `quote`. Backslash escapes only apply
/// inside double quotes. Only a comment may follow the closing quote.
fn unquote(body: &str, quote: char) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, ch)) = chars.next() {
        if ch == quote {
            let rest = body[i + ch.len_utf8()..].trim();
            if rest.is_empty() || rest.starts_with('#') {
                return Ok(out);
            }
            return Err(format!("unexpected characters after closing {} quote", quote));
        }
        if ch == '\\' && quote == '"' {
            let (_, escaped) = chars
                .next()
                .ok_or_else(|| "unterminated escape sequence in double-quoted value".to_string())?;
            out.push(match escaped {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
            continue;
        }
        out.push(ch);
    }
    Err(format!("unterminated {}-quoted value", if quote == '"' { "double" } else { "single" }))
}

fn main() {
    let cli = Cli::parse();
    let loaded_env = match load_dotenv(cli.env_file.as_deref()) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    match &loaded_env {
        Some(EnvSource::Explicit(path)) => info!("Environment loaded from CLI-specified .env file: {}", path.display()),
        Some(EnvSource::Default(path)) => info!("Environment loaded from default .env file: {}", path.display()),
        None => {}
    }

    info!(
        "escala-admin {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.command) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
