//! CRUD flows for locais, salas, profissionais and premissas globais.
//!
//! Each flow validates locally, performs the call and returns either the record or a
//! user-facing message.

use log::info;
use std::thread;

use crate::client::{ApiError, EscalaClient};
use crate::models::cadastros::*;
use crate::services::capacity::{create_default_capacity, saved_total};

fn user_message(context: &str, e: ApiError) -> String {
    format!("{}: {}", context, e.message())
}

/// Everything the locations screen shows, fetched together.
#[derive(Debug, Clone, Default)]
pub struct Overview {
    pub locais: Vec<Local>,
    pub salas: Vec<Sala>,
    pub capacidades: Vec<CapacidadeSala>,
}

impl Overview {
    pub fn salas_of(&self, local: LocalId) -> impl Iterator<Item = &Sala> {
        self.salas.iter().filter(move |s| s.local == local)
    }

    pub fn room_total(&self, sala: SalaId) -> u32 {
        saved_total(sala, &self.capacidades)
    }

    pub fn local_total(&self, local: LocalId) -> u32 {
        self.salas_of(local)
            .map(|s| self.room_total(s.id))
            .fold(0u32, u32::saturating_add)
    }

    pub fn local_of(&self, sala: SalaId) -> Option<&Local> {
        let sala = self.salas.iter().find(|s| s.id == sala)?;
        self.locais.iter().find(|l| l.id == sala.local)
    }
}

/// Fetch locais, salas and capacidades concurrently.
pub fn load_overview(client: &EscalaClient) -> Result<Overview, String> {
    let (locais, salas, capacidades) = thread::scope(|scope| {
        let locais = scope.spawn(|| client.get_locais());
        let salas = scope.spawn(|| client.get_salas());
        let capacidades = client.get_capacidades();
        (locais.join(), salas.join(), capacidades)
    });

    fn joined<T>(r: thread::Result<Result<T, ApiError>>) -> Result<T, ApiError> {
        r.unwrap_or_else(|_| Err(ApiError::Transport("fetch worker panicked".to_string())))
    }
    Ok(Overview {
        locais: joined(locais).map_err(|e| user_message("error loading locations", e))?,
        salas: joined(salas).map_err(|e| user_message("error loading rooms", e))?,
        capacidades: capacidades.map_err(|e| user_message("error loading capacities", e))?,
    })
}

// =====================
// Locais
// =====================

pub fn create_local(client: &EscalaClient, payload: &LocalPayload) -> Result<Local, String> {
    if payload.nome.as_deref().is_none_or(|n| n.trim().is_empty()) {
        return Err("location name is required".to_string());
    }
    let mut payload = payload.clone();
    payload.fill_default_turnos();
    let payload = payload.normalized()?;
    let local = client
        .create_local(&payload)
        .map_err(|e| user_message("error creating location", e))?;
    info!("Created location {} ({})", local.id.0, local.nome);
    Ok(local)
}

pub fn update_local(client: &EscalaClient, id: LocalId, payload: &LocalPayload) -> Result<Local, String> {
    let payload = payload.normalized()?;
    client
        .update_local(id, &payload)
        .map_err(|e| user_message("error updating location", e))
}

pub fn delete_local(client: &EscalaClient, id: LocalId) -> Result<(), String> {
    client
        .delete_local(id)
        .map_err(|e| user_message("error deleting location", e))?;
    info!("Deleted location {}", id.0);
    Ok(())
}

// =====================
// Salas
// =====================

/// Create a room and give it the default weekly capacity. Returns the room and the
/// reloaded capacity collection.
pub fn create_sala(client: &EscalaClient, payload: &SalaPayload) -> Result<(Sala, Vec<CapacidadeSala>), String> {
    if payload.local.is_none() {
        return Err("select a location for the room".to_string());
    }
    if payload.nome.as_deref().is_none_or(|n| n.trim().is_empty()) {
        return Err("room name is required".to_string());
    }
    let sala = client
        .create_sala(payload)
        .map_err(|e| user_message("error creating room", e))?;
    info!("Created room {} ({})", sala.id.0, sala.nome);

    let capacidades = create_default_capacity(client, sala.id)
        .map_err(|e| format!("room {} created, but default capacity failed: {}", sala.id.0, e))?;
    Ok((sala, capacidades))
}

pub fn update_sala(client: &EscalaClient, id: SalaId, payload: &SalaPayload) -> Result<Sala, String> {
    client
        .update_sala(id, payload)
        .map_err(|e| user_message("error updating room", e))
}

pub fn delete_sala(client: &EscalaClient, id: SalaId) -> Result<(), String> {
    client
        .delete_sala(id)
        .map_err(|e| user_message("error deleting room", e))?;
    info!("Deleted room {}", id.0);
    Ok(())
}

// =====================
// Profissionais
// =====================

pub fn list_profissionais(client: &EscalaClient) -> Result<Vec<Profissional>, String> {
    client
        .get_profissionais()
        .map_err(|e| user_message("error loading professionals", e))
}

pub fn create_profissional(client: &EscalaClient, payload: &ProfissionalPayload) -> Result<Profissional, String> {
    if payload.nome.as_deref().is_none_or(|n| n.trim().is_empty()) || payload.email.is_none() {
        return Err("name and email are required".to_string());
    }
    payload.validate()?;
    let p = client
        .create_profissional(payload)
        .map_err(|e| user_message("error creating professional", e))?;
    info!("Created professional {} ({})", p.id.0, p.nome);
    Ok(p)
}

pub fn update_profissional(
    client: &EscalaClient,
    id: ProfissionalId,
    payload: &ProfissionalPayload,
) -> Result<Profissional, String> {
    payload.validate()?;
    client
        .update_profissional(id, payload)
        .map_err(|e| user_message("error updating professional", e))
}

// =====================
// Premissas globais
// =====================

/// The stored premises, or the backend defaults when none were saved yet.
pub fn load_premissas(client: &EscalaClient) -> Result<PremissasGlobais, String> {
    Ok(client
        .get_premissas()
        .map_err(|e| user_message("error loading premises", e))?
        .unwrap_or_default())
}

/// PATCH when the record already exists, POST otherwise.
pub fn save_premissas(client: &EscalaClient, premissas: &PremissasGlobais) -> Result<PremissasGlobais, String> {
    premissas.validate()?;
    let saved = match premissas.id {
        Some(id) => client.update_premissas(id, premissas),
        None => client.create_premissas(premissas),
    }
    .map_err(|e| user_message("error saving premises", e))?;
    info!(
        "Saved premises (window={} weeks, hours={}, doubles={})",
        saved.janela_planejamento_semanas, saved.limite_horas_semana, saved.limite_dobras_semana
    );
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_server::{Reply, StubServer};
    use std::time::Duration;

    fn local(id: i64, nome: &str) -> Local {
        serde_json::from_value(serde_json::json!({
            "id": id, "nome": nome, "prioridade_cobertura": 1, "ativo": true
        }))
        .expect("local")
    }

    fn sala(id: i64, local: i64) -> Sala {
        Sala {
            id: SalaId(id),
            local: LocalId(local),
            nome: format!("Sala {}", id),
            ativa: true,
        }
    }

    fn cap(id: i64, sala: i64, dia: u8, turno: Turno, capacidade: u32) -> CapacidadeSala {
        CapacidadeSala {
            id: CapacidadeId(id),
            sala: SalaId(sala),
            dia_semana: Some(DiaSemana::try_from(dia).expect("day")),
            turno,
            capacidade,
            restricoes: String::new(),
        }
    }

    #[test]
    fn overview_totals_roll_up_rooms_into_locations() {
        let overview = Overview {
            locais: vec![local(1, "Centro"), local(2, "Norte")],
            salas: vec![sala(10, 1), sala(11, 1), sala(20, 2)],
            capacidades: vec![
                cap(1, 10, 0, Turno::Manha, 1),
                cap(2, 10, 0, Turno::Tarde, 2),
                cap(3, 11, 3, Turno::Manha, 1),
                cap(4, 20, 4, Turno::Tarde, 5),
            ],
        };
        assert_eq!(overview.salas_of(LocalId(1)).count(), 2);
        assert_eq!(overview.room_total(SalaId(10)), 3);
        assert_eq!(overview.local_total(LocalId(1)), 4);
        assert_eq!(overview.local_total(LocalId(2)), 5);
        assert_eq!(overview.local_of(SalaId(20)).map(|l| l.nome.as_str()), Some("Norte"));
        assert!(overview.local_of(SalaId(99)).is_none());
    }

    #[test]
    fn local_defaults_when_optional_fields_missing() {
        let l = local(3, "Sul");
        assert_eq!(l.tipo, LocalTipo::Evento);
        assert_eq!(l.area, "");
        assert_eq!(l.manha_inicio, None);
    }

    #[test]
    fn create_local_sends_default_shift_hours() {
        let server = StubServer::start(|req| match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/api/auth/csrf/") => Reply::empty(204).with_header("Set-Cookie", "csrftoken=t; Path=/"),
            ("POST", "/api/cadastros/locais/") => Reply::json(
                201,
                r#"{"id":7,"nome":"Centro","prioridade_cobertura":1,"ativo":true,"manha_inicio":"07:30:00"}"#,
            ),
            _ => Reply::json(404, r#"{"detail":"Not found."}"#),
        });
        let client = EscalaClient::new(server.base_url.clone(), Duration::from_secs(5));
        let payload = LocalPayload {
            nome: Some("Centro".into()),
            manha_inicio: Some("07:30:00".into()),
            ..Default::default()
        };
        let local = create_local(&client, &payload).expect("created");
        assert_eq!(local.id, LocalId(7));

        let sent = server.requests_to("POST", "/api/cadastros/locais/");
        assert_eq!(sent.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&sent[0].body).expect("json body");
        assert_eq!(body["manha_inicio"], "07:30");
        assert_eq!(body["manha_fim"], "14:00");
        assert_eq!(body["tarde_inicio"], "14:00");
        assert_eq!(body["sabado_inicio"], "09:00");
        assert_eq!(body["sabado_fim"], "14:00");

        let bad = LocalPayload {
            nome: Some("Norte".into()),
            tarde_inicio: Some("20:00".into()),
            tarde_fim: Some("14:00".into()),
            ..Default::default()
        };
        assert!(create_local(&client, &bad).is_err());
        assert_eq!(server.requests_to("POST", "/api/cadastros/locais/").len(), 1);
    }
}
