//! Standalone HTTP client for the clinic staffing REST backend.
//!
//! - Blocking client using `ureq` (no async). The client is `Sync`, so one instance can
//!   be shared by scoped threads when several writes are fanned out at once.
//! - Session authentication is cookie based. The agent's cookie store (ureq `cookies`
//!   feature) keeps `sessionid` and `csrftoken` and replays them on every request.
//! - Every mutating call (POST/PATCH/DELETE) carries the `X-CSRFToken` header, read back
//!   from the `csrftoken` cookie after a `GET /api/auth/csrf/` bootstrap when needed.
//! - Responses are decoded through `serde_path_to_error`; a malformed payload fails with
//!   the JSON path of the offending field.

use chrono::NaiveDate;
use http::Method;
use log::{debug, warn};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::models::auth::{
    Credentials, EmailChange, PasswordChange, PasswordResetConfirm, PasswordResetRequest, UserEnvelope,
};
use crate::models::cadastros::*;
use crate::models::escala::*;

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";
const CSRF_PATH: &str = "/api/auth/csrf/";
pub const GENERIC_ERROR_MESSAGE: &str = "failed to communicate with the server";

#[derive(Debug)]
pub enum ApiError {
    /// The CSRF bootstrap completed but no `csrftoken` cookie was set.
    MissingCsrf,
    Transport(String),
    /// Non-2xx response. `detail` is the first message found in the error payload.
    Http { status: u16, detail: Option<String> },
    /// The response body did not match the expected schema.
    Decode { path: String, message: String },
}

impl ApiError {
    /// User-facing message: the server's own message when it sent one.
    pub fn message(&self) -> String {
        match self {
            ApiError::Http { detail: Some(d), .. } => d.clone(),
            ApiError::Http { detail: None, .. } => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ApiError::MissingCsrf => write!(f, "could not obtain a CSRF token"),
            ApiError::Transport(s) => write!(f, "transport error: {}", s),
            ApiError::Http { status, detail } => {
                write!(f, "http {}: {}", status, detail.as_deref().unwrap_or(GENERIC_ERROR_MESSAGE))
            }
            ApiError::Decode { path, message } => write!(f, "unexpected response at '{}': {}", path, message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Decode a JSON body, reporting the path of the first field that does not fit `T`.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|e| ApiError::Decode {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

/// First user-facing message in an error payload: `detail` first, then the first string
/// (or first string of an array) among the remaining fields, in payload order.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    let mut messages = Vec::new();
    if let Some(detail) = object.get("detail").and_then(|d| d.as_str()) {
        messages.push(detail);
    }
    for (key, field) in object {
        if key == "detail" {
            continue;
        }
        match field {
            serde_json::Value::String(s) => messages.push(s.as_str()),
            serde_json::Value::Array(items) => messages.extend(items.iter().filter_map(|i| i.as_str())),
            _ => {}
        }
    }

    messages
        .into_iter()
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

pub struct EscalaClient {
    agent: ureq::Agent,
    base_url: String,
}

impl EscalaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        let base_url: String = base_url.into();

        EscalaClient {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // =====================
    // Cookies and CSRF
    // =====================

    /// Current `csrftoken` cookie value, percent-decoded.
    pub fn csrf_token(&self) -> Option<String> {
        let jar = self.agent.cookie_jar_lock();
        let token = jar
            .iter()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| percent_decode_str(c.value()).decode_utf8_lossy().into_owned());
        jar.release();
        token
    }

    /// Return the CSRF token, fetching it first when the cookie is absent.
    /// Concurrent callers may bootstrap redundantly; they all read the same cookie back.
    pub fn ensure_csrf(&self) -> Result<String, ApiError> {
        if let Some(token) = self.csrf_token() {
            return Ok(token);
        }
        debug!("No CSRF cookie yet; bootstrapping via {}", CSRF_PATH);
        let url = self.url(CSRF_PATH);
        let req = self.decorate(self.agent.get(&url), None);
        self.finish(&Method::GET, CSRF_PATH, req.call())?;
        self.csrf_token().ok_or(ApiError::MissingCsrf)
    }

    /// Forget every cookie, including the session and CSRF token.
    pub fn clear_cookies(&self) {
        let mut jar = self.agent.cookie_jar_lock();
        jar.clear();
        jar.release();
    }

    // =====================
    // Request plumbing
    // =====================

    fn decorate<B>(&self, req: ureq::RequestBuilder<B>, csrf: Option<&str>) -> ureq::RequestBuilder<B> {
        let mut req = req.header("Accept", "application/json");
        if let Some(token) = csrf {
            req = req.header(CSRF_HEADER, token);
        }
        req
    }

    fn finish(
        &self,
        method: &Method,
        path: &str,
        result: Result<http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<String, ApiError> {
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!("{} {} -> {}", method, path, status.as_u16());

        if status.is_success() {
            Ok(body)
        } else {
            let detail = extract_error_message(&body);
            warn!(
                "{} {} failed with http {}: {}",
                method,
                path,
                status.as_u16(),
                detail.as_deref().unwrap_or("<no message>")
            );
            Err(ApiError::Http {
                status: status.as_u16(),
                detail,
            })
        }
    }

    fn get_raw(&self, path: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let url = self.url(path);
        let mut req = self.decorate(self.agent.get(&url), None);
        for (k, v) in query {
            req = req.query(*k, v.as_str());
        }
        self.finish(&Method::GET, path, req.call())
    }

    fn write_raw<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String, ApiError> {
        let csrf = self.ensure_csrf()?;
        let url = self.url(path);

        let result = if method == Method::DELETE {
            self.decorate(self.agent.delete(&url), Some(&csrf)).call()
        } else {
            let req = if method == Method::PATCH {
                self.agent.patch(&url)
            } else {
                self.agent.post(&url)
            };
            let req = self.decorate(req, Some(&csrf));
            match body {
                Some(b) => req.send_json(b),
                None => req.send_empty(),
            }
        };
        self.finish(&method, path, result)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        decode(&self.get_raw(path, query)?)
    }

    fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        decode(&self.write_raw(Method::POST, path, Some(body))?)
    }

    fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        decode(&self.write_raw(Method::PATCH, path, Some(body))?)
    }

    fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.write_raw::<()>(Method::DELETE, path, None).map(|_| ())
    }

    // =====================
    // Auth
    // =====================

    pub fn login(&self, credentials: &Credentials) -> Result<UserEnvelope, ApiError> {
        self.post_json("/api/auth/login", credentials)
    }

    pub fn get_me(&self) -> Result<UserEnvelope, ApiError> {
        self.get_json("/api/auth/me", &[])
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.write_raw::<()>(Method::POST, "/api/auth/logout", None).map(|_| ())
    }

    pub fn change_password(&self, change: &PasswordChange) -> Result<UserEnvelope, ApiError> {
        self.post_json("/api/auth/password/change", change)
    }

    pub fn change_email(&self, change: &EmailChange) -> Result<UserEnvelope, ApiError> {
        self.post_json("/api/auth/email/change", change)
    }

    /// Always answers 200 with a generic `detail`, whether or not the email exists.
    pub fn request_password_reset(&self, request: &PasswordResetRequest) -> Result<UserEnvelope, ApiError> {
        self.post_json("/api/auth/password/reset/", request)
    }

    pub fn confirm_password_reset(&self, confirm: &PasswordResetConfirm) -> Result<UserEnvelope, ApiError> {
        self.post_json("/api/auth/password/reset/confirm", confirm)
    }

    // =====================
    // Locais
    // =====================

    pub fn get_locais(&self) -> Result<Vec<Local>, ApiError> {
        self.get_json("/api/cadastros/locais/", &[])
    }

    pub fn create_local(&self, payload: &LocalPayload) -> Result<Local, ApiError> {
        self.post_json("/api/cadastros/locais/", payload)
    }

    pub fn update_local(&self, id: LocalId, payload: &LocalPayload) -> Result<Local, ApiError> {
        self.patch_json(&format!("/api/cadastros/locais/{}/", id.0), payload)
    }

    pub fn delete_local(&self, id: LocalId) -> Result<(), ApiError> {
        self.delete(&format!("/api/cadastros/locais/{}/", id.0))
    }

    // =====================
    // Salas
    // =====================

    pub fn get_salas(&self) -> Result<Vec<Sala>, ApiError> {
        self.get_json("/api/cadastros/salas/", &[])
    }

    pub fn create_sala(&self, payload: &SalaPayload) -> Result<Sala, ApiError> {
        self.post_json("/api/cadastros/salas/", payload)
    }

    pub fn update_sala(&self, id: SalaId, payload: &SalaPayload) -> Result<Sala, ApiError> {
        self.patch_json(&format!("/api/cadastros/salas/{}/", id.0), payload)
    }

    pub fn delete_sala(&self, id: SalaId) -> Result<(), ApiError> {
        self.delete(&format!("/api/cadastros/salas/{}/", id.0))
    }

    // =====================
    // Capacidades
    // =====================

    pub fn get_capacidades(&self) -> Result<Vec<CapacidadeSala>, ApiError> {
        self.get_json("/api/cadastros/capacidade-salas/", &[])
    }

    pub fn create_capacidade(&self, new: &NewCapacidadeSala) -> Result<CapacidadeSala, ApiError> {
        self.post_json("/api/cadastros/capacidade-salas/", new)
    }

    pub fn update_capacidade(&self, id: CapacidadeId, slot: &CapacidadeSala) -> Result<CapacidadeSala, ApiError> {
        self.patch_json(&format!("/api/cadastros/capacidade-salas/{}/", id.0), slot)
    }

    pub fn delete_capacidade(&self, id: CapacidadeId) -> Result<(), ApiError> {
        self.delete(&format!("/api/cadastros/capacidade-salas/{}/", id.0))
    }

    // =====================
    // Profissionais
    // =====================

    pub fn get_profissionais(&self) -> Result<Vec<Profissional>, ApiError> {
        self.get_json("/api/cadastros/profissionais/", &[])
    }

    pub fn create_profissional(&self, payload: &ProfissionalPayload) -> Result<Profissional, ApiError> {
        self.post_json("/api/cadastros/profissionais/", payload)
    }

    pub fn update_profissional(
        &self,
        id: ProfissionalId,
        payload: &ProfissionalPayload,
    ) -> Result<Profissional, ApiError> {
        self.patch_json(&format!("/api/cadastros/profissionais/{}/", id.0), payload)
    }

    // =====================
    // Premissas globais
    // =====================

    /// The collection holds at most one record.
    pub fn get_premissas(&self) -> Result<Option<PremissasGlobais>, ApiError> {
        let list: Vec<PremissasGlobais> = self.get_json("/api/cadastros/premissas-globais/", &[])?;
        Ok(list.into_iter().next())
    }

    pub fn create_premissas(&self, premissas: &PremissasGlobais) -> Result<PremissasGlobais, ApiError> {
        self.post_json("/api/cadastros/premissas-globais/", premissas)
    }

    pub fn update_premissas(
        &self,
        id: PremissasId,
        premissas: &PremissasGlobais,
    ) -> Result<PremissasGlobais, ApiError> {
        self.patch_json(&format!("/api/cadastros/premissas-globais/{}/", id.0), premissas)
    }

    // =====================
    // Escala (read-only preview)
    // =====================

    pub fn get_jobs(&self) -> Result<Vec<ExecucaoJob>, ApiError> {
        self.get_json("/api/escala/jobs/", &[])
    }

    pub fn get_alocacoes_from(&self, from: NaiveDate) -> Result<Vec<Alocacao>, ApiError> {
        self.get_json(
            "/api/escala/alocacoes/",
            &[("data_inicio", from.format("%Y-%m-%d").to_string())],
        )
    }

    pub fn get_trocas(&self) -> Result<Vec<Troca>, ApiError> {
        self.get_json("/api/escala/trocas/", &[])
    }

    pub fn get_estatisticas(&self, semanas: u32) -> Result<DashboardMetrics, ApiError> {
        self.get_json("/api/escala/alocacoes/estatisticas/", &[("semanas", semanas.to_string())])
    }
}
