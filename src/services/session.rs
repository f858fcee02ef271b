//! Session context for the admin client.
//!
//! The session moves `Unauthenticated -> Authenticating -> Authenticated` and back to
//! `Unauthenticated` on logout or failure. Callers own the `Session` and pass it to
//! whatever needs the logged-in user; there is no global auth state.

use log::{info, warn};
use std::fmt::{Display, Formatter};

use crate::client::{ApiError, EscalaClient};
use crate::models::auth::{
    Credentials, EmailChange, PasswordChange, PasswordResetConfirm, PasswordResetRequest, User, UserEnvelope,
};

/// Auth endpoints the session drives.
pub trait AuthBackend {
    fn login(&self, credentials: &Credentials) -> Result<UserEnvelope, ApiError>;
    fn me(&self) -> Result<UserEnvelope, ApiError>;
    /// Ends the server session and forgets local credentials, even on failure.
    fn logout(&self) -> Result<(), ApiError>;
    fn change_password(&self, change: &PasswordChange) -> Result<UserEnvelope, ApiError>;
    fn change_email(&self, change: &EmailChange) -> Result<UserEnvelope, ApiError>;
    fn request_password_reset(&self, request: &PasswordResetRequest) -> Result<UserEnvelope, ApiError>;
    fn confirm_password_reset(&self, confirm: &PasswordResetConfirm) -> Result<UserEnvelope, ApiError>;
}

impl AuthBackend for EscalaClient {
    fn login(&self, credentials: &Credentials) -> Result<UserEnvelope, ApiError> {
        EscalaClient::login(self, credentials)
    }

    fn me(&self) -> Result<UserEnvelope, ApiError> {
        self.get_me()
    }

    fn logout(&self) -> Result<(), ApiError> {
        let res = EscalaClient::logout(self);
        self.clear_cookies();
        res
    }

    fn change_password(&self, change: &PasswordChange) -> Result<UserEnvelope, ApiError> {
        EscalaClient::change_password(self, change)
    }

    fn change_email(&self, change: &EmailChange) -> Result<UserEnvelope, ApiError> {
        EscalaClient::change_email(self, change)
    }

    fn request_password_reset(&self, request: &PasswordResetRequest) -> Result<UserEnvelope, ApiError> {
        EscalaClient::request_password_reset(self, request)
    }

    fn confirm_password_reset(&self, confirm: &PasswordResetConfirm) -> Result<UserEnvelope, ApiError> {
        EscalaClient::confirm_password_reset(self, confirm)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated(User),
}

#[derive(Debug)]
pub enum SessionError {
    /// Rejected before any request was sent.
    Invalid(String),
    NotAuthenticated,
    /// The backend refused the operation; the message is ready for display.
    Rejected { message: String, source: ApiError },
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Invalid(m) => write!(f, "{}", m),
            SessionError::NotAuthenticated => write!(f, "not logged in"),
            SessionError::Rejected { message, .. } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Rejected { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Map an auth failure to a message: the server's own detail when present, otherwise a
/// fallback chosen by status.
fn rejected(source: ApiError, by_status: &[(u16, &str)], fallback: &str) -> SessionError {
    let message = match &source {
        ApiError::Http { detail: Some(d), .. } => d.clone(),
        ApiError::Http { status, detail: None } => by_status
            .iter()
            .find(|(s, _)| s == status)
            .map(|(_, m)| m.to_string())
            .unwrap_or_else(|| fallback.to_string()),
        other => other.message(),
    };
    SessionError::Rejected { message, source }
}

fn missing_user() -> SessionError {
    SessionError::Rejected {
        message: "server response without user".to_string(),
        source: ApiError::Decode {
            path: "user".to_string(),
            message: "missing field".to_string(),
        },
    }
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Authenticated(u) => Some(u),
            _ => None,
        }
    }

    pub fn require_user(&self) -> Result<&User, SessionError> {
        self.user().ok_or(SessionError::NotAuthenticated)
    }

    pub fn login<A: AuthBackend + ?Sized>(
        &mut self,
        api: &A,
        username: &str,
        password: &str,
    ) -> Result<User, SessionError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::Invalid("username and password are required".to_string()));
        }

        self.state = SessionState::Authenticating;
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let envelope = match api.login(&credentials) {
            Ok(e) => e,
            Err(e) => {
                self.state = SessionState::Unauthenticated;
                return Err(rejected(
                    e,
                    &[(429, "too many login attempts; wait a minute and try again")],
                    "invalid username or password, or service unavailable",
                ));
            }
        };
        let Some(payload) = envelope.user else {
            self.state = SessionState::Unauthenticated;
            return Err(missing_user());
        };

        let user = User::from_payload(payload, username);
        info!("Logged in as {} (role {})", user.username, user.role);
        self.state = SessionState::Authenticated(user.clone());
        Ok(user)
    }

    /// Resume an existing server session (cookie already present).
    pub fn restore<A: AuthBackend + ?Sized>(&mut self, api: &A) -> Result<User, SessionError> {
        self.state = SessionState::Authenticating;
        let payload = match api.me() {
            Ok(UserEnvelope { user: Some(p), .. }) => p,
            Ok(_) => {
                self.state = SessionState::Unauthenticated;
                return Err(missing_user());
            }
            Err(e) => {
                self.state = SessionState::Unauthenticated;
                return Err(rejected(e, &[], "session expired; log in again"));
            }
        };
        let user = User::from_payload(payload, "usuario");
        self.state = SessionState::Authenticated(user.clone());
        Ok(user)
    }

    /// Always ends unauthenticated; a failed server logout is only logged.
    pub fn logout<A: AuthBackend + ?Sized>(&mut self, api: &A) {
        if self.user().is_none() {
            return;
        }
        if let Err(e) = api.logout() {
            warn!("Logout request failed: {}", e);
        }
        self.state = SessionState::Unauthenticated;
        info!("Logged out");
    }

    pub fn change_password<A: AuthBackend + ?Sized>(
        &self,
        api: &A,
        old_password: &str,
        new_password: &str,
    ) -> Result<String, SessionError> {
        self.require_user()?;
        if old_password.trim().is_empty() || new_password.trim().is_empty() {
            return Err(SessionError::Invalid("current and new password are required".to_string()));
        }
        let change = PasswordChange {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        let envelope = api.change_password(&change).map_err(|e| {
            rejected(
                e,
                &[(403, "session expired or invalid CSRF token; log in again")],
                "could not change the password",
            )
        })?;
        Ok(envelope.detail.unwrap_or_else(|| "password changed".to_string()))
    }

    /// Update the email of the logged-in user. The session keeps its username, since the
    /// server reply only carries name, email and role.
    pub fn change_email<A: AuthBackend + ?Sized>(&mut self, api: &A, email: &str) -> Result<User, SessionError> {
        let username = self.require_user()?.username.clone();
        let email = email.trim();
        if !valid_email(email) {
            return Err(SessionError::Invalid("enter a valid email".to_string()));
        }
        let envelope = api
            .change_email(&EmailChange {
                email: email.to_string(),
            })
            .map_err(|e| rejected(e, &[], "could not update the email"))?;
        let Some(payload) = envelope.user else {
            return Err(missing_user());
        };

        let user = User::from_payload(payload, &username);
        info!("Email of {} changed to {}", user.username, user.email);
        self.state = SessionState::Authenticated(user.clone());
        Ok(user)
    }
}

fn valid_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

/// Ask for a reset link. Works without a session; the server answers the same way
/// whether or not the email is registered.
pub fn request_password_reset<A: AuthBackend + ?Sized>(api: &A, email: &str) -> Result<String, SessionError> {
    let email = email.trim();
    if !valid_email(email) {
        return Err(SessionError::Invalid("enter a valid email".to_string()));
    }
    let envelope = api
        .request_password_reset(&PasswordResetRequest {
            email: email.to_string(),
        })
        .map_err(|e| {
            rejected(
                e,
                &[(429, "too many reset requests; try again later")],
                "could not send the request right now",
            )
        })?;
    Ok(envelope
        .detail
        .unwrap_or_else(|| "if the email exists, reset instructions will be sent".to_string()))
}

/// Set a new password from the `uid` and `token` of a reset link.
pub fn confirm_password_reset<A: AuthBackend + ?Sized>(
    api: &A,
    uid: &str,
    token: &str,
    new_password: &str,
) -> Result<String, SessionError> {
    if uid.trim().is_empty() || token.trim().is_empty() {
        return Err(SessionError::Invalid("invalid or incomplete reset link".to_string()));
    }
    if new_password.trim().is_empty() {
        return Err(SessionError::Invalid("new password is required".to_string()));
    }
    let envelope = api
        .confirm_password_reset(&PasswordResetConfirm {
            uid: uid.trim().to_string(),
            token: token.trim().to_string(),
            new_password: new_password.to_string(),
        })
        .map_err(|e| rejected(e, &[], "could not reset the password"))?;
    Ok(envelope.detail.unwrap_or_else(|| "password reset".to_string()))
}
