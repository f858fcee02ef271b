//! Models for the `/api/auth/` endpoints.

use serde::{Deserialize, Serialize};

/// User object as sent by the backend. Every field is optional: older deployments
/// only send `name`, `email` and `role`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, alias = "isStaff")]
    pub is_staff: Option<bool>,
    #[serde(default, alias = "isSuperuser")]
    pub is_superuser: Option<bool>,
}

/// Envelope used by login, me and password change responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserEnvelope {
    #[serde(default)]
    pub user: Option<UserPayload>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Normalized user, with every fallback resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl User {
    pub fn from_payload(payload: UserPayload, fallback_username: &str) -> Self {
        let is_staff = payload.is_staff.unwrap_or(false);
        let is_superuser = payload.is_superuser.unwrap_or(false);

        let username = payload
            .username
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| fallback_username.to_string());
        let username = if username.is_empty() { "usuario".to_string() } else { username };

        let base_role = if is_staff || is_superuser { "admin" } else { "operador" };
        let role = payload
            .role
            .or_else(|| payload.roles.first().cloned())
            .unwrap_or_else(|| base_role.to_string());
        let roles = if payload.roles.is_empty() {
            vec![role.clone()]
        } else {
            payload.roles
        };

        User {
            id: payload.id.unwrap_or(0),
            name: payload.name.unwrap_or_else(|| username.clone()),
            email: payload.email.unwrap_or_default(),
            username,
            role,
            roles,
            permissions: payload.permissions,
            is_staff,
            is_superuser,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailChange {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Confirmation of a reset link: `uid` and `token` come from the emailed URL.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetConfirm {
    pub uid: String,
    pub token: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_payload_gets_fallbacks() {
        let payload: UserPayload =
            serde_json::from_str(r#"{"name":"Maria","email":"m@example.com","role":"admin"}"#).expect("parse");
        let user = User::from_payload(payload, "maria");
        assert_eq!(user.username, "maria");
        assert_eq!(user.name, "Maria");
        assert_eq!(user.role, "admin");
        assert_eq!(user.roles, vec!["admin".to_string()]);
        assert_eq!(user.id, 0);
    }

    #[test]
    fn staff_without_role_is_admin() {
        let payload: UserPayload = serde_json::from_str(r#"{"isStaff":true}"#).expect("parse");
        let user = User::from_payload(payload, "");
        assert_eq!(user.username, "usuario");
        assert_eq!(user.name, "usuario");
        assert_eq!(user.role, "admin");
        assert!(user.is_staff);
    }

    #[test]
    fn permissions_are_carried_as_sent() {
        let payload: UserPayload =
            serde_json::from_str(r#"{"username":"op","permissions":["view_reports"]}"#).expect("parse");
        let user = User::from_payload(payload, "op");
        assert_eq!(user.role, "operador");
        assert_eq!(user.permissions, vec!["view_reports".to_string()]);
        assert!(!user.is_staff && !user.is_superuser);
    }
}
