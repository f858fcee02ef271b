//! Runtime configuration read from the environment.
//! Defaults target a backend started locally with `manage.py runserver`.

use std::time::Duration;
use std::{fs, path::Path};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin without trailing slash; API paths are appended to it.
    pub api_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Global per-request timeout.
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let api_url = non_blank_var("ESCALA_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        // Prefer env var; fallback to password.txt in working directory
        let password = non_blank_var("ESCALA_PASSWORD").or_else(|| match fs::read_to_string(Path::new("password.txt")) {
            Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        });

        let timeout_secs = match std::env::var("ESCALA_TIMEOUT_SECS") {
            Ok(s) if !s.trim().is_empty() => s
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| "ESCALA_TIMEOUT_SECS must be a positive number of seconds".to_string())?,
            _ => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            api_url,
            username: non_blank_var("ESCALA_USERNAME"),
            password,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Username and password, or an error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str), String> {
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| "Missing username: set ESCALA_USERNAME".to_string())?;
        let password = self.password.as_deref().ok_or_else(|| {
            "Missing password: set ESCALA_PASSWORD or provide password.txt in working directory".to_string()
        })?;
        Ok((username, password))
    }
}

fn non_blank_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
