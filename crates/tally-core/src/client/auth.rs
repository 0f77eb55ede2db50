use crate::report::console;
use anyhow::Context;
use reqwest::header::SET_COOKIE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

pub type Cookies = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Source of login credentials when the backend needs a new session.
pub trait CredentialPrompt: Send + Sync {
    /// `None` means the user cancelled or no credentials are available.
    fn ask(&self) -> Option<Credentials>;
}

/// Asks on the terminal: email from stdin, password without echo.
pub struct InteractivePrompt;

impl CredentialPrompt for InteractivePrompt {
    fn ask(&self) -> Option<Credentials> {
        console::info("\n🔐 Authentication required\n");

        let email = loop {
            eprint!("Email: ");
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            let value = line.trim();
            if value.is_empty() {
                console::warn("This field is required.");
                continue;
            }
            break value.to_string();
        };

        let password = loop {
            let value = rpassword::prompt_password("Password: ").ok()?;
            if value.trim().is_empty() {
                console::warn("This field is required.");
                continue;
            }
            break value.trim().to_string();
        };

        Some(Credentials { email, password })
    }
}

/// Fixed credentials, e.g. taken from the environment in CI.
pub struct StaticPrompt(pub Option<Credentials>);

impl CredentialPrompt for StaticPrompt {
    fn ask(&self) -> Option<Credentials> {
        self.0.clone()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthFile {
    #[serde(default)]
    cookies: Option<Cookies>,
}

/// Session cookies cached on disk. Shared by every worker without locking:
/// writes are last-writer-wins and a valid cookie set is safe to overwrite.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent, unreadable, malformed or empty files all mean "no credentials".
    pub fn load(&self) -> Option<Cookies> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let file: AuthFile = match serde_json::from_str(&raw) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(event = "auth_file_malformed", path = %self.path.display(), error = %e);
                return None;
            }
        };
        file.cookies.filter(|c| !c.is_empty())
    }

    pub fn store(&self, cookies: &Cookies) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string(&AuthFile {
            cookies: Some(cookies.clone()),
        })?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoginError {
    #[error("Login succeeded but no session cookie received.")]
    NoSessionCookie,
    #[error("Login failed: {0}")]
    Rejected(String),
    #[error("Connection error: {0}")]
    Connection(String),
}

/// `POST /api/auth/sign-in/email`; returns the session cookies the backend set.
pub async fn sign_in(
    http: &reqwest::Client,
    backend_url: &str,
    creds: &Credentials,
) -> Result<Cookies, LoginError> {
    let resp = http
        .post(format!("{}/api/auth/sign-in/email", backend_url))
        .json(&serde_json::json!({
            "email": creds.email,
            "password": creds.password,
        }))
        .send()
        .await
        .map_err(|e| LoginError::Connection(e.to_string()))?;

    if resp.status() != reqwest::StatusCode::OK {
        let msg = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| "Invalid credentials".to_string());
        return Err(LoginError::Rejected(msg));
    }

    let cookies = parse_set_cookies(
        resp.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    );
    if cookies.is_empty() {
        return Err(LoginError::NoSessionCookie);
    }
    Ok(cookies)
}

/// Keeps the leading `name=value` of each `Set-Cookie` header.
pub fn parse_set_cookies<'a>(headers: impl Iterator<Item = &'a str>) -> Cookies {
    headers
        .filter_map(|h| {
            let pair = h.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn cookie_header(cookies: &Cookies) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}
