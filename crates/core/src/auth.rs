//! Administrator sign-in and saved credentials.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{config::FirebaseConfig, error::AuthError};

/// A signed-in administrator.
#[derive(Debug, Clone)]
pub struct Session {
    /// Signed-in email.
    pub email: String,
    /// Account id.
    pub user_id: String,
    /// Bearer token for store writes.
    pub id_token: String,
    /// When `id_token` stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the id token is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    email: String,
    local_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Signs the single authorised identity in against the identity service.
#[derive(Debug, Clone)]
pub struct Authenticator {
    client: Client,
    config: FirebaseConfig,
    admin_email: String,
}

impl Authenticator {
    /// Build an authenticator allowing only `admin_email`.
    pub fn new(config: FirebaseConfig, admin_email: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            config,
            admin_email: admin_email.into(),
        }
    }

    /// Validate input and the identity gate before any network call.
    pub fn check_identity(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if email.is_empty() || password.trim().is_empty() {
            return Err(AuthError::MissingFields);
        }
        if self.admin_email.trim().is_empty() || email != self.admin_email.trim() {
            return Err(AuthError::NotAuthorized);
        }
        Ok(())
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.check_identity(email, password)?;
        let email = email.trim();

        let url = format!(
            "{}/accounts:signInWithPassword",
            self.config.auth_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(AuthError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(AuthError::Network)?;
            let err = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => AuthError::from_code(&envelope.error.message),
                Err(_) => AuthError::Rejected(format!("status {}", status.as_u16())),
            };
            warn!(%email, %err, "Sign-in rejected");
            return Err(err);
        }

        let payload: SignInResponse = response.json().await.map_err(AuthError::Network)?;
        info!(email = %payload.email, "Signed in");
        Ok(session_from(payload, Utc::now()))
    }
}

fn session_from(payload: SignInResponse, now: DateTime<Utc>) -> Session {
    let lifetime = payload
        .expires_in
        .as_deref()
        .and_then(|secs| secs.parse::<i64>().ok())
        .unwrap_or(3600);
    Session {
        email: payload.email,
        user_id: payload.local_id,
        id_token: payload.id_token,
        expires_at: now + Duration::seconds(lifetime),
    }
}

/// Email and password remembered for silent sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Saved credentials in an owner-only file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved credentials, if both fields are present.
    pub fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let credentials: Credentials = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        if credentials.email.is_empty() || credentials.password.is_empty() {
            return Ok(None);
        }
        Ok(Some(credentials))
    }

    /// Persist credentials, readable only by the current user on Unix.
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let serialized =
            serde_json::to_vec(credentials).context("failed to serialize credentials")?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(&serialized)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    /// Forget saved credentials.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn authenticator(admin: &str) -> Authenticator {
        Authenticator::new(FirebaseConfig::default(), admin)
    }

    #[test]
    fn identity_gate_runs_before_network() {
        let auth = authenticator("admin@example.com");
        assert!(matches!(
            auth.check_identity("", "secret"),
            Err(AuthError::MissingFields)
        ));
        assert!(matches!(
            auth.check_identity("admin@example.com", ""),
            Err(AuthError::MissingFields)
        ));
        assert!(matches!(
            auth.check_identity("admin@example.com", "   "),
            Err(AuthError::MissingFields)
        ));
        assert!(matches!(
            auth.check_identity("someone@example.com", "secret"),
            Err(AuthError::NotAuthorized)
        ));
        assert!(auth.check_identity("  admin@example.com ", "secret").is_ok());
        assert!(matches!(
            authenticator("").check_identity("admin@example.com", "secret"),
            Err(AuthError::NotAuthorized)
        ));
    }

    #[test]
    fn session_expiry_follows_response() {
        let now = Utc::now();
        let session = session_from(
            SignInResponse {
                id_token: "token".to_string(),
                email: "admin@example.com".to_string(),
                local_id: "uid".to_string(),
                expires_in: Some("60".to_string()),
            },
            now,
        );
        assert!(session.is_valid_at(now + Duration::seconds(59)));
        assert!(!session.is_valid_at(now + Duration::seconds(60)));
    }

    #[test]
    fn credentials_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = CredentialStore::new(dir.path().join("creds").join("credentials.json"));
        assert_eq!(store.load()?, None);

        let credentials = Credentials {
            email: "admin@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        store.save(&credentials)?;
        assert_eq!(store.load()?, Some(credentials));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(store.path())?.permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear()?;
        assert_eq!(store.load()?, None);
        store.clear()?;
        Ok(())
    }
}
