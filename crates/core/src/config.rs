//! Application configuration loaded from `config.toml` and `PS2CAT_*` variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory under the user's config/data roots used by the application.
pub const APP_DIR: &str = "ps2cat";

const CONFIG_FILE: &str = "config.toml";

const DEFAULT_CONFIG: &str = r#"# ps2cat configuration
#
# Every key can also be set through the environment, e.g.
#   PS2CAT_ADMIN_EMAIL=admin@example.com
#   PS2CAT_FIREBASE__API_KEY=...

# Games shown per page before the list grows.
page_size = 40
# Delay between the last keystroke and the search being applied.
search_debounce_ms = 200
# Backoff between remote fetch retries; one retry per entry.
retry_delays_ms = [1000, 2000, 4000]
# Only this identity may sign in and add games.
admin_email = ""
# Optional JSON catalog replacing the bundled one.
# catalog_path = "/path/to/roms_ps2.json"

[firebase]
api_key = ""
project_id = ""
collection = "jogos_novos"
"#;

/// Remote store and identity service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Web API key used by both the store and the identity service.
    pub api_key: String,
    /// Project hosting the document store.
    pub project_id: String,
    /// Collection holding the user-added games.
    pub collection: String,
    /// Base URL of the Firestore REST API.
    pub firestore_url: String,
    /// Base URL of the identity toolkit REST API.
    pub auth_url: String,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            collection: "jogos_novos".to_string(),
            firestore_url: "https://firestore.googleapis.com/v1".to_string(),
            auth_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
        }
    }
}

impl FirebaseConfig {
    /// Whether enough is configured to reach the remote store.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.project_id.trim().is_empty()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where selections, credentials and logs are written.
    pub data_dir: PathBuf,
    /// Optional catalog file used instead of the bundled dataset.
    pub catalog_path: Option<PathBuf>,
    /// Number of games added to the visible window per page.
    pub page_size: usize,
    /// Search debounce in milliseconds.
    pub search_debounce_ms: u64,
    /// Retry backoff schedule in milliseconds.
    pub retry_delays_ms: Vec<u64>,
    /// The single identity allowed to sign in.
    pub admin_email: String,
    /// Remote store settings.
    pub firebase: FirebaseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            catalog_path: None,
            page_size: 40,
            search_debounce_ms: 200,
            retry_delays_ms: vec![1000, 2000, 4000],
            admin_email: String::new(),
            firebase: FirebaseConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default config file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from an explicit file (which may be missing) layered under the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()).required(false))
            .add_source(
                config::Environment::with_prefix("PS2CAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let mut config: AppConfig = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.page_size = config.page_size.max(1);
        Ok(config)
    }

    /// Search debounce as a duration.
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// File holding the persisted selection.
    pub fn selection_path(&self) -> PathBuf {
        self.data_dir.join("selected_games.json")
    }

    /// File holding saved sign-in credentials.
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Location of the user config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Write the commented default config file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path())
}

fn write_default_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        write_default_config(path.clone())?;
        assert!(path.exists());

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.page_size, 40);
        assert_eq!(config.search_debounce(), Duration::from_millis(200));
        assert_eq!(config.retry_delays_ms, vec![1000, 2000, 4000]);
        assert_eq!(config.firebase.collection, "jogos_novos");
        assert!(!config.firebase.is_configured());
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
page_size = 0
admin_email = "admin@example.com"
data_dir = "/tmp/ps2cat-test"

[firebase]
api_key = "key"
project_id = "project"
"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.page_size, 1);
        assert_eq!(config.admin_email, "admin@example.com");
        assert_eq!(
            config.selection_path(),
            PathBuf::from("/tmp/ps2cat-test/selected_games.json")
        );
        assert!(config.firebase.is_configured());
        assert_eq!(config.firebase.collection, "jogos_novos");
        Ok(())
    }

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.page_size, 40);
        Ok(())
    }
}
