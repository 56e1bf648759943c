mod app;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::Arc,
};

use ps2cat_core::{
    auth::{Authenticator, CredentialStore},
    browser::Browser,
    catalog::{self, GameLibrary},
    config::{self, AppConfig},
    remote::{FirestoreStore, RemoteSync, RetryPolicy},
    selection::SelectionStore,
};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.log_dir())?;

    if !config.firebase.is_configured() {
        warn!("Firebase is not configured; remote games will fail to load");
    }

    let library = match &config.catalog_path {
        Some(path) => GameLibrary::new(catalog::load_records(path)?),
        None => GameLibrary::from_bundled()?,
    };
    info!(count = library.bundled_len(), "Catalog loaded");

    let mut browser = Browser::new(library, config.page_size, config.search_debounce());
    if let Err(err) = browser.attach_selection_store(SelectionStore::new(config.selection_path()))
    {
        warn!(?err, "Starting with an empty selection");
    }

    let store = Arc::new(FirestoreStore::new(config.firebase.clone()));
    let sync = RemoteSync::new(store, RetryPolicy::from_millis(&config.retry_delays_ms));
    let authenticator = Authenticator::new(config.firebase.clone(), config.admin_email.clone());
    let credentials = CredentialStore::new(config.credentials_path());

    let mut app = app::CatalogApp::new(
        browser,
        sync,
        authenticator,
        credentials,
        config.data_dir.clone(),
    );
    app.run().await
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("ps2cat.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
