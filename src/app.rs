use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use figment::{Figment, providers::Env};
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use tracing::info;

use crate::config::Config;
use crate::services::manager::ServiceManager;
use crate::services::web::WebService;
use crate::state::AppState;
use crate::store::postgres::PgStores;

/// Main application struct containing all necessary components.
pub struct App {
    config: Arc<Config>,
    app_state: AppState,
    service_manager: ServiceManager,
}

impl App {
    /// Create a new App instance with all necessary components initialized.
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config: Config = Figment::new().merge(Env::raw()).extract().context("Failed to load config")?;
        let config = Arc::new(config);

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect(&config.database_url)
            .await
            .context("Failed to create database pool")?;

        info!("database pool established");

        let stores = PgStores::new(db_pool);

        info!("Running database migrations...");
        stores.migrate().await.context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let app_state = AppState::new(stores, config.clone());

        Ok(App { config, app_state, service_manager: ServiceManager::new() })
    }

    /// Register the web service with the service manager.
    pub fn setup_services(&mut self) {
        let web_service = Box::new(WebService::new(self.config.port, self.app_state.clone()));
        self.service_manager.register_service("web", web_service);
    }

    /// Start all registered services.
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run the application and handle shutdown signals.
    pub async fn run(self) -> ExitCode {
        use crate::signals::handle_shutdown_signals;
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
