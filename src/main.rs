use std::sync::Arc;

use chirp_core::{Config, ConfigError};
use chirp_social::{
    ArcedDatabase, AuthError, DatabaseError, Integrations, MemoryDatabase, PgDatabase, Social,
};
use colored::Colorize;
use log::{error, info, warn};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;

pub struct Chirp {
    social: Arc<Social>,
    config: Config,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum ChirpError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Could not prepare accounts: {0}")]
    Auth(#[from] AuthError),

    #[error("Server stopped: {0}")]
    Server(#[from] std::io::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Chirp {
    fn new() -> Result<Self, ChirpError> {
        let config = Config::from_env()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("chirp-async")
            .build()
            .map_err(|e| ChirpError::Fatal(e.to_string()))?;

        let database: ArcedDatabase = match &config.database_url {
            Some(url) => {
                info!("Connecting to database...");
                Arc::new(runtime.block_on(PgDatabase::new(url))?)
            }
            None => {
                warn!("DATABASE_URL is not set, data will be lost when chirp stops");
                Arc::new(MemoryDatabase::new())
            }
        };

        let integrations = Integrations::from_config(&config);
        let social = Arc::new(Social::new(database, integrations, config.clone()));

        runtime.block_on(social.init())?;

        Ok(Self {
            social,
            config,
            runtime,
        })
    }

    fn run(&self) -> Result<(), ChirpError> {
        let summary = self.social.context().integrations.summary();
        info!(
            "Integrations: chat={} speech={} moderation={} canvas={} livekit={}",
            summary.chat, summary.speech, summary.moderation, summary.canvas, summary.livekit
        );

        let port = self.config.server.port;
        self.runtime
            .block_on(chirp_server::run_server(self.social.clone(), port))?;

        Ok(())
    }
}

impl ChirpError {
    fn hint(&self) -> String {
        match self {
            ChirpError::Config(_) => "Check the environment variables chirp is started with.".to_string(),
            ChirpError::Database(_) => "This is a database error. Make sure postgres is running and DATABASE_URL points to it, then try again.".to_string(),
            ChirpError::Auth(_) => "The bot account could not be created. Check KORN_BOT_USERNAME and the database.".to_string(),
            ChirpError::Server(_) => "Make sure the port in CHIRP_SERVER_PORT is not already in use.".to_string(),
            ChirpError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn report(error: ChirpError) {
    error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Chirp failed to start!".bold().red());
    error!("{}", error);
    error!(
        "{}",
        format!("Hint: {}", error.hint())
            .dimmed()
            .italic()
    );
}

fn main() {
    logging::init_logger();

    match Chirp::new() {
        Ok(chirp) => {
            info!("Initialized successfully.");

            if let Err(error) = chirp.run() {
                report(error);
            }
        }
        Err(error) => report(error),
    }
}
