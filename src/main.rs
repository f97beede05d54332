//! # Caselaw Access Server Main Driver
//!
//! ## Purpose
//! Main entry point for the caselaw access server. Orchestrates component
//! initialization and starts the web server for citation and case requests.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files, command line arguments, environment variables
//! - **Output**: Running web server with the caselaw access API
//! - **Initialization**: Opens storage, wires the quota gate and resolver
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Open the catalog, session, and account stores
//! 4. Wire the quota gate and citation resolver
//! 5. Start the web API server
//! 6. Handle shutdown signals gracefully

use clap::{Arg, Command};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use caselaw_access::{
    api::ApiServer,
    config::Config,
    errors::{AccessError, Result},
    filters::FilterChoices,
    quota::{QuotaGate, UserAgentClassifier},
    storage::{open_database, CatalogStore, SledAccountStore, SledSessionStore},
    AppResolver, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("caselaw-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Public access layer for a caselaw database")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("check-health")
                .long("check-health")
                .help("Run health checks and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .ok_or_else(|| AccessError::Config {
            message: "missing config path".to_string(),
        })?;
    let mut config = Config::from_file(config_path)?;

    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let config = Arc::new(config);

    init_logging(&config)?;

    info!("Starting caselaw access server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", config_path);

    let app_state = initialize_components(config.clone())?;

    if matches.get_flag("check-health") {
        app_state.catalog.health_check()?;
        info!("All health checks passed");
        return Ok(());
    }

    let server = ApiServer::new(app_state);

    info!(
        "Caselaw access server started on {}:{}",
        config.server.host, config.server.port
    );

    // the server future is not Send, so it runs on this task rather than a
    // spawned one
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
            warn!("Server stopped unexpectedly");
        }
    }

    info!("Caselaw access server shut down successfully");
    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let log_level: tracing::Level =
        config.logging.level.parse().map_err(|_| AccessError::Config {
            message: format!("Invalid log level: {}", config.logging.level),
        })?;
    let filter = tracing_subscriber::filter::LevelFilter::from_level(log_level);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);
    let layer = if config.logging.json_format {
        fmt_layer.json().with_filter(filter).boxed()
    } else {
        fmt_layer.with_filter(filter).boxed()
    };
    tracing_subscriber::registry().with(layer).init();

    info!("Logging initialized with level: {}", config.logging.level);
    Ok(())
}

/// Open storage and wire up the resolver stack
fn initialize_components(config: Arc<Config>) -> Result<AppState> {
    info!("Initializing application components...");

    info!("Opening database at {:?}", config.storage.db_path);
    let db = open_database(&config.storage.db_path)?;
    let catalog = Arc::new(CatalogStore::open(&db)?);
    let sessions = Arc::new(SledSessionStore::open(&db)?);
    let accounts = Arc::new(SledAccountStore::open(
        &db,
        config.quota.account_case_allowance,
        config.quota.account_allowance_resets,
        config.quota.reset_interval_seconds,
    )?);

    catalog.health_check()?;
    info!("Storage is healthy");

    let gate = QuotaGate::new(
        sessions,
        accounts,
        config.quota.daily_case_allowance,
        config.quota.reset_interval_seconds,
    );
    let resolver = Arc::new(AppResolver::new(catalog.clone(), gate));
    let classifier = Arc::new(UserAgentClassifier::new(
        config.quota.verified_crawlers.clone(),
    ));

    let app_state = AppState {
        config,
        catalog,
        resolver,
        choices: Arc::new(FilterChoices::new()),
        classifier,
    };

    info!("All components initialized successfully");
    Ok(app_state)
}
