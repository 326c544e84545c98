//! Perch identity API server binary.
//!
//! Prints `{"port": N}` to stdout once bound so a supervising process can
//! discover an ephemeral port.

use std::sync::Arc;

use clap::Parser;
use perch_api::config::ApiConfig;
use perch_api::services::users::ensure_admin_user;
use perch_api::{AppState, router};
use perch_core::store::{MemoryStore, PgStore, Store};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments; anything not given here comes from `PERCH_*` variables.
#[derive(Parser, Debug)]
#[command(name = "perch_api_server", about = "Perch identity API server")]
struct Args {
    /// Address to listen on (overrides `PERCH_BIND_ADDR`).
    #[arg(long)]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL. Without one the in-memory store is used.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

async fn open_store(args: &Args) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    let Some(url) = args.database_url.as_deref().filter(|u| !u.is_empty()) else {
        warn!("no DATABASE_URL configured, using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(url)
        .await?;
    let store = PgStore::new(pool);

    info!("running database migrations");
    store.migrate().await?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout is reserved for the port message.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,perch_api=debug,perch_core=debug")
            }),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env();
    if let Some(bind_addr) = args.bind_addr.clone() {
        config.bind_addr = bind_addr;
    }
    config.database_url = args.database_url.clone();

    info!(bind_addr = %config.bind_addr, "starting perch_api_server");

    let store = open_store(&args).await?;

    if let Some(login) = config.admin_token_user.as_deref() {
        if config.admin_token.is_none() {
            warn!(login, "admin token user configured without an admin token");
        }
        ensure_admin_user(store.as_ref(), login).await?;
    }

    let state = AppState::new(store, config.clone())?;
    info!(ttl_secs = config.jwt.ttl.num_seconds(), "jwt issuer configured");
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    println!("{}", serde_json::json!({ "port": local_addr.port() }));
    info!(addr = %local_addr, "REST API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
            }
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
