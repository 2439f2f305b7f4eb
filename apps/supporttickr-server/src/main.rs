mod auth;
mod cli;
mod config;
mod error;
mod handlers;
mod routes;
mod scope;
mod services;
mod state;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use supporttickr_db::EntityStore;
use supporttickr_db::store::kv::{KvStore, RedisKv};
use supporttickr_db::store::pg::PgStore;

use config::{Config, StoreBackend};
use state::AppState;

#[derive(Parser)]
#[command(name = "supporttickr")]
#[command(about = "Multi-tenant support ticket portal backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,
    /// Administrative tools
    Admin {
        #[command(subcommand)]
        subcommand: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create an admin account, or reset its password if it exists
    Seed {
        email: String,
        password: String,
        /// Display name for the account
        #[arg(default_value = "Administrator")]
        name: String,
    },
}

async fn build_store(config: &Config) -> Result<Arc<dyn EntityStore>> {
    match config.backend {
        StoreBackend::Postgres => {
            let pool = supporttickr_db::connect_postgres(&config.database_url).await?;
            tracing::info!("using postgres store");
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Redis => {
            let manager = supporttickr_db::connect_redis(&config.redis_url).await?;
            tracing::info!("using redis store");
            Ok(Arc::new(KvStore::new(RedisKv::new(manager))))
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    let store = build_store(&config).await?;
    let port = config.port;
    let state = AppState::new(store, config);
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on port {port}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve => run_server(config).await,
        Commands::Admin { subcommand } => match subcommand {
            AdminCommands::Seed {
                email,
                password,
                name,
            } => {
                let store = build_store(&config).await?;
                cli::seed_admin(&store, &email, &password, &name).await
            }
        },
    }
}
