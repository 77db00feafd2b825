mod auth;
mod config;
mod error;
mod rate_limit;
mod reconciler;
mod routes;
mod secrets;
mod store;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::AppConfig;
use routes::{app_router, AppState};
use store::ServerStore;

#[derive(Parser)]
#[command(name = "tether-api")]
#[command(author, version, about = "Sync API for Tether", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the sync API (default)
    Serve,
    /// Register a user and print a session token for them
    IssueToken {
        /// User id that becomes the token subject
        user_id: String,
        /// Token lifetime in days
        #[arg(long, default_value_t = 30)]
        days: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tether_api=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Arc::new(AppConfig::from_env()?);
    let store = ServerStore::open(&config.database_path).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::IssueToken { user_id, days } => {
            store.provision_user(&user_id).await?;
            let token = auth::SessionTokenVerifier::new(&config)
                .issue(&user_id, Duration::from_secs(days.saturating_mul(86_400)))?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(config: Arc<AppConfig>, store: ServerStore) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting tether-api with config: {:?}", config);

    let state = AppState::new(config, store);
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("tether-api listening on {}", bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}
