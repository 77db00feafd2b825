//! Tether CLI - manage connections, saved queries and chats from the terminal
//!
//! Every command works against the local database; `tether sync` reconciles
//! it with the server when an API URL and access token are configured.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{ChatCommands, Cli, Commands, ConnectionCommands, MessageCommands, QueryCommands};
use crate::commands::common::App;
use crate::commands::connections::NewConnection;
use crate::commands::{chats, completions, connections, messages, queries, status, sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    if let Commands::Completions { shell, output } = &command {
        return completions::run_completions(*shell, output.as_deref());
    }

    let app = App::open(cli.db_path).await?;

    match command {
        Commands::Sync { only } => sync::run_sync(&app, only.map(Into::into)).await?,
        Commands::Status { json } => status::run_status(&app, json).await?,
        Commands::Connections { command } => match command {
            ConnectionCommands::List { json } => connections::run_list(&app, json).await?,
            ConnectionCommands::Add {
                name,
                kind,
                url,
                label,
                color,
                sync_password,
            } => {
                let new = NewConnection {
                    name,
                    kind: kind.into(),
                    url,
                    label,
                    color,
                    sync_password,
                };
                connections::run_add(&app, new).await?;
            }
            ConnectionCommands::Remove { id } => connections::run_remove(&app, &id).await?,
        },
        Commands::Queries { command } => match command {
            QueryCommands::List { connection, json } => {
                queries::run_list(&app, connection.as_deref(), json).await?;
            }
            QueryCommands::Add {
                connection,
                name,
                query,
            } => {
                queries::run_add(&app, &connection, &name, &query).await?;
            }
            QueryCommands::Remove { id } => queries::run_remove(&app, &id).await?,
        },
        Commands::Chats { command } => match command {
            ChatCommands::List { connection, json } => {
                chats::run_list(&app, connection.as_deref(), json).await?;
            }
        },
        Commands::Messages { command } => match command {
            MessageCommands::List { chat, json } => messages::run_list(&app, &chat, json).await?,
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}
