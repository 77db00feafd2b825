use chrono::{DateTime, Utc};
use serde::Serialize;
use tether_core::collection::Mutation;
use tether_core::models::{strip_password, Connection, DatabaseKind, SyncType};

use crate::commands::common::{print_json, relative_time, resolve_record, short_id, App};
use crate::error::CliError;

/// Listing view of a connection; never includes the password.
#[derive(Debug, Serialize)]
pub struct ConnectionListItem {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub connection_string: String,
    pub label: Option<String>,
    pub color: Option<String>,
    pub sync_type: String,
    pub password_saved: bool,
    pub updated_at: DateTime<Utc>,
}

pub struct NewConnection {
    pub name: String,
    pub kind: DatabaseKind,
    pub url: String,
    pub label: Option<String>,
    pub color: Option<String>,
    pub sync_password: bool,
}

pub async fn run_list(app: &App, as_json: bool) -> Result<(), CliError> {
    let connections = app.client.connections().list().await?;

    if as_json {
        let items = connections
            .iter()
            .map(connection_to_list_item)
            .collect::<Vec<_>>();
        return print_json(&items);
    }

    if connections.is_empty() {
        println!("No connections yet.");
    }
    for line in format_connection_lines(&connections) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_add(app: &App, new: NewConnection) -> Result<Connection, CliError> {
    let sync_type = if new.sync_password {
        SyncType::Cloud
    } else {
        SyncType::CloudWithoutPassword
    };
    let connection = Connection::new(new.name, new.kind, new.url)
        .with_label(new.label)
        .with_color(new.color)
        .with_sync_type(sync_type);

    app.write(
        app.client.connections(),
        Mutation::Insert(connection.clone()),
    )
    .await?;
    println!("{}", connection.id);
    Ok(connection)
}

pub async fn run_remove(app: &App, id: &str) -> Result<(), CliError> {
    let connection = resolve_record(app.client.connections(), id).await?;
    app.write(app.client.connections(), Mutation::Delete(connection.id))
        .await?;
    println!("{}", connection.id);
    Ok(())
}

pub fn format_connection_lines(connections: &[Connection]) -> Vec<String> {
    connections
        .iter()
        .map(|connection| {
            let short_id = short_id(connection.id);
            let name = connection.name.as_str();
            let kind = connection.kind.as_str();
            let password = if connection.is_password_populated() {
                ""
            } else {
                "  (password needed)"
            };
            let relative_time = relative_time(connection.updated_at);
            format!("{short_id:<13}  {name:<24}  {kind:<10}  {relative_time:<10}{password}")
        })
        .collect()
}

pub fn connection_to_list_item(connection: &Connection) -> ConnectionListItem {
    ConnectionListItem {
        id: connection.id.to_string(),
        name: connection.name.clone(),
        kind: connection.kind.as_str().to_string(),
        connection_string: strip_password(&connection.connection_string),
        label: connection.label.clone(),
        color: connection.color.clone(),
        sync_type: connection.sync_type.as_str().to_string(),
        password_saved: connection.password().is_some(),
        updated_at: connection.updated_at,
    }
}
