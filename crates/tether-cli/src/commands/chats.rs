use tether_core::models::{Chat, Connection};

use crate::commands::common::{preview, print_json, relative_time, resolve_record, short_id, App};
use crate::error::CliError;

pub async fn run_list(app: &App, connection: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let chats = match connection {
        Some(query) => {
            let connection: Connection = resolve_record(app.client.connections(), query).await?;
            app.client
                .chats()
                .list_by("connection_id", connection.id)
                .await?
        }
        None => app.client.chats().list().await?,
    };

    if as_json {
        return print_json(&chats);
    }

    if chats.is_empty() {
        println!("No chats yet.");
    }
    for line in format_chat_lines(&chats) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_chat_lines(chats: &[Chat]) -> Vec<String> {
    chats
        .iter()
        .map(|chat| {
            let short_id = short_id(chat.id);
            let title = chat
                .title
                .as_deref()
                .map_or_else(|| "(untitled)".to_string(), |title| preview(title, 40));
            let relative_time = relative_time(chat.updated_at);
            format!("{short_id:<13}  {title:<40}  {relative_time}")
        })
        .collect()
}
