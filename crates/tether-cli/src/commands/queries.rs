use tether_core::collection::Mutation;
use tether_core::models::{Connection, SavedQuery};

use crate::commands::common::{
    preview, print_json, relative_time, resolve_record, short_id, App,
};
use crate::error::CliError;

pub async fn run_list(app: &App, connection: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let queries = match connection {
        Some(query) => {
            let connection: Connection = resolve_record(app.client.connections(), query).await?;
            app.client.connection_queries(connection.id).await?
        }
        None => app.client.queries().list().await?,
    };

    if as_json {
        return print_json(&queries);
    }

    if queries.is_empty() {
        println!("No saved queries.");
    }
    for line in format_query_lines(&queries) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_add(
    app: &App,
    connection: &str,
    name: &str,
    query_parts: &[String],
) -> Result<SavedQuery, CliError> {
    let text = normalize_query_text(&query_parts.join(" "))?;
    let connection: Connection = resolve_record(app.client.connections(), connection).await?;

    let saved = SavedQuery::new(connection.id, name.trim(), text);
    app.write(app.client.queries(), Mutation::Insert(saved.clone()))
        .await?;
    println!("{}", saved.id);
    Ok(saved)
}

pub async fn run_remove(app: &App, id: &str) -> Result<(), CliError> {
    let saved = resolve_record(app.client.queries(), id).await?;
    app.write(app.client.queries(), Mutation::Delete(saved.id))
        .await?;
    println!("{}", saved.id);
    Ok(())
}

pub fn normalize_query_text(text: &str) -> Result<String, CliError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn format_query_lines(queries: &[SavedQuery]) -> Vec<String> {
    queries
        .iter()
        .map(|saved| {
            let short_id = short_id(saved.id);
            let name = preview(&saved.name, 24);
            let text = preview(&saved.query, 40);
            let relative_time = relative_time(saved.updated_at);
            format!("{short_id:<13}  {name:<24}  {text:<40}  {relative_time}")
        })
        .collect()
}
