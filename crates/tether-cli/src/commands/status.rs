use serde::Serialize;

use crate::commands::common::{print_json, App};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub sync_configured: bool,
    pub api_base_url: Option<String>,
    pub collections: Vec<CollectionStatus>,
}

#[derive(Debug, Serialize)]
pub struct CollectionStatus {
    pub entity: String,
    pub records: u64,
    pub phase: String,
}

pub async fn collect_status(app: &App) -> Result<StatusReport, CliError> {
    let phases = app.client.phases();
    let collections = app
        .client
        .counts()
        .await?
        .into_iter()
        .map(|(kind, records)| CollectionStatus {
            entity: kind.as_str().to_string(),
            records,
            phase: phases
                .iter()
                .find(|(phase_kind, _)| *phase_kind == kind)
                .map_or("idle", |(_, phase)| phase.label())
                .to_string(),
        })
        .collect();

    Ok(StatusReport {
        db_path: app.db_path.display().to_string(),
        sync_configured: app.sync_configured(),
        api_base_url: app.config.api_base_url.clone(),
        collections,
    })
}

pub async fn run_status(app: &App, as_json: bool) -> Result<(), CliError> {
    let report = collect_status(app).await?;
    if as_json {
        return print_json(&report);
    }

    println!("Database: {}", report.db_path);
    match (&report.api_base_url, report.sync_configured) {
        (Some(url), true) => println!("Sync:     {url}"),
        (Some(url), false) => println!("Sync:     {url} (no access token)"),
        (None, _) => println!("Sync:     not configured"),
    }
    for collection in &report.collections {
        println!(
            "{:<14}  {:>6}  {}",
            collection.entity, collection.records, collection.phase
        );
    }
    Ok(())
}
