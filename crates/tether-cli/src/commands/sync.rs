use tether_core::models::EntityKind;
use tether_core::state::SyncTrigger;
use tether_core::sync::{PassOutcome, SkipReason};

use crate::commands::common::App;
use crate::error::CliError;

pub async fn run_sync(app: &App, only: Option<EntityKind>) -> Result<(), CliError> {
    if !app.sync_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let results = match only {
        Some(kind) => vec![(
            kind,
            app.client.sync_collection(kind, SyncTrigger::Manual).await,
        )],
        None => app.client.sync_all(SyncTrigger::Manual).await,
    };

    let mut failures = 0;
    for (kind, result) in &results {
        match result {
            Ok(outcome) => println!("{}", format_outcome_line(*kind, outcome)),
            Err(error) => {
                failures += 1;
                eprintln!("{:<14}  failed: {error}", kind.as_str());
            }
        }
    }

    if failures > 0 {
        return Err(CliError::SyncFailed(failures));
    }
    Ok(())
}

pub fn format_outcome_line(kind: EntityKind, outcome: &PassOutcome) -> String {
    let detail = match outcome {
        PassOutcome::Applied(counts) if counts.is_empty() => "up to date".to_string(),
        PassOutcome::Applied(counts) => format!(
            "+{} ~{} -{}",
            counts.inserted, counts.updated, counts.deleted
        ),
        PassOutcome::Skipped(SkipReason::MissingCredentials) => {
            "skipped (not signed in)".to_string()
        }
        PassOutcome::Skipped(SkipReason::Offline) => "skipped (offline)".to_string(),
        PassOutcome::Coalesced => "joined a running sync".to_string(),
    };
    format!("{:<14}  {detail}", kind.as_str())
}
