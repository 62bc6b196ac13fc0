use backfill_replay_core::budget::TimeBudget;
use backfill_replay_core::config::{ReplayConfig, RunMode};
use backfill_replay_core::contract::{ReplayRequest, ReplayResponse};
use backfill_replay_core::controller::{CredentialProvider, ReplayController};
use backfill_replay_core::error::ReplayError;
use backfill_replay_core::sink::RecordSink;
use serde_json::Value;
use tracing::{error, info};

/// Runs one invocation: decode the event, replay until the scan is done or
/// the budget runs low, and encode the checkpoint for the caller.
pub fn handle_replay_event<C, S, T>(
    event: Value,
    config: &ReplayConfig,
    credentials: &C,
    sink: &S,
    budget: &T,
) -> Result<ReplayResponse, ReplayError>
where
    C: CredentialProvider,
    S: RecordSink,
    T: TimeBudget,
{
    let mode = match config.run_mode() {
        RunMode::Replay { .. } => "replay",
        RunMode::DryRun => "dry_run",
    };

    let request = match ReplayRequest::from_event(event) {
        Ok(request) => request,
        Err(error) => {
            error!(
                event = "invocation_rejected",
                kind = error.kind().as_str(),
                error = %error,
                "invalid invocation payload"
            );
            return Err(error);
        }
    };

    info!(
        event = "invocation_started",
        table_name = %config.table_name,
        mode,
        resuming = request.last_evaluated_key.is_some(),
        remaining_ms = budget.remaining().as_millis() as u64,
        "handling replay invocation"
    );

    let report = ReplayController::new(config, credentials, sink, budget).run(&request)?;
    let response = ReplayResponse::from_result(
        &report.result,
        &config.table_name,
        report.pages_forwarded,
        report.records_forwarded,
    );

    info!(
        event = "invocation_completed",
        table_name = %config.table_name,
        mode,
        done = response.is_done(),
        pages_read = report.pages_read,
        records_forwarded = report.records_forwarded,
        duration_ms = report.elapsed.as_millis() as u64,
        records_per_second = report.records_per_second(),
        "replay invocation finished"
    );
    Ok(response)
}
