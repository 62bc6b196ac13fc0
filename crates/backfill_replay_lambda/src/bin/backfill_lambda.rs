use std::sync::Arc;

use backfill_replay_core::config::{ReplayConfig, RunMode};
use backfill_replay_core::contract::ReplayResponse;
use backfill_replay_core::sink::RecordSink;
use backfill_replay_lambda::adapters::budget::LambdaDeadline;
use backfill_replay_lambda::adapters::credentials::DynamoCredentials;
use backfill_replay_lambda::adapters::invoke::{DryRunSink, LambdaRecordSink};
use backfill_replay_lambda::handlers::replay::handle_replay_event;
use backfill_replay_lambda::logging::init_structured_logging;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

async fn handle_request(
    event: LambdaEvent<Value>,
    config: &ReplayConfig,
) -> Result<ReplayResponse, Error> {
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let budget = LambdaDeadline::from_context(&event.context);
    let credentials = DynamoCredentials::new(aws_config.clone(), config.read_role_arn.clone());

    let replay_sink;
    let dry_run_sink;
    let sink: &dyn RecordSink = match config.run_mode() {
        RunMode::Replay { target_function } => {
            replay_sink =
                LambdaRecordSink::new(aws_sdk_lambda::Client::new(&aws_config), target_function);
            &replay_sink
        }
        RunMode::DryRun => {
            dry_run_sink = DryRunSink::new();
            &dry_run_sink
        }
    };

    handle_replay_event(event.payload, config, &credentials, &sink, &budget).map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_structured_logging();
    let config = Arc::new(ReplayConfig::from_env()?);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let config = Arc::clone(&config);
        async move { handle_request(event, &config).await }
    }))
    .await
}
