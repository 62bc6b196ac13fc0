use std::sync::atomic::{AtomicUsize, Ordering};

use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::{InvocationType, LogType};
use backfill_replay_core::contract::Item;
use backfill_replay_core::sink::RecordSink;
use backfill_replay_core::stream_event::BackfillEnvelope;

const ERROR_EXCERPT_LIMIT: usize = 512;

/// Forwards each batch as one synchronous invocation of the downstream
/// function, shaped like a DynamoDB stream event.
pub struct LambdaRecordSink {
    lambda_client: aws_sdk_lambda::Client,
    function_name: String,
}

impl LambdaRecordSink {
    pub fn new(lambda_client: aws_sdk_lambda::Client, function_name: impl Into<String>) -> Self {
        Self {
            lambda_client,
            function_name: function_name.into(),
        }
    }
}

impl RecordSink for LambdaRecordSink {
    fn send(&self, records: &[Item]) -> Result<(), String> {
        let payload = BackfillEnvelope::from_items(records).to_payload()?;
        let client = self.lambda_client.clone();
        let function_name = self.function_name.clone();

        let output = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .invoke()
                    .function_name(function_name)
                    .invocation_type(InvocationType::RequestResponse)
                    .log_type(LogType::None)
                    .set_payload(Some(payload.into()))
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "failed to invoke downstream function: {}",
                            DisplayErrorContext(&error)
                        )
                    })
            })
        })?;

        match output.function_error() {
            Some(function_error) => Err(describe_function_error(
                function_error,
                output.payload().map(|blob| blob.as_ref()),
            )),
            None => Ok(()),
        }
    }
}

fn describe_function_error(function_error: &str, payload: Option<&[u8]>) -> String {
    let detail = payload
        .map(String::from_utf8_lossy)
        .map(|text| text.chars().take(ERROR_EXCERPT_LIMIT).collect::<String>())
        .unwrap_or_default();
    if detail.is_empty() {
        format!("downstream function failed ({function_error})")
    } else {
        format!("downstream function failed ({function_error}): {detail}")
    }
}

/// Accepts every batch without forwarding it; used to measure scan
/// throughput when no downstream function is configured.
#[derive(Debug, Default)]
pub struct DryRunSink {
    batches: AtomicUsize,
    records: AtomicUsize,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }
}

impl RecordSink for DryRunSink {
    fn send(&self, records: &[Item]) -> Result<(), String> {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.records.fetch_add(records.len(), Ordering::Relaxed);
        tracing::debug!(records = records.len(), "dry run: batch discarded");
        Ok(())
    }
}
