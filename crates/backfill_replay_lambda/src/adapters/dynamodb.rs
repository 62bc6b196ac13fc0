use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata};
use backfill_replay_core::contract::Checkpoint;
use backfill_replay_core::page_source::{Page, ScanBackend, ScanError, ScanPageRequest};

use crate::adapters::attribute_json::{item_to_json, json_to_item, AttributeMap};

const VALIDATION_EXCEPTION: &str = "ValidationException";

/// `Scan` over a DynamoDB table, one request per page.
#[derive(Clone)]
pub struct DynamoScanBackend {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoScanBackend {
    pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
        Self { client }
    }
}

impl ScanBackend for DynamoScanBackend {
    fn scan_page(&self, request: &ScanPageRequest<'_>) -> Result<Page, ScanError> {
        let start_key = request
            .exclusive_start
            .map(|checkpoint| json_to_item(checkpoint.key()))
            .transpose()
            .map_err(ScanError::InvalidStartKey)?;
        let has_start_key = start_key.is_some();
        let limit = i32::try_from(request.limit.get()).unwrap_or(i32::MAX);
        let table_name = request.table_name.to_string();
        let client = self.client.clone();

        let output = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .scan()
                    .table_name(table_name)
                    .limit(limit)
                    .set_exclusive_start_key(start_key)
                    .send()
                    .await
            })
        })
        .map_err(|error| {
            let code = error
                .as_service_error()
                .and_then(|service_error| service_error.code())
                .map(str::to_string);
            classify_scan_failure(
                code.as_deref(),
                DisplayErrorContext(&error).to_string(),
                has_start_key,
            )
        })?;

        let records = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(item_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ScanError::Unavailable)?;
        let next_checkpoint = output
            .last_evaluated_key
            .map(continuation_checkpoint)
            .transpose()?
            .flatten();

        Ok(Page {
            records,
            next_checkpoint,
        })
    }
}

fn continuation_checkpoint(key: AttributeMap) -> Result<Option<Checkpoint>, ScanError> {
    if key.is_empty() {
        return Ok(None);
    }
    let json_key = item_to_json(key).map_err(ScanError::Unavailable)?;
    Checkpoint::from_key(json_key)
        .map(Some)
        .map_err(|error| ScanError::Unavailable(error.to_string()))
}

/// Validation failures are only blamed on the start key when one was sent;
/// throttling, access and transport failures are all "unavailable".
fn classify_scan_failure(code: Option<&str>, message: String, has_start_key: bool) -> ScanError {
    match code {
        Some(VALIDATION_EXCEPTION) if has_start_key => ScanError::InvalidStartKey(message),
        _ => ScanError::Unavailable(message),
    }
}
