use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ReplayError;

pub const CHECKPOINT_SCHEMA_VERSION: &str = "v1";
pub const DONE_SENTINEL: &str = "DONE";

/// Attribute descriptors accepted inside a DynamoDB-JSON attribute value.
pub const ATTRIBUTE_TYPE_DESCRIPTORS: [&str; 10] =
    ["S", "N", "B", "BOOL", "NULL", "M", "L", "SS", "NS", "BS"];

/// A table record in DynamoDB-JSON form, e.g. `{"pk": {"S": "a"}}`.
pub type Item = Map<String, Value>;

/// Opaque position in the table-native scan order.
///
/// Wraps the key map of the last record of a page; resuming from it yields
/// the records strictly after that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(Item);

impl Checkpoint {
    pub fn from_key(key: Item) -> Result<Self, ReplayError> {
        validate_attribute_map(&key)?;
        Ok(Self(key))
    }

    pub fn parse(value: &Value) -> Result<Self, ReplayError> {
        match value {
            Value::Object(map) => Self::from_key(map.clone()),
            Value::String(text) if text == DONE_SENTINEL => Err(ReplayError::invalid_checkpoint(
                "DONE marks a finished lineage and is not a resume point; omit LastEvaluatedKey to rescan",
            )),
            other => Err(ReplayError::invalid_checkpoint(format!(
                "LastEvaluatedKey must be an attribute map, got {}",
                json_type_name(other)
            ))),
        }
    }

    pub fn key(&self) -> &Item {
        &self.0
    }

    pub fn into_key(self) -> Item {
        self.0
    }
}

fn validate_attribute_map(key: &Item) -> Result<(), ReplayError> {
    if key.is_empty() {
        return Err(ReplayError::invalid_checkpoint(
            "LastEvaluatedKey cannot be empty",
        ));
    }

    for (name, value) in key {
        let descriptor = value
            .as_object()
            .filter(|descriptor| descriptor.len() == 1)
            .and_then(|descriptor| descriptor.keys().next());
        match descriptor {
            Some(tag) if ATTRIBUTE_TYPE_DESCRIPTORS.contains(&tag.as_str()) => {}
            _ => {
                return Err(ReplayError::invalid_checkpoint(format!(
                    "key attribute '{name}' is not a typed attribute value"
                )));
            }
        }
    }

    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Exhausted,
    Paused(Checkpoint),
}

impl RunResult {
    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        match self {
            Self::Exhausted => None,
            Self::Paused(checkpoint) => Some(checkpoint),
        }
    }
}

/// Invocation input. Unknown fields are ignored so that a previous
/// [`ReplayResponse`] can be passed back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayRequest {
    #[serde(
        rename = "LastEvaluatedKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_evaluated_key: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_fingerprint: Option<String>,
}

impl ReplayRequest {
    pub fn start() -> Self {
        Self::default()
    }

    pub fn resume(checkpoint: &Checkpoint, table_name: &str) -> Self {
        Self {
            last_evaluated_key: Some(Value::Object(checkpoint.key().clone())),
            scan_fingerprint: Some(scan_fingerprint(table_name)),
        }
    }

    pub fn from_event(event: Value) -> Result<Self, ReplayError> {
        if !event.is_object() {
            return Err(ReplayError::invalid_checkpoint(
                "invocation payload must be a JSON object",
            ));
        }
        serde_json::from_value(event).map_err(|error| {
            ReplayError::invalid_checkpoint(format!("malformed invocation payload: {error}"))
        })
    }

    /// Validates the supplied checkpoint against the lineage of `table_name`.
    /// `None` means "start from the beginning of the table".
    pub fn resolve_checkpoint(&self, table_name: &str) -> Result<Option<Checkpoint>, ReplayError> {
        let Some(raw) = &self.last_evaluated_key else {
            return Ok(None);
        };

        if let Some(fingerprint) = &self.scan_fingerprint {
            if *fingerprint != scan_fingerprint(table_name) {
                return Err(ReplayError::invalid_checkpoint(format!(
                    "checkpoint belongs to a different scan lineage than table '{table_name}'"
                )));
            }
        }

        Checkpoint::parse(raw).map(Some)
    }
}

/// Invocation output; `LastEvaluatedKey` is either `"DONE"` or a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResponse {
    #[serde(rename = "LastEvaluatedKey")]
    pub last_evaluated_key: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_fingerprint: Option<String>,
    pub pages_forwarded: usize,
    pub records_forwarded: usize,
}

impl ReplayResponse {
    pub fn from_result(
        result: &RunResult,
        table_name: &str,
        pages_forwarded: usize,
        records_forwarded: usize,
    ) -> Self {
        match result {
            RunResult::Exhausted => Self {
                last_evaluated_key: Value::String(DONE_SENTINEL.to_string()),
                scan_fingerprint: None,
                pages_forwarded,
                records_forwarded,
            },
            RunResult::Paused(checkpoint) => Self {
                last_evaluated_key: Value::Object(checkpoint.key().clone()),
                scan_fingerprint: Some(scan_fingerprint(table_name)),
                pages_forwarded,
                records_forwarded,
            },
        }
    }

    pub fn is_done(&self) -> bool {
        self.last_evaluated_key.as_str() == Some(DONE_SENTINEL)
    }
}

/// Binds checkpoints to the table whose native scan order produced them.
pub fn scan_fingerprint(table_name: &str) -> String {
    let lineage = json!({
        "schema_version": CHECKPOINT_SCHEMA_VERSION,
        "table_name": table_name,
    });
    let mut hasher = Sha256::new();
    hasher.update(lineage.to_string());
    format!("{:x}", hasher.finalize())
}
