//! Synthetic change notifications for backfilled records.
//!
//! Records are shaped like DynamoDB stream `INSERT` events so that a consumer
//! written for live change notifications handles backfill identically.

use serde::{Deserialize, Serialize};

use crate::contract::Item;

pub const BACKFILL_EVENT_NAME: &str = "INSERT";
pub const BACKFILL_EVENT_SOURCE: &str = "aws:dynamodb";
pub const BACKFILL_STREAM_VIEW_TYPE: &str = "BACKFILL_IMAGES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamImage {
    #[serde(rename = "NewImage")]
    pub new_image: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillRecord {
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "eventSource")]
    pub event_source: String,
    pub dynamodb: StreamImage,
    #[serde(rename = "StreamViewType")]
    pub stream_view_type: String,
}

impl BackfillRecord {
    pub fn insert(item: Item) -> Self {
        Self {
            event_name: BACKFILL_EVENT_NAME.to_string(),
            event_source: BACKFILL_EVENT_SOURCE.to_string(),
            dynamodb: StreamImage { new_image: item },
            stream_view_type: BACKFILL_STREAM_VIEW_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillEnvelope {
    #[serde(rename = "Records")]
    pub records: Vec<BackfillRecord>,
}

impl BackfillEnvelope {
    pub fn from_items(items: &[Item]) -> Self {
        Self {
            records: items.iter().cloned().map(BackfillRecord::insert).collect(),
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, String> {
        serde_json::to_vec(self)
            .map_err(|error| format!("failed to serialize backfill envelope: {error}"))
    }
}
