//! In-memory collaborators for exercising the controller without AWS.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use crate::budget::TimeBudget;
use crate::contract::{Checkpoint, Item};
use crate::controller::CredentialProvider;
use crate::error::ReplayError;
use crate::page_source::{Page, ScanBackend, ScanError, ScanPageRequest};
use crate::sink::RecordSink;

pub const KEY_ATTRIBUTE: &str = "pk";

/// Items `item-00000 ..` with a string partition key and a numeric sequence.
pub fn sample_items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|index| {
            let mut item = Item::new();
            item.insert(
                KEY_ATTRIBUTE.to_string(),
                json!({"S": format!("item-{index:05}")}),
            );
            item.insert("seq".to_string(), json!({"N": index.to_string()}));
            item
        })
        .collect()
}

/// Table scanned in insertion order, paginating like DynamoDB: a page that
/// fills the limit always carries a continuation key, even at the very end.
/// Start keys that match no stored item are rejected as stale.
pub struct InMemoryTable {
    items: Vec<Item>,
    reads: AtomicUsize,
    fail_on_read: Option<usize>,
}

impl InMemoryTable {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            reads: AtomicUsize::new(0),
            fail_on_read: None,
        }
    }

    /// Fails the read with the given zero-based index.
    pub fn failing_on_read(mut self, read_index: usize) -> Self {
        self.fail_on_read = Some(read_index);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn checkpoint_for(pk: &str) -> Checkpoint {
        let mut key = Item::new();
        key.insert(KEY_ATTRIBUTE.to_string(), json!({"S": pk}));
        Checkpoint::from_key(key).expect("single string key is valid")
    }

    fn key_of(item: &Item) -> Item {
        item.iter()
            .filter(|(name, _)| name.as_str() == KEY_ATTRIBUTE)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl ScanBackend for InMemoryTable {
    fn scan_page(&self, request: &ScanPageRequest<'_>) -> Result<Page, ScanError> {
        let read_index = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_read == Some(read_index) {
            return Err(ScanError::Unavailable("injected read failure".to_string()));
        }

        let offset = match request.exclusive_start {
            None => 0,
            Some(checkpoint) => {
                let position = self
                    .items
                    .iter()
                    .position(|item| Self::key_of(item) == *checkpoint.key())
                    .ok_or_else(|| {
                        ScanError::InvalidStartKey(
                            "the provided starting key is invalid".to_string(),
                        )
                    })?;
                position + 1
            }
        };

        let limit = request.limit.get() as usize;
        let records: Vec<Item> = self.items.iter().skip(offset).take(limit).cloned().collect();
        let next_checkpoint = if records.len() == limit {
            records
                .last()
                .map(|item| Checkpoint::from_key(Self::key_of(item)))
                .transpose()
                .map_err(|error| ScanError::Unavailable(error.to_string()))?
        } else {
            None
        };

        Ok(Page {
            records,
            next_checkpoint,
        })
    }
}

/// Hands out a borrowed backend, or fails like a denied role assumption.
pub struct StaticCredentials<'t, B> {
    backend: &'t B,
    failure: Option<String>,
}

impl<'t, B> StaticCredentials<'t, B> {
    pub fn new(backend: &'t B) -> Self {
        Self {
            backend,
            failure: None,
        }
    }

    pub fn failing(backend: &'t B, message: &str) -> Self {
        Self {
            backend,
            failure: Some(message.to_string()),
        }
    }
}

impl<'t, B: ScanBackend> CredentialProvider for StaticCredentials<'t, B> {
    type Backend = &'t B;

    fn resolve(&self) -> Result<Self::Backend, ReplayError> {
        match &self.failure {
            Some(message) => Err(ReplayError::auth_failure(message.clone())),
            None => Ok(self.backend),
        }
    }
}

/// Captures every accepted batch; optionally rejects the n-th call.
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Item>>>,
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    /// Rejects the call with the given zero-based index.
    pub fn failing_on_call(call_index: usize) -> Self {
        Self {
            fail_on_call: Some(call_index),
            ..Self::new()
        }
    }

    pub fn batches(&self) -> Vec<Vec<Item>> {
        self.batches.lock().expect("poisoned mutex").clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches().iter().map(Vec::len).collect()
    }

    pub fn records(&self) -> Vec<Item> {
        self.batches().into_iter().flatten().collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSink for RecordingSink {
    fn send(&self, records: &[Item]) -> Result<(), String> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_call == Some(call_index) {
            return Err("injected sink failure".to_string());
        }
        self.batches
            .lock()
            .expect("poisoned mutex")
            .push(records.to_vec());
        Ok(())
    }
}

/// Budget that replays scripted samples, then reports `fallback`.
pub struct ScriptedBudget {
    samples: Mutex<VecDeque<Duration>>,
    fallback: Duration,
    sampled: AtomicUsize,
}

impl ScriptedBudget {
    pub fn new(samples: impl IntoIterator<Item = Duration>, fallback: Duration) -> Self {
        Self {
            samples: Mutex::new(samples.into_iter().collect()),
            fallback,
            sampled: AtomicUsize::new(0),
        }
    }

    pub fn ample() -> Self {
        Self::new(Vec::<Duration>::new(), Duration::from_secs(900))
    }

    pub fn exhausted() -> Self {
        Self::new(Vec::<Duration>::new(), Duration::ZERO)
    }

    /// Reports low time from the `pages`-th sample on, so a run pauses
    /// after that many pages when more data remains.
    pub fn pause_after(pages: usize) -> Self {
        Self::new(
            std::iter::repeat(Duration::from_secs(900)).take(pages.saturating_sub(1)),
            Duration::from_secs(10),
        )
    }

    pub fn samples_taken(&self) -> usize {
        self.sampled.load(Ordering::SeqCst)
    }
}

impl TimeBudget for ScriptedBudget {
    fn remaining(&self) -> Duration {
        self.sampled.fetch_add(1, Ordering::SeqCst);
        self.samples
            .lock()
            .expect("poisoned mutex")
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
