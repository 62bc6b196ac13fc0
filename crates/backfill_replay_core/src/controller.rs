//! Bounded replay controller.
//!
//! One invocation moves through `Starting -> ConsumingPage* -> Exhausted |
//! Paused`. Each page is forwarded to the sink in full before the remaining
//! budget is sampled, and a pause is only possible when the page just
//! consumed carried a continuation.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::budget::{below_safety_margin, TimeBudget};
use crate::config::{InvalidCheckpointPolicy, ReplayConfig};
use crate::contract::{Checkpoint, ReplayRequest, RunResult};
use crate::error::{ErrorKind, ReplayError};
use crate::page_source::{Page, PageSource, ScanBackend};
use crate::sink::RecordSink;

/// Resolves the scoped client used for one invocation's table reads.
pub trait CredentialProvider {
    type Backend: ScanBackend;

    fn resolve(&self) -> Result<Self::Backend, ReplayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub result: RunResult,
    pub pages_read: usize,
    pub pages_forwarded: usize,
    pub records_forwarded: usize,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn records_per_second(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 {
            self.records_forwarded as f64 / elapsed
        } else {
            0.0
        }
    }
}

enum State<'s, B> {
    Starting(Option<Checkpoint>),
    ConsumingPage(PageSource<'s, B>),
    Exhausted,
    Paused(Checkpoint),
}

#[derive(Default)]
struct Progress {
    pages_read: usize,
    pages_forwarded: usize,
    records_forwarded: usize,
}

pub struct ReplayController<'a, C, S, T> {
    config: &'a ReplayConfig,
    credentials: &'a C,
    sink: &'a S,
    budget: &'a T,
}

impl<'a, C, S, T> ReplayController<'a, C, S, T>
where
    C: CredentialProvider,
    S: RecordSink,
    T: TimeBudget,
{
    pub fn new(config: &'a ReplayConfig, credentials: &'a C, sink: &'a S, budget: &'a T) -> Self {
        Self {
            config,
            credentials,
            sink,
            budget,
        }
    }

    pub fn run(&self, request: &ReplayRequest) -> Result<RunReport, ReplayError> {
        let started_at = Instant::now();
        let start = request.resolve_checkpoint(&self.config.table_name)?;
        let mut progress = Progress::default();
        let outcome = self.consume(start, &mut progress);

        let result = match outcome {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    event = "replay_failed",
                    table_name = %self.config.table_name,
                    kind = error.kind().as_str(),
                    pages_forwarded = progress.pages_forwarded,
                    records_forwarded = progress.records_forwarded,
                    error = %error,
                    "replay invocation aborted"
                );
                return Err(error);
            }
        };

        Ok(RunReport {
            result,
            pages_read: progress.pages_read,
            pages_forwarded: progress.pages_forwarded,
            records_forwarded: progress.records_forwarded,
            elapsed: started_at.elapsed(),
        })
    }

    /// Only a well-formed checkpoint refused by the backing store on the
    /// first read is recoverable. `DONE`, foreign lineages and malformed keys
    /// are rejected before any read and always fail.
    fn restarts_after(&self, error: &ReplayError, progress: &Progress) -> bool {
        self.config.invalid_checkpoint_policy == InvalidCheckpointPolicy::RestartFromBeginning
            && error.kind() == ErrorKind::InvalidCheckpoint
            && progress.pages_read == 0
    }

    fn consume(
        &self,
        start: Option<Checkpoint>,
        progress: &mut Progress,
    ) -> Result<RunResult, ReplayError> {
        let mut state = State::Starting(start);

        loop {
            state = match state {
                State::Starting(start) => {
                    info!(
                        event = "replay_started",
                        table_name = %self.config.table_name,
                        resuming = start.is_some(),
                        page_limit = self.config.page_limit.get(),
                        "starting replay"
                    );
                    let backend = self.credentials.resolve()?;
                    State::ConsumingPage(PageSource::open(
                        backend,
                        &self.config.table_name,
                        self.config.page_limit,
                        start,
                    ))
                }
                State::ConsumingPage(mut pages) => match pages.next() {
                    None => State::Exhausted,
                    Some(Err(error)) if self.restarts_after(&error, progress) => {
                        warn!(
                            event = "checkpoint_rejected",
                            table_name = %self.config.table_name,
                            error = %error,
                            "backing store rejected checkpoint; rescanning from the table beginning"
                        );
                        pages.rewind();
                        State::ConsumingPage(pages)
                    }
                    Some(page) => {
                        let page_index = progress.pages_read;
                        let page = page?;
                        progress.pages_read += 1;
                        match self.forward(page_index, page, progress)? {
                            Some(checkpoint) => State::Paused(checkpoint),
                            None => State::ConsumingPage(pages),
                        }
                    }
                },
                State::Exhausted => {
                    info!(
                        event = "replay_exhausted",
                        table_name = %self.config.table_name,
                        pages_forwarded = progress.pages_forwarded,
                        records_forwarded = progress.records_forwarded,
                        "scan complete"
                    );
                    return Ok(RunResult::Exhausted);
                }
                State::Paused(checkpoint) => {
                    info!(
                        event = "replay_paused",
                        table_name = %self.config.table_name,
                        pages_forwarded = progress.pages_forwarded,
                        records_forwarded = progress.records_forwarded,
                        "time budget below safety margin; returning checkpoint"
                    );
                    return Ok(RunResult::Paused(checkpoint));
                }
            };
        }
    }

    /// Forwards one page and returns the checkpoint to pause at, if any.
    fn forward(
        &self,
        page_index: usize,
        page: Page,
        progress: &mut Progress,
    ) -> Result<Option<Checkpoint>, ReplayError> {
        let record_count = page.records.len();

        // Empty pages carry no records but still advance the checkpoint.
        if record_count > 0 {
            self.sink
                .send(&page.records)
                .map_err(|message| ReplayError::SinkFailure {
                    page_index,
                    record_count,
                    message,
                })?;
            progress.pages_forwarded += 1;
            progress.records_forwarded += record_count;
        }

        let remaining = self.budget.remaining();
        info!(
            event = "page_forwarded",
            page_index,
            records = record_count,
            terminal = page.is_terminal(),
            remaining_ms = remaining.as_millis() as u64,
            "forwarded page"
        );

        Ok(page
            .next_checkpoint
            .filter(|_| below_safety_margin(remaining, self.config.safety_margin)))
    }
}
