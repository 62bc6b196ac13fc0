use std::num::NonZeroU32;
use std::time::Duration;

use backfill_replay_core::budget::InstantDeadline;
use backfill_replay_core::config::ReplayConfig;
use backfill_replay_core::contract::{ReplayRequest, ReplayResponse, RunResult};
use backfill_replay_core::controller::ReplayController;
use backfill_replay_core::error::{ErrorKind, ReplayError};
use backfill_replay_core::testing::{
    sample_items, InMemoryTable, RecordingSink, ScriptedBudget, StaticCredentials,
};
use serde_json::json;

const TABLE: &str = "orders";

fn config(page_limit: u32) -> ReplayConfig {
    ReplayConfig::new(TABLE, NonZeroU32::new(page_limit).expect("non-zero limit"))
}

/// Runs one invocation and returns its wire-level response.
fn invoke(
    config: &ReplayConfig,
    table: &InMemoryTable,
    sink: &RecordingSink,
    budget: &ScriptedBudget,
    request: &ReplayRequest,
) -> Result<ReplayResponse, ReplayError> {
    let credentials = StaticCredentials::new(table);
    let report = ReplayController::new(config, &credentials, sink, budget).run(request)?;
    Ok(ReplayResponse::from_result(
        &report.result,
        &config.table_name,
        report.pages_forwarded,
        report.records_forwarded,
    ))
}

fn next_request(response: &ReplayResponse) -> ReplayRequest {
    let wire = serde_json::to_value(response).expect("response serializes");
    ReplayRequest::from_event(wire).expect("response is a valid next request")
}

#[test]
fn small_table_completes_in_single_invocation() {
    let config = config(100);
    let table = InMemoryTable::new(sample_items(250));
    let sink = RecordingSink::new();

    let response = invoke(
        &config,
        &table,
        &sink,
        &ScriptedBudget::ample(),
        &ReplayRequest::start(),
    )
    .expect("invocation succeeds");

    assert!(response.is_done());
    assert_eq!(response.pages_forwarded, 3);
    assert_eq!(sink.batch_sizes(), vec![100, 100, 50]);
    assert_eq!(sink.records(), sample_items(250));
}

#[test]
fn large_table_pauses_then_resumes_to_completion() {
    let config = config(100);
    let table = InMemoryTable::new(sample_items(10_000));
    let sink = RecordingSink::new();

    let first = invoke(
        &config,
        &table,
        &sink,
        &ScriptedBudget::pause_after(5),
        &ReplayRequest::start(),
    )
    .expect("first invocation succeeds");
    assert!(!first.is_done());
    assert_eq!(first.records_forwarded, 500);
    assert_eq!(first.last_evaluated_key, json!({"pk": {"S": "item-00499"}}));

    let second = invoke(
        &config,
        &table,
        &sink,
        &ScriptedBudget::ample(),
        &next_request(&first),
    )
    .expect("second invocation succeeds");

    assert!(second.is_done());
    assert_eq!(second.records_forwarded, 9_500);
    assert_eq!(sink.records(), sample_items(10_000));
    // 100 full pages, then DynamoDB-style trailing empty page.
    assert_eq!(table.reads(), 101);
}

#[test]
fn sink_failure_leaves_previous_checkpoint_as_resume_point() {
    let config = config(10);
    let table = InMemoryTable::new(sample_items(50));

    // Pause after page 2 so the caller holds the page-2 checkpoint.
    let first_sink = RecordingSink::new();
    let after_page_two = invoke(
        &config,
        &table,
        &first_sink,
        &ScriptedBudget::pause_after(2),
        &ReplayRequest::start(),
    )
    .expect("first invocation succeeds");
    let resume = next_request(&after_page_two);

    let failing_sink = RecordingSink::failing_on_call(0);
    let error = invoke(
        &config,
        &table,
        &failing_sink,
        &ScriptedBudget::ample(),
        &resume,
    )
    .expect_err("page 3 is rejected by the sink");
    assert_eq!(error.kind(), ErrorKind::SinkFailure);
    assert_eq!(
        error,
        ReplayError::SinkFailure {
            page_index: 0,
            record_count: 10,
            message: "injected sink failure".to_string(),
        }
    );

    // Blind re-invocation with the unchanged checkpoint resends page 3 only.
    let retry_sink = RecordingSink::new();
    let retried = invoke(
        &config,
        &table,
        &retry_sink,
        &ScriptedBudget::ample(),
        &resume,
    )
    .expect("retry succeeds");
    assert!(retried.is_done());
    assert_eq!(retry_sink.batches()[0], sample_items(50)[20..30].to_vec());
    assert_eq!(retry_sink.records(), sample_items(50)[20..].to_vec());
}

#[test]
fn malformed_checkpoint_aborts_without_reading() {
    let config = config(10);
    let table = InMemoryTable::new(sample_items(50));
    let sink = RecordingSink::new();
    let request = ReplayRequest::from_event(json!({"LastEvaluatedKey": {"pk": 17}}))
        .expect("payload shape is valid");

    let error = invoke(&config, &table, &sink, &ScriptedBudget::ample(), &request)
        .expect_err("malformed checkpoint is rejected");

    assert_eq!(error.kind(), ErrorKind::InvalidCheckpoint);
    assert_eq!(table.reads(), 0);
    assert!(sink.batches().is_empty());
}

#[test]
fn stale_checkpoint_is_rejected_without_forwarding() {
    let config = config(10);
    let table = InMemoryTable::new(sample_items(50));
    let sink = RecordingSink::new();
    let stale = InMemoryTable::checkpoint_for("item-99999");

    let error = invoke(
        &config,
        &table,
        &sink,
        &ScriptedBudget::ample(),
        &ReplayRequest::resume(&stale, TABLE),
    )
    .expect_err("stale checkpoint is rejected");

    assert_eq!(error.kind(), ErrorKind::InvalidCheckpoint);
    assert!(sink.batches().is_empty());
}

#[test]
fn checkpoint_from_another_table_is_rejected() {
    let config = config(10);
    let table = InMemoryTable::new(sample_items(50));
    let sink = RecordingSink::new();
    let foreign = InMemoryTable::checkpoint_for("item-00009");

    let error = invoke(
        &config,
        &table,
        &sink,
        &ScriptedBudget::ample(),
        &ReplayRequest::resume(&foreign, "customers"),
    )
    .expect_err("foreign lineage is rejected");

    assert_eq!(error.kind(), ErrorKind::InvalidCheckpoint);
    assert_eq!(table.reads(), 0);
}

#[test]
fn empty_table_finishes_without_forwarding() {
    let config = config(100);
    let table = InMemoryTable::new(Vec::new());
    let sink = RecordingSink::new();

    let response = invoke(
        &config,
        &table,
        &sink,
        &ScriptedBudget::exhausted(),
        &ReplayRequest::start(),
    )
    .expect("invocation succeeds");

    assert!(response.is_done());
    assert_eq!(response.pages_forwarded, 0);
    assert!(sink.batches().is_empty());
}

#[test]
fn final_page_is_finished_regardless_of_budget() {
    let config = config(100);
    let table = InMemoryTable::new(sample_items(40));
    let sink = RecordingSink::new();

    let response = invoke(
        &config,
        &table,
        &sink,
        &ScriptedBudget::exhausted(),
        &ReplayRequest::start(),
    )
    .expect("invocation succeeds");

    assert!(response.is_done());
    assert_eq!(sink.batch_sizes(), vec![40]);
}

#[test]
fn source_failure_mid_scan_aborts_invocation() {
    let config = config(10);
    let table = InMemoryTable::new(sample_items(50)).failing_on_read(2);
    let sink = RecordingSink::new();

    let error = invoke(
        &config,
        &table,
        &sink,
        &ScriptedBudget::ample(),
        &ReplayRequest::start(),
    )
    .expect_err("third read fails");

    assert_eq!(error.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(sink.batch_sizes(), vec![10, 10]);
}

#[test]
fn fresh_run_after_completion_restarts_from_beginning() {
    let config = config(25);
    let table = InMemoryTable::new(sample_items(30));
    let sink = RecordingSink::new();

    for _ in 0..2 {
        let response = invoke(
            &config,
            &table,
            &sink,
            &ScriptedBudget::ample(),
            &ReplayRequest::start(),
        )
        .expect("invocation succeeds");
        assert!(response.is_done());
    }

    assert_eq!(sink.batch_sizes(), vec![25, 5, 25, 5]);
}

#[test]
fn paused_result_carries_last_page_checkpoint() {
    let config = config(10);
    let table = InMemoryTable::new(sample_items(100));
    let sink = RecordingSink::new();
    let credentials = StaticCredentials::new(&table);
    let budget = ScriptedBudget::pause_after(3);

    let report = ReplayController::new(&config, &credentials, &sink, &budget)
        .run(&ReplayRequest::start())
        .expect("invocation succeeds");

    assert_eq!(
        report.result,
        RunResult::Paused(InMemoryTable::checkpoint_for("item-00029"))
    );
    assert_eq!(budget.samples_taken(), 3);
}

#[test]
fn wall_clock_deadline_drives_pause_decision() {
    let config = config(10);
    let table = InMemoryTable::new(sample_items(30));
    let credentials = StaticCredentials::new(&table);

    let generous = InstantDeadline::after(Duration::from_secs(600));
    let sink = RecordingSink::new();
    let report = ReplayController::new(&config, &credentials, &sink, &generous)
        .run(&ReplayRequest::start())
        .expect("invocation succeeds");
    assert_eq!(report.result, RunResult::Exhausted);

    let nearly_expired = InstantDeadline::after(Duration::from_secs(5));
    let sink = RecordingSink::new();
    let report = ReplayController::new(&config, &credentials, &sink, &nearly_expired)
        .run(&ReplayRequest::start())
        .expect("invocation succeeds");
    assert_eq!(
        report.result,
        RunResult::Paused(InMemoryTable::checkpoint_for("item-00009"))
    );
}
