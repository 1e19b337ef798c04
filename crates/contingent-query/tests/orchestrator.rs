use std::sync::Arc;
use std::time::Duration;

use contingent_common::Cell;
use contingent_query::{BuildError, BuildStage, ContingencyQuery, JobOrchestrator, PollPolicy};
use contingent_test_utils::{CellScript, FakeTaskApi};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;

const COLLECTION: &str = "RQ-CC-1";

fn query() -> ContingencyQuery {
    ContingencyQuery::new("8507", "Person", "24970", "Condition")
}

fn fast(max_attempts: u32) -> PollPolicy {
    PollPolicy::bounded(Duration::from_millis(1), max_attempts)
}

#[tokio::test]
async fn test_builds_table_in_cell_order() {
    let api = Arc::new(FakeTaskApi::with_counts([30, 70, 10, 90]));
    let orchestrator = JobOrchestrator::new(api.clone()).with_policy(fast(5));

    let table = orchestrator
        .build_contingency_table(&query(), COLLECTION, "user1")
        .await
        .unwrap();

    assert_eq!(table.to_ordered(), [30, 70, 10, 90]);
    assert_eq!(table.total(), 200);
    assert_eq!(api.submissions().len(), 4);
    for cell in Cell::ALL {
        assert_eq!(api.status_calls(cell), 1);
        assert_eq!(api.results_calls(cell), 1);
    }
}

#[tokio::test]
async fn test_submissions_target_collection_and_owner() {
    let api = Arc::new(FakeTaskApi::with_counts([1, 2, 3, 4]));
    let orchestrator = JobOrchestrator::new(api.clone()).with_policy(fast(5));
    orchestrator
        .build_contingency_table(&query(), COLLECTION, "analyst")
        .await
        .unwrap();

    for submission in api.submissions() {
        assert_eq!(submission.input.collection, vec![COLLECTION.to_string()]);
        assert_eq!(submission.input.owner, "analyst");
    }
}

#[tokio::test]
async fn test_polls_until_done_then_fetches_once() {
    let api = Arc::new(
        FakeTaskApi::builder()
            .cell(
                Cell::ExposedWithOutcome,
                CellScript::sequence(&["JOB_SUBMITTED", "JOB_RUNNING", "JOB_DONE"], 42),
            )
            .build(),
    );
    let orchestrator = JobOrchestrator::new(api.clone()).with_policy(fast(10));
    let [first, ..] = query().build_queries("b1", COLLECTION, "user1");

    let job = orchestrator.submit(&first).await.unwrap();
    let count = orchestrator.await_completion(job).await.unwrap();

    assert_eq!(count, 42);
    assert_eq!(api.status_calls(Cell::ExposedWithOutcome), 3);
    assert_eq!(api.results_calls(Cell::ExposedWithOutcome), 1);
}

#[tokio::test]
async fn test_poll_timeout_after_max_attempts() {
    let api = Arc::new(
        FakeTaskApi::builder()
            .cell(Cell::ExposedWithOutcome, CellScript::running_forever())
            .build(),
    );
    let orchestrator = JobOrchestrator::new(api.clone()).with_policy(fast(3));
    let [first, ..] = query().build_queries("b1", COLLECTION, "user1");

    let job = orchestrator.submit(&first).await.unwrap();
    let err = orchestrator.await_completion(job).await.unwrap_err();

    match err {
        BuildError::PollTimeout { cell, attempts, .. } => {
            assert_eq!(cell, Cell::ExposedWithOutcome);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected PollTimeout, got {other:?}"),
    }
    assert_eq!(api.status_calls(Cell::ExposedWithOutcome), 3);
    assert_eq!(api.results_calls(Cell::ExposedWithOutcome), 0);
}

#[tokio::test]
async fn test_failed_job_aborts_sequential_build() {
    let api = Arc::new(
        FakeTaskApi::builder()
            .cell(Cell::ExposedWithoutOutcome, CellScript::failed())
            .build(),
    );
    let orchestrator = JobOrchestrator::new(api.clone())
        .with_policy(fast(5))
        .with_max_workers(1);

    let err = orchestrator
        .build_contingency_table(&query(), COLLECTION, "user1")
        .await
        .unwrap_err();

    assert_eq!(err.cell(), Some(Cell::ExposedWithoutOutcome));
    assert!(matches!(err, BuildError::JobFailed { ref status, .. } if status == "JOB_FAILED"));
    assert!(!err.is_retryable());
    assert_eq!(
        api.submitted_cells(),
        vec![Cell::ExposedWithOutcome, Cell::ExposedWithoutOutcome]
    );
}

#[tokio::test]
async fn test_failed_job_aborts_concurrent_build() {
    let api = Arc::new(
        FakeTaskApi::builder()
            .cell(Cell::ExposedWithOutcome, CellScript::running_forever())
            .cell(Cell::ExposedWithoutOutcome, CellScript::running_forever())
            .cell(
                Cell::UnexposedWithOutcome,
                CellScript::sequence(&["JOB_RUNNING", "JOB_RUNNING", "JOB_FAILED"], 0),
            )
            .cell(Cell::UnexposedWithoutOutcome, CellScript::running_forever())
            .build(),
    );
    let orchestrator = JobOrchestrator::new(api.clone())
        .with_policy(PollPolicy::unbounded(Duration::from_millis(1)));

    let err = orchestrator
        .build_contingency_table(&query(), COLLECTION, "user1")
        .await
        .unwrap_err();
    assert_eq!(err.cell(), Some(Cell::UnexposedWithOutcome));

    let polls_at_abort = api.total_status_calls();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(api.total_status_calls(), polls_at_abort);
    for cell in Cell::ALL {
        assert_eq!(api.results_calls(cell), 0);
    }
}

#[tokio::test]
async fn test_poll_timeout_aborts_build() {
    let api = Arc::new(
        FakeTaskApi::builder()
            .cell(Cell::UnexposedWithOutcome, CellScript::running_forever())
            .build(),
    );
    let orchestrator = JobOrchestrator::new(api.clone()).with_policy(fast(3));

    let err = orchestrator
        .build_contingency_table(&query(), COLLECTION, "user1")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::PollTimeout { cell: Cell::UnexposedWithOutcome, attempts: 3, .. }
    ));
    assert_eq!(err.cell(), Some(Cell::UnexposedWithOutcome));
    assert!(!err.is_retryable());
    assert_eq!(api.status_calls(Cell::UnexposedWithOutcome), 3);
    assert_eq!(api.results_calls(Cell::UnexposedWithOutcome), 0);
}

#[tokio::test]
async fn test_status_for_another_job_is_rejected() {
    let api = Arc::new(
        FakeTaskApi::builder()
            .cell(Cell::ExposedWithOutcome, CellScript::done(12).reporting_as("job-00-999"))
            .build(),
    );
    let orchestrator = JobOrchestrator::new(api.clone()).with_policy(fast(5));
    let [first, ..] = query().build_queries("b1", COLLECTION, "user1");

    let job = orchestrator.submit(&first).await.unwrap();
    let err = orchestrator.await_completion(job).await.unwrap_err();

    match err {
        BuildError::MalformedResponse { cell, what, ref reason } => {
            assert_eq!(cell, Cell::ExposedWithOutcome);
            assert_eq!(what, "status report");
            assert!(reason.contains("job-00-999"), "{reason}");
        }
        other => panic!("expected MalformedResponse, got {other:?}"),
    }
    assert_eq!(api.results_calls(Cell::ExposedWithOutcome), 0);
}

#[tokio::test]
async fn test_malformed_result_names_cell() {
    let api = Arc::new(
        FakeTaskApi::builder()
            .cell(
                Cell::UnexposedWithoutOutcome,
                CellScript::done(0).with_result(json!({
                    "status": "ok",
                    "uuid": "job",
                    "queryResult": {"count": "many"}
                })),
            )
            .build(),
    );
    let orchestrator = JobOrchestrator::new(api.clone()).with_policy(fast(5));

    let err = orchestrator
        .build_contingency_table(&query(), COLLECTION, "user1")
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::MalformedResponse { what: "query result", .. }));
    assert_eq!(err.cell(), Some(Cell::UnexposedWithoutOutcome));
}

#[tokio::test]
async fn test_submission_rejection_is_retryable() {
    let api = Arc::new(
        FakeTaskApi::builder()
            .cell(Cell::UnexposedWithOutcome, CellScript::submit_error(503))
            .build(),
    );
    let orchestrator = JobOrchestrator::new(api.clone())
        .with_policy(fast(5))
        .with_max_workers(1);

    let err = orchestrator
        .build_contingency_table(&query(), COLLECTION, "user1")
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.cell(), Some(Cell::UnexposedWithOutcome));
}

#[tokio::test]
async fn test_each_build_mints_fresh_correlation_ids() {
    let api = Arc::new(FakeTaskApi::with_counts([1, 1, 1, 1]));
    let orchestrator = JobOrchestrator::new(api.clone()).with_policy(fast(5));

    orchestrator.build_contingency_table(&query(), COLLECTION, "user1").await.unwrap();
    orchestrator.build_contingency_table(&query(), COLLECTION, "user1").await.unwrap();

    let mut ids: Vec<String> = api.submissions().into_iter().map(|s| s.input.uuid).collect();
    assert_eq!(ids.len(), 8);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn test_progress_events() {
    let api = Arc::new(FakeTaskApi::with_counts([5, 6, 7, 8]));
    let (tx, mut rx) = broadcast::channel(64);
    let orchestrator = JobOrchestrator::new(api)
        .with_policy(fast(5))
        .with_progress(tx);

    orchestrator.build_contingency_table(&query(), COLLECTION, "user1").await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let count = |stage: BuildStage| events.iter().filter(|e| e.stage == stage).count();
    assert_eq!(count(BuildStage::Submitted), 4);
    assert_eq!(count(BuildStage::Done), 4);
    assert_eq!(count(BuildStage::Failed), 0);

    let last = events.last().unwrap();
    assert_eq!(last.stage, BuildStage::Assembled);
    assert_eq!(last.cell, None);
    assert_eq!(last.message, "total = 26");
    assert!(events.iter().all(|e| e.build_id == last.build_id));
}
