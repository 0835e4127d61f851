//! Poll loop timing, termination and cancellation on a paused clock.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use chrono::Utc;
use pushbutan_cli::application::interrupt::{self, Interrupt};
use pushbutan_cli::application::services::poller::{PollOptions, poll_until_terminal};
use pushbutan_cli::domain::{ApiError, RunHandle, RunId, RunStatus, WorkflowError};
use tokio::time::Instant;

use crate::mocks::{FakeApi, RecordingReporter, secs};

fn handle() -> RunHandle {
    RunHandle::pending("31526128", Utc::now()).resolve(RunId(42))
}

fn opts(timeout: u64, interval: u64, cancel: bool) -> PollOptions {
    PollOptions {
        timeout: secs(timeout),
        interval: secs(interval),
        cancel_on_timeout: cancel,
    }
}

#[tokio::test(start_paused = true)]
async fn test_stops_at_first_terminal_status() {
    let api = FakeApi::new().with_script(vec![
        ("queued", None),
        ("in_progress", None),
        ("completed", Some("success")),
    ]);
    let reporter = RecordingReporter::default();
    let started = Instant::now();

    let snapshot = poll_until_terminal(&api, &handle(), &opts(120, 10, false), &Interrupt::never(), &reporter)
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Success);
    assert_eq!(api.status_calls().len(), 3);
    assert_eq!(started.elapsed(), secs(20));
    assert_eq!(
        reporter.events(),
        vec![
            "step: Run 42: queued",
            "step: Run 42: in_progress",
            "step: Run 42: success",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_returned_as_a_terminal_snapshot() {
    let api = FakeApi::new().with_script(vec![("in_progress", None), ("completed", Some("failure"))]);
    let snapshot = poll_until_terminal(
        &api,
        &handle(),
        &opts(120, 10, false),
        &Interrupt::never(),
        &RecordingReporter::default(),
    )
    .await
    .unwrap();
    assert_eq!(snapshot.status, RunStatus::Failure);
    assert_eq!(api.status_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_status_is_reported_once() {
    let api = FakeApi::new().with_script(vec![
        ("in_progress", None),
        ("in_progress", None),
        ("in_progress", None),
        ("completed", Some("success")),
    ]);
    let reporter = RecordingReporter::default();
    poll_until_terminal(&api, &handle(), &opts(120, 10, false), &Interrupt::never(), &reporter)
        .await
        .unwrap();
    assert_eq!(reporter.events().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_polls_on_schedule_then_cancels_once() {
    let api = FakeApi::new().with_script(vec![("in_progress", None)]);
    let started = Instant::now();

    let err = poll_until_terminal(
        &api,
        &handle(),
        &opts(120, 10, true),
        &Interrupt::never(),
        &RecordingReporter::default(),
    )
    .await
    .unwrap_err();

    // t = 0, 10, ..., 120
    assert_eq!(api.status_calls().len(), 13);
    assert_eq!(api.cancels(), vec![RunId(42)]);
    assert_eq!(started.elapsed(), secs(120));
    match err {
        WorkflowError::PollTimeout {
            run_id,
            last_status,
            cancel_attempted,
            timeout,
            ..
        } => {
            assert_eq!(run_id, RunId(42));
            assert_eq!(last_status, RunStatus::InProgress);
            assert_eq!(timeout, secs(120));
            assert!(cancel_attempted);
        }
        other => panic!("expected PollTimeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_cancel_leaves_run_alone() {
    let api = FakeApi::new().with_script(vec![("queued", None)]);
    let err = poll_until_terminal(
        &api,
        &handle(),
        &opts(30, 10, false),
        &Interrupt::never(),
        &RecordingReporter::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::PollTimeout {
            cancel_attempted: false,
            ..
        }
    ));
    assert!(api.cancels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_makes_exactly_one_call() {
    let api = FakeApi::new().with_script(vec![("in_progress", None)]);
    let err = poll_until_terminal(
        &api,
        &handle(),
        &opts(0, 10, false),
        &Interrupt::never(),
        &RecordingReporter::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "poll_timeout");
    assert_eq!(api.status_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_last_sleep_is_trimmed_to_the_deadline() {
    let api = FakeApi::new().with_script(vec![("in_progress", None)]);
    let started = Instant::now();
    let _ = poll_until_terminal(
        &api,
        &handle(),
        &opts(25, 10, false),
        &Interrupt::never(),
        &RecordingReporter::default(),
    )
    .await;
    // t = 0, 10, 20, 25
    assert_eq!(api.status_calls().len(), 4);
    assert_eq!(started.elapsed(), secs(25));
}

#[tokio::test(start_paused = true)]
async fn test_failed_cancel_still_reports_the_timeout() {
    let api = FakeApi::new()
        .with_script(vec![("in_progress", None)])
        .with_cancel_error(ApiError::Transient("502".into()));
    let err = poll_until_terminal(
        &api,
        &handle(),
        &opts(10, 10, true),
        &Interrupt::never(),
        &RecordingReporter::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WorkflowError::PollTimeout { cancel_attempted: true, .. }));
    assert_eq!(api.cancels().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_error_after_retries_is_poll_failed() {
    let api = FakeApi::new().with_status_errors(vec![ApiError::Transient("timed out".into())]);
    let err = poll_until_terminal(
        &api,
        &handle(),
        &opts(120, 10, true),
        &Interrupt::never(),
        &RecordingReporter::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WorkflowError::PollFailed { run_id: RunId(42), .. }));
    assert!(api.cancels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_handle_is_rejected_without_calls() {
    let api = FakeApi::new();
    let unresolved = RunHandle::pending("31526128", Utc::now()).unresolved();
    let err = poll_until_terminal(
        &api,
        &unresolved,
        &opts(120, 10, false),
        &Interrupt::never(),
        &RecordingReporter::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "invalid_request");
    assert!(api.status_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_mid_poll_cancels_when_asked() {
    let api = FakeApi::new().with_script(vec![("in_progress", None)]);
    let (trigger, interrupt) = interrupt::channel();
    let handle = handle();
    let opts = opts(120, 10, true);
    let reporter = RecordingReporter::default();

    let poll = poll_until_terminal(&api, &handle, &opts, &interrupt, &reporter);
    let raise = async {
        tokio::time::sleep(Duration::from_secs(15)).await;
        trigger.raise();
    };
    let (result, ()) = tokio::join!(poll, raise);

    assert!(matches!(
        result.unwrap_err(),
        WorkflowError::Interrupted {
            run_id: Some(RunId(42)),
            cancel_attempted: true,
            ..
        }
    ));
    // t = 0 and 10; the sleep towards 20 is cut short
    assert_eq!(api.status_calls().len(), 2);
    assert_eq!(api.cancels(), vec![RunId(42)]);
}
