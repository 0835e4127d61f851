//! End-to-end behaviour of the `Pushbutan` facade against the fake remote.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pushbutan_cli::application::interrupt;
use pushbutan_cli::application::services::orchestrator::{
    Pushbutan, RunOptions, SignRequest, StartRequest,
};
use pushbutan_cli::domain::{ApiError, ArtifactSummary, RunId, WorkflowError, WorkflowSummary};
use pushbutan_common::{Field, InstanceType, JobStatusReport, Os};

use crate::mocks::{FakeApi, MemoryArchive, RecordingReporter, engine, secs, test_config};

const PROVISION_LOG: &str = "\
2025-01-02T03:04:05.1234567Z Launching instance
2025-01-02T03:04:06.0000000Z INSTANCE_IDS: i-0abc123def
2025-01-02T03:04:07.0000000Z [ \"10.1.2.3\" ]
2025-01-02T03:04:08.0000000Z instance_type=g4dn.4xlarge arch=linux-64
2025-01-02T03:04:09.0000000Z Done";

fn inputs(api: &FakeApi) -> Vec<(String, String)> {
    api.dispatches()[0].inputs().to_vec()
}

fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

// ── start ─────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_start_returns_the_instance_the_job_reported() {
    let api = FakeApi::new()
        .with_script(vec![("queued", None), ("in_progress", None), ("completed", Some("success"))])
        .with_log(PROVISION_LOG);
    let (engine, archive) = engine(api);
    let reporter = RecordingReporter::default();

    let instance = engine
        .start_instance(&StartRequest::default(), &RunOptions::default(), &reporter)
        .await
        .unwrap();

    assert_eq!(instance.instance_id, Field::Known("i-0abc123def".into()));
    assert_eq!(instance.ip_address, Field::Known("10.1.2.3".into()));
    assert_eq!(instance.instance_type, Field::Known("g4dn.4xlarge".into()));
    assert_eq!(instance.arch, Field::Known("linux-64".into()));
    assert!(reporter.warnings().is_empty());
    assert!(archive.saved().is_empty());

    let api = engine.api();
    assert_eq!(
        inputs(api),
        pairs(&[
            ("arch", "linux-64"),
            ("instance_type", "g4dn.4xlarge"),
            ("cuda_version", "12.4"),
            ("image_id", "latest"),
            ("branch", "main"),
            ("lifetime", "24"),
        ])
    );
    assert_eq!(api.status_calls().len(), 3);
    assert!(api.cancels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_windows_start_sends_windows_inputs() {
    let api = FakeApi::new().with_log(PROVISION_LOG);
    let (engine, _) = engine(api);
    let req = StartRequest {
        os: Os::Windows,
        instance_type: InstanceType::P32xlarge,
        lifetime_hours: 4,
        branch: "dev".into(),
    };

    engine
        .start_instance(&req, &RunOptions::default(), &RecordingReporter::default())
        .await
        .unwrap();

    let sent = &engine.api().dispatches()[0];
    assert_eq!(sent.get("arch"), Some("win-64"));
    assert_eq!(sent.get("cuda_version"), Some("none"));
    assert_eq!(sent.get("instance_type"), Some("p3.2xlarge"));
    assert_eq!(sent.get("lifetime"), Some("4"));
    assert_eq!(sent.get("branch"), Some("dev"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_carries_log_tail_and_skips_extraction() {
    let api = FakeApi::new()
        .with_script(vec![("in_progress", None), ("completed", Some("failure"))])
        .with_log("setup ok\n\nERROR: no capacity in us-east-1a\n");
    let (engine, _) = engine(api);

    let err = engine
        .start_instance(&StartRequest::default(), &RunOptions::default(), &RecordingReporter::default())
        .await
        .unwrap_err();

    match err {
        WorkflowError::RemoteRunFailed {
            run_id,
            conclusion,
            html_url,
            log_excerpt,
            ..
        } => {
            assert_eq!(run_id, RunId(1000));
            assert_eq!(conclusion, "failure");
            assert!(html_url.unwrap().ends_with("/runs/1000"));
            assert_eq!(log_excerpt, vec!["setup ok", "ERROR: no capacity in us-east-1a"]);
        }
        other => panic!("expected RemoteRunFailed, got {other:?}"),
    }
    // Only the excerpt fetch; no extraction pass.
    assert_eq!(engine.api().log_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_without_log_still_fails_cleanly() {
    let api = FakeApi::new().with_script(vec![("completed", Some("cancelled"))]);
    let (engine, _) = engine(api);
    let err = engine
        .start_instance(&StartRequest::default(), &RunOptions::default(), &RecordingReporter::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::RemoteRunFailed { ref conclusion, ref log_excerpt, .. }
            if conclusion == "cancelled" && log_excerpt.is_empty()
    ));
}

#[tokio::test(start_paused = true)]
async fn test_missing_markers_are_unknown_with_a_warning() {
    let api = FakeApi::new().with_log("INSTANCE_IDS: i-0abc123def\n");
    let (engine, _) = engine(api);
    let reporter = RecordingReporter::default();

    let instance = engine
        .start_instance(&StartRequest::default(), &RunOptions::default(), &reporter)
        .await
        .unwrap();

    assert_eq!(instance.instance_id.known(), Some("i-0abc123def"));
    assert_eq!(instance.ip_address, Field::Unknown);
    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("ip_address"));
    assert!(!warnings[0].contains("instance_id"));
}

#[tokio::test(start_paused = true)]
async fn test_start_timeout_cancels_the_launch() {
    let api = FakeApi::new().with_script(vec![("in_progress", None)]);
    let (engine, _) = engine(api);
    let opts = RunOptions {
        timeout: Some(secs(30)),
        ..RunOptions::default()
    };

    let err = engine
        .start_instance(&StartRequest::default(), &opts, &RecordingReporter::default())
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::PollTimeout { cancel_attempted: true, .. }));
    assert_eq!(engine.api().cancels(), vec![RunId(1000)]);
    assert_eq!(engine.api().status_calls().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_start_cancels_the_launch() {
    let api = FakeApi::new().with_script(vec![("in_progress", None)]);
    let (engine, _) = engine(api);
    let (trigger, interrupt) = interrupt::channel();
    let opts = RunOptions {
        interrupt,
        ..RunOptions::default()
    };
    let reporter = RecordingReporter::default();
    let req = StartRequest::default();

    let start = engine.start_instance(&req, &opts, &reporter);
    let raise = async {
        tokio::time::sleep(secs(25)).await;
        trigger.raise();
    };
    let (result, ()) = tokio::join!(start, raise);

    let err = result.unwrap_err();
    assert_eq!(err.code(), "interrupted");
    assert_eq!(err.run_id(), Some(RunId(1000)));
    assert_eq!(engine.api().cancels(), vec![RunId(1000)]);
}

#[tokio::test(start_paused = true)]
async fn test_start_interrupted_while_correlating_still_cancels_the_launch() {
    let api = FakeApi::new().with_script(vec![("in_progress", None)]);
    let (engine, _) = engine(api);
    let (trigger, interrupt) = interrupt::channel();
    let opts = RunOptions {
        interrupt,
        ..RunOptions::default()
    };
    let reporter = RecordingReporter::default();
    let req = StartRequest::default();

    let start = engine.start_instance(&req, &opts, &reporter);
    let raise = async {
        // inside the one second initial delay, before the run is known
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.raise();
    };
    let (result, ()) = tokio::join!(start, raise);

    let err = result.unwrap_err();
    assert_eq!(err.code(), "interrupted");
    assert_eq!(err.run_id(), Some(RunId(1000)));
    assert_eq!(engine.api().dispatches().len(), 1);
    assert_eq!(engine.api().cancels(), vec![RunId(1000)]);
    assert!(engine.api().status_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupted_while_correlating_cancels_nothing() {
    let (engine, _) = engine(FakeApi::new());
    let (trigger, interrupt) = interrupt::channel();
    let opts = RunOptions {
        interrupt,
        ..RunOptions::default()
    };
    let reporter = RecordingReporter::default();

    let stop = engine.stop_instance("i-0abc", &opts, &reporter);
    let raise = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.raise();
    };
    let (result, ()) = tokio::join!(stop, raise);

    let err = result.unwrap_err();
    assert_eq!(err.code(), "interrupted");
    assert_eq!(err.run_id(), None);
    assert!(engine.api().cancels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_zero_lifetime_is_rejected_before_dispatch() {
    let (engine, _) = engine(FakeApi::new());
    let req = StartRequest {
        lifetime_hours: 0,
        ..StartRequest::default()
    };
    let err = engine
        .trigger_instance(&req, &RecordingReporter::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_request");
    assert!(engine.api().dispatches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_trigger_instance_only_resolves_the_run() {
    let (engine, _) = engine(FakeApi::new());
    let reporter = RecordingReporter::default();
    let handle = engine
        .trigger_instance(&StartRequest::default(), &reporter)
        .await
        .unwrap();
    let triggered = handle.to_triggered().unwrap();
    assert_eq!(triggered.run_id, 1000);
    assert_eq!(triggered.workflow, "31526128");
    assert!(engine.api().status_calls().is_empty());
    assert!(
        reporter
            .events()
            .contains(&"success: Found run 1000 of 31526128".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_starts_on_one_engine_get_distinct_runs() {
    let (engine, _) = engine(FakeApi::new().with_log(PROVISION_LOG));
    let req = StartRequest::default();

    let reporter = RecordingReporter::default();
    let (a, b) = tokio::join!(
        engine.trigger_instance(&req, &reporter),
        engine.trigger_instance(&req, &reporter)
    );

    assert_ne!(a.unwrap().run_id(), b.unwrap().run_id());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_fails_before_dispatch() {
    let api = FakeApi::new().with_user(Err(ApiError::Auth {
        status: 401,
        message: "Bad credentials".into(),
    }));
    let (engine, _) = engine(api);

    let err = engine
        .trigger_instance(&StartRequest::default(), &RecordingReporter::default())
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Auth(_)));
    assert!(engine.api().dispatches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_actor_only_disables_actor_filtering() {
    let api = FakeApi::new().with_user(Err(ApiError::Transient("502".into())));
    let (engine, _) = engine(api);
    let handle = engine
        .trigger_instance(&StartRequest::default(), &RecordingReporter::default())
        .await
        .unwrap();
    assert_eq!(handle.run_id(), Some(RunId(1000)));
}

// ── logs ──────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_save_logs_archives_the_run_log() {
    let (engine, archive) = engine(FakeApi::new().with_log(PROVISION_LOG));
    let reporter = RecordingReporter::default();
    let opts = RunOptions {
        save_logs: true,
        ..RunOptions::default()
    };

    engine
        .start_instance(&StartRequest::default(), &opts, &reporter)
        .await
        .unwrap();

    let saved = archive.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, RunId(1000));
    assert!(saved[0].1.contains("INSTANCE_IDS"));
    assert!(
        reporter
            .events()
            .contains(&"success: Logs saved to logs/run_1000_combined.txt".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_log_archive_does_not_fail_the_operation() {
    let engine = Pushbutan::new(
        FakeApi::new().with_log(PROVISION_LOG),
        test_config(),
        Arc::new(MemoryArchive::failing()),
    );
    let reporter = RecordingReporter::default();
    let opts = RunOptions {
        save_logs: true,
        ..RunOptions::default()
    };

    let instance = engine
        .start_instance(&StartRequest::default(), &opts, &reporter)
        .await
        .unwrap();

    assert!(instance.instance_id.is_known());
    assert!(reporter.warnings()[0].contains("disk full"));
}

// ── stop ──────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stop_sends_the_instance_id() {
    let (engine, _) = engine(FakeApi::new());
    let result = engine
        .stop_instance(" i-0abc123def ", &RunOptions::default(), &RecordingReporter::default())
        .await
        .unwrap();

    assert_eq!(result.run_id, 1000);
    assert_eq!(result.instance_id, "i-0abc123def");
    let api = engine.api();
    assert_eq!(inputs(api), pairs(&[("instance_id", "i-0abc123def")]));
    assert!(api.log_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_timeout_does_not_cancel() {
    let (engine, _) = engine(FakeApi::new().with_script(vec![("in_progress", None)]));
    let err = engine
        .stop_instance("i-1", &RunOptions::default(), &RecordingReporter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PollTimeout { cancel_attempted: false, .. }));
    assert!(engine.api().cancels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_requires_an_instance_id() {
    let (engine, _) = engine(FakeApi::new());
    let err = engine
        .trigger_stop("  ", &RecordingReporter::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_request");
    assert!(engine.api().dispatches().is_empty());
}

// ── sign ──────────────────────────────────────────────────────────────────────

fn sign_request(download_dir: Option<PathBuf>) -> SignRequest {
    SignRequest {
        channel: "main".into(),
        package_filter: "numpy-*".into(),
        cert: "ev-2025".into(),
        generate_repodata: true,
        download_dir,
    }
}

fn artifact(id: u64, name: &str, expired: bool) -> ArtifactSummary {
    ArtifactSummary {
        id,
        name: name.into(),
        size_in_bytes: 1024,
        expired,
    }
}

#[tokio::test(start_paused = true)]
async fn test_sign_reports_location_and_downloads_live_artifacts() {
    let api = FakeApi::new()
        .with_log("signing...\nsigned_location=s3://signed/main signed_count=12\n")
        .with_artifacts(vec![artifact(1, "signed-win-64", false), artifact(2, "old", true)]);
    let (engine, _) = engine(api);
    let dir = PathBuf::from("/tmp/signed");

    let result = engine
        .sign_package(&sign_request(Some(dir.clone())), &RunOptions::default(), &RecordingReporter::default())
        .await
        .unwrap();

    assert_eq!(result.run_id, 1000);
    assert_eq!(result.channel, "main");
    assert_eq!(result.location, Field::Known("s3://signed/main".into()));
    assert_eq!(result.signed_count, Field::Known("12".into()));
    assert!(result.repodata_generated);
    assert_eq!(result.artifacts, vec!["signed-win-64", "old"]);
    assert_eq!(result.files, vec![dir.join("signed-win-64").join("pkg.conda")]);

    let api = engine.api();
    assert_eq!(
        inputs(api),
        pairs(&[
            ("channel", "main"),
            ("package_filter", "numpy-*"),
            ("cert", "ev-2025"),
            ("generate_repodata", "true"),
        ])
    );
    assert_eq!(api.downloads(), vec![("signed-win-64".to_string(), dir)]);
}

#[tokio::test(start_paused = true)]
async fn test_sign_without_download_dir_only_lists_artifacts() {
    let api = FakeApi::new()
        .with_log("signed_location=s3://signed/main signed_count=3")
        .with_artifacts(vec![artifact(1, "signed", false)]);
    let (engine, _) = engine(api);
    let result = engine
        .sign_package(&sign_request(None), &RunOptions::default(), &RecordingReporter::default())
        .await
        .unwrap();
    assert!(result.files.is_empty());
    assert!(engine.api().downloads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sign_survives_an_artifact_listing_failure_without_download_dir() {
    let api = FakeApi::new()
        .with_log("signed_location=s3://signed/main signed_count=3")
        .with_artifact_error(ApiError::Transient("502 Bad Gateway".into()));
    let (engine, _) = engine(api);
    let reporter = RecordingReporter::default();

    let result = engine
        .sign_package(&sign_request(None), &RunOptions::default(), &reporter)
        .await
        .unwrap();

    assert_eq!(result.location, Field::Known("s3://signed/main".into()));
    assert_eq!(result.signed_count, Field::Known("3".into()));
    assert!(result.artifacts.is_empty());
    assert!(
        reporter
            .warnings()
            .iter()
            .any(|w| w.contains("Could not list artifacts of run 1000"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_sign_fails_on_artifact_listing_failure_when_downloading() {
    let api = FakeApi::new()
        .with_log("signed_location=s3://signed/main signed_count=3")
        .with_artifact_error(ApiError::Transient("502 Bad Gateway".into()));
    let (engine, _) = engine(api);

    let err = engine
        .sign_package(
            &sign_request(Some(PathBuf::from("/tmp/signed"))),
            &RunOptions::default(),
            &RecordingReporter::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "artifacts_failed");
    assert_eq!(err.run_id(), Some(RunId(1000)));
}

#[tokio::test(start_paused = true)]
async fn test_sign_requires_channel_and_cert() {
    let (engine, _) = engine(FakeApi::new());
    let mut req = sign_request(None);
    req.cert = String::new();
    let err = engine
        .sign_package(&req, &RunOptions::default(), &RecordingReporter::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cert must not be empty"));
}

// ── queries ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_status_shapes() {
    let (walking, _) = engine(FakeApi::new().with_script(vec![
        ("in_progress", None),
        ("completed", Some("success")),
    ]));
    let first = walking.run_status(RunId(9)).await.unwrap();
    let second = walking.run_status(RunId(9)).await.unwrap();
    assert_eq!(
        first,
        JobStatusReport::InProgress {
            workflow_status: "in_progress".into(),
            workflow_conclusion: None
        }
    );
    assert!(matches!(second, JobStatusReport::Ready { .. }));

    let (timed_out, _) = engine(FakeApi::new().with_script(vec![("completed", Some("timed_out"))]));
    let report = timed_out.run_status(RunId(9)).await.unwrap();
    assert_eq!(
        report,
        JobStatusReport::Failed {
            error: "Workflow failed with conclusion: timed_out".into()
        }
    );
}

#[tokio::test]
async fn test_run_status_with_bad_token_is_auth() {
    let (engine, _) = engine(FakeApi::new().with_status_errors(vec![ApiError::Auth {
        status: 401,
        message: "Bad credentials".into(),
    }]));
    let err = engine.run_status(RunId(9)).await.unwrap_err();
    assert_eq!(err.code(), "auth");
}

#[tokio::test]
async fn test_instance_details_of_a_finished_run() {
    let (engine, archive) = engine(FakeApi::new().with_log(PROVISION_LOG));
    let instance = engine.instance_details(RunId(77), true).await.unwrap();
    assert_eq!(instance.ip_address.known(), Some("10.1.2.3"));
    assert_eq!(archive.saved()[0].0, RunId(77));
}

#[tokio::test]
async fn test_instance_details_of_a_running_run_is_rejected() {
    let (engine, _) = engine(FakeApi::new().with_script(vec![("in_progress", None)]));
    let err = engine.instance_details(RunId(77), false).await.unwrap_err();
    assert_eq!(err.code(), "invalid_request");
    assert!(engine.api().log_calls().is_empty());
}

#[tokio::test]
async fn test_list_workflows_passes_through() {
    let workflow = WorkflowSummary {
        id: 31_526_128,
        name: "Dev instance".into(),
        path: ".github/workflows/dev-instance.yml".into(),
        state: "active".into(),
    };
    let (engine, _) = engine(FakeApi::new().with_workflows(vec![workflow.clone()]));
    assert_eq!(engine.list_workflows().await.unwrap(), vec![workflow]);
}
