//! Integration tests for the process session state machine.
//!
//! Real child processes are spawned through small shell scripts that
//! ignore the launcher's VM flags, so the lifecycle can be observed end
//! to end: spawn, output draining, exit notification, termination.

use std::sync::Arc;
use std::time::Duration;

use launchport::launcher::session::ProcessSession;
use launchport::models::params::{ExecutorKind, LaunchParameters};
use launchport::models::session::SessionStatus;
use launchport::AppError;

use super::helpers::registry;

#[tokio::test]
async fn failed_spawn_is_failed_to_start_and_leaves_no_active_ports() {
    let registry = registry();
    let dir = tempfile::tempdir().expect("tempdir");
    let params = LaunchParameters::new("/nonexistent/vm-binary", dir.path().join("main.dart"))
        .with_working_dir(dir.path());
    let session = ProcessSession::new(params, Arc::clone(&registry));

    let err = session.start().await.expect_err("spawn must fail");

    assert!(matches!(err, AppError::ProcessLaunch(_)), "got {err}");
    assert_eq!(session.status(), SessionStatus::FailedToStart);
    assert!(!session.is_running());
    assert!(
        registry.active_ports().is_empty(),
        "tentative port reservations must be released on spawn failure"
    );
    assert!(
        registry.lookup(session.id()).is_err(),
        "failed session must not stay registered"
    );
}

#[tokio::test]
async fn ports_are_unset_before_start() {
    let registry = registry();
    let params = LaunchParameters::new("dart", "main.dart");
    let session = ProcessSession::new(params, registry);

    assert_eq!(session.debug_port(), -1);
    assert_eq!(session.service_port(), -1);
    assert!(session.subscribe_output().is_none());
}

#[tokio::test]
async fn terminate_before_start_is_a_noop() {
    let registry = registry();
    let params = LaunchParameters::new("dart", "main.dart");
    let session = ProcessSession::new(params, registry);

    session.terminate(true).await.expect("no-op");
    session.terminate(false).await.expect("no-op");
}

#[cfg(unix)]
mod unix {
    use super::*;
    use crate::integration::helpers::write_script;

    fn script_params(dir: &std::path::Path, name: &str, body: &str) -> LaunchParameters {
        let script = write_script(dir, name, body);
        LaunchParameters::new(script, dir.join("main.dart")).with_working_dir(dir)
    }

    #[tokio::test]
    async fn short_lived_process_reports_exit_code_zero() {
        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let session = ProcessSession::new(
            script_params(dir.path(), "ok.sh", "exit 0"),
            Arc::clone(&registry),
        );

        session.start().await.expect("start");
        let status = session.wait_for_exit().await;

        assert_eq!(status, SessionStatus::Terminated { exit_code: Some(0) });
        assert!(!session.is_running());
        assert!(registry.active_ports().is_empty());
        let record = registry.lookup(session.id()).expect("record kept");
        assert_eq!(record.status, status);
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_passed_through_verbatim() {
        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let session =
            ProcessSession::new(script_params(dir.path(), "fail.sh", "exit 7"), registry);

        session.start().await.expect("start");
        let status = session.wait_for_exit().await;

        assert_eq!(status, SessionStatus::Terminated { exit_code: Some(7) });
    }

    #[tokio::test]
    async fn graceful_terminate_after_exit_is_a_noop() {
        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let session =
            ProcessSession::new(script_params(dir.path(), "ok.sh", "exit 0"), registry);

        session.start().await.expect("start");
        session.wait_for_exit().await;

        session
            .terminate(true)
            .await
            .expect("terminating a terminated session must succeed");
    }

    #[tokio::test]
    async fn output_lines_arrive_in_order_and_the_stream_ends() {
        use launchport::launcher::output::OutputStream;

        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let body = "echo first\necho second\necho oops 1>&2";
        let session =
            ProcessSession::new(script_params(dir.path(), "chatty.sh", body), registry);

        session.start().await.expect("start");
        let mut output = session.subscribe_output().expect("first take");
        assert!(session.subscribe_output().is_none(), "single-take stream");

        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();
        while let Some(line) = output.recv().await {
            match line.stream {
                OutputStream::Stdout => stdout_lines.push(line.text),
                OutputStream::Stderr => stderr_lines.push(line.text),
            }
        }

        assert_eq!(stdout_lines, vec!["first", "second"]);
        assert_eq!(stderr_lines, vec!["oops"]);
        // Channel closed: the process terminated and output is drained.
        assert!(output.recv().await.is_none());
        session.wait_for_exit().await;
    }

    #[tokio::test]
    async fn child_output_flows_through_the_filter_pipeline() {
        use launchport::launcher::filter::{AnnotatedLine, ConsoleFilter, FilterPipeline};

        struct MarkerFilter;

        impl ConsoleFilter for MarkerFilter {
            fn consumes_line(&self, line: &str) -> Option<AnnotatedLine> {
                line.contains("marked").then(|| AnnotatedLine::plain(line))
            }
        }

        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let body = "echo marked line\necho plain line";
        let session =
            ProcessSession::new(script_params(dir.path(), "filtered.sh", body), registry);

        session.start().await.expect("start");
        let mut output = session.subscribe_output().expect("output stream");

        let mut pipeline = FilterPipeline::new();
        pipeline.push(Box::new(MarkerFilter));

        let mut consumed = 0;
        let mut passed_through = 0;
        while let Some(line) = output.recv().await {
            let annotated = pipeline.apply(&line.text);
            assert_eq!(annotated.text, line.text, "filters never rewrite text");
            if line.text.contains("marked") {
                consumed += 1;
            } else {
                passed_through += 1;
            }
        }
        assert_eq!(consumed, 1);
        assert_eq!(passed_through, 1);
        session.wait_for_exit().await;
    }

    #[tokio::test]
    async fn graceful_terminate_stops_a_long_running_session() {
        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let session = ProcessSession::new(
            script_params(dir.path(), "long.sh", "exec sleep 30"),
            Arc::clone(&registry),
        )
        .with_graceful_timeout(Duration::from_secs(5));

        session.start().await.expect("start");
        assert!(session.is_running());

        session.terminate(true).await.expect("terminate");

        let status = session.wait_for_exit().await;
        assert!(matches!(status, SessionStatus::Terminated { .. }));
        assert!(registry.active_ports().is_empty());
    }

    #[tokio::test]
    async fn forced_terminate_kills_immediately() {
        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let session = ProcessSession::new(
            script_params(dir.path(), "long.sh", "exec sleep 30"),
            Arc::clone(&registry),
        );

        session.start().await.expect("start");
        session.terminate(false).await.expect("kill");

        let status = session.wait_for_exit().await;
        // Killed by signal: no exit code to pass through.
        assert_eq!(status, SessionStatus::Terminated { exit_code: None });
        assert!(registry.active_ports().is_empty());
    }

    #[tokio::test]
    async fn debug_session_exposes_two_distinct_live_ports() {
        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let params = script_params(dir.path(), "long.sh", "exec sleep 30")
            .with_executor(ExecutorKind::Debug);
        let session = ProcessSession::new(params, Arc::clone(&registry));

        session.start().await.expect("start");

        let debug = session.debug_port();
        let service = session.service_port();
        assert!(debug > 0, "debug port must be set for debug runs");
        assert!(service > 0, "service port must always be set");
        assert_ne!(debug, service);

        let active = registry.active_ports();
        assert!(active.contains(&u16::try_from(debug).expect("port range")));
        assert!(active.contains(&u16::try_from(service).expect("port range")));

        session.terminate(false).await.expect("cleanup");
        session.wait_for_exit().await;
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let session =
            ProcessSession::new(script_params(dir.path(), "ok.sh", "exit 0"), registry);

        session.start().await.expect("first start");
        let err = session.start().await.expect_err("second start must fail");
        assert!(matches!(err, AppError::Validation(_)), "got {err}");
        session.wait_for_exit().await;
    }
}
