//! Unit tests for the session registry: port bookkeeping, lifecycle
//! transitions, lookup, and reaping.

use launchport::launcher::ports::PortAllocator;
use launchport::launcher::registry::SessionRegistry;
use launchport::models::session::SessionStatus;
use launchport::AppError;

fn registry() -> SessionRegistry {
    SessionRegistry::new(PortAllocator::default())
}

#[test]
fn debug_session_gets_two_distinct_ports() {
    let registry = registry();
    let ports = registry.allocate_and_register("s1", true).expect("alloc");

    let debug = ports.debug.expect("debug port set");
    let service = ports.service.expect("service port set");
    assert_ne!(debug, service);

    let active = registry.active_ports();
    assert!(active.contains(&debug));
    assert!(active.contains(&service));
}

#[test]
fn plain_session_gets_only_a_service_port() {
    let registry = registry();
    let ports = registry.allocate_and_register("s1", false).expect("alloc");

    assert!(ports.debug.is_none());
    assert_eq!(ports.debug_port(), -1);
    assert!(ports.service.is_some());
}

#[test]
fn second_session_never_reuses_live_ports() {
    let registry = registry();
    let first = registry.allocate_and_register("s1", true).expect("first");
    let second = registry.allocate_and_register("s2", true).expect("second");

    let first_ports: Vec<u16> = first.assigned().collect();
    for port in second.assigned() {
        assert!(
            !first_ports.contains(&port),
            "port {port} reused across live sessions"
        );
    }
}

#[test]
fn termination_frees_ports_without_removing_the_record() {
    let registry = registry();
    let ports = registry.allocate_and_register("s1", false).expect("alloc");
    registry
        .update_status("s1", SessionStatus::Running)
        .expect("running");
    registry
        .update_status("s1", SessionStatus::Terminated { exit_code: Some(0) })
        .expect("terminated");

    assert!(registry.active_ports().is_empty());
    let record = registry.lookup("s1").expect("record kept");
    assert_eq!(
        record.status,
        SessionStatus::Terminated { exit_code: Some(0) }
    );
    assert_eq!(record.ports, ports);
}

#[test]
fn failed_start_unregister_releases_ports() {
    let registry = registry();
    registry.allocate_and_register("s1", false).expect("alloc");
    registry.unregister("s1").expect("unregister");

    assert!(registry.active_ports().is_empty());
    assert!(registry.is_empty());
}

#[test]
fn unregister_unknown_id_is_not_found() {
    let registry = registry();
    let err = registry.unregister("ghost").expect_err("must fail");
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
}

#[test]
fn lookup_unknown_id_is_not_found() {
    let registry = registry();
    assert!(matches!(
        registry.lookup("ghost"),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn invalid_transition_is_rejected() {
    let registry = registry();
    registry.allocate_and_register("s1", false).expect("alloc");
    registry
        .update_status("s1", SessionStatus::FailedToStart)
        .expect("failed to start");

    let err = registry
        .update_status("s1", SessionStatus::Running)
        .expect_err("terminal state is final");
    assert!(matches!(err, AppError::Validation(_)), "got {err}");
}

#[test]
fn reap_removes_only_terminal_records() {
    let registry = registry();
    registry.allocate_and_register("dead", false).expect("alloc");
    registry.allocate_and_register("live", false).expect("alloc");
    registry
        .update_status("dead", SessionStatus::FailedToStart)
        .expect("fail");

    let reaped = registry.reap_terminated();

    assert_eq!(reaped, vec!["dead".to_owned()]);
    assert_eq!(registry.len(), 1);
    assert!(registry.lookup("live").is_ok());
}
