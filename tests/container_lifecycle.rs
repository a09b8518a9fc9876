// Launch, resolve and terminate against a recording runtime

mod common;

use common::{launcher, Call, MockRuntime};
use std::sync::Arc;
use terralocacon::container::{ContainerPort, ContainerSpec, ContainerState, WaitFor};
use terralocacon::context::Context;
use terralocacon::errors::TlcError;
use terralocacon::terminate;

fn localstack_like() -> ContainerSpec {
    ContainerSpec::new("localstack/localstack:latest")
        .with_exposed_port(ContainerPort::tcp(4566))
        .with_wait_for(WaitFor::log("Ready"))
}

#[test]
fn test_empty_image_makes_no_runtime_call() {
    let runtime = Arc::new(MockRuntime::new("Ready", 32768));
    let launcher = launcher(&runtime);

    let spec = ContainerSpec::new("").with_exposed_port(ContainerPort::tcp(4566));
    let err = launcher.launch(&Context::background(), &spec).unwrap_err();

    assert!(matches!(err, TlcError::MissingField("image")));
    assert!(err.is_validation());
    assert_eq!(runtime.call_count(), 0);
}

#[test]
fn test_empty_ports_makes_no_runtime_call() {
    let runtime = Arc::new(MockRuntime::new("Ready", 32768));
    let launcher = launcher(&runtime);

    let spec = ContainerSpec::new("mongo:latest").with_wait_for(WaitFor::log("ready"));
    let err = launcher.launch(&Context::background(), &spec).unwrap_err();

    assert!(matches!(err, TlcError::MissingField("exposed ports")));
    assert_eq!(runtime.call_count(), 0);
}

#[test]
fn test_launch_then_resolve() {
    let runtime = Arc::new(MockRuntime::new("Starting\nReady.\n", 32768));
    let launcher = launcher(&runtime);
    let ctx = Context::background();

    let container = launcher.launch(&ctx, &localstack_like()).unwrap();

    assert_eq!(container.state(), ContainerState::Ready);
    assert_eq!(container.image(), "localstack/localstack:latest");
    assert_eq!(container.mapped_port(&ctx, "4566").unwrap(), 32768);
    assert_eq!(container.mapped_port(&ctx, "4566/tcp").unwrap(), 32768);

    let binding = container.endpoint(&ctx, &ContainerPort::tcp(4566)).unwrap();
    assert_eq!(binding.address(), "localhost:32768");
}

#[test]
fn test_port_lookup_is_never_cached() {
    let runtime = Arc::new(MockRuntime::new("Ready", 32768));
    let launcher = launcher(&runtime);
    let ctx = Context::background();
    let container = launcher.launch(&ctx, &localstack_like()).unwrap();

    container.mapped_port(&ctx, "4566").unwrap();
    container.mapped_port(&ctx, "4566").unwrap();

    let lookups = runtime
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::MappedPort(..)))
        .count();
    assert_eq!(lookups, 2);
}

#[test]
fn test_undeclared_port_is_not_mapped() {
    let runtime = Arc::new(MockRuntime::new("Ready", 32768));
    let launcher = launcher(&runtime);
    let ctx = Context::background();
    let container = launcher.launch(&ctx, &localstack_like()).unwrap();

    let err = container.mapped_port(&ctx, "8080/tcp").unwrap_err();
    match err {
        TlcError::PortNotMapped { port, .. } => assert_eq!(port, "8080/tcp"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_runtime_failure_is_propagated() {
    let runtime = Arc::new(MockRuntime::failing("pull access denied for localstack"));
    let launcher = launcher(&runtime);

    let err = launcher
        .launch(&Context::background(), &localstack_like())
        .unwrap_err();

    assert!(err.to_string().contains("pull access denied"));
    assert_eq!(runtime.calls(), vec![Call::Run("localstack/localstack:latest".to_string())]);
}

#[test]
fn test_readiness_timeout_removes_container() {
    let runtime = Arc::new(MockRuntime::new("still booting", 32768));
    let launcher = launcher(&runtime);

    let err = launcher
        .launch(&Context::background(), &localstack_like())
        .unwrap_err();

    assert!(matches!(err, TlcError::ReadinessTimeout { .. }));
    assert_eq!(runtime.removed().len(), 1);
    assert_eq!(runtime.live_count(), 0);
}

#[test]
fn test_log_occurrences_are_counted() {
    let runtime = Arc::new(MockRuntime::new("Waiting for connections\n", 27017));
    let launcher = launcher(&runtime);

    let spec = ContainerSpec::new("mongo:latest")
        .with_exposed_port(ContainerPort::tcp(27017))
        .with_wait_for(WaitFor::log_times("Waiting for connections", 2));

    assert!(launcher.launch(&Context::background(), &spec).is_err());
}

#[test]
fn test_cancelled_context_fails_promptly() {
    let runtime = Arc::new(MockRuntime::new("Ready", 32768));
    let launcher = launcher(&runtime);
    let ctx = Context::background();
    ctx.cancel();

    let err = launcher.launch(&ctx, &localstack_like()).unwrap_err();

    assert!(matches!(err, TlcError::Cancelled));
    assert_eq!(runtime.call_count(), 0);
}

#[test]
fn test_terminate_twice_surfaces_error() {
    let runtime = Arc::new(MockRuntime::new("Ready", 32768));
    let launcher = launcher(&runtime);
    let ctx = Context::background();
    let container = launcher.launch(&ctx, &localstack_like()).unwrap();

    terminate(&ctx, &container).unwrap();
    assert_eq!(container.state(), ContainerState::Terminated);

    let err = terminate(&ctx, &container).unwrap_err();
    assert!(err.to_string().contains("No such container"));
    assert_eq!(runtime.removed().len(), 2);
}

#[test]
fn test_parallel_launches_get_distinct_handles() {
    let runtime = Arc::new(MockRuntime::new("Ready", 32768));
    let launcher = launcher(&runtime);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let launcher = launcher.clone();
            std::thread::spawn(move || {
                launcher
                    .launch(&Context::background(), &localstack_like())
                    .map(|c| c.id().to_string())
            })
        })
        .collect();

    let mut ids: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}
