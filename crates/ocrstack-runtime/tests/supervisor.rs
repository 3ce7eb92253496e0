//! End-to-end supervisor runs against throwaway shell processes.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use ocrstack_core::outcome::{StartupFailureKind, SupervisorOutcome};
use ocrstack_core::spec::{ServiceRole, ServiceSpec};
use ocrstack_runtime::probe::ProbeConfig;
use ocrstack_runtime::supervisor::{Supervisor, SupervisorConfig};

/// Canned backend endpoint: 503 for the first `failures` requests, 200
/// for every request after that.
async fn spawn_responder(failures: u32) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind responder");
    let addr = listener.local_addr().expect("responder addr");
    let handle = tokio::spawn(async move {
        let mut served = 0u32;
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            served += 1;
            let status = if served <= failures {
                "HTTP/1.1 503 Service Unavailable"
            } else {
                "HTTP/1.1 200 OK"
            };
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let body = "{}";
            let response = format!(
                "{status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    (addr, handle)
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port
}

fn shell_spec(role: ServiceRole, script: &str) -> ServiceSpec {
    ServiceSpec::new(role, "sh", vec!["-c".into(), script.into()], free_port())
}

fn sleeper(role: ServiceRole) -> ServiceSpec {
    ServiceSpec::new(role, "sleep", vec!["30".into()], free_port())
}

fn config(backend: ServiceSpec, frontend: ServiceSpec, ready_url: String) -> SupervisorConfig {
    SupervisorConfig {
        backend,
        frontend,
        probe: ProbeConfig {
            url: ready_url,
            max_attempts: 100,
            interval: Duration::from_millis(50),
            attempt_timeout: Duration::from_millis(250),
        },
        grace_period: Duration::from_secs(1),
        pid_dir: None,
    }
}

async fn wait_for_file(path: &Path) {
    for _ in 0..100 {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("file {} never appeared", path.display());
}

#[tokio::test]
async fn full_lifecycle_with_delayed_readiness() {
    // The backend endpoint only answers 200 from the third probe on
    let (addr, responder) = spawn_responder(2).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("frontend-started");

    let backend = sleeper(ServiceRole::Backend);
    let frontend = shell_spec(
        ServiceRole::Frontend,
        &format!("echo started >> {}; sleep 30", marker.display()),
    );
    let mut cfg = config(backend, frontend, format!("http://{addr}/v1/models"));
    cfg.pid_dir = Some(dir.path().to_path_buf());

    let shutdown = CancellationToken::new();
    let run = tokio::spawn(Supervisor::new(cfg).run(shutdown.clone()));

    wait_for_file(&marker).await;
    shutdown.cancel();
    let outcome = run.await.expect("supervisor task");
    assert_eq!(outcome, SupervisorOutcome::Success);

    // The frontend was launched exactly once
    let contents = std::fs::read_to_string(&marker).expect("marker");
    assert_eq!(contents.lines().count(), 1);

    // PID files do not outlive the run
    assert!(ocrstack_runtime::pidfile::read_pidfile(dir.path(), "backend").is_none());
    assert!(ocrstack_runtime::pidfile::read_pidfile(dir.path(), "frontend").is_none());
    responder.abort();
}

#[tokio::test]
async fn frontend_receives_the_backend_port() {
    let (addr, responder) = spawn_responder(0).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("seen-port");

    let backend = sleeper(ServiceRole::Backend);
    let backend_port = backend.port;
    let frontend = shell_spec(
        ServiceRole::Frontend,
        &format!("echo $SGLANG_SERVER_PORT > {}; sleep 30", marker.display()),
    );
    let cfg = config(backend, frontend, format!("http://{addr}/v1/models"));

    let shutdown = CancellationToken::new();
    let run = tokio::spawn(Supervisor::new(cfg).run(shutdown.clone()));

    wait_for_file(&marker).await;
    shutdown.cancel();
    assert_eq!(run.await.expect("supervisor task"), SupervisorOutcome::Success);

    let contents = std::fs::read_to_string(&marker).expect("marker");
    assert_eq!(contents.trim(), backend_port.to_string());
    responder.abort();
}

#[tokio::test]
async fn shutdown_during_readiness_wait_never_launches_the_frontend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("frontend-started");

    let backend = sleeper(ServiceRole::Backend);
    let frontend = shell_spec(
        ServiceRole::Frontend,
        &format!("echo started >> {}; sleep 30", marker.display()),
    );
    // Nothing listens at the probe URL, so readiness never arrives
    let cfg = config(backend, frontend, format!("http://127.0.0.1:{}/v1/models", free_port()));

    let shutdown = CancellationToken::new();
    let run = tokio::spawn(Supervisor::new(cfg).run(shutdown.clone()));

    sleep(Duration::from_millis(300)).await;
    shutdown.cancel();
    let outcome = run.await.expect("supervisor task");

    assert_eq!(outcome, SupervisorOutcome::Success);
    assert!(!marker.exists());
}

#[tokio::test]
async fn frontend_crash_tears_down_the_stack() {
    let (addr, responder) = spawn_responder(0).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let backend = sleeper(ServiceRole::Backend);
    let frontend = shell_spec(ServiceRole::Frontend, "sleep 0.2; exit 3");
    let mut cfg = config(backend, frontend, format!("http://{addr}/v1/models"));
    cfg.pid_dir = Some(dir.path().to_path_buf());

    let outcome = Supervisor::new(cfg).run(CancellationToken::new()).await;
    assert_eq!(
        outcome,
        SupervisorOutcome::RuntimeFailure {
            service: ServiceRole::Frontend,
            exit_code: Some(3),
        }
    );

    // The backend did not survive its peer
    assert!(ocrstack_runtime::pidfile::read_pidfile(dir.path(), "backend").is_none());
    responder.abort();
}

#[tokio::test]
async fn backend_crash_while_running_tears_down_the_frontend() {
    let (addr, responder) = spawn_responder(0).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let backend = shell_spec(ServiceRole::Backend, "sleep 0.2; exit 5");
    let frontend = sleeper(ServiceRole::Frontend);
    let mut cfg = config(backend, frontend, format!("http://{addr}/v1/models"));
    cfg.pid_dir = Some(dir.path().to_path_buf());

    let outcome = Supervisor::new(cfg).run(CancellationToken::new()).await;
    assert_eq!(
        outcome,
        SupervisorOutcome::RuntimeFailure {
            service: ServiceRole::Backend,
            exit_code: Some(5),
        }
    );

    // The frontend did not survive its peer
    assert!(ocrstack_runtime::pidfile::read_pidfile(dir.path(), "frontend").is_none());
    responder.abort();
}

#[tokio::test]
async fn backend_crash_during_probe_is_a_startup_failure() {
    let backend = shell_spec(ServiceRole::Backend, "exit 7");
    let frontend = sleeper(ServiceRole::Frontend);
    let cfg = config(backend, frontend, format!("http://127.0.0.1:{}/v1/models", free_port()));

    let outcome = Supervisor::new(cfg).run(CancellationToken::new()).await;
    assert_eq!(
        outcome,
        SupervisorOutcome::StartupFailure(StartupFailureKind::BackendCrashed)
    );
}

#[tokio::test]
async fn backend_that_never_answers_times_out() {
    let backend = sleeper(ServiceRole::Backend);
    let frontend = sleeper(ServiceRole::Frontend);
    let mut cfg = config(backend, frontend, format!("http://127.0.0.1:{}/v1/models", free_port()));
    cfg.probe.max_attempts = 3;

    let outcome = Supervisor::new(cfg).run(CancellationToken::new()).await;
    assert_eq!(
        outcome,
        SupervisorOutcome::StartupFailure(StartupFailureKind::BackendTimeout)
    );
}

#[tokio::test]
async fn timed_out_backend_is_killed_without_grace() {
    use std::time::Instant;

    // A backend that ignores SIGTERM; only a force-kill can take it down
    let backend = shell_spec(ServiceRole::Backend, "trap '' TERM; sleep 30");
    let frontend = sleeper(ServiceRole::Frontend);
    let mut cfg = config(backend, frontend, format!("http://127.0.0.1:{}/v1/models", free_port()));
    cfg.probe.max_attempts = 2;
    cfg.grace_period = Duration::from_secs(5);

    let started = Instant::now();
    let outcome = Supervisor::new(cfg).run(CancellationToken::new()).await;

    assert_eq!(
        outcome,
        SupervisorOutcome::StartupFailure(StartupFailureKind::BackendTimeout)
    );
    // A graceful stop would have waited out the full grace period
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn unlaunchable_backend_is_a_startup_failure() {
    let backend = ServiceSpec::new(ServiceRole::Backend, "no-such-binary-xyz", vec![], free_port());
    let frontend = sleeper(ServiceRole::Frontend);
    let cfg = config(backend, frontend, "http://127.0.0.1:1/v1/models".to_string());

    let outcome = Supervisor::new(cfg).run(CancellationToken::new()).await;
    assert_eq!(
        outcome,
        SupervisorOutcome::StartupFailure(StartupFailureKind::BackendLaunch)
    );
}

#[tokio::test]
async fn unlaunchable_frontend_stops_the_backend() {
    let (addr, responder) = spawn_responder(0).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let backend = sleeper(ServiceRole::Backend);
    let frontend =
        ServiceSpec::new(ServiceRole::Frontend, "no-such-binary-xyz", vec![], free_port());
    let mut cfg = config(backend, frontend, format!("http://{addr}/v1/models"));
    cfg.pid_dir = Some(dir.path().to_path_buf());

    let outcome = Supervisor::new(cfg).run(CancellationToken::new()).await;
    assert_eq!(
        outcome,
        SupervisorOutcome::StartupFailure(StartupFailureKind::FrontendLaunch)
    );
    assert!(ocrstack_runtime::pidfile::read_pidfile(dir.path(), "backend").is_none());
    responder.abort();
}
