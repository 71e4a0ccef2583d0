//! Supervisor loop tests with stubbed proxy commands.

mod common;

use common::{container, MockEngine};
use docker_recon::{MonitorOptions, MonitorState, ProxyMonitor};

fn labelled_inventory() -> MockEngine {
    MockEngine::new(vec![container(
        "app",
        "alpine:3",
        &[
            ("traefik.enable", "true"),
            ("traefik.http.routers.app.rule", "PathPrefix(`/app`)"),
            ("traefik.http.services.app.loadbalancer.server.port", "8080"),
        ],
        &[],
        &[],
        Some("10.0.0.2"),
    )])
}

#[tokio::test]
async fn oneshot_boot_writes_and_tests_config() {
    let dir = tempfile::tempdir().unwrap();
    let conffile = dir.path().join("nginx.conf");
    let mut options = MonitorOptions::nginx(&conffile);
    options.oneshot = true;
    options.test_command = vec!["true".to_string()];
    options.reload_command = vec!["true".to_string()];
    options.stop_command = None;

    let mut monitor = ProxyMonitor::new(labelled_inventory(), options);
    monitor.run().await.unwrap();
    assert_eq!(monitor.state(), MonitorState::Shutdown);

    let written = std::fs::read_to_string(&conffile).unwrap();
    assert!(written.contains("location /app {"));
    assert!(written.contains("proxy_pass http://app:8080;"));
}

#[tokio::test]
async fn boot_test_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let conffile = dir.path().join("nginx.conf");
    let mut options = MonitorOptions::nginx(&conffile);
    options.oneshot = true;
    options.test_command = vec!["false".to_string()];
    options.stop_command = None;

    let mut monitor = ProxyMonitor::new(labelled_inventory(), options);
    let err = monitor.run().await.unwrap_err();
    assert_eq!(err.category(), "supervisor");
}

#[tokio::test]
async fn poll_rolls_back_when_test_rejects_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let conffile = dir.path().join("nginx.conf");
    let mut options = MonitorOptions::nginx(&conffile);
    options.test_command = vec!["false".to_string()];
    options.stop_command = None;

    let mut monitor = ProxyMonitor::new(labelled_inventory(), options);
    monitor.poll_once().await.unwrap();
    // candidate rejected: the previously running text (none yet) is restored
    assert_eq!(monitor.state(), MonitorState::Running);
    assert_eq!(std::fs::read_to_string(&conffile).unwrap(), "");
}
