//! Fleet integration tests.
//!
//! Drives full provisioning passes through the same crates the daemon
//! wires together: a config file on disk, the redb state store, the
//! store-backed providers and the HTTP circuit breaker.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use dynscale_autoscale::{CycleAction, FleetRunner, StoreProviders};
use dynscale_breaker::HttpCircuitBreaker;
use dynscale_core::{ConsecutiveChecks, Direction, DynscaleConfig, TableStatus};
use dynscale_state::{MetricsSample, StateStore, TableCapacity};

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn seed(state: &StateStore, table: &str, units: u64, read_consumed: f64) {
    state
        .put_capacity(&TableCapacity {
            table_name: table.into(),
            read_units: units,
            write_units: units,
            status: TableStatus::Active,
            updated_at: 0,
        })
        .unwrap();
    for (direction, consumed) in [(Direction::Read, read_consumed), (Direction::Write, 50.0)] {
        state
            .put_metrics(&MetricsSample {
                table_name: table.into(),
                direction,
                epoch: now() - 12 * 60,
                consumed_percent: consumed,
                throttled_count: 0,
                throttled_by_provisioned_percent: 0.0,
                throttled_by_consumed_percent: 0.0,
            })
            .unwrap();
    }
}

/// Answer every breaker request with `status`.
async fn breaker_server(status: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    format!("http://{addr}/breaker")
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> DynscaleConfig {
    let path = dir.path().join("dynscale.toml");
    std::fs::write(&path, body).unwrap();
    DynscaleConfig::from_file(&path).unwrap()
}

#[tokio::test]
async fn pass_scales_matching_tables_from_disk_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        r#"
[tables."orders-.*"]
reads.upper_threshold = 70.0
reads.increase_with = 50.0
"#,
    );
    let state = StateStore::open(&dir.path().join("dynscale.redb")).unwrap();
    seed(&state, "orders-eu", 100, 95.0);
    seed(&state, "orders-us", 100, 40.0);
    seed(&state, "audit", 100, 99.0);

    let runner = FleetRunner::new(config, StoreProviders::new(state.clone()), state.clone()).unwrap();
    let report = runner.run_once().await.unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(state.get_capacity("orders-eu").unwrap().unwrap().read_units, 150);
    assert_eq!(state.get_capacity("orders-us").unwrap().unwrap().read_units, 100);
    // Unmatched tables are never touched.
    assert_eq!(state.get_capacity("audit").unwrap().unwrap().read_units, 100);
}

#[tokio::test]
async fn open_breaker_blocks_and_resets_counters() {
    let url = breaker_server("503 Service Unavailable").await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        &format!(
            r#"
[global]
circuit_breaker_url = "{url}"
circuit_breaker_timeout_ms = 2000

[tables."orders"]
"#
        ),
    );
    let state = StateStore::open_in_memory().unwrap();
    seed(&state, "orders", 100, 99.0);
    state.put_checks("orders", ConsecutiveChecks::new(3, 2)).unwrap();

    let breaker = HttpCircuitBreaker::from_config(&config).unwrap().unwrap();
    let runner = FleetRunner::new(config, StoreProviders::new(state.clone()), state.clone())
        .unwrap()
        .with_breaker(breaker);
    let report = runner.run_once().await.unwrap();

    assert_eq!(report.outcomes[0].action, CycleAction::BreakerOpen);
    assert_eq!(state.get_checks("orders").unwrap(), ConsecutiveChecks::new(0, 0));
    assert_eq!(state.get_capacity("orders").unwrap().unwrap().read_units, 100);
}

#[tokio::test]
async fn closed_breaker_lets_scaling_through() {
    let url = breaker_server("200 OK").await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        &format!(
            r#"
[tables."orders"]
circuit_breaker_url = "{url}"
"#
        ),
    );
    let state = StateStore::open_in_memory().unwrap();
    seed(&state, "orders", 100, 99.0);

    let breaker = HttpCircuitBreaker::from_config(&config).unwrap().unwrap();
    let runner = FleetRunner::new(config, StoreProviders::new(state.clone()), state.clone())
        .unwrap()
        .with_breaker(breaker);
    let report = runner.run_once().await.unwrap();

    assert_eq!(
        report.outcomes[0].action,
        CycleAction::Applied {
            read_units: 150,
            write_units: 100
        }
    );
}

#[tokio::test]
async fn dry_run_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        r#"
[global]
dry_run = true

[tables."orders"]
"#,
    );
    let state = StateStore::open_in_memory().unwrap();
    seed(&state, "orders", 100, 99.0);

    let runner = FleetRunner::new(config, StoreProviders::new(state.clone()), state.clone()).unwrap();
    let report = runner.run_once().await.unwrap();

    assert!(matches!(report.outcomes[0].action, CycleAction::DryRun { .. }));
    assert_eq!(state.get_capacity("orders").unwrap().unwrap().read_units, 100);
    assert_eq!(state.get_override("dynscale/orders").unwrap(), None);
}

#[tokio::test]
async fn runner_stops_on_shutdown_signal() {
    let state = StateStore::open_in_memory().unwrap();
    seed(&state, "orders", 100, 50.0);
    let config = DynscaleConfig::from_toml_str("[tables.orders]").unwrap();
    let runner = FleetRunner::new(config, StoreProviders::new(state.clone()), state).unwrap();

    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(async move { runner.run(Duration::from_secs(3600), rx).await });
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
