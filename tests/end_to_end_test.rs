//! End-to-end tests
//!
//! A real orchestrator and real workers on loopback ports, talking JSON-RPC
//! over HTTP. Workers register themselves and send heartbeats; the client
//! submits expressions and polls for results.

use distcalc::common::protocol::jsonrpc::{INVALID_EXPRESSION, UNKNOWN_OPERATOR};
use distcalc::common::{JobStatus, JobStatusResponse, WorkerLiveness};
use distcalc::orchestrator::{Orchestrator, OrchestratorConfig};
use distcalc::worker::{Heartbeat, HeartbeatConfig, Worker, WorkerLimits};
use distcalc::DistcalcClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

struct Cluster {
    client: DistcalcClient,
    orchestrator_url: String,
    worker_urls: Vec<String>,
}

async fn start_orchestrator(config: OrchestratorConfig) -> String {
    let orchestrator = Arc::new(Orchestrator::new(config).await.unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(distcalc::orchestrator::HttpServer::new(orchestrator).run_with_listener(listener));
    format!("http://{}", addr)
}

async fn start_worker(orchestrator_url: &str, max_in_flight: u32) -> String {
    let worker = Arc::new(Worker::new(WorkerLimits::new().with_max_in_flight(max_in_flight)).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let public_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(distcalc::worker::HttpServer::new(worker).run_with_listener(listener));

    let heartbeat = Heartbeat::new(
        orchestrator_url,
        public_url.clone(),
        HeartbeatConfig {
            interval: Duration::from_millis(200),
            ..HeartbeatConfig::default()
        },
    );
    let registered = heartbeat.register().await.unwrap();
    assert!(registered.is_new_registration);
    heartbeat.spawn();

    public_url
}

async fn start_cluster(workers: usize) -> Cluster {
    let config = OrchestratorConfig::default().with_default_delay(Duration::ZERO);
    let orchestrator_url = start_orchestrator(config).await;

    let mut worker_urls = Vec::new();
    for _ in 0..workers {
        worker_urls.push(start_worker(&orchestrator_url, 4).await);
    }

    Cluster {
        client: DistcalcClient::new(&orchestrator_url),
        orchestrator_url,
        worker_urls,
    }
}

async fn evaluate(client: &DistcalcClient, owner: u64, expression: &str) -> JobStatusResponse {
    let job_id = client.submit(owner, expression).await.unwrap();
    client
        .wait_for_result(&job_id, Duration::from_millis(20), Duration::from_secs(10))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_simple_addition() {
    let cluster = start_cluster(1).await;

    let status = evaluate(&cluster.client, 1, "3 + 4").await;
    assert_eq!(status.state, JobStatus::Done);
    assert_eq!(status.result, Some(7.0));
    assert_eq!(status.postfix, "3 4 + ");
    assert_eq!(status.attempts, 1);
}

#[tokio::test]
async fn test_precedence_and_parentheses() {
    let cluster = start_cluster(2).await;

    let status = evaluate(&cluster.client, 1, "2 + 2 * 2").await;
    assert_eq!(status.result, Some(6.0));

    let status = evaluate(&cluster.client, 1, "(1 - 2) * (3 + 4) / (5 + 6)").await;
    let value = status.result.unwrap();
    assert!((value - (-7.0 / 11.0)).abs() < 1e-12);

    let status = evaluate(&cluster.client, 1, "2.5 * 4 - 10").await;
    assert_eq!(status.result, Some(0.0));
}

#[tokio::test]
async fn test_division_by_zero_fails_the_job() {
    let cluster = start_cluster(1).await;

    let status = evaluate(&cluster.client, 1, "5 / 0").await;
    assert_eq!(status.state, JobStatus::Failed);
    assert_eq!(status.error.as_deref(), Some("division by zero"));
    assert!(!status.retry_scheduled);
}

#[tokio::test]
async fn test_resubmission_returns_same_job() {
    let cluster = start_cluster(1).await;

    let first = cluster.client.submit(9, "10 / 4").await.unwrap();
    let second = cluster.client.submit(9, "10/4").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 16);

    let status = cluster
        .client
        .wait_for_result(&first, Duration::from_millis(20), Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(status.result, Some(2.5));
    assert_eq!(status.attempts, 1);

    let other_owner = cluster.client.submit(10, "10 / 4").await.unwrap();
    assert_ne!(other_owner, first);
}

#[tokio::test]
async fn test_invalid_expression_is_rejected() {
    let cluster = start_cluster(1).await;

    let err = cluster.client.submit(1, "(1 + 2").await.unwrap_err();
    assert_eq!(err.remote_code(), Some(INVALID_EXPRESSION));

    let err = cluster.client.submit(1, "2 ^ 3").await.unwrap_err();
    assert_eq!(err.remote_code(), Some(INVALID_EXPRESSION));
}

#[tokio::test]
async fn test_owner_delays() {
    let cluster = start_cluster(1).await;

    let mut delays = BTreeMap::new();
    delays.insert("*".to_string(), 150);
    let response = cluster.client.set_delays(3, delays).await.unwrap();
    assert_eq!(response.delays["*"], 150);
    assert_eq!(response.delays["+"], 0);

    let read_back = cluster.client.delays(3).await.unwrap();
    assert_eq!(read_back, response);

    let started = std::time::Instant::now();
    let status = evaluate(&cluster.client, 3, "6 * 7").await;
    assert_eq!(status.result, Some(42.0));
    assert!(started.elapsed() >= Duration::from_millis(150));

    let mut bad = BTreeMap::new();
    bad.insert("^".to_string(), 10);
    let err = cluster.client.set_delays(3, bad).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(UNKNOWN_OPERATOR));
}

#[tokio::test]
async fn test_workers_are_listed() {
    let cluster = start_cluster(2).await;

    let workers = cluster.client.workers().await.unwrap();
    assert_eq!(workers.len(), 2);
    assert!(workers.iter().all(|w| w.state == WorkerLiveness::Available));

    let mut listed: Vec<String> = workers.into_iter().map(|w| w.addr).collect();
    listed.sort();
    let mut expected = cluster.worker_urls.clone();
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_health_and_info() {
    let cluster = start_cluster(1).await;

    let health = reqwest::get(format!("{}/__health", cluster.orchestrator_url))
        .await
        .unwrap();
    assert_eq!(health.status(), 200);

    let info = cluster.client.call("_info", serde_json::Value::Null).await.unwrap();
    assert_eq!(info["server_type"], "orchestrator");
    assert_eq!(info["live_workers"], 1);
}

#[tokio::test]
async fn test_no_worker_keeps_job_unfinished() {
    let config = OrchestratorConfig::default().with_default_delay(Duration::ZERO);
    let url = start_orchestrator(config).await;
    let client = DistcalcClient::new(&url);

    let job_id = client.submit(1, "1 + 1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = client.result(&job_id).await.unwrap();
    assert!(!status.is_finished());

    start_worker(&url, 2).await;
    let status = client
        .wait_for_result(&job_id, Duration::from_millis(20), Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(status.result, Some(2.0));
}
