//! Batch aggregation tests against a mock iNaturalist API

use serde_json::{json, Value};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use taxtally_cli::config::{Config, LookupMode, RunOptions};
use taxtally_cli::retry::RetryPolicy;
use taxtally_cli::summary::Summary;
use taxtally_cli::BatchAggregator;
use taxtally_common::ObservationId;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn options(failed_dir: &TempDir) -> RunOptions {
    RunOptions {
        min_delay: Duration::ZERO,
        max_min_delay: Duration::from_millis(50),
        retry: RetryPolicy {
            retries: 2,
            retry_delay: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            throttle_factor: 1.5,
        },
        batch_pause: Duration::ZERO,
        failed_dir: failed_dir.path().to_path_buf(),
        ..RunOptions::default()
    }
}

fn page(results: Vec<Value>) -> Value {
    json!({ "total_results": results.len(), "results": results })
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// 1: order Agaricales; 2: species under Polyporales/Polyporaceae;
/// 3: no results; 4: always throttled; 5: species whose chain has a
/// family but no order
async fn mock_api() -> MockServer {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/v1/observations/1",
        page(vec![json!({ "taxon": { "id": 21, "rank": "order", "name": "Agaricales", "ancestry": "10" } })]),
    )
    .await;
    mount_json(
        &server,
        "/v1/observations/2",
        page(vec![json!({ "taxon": { "id": 50, "rank": "species", "name": "Fomes fomentarius", "ancestry": "10/20/30" } })]),
    )
    .await;
    mount_json(&server, "/v1/observations/3", page(vec![])).await;
    Mock::given(method("GET"))
        .and(path("/v1/observations/4"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    mount_json(
        &server,
        "/v1/observations/5",
        page(vec![json!({ "taxon": { "id": 51, "rank": "species", "name": "Trametes versicolor", "ancestry": "10/30" } })]),
    )
    .await;

    mount_json(&server, "/v1/taxa/10", page(vec![json!({ "id": 10, "rank": "kingdom", "name": "Fungi" })])).await;
    mount_json(&server, "/v1/taxa/20", page(vec![json!({ "id": 20, "rank": "order", "name": "Polyporales" })])).await;
    mount_json(&server, "/v1/taxa/30", page(vec![json!({ "id": 30, "rank": "family", "name": "Polyporaceae" })])).await;

    server
}

fn ids(raw: &[u64]) -> Vec<ObservationId> {
    raw.iter().copied().map(ObservationId::from).collect()
}

async fn run(server: &MockServer, options: RunOptions, ids: &[ObservationId]) -> (String, taxtally_cli::RunReport) {
    let mut aggregator = BatchAggregator::new(&Config::new(server.uri()), options).unwrap();
    let mut out = Vec::new();
    let report = aggregator.run(ids, &mut out).await.unwrap();
    (String::from_utf8(out).unwrap(), report)
}

#[tokio::test]
async fn test_order_run_output_and_summary() {
    let server = mock_api().await;
    let dir = TempDir::new().unwrap();

    let (out, report) = run(&server, options(&dir), &ids(&[1, 2, 3, 1])).await;

    assert_eq!(
        out,
        "1: Agaricales\n2: Polyporales\n3: Error - No results found\n1: Agaricales\n"
    );
    assert_eq!(report.dispatched, 4);
    assert_eq!(report.summary.total(), 4);
    assert!(report.failed_ids.is_empty());
    assert!(report.failed_file.is_none());

    let Summary::Taxonomy(counters) = &report.summary else {
        panic!("expected a taxonomy summary");
    };
    assert_eq!(counters.orders.get("Agaricales"), Some(&2));
    assert_eq!(counters.orders.get("Polyporales"), Some(&1));
    assert_eq!(counters.unknown_order, 1);
}

#[tokio::test]
async fn test_family_run_output() {
    let server = mock_api().await;
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        mode: LookupMode::Taxonomy {
            include_family: true,
        },
        ..options(&dir)
    };

    let (out, report) = run(&server, options, &ids(&[1, 2])).await;

    assert_eq!(
        out,
        "1: Order: Agaricales Family: Unknown\n2: Order: Polyporales Family: Polyporaceae\n"
    );
    let rendered = report.summary.render();
    assert!(rendered.contains("Families within Polyporales:"));
    assert!(rendered.contains("     1  Polyporaceae"));
    assert!(rendered.contains("     1  Unknown family"));
}

#[tokio::test]
async fn test_throttled_ids_are_written_for_retry() {
    let server = mock_api().await;
    let dir = TempDir::new().unwrap();

    let (out, report) = run(&server, options(&dir), &ids(&[4, 1, 3])).await;

    assert!(out.starts_with("4: Error - API request failed: "));
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.summary.total(), 3);
    assert_eq!(report.failed_ids, ids(&[4]));

    let path = report.failed_file.expect("failed ids file");
    assert!(path.starts_with(dir.path()));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "4\n");
    // two attempts for id 4, one call each for 1 and 3
    assert_eq!(report.api_calls, 4);
}

#[tokio::test]
async fn test_repeated_runs_agree() {
    let server = mock_api().await;
    let dir = TempDir::new().unwrap();
    let batch = ids(&[2, 1, 3]);

    let (first_out, first) = run(&server, options(&dir), &batch).await;
    let (second_out, second) = run(&server, options(&dir), &batch).await;

    assert_eq!(first_out, second_out);
    assert_eq!(first.summary, second.summary);
}

#[tokio::test]
async fn test_batches_pause_between_but_not_before() {
    let server = mock_api().await;
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        batch_size: 2,
        batch_pause: Duration::from_millis(100),
        ..options(&dir)
    };

    let started = Instant::now();
    let (_, report) = run(&server, options, &ids(&[1, 1, 1, 1, 1])).await;
    let elapsed = started.elapsed();

    // three batches, two pauses
    assert_eq!(report.dispatched, 5);
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(300) + Duration::from_secs(2));
}

#[tokio::test]
async fn test_users_run() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/v1/observations/7",
        page(vec![json!({ "user": { "login": "mycofan", "name": "Ada Fungi" } })]),
    )
    .await;
    mount_json(
        &server,
        "/v1/observations/8",
        page(vec![json!({ "user": { "login": "mycofan", "name": "Ada Fungi" } })]),
    )
    .await;
    mount_json(&server, "/v1/observations/9", page(vec![json!({ "user": {} })])).await;

    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        mode: LookupMode::Users,
        ..options(&dir)
    };

    let (out, report) = run(&server, options, &ids(&[7, 8, 9])).await;

    assert_eq!(
        out,
        "7: Ada Fungi: mycofan\n8: Ada Fungi: mycofan\n9: Error - User information incomplete\n"
    );
    assert_eq!(report.summary.total(), 3);
    assert!(report
        .summary
        .render()
        .contains("     2  Ada Fungi (mycofan)"));
}

/// Accepts a fixed number of writes, then fails like a closed pipe
struct ClosingPipe {
    writes_left: usize,
    written: Vec<u8>,
}

impl Write for ClosingPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes_left == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"));
        }
        self.writes_left -= 1;
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_output_failure_still_saves_queued_ids() {
    let server = mock_api().await;
    let dir = TempDir::new().unwrap();
    let mut aggregator = BatchAggregator::new(&Config::new(server.uri()), options(&dir)).unwrap();
    let mut out = ClosingPipe {
        writes_left: 1,
        written: Vec::new(),
    };

    let result = aggregator.run(&ids(&[4, 1, 3]), &mut out).await;

    assert!(result.is_err());
    assert!(String::from_utf8(out.written).unwrap().starts_with("4: Error - "));

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "4\n");
}

#[tokio::test]
async fn test_family_without_order_in_family_run() {
    let server = mock_api().await;
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        mode: LookupMode::Taxonomy {
            include_family: true,
        },
        ..options(&dir)
    };

    let (out, report) = run(&server, options, &ids(&[5, 2])).await;

    assert_eq!(
        out,
        "5: Species: Trametes versicolor\n2: Order: Polyporales Family: Polyporaceae\n"
    );
    // an order-less chain is a data outcome, not something to retry
    assert!(report.failed_ids.is_empty());

    let Summary::Taxonomy(counters) = &report.summary else {
        panic!("expected a taxonomy summary");
    };
    assert_eq!(counters.unknown_order, 1);
    assert_eq!(counters.unknown_family_unknown_order, 1);
    assert_eq!(counters.total(), 2);
    assert!(report
        .summary
        .render()
        .contains("Unknown families within unknown orders: 1"));
}
