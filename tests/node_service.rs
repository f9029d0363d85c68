//! Coordinator over HTTP against a live node service

use groupsaga::common::{NodeServiceConfig, NodeTarget, SagaConfig, Timestamp};
use groupsaga::coordinator::{Coordinator, HttpNodeClient, NodeClient, Outcome, SagaOutcome};
use groupsaga::node::table::ClusterStats;
use groupsaga::{Error, NodeServer};
use std::time::Duration;
use tokio::net::TcpListener;

const NODES: [&str; 3] = ["node01", "node02", "node03"];

async fn start_node_service(failure_rate: f64) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = NodeServiceConfig {
        bind_addr: addr,
        nodes: NODES.iter().map(|n| n.to_string()).collect(),
        failure_rate,
    };
    tokio::spawn(NodeServer::new(config).serve_on(listener));
    format!("http://{}", addr)
}

fn targets(address: &str) -> Vec<NodeTarget> {
    NODES
        .iter()
        .map(|name| NodeTarget::new(*name, address))
        .collect()
}

fn client() -> HttpNodeClient {
    HttpNodeClient::new(Duration::from_secs(5)).unwrap()
}

async fn stats(address: &str) -> ClusterStats {
    reqwest::get(format!("{}/stats", address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_node_client_outcomes() {
    let address = start_node_service(0.0).await;
    let node = NodeTarget::new("node01", address.as_str());
    let client = client();
    let ts = Timestamp::now();

    assert_eq!(client.read_on(&node, "a/b c").await, Outcome::NotFound);
    assert_eq!(client.create_on(&node, "a/b c", ts).await, Outcome::Success);
    assert_eq!(client.create_on(&node, "a/b c", ts).await, Outcome::Conflict);
    assert_eq!(client.read_on(&node, "a/b c").await, Outcome::Success);

    let other = Timestamp::from_secs_f64(ts.as_secs_f64() - 10.0).unwrap();
    assert_eq!(
        client.delete_on(&node, "a/b c", Some(other)).await,
        Outcome::NotFound
    );
    assert_eq!(client.delete_on(&node, "a/b c", Some(ts)).await, Outcome::Success);
    assert_eq!(client.delete_on(&node, "a/b c", None).await, Outcome::NotFound);
}

#[tokio::test]
async fn test_unknown_node_is_transient() {
    let address = start_node_service(0.0).await;
    let node = NodeTarget::new("node09", address.as_str());
    // 406 from the service falls outside the expected set
    assert_eq!(client().read_on(&node, "1").await, Outcome::Transient);
}

#[tokio::test]
async fn test_create_and_delete_group_over_http() {
    let address = start_node_service(0.0).await;
    let coord = Coordinator::new(targets(&address), client(), &SagaConfig::default()).unwrap();

    assert_eq!(coord.create_group("42").await.unwrap(), SagaOutcome::Completed);
    let after_create = stats(&address).await;
    assert!(after_create.consistent);
    assert!(after_create.counts.values().all(|&n| n == 1));

    assert_eq!(coord.delete_group("42").await.unwrap(), SagaOutcome::Completed);
    let after_delete = stats(&address).await;
    assert!(after_delete.consistent);
    assert!(after_delete.counts.values().all(|&n| n == 0));

    assert_eq!(
        coord.delete_group("42").await.unwrap(),
        SagaOutcome::Aborted {
            node: "node01".into(),
            deleted_on: vec![],
        }
    );
}

#[tokio::test]
async fn test_unreachable_node_exhausts_compensation() {
    let address = start_node_service(0.0).await;
    let mut nodes = targets(&address);
    nodes[2].address = "http://127.0.0.1:9".into();

    let saga = SagaConfig {
        max_retries: 2,
        retry_delay_ms: 1,
        ..Default::default()
    };
    let coord = Coordinator::new(nodes, client(), &saga).unwrap();

    // node01 and node02 are rolled back; node03 stays unreachable for its
    // own compensating delete, so the budget runs out with it still queued
    match coord.create_group("7").await {
        Err(Error::CompensationExhausted {
            attempts, pending, ..
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(pending, vec!["node03"]);
        }
        other => panic!("expected exhausted compensation, got {:?}", other),
    }
    let counts = stats(&address).await.counts;
    assert_eq!(counts["node01"], 0);
    assert_eq!(counts["node02"], 0);
}

#[tokio::test]
async fn test_ping() {
    let address = start_node_service(1.0).await;
    let body = reqwest::get(format!("{}/ping", address))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "PONG\n");
}
