//! Batch driver under randomized node failures

use groupsaga::common::{NodeTarget, SagaConfig};
use groupsaga::coordinator::batch::{run_batch, sequential_ids};
use groupsaga::coordinator::memory::InMemoryCluster;
use groupsaga::coordinator::{Coordinator, GroupOp};

fn nodes() -> Vec<NodeTarget> {
    ["node01", "node02", "node03"]
        .iter()
        .map(|name| NodeTarget::new(*name, "http://127.0.0.1:8080"))
        .collect()
}

fn coordinator(cluster: InMemoryCluster) -> Coordinator<InMemoryCluster> {
    let saga = SagaConfig {
        max_retries: 10,
        retry_delay_ms: 1,
        ..Default::default()
    };
    Coordinator::new(nodes(), cluster, &saga).unwrap()
}

/// Every group id outside `skip` is either on all nodes or on none
fn assert_all_or_nothing(cluster: &InMemoryCluster, ids: &[String], skip: &[String]) {
    for id in ids.iter().filter(|id| !skip.contains(id)) {
        let present: Vec<bool> = nodes()
            .iter()
            .map(|n| cluster.contains(&n.name, id))
            .collect();
        assert!(
            present.iter().all(|&p| p == present[0]),
            "group {} is partially present: {:?}",
            id,
            present
        );
    }
}

#[tokio::test]
async fn test_batch_without_faults() {
    let cluster = InMemoryCluster::new(&nodes());
    let coord = coordinator(cluster.clone());
    let ids = sequential_ids(50);

    let report = run_batch(&coord, GroupOp::Create, ids.clone(), 10).await;
    assert_eq!(report.total, 50);
    assert_eq!(report.completed, 50);
    assert!(report.exhausted.is_empty());

    let stats = cluster.stats();
    assert!(stats.consistent);
    assert!(stats.counts.values().all(|&n| n == 50));

    let report = run_batch(&coord, GroupOp::Delete, ids, 10).await;
    assert_eq!(report.completed, 50);
    assert!(cluster.stats().counts.values().all(|&n| n == 0));
}

#[tokio::test]
async fn test_batch_under_random_failures_stays_all_or_nothing() {
    let cluster = InMemoryCluster::new(&nodes()).with_failure_rate(0.2, 42);
    let coord = coordinator(cluster.clone());
    let ids = sequential_ids(100);

    let report = run_batch(&coord, GroupOp::Create, ids.clone(), 10).await;
    assert_eq!(report.total, 100);
    assert_eq!(
        report.completed + report.compensated + report.exhausted.len(),
        100
    );
    assert!(report.rejected.is_empty());
    assert_all_or_nothing(&cluster, &ids, &report.exhausted);

    let skip = report.exhausted.clone();
    let report = run_batch(&coord, GroupOp::Delete, ids.clone(), 10).await;
    assert_eq!(report.total, 100);
    let mut skip_all = skip;
    skip_all.extend(report.exhausted.iter().cloned());
    assert_all_or_nothing(&cluster, &ids, &skip_all);
}

#[tokio::test]
async fn test_batch_reports_invalid_ids() {
    let cluster = InMemoryCluster::new(&nodes());
    let coord = coordinator(cluster.clone());

    let report = run_batch(
        &coord,
        GroupOp::Create,
        vec!["ok".to_string(), String::new()],
        2,
    )
    .await;
    assert_eq!(report.completed, 1);
    assert_eq!(report.rejected, vec![String::new()]);
    assert!(cluster.calls().iter().all(|c| c.group_id == "ok"));
}
