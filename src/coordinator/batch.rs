//! Batch driver: one saga per group id, a bounded number in flight

use crate::common::Error;
use crate::coordinator::node_client::NodeClient;
use crate::coordinator::saga::{Coordinator, GroupOp, SagaOutcome};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub completed: usize,
    pub aborted: usize,
    pub compensated: usize,
    /// Group ids whose compensation ran out of retries; these need external repair
    pub exhausted: Vec<String>,
    /// Group ids rejected before any node call (invalid id)
    pub rejected: Vec<String>,
    /// Group ids that failed for any other reason
    pub failed: Vec<String>,
}

impl BatchReport {
    fn record(&mut self, group_id: String, result: Result<SagaOutcome, Error>) {
        self.total += 1;
        match result {
            Ok(SagaOutcome::Completed) => self.completed += 1,
            Ok(SagaOutcome::Aborted { .. }) => self.aborted += 1,
            Ok(SagaOutcome::Compensated { .. }) => self.compensated += 1,
            Err(Error::CompensationExhausted { .. }) => self.exhausted.push(group_id),
            Err(e) if e.is_config() => {
                tracing::warn!(group_id = %group_id, "Group operation rejected: {}", e);
                self.rejected.push(group_id);
            }
            Err(e) => {
                tracing::error!(group_id = %group_id, "Group operation failed: {}", e);
                self.failed.push(group_id);
            }
        }
    }
}

/// Group ids `"0"..count` as used by the load tests
pub fn sequential_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| i.to_string()).collect()
}

/// Run `op` for every group id with at most `workers` sagas in flight
pub async fn run_batch<C: NodeClient>(
    coordinator: &Coordinator<C>,
    op: GroupOp,
    group_ids: Vec<String>,
    workers: usize,
) -> BatchReport {
    tracing::info!("Running {} for {} group(s), {} worker(s)", op, group_ids.len(), workers);

    let results: Vec<_> = stream::iter(group_ids)
        .map(|group_id| async move {
            let result = coordinator.run(op, &group_id).await;
            (group_id, result)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut report = BatchReport::default();
    for (group_id, result) in results {
        report.record(group_id, result);
    }
    report.exhausted.sort();
    report.rejected.sort();
    report.failed.sort();

    tracing::info!(
        total = report.total,
        completed = report.completed,
        aborted = report.aborted,
        compensated = report.compensated,
        exhausted = report.exhausted.len(),
        "Batch {} finished",
        op
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        assert_eq!(sequential_ids(3), vec!["0", "1", "2"]);
        assert!(sequential_ids(0).is_empty());
    }

    #[test]
    fn test_report_buckets() {
        let mut report = BatchReport::default();
        report.record("1".into(), Ok(SagaOutcome::Completed));
        report.record(
            "2".into(),
            Ok(SagaOutcome::Compensated {
                failed_node: "node02".into(),
            }),
        );
        report.record(
            "3".into(),
            Err(Error::CompensationExhausted {
                group_id: "3".into(),
                attempts: 11,
                pending: vec!["node01".into()],
            }),
        );
        report.record("".into(), Err(Error::InvalidGroupId("empty".into())));

        assert_eq!(report.total, 4);
        assert_eq!(report.completed, 1);
        assert_eq!(report.compensated, 1);
        assert_eq!(report.exhausted, vec!["3"]);
        assert_eq!(report.rejected, vec![""]);
    }
}
