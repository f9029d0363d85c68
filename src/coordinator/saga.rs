//! Saga coordinator: multi-node create and delete with compensation
//!
//! A call walks the configured nodes in order. Every attempt is queued for
//! compensation whatever its outcome, and the first `Transient` outcome stops
//! the forward pass and drains the queue from the front with the inverse
//! operation. Compensation runs under [`retry_on`], and because entries only
//! leave the queue once their compensating call succeeded, a retry resumes
//! where the previous attempt stopped.
//!
//! The coordinator itself holds only configuration: each call owns its own
//! [`PendingCompensation`], so one instance can serve many concurrent calls.

use crate::common::config::validate_nodes;
use crate::common::{validate_group_id, Config, Error, NodeTarget, Result, SagaConfig, Timestamp};
use crate::coordinator::node_client::{HttpNodeClient, NodeClient, Outcome};
use crate::coordinator::retry::{retry_on, RetryPolicy};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

/// Group operation driven across all nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOp {
    Create,
    Delete,
}

impl GroupOp {
    fn compensation_label(&self) -> &'static str {
        match self {
            GroupOp::Create => "compensate_create",
            GroupOp::Delete => "compensate_delete",
        }
    }
}

impl std::fmt::Display for GroupOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupOp::Create => write!(f, "create"),
            GroupOp::Delete => write!(f, "delete"),
        }
    }
}

/// How a group operation ended, short of exhausted compensation (an error)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaOutcome {
    /// Every node answered with an acceptable outcome
    Completed,
    /// Delete only: the record was absent on `node`, so the operation stopped
    /// there. Nodes already deleted before it stay deleted.
    Aborted { node: String, deleted_on: Vec<String> },
    /// `failed_node` answered `Transient`; every attempted node was undone
    Compensated { failed_node: String },
}

/// One forward-pass attempt awaiting compensation
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub node: NodeTarget,
    pub timestamp: Timestamp,
}

/// Attempted-but-not-yet-compensated nodes, in attempt order
#[derive(Debug, Default)]
pub struct PendingCompensation {
    entries: Mutex<VecDeque<PendingEntry>>,
}

impl PendingCompensation {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, node: NodeTarget, timestamp: Timestamp) {
        self.entries
            .lock()
            .await
            .push_back(PendingEntry { node, timestamp });
    }

    pub async fn front(&self) -> Option<PendingEntry> {
        self.entries.lock().await.front().cloned()
    }

    pub async fn pop_front(&self) -> Option<PendingEntry> {
        self.entries.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn node_names(&self) -> Vec<String> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|e| e.node.name.clone())
            .collect()
    }
}

pub struct Coordinator<C = HttpNodeClient> {
    nodes: Vec<NodeTarget>,
    client: C,
    retry: RetryPolicy,
    poll_interval: Duration,
}

impl Coordinator<HttpNodeClient> {
    /// Coordinator over HTTP nodes, as configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = HttpNodeClient::new(config.saga.request_timeout())?;
        Self::new(config.nodes.clone(), client, &config.saga)
    }
}

impl<C: NodeClient> Coordinator<C> {
    pub fn new(nodes: Vec<NodeTarget>, client: C, saga: &SagaConfig) -> Result<Self> {
        validate_nodes(&nodes)?;
        Ok(Self {
            nodes,
            client,
            retry: RetryPolicy::from(saga),
            poll_interval: saga.existence_poll_interval(),
        })
    }

    pub fn nodes(&self) -> &[NodeTarget] {
        &self.nodes
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn run(&self, op: GroupOp, group_id: &str) -> Result<SagaOutcome> {
        match op {
            GroupOp::Create => self.create_group(group_id).await,
            GroupOp::Delete => self.delete_group(group_id).await,
        }
    }

    /// Create `group_id` on every node, compensating with scoped deletes on failure
    pub async fn create_group(&self, group_id: &str) -> Result<SagaOutcome> {
        validate_group_id(group_id)?;
        let pending = PendingCompensation::new();

        for node in &self.nodes {
            let timestamp = Timestamp::now();
            let outcome = self.client.create_on(node, group_id, timestamp).await;
            pending.push(node.clone(), timestamp).await;

            if !outcome.is_acceptable() {
                let queued = pending.len().await;
                tracing::warn!(
                    node = %node.name,
                    group_id,
                    "Create got {} outcome, compensating {} node(s)",
                    outcome,
                    queued
                );
                self.compensate(GroupOp::Create, group_id, &pending).await?;
                return Ok(SagaOutcome::Compensated {
                    failed_node: node.name.clone(),
                });
            }
        }

        tracing::info!(group_id, "Create completed on all nodes");
        Ok(SagaOutcome::Completed)
    }

    /// Delete `group_id` from every node, compensating with recreates on failure.
    ///
    /// A node that does not hold the record ends the whole operation; later
    /// nodes are not touched.
    pub async fn delete_group(&self, group_id: &str) -> Result<SagaOutcome> {
        validate_group_id(group_id)?;
        let pending = PendingCompensation::new();
        let mut deleted_on = Vec::new();

        for node in &self.nodes {
            let timestamp = Timestamp::now();
            if !self.group_exists(node, group_id).await {
                tracing::info!(node = %node.name, group_id, "Group absent, aborting delete");
                return Ok(SagaOutcome::Aborted {
                    node: node.name.clone(),
                    deleted_on,
                });
            }

            let outcome = self.client.delete_on(node, group_id, None).await;
            pending.push(node.clone(), timestamp).await;

            if !outcome.is_acceptable() {
                let queued = pending.len().await;
                tracing::warn!(
                    node = %node.name,
                    group_id,
                    "Delete got {} outcome, compensating {} node(s)",
                    outcome,
                    queued
                );
                self.compensate(GroupOp::Delete, group_id, &pending).await?;
                return Ok(SagaOutcome::Compensated {
                    failed_node: node.name.clone(),
                });
            }
            deleted_on.push(node.name.clone());
        }

        tracing::info!(group_id, "Delete completed on all nodes");
        Ok(SagaOutcome::Completed)
    }

    /// Poll reads until the node gives a conclusive answer
    async fn group_exists(&self, node: &NodeTarget, group_id: &str) -> bool {
        let mut polls: u64 = 0;
        loop {
            polls += 1;
            match self.client.read_on(node, group_id).await {
                Outcome::Success => return true,
                Outcome::NotFound => return false,
                outcome => {
                    tracing::debug!(
                        node = %node.name,
                        group_id,
                        polls,
                        "Existence check inconclusive ({}), polling again",
                        outcome
                    );
                    if self.poll_interval.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            }
        }
    }

    /// Drain `pending` under the retry policy
    async fn compensate(
        &self,
        op: GroupOp,
        group_id: &str,
        pending: &PendingCompensation,
    ) -> Result<()> {
        let result = retry_on(self.retry, op.compensation_label(), Error::is_retryable, || {
            self.compensate_once(op, group_id, pending)
        })
        .await;

        match result {
            Ok(()) => {
                tracing::info!(group_id, "Compensated {}", op);
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                let remaining = pending.node_names().await;
                tracing::error!(
                    group_id,
                    pending = ?remaining,
                    "Compensation of {} exhausted, nodes left inconsistent",
                    op
                );
                Err(Error::CompensationExhausted {
                    group_id: group_id.to_string(),
                    attempts: self.retry.max_attempts(),
                    pending: remaining,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// One pass over the queue; stops at the first transient compensating call
    async fn compensate_once(
        &self,
        op: GroupOp,
        group_id: &str,
        pending: &PendingCompensation,
    ) -> Result<()> {
        while let Some(entry) = pending.front().await {
            let outcome = match op {
                GroupOp::Create => {
                    self.client
                        .delete_on(&entry.node, group_id, Some(entry.timestamp))
                        .await
                }
                GroupOp::Delete => {
                    self.client
                        .create_on(&entry.node, group_id, entry.timestamp)
                        .await
                }
            };

            if !outcome.is_acceptable() {
                return Err(Error::CompensationFailed {
                    node: entry.node.name.clone(),
                    group_id: group_id.to_string(),
                });
            }
            tracing::info!(node = %entry.node.name, group_id, %outcome, "Compensated node");
            pending.pop_front().await;
        }
        Ok(())
    }
}
