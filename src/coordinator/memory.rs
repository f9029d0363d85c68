//! In-process node client for tests and simulations
//!
//! `InMemoryCluster` holds one `GroupTable` per node and answers node calls
//! directly, recording every call. Faults can be scripted per node and call
//! kind, or drawn at random from a seeded generator to reproduce the node
//! service's randomized failures deterministically.

use crate::common::{NodeTarget, Timestamp};
use crate::coordinator::node_client::{NodeClient, Outcome};
use crate::node::table::{ClusterStats, NodeTables};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Create,
    Delete,
    Read,
}

/// What a scripted call does instead of (or in addition to) the normal path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Behave normally
    Pass,
    /// No effect, report `Transient`
    Reject,
    /// Apply the effect, then report `Transient` (lost response)
    ApplyThenFail,
}

/// One recorded node call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub node: String,
    pub kind: CallKind,
    pub group_id: String,
    pub timestamp: Option<Timestamp>,
    pub outcome: Outcome,
}

struct ClusterState {
    tables: NodeTables,
    scripts: HashMap<(String, CallKind), VecDeque<Fault>>,
    always_failing: HashSet<(String, CallKind)>,
    failure_rate: f64,
    rng: StdRng,
    calls: Vec<Call>,
}

/// Cheap to clone; clones share state
#[derive(Clone)]
pub struct InMemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl InMemoryCluster {
    pub fn new(nodes: &[NodeTarget]) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClusterState {
                tables: NodeTables::new(nodes.iter().map(|n| n.name.clone())),
                scripts: HashMap::new(),
                always_failing: HashSet::new(),
                failure_rate: 0.0,
                rng: StdRng::seed_from_u64(0),
                calls: Vec::new(),
            })),
        }
    }

    /// Random `Reject` faults on every call with the given probability
    pub fn with_failure_rate(self, failure_rate: f64, seed: u64) -> Self {
        {
            let mut state = self.lock();
            state.failure_rate = failure_rate.clamp(0.0, 1.0);
            state.rng = StdRng::seed_from_u64(seed);
        }
        self
    }

    /// Queue faults for the next calls of `kind` on `node`, consumed in order
    pub fn script(&self, node: &str, kind: CallKind, faults: impl IntoIterator<Item = Fault>) {
        self.lock()
            .scripts
            .entry((node.to_string(), kind))
            .or_default()
            .extend(faults);
    }

    /// Every call of `kind` on `node` is rejected as `Transient`
    pub fn fail_always(&self, node: &str, kind: CallKind) {
        self.lock().always_failing.insert((node.to_string(), kind));
    }

    pub fn heal(&self, node: &str, kind: CallKind) {
        let mut state = self.lock();
        state.always_failing.remove(&(node.to_string(), kind));
        state.scripts.remove(&(node.to_string(), kind));
    }

    /// Seed a record directly, bypassing faults and the call log
    pub fn insert(&self, node: &str, group_id: &str, timestamp: Option<Timestamp>) {
        if let Ok(table) = self.lock().tables.table_mut(node) {
            table.insert(group_id, timestamp);
        }
    }

    pub fn contains(&self, node: &str, group_id: &str) -> bool {
        self.lock()
            .tables
            .table(node)
            .map(|t| t.contains(group_id))
            .unwrap_or(false)
    }

    pub fn timestamp_of(&self, node: &str, group_id: &str) -> Option<Timestamp> {
        self.lock()
            .tables
            .table(node)
            .ok()
            .and_then(|t| t.get(group_id))
            .and_then(|r| r.timestamp)
    }

    pub fn stats(&self) -> ClusterStats {
        self.lock().tables.stats()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, node: &str) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.node == node)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn call(
        &self,
        node: &NodeTarget,
        kind: CallKind,
        group_id: &str,
        timestamp: Option<Timestamp>,
    ) -> Outcome {
        let mut state = self.lock();
        let fault = state.next_fault(&node.name, kind);

        let outcome = if fault == Fault::Reject {
            Outcome::Transient
        } else {
            let applied = state.apply(&node.name, kind, group_id, timestamp);
            if fault == Fault::ApplyThenFail {
                Outcome::Transient
            } else {
                applied
            }
        };

        state.calls.push(Call {
            node: node.name.clone(),
            kind,
            group_id: group_id.to_string(),
            timestamp,
            outcome,
        });
        outcome
    }
}

impl ClusterState {
    fn next_fault(&mut self, node: &str, kind: CallKind) -> Fault {
        let key = (node.to_string(), kind);
        if self.always_failing.contains(&key) {
            return Fault::Reject;
        }
        if let Some(fault) = self.scripts.get_mut(&key).and_then(VecDeque::pop_front) {
            return fault;
        }
        if self.failure_rate > 0.0 && self.rng.gen::<f64>() < self.failure_rate {
            return Fault::Reject;
        }
        Fault::Pass
    }

    fn apply(
        &mut self,
        node: &str,
        kind: CallKind,
        group_id: &str,
        timestamp: Option<Timestamp>,
    ) -> Outcome {
        let table = match self.tables.table_mut(node) {
            Ok(table) => table,
            // The node service rejects unknown nodes with 406
            Err(_) => return Outcome::Transient,
        };
        match kind {
            CallKind::Create => {
                if table.insert(group_id, timestamp) {
                    Outcome::Success
                } else {
                    Outcome::Conflict
                }
            }
            CallKind::Delete => {
                if table.remove(group_id, timestamp) {
                    Outcome::Success
                } else {
                    Outcome::NotFound
                }
            }
            CallKind::Read => {
                if table.contains(group_id) {
                    Outcome::Success
                } else {
                    Outcome::NotFound
                }
            }
        }
    }
}

impl NodeClient for InMemoryCluster {
    async fn create_on(&self, node: &NodeTarget, group_id: &str, timestamp: Timestamp) -> Outcome {
        self.call(node, CallKind::Create, group_id, Some(timestamp))
    }

    async fn delete_on(
        &self,
        node: &NodeTarget,
        group_id: &str,
        timestamp: Option<Timestamp>,
    ) -> Outcome {
        self.call(node, CallKind::Delete, group_id, timestamp)
    }

    async fn read_on(&self, node: &NodeTarget, group_id: &str) -> Outcome {
        self.call(node, CallKind::Read, group_id, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<NodeTarget> {
        vec![
            NodeTarget::new("a", "http://a"),
            NodeTarget::new("b", "http://b"),
        ]
    }

    #[tokio::test]
    async fn test_behaves_like_node_service() {
        let nodes = nodes();
        let cluster = InMemoryCluster::new(&nodes);
        let ts = Timestamp::now();

        assert_eq!(cluster.read_on(&nodes[0], "1").await, Outcome::NotFound);
        assert_eq!(cluster.create_on(&nodes[0], "1", ts).await, Outcome::Success);
        assert_eq!(cluster.create_on(&nodes[0], "1", ts).await, Outcome::Conflict);
        assert_eq!(cluster.read_on(&nodes[0], "1").await, Outcome::Success);
        assert_eq!(cluster.read_on(&nodes[1], "1").await, Outcome::NotFound);
        assert_eq!(cluster.delete_on(&nodes[0], "1", None).await, Outcome::Success);
        assert_eq!(cluster.delete_on(&nodes[0], "1", None).await, Outcome::NotFound);
        assert_eq!(cluster.calls().len(), 7);
    }

    #[tokio::test]
    async fn test_scripted_faults_are_consumed_in_order() {
        let nodes = nodes();
        let cluster = InMemoryCluster::new(&nodes);
        cluster.script("a", CallKind::Create, [Fault::Reject, Fault::ApplyThenFail]);

        let ts = Timestamp::now();
        assert_eq!(cluster.create_on(&nodes[0], "1", ts).await, Outcome::Transient);
        assert!(!cluster.contains("a", "1"));

        assert_eq!(cluster.create_on(&nodes[0], "1", ts).await, Outcome::Transient);
        assert!(cluster.contains("a", "1"));
        assert_eq!(cluster.timestamp_of("a", "1"), Some(ts));

        assert_eq!(cluster.create_on(&nodes[0], "1", ts).await, Outcome::Conflict);
    }

    #[tokio::test]
    async fn test_fail_always_and_heal() {
        let nodes = nodes();
        let cluster = InMemoryCluster::new(&nodes);
        cluster.fail_always("b", CallKind::Read);

        for _ in 0..5 {
            assert_eq!(cluster.read_on(&nodes[1], "1").await, Outcome::Transient);
        }
        cluster.heal("b", CallKind::Read);
        assert_eq!(cluster.read_on(&nodes[1], "1").await, Outcome::NotFound);
    }

    #[tokio::test]
    async fn test_random_failures_are_reproducible() {
        async fn run(seed: u64) -> Vec<Outcome> {
            let targets = nodes();
            let cluster = InMemoryCluster::new(&targets).with_failure_rate(0.5, seed);
            let mut outcomes = Vec::new();
            for i in 0..20 {
                outcomes.push(cluster.read_on(&targets[0], &i.to_string()).await);
            }
            outcomes
        }

        let first = run(7).await;
        assert_eq!(first, run(7).await);
        assert!(first.contains(&Outcome::Transient));
        assert!(first.contains(&Outcome::NotFound));
    }
}
