//! Coordinator: keeps a group record consistent across independent nodes
//!
//! The coordinator is responsible for:
//! - Forward passes (create/delete on every node, in configured order)
//! - Compensation of attempted nodes when a node answers transiently
//! - Bounded, resumable retry of compensation
//! - Fanning many group operations out over a worker pool

pub mod batch;
pub mod memory;
pub mod node_client;
pub mod retry;
pub mod saga;

pub use batch::{run_batch, BatchReport};
pub use memory::InMemoryCluster;
pub use node_client::{HttpNodeClient, NodeClient, Outcome};
pub use retry::{retry_on, RetryPolicy};
pub use saga::{Coordinator, GroupOp, PendingCompensation, SagaOutcome};
