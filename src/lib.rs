//! # groupsaga
//!
//! Keeps a "group" record consistent across several independent, unreliable
//! storage nodes:
//! - Forward pass over a fixed, ordered node set
//! - Compensation (undo in attempt order) when a node answers transiently
//! - Bounded fixed-delay retry of compensation that resumes where it stopped
//! - A node service with fault injection and a batch driver to exercise it
//!
//! ## Architecture
//!
//! ```text
//!   batch driver ──► Coordinator::create_group / delete_group
//!                          │  forward pass, in node order
//!            ┌─────────────┼──────────────┐
//!            ▼             ▼              ▼
//!        ┌────────┐   ┌────────┐     ┌────────┐
//!        │ node01 │   │ node02 │ ... │ nodeNN │   (own table, own uniqueness)
//!        └────────┘   └────────┘     └────────┘
//!            ▲             ▲
//!            └─────────────┘  compensation, front of queue first, retried
//! ```
//!
//! ## Usage
//!
//! ### Start a node service hosting three node tables
//! ```bash
//! groupsaga-node serve --bind 127.0.0.1:8080 --nodes node01,node02,node03 --failure-rate 0.5
//! ```
//!
//! ### Drive it
//! ```bash
//! groupsaga create-one 42
//! groupsaga delete-one 42
//! groupsaga create --count 100 --workers 10
//! groupsaga stats
//! ```

pub mod common;
pub mod coordinator;
pub mod node;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::Coordinator;
pub use node::NodeServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
