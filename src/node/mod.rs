//! Node service: the storage endpoints the coordinator talks to
//!
//! Each node holds its own group table and enforces uniqueness of the group
//! id. For test deployments a single process hosts several node tables and
//! injects random transient failures.

pub mod http;
pub mod server;
pub mod table;

pub use server::NodeServer;

/// Request header naming the target node table
pub const NODE_HEADER: &str = "node";

/// Request header carrying the logical timestamp of a create or scoped delete
pub const TIMESTAMP_HEADER: &str = "timestamp";
