//! Common utilities and types shared across groupsaga

pub mod config;
pub mod error;
pub mod tracing_middleware;
pub mod types;
pub mod utils;

pub use config::{BatchConfig, Config, NodeServiceConfig, SagaConfig};
pub use error::{Error, Result};
pub use types::{GroupRecord, NodeTarget, Timestamp};
pub use utils::{encode_group_id, parse_duration, validate_group_id};
