//! Per-node calls and outcome classification
//!
//! A node client performs exactly one remote call per operation and never
//! retries: only the caller knows whether an operation is safe to repeat.
//! Remote outcomes, transport failures included, are classified rather than
//! raised.

use crate::common::{NodeTarget, Result, Timestamp};
use crate::node::{NODE_HEADER, TIMESTAMP_HEADER};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Semantic category of a single node call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// 200 / 201
    Success,
    /// 400: the record already exists
    Conflict,
    /// 404
    NotFound,
    /// Anything else, transport failures included. The remote effect is unknown.
    Transient,
}

impl Outcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 | 201 => Outcome::Success,
            400 => Outcome::Conflict,
            404 => Outcome::NotFound,
            _ => Outcome::Transient,
        }
    }

    /// Terminal application-level answer for one node
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Outcome::Transient)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Conflict => write!(f, "conflict"),
            Outcome::NotFound => write!(f, "not-found"),
            Outcome::Transient => write!(f, "transient"),
        }
    }
}

/// One create, read or delete against one node
pub trait NodeClient: Send + Sync {
    fn create_on(
        &self,
        node: &NodeTarget,
        group_id: &str,
        timestamp: Timestamp,
    ) -> impl Future<Output = Outcome> + Send;

    /// With a timestamp only the record created with that exact timestamp is removed.
    fn delete_on(
        &self,
        node: &NodeTarget,
        group_id: &str,
        timestamp: Option<Timestamp>,
    ) -> impl Future<Output = Outcome> + Send;

    /// Existence probe: `Success` found, `NotFound` absent, anything else inconclusive.
    fn read_on(&self, node: &NodeTarget, group_id: &str) -> impl Future<Output = Outcome> + Send;
}

#[derive(Serialize)]
struct GroupBody<'a> {
    #[serde(rename = "groupId")]
    group_id: &'a str,
}

/// Node client speaking the node service's HTTP contract
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    http: reqwest::Client,
}

impl HttpNodeClient {
    /// Timeouts surface as `Transient` instead of hanging the coordinator
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http })
    }

    fn group_url(node: &NodeTarget) -> String {
        format!("{}/group", node.address.trim_end_matches('/'))
    }

    fn classify(
        op: &'static str,
        node: &NodeTarget,
        group_id: &str,
        result: reqwest::Result<reqwest::Response>,
    ) -> Outcome {
        match result {
            Ok(resp) => {
                let outcome = Outcome::from_status(resp.status().as_u16());
                tracing::debug!(
                    op,
                    node = %node.name,
                    group_id,
                    status = resp.status().as_u16(),
                    %outcome,
                    "Node responded"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(op, node = %node.name, group_id, "Node call failed: {}", e);
                Outcome::Transient
            }
        }
    }
}

impl NodeClient for HttpNodeClient {
    async fn create_on(&self, node: &NodeTarget, group_id: &str, timestamp: Timestamp) -> Outcome {
        tracing::info!(node = %node.name, group_id, %timestamp, "Creating group");
        let result = self
            .http
            .post(Self::group_url(node))
            .header(NODE_HEADER, &node.name)
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .json(&GroupBody { group_id })
            .send()
            .await;
        Self::classify("create", node, group_id, result)
    }

    async fn delete_on(
        &self,
        node: &NodeTarget,
        group_id: &str,
        timestamp: Option<Timestamp>,
    ) -> Outcome {
        tracing::info!(node = %node.name, group_id, timestamp = ?timestamp, "Deleting group");
        let mut request = self
            .http
            .delete(Self::group_url(node))
            .header(NODE_HEADER, &node.name)
            .json(&GroupBody { group_id });
        if let Some(ts) = timestamp {
            request = request.header(TIMESTAMP_HEADER, ts.to_string());
        }
        Self::classify("delete", node, group_id, request.send().await)
    }

    async fn read_on(&self, node: &NodeTarget, group_id: &str) -> Outcome {
        let url = format!(
            "{}/{}",
            Self::group_url(node),
            crate::common::encode_group_id(group_id)
        );
        let result = self
            .http
            .get(url)
            .header(NODE_HEADER, &node.name)
            .send()
            .await;
        Self::classify("read", node, group_id, result)
    }
}
