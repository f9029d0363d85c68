//! Core data types: group records, node targets and logical timestamps

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical timestamp: seconds since the Unix epoch (UTC) with sub-second precision.
///
/// Travels over the wire as its decimal string. `Display` produces the shortest
/// representation that parses back to the same value, so a timestamp sent on a
/// create can be matched exactly by a later timestamp-scoped delete.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Wall-clock capture
    pub fn now() -> Self {
        let micros = chrono::Utc::now().timestamp_micros();
        Self(micros as f64 / 1_000_000.0)
    }

    pub fn from_secs_f64(secs: f64) -> crate::Result<Self> {
        if secs.is_finite() {
            Ok(Self(secs))
        } else {
            Err(crate::Error::InvalidTimestamp(secs.to_string()))
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let secs: f64 = s
            .trim()
            .parse()
            .map_err(|_| crate::Error::InvalidTimestamp(s.to_string()))?;
        Self::from_secs_f64(secs)
    }
}

/// One configured node: its name (sent as the `node` header) and base address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeTarget {
    pub name: String,
    pub address: String,
}

impl NodeTarget {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for NodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// A group record as held by a single node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_string_is_exact() {
        let ts = Timestamp::now();
        let parsed: Timestamp = ts.to_string().parse().unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        assert!("".parse::<Timestamp>().is_err());
        assert!("yesterday".parse::<Timestamp>().is_err());
        assert!("NaN".parse::<Timestamp>().is_err());
        assert!("inf".parse::<Timestamp>().is_err());
        assert_eq!(
            "1700000000.25".parse::<Timestamp>().unwrap().as_secs_f64(),
            1_700_000_000.25
        );
    }

    #[test]
    fn test_group_record_wire_name() {
        let record = GroupRecord {
            group_id: "5".into(),
            timestamp: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"groupId":"5"}"#);
    }
}
