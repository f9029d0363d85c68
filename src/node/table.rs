//! Per-node group tables
//!
//! A node enforces uniqueness of `group_id` on its own table; nothing is shared
//! between tables. The node service hosts several tables in one process (one
//! per node name) and the in-memory test cluster reuses the same type.

use crate::common::{GroupRecord, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One node's group records, keyed by group id
#[derive(Debug, Default, Clone)]
pub struct GroupTable {
    records: HashMap<String, Option<Timestamp>>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Returns false if the group id is already taken.
    pub fn insert(&mut self, group_id: &str, timestamp: Option<Timestamp>) -> bool {
        if self.records.contains_key(group_id) {
            return false;
        }
        self.records.insert(group_id.to_string(), timestamp);
        true
    }

    /// Remove a record. With a timestamp, only a record created with exactly
    /// that timestamp matches.
    pub fn remove(&mut self, group_id: &str, timestamp: Option<Timestamp>) -> bool {
        let matches = match (self.records.get(group_id), timestamp) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(stored), Some(wanted)) => *stored == Some(wanted),
        };
        if matches {
            self.records.remove(group_id);
        }
        matches
    }

    pub fn get(&self, group_id: &str) -> Option<GroupRecord> {
        self.records.get(group_id).map(|timestamp| GroupRecord {
            group_id: group_id.to_string(),
            timestamp: *timestamp,
        })
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.records.contains_key(group_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn group_ids(&self) -> BTreeSet<String> {
        self.records.keys().cloned().collect()
    }
}

/// Consistency snapshot across all tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    /// Every table holds the same set of group ids
    pub consistent: bool,
    pub counts: BTreeMap<String, usize>,
}

/// The tables hosted by one process, by node name
#[derive(Debug, Default, Clone)]
pub struct NodeTables {
    tables: BTreeMap<String, GroupTable>,
}

impl NodeTables {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: names
                .into_iter()
                .map(|name| (name.into(), GroupTable::new()))
                .collect(),
        }
    }

    pub fn table(&self, node: &str) -> crate::Result<&GroupTable> {
        self.tables
            .get(node)
            .ok_or_else(|| crate::Error::UnknownNode(self.describe_unknown(node)))
    }

    pub fn table_mut(&mut self, node: &str) -> crate::Result<&mut GroupTable> {
        if !self.tables.contains_key(node) {
            return Err(crate::Error::UnknownNode(self.describe_unknown(node)));
        }
        self.tables
            .get_mut(node)
            .ok_or_else(|| crate::Error::UnknownNode(node.to_string()))
    }

    pub fn node_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn stats(&self) -> ClusterStats {
        let mut sets = self.tables.values().map(GroupTable::group_ids);
        let consistent = match sets.next() {
            Some(first) => sets.all(|set| set == first),
            None => true,
        };
        ClusterStats {
            consistent,
            counts: self
                .tables
                .iter()
                .map(|(name, table)| (name.clone(), table.len()))
                .collect(),
        }
    }

    fn describe_unknown(&self, node: &str) -> String {
        format!(
            "node {} is not configured, available nodes {:?}",
            node,
            self.node_names()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: f64) -> Timestamp {
        Timestamp::from_secs_f64(secs).unwrap()
    }

    #[test]
    fn test_insert_enforces_uniqueness() {
        let mut table = GroupTable::new();
        assert!(table.insert("1", Some(ts(1.0))));
        assert!(!table.insert("1", Some(ts(2.0))));
        assert_eq!(table.get("1").unwrap().timestamp, Some(ts(1.0)));
    }

    #[test]
    fn test_remove_scoped_by_timestamp() {
        let mut table = GroupTable::new();
        table.insert("1", Some(ts(1.5)));

        assert!(!table.remove("1", Some(ts(2.5))));
        assert!(table.contains("1"));

        assert!(table.remove("1", Some(ts(1.5))));
        assert!(!table.contains("1"));
    }

    #[test]
    fn test_remove_without_timestamp_matches_any() {
        let mut table = GroupTable::new();
        table.insert("1", None);
        assert!(table.remove("1", None));
        assert!(!table.remove("1", None));
    }

    #[test]
    fn test_timestamped_remove_never_matches_untimestamped_record() {
        let mut table = GroupTable::new();
        table.insert("1", None);
        assert!(!table.remove("1", Some(ts(1.0))));
    }

    #[test]
    fn test_stats_consistency() {
        let mut tables = NodeTables::new(["a", "b"]);
        assert!(tables.stats().consistent);

        tables.table_mut("a").unwrap().insert("1", None);
        let stats = tables.stats();
        assert!(!stats.consistent);
        assert_eq!(stats.counts["a"], 1);
        assert_eq!(stats.counts["b"], 0);

        tables.table_mut("b").unwrap().insert("1", None);
        assert!(tables.stats().consistent);
    }

    #[test]
    fn test_unknown_node() {
        let tables = NodeTables::new(["a"]);
        assert!(matches!(
            tables.table("z"),
            Err(crate::Error::UnknownNode(_))
        ));
    }
}
