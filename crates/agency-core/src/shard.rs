//! Shard identifiers and their numeric ordering.
//!
//! Shard ids are canonically `s<digits>`. They are ordered by the numeric
//! suffix so that `s10` sorts after `s2`; positional comparisons between two
//! collections' shard maps depend on this ordering. Ids that are not in the
//! canonical form sort after all canonical ids, lexicographically.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A shard identifier such as `s1001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(String);

/// Shard id → server ids. Index 0 is the leader, the rest are followers.
pub type ShardMap = BTreeMap<ShardId, Vec<String>>;

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `<digits>` part of a canonical `s<digits>` id.
    pub fn numeric_suffix(&self) -> Option<u64> {
        let digits = self.0.strip_prefix('s')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

impl Ord for ShardId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric_suffix(), other.numeric_suffix()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ShardId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ShardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ShardId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sort raw shard names in place using the numeric-suffix rule.
pub fn sort_shard_names(names: &mut [String]) {
    names.sort_by_cached_key(|name| ShardId::new(name.as_str()));
}

/// Leader/follower split of a single shard's server list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPlacement {
    pub leader: Option<String>,
    pub followers: Vec<String>,
}

impl ShardPlacement {
    pub fn from_servers(servers: &[String]) -> Self {
        match servers.split_first() {
            Some((leader, followers)) => Self {
                leader: Some(leader.clone()),
                followers: followers.to_vec(),
            },
            None => Self {
                leader: None,
                followers: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_suffix_ordering() {
        let mut names = vec!["s1".to_string(), "s10".to_string(), "s2".to_string()];
        sort_shard_names(&mut names);
        assert_eq!(names, ["s1", "s2", "s10"]);
    }

    #[test]
    fn non_canonical_ids_sort_last() {
        let mut ids: Vec<ShardId> = ["shard-b", "s3", "s+1", "s20", "shard-a"]
            .into_iter()
            .map(ShardId::from)
            .collect();
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(ShardId::as_str).collect();
        assert_eq!(sorted, ["s3", "s20", "s+1", "shard-a", "shard-b"]);
    }

    #[test]
    fn leading_zeros_stay_distinct() {
        let a = ShardId::from("s01");
        let b = ShardId::from("s1");
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.numeric_suffix(), b.numeric_suffix());
    }

    #[test]
    fn shard_map_deserializes_in_numeric_order() {
        let map: ShardMap =
            serde_json::from_str(r#"{"s10":["a"],"s2":["b","c"],"s1":["d"]}"#).unwrap();
        let keys: Vec<&str> = map.keys().map(ShardId::as_str).collect();
        assert_eq!(keys, ["s1", "s2", "s10"]);
    }

    #[test]
    fn placement_splits_leader() {
        let servers = vec!["db1".to_string(), "db2".to_string(), "db3".to_string()];
        let placement = ShardPlacement::from_servers(&servers);
        assert_eq!(placement.leader.as_deref(), Some("db1"));
        assert_eq!(placement.followers, ["db2", "db3"]);

        let empty = ShardPlacement::from_servers(&[]);
        assert!(empty.leader.is_none());
        assert!(empty.followers.is_empty());
    }
}
