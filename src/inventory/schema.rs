//! Wire and cache-file schema for the inventoree backend.
//!
//! Field names follow the HTTP API (`_id`, `parent_id`, `work_group_id`,
//! ...). The cache file is the same payload plus a `created_at` timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Datacenter {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub child_ids: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub root_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub child_ids: Vec<String>,
    #[serde(default)]
    pub parent_ids: Vec<String>,
    #[serde(rename = "tags", default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub name: String,
    #[serde(default)]
    pub work_group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Host {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(rename = "tags", default)]
    pub tags: Vec<String>,
    pub fqdn: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub datacenter_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkGroup {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InventoryData {
    #[serde(default)]
    pub datacenters: Vec<Datacenter>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub work_groups: Vec<WorkGroup>,
}

/// The HTTP response body and the on-disk cache format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryPayload {
    pub data: InventoryData,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

impl Default for InventoryPayload {
    fn default() -> Self {
        Self {
            data: InventoryData::default(),
            created_at: epoch(),
        }
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_api_payload() {
        let raw = r#"{
            "data": {
                "datacenters": [{"_id": "d1", "name": "dc1", "parent_id": ""}],
                "work_groups": [{"_id": "w1", "name": "wg1"}],
                "groups": [{"_id": "g1", "name": "grpA", "work_group_id": "w1",
                            "tags": ["prod"], "child_ids": [], "parent_ids": []}],
                "hosts": [{"_id": "h1", "fqdn": "host1.example.com", "group_id": "g1",
                           "datacenter_id": "d1", "tags": [], "aliases": ["host1"]}]
            }
        }"#;
        let payload: InventoryPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.data.hosts[0].fqdn, "host1.example.com");
        assert_eq!(payload.data.groups[0].tags, vec!["prod"]);
        assert_eq!(payload.created_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_cache_payload_keeps_created_at() {
        let mut payload = InventoryPayload::default();
        payload.created_at = Utc::now();
        let encoded = serde_json::to_string(&payload).unwrap();
        let decoded: InventoryPayload = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.created_at, payload.created_at);
    }
}
