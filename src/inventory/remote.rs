//! Remote inventoree backend with an on-disk cache.
//!
//! `load` prefers a fresh cache file, falls back to HTTP, and falls back
//! again to an expired cache when HTTP is unreachable. `reload` always
//! goes to HTTP and ignores cache freshness. Indexes are rebuilt into a
//! fresh store and swapped in only after a successful decode, so a failed
//! reload leaves the previous view intact.

use chrono::{Duration, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::XcConfig;
use crate::term;

use super::schema::InventoryPayload;
use super::store::{complete_suffixes, Store};
use super::InventoryError;

#[derive(Debug, Clone)]
pub struct ConductorConfig {
    pub cache_ttl_hours: u64,
    pub cache_dir: PathBuf,
    pub work_groups: Vec<String>,
    pub url: String,
}

impl From<&XcConfig> for ConductorConfig {
    fn from(cfg: &XcConfig) -> Self {
        Self {
            cache_ttl_hours: cfg.cache_ttl_hours,
            cache_dir: cfg.cache_dir.clone(),
            work_groups: cfg.work_groups.clone(),
            url: cfg.inventoree_url.clone(),
        }
    }
}

pub struct Conductor {
    config: ConductorConfig,
    store: Store,
}

impl Conductor {
    pub fn new(config: ConductorConfig) -> Self {
        Self {
            config,
            store: Store::default(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Cache file path, derived from the configured workgroup scope so
    /// each scope is cached independently.
    pub fn cache_filename(&self) -> PathBuf {
        let wglist = if self.config.work_groups.is_empty() {
            "all".to_string()
        } else {
            self.config.work_groups.join("_")
        };
        self.config.cache_dir.join(format!("cache_{wglist}.json"))
    }

    fn executer_data_url(&self) -> String {
        format!(
            "{}/api/v1/open/executer_data?work_groups={}&recursive=true",
            self.config.url,
            self.config.work_groups.join(",")
        )
    }

    fn load_cache(&self) -> Result<InventoryPayload, InventoryError> {
        if !self.config.cache_dir.exists() {
            std::fs::create_dir_all(&self.config.cache_dir)?;
        }
        let filename = self.cache_filename();
        let raw = std::fs::read(&filename)?;
        let payload: InventoryPayload = serde_json::from_slice(&raw)?;
        Ok(payload)
    }

    fn cache_is_fresh(&self, payload: &InventoryPayload) -> bool {
        let ttl = Duration::hours(self.config.cache_ttl_hours as i64);
        payload.created_at + ttl > Utc::now()
    }

    /// Cache write failures are reported but never fatal.
    fn save_cache(&self, payload: &mut InventoryPayload) {
        payload.created_at = Utc::now();
        let filename = self.cache_filename();
        let result = std::fs::create_dir_all(&self.config.cache_dir)
            .map_err(InventoryError::from)
            .and_then(|_| Ok(serde_json::to_vec(payload)?))
            .and_then(|encoded| Ok(std::fs::write(&filename, encoded)?));
        if let Err(err) = result {
            term::error(&format!(
                "Error writing cachefile {}: {}\n",
                filename.display(),
                err
            ));
        }
    }

    async fn fetch_http(&self) -> Result<InventoryPayload, InventoryError> {
        term::warn("Reloading data from inventoree\n");
        let url = self.executer_data_url();
        debug!(%url, "fetching inventory");
        let response = reqwest::get(&url).await?;
        let payload = response.json::<InventoryPayload>().await?;
        Ok(payload)
    }

    pub async fn load(&mut self) -> Result<(), InventoryError> {
        match self.load_cache() {
            Ok(payload) if self.cache_is_fresh(&payload) => {
                debug!("using fresh inventory cache");
                self.store = Store::build(&payload.data);
                return Ok(());
            }
            Ok(_) => debug!("inventory cache is expired"),
            Err(err) => {
                term::warn(&format!(
                    "No usable cache file {}: {}\n",
                    self.cache_filename().display(),
                    err
                ));
            }
        }

        match self.fetch_http().await {
            Ok(mut payload) => {
                self.save_cache(&mut payload);
                self.store = Store::build(&payload.data);
                Ok(())
            }
            Err(http_err) => {
                warn!(error = %http_err, "inventory fetch failed, trying expired cache");
                match self.load_cache() {
                    Ok(payload) => {
                        self.store = Store::build(&payload.data);
                        Ok(())
                    }
                    Err(_) => Err(InventoryError::Unavailable),
                }
            }
        }
    }

    /// Force an HTTP fetch regardless of cache freshness.
    pub async fn reload(&mut self) -> Result<(), InventoryError> {
        let mut payload = self.fetch_http().await?;
        self.save_cache(&mut payload);
        self.store = Store::build(&payload.data);
        Ok(())
    }

    pub fn complete_host(&self, prefix: &str) -> Vec<String> {
        complete_suffixes(self.store.host_fqdns(), prefix)
    }

    pub fn complete_group(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.strip_prefix('%').unwrap_or(prefix);
        complete_suffixes(self.store.group_names(), prefix)
    }

    pub fn complete_workgroup(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.strip_prefix('*').unwrap_or(prefix);
        complete_suffixes(self.store.workgroup_names(), prefix)
    }

    pub fn complete_datacenter(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.strip_prefix('@').unwrap_or(prefix);
        complete_suffixes(self.store.datacenter_names(), prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::schema::*;

    fn conductor_with(dir: &std::path::Path, work_groups: Vec<String>) -> Conductor {
        Conductor::new(ConductorConfig {
            cache_ttl_hours: 24,
            cache_dir: dir.to_path_buf(),
            work_groups,
            url: "http://localhost:1".to_string(),
        })
    }

    fn sample_payload() -> InventoryPayload {
        InventoryPayload {
            data: InventoryData {
                work_groups: vec![WorkGroup {
                    id: "w1".into(),
                    name: "wg1".into(),
                    ..Default::default()
                }],
                groups: vec![Group {
                    id: "g1".into(),
                    name: "grpA".into(),
                    work_group_id: "w1".into(),
                    ..Default::default()
                }],
                hosts: vec![Host {
                    id: "h1".into(),
                    fqdn: "host1.example.com".into(),
                    group_id: "g1".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cache_filename_derived_from_scope() {
        let dir = tempfile::tempdir().unwrap();
        let c = conductor_with(dir.path(), vec![]);
        assert!(c.cache_filename().ends_with("cache_all.json"));

        let c = conductor_with(dir.path(), vec!["a".into(), "b".into()]);
        assert!(c.cache_filename().ends_with("cache_a_b.json"));
    }

    #[tokio::test]
    async fn test_load_uses_fresh_cache_without_http() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = conductor_with(dir.path(), vec![]);
        let payload = sample_payload();
        std::fs::write(
            c.cache_filename(),
            serde_json::to_vec(&payload).unwrap(),
        )
        .unwrap();

        c.load().await.unwrap();
        assert!(c.store().host_by_fqdn("host1.example.com").is_some());
    }

    #[tokio::test]
    async fn test_load_falls_back_to_expired_cache_when_http_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = conductor_with(dir.path(), vec![]);
        let mut payload = sample_payload();
        payload.created_at = Utc::now() - Duration::hours(48);
        std::fs::write(
            c.cache_filename(),
            serde_json::to_vec(&payload).unwrap(),
        )
        .unwrap();

        // the configured URL points nowhere, so HTTP fails and the stale
        // cache is used
        c.load().await.unwrap();
        assert!(c.store().host_by_fqdn("host1.example.com").is_some());
    }

    #[tokio::test]
    async fn test_load_fails_without_cache_and_http() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = conductor_with(dir.path(), vec![]);
        let err = c.load().await.unwrap_err();
        assert!(matches!(err, InventoryError::Unavailable));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = conductor_with(dir.path(), vec![]);
        std::fs::write(
            c.cache_filename(),
            serde_json::to_vec(&sample_payload()).unwrap(),
        )
        .unwrap();
        c.load().await.unwrap();

        assert!(c.reload().await.is_err());
        assert!(c.store().host_by_fqdn("host1.example.com").is_some());
    }

    #[test]
    fn test_cache_roundtrip_rebuilds_same_index() {
        let dir = tempfile::tempdir().unwrap();
        let c = conductor_with(dir.path(), vec![]);
        let mut payload = sample_payload();

        let encoded = serde_json::to_vec(&payload).unwrap();
        std::fs::write(c.cache_filename(), &encoded).unwrap();
        let reread = c.load_cache().unwrap();

        payload.created_at = reread.created_at;
        let before = Store::build(&payload.data);
        let after = Store::build(&reread.data);
        assert_eq!(
            before.host_fqdns().collect::<std::collections::BTreeSet<_>>(),
            after.host_fqdns().collect::<std::collections::BTreeSet<_>>()
        );
        assert_eq!(
            before.group_names().collect::<std::collections::BTreeSet<_>>(),
            after.group_names().collect::<std::collections::BTreeSet<_>>()
        );
    }

    #[tokio::test]
    async fn test_completions_return_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = conductor_with(dir.path(), vec![]);
        std::fs::write(
            c.cache_filename(),
            serde_json::to_vec(&sample_payload()).unwrap(),
        )
        .unwrap();
        c.load().await.unwrap();

        assert_eq!(c.complete_host("host1."), vec!["example.com"]);
        assert_eq!(c.complete_group("%grp"), vec!["A"]);
        assert_eq!(c.complete_workgroup("*"), vec!["wg1"]);
    }
}
