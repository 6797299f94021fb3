//! Flat in-memory indexes over the inventory payload.
//!
//! Entities live in id-keyed tables and reference each other by id only;
//! traversal walks the tables with a visited set, so a rebuild can never
//! leave dangling back-edges and a malformed group cycle degenerates to a
//! tree (revisited groups are treated as leaves).

use std::collections::{HashMap, HashSet};

use super::schema::{Datacenter, Group, Host, InventoryData, WorkGroup};

#[derive(Debug, Default)]
pub struct Store {
    datacenters: HashMap<String, Datacenter>,
    groups: HashMap<String, Group>,
    hosts: HashMap<String, Host>,
    workgroups: HashMap<String, WorkGroup>,

    datacenter_ids_by_name: HashMap<String, String>,
    group_ids_by_name: HashMap<String, String>,
    host_ids_by_fqdn: HashMap<String, String>,
    workgroup_ids_by_name: HashMap<String, String>,

    // derived during build
    group_ids_of_workgroup: HashMap<String, Vec<String>>,
    host_ids_of_group: HashMap<String, Vec<String>>,
}

impl Store {
    /// Index a decoded payload. Input order is preserved in the derived
    /// per-workgroup and per-group lists.
    pub fn build(data: &InventoryData) -> Self {
        let mut store = Store::default();

        for dc in &data.datacenters {
            store
                .datacenter_ids_by_name
                .insert(dc.name.clone(), dc.id.clone());
            store.datacenters.insert(dc.id.clone(), dc.clone());
        }

        for wg in &data.work_groups {
            store
                .workgroup_ids_by_name
                .insert(wg.name.clone(), wg.id.clone());
            store
                .group_ids_of_workgroup
                .entry(wg.id.clone())
                .or_default();
            store.workgroups.insert(wg.id.clone(), wg.clone());
        }

        for group in &data.groups {
            store
                .group_ids_by_name
                .insert(group.name.clone(), group.id.clone());
            if store.workgroups.contains_key(&group.work_group_id) {
                store
                    .group_ids_of_workgroup
                    .entry(group.work_group_id.clone())
                    .or_default()
                    .push(group.id.clone());
            }
            store.host_ids_of_group.entry(group.id.clone()).or_default();
            store.groups.insert(group.id.clone(), group.clone());
        }

        for host in &data.hosts {
            store
                .host_ids_by_fqdn
                .insert(host.fqdn.clone(), host.id.clone());
            if store.groups.contains_key(&host.group_id) {
                store
                    .host_ids_of_group
                    .entry(host.group_id.clone())
                    .or_default()
                    .push(host.id.clone());
            }
            store.hosts.insert(host.id.clone(), host.clone());
        }

        store
    }

    pub fn host_by_fqdn(&self, fqdn: &str) -> Option<&Host> {
        self.host_ids_by_fqdn
            .get(fqdn)
            .and_then(|id| self.hosts.get(id))
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.group_ids_by_name
            .get(name)
            .and_then(|id| self.groups.get(id))
    }

    pub fn workgroup_by_name(&self, name: &str) -> Option<&WorkGroup> {
        self.workgroup_ids_by_name
            .get(name)
            .and_then(|id| self.workgroups.get(id))
    }

    /// Name of the datacenter a host belongs to, if resolvable.
    pub fn datacenter_name_of(&self, host: &Host) -> Option<&str> {
        self.datacenters
            .get(&host.datacenter_id)
            .map(|dc| dc.name.as_str())
    }

    /// Hosts attached directly to a group, in payload order.
    pub fn hosts_of_group(&self, group_id: &str) -> Vec<&Host> {
        self.host_ids_of_group
            .get(group_id)
            .map(|ids| ids.iter().filter_map(|id| self.hosts.get(id)).collect())
            .unwrap_or_default()
    }

    /// Transitive child groups: direct children first, then deeper levels.
    /// Revisited ids are skipped.
    pub fn child_groups(&self, group_id: &str) -> Vec<&Group> {
        let mut visited = HashSet::new();
        visited.insert(group_id.to_string());
        self.collect_children(group_id, &mut visited)
    }

    fn collect_children<'a>(
        &'a self,
        group_id: &str,
        visited: &mut HashSet<String>,
    ) -> Vec<&'a Group> {
        let Some(group) = self.groups.get(group_id) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        for child_id in &group.child_ids {
            if visited.insert(child_id.clone()) {
                if let Some(child) = self.groups.get(child_id) {
                    children.push(child);
                }
            }
        }
        let mut lower = Vec::new();
        for child in &children {
            lower.extend(self.collect_children(&child.id, visited));
        }
        children.extend(lower);
        children
    }

    /// Hosts of a group and all its transitive children. Child-group
    /// hosts come first, the group's own hosts last.
    pub fn all_hosts_of_group(&self, group_id: &str) -> Vec<&Host> {
        let mut hosts = Vec::new();
        for group in self.child_groups(group_id) {
            hosts.extend(self.hosts_of_group(&group.id));
        }
        hosts.extend(self.hosts_of_group(group_id));
        hosts
    }

    /// Hosts directly owned by the groups of one workgroup.
    pub fn hosts_of_workgroup(&self, workgroup_id: &str) -> Vec<&Host> {
        let mut hosts = Vec::new();
        if let Some(group_ids) = self.group_ids_of_workgroup.get(workgroup_id) {
            for group_id in group_ids {
                hosts.extend(self.hosts_of_group(group_id));
            }
        }
        hosts
    }

    /// Hosts of every workgroup, for the bare `*` token.
    pub fn hosts_of_all_workgroups(&self) -> Vec<&Host> {
        let mut wg_names: Vec<&String> = self.workgroup_ids_by_name.keys().collect();
        wg_names.sort();
        let mut hosts = Vec::new();
        for name in wg_names {
            if let Some(id) = self.workgroup_ids_by_name.get(name) {
                hosts.extend(self.hosts_of_workgroup(id));
            }
        }
        hosts
    }

    /// All FQDNs matching a regexp, sorted.
    pub fn fqdns_matching(&self, pattern: &regex::Regex) -> Vec<String> {
        let mut fqdns: Vec<String> = self
            .host_ids_by_fqdn
            .keys()
            .filter(|fqdn| pattern.is_match(fqdn))
            .cloned()
            .collect();
        fqdns.sort();
        fqdns
    }

    pub fn host_fqdns(&self) -> impl Iterator<Item = &str> {
        self.host_ids_by_fqdn.keys().map(String::as_str)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.group_ids_by_name.keys().map(String::as_str)
    }

    pub fn workgroup_names(&self) -> impl Iterator<Item = &str> {
        self.workgroup_ids_by_name.keys().map(String::as_str)
    }

    pub fn datacenter_names(&self) -> impl Iterator<Item = &str> {
        self.datacenter_ids_by_name.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Completion helper shared by the backends: sorted suffixes of every
/// candidate starting with `prefix`, ready to be appended to what the
/// operator already typed.
pub fn complete_suffixes<'a, I>(candidates: I, prefix: &str) -> Vec<String>
where
    I: Iterator<Item = &'a str>,
{
    let mut res: Vec<String> = candidates
        .filter_map(|c| c.strip_prefix(prefix))
        .map(String::from)
        .collect();
    res.sort();
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::schema::*;

    fn sample_data() -> InventoryData {
        InventoryData {
            datacenters: vec![
                Datacenter {
                    id: "d1".into(),
                    name: "dc1".into(),
                    ..Default::default()
                },
                Datacenter {
                    id: "d2".into(),
                    name: "dc2".into(),
                    parent_id: "d1".into(),
                    ..Default::default()
                },
            ],
            work_groups: vec![WorkGroup {
                id: "w1".into(),
                name: "wg1".into(),
                ..Default::default()
            }],
            groups: vec![
                Group {
                    id: "g1".into(),
                    name: "parent".into(),
                    work_group_id: "w1".into(),
                    child_ids: vec!["g2".into()],
                    ..Default::default()
                },
                Group {
                    id: "g2".into(),
                    name: "child".into(),
                    work_group_id: "w1".into(),
                    ..Default::default()
                },
            ],
            hosts: vec![
                Host {
                    id: "h1".into(),
                    fqdn: "a.example.com".into(),
                    group_id: "g1".into(),
                    datacenter_id: "d1".into(),
                    ..Default::default()
                },
                Host {
                    id: "h2".into(),
                    fqdn: "b.example.com".into(),
                    group_id: "g2".into(),
                    datacenter_id: "d2".into(),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_build_indexes_by_name_and_fqdn() {
        let store = Store::build(&sample_data());
        assert!(store.host_by_fqdn("a.example.com").is_some());
        assert!(store.group_by_name("parent").is_some());
        assert!(store.workgroup_by_name("wg1").is_some());
        assert!(store.host_by_fqdn("missing").is_none());
    }

    #[test]
    fn test_all_hosts_include_transitive_children() {
        let store = Store::build(&sample_data());
        let fqdns: Vec<&str> = store
            .all_hosts_of_group("g1")
            .iter()
            .map(|h| h.fqdn.as_str())
            .collect();
        // child hosts first, own hosts last
        assert_eq!(fqdns, vec!["b.example.com", "a.example.com"]);
    }

    #[test]
    fn test_group_cycle_treated_as_tree() {
        let mut data = sample_data();
        data.groups[1].child_ids = vec!["g1".into()];
        let store = Store::build(&data);
        let children = store.child_groups("g1");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "g2");
        // traversal terminates with both groups' hosts exactly once
        assert_eq!(store.all_hosts_of_group("g1").len(), 2);
    }

    #[test]
    fn test_workgroup_hosts_union_own_groups_only() {
        let store = Store::build(&sample_data());
        let fqdns: Vec<&str> = store
            .hosts_of_workgroup("w1")
            .iter()
            .map(|h| h.fqdn.as_str())
            .collect();
        assert_eq!(fqdns, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_datacenter_resolution() {
        let store = Store::build(&sample_data());
        let host = store.host_by_fqdn("b.example.com").unwrap();
        assert_eq!(store.datacenter_name_of(host), Some("dc2"));
        let host = store.host_by_fqdn("a.example.com").unwrap();
        assert_eq!(store.datacenter_name_of(host), Some("dc1"));
    }

    #[test]
    fn test_orphan_host_is_indexed_but_unattached() {
        let mut data = sample_data();
        data.hosts.push(Host {
            id: "h3".into(),
            fqdn: "orphan.example.com".into(),
            group_id: "missing".into(),
            ..Default::default()
        });
        let store = Store::build(&data);
        assert!(store.host_by_fqdn("orphan.example.com").is_some());
        assert_eq!(store.hosts_of_workgroup("w1").len(), 2);
    }

    #[test]
    fn test_complete_suffixes() {
        let names = ["alpha", "alps", "beta"];
        let res = complete_suffixes(names.iter().copied(), "al");
        assert_eq!(res, vec!["pha".to_string(), "ps".to_string()]);
        let res = complete_suffixes(names.iter().copied(), "");
        assert_eq!(res.len(), 3);
    }

    #[test]
    fn test_fqdns_matching_sorted() {
        let store = Store::build(&sample_data());
        let re = regex::Regex::new("example").unwrap();
        assert_eq!(
            store.fqdns_matching(&re),
            vec!["a.example.com".to_string(), "b.example.com".to_string()]
        );
    }
}
