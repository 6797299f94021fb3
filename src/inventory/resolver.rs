//! Resolving parsed tokens against the inventory store.
//!
//! Tokens are processed left to right; an excluding token removes the
//! first occurrence of each of its hosts from the accumulated list.
//! Duplicates admitted by non-excluding tokens are preserved.

use crate::expr::{expand_pattern, Token, TokenKind};

use super::schema::Host;
use super::store::Store;

/// Produce an ordered host list from a token sequence.
pub fn resolve(tokens: &[Token], store: &Store) -> Vec<String> {
    let mut hostlist: Vec<String> = Vec::new();

    for token in tokens {
        match token.kind {
            TokenKind::Host => {
                for host in expand_pattern(&token.value) {
                    if !token.tags_filter.is_empty() {
                        let Some(inv_host) = store.host_by_fqdn(&host) else {
                            continue;
                        };
                        if !has_all_tags(inv_host, &token.tags_filter) {
                            continue;
                        }
                    }
                    if let Some(re) = &token.regexp_filter {
                        if !re.is_match(&host) {
                            continue;
                        }
                    }
                    maybe_add_host(&mut hostlist, host, token.exclude);
                }
            }

            TokenKind::HostRegexp => {
                if let Some(re) = &token.regexp_filter {
                    for fqdn in store.fqdns_matching(re) {
                        maybe_add_host(&mut hostlist, fqdn, token.exclude);
                    }
                }
            }

            TokenKind::Group => {
                if let Some(group) = store.group_by_name(&token.value) {
                    for host in store.all_hosts_of_group(&group.id) {
                        if !host_passes_filters(host, token, store) {
                            continue;
                        }
                        maybe_add_host(&mut hostlist, host.fqdn.clone(), token.exclude);
                    }
                }
            }

            TokenKind::WorkGroup => {
                let hosts: Vec<&Host> = if token.value.is_empty() {
                    store.hosts_of_all_workgroups()
                } else if let Some(wg) = store.workgroup_by_name(&token.value) {
                    store.hosts_of_workgroup(&wg.id)
                } else {
                    Vec::new()
                };
                for host in hosts {
                    if !host_passes_filters(host, token, store) {
                        continue;
                    }
                    maybe_add_host(&mut hostlist, host.fqdn.clone(), token.exclude);
                }
            }
        }
    }

    hostlist
}

/// Datacenter (exact name), tag and regexp filter pipeline shared by
/// group and workgroup tokens.
fn host_passes_filters(host: &Host, token: &Token, store: &Store) -> bool {
    if let Some(dc_filter) = &token.datacenter_filter {
        match store.datacenter_name_of(host) {
            Some(name) if name == dc_filter => {}
            _ => return false,
        }
    }
    if !has_all_tags(host, &token.tags_filter) {
        return false;
    }
    if let Some(re) = &token.regexp_filter {
        if !re.is_match(&host.fqdn) {
            return false;
        }
    }
    true
}

fn has_all_tags(host: &Host, tags: &[String]) -> bool {
    tags.iter().all(|tag| host.tags.contains(tag))
}

/// Append the host, or remove its first occurrence when excluding.
pub fn maybe_add_host(hostlist: &mut Vec<String>, host: String, exclude: bool) {
    if exclude {
        if let Some(idx) = hostlist.iter().position(|h| h == &host) {
            hostlist.remove(idx);
        }
    } else {
        hostlist.push(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expression;
    use crate::inventory::schema::*;

    fn inventory() -> Store {
        // wg1 owns grpA (h1@dc1 prod, h2@dc2 prod, h3@dc1 dev)
        let data = InventoryData {
            datacenters: vec![
                Datacenter {
                    id: "d1".into(),
                    name: "dc1".into(),
                    ..Default::default()
                },
                Datacenter {
                    id: "d2".into(),
                    name: "dc2".into(),
                    ..Default::default()
                },
            ],
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
            hosts: vec![
                Host {
                    id: "h1".into(),
                    fqdn: "host1".into(),
                    group_id: "g1".into(),
                    datacenter_id: "d1".into(),
                    tags: vec!["prod".into()],
                    ..Default::default()
                },
                Host {
                    id: "h2".into(),
                    fqdn: "host2".into(),
                    group_id: "g1".into(),
                    datacenter_id: "d2".into(),
                    tags: vec!["prod".into()],
                    ..Default::default()
                },
                Host {
                    id: "h3".into(),
                    fqdn: "host3".into(),
                    group_id: "g1".into(),
                    datacenter_id: "d1".into(),
                    tags: vec!["dev".into()],
                    ..Default::default()
                },
            ],
        };
        Store::build(&data)
    }

    fn resolve_expr(expr: &str, store: &Store) -> Vec<String> {
        let tokens = parse_expression(expr).unwrap();
        resolve(&tokens, store)
    }

    #[test]
    fn test_group_with_exclusion() {
        let store = inventory();
        assert_eq!(resolve_expr("%grpA,-host3", &store), vec!["host1", "host2"]);
    }

    #[test]
    fn test_exclusion_before_admission_has_no_effect() {
        let store = inventory();
        assert_eq!(
            resolve_expr("-host3,%grpA", &store),
            vec!["host1", "host2", "host3"]
        );
    }

    #[test]
    fn test_workgroup_tag_and_datacenter_filters() {
        let store = inventory();
        assert_eq!(resolve_expr("*wg1#prod@dc1", &store), vec!["host1"]);
    }

    #[test]
    fn test_bare_star_unions_all_workgroups() {
        let store = inventory();
        assert_eq!(
            resolve_expr("*", &store),
            vec!["host1", "host2", "host3"]
        );
    }

    #[test]
    fn test_unknown_group_resolves_to_nothing() {
        let store = inventory();
        assert!(resolve_expr("%nosuch", &store).is_empty());
    }

    #[test]
    fn test_host_token_is_admitted_verbatim() {
        let store = inventory();
        assert_eq!(
            resolve_expr("unknown.example.com", &store),
            vec!["unknown.example.com"]
        );
    }

    #[test]
    fn test_brace_expansion_is_distributive() {
        let store = inventory();
        assert_eq!(resolve_expr("{a,b}.x", &store), vec!["a.x", "b.x"]);
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let store = inventory();
        assert_eq!(
            resolve_expr("host1,host1,%grpA", &store),
            vec!["host1", "host1", "host1", "host2", "host3"]
        );
    }

    #[test]
    fn test_exclusion_removes_first_occurrence_only() {
        let store = inventory();
        assert_eq!(
            resolve_expr("host1,host1,-host1", &store),
            vec!["host1"]
        );
    }

    #[test]
    fn test_host_regexp_only_yields_inventory_hosts() {
        let store = inventory();
        assert_eq!(
            resolve_expr("/host[12]/", &store),
            vec!["host1", "host2"]
        );
        assert!(resolve_expr("/nothing-matches/", &store).is_empty());
    }

    #[test]
    fn test_host_token_with_tags_requires_inventory_membership() {
        let store = inventory();
        // host3 is tagged dev, not prod
        assert!(resolve_expr("host3#prod", &store).is_empty());
        assert_eq!(resolve_expr("host3#dev", &store), vec!["host3"]);
        // unknown host with tag filter never resolves
        assert!(resolve_expr("ghost#prod", &store).is_empty());
    }

    #[test]
    fn test_group_regexp_filter_applies_to_fqdn() {
        let store = inventory();
        assert_eq!(resolve_expr("%grpA/3$/", &store), vec!["host3"]);
    }

    #[test]
    fn test_datacenter_filter_is_exact_match() {
        let store = inventory();
        assert_eq!(
            resolve_expr("%grpA@dc1", &store),
            vec!["host1", "host3"]
        );
        assert!(resolve_expr("%grpA@nosuch", &store).is_empty());
    }
}
