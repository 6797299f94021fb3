//! Local-file inventory backends.
//!
//! Two flavors share one implementation: an INI file where sections are
//! groups and keys are host FQDNs, and a JSON object mapping group names
//! to host arrays. Only Host, HostRegexp and Group tokens resolve here;
//! workgroup and datacenter completions are empty.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::expr::{parse_expression, Token, TokenKind};

use super::resolver::maybe_add_host;
use super::store::complete_suffixes;
use super::InventoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFormat {
    Ini,
    Json,
}

pub struct LocalFile {
    format: LocalFormat,
    path: PathBuf,
    data: BTreeMap<String, Vec<String>>,
}

impl LocalFile {
    pub fn new(format: LocalFormat, path: PathBuf) -> Self {
        Self {
            format,
            path,
            data: BTreeMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<(), InventoryError> {
        let content = std::fs::read_to_string(&self.path)?;
        self.data = match self.format {
            LocalFormat::Ini => parse_ini_groups(&content),
            LocalFormat::Json => serde_json::from_str(&content)?,
        };
        Ok(())
    }

    pub fn reload(&mut self) -> Result<(), InventoryError> {
        self.load()
    }

    pub fn host_list(&self, expr: &str) -> Result<Vec<String>, InventoryError> {
        let tokens = parse_expression(expr)?;
        let mut hostlist = Vec::new();
        for token in &tokens {
            self.resolve_token(token, &mut hostlist);
        }
        Ok(hostlist)
    }

    fn resolve_token(&self, token: &Token, hostlist: &mut Vec<String>) {
        match token.kind {
            TokenKind::HostRegexp => {
                if let Some(re) = &token.regexp_filter {
                    for host in self.matching_hosts(re) {
                        maybe_add_host(hostlist, host, token.exclude);
                    }
                }
            }
            TokenKind::Host => {
                // a bare token naming a group expands to that group
                match self.data.get(&token.value) {
                    Some(hosts) if !hosts.is_empty() => {
                        for host in hosts {
                            maybe_add_host(hostlist, host.clone(), token.exclude);
                        }
                    }
                    _ => maybe_add_host(hostlist, token.value.clone(), token.exclude),
                }
            }
            TokenKind::Group => {
                if let Some(hosts) = self.data.get(&token.value) {
                    for host in hosts {
                        maybe_add_host(hostlist, host.clone(), token.exclude);
                    }
                }
            }
            TokenKind::WorkGroup => {}
        }
    }

    fn matching_hosts(&self, pattern: &regex::Regex) -> Vec<String> {
        let mut res: Vec<String> = self
            .data
            .values()
            .flatten()
            .filter(|host| pattern.is_match(host))
            .cloned()
            .collect();
        res.sort();
        res
    }

    pub fn complete_host(&self, prefix: &str) -> Vec<String> {
        let mut res: Vec<String> = self
            .data
            .values()
            .flatten()
            .filter_map(|host| host.strip_prefix(prefix))
            .map(String::from)
            .collect();
        res.sort();
        res.dedup();
        res
    }

    pub fn complete_group(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.strip_prefix('%').unwrap_or(prefix);
        complete_suffixes(self.data.keys().map(String::as_str), prefix)
    }
}

/// Sections are group names, keys are bare host lines. Anything after
/// `=` or whitespace on a host line is ignored, as are comments and
/// lines before the first section.
fn parse_ini_groups(content: &str) -> BTreeMap<String, Vec<String>> {
    let mut data = BTreeMap::new();
    let mut section: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim().to_string();
            data.entry(name.clone()).or_insert_with(Vec::new);
            section = Some(name);
            continue;
        }
        let Some(group) = &section else { continue };
        let host = line
            .split(['=', ' ', '\t'])
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if !host.is_empty() {
            data.entry(group.clone()).or_insert_with(Vec::new).push(host);
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    const INI: &str = "\
# sample inventory
[web]
web1.example.com
web2.example.com

[db]
db1.example.com
";

    fn ini_backend() -> LocalFile {
        let mut f = LocalFile::new(LocalFormat::Ini, PathBuf::new());
        f.data = parse_ini_groups(INI);
        f
    }

    #[test]
    fn test_ini_sections_become_groups() {
        let data = parse_ini_groups(INI);
        assert_eq!(
            data.get("web").unwrap(),
            &vec!["web1.example.com".to_string(), "web2.example.com".to_string()]
        );
        assert_eq!(data.get("db").unwrap().len(), 1);
    }

    #[test]
    fn test_group_token() {
        let f = ini_backend();
        assert_eq!(
            f.host_list("%web").unwrap(),
            vec!["web1.example.com", "web2.example.com"]
        );
    }

    #[test]
    fn test_bare_group_name_expands() {
        let f = ini_backend();
        assert_eq!(
            f.host_list("db").unwrap(),
            vec!["db1.example.com"]
        );
    }

    #[test]
    fn test_unknown_host_admitted_verbatim() {
        let f = ini_backend();
        assert_eq!(f.host_list("other.host").unwrap(), vec!["other.host"]);
    }

    #[test]
    fn test_exclusion() {
        let f = ini_backend();
        assert_eq!(
            f.host_list("%web,-web2.example.com").unwrap(),
            vec!["web1.example.com"]
        );
    }

    #[test]
    fn test_host_regexp() {
        let f = ini_backend();
        assert_eq!(
            f.host_list("/^db/").unwrap(),
            vec!["db1.example.com"]
        );
    }

    #[test]
    fn test_workgroup_tokens_resolve_to_nothing() {
        let f = ini_backend();
        assert!(f.host_list("*anything").unwrap().is_empty());
    }

    #[test]
    fn test_completions() {
        let f = ini_backend();
        assert_eq!(f.complete_group("%w"), vec!["eb"]);
        assert_eq!(f.complete_host("db1."), vec!["example.com"]);
    }

    #[test]
    fn test_json_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.json");
        std::fs::write(&path, r#"{"web": ["w1", "w2"], "db": ["d1"]}"#).unwrap();
        let mut f = LocalFile::new(LocalFormat::Json, path);
        f.load().unwrap();
        assert_eq!(f.host_list("%web").unwrap(), vec!["w1", "w2"]);
        assert_eq!(f.host_list("%db,%web").unwrap(), vec!["d1", "w1", "w2"]);
    }

    #[test]
    fn test_ini_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.ini");
        std::fs::write(&path, INI).unwrap();
        let mut f = LocalFile::new(LocalFormat::Ini, path);
        f.load().unwrap();
        assert_eq!(f.host_list("%db").unwrap(), vec!["db1.example.com"]);
    }
}
