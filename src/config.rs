//! Configuration loading.
//!
//! xc reads an INI-like file (`~/.xc.conf` by default) with `[main]`,
//! `[executer]` and `[inventoree]` sections. A missing file is created
//! with defaults and re-read once; any other read failure is fatal.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_CONTENTS: &str = "\
[main]
user =
mode = parallel
history_file = ~/.xc_history
cache_dir = ~/.xc_cache
rc_file = ~/.xcrc
raise = none

[executer]
ssh_threads = 50
ssh_connect_timeout = 1
progress_bar = true
prepend_hostnames = true
remote_tmpdir = /tmp
delay = 0

[inventoree]
url = http://c.inventoree.ru
work_groups =
";

/// Pool size sanity bound, shared with the `threads` command.
pub const MAX_SSH_THREADS: usize = 1024;

#[derive(Debug, Clone)]
pub struct XcConfig {
    pub user: String,
    pub mode: String,
    pub raise: String,
    pub history_file: PathBuf,
    pub rc_file: PathBuf,
    pub log_file: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub cache_ttl_hours: u64,
    pub exit_confirm: bool,
    pub exec_confirm: bool,
    pub backend_type: String,
    pub local_file: PathBuf,
    pub debug: bool,

    pub ssh_threads: usize,
    pub ssh_connect_timeout: u64,
    pub delay: u64,
    pub progress_bar: bool,
    pub prepend_hostnames: bool,
    pub remote_tmpdir: String,
    pub interpreter: String,
    pub sudo_interpreter: String,
    pub su_interpreter: String,

    pub inventoree_url: String,
    pub work_groups: Vec<String>,
}

impl Default for XcConfig {
    fn default() -> Self {
        Self {
            user: std::env::var("USER").unwrap_or_default(),
            mode: "parallel".to_string(),
            raise: "none".to_string(),
            history_file: expand_path("~/.xc_history"),
            rc_file: expand_path("~/.xcrc"),
            log_file: None,
            cache_dir: expand_path("~/.xc_cache"),
            cache_ttl_hours: 24,
            exit_confirm: false,
            exec_confirm: false,
            backend_type: "conductor".to_string(),
            local_file: PathBuf::new(),
            debug: false,
            ssh_threads: 50,
            ssh_connect_timeout: 1,
            delay: 0,
            progress_bar: true,
            prepend_hostnames: true,
            remote_tmpdir: "/tmp".to_string(),
            interpreter: "bash".to_string(),
            sudo_interpreter: "sudo bash".to_string(),
            su_interpreter: "su -".to_string(),
            inventoree_url: "http://c.inventoree.ru".to_string(),
            work_groups: Vec::new(),
        }
    }
}

/// Default config file location: `~/.xc.conf`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".xc.conf")
}

/// Read the configuration, creating the default file when absent.
pub fn read_config(path: &Path) -> Result<XcConfig> {
    read_config_inner(path, false)
}

fn read_config_inner(path: &Path, second_pass: bool) -> Result<XcConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            if second_pass {
                return Err(err)
                    .with_context(|| format!("reading config {}", path.display()));
            }
            if err.kind() == std::io::ErrorKind::NotFound {
                std::fs::write(path, DEFAULT_CONFIG_CONTENTS)
                    .with_context(|| format!("creating default config {}", path.display()))?;
            }
            return read_config_inner(path, true);
        }
    };

    Ok(parse_config(&content))
}

/// Build an `XcConfig` from file contents, falling back to defaults for
/// missing or malformed values. Unknown keys are ignored.
pub fn parse_config(content: &str) -> XcConfig {
    let props = parse_properties(content);
    let mut cfg = XcConfig::default();

    if let Some(user) = get_nonempty(&props, "main.user") {
        cfg.user = user;
    }
    if let Some(mode) = get_nonempty(&props, "main.mode") {
        cfg.mode = mode;
    }
    if let Some(raise) = get_nonempty(&props, "main.raise") {
        cfg.raise = raise;
    }
    if let Some(hf) = get_nonempty(&props, "main.history_file") {
        cfg.history_file = expand_path(&hf);
    }
    if let Some(rc) = get_nonempty(&props, "main.rc_file") {
        cfg.rc_file = expand_path(&rc);
    }
    if let Some(lf) = get_nonempty(&props, "main.log_file") {
        cfg.log_file = Some(expand_path(&lf));
    }
    if let Some(cd) = get_nonempty(&props, "main.cache_dir") {
        cfg.cache_dir = expand_path(&cd);
    }
    if let Some(ttl) = get_parsed(&props, "main.cache_ttl") {
        cfg.cache_ttl_hours = ttl;
    }
    if let Some(v) = get_bool(&props, "main.exit_confirm") {
        cfg.exit_confirm = v;
    }
    if let Some(v) = get_bool(&props, "main.exec_confirm") {
        cfg.exec_confirm = v;
    }
    if let Some(v) = get_bool(&props, "main.debug") {
        cfg.debug = v;
    }
    if let Some(bt) = get_nonempty(&props, "main.backend_type") {
        cfg.backend_type = bt;
    }
    if let Some(lf) = get_nonempty(&props, "main.local_file") {
        cfg.local_file = expand_path(&lf);
    }

    if let Some(threads) = get_parsed(&props, "executer.ssh_threads") {
        cfg.ssh_threads = threads;
    }
    cfg.ssh_threads = cfg.ssh_threads.clamp(1, MAX_SSH_THREADS);
    if let Some(ct) = get_parsed(&props, "executer.ssh_connect_timeout") {
        cfg.ssh_connect_timeout = ct;
    }
    if let Some(delay) = get_parsed(&props, "executer.delay") {
        cfg.delay = delay;
    }
    if let Some(v) = get_bool(&props, "executer.progress_bar") {
        cfg.progress_bar = v;
    }
    if let Some(v) = get_bool(&props, "executer.prepend_hostnames") {
        cfg.prepend_hostnames = v;
    }
    if let Some(tmpdir) = get_nonempty(&props, "executer.remote_tmpdir") {
        cfg.remote_tmpdir = tmpdir;
    }
    if let Some(i) = get_nonempty(&props, "executer.interpreter") {
        cfg.interpreter = i;
    }
    if let Some(i) = get_nonempty(&props, "executer.interpreter_sudo") {
        cfg.sudo_interpreter = i;
    }
    if let Some(i) = get_nonempty(&props, "executer.interpreter_su") {
        cfg.su_interpreter = i;
    }

    if let Some(url) = get_nonempty(&props, "inventoree.url") {
        cfg.inventoree_url = url;
    }
    if let Some(wgs) = get_nonempty(&props, "inventoree.work_groups") {
        cfg.work_groups = wgs
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    cfg
}

/// Parse INI-like content into a flat `section.key -> value` map.
fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let mut section = String::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = line[1..line.len() - 1].trim().to_string();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() || section.is_empty() {
                continue;
            }
            props.insert(format!("{section}.{key}"), value.trim().to_string());
        }
    }

    props
}

fn get_nonempty(props: &HashMap<String, String>, key: &str) -> Option<String> {
    props.get(key).filter(|v| !v.is_empty()).cloned()
}

fn get_parsed<T: std::str::FromStr>(props: &HashMap<String, String>, key: &str) -> Option<T> {
    props.get(key).and_then(|v| v.parse().ok())
}

fn get_bool(props: &HashMap<String, String>, key: &str) -> Option<bool> {
    props.get(key).and_then(|v| match v.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    })
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_content() {
        let cfg = parse_config("");
        assert_eq!(cfg.mode, "parallel");
        assert_eq!(cfg.ssh_threads, 50);
        assert_eq!(cfg.ssh_connect_timeout, 1);
        assert_eq!(cfg.remote_tmpdir, "/tmp");
        assert_eq!(cfg.interpreter, "bash");
        assert_eq!(cfg.sudo_interpreter, "sudo bash");
        assert_eq!(cfg.su_interpreter, "su -");
        assert!(cfg.progress_bar);
        assert!(!cfg.exec_confirm);
    }

    #[test]
    fn test_default_contents_roundtrip() {
        let cfg = parse_config(DEFAULT_CONFIG_CONTENTS);
        assert_eq!(cfg.mode, "parallel");
        assert_eq!(cfg.raise, "none");
        assert_eq!(cfg.ssh_threads, 50);
        assert_eq!(cfg.delay, 0);
        assert!(cfg.work_groups.is_empty());
        assert_eq!(cfg.inventoree_url, "http://c.inventoree.ru");
    }

    #[test]
    fn test_sections_prefix_keys() {
        let cfg = parse_config(
            "[main]\nmode = collapse\nraise = sudo\n[executer]\nssh_threads = 8\ndelay = 3\n",
        );
        assert_eq!(cfg.mode, "collapse");
        assert_eq!(cfg.raise, "sudo");
        assert_eq!(cfg.ssh_threads, 8);
        assert_eq!(cfg.delay, 3);
    }

    #[test]
    fn test_thread_count_is_clamped() {
        let cfg = parse_config("[executer]\nssh_threads = 0\n");
        assert_eq!(cfg.ssh_threads, 1);
        let cfg = parse_config("[executer]\nssh_threads = 100000\n");
        assert_eq!(cfg.ssh_threads, MAX_SSH_THREADS);
    }

    #[test]
    fn test_work_groups_csv() {
        let cfg = parse_config("[inventoree]\nwork_groups = alpha, beta ,gamma\n");
        assert_eq!(cfg.work_groups, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let cfg = parse_config("[executer]\nping_count = 5\nssh_threads = 4\n");
        assert_eq!(cfg.ssh_threads, 4);
    }

    #[test]
    fn test_missing_file_created_and_reread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xc.conf");
        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.mode, "parallel");
        assert!(path.exists());
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let cfg = parse_config("# comment\n\n[main]\n; another\nmode = serial\n");
        assert_eq!(cfg.mode, "serial");
    }
}
