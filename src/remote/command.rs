//! Building ssh/scp argument vectors.
//!
//! The option set and the per-raise interpreter prefixes are runtime
//! state shared between the CLI (which mutates them) and the workers
//! (which snapshot them per task).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::task::RaiseType;

/// Environment pinned on every child to stabilize prompt wording.
pub const CHILD_ENV: &[(&str, &str)] = &[("LC_ALL", "en_US.UTF-8"), ("LANG", "en_US.UTF-8")];

/// Mutable ssh/scp invocation settings.
#[derive(Debug, Clone)]
pub struct SshSettings {
    options: BTreeMap<String, String>,
    interpreter: Vec<String>,
    sudo_interpreter: Vec<String>,
    su_interpreter: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        let mut options = BTreeMap::new();
        options.insert("PasswordAuthentication".to_string(), "no".to_string());
        options.insert("PubkeyAuthentication".to_string(), "yes".to_string());
        options.insert("StrictHostKeyChecking".to_string(), "no".to_string());
        Self {
            options,
            interpreter: vec!["bash".to_string()],
            sudo_interpreter: vec!["sudo".to_string(), "bash".to_string()],
            su_interpreter: vec!["su".to_string(), "-".to_string()],
        }
    }
}

impl SshSettings {
    pub fn set_connect_timeout(&mut self, seconds: u64) {
        self.options
            .insert("ConnectTimeout".to_string(), seconds.to_string());
    }

    /// Set the argv prefix used for the given raise type. The string is
    /// split on spaces, mirroring the config file format.
    pub fn set_interpreter(&mut self, raise: RaiseType, interpreter: &str) {
        let argv: Vec<String> = interpreter
            .split(' ')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        match raise {
            RaiseType::None => self.interpreter = argv,
            RaiseType::Sudo => self.sudo_interpreter = argv,
            RaiseType::Su => self.su_interpreter = argv,
        }
    }

    pub fn interpreter_for(&self, raise: RaiseType) -> &[String] {
        match raise {
            RaiseType::None => &self.interpreter,
            RaiseType::Sudo => &self.sudo_interpreter,
            RaiseType::Su => &self.su_interpreter,
        }
    }

    /// `-o Key=Value` pairs in deterministic order.
    pub fn option_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.options.len() * 2);
        for (key, value) in &self.options {
            args.push("-o".to_string());
            args.push(format!("{key}={value}"));
        }
        args
    }
}

/// Shared handle: the CLI writes, workers read.
pub type SharedSettings = Arc<RwLock<SshSettings>>;

pub fn shared_settings(settings: SshSettings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

/// Argv for the pooled (non-interactive) ssh command:
/// `-tt -l <user> <opts> <host> <interpreter...> [-c <cmd>]`.
pub fn ssh_argv(
    settings: &SshSettings,
    host: &str,
    user: &str,
    raise: RaiseType,
    cmd: Option<&str>,
) -> Vec<String> {
    let mut argv = vec!["-tt".to_string(), "-l".to_string(), user.to_string()];
    argv.extend(settings.option_args());
    argv.push(host.to_string());
    argv.extend(settings.interpreter_for(raise).iter().cloned());
    if let Some(cmd) = cmd {
        argv.push("-c".to_string());
        argv.push(cmd.to_string());
    }
    argv
}

/// Argv for scp: `<opts> <local> <user>@<host>:<remote>`.
pub fn scp_argv(
    settings: &SshSettings,
    host: &str,
    user: &str,
    local: &str,
    remote: &str,
) -> Vec<String> {
    let mut argv = settings.option_args();
    argv.push(local.to_string());
    argv.push(format!("{user}@{host}:{remote}"));
    argv
}

/// Argv for the interactive (PTY-attached) ssh command. Without a
/// command the raise prefix opens a shell; with one it wraps the
/// command.
pub fn tty_argv(
    settings: &SshSettings,
    host: &str,
    user: &str,
    raise: RaiseType,
    cmd: Option<&str>,
) -> Vec<String> {
    let mut argv = vec!["-t".to_string(), "-l".to_string(), user.to_string()];
    argv.extend(settings.option_args());
    argv.push(host.to_string());
    match cmd {
        None => match raise {
            RaiseType::Su => argv.extend(["su".to_string(), "-".to_string()]),
            RaiseType::Sudo => argv.extend(["sudo".to_string(), "bash".to_string()]),
            RaiseType::None => {}
        },
        Some(cmd) => {
            match raise {
                RaiseType::Su => argv.extend(["su".to_string(), "-".to_string(), "-c".to_string()]),
                RaiseType::Sudo => argv.push("sudo".to_string()),
                RaiseType::None => {}
            }
            argv.push(cmd.to_string());
        }
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_present() {
        let settings = SshSettings::default();
        let args = settings.option_args().join(" ");
        assert!(args.contains("PasswordAuthentication=no"));
        assert!(args.contains("PubkeyAuthentication=yes"));
        assert!(args.contains("StrictHostKeyChecking=no"));
    }

    #[test]
    fn test_connect_timeout_option() {
        let mut settings = SshSettings::default();
        settings.set_connect_timeout(5);
        assert!(settings.option_args().join(" ").contains("ConnectTimeout=5"));
    }

    #[test]
    fn test_ssh_argv_per_raise() {
        let settings = SshSettings::default();

        let argv = ssh_argv(&settings, "h1", "root", RaiseType::None, Some("uptime"));
        assert_eq!(argv[0], "-tt");
        assert_eq!(argv[1..3], ["-l".to_string(), "root".to_string()]);
        let tail: Vec<&str> = argv.iter().rev().take(4).map(String::as_str).collect();
        assert_eq!(tail, vec!["uptime", "-c", "bash", "h1"]);

        let argv = ssh_argv(&settings, "h1", "root", RaiseType::Sudo, Some("uptime"));
        let tail: Vec<&str> = argv.iter().rev().take(5).map(String::as_str).collect();
        assert_eq!(tail, vec!["uptime", "-c", "bash", "sudo", "h1"]);

        let argv = ssh_argv(&settings, "h1", "root", RaiseType::Su, Some("uptime"));
        let tail: Vec<&str> = argv.iter().rev().take(5).map(String::as_str).collect();
        assert_eq!(tail, vec!["uptime", "-c", "-", "su", "h1"]);
    }

    #[test]
    fn test_custom_interpreter() {
        let mut settings = SshSettings::default();
        settings.set_interpreter(RaiseType::None, "zsh -i");
        let argv = ssh_argv(&settings, "h1", "root", RaiseType::None, Some("ls"));
        let tail: Vec<&str> = argv.iter().rev().take(4).map(String::as_str).collect();
        assert_eq!(tail, vec!["ls", "-c", "-i", "zsh"]);
    }

    #[test]
    fn test_scp_argv_remote_expression() {
        let settings = SshSettings::default();
        let argv = scp_argv(&settings, "h1", "deploy", "/tmp/f", "/tmp/g");
        assert_eq!(argv.last().unwrap(), "deploy@h1:/tmp/g");
        assert_eq!(argv[argv.len() - 2], "/tmp/f");
    }

    #[test]
    fn test_tty_argv_shapes() {
        let settings = SshSettings::default();

        let argv = tty_argv(&settings, "h1", "root", RaiseType::None, None);
        assert_eq!(argv[0], "-t");
        assert_eq!(argv.last().unwrap(), "h1");

        let argv = tty_argv(&settings, "h1", "root", RaiseType::Sudo, None);
        let tail: Vec<&str> = argv.iter().rev().take(2).map(String::as_str).collect();
        assert_eq!(tail, vec!["bash", "sudo"]);

        let argv = tty_argv(&settings, "h1", "root", RaiseType::Su, Some("/tmp/x.sh"));
        let tail: Vec<&str> = argv.iter().rev().take(4).map(String::as_str).collect();
        assert_eq!(tail, vec!["/tmp/x.sh", "-c", "-", "su"]);
    }
}
