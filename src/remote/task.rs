//! Task and event types shared by the pool, the workers and the modes.

use std::fmt;
use std::sync::Arc;
use zeroize::ZeroizeOnDrop;

/// Sentinel exit codes, chosen above any byte-sized child status so they
/// can never collide with a real exit code:
/// - `ERR_MACOS_EXIT` (32500): the platform hid the child's exit status
/// - `ERR_FORCE_STOP` (32501): the task was killed by a force stop
/// - `ERR_COPY_FAILED` (32502): the copy phase failed, exec skipped
/// - `ERR_TERMINAL_ERROR` (32503): PTY allocation or raw mode failed
pub const ERR_MACOS_EXIT: i32 = 32500;
pub const ERR_FORCE_STOP: i32 = 32501;
pub const ERR_COPY_FAILED: i32 = 32502;
pub const ERR_TERMINAL_ERROR: i32 = 32503;

/// Privilege elevation mode for the remote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RaiseType {
    #[default]
    None,
    Sudo,
    Su,
}

impl RaiseType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(RaiseType::None),
            "sudo" => Some(RaiseType::Sudo),
            "su" => Some(RaiseType::Su),
            _ => None,
        }
    }
}

impl fmt::Display for RaiseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaiseType::None => write!(f, "none"),
            RaiseType::Sudo => write!(f, "sudo"),
            RaiseType::Su => write!(f, "su"),
        }
    }
}

/// A raise password with automatic memory clearing.
///
/// Cloning shares the underlying allocation; the password is zeroized
/// when the last clone is dropped. Debug output never reveals it.
#[derive(Clone)]
pub struct RaisePassword {
    inner: Arc<RaisePasswordInner>,
}

#[derive(ZeroizeOnDrop)]
struct RaisePasswordInner {
    password: String,
}

impl RaisePassword {
    pub fn new(password: String) -> Self {
        Self {
            inner: Arc::new(RaisePasswordInner { password }),
        }
    }

    /// The password with a trailing newline, ready to write to the
    /// child's stdin. Use immediately, do not store.
    pub fn with_newline(&self) -> Vec<u8> {
        let mut bytes = self.inner.password.as_bytes().to_vec();
        bytes.push(b'\n');
        bytes
    }

    pub fn is_empty(&self) -> bool {
        self.inner.password.is_empty()
    }
}

impl fmt::Debug for RaisePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaisePassword")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One unit of work for a pool worker.
///
/// Copy-only, exec-only and copy-then-exec tasks are all expressed via
/// the optional fields: a task with both filenames copies first, a task
/// with a command executes after (or instead).
#[derive(Debug, Clone)]
pub struct Task {
    pub host: String,
    pub user: String,
    pub local_file: Option<String>,
    pub remote_file: Option<String>,
    pub cmd: Option<String>,
    pub raise: RaiseType,
    pub password: Option<RaisePassword>,
}

impl Task {
    pub fn exec(host: &str, user: &str, raise: RaiseType, password: Option<RaisePassword>, cmd: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            local_file: None,
            remote_file: None,
            cmd: Some(cmd.to_string()),
            raise,
            password,
        }
    }

    pub fn copy(host: &str, user: &str, local: &str, remote: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            local_file: Some(local.to_string()),
            remote_file: Some(remote.to_string()),
            cmd: None,
            raise: RaiseType::None,
            password: None,
        }
    }

    pub fn copy_and_exec(
        host: &str,
        user: &str,
        local: &str,
        remote: &str,
        raise: RaiseType,
        password: Option<RaisePassword>,
        cmd: &str,
    ) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            local_file: Some(local.to_string()),
            remote_file: Some(remote.to_string()),
            cmd: Some(cmd.to_string()),
            raise,
            password,
        }
    }

    pub fn has_copy_phase(&self) -> bool {
        self.local_file.is_some() && self.remote_file.is_some()
    }
}

/// Kind of a worker output event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Stdout,
    Stderr,
    Debug,
    CopyFinished,
    ExecFinished,
}

/// A chunk of task output or a phase-completion marker.
///
/// `status` is meaningful only for `CopyFinished` and `ExecFinished`.
#[derive(Debug, Clone)]
pub struct Output {
    pub host: String,
    pub kind: OutputKind,
    pub data: Vec<u8>,
    pub status: i32,
}

impl Output {
    pub fn data(host: &str, kind: OutputKind, data: Vec<u8>) -> Self {
        Self {
            host: host.to_string(),
            kind,
            data,
            status: -1,
        }
    }

    pub fn finished(host: &str, kind: OutputKind, status: i32) -> Self {
        Self {
            host: host.to_string(),
            kind,
            data: Vec::new(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_type_parse() {
        assert_eq!(RaiseType::parse("sudo"), Some(RaiseType::Sudo));
        assert_eq!(RaiseType::parse("su"), Some(RaiseType::Su));
        assert_eq!(RaiseType::parse("none"), Some(RaiseType::None));
        assert_eq!(RaiseType::parse("root"), None);
    }

    #[test]
    fn test_password_debug_redaction() {
        let pw = RaisePassword::new("secret".to_string());
        let debug = format!("{pw:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_password_with_newline() {
        let pw = RaisePassword::new("p".to_string());
        assert_eq!(pw.with_newline(), b"p\n");
    }

    #[test]
    fn test_task_phases() {
        let t = Task::exec("h", "u", RaiseType::None, None, "uptime");
        assert!(!t.has_copy_phase());
        assert!(t.cmd.is_some());

        let t = Task::copy("h", "u", "/tmp/a", "/tmp/b");
        assert!(t.has_copy_phase());
        assert!(t.cmd.is_none());
    }
}
