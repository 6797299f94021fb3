//! Execution session: the pool, the runtime knobs and the mode drivers.
//!
//! An [`Executer`] owns everything a running command needs: the worker
//! pool, the current user/raise/password, rendering toggles and the
//! output-mirror file. The CLI mutates it between commands; a mode
//! function borrows it for the duration of one execution.

mod collapse;
mod distribute;
mod parallel;
mod serial;

use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::remote::{Pool, RaisePassword, RaiseType, SharedSettings};
use crate::term;

/// Result of one execution across a host list.
#[derive(Debug, Default)]
pub struct ExecResult {
    /// Per-host exit code.
    pub codes: HashMap<String, i32>,
    /// Hosts that finished with code 0, in completion order.
    pub success: Vec<String>,
    /// Hosts that finished with a nonzero code, in completion order.
    pub error: Vec<String>,
    /// Tasks removed from the queue by a force stop before any worker
    /// picked them up.
    pub stopped: usize,
    /// Collapse mode: identical accumulated stdout -> hosts.
    pub output_map: BTreeMap<String, Vec<String>>,
}

impl ExecResult {
    pub(crate) fn record(&mut self, host: &str, code: i32) {
        self.codes.insert(host.to_string(), code);
        if code == 0 {
            self.success.push(host.to_string());
        } else {
            self.error.push(host.to_string());
        }
    }

    /// Print the summary banner.
    pub fn print(&self) {
        let msg = format!(
            " Hosts processed: {}, success: {}, error: {}    ",
            self.success.len() + self.error.len(),
            self.success.len(),
            self.error.len()
        );
        let h = term::hr(msg.len());
        println!("{}", term::green(&h));
        println!("{}", term::green(&msg));
        println!("{}", term::green(&h));
    }

    /// Print collapse-style grouped outputs.
    pub fn print_output_map(&self) {
        for (output, hosts) in &self.output_map {
            let msg = format!(" {}    ", hosts.join(","));
            let table_width = (msg.len() + 2).min(term::width());
            println!("{}", term::blue(&term::hr(table_width)));
            println!("{}", term::blue(&msg));
            println!("{}", term::blue(&term::hr(table_width)));
            println!("{output}");
        }
    }
}

/// Group accumulated per-host outputs by identical content. Hosts within
/// a group are sorted so the grouping is deterministic.
pub fn group_outputs(outputs: &HashMap<String, Vec<u8>>) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (host, data) in outputs {
        let key = String::from_utf8_lossy(data).into_owned();
        map.entry(key).or_default().push(host.clone());
    }
    for hosts in map.values_mut() {
        hosts.sort();
    }
    map
}

/// Write the self-deleting wrapper script for a command and derive the
/// remote path prefix it will be staged under. The per-host remote name
/// is `<prefix>.<host>.sh` so aliases pointing at one server don't race
/// on the same file.
pub fn stage_script(cmd: &str, remote_tmpdir: &str) -> std::io::Result<(NamedTempFile, String)> {
    let mut file = tempfile::Builder::new().prefix("xc.").tempfile()?;
    file.write_all(b"#!/bin/bash\n\n")?;
    file.write_all(b"nohup bash -c \"sleep 1; rm -f $0\" >/dev/null 2>&1 </dev/null &\n")?;
    file.write_all(cmd.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755))?;
    }

    let basename = file
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let remote_prefix = Path::new(remote_tmpdir)
        .join(basename)
        .to_string_lossy()
        .into_owned();

    Ok((file, remote_prefix))
}

/// Session state threaded through every command.
pub struct Executer {
    pub(crate) pool: Pool,
    pub(crate) settings: SharedSettings,
    pub(crate) user: String,
    pub(crate) raise: RaiseType,
    pub(crate) password: Option<RaisePassword>,
    pub(crate) remote_tmpdir: String,
    pub(crate) debug: bool,
    pub(crate) progress_bar: bool,
    pub(crate) prepend_hostnames: bool,
    pub(crate) output_file: Option<std::fs::File>,
}

impl Executer {
    /// Create the session and its pool. Must be called within a tokio
    /// runtime.
    pub fn new(threads: usize, user: &str, settings: SharedSettings) -> Self {
        Self {
            pool: Pool::new(threads, settings.clone()),
            settings,
            user: user.to_string(),
            raise: RaiseType::None,
            password: None,
            remote_tmpdir: "/tmp".to_string(),
            debug: false,
            progress_bar: true,
            prepend_hostnames: true,
            output_file: None,
        }
    }

    pub fn set_user(&mut self, user: &str) {
        self.user = user.to_string();
    }

    pub fn set_raise(&mut self, raise: RaiseType) {
        self.raise = raise;
    }

    pub fn set_password(&mut self, password: Option<RaisePassword>) {
        self.password = password;
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn set_progress_bar(&mut self, progress_bar: bool) {
        self.progress_bar = progress_bar;
    }

    pub fn set_prepend_hostnames(&mut self, prepend: bool) {
        self.prepend_hostnames = prepend;
    }

    pub fn set_remote_tmpdir(&mut self, tmpdir: &str) {
        self.remote_tmpdir = tmpdir.to_string();
    }

    pub fn set_output_file(&mut self, file: Option<std::fs::File>) {
        self.output_file = file;
    }

    /// Replace the pool with one of the given size. In-flight work is
    /// force-stopped.
    pub fn set_threads(&mut self, threads: usize) {
        self.pool = Pool::new(threads, self.settings.clone());
    }

    pub fn threads(&self) -> usize {
        self.pool.size()
    }

    /// Mirror a message into the output file, timestamp-prefixed.
    pub fn write_output(&mut self, message: &str) {
        mirror(&mut self.output_file, message);
    }
}

/// Append a timestamped copy of `message` to the mirror file, if set.
pub(crate) fn mirror(output_file: &mut Option<std::fs::File>, message: &str) {
    let Some(file) = output_file else { return };
    let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let _ = file.write_all(format!("[{ts}] {message}").as_bytes());
}

pub(crate) fn mirror_host(output_file: &mut Option<std::fs::File>, host: &str, data: &[u8]) {
    if output_file.is_none() {
        return;
    }
    let message = format!("{}: {}", host, String::from_utf8_lossy(data));
    mirror(output_file, &message);
}

/// Print a line to the terminal without tearing an active progress bar.
pub(crate) fn emit_line(bar: Option<&ProgressBar>, line: &str) {
    match bar {
        Some(bar) => bar.println(line),
        None => println!("{line}"),
    }
}

/// Newline-terminate a chunk for line-oriented rendering.
pub(crate) fn ensure_newline(mut data: Vec<u8>) -> Vec<u8> {
    if !data.ends_with(b"\n") {
        data.push(b'\n');
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_classifies_by_code() {
        let mut result = ExecResult::default();
        result.record("h1", 0);
        result.record("h2", 3);
        result.record("h3", 0);
        assert_eq!(result.success, vec!["h1", "h3"]);
        assert_eq!(result.error, vec!["h2"]);
        assert_eq!(result.codes["h2"], 3);
    }

    #[test]
    fn test_group_outputs_by_identical_content() {
        let mut outputs = HashMap::new();
        outputs.insert("h2".to_string(), b"ok\n".to_vec());
        outputs.insert("h1".to_string(), b"ok\n".to_vec());
        outputs.insert("h3".to_string(), b"fail\n".to_vec());

        let map = group_outputs(&outputs);
        assert_eq!(map.len(), 2);
        assert_eq!(map["ok\n"], vec!["h1", "h2"]);
        assert_eq!(map["fail\n"], vec!["h3"]);
    }

    #[test]
    fn test_stage_script_contents_and_mode() {
        let (file, remote_prefix) = stage_script("uptime", "/tmp").unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("#!/bin/bash\n"));
        assert!(content.contains("nohup bash -c \"sleep 1; rm -f $0\" >/dev/null 2>&1 </dev/null &"));
        assert!(content.ends_with("uptime\n"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(file.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        let basename = file.path().file_name().unwrap().to_string_lossy();
        assert_eq!(remote_prefix, format!("/tmp/{basename}"));
        assert!(basename.starts_with("xc."));
    }

    #[test]
    fn test_stage_script_is_removed_on_drop() {
        let (file, _) = stage_script("true", "/tmp").unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_ensure_newline() {
        assert_eq!(ensure_newline(b"x".to_vec()), b"x\n");
        assert_eq!(ensure_newline(b"x\n".to_vec()), b"x\n");
    }
}
