//! Serial mode: one host at a time on a real terminal.

use std::process::Stdio;
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::Duration;

use crate::remote::command::{scp_argv, CHILD_ENV};
use crate::remote::{run_tty_session, ERR_COPY_FAILED};
use crate::term;

use super::{stage_script, ExecResult, Executer};

impl Executer {
    /// Run the command host by host on a PTY-attached ssh session,
    /// sleeping `delay` seconds between hosts. An empty command opens an
    /// interactive shell instead. SIGINT during the sleep skips the rest
    /// of the list.
    pub async fn serial(&mut self, hosts: &[String], cmd: &str, delay: u64) -> ExecResult {
        let mut result = ExecResult::default();
        if hosts.is_empty() {
            return result;
        }

        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(stream) => stream,
            Err(err) => {
                term::error(&format!("Error trapping SIGINT: {err}\n"));
                return result;
            }
        };

        let staged = if cmd.is_empty() {
            None
        } else {
            match stage_script(cmd, &self.remote_tmpdir) {
                Ok(staged) => Some(staged),
                Err(err) => {
                    term::error(&format!("Error creating tempfile: {err}\n"));
                    return result;
                }
            }
        };

        for (i, host) in hosts.iter().enumerate() {
            // no delay after the last host
            let delay = if i == hosts.len() - 1 { 0 } else { delay };

            let banner = format!(
                "{} {} {}",
                term::hr(7),
                host,
                term::hr(36usize.saturating_sub(host.len()))
            );
            println!("{}", term::blue(&banner));

            let mut remote_cmd: Option<String> = None;
            if let Some((script, remote_prefix)) = &staged {
                let remote = format!("{remote_prefix}.{host}.sh");
                let local = script.path().to_string_lossy().into_owned();
                if let Err(err) = self.scp_to(host, &local, &remote).await {
                    term::error(&format!("Error copying tempfile: {err}\n"));
                    result.codes.insert(host.clone(), ERR_COPY_FAILED);
                    result.error.push(host.clone());
                    continue;
                }
                remote_cmd = Some(remote);
            }

            let code = run_tty_session(
                &self.settings,
                host,
                &self.user,
                self.raise,
                self.password.as_ref(),
                remote_cmd.as_deref(),
            )
            .await;
            result.record(host, code);

            if delay > 0 {
                tokio::select! {
                    _ = sigint.recv() => break,
                    _ = tokio::time::sleep(Duration::from_secs(delay)) => {}
                }
            }
        }

        result
    }

    /// One synchronous scp, output discarded.
    async fn scp_to(&self, host: &str, local: &str, remote: &str) -> anyhow::Result<()> {
        let argv = {
            let settings = self.settings.read().unwrap();
            scp_argv(&settings, host, &self.user, local, remote)
        };
        let mut command = Command::new("scp");
        command
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in CHILD_ENV {
            command.env(key, value);
        }
        let status = command.status().await?;
        if !status.success() {
            anyhow::bail!("scp exited with {status}");
        }
        Ok(())
    }
}
