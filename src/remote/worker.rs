//! A single pool worker: drives one ssh/scp child at a time.
//!
//! Every task has an optional copy phase and an optional exec phase; a
//! failed copy skips the exec. The exec driver multiplexes the child's
//! pipes, runs the password-prompt micro-state machine over the first few
//! stdout chunks, and suppresses ssh's connection-noise on stderr.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

use super::command::{scp_argv, ssh_argv, SharedSettings, CHILD_ENV};
use super::patterns::{should_drop_chunk, ECHO_ONLY, PASSWD_PROMPT, WRONG_PASSWORD};
use super::pool::TaskQueue;
use super::task::{
    Output, OutputKind, RaiseType, Task, ERR_COPY_FAILED, ERR_FORCE_STOP, ERR_MACOS_EXIT,
};

const BUFFER_SIZE: usize = 4096;

/// Prompt detection only runs over the first few stdout reads.
const PROMPT_CHUNK_WINDOW: usize = 5;

pub(crate) struct Worker {
    id: usize,
    queue: Arc<TaskQueue>,
    data: mpsc::Sender<Output>,
    stop: mpsc::Receiver<()>,
    busy: Arc<AtomicBool>,
    settings: SharedSettings,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        queue: Arc<TaskQueue>,
        data: mpsc::Sender<Output>,
        stop: mpsc::Receiver<()>,
        busy: Arc<AtomicBool>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            id,
            queue,
            data,
            stop,
            busy,
            settings,
        }
    }

    pub(crate) async fn run(mut self) {
        let queue = Arc::clone(&self.queue);
        while let Some(task) = queue.pop().await {
            // a stop delivered between tasks targets nobody
            while self.stop.try_recv().is_ok() {}
            self.busy.store(true, Ordering::SeqCst);

            if task.has_copy_phase() {
                let code = self.copy(&task).await;
                self.emit(Output::finished(&task.host, OutputKind::CopyFinished, code))
                    .await;
                if code != 0 {
                    // copying failed, the task can't proceed
                    self.emit(Output::finished(
                        &task.host,
                        OutputKind::ExecFinished,
                        ERR_COPY_FAILED,
                    ))
                    .await;
                    self.busy.store(false, Ordering::SeqCst);
                    continue;
                }
            }

            if task.cmd.is_some() {
                let code = self.cmd(&task).await;
                self.emit(Output::finished(&task.host, OutputKind::ExecFinished, code))
                    .await;
            }

            self.busy.store(false, Ordering::SeqCst);
        }
    }

    async fn emit(&self, output: Output) {
        let _ = self.data.send(output).await;
    }

    fn spawn(&self, program: &str, argv: &[String]) -> std::io::Result<Child> {
        let mut command = Command::new(program);
        command
            .args(argv)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in CHILD_ENV {
            command.env(key, value);
        }
        command.spawn()
    }

    /// Run the exec phase. Returns the child's exit code or a sentinel.
    async fn cmd(&mut self, task: &Task) -> i32 {
        let argv = {
            let settings = self.settings.read().unwrap();
            ssh_argv(
                &settings,
                &task.host,
                &task.user,
                task.raise,
                task.cmd.as_deref(),
            )
        };
        debug!(worker = self.id, host = %task.host, "created command ssh {:?}", argv);

        let mut child = match self.spawn("ssh", &argv) {
            Ok(child) => child,
            Err(err) => {
                self.emit(Output::data(
                    &task.host,
                    OutputKind::Stderr,
                    format!("error spawning ssh: {err}\n").into_bytes(),
                ))
                .await;
                return ERR_MACOS_EXIT;
            }
        };
        debug!(worker = self.id, host = %task.host, "command started");

        let mut stdin = child.stdin.take();
        let (mut stdout, mut stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill().await;
                return ERR_MACOS_EXIT;
            }
        };

        // no password is to be sent when the command runs unraised
        let mut password_sent = task.raise == RaiseType::None;
        let mut skip_echo = false;
        let mut chunk_count = 0usize;
        let mut force_stopped = false;
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut obuf = [0u8; BUFFER_SIZE];
        let mut ebuf = [0u8; BUFFER_SIZE];

        'exec: while !(stdout_done && stderr_done) {
            tokio::select! {
                biased;

                _ = self.stop.recv() => {
                    force_stopped = true;
                    break 'exec;
                }

                read = stdout.read(&mut obuf), if !stdout_done => {
                    let n = match read {
                        Ok(0) | Err(_) => {
                            debug!(worker = self.id, host = %task.host, "EOF on stdout");
                            stdout_done = true;
                            continue;
                        }
                        Ok(n) => n,
                    };
                    self.emit(Output::data(&task.host, OutputKind::Debug, obuf[..n].to_vec()))
                        .await;

                    chunk_count += 1;
                    for chunk in obuf[..n].split_inclusive(|&b| b == b'\n') {
                        if chunk_count < PROMPT_CHUNK_WINDOW {
                            if !password_sent && PASSWD_PROMPT.is_match(chunk) {
                                if let Some(stdin) = stdin.as_mut() {
                                    let reply = task
                                        .password
                                        .as_ref()
                                        .map(|p| p.with_newline())
                                        .unwrap_or_else(|| b"\n".to_vec());
                                    let _ = stdin.write_all(&reply).await;
                                }
                                password_sent = true;
                                skip_echo = true;
                                continue;
                            }
                            if skip_echo && ECHO_ONLY.is_match(chunk) {
                                continue;
                            }
                            if password_sent && WRONG_PASSWORD.is_match(chunk) {
                                self.emit(Output::data(
                                    &task.host,
                                    OutputKind::Stdout,
                                    b"sudo: Authentication failure\n".to_vec(),
                                ))
                                .await;
                                force_stopped = true;
                                break 'exec;
                            }
                        }
                        if !chunk.is_empty() {
                            self.emit(Output::data(&task.host, OutputKind::Stdout, chunk.to_vec()))
                                .await;
                        }
                    }
                }

                read = stderr.read(&mut ebuf), if !stderr_done => {
                    let n = match read {
                        Ok(0) | Err(_) => {
                            debug!(worker = self.id, host = %task.host, "EOF on stderr");
                            stderr_done = true;
                            continue;
                        }
                        Ok(n) => n,
                    };
                    self.emit(Output::data(&task.host, OutputKind::Debug, ebuf[..n].to_vec()))
                        .await;
                    for chunk in ebuf[..n].split_inclusive(|&b| b == b'\n') {
                        if !chunk.is_empty() && !should_drop_chunk(chunk) {
                            self.emit(Output::data(&task.host, OutputKind::Stderr, chunk.to_vec()))
                                .await;
                        }
                    }
                }
            }
        }

        let code = self.finish_child(child, force_stopped).await;
        debug!(worker = self.id, host = %task.host, code, "exec finished");
        code
    }

    /// Run the copy phase via scp. Stdout is only surfaced as debug
    /// events; stderr is filtered for connection noise.
    async fn copy(&mut self, task: &Task) -> i32 {
        let (local, remote) = match (&task.local_file, &task.remote_file) {
            (Some(local), Some(remote)) => (local.clone(), remote.clone()),
            _ => return 0,
        };
        let argv = {
            let settings = self.settings.read().unwrap();
            scp_argv(&settings, &task.host, &task.user, &local, &remote)
        };
        debug!(worker = self.id, host = %task.host, "created command scp {:?}", argv);

        let mut child = match self.spawn("scp", &argv) {
            Ok(child) => child,
            Err(err) => {
                self.emit(Output::data(
                    &task.host,
                    OutputKind::Stderr,
                    format!("error spawning scp: {err}\n").into_bytes(),
                ))
                .await;
                return ERR_MACOS_EXIT;
            }
        };

        let (mut stdout, mut stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill().await;
                return ERR_MACOS_EXIT;
            }
        };

        let mut force_stopped = false;
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut obuf = [0u8; BUFFER_SIZE];
        let mut ebuf = [0u8; BUFFER_SIZE];

        while !(stdout_done && stderr_done) {
            tokio::select! {
                biased;

                _ = self.stop.recv() => {
                    force_stopped = true;
                    break;
                }

                read = stdout.read(&mut obuf), if !stdout_done => {
                    match read {
                        Ok(0) | Err(_) => stdout_done = true,
                        Ok(n) => {
                            self.emit(Output::data(&task.host, OutputKind::Debug, obuf[..n].to_vec()))
                                .await;
                        }
                    }
                }

                read = stderr.read(&mut ebuf), if !stderr_done => {
                    match read {
                        Ok(0) | Err(_) => stderr_done = true,
                        Ok(n) => {
                            for chunk in ebuf[..n].split_inclusive(|&b| b == b'\n') {
                                if !chunk.is_empty() && !should_drop_chunk(chunk) {
                                    self.emit(Output::data(&task.host, OutputKind::Stderr, chunk.to_vec()))
                                        .await;
                                }
                            }
                            self.emit(Output::data(&task.host, OutputKind::Debug, ebuf[..n].to_vec()))
                                .await;
                        }
                    }
                }
            }
        }

        let code = self.finish_child(child, force_stopped).await;
        debug!(worker = self.id, host = %task.host, code, "copy finished");
        code
    }

    async fn finish_child(&self, mut child: Child, force_stopped: bool) -> i32 {
        if force_stopped {
            let _ = child.kill().await;
            return ERR_FORCE_STOP;
        }
        match child.wait().await {
            // a child killed by a signal has no exit code on this
            // platform, same as the macOS wait quirk
            Ok(status) => status.code().unwrap_or(ERR_MACOS_EXIT),
            Err(_) => ERR_MACOS_EXIT,
        }
    }
}
