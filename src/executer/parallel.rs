//! Parallel mode: live interleaved output from every host.

use indicatif::ProgressBar;
use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

use crate::remote::{OutputKind, Task};
use crate::term;

use super::{emit_line, ensure_newline, mirror_host, stage_script, ExecResult, Executer};

impl Executer {
    /// Stage the command as a self-deleting script, copy-and-exec it on
    /// every host, and render output as it arrives. SIGINT force-stops
    /// everything in flight.
    pub async fn parallel(&mut self, hosts: &[String], cmd: &str) -> ExecResult {
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

        let (script, remote_prefix) = match stage_script(cmd, &self.remote_tmpdir) {
            Ok(staged) => staged,
            Err(err) => {
                term::error(&format!("Error creating temporary file: {err}\n"));
                return result;
            }
        };
        let local = script.path().to_string_lossy().into_owned();

        let mut running = hosts.len();
        let tasks: Vec<Task> = hosts
            .iter()
            .map(|host| {
                let remote = format!("{remote_prefix}.{host}.sh");
                Task::copy_and_exec(
                    host,
                    &self.user,
                    &local,
                    &remote,
                    self.raise,
                    self.password.clone(),
                    &remote,
                )
            })
            .collect();

        // submission runs concurrently with consumption so a host list
        // larger than the queue never deadlocks against the output loop
        let submitter = self.pool.submitter();
        tokio::spawn(async move {
            for task in tasks {
                submitter.submit(task).await;
            }
        });

        let bar = self
            .progress_bar
            .then(|| ProgressBar::new(running as u64));
        let debug_on = self.debug;
        let prepend = self.prepend_hostnames;
        let Executer {
            pool, output_file, ..
        } = self;

        while running > 0 {
            tokio::select! {
                event = pool.recv() => {
                    let Some(event) = event else { break };
                    match event.kind {
                        OutputKind::Stdout => {
                            let data = ensure_newline(event.data);
                            let text = String::from_utf8_lossy(&data);
                            if prepend {
                                emit_line(
                                    bar.as_ref(),
                                    &format!("{}: {}", term::blue(&event.host), text.trim_end_matches('\n')),
                                );
                            } else {
                                emit_line(bar.as_ref(), text.trim_end_matches('\n'));
                            }
                            mirror_host(output_file, &event.host, &data);
                        }
                        OutputKind::Stderr => {
                            let data = ensure_newline(event.data);
                            let text = String::from_utf8_lossy(&data);
                            if prepend {
                                emit_line(
                                    bar.as_ref(),
                                    &format!("{}: {}", term::red(&event.host), text.trim_end_matches('\n')),
                                );
                            } else {
                                emit_line(bar.as_ref(), text.trim_end_matches('\n'));
                            }
                            mirror_host(output_file, &event.host, &data);
                        }
                        OutputKind::Debug => {
                            if debug_on {
                                let data = ensure_newline(event.data);
                                let text = String::from_utf8_lossy(&data);
                                emit_line(
                                    bar.as_ref(),
                                    &format!("{}: {}", term::yellow(&event.host), text.trim_end_matches('\n')),
                                );
                            }
                        }
                        OutputKind::CopyFinished => {}
                        OutputKind::ExecFinished => {
                            result.record(&event.host, event.status);
                            if let Some(bar) = &bar {
                                bar.inc(1);
                            }
                            running -= 1;
                        }
                    }
                }

                _ = sigint.recv() => {
                    println!();
                    let summary = pool.force_stop_all_tasks();
                    debug!(?summary, "parallel mode interrupted");
                    result.stopped += summary.dropped_tasks;
                    running -= summary.dropped_tasks.min(running);
                }
            }
        }

        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }
        result
    }
}
