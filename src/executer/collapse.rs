//! Collapse mode: buffer stdout per host, group identical outputs at the
//! end.

use indicatif::ProgressBar;
use std::collections::HashMap;
use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

use crate::remote::{OutputKind, Task};
use crate::term;

use super::{
    emit_line, ensure_newline, group_outputs, mirror_host, stage_script, ExecResult, Executer,
};

impl Executer {
    /// Like parallel, but stdout is withheld and grouped by identical
    /// content once all hosts finish. Stderr still streams live.
    pub async fn collapse(&mut self, hosts: &[String], cmd: &str) -> ExecResult {
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
        let Executer {
            pool, output_file, ..
        } = self;

        let mut outputs: HashMap<String, Vec<u8>> = HashMap::new();

        while running > 0 {
            tokio::select! {
                event = pool.recv() => {
                    let Some(event) = event else { break };
                    match event.kind {
                        OutputKind::Stdout => {
                            outputs.entry(event.host).or_default().extend_from_slice(&event.data);
                        }
                        OutputKind::Stderr => {
                            let data = ensure_newline(event.data);
                            let text = String::from_utf8_lossy(&data);
                            emit_line(
                                bar.as_ref(),
                                &format!("{}: {}", term::red(&event.host), text.trim_end_matches('\n')),
                            );
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
                    debug!(?summary, "collapse mode interrupted");
                    result.stopped += summary.dropped_tasks;
                    running -= summary.dropped_tasks.min(running);
                }
            }
        }

        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }

        result.output_map = group_outputs(&outputs);
        result
    }
}
