//! Distribute: fan a local file out to every host via scp.

use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

use crate::remote::{OutputKind, Task};
use crate::term;

use super::{emit_line, ensure_newline, mirror_host, ExecResult, Executer};

impl Executer {
    /// Copy `local` to `remote` on every host through the pool's
    /// copy-only tasks, reporting per-host success live.
    pub async fn distribute(&mut self, hosts: &[String], local: &str, remote: &str) -> ExecResult {
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

        let mut running = hosts.len();
        let tasks: Vec<Task> = hosts
            .iter()
            .map(|host| Task::copy(host, &self.user, local, remote))
            .collect();

        let submitter = self.pool.submitter();
        tokio::spawn(async move {
            for task in tasks {
                submitter.submit(task).await;
            }
        });

        let debug_on = self.debug;
        let Executer {
            pool, output_file, ..
        } = self;

        while running > 0 {
            tokio::select! {
                event = pool.recv() => {
                    let Some(event) = event else { break };
                    match event.kind {
                        OutputKind::Stdout | OutputKind::Stderr => {
                            let data = ensure_newline(event.data);
                            let text = String::from_utf8_lossy(&data);
                            let host = if event.kind == OutputKind::Stdout {
                                term::blue(&event.host)
                            } else {
                                term::red(&event.host)
                            };
                            emit_line(None, &format!("{}: {}", host, text.trim_end_matches('\n')));
                            mirror_host(output_file, &event.host, &data);
                        }
                        OutputKind::Debug => {
                            if debug_on {
                                let data = ensure_newline(event.data);
                                let text = String::from_utf8_lossy(&data);
                                emit_line(
                                    None,
                                    &format!("{}: {}", term::yellow(&event.host), text.trim_end_matches('\n')),
                                );
                            }
                        }
                        OutputKind::CopyFinished => {
                            result.record(&event.host, event.status);
                            if event.status == 0 {
                                println!("{}", term::blue(&format!("+ Copied to {}", event.host)));
                            } else {
                                println!("{}", term::red(&format!("- Failed to copy to {}", event.host)));
                            }
                            running -= 1;
                        }
                        // a failed or stopped copy also reports an exec
                        // failure, already accounted for above
                        OutputKind::ExecFinished => {}
                    }
                }

                _ = sigint.recv() => {
                    println!();
                    let summary = pool.force_stop_all_tasks();
                    debug!(?summary, "distribute interrupted");
                    result.stopped += summary.dropped_tasks;
                    running -= summary.dropped_tasks.min(running);
                }
            }
        }

        result
    }
}
