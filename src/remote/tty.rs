//! Interactive ssh sessions on a real pseudo-terminal.
//!
//! Used by serial mode and the `ssh` command. The child runs with the
//! slave side of a fresh PTY as its controlling terminal; the operator's
//! stdin is switched to raw mode for the lifetime of the session and
//! restored on every exit path. SIGWINCH propagates the local window
//! size to the child.

use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

use crate::term;

use super::command::{tty_argv, SharedSettings, CHILD_ENV};
use super::patterns::{CONNECTION_CLOSED, ECHO_ONLY, PASSWD_PROMPT, WRONG_PASSWORD};
use super::task::{RaisePassword, RaiseType, ERR_MACOS_EXIT, ERR_TERMINAL_ERROR};

const BUFFER_SIZE: usize = 4096;

/// Raw-mode scope: enables on creation, restores on drop so panics and
/// early returns can't leave the terminal unusable.
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Copy the controlling terminal's size onto the PTY master.
fn propagate_winsize(master: &OwnedFd) {
    use terminal_size::{terminal_size, Height, Width};
    let Some((Width(cols), Height(rows))) = terminal_size() else {
        return;
    };
    let winsize = nix::pty::Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    unsafe {
        nix::libc::ioctl(master.as_raw_fd(), nix::libc::TIOCSWINSZ, &winsize);
    }
}

fn read_master(master: &AsyncFd<OwnedFd>, buf: &mut [u8]) -> std::io::Result<usize> {
    let n = nix::unistd::read(master.get_ref().as_raw_fd(), buf)
        .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
    Ok(n)
}

fn write_master(master: &AsyncFd<OwnedFd>, data: &[u8]) {
    let _ = nix::unistd::write(master.get_ref(), data);
}

/// Run one interactive session against a host. Returns the child's exit
/// code, or a sentinel for PTY and terminal failures.
pub async fn run_tty_session(
    settings: &SharedSettings,
    host: &str,
    user: &str,
    raise: RaiseType,
    password: Option<&RaisePassword>,
    cmd: Option<&str>,
) -> i32 {
    let argv = {
        let settings = settings.read().unwrap();
        tty_argv(&settings, host, user, raise, cmd)
    };
    debug!(%host, "created tty command ssh {:?}", argv);

    let pty = match nix::pty::openpty(None, None) {
        Ok(pty) => pty,
        Err(err) => {
            term::error(&format!("TTY error: {err}\n"));
            return ERR_TERMINAL_ERROR;
        }
    };
    let master = pty.master;
    let slave = pty.slave;

    let stdio = |fd: &OwnedFd| -> std::io::Result<Stdio> { Ok(Stdio::from(fd.try_clone()?)) };
    let mut command = Command::new("ssh");
    command.args(&argv).kill_on_drop(true);
    for (key, value) in CHILD_ENV {
        command.env(key, value);
    }
    match (stdio(&slave), stdio(&slave), stdio(&slave)) {
        (Ok(sin), Ok(sout), Ok(serr)) => {
            command.stdin(sin).stdout(sout).stderr(serr);
        }
        _ => {
            term::error("TTY error: can't clone slave descriptor\n");
            return ERR_TERMINAL_ERROR;
        }
    }
    unsafe {
        command.pre_exec(|| {
            // make the slave the child's controlling terminal
            nix::unistd::setsid().map_err(std::io::Error::other)?;
            if nix::libc::ioctl(0, nix::libc::TIOCSCTTY as _, 0) < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            term::error(&format!("TTY error: {err}\n"));
            return ERR_TERMINAL_ERROR;
        }
    };
    drop(slave);

    if let Err(err) = set_nonblocking(&master) {
        term::error(&format!("TTY error: {err}\n"));
        let _ = child.kill().await;
        return ERR_TERMINAL_ERROR;
    }
    let master = match AsyncFd::new(master) {
        Ok(master) => master,
        Err(err) => {
            term::error(&format!("TTY error: {err}\n"));
            let _ = child.kill().await;
            return ERR_TERMINAL_ERROR;
        }
    };

    let mut sigwinch = match signal(SignalKind::window_change()) {
        Ok(stream) => stream,
        Err(err) => {
            term::error(&format!("TTY error: {err}\n"));
            let _ = child.kill().await;
            return ERR_TERMINAL_ERROR;
        }
    };
    propagate_winsize(master.get_ref());

    let _raw = match RawModeGuard::new() {
        Ok(guard) => guard,
        Err(err) => {
            term::error(&format!("Error setting up raw stdin: {err}\n"));
            let _ = child.kill().await;
            return ERR_TERMINAL_ERROR;
        }
    };

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut stdin_open = true;
    let mut password_sent = false;
    let mut skip_echo = false;
    let mut pty_buf = [0u8; BUFFER_SIZE];
    let mut stdin_buf = [0u8; BUFFER_SIZE];

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,

            _ = sigwinch.recv() => propagate_winsize(master.get_ref()),

            guard = master.readable() => {
                let mut guard = match guard {
                    Ok(guard) => guard,
                    Err(_) => continue,
                };
                match guard.try_io(|fd| read_master(fd, &mut pty_buf)) {
                    Ok(Ok(n)) if n > 0 => {
                        let chunk = &pty_buf[..n];

                        if raise != RaiseType::None && !password_sent && PASSWD_PROMPT.is_match(chunk) {
                            let reply = password
                                .map(|p| p.with_newline())
                                .unwrap_or_else(|| b"\n".to_vec());
                            write_master(&master, &reply);
                            password_sent = true;
                            skip_echo = true;
                            continue;
                        }
                        if skip_echo && ECHO_ONLY.is_match(chunk) {
                            skip_echo = false;
                            continue;
                        }
                        if password_sent && WRONG_PASSWORD.is_match(chunk) {
                            term::error(&format!("{host}: sudo: Authentication error\n"));
                            let _ = child.kill().await;
                            continue;
                        }
                        if CONNECTION_CLOSED.is_match(chunk) {
                            // a clean session end needs no epilogue
                            continue;
                        }

                        let _ = stdout.write_all(chunk).await;
                        let _ = stdout.flush().await;
                    }
                    Ok(_) => {
                        // EOF or I/O error on the master: the child is
                        // gone, wait for it below
                        break child.wait().await;
                    }
                    Err(_would_block) => continue,
                }
            }

            read = stdin.read(&mut stdin_buf), if stdin_open => {
                match read {
                    Ok(n) if n > 0 => write_master(&master, &stdin_buf[..n]),
                    _ => stdin_open = false,
                }
            }
        }
    };

    match status {
        Ok(status) => status.code().unwrap_or(ERR_MACOS_EXIT),
        Err(_) => ERR_MACOS_EXIT,
    }
}

fn set_nonblocking(fd: &OwnedFd) -> std::io::Result<()> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL)
        .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags))
        .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
    Ok(())
}
