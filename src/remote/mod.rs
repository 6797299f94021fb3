//! Remote execution: the ssh/scp worker pool and the interactive PTY
//! driver.

pub mod command;
pub mod patterns;
pub mod pool;
pub mod task;
pub mod tty;

mod worker;

pub use command::{shared_settings, SharedSettings, SshSettings};
pub use pool::{Pool, StopSummary, Submitter, CHANNEL_CAPACITY};
pub use task::{
    Output, OutputKind, RaisePassword, RaiseType, Task, ERR_COPY_FAILED, ERR_FORCE_STOP,
    ERR_MACOS_EXIT, ERR_TERMINAL_ERROR,
};
pub use tty::run_tty_session;
