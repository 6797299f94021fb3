pub mod cli;
pub mod config;
pub mod executer;
pub mod expr;
pub mod inventory;
pub mod remote;
pub mod term;

pub use config::XcConfig;
pub use executer::{ExecResult, Executer};
pub use inventory::Backend;
