//! Inventory backends: host lookup and completion.
//!
//! The remote `conductor` backend fetches inventory over HTTP and caches
//! it on disk; the `localini`/`localjson` backends read a file. Both
//! resolve host expressions to ordered host lists.

pub mod local;
pub mod remote;
pub mod resolver;
pub mod schema;
pub mod store;

use thiserror::Error;

use crate::config::XcConfig;
use crate::expr::{parse_expression, ParseError};

use local::{LocalFile, LocalFormat};
use remote::{Conductor, ConductorConfig};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("can't load data neither from cache nor from http")]
    Unavailable,
}

/// The configured inventory source.
///
/// Enum dispatch keeps `load`/`reload` plain async fns without an
/// object-safe async trait.
pub enum Backend {
    Conductor(Conductor),
    LocalFile(LocalFile),
}

impl Backend {
    pub fn from_config(cfg: &XcConfig) -> Self {
        match cfg.backend_type.as_str() {
            "localini" => {
                Backend::LocalFile(LocalFile::new(LocalFormat::Ini, cfg.local_file.clone()))
            }
            "localjson" => {
                Backend::LocalFile(LocalFile::new(LocalFormat::Json, cfg.local_file.clone()))
            }
            // the conductor backend is the default for compatibility
            _ => Backend::Conductor(Conductor::new(ConductorConfig::from(cfg))),
        }
    }

    pub async fn load(&mut self) -> Result<(), InventoryError> {
        match self {
            Backend::Conductor(c) => c.load().await,
            Backend::LocalFile(f) => f.load(),
        }
    }

    pub async fn reload(&mut self) -> Result<(), InventoryError> {
        match self {
            Backend::Conductor(c) => c.reload().await,
            Backend::LocalFile(f) => f.reload(),
        }
    }

    /// Parse and resolve an expression into an ordered host list.
    pub fn host_list(&self, expr: &str) -> Result<Vec<String>, InventoryError> {
        match self {
            Backend::Conductor(c) => {
                let tokens = parse_expression(expr)?;
                Ok(resolver::resolve(&tokens, c.store()))
            }
            Backend::LocalFile(f) => f.host_list(expr),
        }
    }

    /// Completions return the suffix following the given prefix so the
    /// REPL can append them to what the operator already typed.
    pub fn complete_host(&self, prefix: &str) -> Vec<String> {
        match self {
            Backend::Conductor(c) => c.complete_host(prefix),
            Backend::LocalFile(f) => f.complete_host(prefix),
        }
    }

    pub fn complete_group(&self, prefix: &str) -> Vec<String> {
        match self {
            Backend::Conductor(c) => c.complete_group(prefix),
            Backend::LocalFile(f) => f.complete_group(prefix),
        }
    }

    pub fn complete_workgroup(&self, prefix: &str) -> Vec<String> {
        match self {
            Backend::Conductor(c) => c.complete_workgroup(prefix),
            Backend::LocalFile(_) => Vec::new(),
        }
    }

    pub fn complete_datacenter(&self, prefix: &str) -> Vec<String> {
        match self {
            Backend::Conductor(c) => c.complete_datacenter(prefix),
            Backend::LocalFile(_) => Vec::new(),
        }
    }
}
