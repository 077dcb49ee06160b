//! CLI errors

use std::io;

use thiserror::Error;

use crate::authz::session::SessionError;
use crate::config::ConfigError;
use crate::http_server::StateError;
use crate::tenancy::DirectoryError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Boot failed: {0}")]
    BootFailed(#[source] io::Error),
}

impl CliError {
    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::State(_) | CliError::Directory(_) => 3,
            CliError::Session(_) | CliError::BootFailed(_) => 4,
        }
    }
}
