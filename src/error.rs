//! Launch failures

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while handing control to the server. None are retried.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to create scratch directory {path:?}: {source}")]
    ScratchDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub fn io_error(&self) -> &io::Error {
        match self {
            LaunchError::ScratchDir { source, .. }
            | LaunchError::Exec { source, .. }
            | LaunchError::Spawn { source, .. } => source,
        }
    }

    /// Process exit status for this failure, following shell conventions.
    pub fn exit_code(&self) -> i32 {
        match self.io_error().kind() {
            io::ErrorKind::NotFound => 127,
            io::ErrorKind::PermissionDenied => 126,
            _ => 1,
        }
    }
}
