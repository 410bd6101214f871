//! Error type shared by the provisioning use cases.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::patch_config::PatchError;
use super::ports::{NetworkError, PackageError, PrivilegeError, PromptError, ServiceError};

/// Any hard failure while provisioning the host.
///
/// Every variant is fatal: the binary prints it to stderr and exits with
/// status 1.  Only [`ProvisionError::Patch`] with a validation failure has
/// already been recovered from (the config file was restored).
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Privilege(#[from] PrivilegeError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// A host file operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A helper program ran but reported failure.
    #[error("`{command}` failed (exit code {code:?}): {stderr}")]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// No release archive exists for this OS/architecture.
    #[error("unsupported platform {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// A post-install check did not pass.
    #[error("verification failed: {0}")]
    Verification(String),
}

impl ProvisionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ProvisionError::Io {
            path: path.into(),
            source,
        }
    }
}
