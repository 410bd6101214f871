//! Driven ports shared by the provisioning use cases.
//!
//! Each trait is implemented once in the infrastructure layer against the
//! real OS (`which`, `systemctl`, the distro package manager, `reqwest`,
//! `inquire`) and mocked with `mockall` in the use-case tests.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Required elevated access is absent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrivilegeError {
    #[error("this operation must run as root (effective uid is {0}); re-run with sudo")]
    NotRoot(u32),
}

/// A download or manifest fetch failed.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    #[error("could not parse response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("I/O error writing download to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The package manager could not install a package.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("no supported package manager found (looked for apt-get, dnf, yum, zypper, pacman, apk)")]
    NoPackageManager,

    #[error("{manager} failed to install {package} (exit code {code:?}): {stderr}")]
    InstallFailed {
        manager: String,
        package: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("could not run {manager}: {source}")]
    Spawn {
        manager: String,
        #[source]
        source: io::Error,
    },
}

/// The service manager could not act on a unit.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("none of the service units {0:?} are known to the service manager")]
    NotFound(Vec<String>),

    #[error("`{command}` failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("could not run the service manager: {0}")]
    Spawn(#[source] io::Error),
}

/// The operator prompt could not be shown or answered.
#[derive(Debug, Error)]
#[error("prompt failed: {0}")]
pub struct PromptError(pub String);

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Checks that the process has the privileges host changes need.
#[cfg_attr(test, mockall::automock)]
pub trait PrivilegeCheck: Send + Sync {
    /// # Errors
    ///
    /// Returns [`PrivilegeError`] when not running as root.
    fn require_root(&self) -> Result<(), PrivilegeError>;
}

/// Asks the operator a yes/no question.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter: Send + Sync {
    /// # Errors
    ///
    /// Returns [`PromptError`] if no answer can be obtained (e.g. no TTY).
    fn confirm(&self, question: &str, default: bool) -> Result<bool, PromptError>;
}

/// Logical packages hostkit may need, mapped to distro names by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPackage {
    OpenSshServer,
    Tar,
}

/// Installs distribution packages.
#[cfg_attr(test, mockall::automock)]
pub trait PackageInstaller: Send + Sync {
    /// Installs `package` non-interactively.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError`] if the package manager exits non-zero.
    fn install(&self, package: SystemPackage) -> Result<(), PackageError>;
}

/// Controls system services.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceManager: Send + Sync {
    /// Returns `true` if a unit with this name is installed.
    fn exists(&self, unit: &str) -> bool;

    /// Enables the unit at boot.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on failure.
    fn enable(&self, unit: &str) -> Result<(), ServiceError>;

    /// Restarts (or starts) the unit.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on failure.
    fn restart(&self, unit: &str) -> Result<(), ServiceError>;

    /// Returns `true` if the unit is currently running.
    fn is_active(&self, unit: &str) -> bool;
}

/// Finds executables.
#[cfg_attr(test, mockall::automock)]
pub trait BinaryLocator: Send + Sync {
    fn find(&self, name: &str) -> Option<PathBuf>;
}

/// Fetches resources over HTTP.
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher: Send + Sync {
    /// GETs `url` as text.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] on transport failure, non-2xx, or empty body.
    fn fetch_text(&self, url: &str) -> Result<String, NetworkError>;

    /// GETs `url` into `dest`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] on transport failure, non-2xx, or empty body.
    fn download(&self, url: &str, dest: &Path) -> Result<u64, NetworkError>;
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs subprocesses to completion.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// # Errors
    ///
    /// Returns the spawn error if the program could not be started.
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// File system operations outside config patching.
#[cfg_attr(test, mockall::automock)]
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    /// Writes `contents` to `path` with the given Unix mode.
    fn write_file(&self, path: &Path, contents: &str, mode: u32) -> io::Result<()>;
    /// Lists regular files directly inside `dir`.  A missing directory lists as empty.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}
