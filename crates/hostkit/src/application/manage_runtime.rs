//! ManageRuntimeUseCase: install or remove a tarball-distributed runtime.
//!
//! The defaults target Go, whose release manifest and archive layout this
//! use case was written against:
//!
//! - manifest: `https://go.dev/dl/?mode=json`, a JSON array of releases,
//!   newest first, each `{ "version": "go1.22.1", "stable": true, ... }`
//! - archive: `https://go.dev/dl/go1.22.1.linux-amd64.tar.gz`, which
//!   unpacks to a single `go/` directory
//!
//! Any runtime with the same shape (one top-level directory named after the
//! runtime, binaries under `bin/`) can be installed by changing
//! [`RuntimeSettings`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::ProvisionError;
use super::ports::{
    BinaryLocator, CommandRunner, Fetcher, Filesystem, NetworkError, PackageInstaller,
    PrivilegeCheck, Prompter, SystemPackage,
};

/// Mode of the `/etc/profile.d` snippet.
const PROFILE_MODE: u32 = 0o644;

// ── Settings ──────────────────────────────────────────────────────────────────

/// Where a runtime comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Name of the directory the archive unpacks to, and of the profile snippet.
    pub name: String,
    /// Executable under `<install_dir>/bin` used for verification.
    pub binary: String,
    /// JSON release manifest.
    pub manifest_url: String,
    /// Archive URL template; `{version}`, `{os}` and `{arch}` are substituted.
    pub archive_url: String,
    /// Installs this exact version instead of the newest stable one.
    pub version: Option<String>,
    /// Directory the archive is extracted into.
    pub install_root: PathBuf,
    /// Directory login shells source `*.sh` snippets from.
    pub profile_dir: PathBuf,
    /// Arguments that make `binary` print its version.
    pub version_args: Vec<String>,
    /// Where the archive is downloaded before extraction.
    pub staging_dir: PathBuf,
}

impl RuntimeSettings {
    pub fn install_dir(&self) -> PathBuf {
        self.install_root.join(&self.name)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir().join("bin")
    }

    pub fn binary_path(&self) -> PathBuf {
        self.bin_dir().join(&self.binary)
    }

    pub fn profile_path(&self) -> PathBuf {
        self.profile_dir.join(format!("{}.sh", self.name))
    }

    /// Expands the archive URL template.
    pub fn archive_url_for(&self, version: &str, platform: &Platform) -> String {
        self.archive_url
            .replace("{version}", version)
            .replace("{os}", &platform.os)
            .replace("{arch}", &platform.arch)
    }

    /// The shell snippet that puts the runtime on `PATH`.
    pub fn profile_snippet(&self) -> String {
        format!(
            "# Managed by hostkit; removed by `hostkit runtime remove`.\nexport PATH=\"$PATH:{}\"\n",
            self.bin_dir().display()
        )
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            name: "go".to_string(),
            binary: "go".to_string(),
            manifest_url: "https://go.dev/dl/?mode=json".to_string(),
            archive_url: "https://go.dev/dl/{version}.{os}-{arch}.tar.gz".to_string(),
            version: None,
            install_root: PathBuf::from("/usr/local"),
            profile_dir: PathBuf::from("/etc/profile.d"),
            version_args: vec!["version".to_string()],
            staging_dir: std::env::temp_dir(),
        }
    }
}

/// OS and CPU names as used in release archive file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// The platform this binary was compiled for.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::UnsupportedPlatform`] for targets without
    /// release archives.
    pub fn current() -> Result<Self, ProvisionError> {
        Self::from_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Maps Rust target names (`x86_64`, `aarch64`) to release names (`amd64`, `arm64`).
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::UnsupportedPlatform`] for unknown names.
    pub fn from_target(os: &str, arch: &str) -> Result<Self, ProvisionError> {
        let unsupported = || ProvisionError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };
        let os_name = match os {
            "linux" => "linux",
            "macos" => "darwin",
            "freebsd" => "freebsd",
            _ => return Err(unsupported()),
        };
        let arch_name = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "arm" => "armv6l",
            "riscv64" => "riscv64",
            "s390x" => "s390x",
            "loongarch64" => "loong64",
            _ => return Err(unsupported()),
        };
        Ok(Self {
            os: os_name.to_string(),
            arch: arch_name.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ManifestRelease {
    version: String,
    #[serde(default)]
    stable: bool,
}

/// Returns the version of the first stable release in a JSON manifest.
///
/// # Errors
///
/// Returns [`NetworkError::Malformed`] if the body is not a release array or
/// lists no stable release.
pub fn latest_stable(url: &str, manifest: &str) -> Result<String, NetworkError> {
    let releases: Vec<ManifestRelease> =
        serde_json::from_str(manifest).map_err(|e| NetworkError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    releases
        .into_iter()
        .find(|r| r.stable)
        .map(|r| r.version)
        .ok_or_else(|| NetworkError::Malformed {
            url: url.to_string(),
            message: "manifest lists no stable release".to_string(),
        })
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The operator declined replacing an existing install.
    Declined,
    Installed {
        version: String,
        install_dir: PathBuf,
        /// First line printed by the version command.
        reported: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    NotInstalled,
    Declined,
    Removed { install_dir: PathBuf },
}

// ── Use case ──────────────────────────────────────────────────────────────────

/// Ports needed by [`ManageRuntimeUseCase`].
pub struct RuntimePorts {
    pub privilege: Arc<dyn PrivilegeCheck>,
    pub prompter: Arc<dyn Prompter>,
    pub packages: Arc<dyn PackageInstaller>,
    pub locator: Arc<dyn BinaryLocator>,
    pub fetcher: Arc<dyn Fetcher>,
    pub runner: Arc<dyn CommandRunner>,
    pub files: Arc<dyn Filesystem>,
}

/// The Manage Runtime use case.
pub struct ManageRuntimeUseCase {
    ports: RuntimePorts,
    settings: RuntimeSettings,
    platform: Platform,
}

impl ManageRuntimeUseCase {
    pub fn new(ports: RuntimePorts, settings: RuntimeSettings, platform: Platform) -> Self {
        Self {
            ports,
            settings,
            platform,
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Downloads, extracts and verifies the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on missing privileges, network, package,
    /// extraction or verification failure.  The staged archive is deleted on
    /// every path.
    pub fn install(&self) -> Result<InstallOutcome, ProvisionError> {
        self.ports.privilege.require_root()?;
        let s = &self.settings;

        let version = match &s.version {
            Some(pinned) => pinned.clone(),
            None => {
                let manifest = self.ports.fetcher.fetch_text(&s.manifest_url)?;
                latest_stable(&s.manifest_url, &manifest)?
            }
        };
        info!("{} version to install: {version}", s.name);

        let install_dir = s.install_dir();
        if self.ports.files.exists(&install_dir) {
            let question = format!(
                "{} is already installed at {}. Replace it with {version}?",
                s.name,
                install_dir.display()
            );
            if !self.ports.prompter.confirm(&question, false)? {
                info!("operator declined replacing {}", install_dir.display());
                return Ok(InstallOutcome::Declined);
            }
        }

        self.ensure_tar()?;

        let url = s.archive_url_for(&version, &self.platform);
        let file_name = url.rsplit('/').next().unwrap_or("runtime.tar.gz");
        let staged = s.staging_dir.join(file_name);
        self.ports
            .files
            .create_dir_all(&s.staging_dir)
            .map_err(|e| ProvisionError::io(&s.staging_dir, e))?;

        let unpacked = self.fetch_and_extract(&url, &staged);
        match self.ports.files.remove_file(&staged) {
            Ok(()) => debug!("removed {}", staged.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove {}: {e}", staged.display()),
        }
        unpacked?;

        let profile = s.profile_path();
        self.ports
            .files
            .create_dir_all(&s.profile_dir)
            .map_err(|e| ProvisionError::io(&s.profile_dir, e))?;
        self.ports
            .files
            .write_file(&profile, &s.profile_snippet(), PROFILE_MODE)
            .map_err(|e| ProvisionError::io(&profile, e))?;
        info!("wrote {}", profile.display());

        let reported = self.verify(&version)?;
        info!("{} {version} installed at {}", s.name, install_dir.display());
        Ok(InstallOutcome::Installed {
            version,
            install_dir,
            reported,
        })
    }

    /// Deletes the install directory and the profile snippet.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on missing privileges or I/O failure.
    pub fn remove(&self) -> Result<RemoveOutcome, ProvisionError> {
        self.ports.privilege.require_root()?;
        let install_dir = self.settings.install_dir();
        let profile = self.settings.profile_path();

        let has_dir = self.ports.files.exists(&install_dir);
        let has_profile = self.ports.files.exists(&profile);
        if !has_dir && !has_profile {
            info!("{} is not installed", self.settings.name);
            return Ok(RemoveOutcome::NotInstalled);
        }

        let question = format!(
            "Remove {} from {}?",
            self.settings.name,
            install_dir.display()
        );
        if !self.ports.prompter.confirm(&question, false)? {
            return Ok(RemoveOutcome::Declined);
        }

        if has_dir {
            self.ports
                .files
                .remove_dir_all(&install_dir)
                .map_err(|e| ProvisionError::io(&install_dir, e))?;
            info!("removed {}", install_dir.display());
        }
        if has_profile {
            self.ports
                .files
                .remove_file(&profile)
                .map_err(|e| ProvisionError::io(&profile, e))?;
            info!("removed {}", profile.display());
        }
        Ok(RemoveOutcome::Removed { install_dir })
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn ensure_tar(&self) -> Result<(), ProvisionError> {
        if self.ports.locator.find("tar").is_none() {
            info!("tar not found; installing it");
            self.ports.packages.install(SystemPackage::Tar)?;
        }
        Ok(())
    }

    fn fetch_and_extract(&self, url: &str, staged: &Path) -> Result<(), ProvisionError> {
        let bytes = self.ports.fetcher.download(url, staged)?;
        info!("downloaded {url} ({bytes} bytes)");

        let install_dir = self.settings.install_dir();
        if self.ports.files.exists(&install_dir) {
            self.ports
                .files
                .remove_dir_all(&install_dir)
                .map_err(|e| ProvisionError::io(&install_dir, e))?;
            debug!("removed previous install at {}", install_dir.display());
        }

        let args = vec![
            "-C".to_string(),
            self.settings.install_root.display().to_string(),
            "-xzf".to_string(),
            staged.display().to_string(),
        ];
        let output = self
            .ports
            .runner
            .run("tar", &args)
            .map_err(|e| ProvisionError::io(staged, e))?;
        if !output.success {
            return Err(ProvisionError::Command {
                command: format!("tar {}", args.join(" ")),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn verify(&self, version: &str) -> Result<String, ProvisionError> {
        let binary = self.settings.binary_path();
        let program = binary.display().to_string();
        let output = self
            .ports
            .runner
            .run(&program, &self.settings.version_args)
            .map_err(|e| ProvisionError::io(&binary, e))?;
        if !output.success {
            return Err(ProvisionError::Verification(format!(
                "`{program} {}` exited with {:?}: {}",
                self.settings.version_args.join(" "),
                output.code,
                output.stderr.trim()
            )));
        }
        let reported = output.stdout.lines().next().unwrap_or_default().trim().to_string();
        if !reported.contains(version) {
            return Err(ProvisionError::Verification(format!(
                "expected {version}, but {program} reports `{reported}`"
            )));
        }
        Ok(reported)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
