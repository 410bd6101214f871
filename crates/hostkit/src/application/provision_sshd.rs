//! ProvisionSshdUseCase: install and configure the OpenSSH daemon.
//!
//! # Sequence
//!
//! ```text
//! require root
//!   └─ sshd on PATH? ──no──► confirm ──no──► Declined
//!                              └─yes─► install openssh-server
//!   └─ preview sshd_config changes ──► confirm ──no──► Declined
//!   └─ ConfigPatcher::run()          (backup → apply → `sshd -t` → commit | rollback)
//!   └─ scan sshd_config.d drop-ins   (warn about settings that override ours)
//!   └─ enable + restart ssh/sshd     (restart skipped when nothing changed and running)
//!   └─ verify the unit is active
//! ```
//!
//! # Drop-in overrides
//!
//! Current Debian, Ubuntu and Fedora images start `sshd_config` with
//! `Include /etc/ssh/sshd_config.d/*.conf`.  sshd keeps the *first* value it
//! reads for most keywords, so a drop-in such as `50-cloud-init.conf` setting
//! `PasswordAuthentication no` silently wins over the main file.  Those are
//! reported in [`SshdOutcome::Configured::overrides`] and logged as warnings;
//! hostkit never edits drop-ins.

use std::path::PathBuf;
use std::sync::Arc;

use hostkit_core::ConfigDocument;
use tracing::{info, warn};

use super::error::ProvisionError;
use super::patch_config::{ConfigPatcher, PatchReport};
use super::ports::{
    BinaryLocator, Filesystem, PackageInstaller, PrivilegeCheck, Prompter, ServiceError,
    ServiceManager, SystemPackage,
};

/// A drop-in file that sets one of our directives to a different value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropInOverride {
    pub file: PathBuf,
    pub key: String,
    pub value: String,
}

/// Result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshdOutcome {
    /// The operator declined; nothing was changed.
    Declined,
    /// sshd is installed, configured, and running.
    Configured {
        report: PatchReport,
        service: String,
        restarted: bool,
        overrides: Vec<DropInOverride>,
    },
}

/// Ports needed by [`ProvisionSshdUseCase`].
pub struct SshdPorts {
    pub privilege: Arc<dyn PrivilegeCheck>,
    pub prompter: Arc<dyn Prompter>,
    pub packages: Arc<dyn PackageInstaller>,
    pub services: Arc<dyn ServiceManager>,
    pub locator: Arc<dyn BinaryLocator>,
    pub files: Arc<dyn Filesystem>,
}

/// The Provision SSHD use case.
pub struct ProvisionSshdUseCase {
    ports: SshdPorts,
    patcher: ConfigPatcher,
    service_units: Vec<String>,
}

impl ProvisionSshdUseCase {
    /// `patcher` must target the sshd config file and validate with `sshd -t`.
    /// `service_units` are tried in order; the first one the service manager
    /// knows is used.
    pub fn new(ports: SshdPorts, patcher: ConfigPatcher, service_units: Vec<String>) -> Self {
        Self {
            ports,
            patcher,
            service_units,
        }
    }

    /// # Errors
    ///
    /// Returns [`ProvisionError`] for missing privileges, package or service
    /// failures, and config patch failures (after rollback).
    pub fn execute(&self) -> Result<SshdOutcome, ProvisionError> {
        self.ports.privilege.require_root()?;

        if !self.ensure_installed()? {
            return Ok(SshdOutcome::Declined);
        }

        let pending: Vec<String> = self
            .patcher
            .preview()?
            .into_iter()
            .filter(|o| o.outcome.changed())
            .map(|o| o.directive.line())
            .collect();
        if !pending.is_empty() {
            let question = format!(
                "Apply {} change(s) to {} ({}) and restart sshd?",
                pending.len(),
                self.patcher.config().file_path.display(),
                pending.join(", ")
            );
            if !self.ports.prompter.confirm(&question, true)? {
                info!("operator declined sshd_config changes");
                return Ok(SshdOutcome::Declined);
            }
        }

        let report = self.patcher.run()?;

        let overrides = self.drop_in_overrides();
        for o in &overrides {
            warn!(
                "{} sets `{} {}`, which takes precedence over the main config",
                o.file.display(),
                o.key,
                o.value
            );
        }

        let service = self.resolve_service()?;
        self.ports.services.enable(&service)?;

        let restarted = report.changed() || !self.ports.services.is_active(&service);
        if restarted {
            info!("restarting {service}");
            self.ports.services.restart(&service)?;
        }

        if !self.ports.services.is_active(&service) {
            return Err(ProvisionError::Verification(format!(
                "{service} is not active after restart"
            )));
        }

        Ok(SshdOutcome::Configured {
            report,
            service,
            restarted,
            overrides,
        })
    }

    /// Returns `false` if the operator declined installation.
    fn ensure_installed(&self) -> Result<bool, ProvisionError> {
        if let Some(path) = self.ports.locator.find("sshd") {
            info!("found sshd at {}", path.display());
            return Ok(true);
        }

        if !self
            .ports
            .prompter
            .confirm("The OpenSSH server is not installed. Install it now?", true)?
        {
            info!("operator declined OpenSSH server installation");
            return Ok(false);
        }

        self.ports.packages.install(SystemPackage::OpenSshServer)?;
        if self.ports.locator.find("sshd").is_none() {
            return Err(ProvisionError::Verification(
                "sshd is still missing after installing the OpenSSH server package".to_string(),
            ));
        }
        Ok(true)
    }

    fn resolve_service(&self) -> Result<String, ServiceError> {
        self.service_units
            .iter()
            .find(|unit| self.ports.services.exists(unit))
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(self.service_units.clone()))
    }

    /// Scans `<config>.d/*.conf` in lexical order, the order sshd includes them.
    fn drop_in_overrides(&self) -> Vec<DropInOverride> {
        let config = self.patcher.config();
        let mut dir = config.file_path.clone().into_os_string();
        dir.push(".d");
        let dir = PathBuf::from(dir);

        let mut files = match self.ports.files.list_files(&dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("cannot scan {}: {e}", dir.display());
                return Vec::new();
            }
        };
        files.retain(|f| f.extension().is_some_and(|ext| ext == "conf"));
        files.sort();

        let mut overrides = Vec::new();
        for directive in &config.directives {
            // The first drop-in that sets the key is the one sshd uses.
            let winner = files.iter().find_map(|file| {
                let text = self.ports.files.read_to_string(file).ok()?;
                let doc = ConfigDocument::parse(&text);
                doc.get(directive.key())
                    .map(|value| (file.clone(), value.to_string()))
            });
            if let Some((file, value)) = winner {
                if value != directive.value() {
                    overrides.push(DropInOverride {
                        file,
                        key: directive.key().to_string(),
                        value,
                    });
                }
            }
        }
        overrides
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
