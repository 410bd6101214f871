//! Distribution package manager adapter.
//!
//! The first package manager found on `PATH` wins, in the order of
//! [`PackageManagerKind::ALL`].  Installs are non-interactive; a non-zero
//! exit is a [`PackageError::InstallFailed`] carrying the manager's stderr.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::ports::{
    BinaryLocator, CommandRunner, PackageError, PackageInstaller, SystemPackage,
};

/// Supported package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManagerKind {
    AptGet,
    Dnf,
    Yum,
    Zypper,
    Pacman,
    Apk,
}

impl PackageManagerKind {
    /// Detection order.  `dnf` precedes `yum` because Fedora ships both.
    pub const ALL: [PackageManagerKind; 6] = [
        PackageManagerKind::AptGet,
        PackageManagerKind::Dnf,
        PackageManagerKind::Yum,
        PackageManagerKind::Zypper,
        PackageManagerKind::Pacman,
        PackageManagerKind::Apk,
    ];

    pub fn program(self) -> &'static str {
        match self {
            PackageManagerKind::AptGet => "apt-get",
            PackageManagerKind::Dnf => "dnf",
            PackageManagerKind::Yum => "yum",
            PackageManagerKind::Zypper => "zypper",
            PackageManagerKind::Pacman => "pacman",
            PackageManagerKind::Apk => "apk",
        }
    }

    /// Distribution name of a logical package.
    pub fn package_name(self, package: SystemPackage) -> &'static str {
        match (self, package) {
            (_, SystemPackage::Tar) => "tar",
            (PackageManagerKind::Zypper | PackageManagerKind::Pacman, SystemPackage::OpenSshServer) => {
                "openssh"
            }
            (_, SystemPackage::OpenSshServer) => "openssh-server",
        }
    }

    /// Program and arguments for a non-interactive install.
    pub fn install_command(self, package: SystemPackage) -> (String, Vec<String>) {
        let name = self.package_name(package);
        let (program, args): (&str, Vec<&str>) = match self {
            // `env` sets DEBIAN_FRONTEND so debconf never prompts.
            PackageManagerKind::AptGet => (
                "env",
                vec!["DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y", "-q", name],
            ),
            PackageManagerKind::Dnf | PackageManagerKind::Yum => {
                (self.program(), vec!["install", "-y", name])
            }
            PackageManagerKind::Zypper => (self.program(), vec!["--non-interactive", "install", name]),
            PackageManagerKind::Pacman => (self.program(), vec!["-S", "--noconfirm", "--needed", name]),
            PackageManagerKind::Apk => (self.program(), vec!["add", "--no-cache", name]),
        };
        (
            program.to_string(),
            args.into_iter().map(String::from).collect(),
        )
    }

    /// Index refresh run before installing, if the manager needs one.
    pub fn refresh_command(self) -> Option<(String, Vec<String>)> {
        match self {
            PackageManagerKind::AptGet => Some((
                "apt-get".to_string(),
                vec!["update".to_string(), "-q".to_string()],
            )),
            _ => None,
        }
    }
}

/// Installs packages with the detected package manager.
pub struct SystemPackageManager {
    kind: Option<PackageManagerKind>,
    runner: Arc<dyn CommandRunner>,
}

impl SystemPackageManager {
    pub fn new(kind: Option<PackageManagerKind>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { kind, runner }
    }

    /// Uses the first supported package manager `locator` can find.
    pub fn detect(locator: &dyn BinaryLocator, runner: Arc<dyn CommandRunner>) -> Self {
        let kind = PackageManagerKind::ALL
            .into_iter()
            .find(|k| locator.find(k.program()).is_some());
        Self::new(kind, runner)
    }

    pub fn kind(&self) -> Option<PackageManagerKind> {
        self.kind
    }
}

impl PackageInstaller for SystemPackageManager {
    fn install(&self, package: SystemPackage) -> Result<(), PackageError> {
        let kind = self.kind.ok_or(PackageError::NoPackageManager)?;
        let manager = kind.program().to_string();
        let name = kind.package_name(package);

        if let Some((program, args)) = kind.refresh_command() {
            match self.runner.run(&program, &args) {
                Ok(out) if out.success => {}
                Ok(out) => warn!("{program} {} failed: {}", args.join(" "), out.stderr.trim()),
                Err(e) => warn!("could not run {program}: {e}"),
            }
        }

        info!("installing {name} with {manager}");
        let (program, args) = kind.install_command(package);
        let output = self
            .runner
            .run(&program, &args)
            .map_err(|source| PackageError::Spawn {
                manager: manager.clone(),
                source,
            })?;
        if !output.success {
            return Err(PackageError::InstallFailed {
                manager,
                package: name.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
