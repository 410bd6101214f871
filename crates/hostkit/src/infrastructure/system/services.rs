//! Service manager adapter: `systemctl`, or SysV `service` without systemd.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::ports::{BinaryLocator, CommandRunner, ServiceError, ServiceManager};

/// Which init system controls services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSystem {
    Systemd,
    /// `service <name> ...` with scripts in `/etc/init.d`.
    SysV,
}

pub struct SystemServiceManager {
    init: InitSystem,
    init_d: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl SystemServiceManager {
    pub fn new(init: InitSystem, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            init,
            init_d: PathBuf::from("/etc/init.d"),
            runner,
        }
    }

    /// Uses systemd when `systemctl` is on `PATH`.
    pub fn detect(locator: &dyn BinaryLocator, runner: Arc<dyn CommandRunner>) -> Self {
        let init = if locator.find("systemctl").is_some() {
            InitSystem::Systemd
        } else {
            InitSystem::SysV
        };
        debug!("init system: {init:?}");
        Self::new(init, runner)
    }

    pub fn with_init_d(mut self, dir: impl Into<PathBuf>) -> Self {
        self.init_d = dir.into();
        self
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<(), ServiceError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = self
            .runner
            .run(program, &args)
            .map_err(ServiceError::Spawn)?;
        if output.success {
            Ok(())
        } else {
            Err(ServiceError::CommandFailed {
                command: format!("{program} {}", args.join(" ")),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    fn succeeds(&self, program: &str, args: &[&str]) -> bool {
        self.run(program, args).is_ok()
    }
}

impl ServiceManager for SystemServiceManager {
    fn exists(&self, unit: &str) -> bool {
        match self.init {
            InitSystem::Systemd => {
                let unit_file = format!("{unit}.service");
                let args = vec![
                    "list-unit-files".to_string(),
                    "--no-legend".to_string(),
                    unit_file,
                ];
                self.runner
                    .run("systemctl", &args)
                    .is_ok_and(|out| out.success && !out.stdout.trim().is_empty())
            }
            InitSystem::SysV => self.init_d.join(unit).is_file(),
        }
    }

    fn enable(&self, unit: &str) -> Result<(), ServiceError> {
        match self.init {
            InitSystem::Systemd => self.run("systemctl", &["enable", unit]),
            InitSystem::SysV => {
                info!("no systemd; leaving boot-time start of {unit} to the init scripts");
                Ok(())
            }
        }
    }

    fn restart(&self, unit: &str) -> Result<(), ServiceError> {
        match self.init {
            InitSystem::Systemd => self.run("systemctl", &["restart", unit]),
            InitSystem::SysV => self.run("service", &[unit, "restart"]),
        }
    }

    fn is_active(&self, unit: &str) -> bool {
        match self.init {
            InitSystem::Systemd => self.succeeds("systemctl", &["is-active", "--quiet", unit]),
            InitSystem::SysV => self.succeeds("service", &[unit, "status"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CommandOutput, MockBinaryLocator, MockCommandRunner};

    fn output(success: bool, stdout: &str) -> std::io::Result<CommandOutput> {
        Ok(CommandOutput {
            success,
            code: Some(if success { 0 } else { 1 }),
            stdout: stdout.to_string(),
            stderr: if success { String::new() } else { "failed\n".to_string() },
        })
    }

    #[test]
    fn test_detect_without_systemctl_is_sysv() {
        let mut locator = MockBinaryLocator::new();
        locator.expect_find().returning(|_| None);

        let manager = SystemServiceManager::detect(&locator, Arc::new(MockCommandRunner::new()));

        assert_eq!(manager.init, InitSystem::SysV);
    }

    #[test]
    fn test_systemd_exists_checks_unit_files() {
        // Arrange
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, args| {
            if args.iter().any(|a| a == "ssh.service") {
                output(true, "ssh.service enabled enabled\n")
            } else {
                output(true, "")
            }
        });
        let manager = SystemServiceManager::new(InitSystem::Systemd, Arc::new(runner));

        // Act / Assert
        assert!(manager.exists("ssh"));
        assert!(!manager.exists("sshd"));
    }

    #[test]
    fn test_systemd_restart_failure_carries_stderr() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| output(false, ""));
        let manager = SystemServiceManager::new(InitSystem::Systemd, Arc::new(runner));

        let err = manager.restart("ssh").unwrap_err();

        match err {
            ServiceError::CommandFailed { command, stderr, .. } => {
                assert_eq!(command, "systemctl restart ssh");
                assert_eq!(stderr, "failed");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_systemd_is_active_uses_exit_status() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args| args == ["is-active", "--quiet", "ssh"])
            .returning(|_, _| output(true, ""));
        let manager = SystemServiceManager::new(InitSystem::Systemd, Arc::new(runner));

        assert!(manager.is_active("ssh"));
    }

    #[test]
    fn test_sysv_restart_uses_service_command() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|program, args| program == "service" && args == ["sshd", "restart"])
            .times(1)
            .returning(|_, _| output(true, ""));
        let manager = SystemServiceManager::new(InitSystem::SysV, Arc::new(runner));

        assert!(manager.restart("sshd").is_ok());
        assert!(manager.enable("sshd").is_ok());
    }

    #[test]
    fn test_sysv_exists_looks_in_init_d() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ssh"), "#!/bin/sh\n").unwrap();
        let manager = SystemServiceManager::new(InitSystem::SysV, Arc::new(MockCommandRunner::new()))
            .with_init_d(dir.path());

        assert!(manager.exists("ssh"));
        assert!(!manager.exists("sshd"));
    }
}
