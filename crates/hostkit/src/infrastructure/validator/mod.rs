//! Config validators: external syntax checkers such as `sshd -t`.

pub mod mock;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::application::patch_config::{ConfigValidator, ValidationFailure};
use crate::application::ports::CommandRunner;

/// Placeholder replaced by the path of the file under test.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Runs a program and treats exit status 0 as "valid".
///
/// Arguments containing `{path}` have it replaced by the file being
/// checked; if no argument does, the path is appended.  A checker that
/// cannot be started counts as a rejection, so the patch is rolled back.
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl CommandValidator {
    pub fn new(program: impl Into<String>, args: Vec<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            args,
            runner,
        }
    }

    /// Builds a validator from a full command line, `["sshd", "-t", "-f", "{path}"]`.
    ///
    /// Returns `None` for an empty command.
    pub fn from_command(command: &[String], runner: Arc<dyn CommandRunner>) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec(), runner))
    }

    fn args_for(&self, path: &Path) -> Vec<String> {
        let path = path.display().to_string();
        if self.args.iter().any(|a| a.contains(PATH_PLACEHOLDER)) {
            self.args
                .iter()
                .map(|a| a.replace(PATH_PLACEHOLDER, &path))
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(path);
            args
        }
    }
}

impl ConfigValidator for CommandValidator {
    fn validate(&self, path: &Path) -> Result<(), ValidationFailure> {
        let args = self.args_for(path);
        debug!("validating with `{} {}`", self.program, args.join(" "));

        let output = self.runner.run(&self.program, &args).map_err(|e| ValidationFailure {
            diagnostics: format!("could not run {}: {e}", self.program),
        })?;
        if output.success {
            return Ok(());
        }

        let diagnostics = if output.stderr.trim().is_empty() {
            output.stdout.trim().to_string()
        } else {
            output.stderr.trim().to_string()
        };
        Err(ValidationFailure {
            diagnostics: if diagnostics.is_empty() {
                format!("{} exited with {:?}", self.program, output.code)
            } else {
                diagnostics
            },
        })
    }
}

/// Accepts every file.  Used by `hostkit patch` when no `--validate` is given.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoValidation;

impl ConfigValidator for NoValidation {
    fn validate(&self, _path: &Path) -> Result<(), ValidationFailure> {
        Ok(())
    }
}
