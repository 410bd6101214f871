//! Mock validator for unit testing.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::application::patch_config::{ConfigValidator, ValidationFailure};

/// A [`ConfigValidator`] with a fixed verdict that records what it checked.
#[derive(Debug)]
pub struct MockValidator {
    rejection: Option<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockValidator {
    /// Accepts every file.
    pub fn accepting() -> Self {
        Self {
            rejection: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Rejects every file with `diagnostics`.
    pub fn rejecting(diagnostics: &str) -> Self {
        Self {
            rejection: Some(diagnostics.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Paths passed to [`ConfigValidator::validate`], in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

impl ConfigValidator for MockValidator {
    fn validate(&self, path: &Path) -> Result<(), ValidationFailure> {
        self.calls.lock().expect("lock poisoned").push(path.to_path_buf());
        match &self.rejection {
            None => Ok(()),
            Some(diagnostics) => Err(ValidationFailure {
                diagnostics: diagnostics.clone(),
            }),
        }
    }
}
