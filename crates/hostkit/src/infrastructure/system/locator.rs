//! Executable lookup.

use std::path::PathBuf;

use crate::application::ports::BinaryLocator;

/// Searches `PATH`, then the sbin directories a non-login root shell may
/// be missing (`sudo` without `-i` on some distros drops them).
#[derive(Debug, Clone)]
pub struct PathLocator {
    extra_dirs: Vec<PathBuf>,
}

impl PathLocator {
    pub fn new() -> Self {
        Self {
            extra_dirs: ["/usr/local/sbin", "/usr/sbin", "/sbin"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        }
    }

    pub fn with_extra_dirs(extra_dirs: Vec<PathBuf>) -> Self {
        Self { extra_dirs }
    }
}

impl Default for PathLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryLocator for PathLocator {
    fn find(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok().or_else(|| {
            self.extra_dirs
                .iter()
                .map(|dir| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
    }
}
