//! In-memory [`ConfigStorage`] for unit testing.
//!
//! Lets tests seed files, inspect the result, and inject write or restore
//! failures without touching the disk.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::application::patch_config::ConfigStorage;

#[derive(Debug, Clone)]
struct Entry {
    content: String,
    read_only: bool,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, Entry>,
    writes: usize,
    /// Successful writes left before `write` starts failing.
    write_budget: Option<usize>,
    fail_restores: bool,
}

/// A mock implementation of [`ConfigStorage`] backed by a map.
#[derive(Debug, Default)]
pub struct MemoryConfigStorage {
    state: Mutex<State>,
}

impl MemoryConfigStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a file.
    pub fn insert(&self, path: impl Into<PathBuf>, content: &str) {
        self.state.lock().expect("lock poisoned").files.insert(
            path.into(),
            Entry {
                content: content.to_string(),
                read_only: false,
            },
        );
    }

    /// Returns a file's content, if it exists.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state
            .lock()
            .expect("lock poisoned")
            .files
            .get(path.as_ref())
            .map(|e| e.content.clone())
    }

    pub fn is_read_only(&self, path: impl AsRef<Path>) -> bool {
        self.state
            .lock()
            .expect("lock poisoned")
            .files
            .get(path.as_ref())
            .is_some_and(|e| e.read_only)
    }

    /// Number of successful [`ConfigStorage::write`] calls.  Snapshots and
    /// restores are not counted.
    pub fn write_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").writes
    }

    /// Allows `n` more successful writes, then fails every later one.
    pub fn fail_writes_after(&self, n: usize) {
        self.state.lock().expect("lock poisoned").write_budget = Some(n);
    }

    /// Makes every later restore fail.
    pub fn fail_restores(&self) {
        self.state.lock().expect("lock poisoned").fail_restores = true;
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
}

impl ConfigStorage for MemoryConfigStorage {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.get(path).ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(budget) = state.write_budget.as_mut() {
            if *budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
            }
            *budget -= 1;
        }
        if state.files.get(path).is_some_and(|e| e.read_only) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", path.display()),
            ));
        }
        state.files.insert(
            path.to_path_buf(),
            Entry {
                content: contents.to_string(),
                read_only: false,
            },
        );
        state.writes += 1;
        Ok(())
    }

    fn snapshot(&self, source: &Path, dest: &Path, permanent: bool) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        let content = state
            .files
            .get(source)
            .map(|e| e.content.clone())
            .ok_or_else(|| not_found(source))?;
        if state.files.contains_key(dest) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", dest.display()),
            ));
        }
        state.files.insert(
            dest.to_path_buf(),
            Entry {
                content,
                read_only: permanent,
            },
        );
        Ok(())
    }

    fn restore(&self, backup: &Path, live: &Path) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.fail_restores {
            return Err(io::Error::new(io::ErrorKind::Other, "injected restore failure"));
        }
        let content = state
            .files
            .get(backup)
            .map(|e| e.content.clone())
            .ok_or_else(|| not_found(backup))?;
        state.files.insert(
            live.to_path_buf(),
            Entry {
                content,
                read_only: false,
            },
        );
        Ok(())
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let state = self.state.lock().expect("lock poisoned");
        Ok(state
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.state
            .lock()
            .expect("lock poisoned")
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }
}
