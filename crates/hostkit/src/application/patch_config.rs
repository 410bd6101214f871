//! PatchConfigUseCase: idempotent config edits with backup and rollback.
//!
//! [`ConfigPatcher`] enforces a list of [`Directive`]s on one config file:
//!
//! ```text
//! backup ──► apply directives ──► validate ──┬──► COMMITTED   (patched file stays)
//!                                            └──► ROLLED_BACK (snapshot copied back)
//! ```
//!
//! # Backups
//!
//! The first snapshot ever taken of a file is the *permanent original*
//! (`<file>.bak.original`).  It is written with create-new semantics and
//! marked read-only, so a later run can never overwrite it.  Every later run
//! takes a timestamped snapshot instead, and rotation keeps only the newest
//! `retention` of those.
//!
//! # Rollback
//!
//! [`backup`](ConfigPatcher::backup) returns a [`BackupHandle`] naming the
//! snapshot this run took.  [`guard`](ConfigPatcher::guard) turns it into a
//! [`BackupGuard`]: dropping the guard without calling
//! [`commit`](BackupGuard::commit) copies the snapshot back over the live
//! file.  An I/O error halfway through the directive list therefore leaves
//! the file exactly as it was before the run, the same as a validation
//! failure does.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hostkit_core::{
    plan_rotation, ApplyOutcome, BackupName, ConfigDocument, Directive, DEFAULT_RETENTION,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Error type for config patch operations.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The configured file path has no file name component.
    #[error("invalid config path {0}: expected a path to a file")]
    InvalidPath(PathBuf),

    /// A file system I/O error occurred.
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The patched file was rejected by the validator and has been restored.
    ///
    /// `restored_from` is the snapshot taken by this run, so the file is back
    /// to its exact pre-run content.  That is the permanent original only on
    /// the first run; later runs restore their own timestamped snapshot.
    #[error("{path} failed validation and was restored from {restored_from}: {diagnostics}")]
    Validation {
        path: PathBuf,
        restored_from: PathBuf,
        diagnostics: String,
    },

    /// The patched file was rejected and restoring the snapshot failed too.
    #[error("{path} failed validation ({diagnostics}) and restoring {backup} failed: {source}")]
    RollbackFailed {
        path: PathBuf,
        backup: PathBuf,
        diagnostics: String,
        #[source]
        source: io::Error,
    },
}

impl PatchError {
    fn io(path: &Path, source: io::Error) -> Self {
        PatchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Diagnostics returned by a validator that rejected a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub diagnostics: String,
}

/// External syntax checker for a config file (e.g. `sshd -t -f <path>`).
///
/// Implementations must not modify the file.
pub trait ConfigValidator: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ValidationFailure`] with the checker's output when the file
    /// is rejected or the checker cannot be run.
    fn validate(&self, path: &Path) -> Result<(), ValidationFailure>;
}

/// File access needed by the patcher.
///
/// The production implementation is `infrastructure::storage::FsConfigStorage`;
/// tests use the in-memory `MemoryConfigStorage`.
pub trait ConfigStorage: Send + Sync {
    /// Reads a file as UTF-8 text.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Replaces a file's content, keeping its permissions.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Copies `source` to a new file at `dest`.
    ///
    /// Must fail with [`io::ErrorKind::AlreadyExists`] rather than overwrite.
    /// When `permanent` is set the copy is made read-only.
    fn snapshot(&self, source: &Path, dest: &Path, permanent: bool) -> io::Result<()>;

    /// Copies a backup's content over the live file.
    fn restore(&self, backup: &Path, live: &Path) -> io::Result<()>;

    /// Lists the file names in `dir`.  A missing directory lists as empty.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Deletes a file.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Wall-clock source for backup timestamps.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn unix_secs(&self) -> u64;
}

// ── Configuration & results ───────────────────────────────────────────────────

/// Everything one patch run needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchConfig {
    /// The live config file to patch.
    pub file_path: PathBuf,
    /// Directives to enforce, applied in order.
    pub directives: Vec<Directive>,
    /// Where backups are written.  `None` means next to the file.
    pub backup_dir: Option<PathBuf>,
    /// How many timestamped backups to keep.
    pub retention: usize,
}

impl PatchConfig {
    pub fn new(file_path: impl Into<PathBuf>, directives: Vec<Directive>) -> Self {
        Self {
            file_path: file_path.into(),
            directives,
            backup_dir: None,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// The directory backups are written to.
    pub fn resolved_backup_dir(&self) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => match self.file_path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }
}

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: BackupName,
    pub path: PathBuf,
}

/// The snapshot taken by [`ConfigPatcher::backup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    /// The snapshot holding the pre-patch content.
    pub backup: BackupEntry,
    /// Timestamped backups deleted by rotation after the snapshot was taken.
    pub pruned: Vec<PathBuf>,
}

/// What one directive did (or would do) to the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveOutcome {
    pub directive: Directive,
    pub outcome: ApplyOutcome,
}

/// Summary of a committed patch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub file_path: PathBuf,
    pub backup: BackupHandle,
    pub outcomes: Vec<DirectiveOutcome>,
}

impl PatchReport {
    /// Returns `true` if any directive modified the file.
    pub fn changed(&self) -> bool {
        self.outcomes.iter().any(|o| o.outcome.changed())
    }
}

// ── Use case ──────────────────────────────────────────────────────────────────

/// The Patch Config use case.
pub struct ConfigPatcher {
    config: PatchConfig,
    storage: Arc<dyn ConfigStorage>,
    validator: Arc<dyn ConfigValidator>,
    clock: Arc<dyn Clock>,
}

impl ConfigPatcher {
    pub fn new(
        config: PatchConfig,
        storage: Arc<dyn ConfigStorage>,
        validator: Arc<dyn ConfigValidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            storage,
            validator,
            clock,
        }
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Runs the whole sequence: backup, apply every directive, validate.
    ///
    /// # Errors
    ///
    /// - [`PatchError::Io`] if the file cannot be read or written or the
    ///   backup cannot be taken.  The file is restored from the snapshot if
    ///   one was taken.
    /// - [`PatchError::Validation`] if the validator rejects the result; the
    ///   file has been restored.
    pub fn run(&self) -> Result<PatchReport, PatchError> {
        let path = &self.config.file_path;
        info!("patching {} ({} directives)", path.display(), self.config.directives.len());

        let handle = self.backup()?;
        let guard = self.guard(handle.clone());

        let mut outcomes = Vec::with_capacity(self.config.directives.len());
        for directive in &self.config.directives {
            // An early return here drops `guard`, which restores the snapshot.
            let outcome = self.apply(directive)?;
            outcomes.push(DirectiveOutcome {
                directive: directive.clone(),
                outcome,
            });
        }

        self.validate(guard)?;

        let report = PatchReport {
            file_path: path.clone(),
            backup: handle,
            outcomes,
        };
        if report.changed() {
            info!("{} patched and validated", path.display());
        } else {
            info!("{} already up to date", path.display());
        }
        Ok(report)
    }

    /// Snapshots the live file, then applies rotation.
    ///
    /// The first snapshot of a file becomes the permanent original; later
    /// snapshots are timestamped.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Io`] if the file cannot be read or the snapshot
    /// cannot be written.
    pub fn backup(&self) -> Result<BackupHandle, PatchError> {
        let live = &self.config.file_path;
        let base = self.base_name()?;
        let existing = self.backup_names(&base)?;

        let name = if existing.contains(&BackupName::Original) {
            BackupName::next_timestamped(&existing, self.clock.unix_secs())
        } else {
            BackupName::Original
        };
        let dest = self.config.resolved_backup_dir().join(name.file_name(&base));

        self.storage
            .snapshot(live, &dest, name.is_original())
            .map_err(|e| PatchError::io(&dest, e))?;
        info!("backed up {} to {}", live.display(), dest.display());

        let pruned = self.rotate(&base, name)?;
        Ok(BackupHandle {
            backup: BackupEntry { name, path: dest },
            pruned,
        })
    }

    /// Arms a rollback guard for the snapshot in `handle`.
    pub fn guard(&self, handle: BackupHandle) -> BackupGuard<'_> {
        BackupGuard {
            patcher: self,
            backup: handle.backup,
            armed: true,
        }
    }

    /// Enforces one directive on the live file.
    ///
    /// Returns `true` if the file was modified.  The file is not rewritten
    /// when it already satisfies the directive.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Io`] on read or write failure.
    pub fn apply_directive(&self, directive: &Directive) -> Result<bool, PatchError> {
        Ok(self.apply(directive)?.changed())
    }

    /// Like [`apply_directive`](Self::apply_directive) but reports how the
    /// file changed.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Io`] on read or write failure.
    pub fn apply(&self, directive: &Directive) -> Result<ApplyOutcome, PatchError> {
        let path = &self.config.file_path;
        let text = self.storage.read(path).map_err(|e| PatchError::io(path, e))?;
        let mut doc = ConfigDocument::parse(&text);

        let outcome = doc.apply(directive);
        if outcome.changed() {
            self.storage
                .write(path, &doc.render())
                .map_err(|e| PatchError::io(path, e))?;
        }
        debug!("{directive}: {outcome:?}");
        Ok(outcome)
    }

    /// Runs the validator and commits or rolls back `guard`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Validation`] after restoring the snapshot, or
    /// [`PatchError::RollbackFailed`] if the restore itself failed.
    pub fn validate(&self, guard: BackupGuard<'_>) -> Result<(), PatchError> {
        let path = &self.config.file_path;
        match self.validator.validate(path) {
            Ok(()) => {
                guard.commit();
                Ok(())
            }
            Err(failure) => {
                warn!("{} failed validation: {}", path.display(), failure.diagnostics);
                let backup = guard.backup.path.clone();
                match guard.rollback() {
                    Ok(()) => Err(PatchError::Validation {
                        path: path.clone(),
                        restored_from: backup,
                        diagnostics: failure.diagnostics,
                    }),
                    Err(source) => Err(PatchError::RollbackFailed {
                        path: path.clone(),
                        backup,
                        diagnostics: failure.diagnostics,
                        source,
                    }),
                }
            }
        }
    }

    /// Copies the permanent original backup over the live file.
    ///
    /// Returns `false` if there is no permanent backup or the copy fails.
    pub fn restore(&self) -> bool {
        let live = &self.config.file_path;
        let Ok(base) = self.base_name() else {
            return false;
        };
        match self.backup_names(&base) {
            Ok(names) if names.contains(&BackupName::Original) => {}
            Ok(_) => {
                warn!("no permanent backup of {} to restore", live.display());
                return false;
            }
            Err(e) => {
                error!("cannot list backups of {}: {e}", live.display());
                return false;
            }
        }

        let original = self
            .config
            .resolved_backup_dir()
            .join(BackupName::Original.file_name(&base));
        match self.storage.restore(&original, live) {
            Ok(()) => {
                info!("restored {} from {}", live.display(), original.display());
                true
            }
            Err(e) => {
                error!("failed to restore {} from {}: {e}", live.display(), original.display());
                false
            }
        }
    }

    /// Reports what each directive would do, without touching the file.
    ///
    /// Directives are evaluated in order against the progressively patched
    /// in-memory document, the same way [`run`](Self::run) applies them.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Io`] if the file cannot be read.
    pub fn preview(&self) -> Result<Vec<DirectiveOutcome>, PatchError> {
        let path = &self.config.file_path;
        let text = self.storage.read(path).map_err(|e| PatchError::io(path, e))?;
        let mut doc = ConfigDocument::parse(&text);

        Ok(self
            .config
            .directives
            .iter()
            .map(|d| DirectiveOutcome {
                directive: d.clone(),
                outcome: doc.apply(d),
            })
            .collect())
    }

    /// Lists this file's backups, permanent original first, then oldest to newest.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Io`] if the backup directory cannot be read.
    pub fn backups(&self) -> Result<Vec<BackupEntry>, PatchError> {
        let base = self.base_name()?;
        let dir = self.config.resolved_backup_dir();
        Ok(self
            .backup_names(&base)?
            .into_iter()
            .map(|name| BackupEntry {
                path: dir.join(name.file_name(&base)),
                name,
            })
            .collect())
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn base_name(&self) -> Result<String, PatchError> {
        self.config
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PatchError::InvalidPath(self.config.file_path.clone()))
    }

    /// Sorted backup names present in the backup directory.
    fn backup_names(&self, base: &str) -> Result<Vec<BackupName>, PatchError> {
        let dir = self.config.resolved_backup_dir();
        let mut names: Vec<BackupName> = self
            .storage
            .list(&dir)
            .map_err(|e| PatchError::io(&dir, e))?
            .iter()
            .filter_map(|f| BackupName::parse(base, f))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Deletes timestamped backups beyond the retention limit.
    ///
    /// A backup that cannot be deleted is logged and skipped; it will be
    /// retried on the next run.
    /// Prunes old timestamped backups, never the snapshot `taken` by this run.
    fn rotate(&self, base: &str, taken: BackupName) -> Result<Vec<PathBuf>, PatchError> {
        let dir = self.config.resolved_backup_dir();
        let existing = self.backup_names(base)?;

        let mut pruned = Vec::new();
        for name in plan_rotation(&existing, self.config.retention, taken) {
            let path = dir.join(name.file_name(base));
            match self.storage.remove(&path) {
                Ok(()) => {
                    debug!("pruned old backup {}", path.display());
                    pruned.push(path);
                }
                Err(e) => warn!("failed to prune old backup {}: {e}", path.display()),
            }
        }
        Ok(pruned)
    }

    fn restore_from(&self, backup: &BackupEntry) -> io::Result<()> {
        self.storage.restore(&backup.path, &self.config.file_path)
    }
}

// ── Scoped rollback ───────────────────────────────────────────────────────────

/// Restores the live file from a snapshot unless committed.
///
/// Created by [`ConfigPatcher::guard`].  Consumed by
/// [`commit`](Self::commit) (keep the patched file) or
/// [`rollback`](Self::rollback) (restore and report the result).  Dropping
/// an armed guard restores and logs the outcome.
pub struct BackupGuard<'a> {
    patcher: &'a ConfigPatcher,
    backup: BackupEntry,
    armed: bool,
}

impl BackupGuard<'_> {
    /// The snapshot this guard restores from.
    pub fn backup(&self) -> &BackupEntry {
        &self.backup
    }

    /// Keeps the patched file.
    pub fn commit(mut self) {
        self.armed = false;
    }

    /// Restores the snapshot now.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the restore.
    pub fn rollback(mut self) -> io::Result<()> {
        self.armed = false;
        let result = self.patcher.restore_from(&self.backup);
        if result.is_ok() {
            warn!(
                "rolled back {} from {}",
                self.patcher.config.file_path.display(),
                self.backup.path.display()
            );
        }
        result
    }
}

impl Drop for BackupGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let live = &self.patcher.config.file_path;
        match self.patcher.restore_from(&self.backup) {
            Ok(()) => warn!("patch aborted; restored {} from {}", live.display(), self.backup.path.display()),
            Err(e) => error!(
                "patch aborted and restoring {} from {} failed: {e}",
                live.display(),
                self.backup.path.display()
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::memory::MemoryConfigStorage;
    use crate::infrastructure::system::clock::FixedClock;
    use crate::infrastructure::validator::mock::MockValidator;

    const LIVE: &str = "/etc/ssh/sshd_config";
    const ORIGINAL: &str = "/etc/ssh/sshd_config.bak.original";
    const INITIAL: &str = "#PermitRootLogin prohibit-password\nUsePAM yes\n";

    struct Fixture {
        storage: Arc<MemoryConfigStorage>,
        validator: Arc<MockValidator>,
        clock: Arc<FixedClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = Arc::new(MemoryConfigStorage::new());
            storage.insert(LIVE, INITIAL);
            Self {
                storage,
                validator: Arc::new(MockValidator::accepting()),
                clock: Arc::new(FixedClock::new(1_700_000_000)),
            }
        }

        fn patcher(&self, directives: &[&str]) -> ConfigPatcher {
            let directives = directives.iter().map(|d| d.parse().unwrap()).collect();
            ConfigPatcher::new(
                PatchConfig::new(LIVE, directives),
                self.storage.clone(),
                self.validator.clone(),
                self.clock.clone(),
            )
        }

        fn live(&self) -> String {
            self.storage.get(LIVE).expect("live file present")
        }
    }

    // ── backup ────────────────────────────────────────────────────────────────

    #[test]
    fn test_first_backup_is_permanent_original() {
        // Arrange
        let fx = Fixture::new();
        let patcher = fx.patcher(&[]);

        // Act
        let handle = patcher.backup().unwrap();

        // Assert
        assert_eq!(handle.backup.name, BackupName::Original);
        assert_eq!(handle.backup.path, PathBuf::from(ORIGINAL));
        assert_eq!(fx.storage.get(ORIGINAL).as_deref(), Some(INITIAL));
        assert!(fx.storage.is_read_only(ORIGINAL));
    }

    #[test]
    fn test_second_backup_is_timestamped() {
        let fx = Fixture::new();
        let patcher = fx.patcher(&[]);
        patcher.backup().unwrap();

        let handle = patcher.backup().unwrap();

        assert_eq!(
            handle.backup.name,
            BackupName::Timestamped { unix_secs: 1_700_000_000, seq: 0 }
        );
        assert!(fx.storage.get("/etc/ssh/sshd_config.bak.1700000000").is_some());
    }

    #[test]
    fn test_backups_in_same_second_do_not_collide() {
        let fx = Fixture::new();
        let patcher = fx.patcher(&[]);
        patcher.backup().unwrap();
        patcher.backup().unwrap();

        let handle = patcher.backup().unwrap();

        assert_eq!(handle.backup.path, PathBuf::from("/etc/ssh/sshd_config.bak.1700000000.1"));
    }

    #[test]
    fn test_rotation_keeps_five_timestamped_and_the_original() {
        // Arrange
        let fx = Fixture::new();
        let patcher = fx.patcher(&[]);

        // Act: one original plus eight timestamped snapshots.
        for _ in 0..9 {
            patcher.backup().unwrap();
            fx.clock.advance(60);
        }

        // Assert
        let backups = patcher.backups().unwrap();
        let timestamped = backups.iter().filter(|b| !b.name.is_original()).count();
        assert_eq!(timestamped, DEFAULT_RETENTION);
        assert_eq!(backups[0].name, BackupName::Original);
        assert_eq!(fx.storage.get(ORIGINAL).as_deref(), Some(INITIAL));
    }

    #[test]
    fn test_rotation_reports_pruned_paths() {
        let fx = Fixture::new();
        let patcher = ConfigPatcher::new(
            PatchConfig::new(LIVE, vec![]).with_retention(1),
            fx.storage.clone(),
            fx.validator.clone(),
            fx.clock.clone(),
        );
        patcher.backup().unwrap();
        patcher.backup().unwrap();
        fx.clock.advance(1);

        let handle = patcher.backup().unwrap();

        assert_eq!(handle.pruned, vec![PathBuf::from("/etc/ssh/sshd_config.bak.1700000000")]);
    }

    #[test]
    fn test_backup_of_missing_file_is_io_error() {
        let fx = Fixture::new();
        let patcher = ConfigPatcher::new(
            PatchConfig::new("/etc/ssh/missing_config", vec![]),
            fx.storage.clone(),
            fx.validator.clone(),
            fx.clock.clone(),
        );

        let result = patcher.backup();

        assert!(matches!(result, Err(PatchError::Io { .. })));
    }

    #[test]
    fn test_backup_dir_override_is_used() {
        let fx = Fixture::new();
        let patcher = ConfigPatcher::new(
            PatchConfig::new(LIVE, vec![]).with_backup_dir("/var/backups/hostkit"),
            fx.storage.clone(),
            fx.validator.clone(),
            fx.clock.clone(),
        );

        let handle = patcher.backup().unwrap();

        assert_eq!(
            handle.backup.path,
            PathBuf::from("/var/backups/hostkit/sshd_config.bak.original")
        );
    }

    // ── apply_directive ───────────────────────────────────────────────────────

    #[test]
    fn test_apply_directive_overrides_commented_line() {
        let fx = Fixture::new();
        let patcher = fx.patcher(&[]);

        let changed = patcher
            .apply_directive(&"PermitRootLogin yes".parse().unwrap())
            .unwrap();

        assert!(changed);
        assert_eq!(fx.live(), "PermitRootLogin yes\nUsePAM yes\n");
    }

    #[test]
    fn test_apply_directive_twice_does_not_rewrite() {
        // Arrange
        let fx = Fixture::new();
        let patcher = fx.patcher(&[]);
        let d: Directive = "PermitRootLogin yes".parse().unwrap();
        patcher.apply_directive(&d).unwrap();
        let writes_after_first = fx.storage.write_count();

        // Act
        let changed = patcher.apply_directive(&d).unwrap();

        // Assert
        assert!(!changed);
        assert_eq!(fx.storage.write_count(), writes_after_first);
    }

    // ── run / validate ────────────────────────────────────────────────────────

    #[test]
    fn test_run_commits_when_validator_accepts() {
        let fx = Fixture::new();
        let patcher = fx.patcher(&["PermitRootLogin yes", "PasswordAuthentication yes"]);

        let report = patcher.run().unwrap();

        assert!(report.changed());
        assert_eq!(report.outcomes[0].outcome, ApplyOutcome::Replaced);
        assert_eq!(report.outcomes[1].outcome, ApplyOutcome::Appended);
        assert_eq!(
            fx.live(),
            "PermitRootLogin yes\nUsePAM yes\nPasswordAuthentication yes\n"
        );
        assert_eq!(fx.validator.calls(), vec![PathBuf::from(LIVE)]);
    }

    #[test]
    fn test_run_rolls_back_when_validator_rejects() {
        // Arrange
        let fx = Fixture::new();
        let validator = Arc::new(MockValidator::rejecting("line 1: Bad configuration option"));
        let patcher = ConfigPatcher::new(
            PatchConfig::new(LIVE, vec!["PermitRootLogin yes".parse().unwrap()]),
            fx.storage.clone(),
            validator,
            fx.clock.clone(),
        );

        // Act
        let result = patcher.run();

        // Assert
        match result {
            Err(PatchError::Validation { diagnostics, restored_from, .. }) => {
                assert!(diagnostics.contains("Bad configuration option"));
                assert_eq!(restored_from, PathBuf::from(ORIGINAL));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(fx.live(), INITIAL);
    }

    #[test]
    fn test_second_run_rollback_restores_pre_patch_state_not_original() {
        // Arrange: a first successful run changes the file.
        let fx = Fixture::new();
        fx.patcher(&["PermitRootLogin yes"]).run().unwrap();
        let after_first = fx.live();
        fx.clock.advance(10);

        // Act: the second run is rejected.
        let rejecting = ConfigPatcher::new(
            PatchConfig::new(LIVE, vec!["Port 2222".parse().unwrap()]),
            fx.storage.clone(),
            Arc::new(MockValidator::rejecting("bad port")),
            fx.clock.clone(),
        );
        let result = rejecting.run();

        // Assert
        assert!(matches!(result, Err(PatchError::Validation { .. })));
        assert_eq!(fx.live(), after_first);
        assert_eq!(fx.storage.get(ORIGINAL).as_deref(), Some(INITIAL));
    }

    #[test]
    fn test_run_restores_snapshot_when_write_fails_midway() {
        // Arrange
        let fx = Fixture::new();
        let patcher = fx.patcher(&["PermitRootLogin yes", "Port 22"]);
        // Snapshot succeeds, first write succeeds, second write fails.
        fx.storage.fail_writes_after(1);

        // Act
        let result = patcher.run();

        // Assert
        assert!(matches!(result, Err(PatchError::Io { .. })));
        assert_eq!(fx.live(), INITIAL);
        assert!(fx.validator.calls().is_empty());
    }

    #[test]
    fn test_run_on_up_to_date_file_reports_unchanged() {
        let fx = Fixture::new();
        fx.patcher(&["PermitRootLogin yes"]).run().unwrap();

        let report = fx.patcher(&["PermitRootLogin yes"]).run().unwrap();

        assert!(!report.changed());
    }

    #[test]
    fn test_validate_rollback_failure_is_reported() {
        let fx = Fixture::new();
        let patcher = ConfigPatcher::new(
            PatchConfig::new(LIVE, vec!["Port 22".parse().unwrap()]),
            fx.storage.clone(),
            Arc::new(MockValidator::rejecting("nope")),
            fx.clock.clone(),
        );
        let handle = patcher.backup().unwrap();
        let guard = patcher.guard(handle);
        fx.storage.fail_restores();

        let result = patcher.validate(guard);

        assert!(matches!(result, Err(PatchError::RollbackFailed { .. })));
    }

    #[test]
    fn test_rejected_run_with_zero_retention_still_rolls_back() {
        // Arrange: the first run takes the original and commits.
        let fx = Fixture::new();
        fx.patcher(&["PermitRootLogin yes"]).run().unwrap();
        let before = fx.live();
        fx.clock.advance(10);
        let patcher = ConfigPatcher::new(
            PatchConfig::new(LIVE, vec!["Port 2222".parse().unwrap()]).with_retention(0),
            fx.storage.clone(),
            Arc::new(MockValidator::rejecting("bad port")),
            fx.clock.clone(),
        );

        // Act
        let result = patcher.run();

        // Assert
        match result {
            Err(PatchError::Validation { restored_from, .. }) => {
                assert_eq!(restored_from, PathBuf::from("/etc/ssh/sshd_config.bak.1700000010"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(fx.live(), before);
    }

    #[test]
    fn test_rejected_run_after_clock_stepped_back_still_rolls_back() {
        // Arrange: five backups stamped later than the current clock.
        let fx = Fixture::new();
        fx.storage.insert(ORIGINAL, INITIAL);
        for i in 1..=5 {
            fx.storage
                .insert(format!("/etc/ssh/sshd_config.bak.18000000{i:02}"), INITIAL);
        }
        let patcher = ConfigPatcher::new(
            PatchConfig::new(LIVE, vec!["Port 2222".parse().unwrap()]),
            fx.storage.clone(),
            Arc::new(MockValidator::rejecting("bad port")),
            fx.clock.clone(),
        );

        // Act
        let result = patcher.run();

        // Assert
        assert!(matches!(result, Err(PatchError::Validation { .. })), "{result:?}");
        assert_eq!(fx.live(), INITIAL);
        assert!(fx.storage.get("/etc/ssh/sshd_config.bak.1700000000").is_some());
        assert!(fx.storage.get("/etc/ssh/sshd_config.bak.1800000001").is_none());
    }

    // ── restore ───────────────────────────────────────────────────────────────

    #[test]
    fn test_restore_without_original_returns_false() {
        let fx = Fixture::new();
        assert!(!fx.patcher(&[]).restore());
    }

    #[test]
    fn test_restore_copies_original_over_live_file() {
        // Arrange
        let fx = Fixture::new();
        fx.patcher(&["PermitRootLogin yes"]).run().unwrap();
        fx.clock.advance(5);
        fx.patcher(&["Port 2222"]).run().unwrap();

        // Act
        let restored = fx.patcher(&[]).restore();

        // Assert
        assert!(restored);
        assert_eq!(fx.live(), INITIAL);
    }

    // ── preview ───────────────────────────────────────────────────────────────

    #[test]
    fn test_preview_reports_outcomes_without_writing() {
        let fx = Fixture::new();
        let patcher = fx.patcher(&["PermitRootLogin yes", "UsePAM yes", "Port 22", "Port 22"]);

        let outcomes = patcher.preview().unwrap();

        let kinds: Vec<ApplyOutcome> = outcomes.iter().map(|o| o.outcome).collect();
        assert_eq!(
            kinds,
            vec![
                ApplyOutcome::Replaced,
                ApplyOutcome::Unchanged,
                ApplyOutcome::Appended,
                ApplyOutcome::Unchanged,
            ]
        );
        assert_eq!(fx.live(), INITIAL);
        assert_eq!(fx.storage.write_count(), 0);
    }

    // ── PatchConfig ───────────────────────────────────────────────────────────

    #[test]
    fn test_backup_dir_defaults_to_file_parent() {
        let cfg = PatchConfig::new("/etc/ssh/sshd_config", vec![]);
        assert_eq!(cfg.resolved_backup_dir(), PathBuf::from("/etc/ssh"));
    }

    #[test]
    fn test_backup_dir_for_bare_file_name_is_current_dir() {
        let cfg = PatchConfig::new("sshd_config", vec![]);
        assert_eq!(cfg.resolved_backup_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_invalid_path_is_rejected() {
        let fx = Fixture::new();
        let patcher = ConfigPatcher::new(
            PatchConfig::new("/", vec![]),
            fx.storage.clone(),
            fx.validator.clone(),
            fx.clock.clone(),
        );
        assert!(matches!(patcher.backup(), Err(PatchError::InvalidPath(_))));
    }
}
