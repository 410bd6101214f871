//! Backup naming and rotation rules.
//!
//! Backups live next to each other in a backup directory and are named after
//! the file they protect:
//!
//! ```text
//! sshd_config.bak.original        permanent, never rotated
//! sshd_config.bak.1718000000      timestamped (unix seconds)
//! sshd_config.bak.1718000000.1    second snapshot within the same second
//! ```
//!
//! The very first snapshot of a file becomes the permanent original.  Every
//! later snapshot is timestamped and subject to rotation: only the newest
//! `retention` timestamped backups are kept.

use std::cmp::Ordering;

/// Number of timestamped backups kept per file unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 5;

const ORIGINAL_SUFFIX: &str = "original";

/// Identifies one backup of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupName {
    /// The first snapshot ever taken; exempt from rotation.
    Original,
    /// A rotating snapshot, ordered by `(unix_secs, seq)`.
    Timestamped { unix_secs: u64, seq: u32 },
}

impl BackupName {
    /// Builds the backup file name for a file called `base`.
    pub fn file_name(&self, base: &str) -> String {
        match self {
            BackupName::Original => format!("{base}.bak.{ORIGINAL_SUFFIX}"),
            BackupName::Timestamped { unix_secs, seq: 0 } => format!("{base}.bak.{unix_secs}"),
            BackupName::Timestamped { unix_secs, seq } => format!("{base}.bak.{unix_secs}.{seq}"),
        }
    }

    /// Recognises `file_name` as a backup of `base`.
    ///
    /// Returns `None` for unrelated files, including backups of other files
    /// whose name shares a prefix with `base`.
    pub fn parse(base: &str, file_name: &str) -> Option<Self> {
        let suffix = file_name.strip_prefix(base)?.strip_prefix(".bak.")?;
        if suffix == ORIGINAL_SUFFIX {
            return Some(BackupName::Original);
        }

        let mut parts = suffix.splitn(2, '.');
        let unix_secs = parse_digits::<u64>(parts.next()?)?;
        let seq = match parts.next() {
            Some(s) => parse_digits::<u32>(s)?,
            None => 0,
        };
        Some(BackupName::Timestamped { unix_secs, seq })
    }

    pub fn is_original(&self) -> bool {
        matches!(self, BackupName::Original)
    }

    /// Picks the name for a new timestamped snapshot taken at `unix_secs`,
    /// avoiding every name in `existing`.
    pub fn next_timestamped(existing: &[BackupName], unix_secs: u64) -> Self {
        let seq = existing
            .iter()
            .filter_map(|b| match b {
                BackupName::Timestamped { unix_secs: s, seq } if *s == unix_secs => Some(seq + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        BackupName::Timestamped { unix_secs, seq }
    }
}

/// Only plain ASCII digits; rejects signs and whitespace that `str::parse` would
/// otherwise accept or that would make two names map to one backup.
fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl Ord for BackupName {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (BackupName::Original, BackupName::Original) => Ordering::Equal,
            (BackupName::Original, _) => Ordering::Less,
            (_, BackupName::Original) => Ordering::Greater,
            (
                BackupName::Timestamped { unix_secs: a, seq: sa },
                BackupName::Timestamped { unix_secs: b, seq: sb },
            ) => (a, sa).cmp(&(b, sb)),
        }
    }
}

impl PartialOrd for BackupName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Returns the timestamped backups that rotation should delete, oldest first.
///
/// Neither the permanent original nor `keep` (the snapshot just taken) is
/// ever returned, so a run can always roll back to its own snapshot even with
/// `retention == 0` or a clock that stepped backwards.  Apart from `keep`, at
/// most `retention` timestamped backups survive.
pub fn plan_rotation(existing: &[BackupName], retention: usize, keep: BackupName) -> Vec<BackupName> {
    let total = existing.iter().filter(|b| !b.is_original()).count();
    let mut candidates: Vec<BackupName> = existing
        .iter()
        .copied()
        .filter(|b| !b.is_original() && *b != keep)
        .collect();
    candidates.sort();

    let excess = total.saturating_sub(retention).min(candidates.len());
    candidates.truncate(excess);
    candidates
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(unix_secs: u64) -> BackupName {
        BackupName::Timestamped { unix_secs, seq: 0 }
    }

    #[test]
    fn test_file_name_for_original() {
        assert_eq!(BackupName::Original.file_name("sshd_config"), "sshd_config.bak.original");
    }

    #[test]
    fn test_file_name_for_timestamped_omits_zero_seq() {
        assert_eq!(ts(1718000000).file_name("sshd_config"), "sshd_config.bak.1718000000");
        let second = BackupName::Timestamped { unix_secs: 1718000000, seq: 2 };
        assert_eq!(second.file_name("sshd_config"), "sshd_config.bak.1718000000.2");
    }

    #[test]
    fn test_parse_recognises_own_names() {
        let names = [
            BackupName::Original,
            ts(42),
            BackupName::Timestamped { unix_secs: 42, seq: 3 },
        ];
        for name in names {
            let file = name.file_name("sshd_config");
            assert_eq!(BackupName::parse("sshd_config", &file), Some(name), "{file}");
        }
    }

    #[test]
    fn test_parse_rejects_unrelated_files() {
        assert_eq!(BackupName::parse("sshd_config", "sshd_config"), None);
        assert_eq!(BackupName::parse("sshd_config", "ssh_config.bak.1"), None);
        assert_eq!(BackupName::parse("sshd_config", "sshd_config.bak.latest"), None);
        assert_eq!(BackupName::parse("sshd_config", "sshd_config.bak.+12"), None);
        assert_eq!(BackupName::parse("sshd_config", "sshd_config.bak.12.x"), None);
    }

    #[test]
    fn test_parse_does_not_confuse_prefixed_file_names() {
        // "sshd_config.d" backups are not backups of "sshd_config".
        assert_eq!(BackupName::parse("sshd_config", "sshd_config.d.bak.original"), None);
    }

    #[test]
    fn test_original_sorts_before_timestamped() {
        let mut names = vec![ts(5), BackupName::Original, ts(1)];
        names.sort();
        assert_eq!(names, vec![BackupName::Original, ts(1), ts(5)]);
    }

    #[test]
    fn test_next_timestamped_uses_seq_zero_for_new_second() {
        let next = BackupName::next_timestamped(&[ts(10)], 11);
        assert_eq!(next, ts(11));
    }

    #[test]
    fn test_next_timestamped_bumps_seq_on_collision() {
        let existing = [ts(10), BackupName::Timestamped { unix_secs: 10, seq: 1 }];
        let next = BackupName::next_timestamped(&existing, 10);
        assert_eq!(next, BackupName::Timestamped { unix_secs: 10, seq: 2 });
    }

    #[test]
    fn test_plan_rotation_keeps_newest_and_never_original() {
        // Arrange: original + 7 timestamped backups, retention 5.
        let mut existing = vec![BackupName::Original];
        existing.extend((1..=7).rev().map(ts));

        // Act
        let doomed = plan_rotation(&existing, DEFAULT_RETENTION, ts(7));

        // Assert
        assert_eq!(doomed, vec![ts(1), ts(2)]);
    }

    #[test]
    fn test_plan_rotation_within_limit_deletes_nothing() {
        let existing = vec![BackupName::Original, ts(1), ts(2)];
        assert!(plan_rotation(&existing, DEFAULT_RETENTION, ts(2)).is_empty());
    }

    #[test]
    fn test_plan_rotation_with_zero_retention_keeps_only_the_new_snapshot() {
        let existing = vec![BackupName::Original, ts(1), ts(2), ts(3)];
        assert_eq!(plan_rotation(&existing, 0, ts(3)), vec![ts(1), ts(2)]);
    }

    #[test]
    fn test_plan_rotation_never_deletes_new_snapshot_taken_with_earlier_clock() {
        // Arrange: the clock stepped back, so the new snapshot sorts oldest.
        let mut existing = vec![BackupName::Original, ts(100)];
        existing.extend((1801..=1805).map(ts));

        // Act
        let doomed = plan_rotation(&existing, DEFAULT_RETENTION, ts(100));

        // Assert
        assert!(!doomed.contains(&ts(100)));
        assert_eq!(doomed, vec![ts(1801)]);
    }

    #[test]
    fn test_plan_rotation_ignores_original_as_keep() {
        let existing = vec![BackupName::Original, ts(1), ts(2)];
        assert_eq!(plan_rotation(&existing, 1, BackupName::Original), vec![ts(1)]);
    }
}
