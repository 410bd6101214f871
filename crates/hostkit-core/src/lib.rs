//! # hostkit-core
//!
//! Shared library for hostkit containing the line-oriented config model,
//! directive types, and the naming and retention rules for config backups.
//!
//! This crate has zero dependencies on the file system, subprocesses, or the
//! network.  Everything here operates on strings and plain values, so the
//! rules that keep a config edit idempotent can be tested in isolation.
//!
//! # Architecture overview (for beginners)
//!
//! hostkit edits system configuration files such as `/etc/ssh/sshd_config`.
//! An edit is described as a list of *directives*: "make sure `Key` is set to
//! `value`".  Applying a directive must be idempotent: running the tool twice
//! leaves the file exactly as running it once.
//!
//! - **`domain::directive`** – The `Directive` value type and its parser
//!   (`"PermitRootLogin yes"` or `"PermitRootLogin=yes"`).
//!
//! - **`domain::document`** – A small parser that turns file text into
//!   `ConfigLine` records (`{raw, key, value, is_comment}`) and renders them
//!   back byte-for-byte.  Directive application happens on this model.
//!
//! - **`domain::backup`** – How backup files are named
//!   (`<file>.bak.original`, `<file>.bak.<unix-secs>`), ordered, and which
//!   ones rotation deletes.

pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `hostkit_core::Directive` instead of `hostkit_core::domain::directive::Directive`.
pub use domain::backup::{plan_rotation, BackupName, DEFAULT_RETENTION};
pub use domain::directive::{Directive, DirectiveError};
pub use domain::document::{ApplyOutcome, ConfigDocument, ConfigLine};
