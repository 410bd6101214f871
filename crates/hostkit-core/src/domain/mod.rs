//! Domain entities for hostkit.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the application.  Domain code has **no** imports
//! from OS APIs, process spawning, HTTP clients, or the file system.  Code in
//! outer layers (application, infrastructure, CLI) depends on the domain, but
//! the domain never depends on them.

/// Backup file naming, ordering, and rotation planning.
pub mod backup;

/// Key/value directives to enforce in a config file.
pub mod directive;

/// Line-oriented config document model.
///
/// See [`document::ConfigDocument`] for the main type.
pub mod document;
