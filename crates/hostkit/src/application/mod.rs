//! Application layer use cases for hostkit.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The domain crate (`hostkit-core`) knows how to parse a config file and
//! name backups, but never touches the disk.  This layer turns those rules
//! into complete operations and talks to the outside world only through
//! traits, so every use case can be tested with in-memory or mocked ports.
//!
//! # Sub-modules
//!
//! - **`patch_config`**   – The ConfigPatcher: backup, apply directives,
//!   validate, roll back.  Every config edit hostkit makes goes through it.
//!
//! - **`provision_sshd`** – Installs the OpenSSH server when missing,
//!   patches `sshd_config`, restarts and verifies the service.
//!
//! - **`manage_runtime`** – Installs or removes a tarball-distributed
//!   language runtime (Go by default).
//!
//! - **`ports`**          – Traits for the package manager, service manager,
//!   HTTP fetcher, prompts, and the errors they return.
//!
//! - **`error`**          – `ProvisionError`, the union the provisioning use
//!   cases return.

pub mod error;
pub mod manage_runtime;
pub mod patch_config;
pub mod ports;
pub mod provision_sshd;
