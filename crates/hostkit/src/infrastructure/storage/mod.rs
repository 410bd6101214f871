//! Storage infrastructure: config files on disk.
//!
//! - **`fs`**     – [`FsConfigStorage`](fs::FsConfigStorage), the
//!   [`ConfigStorage`](crate::application::patch_config::ConfigStorage)
//!   used in production.  Writes are atomic (temp file + rename in the same
//!   directory) so an interrupted run never leaves a half-written config.
//! - **`memory`** – An in-memory `ConfigStorage` with failure injection for
//!   unit tests.
//! - **`config`** – hostkit's own TOML settings file.

pub mod config;
pub mod fs;
pub mod memory;
