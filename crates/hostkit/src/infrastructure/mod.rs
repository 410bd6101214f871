//! Infrastructure layer for hostkit.
//!
//! Contains OS-facing adapters: config file storage, config validators,
//! subprocess-backed package and service managers, HTTP downloads, and
//! terminal prompts.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `hostkit_core`, but MUST NOT be imported by the `application` or domain
//! layers (test doubles excepted).

pub mod network;
pub mod prompt;
pub mod storage;
pub mod system;
pub mod validator;
