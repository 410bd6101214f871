//! OS adapters: clock, privileges, subprocesses, package and service managers.
//!
//! Everything here shells out or calls libc; nothing in this module is used
//! by the application layer directly, only through the traits in
//! [`crate::application::ports`] and [`crate::application::patch_config`].

pub mod clock;
pub mod command;
pub mod fs;
pub mod locator;
pub mod packages;
pub mod privilege;
pub mod services;
