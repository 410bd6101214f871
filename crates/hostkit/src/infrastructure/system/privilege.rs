//! Effective-UID privilege check.

use crate::application::ports::{PrivilegeCheck, PrivilegeError};

/// Requires the process to run with effective UID 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct RootPrivilege;

impl PrivilegeCheck for RootPrivilege {
    fn require_root(&self) -> Result<(), PrivilegeError> {
        // SAFETY: geteuid has no preconditions and cannot fail.
        #[allow(unsafe_code)]
        let euid = unsafe { libc::geteuid() };
        check_uid(euid)
    }
}

fn check_uid(euid: u32) -> Result<(), PrivilegeError> {
    if euid == 0 {
        Ok(())
    } else {
        Err(PrivilegeError::NotRoot(euid))
    }
}
