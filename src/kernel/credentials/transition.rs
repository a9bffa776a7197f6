//! Safe UID/GID transitions to the unprivileged target identity.
//!
//! CRITICAL: setresgid MUST be called BEFORE setresuid; once the user
//! identity is dropped, changing group is no longer permitted.
//!
//! Every step is strict. A privilege drop that fails, or that "succeeds" at
//! the syscall level but leaves mismatched identities, is a fatal security
//! defect, never a warning.

use crate::config::types::{EntrypointError, PrivilegeTarget, Result};
use super::validation::validate_target;

/// Real and effective identities of the current process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessIds {
    pub real_uid: u32,
    pub effective_uid: u32,
    pub real_gid: u32,
    pub effective_gid: u32,
}

impl ProcessIds {
    pub fn is_root(&self) -> bool {
        self.effective_uid == 0
    }
}

/// Read the current process identities.
pub fn current_ids() -> ProcessIds {
    use nix::unistd::{getegid, geteuid, getgid, getuid};
    ProcessIds {
        real_uid: getuid().as_raw(),
        effective_uid: geteuid().as_raw(),
        real_gid: getgid().as_raw(),
        effective_gid: getegid().as_raw(),
    }
}

/// Drop from root to the target identity and verify the transition.
///
/// Sequence: validate -> clear supplementary groups -> setresgid ->
/// setresuid -> umask -> re-read and verify. When the process is not running
/// as root the drop is skipped (the container runtime already assigned an
/// identity), but target validation still runs so a misconfigured `PUID=0`
/// fails identically in both modes.
pub fn drop_privileges(target: &PrivilegeTarget) -> Result<()> {
    validate_target(target)?;

    if !current_ids().is_root() {
        log::info!(
            "Not running as root (euid={}), skipping privilege drop",
            current_ids().effective_uid
        );
        return Ok(());
    }

    clear_supplementary_groups()?;
    // CRITICAL: GID before UID
    set_gid(target.gid)?;
    set_uid(target.uid)?;
    set_umask();
    verify_transition(target, &current_ids())?;

    log::info!("Transitioned to UID={}, GID={}", target.uid, target.gid);
    Ok(())
}

/// Compare the observed identities against the target. Pure check: the
/// mismatch path is testable without root by passing simulated identities.
pub fn verify_transition(target: &PrivilegeTarget, ids: &ProcessIds) -> Result<()> {
    if ids.real_uid != target.uid || ids.effective_uid != target.uid {
        return Err(EntrypointError::Privilege(format!(
            "UID verification failed: expected {}, got real={}, effective={}",
            target.uid, ids.real_uid, ids.effective_uid
        )));
    }
    if ids.real_gid != target.gid || ids.effective_gid != target.gid {
        return Err(EntrypointError::Privilege(format!(
            "GID verification failed: expected {}, got real={}, effective={}",
            target.gid, ids.real_gid, ids.effective_gid
        )));
    }
    log::info!("UID/GID verification passed");
    Ok(())
}

fn clear_supplementary_groups() -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        use nix::unistd::setgroups;
        setgroups(&[]).map_err(|e| {
            EntrypointError::Privilege(format!("Failed to clear supplementary groups: {}", e))
        })?;
        log::info!("Cleared supplementary groups");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(EntrypointError::Privilege(
            "setgroups is only available on Linux".to_string(),
        ))
    }
}

/// MUST be called BEFORE set_uid.
fn set_gid(gid: u32) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: setresgid atomically sets all three GIDs. gid validated != 0 by caller.
        let result =
            unsafe { libc::setresgid(gid as libc::gid_t, gid as libc::gid_t, gid as libc::gid_t) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            return Err(EntrypointError::Privilege(format!(
                "Failed to setresgid({}): {}",
                gid, err
            )));
        }
        log::info!("Set GID to {}", gid);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = gid;
        Err(EntrypointError::Privilege(
            "setresgid is only available on Linux".to_string(),
        ))
    }
}

/// MUST be called AFTER set_gid.
fn set_uid(uid: u32) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: setresuid atomically sets all three UIDs. uid validated != 0 by caller.
        // CRITICAL: Must be called after setresgid.
        let result =
            unsafe { libc::setresuid(uid as libc::uid_t, uid as libc::uid_t, uid as libc::uid_t) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            return Err(EntrypointError::Privilege(format!(
                "Failed to setresuid({}): {}",
                uid, err
            )));
        }
        log::info!("Set UID to {}", uid);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = uid;
        Err(EntrypointError::Privilege(
            "setresuid is only available on Linux".to_string(),
        ))
    }
}

// Files created after the drop are group/other readable (0o022).
fn set_umask() {
    use nix::sys::stat::{umask, Mode};
    umask(Mode::from_bits_truncate(0o022));
}
