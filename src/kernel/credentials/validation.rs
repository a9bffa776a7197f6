//! Credential validation logic.

use crate::config::types::{EntrypointError, PrivilegeTarget, Result};

/// Reject root UIDs/GIDs (0) as a drop target.
///
/// Privilege errors are never downgraded to warnings: a target of root means
/// the deployment is asking for no separation at all, which this pipeline
/// refuses to provide silently.
pub fn validate_target(target: &PrivilegeTarget) -> Result<()> {
    if target.uid == 0 || target.gid == 0 {
        return Err(EntrypointError::Privilege(format!(
            "Cannot transition to root UID/GID (uid={}, gid={})",
            target.uid, target.gid
        )));
    }
    Ok(())
}
